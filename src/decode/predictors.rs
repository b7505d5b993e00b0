//! The predictor registry (spec.md §4.2): predictor id -> pure
//! `(raw_value, ctx) -> final_value` transform.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::frame::FieldValue;

/// A resolved predictor, bound once per field at field-def build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictor {
    Zero,
    Previous,
    StraightLine,
    Average2,
    MinThrottle,
    Motor0,
    Increment,
    HomeCoord { coord_index: usize },
    Fixed1500,
    VbatRef,
    LastMainFrameTime,
    MinMotor,
}

impl Predictor {
    pub fn resolve(id: u32, field_index: usize, gps_coord_index: Option<usize>) -> Result<Self> {
        Ok(match id {
            0 => Predictor::Zero,
            1 => Predictor::Previous,
            2 => Predictor::StraightLine,
            3 => Predictor::Average2,
            4 => Predictor::MinThrottle,
            5 => Predictor::Motor0,
            6 => Predictor::Increment,
            7 => Predictor::HomeCoord {
                coord_index: gps_coord_index.unwrap_or(field_index),
            },
            8 => Predictor::Fixed1500,
            9 => Predictor::VbatRef,
            10 => Predictor::LastMainFrameTime,
            11 => Predictor::MinMotor,
            other => return Err(Error::UnknownPredictor(other)),
        })
    }

    /// Apply this predictor to a raw decoded value at field position
    /// `field_index` of the frame currently being decoded (spec.md §4.2
    /// predictor contract: pure, reads only `ctx`/headers, never the
    /// reader).
    #[must_use]
    pub fn apply(&self, raw: i32, field_index: usize, ctx: &Context) -> FieldValue {
        let predicted: i64 = match self {
            Predictor::Zero => 0,
            Predictor::Previous => previous_or_zero(ctx, field_index),
            Predictor::StraightLine => straight_line(ctx, field_index),
            Predictor::Average2 => average2(ctx, field_index),
            Predictor::MinThrottle => header_i64(ctx, "minthrottle"),
            Predictor::Motor0 => current_frame_value(ctx, 0),
            Predictor::Increment => previous_or_zero(ctx, field_index),
            Predictor::HomeCoord { coord_index } => home_coord(ctx, *coord_index),
            Predictor::Fixed1500 => 1500,
            Predictor::VbatRef => header_i64(ctx, "vbatref"),
            Predictor::LastMainFrameTime => last_main_time(ctx),
            Predictor::MinMotor => header_list_first_i64(ctx, "motorOutput"),
        };
        let value = predicted.saturating_add(i64::from(raw));
        FieldValue::Int(value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }
}

fn previous_or_zero(ctx: &Context, field_index: usize) -> i64 {
    ctx.last_main()
        .and_then(|f| f.get(field_index))
        .and_then(FieldValue::as_i32)
        .map_or(0, i64::from)
}

fn straight_line(ctx: &Context, field_index: usize) -> i64 {
    let prev = ctx
        .last_main()
        .and_then(|f| f.get(field_index))
        .and_then(FieldValue::as_i32);
    let Some(prev) = prev else { return 0 };
    // Without a distinct "two frames back" bucket we fall back to `prev`
    // doubled minus itself, i.e. a flat extrapolation; callers with a real
    // history of two main frames get the full straight-line extrapolation
    // via `last_intra`/`last_inter` when both are populated.
    match (ctx.last_intra(), ctx.last_inter()) {
        (Some(a), Some(b)) => {
            let a = a.get(field_index).and_then(FieldValue::as_i32).unwrap_or(0);
            let b = b.get(field_index).and_then(FieldValue::as_i32).unwrap_or(0);
            i64::from(2 * b - a)
        }
        _ => i64::from(prev),
    }
}

fn average2(ctx: &Context, field_index: usize) -> i64 {
    match (ctx.last_intra(), ctx.last_inter()) {
        (Some(a), Some(b)) => {
            let a = a.get(field_index).and_then(FieldValue::as_i32).unwrap_or(0);
            let b = b.get(field_index).and_then(FieldValue::as_i32).unwrap_or(0);
            i64::from(a + b) / 2
        }
        _ => previous_or_zero(ctx, field_index),
    }
}

fn current_frame_value(ctx: &Context, index: usize) -> i64 {
    ctx.current_value(index)
        .and_then(FieldValue::as_i32)
        .map_or(0, i64::from)
}

fn home_coord(ctx: &Context, coord_index: usize) -> i64 {
    ctx.last_gps_home()
        .and_then(|f| f.get(coord_index))
        .and_then(FieldValue::as_i32)
        .map_or(0, i64::from)
}

fn last_main_time(ctx: &Context) -> i64 {
    // "time" is always field 0 of a main frame by header convention.
    previous_or_zero(ctx, 0)
}

fn header_i64(ctx: &Context, key: &str) -> i64 {
    ctx.headers.get_scalar(key).and_then(|s| s.as_i64()).unwrap_or(0)
}

fn header_list_first_i64(ctx: &Context, key: &str) -> i64 {
    ctx.headers
        .get_list(key)
        .and_then(|l| l.first())
        .and_then(|s| s.as_i64())
        .unwrap_or(0)
}
