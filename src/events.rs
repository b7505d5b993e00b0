//! Event registry and parsers (spec.md §4.5), grounded on
//! `examples/original_source/orangebox/events.py`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::header::Scalar;
use crate::reader::{read_f32_be, read_signed_vb, read_unsigned_vb, FrameReader};

/// Event kind ids, fixed by the original implementation's enum numbering
/// (SPEC_FULL.md §4, tie-broken by `orangebox.types.EventType` since spec.md
/// leaves these as opaque small integers except for the three it pins in
/// §8's scenarios).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    SyncBeep,
    AutotuneCycleStart,
    AutotuneCycleResult,
    AutotuneTargets,
    InflightAdjustment,
    LoggingResume,
    FlightMode,
    GtuneCycleResult,
    Custom,
    CustomBlank,
    TwitchTest,
    LogEnd,
}

impl EventKind {
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => EventKind::SyncBeep,
            5 => EventKind::FlightMode,
            10 => EventKind::AutotuneCycleStart,
            11 => EventKind::AutotuneCycleResult,
            12 => EventKind::AutotuneTargets,
            13 => EventKind::InflightAdjustment,
            14 => EventKind::LoggingResume,
            20 => EventKind::GtuneCycleResult,
            250 => EventKind::Custom,
            251 => EventKind::CustomBlank,
            253 => EventKind::TwitchTest,
            255 => EventKind::LogEnd,
            _ => return None,
        })
    }
}

/// One event occurrence (spec.md §3 `Event`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub payload: EventPayload,
    pub time: Option<i64>,
    pub loop_iteration: Option<i64>,
}

/// Structured event payload. Placeholder event kinds (recognized but
/// carrying no decodable payload in the source) produce `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Map(BTreeMap<String, Scalar>),
    None,
}

const LOG_END_SENTINEL: &[u8] = b"End of log\0";

/// Table index 0 = "None" (unused func slot) through index 20 = "Roll D",
/// verbatim from `orangebox.events.INFLIGHT_ADJUSTMENT_FUNCTIONS`.
struct AdjustmentFunc {
    name: &'static str,
    scale: Option<f64>,
    scalef: Option<f64>,
}

const INFLIGHT_ADJUSTMENT_FUNCTIONS: &[AdjustmentFunc] = &[
    AdjustmentFunc { name: "None", scale: None, scalef: None },
    AdjustmentFunc { name: "RC Rate", scale: Some(0.01), scalef: None },
    AdjustmentFunc { name: "RC Expo", scale: Some(0.01), scalef: None },
    AdjustmentFunc { name: "Throttle Expo", scale: Some(0.01), scalef: None },
    AdjustmentFunc { name: "Pitch & Roll Rate", scale: Some(0.01), scalef: None },
    AdjustmentFunc { name: "Yaw rate", scale: Some(0.01), scalef: None },
    AdjustmentFunc { name: "Pitch & Roll P", scale: Some(0.1), scalef: Some(1.0) },
    AdjustmentFunc { name: "Pitch & Roll I", scale: Some(0.001), scalef: Some(0.1) },
    AdjustmentFunc { name: "Pitch & Roll D", scale: None, scalef: Some(1000.0) },
    AdjustmentFunc { name: "Yaw P", scale: Some(0.1), scalef: Some(1.0) },
    AdjustmentFunc { name: "Yaw I", scale: Some(0.001), scalef: Some(0.1) },
    AdjustmentFunc { name: "Yaw D", scale: None, scalef: Some(1000.0) },
    AdjustmentFunc { name: "Rate Profile", scale: None, scalef: None },
    AdjustmentFunc { name: "Pitch Rate", scale: Some(0.01), scalef: None },
    AdjustmentFunc { name: "Roll Rate", scale: Some(0.01), scalef: None },
    AdjustmentFunc { name: "Pitch P", scale: Some(0.1), scalef: Some(1.0) },
    AdjustmentFunc { name: "Pitch I", scale: Some(0.001), scalef: Some(0.1) },
    AdjustmentFunc { name: "Pitch D", scale: None, scalef: Some(1000.0) },
    AdjustmentFunc { name: "Roll P", scale: Some(0.1), scalef: Some(1.0) },
    AdjustmentFunc { name: "Roll I", scale: Some(0.001), scalef: Some(0.1) },
    AdjustmentFunc { name: "Roll D", scale: None, scalef: Some(1000.0) },
];

fn map(pairs: impl IntoIterator<Item = (&'static str, Scalar)>) -> EventPayload {
    EventPayload::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// Dispatch one event's payload parse by kind (spec.md §4.5). Returns `None`
/// on underflow, same absent-signals-corruption contract as field decoders.
/// `has_log_end_sentinel` lets the caller (the frame stream) check and log
/// the trailing literal without this function consuming it.
pub fn parse_event(kind: EventKind, r: &mut FrameReader) -> Option<EventPayload> {
    match kind {
        EventKind::SyncBeep => {
            let time = read_unsigned_vb(r)?;
            Some(map([("time", Scalar::Int(i64::from(time)))]))
        }
        EventKind::FlightMode => {
            let new_flags = read_unsigned_vb(r)?;
            let old_flags = read_unsigned_vb(r)?;
            Some(map([
                ("new_flags", Scalar::Int(i64::from(new_flags))),
                ("old_flags", Scalar::Int(i64::from(old_flags))),
            ]))
        }
        EventKind::InflightAdjustment => parse_inflight_adjustment(r),
        EventKind::LogEnd => {
            if !r.has_subsequent(LOG_END_SENTINEL) {
                // Spec.md §7 kind 4: log, don't fail; the terminal flag is
                // still honored by the caller regardless.
                tracing::error!("log-end event missing expected sentinel");
            }
            Some(EventPayload::None)
        }
        EventKind::AutotuneCycleStart
        | EventKind::AutotuneCycleResult
        | EventKind::AutotuneTargets
        | EventKind::GtuneCycleResult
        | EventKind::Custom
        | EventKind::CustomBlank
        | EventKind::TwitchTest
        | EventKind::LoggingResume => Some(EventPayload::None),
    }
}

fn parse_inflight_adjustment(r: &mut FrameReader) -> Option<EventPayload> {
    let tag = r.next_byte()?;
    let func = usize::from(tag & 0x7f);
    let is_float = tag >= 128;
    let raw: f64 = if is_float {
        f64::from(read_f32_be(r)?)
    } else {
        f64::from(read_signed_vb(r)?)
    };

    let (name, scale) = match INFLIGHT_ADJUSTMENT_FUNCTIONS.get(func) {
        Some(descr) => {
            let scale = if is_float {
                descr.scalef.or(descr.scale)
            } else {
                descr.scale
            }
            .unwrap_or(1.0);
            (descr.name, scale)
        }
        None => ("Unknown", 1.0),
    };

    let value = round4(raw * scale);
    Some(map([
        ("name", Scalar::Str(name.to_string())),
        ("func", Scalar::Int(func as i64)),
        ("value", Scalar::Float(value)),
    ]))
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
