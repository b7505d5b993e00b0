//! Frame-kind tagging and the decoded-value cell (spec.md §3 `FrameKind`,
//! `Frame`).

use serde::{Deserialize, Serialize};

/// One of the six frame variants multiplexed from a session's byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Intra,
    Inter,
    Slow,
    Gps,
    GpsHome,
    Event,
}

impl FrameKind {
    /// Map a leading frame-kind byte to its `FrameKind`, or `None` for an
    /// unrecognized tag (spec.md §4.4 corruption-resync rule).
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'I' => Some(FrameKind::Intra),
            b'P' => Some(FrameKind::Inter),
            b'S' => Some(FrameKind::Slow),
            b'G' => Some(FrameKind::Gps),
            b'H' => Some(FrameKind::GpsHome),
            b'E' => Some(FrameKind::Event),
            _ => None,
        }
    }

    /// The single-character tag used in `Field <tag> <property>` header
    /// keys. Event frames have no field defs, so no tag is defined for them.
    #[must_use]
    pub fn header_tag(self) -> Option<u8> {
        match self {
            FrameKind::Intra => Some(b'I'),
            FrameKind::Inter => Some(b'P'),
            FrameKind::Slow => Some(b'S'),
            FrameKind::Gps => Some(b'G'),
            FrameKind::GpsHome => Some(b'H'),
            FrameKind::Event => None,
        }
    }

    #[must_use]
    pub fn is_main(self) -> bool {
        matches!(self, FrameKind::Intra | FrameKind::Inter)
    }
}

/// One decoded field value.
///
/// `Empty` is the pad sentinel spec.md §9 requires for slow/GPS columns
/// appended to a main frame before any slow/GPS frame has been observed —
/// kept as its own tagged variant rather than an empty string so it stays
/// distinguishable from any real decoded number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i32),
    Float(f32),
    Empty,
}

impl FieldValue {
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Float(v) => Some(*v as i32),
            FieldValue::Empty => None,
        }
    }
}

/// One fully decoded row: a main (Intra/Inter) frame's fields plus the
/// stitched-on last-slow/last-gps snapshot (spec.md §3 invariants).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub values: Vec<FieldValue>,
}
