//! The frame stream state machine (spec.md §4.4): multiplexes frame kinds
//! from a session's byte stream, drives the field pipeline, validates
//! monotonicity, stitches slow/gps context onto main frames, and recovers
//! from corruption by dropping and resyncing.
//!
//! Implemented as an external iterator (spec.md §9 "lazy frame production")
//! rather than a generator — the natural idiom in a language without them.

use crate::context::Context;
use crate::decode::DecodedValue;
use crate::events::{parse_event, EventKind};
use crate::fields::FieldDefs;
use crate::frame::{FieldValue, Frame, FrameKind};
use crate::header::Headers;
use crate::reader::FrameReader;
use crate::session::SessionView;

/// Desync tolerance thresholds (spec.md §6).
pub const MAX_TIME_JUMP: i64 = 10_000_000;
pub const MAX_ITER_JUMP: i64 = 500 * 10;
/// Largest frame the original format ever produces; a sizing hint only, not
/// enforced (spec.md §6 names it as a constant, not a semantic limit).
pub const MAX_FRAME_SIZE: usize = 256;

/// The live iterator over one session's frames. Borrows its
/// [`SessionView`] for the session's buffer/headers/field-defs and reports
/// decoded events and counters back into it as it runs (spec.md §6
/// `SessionView.events()` is populated only once this iterator is
/// exhausted).
pub struct Frames<'s> {
    reader: FrameReader<'s>,
    field_defs: &'s FieldDefs,
    ctx: Context<'s>,
    view: &'s SessionView,
    last_slow: Option<Vec<FieldValue>>,
    last_gps: Option<Vec<FieldValue>>,
    last_time: Option<i64>,
    terminal: bool,
    summary_logged: bool,
}

impl<'s> Frames<'s> {
    pub(crate) fn new(
        buf: &'s [u8],
        headers: &'s Headers,
        field_defs: &'s FieldDefs,
        view: &'s SessionView,
    ) -> Self {
        Frames {
            reader: FrameReader::new(buf),
            field_defs,
            ctx: Context::new(headers),
            view,
            last_slow: None,
            last_gps: None,
            last_time: None,
            terminal: false,
            summary_logged: false,
        }
    }

    fn log_summary_once(&mut self) {
        if self.summary_logged {
            return;
        }
        self.summary_logged = true;
        let stats = self.view.stats();
        let total = stats.read;
        let parsed = total - stats.invalid;
        let skipped = stats.skipped;
        let invalid = stats.invalid;
        let invalid_percent = if total == 0 {
            0.0
        } else {
            100.0 * invalid as f64 / total as f64
        };
        tracing::info!(
            total,
            parsed,
            skipped,
            invalid,
            invalid_percent,
            "Frames: total: {total}, parsed: {parsed}, skipped: {skipped}, invalid: {invalid} ({invalid_percent:.2}%)"
        );
    }

    /// Run the field pipeline for `kind` (spec.md §4.4 steps 1–3). Returns
    /// `None` if any field decode underflows; the reader is left wherever
    /// the failed decode stopped (no rewind — that position is the resync
    /// point).
    fn decode_main_fields(&mut self, kind: FrameKind) -> Option<Vec<FieldValue>> {
        let defs = self.field_defs.get(kind)?;
        self.ctx.field_index = 0;
        self.ctx.frame_type = kind;
        self.ctx.current_frame = Vec::with_capacity(defs.len().min(MAX_FRAME_SIZE));

        while self.ctx.field_index < defs.len() {
            let idx = self.ctx.field_index;
            let encoding = defs[idx].encoding.as_ref()?;
            let decoded = encoding.decode(&mut self.reader)?;
            match decoded {
                DecodedValue::Int(raw) => {
                    let predictor = defs[idx].predictor.as_ref()?;
                    let value = predictor.apply(raw, idx, &self.ctx);
                    self.ctx.current_frame.push(value);
                    self.ctx.field_index += 1;
                }
                DecodedValue::Float(v) => {
                    self.ctx.current_frame.push(FieldValue::Float(v));
                    self.ctx.field_index += 1;
                }
                DecodedValue::Tuple(values) => {
                    for raw in values {
                        let idx = self.ctx.field_index;
                        if idx >= defs.len() {
                            break;
                        }
                        let predictor = defs[idx].predictor.as_ref()?;
                        let value = predictor.apply(raw, idx, &self.ctx);
                        self.ctx.current_frame.push(value);
                        self.ctx.field_index += 1;
                    }
                }
            }
        }

        Some(std::mem::take(&mut self.ctx.current_frame))
    }

    /// Parse one event frame (tag byte already consumed by the caller);
    /// returns `false` if the event id is unrecognized or the parser
    /// underflowed (spec.md §4.4 "event frame").
    fn handle_event_frame(&mut self) -> bool {
        let Some(id) = self.reader.next_byte() else {
            return false;
        };
        let Some(kind) = EventKind::from_id(id) else {
            tracing::warn!(id, "unknown event type");
            return false;
        };
        tracing::debug!(?kind, "new event frame");
        let Some(payload) = parse_event(kind, &mut self.reader) else {
            return false;
        };
        self.view.push_event(crate::events::Event {
            kind,
            payload,
            time: self.last_time,
            loop_iteration: self.ctx.last_iter,
        });
        if kind == EventKind::LogEnd {
            self.terminal = true;
        }
        true
    }

    /// Validate and, if it survives, stitch a decoded main frame into its
    /// final yielded shape (spec.md §4.4 "main-frame validation"/"stitching").
    /// Returns `None` if the frame is dropped as desynced.
    fn validate_and_stitch(&mut self, kind: FrameKind, values: Vec<FieldValue>) -> Option<Frame> {
        let time = self
            .field_defs
            .field_index(kind, "time")
            .and_then(|i| values.get(i))
            .and_then(FieldValue::as_i32)
            .map(i64::from);

        if let (Some(last_time), Some(current_time)) = (self.last_time, time) {
            if last_time > current_time && (last_time - current_time).abs() > MAX_TIME_JUMP {
                tracing::debug!(current_time, last_time, "dropping frame: time desync");
                self.last_time = Some(current_time);
                return None;
            }
        }
        self.last_time = time.or(self.last_time);

        if let Some(iter_idx) = self.field_defs.field_index(kind, "loopIteration") {
            if let Some(current_iter) = values.get(iter_idx).and_then(FieldValue::as_i32) {
                let current_iter = i64::from(current_iter);
                if let Some(last_iter) = self.ctx.last_iter {
                    // Asymmetric on purpose (spec.md §9 open question): uses
                    // the *sum* of current and previous iteration, not their
                    // difference. Preserve as-is.
                    if last_iter >= current_iter && (current_iter + last_iter) > MAX_ITER_JUMP {
                        tracing::debug!(current_iter, last_iter, "dropping frame: iteration desync");
                        self.ctx.last_iter = Some(current_iter);
                        return None;
                    }
                }
                self.ctx.last_iter = Some(current_iter);
            }
        }

        let mut out = values;
        if let Some(slow_defs) = self.field_defs.get(FrameKind::Slow) {
            match &self.last_slow {
                Some(snapshot) => out.extend(snapshot.iter().cloned()),
                None => out.extend(std::iter::repeat(FieldValue::Empty).take(slow_defs.len())),
            }
        }
        if let Some(gps_defs) = self.field_defs.get(FrameKind::Gps) {
            let width = gps_defs.len().saturating_sub(1);
            match &self.last_gps {
                Some(snapshot) => out.extend(snapshot.iter().skip(1).cloned()),
                None => out.extend(std::iter::repeat(FieldValue::Empty).take(width)),
            }
        }

        Some(Frame { kind, values: out })
    }
}

impl<'s> Iterator for Frames<'s> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            if self.terminal || self.reader.eof() {
                self.log_summary_once();
                return None;
            }

            let tag = self.reader.next_byte()?;
            let Some(kind) = FrameKind::from_tag(tag) else {
                self.view.record_invalid();
                continue;
            };

            if kind == FrameKind::Event {
                let ok = self.handle_event_frame();
                self.view.record_read();
                if !ok {
                    self.view.record_invalid();
                }
                if self.terminal {
                    self.log_summary_once();
                    return None;
                }
                continue;
            }

            if self.field_defs.get(kind).is_none() {
                tracing::warn!(?kind, "no field def found for frame type");
                self.view.record_read();
                self.view.record_invalid();
                continue;
            }

            let Some(values) = self.decode_main_fields(kind) else {
                tracing::debug!(?kind, "dropping frame: decode underflow");
                self.view.record_invalid();
                continue;
            };

            match kind {
                FrameKind::Slow => {
                    self.last_slow = Some(values);
                    self.view.record_read();
                    continue;
                }
                FrameKind::Gps => {
                    self.last_gps = Some(values);
                    self.view.record_read();
                    continue;
                }
                FrameKind::GpsHome => {
                    self.ctx.add_frame(&Frame { kind, values });
                    self.view.record_read();
                    continue;
                }
                FrameKind::Intra | FrameKind::Inter => {
                    let Some(frame) = self.validate_and_stitch(kind, values) else {
                        self.view.record_read();
                        self.view.record_invalid();
                        continue;
                    };

                    // Corruption look-ahead: only when bytes remain
                    // (spec.md §9 last open question).
                    if let Some(next) = self.reader.peek() {
                        if FrameKind::from_tag(next).is_none() {
                            tracing::debug!(?kind, "dropping frame: corrupt lookahead");
                            self.reader.skip(1);
                            self.view.record_read();
                            self.view.record_invalid();
                            continue;
                        }
                    }

                    self.ctx.add_frame(&frame);
                    self.view.record_read();
                    return Some(frame);
                }
                FrameKind::Event => unreachable!("handled above"),
            }
        }
    }
}
