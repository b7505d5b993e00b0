//! Session Loader and session-selection API (spec.md §2 layer 1, §6).
//!
//! Grounded on `examples/original_source/orangebox/reader.py`: parse the
//! optional `#` comment preamble, scan for session-start offsets by
//! byte-searching the `H Product:` literal, and on selection slice out one
//! session's bytes, parse its headers, and build its field defs.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::context::FrameStats;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::fields::{build_field_defs, FieldDefs};
use crate::frame::FieldValue;
use crate::header::{parse_header_block, Headers};
use crate::stream::Frames;

/// Default session-buffer I/O block size (spec.md §6): `>= 2 MiB`.
pub const DEFAULT_BUFFER_SIZE: usize = 2 * 1024 * 1024;

const SESSION_START_LITERAL: &[u8] = b"H Product:";

/// An opened log file: its comment preamble and the byte offset of each
/// session within it. No frame reading happens until a session is selected
/// (spec.md §6 `open`).
pub struct Handle {
    raw: Vec<u8>,
    comments: Vec<String>,
    session_offsets: Vec<usize>,
}

impl Handle {
    /// Open `path` with the default buffer size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Open `path`, reading it in `buffer_size`-sized chunks (SPEC_FULL.md
    /// §4.6 configuration surface; purely a performance knob).
    pub fn open_with_buffer_size<P: AsRef<Path>>(path: P, buffer_size: usize) -> Result<Self> {
        let mut file = File::open(path)?;
        if file.seek(SeekFrom::Current(0)).is_err() {
            return Err(Error::NotSeekable);
        }

        let mut raw = Vec::new();
        let mut chunk = vec![0u8; buffer_size.max(1)];
        loop {
            let n = file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
        }

        let (comments, comment_len) = parse_comments(&raw);
        let session_offsets = find_session_offsets(&raw[comment_len..])
            .into_iter()
            .map(|pos| pos + comment_len)
            .collect();

        tracing::debug!(sessions = ?session_offsets, "found log starts");

        Ok(Handle {
            raw,
            comments,
            session_offsets,
        })
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.session_offsets.len()
    }

    /// The `#`-prefixed comment preamble, one entry per line, with the `#`
    /// and surrounding whitespace stripped (SPEC_FULL.md §4.7).
    #[must_use]
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Load session `index` (1-based), parse its headers, and build its
    /// field defs (spec.md §6 `select_session`).
    pub fn select_session(&self, index: usize) -> Result<SessionView> {
        let count = self.session_count();
        if index < 1 || index > count {
            return Err(Error::InvalidSessionIndex { index, count });
        }

        let start = self.session_offsets[index - 1];
        let end = self
            .session_offsets
            .get(index)
            .copied()
            .unwrap_or(self.raw.len());
        let session = &self.raw[start..end];

        let (headers, header_len) = parse_header_block(session);
        let field_defs = build_field_defs(&headers)?;
        let body = session[header_len..].to_vec();

        Ok(SessionView::new(headers.without_field_defs(), field_defs, body))
    }
}

/// Parse the leading `#`-prefixed comment preamble. Returns the comments
/// (with `#` and leading whitespace stripped) and the byte length consumed.
fn parse_comments(raw: &[u8]) -> (Vec<String>, usize) {
    let mut comments = Vec::new();
    let mut offset = 0;

    for line in raw.split_inclusive(|&b| b == b'\n') {
        if line.first() != Some(&b'#') {
            break;
        }
        let Ok(text) = std::str::from_utf8(line) else {
            break;
        };
        let trimmed = text.trim_end_matches(['\r', '\n']);
        comments.push(trimmed.trim_start_matches('#').trim_start().to_string());
        offset += line.len();
    }

    (comments, offset)
}

fn find_session_offsets(haystack: &[u8]) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut pos = 0;
    while pos <= haystack.len().saturating_sub(SESSION_START_LITERAL.len()) {
        if haystack[pos..].starts_with(SESSION_START_LITERAL) {
            offsets.push(pos);
            pos += SESSION_START_LITERAL.len();
        } else {
            pos += 1;
        }
    }
    offsets
}

/// One selected session: its headers, field defs, and frame-stream bytes,
/// plus the events/counters accumulated as [`Frames`] runs (spec.md §6
/// `SessionView`).
pub struct SessionView {
    headers: Headers,
    field_defs: FieldDefs,
    buf: Vec<u8>,
    events: RefCell<Vec<Event>>,
    stats: Cell<FrameStats>,
}

impl SessionView {
    fn new(headers: Headers, field_defs: FieldDefs, buf: Vec<u8>) -> Self {
        SessionView {
            headers,
            field_defs,
            buf,
            events: RefCell::new(Vec::new()),
            stats: Cell::new(FrameStats::default()),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(headers: Headers, field_defs: FieldDefs, buf: Vec<u8>) -> Self {
        Self::new(headers, field_defs, buf)
    }

    /// Headers excluding `Field ...` keys (spec.md §6).
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Assembled public field-name list (spec.md §6).
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.field_defs.field_names()
    }

    /// Lazily decode this session's main frames (spec.md §6 `frames()`).
    /// `events()`/`stats()` only reflect the full session once this iterator
    /// has been drained to completion.
    pub fn frames(&self) -> Frames<'_> {
        Frames::new(&self.buf, &self.headers, &self.field_defs, self)
    }

    /// Events observed so far; complete only after `frames()` is exhausted
    /// (spec.md §6 `events()`).
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats.get()
    }

    /// Column-major convenience view over every field in `field_names()`
    /// (SPEC_FULL.md §4.7, orangebox's `frames_to_dict`). Drains `frames()`
    /// in full.
    #[must_use]
    pub fn frames_by_field(&self) -> BTreeMap<String, Vec<FieldValue>> {
        let names = self.field_names();
        let mut columns: BTreeMap<String, Vec<FieldValue>> =
            names.iter().map(|n| (n.clone(), Vec::new())).collect();

        for frame in self.frames() {
            for (i, name) in names.iter().enumerate() {
                let value = frame.values.get(i).cloned().unwrap_or(FieldValue::Empty);
                columns.get_mut(name).expect("name from field_names").push(value);
            }
        }
        columns
    }

    pub(crate) fn push_event(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub(crate) fn record_read(&self) {
        let mut s = self.stats.get();
        s.read += 1;
        self.stats.set(s);
    }

    pub(crate) fn record_invalid(&self) {
        let mut s = self.stats.get();
        s.invalid += 1;
        self.stats.set(s);
    }
}
