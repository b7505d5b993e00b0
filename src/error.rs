//! Fatal, boundary-level errors.
//!
//! Frame-level corruption (unknown frame-kind byte, decoder underflow,
//! desynced time/iteration) is *not* represented here — those are handled
//! internally by the frame stream as drop-and-resync, never propagated as a
//! `Result`. Only the conditions spec.md §7 calls "fatal configuration" get
//! an `Error` variant.

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("input must be seekable")]
    NotSeekable,

    #[error("invalid session index {index}: file has {count} session(s)")]
    InvalidSessionIndex { index: usize, count: usize },

    #[error("no decoder registered for encoding id {0}")]
    UnknownEncoding(u32),

    #[error("no predictor registered for predictor id {0}")]
    UnknownPredictor(u32),
}

pub type Result<T> = std::result::Result<T, Error>;
