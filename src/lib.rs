//! Decoder for binary flight-controller "blackbox" log files: concatenated
//! sessions of a textual header block followed by a compactly encoded frame
//! stream (intra/inter keyframes, slow state, GPS, GPS home, and events).
//!
//! Start at [`Handle::open`] to discover sessions in a file, then
//! [`Handle::select_session`] to get a [`SessionView`] and pull its
//! [`SessionView::frames`].

pub(crate) mod context;
pub mod decode;
pub mod error;
pub mod events;
pub mod fields;
pub mod frame;
pub mod header;
pub mod reader;
pub mod session;
pub mod stream;

pub use context::FrameStats;
pub use error::{Error, Result};
pub use events::{Event, EventKind, EventPayload};
pub use fields::{FieldDef, FieldDefs};
pub use frame::{FieldValue, Frame, FrameKind};
pub use header::{HeaderValue, Headers, Scalar};
pub use session::{Handle, SessionView};
