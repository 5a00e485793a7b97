//! Newline-delimited message framing for the linewire connector.
//!
//! Every message on the wire is one line of UTF-8 text terminated by `\n`
//! (a trailing `\r` is tolerated). This crate turns arbitrarily chunked
//! input into complete [`Frame`]s and writes frames back out whole:
//! - blank lines are skipped
//! - lines longer than the configured ceiling fail with
//!   [`FrameError::FrameTooLarge`]
//! - an unterminated trailing line at end of input is discarded with a warning
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, LineCodec, DEFAULT_MAX_FRAME_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
