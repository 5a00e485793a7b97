use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

use crate::error::{FrameError, Result};

/// Line delimiter. Never part of a multi-byte UTF-8 sequence, so splitting
/// on it cannot cut a character in half.
pub const DELIMITER: u8 = b'\n';

/// Default frame ceiling: 1 MiB per line.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// One complete line from the wire, without its delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Line bytes, excluding `\n` and any trailing `\r`.
    pub line: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(line: impl Into<Bytes>) -> Self {
        Self { line: line.into() }
    }

    /// The line bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_ref()
    }

    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }
}

/// Append `payload` and a delimiter to `dst`.
///
/// Fails if the payload itself contains a delimiter, since the receiving
/// side would see two frames.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if let Some(pos) = payload.iter().position(|b| *b == DELIMITER) {
        return Err(FrameError::EmbeddedDelimiter(pos));
    }
    dst.reserve(payload.len() + 1);
    dst.put_slice(payload);
    dst.put_u8(DELIMITER);
    Ok(())
}

/// Decode the next non-blank frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't hold a complete line yet.
/// `scanned` is the length of the buffer prefix already known to contain no
/// delimiter; it lets repeated calls on a growing buffer skip rescanning.
/// Consumed lines, blank ones included, are removed from `src`.
pub fn decode_frame(
    src: &mut BytesMut,
    scanned: &mut usize,
    max_frame_size: usize,
) -> Result<Option<Frame>> {
    loop {
        let start = (*scanned).min(src.len());
        let Some(offset) = src[start..].iter().position(|b| *b == DELIMITER) else {
            *scanned = src.len();
            let pending = pending_line_len(src);
            if pending > max_frame_size {
                return Err(FrameError::FrameTooLarge {
                    size: pending,
                    max: max_frame_size,
                });
            }
            return Ok(None); // Need more data
        };

        let end = start + offset;
        *scanned = 0;
        let mut line = src.split_to(end + 1);
        line.truncate(end);
        if line.last() == Some(&b'\r') {
            line.truncate(end - 1);
        }

        if line.len() > max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: line.len(),
                max: max_frame_size,
            });
        }
        if is_blank(&line) {
            continue;
        }

        return Ok(Some(Frame {
            line: line.freeze(),
        }));
    }
}

fn pending_line_len(src: &BytesMut) -> usize {
    match src.last() {
        Some(b'\r') => src.len() - 1,
        _ => src.len(),
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Configuration for the line codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum line length in bytes, excluding the delimiter. Default: 1 MiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// `tokio_util` codec for newline-delimited frames.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_frame_size: usize,
    scanned: usize,
    discarded: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            max_frame_size: config.max_frame_size,
            scanned: 0,
            discarded: 0,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Bytes of unterminated trailing input dropped at end of stream.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, &mut self.scanned, self.max_frame_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        // A line without its delimiter can't be a complete message.
        if !is_blank(src) {
            warn!(
                bytes = src.len(),
                "discarding unterminated trailing line at end of input"
            );
            self.discarded += src.len();
        }
        src.clear();
        self.scanned = 0;
        Ok(None)
    }
}
