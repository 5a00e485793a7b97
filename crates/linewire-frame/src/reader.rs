use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::{Frame, FrameConfig, LineCodec};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads complete frames from any `AsyncRead` stream.
///
/// Handles partial reads internally; callers always get complete, non-blank
/// lines, whatever chunk sizes the underlying stream delivers. The frame
/// sequence is lazy and ends once the stream reaches end of input.
pub struct FrameReader<R> {
    inner: FramedRead<R, LineCodec>,
    config: FrameConfig,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: R, config: FrameConfig) -> Self {
        let codec = LineCodec::with_config(&config);
        Self {
            inner: FramedRead::with_capacity(inner, codec, INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Ok(None)` once the stream is exhausted. Cancel-safe: a frame
    /// is never lost if this future is dropped before completing.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        std::future::poll_fn(|cx| Pin::new(&mut self.inner).poll_next(cx))
            .await
            .transpose()
    }

    /// Bytes of unterminated trailing input dropped at end of stream.
    pub fn discarded_bytes(&self) -> usize {
        self.inner.decoder().discarded()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }

    /// Consume the reader and return the inner stream. Buffered bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<R: AsyncRead + Unpin> Stream for FrameReader<R> {
    type Item = Result<Frame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
