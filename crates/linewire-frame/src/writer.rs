use std::io::ErrorKind;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::codec::{encode_frame, Frame};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `AsyncWrite` stream.
///
/// Each frame is encoded into one buffer and handed to the stream with a
/// single `write_all` followed by a flush, so as long as one writer owns the
/// stream, frames never interleave.
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
    frames_written: u64,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            frames_written: 0,
        }
    }

    /// Write a complete frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.as_bytes()).await
    }

    /// Encode `payload` as one line and write it out.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;

        self.inner.write_all(&self.buf).await.map_err(write_error)?;
        self.flush().await?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the underlying stream.
    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await.map_err(write_error)
    }

    /// Flush and shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await.map_err(write_error)
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn write_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::WriteZero | ErrorKind::BrokenPipe => FrameError::ConnectionClosed,
        _ => FrameError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::reader::FrameReader;

    #[tokio::test]
    async fn write_single_frame() {
        let mut writer = FrameWriter::new(Vec::<u8>::new());
        writer.send(b"{\"id\":\"1\"}").await.unwrap();

        assert_eq!(writer.frames_written(), 1);
        assert_eq!(writer.into_inner(), b"{\"id\":\"1\"}\n");
    }

    #[tokio::test]
    async fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Vec::<u8>::new());
        writer.send(b"one").await.unwrap();
        writer.write_frame(&Frame::new(&b"two"[..])).await.unwrap();
        writer.send(b"three").await.unwrap();

        assert_eq!(writer.get_ref().as_slice(), b"one\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn embedded_newline_rejected_without_writing() {
        let mut writer = FrameWriter::new(Vec::<u8>::new());
        let err = writer.send(b"half\nhalf").await.unwrap_err();

        assert!(matches!(err, FrameError::EmbeddedDelimiter(4)));
        assert!(writer.get_ref().is_empty());
        assert_eq!(writer.frames_written(), 0);
    }

    #[tokio::test]
    async fn roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer.send(b"{\"method\":\"ping\"}").await.unwrap();
        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.as_bytes(), b"{\"method\":\"ping\"}");
    }

    #[tokio::test]
    async fn shutdown_signals_end_of_input() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut writer = FrameWriter::new(client);
        writer.send(b"last").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"last\n");
    }

    #[tokio::test]
    async fn closed_peer_reports_connection_closed() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);

        let mut writer = FrameWriter::new(client);
        let err = writer.send(b"nobody listening").await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    struct ZeroWriter;

    impl AsyncWrite for ZeroWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(0))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn zero_length_write_reports_connection_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }
}
