use tokio::io::{AsyncRead, AsyncWrite};

/// A connected duplex byte stream: requests are read from it and responses
/// written back to it.
///
/// Blanket-implemented for every owned `AsyncRead + AsyncWrite` value, so
/// sockets, pipes, [`tokio::io::DuplexStream`] and
/// [`StdioStream`](crate::StdioStream) all qualify.
pub trait Duplex: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Duplex for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased duplex, used where the transport is chosen at runtime.
pub type BoxedDuplex = Box<dyn Duplex>;

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    fn boxed<T: Duplex>(stream: T) -> BoxedDuplex {
        Box::new(stream)
    }

    #[tokio::test]
    async fn boxed_duplex_still_reads_and_writes() {
        let (left, right) = tokio::io::duplex(64);
        let mut left = boxed(left);
        let mut right = boxed(right);

        left.write_all(b"ping\n").await.unwrap();
        let mut buf = [0u8; 5];
        right.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\n");
    }
}
