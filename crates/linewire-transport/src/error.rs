use std::path::PathBuf;

/// Errors raised while opening or using a connector's byte stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be created at `path`.
    #[error("cannot listen on {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No connector could be reached at `path`.
    #[error("cannot reach connector at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(std::io::Error),

    /// Read or write failure on an established stream.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `sun_path` cannot hold this path.
    #[error("socket path is {len} bytes, limit is {max}: {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
