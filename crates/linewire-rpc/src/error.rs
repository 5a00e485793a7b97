use std::time::Duration;

/// Errors that end a connector session or a client call.
///
/// Per-request failures never show up here; they travel back to the caller
/// as the `error` member of a response.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] linewire_transport::TransportError),

    /// Frame-level error, including an oversized input line.
    #[error("frame error: {0}")]
    Frame(#[from] linewire_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error outside the framing layer.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The response writer stopped before the session finished.
    #[error("response writer closed")]
    WriterClosed,

    /// A session or writer task failed to run to completion.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The peer closed the stream while a call was outstanding.
    #[error("peer disconnected before answering request {0}")]
    Disconnected(String),

    /// The peer sent a line that is not a response.
    #[error("unexpected line from peer: {0}")]
    UnexpectedResponse(String),

    /// Call timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl ConnectorError {
    /// True when the session ended because an input line exceeded the frame ceiling.
    pub fn is_frame_too_large(&self) -> bool {
        matches!(
            self,
            Self::Frame(linewire_frame::FrameError::FrameTooLarge { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;
