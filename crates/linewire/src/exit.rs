use std::fmt;
use std::io;

use linewire_frame::FrameError;
use linewire_rpc::ConnectorError;
use linewire_schema::SchemaError;
use linewire_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
/// Bad input data, including an input line over the frame ceiling.
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotFound
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::FrameTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    match err {
        SchemaError::LoadFailed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn connector_error(context: &str, err: ConnectorError) -> CliError {
    match err {
        ConnectorError::Transport(err) => transport_error(context, err),
        ConnectorError::Frame(err) => frame_error(context, err),
        ConnectorError::Io(err) => io_error(context, err),
        ConnectorError::Json(_) | ConnectorError::UnexpectedResponse(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ConnectorError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ConnectorError::WriterClosed | ConnectorError::Disconnected(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn oversized_line_is_data_invalid() {
        let err = ConnectorError::Frame(FrameError::FrameTooLarge { size: 9, max: 8 });
        assert_eq!(connector_error("serve", err).code, DATA_INVALID);
    }

    #[test]
    fn transport_io_errors_keep_their_kind() {
        let err = TransportError::Connect {
            path: "/tmp/none.sock".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(
            connector_error("connect", ConnectorError::Transport(err)).code,
            PERMISSION_DENIED
        );
    }

    #[test]
    fn call_timeout_maps_to_timeout() {
        let err = connector_error("send", ConnectorError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("send: "));
    }

    #[test]
    fn schema_errors() {
        assert_eq!(
            schema_error("schemas", SchemaError::LoadFailed("gone".into())).code,
            FAILURE
        );
        assert_eq!(
            schema_error("schemas", SchemaError::CompileFailed("bad".into())).code,
            DATA_INVALID
        );
    }
}
