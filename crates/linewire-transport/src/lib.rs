//! Duplex byte stream adapters for the linewire connector.
//!
//! The connector core never assumes process-level stdio. It consumes any
//! value implementing [`Duplex`]; this crate supplies the two adapters the
//! CLI needs:
//! - [`StdioStream`]: stdin/stdout packaged as one owned duplex handle
//! - [`UnixDomainSocket`]: filesystem-path Unix socket listener (Linux/macOS)

pub mod error;
pub mod stdio;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use stdio::StdioStream;
pub use traits::{BoxedDuplex, Duplex};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
