//! Line-delimited JSON-RPC connector runtime.
//!
//! linewire turns any duplex byte stream (stdin/stdout, a Unix socket, an
//! in-memory pipe) into a sequence of JSON requests, runs a handler for each
//! concurrently, and writes exactly one JSON response line per request.
//!
//! # Crate Structure
//!
//! - [`transport`]: duplex stream adapters (stdio, Unix domain sockets)
//! - [`frame`]: newline framing with a frame size ceiling
//! - [`rpc`]: request decoding, dispatch, response writing, sessions
//! - [`schema`]: optional per-method params validation (behind `schema` feature)

/// Re-export transport types.
pub mod transport {
    pub use linewire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use linewire_frame::*;
}

/// Re-export connector types.
pub mod rpc {
    pub use linewire_rpc::*;
}

/// Re-export schema types (requires `schema` feature).
#[cfg(feature = "schema")]
pub mod schema {
    pub use linewire_schema::*;
}

pub use linewire_rpc::{
    Connector, ConnectorConfig, ConnectorError, HandlerFailure, HandlerRegistry, Request,
    RequestId, Response,
};
