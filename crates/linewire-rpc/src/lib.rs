//! Line-delimited JSON-RPC connector runtime.
//!
//! Bytes come in through a [`FrameReader`](linewire_frame::FrameReader),
//! each line is decoded into a [`Request`], dispatched to a handler from a
//! [`HandlerRegistry`], and answered with exactly one [`Response`] line:
//!
//! ```text
//! input ─► frames ─► decode ─► Dispatcher ─► handler tasks
//!                                  │
//! output ◄─ writer task ◄─ bounded queue ◄─┘
//! ```
//!
//! Handlers run concurrently, so responses are written in completion order;
//! callers correlate them by `id`.

pub mod client;
pub mod config;
pub mod connector;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod handler;
#[cfg(unix)]
pub mod listener;
pub mod message;
pub mod responder;

pub use client::LineClient;
pub use config::{ConnectorConfig, DEFAULT_MAX_IN_FLIGHT, DEFAULT_WRITE_QUEUE_CAPACITY};
pub use connector::{Connector, SessionEnd, SessionSummary};
pub use decoder::{decode, Decoded, DEFAULT_DIAGNOSTIC_LIMIT};
pub use dispatcher::{Dispatcher, DrainOutcome, InFlight};
pub use error::{ConnectorError, Result};
pub use handler::{BoxFuture, Handler, HandlerFailure, HandlerRegistry, HandlerResult};
#[cfg(unix)]
pub use listener::ConnectorListener;
pub use message::{ErrorKind, ErrorObject, NumericId, Request, RequestId, Response};
pub use tokio_util::sync::CancellationToken;
