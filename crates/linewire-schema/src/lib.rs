//! Optional per-method JSON Schema validation of request params.
//!
//! A [`SchemaRegistry`] maps method names to compiled validators. The
//! dispatcher consults it before invoking a handler and answers violations
//! with an `InvalidParams` error instead of running the handler.

pub mod config;
pub mod error;
pub mod registry;
pub mod validator;

pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use registry::SchemaRegistry;
