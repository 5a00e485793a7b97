//! Method handlers and the registry the dispatcher looks them up in.
//!
//! ```ignore
//! let mut registry = HandlerRegistry::with_builtins();
//! registry.register("echo", |params: Value| async move {
//!     Ok::<_, HandlerFailure>(params)
//! });
//! registry.register_typed("add", |(a, b): (i64, i64)| async move {
//!     Ok::<_, HandlerFailure>(a + b)
//! });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::message::{ErrorKind, ErrorObject};

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for handler functions.
pub type HandlerResult = Result<Value, HandlerFailure>;

/// Application-level failure reported by a handler.
///
/// Becomes a `HandlerError` response carrying `message` and `data`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerFailure {
    pub message: String,
    pub data: Option<Value>,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn into_error_object(self) -> ErrorObject {
        let error = ErrorObject::new(ErrorKind::HandlerError, self.message);
        match self.data {
            Some(data) => error.with_data(data),
            None => error,
        }
    }
}

impl From<serde_json::Error> for HandlerFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Business logic for one method.
pub trait Handler: Send + Sync + 'static {
    /// Handle one request's params.
    fn call(&self, params: Value) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, params: Value) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(params))
    }
}

/// Registry mapping method names to handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `ping` method, which answers `{"ok":true}`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("ping", |_params: Value| async {
            Ok::<_, HandlerFailure>(json!({ "ok": true }))
        });
        registry
    }

    /// Register a handler, replacing any previous one for `method`.
    pub fn register(&mut self, method: &str, handler: impl Handler) {
        if self
            .handlers
            .insert(method.to_string(), Arc::new(handler))
            .is_some()
        {
            debug!(method, "replaced handler");
        }
    }

    /// Register a handler with typed params and result.
    ///
    /// Params that don't deserialize into `T` fail the request with a
    /// `HandlerError` without calling the handler.
    pub fn register_typed<F, T, R, Fut>(&mut self, method: &str, handler: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        Fut: Future<Output = Result<R, HandlerFailure>> + Send + 'static,
    {
        self.register(method, move |params: Value| {
            let call = serde_json::from_value::<T>(params).map(&handler);
            async move {
                let output = call
                    .map_err(|err| HandlerFailure::new(format!("invalid params: {err}")))?
                    .await?;
                Ok::<_, HandlerFailure>(serde_json::to_value(output)?)
            }
        });
    }

    /// Register a synchronous, CPU-bound handler.
    ///
    /// Each call runs on tokio's blocking pool so it can't stall the session.
    pub fn register_blocking<F>(&mut self, method: &str, handler: F)
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register(method, move |params: Value| {
            let handler = Arc::clone(&handler);
            async move {
                match tokio::task::spawn_blocking(move || handler(params)).await {
                    Ok(result) => result,
                    Err(err) => Err(HandlerFailure::new(format!(
                        "blocking handler failed: {err}"
                    ))),
                }
            }
        });
    }

    /// Look up the handler for `method`.
    pub fn get(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}
