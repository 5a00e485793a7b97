use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{ConnectorError, Result};
use crate::handler::{Handler, HandlerRegistry};
use crate::message::{ErrorKind, ErrorObject, Request, RequestId, Response};

/// Bookkeeping for one running handler.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub id: RequestId,
    pub method: String,
    pub started: Instant,
}

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every pending handler finished and its response was forwarded.
    Drained,
    /// The deadline passed; this many handlers were abandoned.
    TimedOut { abandoned: usize },
}

/// Routes requests to handlers and collects their responses.
///
/// Handlers run concurrently as tasks in a [`JoinSet`]; responses are
/// forwarded to the writer in completion order. The in-flight table is keyed
/// by a per-session sequence number, so two requests sharing an id are two
/// independent entries.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    #[cfg(feature = "schema")]
    schemas: Option<Arc<linewire_schema::SchemaRegistry>>,
    tasks: JoinSet<(u64, Response)>,
    in_flight: HashMap<u64, InFlight>,
    responses: mpsc::Sender<Response>,
    next_seq: u64,
    forwarded: u64,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, responses: mpsc::Sender<Response>) -> Self {
        Self {
            registry,
            #[cfg(feature = "schema")]
            schemas: None,
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
            responses,
            next_seq: 0,
            forwarded: 0,
        }
    }

    /// Validate params against per-method schemas before invoking handlers.
    #[cfg(feature = "schema")]
    pub fn with_schemas(mut self, schemas: Arc<linewire_schema::SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Start handling `request`.
    ///
    /// Requests that can be answered immediately (unknown method, rejected
    /// params) are forwarded right away; everything else becomes an
    /// in-flight handler task.
    pub async fn dispatch(&mut self, request: Request) -> Result<()> {
        let Some(handler) = self.registry.get(&request.method) else {
            debug!(id = %request.id, method = %request.method, "method not found");
            let error = ErrorObject::method_not_found(&request.method);
            return self.forward(Response::failure(request.id, error)).await;
        };

        #[cfg(feature = "schema")]
        if let Some(schemas) = &self.schemas {
            if let Err(err) = schemas.validate(&request.method, &request.params) {
                debug!(id = %request.id, method = %request.method, %err, "params rejected");
                let error = ErrorObject::new(ErrorKind::InvalidParams, err.to_string());
                return self.forward(Response::failure(request.id, error)).await;
            }
        }

        self.spawn(handler, request);
        Ok(())
    }

    fn spawn(&mut self, handler: Arc<dyn Handler>, request: Request) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let Request { id, method, params } = request;
        debug!(seq, %id, %method, "handler started");
        self.in_flight.insert(
            seq,
            InFlight {
                id: id.clone(),
                method,
                started: Instant::now(),
            },
        );

        self.tasks.spawn(async move {
            // The call itself happens inside the guarded future, so a panic
            // before the first await is caught too.
            let outcome = AssertUnwindSafe(async move { handler.call(params).await })
                .catch_unwind()
                .await;
            let response = match outcome {
                Ok(Ok(result)) => Response::success(id, result),
                Ok(Err(failure)) => Response::failure(id, failure.into_error_object()),
                Err(panic) => Response::failure(
                    id,
                    ErrorObject::new(
                        ErrorKind::HandlerError,
                        format!("handler panicked: {}", panic_message(panic.as_ref())),
                    ),
                ),
            };
            (seq, response)
        });
    }

    /// Forward a response synthesized outside the dispatcher (decode failures).
    pub async fn reject(&mut self, response: Response) -> Result<()> {
        self.forward(response).await
    }

    /// Hand a response to the writer, waiting while its queue is full.
    pub async fn forward(&mut self, response: Response) -> Result<()> {
        self.responses
            .send(response)
            .await
            .map_err(|_| ConnectorError::WriterClosed)?;
        self.forwarded += 1;
        Ok(())
    }

    /// Wait for the next handler to finish and return its response.
    ///
    /// Returns `None` when nothing is in flight. Cancel-safe: nothing is
    /// lost if the future is dropped before it completes.
    pub async fn next_completion(&mut self) -> Option<Response> {
        loop {
            match self.tasks.join_next().await? {
                Ok((seq, response)) => {
                    if let Some(entry) = self.in_flight.remove(&seq) {
                        debug!(
                            seq,
                            id = %entry.id,
                            method = %entry.method,
                            elapsed_ms = entry.started.elapsed().as_millis() as u64,
                            ok = response.is_success(),
                            "handler finished"
                        );
                    }
                    return Some(response);
                }
                // Panics are caught inside the task, so only aborted tasks land here.
                Err(err) => debug!(%err, "handler task ended without a response"),
            }
        }
    }

    /// Wait for one handler and forward its response.
    ///
    /// Returns `false` if nothing was in flight.
    pub async fn complete_next(&mut self) -> Result<bool> {
        match self.next_completion().await {
            Some(response) => {
                self.forward(response).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forward responses for every pending handler.
    ///
    /// With a `timeout`, the whole drain is bounded by it, including time
    /// spent waiting for room in the writer queue. Handlers still running
    /// when it elapses are aborted and their responses are never written.
    pub async fn drain(&mut self, timeout: Option<Duration>) -> Result<DrainOutcome> {
        let Some(timeout) = timeout else {
            self.forward_all().await?;
            return Ok(DrainOutcome::Drained);
        };

        let deadline = tokio::time::Instant::now() + timeout;
        match tokio::time::timeout_at(deadline, self.forward_all()).await {
            Ok(forwarded) => forwarded.map(|()| DrainOutcome::Drained),
            Err(_) => {
                let abandoned = self.abort_all();
                warn!(
                    abandoned,
                    timeout_ms = timeout.as_millis() as u64,
                    "shutdown timeout elapsed; abandoning in-flight requests"
                );
                Ok(DrainOutcome::TimedOut { abandoned })
            }
        }
    }

    async fn forward_all(&mut self) -> Result<()> {
        while self.complete_next().await? {}
        Ok(())
    }

    /// Abort every pending handler without writing its result.
    ///
    /// Returns the number of requests abandoned.
    pub fn abort_all(&mut self) -> usize {
        let abandoned = self.in_flight.len();
        for (seq, entry) in self.in_flight.drain() {
            debug!(seq, id = %entry.id, method = %entry.method, "abandoning request");
        }
        // Dropping the set aborts its tasks; results that already finished go with it.
        self.tasks = JoinSet::new();
        abandoned
    }

    /// Number of handlers currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Snapshot of running requests.
    pub fn pending(&self) -> impl Iterator<Item = &InFlight> {
        self.in_flight.values()
    }

    /// Responses handed to the writer so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
