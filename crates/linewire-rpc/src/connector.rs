use std::sync::Arc;

use linewire_frame::{FrameError, FrameReader};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConnectorConfig;
use crate::decoder::{decode, Decoded};
use crate::dispatcher::{Dispatcher, DrainOutcome};
use crate::error::{ConnectorError, Result};
use crate::handler::HandlerRegistry;
use crate::message::{ErrorObject, RequestId, Response};
use crate::responder::spawn_writer;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Input ended and every pending handler was answered.
    Drained,
    /// Input ended but the shutdown timeout cut the drain short.
    ShutdownTimeout { abandoned: usize },
    /// The session was cancelled; pending handlers were aborted unanswered.
    Cancelled { abandoned: usize },
}

impl From<DrainOutcome> for SessionEnd {
    fn from(outcome: DrainOutcome) -> Self {
        match outcome {
            DrainOutcome::Drained => Self::Drained,
            DrainOutcome::TimedOut { abandoned } => Self::ShutdownTimeout { abandoned },
        }
    }
}

/// Counters for one finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Non-blank input lines read.
    pub frames: u64,
    /// Frames that decoded into requests.
    pub requests: u64,
    /// Frames answered by the decoder (parse or shape errors).
    pub rejected: u64,
    /// Response lines written.
    pub responses: u64,
    /// Bytes of unterminated trailing input dropped at end of stream.
    pub discarded_bytes: usize,
    pub end: SessionEnd,
}

#[derive(Debug, Default)]
struct Counts {
    frames: u64,
    requests: u64,
    rejected: u64,
}

/// Why the read loop stopped.
enum Stop {
    EndOfInput,
    Cancelled,
    TooLarge { size: usize, max: usize },
    Failed(ConnectorError),
}

/// Runs connector sessions: lines in, one response line out per request.
///
/// A connector is cheap to share; every call to one of the `serve` methods
/// is an independent session with its own reader, dispatcher and writer.
pub struct Connector {
    registry: Arc<HandlerRegistry>,
    config: ConnectorConfig,
    #[cfg(feature = "schema")]
    schemas: Option<Arc<linewire_schema::SchemaRegistry>>,
}

impl Connector {
    pub fn new(registry: Arc<HandlerRegistry>, config: ConnectorConfig) -> Self {
        Self {
            registry,
            config,
            #[cfg(feature = "schema")]
            schemas: None,
        }
    }

    /// Validate request params against per-method schemas.
    #[cfg(feature = "schema")]
    pub fn with_schemas(mut self, schemas: Arc<linewire_schema::SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Serve one session until the input ends.
    pub async fn serve<R, W>(&self, input: R, output: W) -> Result<SessionSummary>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.serve_with_cancel(input, output, CancellationToken::new())
            .await
    }

    /// Serve a duplex stream, splitting it into read and write halves.
    pub async fn serve_stream<S>(&self, stream: S) -> Result<SessionSummary>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.serve_stream_with_cancel(stream, CancellationToken::new())
            .await
    }

    pub async fn serve_stream_with_cancel<S>(
        &self,
        stream: S,
        cancel: CancellationToken,
    ) -> Result<SessionSummary>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (input, output) = tokio::io::split(stream);
        self.serve_with_cancel(input, output, cancel).await
    }

    /// Serve one session until the input ends or `cancel` fires.
    ///
    /// End of input drains pending handlers and flushes their responses,
    /// both bounded by the shutdown timeout if one is set. Cancellation, at
    /// any point, aborts pending handlers and stops the writer: nothing more
    /// is written, even if the output has stopped accepting bytes.
    ///
    /// An input line over the frame ceiling is answered with a
    /// `FrameTooLarge` error line, pending handlers are drained, and the
    /// session fails with [`FrameError::FrameTooLarge`].
    pub async fn serve_with_cancel<R, W>(
        &self,
        input: R,
        output: W,
        cancel: CancellationToken,
    ) -> Result<SessionSummary>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut frames = FrameReader::with_config(input, self.config.frame_config());
        let writer_stop = cancel.child_token();
        let (responses, writer) = spawn_writer(
            output,
            self.config.effective_write_queue_capacity(),
            writer_stop.clone(),
        );
        let mut dispatcher = self.dispatcher(responses);
        let mut counts = Counts::default();

        debug!(
            max_frame_size = self.config.max_frame_size,
            max_in_flight = self.config.effective_max_in_flight(),
            "session started"
        );

        let stop = self
            .read_requests(&mut frames, &mut dispatcher, &mut counts, &cancel)
            .await;
        let deadline = self
            .config
            .shutdown_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);
        if matches!(stop, Stop::Failed(_)) {
            writer_stop.cancel();
        }
        let outcome = self.finish(stop, &mut dispatcher, &cancel).await;

        let discarded_bytes = frames.discarded_bytes();
        drop(frames);
        // Closing the queue lets the writer flush what is left and exit.
        drop(dispatcher);
        let written = join_writer(writer, &writer_stop, deadline).await?;

        let end = match outcome {
            // The writer's own error says why it closed.
            Err(ConnectorError::WriterClosed) => {
                return Err(written.err().unwrap_or(ConnectorError::WriterClosed))
            }
            other => other?,
        };
        let summary = SessionSummary {
            frames: counts.frames,
            requests: counts.requests,
            rejected: counts.rejected,
            responses: written?,
            discarded_bytes,
            end,
        };
        info!(
            frames = summary.frames,
            requests = summary.requests,
            rejected = summary.rejected,
            responses = summary.responses,
            end = ?summary.end,
            "session finished"
        );
        Ok(summary)
    }

    fn dispatcher(&self, responses: mpsc::Sender<Response>) -> Dispatcher {
        let dispatcher = Dispatcher::new(Arc::clone(&self.registry), responses);
        #[cfg(feature = "schema")]
        let dispatcher = match &self.schemas {
            Some(schemas) => dispatcher.with_schemas(Arc::clone(schemas)),
            None => dispatcher,
        };
        dispatcher
    }

    async fn read_requests<R>(
        &self,
        frames: &mut FrameReader<R>,
        dispatcher: &mut Dispatcher,
        counts: &mut Counts,
        cancel: &CancellationToken,
    ) -> Stop
    where
        R: AsyncRead + Unpin,
    {
        let max_in_flight = self.config.effective_max_in_flight();
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Stop::Cancelled,

                Some(response) = dispatcher.next_completion(), if dispatcher.in_flight() > 0 => {
                    // A full writer queue must not hide a cancel.
                    match cancel.run_until_cancelled(dispatcher.forward(response)).await {
                        None => return Stop::Cancelled,
                        Some(Err(err)) => return Stop::Failed(err),
                        Some(Ok(())) => {}
                    }
                }

                // Reading pauses while the in-flight table is full.
                frame = frames.read_frame(), if dispatcher.in_flight() < max_in_flight => {
                    let frame = match frame {
                        Ok(Some(frame)) => frame,
                        Ok(None) => return Stop::EndOfInput,
                        Err(FrameError::FrameTooLarge { size, max }) => {
                            return Stop::TooLarge { size, max }
                        }
                        Err(err) => return Stop::Failed(err.into()),
                    };
                    counts.frames += 1;

                    let step = match decode(&frame, self.config.diagnostic_frame_limit) {
                        Decoded::Request(request) => {
                            counts.requests += 1;
                            cancel.run_until_cancelled(dispatcher.dispatch(request)).await
                        }
                        Decoded::Rejected(response) => {
                            counts.rejected += 1;
                            debug!(kind = ?response.error_kind(), "frame rejected");
                            cancel.run_until_cancelled(dispatcher.reject(response)).await
                        }
                    };
                    match step {
                        None => return Stop::Cancelled,
                        Some(Err(err)) => return Stop::Failed(err),
                        Some(Ok(())) => {}
                    }
                }
            }
        }
    }

    async fn finish(
        &self,
        stop: Stop,
        dispatcher: &mut Dispatcher,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd> {
        let timeout = self.config.shutdown_timeout;
        match stop {
            Stop::EndOfInput => {
                debug!(in_flight = dispatcher.in_flight(), "end of input; draining");
                match cancel.run_until_cancelled(dispatcher.drain(timeout)).await {
                    Some(outcome) => Ok(outcome?.into()),
                    None => Ok(cancelled(dispatcher)),
                }
            }
            Stop::Cancelled => Ok(cancelled(dispatcher)),
            Stop::TooLarge { size, max } => {
                warn!(size, max, "input line exceeds frame ceiling; closing session");
                let error = ErrorObject::frame_too_large(size, max);
                let answered = cancel
                    .run_until_cancelled(async {
                        dispatcher
                            .forward(Response::failure(RequestId::Null, error))
                            .await?;
                        dispatcher.drain(timeout).await
                    })
                    .await;
                match answered {
                    Some(outcome) => {
                        outcome?;
                    }
                    None => {
                        cancelled(dispatcher);
                    }
                }
                Err(FrameError::FrameTooLarge { size, max }.into())
            }
            Stop::Failed(err) => {
                dispatcher.abort_all();
                Err(err)
            }
        }
    }
}

fn cancelled(dispatcher: &mut Dispatcher) -> SessionEnd {
    let abandoned = dispatcher.abort_all();
    info!(abandoned, "session cancelled");
    SessionEnd::Cancelled { abandoned }
}

/// Wait for the writer, stopping it once `deadline` passes.
async fn join_writer(
    mut writer: JoinHandle<Result<u64>>,
    stop: &CancellationToken,
    deadline: Option<tokio::time::Instant>,
) -> Result<Result<u64>> {
    if let Some(deadline) = deadline {
        if let Ok(joined) = tokio::time::timeout_at(deadline, &mut writer).await {
            return Ok(joined?);
        }
        warn!("shutdown timeout elapsed before queued responses were written");
        stop.cancel();
    }
    Ok(writer.await?)
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
