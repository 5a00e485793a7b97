//! The single owner of a session's output stream.
//!
//! ```text
//! Dispatcher ─► mpsc::Sender<Response> (bounded) ─► writer task ─► FrameWriter ─► output
//! ```
//!
//! Only the writer task touches the output, and it writes each response as
//! one complete line, so concurrent completions never interleave bytes.

use linewire_frame::FrameWriter;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::Result;
use crate::message::Response;

/// Spawn the writer task for `output`.
///
/// The task runs until every sender is dropped, then shuts down the output
/// and resolves to the number of responses written. Responses already queued
/// when the senders go away are still written.
///
/// Cancelling `stop` ends the task at once, even in the middle of a write
/// to an output that no longer drains; queued responses are dropped and
/// the output is left as is.
pub fn spawn_writer<W>(
    output: W,
    capacity: usize,
    stop: CancellationToken,
) -> (mpsc::Sender<Response>, JoinHandle<Result<u64>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(write_responses(FrameWriter::new(output), rx, stop));
    (tx, task)
}

async fn write_responses<W>(
    mut writer: FrameWriter<W>,
    mut responses: mpsc::Receiver<Response>,
    stop: CancellationToken,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let response = tokio::select! {
            biased;
            _ = stop.cancelled() => return Ok(stopped(&writer)),
            response = responses.recv() => match response {
                Some(response) => response,
                None => break,
            },
        };

        let line = serde_json::to_vec(&response)?;
        tokio::select! {
            biased;
            _ = stop.cancelled() => return Ok(stopped(&writer)),
            sent = writer.send(&line) => sent?,
        }
        trace!(id = %response.id, kind = ?response.error_kind(), "response written");
    }

    if let Err(err) = writer.shutdown().await {
        debug!(%err, "output shutdown failed");
    }
    Ok(writer.frames_written())
}

fn stopped<W>(writer: &FrameWriter<W>) -> u64
where
    W: AsyncWrite + Unpin,
{
    debug!(written = writer.frames_written(), "writer stopped");
    writer.frames_written()
}
