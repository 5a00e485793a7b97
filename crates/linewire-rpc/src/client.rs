use std::collections::{HashMap, HashSet};
#[cfg(unix)]
use std::path::Path;
use std::time::Duration;

use linewire_frame::{FrameConfig, FrameReader, FrameWriter};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::{debug, warn};

use crate::error::{ConnectorError, Result};
use crate::message::{Request, RequestId, Response};

/// Calling side of a line-delimited connection.
///
/// Ids are allocated from a counter. A response that arrives for another
/// outstanding id while waiting is kept until asked for; at most one is kept
/// per id. Responses for ids this client never sent, or already collected,
/// are dropped.
pub struct LineClient<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    next_id: u64,
    outstanding: HashSet<RequestId>,
    buffered: HashMap<RequestId, Response>,
}

impl<R, W> LineClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, FrameConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: FrameConfig) -> Self {
        Self {
            reader: FrameReader::with_config(reader, config),
            writer: FrameWriter::new(writer),
            next_id: 1,
            outstanding: HashSet::new(),
            buffered: HashMap::new(),
        }
    }

    /// Call `method` and wait for its response.
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Response> {
        let id = self.send(method, params).await?;
        self.response_for(&id).await
    }

    /// Like [`call`](Self::call), giving up after `timeout`.
    pub async fn call_with_timeout(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Response> {
        tokio::time::timeout(timeout, self.call(method, params))
            .await
            .map_err(|_| ConnectorError::Timeout(timeout))?
    }

    /// Write one request without waiting for its response.
    pub async fn send(&mut self, method: &str, params: Value) -> Result<RequestId> {
        let id = RequestId::from(self.next_id);
        self.next_id += 1;

        let request = Request::new(id.clone(), method, params);
        let line = serde_json::to_vec(&request)?;
        self.writer.send(&line).await?;
        self.outstanding.insert(id.clone());
        debug!(%id, method, "request sent");
        Ok(id)
    }

    /// Wait for the response to `id`.
    ///
    /// An error response with a null id also ends the wait: the connector
    /// could not attribute it, and it most likely answers this request.
    pub async fn response_for(&mut self, id: &RequestId) -> Result<Response> {
        let response = self.wait_for(id).await;
        self.outstanding.remove(id);
        response
    }

    /// Responses held for ids not yet asked for.
    pub fn buffered(&self) -> usize {
        self.buffered.len()
    }

    async fn wait_for(&mut self, id: &RequestId) -> Result<Response> {
        if let Some(response) = self.buffered.remove(id) {
            return Ok(response);
        }

        loop {
            let Some(frame) = self.reader.read_frame().await? else {
                return Err(ConnectorError::Disconnected(id.to_string()));
            };
            let response: Response = serde_json::from_slice(frame.as_bytes()).map_err(|_| {
                ConnectorError::UnexpectedResponse(
                    String::from_utf8_lossy(frame.as_bytes()).into_owned(),
                )
            })?;

            if &response.id == id || (response.id.is_null() && !response.is_success()) {
                return Ok(response);
            }
            let expected = self.outstanding.contains(&response.id);
            if !expected || self.buffered.contains_key(&response.id) {
                warn!(id = %response.id, "dropping unexpected response");
                continue;
            }
            debug!(id = %response.id, waiting_for = %id, "buffering response");
            self.buffered.insert(response.id.clone(), response);
        }
    }

    /// Shut down the write side, signalling end of input to the connector.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

impl<S> LineClient<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite,
{
    /// Client over one duplex stream.
    pub fn from_stream(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

#[cfg(unix)]
impl LineClient<tokio::net::unix::OwnedReadHalf, tokio::net::unix::OwnedWriteHalf> {
    /// Connect to a connector listening on a Unix socket.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let stream = linewire_transport::UnixDomainSocket::connect(path).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }
}
