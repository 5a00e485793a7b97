use std::path::Path;
use std::sync::Arc;

use linewire_transport::UnixDomainSocket;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::connector::Connector;
use crate::error::Result;

/// Serves a connector on a Unix domain socket, one session per connection.
///
/// Sessions share the connector's handler registry but are otherwise
/// independent: each has its own reader, in-flight table and writer.
pub struct ConnectorListener {
    socket: UnixDomainSocket,
    connector: Arc<Connector>,
    max_connections: Option<u64>,
}

impl ConnectorListener {
    /// Bind to a Unix domain socket path.
    pub fn bind(path: impl AsRef<Path>, connector: Arc<Connector>) -> Result<Self> {
        let socket = UnixDomainSocket::bind(path)?;
        Ok(Self {
            socket,
            connector,
            max_connections: None,
        })
    }

    /// Stop accepting after `max` connections; `serve` returns once they end.
    pub fn with_max_connections(mut self, max: u64) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    /// Accept connections until `cancel` fires.
    ///
    /// On cancel the listener stops accepting and cancels every live
    /// session, which aborts its pending handlers and stops writing. Returns the
    /// number of connections accepted.
    pub async fn serve(&self, cancel: CancellationToken) -> Result<u64> {
        let mut sessions = JoinSet::new();
        let mut accepted = 0_u64;

        loop {
            let accepting = self.max_connections.is_none_or(|max| accepted < max);
            if !accepting && sessions.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(err) = joined {
                        error!(%err, "session task failed");
                    }
                }

                stream = self.socket.accept(), if accepting => {
                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(err) => {
                            warn!(%err, "accept failed");
                            continue;
                        }
                    };
                    accepted += 1;

                    let connector = Arc::clone(&self.connector);
                    let token = cancel.child_token();
                    let span = info_span!("connection", id = %format!("conn-{accepted}"));
                    sessions.spawn(
                        async move {
                            let (input, output) = stream.into_split();
                            match connector.serve_with_cancel(input, output, token).await {
                                Ok(summary) => info!(end = ?summary.end, "connection closed"),
                                Err(err) => warn!(%err, "connection failed"),
                            }
                        }
                        .instrument(span),
                    );
                }
            }
        }

        info!(live = sessions.len(), "listener stopping");
        while let Some(joined) = sessions.join_next().await {
            if let Err(err) = joined {
                error!(%err, "session task failed");
            }
        }
        Ok(accepted)
    }
}
