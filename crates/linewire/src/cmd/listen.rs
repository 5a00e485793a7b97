use std::sync::Arc;

use linewire_rpc::ConnectorListener;
use tracing::info;

use crate::cmd::{block_on, interrupt_token, ListenArgs};
use crate::exit::{connector_error, CliResult, SUCCESS};

pub fn run(args: ListenArgs) -> CliResult<i32> {
    let connector = Arc::new(args.connector.connector()?);
    let cancel = interrupt_token()?;

    let accepted = block_on(async move {
        let mut listener = ConnectorListener::bind(&args.path, connector)?;
        if let Some(count) = args.count {
            listener = listener.with_max_connections(count);
        }
        info!(path = %listener.path().display(), "listening");
        listener.serve(cancel).await
    })?
    .map_err(|err| connector_error("listener failed", err))?;

    info!(accepted, "listener stopped");
    Ok(SUCCESS)
}
