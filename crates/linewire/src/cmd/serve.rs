use linewire_rpc::SessionEnd;
use linewire_transport::StdioStream;
use tracing::{info, info_span, Instrument};

use crate::cmd::{block_on, interrupt_token, ServeArgs};
use crate::exit::{connector_error, CliResult, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let connector = args.connector.connector()?;
    let cancel = interrupt_token()?;

    let summary = block_on(
        async move {
            let (input, output) = StdioStream::new().into_split();
            connector.serve_with_cancel(input, output, cancel).await
        }
        .instrument(info_span!("stdio")),
    )?
    .map_err(|err| connector_error("session failed", err))?;

    // A drain cut short by the shutdown timeout is already logged and still exits 0.
    if let SessionEnd::Cancelled { abandoned } = summary.end {
        info!(abandoned, "interrupted");
    }
    Ok(SUCCESS)
}
