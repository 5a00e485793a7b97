use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use linewire_frame::DEFAULT_MAX_FRAME_SIZE;
use linewire_rpc::{
    CancellationToken, Connector, ConnectorConfig, DEFAULT_MAX_IN_FLIGHT,
    DEFAULT_WRITE_QUEUE_CAPACITY,
};
use linewire_schema::{RegistryConfig, SchemaRegistry};
use tracing::info;

use crate::exit::{io_error, schema_error, CliError, CliResult, INTERNAL, USAGE};
use crate::handlers;
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve requests from stdin, answering on stdout.
    Serve(ServeArgs),
    /// Serve every connection on a Unix socket.
    Listen(ListenArgs),
    /// Send one request to a listening connector and print the response.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Listen(args) => listen::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

/// Connector tuning shared by `serve` and `listen`.
#[derive(Args, Debug, Clone)]
pub struct ConnectorArgs {
    /// Largest accepted input line in bytes, excluding the newline.
    #[arg(long, env = "LINEWIRE_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
    /// Handlers allowed to run at once; reading pauses at the limit.
    #[arg(long, env = "LINEWIRE_MAX_IN_FLIGHT", default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    pub max_in_flight: usize,
    /// Responses buffered ahead of the output writer.
    #[arg(long, env = "LINEWIRE_WRITE_QUEUE", default_value_t = DEFAULT_WRITE_QUEUE_CAPACITY)]
    pub write_queue: usize,
    /// How long to wait for in-flight handlers after input ends (e.g. 5s, 500ms).
    /// Waits indefinitely when unset.
    #[arg(long, env = "LINEWIRE_SHUTDOWN_TIMEOUT", value_name = "DURATION")]
    pub shutdown_timeout: Option<String>,
    /// Directory of `<method>.schema.json` files validating request params.
    #[arg(long, value_name = "DIR")]
    pub schemas: Option<PathBuf>,
    /// Reject params properties that a schema does not declare.
    #[arg(long, requires = "schemas")]
    pub strict_schemas: bool,
}

impl ConnectorArgs {
    pub fn config(&self) -> CliResult<ConnectorConfig> {
        let shutdown_timeout = self
            .shutdown_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()?;
        Ok(ConnectorConfig {
            max_frame_size: self.max_frame_size,
            max_in_flight: self.max_in_flight,
            write_queue_capacity: self.write_queue,
            shutdown_timeout,
            ..ConnectorConfig::default()
        })
    }

    /// Connector over the demo handlers, with schemas when `--schemas` is set.
    pub fn connector(&self) -> CliResult<Connector> {
        let connector = Connector::new(Arc::new(handlers::registry()), self.config()?);
        let Some(dir) = &self.schemas else {
            return Ok(connector);
        };

        let config = RegistryConfig {
            strict_mode: self.strict_schemas,
            ..RegistryConfig::default()
        };
        let schemas = SchemaRegistry::from_directory_with_config(dir, config)
            .map_err(|err| schema_error(&format!("loading {}", dir.display()), err))?;
        info!(dir = %dir.display(), methods = ?schemas.methods(), "schemas loaded");
        Ok(connector.with_schemas(Arc::new(schemas)))
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub connector: ConnectorArgs,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after serving N connections.
    #[arg(long)]
    pub count: Option<u64>,
    #[command(flatten)]
    pub connector: ConnectorArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Method to call.
    #[arg(long, short = 'm')]
    pub method: String,
    /// JSON params.
    #[arg(long, short = 'p')]
    pub params: Option<String>,
    /// How long to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Run `future` to completion on a current-thread runtime.
///
/// The runtime is shut down in the background: a blocking stdin read can
/// outlive the session and must not hold up process exit.
pub fn block_on<F: Future>(future: F) -> CliResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

/// Token cancelled on SIGINT.
pub fn interrupt_token() -> CliResult<CancellationToken> {
    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    ctrlc::set_handler(move || {
        on_interrupt.cancel();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(token)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
