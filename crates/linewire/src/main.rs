mod cmd;
mod exit;
mod handlers;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "linewire",
    version,
    about = "Line-delimited JSON-RPC connector over stdio and Unix sockets"
)]
struct Cli {
    /// Output format for commands that print results.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn parses_serve_with_connector_flags() {
        let cli = Cli::try_parse_from([
            "linewire",
            "serve",
            "--max-frame-size",
            "4096",
            "--max-in-flight",
            "8",
            "--shutdown-timeout",
            "250ms",
        ])
        .expect("serve args should parse");

        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.connector.max_frame_size, 4096);
        assert_eq!(args.connector.max_in_flight, 8);
        assert_eq!(args.connector.shutdown_timeout.as_deref(), Some("250ms"));
    }

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "linewire",
            "send",
            "/tmp/test.sock",
            "--method",
            "echo",
            "--params",
            "{\"x\":1}",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.path, Path::new("/tmp/test.sock"));
        assert_eq!(args.method, "echo");
        assert_eq!(args.params.as_deref(), Some("{\"x\":1}"));
    }

    #[test]
    fn send_requires_method() {
        let err = Cli::try_parse_from(["linewire", "send", "/tmp/test.sock"])
            .expect_err("missing --method should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn strict_schemas_needs_a_schema_dir() {
        let err = Cli::try_parse_from(["linewire", "serve", "--strict-schemas"])
            .expect_err("--strict-schemas alone should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_listen_with_count() {
        let cli = Cli::try_parse_from(["linewire", "listen", "/tmp/l.sock", "--count", "2"])
            .expect("listen args should parse");
        let Command::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(args.count, Some(2));
    }
}
