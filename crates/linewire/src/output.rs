use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use linewire_rpc::Response;
use serde_json::Value;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One compact JSON line, exactly as it came off the wire.
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_response(response: &Response, format: OutputFormat) {
    println!("{}", render_response(response, format));
}

pub fn render_response(response: &Response, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string(response).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Pretty => {
            serde_json::to_string_pretty(response).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let (status, body) = match &response.error {
                None => (
                    "ok".to_string(),
                    preview(response.result.as_ref().unwrap_or(&Value::Null)),
                ),
                Some(error) => (
                    format!("{} ({})", error.kind, error.code),
                    error.message.clone(),
                ),
            };
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "STATUS", "BODY"])
                .add_row(vec![response.id.to_string(), status, body]);
            table.to_string()
        }
    }
}

fn preview(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
