use linewire_rpc::{LineClient, Response};
use serde_json::Value;

use crate::cmd::{block_on, parse_duration, SendArgs};
use crate::exit::{connector_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let params = parse_params(args.params.as_deref())?;

    let response = block_on(async move {
        let mut client = LineClient::connect(&args.path).await?;
        let response = client
            .call_with_timeout(&args.method, params, timeout)
            .await?;
        client.close().await?;
        Ok::<Response, linewire_rpc::ConnectorError>(response)
    })?
    .map_err(|err| connector_error("call failed", err))?;

    print_response(&response, format);
    Ok(if response.is_success() { SUCCESS } else { FAILURE })
}

fn parse_params(params: Option<&str>) -> CliResult<Value> {
    match params {
        None => Ok(Value::Null),
        Some(text) => serde_json::from_str(text)
            .map_err(|err| CliError::new(USAGE, format!("--params is not valid JSON: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn params_default_to_null() {
        assert_eq!(parse_params(None).unwrap(), Value::Null);
    }

    #[test]
    fn params_parse_as_json() {
        assert_eq!(parse_params(Some(r#"{"ms": 10}"#)).unwrap(), json!({"ms": 10}));
        assert_eq!(parse_params(Some("[1,2]")).unwrap(), json!([1, 2]));
    }

    #[test]
    fn bad_params_are_usage_errors() {
        let err = parse_params(Some("{oops")).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("--params is not valid JSON"));
    }
}
