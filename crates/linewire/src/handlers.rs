//! Methods served by the `serve` and `listen` commands.

use std::time::Duration;

use linewire_rpc::{HandlerFailure, HandlerRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SleepParams {
    ms: u64,
}

#[derive(Debug, Serialize)]
struct Slept {
    slept_ms: u64,
}

/// `ping`, plus `echo` (answers with its params) and `sleep`
/// (`{"ms":N}`, answers `{"slept_ms":N}` after N milliseconds).
pub fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::with_builtins();
    registry.register("echo", |params: Value| async move {
        Ok::<_, HandlerFailure>(params)
    });
    registry.register_typed("sleep", |params: SleepParams| async move {
        tokio::time::sleep(Duration::from_millis(params.ms)).await;
        Ok::<_, HandlerFailure>(Slept {
            slept_ms: params.ms,
        })
    });
    registry
}
