use anyhow::{anyhow, Result};
use cellfit_core::v1;
use serde_json::Value;

/// Runs a JSON request through the `v1` surface and returns the JSON response.
/// Requests with `"debug": true` trace to the sink named by `CELLFIT_TRACE_SINK`.
pub fn resize_json(request: Value) -> Result<Value> {
    let request: v1::ResizeRequest = serde_json::from_value(request)?;
    let response = cellfit_telemetry::resize_v1(request)
        .map_err(|info| anyhow!("{:?}: {}", info.code, info.message))?;
    Ok(serde_json::to_value(response)?)
}
