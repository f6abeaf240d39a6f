/*!
Command handlers for the CLI

This module provides the handlers invoked by the CLI entrypoint:

- `probe` -- connect once, report what the server offers, disconnect
- `run`   -- drive a scenario across concurrent virtual users

Both build their clients through `mcp::Client::connect` and share the
HTTP client construction below.
*/

use crate::config::Config;
use crate::error::Result;
use crate::host::build_http_client;

pub mod probe;
pub mod run;

/// The shared HTTP client for network transports, or `None` for stdio.
pub(crate) fn http_client_for(config: &Config) -> Result<Option<reqwest::Client>> {
    if config.transport.is_network() {
        Ok(Some(build_http_client(&config.http)?))
    } else {
        Ok(None)
    }
}
