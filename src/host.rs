//! Construction of the HTTP client shared by network transports
//!
//! Transports never build their own `reqwest::Client`; the host builds one
//! here from [`HttpClientConfig`] and lends a clone to every session.
//! Request timeouts are applied per request by the transports, not here.

use reqwest::Client;

use crate::config::HttpClientConfig;
use crate::error::{McpBenchError, Result};

/// Build the shared HTTP client.
///
/// # Errors
///
/// Returns [`McpBenchError::Config`] if the TLS backend cannot be
/// initialised.
///
/// # Examples
///
/// ```
/// use mcpbench::config::HttpClientConfig;
/// use mcpbench::host::build_http_client;
///
/// let client = build_http_client(&HttpClientConfig::default());
/// assert!(client.is_ok());
/// ```
pub fn build_http_client(config: &HttpClientConfig) -> Result<Client> {
    let mut builder = Client::builder().user_agent(config.user_agent.clone());

    if !config.proxy_from_env {
        builder = builder.no_proxy();
    }
    if config.http1_only {
        builder = builder.http1_only();
    }
    if config.no_connection_reuse {
        builder = builder.pool_max_idle_per_host(0);
    }
    if config.accept_invalid_certs {
        tracing::warn!("TLS certificate verification disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    let client = builder
        .build()
        .map_err(|e| McpBenchError::Config(format!("Failed to create HTTP client: {}", e)))?;

    tracing::debug!(
        http1_only = config.http1_only,
        connection_reuse = !config.no_connection_reuse,
        "Initialized shared HTTP client"
    );
    Ok(client)
}
