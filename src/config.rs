//! Ambient configuration: environment variables recognized by the SDK.
//!
//! Grounded on the teacher's `src/bin/server.rs`, which reads its connection
//! settings the same ad-hoc `std::env::var` + `dotenv` way, just without a
//! central struct. This module centralizes it into one `SdkConfig`,
//! validated at construction (Configuration errors are fatal at init per
//! the spec's error-handling design).

use std::env;

use crate::error::{Error, Result};

/// Connection & auth configuration recognized via `XIANS_*` environment
/// variables, plus a direct flow-engine override via `TEMPORAL_*` variables.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// `XIANS_SERVER_URL` — base URL of the agent server.
    pub server_url: String,
    /// `XIANS_API_KEY` — opaque API key, mutually exclusive with a
    /// certificate credential.
    pub api_key: Option<String>,
    /// `XIANS_AGENT_CERTIFICATE` — base64-encoded certificate credential.
    pub agent_certificate: Option<String>,

    /// `TEMPORAL_SERVER_URL` — direct flow-engine override.
    pub temporal_server_url: Option<String>,
    /// `TEMPORAL_NAMESPACE` — direct flow-engine override.
    pub temporal_namespace: Option<String>,
    /// `TEMPORAL_CERT_BASE64` / `TEMPORAL_KEY_BASE64` — mTLS credential
    /// override for connecting directly to the flow engine.
    pub temporal_cert_base64: Option<String>,
    pub temporal_key_base64: Option<String>,

    /// `CONSOLE_LOG_LEVEL`.
    pub console_log_level: String,
    /// `SERVER_LOG_LEVEL`, falling back to the legacy `API_LOG_LEVEL`.
    pub server_log_level: String,

    /// `RUN_INTEGRATION_TESTS` test toggle.
    pub run_integration_tests: bool,
    /// `USE_TEST_DATA` test toggle.
    pub use_test_data: bool,
}

impl SdkConfig {
    /// Load configuration from the process environment, applying `.env` via
    /// `dotenv` first (best-effort; a missing `.env` file is not an error).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();

        let server_url = env::var("XIANS_SERVER_URL")
            .map_err(|_| Error::configuration("XIANS_SERVER_URL is required"))?;
        if server_url.trim().is_empty() {
            return Err(Error::configuration("XIANS_SERVER_URL must not be empty"));
        }

        let api_key = env::var("XIANS_API_KEY").ok().filter(|s| !s.is_empty());
        let agent_certificate = env::var("XIANS_AGENT_CERTIFICATE")
            .ok()
            .filter(|s| !s.is_empty());

        if api_key.is_none() && agent_certificate.is_none() {
            return Err(Error::configuration(
                "one of XIANS_API_KEY or XIANS_AGENT_CERTIFICATE is required",
            ));
        }

        let server_log_level = env::var("SERVER_LOG_LEVEL")
            .or_else(|_| env::var("API_LOG_LEVEL"))
            .unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            server_url,
            api_key,
            agent_certificate,
            temporal_server_url: env::var("TEMPORAL_SERVER_URL").ok(),
            temporal_namespace: env::var("TEMPORAL_NAMESPACE").ok(),
            temporal_cert_base64: env::var("TEMPORAL_CERT_BASE64").ok(),
            temporal_key_base64: env::var("TEMPORAL_KEY_BASE64").ok(),
            console_log_level: env::var("CONSOLE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            server_log_level,
            run_integration_tests: env_flag("RUN_INTEGRATION_TESTS"),
            use_test_data: env_flag("USE_TEST_DATA"),
        })
    }

    /// Validate a flow-server URL override, as either `scheme://host[:port]`
    /// or bare `host:port`.
    pub fn validate_flow_server_url(value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(Error::configuration("flow server URL must not be empty"));
        }

        if value.contains("://") {
            url::Url::parse(value)
                .map(|_| ())
                .map_err(|e| Error::configuration(format!("invalid flow server URL: {}", e)))
        } else {
            // host:port form
            let mut parts = value.rsplitn(2, ':');
            let port = parts.next().unwrap_or_default();
            let host = parts.next().unwrap_or_default();
            if host.is_empty() || port.is_empty() || port.parse::<u16>().is_err() {
                return Err(Error::configuration(format!(
                    "invalid flow server URL '{}', expected scheme://host[:port] or host:port",
                    value
                )));
            }
            Ok(())
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_scheme_host_port() {
        assert!(SdkConfig::validate_flow_server_url("grpc://flow.example.com:7233").is_ok());
        assert!(SdkConfig::validate_flow_server_url("flow.example.com:7233").is_ok());
        assert!(SdkConfig::validate_flow_server_url("").is_err());
        assert!(SdkConfig::validate_flow_server_url("not a url").is_err());
        assert!(SdkConfig::validate_flow_server_url("host:notaport").is_err());
    }
}
