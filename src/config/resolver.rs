//! Derives a [`TransportConfig`] from a descriptor and named overrides.
//!
//! Resolution performs no I/O. A missing proxy location fails immediately
//! so no session is ever dialed without a proxy.
//!
//! # Override Keys
//!
//! | Key | Type | Default |
//! |-----|------|---------|
//! | `NEON_WS_PROXY_HOST` | `host[:port][/path]` | required |
//! | `NEON_WS_SECURE` | bool | `true` |
//! | `NEON_WS_PIPELINE_TLS` | bool | `false` |
//! | `NEON_WS_PIPELINE_CONNECT` | bool | `false` |
//! | `NEON_WS_APPEND_ADDRESS` | bool | `false` |
//! | `NEON_WS_CONNECT_TIMEOUT_MS` | u64 | `10000` |
//! | `NEON_WS_LOG_TRAFFIC` | bool | `false` |

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

use super::descriptor::ConnectionDescriptor;
use super::options::TransportConfig;

// ============================================================================
// Keys
// ============================================================================

/// Proxy location. Required.
pub const PROXY_HOST_KEY: &str = "NEON_WS_PROXY_HOST";

/// Use `wss` instead of `ws`.
pub const SECURE_KEY: &str = "NEON_WS_SECURE";

/// Allow pipelined TLS negotiation.
pub const PIPELINE_TLS_KEY: &str = "NEON_WS_PIPELINE_TLS";

/// Allow pipelined connection startup.
pub const PIPELINE_CONNECT_KEY: &str = "NEON_WS_PIPELINE_CONNECT";

/// Forward the target address as a query parameter.
pub const APPEND_ADDRESS_KEY: &str = "NEON_WS_APPEND_ADDRESS";

/// Handshake timeout in milliseconds.
pub const CONNECT_TIMEOUT_KEY: &str = "NEON_WS_CONNECT_TIMEOUT_MS";

/// Log frames at trace level.
pub const LOG_TRAFFIC_KEY: &str = "NEON_WS_LOG_TRAFFIC";

// ============================================================================
// OverrideSource
// ============================================================================

/// A source of named string overrides.
pub trait OverrideSource {
    /// Returns the value for `key`, or `None` if unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads overrides from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvOverrides;

impl OverrideSource for EnvOverrides {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<S: BuildHasher> OverrideSource for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl<T: OverrideSource + ?Sized> OverrideSource for &T {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolves the transport config for `descriptor`.
///
/// # Errors
///
/// - [`Error::MissingConfiguration`] if `NEON_WS_PROXY_HOST` is unset or blank
/// - [`Error::Config`] if any override cannot be parsed
/// - [`Error::InvalidDescriptor`] if the descriptor host is directly dialable
///   while the endpoint does not forward the target address
pub fn resolve(
    descriptor: &ConnectionDescriptor,
    overrides: &impl OverrideSource,
) -> Result<TransportConfig> {
    let proxy_host = overrides
        .get(PROXY_HOST_KEY)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::missing_configuration(PROXY_HOST_KEY))?;

    let mut config = TransportConfig::new(proxy_host)?
        .with_encrypted_transport(read_bool(overrides, SECURE_KEY, true)?)
        .with_protocol_pipelining(read_bool(overrides, PIPELINE_TLS_KEY, false)?)
        .with_connect_pipelining(read_bool(overrides, PIPELINE_CONNECT_KEY, false)?)
        .with_append_address(read_bool(overrides, APPEND_ADDRESS_KEY, false)?)
        .with_log_traffic(read_bool(overrides, LOG_TRAFFIC_KEY, false)?);

    if let Some(ms) = read_u64(overrides, CONNECT_TIMEOUT_KEY)? {
        if ms == 0 {
            return Err(Error::config(format!("{CONNECT_TIMEOUT_KEY} must be > 0")));
        }
        config = config.with_connect_timeout(Duration::from_millis(ms));
    }

    // The placeholder host is never dialed in fixed-endpoint mode, so a real
    // address there means the descriptor was written for direct TCP.
    if !config.append_address() && descriptor.has_dialable_host() {
        return Err(Error::invalid_descriptor(format!(
            "host '{}' is a directly dialable address; proxy mode expects a placeholder host \
             (or set {APPEND_ADDRESS_KEY}=true to forward it to the proxy)",
            descriptor.host
        )));
    }

    debug!(
        proxy = %config.proxy_host(),
        scheme = config.scheme(),
        pipeline_tls = config.use_protocol_pipelining(),
        pipeline_connect = config.use_connect_pipelining(),
        append_address = config.append_address(),
        "Transport config resolved"
    );

    Ok(config)
}

/// Parses a boolean override.
fn read_bool(overrides: &impl OverrideSource, key: &str, default: bool) -> Result<bool> {
    let Some(raw) = overrides.get(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("{key}='{raw}' is not a boolean"))),
    }
}

/// Parses an unsigned integer override.
fn read_u64(overrides: &impl OverrideSource, key: &str) -> Result<Option<u64>> {
    overrides
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| Error::config(format!("{key}='{raw}' is not a number: {e}")))
        })
        .transpose()
}

// ============================================================================
// Tests
// ============================================================================
