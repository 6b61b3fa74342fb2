//! Resolved transport policy.
//!
//! A [`TransportConfig`] is built once, then shared read-only by every
//! session and pool created from it.
//!
//! # Example
//!
//! ```ignore
//! use pg_wsproxy::TransportConfig;
//!
//! let config = TransportConfig::new("localhost:8080")?
//!     .with_encrypted_transport(false);
//!
//! assert_eq!(config.endpoint_for("db.localtest.me", 5432), "ws://localhost:8080/v1");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Path the proxy accepts WebSocket upgrades on.
pub const PROXY_PATH: &str = "/v1";

/// Default WebSocket handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// InnerTls
// ============================================================================

/// Whether the wire-protocol layer may run TLS inside the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InnerTls {
    /// Plain WebSocket. No inner TLS handshake may be attempted.
    Disabled,
    /// Encrypted WebSocket. Inner TLS is allowed, each step its own round trip.
    Permitted,
    /// Encrypted WebSocket. Inner TLS may be pipelined with the first message.
    Pipelined,
}

// ============================================================================
// TransportConfig
// ============================================================================

/// Immutable transport policy consumed by sessions and pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Proxy location, `host[:port][/path]` without scheme.
    proxy_host: String,

    /// Dial `wss` instead of `ws`.
    use_encrypted_transport: bool,

    /// Allow TLS negotiation to be merged with the first protocol message.
    use_protocol_pipelining: bool,

    /// Allow startup and authentication messages to be sent without waiting.
    use_connect_pipelining: bool,

    /// Add `?address=host:port` so the proxy can pick its upstream.
    append_address: bool,

    /// Handshake timeout in milliseconds.
    connect_timeout_ms: u64,

    /// Log every frame at trace level.
    log_traffic: bool,
}

// ============================================================================
// Constructors
// ============================================================================

impl TransportConfig {
    /// Creates a config for the given proxy location with default policy.
    ///
    /// Defaults: encrypted transport on, both pipelining flags off,
    /// no address forwarding, 10s connect timeout, traffic logging off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the proxy location is empty, carries a
    /// scheme, contains whitespace or does not form a valid URL.
    pub fn new(proxy_host: impl Into<String>) -> Result<Self> {
        let proxy_host = proxy_host.into();
        validate_proxy_host(&proxy_host)?;

        Ok(Self {
            proxy_host,
            use_encrypted_transport: true,
            use_protocol_pipelining: false,
            use_connect_pipelining: false,
            append_address: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            log_traffic: false,
        })
    }
}

/// Checks that `{scheme}://{proxy_host}/v1` is a usable WebSocket URL.
fn validate_proxy_host(proxy_host: &str) -> Result<()> {
    if proxy_host.is_empty() {
        return Err(Error::config("proxy host is empty"));
    }
    if proxy_host.contains("://") {
        return Err(Error::config(format!(
            "proxy host '{proxy_host}' must not include a scheme"
        )));
    }
    if proxy_host.chars().any(char::is_whitespace) {
        return Err(Error::config(format!(
            "proxy host '{proxy_host}' contains whitespace"
        )));
    }

    let url = Url::parse(&format!("ws://{}{PROXY_PATH}", proxy_host.trim_end_matches('/')))
        .map_err(|e| Error::config(format!("proxy host '{proxy_host}' is invalid: {e}")))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::config(format!("proxy host '{proxy_host}' has no host")));
    }
    Ok(())
}

// ============================================================================
// Builder Methods
// ============================================================================

impl TransportConfig {
    /// Selects `wss` (true) or `ws` (false).
    #[inline]
    #[must_use]
    pub fn with_encrypted_transport(mut self, enabled: bool) -> Self {
        self.use_encrypted_transport = enabled;
        self
    }

    /// Allows TLS negotiation to be pipelined.
    #[inline]
    #[must_use]
    pub fn with_protocol_pipelining(mut self, enabled: bool) -> Self {
        self.use_protocol_pipelining = enabled;
        self
    }

    /// Allows connection startup to be pipelined.
    #[inline]
    #[must_use]
    pub fn with_connect_pipelining(mut self, enabled: bool) -> Self {
        self.use_connect_pipelining = enabled;
        self
    }

    /// Forwards the descriptor's `host:port` to the proxy as a query parameter.
    #[inline]
    #[must_use]
    pub fn with_append_address(mut self, enabled: bool) -> Self {
        self.append_address = enabled;
        self
    }

    /// Sets the WebSocket handshake timeout.
    ///
    /// Zero is clamped to one millisecond.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = (timeout.as_millis() as u64).max(1);
        self
    }

    /// Enables base64 frame logging at trace level.
    #[inline]
    #[must_use]
    pub fn with_log_traffic(mut self, enabled: bool) -> Self {
        self.log_traffic = enabled;
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl TransportConfig {
    /// Returns the proxy location.
    #[inline]
    #[must_use]
    pub fn proxy_host(&self) -> &str {
        &self.proxy_host
    }

    /// Returns the WebSocket scheme, `wss` or `ws`.
    #[inline]
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        if self.use_encrypted_transport {
            "wss"
        } else {
            "ws"
        }
    }

    /// Maps a target `(host, port)` to the proxy endpoint URL.
    ///
    /// Deterministic. The URL path is always `/v1`. Unless address
    /// forwarding is on, the target is not part of the URL at all.
    #[must_use]
    pub fn endpoint_for(&self, host: &str, port: u16) -> String {
        let base = format!(
            "{}://{}{PROXY_PATH}",
            self.scheme(),
            self.proxy_host.trim_end_matches('/')
        );
        if self.append_address {
            let address = format!("{host}:{port}");
            format!("{base}?address={}", urlencoding::encode(&address))
        } else {
            base
        }
    }

    /// Returns `true` if `wss` is used.
    #[inline]
    #[must_use]
    pub const fn use_encrypted_transport(&self) -> bool {
        self.use_encrypted_transport
    }

    /// Returns `true` if TLS negotiation may be pipelined.
    #[inline]
    #[must_use]
    pub const fn use_protocol_pipelining(&self) -> bool {
        self.use_protocol_pipelining
    }

    /// Returns `true` if connection startup may be pipelined.
    #[inline]
    #[must_use]
    pub const fn use_connect_pipelining(&self) -> bool {
        self.use_connect_pipelining
    }

    /// Returns `true` if the target address is forwarded to the proxy.
    #[inline]
    #[must_use]
    pub const fn append_address(&self) -> bool {
        self.append_address
    }

    /// Returns the WebSocket handshake timeout.
    #[inline]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns `true` if frames are logged.
    #[inline]
    #[must_use]
    pub const fn log_traffic(&self) -> bool {
        self.log_traffic
    }

    /// Returns the inner TLS policy for the wire-protocol layer.
    #[must_use]
    pub const fn inner_tls(&self) -> InnerTls {
        match (self.use_encrypted_transport, self.use_protocol_pipelining) {
            (false, _) => InnerTls::Disabled,
            (true, false) => InnerTls::Permitted,
            (true, true) => InnerTls::Pipelined,
        }
    }

    /// Returns `true` if stream writes may be merged into one frame per flush.
    ///
    /// With both pipelining flags off every write is its own frame.
    #[inline]
    #[must_use]
    pub const fn coalesces_writes(&self) -> bool {
        self.use_protocol_pipelining || self.use_connect_pipelining
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::new("proxy.example.com").expect("config");
        assert!(config.use_encrypted_transport());
        assert!(!config.use_protocol_pipelining());
        assert!(!config.use_connect_pipelining());
        assert!(!config.append_address());
        assert!(!config.log_traffic());
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.inner_tls(), InnerTls::Permitted);
        assert!(!config.coalesces_writes());
    }

    #[test]
    fn test_plain_endpoint() {
        let config = TransportConfig::new("localhost:8080")
            .expect("config")
            .with_encrypted_transport(false);
        assert_eq!(config.endpoint_for("db", 5432), "ws://localhost:8080/v1");
        assert_eq!(config.inner_tls(), InnerTls::Disabled);
    }

    #[test]
    fn test_encrypted_endpoint() {
        let config = TransportConfig::new("proxy.example.com").expect("config");
        assert_eq!(config.endpoint_for("db", 5432), "wss://proxy.example.com/v1");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = TransportConfig::new("proxy.example.com/").expect("config");
        assert_eq!(config.endpoint_for("db", 1), "wss://proxy.example.com/v1");
    }

    #[test]
    fn test_append_address() {
        let config = TransportConfig::new("localhost:8080")
            .expect("config")
            .with_encrypted_transport(false)
            .with_append_address(true);
        assert_eq!(
            config.endpoint_for("ep-1.neon.tech", 5432),
            "ws://localhost:8080/v1?address=ep-1.neon.tech%3A5432"
        );
        let url = Url::parse(&config.endpoint_for("ep-1.neon.tech", 5432)).expect("url");
        assert_eq!(url.path(), PROXY_PATH);
    }

    #[test]
    fn test_pipelined_tls() {
        let config = TransportConfig::new("p")
            .expect("config")
            .with_protocol_pipelining(true);
        assert_eq!(config.inner_tls(), InnerTls::Pipelined);
        assert!(config.coalesces_writes());

        let config = TransportConfig::new("p")
            .expect("config")
            .with_encrypted_transport(false)
            .with_protocol_pipelining(true);
        assert_eq!(config.inner_tls(), InnerTls::Disabled);
    }

    #[test]
    fn test_connect_pipelining_coalesces() {
        let config = TransportConfig::new("p")
            .expect("config")
            .with_connect_pipelining(true);
        assert!(config.coalesces_writes());
        assert_eq!(config.inner_tls(), InnerTls::Permitted);
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config = TransportConfig::new("p")
            .expect("config")
            .with_connect_timeout(Duration::ZERO);
        assert_eq!(config.connect_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_proxy_hosts() {
        for bad in ["", "ws://proxy", "proxy host", "proxy:notaport"] {
            let err = TransportConfig::new(bad).unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{bad:?}");
        }
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = TransportConfig::new("localhost:4444")
            .expect("config")
            .with_encrypted_transport(false)
            .with_log_traffic(true);
        let json = serde_json::to_string(&config).expect("serialize");
        let back: TransportConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }

    proptest! {
        #[test]
        fn prop_endpoint_deterministic_and_ends_in_v1(
            host in "[a-z][a-z0-9.-]{0,30}",
            port in any::<u16>(),
            secure in any::<bool>(),
        ) {
            let config = TransportConfig::new("proxy.local:4444")
                .expect("config")
                .with_encrypted_transport(secure);
            let first = config.endpoint_for(&host, port);
            let second = config.endpoint_for(&host, port);
            prop_assert_eq!(&first, &second);
            prop_assert!(first.ends_with("/v1"));
            let expected_scheme = if secure { "wss://" } else { "ws://" };
            prop_assert!(first.starts_with(expected_scheme));
        }

        #[test]
        fn prop_forwarded_endpoint_keeps_v1_path(
            host in "[a-z][a-z0-9.-]{0,30}",
            port in any::<u16>(),
        ) {
            let config = TransportConfig::new("proxy.local")
                .expect("config")
                .with_append_address(true);
            let endpoint = config.endpoint_for(&host, port);
            let url = Url::parse(&endpoint).expect("url");
            prop_assert_eq!(url.path(), "/v1");
            prop_assert_eq!(endpoint.clone(), config.endpoint_for(&host, port));
        }
    }
}
