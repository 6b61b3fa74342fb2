//! Error types for the WebSocket transport.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use pg_wsproxy::{ConnectionPool, Result};
//!
//! async fn example(pool: &ConnectionPool) -> Result<()> {
//!     let mut session = pool.acquire().await?;
//!     session.write(b"PING").await?;
//!     session.release();
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Kind | Variants |
//! |------|----------|
//! | MissingConfiguration | [`Error::MissingConfiguration`] |
//! | InvalidConfiguration | [`Error::Config`], [`Error::InvalidDescriptor`] |
//! | ConnectFailed | [`Error::ConnectFailed`], [`Error::ConnectionTimeout`] |
//! | TransportIo | [`Error::TransportIo`], [`Error::ConnectionClosed`] |
//! | Cancelled | [`Error::Cancelled`] |
//! | PoolClosed | [`Error::PoolClosed`] |
//! | AcquireFailed | [`Error::AcquireFailed`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::SessionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// ErrorKind
// ============================================================================

/// Coarse classification of an [`enum@Error`].
///
/// Callers decide on retries by kind; the transport and pool never retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required override was absent. No I/O was attempted.
    MissingConfiguration,
    /// An override or descriptor was present but unusable.
    InvalidConfiguration,
    /// The WebSocket handshake failed or timed out.
    ConnectFailed,
    /// Mid-stream read/write failure or unexpected closure.
    TransportIo,
    /// The caller aborted the operation.
    Cancelled,
    /// The pool has been shut down.
    PoolClosed,
    /// The pool could not create a new session.
    AcquireFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingConfiguration => "missing configuration",
            Self::InvalidConfiguration => "invalid configuration",
            Self::ConnectFailed => "connect failed",
            Self::TransportIo => "transport I/O",
            Self::Cancelled => "cancelled",
            Self::PoolClosed => "pool closed",
            Self::AcquireFailed => "acquire failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Required override is absent.
    ///
    /// Returned by configuration resolution before any connection attempt.
    #[error("Missing configuration: {key} is not set")]
    MissingConfiguration {
        /// The override key that was looked up.
        key: String,
    },

    /// Configuration error.
    ///
    /// Returned when an override value cannot be interpreted.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Connection descriptor is malformed or violates proxy-mode rules.
    #[error("Invalid connection descriptor: {message}")]
    InvalidDescriptor {
        /// Description of the problem.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket handshake with the proxy failed.
    #[error("Connect to {url} failed: {message}")]
    ConnectFailed {
        /// Proxy endpoint that was dialed.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// WebSocket handshake did not complete in time.
    #[error("Connect to {url} timed out after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Proxy endpoint that was dialed.
        url: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Read or write failed on an established session.
    #[error("Transport I/O error on session {session_id}: {message}")]
    TransportIo {
        /// Session that failed.
        session_id: SessionId,
        /// Description of the failure.
        message: String,
    },

    /// Session is closed.
    ///
    /// Returned when a read or write is issued after the session shut down
    /// or the proxy dropped the connection.
    #[error("Session {session_id} is closed")]
    ConnectionClosed {
        /// Session that is closed.
        session_id: SessionId,
    },

    /// Operation was cancelled by the caller.
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// The operation that was aborted.
        operation: &'static str,
    },

    // ========================================================================
    // Pool Errors
    // ========================================================================
    /// Pool has been shut down.
    #[error("Connection pool is closed")]
    PoolClosed,

    /// Pool failed to open a new session.
    #[error("Failed to acquire session: {source}")]
    AcquireFailed {
        /// The transport error that prevented the session from opening.
        #[source]
        source: Box<Error>,
    },
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a missing configuration error.
    #[inline]
    pub fn missing_configuration(key: impl Into<String>) -> Self {
        Self::MissingConfiguration { key: key.into() }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid descriptor error.
    #[inline]
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            message: message.into(),
        }
    }

    /// Creates a connect failed error.
    #[inline]
    pub fn connect_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ConnectionTimeout {
            url: url.into(),
            timeout_ms,
        }
    }

    /// Creates a transport I/O error.
    #[inline]
    pub fn transport_io(session_id: SessionId, message: impl Into<String>) -> Self {
        Self::TransportIo {
            session_id,
            message: message.into(),
        }
    }

    /// Creates a connection closed error.
    #[inline]
    pub fn connection_closed(session_id: SessionId) -> Self {
        Self::ConnectionClosed { session_id }
    }

    /// Creates a cancelled error.
    #[inline]
    pub fn cancelled(operation: &'static str) -> Self {
        Self::Cancelled { operation }
    }

    /// Wraps a transport error raised while the pool was opening a session.
    #[inline]
    pub fn acquire_failed(cause: Error) -> Self {
        Self::AcquireFailed {
            source: Box::new(cause),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingConfiguration { .. } => ErrorKind::MissingConfiguration,
            Self::Config { .. } | Self::InvalidDescriptor { .. } => ErrorKind::InvalidConfiguration,
            Self::ConnectFailed { .. } | Self::ConnectionTimeout { .. } => {
                ErrorKind::ConnectFailed
            }
            Self::TransportIo { .. } | Self::ConnectionClosed { .. } => ErrorKind::TransportIo,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::PoolClosed => ErrorKind::PoolClosed,
            Self::AcquireFailed { .. } => ErrorKind::AcquireFailed,
        }
    }

    /// Returns the underlying error of an [`Error::AcquireFailed`].
    #[inline]
    #[must_use]
    pub fn cause(&self) -> Option<&Error> {
        match self {
            Self::AcquireFailed { source } => Some(source),
            _ => None,
        }
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConnectFailed | ErrorKind::TransportIo
        )
    }

    /// Returns `true` if the caller cancelled the operation.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::AcquireFailed { source } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Returns `true` if this error may succeed on retry.
    ///
    /// Only the caller knows whether a retry is safe for its protocol state.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectFailed { .. } | Self::ConnectionTimeout { .. } => true,
            Self::AcquireFailed { source } => source.is_recoverable(),
            _ => false,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<Error> for IoError {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::ConnectionClosed { .. } => IoErrorKind::BrokenPipe,
            Error::TransportIo { .. } => IoErrorKind::ConnectionReset,
            Error::ConnectFailed { .. } => IoErrorKind::ConnectionRefused,
            Error::ConnectionTimeout { .. } => IoErrorKind::TimedOut,
            Error::Cancelled { .. } => IoErrorKind::Interrupted,
            _ => IoErrorKind::Other,
        };
        IoError::new(kind, err)
    }
}

// ============================================================================
// Tests
// ============================================================================
