//! WebSocket transport layer.
//!
//! This module replaces a raw TCP socket to the database with a WebSocket
//! connection to a proxy that relays bytes to the real database socket.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                          ┌─────────┐          ┌──────────┐
//! │ Wire protocol    │                          │         │   TCP    │          │
//! │ driver           │       WebSocket          │  Proxy  │◄────────►│ Postgres │
//! │   ↓ acquire      │◄────────────────────────►│  /v1    │          │          │
//! │ ConnectionPool   │   binary frames, {ws,wss}│         │          │          │
//! │   → Session      │                          └─────────┘          └──────────┘
//! └──────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `ConnectionPool::acquire` - Reuse an idle session or open a new one
//! 2. `Session::open` - WebSocket handshake to `{scheme}://{proxy}/v1`
//! 3. `Session::write` / `Session::read` - Opaque bytes, order preserved
//! 4. `PooledSession::release` - Back to the idle set
//! 5. `ConnectionPool::close_all` - Close everything, reject new acquires
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `session` | WebSocket session and event loop |
//! | `stream` | `AsyncRead`/`AsyncWrite` over a session |
//! | `pool` | Session pool |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket session and event loop.
pub mod session;

/// Tokio I/O traits for sessions.
mod stream;

/// Session pool.
pub mod pool;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use pool::{ConnectionPool, PoolStatus, PooledSession};
pub use session::{Session, SessionState, SessionStats};
