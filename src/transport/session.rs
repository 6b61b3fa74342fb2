//! WebSocket-backed byte session and its event loop.
//!
//! A [`Session`] stands in for a raw socket to the database. Every write is
//! sent as a binary WebSocket message to the proxy; every binary message from
//! the proxy is delivered to the reader in arrival order. Message boundaries
//! carry no meaning.
//!
//! # Event Loop
//!
//! Opening a session spawns a tokio task that owns the WebSocket and handles:
//!
//! - Incoming binary frames (forwarded to the reader channel)
//! - Outgoing writes and flushes from the owner
//! - Shutdown requests from the owner or the pool
//!
//! The task never retries. Any I/O failure ends the loop and leaves the
//! session in [`SessionState::Failed`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConnectionDescriptor, InnerTls, TransportConfig};
use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// Types
// ============================================================================

/// Completion signal for a write or flush.
type Ack = oneshot::Sender<Result<()>>;

/// Chunks delivered from the event loop to the reader.
type Inbound = mpsc::UnboundedReceiver<Result<Vec<u8>>>;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum SessionState {
    /// Handshake complete, reads and writes flow.
    Open = 0,
    /// Proxy closed the stream cleanly. Buffered bytes can still be read.
    Eof = 1,
    /// Closed locally by the owner or the pool.
    Closed = 2,
    /// Ended by a transport error.
    Failed = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Open,
            1 => Self::Eof,
            2 => Self::Closed,
            _ => Self::Failed,
        }
    }
}

// ============================================================================
// SessionStats
// ============================================================================

/// Traffic counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Payload bytes sent to the proxy.
    pub bytes_sent: u64,
    /// Payload bytes received from the proxy.
    pub bytes_received: u64,
    /// Binary frames sent.
    pub frames_sent: u64,
    /// Binary frames received.
    pub frames_received: u64,
}

#[derive(Debug, Default)]
struct Counters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
}

impl Counters {
    fn record_sent(&self, len: usize) {
        self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_received(&self, len: usize) {
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the event loop.
pub(super) enum SessionCommand {
    /// Send bytes as one binary frame.
    Write { data: Vec<u8>, ack: Option<Ack> },
    /// Flush the sink.
    Flush { ack: Ack },
    /// Close the WebSocket and end the loop.
    Shutdown,
}

// ============================================================================
// SessionShared
// ============================================================================

/// State shared between the owner, the pool and the event loop.
pub(crate) struct SessionShared {
    id: SessionId,
    endpoint: String,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    state: AtomicU8,
    /// Cancelled to stop the event loop.
    shutdown: CancellationToken,
    /// Cancelled once the event loop has exited.
    done: CancellationToken,
    counters: Counters,
}

impl SessionShared {
    #[inline]
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves out of `Open`. Later transitions keep the first terminal state.
    fn finish(&self, state: SessionState) {
        let _ = self.state.compare_exchange(
            SessionState::Open as u8,
            state as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Pool-side handle used to close a session regardless of who holds it.
#[derive(Clone)]
pub(crate) struct SessionHandle(Arc<SessionShared>);

impl SessionHandle {
    /// Stops the event loop and waits until it has exited.
    pub(crate) async fn close(&self) {
        self.0.shutdown.cancel();
        self.0.done.cancelled().await;
    }
}

// ============================================================================
// Session
// ============================================================================

/// One WebSocket connection to the proxy, used as a byte stream.
///
/// Reads and writes must come from a single owner at a time; the session
/// does not serialize concurrent writers. It also implements
/// [`AsyncRead`]/[`AsyncWrite`] so a wire-protocol driver can use it as a
/// socket.
///
/// Dropping the session stops its event loop.
pub struct Session {
    pub(super) shared: Arc<SessionShared>,
    pub(super) config: Arc<TransportConfig>,
    pub(super) inbound: Inbound,
    /// Partially consumed chunk for `AsyncRead`.
    pub(super) read_buf: Vec<u8>,
    pub(super) read_pos: usize,
    /// Coalesced writes awaiting a flush.
    pub(super) write_buf: Vec<u8>,
    /// Pending flush acknowledgement for `AsyncWrite`.
    pub(super) flush_ack: Option<oneshot::Receiver<Result<()>>>,
}

// ============================================================================
// Session - Constructor
// ============================================================================

impl Session {
    /// Opens a session to the proxy endpoint for `descriptor`.
    ///
    /// Returns only after the WebSocket handshake has completed.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectFailed`] if the handshake fails or the proxy is unreachable
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds the connect timeout
    pub async fn open(
        descriptor: &ConnectionDescriptor,
        config: Arc<TransportConfig>,
    ) -> Result<Self> {
        Self::open_with_cancel(descriptor, config, &CancellationToken::new()).await
    }

    /// Opens a session, aborting when `cancel` fires.
    ///
    /// A cancelled open drops the half-established socket.
    ///
    /// # Errors
    ///
    /// Same as [`Session::open`], plus [`Error::Cancelled`].
    pub async fn open_with_cancel(
        descriptor: &ConnectionDescriptor,
        config: Arc<TransportConfig>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let url = config.endpoint_for(&descriptor.host, descriptor.port);
        let connect_timeout = config.connect_timeout();

        debug!(url = %url, target = %descriptor.address(), "Opening WebSocket session");

        if config.use_encrypted_transport() {
            ensure_crypto_provider();
        }

        let handshake = timeout(connect_timeout, connect_async(url.as_str()));

        let ws_stream = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(url = %url, "Session open cancelled");
                return Err(Error::cancelled("open"));
            }

            result = handshake => match result {
                Ok(Ok((ws_stream, _response))) => ws_stream,
                Ok(Err(e)) => {
                    warn!(url = %url, error = %e, "WebSocket handshake failed");
                    return Err(Error::connect_failed(&url, e.to_string()));
                }
                Err(_) => {
                    warn!(url = %url, "WebSocket handshake timed out");
                    return Err(Error::connection_timeout(
                        &url,
                        connect_timeout.as_millis() as u64,
                    ));
                }
            }
        };

        let session = Self::from_stream(ws_stream, url, config);
        info!(session_id = %session.id(), url = %session.endpoint(), "Session established");
        Ok(session)
    }

    /// Wraps an established WebSocket stream and spawns its event loop.
    pub(crate) fn from_stream<S>(
        ws_stream: WebSocketStream<S>,
        endpoint: String,
        config: Arc<TransportConfig>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(SessionShared {
            id: SessionId::next(),
            endpoint,
            command_tx,
            state: AtomicU8::new(SessionState::Open as u8),
            shutdown: CancellationToken::new(),
            done: CancellationToken::new(),
            counters: Counters::default(),
        });

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            inbound_tx,
            Arc::clone(&shared),
            config.log_traffic(),
        ));

        Self {
            shared,
            config,
            inbound: inbound_rx,
            read_buf: Vec::new(),
            read_pos: 0,
            write_buf: Vec::new(),
            flush_ack: None,
        }
    }
}

// ============================================================================
// Session - Public API
// ============================================================================

impl Session {
    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Returns the proxy URL this session is connected to.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Returns `true` while reads and writes can flow.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Returns the traffic counters.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot()
    }

    /// Returns the config this session was opened with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns the inner TLS policy the wire-protocol layer must follow.
    #[inline]
    #[must_use]
    pub fn inner_tls(&self) -> InnerTls {
        self.config.inner_tls()
    }

    /// Sends `data` as one binary frame and waits until it is written.
    ///
    /// Bytes buffered by [`AsyncWrite`] are sent first so order is kept.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the session is no longer open
    /// - [`Error::TransportIo`] if the frame could not be sent
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.flush_pending()?;

        if data.is_empty() {
            return Ok(());
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.enqueue(SessionCommand::Write {
            data: data.to_vec(),
            ack: Some(ack_tx),
        })?;

        ack_rx
            .await
            .map_err(|_| Error::connection_closed(self.id()))?
    }

    /// Returns the next chunk of bytes from the proxy.
    ///
    /// Returns `Ok(None)` once the proxy has closed the stream cleanly and
    /// every buffered byte has been read.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportIo`] if the stream failed
    /// - [`Error::ConnectionClosed`] if the session was closed locally
    pub async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(chunk) = self.take_buffered() {
            return Ok(Some(chunk));
        }

        match self.inbound.recv().await {
            Some(Ok(data)) => Ok(Some(data)),
            Some(Err(e)) => Err(e),
            None => self.end_of_stream().map(|()| None),
        }
    }

    /// Like [`Session::read`], aborting when `cancel` fires.
    ///
    /// A cancelled read loses no data; the next read returns it.
    ///
    /// # Errors
    ///
    /// Same as [`Session::read`], plus [`Error::Cancelled`].
    pub async fn read_with_cancel(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::cancelled("read")),
            result = self.read() => result,
        }
    }

    /// Closes the session and waits for its event loop to exit.
    ///
    /// Idempotent.
    pub async fn close(&mut self) {
        self.handle().close().await;
        debug!(session_id = %self.id(), state = ?self.state(), "Session closed");
    }
}

// ============================================================================
// Session - Internals
// ============================================================================

impl Session {
    /// Returns a handle the pool can close this session through.
    pub(crate) fn handle(&self) -> SessionHandle {
        SessionHandle(Arc::clone(&self.shared))
    }

    /// Returns `true` if received bytes are waiting to be read.
    pub(crate) fn has_unread(&self) -> bool {
        self.read_pos < self.read_buf.len() || !self.inbound.is_empty()
    }

    pub(super) fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::connection_closed(self.id()))
        }
    }

    pub(super) fn enqueue(&self, command: SessionCommand) -> Result<()> {
        self.shared
            .command_tx
            .send(command)
            .map_err(|_| Error::connection_closed(self.id()))
    }

    /// Sends coalesced writes as a single frame without waiting.
    pub(crate) fn flush_pending(&mut self) -> Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut self.write_buf);
        self.enqueue(SessionCommand::Write { data, ack: None })
    }

    /// Takes the unread remainder of a chunk partially consumed by `AsyncRead`.
    fn take_buffered(&mut self) -> Option<Vec<u8>> {
        if self.read_pos >= self.read_buf.len() {
            return None;
        }
        let chunk = self.read_buf.split_off(self.read_pos);
        self.read_buf.clear();
        self.read_pos = 0;
        Some(chunk)
    }

    /// Interprets the end of the inbound channel.
    pub(super) fn end_of_stream(&self) -> Result<()> {
        match self.state() {
            SessionState::Eof => Ok(()),
            _ => Err(Error::connection_closed(self.id())),
        }
    }
}

// ============================================================================
// Session - Event Loop
// ============================================================================

impl Session {
    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        inbound_tx: mpsc::UnboundedSender<Result<Vec<u8>>>,
        shared: Arc<SessionShared>,
        log_traffic: bool,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        // Signals `done` even if the loop panics.
        let _done = shared.done.clone().drop_guard();
        let session_id = shared.id;
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let final_state = loop {
            tokio::select! {
                _ = shared.shutdown.cancelled() => {
                    debug!(session_id = %session_id, "Shutdown requested");
                    let _ = ws_write.close().await;
                    break SessionState::Closed;
                }

                // Incoming frames from the proxy
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Binary(data))) => {
                            Self::deliver(&shared, &inbound_tx, data.to_vec(), log_traffic);
                        }

                        Some(Ok(Message::Text(text))) => {
                            warn!(session_id = %session_id, "Text frame from proxy, treating as bytes");
                            Self::deliver(&shared, &inbound_tx, text.as_bytes().to_vec(), log_traffic);
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(session_id = %session_id, ?frame, "WebSocket closed by proxy");
                            break SessionState::Eof;
                        }

                        Some(Err(e)) => {
                            error!(session_id = %session_id, error = %e, "WebSocket error");
                            let _ = inbound_tx.send(Err(Error::transport_io(session_id, e.to_string())));
                            break SessionState::Failed;
                        }

                        None => {
                            debug!(session_id = %session_id, "WebSocket stream ended");
                            break SessionState::Eof;
                        }

                        // Ping/Pong are answered by tungstenite
                        Some(Ok(_)) => {}
                    }
                }

                // Commands from the owner
                command = command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Write { data, ack }) => {
                            let len = data.len();
                            if log_traffic {
                                trace!(session_id = %session_id, bytes = len, data = %BASE64.encode(&data), "client->proxy");
                            }

                            match ws_write.send(Message::Binary(data.into())).await {
                                Ok(()) => {
                                    shared.counters.record_sent(len);
                                    if let Some(ack) = ack {
                                        let _ = ack.send(Ok(()));
                                    }
                                }
                                Err(e) => {
                                    error!(session_id = %session_id, error = %e, "Failed to send frame");
                                    let err = Error::transport_io(session_id, e.to_string());
                                    match ack {
                                        Some(ack) => { let _ = ack.send(Err(err)); }
                                        None => { let _ = inbound_tx.send(Err(err)); }
                                    }
                                    break SessionState::Failed;
                                }
                            }
                        }

                        Some(SessionCommand::Flush { ack }) => {
                            if let Err(e) = ws_write.flush().await {
                                error!(session_id = %session_id, error = %e, "Failed to flush");
                                let _ = ack.send(Err(Error::transport_io(session_id, e.to_string())));
                                break SessionState::Failed;
                            }
                            let _ = ack.send(Ok(()));
                        }

                        Some(SessionCommand::Shutdown) | None => {
                            debug!(session_id = %session_id, "Shutdown command received");
                            let _ = ws_write.close().await;
                            break SessionState::Closed;
                        }
                    }
                }
            }
        };

        // State must be visible before the inbound sender drops.
        shared.finish(final_state);
        drop(inbound_tx);

        debug!(session_id = %session_id, state = ?shared.state(), "Event loop terminated");
    }

    /// Forwards one received chunk to the reader.
    fn deliver(
        shared: &SessionShared,
        inbound_tx: &mpsc::UnboundedSender<Result<Vec<u8>>>,
        data: Vec<u8>,
        log_traffic: bool,
    ) {
        // An empty chunk would read as EOF through `AsyncRead`.
        if data.is_empty() {
            return;
        }

        shared.counters.record_received(data.len());
        if log_traffic {
            trace!(session_id = %shared.id, bytes = data.len(), data = %BASE64.encode(&data), "proxy->client");
        }

        if inbound_tx.send(Ok(data)).is_err() {
            trace!(session_id = %shared.id, "Reader gone, dropping chunk");
        }
    }
}

/// Installs the `ring` provider as the process default unless one is set.
///
/// rustls cannot build a client config without a process-level provider.
fn ensure_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        // Losing a race to another installer is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Only the pool's handle shares the event loop, and it closes
        // explicitly, so dropping the owner ends the session.
        self.shared.shutdown.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("endpoint", &self.endpoint())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use crate::error::ErrorKind;
    use crate::transport::testing::{StubMode, StubProxy, descriptor, unreachable_host};

    async fn read_exact(session: &mut Session, len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        while out.len() < len {
            let chunk = session
                .read()
                .await
                .expect("read")
                .expect("unexpected EOF");
            out.extend_from_slice(&chunk);
        }
        out
    }

    #[tokio::test]
    async fn test_echo_ping() {
        let proxy = StubProxy::start(StubMode::Echo).await;
        let config = Arc::new(proxy.config());

        let mut session = assert_ok!(Session::open(&descriptor(), Arc::clone(&config)).await);
        assert!(session.is_open());
        assert_eq!(session.endpoint(), config.endpoint_for("db.localtest.me", 5432));

        assert_ok!(session.write(b"PING").await);
        assert_eq!(read_exact(&mut session, 4).await, b"PING");
        assert_eq!(proxy.paths(), vec!["/v1".to_string()]);

        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_order_preserved_across_writes() {
        let proxy = StubProxy::start(StubMode::Echo).await;
        let mut session = assert_ok!(Session::open(&descriptor(), Arc::new(proxy.config())).await);

        assert_ok!(session.write(b"b1").await);
        assert_ok!(session.write(b"b2-longer").await);
        assert_ok!(session.write(b"b3").await);

        assert_eq!(read_exact(&mut session, 13).await, b"b1b2-longerb3");

        let stats = session.stats();
        assert_eq!(stats.frames_sent, 3);
        assert_eq!(stats.bytes_sent, 13);
        assert_eq!(stats.bytes_received, 13);
    }

    #[tokio::test]
    async fn test_empty_write_is_noop() {
        let proxy = StubProxy::start(StubMode::Echo).await;
        let mut session = assert_ok!(Session::open(&descriptor(), Arc::new(proxy.config())).await);
        assert_ok!(session.write(b"").await);
        assert_eq!(session.stats().frames_sent, 0);
    }

    #[tokio::test]
    async fn test_unreachable_proxy() {
        let config = Arc::new(
            TransportConfig::new(unreachable_host().await)
                .expect("config")
                .with_encrypted_transport(false),
        );
        let err = assert_err!(Session::open(&descriptor(), config).await);
        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
    }

    #[tokio::test]
    async fn test_wss_against_plain_listener_fails_cleanly() {
        let proxy = StubProxy::start(StubMode::Echo).await;
        let config = Arc::new(
            TransportConfig::new(proxy.host())
                .expect("config")
                .with_connect_timeout(Duration::from_secs(2)),
        );
        assert_eq!(config.scheme(), "wss");

        let err = assert_err!(Session::open(&descriptor(), config).await);
        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let proxy = StubProxy::start(StubMode::Silent).await;
        let config = Arc::new(proxy.config().with_connect_timeout(Duration::from_millis(100)));

        let err = assert_err!(Session::open(&descriptor(), config).await);
        assert!(matches!(err, Error::ConnectionTimeout { timeout_ms: 100, .. }));
        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
    }

    #[tokio::test]
    async fn test_open_cancelled() {
        let proxy = StubProxy::start(StubMode::Silent).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = assert_err!(
            Session::open_with_cancel(&descriptor(), Arc::new(proxy.config()), &cancel).await
        );
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_read_cancelled_then_resumes() {
        let proxy = StubProxy::start(StubMode::Echo).await;
        let mut session = assert_ok!(Session::open(&descriptor(), Arc::new(proxy.config())).await);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = assert_err!(session.read_with_cancel(&cancel).await);
        assert!(err.is_cancelled());

        assert_ok!(session.write(b"again").await);
        assert_eq!(read_exact(&mut session, 5).await, b"again");
    }

    #[tokio::test]
    async fn test_proxy_close_yields_eof() {
        let proxy = StubProxy::start(StubMode::CloseAfterHandshake).await;
        let mut session = assert_ok!(Session::open(&descriptor(), Arc::new(proxy.config())).await);

        assert_eq!(assert_ok!(session.read().await), None);
        assert_eq!(session.state(), SessionState::Eof);

        let err = assert_err!(session.write(b"late").await);
        assert!(matches!(err, Error::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn test_io_after_close() {
        let proxy = StubProxy::start(StubMode::Echo).await;
        let mut session = assert_ok!(Session::open(&descriptor(), Arc::new(proxy.config())).await);
        session.close().await;
        session.close().await;

        let err = assert_err!(session.write(b"x").await);
        assert_eq!(err.kind(), ErrorKind::TransportIo);
        let err = assert_err!(session.read().await);
        assert!(matches!(err, Error::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn test_traffic_logging_does_not_alter_bytes() {
        let proxy = StubProxy::start(StubMode::Echo).await;
        let config = Arc::new(proxy.config().with_log_traffic(true));
        let mut session = assert_ok!(Session::open(&descriptor(), config).await);

        assert_ok!(session.write(&[0, 1, 2, 255]).await);
        assert_eq!(read_exact(&mut session, 4).await, vec![0, 1, 2, 255]);
    }
}
