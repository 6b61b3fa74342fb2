//! Socket-shaped surface over a [`Session`].
//!
//! Implements tokio's [`AsyncRead`] and [`AsyncWrite`] so an unmodified
//! wire-protocol client can use a session where it expects a TCP stream.
//!
//! With both pipelining flags off, each `poll_write` leaves as its own
//! binary frame. With either flag on, writes accumulate until `poll_flush`
//! and leave as one frame, in the order they were written.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::oneshot;

use crate::error::Error;

use super::session::{Session, SessionCommand};

impl AsyncRead for Session {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.read_pos >= this.read_buf.len() {
            match ready!(this.inbound.poll_recv(cx)) {
                Some(Ok(data)) => {
                    this.read_buf = data;
                    this.read_pos = 0;
                }
                Some(Err(e)) => return Poll::Ready(Err(e.into())),
                // Clean EOF leaves `buf` untouched.
                None => return Poll::Ready(this.end_of_stream().map_err(io::Error::from)),
            }
        }

        let available = &this.read_buf[this.read_pos..];
        let n = available.len().min(buf.remaining());
        buf.put_slice(&available[..n]);
        this.read_pos += n;

        if this.read_pos >= this.read_buf.len() {
            this.read_buf.clear();
            this.read_pos = 0;
        }

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for Session {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if let Err(e) = this.ensure_open() {
            return Poll::Ready(Err(e.into()));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        if this.config.coalesces_writes() {
            this.write_buf.extend_from_slice(buf);
        } else if let Err(e) = this.enqueue(SessionCommand::Write {
            data: buf.to_vec(),
            ack: None,
        }) {
            return Poll::Ready(Err(e.into()));
        }

        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.flush_ack.is_none() {
            this.flush_pending()?;
            let (ack_tx, ack_rx) = oneshot::channel();
            this.enqueue(SessionCommand::Flush { ack: ack_tx })?;
            this.flush_ack = Some(ack_rx);
        }

        let Some(ack_rx) = this.flush_ack.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let result = ready!(Pin::new(ack_rx).poll(cx));
        this.flush_ack = None;

        match result {
            Ok(Ok(())) => Poll::Ready(Ok(())),
            Ok(Err(e)) => Poll::Ready(Err(e.into())),
            Err(_) => Poll::Ready(Err(Error::connection_closed(this.id()).into())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.is_open() {
            ready!(self.as_mut().poll_flush(cx))?;
        }
        // The loop may already be gone; shutting down twice is fine.
        let _ = self.enqueue(SessionCommand::Shutdown);
        Poll::Ready(Ok(()))
    }
}
