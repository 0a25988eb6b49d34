//! Per-connection delivery tracking.
//!
//! # States
//! ```text
//! Idle ──request read──▶ Pending ──last body frame──▶ Written ──flush ok──▶ Idle
//! ```
//!
//! A connection error is a delivery failure only while the exchange is
//! `Pending` or `Written`. Errors while `Idle` (a malformed next request, a
//! reset between requests) belong to no response.

use std::io;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::Method;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
enum Exchange {
    #[default]
    Idle,
    Pending(Method, String),
    Written(Method, String),
}

/// State of the request/response exchange currently on one connection.
///
/// HTTP/1.1 handles one exchange at a time, so a single slot is enough.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExchangeLog {
    state: Arc<Mutex<Exchange>>,
}

impl ExchangeLog {
    fn update(&self, f: impl FnOnce(Exchange) -> Exchange) {
        if let Ok(mut state) = self.state.lock() {
            *state = f(mem::take(&mut *state));
        }
    }

    /// A request head was read and handed to the service.
    pub(crate) fn received(&self, method: &Method, path: &str) {
        let (method, path) = (method.clone(), path.to_owned());
        self.update(|_| Exchange::Pending(method, path));
    }

    /// The whole response was handed to the connection's write buffer.
    pub(crate) fn written(&self) {
        self.update(|state| match state {
            Exchange::Pending(method, path) => Exchange::Written(method, path),
            other => other,
        });
    }

    /// Everything buffered so far reached the socket.
    pub(crate) fn flushed(&self) {
        self.update(|state| match state {
            Exchange::Written(..) => Exchange::Idle,
            other => other,
        });
    }

    /// Method and path of a response that was not delivered, if any.
    pub(crate) fn take_undelivered(&self) -> Option<(Method, String)> {
        let state = self.state.lock().ok().map(|mut state| mem::take(&mut *state));
        match state {
            Some(Exchange::Pending(method, path) | Exchange::Written(method, path)) => {
                Some((method, path))
            }
            _ => None,
        }
    }
}

/// Client socket that reports successful flushes to the exchange log.
#[derive(Debug)]
pub(crate) struct DeliveryStream {
    inner: TcpStream,
    exchange: ExchangeLog,
}

impl DeliveryStream {
    pub(crate) fn new(inner: TcpStream, exchange: ExchangeLog) -> Self {
        Self { inner, exchange }
    }
}

impl AsyncRead for DeliveryStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for DeliveryStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let result = ready!(Pin::new(&mut self.inner).poll_flush(cx));
        if result.is_ok() {
            self.exchange.flushed();
        }
        Poll::Ready(result)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Response body that marks the exchange written once its last frame is out.
pub(crate) struct DeliveryBody {
    inner: Body,
    exchange: ExchangeLog,
}

impl DeliveryBody {
    pub(crate) fn wrap(inner: Body, exchange: ExchangeLog) -> Body {
        Body::new(Self { inner, exchange })
    }
}

impl HttpBody for DeliveryBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let frame = ready!(Pin::new(&mut self.inner).poll_frame(cx));
        if frame.is_none() {
            self.exchange.written();
        }
        Poll::Ready(frame)
    }

    // hyper asks after every data frame, and for empty bodies instead of polling.
    fn is_end_stream(&self) -> bool {
        let done = self.inner.is_end_stream();
        if done {
            self.exchange.written();
        }
        done
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
