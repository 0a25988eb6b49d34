//! HTTP server setup and connection handling.
//!
//! # Responsibilities
//! - Create the Axum Router that hands every request to the request handler
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Serve each accepted connection with HTTP/1.1
//! - Stop accepting on shutdown and let open connections finish
//! - Report connections that fail before a response reached the socket

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tower::util::{MapRequest, MapResponse};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ListenerConfig, TimeoutConfig};
use crate::http::delivery::{DeliveryBody, DeliveryStream, ExchangeLog};
use crate::http::dispatcher::RequestHandler;
use crate::http::response::BODY_INTERNAL_ERROR;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Application state injected into the handler.
#[derive(Clone)]
struct AppState {
    handler: Arc<dyn RequestHandler>,
}

/// HTTP front end for a request handler.
pub struct HttpServer {
    router: Router,
    handler: Arc<dyn RequestHandler>,
    drain_timeout: Duration,
}

impl HttpServer {
    pub fn new(timeouts: &TimeoutConfig, handler: Arc<dyn RequestHandler>) -> Self {
        let router = Self::build_router(timeouts, Arc::clone(&handler));
        Self {
            router,
            handler,
            drain_timeout: Duration::from_secs(timeouts.shutdown_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(timeouts: &TimeoutConfig, handler: Arc<dyn RequestHandler>) -> Router {
        Router::new()
            .fallback(redirect_handler)
            .with_state(AppState { handler })
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Bind the listener and start accepting connections in the background.
    pub async fn start(self, config: &ListenerConfig) -> Result<ListenerHandle, ListenerError> {
        let listener = Listener::bind(config).await?;
        let local_addr = listener.local_addr();
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.router,
            self.handler,
            shutdown.clone(),
            tracker.clone(),
        ));

        tracing::info!(address = %local_addr, "HTTP server started");
        Ok(ListenerHandle {
            local_addr,
            shutdown,
            tracker,
            accept_task: Some(accept_task),
            drain_timeout: self.drain_timeout,
        })
    }
}

/// A running listener. Dropping it without `stop` still stops accepting.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    accept_task: Option<JoinHandle<()>>,
    drain_timeout: Duration,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting, then wait for open connections to finish their
    /// in-flight requests, bounded by the drain timeout.
    pub async fn stop(mut self) {
        tracing::info!(
            address = %self.local_addr,
            connections = self.tracker.active_count(),
            "Stopping listener"
        );
        self.shutdown.trigger();

        if let Some(task) = self.accept_task.take() {
            if let Err(error) = task.await {
                tracing::error!(%error, "Accept loop ended abnormally");
            }
        }

        match tokio::time::timeout(self.drain_timeout, self.tracker.drained()).await {
            Ok(()) => tracing::info!(address = %self.local_addr, "Listener stopped"),
            Err(_) => tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain deadline passed with connections still open"
            ),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.accept_task.is_some() {
            self.shutdown.trigger();
        }
    }
}

async fn accept_loop(
    listener: Listener,
    router: Router,
    handler: Arc<dyn RequestHandler>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
) {
    let mut stop = shutdown.subscribe();

    loop {
        let accepted = tokio::select! {
            _ = stop.recv() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer, permit)) => {
                let guard = tracker.track();
                tokio::spawn(serve_connection(
                    stream,
                    peer,
                    permit,
                    guard,
                    router.clone(),
                    Arc::clone(&handler),
                    shutdown.subscribe(),
                ));
            }
            Err(ListenerError::Closed) => break,
            Err(error) => {
                tracing::warn!(%error, "Accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }

    tracing::info!(address = %listener.local_addr(), "Listener stopped accepting connections");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    permit: ConnectionPermit,
    guard: ConnectionGuard,
    router: Router,
    handler: Arc<dyn RequestHandler>,
    shutdown: ShutdownSignal,
) {
    let exchange = ExchangeLog::default();
    let result = drive_connection(stream, router, exchange.clone(), shutdown).await;

    if let Err(error) = result {
        match exchange.take_undelivered() {
            Some((method, path)) => handler.delivery_failed(&method, &path, &error),
            None => tracing::debug!(
                connection_id = %guard.id(),
                peer_addr = %peer,
                %error,
                "Connection failed with no response outstanding"
            ),
        }
    }

    // The handler reference must be gone before the drain count drops.
    drop(handler);
    drop(permit);
    drop(guard);
}

async fn drive_connection(
    stream: TcpStream,
    router: Router,
    exchange: ExchangeLog,
    mut shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let requests = exchange.clone();
    let responses = exchange.clone();
    let service = MapResponse::new(
        MapRequest::new(
            router,
            move |request: Request<Incoming>| -> Request<Incoming> {
                requests.received(request.method(), request.uri().path());
                request
            },
        ),
        move |response: Response| -> Response {
            response.map(|body| DeliveryBody::wrap(body, responses.clone()))
        },
    );

    let io = TokioIo::new(DeliveryStream::new(stream, exchange));
    let connection = http1::Builder::new().serve_connection(io, TowerToHyperService::new(service));
    tokio::pin!(connection);

    let mut draining = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => return result,
            _ = shutdown.recv(), if !draining => {
                draining = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Fallback for every method and path: run the request handler on a
/// blocking worker, since a lookup may wait on the store.
async fn redirect_handler(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let start = Instant::now();
    let handler = Arc::clone(&state.handler);
    let span = tracing::Span::current();
    let request_method = method.clone();
    let path = uri.path().to_owned();

    let selected = tokio::task::spawn_blocking(move || {
        span.in_scope(|| handler.handle(&request_method, &path))
    })
    .await;

    let response = match selected {
        Ok(descriptor) => descriptor.into_response(),
        Err(error) => {
            tracing::error!(%error, "Request handler did not complete");
            (StatusCode::INTERNAL_SERVER_ERROR, BODY_INTERNAL_ERROR).into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
