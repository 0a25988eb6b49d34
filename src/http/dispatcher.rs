//! Per-request state machine.
//!
//! # States
//! ```text
//! ReceiveRequest → ValidateMethod ─┬─ RespondMethodNotAllowed ──────────────┐
//!                                  └─ LookupStore ─┬─ RespondRedirect ──────┤
//!                                                  ├─ RespondNotFound ──────┤
//!                                                  └─ RespondInternalError ─┴→ Done
//! ```
//!
//! # Design Decisions
//! - Only GET and HEAD reach the store; anything else is a 405 with no lookup
//! - The HEAD rule (no body) is applied once, after the lookup outcome is known
//! - Store failures are recovered here as 500s and never escape the request

use std::sync::Arc;

use axum::http::{Method, StatusCode};

use crate::http::response::{build_redirect, CannedResponses, ResponseDescriptor};
use crate::observability::metrics;
use crate::store::{Lookup, RedirectLookup};

/// The capability the transport calls for every request.
pub trait RequestHandler: Send + Sync + 'static {
    /// Select the response for `(method, path)`.
    fn handle(&self, method: &Method, path: &str) -> ResponseDescriptor;

    /// Called when the response for `(method, path)` could not be delivered.
    fn delivery_failed(&self, method: &Method, path: &str, error: &dyn std::error::Error) {
        tracing::warn!(%method, path, %error, "Failed to respond");
    }
}

/// Result of the lookup step, before the HEAD rule is applied.
enum Resolution {
    Redirect(String),
    NotFound,
    InternalError,
}

/// Resolves request paths through a redirect store.
pub struct Dispatcher<S> {
    store: Arc<S>,
    canned: Arc<CannedResponses>,
}

impl<S: RedirectLookup> Dispatcher<S> {
    pub fn new(store: Arc<S>, canned: Arc<CannedResponses>) -> Self {
        Self { store, canned }
    }

    fn resolve(&self, path: &str) -> Resolution {
        match self.store.lookup(path.as_bytes()) {
            Ok(Lookup::Found(target)) => {
                metrics::record_lookup("found");
                Resolution::Redirect(target)
            }
            Ok(Lookup::NotFound) => {
                metrics::record_lookup("not_found");
                Resolution::NotFound
            }
            Err(error) => {
                metrics::record_lookup("error");
                tracing::warn!(path, %error, "Store lookup failed");
                Resolution::InternalError
            }
        }
    }
}

impl<S: RedirectLookup + 'static> RequestHandler for Dispatcher<S> {
    fn handle(&self, method: &Method, path: &str) -> ResponseDescriptor {
        let head = match *method {
            Method::GET => false,
            Method::HEAD => true,
            _ => {
                tracing::debug!(%method, path, "Method not allowed");
                return ResponseDescriptor::canned(
                    StatusCode::METHOD_NOT_ALLOWED,
                    &self.canned.method_not_allowed,
                );
            }
        };

        let resolution = match self.resolve(path) {
            Resolution::Redirect(target) => match build_redirect(&target, !head) {
                Ok(redirect) => {
                    tracing::debug!(%method, path, location = %target, "Redirecting");
                    return ResponseDescriptor::redirect(redirect);
                }
                Err(error) => {
                    tracing::warn!(path, %error, "Stored target is not a valid Location");
                    Resolution::InternalError
                }
            },
            other => other,
        };

        let (status, canned) = match resolution {
            Resolution::NotFound => (StatusCode::NOT_FOUND, &self.canned.not_found),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, &self.canned.internal_error),
        };
        let canned = if head { &self.canned.empty } else { canned };
        ResponseDescriptor::canned(status, canned)
    }

    fn delivery_failed(&self, method: &Method, path: &str, error: &dyn std::error::Error) {
        metrics::record_delivery_failure();
        tracing::warn!(%method, path, %error, "Failed to respond");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{
        BODY_INTERNAL_ERROR, BODY_METHOD_NOT_ALLOWED, BODY_MOVED_PERMANENTLY, BODY_NOT_FOUND,
    };
    use crate::store::{StoreError, StoreResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store where listed paths fail like a broken disk.
    #[derive(Default)]
    struct FakeStore {
        entries: HashMap<Vec<u8>, String>,
        failing: Vec<Vec<u8>>,
        lookups: AtomicUsize,
    }

    impl FakeStore {
        fn with(mut self, path: &str, target: &str) -> Self {
            self.entries.insert(path.as_bytes().to_vec(), target.to_string());
            self
        }

        fn failing(mut self, path: &str) -> Self {
            self.failing.push(path.as_bytes().to_vec());
            self
        }
    }

    impl RedirectLookup for FakeStore {
        fn lookup(&self, path: &[u8]) -> StoreResult<Lookup> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|p| p == path) {
                return Err(StoreError::Poisoned);
            }
            Ok(match self.entries.get(path) {
                Some(target) => Lookup::Found(target.clone()),
                None => Lookup::NotFound,
            })
        }
    }

    fn dispatcher(store: FakeStore) -> (Dispatcher<FakeStore>, Arc<FakeStore>) {
        let store = Arc::new(store);
        let canned = Arc::new(CannedResponses::build());
        (Dispatcher::new(Arc::clone(&store), canned), store)
    }

    fn sample_store() -> FakeStore {
        FakeStore::default()
            .with("/foo", "http://example.com")
            .failing("/bar")
    }

    #[test]
    fn get_missing_path_is_404() {
        let (dispatcher, _) = dispatcher(FakeStore::default());
        let response = dispatcher.handle(&Method::GET, "/foo");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), BODY_NOT_FOUND);
        assert!(response.location().is_none());
    }

    #[test]
    fn head_missing_path_is_empty_404() {
        let (dispatcher, _) = dispatcher(FakeStore::default());
        let response = dispatcher.handle(&Method::HEAD, "/foo");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.body().is_empty());
    }

    #[test]
    fn get_existing_path_redirects() {
        let (dispatcher, _) = dispatcher(sample_store());
        let response = dispatcher.handle(&Method::GET, "/foo");

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.location().unwrap(), "http://example.com");
        assert_eq!(response.body(), BODY_MOVED_PERMANENTLY);
    }

    #[test]
    fn head_existing_path_redirects_without_body() {
        let (dispatcher, _) = dispatcher(sample_store());
        let response = dispatcher.handle(&Method::HEAD, "/foo");

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.location().unwrap(), "http://example.com");
        assert!(response.body().is_empty());
    }

    #[test]
    fn store_failure_is_500() {
        let (dispatcher, _) = dispatcher(sample_store());

        let response = dispatcher.handle(&Method::GET, "/bar");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body(), BODY_INTERNAL_ERROR);

        let response = dispatcher.handle(&Method::HEAD, "/bar");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body().is_empty());
    }

    #[test]
    fn unusable_target_is_500() {
        let (dispatcher, _) = dispatcher(FakeStore::default().with("/bad", "http://x\n"));
        let response = dispatcher.handle(&Method::GET, "/bad");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body(), BODY_INTERNAL_ERROR);
    }

    #[test]
    fn other_methods_are_405_without_lookup() {
        let (dispatcher, store) = dispatcher(sample_store());

        for method in [
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
            Method::TRACE,
            Method::from_bytes(b"PURGE").unwrap(),
        ] {
            for path in ["/foo", "/bar", "/missing"] {
                let response = dispatcher.handle(&method, path);
                assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
                assert_eq!(response.body(), BODY_METHOD_NOT_ALLOWED);
            }
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn one_lookup_per_get_or_head() {
        let (dispatcher, store) = dispatcher(sample_store());
        dispatcher.handle(&Method::GET, "/foo");
        dispatcher.handle(&Method::HEAD, "/missing");
        dispatcher.handle(&Method::GET, "/bar");
        assert_eq!(store.lookups.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn head_never_has_a_body() {
        let (dispatcher, _) = dispatcher(sample_store());
        for path in ["/foo", "/bar", "/missing"] {
            assert!(dispatcher.handle(&Method::HEAD, path).body().is_empty());
        }
    }

    #[test]
    fn repeated_get_is_stable() {
        let (dispatcher, _) = dispatcher(sample_store());
        let first = dispatcher.handle(&Method::GET, "/foo");
        let second = dispatcher.handle(&Method::GET, "/foo");

        assert_eq!(first.status(), second.status());
        assert_eq!(first.location(), second.location());
    }

    #[test]
    fn paths_match_exactly() {
        let (dispatcher, _) = dispatcher(sample_store());
        for path in ["/foo/", "/FOO", "/foo?x=1"] {
            assert_eq!(
                dispatcher.handle(&Method::GET, path).status(),
                StatusCode::NOT_FOUND
            );
        }
    }
}
