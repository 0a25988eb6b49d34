//! Canned and transient HTTP responses.
//!
//! # Responsibilities
//! - Build the four immutable canned responses once at startup
//! - Build a per-request 301 redirect carrying the looked-up target
//! - Convert the chosen response into an HTTP response for the transport
//!
//! # Design Decisions
//! - Canned bodies are `Bytes` behind an `Arc`: every request shares them
//! - The status travels next to the body, so `Empty` serves both 404 and 500
//! - A transient redirect owns its `Location` value and is dropped with the
//!   response it was turned into

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::header::{InvalidHeaderValue, ALLOW, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

pub const BODY_MOVED_PERMANENTLY: &str = "Moved Permanently";
pub const BODY_METHOD_NOT_ALLOWED: &str = "Method Not Allowed";
pub const BODY_NOT_FOUND: &str = "Not Found";
pub const BODY_INTERNAL_ERROR: &str = "Internal Server Error";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const ALLOWED_METHODS: &str = "GET, HEAD";

/// An immutable response body shared by every request that needs it.
#[derive(Debug)]
pub struct CannedResponse {
    body: Bytes,
}

impl CannedResponse {
    fn new(body: &'static str) -> Self {
        Self {
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// The canned response set, built once by the lifecycle controller.
#[derive(Debug)]
pub struct CannedResponses {
    pub method_not_allowed: Arc<CannedResponse>,
    pub not_found: Arc<CannedResponse>,
    pub internal_error: Arc<CannedResponse>,
    pub empty: Arc<CannedResponse>,
}

impl CannedResponses {
    pub fn build() -> Self {
        Self {
            method_not_allowed: Arc::new(CannedResponse::new(BODY_METHOD_NOT_ALLOWED)),
            not_found: Arc::new(CannedResponse::new(BODY_NOT_FOUND)),
            internal_error: Arc::new(CannedResponse::new(BODY_INTERNAL_ERROR)),
            empty: Arc::new(CannedResponse::new("")),
        }
    }
}

/// A 301 response built for exactly one request.
#[derive(Debug)]
pub struct TransientResponse {
    location: HeaderValue,
    include_body: bool,
}

impl TransientResponse {
    pub fn location(&self) -> &HeaderValue {
        &self.location
    }

    pub fn body(&self) -> Bytes {
        if self.include_body {
            Bytes::from_static(BODY_MOVED_PERMANENTLY.as_bytes())
        } else {
            Bytes::new()
        }
    }
}

/// Build a permanent redirect to `target`.
///
/// Fails when the target cannot be carried in a header (control characters).
pub fn build_redirect(
    target: &str,
    include_body: bool,
) -> Result<TransientResponse, InvalidHeaderValue> {
    Ok(TransientResponse {
        location: HeaderValue::from_str(target)?,
        include_body,
    })
}

/// What the response carries besides its status.
#[derive(Debug)]
pub enum ResponseBody {
    Canned(Arc<CannedResponse>),
    Redirect(TransientResponse),
}

/// The single response selected for a request.
#[derive(Debug)]
pub struct ResponseDescriptor {
    status: StatusCode,
    body: ResponseBody,
}

impl ResponseDescriptor {
    pub fn canned(status: StatusCode, response: &Arc<CannedResponse>) -> Self {
        Self {
            status,
            body: ResponseBody::Canned(Arc::clone(response)),
        }
    }

    pub fn redirect(response: TransientResponse) -> Self {
        Self {
            status: StatusCode::MOVED_PERMANENTLY,
            body: ResponseBody::Redirect(response),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn location(&self) -> Option<&HeaderValue> {
        match &self.body {
            ResponseBody::Redirect(redirect) => Some(redirect.location()),
            ResponseBody::Canned(_) => None,
        }
    }

    pub fn body(&self) -> Bytes {
        match &self.body {
            ResponseBody::Canned(canned) => canned.body().clone(),
            ResponseBody::Redirect(redirect) => redirect.body(),
        }
    }
}

impl IntoResponse for ResponseDescriptor {
    fn into_response(self) -> Response {
        let body = self.body();
        let has_body = !body.is_empty();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        if has_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        }
        if self.status == StatusCode::METHOD_NOT_ALLOWED {
            headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        if let ResponseBody::Redirect(redirect) = self.body {
            headers.insert(LOCATION, redirect.location);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canned_bodies() {
        let canned = CannedResponses::build();
        assert_eq!(canned.method_not_allowed.body(), BODY_METHOD_NOT_ALLOWED);
        assert_eq!(canned.not_found.body(), BODY_NOT_FOUND);
        assert_eq!(canned.internal_error.body(), BODY_INTERNAL_ERROR);
        assert!(canned.empty.body().is_empty());
    }

    #[test]
    fn canned_descriptors_share_the_body() {
        let canned = CannedResponses::build();
        let first = ResponseDescriptor::canned(StatusCode::NOT_FOUND, &canned.not_found);
        let second = ResponseDescriptor::canned(StatusCode::NOT_FOUND, &canned.not_found);

        assert_eq!(Arc::strong_count(&canned.not_found), 3);
        drop((first, second));
        assert_eq!(Arc::strong_count(&canned.not_found), 1);
    }

    #[test]
    fn redirect_with_body() {
        let redirect = build_redirect("http://example.com", true).unwrap();
        let descriptor = ResponseDescriptor::redirect(redirect);

        assert_eq!(descriptor.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(descriptor.location().unwrap(), "http://example.com");
        assert_eq!(descriptor.body(), BODY_MOVED_PERMANENTLY);
    }

    #[test]
    fn redirect_without_body() {
        let redirect = build_redirect("http://example.com", false).unwrap();
        let descriptor = ResponseDescriptor::redirect(redirect);

        assert_eq!(descriptor.location().unwrap(), "http://example.com");
        assert!(descriptor.body().is_empty());
    }

    #[test]
    fn redirect_rejects_header_breaking_target() {
        assert!(build_redirect("http://example.com\r\nSet-Cookie: x=1", true).is_err());
    }

    #[test]
    fn into_response_sets_headers() {
        let canned = CannedResponses::build();

        let response = ResponseDescriptor::canned(
            StatusCode::METHOD_NOT_ALLOWED,
            &canned.method_not_allowed,
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], ALLOWED_METHODS);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_PLAIN);

        let response =
            ResponseDescriptor::redirect(build_redirect("/elsewhere", false).unwrap())
                .into_response();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[LOCATION], "/elsewhere");
        assert!(response.headers().get(CONTENT_TYPE).is_none());

        let response =
            ResponseDescriptor::canned(StatusCode::NOT_FOUND, &canned.empty).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }
}
