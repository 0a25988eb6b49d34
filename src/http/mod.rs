//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, Axum router, request ID, tracing)
//!     → dispatcher.rs (method check, store lookup)
//!     → response.rs (canned or transient response)
//!     → delivery.rs (undelivered responses reported to the handler)
//!     → Send to client
//! ```

mod delivery;
pub mod dispatcher;
pub mod response;
pub mod server;

pub use dispatcher::{Dispatcher, RequestHandler};
pub use response::{build_redirect, CannedResponses, ResponseDescriptor, TransientResponse};
pub use server::{HttpServer, ListenerHandle};
