//! Permanent-redirect HTTP engine backed by a persistent path → target store.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod store;

pub use config::EngineConfig;
pub use http::{Dispatcher, RequestHandler};
pub use lifecycle::{Engine, EngineError};
pub use store::{RedirectStore, RedirectWriter};
