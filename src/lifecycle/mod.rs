//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (engine.rs):
//!     Open store → Build canned responses → Start listener
//!
//! Shutdown (engine.rs, shutdown.rs):
//!     Signal received → Stop accepting → Drain connections
//!         → Release canned responses → Close store
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener starts last (traffic only when ready) and stops first
//! - Drain has a deadline; the store refuses to close while still in use

pub mod engine;
pub mod shutdown;
pub mod signals;

pub use engine::{Engine, EngineError, EngineState};
pub use shutdown::{Shutdown, ShutdownSignal};
