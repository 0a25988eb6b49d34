//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (port, home dir, log level)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the engine is initialized
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    EngineConfig, ListenerConfig, LogFormat, ObservabilityConfig, StoreConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
