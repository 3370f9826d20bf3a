//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or constructor arguments
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → consumed once by LimitingProxy::start
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a proxy is constructed
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackendConfig, ListenerConfig, ObservabilityConfig, PolicyConfig, ProxyConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
