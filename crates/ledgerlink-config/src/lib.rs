//! Configuration loading and validation for LedgerLink.
//!
//! Configuration is resolved once at process start from a TOML file layered
//! with `LEDGERLINK__`-prefixed environment variables, producing an immutable
//! [`AppConfig`] value that is passed explicitly to every component that
//! needs it. Nothing in this crate mutates configuration after load.
//!
//! Exactly one application type is active per process: `public` (direct
//! flow) or `partner` (delegated flow). Each type carries its own provider
//! credential bundle.

pub mod error;
pub mod loader;
mod types;

pub use error::ConfigError;
pub use loader::{DEFAULT_CONFIG_FILE, load_config};
pub use types::{
    AppConfig, AppType, LoggingConfig, ProviderCredentials, ProviderEndpoints, ServerConfig,
};
