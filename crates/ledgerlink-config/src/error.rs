//! Configuration error types.

/// Errors that can occur while loading or validating configuration.
///
/// All variants are fatal at startup: the process cannot serve authorized
/// routes without a valid credential bundle.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No credential bundle is configured for the selected application type,
    /// in either the configuration file or the environment.
    #[error("no credentials configured for app type '{app_type}'")]
    Missing {
        /// The selected application type.
        app_type: String,
    },

    /// The configuration was present but failed validation.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Description of the validation failure.
        message: String,
    },

    /// The configuration sources could not be read or deserialized.
    #[error("configuration could not be loaded: {message}")]
    Unreadable {
        /// Description of the load failure.
        message: String,
    },
}
