//! Authorization and provider error types.
//!
//! Classification happens at the boundary where the raw provider response
//! is parsed, never by matching human-readable message text downstream.

/// Result alias for authorization operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Provider `oauth_problem` codes that invalidate the held access token.
const TOKEN_REJECTED_PROBLEMS: &[&str] = &["token_rejected", "token_expired", "token_revoked"];

/// Errors that can occur during authorization and provider calls.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider could not be reached, timed out, or answered 5xx.
    /// Retryable by re-issuing the call.
    #[error("provider unavailable: {message}")]
    ProviderUnavailable {
        /// Description of the transport failure.
        message: String,
    },

    /// The provider signalled that the held access token is no longer
    /// valid. Recovery is re-authorization, not an error page.
    #[error("access token rejected by provider")]
    TokenRejected,

    /// A callback token did not match the session's pending request token,
    /// or no authorization is pending. No provider call is made.
    #[error("callback token does not match the pending request token")]
    TokenMismatch,

    /// The provider refused the verifier exchange.
    #[error("verifier exchange failed: {message}")]
    VerificationFailed {
        /// Description of the exchange failure.
        message: String,
    },

    /// The requested entity does not exist at the provider.
    #[error("resource not found: {resource}")]
    ResourceNotFound {
        /// The missing resource.
        resource: String,
    },

    /// The provider returned a structured problem other than a token
    /// rejection.
    #[error("provider error '{problem}': {message}")]
    Provider {
        /// Structured `oauth_problem` code.
        problem: String,
        /// Provider-supplied advice text.
        message: String,
    },

    /// The session store failed.
    #[error("session storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Builds an error from a structured provider problem code.
    ///
    /// Token invalidation codes map to [`AuthError::TokenRejected`];
    /// everything else is carried through as [`AuthError::Provider`].
    pub fn from_provider_problem(problem: &str, advice: &str) -> Self {
        if TOKEN_REJECTED_PROBLEMS.contains(&problem) {
            Self::TokenRejected
        } else {
            Self::Provider {
                problem: problem.to_string(),
                message: advice.to_string(),
            }
        }
    }

    /// Returns `true` if recovery is re-authorization rather than an error
    /// view.
    #[must_use]
    pub fn is_token_rejected(&self) -> bool {
        matches!(self, Self::TokenRejected)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::ProviderUnavailable {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_problems_classify_as_rejected() {
        for problem in ["token_rejected", "token_expired", "token_revoked"] {
            let err = AuthError::from_provider_problem(problem, "");
            assert!(err.is_token_rejected(), "{problem} should reject");
        }
    }

    #[test]
    fn other_problems_stay_structured() {
        let err = AuthError::from_provider_problem("nonce_used", "nonce already used");
        assert!(!err.is_token_rejected());
        match err {
            AuthError::Provider { problem, message } => {
                assert_eq!(problem, "nonce_used");
                assert_eq!(message, "nonce already used");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn mismatch_is_not_rejection() {
        assert!(!AuthError::TokenMismatch.is_token_rejected());
    }
}
