//! Per-session authorization state machine.
//!
//! The state a session can be in is an explicit tagged enum rather than a
//! collection of optional token fields:
//!
//! ```text
//! Unauthenticated --request token stored--> Pending
//! Pending --callback verifier matches, exchange succeeds--> Authenticated
//! Pending --callback token mismatch / no verifier--> Unauthenticated (error surfaced)
//! Authenticated --provider rejects token--> Unauthenticated (re-authorization)
//! ```
//!
//! Every transition is a method returning a `Result`; a failed transition
//! leaves the session untouched.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// A pending request token pair issued by the provider (first leg).
///
/// Exists only between the authorize redirect and the provider callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToken {
    /// Temporary request token.
    pub token: String,
    /// Secret paired with the request token.
    pub secret: String,
}

/// An exchanged access token pair (third leg).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenPair {
    /// Long-lived access token.
    pub token: String,
    /// Secret paired with the access token.
    pub secret: String,
}

/// Authorization state of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AuthState {
    /// No tokens held. Protected operations trigger authorization.
    #[default]
    Unauthenticated,
    /// A request token has been issued and the user was redirected to the
    /// provider's authorize page.
    Pending {
        /// Request token awaiting approval.
        request_token: String,
        /// Secret paired with the request token.
        request_secret: String,
    },
    /// The verifier was exchanged; authorized calls are possible.
    Authenticated {
        /// Access token attached to every authorized call.
        access_token: String,
        /// Secret paired with the access token.
        access_secret: String,
    },
}

/// Server-held state for one browser client, keyed by an opaque cookie id.
///
/// Never persisted beyond process lifetime; after a restart tokens are
/// simply re-obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier (stored in the cookie).
    pub id: Uuid,
    /// Current authorization state.
    pub state: AuthState,
    /// Single-use redirect hint recorded when authorization begins.
    pub return_to: Option<String>,
    /// Timestamp when the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Timestamp of the last state change.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Session {
    /// Creates a fresh unauthenticated session.
    #[must_use]
    pub fn new() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            state: AuthState::Unauthenticated,
            return_to: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if an access token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated { .. })
    }

    /// Returns the held access token pair, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<AccessTokenPair> {
        match &self.state {
            AuthState::Authenticated {
                access_token,
                access_secret,
            } => Some(AccessTokenPair {
                token: access_token.clone(),
                secret: access_secret.clone(),
            }),
            _ => None,
        }
    }

    /// Records a freshly issued request token and the path to return to
    /// once the provider calls back. Allowed from any state: a session that
    /// lost its access token re-enters authorization the same way.
    pub fn begin_authorization(&mut self, request: RequestToken, return_to: impl Into<String>) {
        self.state = AuthState::Pending {
            request_token: request.token,
            request_secret: request.secret,
        };
        self.return_to = Some(return_to.into());
        self.touch();
    }

    /// Consumes the pending request token if `callback_token` matches it,
    /// returning the stored secret needed for the verifier exchange.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenMismatch`] when no authorization is pending or the
    /// callback carries a different token. The session is not mutated in
    /// that case, so a concurrent duplicate callback fails cleanly.
    pub fn match_pending(&self, callback_token: &str) -> AuthResult<RequestToken> {
        match &self.state {
            AuthState::Pending {
                request_token,
                request_secret,
            } if request_token == callback_token => Ok(RequestToken {
                token: request_token.clone(),
                secret: request_secret.clone(),
            }),
            _ => Err(AuthError::TokenMismatch),
        }
    }

    /// Completes authorization: Pending → Authenticated.
    ///
    /// The caller must have matched the callback token via
    /// [`Session::match_pending`] first; this method re-checks so the
    /// transition stays atomic under the store's lock.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenMismatch`] when the session is not pending on
    /// `callback_token`; `access_token` fields are never mutated then.
    pub fn complete_authorization(
        &mut self,
        callback_token: &str,
        access: AccessTokenPair,
    ) -> AuthResult<()> {
        self.match_pending(callback_token)?;
        self.state = AuthState::Authenticated {
            access_token: access.token,
            access_secret: access.secret,
        };
        self.touch();
        Ok(())
    }

    /// Drops the held access token: Authenticated → Unauthenticated.
    ///
    /// Called when the provider rejects the token; the next protected
    /// operation re-enters the authorization flow.
    pub fn invalidate_access(&mut self) {
        self.state = AuthState::Unauthenticated;
        self.touch();
    }

    /// Takes the single-use redirect hint.
    pub fn take_return_to(&mut self) -> Option<String> {
        self.return_to.take()
    }

    fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
