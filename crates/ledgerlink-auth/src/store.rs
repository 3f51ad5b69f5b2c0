//! Session storage.
//!
//! The store exposes domain-level mutations rather than raw read/write so
//! every implementation can keep each transition atomic. That is what makes
//! a double-submitted provider callback safe: the second completion runs
//! against the already-consumed state and fails with `TokenMismatch`
//! instead of corrupting the session.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::session::{AccessTokenPair, RequestToken, Session};

/// Storage for per-session authorization state.
///
/// Implementations must apply each mutation atomically with respect to
/// concurrent requests for the same session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates and stores a fresh unauthenticated session.
    async fn create(&self) -> AuthResult<Session>;

    /// Looks up a session by id.
    async fn get(&self, id: Uuid) -> AuthResult<Option<Session>>;

    /// Records a pending request token and the return-to path.
    async fn begin_authorization(
        &self,
        id: Uuid,
        request: RequestToken,
        return_to: &str,
    ) -> AuthResult<()>;

    /// Returns the pending request token pair if `callback_token` matches
    /// it, without consuming it.
    ///
    /// # Errors
    ///
    /// [`AuthError::TokenMismatch`] when nothing is pending or the token
    /// differs.
    async fn match_pending(&self, id: Uuid, callback_token: &str) -> AuthResult<RequestToken>;

    /// Transitions the session to `Authenticated`, re-validating the
    /// callback token under the store's lock.
    async fn complete_authorization(
        &self,
        id: Uuid,
        callback_token: &str,
        access: AccessTokenPair,
    ) -> AuthResult<()>;

    /// Drops the held access token, forcing re-authorization.
    async fn invalidate_access(&self, id: Uuid) -> AuthResult<()>;

    /// Takes the single-use return-to hint.
    async fn take_return_to(&self, id: Uuid) -> AuthResult<Option<String>>;
}

/// In-memory, process-scoped session store.
///
/// Sessions are lost on restart; tokens are simply re-obtained. The DashMap
/// entry reference gives each mutation exclusive access to its session,
/// serializing concurrent callback delivery.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<Uuid, Session>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_session<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> AuthResult<R>,
    ) -> AuthResult<R> {
        let mut entry = self.sessions.get_mut(&id).ok_or(AuthError::Storage {
            message: format!("session {id} not found"),
        })?;
        f(entry.value_mut())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self) -> AuthResult<Session> {
        let session = Session::new();
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> AuthResult<Option<Session>> {
        Ok(self.sessions.get(&id).map(|s| s.value().clone()))
    }

    async fn begin_authorization(
        &self,
        id: Uuid,
        request: RequestToken,
        return_to: &str,
    ) -> AuthResult<()> {
        self.with_session(id, |session| {
            session.begin_authorization(request, return_to);
            Ok(())
        })
    }

    async fn match_pending(&self, id: Uuid, callback_token: &str) -> AuthResult<RequestToken> {
        self.with_session(id, |session| session.match_pending(callback_token))
    }

    async fn complete_authorization(
        &self,
        id: Uuid,
        callback_token: &str,
        access: AccessTokenPair,
    ) -> AuthResult<()> {
        self.with_session(id, |session| {
            session.complete_authorization(callback_token, access)
        })
    }

    async fn invalidate_access(&self, id: Uuid) -> AuthResult<()> {
        self.with_session(id, |session| {
            session.invalidate_access();
            Ok(())
        })
    }

    async fn take_return_to(&self, id: Uuid) -> AuthResult<Option<String>> {
        self.with_session(id, |session| Ok(session.take_return_to()))
    }
}
