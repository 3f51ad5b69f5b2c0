//! Browser session cookie handling.
//!
//! Sessions are keyed by an opaque UUID carried in an HttpOnly cookie,
//! created on first contact. A stale cookie pointing at a session the
//! store no longer knows (e.g. after a restart) is replaced transparently.

use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use uuid::Uuid;

use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "ledgerlink_session";

/// Resolves the request's session, creating one if needed.
///
/// Returns the session id plus the jar to attach to the response (it
/// carries the new cookie when a session was created).
pub async fn resolve(state: &AppState, jar: CookieJar) -> (Uuid, CookieJar) {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME)
        && let Ok(id) = Uuid::parse_str(cookie.value())
        && let Ok(Some(_)) = state.sessions.get(id).await
    {
        return (id, jar);
    }

    let session = match state.sessions.create().await {
        Ok(session) => session,
        Err(e) => {
            // Unsaved fallback: later mutations fail with a storage error.
            tracing::error!(error = %e, "session creation failed");
            ledgerlink_auth::Session::new()
        }
    };
    let cookie = Cookie::build((SESSION_COOKIE_NAME, session.id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (session.id, jar.add(cookie))
}
