//! Authorized dispatch and failure recovery.
//!
//! [`with_authorized_client`] is the gate every protected operation goes
//! through: the operation only ever runs with a resolved access token and a
//! fresh per-request [`ClientHandle`]. Sessions without a token are sent
//! into the authorization flow instead, with the intended path recorded so
//! the provider callback can return them there.

use std::future::Future;

use axum::response::{IntoResponse, Redirect, Response};
use uuid::Uuid;

use ledgerlink_auth::{AuthError, AuthResult, ClientHandle, Scope};

use crate::state::AppState;

/// Runs `op` with an authorized client handle, or redirects into the
/// authorization flow.
///
/// Invariants: `op` is never invoked without an access token, and at most
/// once per call; a fresh handle is constructed from this session's token
/// pair and never shared.
pub async fn with_authorized_client<F, Fut>(
    state: &AppState,
    session_id: Uuid,
    intended_path: &str,
    op: F,
) -> Response
where
    F: FnOnce(ClientHandle) -> Fut,
    Fut: Future<Output = AuthResult<Response>>,
{
    let session = match state.sessions.get(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            return error_redirect("session expired, please retry");
        }
        Err(e) => return error_redirect(&e.to_string()),
    };

    let Some(access) = session.access_token() else {
        return authorize_redirect(state, session_id, intended_path).await;
    };

    let handle = match ClientHandle::new(state.config.clone(), access) {
        Ok(handle) => handle,
        Err(e) => return recover(state, session_id, intended_path, e).await,
    };
    match op(handle).await {
        Ok(response) => {
            // The redirect hint is single-use; drop anything stale once an
            // authorized request completes.
            let _ = state.sessions.take_return_to(session_id).await;
            response
        }
        Err(err) => recover(state, session_id, intended_path, err).await,
    }
}

/// Starts the authorization flow: obtains a request token, stores the
/// pending pair plus `return_to`, and redirects to the provider's
/// authorize page.
pub async fn authorize_redirect(state: &AppState, session_id: Uuid, return_to: &str) -> Response {
    let request = match state.authorizer.request_token().await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "request token call failed");
            return error_redirect(&e.to_string());
        }
    };
    let token = request.token.clone();
    if let Err(e) = state
        .sessions
        .begin_authorization(session_id, request, return_to)
        .await
    {
        return error_redirect(&e.to_string());
    }
    match state.authorizer.build_authorize_url(&token, &Scope::accounting()) {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => error_redirect(&e.to_string()),
    }
}

/// Classifies a failed authorized call.
///
/// A provider token rejection clears the held access token and re-enters
/// the authorization flow for the originally intended path; every other
/// failure surfaces on the generic error view with the session untouched.
pub async fn recover(
    state: &AppState,
    session_id: Uuid,
    intended_path: &str,
    err: AuthError,
) -> Response {
    if err.is_token_rejected() {
        tracing::info!(session = %session_id, path = intended_path, "access token rejected, re-authorizing");
        if let Err(e) = state.sessions.invalidate_access(session_id).await {
            return error_redirect(&e.to_string());
        }
        return authorize_redirect(state, session_id, intended_path).await;
    }
    tracing::warn!(error = %err, path = intended_path, "authorized operation failed");
    error_redirect(&err.to_string())
}

/// Redirects to the generic error view with the message attached.
pub fn error_redirect(message: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(message.as_bytes()).collect();
    Redirect::to(&format!("/error?error={encoded}")).into_response()
}
