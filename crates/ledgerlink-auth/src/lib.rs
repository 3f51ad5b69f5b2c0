//! Session token lifecycle and authorized provider access for LedgerLink.
//!
//! This crate owns the only stateful part of the application: the
//! per-session authorization state machine and the three-legged token
//! exchange against the accounting provider.
//!
//! # Lifecycle
//!
//! 1. A session starts [`session::AuthState::Unauthenticated`]
//! 2. [`client::AuthorizationClient::request_token`] obtains a pending
//!    request token; the session moves to `Pending` and the user is
//!    redirected to the provider's authorize page
//! 3. The provider calls back with a verifier; the stored pending token is
//!    matched **before** any exchange call is made
//! 4. [`client::AuthorizationClient::exchange_verifier`] trades the
//!    verifier for an access token; the session becomes `Authenticated`
//! 5. A provider `token_rejected` response drops the session back to
//!    `Unauthenticated`, forcing re-authorization
//!
//! Authorized resource calls go through a per-request [`handle::ClientHandle`]
//! built from the immutable configuration plus that session's token pair.
//! Handles are never shared across sessions.

pub mod client;
pub mod error;
pub mod handle;
pub mod scope;
pub mod session;
pub mod signing;
pub mod store;

pub use client::AuthorizationClient;
pub use error::{AuthError, AuthResult};
pub use handle::ClientHandle;
pub use scope::Scope;
pub use session::{AccessTokenPair, AuthState, RequestToken, Session};
pub use store::{MemorySessionStore, SessionStore};
