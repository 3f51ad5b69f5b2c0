//! HTTP server for LedgerLink.
//!
//! Route handlers are thin: each one resolves the browser session, goes
//! through the authorized dispatcher ([`dispatch::with_authorized_client`])
//! and maps the provider response onto a server-rendered HTML view. All
//! token lifecycle logic lives in `ledgerlink-auth`.

pub mod dispatch;
pub mod observability;
pub mod routes;
pub mod session_cookie;
pub mod state;
pub mod views;

pub use routes::app;
pub use state::AppState;
