//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → request.rs (propagate or mint request ID)
//!     → error translation (see `error`)
//!     → session.rs (attach or mint the session)
//!     → middleware/screening.rs (security pipeline, sanitized rewrite)
//!     → middleware/auth.rs (per-route credential and role checks)
//!     → embedder routes
//! ```

pub mod middleware;
pub mod request;
pub mod server;
pub mod session;

pub use middleware::{require_auth, restrict_to, AllowedRoles, Screened};
pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
pub use session::Session;
