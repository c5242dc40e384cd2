//! Request middleware.
//!
//! - `screening`: runs the security pipeline and rewrites the request
//! - `auth`: bearer credential checks and role guards

pub mod auth;
pub mod screening;

pub use auth::{require_auth, restrict_to, AllowedRoles};
pub use screening::{screen_request, Screened, Screening};
