//! Request screening and error translation for Axum services.
//!
//! Incoming requests pass a security pipeline (sanitizer, injection
//! detectors, SSRF guard, CSRF check) before reaching embedder routes, and
//! every failure leaves the service through one translator that renders a
//! classified JSON error.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod payload;
pub mod security;

pub use config::schema::GuardConfig;
pub use error::{ClassifiedError, Failure};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
