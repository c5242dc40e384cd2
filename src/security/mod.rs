//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request view:
//!     → payload sanitizer (strip forbidden keys and characters)
//!     → detectors.rs (SQL → NoSQL → command → prototype)
//!     → ssrf.rs (private hosts, literal or resolved)
//!     → csrf/ (per-session token check)
//!     → Pass to routes
//! ```
//!
//! # Design Decisions
//! - Fail closed on detection; fail open only when a hostname does not resolve
//! - Detection is heuristic; pattern tables are configurable and hot-swappable
//! - No trust in client input

pub mod csrf;
pub mod detectors;
pub mod patterns;
pub mod pipeline;
pub mod ssrf;
pub mod url_validator;

pub use patterns::{Category, PatternSet, PatternTable, SharedPatterns};
pub use pipeline::{PipelineSettings, SecurityPipeline};
pub use ssrf::{Resolver, SsrfGuard, SystemResolver};
pub use url_validator::{sanitize_url, UrlPolicy, UrlValidator};
