//! Anti-forgery tokens.
//!
//! # Data Flow
//! ```text
//! Safe-method response with a session:
//!     → manager.rs (generate, store, emit X-CSRF-Token)
//!
//! State-changing request:
//!     → manager.rs (session? stored? expired? matches?)
//!
//! Every cleanup interval:
//!     → sweeper.rs (drop expired records)
//! ```

pub mod manager;
pub mod store;
pub mod sweeper;

pub use manager::{generate_token, is_safe_method, CsrfManager};
pub use store::{InMemoryTokenStore, StoreError, TokenRecord, TokenStore};
pub use sweeper::{CleanupHandle, TokenSweeper};
