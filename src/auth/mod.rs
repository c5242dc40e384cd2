//! Bearer credential verification.
//!
//! The guard only consumes verification: tokens are issued elsewhere. A
//! verifier answers "who is this" or fails with a [`CredentialError`] that
//! distinguishes malformed from expired credentials.
//!
//! [`CredentialError`]: crate::error::CredentialError

mod verifier;

pub use verifier::{AuthenticatedUser, Claims, JwtVerifier, TokenVerifier};
