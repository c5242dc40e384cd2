//! Error taxonomy and translation.
//!
//! Every failure a request can produce is either raised as a
//! [`ClassifiedError`] or surfaced as one of the native [`Failure`] shapes and
//! classified later by the [`Translator`].

mod classified;
mod failure;
pub mod messages;
mod taxonomy;
mod translate;

pub use classified::ClassifiedError;
pub use failure::{
    CredentialError, Failure, FieldIssue, InputValidationError, PendingFailure, PersistenceError,
    Rejection,
};
pub use taxonomy::{ErrorModule, ErrorSource, ErrorType};
pub use translate::{
    internal_error, payload_too_large, translate_failures, ErrorBody, RequestContext, Translator,
};
