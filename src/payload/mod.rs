//! Payload trees and the request view the screening pipeline inspects.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → query.rs (decode query string / form body into a tree)
//!     → view.rs (assemble query, body, path params, headers, session)
//!     → depth check (reject over-deep trees)
//!     → sanitizer.rs (strip forbidden keys and characters)
//!     → detectors and SSRF guard (see `security`)
//! ```
//!
//! # Design Decisions
//! - Trees are `serde_json::Value`; they cannot contain cycles
//! - Every traversal is bounded by a maximum depth and over-deep input is
//!   rejected, never truncated

pub mod query;
pub mod sanitizer;
pub mod view;

use axum::http::StatusCode;
use serde_json::Value;

use crate::error::{messages::keys, ClassifiedError, ErrorModule, ErrorSource, ErrorType};

pub use sanitizer::{sanitize, sanitize_string};
pub use view::RequestView;

/// Nesting depth of a tree. Scalars are depth 0, `{"a": 1}` is depth 1.
pub fn depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// True when `value` nests deeper than `max_depth`. Stops descending as soon
/// as the limit is crossed.
pub fn exceeds_depth(value: &Value, max_depth: usize) -> bool {
    fn walk(value: &Value, remaining: usize) -> bool {
        let children: Box<dyn Iterator<Item = &Value>> = match value {
            Value::Object(map) => Box::new(map.values()),
            Value::Array(items) => Box::new(items.iter()),
            _ => return false,
        };
        if remaining == 0 {
            return true;
        }
        children.into_iter().any(|child| walk(child, remaining - 1))
    }
    walk(value, max_depth)
}

/// Reject a tree nested deeper than `max_depth`.
pub fn ensure_depth(value: &Value, max_depth: usize) -> Result<(), ClassifiedError> {
    if exceeds_depth(value, max_depth) {
        return Err(ClassifiedError::registered(
            ErrorType::Validation,
            ErrorModule::Security,
            keys::PAYLOAD_TOO_DEEP,
            StatusCode::BAD_REQUEST,
        )
        .with_origin(ErrorSource::method(ErrorModule::Security, "ensure_depth"))
        .with_detail("maxDepth", max_depth));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested(levels: usize) -> Value {
        let mut value = json!("leaf");
        for _ in 0..levels {
            value = json!({ "n": value });
        }
        value
    }

    #[test]
    fn test_depth_counts_containers() {
        assert_eq!(depth(&json!("x")), 0);
        assert_eq!(depth(&json!({})), 1);
        assert_eq!(depth(&json!({ "a": [1, { "b": 2 }] })), 3);
        assert_eq!(depth(&nested(10)), 10);
    }

    #[test]
    fn test_exceeds_matches_depth() {
        for levels in 0..8 {
            let tree = nested(levels);
            for limit in 0..8 {
                assert_eq!(exceeds_depth(&tree, limit), depth(&tree) > limit);
            }
        }
    }

    #[test]
    fn test_ensure_depth_rejects_with_limit() {
        assert!(ensure_depth(&nested(4), 4).is_ok());

        let err = ensure_depth(&nested(5), 4).unwrap_err();
        assert_eq!(err.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(err.error_type, ErrorType::Validation);
        assert_eq!(err.module, ErrorModule::Security);
        assert_eq!(err.details.unwrap()["maxDepth"], 4);
    }
}
