//! Injection detectors.
//!
//! Each detector walks `query`, `body` and `path_params` and tests every
//! string leaf against its category's table. The NoSQL and prototype
//! detectors test mapping keys as well. The first hit raises an
//! `INJECTION/SECURITY` 400 and stops the walk.

use axum::http::StatusCode;
use serde_json::Value;

use super::patterns::{Category, PatternSet, PatternTable};
use crate::error::{messages::keys, ClassifiedError, ErrorModule, ErrorSource, ErrorType};
use crate::payload::RequestView;

/// A detector hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub category: Category,
    /// `query`, `body` or `path_params`.
    pub location: &'static str,
    /// Name of the pattern that matched.
    pub pattern: String,
}

/// Find the first key or leaf in `tree` matched by `table`.
fn scan_tree<'t>(table: &'t PatternTable, tree: &Value, check_keys: bool) -> Option<&'t str> {
    match tree {
        Value::String(s) => table.first_match(s).map(|p| p.name.as_str()),
        Value::Array(items) => items
            .iter()
            .find_map(|item| scan_tree(table, item, check_keys)),
        Value::Object(map) => map.iter().find_map(|(key, child)| {
            let key_hit = if check_keys {
                table.first_match(key).map(|p| p.name.as_str())
            } else {
                None
            };
            key_hit.or_else(|| scan_tree(table, child, check_keys))
        }),
        _ => None,
    }
}

/// Scan every source of a request with one table.
pub fn scan(table: &PatternTable, view: &RequestView, check_keys: bool) -> Option<Detection> {
    view.sources().into_iter().find_map(|(location, tree)| {
        scan_tree(table, tree, check_keys).map(|pattern| Detection {
            category: table.category(),
            location,
            pattern: pattern.to_string(),
        })
    })
}

fn reject(detection: Detection, key: &str, method: &str) -> ClassifiedError {
    tracing::warn!(
        category = %detection.category,
        location = detection.location,
        pattern = %detection.pattern,
        "Injection attempt blocked"
    );
    crate::observability::metrics::record_blocked(&detection.category.to_string());

    ClassifiedError::registered(
        ErrorType::Injection,
        ErrorModule::Security,
        key,
        StatusCode::BAD_REQUEST,
    )
    .with_origin(ErrorSource::method(ErrorModule::Security, method))
    .with_detail("location", detection.location)
}

pub fn sql_injection_protection(
    view: &RequestView,
    patterns: &PatternSet,
) -> Result<(), ClassifiedError> {
    match scan(&patterns.sql, view, false) {
        Some(hit) => Err(reject(hit, keys::SQL_INJECTION, "sql_injection_protection")),
        None => Ok(()),
    }
}

pub fn nosql_injection_protection(
    view: &RequestView,
    patterns: &PatternSet,
) -> Result<(), ClassifiedError> {
    match scan(&patterns.nosql, view, true) {
        Some(hit) => Err(reject(hit, keys::NOSQL_INJECTION, "nosql_injection_protection")),
        None => Ok(()),
    }
}

pub fn command_injection_protection(
    view: &RequestView,
    patterns: &PatternSet,
) -> Result<(), ClassifiedError> {
    match scan(&patterns.command, view, false) {
        Some(hit) => Err(reject(hit, keys::COMMAND_INJECTION, "command_injection_protection")),
        None => Ok(()),
    }
}

pub fn prototype_pollution_protection(
    view: &RequestView,
    patterns: &PatternSet,
) -> Result<(), ClassifiedError> {
    match scan(&patterns.prototype, view, true) {
        Some(hit) => Err(reject(
            hit,
            keys::PROTOTYPE_POLLUTION,
            "prototype_pollution_protection",
        )),
        None => Ok(()),
    }
}
