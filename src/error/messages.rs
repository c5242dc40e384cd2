//! Message registry.
//!
//! Messages are looked up by `module → type → key`. Every key raised by this
//! crate is listed in [`keys`] and registered in [`REGISTRY`]; a missing entry
//! is a bug in the caller, not something to recover from at runtime.

use super::taxonomy::{ErrorModule, ErrorModule as M, ErrorType, ErrorType as T};

/// Registry keys used across the crate.
pub mod keys {
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    pub const INVALID_DATA: &str = "INVALID_DATA";
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const NO_TOKEN: &str = "NO_TOKEN";
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const USER_EXISTS: &str = "USER_EXISTS";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    pub const ROUTE_NOT_FOUND: &str = "ROUTE_NOT_FOUND";
    pub const DUPLICATE_KEY: &str = "DUPLICATE_KEY";
    pub const DUPLICATE_EMAIL: &str = "DUPLICATE_EMAIL";
    pub const QUERY_ERROR: &str = "QUERY_ERROR";
    pub const CONNECTION_ERROR: &str = "CONNECTION_ERROR";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const OPERATION_ERROR: &str = "OPERATION_ERROR";
    pub const PAYLOAD_TOO_DEEP: &str = "PAYLOAD_TOO_DEEP";
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    pub const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
    pub const REQUEST_REJECTED: &str = "REQUEST_REJECTED";
    pub const INVALID_URL: &str = "INVALID_URL";
    pub const SQL_INJECTION: &str = "SQL_INJECTION";
    pub const NOSQL_INJECTION: &str = "NOSQL_INJECTION";
    pub const COMMAND_INJECTION: &str = "COMMAND_INJECTION";
    pub const PROTOTYPE_POLLUTION: &str = "PROTOTYPE_POLLUTION";
    pub const SSRF_DETECTED: &str = "SSRF_DETECTED";
    pub const INVALID_URL_PARAM: &str = "INVALID_URL_PARAM";
    pub const NO_SESSION: &str = "NO_SESSION";
    pub const TOKEN_MISSING: &str = "TOKEN_MISSING";
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
}

use self::keys::*;

/// `(module, type, key, text)` rows.
pub static REGISTRY: &[(ErrorModule, ErrorType, &str, &str)] = &[
    // USER
    (M::User, T::Validation, INVALID_INPUT, "Invalid user input"),
    (M::User, T::Validation, DUPLICATE_EMAIL, "Email already exists"),
    (M::User, T::Authentication, INVALID_CREDENTIALS, "Invalid email or password"),
    (M::User, T::Authorization, UNAUTHORIZED, "You are not authorized to perform this action"),
    (M::User, T::NotFound, USER_NOT_FOUND, "User not found"),
    (M::User, T::Conflict, USER_EXISTS, "User with this email already exists"),
    // AUTH
    (M::Auth, T::Validation, INVALID_INPUT, "Invalid authentication input"),
    (M::Auth, T::Authentication, NO_TOKEN, "No authentication token provided"),
    (M::Auth, T::Authentication, INVALID_TOKEN, "Invalid authentication token"),
    (M::Auth, T::Authentication, TOKEN_EXPIRED, "Authentication token has expired"),
    (M::Auth, T::Authentication, INVALID_CREDENTIALS, "Invalid email or password"),
    (M::Auth, T::Authorization, UNAUTHORIZED, "You are not authorized to perform this action"),
    // DATABASE
    (M::Database, T::Validation, INVALID_INPUT, "Invalid database input"),
    (M::Database, T::Validation, INVALID_DATA, "Invalid data format"),
    (M::Database, T::NotFound, RESOURCE_NOT_FOUND, "Resource not found"),
    (M::Database, T::Conflict, DUPLICATE_KEY, "Duplicate key error"),
    (M::Database, T::Conflict, DUPLICATE_EMAIL, "Email already exists"),
    (M::Database, T::Internal, QUERY_ERROR, "Database query error"),
    (M::Database, T::Internal, CONNECTION_ERROR, "Database connection error"),
    // VALIDATION
    (M::Validation, T::Validation, INVALID_INPUT, "Invalid input data"),
    // SYSTEM
    (M::System, T::Validation, INVALID_INPUT, "Invalid input data"),
    (M::System, T::Validation, INVALID_CONFIG, "Invalid configuration"),
    (M::System, T::NotFound, ROUTE_NOT_FOUND, "Route not found"),
    (M::System, T::Internal, SERVER_ERROR, "Internal server error"),
    (M::System, T::Internal, REQUEST_TIMEOUT, "Request timed out"),
    (M::System, T::Validation, REQUEST_REJECTED, "Request rejected"),
    (M::System, T::TooManyRequests, RATE_LIMIT_EXCEEDED, "Too many requests, please try again later"),
    // CACHE
    (M::Cache, T::Internal, CONNECTION_ERROR, "Cache connection error"),
    (M::Cache, T::Internal, OPERATION_ERROR, "Cache operation error"),
    // SECURITY
    (M::Security, T::Validation, PAYLOAD_TOO_DEEP, "Request payload is nested too deeply"),
    (M::Security, T::Validation, PAYLOAD_TOO_LARGE, "Request payload is too large"),
    (M::Security, T::Security, INVALID_URL, "Invalid URL detected"),
    (M::Security, T::Injection, SQL_INJECTION, "SQL injection attempt detected"),
    (M::Security, T::Injection, NOSQL_INJECTION, "NoSQL injection attempt detected"),
    (M::Security, T::Injection, COMMAND_INJECTION, "Command injection attempt detected"),
    (M::Security, T::Injection, PROTOTYPE_POLLUTION, "Prototype pollution attempt detected"),
    (M::Security, T::Injection, SSRF_DETECTED, "SSRF attempt detected"),
    (M::Security, T::Ssrf, INVALID_URL_PARAM, "Invalid URL parameter"),
    (M::Security, T::Csrf, NO_SESSION, "No session found"),
    (M::Security, T::Csrf, TOKEN_MISSING, "No CSRF token found"),
    (M::Security, T::Csrf, TOKEN_EXPIRED, "CSRF token expired"),
    (M::Security, T::Csrf, TOKEN_INVALID, "Invalid CSRF token"),
];

/// Look up a message, returning `None` when nothing is registered.
pub fn lookup(module: ErrorModule, ty: ErrorType, key: &str) -> Option<&'static str> {
    REGISTRY
        .iter()
        .find(|(m, t, k, _)| *m == module && *t == ty && *k == key)
        .map(|(_, _, _, text)| *text)
}

/// Resolve a message that the caller knows is registered.
///
/// # Panics
/// Panics when the `(module, type, key)` triple has no entry.
pub fn resolve(module: ErrorModule, ty: ErrorType, key: &str) -> &'static str {
    lookup(module, ty, key)
        .unwrap_or_else(|| panic!("no message registered for {module}/{ty}/{key}"))
}
