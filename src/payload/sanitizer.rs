//! Payload sanitizer.
//!
//! Produces a new tree with the same shape as its input, minus keys that
//! could poison object prototypes downstream and minus shell metacharacters
//! in string leaves. The input is never modified.

use serde_json::{Map, Value};

/// Keys dropped, together with their subtree, wherever they appear.
pub const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Shell separators, substitution, redirection and escape characters.
const STRIPPED_CHARS: [char; 8] = [';', '&', '|', '`', '$', '<', '>', '\\'];

pub fn is_forbidden_key(key: &str) -> bool {
    FORBIDDEN_KEYS
        .iter()
        .any(|forbidden| key.eq_ignore_ascii_case(forbidden))
}

/// Strip metacharacters from a string leaf and trim surrounding whitespace.
///
/// Removing `$` also removes every `$(` opener.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitize a whole tree.
///
/// Callers bound the depth first (see [`super::ensure_depth`]).
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_forbidden_key(key))
                .map(|(key, child)| (key.clone(), sanitize(child)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::String(s) => Value::String(sanitize_string(s)),
        other => other.clone(),
    }
}
