//! URL-encoded trees.
//!
//! Decodes `application/x-www-form-urlencoded` text (query strings and form
//! bodies) with bracket nesting: `a[b]=1` yields `{"a": {"b": "1"}}`,
//! `a[]=1&a[]=2` and `a=1&a=2` both yield `{"a": ["1", "2"]}`. Encoding goes
//! the other way so a sanitized tree can be written back onto the request.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Keys with more bracket segments than this are kept as flat keys.
const MAX_KEY_SEGMENTS: usize = 128;

/// Decode URL-encoded text into a tree. The root is always an object.
pub fn parse(raw: &str) -> Value {
    let mut root = Map::new();
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        let path = key_path(&key);
        let (first, rest) = match path.split_first() {
            Some(split) => split,
            None => continue,
        };
        let slot = root.entry(first.to_string()).or_insert(Value::Null);
        insert_at(slot, rest, Value::String(value.into_owned()));
    }
    Value::Object(root)
}

/// Split `a[b][]` into `["a", "b", ""]`. Malformed keys stay whole.
fn key_path(key: &str) -> Vec<&str> {
    let open = match key.find('[') {
        Some(open) if open > 0 && key.ends_with(']') => open,
        _ => return vec![key],
    };
    let mut path = vec![&key[..open]];
    path.extend(key[open + 1..key.len() - 1].split("]["));
    if path.len() > MAX_KEY_SEGMENTS {
        return vec![key];
    }
    path
}

fn insert_at(slot: &mut Value, path: &[&str], value: Value) {
    match path.split_first() {
        None => merge_leaf(slot, value),
        Some((&"", rest)) => {
            if !slot.is_array() {
                *slot = match slot.take() {
                    Value::Null => Value::Array(Vec::new()),
                    previous => Value::Array(vec![previous]),
                };
            }
            if let Value::Array(items) = slot {
                if rest.is_empty() {
                    items.push(value);
                } else {
                    items.push(Value::Null);
                    if let Some(last) = items.last_mut() {
                        insert_at(last, rest, value);
                    }
                }
            }
        }
        Some((segment, rest)) => {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                let child = map.entry(segment.to_string()).or_insert(Value::Null);
                insert_at(child, rest, value);
            }
        }
    }
}

fn merge_leaf(slot: &mut Value, value: Value) {
    match slot {
        Value::Null => *slot = value,
        Value::Array(items) => items.push(value),
        other => {
            let previous = other.take();
            *other = Value::Array(vec![previous, value]);
        }
    }
}

/// Encode a tree back to URL-encoded text.
///
/// Arrays of scalars repeat the key; nested containers use bracket keys.
pub fn encode(value: &Value) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Value::Object(map) = value {
        for (key, child) in map {
            encode_pair(&mut serializer, key.clone(), child);
        }
    }
    serializer.finish()
}

fn encode_pair(serializer: &mut form_urlencoded::Serializer<'_, String>, key: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (child_key, child) in map {
                encode_pair(serializer, format!("{key}[{child_key}]"), child);
            }
        }
        Value::Array(items) => {
            for item in items {
                let item_key = if item.is_object() || item.is_array() {
                    format!("{key}[]")
                } else {
                    key.clone()
                };
                encode_pair(serializer, item_key, item);
            }
        }
        Value::String(s) => {
            serializer.append_pair(&key, s);
        }
        Value::Null => {
            serializer.append_pair(&key, "");
        }
        scalar => {
            serializer.append_pair(&key, &scalar.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_and_repeated_keys() {
        assert_eq!(
            parse("a=1&b=two%20words&a=3"),
            json!({ "a": ["1", "3"], "b": "two words" })
        );
        assert_eq!(parse(""), json!({}));
    }

    #[test]
    fn test_bracket_nesting() {
        assert_eq!(
            parse("email%5B%24ne%5D=x&tags[]=a&tags[]=b&user[address][city]=Oslo"),
            json!({
                "email": { "$ne": "x" },
                "tags": ["a", "b"],
                "user": { "address": { "city": "Oslo" } }
            })
        );
        assert_eq!(parse("items[][id]=7"), json!({ "items": [{ "id": "7" }] }));
    }

    #[test]
    fn test_malformed_keys_stay_flat() {
        assert_eq!(parse("[x]=1&a[b=2"), json!({ "[x]": "1", "a[b": "2" }));
    }

    #[test]
    fn test_encode_reparses_to_same_tree() {
        let tree = json!({
            "q": "hello world",
            "ids": ["1", "2"],
            "filter": { "name": "a&b", "rows": [{ "n": "1" }] }
        });
        assert_eq!(parse(&encode(&tree)), tree);
        assert_eq!(encode(&json!({ "a": 1, "b": null })), "a=1&b=");
    }
}
