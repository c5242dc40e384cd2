//! The request as the screening pipeline sees it.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method};
use serde_json::{Map, Value};

use super::query;
use crate::error::InputValidationError;
use crate::http::session::Session;

/// How a request body is decoded into a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
    /// Anything else; passed through unscreened.
    Opaque,
}

impl BodyKind {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || mime.ends_with("+json") {
            BodyKind::Json
        } else if mime == "application/x-www-form-urlencoded" {
            BodyKind::Form
        } else {
            BodyKind::Opaque
        }
    }

    /// Decode raw bytes. An empty body is `Null` for every kind.
    pub fn decode(self, bytes: &[u8]) -> Result<Value, InputValidationError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        match self {
            BodyKind::Json => Ok(serde_json::from_slice(bytes)?),
            BodyKind::Form => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| InputValidationError::single("body", e.to_string()))?;
                Ok(query::parse(text))
            }
            BodyKind::Opaque => Ok(Value::Null),
        }
    }

    /// Encode a tree back into a body of this kind.
    pub fn encode(self, value: &Value) -> Option<Bytes> {
        match self {
            BodyKind::Json => serde_json::to_vec(value).ok().map(Bytes::from),
            BodyKind::Form => Some(Bytes::from(query::encode(value))),
            BodyKind::Opaque => None,
        }
    }
}

/// `{query, body, path_params, headers, session}` of one request.
#[derive(Debug, Clone, Default)]
pub struct RequestView {
    pub method: Method,
    pub query: Value,
    pub body: Value,
    pub path_params: Value,
    pub headers: HeaderMap,
    pub session: Option<Session>,
}

impl RequestView {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: Value::Object(Map::new()),
            body: Value::Null,
            path_params: Value::Object(Map::new()),
            headers: HeaderMap::new(),
            session: None,
        }
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_path_params(mut self, path_params: Value) -> Self {
        self.path_params = path_params;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// The three screened trees, in inspection order.
    pub fn sources(&self) -> [(&'static str, &Value); 3] {
        [
            ("query", &self.query),
            ("body", &self.body),
            ("path_params", &self.path_params),
        ]
    }

    /// Build path params from `(name, value)` pairs.
    pub fn params_tree<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Value {
        Value::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        )
    }
}
