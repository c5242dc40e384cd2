//! Outbound URL validation for handlers that fetch user-supplied URLs.

use axum::http::StatusCode;
use lazy_static::lazy_static;
use std::sync::Arc;
use url::Url;

use super::patterns::{Category, PatternTable, Signature};
use super::ssrf::{address_blocked, Resolver, SystemResolver};
use crate::error::{messages::keys, ClassifiedError, ErrorModule, ErrorSource, ErrorType};

/// The SSRF host table plus the unspecified IPv6 prefix.
static BLOCKED_RANGES: &[Signature] = &[
    Signature { name: "unspecified_v4", pattern: r"^0\.0\.0\.0" },
    Signature { name: "loopback_v4", pattern: r"^127\." },
    Signature { name: "private_10", pattern: r"^10\." },
    Signature { name: "private_172", pattern: r"^172\.(1[6-9]|2[0-9]|3[0-1])\." },
    Signature { name: "private_192", pattern: r"^192\.168\." },
    Signature { name: "link_local_v4", pattern: r"^169\.254\." },
    Signature { name: "unique_local_v6", pattern: r"(?i)^f[cd][0-9a-f]{0,2}:" },
    Signature { name: "link_local_v6", pattern: r"(?i)^fe[89ab][0-9a-f]?:" },
    Signature { name: "loopback_v6", pattern: r"^::1$" },
    Signature { name: "unspecified_v6", pattern: r"^::" },
];

lazy_static! {
    static ref BLOCKED_TABLE: PatternTable =
        PatternTable::from_signatures(Category::SsrfHost, BLOCKED_RANGES);
}

/// What an outbound URL may look like.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    pub allowed_schemes: Vec<String>,
    /// Empty means any domain.
    pub allowed_domains: Vec<String>,
    pub check_dns: bool,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            allowed_domains: Vec::new(),
            check_dns: true,
        }
    }
}

pub struct UrlValidator {
    resolver: Arc<dyn Resolver>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new(Arc::new(SystemResolver))
    }
}

impl UrlValidator {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// True when `url` parses, uses an allowed scheme and domain, and (with
    /// `check_dns`) its first resolved address is outside the blocked ranges.
    ///
    /// Unlike the request guard, a URL that does not resolve is rejected.
    pub async fn validate_url(&self, url: &str, policy: &UrlPolicy) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        if !policy.allowed_schemes.iter().any(|s| s == parsed.scheme()) {
            return false;
        }

        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if !policy.allowed_domains.is_empty()
            && !policy.allowed_domains.iter().any(|d| d.eq_ignore_ascii_case(host))
        {
            return false;
        }

        if policy.check_dns {
            let first = match self.resolver.resolve(host).await {
                Ok(addresses) => addresses.into_iter().next(),
                Err(e) => {
                    tracing::debug!(host = %host, error = %e, "URL host did not resolve");
                    None
                }
            };
            match first {
                Some(ip) if !address_blocked(&BLOCKED_TABLE, ip) => {}
                _ => return false,
            }
        }

        true
    }
}

/// Drop credentials and fragment from a URL.
pub fn sanitize_url(url: &str) -> Result<String, ClassifiedError> {
    let mut parsed = Url::parse(url).map_err(|_| {
        ClassifiedError::registered(
            ErrorType::Ssrf,
            ErrorModule::Security,
            keys::INVALID_URL_PARAM,
            StatusCode::BAD_REQUEST,
        )
        .with_origin(ErrorSource::method(ErrorModule::Security, "sanitize_url"))
    })?;

    // Both only fail for URLs without a host, which carry no credentials.
    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    parsed.set_fragment(None);

    Ok(parsed.to_string())
}
