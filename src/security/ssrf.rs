//! SSRF guard.
//!
//! # Responsibilities
//! - Pull a candidate host out of every string leaf (URL host, or the raw
//!   value when it is not a URL)
//! - Block candidates matching the private/loopback host table
//! - Resolve remaining hostnames and block when any address matches
//!
//! # Design Decisions
//! - Resolution failure is inconclusive and lets the request through
//! - Leaves are checked one after another; each distinct host is resolved
//!   at most once per request
//! - IPv4-mapped IPv6 addresses are checked in their IPv4 form too

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;
use std::collections::HashSet;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use url::{Host, Url};

use super::patterns::{PatternSet, PatternTable};
use crate::error::{messages::keys, ClassifiedError, ErrorModule, ErrorSource, ErrorType};
use crate::payload::RequestView;

/// Hostname resolution collaborator.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// The host part of a string leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Literal address.
    Ip(IpAddr),
    /// Something that could resolve.
    Name(String),
    /// Free text; checked against the table only.
    Text(String),
}

impl Candidate {
    /// Extract the candidate host from a leaf. `None` for blank strings.
    pub fn from_value(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(url) = Url::parse(value) {
            match url.host() {
                Some(Host::Ipv4(ip)) => return Some(Candidate::Ip(IpAddr::V4(ip))),
                Some(Host::Ipv6(ip)) => return Some(Candidate::Ip(IpAddr::V6(ip))),
                Some(Host::Domain(domain)) if !domain.is_empty() => {
                    return Some(Candidate::Name(domain.to_ascii_lowercase()))
                }
                _ => {}
            }
        }

        let raw = strip_port(value);
        if let Ok(ip) = raw.parse::<IpAddr>() {
            Some(Candidate::Ip(ip))
        } else if is_hostname(raw) {
            Some(Candidate::Name(raw.to_ascii_lowercase()))
        } else {
            Some(Candidate::Text(raw.to_string()))
        }
    }
}

/// `host:port` → `host`, `[v6]:port` / `[v6]` → `v6`.
fn strip_port(value: &str) -> &str {
    if let Some(rest) = value.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    match value.rsplit_once(':') {
        Some((host, port))
            if !host.contains(':')
                && !port.is_empty()
                && port.len() <= 5
                && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            host
        }
        _ => value,
    }
}

fn is_hostname(value: &str) -> bool {
    value.len() <= 253
        && value.bytes().any(|b| b.is_ascii_alphabetic())
        && value
            .split('.')
            .enumerate()
            .all(|(i, label)| {
                (!label.is_empty() || i > 0)
                    && label.len() <= 63
                    && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
                    && !label.starts_with('-')
                    && !label.ends_with('-')
            })
}

/// Test an address (and its IPv4 form when mapped) against the host table.
pub fn address_blocked(table: &PatternTable, ip: IpAddr) -> bool {
    if table.is_match(&ip.to_string()) {
        return true;
    }
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .is_some_and(|v4| table.is_match(&v4.to_string())),
        IpAddr::V4(_) => false,
    }
}

/// Outcome of checking one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCheck {
    Allowed,
    /// Matched the table, directly or through resolution.
    Blocked { host: String, address: Option<IpAddr> },
    /// Resolution failed; allowed.
    Unresolved,
}

/// Guard over every string leaf of a request.
#[derive(Clone)]
pub struct SsrfGuard {
    resolver: Arc<dyn Resolver>,
    resolve_dns: bool,
}

impl SsrfGuard {
    pub fn new(resolver: Arc<dyn Resolver>, resolve_dns: bool) -> Self {
        Self {
            resolver,
            resolve_dns,
        }
    }

    /// Guard using the system resolver.
    pub fn system(resolve_dns: bool) -> Self {
        Self::new(Arc::new(SystemResolver), resolve_dns)
    }

    /// Check a single value.
    pub async fn check(&self, value: &str, table: &PatternTable) -> HostCheck {
        let candidate = match Candidate::from_value(value) {
            Some(candidate) => candidate,
            None => return HostCheck::Allowed,
        };

        let name = match candidate {
            Candidate::Ip(ip) => {
                return if address_blocked(table, ip) {
                    HostCheck::Blocked {
                        host: ip.to_string(),
                        address: Some(ip),
                    }
                } else {
                    HostCheck::Allowed
                };
            }
            Candidate::Text(text) => {
                return if table.is_match(&text) {
                    HostCheck::Blocked {
                        host: text,
                        address: None,
                    }
                } else {
                    HostCheck::Allowed
                };
            }
            Candidate::Name(name) => name,
        };

        if table.is_match(&name) {
            return HostCheck::Blocked {
                host: name,
                address: None,
            };
        }
        if !self.resolve_dns {
            return HostCheck::Allowed;
        }

        match self.resolver.resolve(&name).await {
            Ok(addresses) => match addresses.into_iter().find(|ip| address_blocked(table, *ip)) {
                Some(ip) => HostCheck::Blocked {
                    host: name,
                    address: Some(ip),
                },
                None => HostCheck::Allowed,
            },
            Err(e) => {
                tracing::debug!(host = %name, error = %e, "Host did not resolve, allowing");
                HostCheck::Unresolved
            }
        }
    }

    /// Check every string leaf of `query`, `body` and `path_params`.
    pub async fn guard(
        &self,
        view: &RequestView,
        patterns: &PatternSet,
    ) -> Result<(), ClassifiedError> {
        let mut seen = HashSet::new();

        for (location, tree) in view.sources() {
            for leaf in string_leaves(tree) {
                if !seen.insert(leaf) {
                    continue;
                }
                if let HostCheck::Blocked { host, address } =
                    self.check(leaf, &patterns.ssrf_hosts).await
                {
                    tracing::warn!(
                        host = %host,
                        address = ?address,
                        location,
                        "SSRF attempt blocked"
                    );
                    crate::observability::metrics::record_blocked("ssrf");
                    return Err(ClassifiedError::registered(
                        ErrorType::Injection,
                        ErrorModule::Security,
                        keys::SSRF_DETECTED,
                        StatusCode::BAD_REQUEST,
                    )
                    .with_origin(ErrorSource::method(ErrorModule::Security, "ssrf_protection"))
                    .with_detail("location", location));
                }
            }
        }
        Ok(())
    }
}

/// String leaves in document order, without recursion.
fn string_leaves(tree: &Value) -> Vec<&str> {
    let mut leaves = Vec::new();
    let mut stack = vec![tree];
    while let Some(node) = stack.pop() {
        match node {
            Value::String(s) => leaves.push(s.as_str()),
            Value::Array(items) => stack.extend(items.iter().rev()),
            Value::Object(map) => {
                let children: Vec<_> = map.values().collect();
                stack.extend(children.into_iter().rev());
            }
            _ => {}
        }
    }
    leaves
}
