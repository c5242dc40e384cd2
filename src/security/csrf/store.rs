//! CSRF token storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;

/// One live token per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub session_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store backend failed: {0}")]
    Backend(String),
}

/// Session-keyed token store.
///
/// The in-memory store suits a single process; several instances behind a
/// balancer need a shared implementation.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<TokenRecord>, StoreError>;

    /// Insert or replace the record for its session.
    async fn set(&self, record: TokenRecord) -> Result<(), StoreError>;

    /// Returns whether a record existed.
    async fn delete(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Remove every record expired at `now`; returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    records: DashMap<String, TokenRecord>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, session_id: &str) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.records.get(session_id).map(|r| r.value().clone()))
    }

    async fn set(&self, record: TokenRecord) -> Result<(), StoreError> {
        self.records.insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(session_id).is_some())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        Ok(before.saturating_sub(self.records.len()))
    }
}
