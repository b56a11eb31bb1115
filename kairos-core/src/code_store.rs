use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;
use uuid::Uuid;
use crate::CoreResult;

/// Identifies one pending cancellation: a booking plus the guest email asking for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeKey {
    pub booking_id: Uuid,
    pub guest_email: String,
}

impl CodeKey {
    /// Emails are compared case-insensitively, so the key stores them normalized.
    pub fn new(booking_id: Uuid, guest_email: &str) -> Self {
        Self {
            booking_id,
            guest_email: guest_email.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for CodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.booking_id, self.guest_email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CancellationCode {
    pub booking_id: Uuid,
    pub guest_email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl CancellationCode {
    pub fn key(&self) -> CodeKey {
        CodeKey::new(self.booking_id, &self.guest_email)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Result of checking one guess against the stored code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeCheck {
    Missing,
    Expired,
    Exhausted,
    Mismatch { remaining: u32 },
    Matched(CancellationCode),
}

/// Short-lived storage for cancellation codes.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Insert or overwrite the code for its key.
    async fn put(&self, code: CancellationCode) -> CoreResult<()>;

    async fn get(&self, key: &CodeKey) -> CoreResult<Option<CancellationCode>>;

    async fn remove(&self, key: &CodeKey) -> CoreResult<()>;

    /// Check `guess` and record the attempt as one atomic step. Expired,
    /// exhausted and matched entries are removed; a wrong guess bumps the
    /// attempt count and removes the entry once `max_attempts` is reached.
    async fn check_and_record_attempt(
        &self,
        key: &CodeKey,
        guess: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> CoreResult<CodeCheck>;

    /// Drop every entry expired at `now`, returning how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> CoreResult<usize>;
}

/// Process-local code store. Codes are lost on restart and are not shared
/// between instances; multi-instance deployments need a shared store.
#[derive(Default)]
pub struct InMemoryCodeStore {
    codes: Mutex<HashMap<CodeKey, CancellationCode>>,
}

impl InMemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.codes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.codes.lock().await.is_empty()
    }
}

#[async_trait]
impl CodeStore for InMemoryCodeStore {
    async fn put(&self, code: CancellationCode) -> CoreResult<()> {
        self.codes.lock().await.insert(code.key(), code);
        Ok(())
    }

    async fn get(&self, key: &CodeKey) -> CoreResult<Option<CancellationCode>> {
        Ok(self.codes.lock().await.get(key).cloned())
    }

    async fn remove(&self, key: &CodeKey) -> CoreResult<()> {
        self.codes.lock().await.remove(key);
        Ok(())
    }

    async fn check_and_record_attempt(
        &self,
        key: &CodeKey,
        guess: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> CoreResult<CodeCheck> {
        let mut codes = self.codes.lock().await;

        let Some(entry) = codes.get_mut(key) else {
            return Ok(CodeCheck::Missing);
        };

        if entry.is_expired(now) {
            codes.remove(key);
            return Ok(CodeCheck::Expired);
        }

        if entry.attempts >= max_attempts {
            codes.remove(key);
            return Ok(CodeCheck::Exhausted);
        }

        if entry.code != guess {
            entry.attempts += 1;
            let remaining = max_attempts.saturating_sub(entry.attempts);
            if remaining == 0 {
                codes.remove(key);
            }
            return Ok(CodeCheck::Mismatch { remaining });
        }

        Ok(codes.remove(key).map_or(CodeCheck::Missing, CodeCheck::Matched))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let mut codes = self.codes.lock().await;
        let initial_count = codes.len();
        codes.retain(|_, code| !code.is_expired(now));
        Ok(initial_count - codes.len())
    }
}
