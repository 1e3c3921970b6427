// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded in-process verification store.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::warn;

use super::{normalize_email, ConfirmOutcome, VerificationStore, MAX_CONFIRM_ATTEMPTS};

struct CacheEntry {
    code: String,
    inserted_at: Instant,
    failed_attempts: u32,
}

/// LRU map of pending codes with an optional TTL.
///
/// When full, the least recently touched email is evicted.
pub struct InMemoryVerificationStore {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl InMemoryVerificationStore {
    /// - `capacity`: max pending codes (at least 1).
    /// - `ttl`: lifetime of a code; `None` keeps it until consumed or evicted.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    fn is_live(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_none_or(|ttl| entry.inserted_at.elapsed() < ttl)
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InMemoryVerificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVerificationStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl VerificationStore for InMemoryVerificationStore {
    fn set(&self, email: &str, code: String) {
        let key = normalize_email(email);
        match self.cache.lock() {
            Ok(mut cache) => {
                cache.put(
                    key,
                    CacheEntry {
                        code,
                        inserted_at: Instant::now(),
                        failed_attempts: 0,
                    },
                );
            }
            Err(_) => warn!("verification store lock poisoned; code not stored"),
        }
    }

    fn get(&self, email: &str) -> Option<String> {
        let key = normalize_email(email);
        let mut cache = self.cache.lock().ok()?;
        let live = cache.get(&key).map(|entry| self.is_live(entry))?;
        if live {
            return cache.get(&key).map(|entry| entry.code.clone());
        }
        cache.pop(&key);
        None
    }

    fn remove(&self, email: &str) -> Option<String> {
        let key = normalize_email(email);
        let mut cache = self.cache.lock().ok()?;
        cache
            .pop(&key)
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.code)
    }

    fn confirm(&self, email: &str, code: &str) -> ConfirmOutcome {
        let key = normalize_email(email);
        let Ok(mut cache) = self.cache.lock() else {
            return ConfirmOutcome::Missing;
        };

        let Some(entry) = cache.peek_mut(&key) else {
            return ConfirmOutcome::Missing;
        };
        if !self.is_live(entry) {
            cache.pop(&key);
            return ConfirmOutcome::Missing;
        }
        if entry.code == code.trim() {
            cache.pop(&key);
            return ConfirmOutcome::Confirmed;
        }

        entry.failed_attempts += 1;
        if entry.failed_attempts >= MAX_CONFIRM_ATTEMPTS {
            cache.pop(&key);
            warn!(email = %key, "verification code discarded after too many attempts");
            return ConfirmOutcome::Exhausted;
        }
        ConfirmOutcome::Mismatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryVerificationStore {
        InMemoryVerificationStore::new(10, Some(Duration::from_secs(300)))
    }

    #[test]
    fn set_then_get_returns_code() {
        let store = store();
        assert!(store.get("ada@example.com").is_none());

        store.set("ada@example.com", "123456".to_string());
        assert_eq!(store.get("ada@example.com").as_deref(), Some("123456"));
    }

    #[test]
    fn keys_are_normalized() {
        let store = store();
        store.set(" Ada@Example.com", "111111".to_string());
        assert_eq!(store.get("ada@example.com").as_deref(), Some("111111"));
    }

    #[test]
    fn last_write_wins() {
        let store = store();
        store.set("ada@example.com", "111111".to_string());
        store.set("ada@example.com", "222222".to_string());
        assert_eq!(store.get("ada@example.com").as_deref(), Some("222222"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_consumes_entry() {
        let store = store();
        store.set("ada@example.com", "123456".to_string());
        assert_eq!(store.remove("ada@example.com").as_deref(), Some("123456"));
        assert!(store.get("ada@example.com").is_none());
        assert!(store.remove("ada@example.com").is_none());
    }

    #[test]
    fn expired_entries_are_gone() {
        let store = InMemoryVerificationStore::new(10, Some(Duration::ZERO));
        store.set("ada@example.com", "123456".to_string());
        assert!(store.get("ada@example.com").is_none());
        assert!(store.is_empty());
        assert_eq!(store.confirm("ada@example.com", "123456"), ConfirmOutcome::Missing);
    }

    #[test]
    fn no_ttl_keeps_entries() {
        let store = InMemoryVerificationStore::new(10, None);
        store.set("ada@example.com", "123456".to_string());
        assert_eq!(store.get("ada@example.com").as_deref(), Some("123456"));
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let store = InMemoryVerificationStore::new(2, None);
        store.set("a@example.com", "1".to_string());
        store.set("b@example.com", "2".to_string());
        store.set("c@example.com", "3".to_string());
        assert!(store.get("a@example.com").is_none());
        assert_eq!(store.get("c@example.com").as_deref(), Some("3"));
    }

    #[test]
    fn confirm_consumes_only_on_match() {
        let store = store();
        store.set("ada@example.com", "123456".to_string());

        assert_eq!(store.confirm("ada@example.com", "000000"), ConfirmOutcome::Mismatch);
        assert_eq!(store.get("ada@example.com").as_deref(), Some("123456"));

        assert_eq!(store.confirm("ADA@example.com", " 123456 "), ConfirmOutcome::Confirmed);
        assert_eq!(store.confirm("ada@example.com", "123456"), ConfirmOutcome::Missing);
    }

    #[test]
    fn repeated_mismatches_discard_the_code() {
        let store = store();
        store.set("ada@example.com", "123456".to_string());

        for guess in 0..MAX_CONFIRM_ATTEMPTS - 1 {
            assert_eq!(
                store.confirm("ada@example.com", &format!("{guess:06}")),
                ConfirmOutcome::Mismatch
            );
        }
        assert_eq!(store.confirm("ada@example.com", "999999"), ConfirmOutcome::Exhausted);

        // Even the right code is useless now.
        assert_eq!(store.confirm("ada@example.com", "123456"), ConfirmOutcome::Missing);
        assert!(store.is_empty());
    }

    #[test]
    fn reissuing_resets_the_attempt_count() {
        let store = store();
        store.set("ada@example.com", "123456".to_string());
        for _ in 0..MAX_CONFIRM_ATTEMPTS - 1 {
            store.confirm("ada@example.com", "000000");
        }

        store.set("ada@example.com", "654321".to_string());
        assert_eq!(store.confirm("ada@example.com", "000000"), ConfirmOutcome::Mismatch);
        assert_eq!(store.confirm("ada@example.com", "654321"), ConfirmOutcome::Confirmed);
    }
}
