//! Replay cache (spec §3 `tokenReplayCache`, supplemented per SPEC_FULL §5).

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Vetoes a previously-seen token. Implementations decide what "seen" means
/// and for how long; the validator only calls [`check_and_record`].
pub trait ReplayCache: Send + Sync {
    /// Returns `true` if `raw_token` has not been recorded before (and
    /// records it now); `false` if it has — i.e. a replay.
    fn check_and_record(&self, raw_token: &str, expires_at: Option<i64>) -> bool;
}

/// An `lru::LruCache` behind a `parking_lot::Mutex`, bounded by entry count
/// rather than by `exp`, since tracking real wall-clock expiry would need a
/// background sweep this crate has no reactor to run. Grounded on the
/// `parking_lot`-guarded map style `raif-s-naffah-xapi-rs` uses for its own
/// concurrent state.
pub struct InMemoryReplayCache {
    seen: Mutex<LruCache<String, Option<i64>>>,
}

impl InMemoryReplayCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl Default for InMemoryReplayCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl ReplayCache for InMemoryReplayCache {
    fn check_and_record(&self, raw_token: &str, expires_at: Option<i64>) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(raw_token) {
            return false;
        }
        seen.put(raw_token.to_owned(), expires_at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_accepted_second_is_rejected() {
        let cache = InMemoryReplayCache::new(10);
        assert!(cache.check_and_record("token-a", Some(123)));
        assert!(!cache.check_and_record("token-a", Some(123)));
    }

    #[test]
    fn distinct_tokens_do_not_interfere() {
        let cache = InMemoryReplayCache::new(10);
        assert!(cache.check_and_record("token-a", None));
        assert!(cache.check_and_record("token-b", None));
    }

    #[test]
    fn capacity_eviction_allows_a_previously_seen_token_to_be_seen_again() {
        let cache = InMemoryReplayCache::new(1);
        assert!(cache.check_and_record("token-a", None));
        assert!(cache.check_and_record("token-b", None));
        assert!(cache.check_and_record("token-a", None));
    }
}
