//! Like toggling and the per-visitor like ledger

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Storage entry holding the visitor's liked posts (`{ postId: bool }`).
pub const LIKED_POSTS_KEY: &str = "grj-liked-posts";

/// Storage entry holding the visitor's last seen like counts (`{ postId: n }`).
pub const LIKE_COUNTS_KEY: &str = "grj-like-counts";

/// A visitor's view of one post's like button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LikeState {
    pub liked: bool,
    pub count: u64,
}

/// Flip the liked flag and move the count by one, never below zero.
///
/// Toggling twice restores the original pair unless the first toggle hit
/// the zero floor (unliking with a count of 0).
pub fn toggle(prev_liked: bool, prev_count: u64) -> LikeState {
    let count = if prev_liked {
        prev_count.saturating_sub(1)
    } else {
        prev_count.saturating_add(1)
    };
    LikeState {
        liked: !prev_liked,
        count,
    }
}

/// Counter delta the remote store must apply for a toggle from `prev_liked`.
pub fn remote_delta(prev_liked: bool) -> i64 {
    if prev_liked {
        -1
    } else {
        1
    }
}

/// Minimal string key-value storage, the shape of browser local storage.
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: String);
}

impl KeyValueStorage for HashMap<String, String> {
    fn get_item(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }
}

/// Liked flags and display counts for one visitor, keyed by post id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LikeLedger {
    liked: HashMap<String, bool>,
    counts: HashMap<String, u64>,
}

impl LikeLedger {
    /// Load from storage; malformed entries load as empty maps.
    pub fn load(storage: &impl KeyValueStorage) -> Self {
        Self {
            liked: read_map(storage, LIKED_POSTS_KEY),
            counts: read_map(storage, LIKE_COUNTS_KEY),
        }
    }

    /// Write both maps back under their fixed keys.
    pub fn save(&self, storage: &mut impl KeyValueStorage) {
        if let Ok(json) = serde_json::to_string(&self.liked) {
            storage.set_item(LIKED_POSTS_KEY, json);
        }
        if let Ok(json) = serde_json::to_string(&self.counts) {
            storage.set_item(LIKE_COUNTS_KEY, json);
        }
    }

    pub fn liked(&self, post_id: &str) -> bool {
        self.liked.get(post_id).copied().unwrap_or(false)
    }

    pub fn count(&self, post_id: &str) -> u64 {
        self.counts.get(post_id).copied().unwrap_or(0)
    }

    pub fn state(&self, post_id: &str) -> LikeState {
        LikeState {
            liked: self.liked(post_id),
            count: self.count(post_id),
        }
    }

    /// Record a state for `post_id`, replacing both halves together.
    pub fn record(&mut self, post_id: &str, state: LikeState) {
        self.liked.insert(post_id.to_string(), state.liked);
        self.counts.insert(post_id.to_string(), state.count);
    }

    /// Toggle locally from the stored pair and return the new state.
    pub fn toggle(&mut self, post_id: &str) -> LikeState {
        let prev = self.state(post_id);
        let next = toggle(prev.liked, prev.count);
        self.record(post_id, next);
        next
    }
}

fn read_map<V: for<'de> Deserialize<'de>>(
    storage: &impl KeyValueStorage,
    key: &str,
) -> HashMap<String, V> {
    let Some(raw) = storage.get_item(key) else {
        return HashMap::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(key, error = %e, "Discarding malformed like ledger entry");
        HashMap::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_like() {
        assert_eq!(toggle(false, 0), LikeState { liked: true, count: 1 });
        assert_eq!(toggle(false, 41), LikeState { liked: true, count: 42 });
    }

    #[test]
    fn test_toggle_unlike_floors_at_zero() {
        assert_eq!(toggle(true, 1), LikeState { liked: false, count: 0 });
        assert_eq!(toggle(true, 0), LikeState { liked: false, count: 0 });
    }

    #[test]
    fn test_double_toggle_restores_away_from_floor() {
        for (liked, count) in [(false, 1), (true, 1), (false, 7), (true, 99)] {
            let once = toggle(liked, count);
            let twice = toggle(once.liked, once.count);
            assert_eq!(twice, LikeState { liked, count });
        }
    }

    #[test]
    fn test_double_toggle_at_floor_is_not_invertible() {
        let once = toggle(true, 0);
        let twice = toggle(once.liked, once.count);
        assert!(twice.liked);
        assert_eq!(twice.count, 1);
    }

    #[test]
    fn test_remote_delta() {
        assert_eq!(remote_delta(false), 1);
        assert_eq!(remote_delta(true), -1);
    }

    #[test]
    fn test_ledger_round_trips_through_storage() {
        let mut storage: HashMap<String, String> = HashMap::new();
        let mut ledger = LikeLedger::default();
        ledger.toggle("post-a");
        ledger.record("post-b", LikeState { liked: false, count: 3 });
        ledger.save(&mut storage);

        assert!(storage.contains_key(LIKED_POSTS_KEY));
        assert!(storage.contains_key(LIKE_COUNTS_KEY));

        let loaded = LikeLedger::load(&storage);
        assert_eq!(loaded, ledger);
        assert!(loaded.liked("post-a"));
        assert_eq!(loaded.count("post-b"), 3);
    }

    #[test]
    fn test_ledger_ignores_malformed_storage() {
        let mut storage: HashMap<String, String> = HashMap::new();
        storage.insert(LIKED_POSTS_KEY.to_string(), "not json".to_string());
        storage.insert(LIKE_COUNTS_KEY.to_string(), r#"{"p":2}"#.to_string());

        let ledger = LikeLedger::load(&storage);
        assert!(!ledger.liked("p"));
        assert_eq!(ledger.count("p"), 2);
    }
}
