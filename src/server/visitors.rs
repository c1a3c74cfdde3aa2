//! Per-visitor like ledgers held by the server
//!
//! Keyed by the client-chosen `X-Visitor-Id`, so the map is bounded two
//! ways: ledgers idle longer than the TTL are forgotten, and once the map
//! is full the least recently seen visitor is evicted to make room. The
//! post's remote `likes` counter stays authoritative; losing a ledger only
//! forgets which posts that visitor had liked.

use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::site::likes::{LikeLedger, LikeState};

struct VisitorEntry {
    storage: HashMap<String, String>,
    last_seen: Instant,
}

pub struct VisitorLedgers {
    entries: DashMap<String, VisitorEntry>,
    max_visitors: usize,
    idle_ttl: Duration,
}

impl VisitorLedgers {
    pub fn new(max_visitors: usize, idle_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_visitors: max_visitors.max(1),
            idle_ttl,
        }
    }

    /// The visitor's ledger; empty when unknown or idle past the TTL.
    pub fn load(&self, visitor: &str) -> LikeLedger {
        let now = Instant::now();
        match self.entries.get(visitor) {
            Some(entry) if now.duration_since(entry.last_seen) <= self.idle_ttl => {
                LikeLedger::load(&entry.storage)
            }
            _ => LikeLedger::default(),
        }
    }

    /// Record `state` for `post_id` in the visitor's ledger.
    pub fn record(&self, visitor: &str, post_id: &str, state: LikeState) {
        let now = Instant::now();
        if !self.entries.contains_key(visitor) {
            self.make_room(now);
        }

        let mut entry = self
            .entries
            .entry(visitor.to_string())
            .or_insert_with(|| VisitorEntry {
                storage: HashMap::new(),
                last_seen: now,
            });
        if now.duration_since(entry.last_seen) > self.idle_ttl {
            entry.storage.clear();
        }
        entry.last_seen = now;

        let mut ledger = LikeLedger::load(&entry.storage);
        ledger.record(post_id, state);
        ledger.save(&mut entry.storage);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn make_room(&self, now: Instant) {
        if self.entries.len() < self.max_visitors {
            return;
        }
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_seen) <= self.idle_ttl);

        while self.entries.len() >= self.max_visitors {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.last_seen)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(visitor) => {
                    debug!(visitor = %visitor, "Evicting like ledger");
                    self.entries.remove(&visitor);
                }
                None => break,
            }
        }
    }
}
