use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::pipeline::SessionOutcome;

struct StoredSession {
    outcome: Arc<SessionOutcome>,
    seq: u64,
}

/// Finished sessions kept in memory so every download of a session reads
/// the same structured reports. Nothing outlives the process.
pub struct SessionStore {
    sessions: DashMap<Uuid, StoredSession>,
    next_seq: AtomicU64,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            next_seq: AtomicU64::new(0),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn insert(&self, outcome: SessionOutcome) -> Arc<SessionOutcome> {
        if self.sessions.len() >= self.max_sessions {
            self.evict_oldest();
        }

        let outcome = Arc::new(outcome);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.sessions.insert(
            outcome.session_id,
            StoredSession {
                outcome: Arc::clone(&outcome),
                seq,
            },
        );
        outcome
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<SessionOutcome>> {
        self.sessions.get(id).map(|entry| Arc::clone(&entry.outcome))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    // Drop the oldest quarter (at least one) when full
    fn evict_oldest(&self) {
        let mut by_age: Vec<(Uuid, u64)> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().seq))
            .collect();
        by_age.sort_by_key(|(_, seq)| *seq);

        let count = (self.max_sessions / 4).max(1);
        for (id, _) in by_age.into_iter().take(count) {
            self.sessions.remove(&id);
        }
    }
}
