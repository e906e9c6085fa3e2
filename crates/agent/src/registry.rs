//! Session registry — live per-session loop state, keyed by session id.
//!
//! Holds the in-memory definition handle a session's runs share between
//! invocations, so two turns in quick succession don't round-trip through
//! the store. Entries expire: every access refreshes the deadline, and
//! `evict_expired` reclaims idle sessions. There is deliberately no
//! unbounded process-wide map here — TTL eviction is part of the contract.

use sandloop_core::definitions::DefinitionSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

struct SessionSlot {
    definitions: Arc<Mutex<DefinitionSet>>,
    last_access: Instant,
}

/// Registry of live session state with TTL-based eviction.
pub struct SessionRegistry {
    slots: RwLock<HashMap<String, SessionSlot>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Get the session's live definition handle, seeding from `seed` when
    /// the session isn't resident. A resident entry wins over the seed —
    /// in-memory state is at least as fresh as the store snapshot.
    pub async fn get_or_seed(
        &self,
        session_id: &str,
        seed: DefinitionSet,
    ) -> Arc<Mutex<DefinitionSet>> {
        let mut slots = self.slots.write().await;
        match slots.get_mut(session_id) {
            Some(slot) if slot.last_access.elapsed() < self.ttl => {
                debug!(session = %session_id, "Reusing resident session state");
                slot.last_access = Instant::now();
                slot.definitions.clone()
            }
            _ => {
                info!(session = %session_id, "Seeding session state");
                let definitions = Arc::new(Mutex::new(seed));
                slots.insert(
                    session_id.to_string(),
                    SessionSlot {
                        definitions: definitions.clone(),
                        last_access: Instant::now(),
                    },
                );
                definitions
            }
        }
    }

    /// Drop sessions idle past the TTL. Returns the number evicted.
    pub async fn evict_expired(&self) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        let ttl = self.ttl;
        slots.retain(|_, slot| slot.last_access.elapsed() < ttl);
        let evicted = before - slots.len();
        if evicted > 0 {
            info!(evicted, "Evicted idle sessions");
        }
        evicted
    }

    /// Remove one session (e.g. on explicit close).
    pub async fn remove(&self, session_id: &str) {
        self.slots.write().await.remove(session_id);
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}
