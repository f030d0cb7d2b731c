//! Bounded in-memory session store

use crate::{SessionId, UploadSession};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

struct Entry {
    session: UploadSession,
    touched: Instant,
}

/// Sessions keyed by id, with idle expiry and a size ceiling.
///
/// When full, finished sessions are evicted before running ones, least
/// recently touched first. All mutation goes through [`SessionStore::update`],
/// which holds the lock for the whole closure.
pub struct SessionStore {
    entries: Mutex<HashMap<SessionId, Entry>>,
    capacity: usize,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
        // counters stay consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, session: UploadSession) -> SessionId {
        let id = session.id;
        let mut entries = self.lock();
        self.purge_locked(&mut entries);

        while entries.len() >= self.capacity {
            let victim = entries
                .iter()
                .min_by_key(|(_, e)| (!e.session.status.is_finished(), e.touched))
                .map(|(id, _)| *id);
            match victim {
                Some(victim) => {
                    debug!(session = %victim, "evicting session to stay within capacity");
                    entries.remove(&victim);
                }
                None => break,
            }
        }

        entries.insert(
            id,
            Entry {
                session,
                touched: Instant::now(),
            },
        );
        id
    }

    pub fn get(&self, id: SessionId) -> Option<UploadSession> {
        self.update(id, |session| session.clone())
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.get(id).is_some()
    }

    /// Run `f` on the session under the store lock.
    pub fn update<R>(&self, id: SessionId, f: impl FnOnce(&mut UploadSession) -> R) -> Option<R> {
        let mut entries = self.lock();
        let expired = entries
            .get(&id)
            .is_some_and(|entry| entry.touched.elapsed() > self.ttl);
        if expired {
            entries.remove(&id);
            return None;
        }

        let entry = entries.get_mut(&id)?;
        entry.touched = Instant::now();
        Some(f(&mut entry.session))
    }

    pub fn remove(&self, id: SessionId) -> Option<UploadSession> {
        self.lock().remove(&id).map(|entry| entry.session)
    }

    /// Drop sessions idle longer than the TTL; returns how many went.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        self.purge_locked(&mut entries)
    }

    fn purge_locked(&self, entries: &mut HashMap<SessionId, Entry>) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.touched.elapsed() <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
