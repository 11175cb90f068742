//! Conversation storage.
//!
//! The store owns every transcript. Callers get a copy out, work on it, and
//! put the whole thing back; nothing outside the store mutates a stored
//! transcript in place.

use crate::session::{SessionId, Transcript};
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Keyed transcript storage shared by all sessions.
pub trait ConversationStore: Send + Sync {
    /// The stored transcript, or an empty one for an unseen session.
    fn get(&self, id: &SessionId) -> Transcript;

    /// Replace the transcript for `id`. Last writer wins.
    fn put(&self, id: SessionId, transcript: Transcript);

    /// Drop a session. Returns whether it existed.
    fn remove(&self, id: &SessionId) -> bool;

    /// Number of live sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store with optional LRU capacity and idle expiry.
///
/// With both limits unset, sessions live until removed or the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    max_sessions: Option<usize>,
    idle_timeout: Option<Duration>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<SessionId, Entry>,
    /// Monotonic access counter for LRU ordering.
    clock: u64,
}

#[derive(Debug)]
struct Entry {
    transcript: Transcript,
    last_used: u64,
    touched_at: Instant,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl MemoryStore {
    /// A store with no eviction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of sessions; the least recently used one is evicted
    /// when a new session would exceed the cap.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max.max(1));
        self
    }

    /// Expire sessions that have not been read or written for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn max_sessions(&self) -> Option<usize> {
        self.max_sessions
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Drop every session idle for longer than the idle timeout.
    /// Returns how many were removed.
    pub fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic mid-operation cannot leave a half-written entry: every
        // mutation is a single map call.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        match self.idle_timeout {
            Some(timeout) => now.saturating_duration_since(entry.touched_at) > timeout,
            None => false,
        }
    }

    fn sweep_idle_at(&self, now: Instant) -> usize {
        if self.idle_timeout.is_none() {
            return 0;
        }
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|id, entry| {
            let keep = !self.is_expired(entry, now);
            if !keep {
                debug!("session {id} expired after idle timeout");
            }
            keep
        });
        before - inner.entries.len()
    }

    fn get_at(&self, id: &SessionId, now: Instant) -> Transcript {
        let mut inner = self.lock();
        let expired = match inner.entries.get(id) {
            Some(entry) => self.is_expired(entry, now),
            None => return Transcript::new(),
        };
        if expired {
            inner.entries.remove(id);
            debug!("session {id} expired after idle timeout");
            return Transcript::new();
        }

        let tick = inner.tick();
        match inner.entries.get_mut(id) {
            Some(entry) => {
                entry.last_used = tick;
                entry.touched_at = now;
                entry.transcript.clone()
            }
            None => Transcript::new(),
        }
    }

    fn put_at(&self, id: SessionId, transcript: Transcript, now: Instant) {
        let mut inner = self.lock();

        // Sweeping and capacity eviction are O(n) scans, so they only run when
        // a new session is inserted. Overwrites stay O(1).
        if !inner.entries.contains_key(&id) {
            if self.idle_timeout.is_some() {
                inner.entries.retain(|key, entry| {
                    let keep = !self.is_expired(entry, now);
                    if !keep {
                        debug!("session {key} expired after idle timeout");
                    }
                    keep
                });
            }

            if let Some(max) = self.max_sessions {
                if inner.entries.len() >= max {
                    let oldest = inner
                        .entries
                        .iter()
                        .min_by_key(|(_, entry)| entry.last_used)
                        .map(|(key, _)| key.clone());
                    if let Some(oldest) = oldest {
                        inner.entries.remove(&oldest);
                        debug!("session {oldest} evicted (capacity {max})");
                    }
                }
            }
        }

        let last_used = inner.tick();
        inner.entries.insert(
            id,
            Entry {
                transcript,
                last_used,
                touched_at: now,
            },
        );
    }
}

impl ConversationStore for MemoryStore {
    fn get(&self, id: &SessionId) -> Transcript {
        self.get_at(id, Instant::now())
    }

    fn put(&self, id: SessionId, transcript: Transcript) {
        self.put_at(id, transcript, Instant::now());
    }

    fn remove(&self, id: &SessionId) -> bool {
        self.lock().entries.remove(id).is_some()
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
