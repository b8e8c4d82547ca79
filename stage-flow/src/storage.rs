use async_trait::async_trait;
use dashmap::DashMap;
use std::{
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};
use tracing::debug;

use crate::{
    error::Result,
    state::{FlowState, Session},
};

/// Idle expiry applied to sessions when none is configured
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Expired records are swept from the in-memory store once per this many writes
pub const SWEEP_EVERY_WRITES: usize = 64;

/// Trait for storing and retrieving sessions.
///
/// Every `save` renews the record's expiry; reads never do.
#[async_trait]
pub trait SessionStorage<S: FlowState>: Send + Sync {
    async fn save(&self, session: &Session<S>) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session<S>>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

struct StoredRecord {
    payload: String,
    expires_at: Instant,
}

/// In-memory implementation of SessionStorage.
///
/// Records are kept serialized, so a read always produces an independent copy and
/// goes through the same decoding path as an external store. Records of conversations
/// that never return are dropped by a sweep that runs every [`SWEEP_EVERY_WRITES`] writes.
pub struct InMemorySessionStorage<S> {
    sessions: Arc<DashMap<String, StoredRecord>>,
    ttl: Duration,
    writes: AtomicUsize,
    _state: PhantomData<fn() -> S>,
}

impl<S: FlowState> InMemorySessionStorage<S> {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
            writes: AtomicUsize::new(0),
            _state: PhantomData,
        }
    }

    /// Store a raw payload as-is, bypassing serialization
    pub fn put_raw(&self, id: impl Into<String>, payload: impl Into<String>) {
        self.sessions.insert(
            id.into(),
            StoredRecord {
                payload: payload.into(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY_WRITES == 0 {
            self.purge_expired();
        }
    }

    /// Drop every record whose deadline has passed; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        let now = Instant::now();
        self.sessions.retain(|_, record| record.expires_at > now);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed, remaining = self.sessions.len(), "purged expired sessions");
        }
        removed
    }

    /// Records held in memory, expired or not
    pub fn stored_entries(&self) -> usize {
        self.sessions.len()
    }

    /// Number of live (non-expired) records
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: FlowState> Default for InMemorySessionStorage<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: FlowState> SessionStorage<S> for InMemorySessionStorage<S> {
    async fn save(&self, session: &Session<S>) -> Result<()> {
        let payload = serde_json::to_string(&session.state)?;
        self.put_raw(session.id.clone(), payload);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session<S>>> {
        let lookup = self
            .sessions
            .get(id)
            .map(|record| (record.payload.clone(), record.expires_at));

        let Some((payload, expires_at)) = lookup else {
            return Ok(None);
        };
        if expires_at <= Instant::now() {
            self.sessions.remove(id);
            return Ok(None);
        }

        let state: S = serde_json::from_str(&payload)?;
        Ok(Some(Session::with_state(id, state)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
