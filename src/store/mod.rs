//! Persisted block-list store.
//!
//! The store owns the process-wide set of applications selected for
//! blocking. It is the only cross-task shared mutable resource in the
//! crate: a UI-facing task mutates it through [`BlockListStore::set_blocked`]
//! while the gateway worker observes it through a [`tokio::sync::watch`]
//! subscription. Every mutation replaces the whole snapshot atomically;
//! readers never observe a half-applied update.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::AppId;

mod backend;

pub use backend::{JsonFileBackend, MemoryBackend, StoreBackend};

/// The set of application identities currently selected for blocking.
///
/// Set semantics throughout: inserting a present identity and removing an
/// absent one are both no-ops, and blank identities are never accepted.
/// Backed by a `BTreeSet` so iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockSet(BTreeSet<AppId>);

impl BlockSet {
    /// Create an empty block set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the identity is a member.
    pub fn contains(&self, id: &AppId) -> bool {
        self.0.contains(id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate members in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &AppId> {
        self.0.iter()
    }

    /// Insert an identity. Returns whether the set changed.
    ///
    /// Blank identities are rejected (no change).
    pub fn insert(&mut self, id: AppId) -> bool {
        if id.is_blank() {
            return false;
        }
        self.0.insert(id)
    }

    /// Remove an identity. Returns whether the set changed.
    pub fn remove(&mut self, id: &AppId) -> bool {
        self.0.remove(id)
    }
}

impl FromIterator<AppId> for BlockSet {
    fn from_iter<I: IntoIterator<Item = AppId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Process-wide persisted block-list store.
///
/// Created once at process start ("cold start" reloads the persisted set
/// into memory); mutated exclusively through [`set_blocked`]; never
/// explicitly destroyed.
///
/// [`set_blocked`]: BlockListStore::set_blocked
pub struct BlockListStore {
    /// Identity of the application hosting the gateway. Never allowed
    /// into the block set, even if mistakenly supplied.
    own_app: AppId,

    /// Persistence backend.
    backend: Box<dyn StoreBackend>,

    /// Current snapshot. Replaced wholesale on every mutation.
    current: RwLock<BlockSet>,

    /// Change notifications. `watch` keeps only the latest snapshot, so
    /// slow subscribers coalesce intermediate updates instead of queuing
    /// them unboundedly.
    tx: watch::Sender<BlockSet>,
}

impl BlockListStore {
    /// Open the store, loading the persisted set from the backend.
    ///
    /// A backend with no prior state yields an empty set. Blank entries
    /// and the owning application's own identity are filtered out of the
    /// loaded set, in case an older process version persisted them.
    pub fn open(backend: Box<dyn StoreBackend>, own_app: AppId) -> Result<Self> {
        let loaded = backend.load()?;
        let initial: BlockSet = loaded
            .iter()
            .filter(|id| !id.is_blank() && **id != own_app)
            .cloned()
            .collect();

        debug!(entries = initial.len(), "Loaded block list");

        let (tx, _) = watch::channel(initial.clone());

        Ok(Self {
            own_app,
            backend,
            current: RwLock::new(initial),
            tx,
        })
    }

    /// Current snapshot, returned by value.
    pub fn snapshot(&self) -> BlockSet {
        self.current.read().clone()
    }

    /// Number of blocked applications.
    pub fn blocked_count(&self) -> usize {
        self.current.read().len()
    }

    /// Subscribe to change notifications.
    ///
    /// The receiver always observes the latest full snapshot, never a
    /// diff. The value present at subscription time is the current set.
    pub fn subscribe(&self) -> watch::Receiver<BlockSet> {
        self.tx.subscribe()
    }

    /// The owning application's identity.
    pub fn own_app(&self) -> &AppId {
        &self.own_app
    }

    /// Block or unblock a single application. Returns whether the set
    /// changed.
    ///
    /// Idempotent: blocking an already-blocked identity and unblocking an
    /// absent one are no-ops that neither persist nor notify. Blank
    /// identities and the owning application's own identity are silently
    /// filtered, not errors.
    pub fn set_blocked(&self, id: &AppId, blocked: bool) -> Result<bool> {
        if id.is_blank() {
            debug!("Ignoring blank application identity");
            return Ok(false);
        }
        if blocked && *id == self.own_app {
            warn!(app = %id, "Refusing to block the gateway's own application");
            return Ok(false);
        }

        let next = {
            let mut current = self.current.write();
            let mut next = current.clone();
            let changed = if blocked {
                next.insert(id.clone())
            } else {
                next.remove(id)
            };
            if !changed {
                return Ok(false);
            }
            *current = next.clone();
            // Notify while still holding the lock so subscribers observe
            // snapshots in mutation order.
            self.tx.send_replace(next.clone());
            next
        };

        debug!(app = %id, blocked, total = next.len(), "Block list updated");

        // Persistence mirrors the snapshot; a write failure leaves the
        // in-memory set authoritative for the rest of the session.
        if let Err(e) = self.backend.save(&next) {
            warn!(error = %e, "Failed to persist block list");
        }

        Ok(true)
    }
}
