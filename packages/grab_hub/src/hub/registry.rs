//! Subscription Registry
//!
//! Tracks every live subscription as a cancellable handle keyed by
//! (session, channel). At most one subscription per key: installing over
//! an existing entry cancels the old pipeline first, under the same write
//! lock, so the release and install are atomic with respect to every
//! other registry call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::channels::Channel;

pub type SessionId = Uuid;

struct Entry {
    generation: u64,
    cancel: CancellationToken,
    /// Post id for parametrized channels.
    param: Option<String>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<(SessionId, Channel), Entry>>,
    /// Monotonic id handed to each subscription, so a pipeline that removes
    /// itself can never evict a replacement installed after it.
    next_generation: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a subscription for the key, cancelling any previous one.
    /// Returns the new entry's generation and cancellation token, and
    /// whether an old subscription was replaced.
    pub async fn begin(
        &self,
        session: SessionId,
        channel: Channel,
        param: Option<String>,
    ) -> (u64, CancellationToken, bool) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        let mut entries = self.entries.write().await;
        let replaced = match entries.remove(&(session, channel)) {
            Some(prev) => {
                prev.cancel.cancel();
                debug!(%session, %channel, "replaced existing subscription");
                true
            }
            None => false,
        };
        entries.insert(
            (session, channel),
            Entry {
                generation,
                cancel: cancel.clone(),
                param,
            },
        );
        (generation, cancel, replaced)
    }

    /// Cancel and remove the subscription for the key. No-op when absent.
    pub async fn remove(&self, session: SessionId, channel: Channel) -> bool {
        let mut entries = self.entries.write().await;
        match entries.remove(&(session, channel)) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Remove the key only if it still belongs to the given generation.
    /// Used by a pipeline ending on upstream close: a replacement may
    /// already own the key, and must not be evicted.
    pub async fn remove_if_current(
        &self,
        session: SessionId,
        channel: Channel,
        generation: u64,
    ) -> bool {
        let mut entries = self.entries.write().await;
        if entries
            .get(&(session, channel))
            .is_some_and(|e| e.generation == generation)
        {
            entries.remove(&(session, channel));
            true
        } else {
            false
        }
    }

    /// Cancel and remove every subscription of a session. Returns how many
    /// were dropped.
    pub async fn drop_session(&self, session: SessionId) -> usize {
        let mut entries = self.entries.write().await;
        let keys: Vec<_> = entries
            .keys()
            .filter(|(s, _)| *s == session)
            .copied()
            .collect();
        for key in &keys {
            if let Some(entry) = entries.remove(key) {
                entry.cancel.cancel();
            }
        }
        if !keys.is_empty() {
            debug!(%session, count = keys.len(), "dropped session subscriptions");
        }
        keys.len()
    }

    pub async fn contains(&self, session: SessionId, channel: Channel) -> bool {
        self.entries.read().await.contains_key(&(session, channel))
    }

    /// Parameter of the subscription for the key, if subscribed.
    pub async fn subscribed_param(&self, session: SessionId, channel: Channel) -> Option<String> {
        self.entries
            .read()
            .await
            .get(&(session, channel))
            .and_then(|e| e.param.clone())
    }

    pub async fn active_count(&self) -> usize {
        self.entries.read().await.len()
    }
}
