//! Single-flight guard.
//!
//! At most one computation runs per key. A caller arriving while one is in
//! flight waits for it and reuses its value when the flight was started for
//! the same tag; otherwise it waits and then runs its own. If the leader is
//! cancelled, waiting callers start over and one of them takes the lead.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

struct Flight<V> {
    id: u64,
    tag: String,
    rx: watch::Receiver<Option<V>>,
}

enum Role<V> {
    Leader(u64, watch::Sender<Option<V>>),
    Follower(bool, watch::Receiver<Option<V>>),
}

pub(crate) struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, Flight<V>>>,
    next_id: AtomicU64,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Flight<V>>> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `f` under the guard for `key`.
    pub(crate) async fn run<F, Fut>(&self, key: K, tag: &str, f: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let (id, tx) = loop {
            let role = {
                let mut inflight = self.lock();
                match inflight.get(&key) {
                    Some(flight) => Role::Follower(flight.tag == tag, flight.rx.clone()),
                    None => {
                        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                        let (tx, rx) = watch::channel(None);
                        inflight.insert(
                            key.clone(),
                            Flight {
                                id,
                                tag: tag.to_string(),
                                rx,
                            },
                        );
                        Role::Leader(id, tx)
                    }
                }
            };

            match role {
                Role::Leader(id, tx) => break (id, tx),
                Role::Follower(same_tag, mut rx) => {
                    let shared = match rx.wait_for(Option::is_some).await {
                        Ok(value) if same_tag => value.clone(),
                        _ => None,
                    };
                    if let Some(value) = shared {
                        return value;
                    }
                }
            }
        };

        let guard = LeaderGuard {
            flight: self,
            key,
            id,
        };
        let value = f().await;
        drop(guard);
        let _ = tx.send(Some(value.clone()));
        value
    }
}

/// Removes the leader's entry when the leader finishes or is dropped.
struct LeaderGuard<'a, K: Eq + Hash, V> {
    flight: &'a SingleFlight<K, V>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for LeaderGuard<'_, K, V> {
    fn drop(&mut self) {
        let mut inflight = self.flight.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if inflight.get(&self.key).is_some_and(|f| f.id == self.id) {
            inflight.remove(&self.key);
        }
    }
}
