//! Per-key async locks used to collapse concurrent cache misses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Clone, Default)]
pub(crate) struct KeyedLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Held while one caller works on a key. Dropping it wakes the next waiter
/// and removes the map entry once nobody else references it.
pub(crate) struct KeyGuard {
    locks: KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    fn lock_map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned single-flight mutex");
            poisoned.into_inner()
        })
    }

    pub(crate) async fn lock(&self, key: &str) -> KeyGuard {
        let lock = {
            let mut map = self.lock_map();
            // Entries only the map references were left by cancelled waiters.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        let guard = lock.lock_owned().await;
        KeyGuard {
            locks: self.clone(),
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock_map().len()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.locks.lock_map();
        if let Some(lock) = map.get(&self.key)
            && Arc::strong_count(lock) == 1
        {
            map.remove(&self.key);
        }
    }
}
