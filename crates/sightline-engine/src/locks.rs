//! Per-key async locks.
//!
//! Work on the same logical key (a ranking key, a mention key, a sitemap, a
//! URL) is serialized; work on different keys proceeds concurrently.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
  inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyLocks {
  pub fn new() -> Self { Self::default() }

  /// Wait for exclusive access to `key`. Released when the guard drops.
  pub async fn lock(&self, key: impl Into<String>) -> OwnedMutexGuard<()> {
    let slot = {
      let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
      // Drop slots nobody holds or waits on.
      map.retain(|_, slot| Arc::strong_count(slot) > 1);
      map.entry(key.into()).or_default().clone()
    };
    slot.lock_owned().await
  }

  /// Number of keys currently held or awaited.
  pub fn len(&self) -> usize {
    let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    map.values().filter(|slot| Arc::strong_count(slot) > 1).count()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
