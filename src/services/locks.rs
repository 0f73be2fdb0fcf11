use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Error)]
#[error("timed out waiting for the seat map of showtime {0}")]
pub struct LockTimeout(pub i64);

/// One async mutex per showtime id. Slots are created on demand and dropped
/// again once nobody holds or waits for them.
#[derive(Clone, Default)]
pub struct ShowtimeLocks {
    slots: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl ShowtimeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits at most `timeout` for exclusive access to the showtime's seat map.
    pub async fn acquire(&self, showtime_id: i64, timeout: Duration) -> Result<ShowtimeGuard, LockTimeout> {
        let slot = self.slots.lock().entry(showtime_id).or_default().clone();

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(ShowtimeGuard {
                showtime_id,
                guard: Some(guard),
                locks: self.clone(),
            }),
            Err(_) => {
                self.forget_if_idle(showtime_id);
                Err(LockTimeout(showtime_id))
            }
        }
    }

    /// Number of showtimes with a live slot.
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots.lock().len()
    }

    fn forget_if_idle(&self, showtime_id: i64) {
        let mut slots = self.slots.lock();
        // the map's own reference is the only one left
        if slots.get(&showtime_id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&showtime_id);
        }
    }
}

pub struct ShowtimeGuard {
    showtime_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
    locks: ShowtimeLocks,
}

impl ShowtimeGuard {
    pub fn showtime_id(&self) -> i64 {
        self.showtime_id
    }
}

impl Drop for ShowtimeGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.forget_if_idle(self.showtime_id);
    }
}
