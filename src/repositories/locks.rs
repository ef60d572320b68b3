//! Per-playlist write serialisation.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per playlist. Writers of different playlists never wait
/// on each other.
#[derive(Debug, Default)]
pub struct PlaylistLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl PlaylistLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `playlist_id`; released when the guard drops
    pub async fn acquire(&self, playlist_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // only the map holds an idle entry; holders and waiters keep a clone
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(playlist_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of playlists with a held or awaited lock entry
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
