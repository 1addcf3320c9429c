//! Debounced board persistence.
//!
//! The manager watches the store's local version. A change arms a timer;
//! further changes restart it. Once the board has been quiet for the
//! debounce interval, the next [`AutoSaveManager::maybe_save`] writes it.

use crate::board::Board;
use crate::storage::{Storage, StorageResult};
use log::debug;
use std::sync::Arc;

/// Manages automatic board persistence.
pub struct AutoSaveManager<S: Storage> {
    storage: Arc<S>,
    debounce_ms: u64,
    /// Last local version observed.
    seen_version: Option<u64>,
    /// Local version last written.
    saved_version: Option<u64>,
    /// Time of the most recent unsaved change.
    changed_at: Option<u64>,
}

impl<S: Storage> AutoSaveManager<S> {
    pub fn new(storage: Arc<S>, debounce_ms: u64) -> Self {
        Self {
            storage,
            debounce_ms,
            seen_version: None,
            saved_version: None,
            changed_at: None,
        }
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    pub fn set_debounce_ms(&mut self, debounce_ms: u64) {
        self.debounce_ms = debounce_ms;
    }

    /// Treat `version` as already persisted, e.g. right after loading.
    pub fn mark_clean(&mut self, version: u64) {
        self.seen_version = Some(version);
        self.saved_version = Some(version);
        self.changed_at = None;
    }

    /// Record the store's current local version.
    pub fn observe(&mut self, version: u64, now: u64) {
        if self.seen_version == Some(version) {
            return;
        }
        self.seen_version = Some(version);
        if self.saved_version != Some(version) {
            self.changed_at = Some(now);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.changed_at.is_some()
    }

    /// Dirty and quiet for at least the debounce interval.
    pub fn should_save(&self, now: u64) -> bool {
        self.changed_at
            .is_some_and(|at| now.saturating_sub(at) >= self.debounce_ms)
    }

    /// Save if the debounce interval has elapsed. Returns whether it saved.
    pub async fn maybe_save(&mut self, board: &Board, now: u64) -> StorageResult<bool> {
        if !self.should_save(now) {
            return Ok(false);
        }
        self.save(board).await?;
        Ok(true)
    }

    /// Save immediately. A failed save leaves the board dirty.
    pub async fn save(&mut self, board: &Board) -> StorageResult<()> {
        self.storage.save_board(board).await?;
        debug!("Autosaved board {}", board.id);
        self.saved_version = self.seen_version;
        self.changed_at = None;
        Ok(())
    }

    /// Load a board and treat it as clean at `version`.
    pub async fn load(&mut self, id: &str, version: u64) -> StorageResult<Board> {
        let board = self.storage.load_board(id).await?;
        self.mark_clean(version);
        Ok(board)
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.delete_board(id).await
    }

    pub async fn list_boards(&self) -> StorageResult<Vec<String>> {
        self.storage.list_boards().await
    }

    pub async fn exists(&self, id: &str) -> StorageResult<bool> {
        self.storage.exists(id).await
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

/// Platform default storage.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_storage() -> StorageResult<Arc<crate::storage::FileStorage>> {
    Ok(Arc::new(crate::storage::FileStorage::default_location()?))
}

/// Auto-save manager over the platform default storage.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformAutoSaveManager = AutoSaveManager<crate::storage::FileStorage>;

#[cfg(not(target_arch = "wasm32"))]
pub fn create_autosave_manager(debounce_ms: u64) -> StorageResult<PlatformAutoSaveManager> {
    Ok(AutoSaveManager::new(create_default_storage()?, debounce_ms))
}
