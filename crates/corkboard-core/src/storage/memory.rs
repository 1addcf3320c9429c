//! In-memory storage implementation.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use crate::board::Board;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    boards: RwLock<HashMap<String, Board>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {e}"))
}

impl Storage for MemoryStorage {
    fn save_board(&self, board: &Board) -> BoxFuture<'_, StorageResult<()>> {
        let board = board.clone();
        Box::pin(async move {
            let mut boards = self.boards.write().map_err(lock_error)?;
            boards.insert(board.id.clone(), board);
            Ok(())
        })
    }

    fn load_board(&self, id: &str) -> BoxFuture<'_, StorageResult<Board>> {
        let id = id.to_string();
        Box::pin(async move {
            let boards = self.boards.read().map_err(lock_error)?;
            boards.get(&id).cloned().ok_or(StorageError::NotFound(id))
        })
    }

    fn delete_board(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut boards = self.boards.write().map_err(lock_error)?;
            boards.remove(&id);
            Ok(())
        })
    }

    fn list_boards(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let boards = self.boards.read().map_err(lock_error)?;
            let mut ids: Vec<String> = boards.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let id = id.to_string();
        Box::pin(async move {
            let boards = self.boards.read().map_err(lock_error)?;
            Ok(boards.contains_key(&id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block_on;

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        let board = Board::new("Retro", "ana", 0);

        block_on(storage.save_board(&board)).unwrap();
        let loaded = block_on(storage.load_board(&board.id)).unwrap();

        assert_eq!(loaded.name, "Retro");
        assert_eq!(loaded.id, board.id);
    }

    #[test]
    fn test_not_found() {
        let storage = MemoryStorage::new();
        let result = block_on(storage.load_board("nonexistent"));

        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_delete_and_exists() {
        let storage = MemoryStorage::new();
        let board = Board::new("Retro", "ana", 0);

        assert!(!block_on(storage.exists(&board.id)).unwrap());
        block_on(storage.save_board(&board)).unwrap();
        assert!(block_on(storage.exists(&board.id)).unwrap());
        block_on(storage.delete_board(&board.id)).unwrap();
        assert!(!block_on(storage.exists(&board.id)).unwrap());
        block_on(storage.delete_board(&board.id)).unwrap();
    }

    #[test]
    fn test_list() {
        let storage = MemoryStorage::new();
        let a = Board::new("A", "ana", 0);
        let b = Board::new("B", "ana", 0);

        block_on(storage.save_board(&a)).unwrap();
        block_on(storage.save_board(&b)).unwrap();

        let list = block_on(storage.list_boards()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&a.id));
        assert!(list.contains(&b.id));
    }
}
