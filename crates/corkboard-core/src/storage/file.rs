//! File-based storage for native platforms.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use crate::board::Board;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Stores each board as a JSON file named after its id.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a file storage rooted at `base_path`, creating the directory
    /// if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {e}"))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Storage in the platform's local data directory, e.g.
    /// `~/.local/share/corkboard/boards/` on Linux.
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("corkboard").join("boards"))
    }

    fn board_path(&self, id: &str) -> PathBuf {
        let safe_id: String = id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{safe_id}.json"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for FileStorage {
    fn save_board(&self, board: &Board) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.board_path(&board.id);
        let json = board.to_json();

        Box::pin(async move {
            let json = json.map_err(|e| StorageError::Serialization(e.to_string()))?;
            fs::write(&path, json).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {e}", path.display()))
            })?;
            info!("Saved board to {}", path.display());
            Ok(())
        })
    }

    fn load_board(&self, id: &str) -> BoxFuture<'_, StorageResult<Board>> {
        let path = self.board_path(id);
        let id = id.to_string();

        Box::pin(async move {
            if !path.exists() {
                return Err(StorageError::NotFound(id));
            }
            let json = fs::read_to_string(&path).map_err(|e| {
                StorageError::Io(format!("Failed to read {}: {e}", path.display()))
            })?;
            Board::from_json(&json).map_err(|e| {
                StorageError::Serialization(format!("Failed to parse {}: {e}", path.display()))
            })
        })
    }

    fn delete_board(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.board_path(id);

        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {e}", path.display()))
                })?;
            }
            Ok(())
        })
    }

    fn list_boards(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let base = self.base_path.clone();

        Box::pin(async move {
            if !base.exists() {
                return Ok(vec![]);
            }
            let entries = fs::read_dir(&base)
                .map_err(|e| StorageError::Io(format!("Failed to read directory: {e}")))?;

            let mut ids: Vec<String> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|e| e == "json"))
                .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
                .collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let path = self.board_path(id);
        Box::pin(async move { Ok(path.exists()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Geometry, NodePayload, VisualNode};
    use crate::storage::block_on;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_save_load() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        let mut board = Board::new("Planning", "ana", 0);
        let node = VisualNode::new(Geometry::new(1.0, 2.0, 100.0, 80.0), NodePayload::Risk);
        board.nodes.insert(node.id(), node);
        board.viewport.zoom = 1.5;

        block_on(storage.save_board(&board)).unwrap();
        let loaded = block_on(storage.load_board(&board.id)).unwrap();

        assert_eq!(loaded, board);
    }

    #[test]
    fn test_file_storage_not_found() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        let result = block_on(storage.load_board("nonexistent"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_file_storage_corrupt_file() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("broken.json"), "{ nope").unwrap();

        let result = block_on(storage.load_board("broken"));
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_file_storage_list_and_delete() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let a = Board::new("A", "ana", 0);
        let b = Board::new("B", "ana", 0);
        block_on(storage.save_board(&a)).unwrap();
        block_on(storage.save_board(&b)).unwrap();

        let list = block_on(storage.list_boards()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&a.id));

        block_on(storage.delete_board(&a.id)).unwrap();
        assert!(!block_on(storage.exists(&a.id)).unwrap());
        assert!(block_on(storage.exists(&b.id)).unwrap());
    }

    #[test]
    fn test_file_storage_sanitizes_id() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        let mut board = Board::new("Odd", "ana", 0);
        board.id = "team/board:with*special".to_string();
        block_on(storage.save_board(&board)).unwrap();

        assert!(dir.path().join("team_board_with_special.json").exists());
        let loaded = block_on(storage.load_board("team/board:with*special")).unwrap();
        assert_eq!(loaded.id, board.id);
    }
}
