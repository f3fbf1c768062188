//! In-memory storage backend for testing.
//!
//! HashMap-based `Storage` implementation used for the `memory://` scheme in
//! tests to avoid file I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use riffle_mem::error::{Error as MemError, Result as MemResult};
use riffle_mem::Storage;

/// Thread-safe in-memory storage using a HashMap.
#[derive(Clone)]
pub struct MemoryStorage {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check if a path exists.
    pub fn contains(&self, path: &str) -> bool {
        self.data.lock().unwrap().contains_key(path)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.data.lock().unwrap().clear();
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> MemResult<()> {
        self.data
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> MemResult<Vec<u8>> {
        let data = self.data.lock().unwrap();
        let bytes = data
            .get(path)
            .ok_or_else(|| MemError::Storage(format!("path not found: {}", path)))?;

        let start = offset as usize;
        if start >= bytes.len() {
            return Err(MemError::Storage(format!(
                "offset {} exceeds size {}",
                offset,
                bytes.len()
            )));
        }
        let end = (start + len).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    fn delete(&self, path: &str) -> MemResult<()> {
        self.data.lock().unwrap().remove(path);
        Ok(())
    }

    fn list(&self, prefix: &str) -> MemResult<Vec<String>> {
        let data = self.data.lock().unwrap();
        let mut result: Vec<String> = data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        result.sort();
        Ok(result)
    }

    fn size(&self, path: &str) -> MemResult<u64> {
        let data = self.data.lock().unwrap();
        let bytes = data
            .get(path)
            .ok_or_else(|| MemError::Storage(format!("path not found: {}", path)))?;
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_write_read() {
        let storage = MemoryStorage::new();
        let path = "test/file.seg";
        let data = b"hello world";

        storage.write(path, data).unwrap();
        let read_data = storage.read_range(path, 0, data.len()).unwrap();

        assert_eq!(read_data, data);
    }

    #[test]
    fn test_memory_storage_read_range() {
        let storage = MemoryStorage::new();
        let path = "test/file.seg";
        storage.write(path, b"hello world").unwrap();

        let partial = storage.read_range(path, 6, 5).unwrap();
        assert_eq!(partial, b"world");
    }

    #[test]
    fn test_memory_storage_delete_is_idempotent() {
        let storage = MemoryStorage::new();
        let path = "test/file.seg";

        storage.write(path, b"data").unwrap();
        assert!(storage.contains(path));

        storage.delete(path).unwrap();
        storage.delete(path).unwrap();
        assert!(!storage.contains(path));
    }

    #[test]
    fn test_memory_storage_list() {
        let storage = MemoryStorage::new();

        storage.write("dir/file1.seg", b"1").unwrap();
        storage.write("dir/file2.seg", b"2").unwrap();
        storage.write("other/file3.seg", b"3").unwrap();

        let files = storage.list("dir/").unwrap();
        assert_eq!(files.len(), 2);
    }
}
