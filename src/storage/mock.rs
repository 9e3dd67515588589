use super::{StorageError, StorageResult, StorageService};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// In-memory disk that records every call.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and keep another as a probe.
#[derive(Clone)]
pub struct MockStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    base_url: String,
    writes: Arc<Mutex<Vec<String>>>,
    deletes: Arc<Mutex<Vec<String>>>,
    directories: Arc<Mutex<HashSet<String>>>,
    failing_writes: Arc<Mutex<Vec<String>>>,
    failing_deletes: Arc<Mutex<Vec<String>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-storage.example.com".to_string(),
            writes: Arc::new(Mutex::new(Vec::new())),
            deletes: Arc::new(Mutex::new(Vec::new())),
            directories: Arc::new(Mutex::new(HashSet::new())),
            failing_writes: Arc::new(Mutex::new(Vec::new())),
            failing_deletes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_file(self, key: String, content: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(key, content);
        self
    }

    /// Fail every write whose key contains `pattern`.
    pub fn with_write_failure(self, pattern: &str) -> Self {
        self.failing_writes.lock().unwrap().push(pattern.to_string());
        self
    }

    /// Fail every delete whose key contains `pattern`.
    pub fn with_delete_failure(self, pattern: &str) -> Self {
        self.failing_deletes
            .lock()
            .unwrap()
            .push(pattern.to_string());
        self
    }

    pub fn get_write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn get_delete_count(&self) -> usize {
        self.deletes.lock().unwrap().len()
    }

    /// Keys passed to `write`, in call order.
    pub fn get_writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Keys passed to `delete`, in call order.
    pub fn get_deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn get_files(&self) -> HashMap<String, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }

    pub fn get_directories(&self) -> HashSet<String> {
        self.directories.lock().unwrap().clone()
    }

    fn matches(patterns: &Mutex<Vec<String>>, key: &str) -> bool {
        patterns.lock().unwrap().iter().any(|p| key.contains(p))
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageService for MockStorage {
    async fn write(&self, key: &str, data: &[u8], _content_type: &str) -> StorageResult<String> {
        self.writes.lock().unwrap().push(key.to_string());

        if Self::matches(&self.failing_writes, key) {
            return Err(StorageError::WriteFailed(format!("Mock failure for {}", key)));
        }

        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deletes.lock().unwrap().push(key.to_string());

        if Self::matches(&self.failing_deletes, key) {
            return Err(StorageError::DeleteFailed(format!("Mock failure for {}", key)));
        }

        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    async fn ensure_directory(&self, directory: &str) -> StorageResult<()> {
        self.directories
            .lock()
            .unwrap()
            .insert(directory.to_string());
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }
}
