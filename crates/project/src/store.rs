use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::ProjectError;

/// Local key-value storage holding whole serialized values per key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, ProjectError>;

    /// Replace the value under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), ProjectError>;

    fn remove(&mut self, key: &str) -> Result<(), ProjectError>;
}

/// One file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ProjectError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ProjectError> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), ProjectError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ProjectError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ProjectError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), ProjectError> {
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_missing_key_is_none() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path());
        assert_eq!(store.get("absent").expect("get"), None);
    }

    #[test]
    fn test_file_store_set_get_remove() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileStore::new(dir.path().join("nested"));

        store.set("blocks", "[1,2]").expect("set");
        assert_eq!(store.get("blocks").expect("get").as_deref(), Some("[1,2]"));
        assert!(!dir.path().join("nested").join("blocks.json.tmp").exists());

        store.set("blocks", "[3]").expect("overwrite");
        assert_eq!(store.get("blocks").expect("get").as_deref(), Some("[3]"));

        store.remove("blocks").expect("remove");
        store.remove("blocks").expect("remove twice");
        assert_eq!(store.get("blocks").expect("get"), None);
    }

    #[test]
    fn test_file_store_write_into_file_path_fails() {
        let dir = tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("write");

        let mut store = FileStore::new(&blocker);
        assert!(matches!(store.set("blocks", "[]"), Err(ProjectError::Io(_))));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        store.set("k", "v").expect("set");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("v"));
        store.remove("k").expect("remove");
        assert_eq!(store.get("k").expect("get"), None);
    }
}
