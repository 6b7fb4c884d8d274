//! Per-folder record of indexed files with content-change fingerprints.
//! Persists `index_metadata.json` under a process-wide lock, since full
//! replacement of a folder's file map is the only supported update.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub hash: String,
    pub chunks: usize,
    pub indexed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub path: String,
    pub indexed_at: String,
    pub file_count: usize,
    pub files: HashMap<String, FileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metadata {
    pub indexes: Vec<IndexEntry>,
}

#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub path: String,
}

pub struct MetadataStore {
    path: PathBuf,
    state: Mutex<Metadata>,
}

impl MetadataStore {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            Metadata::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn save_locked(&self, metadata: &Metadata) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(metadata).expect("Metadata always serializes");
        std::fs::write(&self.path, content)
    }

    /// Deterministic 8-hex-character digest of a folder path, matching the
    /// id format used by the on-disk metadata file.
    pub fn index_id(folder_path: &str) -> String {
        let digest = md5::compute(folder_path.as_bytes());
        format!("{:x}", digest)[..8].to_string()
    }

    pub fn find_or_create_index(&self, folder_path: &str) -> IndexEntry {
        let mut state = self.state.lock();
        if let Some(existing) = state.indexes.iter().find(|idx| idx.path == folder_path) {
            return existing.clone();
        }
        let entry = IndexEntry {
            id: Self::index_id(folder_path),
            path: folder_path.to_string(),
            indexed_at: Utc::now().to_rfc3339(),
            file_count: 0,
            files: HashMap::new(),
        };
        state.indexes.push(entry.clone());
        let _ = self.save_locked(&state);
        entry
    }

    pub fn update_index_metadata(&self, folder_path: &str, files: HashMap<String, FileEntry>) {
        let mut state = self.state.lock();
        for idx in state.indexes.iter_mut() {
            if idx.path == folder_path {
                idx.indexed_at = Utc::now().to_rfc3339();
                idx.file_count = files.len();
                idx.files = files;
                break;
            }
        }
        let _ = self.save_locked(&state);
    }

    pub fn delete_index(&self, index_id: &str) {
        let mut state = self.state.lock();
        state.indexes.retain(|idx| idx.id != index_id);
        let _ = self.save_locked(&state);
    }

    pub fn all_indexes(&self) -> Vec<IndexEntry> {
        self.state.lock().indexes.clone()
    }

    /// Classify `all_files` against the stored map for `folder_path` into
    /// `(to_index, unchanged, deleted)`.
    pub fn get_files_needing_index(
        &self,
        folder_path: &str,
        all_files: &[FileDescriptor],
    ) -> (Vec<FileDescriptor>, Vec<FileDescriptor>, Vec<String>) {
        let state = self.state.lock();
        let existing = state.indexes.iter().find(|idx| idx.path == folder_path);

        let Some(existing) = existing else {
            return (all_files.to_vec(), Vec::new(), Vec::new());
        };

        let mut to_index = Vec::new();
        let mut unchanged = Vec::new();

        for file in all_files {
            let current_hash = fingerprint(&file.path);
            match existing.files.get(&file.path) {
                None => to_index.push(file.clone()),
                Some(entry) if Some(entry.hash.clone()) != current_hash => {
                    to_index.push(file.clone())
                }
                Some(_) => unchanged.push(file.clone()),
            }
        }

        let current_paths: std::collections::HashSet<&str> =
            all_files.iter().map(|f| f.path.as_str()).collect();
        let deleted: Vec<String> = existing
            .files
            .keys()
            .filter(|p| !current_paths.contains(p.as_str()))
            .cloned()
            .collect();

        (to_index, unchanged, deleted)
    }
}

impl Clone for FileDescriptor {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
        }
    }
}

/// `"{size}_{mtime_seconds}"`; missing file is treated as "needs reindex".
pub fn fingerprint(path: &str) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime = meta
        .modified()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_secs();
    Some(format!("{}_{}", meta.len(), mtime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn find_or_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("index_metadata.json")).unwrap();
        let a = store.find_or_create_index("/test/folder");
        let b = store.find_or_create_index("/test/folder");
        assert_eq!(a.id, b.id);
        assert_eq!(store.all_indexes().len(), 1);
    }

    #[test]
    fn index_id_is_deterministic_digest() {
        assert_eq!(
            MetadataStore::index_id("/test/folder"),
            MetadataStore::index_id("/test/folder")
        );
        assert_eq!(MetadataStore::index_id("/test/folder").len(), 8);
    }

    #[test]
    fn classifies_new_unchanged_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("index_metadata.json")).unwrap();

        let file_path = dir.path().join("f.txt");
        let mut f = std::fs::File::create(&file_path).unwrap();
        f.write_all(b"hello").unwrap();
        drop(f);
        let path_str = file_path.to_string_lossy().to_string();

        store.find_or_create_index(dir.path().to_str().unwrap());
        let hash = fingerprint(&path_str).unwrap();
        let mut files = HashMap::new();
        files.insert(
            path_str.clone(),
            FileEntry {
                hash,
                chunks: 1,
                indexed_at: Utc::now().to_rfc3339(),
            },
        );
        store.update_index_metadata(dir.path().to_str().unwrap(), files);

        let all = vec![
            FileDescriptor { path: path_str.clone() },
            FileDescriptor {
                path: "new.txt".to_string(),
            },
        ];
        let (to_index, unchanged, _deleted) =
            store.get_files_needing_index(dir.path().to_str().unwrap(), &all);
        assert_eq!(unchanged.len(), 1);
        assert_eq!(to_index.len(), 1);
        assert_eq!(to_index[0].path, "new.txt");
    }

    #[test]
    fn no_existing_index_means_everything_needs_indexing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("index_metadata.json")).unwrap();
        let all = vec![FileDescriptor {
            path: "a.txt".to_string(),
        }];
        let (to_index, unchanged, deleted) = store.get_files_needing_index("/nope", &all);
        assert_eq!(to_index.len(), 1);
        assert!(unchanged.is_empty());
        assert!(deleted.is_empty());
    }
}
