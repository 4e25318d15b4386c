use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Permanent compute-if-absent cache over on-disk stage artifacts.
///
/// A readable artifact is returned without invoking the computation; there is
/// no TTL and no staleness check, so re-running a stage after a crash either
/// replays the cached result or restarts the computation from scratch.
/// Writes are atomic (temp file + rename) and a per-path lock ensures that
/// concurrent misses for the same key run the computation once, with the
/// other callers reading the freshly written artifact.
pub struct StageCache {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl Default for StageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StageCache {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_compute_json<T, F>(&self, path: &Path, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let key = self.key_lock(path);
        let _guard = key.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = self.read_json_opt(path)? {
            debug!(path = %path.display(), "cache hit");
            return Ok(cached);
        }
        let value = compute()?;
        self.write_json(path, &value)?;
        Ok(value)
    }

    pub fn get_or_compute_text<F>(&self, path: &Path, compute: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        let key = self.key_lock(path);
        let _guard = key.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = self.read_text_opt(path)? {
            debug!(path = %path.display(), "cache hit");
            return Ok(cached);
        }
        let value = compute()?;
        self.write_bytes(path, value.as_bytes())?;
        Ok(value)
    }

    /// Deserializes the artifact at `path` if it exists. A present but
    /// unreadable or corrupt artifact is a storage failure, not a miss.
    pub fn read_json_opt<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|source| PipelineError::CorruptArtifact {
                    path: path.to_path_buf(),
                    source,
                }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PipelineError::storage(path, err)),
        }
    }

    pub fn read_text_opt(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PipelineError::storage(path, err)),
        }
    }

    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value).map_err(|source| {
            PipelineError::CorruptArtifact {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.write_bytes(path, &body)
    }

    /// Single-file atomic replace so a concurrent reader never observes a
    /// partially written artifact.
    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = temp_sibling(path);
        fs::write(&tmp, bytes).map_err(|e| PipelineError::storage(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| PipelineError::storage(path, e))?;
        Ok(())
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn key_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn computes_once_then_serves_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atoms.json");
        let cache = StageCache::new();
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["a".to_string(), "b".to_string()])
        };
        let first: Vec<String> = cache.get_or_compute_json(&path, compute).unwrap();
        let second: Vec<String> = cache
            .get_or_compute_json(&path, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_read_is_byte_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleaned.txt");
        let cache = StageCache::new();
        let text = cache
            .get_or_compute_text(&path, || Ok("SPEAKER 1: Hello".to_string()))
            .unwrap();
        let bytes_after_first = fs::read(&path).unwrap();
        let again = cache
            .get_or_compute_text(&path, || Ok("different".to_string()))
            .unwrap();
        assert_eq!(text, again);
        assert_eq!(bytes_after_first, fs::read(&path).unwrap());
    }

    #[test]
    fn corrupt_artifact_surfaces_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");
        fs::write(&path, "{not json").unwrap();
        let cache = StageCache::new();
        let result: Result<Option<Vec<String>>> = cache.read_json_opt(&path);
        assert!(matches!(
            result,
            Err(PipelineError::CorruptArtifact { .. })
        ));
    }

    #[test]
    fn failed_compute_leaves_no_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atoms.json");
        let cache = StageCache::new();
        let result: Result<Vec<String>> = cache.get_or_compute_json(&path, || {
            Err(PipelineError::InvalidInput("boom".into()))
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn concurrent_misses_compute_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atoms.json");
        let cache = Arc::new(StageCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                cache
                    .get_or_compute_json(&path, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Ok(vec![1u32, 2, 3])
                    })
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![1, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
