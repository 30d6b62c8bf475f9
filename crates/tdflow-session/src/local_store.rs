use crate::{SessionError, SessionResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const TOKEN_KEY: &str = "td_token";
pub const SELECTED_FILE_KEY: &str = "td_selected_file";
pub const OPEN_PIPELINE_KEY: &str = "td_open_pipeline";

/// String key-value persistence for state that outlives a session.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> SessionResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> SessionResult<()>;
    fn remove(&self, key: &str) -> SessionResult<()>;

    /// Bearer token, empty when unset.
    fn token(&self) -> SessionResult<String> {
        Ok(self.get(TOKEN_KEY)?.unwrap_or_default())
    }

    fn set_token(&self, token: &str) -> SessionResult<()> {
        self.set(TOKEN_KEY, token)
    }

    fn clear_token(&self) -> SessionResult<()> {
        self.remove(TOKEN_KEY)
    }

    fn selected_file_name(&self) -> SessionResult<Option<String>> {
        Ok(self
            .get(SELECTED_FILE_KEY)?
            .filter(|name| !name.trim().is_empty()))
    }

    fn set_selected_file_name(&self, name: Option<&str>) -> SessionResult<()> {
        match name {
            Some(name) => self.set(SELECTED_FILE_KEY, name),
            None => self.remove(SELECTED_FILE_KEY),
        }
    }

    /// Queues a pipeline document to open on the next session start.
    fn set_open_pipeline(&self, yaml: &str) -> SessionResult<()> {
        let payload = serde_json::json!({ "yaml": yaml });
        self.set(OPEN_PIPELINE_KEY, &payload.to_string())
    }

    /// Takes the queued pipeline document. The entry is removed whether or
    /// not it held a usable `yaml` field.
    fn take_open_pipeline(&self) -> SessionResult<Option<String>> {
        let Some(raw) = self.get(OPEN_PIPELINE_KEY)? else {
            return Ok(None);
        };
        self.remove(OPEN_PIPELINE_KEY)?;
        let yaml = serde_json::from_str::<Value>(&raw)
            .ok()
            .and_then(|payload| payload.get("yaml")?.as_str().map(str::to_string));
        if yaml.is_none() {
            tracing::debug!("discarded unreadable open-pipeline payload");
        }
        Ok(yaml)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// Key-value store persisted as one JSON object file. Every write replaces
/// the file through a temporary sibling.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryKeyValueStore,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read(&path)
                .map_err(|err| SessionError::Storage(format!("read state file failed: {err}")))?;
            serde_json::from_slice::<BTreeMap<String, String>>(&raw)
                .map_err(|err| SessionError::Storage(format!("decode state file failed: {err}")))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            inner: MemoryKeyValueStore {
                entries: Arc::new(Mutex::new(entries)),
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> SessionResult<()> {
        let raw = serde_json::to_vec_pretty(&*self.inner.entries())
            .map_err(|err| SessionError::Storage(format!("encode state failed: {err}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| SessionError::Storage(format!("create state dir failed: {err}")))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .map_err(|err| SessionError::Storage(format!("write state file failed: {err}")))?;
        fs::rename(&tmp, &self.path)
            .map_err(|err| SessionError::Storage(format!("rename state file failed: {err}")))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        self.inner.set(key, value)?;
        self.persist()
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.inner.remove(key)?;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_open_pipeline_expected_consumed_once() {
        let store = MemoryKeyValueStore::new();
        store.set_open_pipeline("nodes: {}\n").expect("set");
        assert_eq!(
            store.take_open_pipeline().expect("take").as_deref(),
            Some("nodes: {}\n")
        );
        assert_eq!(store.take_open_pipeline().expect("take"), None);
    }

    #[test]
    fn take_open_pipeline_garbage_expected_none_and_removed() {
        let store = MemoryKeyValueStore::new();
        store.set(OPEN_PIPELINE_KEY, "not json").expect("set");
        assert_eq!(store.take_open_pipeline().expect("take"), None);
        assert_eq!(store.get(OPEN_PIPELINE_KEY).expect("get"), None);
    }

    #[test]
    fn token_unset_expected_empty_string() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.token().expect("token"), "");
        store.set_token("abc").expect("set");
        assert_eq!(store.token().expect("token"), "abc");
        store.clear_token().expect("clear");
        assert_eq!(store.token().expect("token"), "");
    }

    #[test]
    fn json_file_store_reopen_expected_persisted_entries() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("state").join("local.json");
        {
            let store = JsonFileStore::open(&path).expect("open");
            store.set_token("t0k").expect("set token");
            store.set_selected_file_name(Some("sales.csv")).expect("set file");
        }
        let reopened = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(reopened.token().expect("token"), "t0k");
        assert_eq!(
            reopened.selected_file_name().expect("file").as_deref(),
            Some("sales.csv")
        );
    }

    #[test]
    fn json_file_store_corrupt_file_expected_storage_error() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("local.json");
        fs::write(&path, b"[1,2").expect("write");
        assert!(matches!(JsonFileStore::open(&path), Err(SessionError::Storage(_))));
    }
}
