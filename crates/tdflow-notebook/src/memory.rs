use crate::store::{NotebookError, NotebookResult, NotebookStore};
use crate::NotebookContent;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    notebooks: BTreeMap<String, NotebookContent>,
    loads: usize,
    saves: usize,
    fail_next: usize,
}

/// In-process notebook store. Counts reads and writes so sync behaviour can
/// be asserted on.
#[derive(Clone, Debug, Default)]
pub struct MemoryNotebookStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryNotebookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notebook(self, path: impl Into<String>, content: NotebookContent) -> Self {
        if let Ok(mut state) = self.inner.lock() {
            state.notebooks.insert(path.into(), content);
        }
        self
    }

    pub fn notebook(&self, path: &str) -> Option<NotebookContent> {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.notebooks.get(path).cloned())
    }

    /// Replaces a notebook without counting a save, as an outside editor would.
    pub fn put_external(&self, path: impl Into<String>, content: NotebookContent) {
        if let Ok(mut state) = self.inner.lock() {
            state.notebooks.insert(path.into(), content);
        }
    }

    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|state| state.saves).unwrap_or_default()
    }

    pub fn load_count(&self) -> usize {
        self.inner.lock().map(|state| state.loads).unwrap_or_default()
    }

    /// Makes the next `count` operations fail with a backend error.
    pub fn fail_next(&self, count: usize) {
        if let Ok(mut state) = self.inner.lock() {
            state.fail_next = count;
        }
    }

    fn lock(&self) -> NotebookResult<std::sync::MutexGuard<'_, MemoryState>> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| NotebookError::Backend("memory notebook mutex poisoned".to_string()))?;
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(NotebookError::Backend("injected failure".to_string()));
        }
        Ok(state)
    }
}

#[async_trait::async_trait]
impl NotebookStore for MemoryNotebookStore {
    async fn load(&self, path: &str) -> NotebookResult<Option<NotebookContent>> {
        let mut state = self.lock()?;
        state.loads += 1;
        Ok(state.notebooks.get(path).cloned())
    }

    async fn save(&self, path: &str, content: &NotebookContent) -> NotebookResult<()> {
        let mut state = self.lock()?;
        state.saves += 1;
        state.notebooks.insert(path.to_string(), content.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn memory_store_save_then_load_expected_same_content() {
        let store = MemoryNotebookStore::new();
        assert!(store.load("a.ipynb").await.expect("load").is_none());

        store
            .save("a.ipynb", &NotebookContent::empty())
            .await
            .expect("save");
        assert_eq!(
            store.load("a.ipynb").await.expect("load"),
            Some(NotebookContent::empty())
        );
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load_count(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn memory_store_fail_next_expected_backend_error_once() {
        let store = MemoryNotebookStore::new();
        store.fail_next(1);
        assert!(matches!(
            store.load("x").await,
            Err(NotebookError::Backend(_))
        ));
        assert!(store.load("x").await.is_ok());
    }
}
