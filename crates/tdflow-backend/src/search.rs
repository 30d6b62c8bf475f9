use crate::{
    BackendConfig, BackendError, BackendResult, FunctionCatalog, FunctionInfo, sort_by_relevance,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;

struct InFlight {
    generation: u64,
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl InFlight {
    fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.abort.abort();
    }
}

/// Aborts the spawned query when the caller stops waiting for it.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Debounced function search where each new query supersedes the last.
///
/// A query waits out the debounce before it reaches the catalog. Starting a
/// new query, or calling [`FunctionSearch::cancel`], aborts the one in
/// flight; the superseded call resolves to `None`. Dropping the future
/// returned by [`FunctionSearch::search`] aborts its query too.
pub struct FunctionSearch {
    catalog: Arc<dyn FunctionCatalog>,
    debounce: Duration,
    generation: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
}

impl std::fmt::Debug for FunctionSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSearch")
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl FunctionSearch {
    pub fn new(catalog: Arc<dyn FunctionCatalog>, debounce: Duration) -> Self {
        Self {
            catalog,
            debounce,
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    pub fn from_config(catalog: Arc<dyn FunctionCatalog>, config: &BackendConfig) -> Self {
        Self::new(catalog, Duration::from_millis(config.search_debounce_ms))
    }

    /// Runs `query` after the debounce. Blank queries resolve to an empty
    /// list at once without reaching the catalog.
    pub async fn search(&self, query: &str) -> Option<BackendResult<Vec<FunctionInfo>>> {
        let query = query.trim().to_string();
        if query.is_empty() {
            self.cancel();
            return Some(Ok(Vec::new()));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancelled = Arc::new(AtomicBool::new(false));
        let catalog = self.catalog.clone();
        let debounce = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let mut functions = catalog.search_functions(&query).await?;
            sort_by_relevance(&mut functions);
            Ok::<_, BackendError>(functions)
        });

        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(InFlight {
                generation,
                cancelled: cancelled.clone(),
                abort: handle.abort_handle(),
            });
        if let Some(previous) = previous {
            previous.cancel();
        }

        let _abort_on_drop = AbortOnDrop(handle.abort_handle());
        let joined = handle.await;
        self.finish(generation);
        if cancelled.load(Ordering::SeqCst) {
            return None;
        }
        match joined {
            Ok(result) => Some(result),
            Err(error) if error.is_cancelled() => None,
            Err(error) => {
                tracing::warn!(%error, "function search task failed");
                Some(Err(BackendError::Transport(format!("search task failed: {error}"))))
            }
        }
    }

    /// Aborts the query in flight, if any.
    pub fn cancel(&self) {
        let current = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(current) = current {
            current.cancel();
        }
    }

    fn finish(&self, generation: u64) {
        let mut guard = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().is_some_and(|f| f.generation == generation) {
            *guard = None;
        }
    }
}
