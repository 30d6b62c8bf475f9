use crate::{NotebookBridge, TdCell};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Characters of cell source that take part in the change signature.
pub const SIGNATURE_SOURCE_CHARS: usize = 140;

/// Digest over index, id, function, params and the first
/// [`SIGNATURE_SOURCE_CHARS`] characters of source of every cell.
pub fn cell_signature(cells: &[TdCell]) -> String {
    let view: Vec<Value> = cells
        .iter()
        .map(|cell| {
            let prefix: String = cell.source.chars().take(SIGNATURE_SOURCE_CHARS).collect();
            json!({
                "i": cell.index,
                "id": cell.id,
                "fn": cell.function,
                "p": cell.params,
                "s": prefix,
            })
        })
        .collect();
    blake3::hash(Value::Array(view).to_string().as_bytes())
        .to_hex()
        .to_string()
}

/// Handle to a running notebook poll loop.
#[derive(Debug)]
pub struct NotebookWatch {
    stop_requested: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl NotebookWatch {
    /// Stops the loop after the tick in progress, if any.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.stop_notify.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(error) = self.handle.await {
            tracing::debug!(%error, "notebook watch task ended abnormally");
        }
    }
}

/// Polls the bridge's notebook every `interval` and calls `on_cells` when the
/// cell signature differs from the previous tick. The first successful read
/// always reports.
///
/// Ticks run strictly one after another; each read, including any tagging
/// write-back, completes before the next sleep starts. Failed reads are
/// logged and skipped.
pub fn watch_notebook<F>(bridge: NotebookBridge, interval: Duration, mut on_cells: F) -> NotebookWatch
where
    F: FnMut(Vec<TdCell>) + Send + 'static,
{
    let stop_requested = Arc::new(AtomicBool::new(false));
    let stop_notify = Arc::new(Notify::new());

    let task_stop_requested = stop_requested.clone();
    let task_stop_notify = stop_notify.clone();
    let handle = tokio::spawn(async move {
        let mut last_signature: Option<String> = None;
        loop {
            if task_stop_requested.load(Ordering::SeqCst) {
                break;
            }

            match bridge.list_cells().await {
                Ok(cells) => {
                    let signature = cell_signature(&cells);
                    if last_signature.as_deref() != Some(signature.as_str()) {
                        last_signature = Some(signature);
                        on_cells(cells);
                    }
                }
                Err(error) => {
                    tracing::debug!(%error, path = bridge.path(), "notebook poll failed");
                }
            }

            tokio::select! {
                _ = task_stop_notify.notified() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    });

    NotebookWatch {
        stop_requested,
        stop_notify,
        handle,
    }
}
