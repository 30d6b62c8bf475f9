use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// A data file picked by the user, handed between surfaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads `path`; the file name becomes the selection's name.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }
}

type Listener = Arc<dyn Fn(Option<&SelectedFile>) + Send + Sync>;

#[derive(Default)]
struct BusState {
    current: Option<SelectedFile>,
    listeners: BTreeMap<u64, Listener>,
    next_listener_id: u64,
}

/// Shared "selected file" slot with change listeners.
///
/// Clones share the same slot. Listeners run on the thread that calls
/// [`SelectedFileBus::set`], after the slot is updated, in subscription order.
#[derive(Clone, Default)]
pub struct SelectedFileBus {
    state: Arc<Mutex<BusState>>,
}

impl std::fmt::Debug for SelectedFileBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SelectedFileBus")
            .field("current", &state.current.as_ref().map(|file| &file.name))
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl SelectedFileBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<SelectedFile> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    pub fn set(&self, file: Option<SelectedFile>) {
        let listeners: Vec<Listener> = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.current = file.clone();
            state.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(file.as_ref());
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Option<&SelectedFile>) + Send + Sync + 'static,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(id, Arc::new(listener));
        Subscription {
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }
}

/// Registration returned by [`SelectedFileBus::subscribe`]. Dropping it does
/// not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    state: Weak<Mutex<BusState>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(state) = self.state.upgrade() {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&self.id);
        }
    }
}

/// Matches a typed file name against uploaded files: exact name first, then
/// case-insensitive, then case-insensitive on the base name. Blank input
/// matches nothing.
pub fn find_uploaded_file<'a>(typed: &str, files: &'a [SelectedFile]) -> Option<&'a SelectedFile> {
    let typed = typed.trim();
    if typed.is_empty() {
        return None;
    }
    let lower = typed.to_lowercase();
    let typed_base = base_name(&lower);

    files
        .iter()
        .find(|file| file.name == typed)
        .or_else(|| files.iter().find(|file| file.name.to_lowercase() == lower))
        .or_else(|| {
            files
                .iter()
                .find(|file| base_name(&file.name.to_lowercase()) == typed_base)
        })
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}
