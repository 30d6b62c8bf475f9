//! Editor session: funnels every user action into document mutations,
//! graph reprojection and notebook mirroring.

pub mod config;
pub mod editor;
pub mod errors;
pub mod events;
pub mod file_bus;
pub mod guard;
pub mod local_store;

pub use config::{DEFAULT_PREVIEW_ROW_LIMIT, DEFAULT_SETTLE_DELAY_MS, SessionConfig};
pub use editor::{EditTarget, PipelineEditor, PreviewOutcome};
pub use errors::{SessionError, SessionResult};
pub use events::{
    SessionEvent, SessionEventObserver, SessionEventReceiver, SessionEventSender,
    SessionEventSink, SharedSessionEventObserver, session_event_channel,
};
pub use file_bus::{SelectedFile, SelectedFileBus, Subscription, find_uploaded_file};
pub use guard::SyncGuard;
pub use local_store::{
    JsonFileStore, KeyValueStore, MemoryKeyValueStore, OPEN_PIPELINE_KEY, SELECTED_FILE_KEY,
    TOKEN_KEY,
};
