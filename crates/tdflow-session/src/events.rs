use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tdflow_spec::NodeId;
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    SpecChanged {
        node_count: usize,
    },
    NodeAdded {
        node_id: NodeId,
    },
    NodeUpdated {
        node_id: NodeId,
    },
    NodesRemoved {
        node_ids: Vec<NodeId>,
    },
    Merged {
        added: Vec<NodeId>,
        renamed: Vec<(NodeId, NodeId)>,
        skipped: Vec<NodeId>,
    },
    NotebookPushed {
        node_id: NodeId,
    },
    NotebookSyncFailed {
        node_id: Option<NodeId>,
        message: String,
    },
    ExternalCellsApplied {
        node_count: usize,
    },
    ExternalCellsIgnored,
    PreviewReady {
        node_id: NodeId,
        rows: usize,
    },
    ReceiverRequired {
        node_id: NodeId,
    },
}

pub trait SessionEventObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

impl<F> SessionEventObserver for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent) {
        self(event);
    }
}

pub type SharedSessionEventObserver = Arc<dyn SessionEventObserver>;
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Fan-out for session events. The default sink drops everything.
#[derive(Clone, Default)]
pub struct SessionEventSink {
    observer: Option<SharedSessionEventObserver>,
    sender: Option<SessionEventSender>,
}

impl std::fmt::Debug for SessionEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEventSink")
            .field("observer", &self.observer.is_some())
            .field("sender", &self.sender.is_some())
            .finish()
    }
}

impl SessionEventSink {
    pub fn with_observer(observer: SharedSessionEventObserver) -> Self {
        Self {
            observer: Some(observer),
            sender: None,
        }
    }

    pub fn with_sender(sender: SessionEventSender) -> Self {
        Self {
            observer: None,
            sender: Some(sender),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.observer.is_some() || self.sender.is_some()
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(observer) = self.observer.as_ref() {
            observer.on_event(&event);
        }
        if let Some(sender) = self.sender.as_ref() {
            let _ = sender.send(event);
        }
    }
}

pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn default_sink_expected_disabled() {
        let sink = SessionEventSink::default();
        assert!(!sink.is_enabled());
        sink.emit(SessionEvent::ExternalCellsIgnored);
    }

    #[test]
    fn sink_observer_and_sender_expected_both_receive_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer_seen = Arc::clone(&seen);
        let observer: SharedSessionEventObserver = Arc::new(move |event: &SessionEvent| {
            observer_seen
                .lock()
                .expect("observer mutex should lock")
                .push(event.clone());
        });
        let (tx, mut rx) = session_event_channel();
        let sink = SessionEventSink {
            observer: Some(observer),
            sender: Some(tx),
        };
        sink.emit(SessionEvent::NodeAdded {
            node_id: "read_csv_0".to_string(),
        });

        assert_eq!(
            rx.try_recv().expect("channel should receive one event"),
            SessionEvent::NodeAdded {
                node_id: "read_csv_0".to_string()
            }
        );
        assert_eq!(seen.lock().expect("observer mutex should lock").len(), 1);
    }

    #[test]
    fn session_event_serializes_with_kind_tag() {
        let value = serde_json::to_value(SessionEvent::SpecChanged { node_count: 2 })
            .expect("event should serialize");
        assert_eq!(value, serde_json::json!({"kind": "spec_changed", "node_count": 2}));
    }
}
