use crate::{NodeId, ReceiverKey};
use serde::{Deserialize, Serialize};

/// Only errors make [`crate::validate_or_raise`] fail; warnings flag nodes
/// the backend is likely to reject at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One lint finding about a pipeline node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    /// Node the finding is about.
    pub node_id: Option<NodeId>,
    /// Node id the finding points at, e.g. a missing dependency.
    pub reference: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<ReceiverKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Diagnostic {
    fn with_severity(
        rule: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            node_id: None,
            reference: None,
            receiver: None,
            fix: None,
        }
    }

    pub fn error(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_severity(rule, Severity::Error, message)
    }

    pub fn warning(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_severity(rule, Severity::Warning, message)
    }

    pub fn info(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_severity(rule, Severity::Info, message)
    }

    pub fn on_node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn pointing_at(mut self, node_id: impl Into<NodeId>) -> Self {
        self.reference = Some(node_id.into());
        self
    }

    pub fn via_receiver(mut self, key: ReceiverKey) -> Self {
        self.receiver = Some(key);
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `[rule] node: message`, without the node part for document-wide
    /// findings.
    pub fn summary(&self) -> String {
        match &self.node_id {
            Some(node_id) => format!("[{}] {node_id}: {}", self.rule, self.message),
            None => format!("[{}] {}", self.rule, self.message),
        }
    }
}
