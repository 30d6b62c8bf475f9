use crate::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("pipeline document is not valid YAML{}: {message}", at_line(.line))]
    Parse { message: String, line: Option<usize> },
    #[error("invalid pipeline document: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<serde_yaml::Error> for SpecError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Parse {
            line: error.location().map(|location| location.line()),
            message: error.to_string(),
        }
    }
}

fn at_line(line: &Option<usize>) -> String {
    line.map(|line| format!(" near line {line}")).unwrap_or_default()
}

/// Lint found at least one error-severity finding.
#[derive(Debug, Error, Clone)]
#[error("{blocking} blocking lint finding(s): {}", blocking_summary(.diagnostics))]
pub struct ValidationError {
    pub diagnostics: Vec<Diagnostic>,
    pub blocking: usize,
}

impl ValidationError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        let blocking = diagnostics.iter().filter(|d| d.is_error()).count();
        Self {
            diagnostics,
            blocking,
        }
    }
}

fn blocking_summary(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(Diagnostic::summary)
        .collect::<Vec<_>>()
        .join("; ")
}
