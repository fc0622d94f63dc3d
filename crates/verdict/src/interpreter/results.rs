//! Evaluation outputs: diagnostics, reject records, traces

use crate::ast::Span;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Evaluation continues
    Warning,

    /// Evaluation aborts unless errors are ignored
    Error,
}

/// A message recorded against a source span during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Warning or error
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// The node that raised it
    pub span: Span,
}

impl Diagnostic {
    /// A warning diagnostic.
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    /// An error diagnostic.
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }
}

/// One rejected value.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectRecord {
    /// The displayed reason
    pub message: String,

    /// The rejected value, unwrapped for the host
    pub value: serde_json::Value,

    /// Provenance of the value in the subject data: field keys and
    /// array indices from the root
    pub path: Vec<serde_json::Value>,

    /// The source span of the reject statement
    pub span: Span,
}

/// The rejects collected by one `validate` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// The block's label, when it has one
    pub label: Option<String>,

    /// Rejects recorded while the block ran, in order
    pub rejects: Vec<RejectRecord>,
}

impl ValidationResult {
    /// Whether the block recorded no rejects.
    pub fn passed(&self) -> bool {
        self.rejects.is_empty()
    }
}

/// One visited node in a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    /// The node's source span
    pub span: Span,

    /// Whether the node carried an inspect marker
    pub inspect: bool,

    /// The value the node produced (null when it raised)
    pub value: serde_json::Value,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// The value of the last statement
    pub output: serde_json::Value,

    /// One entry per completed `validate` block
    pub validations: Vec<ValidationResult>,

    /// Warnings plus any ignored errors, in evaluation order
    pub diagnostics: Vec<Diagnostic>,

    /// Visited nodes, recorded only when tracing is on
    pub trace: Vec<TraceEntry>,
}

impl EvaluationResult {
    /// All reject records across every validation, flattened.
    pub fn rejects(&self) -> impl Iterator<Item = &RejectRecord> {
        self.validations.iter().flat_map(|v| v.rejects.iter())
    }

    /// Trace entries whose nodes carried an inspect marker.
    pub fn inspected(&self) -> impl Iterator<Item = &TraceEntry> {
        self.trace.iter().filter(|t| t.inspect)
    }
}
