//! Error types for Verdict parsing and evaluation

use thiserror::Error;

/// A single lexical error: a run of characters no matcher accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// The unmatched character(s); consecutive failures merge
    pub text: String,

    /// 1-based line of the first unmatched character
    pub line: usize,

    /// 1-based column of the first unmatched character
    pub column: usize,

    /// Byte offset of the first unmatched character
    pub offset: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Unexpected character(s) {:?} at line {}, column {}",
            self.text, self.line, self.column
        )
    }
}

/// A single parse error with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// What the parser expected or found
    pub message: String,

    /// Byte offset of the offending token
    pub offset: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.offset)
    }
}

/// Main error type for Verdict operations
#[derive(Error, Debug)]
pub enum VerdictError {
    /// Source text failed to tokenize
    #[error("Errors ({}) occurred scanning source: {}", .0.len(), format_lex(.0))]
    Lex(Vec<LexError>),

    /// Source text failed to parse
    #[error("Errors ({}) occurred parsing source: {}", .0.len(), format_parse(.0))]
    Parse(Vec<ParseError>),

    /// Evaluation aborted on an error-severity diagnostic
    #[error("Evaluation error: {message}")]
    Eval {
        /// The diagnostic message
        message: String,

        /// Byte offset of the node that raised it
        offset: usize,
    },

    /// Subject data was not a JSON object
    #[error("Subject data must be an object, got {0}")]
    SubjectData(String),

    /// Ornament registry rejected a key
    #[error("Invalid ornament key: {0:?}")]
    InvalidOrnamentKey(String),
}

fn format_lex(errors: &[LexError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_parse(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by the scope stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Read of a name no frame binds
    #[error("Undefined variable: {0}")]
    Undefined(String),

    /// Insert of a name the local frame already binds
    #[error("Can not insert {0}, it already exists")]
    AlreadyExists(String),

    /// Update of an immutable binding
    #[error("Immutable: {0}")]
    Immutable(String),

    /// Dotted read walked into a non-struct value
    #[error("Can not read field {field} of a {kind}")]
    NotAStruct {
        /// The field segment being read
        field: String,

        /// The kind of the value it was read from
        kind: String,
    },

    /// Dotted read of a field the struct lacks
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

/// Result type alias for Verdict operations
pub type Result<T> = std::result::Result<T, VerdictError>;
