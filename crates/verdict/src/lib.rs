//! # Verdict
//!
//! An embeddable rule and expression language. Programs read host data
//! (the *subject data*), compute over numbers, strings, arrays, dates,
//! and durations, and report structured validation verdicts back to the
//! embedding application.
//!
//! ## Architecture
//!
//! - **Lexer**: priority-ordered matcher table, error-tolerant scanning
//! - **Parser**: recursive descent to a span-annotated syntax tree
//! - **Interpreter**: tree-walking evaluation with explicit control
//!   values, validation collection, and diagnostics
//! - **Extraction**: static token-stream analysis of what data a
//!   program touches
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//!
//! let result = verdict::validate(
//!     "validate \"ages\" {
//!          each $people {
//!              take $age
//!              if $age < 0 { reject $age because \"negative age\" }
//!          }
//!      }",
//!     json!({ "people": [{ "age": 34 }, { "age": -2 }] }),
//! )
//! .unwrap();
//! assert_eq!(result.validations[0].rejects.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod error;
pub mod extract;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod scope;
pub mod script;
pub mod value;

// Re-export main types
pub use error::{LexError, ParseError, Result, ScopeError, VerdictError};
pub use extract::{extract_declarations, extract_references, RefKind, Reference};
pub use interpreter::results::{
    Diagnostic, EvaluationResult, RejectRecord, Severity, TraceEntry, ValidationResult,
};
pub use interpreter::{EvalOptions, Interpreter};
pub use registry::OrnamentFn;
pub use script::{evaluate, evaluate_with, validate, validate_with, Script};
pub use value::{DurationUnit, PathSegment, Value, ValueData};

/// Verdict version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
