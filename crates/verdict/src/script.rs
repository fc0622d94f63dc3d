//! Public entry points: one-shot evaluation and the compile-once handle

use crate::ast::SyntaxNode;
use crate::error::VerdictError;
use crate::interpreter::results::EvaluationResult;
use crate::interpreter::{EvalOptions, Interpreter};
use crate::lexer;
use crate::parser;

/// Evaluate a program against subject data and return its output value.
///
/// # Example
///
/// ```
/// use serde_json::json;
///
/// let out = verdict::evaluate(
///     "let $sum = 0\neach $thing in $things { $sum += $thing }\n$sum",
///     json!({ "things": [1, 2, 3] }),
/// )
/// .unwrap();
/// assert_eq!(out, json!(6));
/// ```
pub fn evaluate(
    source: &str,
    subject_data: serde_json::Value,
) -> Result<serde_json::Value, VerdictError> {
    evaluate_with(
        source,
        EvalOptions {
            subject_data,
            ..EvalOptions::default()
        },
    )
}

/// [`evaluate`] with full options.
pub fn evaluate_with(
    source: &str,
    options: EvalOptions,
) -> Result<serde_json::Value, VerdictError> {
    validate_with(source, options).map(|result| result.output)
}

/// Evaluate and return the full result: output, validations,
/// diagnostics, and trace.
pub fn validate(
    source: &str,
    subject_data: serde_json::Value,
) -> Result<EvaluationResult, VerdictError> {
    validate_with(
        source,
        EvalOptions {
            subject_data,
            ..EvalOptions::default()
        },
    )
}

/// [`validate`] with full options.
pub fn validate_with(
    source: &str,
    options: EvalOptions,
) -> Result<EvaluationResult, VerdictError> {
    let roots = compile(source, options.ignore_errors)?;
    Interpreter::new(options)?.run(&roots)
}

/// Scan and parse. Lexical errors abort unless ignored; parse errors
/// always abort, a structurally broken program has no useful partial
/// evaluation.
fn compile(source: &str, ignore_errors: bool) -> Result<Vec<SyntaxNode>, VerdictError> {
    let (tokens, lex_errors) = lexer::scan(source);
    if !lex_errors.is_empty() && !ignore_errors {
        return Err(VerdictError::Lex(lex_errors));
    }
    parser::parse_tokens(&tokens)
}

/// A compile-once program handle.
///
/// The source is parsed eagerly, then each [`Script::evaluate`] or
/// [`Script::validate`] call runs a fresh interpreter, so calls never
/// leak state into one another. Per-call subject data overrides the
/// handle's own, key by key.
pub struct Script {
    source: String,
    roots: Vec<SyntaxNode>,
    options: EvalOptions,
}

impl Script {
    /// Parse a program into a reusable handle.
    pub fn new(source: impl Into<String>, options: EvalOptions) -> Result<Self, VerdictError> {
        let source = source.into();
        let roots = compile(&source, options.ignore_errors)?;
        Ok(Self {
            source,
            roots,
            options,
        })
    }

    /// The current source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replace the source, re-parsing immediately. On error the handle
    /// keeps its previous program.
    pub fn set_source(&mut self, source: impl Into<String>) -> Result<(), VerdictError> {
        let source = source.into();
        let roots = compile(&source, self.options.ignore_errors)?;
        self.source = source;
        self.roots = roots;
        Ok(())
    }

    /// Run the program and return its output value.
    pub fn evaluate(
        &self,
        subject_data: serde_json::Value,
    ) -> Result<serde_json::Value, VerdictError> {
        self.run(subject_data).map(|result| result.output)
    }

    /// Run the program and return the full result.
    pub fn validate(
        &self,
        subject_data: serde_json::Value,
    ) -> Result<EvaluationResult, VerdictError> {
        self.run(subject_data)
    }

    fn run(&self, subject_data: serde_json::Value) -> Result<EvaluationResult, VerdictError> {
        let mut options = self.options.clone();
        options.subject_data = merge_subjects(options.subject_data, subject_data);
        Interpreter::new(options)?.run(&self.roots)
    }
}

fn merge_subjects(
    base: serde_json::Value,
    overlay: serde_json::Value,
) -> serde_json::Value {
    match (base, overlay) {
        (serde_json::Value::Object(mut base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                base.insert(key, value);
            }
            serde_json::Value::Object(base)
        }
        (base, serde_json::Value::Null) => base,
        (_, overlay) => overlay,
    }
}
