//! The tree-walking evaluator
//!
//! Evaluation is a recursive descent over [`SyntaxNode`]s. Non-local
//! control flow travels as an explicit [`Interrupt`] value through
//! `Result`, never by unwinding: `skip` raises `Interrupt::Skip`, the
//! `stop_at` cutoff raises `Interrupt::Stop`, and an error-severity
//! diagnostic raises `Interrupt::Fail` unless errors are ignored.

pub mod ornaments;
pub mod results;

use std::collections::HashMap;

use chrono::Utc;

use crate::ast::{
    AssignOp, BinaryOp, Direction, Literal, LogicalOp, MetaKind, NodeKind, Span, SyntaxNode,
    TakeBinding, UnaryOp,
};
use crate::error::VerdictError;
use crate::registry::OrnamentFn;
use crate::scope::{ScopeEnv, ScopeStack, WriteConfig, WriteMode};
use crate::value::{add_duration, binary_op, Value, ValueData};

use results::{Diagnostic, EvaluationResult, RejectRecord, TraceEntry, ValidationResult};

/// Per-evaluation options.
#[derive(Clone, Default)]
pub struct EvalOptions {
    /// Host data bound immutably in the global frame, one `$key` per
    /// top-level field. Must be a JSON object (or null for none).
    pub subject_data: serde_json::Value,

    /// Record error diagnostics instead of aborting on them. Also
    /// tolerates lexical errors in the source.
    pub ignore_errors: bool,

    /// Evaluate untaken branches too, so diagnostics cover the whole
    /// program. Implies trace recording.
    pub analyze: bool,

    /// Stop before any node starting at or past this byte offset; the
    /// run returns the value of the last completed statement.
    pub stop_at: Option<usize>,

    /// Record a trace entry per visited node.
    pub trace: bool,

    /// Ornaments visible to this evaluation only.
    pub ornaments: HashMap<String, OrnamentFn>,
}

/// Non-local control flow inside the evaluator.
#[derive(Debug, Clone)]
pub(crate) enum Interrupt {
    /// `skip`: abandon the rest of the current iteration
    Skip,

    /// The `stop_at` cutoff was reached. Carries the value of the last
    /// statement completed before it, once known.
    Stop(Option<Value>),

    /// An error diagnostic aborted evaluation
    Fail(Diagnostic),
}

/// The evaluator: options plus the variable scope stack.
///
/// A single interpreter can run many programs; each [`Interpreter::run`]
/// starts from a flushed stack with the subject data still bound.
pub struct Interpreter {
    options: EvalOptions,
    stack: ScopeStack,
}

impl Interpreter {
    /// Build an interpreter and bind its subject data.
    pub fn new(options: EvalOptions) -> Result<Self, VerdictError> {
        let mut stack = ScopeStack::new();
        bind_subject_data(&mut stack, &options.subject_data)?;
        Ok(Self { options, stack })
    }

    /// Evaluate a parsed program.
    pub fn run(&mut self, roots: &[SyntaxNode]) -> Result<EvaluationResult, VerdictError> {
        self.stack.flush();
        let mut run = Run {
            options: &self.options,
            stack: &mut self.stack,
            diagnostics: Vec::new(),
            rejects: Vec::new(),
            validations: Vec::new(),
            trace: Vec::new(),
            defines: Vec::new(),
            validate_depth: 0,
        };
        let output = match run.eval_statements(roots, false) {
            Ok(value) => value,
            Err(Interrupt::Stop(value)) => value.unwrap_or_else(Value::unknown),
            Err(Interrupt::Skip) => {
                return Err(VerdictError::Eval {
                    message: "skip outside of an iteration".to_string(),
                    offset: 0,
                })
            }
            Err(Interrupt::Fail(diagnostic)) => {
                return Err(VerdictError::Eval {
                    message: diagnostic.message,
                    offset: diagnostic.span.start,
                })
            }
        };
        Ok(EvaluationResult {
            output: output.unwrap(),
            validations: run.validations,
            diagnostics: run.diagnostics,
            trace: run.trace,
        })
    }
}

fn bind_subject_data(
    stack: &mut ScopeStack,
    subject_data: &serde_json::Value,
) -> Result<(), VerdictError> {
    let fields = match subject_data {
        serde_json::Value::Null => return Ok(()),
        serde_json::Value::Object(fields) => fields,
        other => {
            return Err(VerdictError::SubjectData(
                match other {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    _ => "a non-object",
                }
                .to_string(),
            ))
        }
    };
    for (key, json) in fields {
        let raw = key.trim_start_matches('$');
        let name = format!("${raw}");
        let value = Value::from_json(json, vec![crate::value::PathSegment::Key(raw.to_string())]);
        stack
            .write(
                &name,
                value,
                WriteConfig {
                    environment: ScopeEnv::Global,
                    mode: WriteMode::Upsert,
                    mutable: false,
                },
            )
            .map_err(|e| VerdictError::SubjectData(e.to_string()))?;
    }
    Ok(())
}

/// State for one evaluation pass.
pub(crate) struct Run<'r> {
    pub(crate) options: &'r EvalOptions,
    pub(crate) stack: &'r mut ScopeStack,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) rejects: Vec<RejectRecord>,
    pub(crate) validations: Vec<ValidationResult>,
    pub(crate) trace: Vec<TraceEntry>,

    /// `define` bodies, tagged with the frame depth that owns them
    pub(crate) defines: Vec<(usize, String, &'r SyntaxNode)>,

    /// Nesting depth of `validate` blocks
    pub(crate) validate_depth: usize,
}

impl<'r> Run<'r> {
    // ═══════════════════════════════════════════════════════════════════
    // Diagnostics
    // ═══════════════════════════════════════════════════════════════════

    pub(crate) fn warn(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::warning(message, span));
    }

    /// Record an error diagnostic. Yields `Unknown` when errors are
    /// ignored, aborts otherwise.
    pub(crate) fn error(&mut self, message: impl Into<String>, span: Span) -> Result<Value, Interrupt> {
        let diagnostic = Diagnostic::error(message, span);
        self.diagnostics.push(diagnostic.clone());
        if self.options.ignore_errors {
            Ok(Value::unknown())
        } else {
            Err(Interrupt::Fail(diagnostic))
        }
    }

    fn pop_frame(&mut self) {
        self.stack.pop_frame();
        let depth = self.stack.depth();
        self.defines.retain(|(d, _, _)| *d <= depth);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Node Dispatch
    // ═══════════════════════════════════════════════════════════════════

    /// Evaluate one node, honoring the cutoff and the trace.
    pub(crate) fn eval(
        &mut self,
        node: &'r SyntaxNode,
        analyze: bool,
    ) -> Result<Value, Interrupt> {
        if let Some(stop) = self.options.stop_at {
            if stop <= node.span.start {
                return Err(Interrupt::Stop(None));
            }
        }
        // Analyze mode records a trace too; the flags are independent
        // switches onto the same log.
        if !self.options.trace && !self.options.analyze {
            return self.eval_node(node, analyze);
        }
        let index = self.trace.len();
        self.trace.push(TraceEntry {
            span: node.span,
            inspect: node.inspect,
            value: serde_json::Value::Null,
        });
        let result = self.eval_node(node, analyze);
        if let Ok(value) = &result {
            self.trace[index].value = value.unwrap();
        }
        result
    }

    fn eval_node(&mut self, node: &'r SyntaxNode, analyze: bool) -> Result<Value, Interrupt> {
        match &node.kind {
            NodeKind::Literal(lit) => self.eval_literal(lit, node.span),
            NodeKind::Measurement { value, unit } => {
                let inner = self.eval(value, analyze)?;
                match inner.parse() {
                    Some(n) => Ok(Value::duration(n, *unit)),
                    None => {
                        self.warn(
                            format!(
                                "Expected a number for the measurement, got a {} instead",
                                inner.type_name()
                            ),
                            node.span,
                        );
                        Ok(Value::unknown())
                    }
                }
            }
            NodeKind::RelativeDate {
                measurement,
                direction,
            } => {
                let inner = self.eval(measurement, analyze)?;
                let ValueData::Duration { value, unit } = inner.data else {
                    return Ok(Value::unknown());
                };
                let now = Utc::now().naive_utc();
                let signed = match direction {
                    Direction::Ago => -value,
                    Direction::Ahead => value,
                };
                Ok(Value::date(add_duration(now, signed, unit)))
            }
            NodeKind::DateNow => Ok(Value::date(Utc::now().naive_utc())),
            NodeKind::Variable(path) => {
                let key = path.join(".");
                match self.stack.read(&key) {
                    Ok(value) => Ok(value),
                    Err(e) => self.error(e.to_string(), node.span),
                }
            }
            NodeKind::Meta(MetaKind::Index) => match self.stack.read("index") {
                Ok(value) => Ok(value),
                Err(_) => self.error("Index undefined", node.span),
            },
            NodeKind::Meta(MetaKind::This) => match self.stack.read("this") {
                Ok(value) => Ok(value),
                Err(_) => self.error("Nothing is in scope here", node.span),
            },
            NodeKind::Unary { op, operand } => {
                let inner = self.eval(operand, analyze)?;
                match op {
                    UnaryOp::Not => Ok(Value::boolean(!inner.is_truthy())),
                    UnaryOp::Neg => match inner.parse() {
                        Some(n) => Ok(Value::number(-n)),
                        None => {
                            self.warn(
                                format!("Can not negate a {}", inner.type_name()),
                                node.span,
                            );
                            Ok(Value::unknown())
                        }
                    },
                }
            }
            NodeKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, node.span, analyze),
            NodeKind::Logical { op, lhs, rhs } => {
                let left = self.eval(lhs, analyze)?;
                let decided = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                };
                if decided {
                    if self.options.analyze {
                        let _ = self.eval(rhs, true);
                    }
                    return Ok(left);
                }
                self.eval(rhs, analyze)
            }
            NodeKind::Ornament { subject, names } => {
                let mut value = self.eval(subject, analyze)?;
                for (name, span) in names {
                    value = self.apply_ornament(name, *span, value, analyze)?;
                }
                Ok(value)
            }
            NodeKind::Grouping(inner) => self.eval(inner, analyze),
            NodeKind::Block(statements) => {
                self.stack.push_frame();
                let result = self.eval_statements(statements, analyze);
                self.pop_frame();
                result
            }
            NodeKind::Collection(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, analyze)?);
                }
                Ok(Value::array(values))
            }
            NodeKind::StatementList(statements) => self.eval_statements(statements, analyze),
            NodeKind::Print(expr) => {
                let value = self.eval(expr, analyze)?;
                if !analyze {
                    println!("{}", value.to_display());
                }
                Ok(value)
            }
            NodeKind::Declare { name, init } => {
                let value = self.eval(init, analyze)?;
                let config = WriteConfig {
                    environment: ScopeEnv::Local,
                    // re-analysis of a frame may revisit a declaration
                    mode: if analyze {
                        WriteMode::Upsert
                    } else {
                        WriteMode::Insert
                    },
                    mutable: true,
                };
                if let Err(e) = self.stack.write(name, value.clone(), config) {
                    return self.error(e.to_string(), node.span);
                }
                Ok(value)
            }
            NodeKind::Define { name, body } => {
                let depth = self.stack.depth();
                self.defines
                    .retain(|(d, n, _)| !(*d == depth && n == name));
                self.defines.push((depth, name.clone(), body));
                Ok(Value::unknown())
            }
            NodeKind::Assign { op, target, value } => {
                self.eval_assign(*op, target, value, node.span, analyze)
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let condition = self.eval(cond, analyze)?;
                if condition.is_truthy() {
                    let value = self.eval(then_branch, analyze)?;
                    if self.options.analyze {
                        if let Some(untaken) = else_branch {
                            let _ = self.eval(untaken, true);
                        }
                    }
                    Ok(value)
                } else {
                    if self.options.analyze {
                        let _ = self.eval(then_branch, true);
                    }
                    match else_branch {
                        Some(branch) => self.eval(branch, analyze),
                        None => Ok(Value::unknown()),
                    }
                }
            }
            NodeKind::Each {
                subject,
                alias,
                body,
            } => self.eval_each(subject, alias.as_deref(), body, node.span, analyze),
            NodeKind::Take { bindings, source } => {
                self.eval_take(bindings, source.as_deref(), node.span, analyze)
            }
            NodeKind::Reject { message, subject } => {
                let value = self.eval(subject, analyze)?;
                let message = match message {
                    Some(expr) => self.eval(expr, analyze)?.to_display(),
                    None => value.to_display(),
                };
                if !analyze {
                    let path = value.path.iter().map(|s| s.to_json()).collect();
                    self.rejects.push(RejectRecord {
                        message,
                        value: value.unwrap(),
                        path,
                        span: node.span,
                    });
                    if self.validate_depth == 0 {
                        // A programmer error, fatal even when errors
                        // are otherwise ignored
                        return Err(Interrupt::Fail(Diagnostic::error(
                            "Reject outside of a validate block",
                            node.span,
                        )));
                    }
                }
                Ok(Value::unknown())
            }
            NodeKind::Validate { label, body } => {
                let label = match label {
                    Some(expr) => Some(self.eval(expr, analyze)?.to_display()),
                    None => None,
                };
                self.validate_depth += 1;
                let mark = self.rejects.len();
                self.stack.push_frame();
                let result = self.eval_statements(body, analyze);
                self.pop_frame();
                self.validate_depth -= 1;
                let rejects = self.rejects.split_off(mark);
                if !analyze {
                    self.validations.push(ValidationResult { label, rejects });
                }
                result?;
                Ok(Value::unknown())
            }
            NodeKind::Skip => {
                if analyze {
                    Ok(Value::unknown())
                } else {
                    Err(Interrupt::Skip)
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statement Lists
    // ═══════════════════════════════════════════════════════════════════

    /// Evaluate statements in order; the last statement's value is the
    /// list's value. A `skip` from a child analyzes the remaining
    /// statements before re-raising, and a cutoff fills in the value of
    /// the last completed statement.
    pub(crate) fn eval_statements(
        &mut self,
        statements: &'r [SyntaxNode],
        analyze: bool,
    ) -> Result<Value, Interrupt> {
        let mut last = Value::unknown();
        for (i, statement) in statements.iter().enumerate() {
            match self.eval(statement, analyze) {
                Ok(value) => last = value,
                Err(Interrupt::Skip) => {
                    for rest in &statements[i + 1..] {
                        let _ = self.eval(rest, true);
                    }
                    return Err(Interrupt::Skip);
                }
                Err(Interrupt::Stop(value)) => {
                    return Err(Interrupt::Stop(value.or(Some(last))))
                }
                Err(e) => return Err(e),
            }
        }
        Ok(last)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        lhs: &'r SyntaxNode,
        rhs: &'r SyntaxNode,
        span: Span,
        analyze: bool,
    ) -> Result<Value, Interrupt> {
        // A regex on the right of `matches` is applied directly, never
        // evaluated as a value
        if op == BinaryOp::Matches {
            if let NodeKind::Literal(Literal::Regex(re)) = &rhs.kind {
                let left = self.eval(lhs, analyze)?;
                return match &left.data {
                    ValueData::String(s) => Ok(Value::boolean(re.compiled.is_match(s))),
                    _ => {
                        self.warn(
                            format!(
                                "Expected a string to match against, got a {} instead",
                                left.type_name()
                            ),
                            span,
                        );
                        Ok(Value::boolean(false))
                    }
                };
            }
        }

        let left = self.eval(lhs, analyze)?;
        let right = self.eval(rhs, analyze)?;
        let outcome = binary_op(op, &left, &right);
        for warning in outcome.warnings {
            self.warn(warning, span);
        }
        Ok(outcome.value)
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &[String],
        value: &'r SyntaxNode,
        span: Span,
        analyze: bool,
    ) -> Result<Value, Interrupt> {
        let key = target.join(".");
        let previous = match self.stack.read(&key) {
            Ok(v) => v,
            Err(e) => return self.error(e.to_string(), span),
        };
        let incoming = self.eval(value, analyze)?;

        let next = match op {
            AssignOp::Set => {
                let old = previous.type_name();
                let new = incoming.type_name();
                if old != new && old != "unknown" && new != "unknown" {
                    self.warn(format!("Variable type changed from {old} to {new}"), span);
                }
                incoming
            }
            AssignOp::Add | AssignOp::Sub => {
                let binop = if op == AssignOp::Add {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                let outcome = binary_op(binop, &previous, &incoming);
                for warning in outcome.warnings {
                    self.warn(warning, span);
                }
                outcome.value
            }
            AssignOp::Mul | AssignOp::Div => {
                let (Some(_), Some(_)) = (previous.parse(), incoming.parse()) else {
                    let verb = if op == AssignOp::Mul {
                        "multiply"
                    } else {
                        "divide"
                    };
                    return self.error(format!("Attempt to {verb} non-numeric types"), span);
                };
                let binop = if op == AssignOp::Mul {
                    BinaryOp::Mul
                } else {
                    BinaryOp::Div
                };
                let outcome = binary_op(binop, &previous, &incoming);
                for warning in outcome.warnings {
                    self.warn(warning, span);
                }
                outcome.value
            }
        };

        if !analyze {
            if let Err(e) = self.stack.write(&key, next.clone(), WriteConfig::assign()) {
                return self.error(e.to_string(), span);
            }
        }
        Ok(next)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Iteration, Take, Literals
    // ═══════════════════════════════════════════════════════════════════

    fn eval_each(
        &mut self,
        subject: &'r SyntaxNode,
        alias: Option<&str>,
        body: &'r SyntaxNode,
        span: Span,
        analyze: bool,
    ) -> Result<Value, Interrupt> {
        let value = self.eval(subject, analyze)?;
        let items = match &value.data {
            ValueData::Array(items) => Some(items.clone()),
            _ => None,
        };
        let Some(items) = items else {
            self.warn(
                format!("Not iterable, got a {} instead", value.type_name()),
                span,
            );
            // One analyze pass so the body still gets checked
            self.analyze_iteration(alias, body);
            return Ok(value);
        };

        if items.is_empty() || analyze {
            self.analyze_iteration(alias, body);
            return Ok(Value::array(Vec::new()));
        }

        // Iterate a snapshot; mutating the source mid-loop does not
        // extend the iteration. The statement evaluates to the body
        // values, one per iteration, skipped iterations omitted.
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            self.stack.push_frame();
            self.bind_loop(alias, item, i);
            let result = self.eval(body, analyze);
            self.pop_frame();
            match result {
                Ok(v) => out.push(v),
                Err(Interrupt::Skip) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Value::array(out))
    }

    fn analyze_iteration(&mut self, alias: Option<&str>, body: &'r SyntaxNode) {
        self.stack.push_frame();
        self.bind_loop(alias, Value::unknown(), 0);
        let _ = self.eval(body, true);
        self.pop_frame();
    }

    fn bind_loop(&mut self, alias: Option<&str>, item: Value, index: usize) {
        let config = WriteConfig {
            environment: ScopeEnv::Local,
            mode: WriteMode::Upsert,
            mutable: true,
        };
        let _ = self.stack.write("this", item.clone(), config);
        let _ = self
            .stack
            .write("index", Value::number(index as f64), config);
        if let Some(alias) = alias {
            let _ = self.stack.write(alias, item, config);
        }
    }

    fn eval_take(
        &mut self,
        bindings: &[TakeBinding],
        source: Option<&'r SyntaxNode>,
        span: Span,
        analyze: bool,
    ) -> Result<Value, Interrupt> {
        let from = match source {
            Some(expr) => self.eval(expr, analyze)?,
            None => match self.stack.read("this") {
                Ok(v) => v,
                Err(_) => return self.error("Nothing to take from", span),
            },
        };
        for binding in bindings {
            let mut taken = Some(&from);
            for segment in &binding.path {
                taken = taken.and_then(|v| match &v.data {
                    ValueData::Struct(fields) => {
                        let raw = segment.trim_start_matches('$');
                        fields.get(segment.as_str()).or_else(|| fields.get(raw))
                    }
                    _ => None,
                });
            }
            let value = match taken {
                Some(v) => v.clone(),
                None => {
                    self.warn(
                        format!("Can not take {} from a {}", binding.path.join("."), from.type_name()),
                        span,
                    );
                    Value::unknown()
                }
            };
            let name = binding
                .alias
                .clone()
                .or_else(|| binding.path.last().cloned())
                .unwrap_or_default();
            let config = WriteConfig {
                environment: ScopeEnv::Local,
                mode: WriteMode::Upsert,
                mutable: true,
            };
            if let Err(e) = self.stack.write(&name, value, config) {
                return self.error(e.to_string(), span);
            }
        }
        Ok(Value::unknown())
    }

    fn eval_literal(&mut self, literal: &Literal, span: Span) -> Result<Value, Interrupt> {
        match literal {
            Literal::Number(n) => Ok(Value::number(*n)),
            Literal::String(s) => Ok(Value::string(s.clone())),
            Literal::Boolean(b) => Ok(Value::boolean(*b)),
            Literal::Regex(_) => {
                self.warn("A regex is only usable on the right of matches", span);
                Ok(Value::unknown())
            }
        }
    }
}
