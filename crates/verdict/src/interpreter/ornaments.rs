//! Ornament dispatch
//!
//! A `:name` stage resolves in a fixed order: date field extraction,
//! builtins, the evaluation's own extensions, the global registry, then
//! script `define`s. The first hit wins; builtins can not be shadowed.

use std::cmp::Ordering;

use chrono::{Datelike, Timelike};

use crate::ast::Span;
use crate::interpreter::results::Diagnostic;
use crate::interpreter::{Interrupt, Run};
use crate::registry;
use crate::value::{Value, ValueData};

impl<'r> Run<'r> {
    /// Apply one ornament stage to a value.
    pub(crate) fn apply_ornament(
        &mut self,
        name: &str,
        span: Span,
        subject: Value,
        analyze: bool,
    ) -> Result<Value, Interrupt> {
        if let ValueData::Date(dt) = &subject.data {
            let field = match name {
                "year" => Some(dt.year() as f64),
                "month" => Some(dt.month() as f64),
                "day" => Some(dt.day() as f64),
                "hour" => Some(dt.hour() as f64),
                "minute" => Some(dt.minute() as f64),
                "second" => Some(dt.second() as f64),
                _ => None,
            };
            if let Some(n) = field {
                return Ok(Value::number(n));
            }
        }

        if let Some(result) = builtin(name, &subject) {
            return match result {
                Ok(value) => Ok(value),
                Err(message) => self.ornament_error(message, span, subject),
            };
        }

        let extension = self
            .options
            .ornaments
            .get(name)
            .cloned()
            .or_else(|| registry::get(name));
        if let Some(f) = extension {
            return match f(subject.unwrap()) {
                Ok(json) => Ok(Value::from_json(&json, subject.path)),
                Err(message) => {
                    self.ornament_error(format!("Ornament :{name} failed: {message}"), span, subject)
                }
            };
        }

        let depth = self.stack.depth();
        let defined = self
            .defines
            .iter()
            .rev()
            .find(|(d, n, _)| *d <= depth && n == name)
            .map(|(_, _, body)| *body);
        if let Some(body) = defined {
            self.stack.push_frame();
            let _ = self.stack.write(
                "this",
                subject,
                crate::scope::WriteConfig {
                    environment: crate::scope::ScopeEnv::Local,
                    mode: crate::scope::WriteMode::Upsert,
                    mutable: false,
                },
            );
            let result = self.eval(body, analyze);
            self.pop_frame();
            return result;
        }

        self.ornament_error(format!("Unknown ornament :{name}"), span, subject)
    }

    /// Record an error diagnostic for a failed ornament stage. When
    /// errors are ignored the stage yields its subject unchanged.
    fn ornament_error(
        &mut self,
        message: String,
        span: Span,
        subject: Value,
    ) -> Result<Value, Interrupt> {
        let diagnostic = Diagnostic::error(message, span);
        self.diagnostics.push(diagnostic.clone());
        if self.options.ignore_errors {
            Ok(subject)
        } else {
            Err(Interrupt::Fail(diagnostic))
        }
    }
}

/// The builtin ornaments. `None` means the name is not a builtin;
/// `Some(Err(_))` is an error diagnostic message.
fn builtin(name: &str, subject: &Value) -> Option<Result<Value, String>> {
    let result = match name {
        "length" => match &subject.data {
            ValueData::String(s) => Ok(Value::number(s.chars().count() as f64)),
            ValueData::Array(items) => Ok(Value::number(items.len() as f64)),
            _ => Err(format!(
                "Can not take the length of a {}",
                subject.type_name()
            )),
        },
        "min" | "max" | "sum" => numeric_fold(name, subject),
        "round" | "floor" | "ceiling" => match subject.parse() {
            Some(n) => Ok(Value::number(match name {
                "round" => n.round(),
                "floor" => n.floor(),
                _ => n.ceil(),
            })),
            None => Err(format!("Can not {name} a {}", subject.type_name())),
        },
        "trim" => string_map(subject, name, |s| s.trim().to_string())?,
        "upper" => string_map(subject, name, |s| s.to_uppercase())?,
        "lower" => string_map(subject, name, |s| s.to_lowercase())?,
        "characters" => match &subject.data {
            ValueData::String(s) => Ok(Value::array(
                s.chars().map(|c| Value::string(c.to_string())).collect(),
            )),
            _ => Err(format!(
                "Can not split a {} into characters",
                subject.type_name()
            )),
        },
        "words" => match &subject.data {
            ValueData::String(s) => Ok(Value::array(
                s.split_whitespace().map(Value::string).collect(),
            )),
            _ => Err(format!(
                "Can not split a {} into words",
                subject.type_name()
            )),
        },
        "lines" => match &subject.data {
            ValueData::String(s) => {
                Ok(Value::array(s.lines().map(Value::string).collect()))
            }
            _ => Err(format!(
                "Can not split a {} into lines",
                subject.type_name()
            )),
        },
        "reverse" => match &subject.data {
            ValueData::String(s) => Ok(Value::string(s.chars().rev().collect::<String>())),
            ValueData::Array(items) => {
                Ok(Value::array(items.iter().rev().cloned().collect()))
            }
            _ => Err(format!("Can not reverse a {}", subject.type_name())),
        },
        "sort" => match &subject.data {
            ValueData::Array(items) => {
                let mut sorted = items.clone();
                sorted.sort_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal));
                Ok(Value::array(sorted))
            }
            _ => Err(format!("Can not sort a {}", subject.type_name())),
        },
        "unique" => match &subject.data {
            ValueData::Array(items) => {
                let mut seen: Vec<Value> = Vec::new();
                for item in items {
                    if !seen.iter().any(|s| s.loose_eq(item)) {
                        seen.push(item.clone());
                    }
                }
                Ok(Value::array(seen))
            }
            _ => Err(format!(
                "Can not take the unique elements of a {}",
                subject.type_name()
            )),
        },
        "first" | "last" => match &subject.data {
            ValueData::Array(items) => {
                let picked = if name == "first" {
                    items.first()
                } else {
                    items.last()
                };
                Ok(picked.cloned().unwrap_or_else(Value::unknown))
            }
            ValueData::String(s) => {
                let picked = if name == "first" {
                    s.chars().next()
                } else {
                    s.chars().last()
                };
                Ok(picked
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or_else(Value::unknown))
            }
            _ => Err(format!(
                "Can not take the {name} of a {}",
                subject.type_name()
            )),
        },
        _ => return None,
    };
    Some(result)
}

fn string_map(
    subject: &Value,
    name: &str,
    f: impl Fn(&str) -> String,
) -> Option<Result<Value, String>> {
    Some(match &subject.data {
        ValueData::String(s) => Ok(Value::string(f(s))),
        _ => Err(format!("Can not {name} a {}", subject.type_name())),
    })
}

fn numeric_fold(name: &str, subject: &Value) -> Result<Value, String> {
    let ValueData::Array(items) = &subject.data else {
        return Err(format!(
            "Can not take the {name} of a {}",
            subject.type_name()
        ));
    };
    if items.is_empty() {
        return Err(format!("Can not take the {name} of an empty array"));
    }
    let mut numbers = Vec::with_capacity(items.len());
    for item in items {
        match &item.data {
            ValueData::Number(n) => numbers.push(*n),
            _ => {
                return Err(format!(
                    "Can not take the {name} of an array holding a {}",
                    item.type_name()
                ))
            }
        }
    }
    let folded = match name {
        "min" => numbers.iter().cloned().fold(f64::INFINITY, f64::min),
        "max" => numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        _ => numbers.iter().sum(),
    };
    Ok(Value::number(folded))
}
