//! Binary operator semantics and cross-type coercion

use std::cmp::Ordering;

use crate::ast::BinaryOp;
use crate::value::{add_duration, DurationUnit, Value, ValueData};

/// The result of a binary operation: the value plus any warnings the
/// operand kinds provoked.
#[derive(Debug, Clone, PartialEq)]
pub struct BinOutcome {
    /// The computed value; `Unknown` when the kinds do not combine
    pub value: Value,

    /// Warning diagnostics to record against the operator's span
    pub warnings: Vec<String>,
}

impl BinOutcome {
    fn ok(value: Value) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    fn warn(value: Value, message: String) -> Self {
        Self {
            value,
            warnings: vec![message],
        }
    }
}

fn mismatch(lhs: &Value, rhs: &Value) -> String {
    format!(
        "Expected matching types, got a {} and a {} instead",
        lhs.type_name(),
        rhs.type_name()
    )
}

/// Apply a non-short-circuiting binary operator.
pub fn binary_op(op: BinaryOp, lhs: &Value, rhs: &Value) -> BinOutcome {
    match op {
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub => sub(lhs, rhs),
        BinaryOp::Mul => mul_div(op, lhs, rhs),
        BinaryOp::Div => mul_div(op, lhs, rhs),
        BinaryOp::Mod => mul_div(op, lhs, rhs),
        BinaryOp::Eq => equality(lhs, rhs, false),
        BinaryOp::Ne => equality(lhs, rhs, true),
        BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => comparison(op, lhs, rhs),
        BinaryOp::Includes => includes(lhs, rhs),
        BinaryOp::Matches => matches_op(lhs, rhs),
        BinaryOp::In => includes(rhs, lhs),
    }
}

fn add(lhs: &Value, rhs: &Value) -> BinOutcome {
    match (&lhs.data, &rhs.data) {
        (ValueData::Number(a), ValueData::Number(b)) => BinOutcome::ok(Value::number(a + b)),

        // A numeric string adds as a number; anything else concatenates
        (ValueData::String(_), ValueData::Number(b)) => match lhs.parse() {
            Some(a) => BinOutcome::ok(Value::number(a + b)),
            None => BinOutcome::ok(Value::string(format!(
                "{}{}",
                lhs.to_display(),
                rhs.to_display()
            ))),
        },
        (ValueData::Number(a), ValueData::String(_)) => match rhs.parse() {
            Some(b) => BinOutcome::ok(Value::number(a + b)),
            None => BinOutcome::ok(Value::string(format!(
                "{}{}",
                lhs.to_display(),
                rhs.to_display()
            ))),
        },
        (ValueData::String(a), ValueData::String(b)) => {
            BinOutcome::ok(Value::string(format!("{a}{b}")))
        }

        // Array append / concatenation, non-mutating, one-level flatten
        (ValueData::Array(items), _) => {
            let mut out = items.clone();
            match &rhs.data {
                ValueData::Array(other) => out.extend(other.iter().cloned()),
                _ => out.push(rhs.clone()),
            }
            BinOutcome::ok(Value::array(out))
        }

        (ValueData::Duration { .. }, ValueData::Duration { .. }) => {
            let millis = lhs.duration_millis().unwrap_or(0.0)
                + rhs.duration_millis().unwrap_or(0.0);
            BinOutcome::ok(Value::duration(millis / 1000.0, DurationUnit::Second))
        }

        (ValueData::Date(dt), ValueData::Duration { value, unit }) => {
            BinOutcome::ok(Value::date(add_duration(*dt, *value, *unit)))
        }
        (ValueData::Duration { value, unit }, ValueData::Date(dt)) => {
            BinOutcome::ok(Value::date(add_duration(*dt, *value, *unit)))
        }

        _ => BinOutcome::warn(Value::unknown(), mismatch(lhs, rhs)),
    }
}

fn sub(lhs: &Value, rhs: &Value) -> BinOutcome {
    match (&lhs.data, &rhs.data) {
        (ValueData::Number(a), ValueData::Number(b)) => BinOutcome::ok(Value::number(a - b)),

        (ValueData::Date(a), ValueData::Date(b)) => {
            let millis = (*a - *b).num_milliseconds() as f64;
            BinOutcome::ok(Value::duration(millis / 1000.0, DurationUnit::Second))
        }
        (ValueData::Date(dt), ValueData::Duration { value, unit }) => {
            BinOutcome::ok(Value::date(add_duration(*dt, -value, *unit)))
        }
        (ValueData::Duration { .. }, ValueData::Duration { .. }) => {
            let millis = lhs.duration_millis().unwrap_or(0.0)
                - rhs.duration_millis().unwrap_or(0.0);
            BinOutcome::ok(Value::duration(millis / 1000.0, DurationUnit::Second))
        }

        // Remove every element equal to the right operand
        (ValueData::Array(items), _) => BinOutcome::ok(Value::array(
            items
                .iter()
                .filter(|item| !item.loose_eq(rhs))
                .cloned()
                .collect(),
        )),

        _ => BinOutcome::warn(Value::unknown(), mismatch(lhs, rhs)),
    }
}

fn mul_div(op: BinaryOp, lhs: &Value, rhs: &Value) -> BinOutcome {
    // A duration scales by a number, keeping its unit
    if op != BinaryOp::Mod {
        if let (ValueData::Duration { value, unit }, ValueData::Number(n)) =
            (&lhs.data, &rhs.data)
        {
            return scale_duration(op, *value, *unit, *n);
        }
        if op == BinaryOp::Mul {
            if let (ValueData::Number(n), ValueData::Duration { value, unit }) =
                (&lhs.data, &rhs.data)
            {
                return scale_duration(op, *value, *unit, *n);
            }
        }
    }

    let (ValueData::Number(a), ValueData::Number(b)) = (&lhs.data, &rhs.data) else {
        let verb = match op {
            BinaryOp::Mul => "multiply",
            BinaryOp::Div => "divide",
            _ => "take the remainder of",
        };
        return BinOutcome::warn(
            Value::unknown(),
            format!("Attempt to {verb} non-numeric types"),
        );
    };
    match op {
        BinaryOp::Mul => BinOutcome::ok(Value::number(a * b)),
        BinaryOp::Div => {
            if *b == 0.0 {
                BinOutcome::warn(Value::unknown(), "Division by zero".to_string())
            } else {
                BinOutcome::ok(Value::number(a / b))
            }
        }
        _ => {
            if *b == 0.0 {
                BinOutcome::warn(Value::unknown(), "Division by zero".to_string())
            } else {
                BinOutcome::ok(Value::number(a % b))
            }
        }
    }
}

fn scale_duration(op: BinaryOp, value: f64, unit: DurationUnit, n: f64) -> BinOutcome {
    match op {
        BinaryOp::Mul => BinOutcome::ok(Value::duration(value * n, unit)),
        _ => {
            if n == 0.0 {
                BinOutcome::warn(Value::unknown(), "Division by zero".to_string())
            } else {
                BinOutcome::ok(Value::duration(value / n, unit))
            }
        }
    }
}

fn equality(lhs: &Value, rhs: &Value, negated: bool) -> BinOutcome {
    let eq = lhs.loose_eq(rhs);
    let value = Value::boolean(if negated { !eq } else { eq });
    if lhs.mismatches(rhs) {
        BinOutcome::warn(value, mismatch(lhs, rhs))
    } else {
        BinOutcome::ok(value)
    }
}

fn comparison(op: BinaryOp, lhs: &Value, rhs: &Value) -> BinOutcome {
    let Some(ordering) = lhs.compare(rhs) else {
        return BinOutcome::warn(Value::boolean(false), mismatch(lhs, rhs));
    };
    let result = match op {
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Ge => ordering != Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        _ => false,
    };
    let value = Value::boolean(result);
    if lhs.mismatches(rhs) {
        BinOutcome::warn(value, mismatch(lhs, rhs))
    } else {
        BinOutcome::ok(value)
    }
}

fn includes(haystack: &Value, needle: &Value) -> BinOutcome {
    match &haystack.data {
        ValueData::Array(items) => {
            BinOutcome::ok(Value::boolean(items.iter().any(|i| i.loose_eq(needle))))
        }
        ValueData::String(s) => match &needle.data {
            ValueData::String(n) => BinOutcome::ok(Value::boolean(s.contains(n.as_str()))),
            _ => BinOutcome::warn(Value::boolean(false), mismatch(haystack, needle)),
        },
        _ => BinOutcome::warn(Value::boolean(false), mismatch(haystack, needle)),
    }
}

/// `matches` with a string pattern: case-insensitive substring. Regex
/// patterns never reach here; the evaluator applies them directly.
fn matches_op(lhs: &Value, rhs: &Value) -> BinOutcome {
    match (&lhs.data, &rhs.data) {
        (ValueData::String(s), ValueData::String(pattern)) => BinOutcome::ok(Value::boolean(
            s.to_lowercase().contains(&pattern.to_lowercase()),
        )),
        _ => BinOutcome::warn(Value::boolean(false), mismatch(lhs, rhs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::date(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_add_numbers_and_numeric_strings() {
        let out = binary_op(BinaryOp::Add, &Value::number(1.0), &Value::number(2.0));
        assert_eq!(out.value, Value::number(3.0));
        let out = binary_op(BinaryOp::Add, &Value::string("00"), &Value::number(7.0));
        assert_eq!(out.value, Value::number(7.0));
    }

    #[test]
    fn test_add_display_concat() {
        let out = binary_op(BinaryOp::Add, &Value::string("n="), &Value::number(2.0));
        assert_eq!(out.value, Value::string("n=2"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_add_array_append_and_flatten() {
        let arr = Value::array(vec![Value::number(1.0)]);
        let out = binary_op(BinaryOp::Add, &arr, &Value::number(2.0));
        assert_eq!(
            out.value,
            Value::array(vec![Value::number(1.0), Value::number(2.0)])
        );
        let out = binary_op(
            BinaryOp::Add,
            &arr,
            &Value::array(vec![Value::number(3.0)]),
        );
        assert_eq!(
            out.value,
            Value::array(vec![Value::number(1.0), Value::number(3.0)])
        );
    }

    #[test]
    fn test_sub_array_removes_matches() {
        let arr = Value::array(vec![
            Value::number(1.0),
            Value::number(2.0),
            Value::number(1.0),
        ]);
        let out = binary_op(BinaryOp::Sub, &arr, &Value::number(1.0));
        assert_eq!(out.value, Value::array(vec![Value::number(2.0)]));
    }

    #[test]
    fn test_duration_sum_in_seconds() {
        let out = binary_op(
            BinaryOp::Add,
            &Value::duration(1.0, DurationUnit::Minute),
            &Value::duration(30.0, DurationUnit::Second),
        );
        assert_eq!(out.value, Value::duration(90.0, DurationUnit::Second));
    }

    #[test]
    fn test_date_plus_month_clamps() {
        let out = binary_op(
            BinaryOp::Add,
            &date(2021, 3, 31),
            &Value::duration(1.0, DurationUnit::Month),
        );
        assert_eq!(out.value, date(2021, 4, 30));
    }

    #[test]
    fn test_date_minus_date_is_seconds() {
        let out = binary_op(BinaryOp::Sub, &date(2021, 6, 2), &date(2021, 6, 1));
        assert_eq!(out.value, Value::duration(86_400.0, DurationUnit::Second));
    }

    #[test]
    fn test_duration_scales_keeping_unit() {
        let out = binary_op(
            BinaryOp::Div,
            &Value::duration(1.0, DurationUnit::Hour),
            &Value::number(2.0),
        );
        assert_eq!(out.value, Value::duration(0.5, DurationUnit::Hour));
        assert!(out
            .value
            .loose_eq(&Value::duration(30.0, DurationUnit::Minute)));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_division_by_zero_is_unknown() {
        let out = binary_op(BinaryOp::Div, &Value::number(1.0), &Value::number(0.0));
        assert_eq!(out.value, Value::unknown());
        assert_eq!(out.warnings, vec!["Division by zero".to_string()]);
    }

    #[test]
    fn test_mismatched_comparison_warns() {
        let out = binary_op(
            BinaryOp::Gt,
            &Value::number(1.0),
            &Value::duration(1.0, DurationUnit::Day),
        );
        assert_eq!(out.value, Value::boolean(false));
        assert_eq!(
            out.warnings,
            vec!["Expected matching types, got a number and a duration instead".to_string()]
        );
    }

    #[test]
    fn test_includes_and_in() {
        let arr = Value::array(vec![Value::string("a"), Value::string("b")]);
        let out = binary_op(BinaryOp::Includes, &arr, &Value::string("a"));
        assert_eq!(out.value, Value::boolean(true));
        let out = binary_op(BinaryOp::Includes, &arr, &Value::string("A"));
        assert_eq!(out.value, Value::boolean(false));
        let out = binary_op(BinaryOp::In, &Value::string("b"), &arr);
        assert_eq!(out.value, Value::boolean(true));
    }

    #[test]
    fn test_string_matches_is_case_insensitive() {
        let out = binary_op(
            BinaryOp::Matches,
            &Value::string("Hello World"),
            &Value::string("hello"),
        );
        assert_eq!(out.value, Value::boolean(true));
        let out = binary_op(
            BinaryOp::Includes,
            &Value::string("Hello World"),
            &Value::string("hello"),
        );
        assert_eq!(out.value, Value::boolean(false));
    }
}
