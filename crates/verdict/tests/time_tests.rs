use pretty_assertions::assert_eq;
use serde_json::json;
use verdict::*;

fn eval(src: &str) -> serde_json::Value {
    verdict::evaluate(src, json!({})).expect("evaluation failed")
}

fn eval_with(src: &str, data: serde_json::Value) -> serde_json::Value {
    verdict::evaluate(src, data).expect("evaluation failed")
}

// ═══════════════════════════════════════════════════════════════════════
// Durations
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_time_measurement_unwraps_to_milliseconds() {
    assert_eq!(eval("1 second"), json!(1_000));
    assert_eq!(eval("90 seconds"), json!(90_000));
    assert_eq!(eval("(2 + 3) days"), json!(432_000_000));
}

#[test]
fn test_time_equality_across_units() {
    assert_eq!(eval("1 hour == 60 minutes"), json!(true));
    assert_eq!(eval("1 week == 7 days"), json!(true));
    assert_eq!(eval("1 year == 365 days"), json!(true));
    assert_eq!(eval("1 month == 30 days"), json!(true));
}

#[test]
fn test_time_comparison_across_units() {
    assert_eq!(eval("1 hour > 30 minutes"), json!(true));
    assert_eq!(eval("2 days < 1 week"), json!(true));
}

#[test]
fn test_time_duration_scaling_keeps_unit() {
    assert_eq!(eval("1 hour / 2 == 30 minutes"), json!(true));
    assert_eq!(eval("2 days * 3 == 6 days"), json!(true));
}

#[test]
fn test_time_duration_addition_and_subtraction() {
    assert_eq!(eval("1 minute + 30 seconds"), json!(90_000));
    assert_eq!(eval("1 minute - 30 seconds"), json!(30_000));
}

// ═══════════════════════════════════════════════════════════════════════
// Dates
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_time_relative_dates_order_around_now() {
    assert_eq!(eval("1 day ago < now"), json!(true));
    assert_eq!(eval("1 day ahead > now"), json!(true));
    assert_eq!(eval("2 days ago < 1 day ago"), json!(true));
}

#[test]
fn test_time_subject_iso_strings_become_dates() {
    let data = json!({ "d": "2021-06-15T12:00:00Z", "earlier": "2020-01-01T00:00:00Z" });
    assert_eq!(eval_with("$earlier < $d", data.clone()), json!(true));
    assert_eq!(eval_with("$d < now", data), json!(true));
}

#[test]
fn test_time_date_plus_duration() {
    let data = json!({ "d": "2021-06-15T00:00:00Z" });
    assert_eq!(
        eval_with("$d + 10 days", data.clone()),
        json!("2021-06-25T00:00:00Z")
    );
    assert_eq!(
        eval_with("$d - 15 days", data),
        json!("2021-05-31T00:00:00Z")
    );
}

#[test]
fn test_time_month_arithmetic_clamps_day() {
    let data = json!({ "d": "2021-03-31T00:00:00Z" });
    assert_eq!(
        eval_with("$d + 1 month", data.clone()),
        json!("2021-04-30T00:00:00Z")
    );
    assert_eq!(
        eval_with("$d + 11 months", data),
        json!("2022-02-28T00:00:00Z")
    );
}

#[test]
fn test_time_year_arithmetic_handles_leap_day() {
    let data = json!({ "d": "2020-02-29T00:00:00Z" });
    assert_eq!(
        eval_with("$d + 1 year", data),
        json!("2021-02-28T00:00:00Z")
    );
}

#[test]
fn test_time_date_difference_is_a_duration() {
    let data = json!({ "a": "2021-01-11T00:00:00Z", "b": "2021-01-01T00:00:00Z" });
    assert_eq!(eval_with("$a - $b == 10 days", data), json!(true));
}

// ═══════════════════════════════════════════════════════════════════════
// Date Ornaments
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_time_date_field_ornaments() {
    let data = json!({ "d": "2021-03-09T14:45:30Z" });
    assert_eq!(eval_with("$d:year", data.clone()), json!(2021));
    assert_eq!(eval_with("$d:month", data.clone()), json!(3));
    assert_eq!(eval_with("$d:day", data.clone()), json!(9));
    assert_eq!(eval_with("$d:hour", data.clone()), json!(14));
    assert_eq!(eval_with("$d:minute", data.clone()), json!(45));
    assert_eq!(eval_with("$d:second", data), json!(30));
}

#[test]
fn test_time_measurement_requires_a_number() {
    // A non-numeric measurement subject degrades to unknown with a warning
    let result = verdict::validate("\"three\" days", json!({})).expect("run failed");
    assert_eq!(result.output, json!(null));
    assert_eq!(result.diagnostics.len(), 1);
}

#[test]
fn test_time_duration_scaling_produces_no_warnings() {
    let result = verdict::validate("1 year / 2", json!({})).expect("run failed");
    assert!(result.diagnostics.is_empty());
}
