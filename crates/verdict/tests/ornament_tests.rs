use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use verdict::*;

fn eval(src: &str) -> serde_json::Value {
    verdict::evaluate(src, json!({})).expect("evaluation failed")
}

fn eval_with(src: &str, data: serde_json::Value) -> serde_json::Value {
    verdict::evaluate(src, data).expect("evaluation failed")
}

// ═══════════════════════════════════════════════════════════════════════
// Builtins
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_ornament_length() {
    assert_eq!(eval("\"hello\":length"), json!(5));
    assert_eq!(eval("{1, 2, 3}:length"), json!(3));
}

#[test]
fn test_ornament_numeric_folds() {
    let data = json!({ "nums": [3, 1, 2] });
    assert_eq!(eval_with("$nums:sum", data.clone()), json!(6));
    assert_eq!(eval_with("$nums:min", data.clone()), json!(1));
    assert_eq!(eval_with("$nums:max", data), json!(3));
}

#[test]
fn test_ornament_numeric_folds_reject_bad_input() {
    assert!(verdict::evaluate("$x:sum", json!({ "x": [1, "two"] })).is_err());
    assert!(verdict::evaluate("$x:min", json!({ "x": [] })).is_err());
    assert!(verdict::evaluate("5:max", json!({})).is_err());
}

#[test]
fn test_ornament_rounding() {
    assert_eq!(eval("1.6:round"), json!(2));
    assert_eq!(eval("1.6:floor"), json!(1));
    assert_eq!(eval("1.2:ceiling"), json!(2));
}

#[test]
fn test_ornament_string_transforms() {
    assert_eq!(eval("\"  hi \":trim"), json!("hi"));
    assert_eq!(eval("\"hey\":upper"), json!("HEY"));
    assert_eq!(eval("\"HEY\":lower"), json!("hey"));
    assert_eq!(eval("\"abc\":reverse"), json!("cba"));
}

#[test]
fn test_ornament_string_splitters() {
    assert_eq!(eval("\"a b c\":words:length"), json!(3));
    assert_eq!(eval("\"ab\":characters"), json!(["a", "b"]));
    assert_eq!(eval("\"one\\ntwo\":lines:length"), json!(2));
}

#[test]
fn test_ornament_sort_orders_ascending() {
    assert_eq!(eval("{3, 1, 2}:sort"), json!([1, 2, 3]));
    assert_eq!(
        eval_with("$words:sort", json!({ "words": ["pear", "apple"] })),
        json!(["apple", "pear"])
    );
    assert!(verdict::evaluate("5:sort", json!({})).is_err());
}

#[test]
fn test_ornament_unique_first_last() {
    assert_eq!(eval("{1, 1, 2}:unique"), json!([1, 2]));
    assert_eq!(eval("{1, 2, 3}:first"), json!(1));
    assert_eq!(eval("{1, 2, 3}:last"), json!(3));
    assert_eq!(eval("\"abc\":first"), json!("a"));
    assert_eq!(eval_with("$none:first", json!({ "none": [] })), json!(null));
}

#[test]
fn test_ornament_chains_left_to_right() {
    assert_eq!(eval("\"  hi \":trim:length"), json!(2));
    assert_eq!(eval("\"a b\":words:first:upper"), json!("A"));
}

#[test]
fn test_ornament_unknown_name_fails() {
    assert!(verdict::evaluate("5:no_such_thing", json!({})).is_err());
}

#[test]
fn test_ornament_failures_pass_value_through_when_ignoring_errors() {
    let options = EvalOptions {
        ignore_errors: true,
        ..EvalOptions::default()
    };
    let result =
        verdict::validate_with("5:no_such_thing", options.clone()).expect("run failed");
    assert_eq!(result.output, json!(5));
    assert_eq!(result.diagnostics.len(), 1);

    // A failing builtin keeps its subject too
    let result = verdict::validate_with("5:length", options).expect("run failed");
    assert_eq!(result.output, json!(5));
}

// ═══════════════════════════════════════════════════════════════════════
// Defines
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_ornament_define_and_apply() {
    assert_eq!(eval("define :double { this * 2 }\n5:double"), json!(10));
}

#[test]
fn test_ornament_define_body_can_chain_builtins() {
    let src = "define :shout { this:upper + \"!\" }\n\"hey\":shout";
    assert_eq!(eval(src), json!("HEY!"));
}

#[test]
fn test_ornament_define_money_style() {
    let src = "define :cents { (this * 100):round }\n1.005:cents";
    assert_eq!(eval(src), json!(100));
}

#[test]
fn test_ornament_define_scoped_to_its_block() {
    assert!(verdict::evaluate("{ define :tmp { 1 } }\n5:tmp", json!({})).is_err());
}

#[test]
fn test_ornament_define_cannot_shadow_builtins() {
    let src = "define :length { 99 }\n\"ab\":length";
    assert_eq!(eval(src), json!(2));
}

#[test]
fn test_ornament_redefine_replaces_in_same_frame() {
    let src = "define :tag { 1 }\ndefine :tag { 2 }\n0:tag";
    assert_eq!(eval(src), json!(2));
}

// ═══════════════════════════════════════════════════════════════════════
// Extensions and the Global Registry
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_ornament_caller_extension() {
    let mut options = EvalOptions::default();
    options.ornaments.insert(
        "negate".to_string(),
        Arc::new(|v: serde_json::Value| {
            let n = v.as_f64().ok_or_else(|| "Expected a number".to_string())?;
            Ok(json!(-n))
        }),
    );
    let result = verdict::evaluate_with("5:negate", options).expect("evaluation failed");
    assert_eq!(result, json!(-5));
}

#[test]
fn test_ornament_global_registration() {
    registry::register("triple_it", |v: serde_json::Value| {
        let n = v.as_f64().ok_or_else(|| "Expected a number".to_string())?;
        Ok(json!(n * 3.0))
    })
    .expect("registration failed");
    assert_eq!(eval("3:triple_it"), json!(9));
    registry::unregister("triple_it");
    assert!(verdict::evaluate("3:triple_it", json!({})).is_err());
}

#[test]
fn test_ornament_registration_rejects_bad_keys() {
    assert!(registry::register("BadName", |v| Ok(v)).is_err());
    assert!(registry::register("9lives", |v| Ok(v)).is_err());
    assert!(registry::register("", |v| Ok(v)).is_err());
}

#[test]
fn test_ornament_extension_error_surfaces() {
    let mut options = EvalOptions::default();
    options.ornaments.insert(
        "always_fails".to_string(),
        Arc::new(|_| Err("boom".to_string())),
    );
    let err = verdict::evaluate_with("1:always_fails", options).unwrap_err();
    assert!(err.to_string().contains("boom"));
}
