use pretty_assertions::assert_eq;
use serde_json::json;
use verdict::*;

fn run(src: &str, data: serde_json::Value) -> EvaluationResult {
    verdict::validate(src, data).expect("run failed")
}

// ═══════════════════════════════════════════════════════════════════════
// Validate Blocks and Rejects
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_validate_collects_rejects_with_paths() {
    let src = "validate \"signs\" { each $items { if this < 0 { reject this because \"negative\" } } }";
    let result = run(src, json!({ "items": [1, -2, 3, -4] }));
    assert_eq!(result.validations.len(), 1);
    let validation = &result.validations[0];
    assert_eq!(validation.label.as_deref(), Some("signs"));
    assert_eq!(validation.rejects.len(), 2);
    assert_eq!(validation.rejects[0].message, "negative");
    assert_eq!(validation.rejects[0].value, json!(-2));
    assert_eq!(validation.rejects[0].path, vec![json!("items"), json!(1)]);
    assert_eq!(validation.rejects[1].value, json!(-4));
    assert_eq!(validation.rejects[1].path, vec![json!("items"), json!(3)]);
}

#[test]
fn test_validate_without_label() {
    let src = "validate { if $n > 10 { reject $n because \"too big\" } }";
    let result = run(src, json!({ "n": 12 }));
    assert_eq!(result.validations.len(), 1);
    assert_eq!(result.validations[0].label, None);
    assert_eq!(result.validations[0].rejects.len(), 1);
    assert_eq!(result.validations[0].rejects[0].path, vec![json!("n")]);
}

#[test]
fn test_validate_multiple_blocks_stay_separate() {
    let src = "validate \"a\" { reject 1 because \"x\" }\nvalidate \"b\" { reject 2 because \"y\" }";
    let result = run(src, json!({}));
    assert_eq!(result.validations.len(), 2);
    assert_eq!(result.validations[0].label.as_deref(), Some("a"));
    assert_eq!(result.validations[1].label.as_deref(), Some("b"));
    assert_eq!(result.rejects().count(), 2);
}

#[test]
fn test_validate_reject_message_defaults_to_value() {
    let src = "validate { reject \"bad row\" }";
    let result = run(src, json!({}));
    assert_eq!(result.validations[0].rejects[0].message, "bad row");
}

#[test]
fn test_validate_clean_block_records_no_rejects() {
    let src = "validate \"ages\" { each $ages { if this < 0 { reject this } } }";
    let result = run(src, json!({ "ages": [1, 2, 3] }));
    assert_eq!(result.validations.len(), 1);
    assert!(result.validations[0].rejects.is_empty());
}

#[test]
fn test_validate_reject_outside_block_fails() {
    assert!(verdict::evaluate("reject 1 because \"x\"", json!({})).is_err());
}

#[test]
fn test_validate_reject_outside_block_fails_even_when_ignoring_errors() {
    let options = EvalOptions {
        ignore_errors: true,
        ..EvalOptions::default()
    };
    assert!(verdict::validate_with("reject 1 because \"x\"", options).is_err());
}

#[test]
fn test_validate_passed_reflects_rejects() {
    let src = "validate \"a\" { reject 1 }\nvalidate \"b\" { 1 + 1 }";
    let result = run(src, json!({}));
    assert!(!result.validations[0].passed());
    assert!(result.validations[1].passed());
}

#[test]
fn test_validate_reject_records_carry_the_source_span() {
    let src = "validate { reject $n because \"too big\" }";
    let result = run(src, json!({ "n": 12 }));
    let span = result.validations[0].rejects[0].span;
    assert_eq!(&src[span.start..span.end], "reject $n because \"too big\"");
}

#[test]
fn test_validate_computed_label() {
    let src = "let $name = \"orders\"\nvalidate $name { reject 1 }";
    let result = run(src, json!({}));
    assert_eq!(result.validations[0].label.as_deref(), Some("orders"));
}

// ═══════════════════════════════════════════════════════════════════════
// Diagnostics
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_diagnostics_type_mismatch_warns() {
    let result = run("1 > \"apple\"", json!({}));
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].severity, Severity::Warning);
    assert_eq!(
        result.diagnostics[0].message,
        "Expected matching types, got a number and a string instead"
    );
}

#[test]
fn test_diagnostics_clean_program_has_none() {
    let result = run("let $x = 1\n$x + 1", json!({}));
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.output, json!(2));
}

#[test]
fn test_diagnostics_carry_the_offending_span() {
    let src = "let $x = 1\n$x > \"apple\"";
    let result = run(src, json!({}));
    assert_eq!(result.diagnostics.len(), 1);
    let span = result.diagnostics[0].span;
    assert_eq!(&src[span.start..span.end], "$x > \"apple\"");
}

#[test]
fn test_diagnostics_ignore_errors_collects_instead_of_failing() {
    let options = EvalOptions {
        ignore_errors: true,
        ..EvalOptions::default()
    };
    let result = verdict::validate_with("$missing + 1", options).expect("run failed");
    assert_eq!(result.output, json!(null));
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error && d.message.contains("$missing")));
}

// ═══════════════════════════════════════════════════════════════════════
// Stop Cutoff
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_stop_at_yields_value_of_previous_statement() {
    let src = "let $a = 1\nlet $b = $a + 1\nlet $c = $b + 1";
    let stop = src.find("let $c").unwrap();
    let options = EvalOptions {
        stop_at: Some(stop),
        ..EvalOptions::default()
    };
    let result = verdict::validate_with(src, options).expect("run failed");
    assert_eq!(result.output, json!(2));
}

#[test]
fn test_stop_at_zero_runs_nothing() {
    let options = EvalOptions {
        stop_at: Some(0),
        ..EvalOptions::default()
    };
    let result = verdict::validate_with("let $a = 1", options).expect("run failed");
    assert_eq!(result.output, json!(null));
}

// ═══════════════════════════════════════════════════════════════════════
// Analyze Mode and Tracing
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_analyze_checks_untaken_branches() {
    let options = EvalOptions {
        analyze: true,
        ignore_errors: true,
        ..EvalOptions::default()
    };
    let result =
        verdict::validate_with("if 0 { $missing }", options).expect("run failed");
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message.contains("$missing")));
}

#[test]
fn test_analyze_skips_writes_and_output() {
    let options = EvalOptions {
        analyze: true,
        ..EvalOptions::default()
    };
    let result =
        verdict::validate_with("let $x = 1\n$x", options).expect("run failed");
    // Declarations still register so later reads resolve
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_trace_records_inspected_expressions() {
    let options = EvalOptions {
        trace: true,
        ..EvalOptions::default()
    };
    let result =
        verdict::validate_with("let $x = 5\n($x + 1)?", options).expect("run failed");
    let inspected: Vec<_> = result.inspected().collect();
    assert_eq!(inspected.len(), 1);
    assert_eq!(inspected[0].value, json!(6));
}

#[test]
fn test_trace_marker_binds_to_the_completing_node() {
    let options = EvalOptions {
        trace: true,
        ..EvalOptions::default()
    };
    // The marker after the right operand belongs to the whole addition
    let result = verdict::validate_with("1 + 2?", options).expect("run failed");
    let inspected: Vec<_> = result.inspected().collect();
    assert_eq!(inspected.len(), 1);
    assert_eq!(inspected[0].value, json!(3));
}

#[test]
fn test_analyze_alone_records_a_trace() {
    let options = EvalOptions {
        analyze: true,
        ..EvalOptions::default()
    };
    let result = verdict::validate_with("(1 + 2)?", options).expect("run failed");
    assert!(!result.trace.is_empty());
    let inspected: Vec<_> = result.inspected().collect();
    assert_eq!(inspected.len(), 1);
    assert_eq!(inspected[0].value, json!(3));
}

#[test]
fn test_trace_disabled_records_nothing() {
    let result = run("(1 + 2)?", json!({}));
    assert!(result.trace.is_empty());
}
