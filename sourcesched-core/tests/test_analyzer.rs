//! Analyzer tests for simulation scripts

use sourcesched_core::{analyze_script, parse_script, Diagnostics};

fn analyze(source: &str) -> Diagnostics {
    let script = parse_script(source).unwrap();
    analyze_script(&script)
}

fn has_error(diagnostics: &Diagnostics, text: &str) -> bool {
    diagnostics.errors().any(|e| e.message.contains(text))
}

fn has_warning(diagnostics: &Diagnostics, text: &str) -> bool {
    diagnostics.warnings().any(|w| w.message.contains(text))
}

#[test]
fn test_valid_script() {
    let diagnostics = analyze(
        r#"
run_timing_intervals = [0, 1] s
source Generic a {
    activity = 10 Bq
}
source PencilBeam b {
    n = 3
}
"#,
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

#[test]
fn test_missing_plan_and_sources() {
    let diagnostics = analyze("seed = 1\n");
    assert!(has_error(&diagnostics, "missing run_timing_intervals"));
    assert!(has_error(&diagnostics, "no source"));
}

#[test]
fn test_invalid_timing() {
    let diagnostics = analyze(
        r#"
run_timing_intervals = [0, 2] [1, 3] s
source Generic a {
    activity = 10
}
"#,
    );
    assert!(has_error(&diagnostics, "overlaps"));
}

#[test]
fn test_duplicate_source_name() {
    let diagnostics = analyze(
        r#"
run_timing_intervals = [0, 1] s
source Generic a {
    activity = 1
}
source PencilBeam a {
    activity = 1
}
"#,
    );
    assert!(has_error(&diagnostics, "duplicate source name 'a'"));
}

#[test]
fn test_activity_and_count_rules() {
    let diagnostics = analyze(
        r#"
run_timing_intervals = [0, 1] s
source Generic none {
    particle = gamma
}
source Generic both {
    activity = 1
    n = 3
}
source Generic negative {
    activity = -5 Bq
}
"#,
    );
    assert!(has_error(&diagnostics, "source 'none': missing activity"));
    assert!(has_error(&diagnostics, "source 'both': activity and n cannot both be given"));
    assert!(has_error(&diagnostics, "invalid source 'negative'"));
}

#[test]
fn test_acceptance_rules() {
    let diagnostics = analyze(
        r#"
run_timing_intervals = [0, 1] s
source PencilBeam beam {
    activity = 1
    acceptance_angle.enabled = true
}
source Generic wide {
    activity = 1
    acceptance_angle.enabled = true
    acceptance_angle.fraction = 1.5
}
source Generic narrow {
    activity = 1
    acceptance_angle.enabled = true
    acceptance_angle.fraction = 0.0001
}
source Generic ignored {
    activity = 1
    acceptance_angle.fraction = 0.5
}
"#,
    );
    assert!(has_error(&diagnostics, "PencilBeam"));
    assert!(has_error(&diagnostics, "fraction must be in (0, 1]"));
    assert!(has_warning(&diagnostics, "source 'narrow': solid angle fraction"));
    assert!(has_warning(&diagnostics, "source 'ignored': acceptance angle settings are ignored"));
    assert_eq!(diagnostics.errors().count(), 2);
}

#[test]
fn test_settings_ranges() {
    let diagnostics = analyze(
        r#"
threads = 0
max_batch = 3000000000
max_redraws = 0
run_timing_intervals = [0, 1] s
source Generic a {
    activity = 1
}
"#,
    );
    assert!(has_error(&diagnostics, "threads must be at least 1"));
    assert!(has_error(&diagnostics, "max_batch must be in [1, 2147483647]"));
    assert!(has_error(&diagnostics, "max_redraws must be at least 1"));
}

#[test]
fn test_schedule_warnings() {
    let diagnostics = analyze(
        r#"
seed = 1
seed = 2
max_batch = 100
run_timing_intervals = [0, 1] s
source Generic quiet {
    activity = 0.2 Bq
}
source Generic busy {
    activity = 250 Bq
    activity = 150 Bq
}
"#,
    );
    assert!(!diagnostics.has_errors(), "{}", diagnostics);
    assert!(has_warning(&diagnostics, "setting 'seed' given more than once"));
    assert!(has_warning(&diagnostics, "source 'quiet' emits no primary"));
    assert!(has_warning(&diagnostics, "'activity' given more than once"));
    assert!(has_warning(&diagnostics, "needs 150 events"));
}

#[test]
fn test_anonymous_sources_are_labelled_by_position() {
    let diagnostics = analyze(
        r#"
run_timing_intervals = [0, 1] s
source Generic {
    activity = 1
}
source Generic {
    particle = gamma
}
"#,
    );
    assert!(has_error(&diagnostics, "source 'Generic #2': missing activity"));
}

#[test]
fn test_activity_too_large_for_the_plan() {
    let diagnostics = analyze(
        r#"
run_timing_intervals = [0, 1] [1, 2] s
source Generic big {
    activity = 1e19 Bq
}
"#,
    );
    assert!(has_error(&diagnostics, "invalid source 'big'"));
    assert!(has_error(&diagnostics, "needs more than"));
}

#[test]
fn test_sources_too_large_together() {
    let diagnostics = analyze(
        r#"
run_timing_intervals = [0, 1] s
source Generic a {
    n = 10_000_000_000_000_000_000
}
source Generic b {
    n = 10_000_000_000_000_000_000
}
"#,
    );
    assert!(has_error(&diagnostics, "primaries in total"));
}
