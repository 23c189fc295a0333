//! Static checks on parsed simulation scripts
//!
//! This module catches configuration errors before any source manager is
//! built, and warns about settings that are legal but probably unintended.

use crate::acceptance::{AcceptanceAnglePolicy, SkipPolicy};
use crate::ast::{Property, Script, Setting, SourceDecl};
use crate::batch::MAX_BATCH_EVENTS;
use crate::diagnostics::{Diagnostic, Diagnostics, Span};
use crate::source::SourceDefinition;
use crate::timing::RunTimingPlan;
use std::collections::{HashMap, HashSet};

/// Below this fraction a `SkipEvents` cone needs many draws per primary
const NARROW_CONE_FRACTION: f64 = 1e-3;

/// Analyze a script and return diagnostics
pub fn analyze_script(script: &Script) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    // Check 1: settings are given once and within range
    let mut seen = HashSet::new();
    for decl in &script.settings {
        let key = decl.setting.key();
        if !seen.insert(key) {
            diagnostics.push(Diagnostic::warning(
                format!("setting '{}' given more than once, the last value is used", key),
                decl.span,
            ));
        }
        match &decl.setting {
            Setting::Threads(0) => {
                diagnostics.push(Diagnostic::error("threads must be at least 1", decl.span));
            }
            Setting::MaxBatch(n) if *n < 1 || *n > i64::from(MAX_BATCH_EVENTS) => {
                diagnostics.push(Diagnostic::error(
                    format!("max_batch must be in [1, {}], got {}", MAX_BATCH_EVENTS, n),
                    decl.span,
                ));
            }
            Setting::MaxRedraws(0) => {
                diagnostics.push(Diagnostic::error("max_redraws must be at least 1", decl.span));
            }
            _ => {}
        }
    }

    // Check 2: the run timing plan exists and is valid
    let plan = match last_setting(script, |s| match s {
        Setting::RunTimingIntervals(intervals) => Some(intervals.clone()),
        _ => None,
    }) {
        Some((intervals, span)) => match RunTimingPlan::new(intervals) {
            Ok(plan) => Some(plan),
            Err(e) => {
                diagnostics.push(Diagnostic::error(format!("invalid run timing: {}", e), span));
                None
            }
        },
        None => {
            diagnostics.push(Diagnostic::error(
                "missing run_timing_intervals: no run to simulate",
                None,
            ));
            None
        }
    };

    // Check 3: at least one source, with unique names
    if script.sources.is_empty() {
        diagnostics.push(Diagnostic::error(
            "no source: no particle will be generated",
            None,
        ));
    }
    let mut names = HashSet::new();
    for decl in &script.sources {
        if let Some(name) = &decl.name {
            if !names.insert(name.as_str()) {
                diagnostics.push(Diagnostic::error(
                    format!("duplicate source name '{}'", name),
                    decl.span,
                ));
            }
        }
    }

    // Check 4: every source is complete and consistent
    let mut definitions = Vec::with_capacity(script.sources.len());
    for (idx, decl) in script.sources.iter().enumerate() {
        let label = decl
            .name
            .clone()
            .unwrap_or_else(|| format!("{} #{}", decl.source_type, idx + 1));
        if let Some(definition) = check_source(decl, &label, plan.as_ref(), &mut diagnostics) {
            definitions.push(definition);
        }
    }

    // Check 5: what the schedule will look like
    let all_sources_fit = definitions
        .iter()
        .try_fold(0u64, |total, definition| {
            plan.as_ref()
                .and_then(|plan| definition.expected_total(plan).ok())
                .and_then(|events| total.checked_add(events))
        })
        .is_some();
    if plan.is_some() && !all_sources_fit {
        diagnostics.push(Diagnostic::error(
            format!("the sources need more than {} primaries in total", u64::MAX),
            None,
        ));
    }
    if let Some(plan) = plan.as_ref().filter(|_| all_sources_fit) {
        for definition in &definitions {
            if definition.expected_total(plan) == Ok(0) {
                diagnostics.push(Diagnostic::warning(
                    format!(
                        "source '{}' emits no primary over the {} run(s)",
                        definition.name,
                        plan.len()
                    ),
                    None,
                ));
            }
        }

        let max_batch = last_setting(script, |s| match s {
            Setting::MaxBatch(n) => Some(*n),
            _ => None,
        })
        .map_or(i64::from(MAX_BATCH_EVENTS), |(n, _)| n)
        .max(1) as u64;
        for (idx, interval) in plan.intervals().iter().enumerate() {
            let events: u64 = definitions.iter().map(|d| d.interval_target(interval)).sum();
            if events > max_batch {
                diagnostics.push(Diagnostic::warning(
                    format!(
                        "run {} {} needs {} events, more than one batch of at most {}",
                        idx, interval, events, max_batch
                    ),
                    None,
                ));
            }
        }
    }

    diagnostics
}

/// Value and span of the last setting matched by `select`
fn last_setting<T>(
    script: &Script,
    select: impl Fn(&Setting) -> Option<T>,
) -> Option<(T, Option<Span>)> {
    script
        .settings
        .iter()
        .rev()
        .find_map(|decl| select(&decl.setting).map(|value| (value, decl.span)))
}

/// Check one source block, returning its definition when it is usable
fn check_source(
    decl: &SourceDecl,
    label: &str,
    plan: Option<&RunTimingPlan>,
    diagnostics: &mut Diagnostics,
) -> Option<SourceDefinition> {
    let before = diagnostics.errors().count();

    let mut keys: HashMap<&'static str, usize> = HashMap::new();
    for property in &decl.properties {
        let key = property.property.key();
        *keys.entry(key).or_default() += 1;
        if keys[key] == 2 {
            diagnostics.push(Diagnostic::warning(
                format!("source '{}': '{}' given more than once, the last value is used", label, key),
                property.span,
            ));
        }
    }

    let has_activity = keys.contains_key("activity");
    let has_count = keys.contains_key("n");
    match (has_activity, has_count) {
        (true, true) => diagnostics.push(Diagnostic::error(
            format!("source '{}': activity and n cannot both be given", label),
            decl.span,
        )),
        (false, false) => diagnostics.push(Diagnostic::error(
            format!("source '{}': missing activity (or n, the number of primaries per run)", label),
            decl.span,
        )),
        _ => {}
    }

    let acceptance_keys = [
        "acceptance_angle.fraction",
        "acceptance_angle.axis",
        "acceptance_angle.skip_policy",
    ];
    let mut definition = source_definition(decl);
    definition.name = label.to_string();
    let enabled = definition.acceptance_angle.map_or(false, |policy| policy.enabled);
    if !enabled && acceptance_keys.iter().any(|key| keys.contains_key(key)) {
        diagnostics.push(Diagnostic::warning(
            format!(
                "source '{}': acceptance angle settings are ignored, acceptance_angle.enabled is not true",
                label
            ),
            decl.span,
        ));
    }
    if let Some(policy) = definition.active_acceptance() {
        if policy.skip_policy == SkipPolicy::SkipEvents
            && policy.solid_angle_fraction > 0.0
            && policy.solid_angle_fraction < NARROW_CONE_FRACTION
        {
            diagnostics.push(Diagnostic::warning(
                format!(
                    "source '{}': solid angle fraction {} rejects about {:.0} draws per primary",
                    label,
                    policy.solid_angle_fraction,
                    1.0 / policy.solid_angle_fraction - 1.0
                ),
                decl.span,
            ));
        }
    }

    // A missing count is already reported above
    if has_activity || has_count {
        let checked = definition
            .validate()
            .and_then(|()| plan.map_or(Ok(0), |plan| definition.expected_total(plan)));
        if let Err(e) = checked {
            diagnostics.push(Diagnostic::error(e.to_string(), decl.span));
        }
    }

    (diagnostics.errors().count() == before).then_some(definition)
}

/// Source definition described by a block. An anonymous block gets an empty
/// name, which the registry replaces by a generated one.
pub(crate) fn source_definition(decl: &SourceDecl) -> SourceDefinition {
    let mut definition =
        SourceDefinition::new(decl.source_type, decl.name.clone().unwrap_or_default());
    let mut acceptance: Option<AcceptanceAnglePolicy> = None;

    for property in &decl.properties {
        match &property.property {
            Property::Particle(particle) => definition.particle = *particle,
            Property::Activity(activity) => {
                definition.set_activity(*activity);
            }
            Property::PerRun(n) => {
                definition.set_per_run(*n);
            }
            Property::Energy(energy) => definition.energy = *energy,
            Property::Direction(direction) => definition.direction = *direction,
            Property::Position(position) => definition.position = *position,
            Property::Time(policy) => definition.time_policy = *policy,
            Property::AcceptanceEnabled(enabled) => {
                acceptance.get_or_insert_with(AcceptanceAnglePolicy::default).enabled = *enabled;
            }
            Property::AcceptanceFraction(fraction) => {
                acceptance
                    .get_or_insert_with(AcceptanceAnglePolicy::default)
                    .solid_angle_fraction = *fraction;
            }
            Property::AcceptanceAxis(axis) => {
                acceptance.get_or_insert_with(AcceptanceAnglePolicy::default).axis = *axis;
            }
            Property::AcceptanceSkipPolicy(policy) => {
                acceptance.get_or_insert_with(AcceptanceAnglePolicy::default).skip_policy = *policy;
            }
        }
    }

    definition.acceptance_angle = acceptance;
    definition
}
