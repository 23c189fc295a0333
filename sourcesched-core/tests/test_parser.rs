//! Parser tests for simulation scripts

use glam::DVec3;
use sourcesched_core::ast::{Property, Setting};
use sourcesched_core::{
    parse_script, DirectionModel, EnergyModel, ParticleKind, PartitionStrategy, PositionModel,
    RunInterval, SkipPolicy, SourceOrdering, SourceType, TimePolicy,
};

#[test]
fn test_settings() {
    let source = r#"
# global settings
seed = 1_000
threads = 4
run_timing_intervals = [0, 10] [10, 20] ms
ordering = activity
partition = intervals
max_batch = 5000
max_redraws = 10
visualization = off
"#;
    let result = parse_script(source);
    assert!(result.is_ok(), "Failed to parse: {:?}", result.err());

    let script = result.unwrap();
    let settings: Vec<&Setting> = script.settings.iter().map(|d| &d.setting).collect();
    assert_eq!(
        settings,
        vec![
            &Setting::Seed(1000),
            &Setting::Threads(4),
            &Setting::RunTimingIntervals(vec![
                RunInterval::new(0.0, 0.01),
                RunInterval::new(0.01, 0.02)
            ]),
            &Setting::Ordering(SourceOrdering::ActivityWeighted),
            &Setting::Partition(PartitionStrategy::ContiguousIntervals),
            &Setting::MaxBatch(5000),
            &Setting::MaxRedraws(10),
            &Setting::Visualization(false),
        ]
    );
    assert!(script.sources.is_empty());
}

#[test]
fn test_source_block() {
    let source = r#"
run_timing_intervals = [0, 1] s
source Generic "hot spot" {
    particle = ion 6 12      # carbon
    activity = 2.5 MBq
    energy = gauss 100 keV sigma 5 keV
    direction = focused (0, 0, 10) cm
    position = sphere 3 mm at (1, 2, 3) cm
    time = uniform
}
"#;
    let script = parse_script(source).unwrap();
    assert_eq!(script.sources.len(), 1);

    let decl = &script.sources[0];
    assert_eq!(decl.source_type, SourceType::Generic);
    assert_eq!(decl.name.as_deref(), Some("hot spot"));
    let properties: Vec<&Property> = decl.properties.iter().map(|p| &p.property).collect();
    assert_eq!(
        properties,
        vec![
            &Property::Particle(ParticleKind::Ion { z: 6, a: 12 }),
            &Property::Activity(2.5e6),
            &Property::Energy(EnergyModel::Gauss { mean: 0.1, sigma: 0.005 }),
            &Property::Direction(DirectionModel::Focused { point: DVec3::new(0.0, 0.0, 100.0) }),
            &Property::Position(PositionModel::Sphere {
                center: DVec3::new(10.0, 20.0, 30.0),
                radius: 3.0,
            }),
            &Property::Time(TimePolicy::Uniform),
        ]
    );
}

#[test]
fn test_anonymous_source_and_counts() {
    let source = r#"
source PencilBeam {
    n = 42
    particle = e+
    direction = momentum (1, 0, 0)
    position = disc 1 cm
    energy = uniform 1 to 2 MeV
}
"#;
    let script = parse_script(source).unwrap();
    let decl = &script.sources[0];
    assert_eq!(decl.source_type, SourceType::PencilBeam);
    assert_eq!(decl.name, None);
    let properties: Vec<&Property> = decl.properties.iter().map(|p| &p.property).collect();
    assert_eq!(properties[0], &Property::PerRun(42));
    assert_eq!(properties[1], &Property::Particle(ParticleKind::Positron));
    assert_eq!(
        properties[2],
        &Property::Direction(DirectionModel::Momentum { direction: DVec3::X })
    );
    assert_eq!(
        properties[3],
        &Property::Position(PositionModel::Disc { center: DVec3::ZERO, radius: 10.0 })
    );
    assert_eq!(properties[4], &Property::Energy(EnergyModel::Uniform { min: 1.0, max: 2.0 }));
}

#[test]
fn test_acceptance_properties() {
    let source = r#"
source Generic cone {
    activity = 10
    position = box (1, 2, 3) at (0, 0, 5) mm
    acceptance_angle.enabled = true
    acceptance_angle.fraction = 0.1
    acceptance_angle.axis = (0, 1, 0)
    acceptance_angle.skip_policy = ZeroEnergy
}
"#;
    let script = parse_script(source).unwrap();
    let properties: Vec<&Property> =
        script.sources[0].properties.iter().map(|p| &p.property).collect();
    assert_eq!(
        properties,
        vec![
            &Property::Activity(10.0),
            &Property::Position(PositionModel::Box {
                center: DVec3::new(0.0, 0.0, 5.0),
                size: DVec3::new(1.0, 2.0, 3.0),
            }),
            &Property::AcceptanceEnabled(true),
            &Property::AcceptanceFraction(0.1),
            &Property::AcceptanceAxis(DVec3::Y),
            &Property::AcceptanceSkipPolicy(SkipPolicy::ZeroEnergy),
        ]
    );
}

#[test]
fn test_spans_point_at_lines() {
    let source = "seed = 1\n\nsource Generic s {\n    activity = 1\n}\n";
    let script = parse_script(source).unwrap();
    let line_of = |span: Option<sourcesched_core::Span>| span.unwrap().line_in(source);
    assert_eq!(line_of(script.settings[0].span), 0);
    assert_eq!(line_of(script.sources[0].span), 2);
    assert_eq!(line_of(script.sources[0].properties[0].span), 3);
}
