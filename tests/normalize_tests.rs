use oak_report::model::{
    normalize_project_report, InternalIdCounter, ModuleIdentity, ProjectReport, ReferenceKind,
    ReportKind, SensorValues, SourceNodeIdentity,
};
use pretty_assertions::assert_eq;

fn delta(time: u64, cpu_energy: f64) -> SensorValues {
    SensorValues {
        profiler_hits: 1,
        self_cpu_time: time,
        self_cpu_energy_consumption: cpu_energy,
        ..SensorValues::zero()
    }
}

struct Scope {
    identity: SourceNodeIdentity,
    time: u64,
}

/// The logical content of one report, as (identity, values) pairs that can
/// be recorded in any order
fn scopes() -> Vec<Scope> {
    vec![
        Scope {
            identity: SourceNodeIdentity::own_code("./src/b.ts", "{root}.{function:beta}"),
            time: 20,
        },
        Scope {
            identity: SourceNodeIdentity::own_code("./src/a.ts", "{root}.{function:alpha}"),
            time: 10,
        },
        Scope {
            identity: SourceNodeIdentity::own_code("./src/a.ts", "{root}.{class:A}.{method:m}"),
            time: 5,
        },
        Scope {
            identity: SourceNodeIdentity::lang_internal("node:internal/timers", "{root}"),
            time: 2,
        },
        Scope {
            identity: SourceNodeIdentity::new(
                ModuleIdentity::new("left-pad", "1.3.0"),
                "./index.js",
                "{root}.{function:pad}",
            ),
            time: 7,
        },
        Scope {
            identity: SourceNodeIdentity::new(
                ModuleIdentity::new("chalk", "5.3.0"),
                "./source/index.js",
                "{root}.{function:color}",
            ),
            time: 3,
        },
    ]
}

/// Record the scopes in the given visit order, then attach the same
/// references from `alpha` to `beta` and to `pad`
fn build_in_order(order: &[usize], counter: &mut InternalIdCounter) -> ProjectReport {
    let all = scopes();
    let mut report = ProjectReport::new(ReportKind::Measurement, counter);

    for &i in order {
        let scope = &all[i];
        report.add_sample(&scope.identity, &delta(scope.time, 0.25)).unwrap();
    }

    let alpha = report
        .add_sample(
            &SourceNodeIdentity::own_code("./src/a.ts", "{root}.{function:alpha}"),
            &SensorValues::zero(),
        )
        .unwrap();
    report
        .add_reference(
            alpha,
            ReferenceKind::Intern,
            &SourceNodeIdentity::own_code("./src/b.ts", "{root}.{function:beta}"),
            &delta(20, 0.25),
        )
        .unwrap();
    report
        .add_reference(
            alpha,
            ReferenceKind::Extern,
            &SourceNodeIdentity::new(
                ModuleIdentity::new("left-pad", "1.3.0"),
                "./index.js",
                "{root}.{function:pad}",
            ),
            &delta(7, 0.25),
        )
        .unwrap();

    report
}

#[test]
fn test_insertion_order_changes_raw_bytes() {
    let mut counter = InternalIdCounter::new();
    let forward = build_in_order(&[0, 1, 2, 3, 4, 5], &mut counter);
    let shuffled = build_in_order(&[5, 3, 1, 4, 2, 0], &mut counter);

    // same logical content, different ids, different buffers
    assert_ne!(forward.to_bytes().unwrap(), shuffled.to_bytes().unwrap());
}

#[test]
fn test_normalization_makes_insertion_order_irrelevant() {
    let mut counter = InternalIdCounter::new();
    let forward = build_in_order(&[0, 1, 2, 3, 4, 5], &mut counter);
    let shuffled = build_in_order(&[5, 3, 1, 4, 2, 0], &mut counter);

    let forward_bytes = normalize_project_report(&forward, &mut counter)
        .unwrap()
        .to_bytes()
        .unwrap();
    let shuffled_bytes = normalize_project_report(&shuffled, &mut counter)
        .unwrap()
        .to_bytes()
        .unwrap();

    assert_eq!(forward_bytes, shuffled_bytes);
}

#[test]
fn test_normalization_is_idempotent() {
    let mut counter = InternalIdCounter::new();
    let report = build_in_order(&[5, 3, 1, 4, 2, 0], &mut counter);

    let once = normalize_project_report(&report, &mut counter).unwrap();
    let twice = normalize_project_report(&once, &mut counter).unwrap();

    assert_eq!(once.to_bytes().unwrap(), twice.to_bytes().unwrap());
}

#[test]
fn test_normalization_preserves_the_measurements() {
    let mut counter = InternalIdCounter::new();
    let report = build_in_order(&[5, 3, 1, 4, 2, 0], &mut counter);
    let normalized = normalize_project_report(&report, &mut counter).unwrap();

    assert_eq!(normalized.report_version(), report.report_version());
    assert_eq!(normalized.kind(), report.kind());
    assert_eq!(
        normalized.report.source_node_record_count(),
        report.report.source_node_record_count()
    );
    normalized.validate().unwrap();

    // every identity of the input resolves in the output with equal values
    for file in report.report.intern.values() {
        for record in file.source_nodes.values() {
            let identity = report.global_index.source_node_identity(record.id).unwrap();
            let module_id = normalized
                .global_index
                .lookup_module(&identity.module)
                .unwrap();
            let path_id = normalized
                .global_index
                .lookup_path(module_id, &identity.path)
                .unwrap();
            let node_id = normalized
                .global_index
                .lookup_source_node(path_id, &identity.identifier)
                .unwrap();
            let normalized_file = &normalized.report.intern[&path_id];
            assert_eq!(
                normalized_file.source_nodes[&node_id].sensor_values,
                record.sensor_values
            );
        }
    }
}

#[test]
fn test_normalized_ids_follow_identifier_order() {
    let mut counter = InternalIdCounter::new();
    let report = build_in_order(&[5, 3, 1, 4, 2, 0], &mut counter);
    let normalized = normalize_project_report(&report, &mut counter).unwrap();

    // intern files come first and are sorted by path, so path id 0 is a.ts
    assert_eq!(normalized.global_index.path_by_id(0).unwrap().path, "./src/a.ts");
    assert_eq!(normalized.global_index.path_by_id(1).unwrap().path, "./src/b.ts");

    // within a.ts the class scope sorts before the function scope
    let a_file = &normalized.report.intern[&0];
    let first = a_file.source_nodes.values().next().unwrap();
    let identity = normalized
        .global_index
        .source_node_identity(first.id)
        .unwrap();
    assert_eq!(identity.identifier, "{root}.{class:A}.{method:m}");
}
