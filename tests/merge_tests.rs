use oak_report::model::{
    merge_project_reports, normalize_project_report, InternalIdCounter, ModuleIdentity,
    ProjectReport, ReferenceKind, ReportKind, SensorValues, SourceNodeIdentity,
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

fn run_identity() -> SourceNodeIdentity {
    SourceNodeIdentity::own_code("./src/app.ts", "{root}.{function:run}")
}

fn pad_identity() -> SourceNodeIdentity {
    SourceNodeIdentity::new(
        ModuleIdentity::new("left-pad", "1.3.0"),
        "./index.js",
        "{root}.{function:pad}",
    )
}

/// One measurement run: `run` spends self time and calls into `left-pad`
fn measurement_run(
    counter: &mut InternalIdCounter,
    self_time: u64,
    callee_time: u64,
) -> ProjectReport {
    let mut report = ProjectReport::new(ReportKind::Measurement, counter);
    let caller = report.add_sample(&run_identity(), &delta(self_time, 0.5)).unwrap();
    report
        .add_reference(caller, ReferenceKind::Extern, &pad_identity(), &delta(callee_time, 0.25))
        .unwrap();
    report.add_sample(&pad_identity(), &delta(callee_time, 0.25)).unwrap();
    report
}

fn normalized_bytes(report: &ProjectReport, counter: &mut InternalIdCounter) -> Vec<u8> {
    normalize_project_report(report, counter)
        .unwrap()
        .to_bytes()
        .unwrap()
}

#[test]
fn test_merge_two_runs_sums_field_wise() {
    let mut counter = InternalIdCounter::new();
    let a = measurement_run(&mut counter, 100, 10);
    let b = measurement_run(&mut counter, 60, 4);

    let merged = merge_project_reports(&[&a, &b], &mut counter).unwrap();
    assert_eq!(merged.kind(), ReportKind::Accumulated);
    merged.validate().unwrap();

    let file = merged.report.intern.values().next().unwrap();
    let record = file.source_nodes.values().next().unwrap();
    assert_eq!(record.sensor_values.profiler_hits, 2);
    assert_eq!(record.sensor_values.self_cpu_time, 160);
    assert_eq!(record.sensor_values.extern_cpu_time, 14);
    assert_eq!(record.sensor_values.aggregated_cpu_time, 174);
    assert_eq!(record.sensor_values.self_cpu_energy_consumption, 1.0);

    // the extern reference merged into one edge record
    let maps = record.references().unwrap();
    assert_eq!(maps.extern_refs.len(), 1);
    let edge = maps.extern_refs.values().next().unwrap();
    assert_eq!(edge.sensor_values.aggregated_cpu_time, 14);

    // the callee's own record merged inside the module report
    let module_report = merged.report.extern_modules.values().next().unwrap();
    let callee = module_report
        .body
        .intern
        .values()
        .next()
        .unwrap()
        .source_nodes
        .values()
        .next()
        .unwrap();
    assert_eq!(callee.sensor_values.self_cpu_time, 14);
}

#[test]
fn test_merge_unifies_records_with_disjoint_numeric_ids() {
    let mut counter = InternalIdCounter::new();

    // run A indexes `run` first, run B indexes other scopes first, so the
    // same function carries different ids in the two sessions
    let mut a = ProjectReport::new(ReportKind::Measurement, &mut counter);
    let a_id = a.add_sample(&run_identity(), &delta(10, 0.0)).unwrap();

    let mut b = ProjectReport::new(ReportKind::Measurement, &mut counter);
    for i in 0..5 {
        b.add_sample(
            &SourceNodeIdentity::own_code("./src/other.ts", format!("{{root}}.{{function:f{i}}}")),
            &delta(1, 0.0),
        )
        .unwrap();
    }
    let b_id = b.add_sample(&run_identity(), &delta(20, 0.0)).unwrap();
    assert_ne!(a_id, b_id);

    let merged = merge_project_reports(&[&a, &b], &mut counter).unwrap();

    // both samples landed on one record
    let mut matches = 0;
    for file in merged.report.intern.values() {
        for record in file.source_nodes.values() {
            let identity = merged
                .global_index
                .source_node_identity(record.id)
                .unwrap();
            if identity == run_identity() {
                matches += 1;
                assert_eq!(record.sensor_values.self_cpu_time, 30);
                assert_eq!(record.sensor_values.profiler_hits, 2);
            }
        }
    }
    assert_eq!(matches, 1);
}

#[test]
fn test_merge_is_commutative_up_to_normalization() {
    let mut counter = InternalIdCounter::new();
    let a = measurement_run(&mut counter, 100, 10);
    let b = measurement_run(&mut counter, 60, 4);

    let forward = merge_project_reports(&[&a, &b], &mut counter).unwrap();
    let backward = merge_project_reports(&[&b, &a], &mut counter).unwrap();

    assert_eq!(
        normalized_bytes(&forward, &mut counter),
        normalized_bytes(&backward, &mut counter)
    );
}

#[test]
fn test_merge_is_associative_over_sets_of_runs() {
    let mut counter = InternalIdCounter::new();
    let a = measurement_run(&mut counter, 100, 10);
    let b = measurement_run(&mut counter, 60, 4);
    let c = measurement_run(&mut counter, 7, 2);

    let ab = merge_project_reports(&[&a, &b], &mut counter).unwrap();
    let ab_c = merge_project_reports(&[&ab, &c], &mut counter).unwrap();

    let bc = merge_project_reports(&[&b, &c], &mut counter).unwrap();
    let a_bc = merge_project_reports(&[&a, &bc], &mut counter).unwrap();

    let all = merge_project_reports(&[&a, &b, &c], &mut counter).unwrap();

    let reference = normalized_bytes(&all, &mut counter);
    assert_eq!(normalized_bytes(&ab_c, &mut counter), reference);
    assert_eq!(normalized_bytes(&a_bc, &mut counter), reference);
}

#[test]
fn test_merged_report_survives_persistence() {
    let mut counter = InternalIdCounter::new();
    let a = measurement_run(&mut counter, 100, 10);
    let b = measurement_run(&mut counter, 60, 4);

    let merged = merge_project_reports(&[&a, &b], &mut counter).unwrap();
    let bytes = merged.to_bytes().unwrap();
    let (loaded, remainder) = ProjectReport::from_bytes(&bytes, &mut counter).unwrap();

    assert_eq!(remainder.len(), 0);
    assert_eq!(loaded, merged);
    loaded.validate().unwrap();
}

#[test]
fn test_merge_single_input_keeps_values_and_switches_kind() {
    let mut counter = InternalIdCounter::new();
    let a = measurement_run(&mut counter, 100, 10);

    let merged = merge_project_reports(&[&a], &mut counter).unwrap();
    assert_eq!(merged.kind(), ReportKind::Accumulated);
    assert_eq!(
        merged.report.source_node_record_count(),
        a.report.source_node_record_count()
    );

    let file = merged.report.intern.values().next().unwrap();
    let record = file.source_nodes.values().next().unwrap();
    assert_eq!(record.sensor_values.self_cpu_time, 100);
}
