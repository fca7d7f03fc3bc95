use oak_report::codec::{BufferReader, BufferWriter};
use oak_report::model::{
    InternalIdCounter, ModuleIdentity, ProjectReport, ReferenceKind, Report, ReportKind,
    ReportVersion, SensorValues, SourceNodeIdentity,
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

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn build_report(counter: &mut InternalIdCounter) -> ProjectReport {
    let mut report = ProjectReport::new(ReportKind::Measurement, counter);
    report.report.relative_root_dir = Some("../profiles".to_string());
    report.report.headless_sensor_values = delta(7, 0.125);

    let run = report
        .add_sample(
            &SourceNodeIdentity::own_code("./src/app.ts", "{root}.{function:run}"),
            &delta(120, 1.5),
        )
        .unwrap();
    report
        .add_sample(
            &SourceNodeIdentity::own_code("./src/app.ts", "{root}.{class:App}.{method:init}"),
            &delta(30, 0.25),
        )
        .unwrap();
    report
        .add_reference(
            run,
            ReferenceKind::Intern,
            &SourceNodeIdentity::own_code("./src/app.ts", "{root}.{class:App}.{method:init}"),
            &delta(30, 0.25),
        )
        .unwrap();
    report
        .add_reference(
            run,
            ReferenceKind::Extern,
            &SourceNodeIdentity::new(
                ModuleIdentity::new("left-pad", "1.3.0"),
                "./index.js",
                "{root}.{function:pad}",
            ),
            &delta(12, 0.0625),
        )
        .unwrap();
    report
        .add_sample(
            &SourceNodeIdentity::new(
                ModuleIdentity::new("left-pad", "1.3.0"),
                "./index.js",
                "{root}.{function:pad}",
            ),
            &delta(12, 0.0625),
        )
        .unwrap();
    report
        .add_sample(
            &SourceNodeIdentity::lang_internal("node:internal/timers", "{root}"),
            &delta(4, 0.0),
        )
        .unwrap();
    report
}

#[test]
fn test_sensor_values_reference_vector() {
    // the documented wire example: hits=1, the five time fields 2..6 and
    // the five cpu energy fields 0.01..0.05
    let values = SensorValues {
        profiler_hits: 1,
        self_cpu_time: 2,
        aggregated_cpu_time: 3,
        intern_cpu_time: 4,
        extern_cpu_time: 5,
        lang_internal_cpu_time: 6,
        self_cpu_energy_consumption: 0.01,
        aggregated_cpu_energy_consumption: 0.02,
        intern_cpu_energy_consumption: 0.03,
        extern_cpu_energy_consumption: 0.04,
        lang_internal_cpu_energy_consumption: 0.05,
        ..SensorValues::zero()
    };

    let mut writer = BufferWriter::new();
    values.to_buffer(&mut writer).unwrap();
    let bytes = writer.into_bytes();

    assert_eq!(bytes.len(), 66);
    assert_eq!(
        hex(&bytes),
        "ff070100000002000000030000000400000005000000060000007b14ae47e17a843f\
         7b14ae47e17a943fb81e85eb51b89e3f7b14ae47e17aa43f9a9999999999a93f"
            .replace(char::is_whitespace, "")
    );
}

#[test]
fn test_all_zero_sensor_values_encode_to_two_bytes() {
    let mut writer = BufferWriter::new();
    SensorValues::zero().to_buffer(&mut writer).unwrap();
    assert_eq!(hex(&writer.into_bytes()), "0000");
}

#[test]
fn test_project_report_round_trip() {
    let mut counter = InternalIdCounter::new();
    let report = build_report(&mut counter);

    let bytes = report.to_bytes().unwrap();
    let (decoded, remainder) = ProjectReport::from_bytes(&bytes, &mut counter).unwrap();

    assert_eq!(remainder.len(), 0);
    assert_eq!(decoded, report);
    decoded.validate().unwrap();
}

#[test]
fn test_decode_consumes_exactly_the_encoded_length() {
    let mut counter = InternalIdCounter::new();
    let report = build_report(&mut counter);

    let mut bytes = report.to_bytes().unwrap();
    let encoded_len = bytes.len();
    bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

    let (_, remainder) = ProjectReport::from_bytes(&bytes, &mut counter).unwrap();
    assert_eq!(bytes.len() - remainder.len(), encoded_len);
    assert_eq!(remainder, &[0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn test_old_report_version_round_trips_without_headless() {
    let mut counter = InternalIdCounter::new();
    let mut report = ProjectReport::with_version(
        ReportVersion::new(0, 1, 3),
        ReportKind::Measurement,
        &mut counter,
    );
    report
        .add_sample(
            &SourceNodeIdentity::own_code("./src/app.ts", "{root}"),
            &delta(10, 0.5),
        )
        .unwrap();

    let bytes = report.to_bytes().unwrap();
    let (decoded, remainder) = ProjectReport::from_bytes(&bytes, &mut counter).unwrap();

    assert_eq!(remainder.len(), 0);
    assert_eq!(decoded, report);
    assert!(decoded.report.headless_sensor_values.is_zero());
}

#[test]
fn test_reader_with_newer_schema_decodes_0_1_3_buffer() {
    // hand-build a 0.1.3 frame: no headless values, a non-empty legacy
    // id-remapping table that the reader must consume and discard
    let mut writer = BufferWriter::new();
    writer.write_string("0.1.3").unwrap();
    writer.write_u8(0); // kind: measurement
    writer.write_u8(0); // type: root report
    writer.write_bool(false); // no relative root dir
    writer.write_u32(2); // legacy table: two entries
    writer.write_u32(10);
    writer.write_u32(20);
    writer.write_u32(11);
    writer.write_u32(21);
    writer.write_u32(0); // intern: empty
    writer.write_u32(0); // lang internal: empty
    writer.write_u32(0); // extern: empty
    writer.write_u32(0); // embedded index: no modules
    let bytes = writer.into_bytes();

    let mut counter = InternalIdCounter::new();
    let (decoded, remainder) = ProjectReport::from_bytes(&bytes, &mut counter).unwrap();

    assert_eq!(remainder.len(), 0);
    assert_eq!(decoded.report_version(), ReportVersion::new(0, 1, 3));
    assert!(decoded.report.headless_sensor_values.is_zero());
    assert_eq!(decoded.report.source_node_record_count(), 0);
}

#[test]
fn test_version_0_1_4_carries_headless_and_legacy_table() {
    let mut counter = InternalIdCounter::new();
    let mut report = ProjectReport::with_version(
        ReportVersion::new(0, 1, 4),
        ReportKind::Measurement,
        &mut counter,
    );
    report.report.headless_sensor_values = delta(3, 0.5);

    let bytes = report.to_bytes().unwrap();
    let (decoded, remainder) = ProjectReport::from_bytes(&bytes, &mut counter).unwrap();

    assert_eq!(remainder.len(), 0);
    assert_eq!(decoded.report.headless_sensor_values, report.report.headless_sensor_values);
}

#[test]
fn test_module_frame_cannot_stand_alone() {
    let mut counter = InternalIdCounter::new();
    let report = Report::new(ReportVersion::new(0, 1, 6), ReportKind::Measurement);

    let mut writer = BufferWriter::new();
    report
        .to_buffer(&mut writer, Some(&ModuleIdentity::new("left-pad", "1.3.0")))
        .unwrap();
    let bytes = writer.into_bytes();

    assert!(ProjectReport::from_bytes(&bytes, &mut counter).is_err());
}

#[test]
fn test_truncated_buffer_reports_eof_not_panic() {
    let mut counter = InternalIdCounter::new();
    let report = build_report(&mut counter);
    let bytes = report.to_bytes().unwrap();

    for len in [0, 1, 5, bytes.len() / 2, bytes.len() - 1] {
        let result = ProjectReport::from_bytes(&bytes[..len], &mut counter);
        assert!(result.is_err(), "decoding {len} bytes should fail cleanly");
    }
}

#[test]
fn test_streaming_reads_leave_remainder_for_the_caller() {
    let mut writer = BufferWriter::new();
    SensorValues::zero().to_buffer(&mut writer).unwrap();
    writer.write_string("next record").unwrap();
    let bytes = writer.into_bytes();

    let mut reader = BufferReader::new(&bytes);
    let decoded = SensorValues::from_buffer(&mut reader).unwrap();
    assert!(decoded.is_zero());
    // the string is untouched and decodable from the remainder
    assert_eq!(reader.read_string("tail").unwrap(), "next record");
}
