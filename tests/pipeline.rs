use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use sds_reformat::core::writer::encode_trace;
use sds_reformat::{
    read_traces, run_batch, scan_archive, ProcessingConfig, Samples, Trace, TraceStats,
};

fn trace(channel: &str, start: DateTime<Utc>, rate: f64, n: usize) -> Trace {
    Trace::new(
        TraceStats {
            network: "5J".to_string(),
            station: "02050".to_string(),
            location: String::new(),
            channel: channel.to_string(),
            start,
            sampling_rate: rate,
        },
        Samples::Int((0..n).map(|i| ((i * 7919) % 4001) as i32 - 2000).collect()),
    )
}

fn write_source(path: &Path, traces: &[Trace]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let bytes: Vec<u8> = traces
        .iter()
        .flat_map(|t| encode_trace(t, 4096).unwrap())
        .collect();
    fs::write(path, bytes).unwrap();
}

fn config(root: &Path) -> ProcessingConfig {
    ProcessingConfig {
        source_folder: root.join("Seismic_Data"),
        output_folder: root.join("SDS"),
        record_length: 4096,
        extensions: vec!["mseed".to_string()],
    }
}

fn archive_contents(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let name = path.strip_prefix(root).unwrap().to_string_lossy().into_owned();
                out.push((name, fs::read(&path).unwrap()));
            }
        }
    }
    out.sort();
    out
}

#[test]
fn test_midnight_crossing_trace_with_numeric_component() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let start = Utc.with_ymd_and_hms(2020, 7, 1, 23, 0, 0).unwrap();
    write_source(
        &cfg.source_folder.join("5J.02050.2020-07-01.mseed"),
        &[trace("HH1", start, 100.0, 7200 * 100 + 1)],
    );

    let summary = run_batch(&cfg).unwrap();
    assert_eq!(summary.files_ok, 1);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(summary.days_written, 2);

    let station_dir = cfg.output_folder.join("2020/5J/02050");
    let day183 = read_traces(station_dir.join("5J.02050..HHN.D.2020.183")).unwrap();
    let day184 = read_traces(station_dir.join("5J.02050..HHN.D.2020.184")).unwrap();
    assert_eq!(day183.len(), 1);
    assert_eq!(day184.len(), 1);
    assert_eq!(day183[0].npts(), 360_000);
    assert_eq!(day184[0].npts(), 360_001);
    assert_eq!(day183[0].stats.channel, "HHN");
    assert_eq!(day183[0].stats.start, start);
    assert_eq!(
        day184[0].stats.start,
        Utc.with_ymd_and_hms(2020, 7, 2, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_single_day_keeps_every_sample() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let start = Utc.with_ymd_and_hms(2021, 2, 3, 0, 0, 0).unwrap();
    let original = trace("BHZ", start, 1.0, 86_400);
    write_source(&cfg.source_folder.join("day.mseed"), &[original.clone()]);

    let summary = run_batch(&cfg).unwrap();
    assert_eq!(summary.days_written, 1);

    let written = read_traces(
        cfg.output_folder
            .join("2021/5J/02050/5J.02050..BHZ.D.2021.034"),
    )
    .unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].samples, original.samples);
    assert_eq!(written[0].stats.start, start);
}

#[test]
fn test_multi_day_counts_per_day() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    // half a day, a full day, then 10 s of a third, at 1 Hz
    let start = Utc.with_ymd_and_hms(2020, 12, 30, 12, 0, 0).unwrap();
    let n = 12 * 3600 + 86_400 + 10;
    write_source(
        &cfg.source_folder.join("station/long.mseed"),
        &[trace("EHE", start, 1.0, n)],
    );

    let summary = run_batch(&cfg).unwrap();
    assert_eq!(summary.days_written, 3);

    let root = &cfg.output_folder;
    let counts: Vec<usize> = [
        "2020/5J/02050/5J.02050..EHE.D.2020.365",
        "2020/5J/02050/5J.02050..EHE.D.2020.366",
        "2021/5J/02050/5J.02050..EHE.D.2021.001",
    ]
    .iter()
    .map(|p| read_traces(root.join(p)).unwrap()[0].npts())
    .collect();
    assert_eq!(counts, vec![12 * 3600, 86_400, 10]);
}

#[test]
fn test_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let start = Utc.with_ymd_and_hms(2020, 7, 1, 18, 0, 0).unwrap();
    write_source(
        &cfg.source_folder.join("a.mseed"),
        &[trace("HHZ", start, 20.0, 12 * 3600 * 20)],
    );

    let first = run_batch(&cfg).unwrap();
    assert_eq!(first.days_written, 2);
    let before = archive_contents(&cfg.output_folder);

    let second = run_batch(&cfg).unwrap();
    assert_eq!(second.days_written, 0);
    assert_eq!(second.days_skipped, 2);
    assert_eq!(archive_contents(&cfg.output_folder), before);
}

#[test]
fn test_compressed_and_gappy_input() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let start = Utc.with_ymd_and_hms(2020, 5, 5, 10, 0, 0).unwrap();
    let first = trace("HH2", start, 10.0, 100);
    let second = trace("HH2", start + Duration::seconds(20), 10.0, 100);

    let raw: Vec<u8> = [&second, &first]
        .iter()
        .flat_map(|t| encode_trace(t, 512).unwrap())
        .collect();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    fs::create_dir_all(&cfg.source_folder).unwrap();
    fs::write(
        cfg.source_folder.join("gappy.mseed.gz"),
        encoder.finish().unwrap(),
    )
    .unwrap();

    let summary = run_batch(&cfg).unwrap();
    assert_eq!(summary.files_ok, 1);
    assert_eq!(summary.merge_warnings, 0);

    let merged = read_traces(
        cfg.output_folder
            .join("2020/5J/02050/5J.02050..HHE.D.2020.126"),
    )
    .unwrap();
    assert_eq!(merged.len(), 1);
    // 10 s gap interpolated: 100 + 100 + 100 samples
    assert_eq!(merged[0].npts(), 300);
    assert_eq!(merged[0].stats.start, start);
}

#[test]
fn test_merge_failure_falls_back_to_unmerged_traces() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let start = Utc.with_ymd_and_hms(2020, 5, 5, 10, 0, 0).unwrap();
    write_source(
        &cfg.source_folder.join("mixed.mseed"),
        &[
            trace("HHZ", start, 100.0, 100),
            trace("HHZ", start + Duration::days(1), 50.0, 100),
        ],
    );

    let summary = run_batch(&cfg).unwrap();
    assert_eq!(summary.files_ok, 1);
    assert_eq!(summary.merge_warnings, 1);
    assert_eq!(summary.days_written, 2);
}

#[test]
fn test_unknown_component_is_counted_as_defaulted() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let start = Utc.with_ymd_and_hms(2020, 5, 5, 10, 0, 0).unwrap();
    write_source(
        &cfg.source_folder.join("odd.mseed"),
        &[trace("HHX", start, 10.0, 100)],
    );
    write_source(
        &cfg.source_folder.join("plain.mseed"),
        &[trace("HH1", start, 10.0, 100)],
    );

    let summary = run_batch(&cfg).unwrap();
    assert_eq!(summary.files_ok, 2);
    assert_eq!(summary.channels_defaulted, 1);
    assert!(cfg
        .output_folder
        .join("2020/5J/02050/5J.02050..HHZ.D.2020.126")
        .exists());
}

#[test]
fn test_scan_after_processing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let start = Utc.with_ymd_and_hms(2020, 7, 1, 23, 0, 0).unwrap();
    write_source(
        &cfg.source_folder.join("x.mseed"),
        &[trace("HHZ", start, 1.0, 7201)],
    );
    run_batch(&cfg).unwrap();

    let records = scan_archive(&cfg.output_folder).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].file, "5J.02050..HHZ.D.2020.183");
    assert_eq!(records[0].starttime, start);
    assert_eq!(records[1].file, "5J.02050..HHZ.D.2020.184");
    assert!((records[1].data_duration - 3600.0).abs() < 1e-9);
    assert_eq!(records[1].gaps_duration, 0.0);
}
