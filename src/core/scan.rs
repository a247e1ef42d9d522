// Availability scan of an SDS archive

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::constants::NANOS_PER_SECOND;
use crate::core::error::{Result, SdsError};
use crate::core::format::{from_nanos, RecordHeader};
use crate::core::reader::MseedReader;

/// One archive file as seen by the availability table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityRecord {
    pub net: String,
    pub sta: String,
    pub comp: String,
    pub path: String,
    pub file: String,
    pub starttime: DateTime<Utc>,
    pub endtime: DateTime<Utc>,
    pub data_duration: f64,
    pub gaps_duration: f64,
    pub samplerate: f64,
    pub flag: String,
}

/// Every non-hidden file below `root`, sorted. Symlinked directories are
/// not descended into.
fn archive_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(io::Error::from(e).into()),
            Err(e) => {
                warn!("Skipping unreadable archive entry: {}", e);
                continue;
            }
        };
        let hidden = entry.file_name().to_str().map_or(true, |n| n.starts_with('.'));
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if is_file && !hidden {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn seconds(nanos: i64) -> f64 {
    nanos as f64 / NANOS_PER_SECOND as f64
}

/// Builds the availability record of the first channel in `headers`.
fn summarize(headers: &[RecordHeader], sds_root: &Path, path: &Path) -> Option<AvailabilityRecord> {
    let first = headers
        .iter()
        .find(|h| h.sample_count > 0 && h.sampling_rate > 0.0)?;
    let id = first.id();

    let mut spans: Vec<&RecordHeader> = headers
        .iter()
        .filter(|h| h.id() == id && h.sample_count > 0 && h.sampling_rate > 0.0)
        .collect();
    spans.sort_by_key(|h| h.start_nanos);

    let start = first.start_nanos.min(spans[0].start_nanos);
    let end = spans.iter().map(|h| h.end_nanos()).max().unwrap_or(start);

    let tolerance = (0.5 * NANOS_PER_SECOND as f64 / first.sampling_rate) as i64;
    let mut gaps = 0i64;
    let mut covered_until = spans[0].next_sample_nanos();
    for span in &spans[1..] {
        if span.start_nanos - covered_until > tolerance {
            gaps += span.start_nanos - covered_until;
        }
        covered_until = covered_until.max(span.next_sample_nanos());
    }

    let relative_dir = path
        .parent()
        .and_then(|dir| dir.strip_prefix(sds_root).ok())
        .unwrap_or_else(|| Path::new(""));

    Some(AvailabilityRecord {
        net: first.network.clone(),
        sta: first.station.clone(),
        comp: first.channel.clone(),
        path: relative_dir.to_string_lossy().into_owned(),
        file: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        starttime: from_nanos(start),
        endtime: from_nanos(end),
        data_duration: seconds(end - start),
        gaps_duration: seconds(gaps),
        samplerate: first.sampling_rate,
        flag: "N".to_string(),
    })
}

/// Reads record headers of every file under `sds_root`. Files that are not
/// miniSEED are logged and skipped.
pub fn scan_archive(sds_root: &Path) -> Result<Vec<AvailabilityRecord>> {
    let files = archive_files(sds_root)?;

    let mut records = Vec::new();
    for path in files {
        let headers = match MseedReader::open(&path).and_then(|r| r.headers()) {
            Ok(headers) => headers,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        match summarize(&headers, sds_root, &path) {
            Some(record) => records.push(record),
            None => debug!("No data records in {}", path.display()),
        }
        if records.len() % 50 == 0 && !records.is_empty() {
            info!(" -> Scanned {} files...", records.len());
        }
    }

    info!("Scan complete! Total files registered: {}", records.len());
    Ok(records)
}

pub fn write_availability(path: &Path, records: &[AvailabilityRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records).map_err(SdsError::from)?;
    fs::write(path, json)?;
    info!("Availability written to {}", path.display());
    Ok(())
}
