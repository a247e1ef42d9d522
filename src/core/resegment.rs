// Day resegmentation into the SDS layout

use crate::core::constants::{NANOS_PER_SECOND, SECONDS_PER_DAY};
use crate::core::error::Result;
use crate::core::format::{from_nanos, to_nanos, Trace};
use crate::core::writer::encode_trace;
use chrono::{DateTime, Datelike, NaiveTime, Utc};
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const DAY_NANOS: i64 = SECONDS_PER_DAY * NANOS_PER_SECOND;
// keeps the slice end inside the calendar day
const DAY_END_EPSILON_NANOS: i64 = 1_000;

/// Identity of one archive file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SdsKey {
    pub year: i32,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub day_of_year: u32,
}

impl SdsKey {
    pub fn for_day(trace: &Trace, day: DateTime<Utc>) -> Self {
        Self {
            year: day.year(),
            network: trace.stats.network.clone(),
            station: trace.stats.station.clone(),
            location: trace.stats.location.clone(),
            channel: trace.stats.channel.clone(),
            day_of_year: day.ordinal(),
        }
    }

    /// `NET.STA.LOC.CHAN.D.YEAR.DOY`
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}.{}.{}.D.{}.{:03}",
            self.network, self.station, self.location, self.channel, self.year, self.day_of_year
        )
    }

    pub fn directory(&self, root: &Path) -> PathBuf {
        root.join(self.year.to_string())
            .join(&self.network)
            .join(&self.station)
    }

    pub fn path(&self, root: &Path) -> PathBuf {
        self.directory(root).join(self.file_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Written { path: PathBuf, samples: usize },
    Skipped { path: PathBuf },
}

impl DayOutcome {
    pub fn path(&self) -> &Path {
        match self {
            DayOutcome::Written { path, .. } | DayOutcome::Skipped { path } => path,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, DayOutcome::Written { .. })
    }
}

pub fn midnight(t: &DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Creates `path` with `bytes` unless a file already exists there.
/// Returns false when the file was already present.
pub fn write_if_absent(path: &Path, bytes: &[u8]) -> Result<bool> {
    persist_if_absent(path, |file| file.write_all(bytes))
}

/// Fills a temporary file next to `path` and links it into place only when
/// complete, so a failed write never leaves a partial day file behind.
fn persist_if_absent<F>(path: &Path, fill: F) -> Result<bool>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

/// Splits a trace at UTC midnights and writes each non-empty day under
/// `output_root`. Existing day files are left untouched.
///
/// The day loop runs through the day holding the last sample, so a final
/// sample landing exactly on midnight gets its own file.
pub fn resegment_trace(
    trace: &Trace,
    output_root: &Path,
    record_length: usize,
) -> Result<Vec<DayOutcome>> {
    let mut outcomes = Vec::new();
    if trace.npts() == 0 {
        return Ok(outcomes);
    }

    let end = trace.end_nanos();
    let mut cursor = to_nanos(&midnight(&trace.stats.start));

    while cursor <= end {
        let window_end = cursor + DAY_NANOS - DAY_END_EPSILON_NANOS;
        let day_slice = trace.slice(cursor, window_end);

        if day_slice.npts() > 0 {
            let key = SdsKey::for_day(&day_slice, from_nanos(cursor));
            let path = key.path(output_root);

            if path.exists() {
                debug!("Exists, skipping: {}", key.file_name());
                outcomes.push(DayOutcome::Skipped { path });
            } else {
                let bytes = encode_trace(&day_slice, record_length)?;
                if write_if_absent(&path, &bytes)? {
                    info!("Saved: {} | pts: {}", key.file_name(), day_slice.npts());
                    outcomes.push(DayOutcome::Written {
                        path,
                        samples: day_slice.npts(),
                    });
                } else {
                    debug!("Created concurrently, skipping: {}", key.file_name());
                    outcomes.push(DayOutcome::Skipped { path });
                }
            }
        }

        cursor += DAY_NANOS;
    }

    Ok(outcomes)
}
