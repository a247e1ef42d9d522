// Batch processing of raw source files into the SDS archive

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::core::channel::{normalize_channel, ChannelAction};
use crate::core::compression::SourceCompression;
use crate::core::error::{MergeError, Result};
use crate::core::merge::merge_traces;
use crate::core::reader::read_traces;
use crate::core::resegment::resegment_trace;
use crate::models::config_model::ProcessingConfig;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FileStats {
    pub traces: usize,
    pub days_written: usize,
    pub days_skipped: usize,
    pub channels_defaulted: usize,
    pub merge_warning: Option<MergeError>,
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Result<FileStats>,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub files_ok: usize,
    pub files_failed: usize,
    pub days_written: usize,
    pub days_skipped: usize,
    pub merge_warnings: usize,
    pub channels_defaulted: usize,
    pub reports: Vec<FileReport>,
}

impl BatchSummary {
    fn record(&mut self, report: FileReport) {
        match &report.outcome {
            Ok(stats) => {
                self.files_ok += 1;
                self.days_written += stats.days_written;
                self.days_skipped += stats.days_skipped;
                self.channels_defaulted += stats.channels_defaulted;
                if stats.merge_warning.is_some() {
                    self.merge_warnings += 1;
                }
            }
            Err(_) => self.files_failed += 1,
        }
        self.reports.push(report);
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.reports.iter().filter(|r| r.outcome.is_err())
    }
}

fn has_accepted_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    extensions.iter().any(|ext| {
        SourceCompression::ALL
            .iter()
            .any(|c| name.ends_with(&format!(".{}{}", ext, c.suffix())))
    })
}

/// Source files directly under `root` and one directory level below it,
/// in sorted path order. Unreadable station directories are logged and
/// skipped; only an unreadable `root` is an error.
pub fn collect_source_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(2) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(io::Error::from(e).into()),
            Err(e) => {
                warn!("Skipping unreadable source entry: {}", e);
                continue;
            }
        };
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if is_file && has_accepted_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Read, merge, normalize and resegment one source file.
pub fn handle_source_file(path: &Path, config: &ProcessingConfig) -> Result<FileStats> {
    let traces = read_traces(path)?;

    let mut stats = FileStats::default();
    let traces = match merge_traces(&traces) {
        Ok(merged) => merged,
        Err(e) => {
            warn!("  Merge warning: {}", e);
            stats.merge_warning = Some(e);
            traces
        }
    };
    stats.traces = traces.len();

    for mut trace in traces {
        let owner = format!("{}.{}", trace.stats.network, trace.stats.station);
        let (channel, action) = normalize_channel(&trace.stats.channel, Some(owner.as_str()));
        if action == ChannelAction::ForceDefault {
            stats.channels_defaulted += 1;
        }
        trace.stats.channel = channel;

        for outcome in resegment_trace(&trace, &config.output_folder, config.record_length)? {
            if outcome.is_written() {
                stats.days_written += 1;
            } else {
                stats.days_skipped += 1;
            }
        }
    }

    Ok(stats)
}

/// Processes every source file. Per-file failures are collected in the
/// summary; only an unreadable source folder or an uncreatable output
/// folder fails the whole batch.
pub fn run_batch(config: &ProcessingConfig) -> Result<BatchSummary> {
    fs::create_dir_all(&config.output_folder)?;

    info!(
        "Start processing data from {} to {}...",
        config.source_folder.display(),
        config.output_folder.display()
    );

    let mut summary = BatchSummary::default();
    for path in collect_source_files(&config.source_folder, &config.extensions)? {
        info!("Processing {} ...", path.display());
        let outcome = handle_source_file(&path, config);
        if let Err(e) = &outcome {
            error!("Error processing {}: {}", path.display(), e);
        }
        summary.record(FileReport { path, outcome });
    }

    info!(
        "Data processing completed: {} files ok, {} failed, {} days written, {} skipped",
        summary.files_ok, summary.files_failed, summary.days_written, summary.days_skipped
    );
    if summary.channels_defaulted > 0 {
        warn!(
            "{} trace(s) had their channel forced to the default code",
            summary.channels_defaulted
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_extensions() {
        let ext = vec!["mseed".to_string()];
        assert!(has_accepted_extension(Path::new("a/5J.02050.2020-07-01.mseed"), &ext));
        assert!(has_accepted_extension(Path::new("a/x.mseed.gz"), &ext));
        assert!(has_accepted_extension(Path::new("x.mseed.zst"), &ext));
        assert!(!has_accepted_extension(Path::new("x.sac"), &ext));
        assert!(!has_accepted_extension(Path::new(".hidden.mseed"), &ext));
        assert!(!has_accepted_extension(Path::new("x.mseed.bak"), &ext));
    }

    #[test]
    fn test_collects_flat_and_station_dirs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let station = dir.path().join("02050");
        fs::create_dir(&station).unwrap();
        fs::write(dir.path().join("b.mseed"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::write(station.join("a.mseed"), b"").unwrap();
        fs::create_dir(station.join("deeper")).unwrap();
        fs::write(station.join("deeper").join("c.mseed"), b"").unwrap();

        let files = collect_source_files(dir.path(), &["mseed".to_string()]).unwrap();
        assert_eq!(
            files,
            vec![station.join("a.mseed"), dir.path().join("b.mseed")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_station_dir_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let station = dir.path().join("02050");
        fs::create_dir(&station).unwrap();
        fs::write(station.join("a.mseed"), b"").unwrap();
        std::os::unix::fs::symlink(&station, dir.path().join("alias")).unwrap();
        std::os::unix::fs::symlink(dir.path(), station.join("loop")).unwrap();

        let files = collect_source_files(dir.path(), &["mseed".to_string()]).unwrap();
        assert_eq!(files, vec![station.join("a.mseed")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_station_dir_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("02051");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.mseed"), b"").unwrap();
        fs::write(dir.path().join("b.mseed"), b"").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let locked_readable = fs::read_dir(&locked).is_ok();

        let files = collect_source_files(dir.path(), &["mseed".to_string()]);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let files = files.unwrap();
        assert!(files.contains(&dir.path().join("b.mseed")));
        if !locked_readable {
            assert_eq!(files, vec![dir.path().join("b.mseed")]);
        }
    }

    #[test]
    fn test_bad_file_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("raw");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("broken.mseed"), vec![0x41u8; 600]).unwrap();

        let config = ProcessingConfig {
            source_folder: source,
            output_folder: dir.path().join("SDS"),
            record_length: 4096,
            extensions: vec!["mseed".to_string()],
        };
        let summary = run_batch(&config).unwrap();
        assert_eq!(summary.files_ok, 0);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.failures().count(), 1);
        assert!(config.output_folder.is_dir());
    }

    #[test]
    fn test_missing_source_folder_fails_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProcessingConfig {
            source_folder: dir.path().join("absent"),
            output_folder: dir.path().join("SDS"),
            record_length: 4096,
            extensions: vec!["mseed".to_string()],
        };
        assert!(run_batch(&config).is_err());
    }
}
