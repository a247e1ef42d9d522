use anyhow::Context;
use tracing::{info, warn, Level};

use sds_reformat::core::scan::write_availability;
use sds_reformat::utils::conf_helper::{load_config, DEFAULT_CONFIG_PATH};
use sds_reformat::{run_batch, scan_archive};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    // === CONFIG ===
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)
        .with_context(|| format!("CRITICAL INIT FAILURE: {config_path}"))?;

    // === RAW -> SDS ===
    let summary = run_batch(&config.seismic_processing)
        .context("processing raw waveform files")?;
    for report in summary.failures() {
        if let Err(e) = &report.outcome {
            warn!("  failed: {} ({})", report.path.display(), e);
        }
    }

    // === AVAILABILITY ===
    if let Some(scan) = &config.data_scan {
        let records = scan_archive(&scan.sds_root)
            .with_context(|| format!("scanning {}", scan.sds_root.display()))?;
        if let Some(output) = &scan.availability_output {
            write_availability(output, &records)?;
        }
    }

    info!(
        "All done: {} files processed, {} failed, {} day files written, {} already present",
        summary.files_ok, summary.files_failed, summary.days_written, summary.days_skipped
    );
    Ok(())
}
