use std::fs;
use std::path::Path;
use tracing::info;

use crate::core::constants::{MAX_RECORD_LENGTH, MIN_RECORD_LENGTH};
use crate::core::error::{Result, SdsError};
use crate::models::config_model::PipelineConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Loads and validates the pipeline configuration. Any failure here is
/// fatal: nothing should be written to a guessed location.
pub fn load_config<P: AsRef<Path>>(file_path: P) -> Result<PipelineConfig> {
    let file_path = file_path.as_ref();

    let data = fs::read_to_string(file_path).map_err(|e| {
        SdsError::Config(format!(
            "Configuration file not found: {} ({e})",
            file_path.display()
        ))
    })?;

    let config = parse_config(&data)?;

    info!(
        "Config loaded from {}: {} -> {}",
        file_path.display(),
        config.seismic_processing.source_folder.display(),
        config.seismic_processing.output_folder.display()
    );

    Ok(config)
}

pub fn parse_config(data: &str) -> Result<PipelineConfig> {
    let config: PipelineConfig = serde_json::from_str(data)
        .map_err(|e| SdsError::Config(format!("JSON Parse Error: {e}")))?;

    let processing = &config.seismic_processing;
    if processing.source_folder.as_os_str().is_empty() {
        return Err(SdsError::Config("'source_folder' must not be empty".to_string()));
    }
    if processing.output_folder.as_os_str().is_empty() {
        return Err(SdsError::Config("'output_folder' must not be empty".to_string()));
    }
    let record_length = processing.record_length;
    if !record_length.is_power_of_two()
        || !(MIN_RECORD_LENGTH..=MAX_RECORD_LENGTH).contains(&record_length)
    {
        return Err(SdsError::Config(format!(
            "'record_length' must be a power of two in {MIN_RECORD_LENGTH}..={MAX_RECORD_LENGTH}, got {record_length}"
        )));
    }
    if processing.extensions.is_empty() {
        return Err(SdsError::Config("'extensions' must not be empty".to_string()));
    }
    if let Some(scan) = &config.data_scan {
        if scan.sds_root.as_os_str().is_empty() {
            return Err(SdsError::Config("'sds_root' must not be empty".to_string()));
        }
    }

    Ok(config)
}
