use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::constants::DEFAULT_RECORD_LENGTH;

/// Top level of `config.json`. Sections the reformatter does not use
/// (search criteria, plotting) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub seismic_processing: ProcessingConfig,
    #[serde(default)]
    pub data_scan: Option<ScanConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub source_folder: PathBuf,
    pub output_folder: PathBuf,
    #[serde(default = "default_record_length")]
    pub record_length: usize,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub sds_root: PathBuf,
    #[serde(default)]
    pub availability_output: Option<PathBuf>,
}

fn default_record_length() -> usize {
    DEFAULT_RECORD_LENGTH
}

fn default_extensions() -> Vec<String> {
    vec!["mseed".to_string()]
}
