// SDS reformatter for seismic waveform archives
// Main library entry point

pub mod core;
pub mod models;
pub mod utils;

// Re-export main types
pub use crate::core::channel::{normalize_channel, ChannelAction};
pub use crate::core::data_handle::{run_batch, BatchSummary, FileReport, FileStats};
pub use crate::core::error::{MergeError, Result, SdsError};
pub use crate::core::format::{Samples, Trace, TraceStats};
pub use crate::core::reader::{read_traces, MseedReader};
pub use crate::core::resegment::{resegment_trace, DayOutcome, SdsKey};
pub use crate::core::scan::{scan_archive, AvailabilityRecord};
pub use models::config_model::{PipelineConfig, ProcessingConfig, ScanConfig};

#[cfg(test)]
mod tests {
    #[test]
    fn test_constants() {
        use crate::core::constants::*;
        assert_eq!(FIXED_HEADER_SIZE, 48);
        assert_eq!(STEIM_FRAME_SIZE, STEIM_FRAME_WORDS * 4);
        assert_eq!(Encoding::from_u8(11), Some(Encoding::Steim2));
        assert_eq!(Encoding::from_u8(2), None);
    }
}
