// Decompression of raw source files

use crate::core::error::{Result, SdsError};
use flate2::read::MultiGzDecoder;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCompression {
    None,
    Gzip,
    Lz4,
    Zstd,
}

impl SourceCompression {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => SourceCompression::Gzip,
            Some("lz4") => SourceCompression::Lz4,
            Some("zst") => SourceCompression::Zstd,
            _ => SourceCompression::None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            SourceCompression::None => "",
            SourceCompression::Gzip => ".gz",
            SourceCompression::Lz4 => ".lz4",
            SourceCompression::Zstd => ".zst",
        }
    }

    pub const ALL: [SourceCompression; 4] = [
        SourceCompression::None,
        SourceCompression::Gzip,
        SourceCompression::Lz4,
        SourceCompression::Zstd,
    ];
}

pub fn decompress(data: &[u8], compression: SourceCompression) -> Result<Vec<u8>> {
    match compression {
        SourceCompression::None => Ok(data.to_vec()),

        SourceCompression::Gzip => {
            let mut decoder = MultiGzDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| SdsError::DecompressionFailed(format!("Gzip: {}", e)))?;
            Ok(decompressed)
        }

        #[cfg(feature = "lz4")]
        SourceCompression::Lz4 => {
            let mut decoder = lz4::Decoder::new(data)
                .map_err(|e| SdsError::DecompressionFailed(format!("LZ4: {}", e)))?;
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| SdsError::DecompressionFailed(format!("LZ4: {}", e)))?;
            Ok(decompressed)
        }

        #[cfg(not(feature = "lz4"))]
        SourceCompression::Lz4 => Err(SdsError::DecompressionFailed(
            "LZ4 support not compiled in".to_string(),
        )),

        #[cfg(feature = "zstd")]
        SourceCompression::Zstd => zstd::decode_all(data)
            .map_err(|e| SdsError::DecompressionFailed(format!("Zstd: {}", e))),

        #[cfg(not(feature = "zstd"))]
        SourceCompression::Zstd => Err(SdsError::DecompressionFailed(
            "Zstd support not compiled in".to_string(),
        )),
    }
}

/// Reads a source file, undoing the compression named by its extension.
pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    let raw = std::fs::read(path)?;
    match SourceCompression::from_path(path) {
        SourceCompression::None => Ok(raw),
        compression => decompress(&raw, compression),
    }
}
