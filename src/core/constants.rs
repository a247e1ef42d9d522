// Format constants for miniSEED 2.4

pub const FIXED_HEADER_SIZE: usize = 48;

pub const BLOCKETTE_100: u16 = 100;
pub const BLOCKETTE_1000: u16 = 1000;
pub const BLOCKETTE_1001: u16 = 1001;

pub const BLOCKETTE_100_SIZE: usize = 12;
pub const BLOCKETTE_1000_SIZE: usize = 8;
pub const BLOCKETTE_1001_SIZE: usize = 8;

// Steim frames are 16 words of 4 bytes
pub const STEIM_FRAME_SIZE: usize = 64;
pub const STEIM_FRAME_WORDS: usize = 16;

pub const MIN_RECORD_LENGTH: usize = 256;
pub const MAX_RECORD_LENGTH: usize = 65536;
pub const DEFAULT_RECORD_LENGTH: usize = 4096;

// Activity flag bit 1: time correction already applied to start time
pub const ACTIVITY_TIME_CORRECTION_APPLIED: u8 = 0x02;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

// Data encoding codes (blockette 1000, field 3)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii = 0,
    Int16 = 1,
    Int32 = 3,
    Float32 = 4,
    Float64 = 5,
    Steim1 = 10,
    Steim2 = 11,
}

impl Encoding {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Encoding::Ascii),
            1 => Some(Encoding::Int16),
            3 => Some(Encoding::Int32),
            4 => Some(Encoding::Float32),
            5 => Some(Encoding::Float64),
            10 => Some(Encoding::Steim1),
            11 => Some(Encoding::Steim2),
            _ => None,
        }
    }

    /// Width in bytes of one sample for fixed-width encodings.
    pub fn sample_width(self) -> Option<usize> {
        match self {
            Encoding::Int16 => Some(2),
            Encoding::Int32 | Encoding::Float32 => Some(4),
            Encoding::Float64 => Some(8),
            Encoding::Ascii => Some(1),
            Encoding::Steim1 | Encoding::Steim2 => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Encoding::Int16 | Encoding::Int32 | Encoding::Steim1 | Encoding::Steim2
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}
