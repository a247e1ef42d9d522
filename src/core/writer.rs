// miniSEED 2.4 writer

use crate::core::constants::*;
use crate::core::error::{Result, SdsError};
use crate::core::format::{from_nanos, Samples, Trace};
use crate::core::steim::{self, SteimLevel};
use chrono::{Datelike, Timelike};
use tracing::{debug, warn};

/// Encoding a trace is written with: its source encoding when that still
/// matches the sample type, else the default for the type.
pub fn choose_encoding(trace: &Trace) -> Encoding {
    let source = trace.mseed.map(|m| m.encoding);
    match (&trace.samples, source) {
        (Samples::Int(values), Some(Encoding::Int16))
            if values.iter().all(|v| i16::try_from(*v).is_ok()) =>
        {
            Encoding::Int16
        }
        (Samples::Int(_), Some(enc @ (Encoding::Int32 | Encoding::Steim1 | Encoding::Steim2))) => {
            enc
        }
        (Samples::Int(_), _) => Encoding::Steim2,
        (Samples::Float(_), _) => Encoding::Float32,
        (Samples::Double(_), _) => Encoding::Float64,
    }
}

/// Factor/multiplier pair for a rate, if it is exactly representable.
pub fn rate_to_factors(rate: f64) -> Option<(i16, i16)> {
    if rate >= 1.0 && rate.fract() == 0.0 && rate <= i16::MAX as f64 {
        return Some((rate as i16, 1));
    }
    if rate > 0.0 && rate < 1.0 {
        let period = 1.0 / rate;
        if (period - period.round()).abs() < 1e-9 && period.round() <= i16::MAX as f64 {
            return Some((-(period.round() as i16), 1));
        }
    }
    None
}

fn approximate_factors(rate: f64) -> (i16, i16) {
    if rate >= 1.0 {
        (rate.round().min(i16::MAX as f64) as i16, 1)
    } else if rate > 0.0 {
        (-((1.0 / rate).round().min(i16::MAX as f64) as i16), 1)
    } else {
        (0, 0)
    }
}

fn padded(value: &str, width: usize) -> Vec<u8> {
    let mut field: Vec<u8> = value.bytes().take(width).collect();
    field.resize(width, b' ');
    field
}

struct RecordLayout {
    factors: (i16, i16),
    exact_rate: bool,
    data_offset: usize,
    exponent: u8,
}

impl RecordLayout {
    fn new(trace: &Trace, record_length: usize) -> Result<Self> {
        if !record_length.is_power_of_two()
            || !(MIN_RECORD_LENGTH..=MAX_RECORD_LENGTH).contains(&record_length)
        {
            return Err(SdsError::InvalidRecordLength(record_length));
        }
        let rate = trace.stats.sampling_rate;
        let (factors, exact_rate) = match rate_to_factors(rate) {
            Some(factors) => (factors, true),
            None => (approximate_factors(rate), false),
        };
        // blockette 100 pushes the data start to the next frame boundary
        let data_offset = if exact_rate { 64 } else { 128 };
        Ok(Self {
            factors,
            exact_rate,
            data_offset,
            exponent: record_length.trailing_zeros() as u8,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn write_header(
    record: &mut [u8],
    sequence: usize,
    trace: &Trace,
    start_nanos: i64,
    sample_count: usize,
    encoding: Encoding,
    layout: &RecordLayout,
    frames: usize,
) {
    let stats = &trace.stats;
    let quality = trace.mseed.map(|m| m.quality).unwrap_or(b'D');

    record[0..6].copy_from_slice(format!("{:06}", sequence % 1_000_000).as_bytes());
    record[6] = quality;
    record[7] = b' ';
    record[8..13].copy_from_slice(&padded(&stats.station, 5));
    record[13..15].copy_from_slice(&padded(&stats.location, 2));
    record[15..18].copy_from_slice(&padded(&stats.channel, 3));
    record[18..20].copy_from_slice(&padded(&stats.network, 2));

    let start = from_nanos(start_nanos);
    let micros = start.timestamp_subsec_micros();
    record[20..22].copy_from_slice(&(start.year() as u16).to_be_bytes());
    record[22..24].copy_from_slice(&(start.ordinal() as u16).to_be_bytes());
    record[24] = start.hour() as u8;
    record[25] = start.minute() as u8;
    record[26] = start.second() as u8;
    record[27] = 0;
    record[28..30].copy_from_slice(&((micros / 100) as u16).to_be_bytes());

    record[30..32].copy_from_slice(&(sample_count as u16).to_be_bytes());
    record[32..34].copy_from_slice(&layout.factors.0.to_be_bytes());
    record[34..36].copy_from_slice(&layout.factors.1.to_be_bytes());
    record[36] = 0;
    record[37] = 0;
    record[38] = 0;
    record[39] = if layout.exact_rate { 2 } else { 3 };
    record[40..44].copy_from_slice(&0i32.to_be_bytes());
    record[44..46].copy_from_slice(&(layout.data_offset as u16).to_be_bytes());
    record[46..48].copy_from_slice(&(FIXED_HEADER_SIZE as u16).to_be_bytes());

    // blockette 1000
    record[48..50].copy_from_slice(&BLOCKETTE_1000.to_be_bytes());
    record[50..52].copy_from_slice(&56u16.to_be_bytes());
    record[52] = encoding as u8;
    record[53] = 1;
    record[54] = layout.exponent;
    record[55] = 0;

    // blockette 1001
    let next = if layout.exact_rate { 0u16 } else { 64u16 };
    record[56..58].copy_from_slice(&BLOCKETTE_1001.to_be_bytes());
    record[58..60].copy_from_slice(&next.to_be_bytes());
    record[60] = 0;
    record[61] = (micros % 100) as u8;
    record[62] = 0;
    record[63] = frames.min(u8::MAX as usize) as u8;

    if !layout.exact_rate {
        record[64..66].copy_from_slice(&BLOCKETTE_100.to_be_bytes());
        record[66..68].copy_from_slice(&0u16.to_be_bytes());
        record[68..72].copy_from_slice(&(trace.stats.sampling_rate as f32).to_be_bytes());
        record[72] = 0;
    }
}

/// Encodes up to `capacity` bytes worth of samples starting at `pos`.
/// Returns the packed bytes, samples consumed, and Steim frame count.
fn encode_chunk(
    samples: &Samples,
    pos: usize,
    encoding: Encoding,
    capacity: usize,
) -> Result<(Vec<u8>, usize, usize)> {
    let limit = u16::MAX as usize;
    match (samples, encoding) {
        (Samples::Int(values), Encoding::Steim1 | Encoding::Steim2) => {
            let level = if encoding == Encoding::Steim1 {
                SteimLevel::One
            } else {
                SteimLevel::Two
            };
            let frames = capacity / STEIM_FRAME_SIZE;
            // at most seven differences per word
            let fit = frames * STEIM_FRAME_WORDS * 7;
            let end = (pos + limit.min(fit)).min(values.len());
            let block = steim::encode(level, &values[pos..end], frames)?;
            Ok((block.bytes, block.samples, block.frames))
        }
        (Samples::Int(values), Encoding::Int16) => {
            let count = (capacity / 2).min(limit).min(values.len() - pos);
            let bytes = values[pos..pos + count]
                .iter()
                .flat_map(|v| (*v as i16).to_be_bytes())
                .collect();
            Ok((bytes, count, 0))
        }
        (Samples::Int(values), _) => {
            let count = (capacity / 4).min(limit).min(values.len() - pos);
            let bytes = values[pos..pos + count]
                .iter()
                .flat_map(|v| v.to_be_bytes())
                .collect();
            Ok((bytes, count, 0))
        }
        (Samples::Float(values), _) => {
            let count = (capacity / 4).min(limit).min(values.len() - pos);
            let bytes = values[pos..pos + count]
                .iter()
                .flat_map(|v| v.to_be_bytes())
                .collect();
            Ok((bytes, count, 0))
        }
        (Samples::Double(values), _) => {
            let count = (capacity / 8).min(limit).min(values.len() - pos);
            let bytes = values[pos..pos + count]
                .iter()
                .flat_map(|v| v.to_be_bytes())
                .collect();
            Ok((bytes, count, 0))
        }
    }
}

fn encode_with(trace: &Trace, record_length: usize, encoding: Encoding) -> Result<Vec<u8>> {
    let layout = RecordLayout::new(trace, record_length)?;
    let capacity = record_length - layout.data_offset;
    let total = trace.npts();

    let mut out = Vec::new();
    let mut pos = 0;
    let mut sequence = 1;

    while pos < total {
        let (data, count, frames) = encode_chunk(&trace.samples, pos, encoding, capacity)?;
        if count == 0 {
            return Err(SdsError::InvalidRecordLength(record_length));
        }

        let mut record = vec![0u8; record_length];
        write_header(
            &mut record,
            sequence,
            trace,
            trace.sample_time_nanos(pos),
            count,
            encoding,
            &layout,
            frames,
        );
        record[layout.data_offset..layout.data_offset + data.len()].copy_from_slice(&data);
        out.extend_from_slice(&record);

        pos += count;
        sequence += 1;
    }

    debug!(
        "Encoded {} samples of {} into {} records ({:?})",
        total,
        trace.id(),
        sequence - 1,
        encoding
    );
    Ok(out)
}

/// Serializes a trace into big-endian miniSEED records.
pub fn encode_trace(trace: &Trace, record_length: usize) -> Result<Vec<u8>> {
    let encoding = choose_encoding(trace);
    match encode_with(trace, record_length, encoding) {
        Err(SdsError::SteimOverflow(diff)) if encoding == Encoding::Steim2 => {
            warn!(
                "{}: difference {} exceeds Steim2 range, writing Steim1",
                trace.id(),
                diff
            );
            encode_with(trace, record_length, Encoding::Steim1)
        }
        other => other,
    }
}
