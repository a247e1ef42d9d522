// miniSEED 2.4 reader

use crate::core::compression::read_source;
use crate::core::constants::*;
use crate::core::error::{Result, SdsError};
use crate::core::format::*;
use crate::core::steim::{self, SteimLevel};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{debug, warn};

pub struct MseedReader {
    data: Vec<u8>,
}

impl MseedReader {
    /// Reads a whole (possibly compressed) file into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = read_source(path.as_ref())?;
        Ok(Self { data })
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Parses every record header without decoding sample data.
    pub fn headers(&self) -> Result<Vec<RecordHeader>> {
        let mut headers = Vec::new();
        let mut offset = 0;
        while offset + FIXED_HEADER_SIZE <= self.data.len() {
            let header = parse_record_header(&self.data, offset)?;
            offset += header.record_length;
            headers.push(header);
        }
        Ok(headers)
    }

    /// Decodes all data records and joins continuous ones into traces.
    pub fn traces(&self) -> Result<Vec<Trace>> {
        let mut traces: Vec<Trace> = Vec::new();

        for header in self.headers()? {
            let encoding = match Encoding::from_u8(header.encoding) {
                Some(Encoding::Ascii) => {
                    debug!("Skipping ASCII record {} of {}", header.sequence, header.id());
                    continue;
                }
                Some(encoding) => encoding,
                None => return Err(SdsError::UnsupportedEncoding(header.encoding)),
            };
            if header.sample_count == 0 || header.sampling_rate <= 0.0 {
                debug!("Skipping record {} of {} without samples", header.sequence, header.id());
                continue;
            }

            let record = &self.data[header.offset..header.offset + header.record_length];
            let samples = decode_samples(&header, encoding, record)?;

            if let Some(last) = traces.last_mut() {
                if continues(last, &header, &samples) {
                    last.samples.extend_from(&samples);
                    continue;
                }
            }

            let stats = TraceStats {
                network: header.network.clone(),
                station: header.station.clone(),
                location: header.location.clone(),
                channel: header.channel.clone(),
                start: from_nanos(header.start_nanos),
                sampling_rate: header.sampling_rate,
            };
            traces.push(Trace {
                stats,
                samples,
                mseed: Some(MseedAttributes {
                    encoding,
                    record_length: header.record_length,
                    quality: header.quality,
                }),
            });
        }

        Ok(traces)
    }
}

/// Convenience wrapper: open a file and decode its traces.
pub fn read_traces<P: AsRef<Path>>(path: P) -> Result<Vec<Trace>> {
    MseedReader::open(path)?.traces()
}

fn continues(trace: &Trace, header: &RecordHeader, samples: &Samples) -> bool {
    if trace.id() != header.id() || !trace.samples.same_kind(samples) {
        return false;
    }
    let rate = trace.stats.sampling_rate;
    if (rate - header.sampling_rate).abs() > rate * 1e-6 {
        return false;
    }
    let expected = trace.sample_time_nanos(trace.npts());
    let tolerance = (0.5 * NANOS_PER_SECOND as f64 / rate) as i64;
    (header.start_nanos - expected).abs() <= tolerance
}

fn u16_at(data: &[u8], pos: usize, order: ByteOrder) -> u16 {
    let bytes = [data[pos], data[pos + 1]];
    match order {
        ByteOrder::Big => u16::from_be_bytes(bytes),
        ByteOrder::Little => u16::from_le_bytes(bytes),
    }
}

fn i16_at(data: &[u8], pos: usize, order: ByteOrder) -> i16 {
    u16_at(data, pos, order) as i16
}

fn u32_at(data: &[u8], pos: usize, order: ByteOrder) -> u32 {
    let bytes = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
    match order {
        ByteOrder::Big => u32::from_be_bytes(bytes),
        ByteOrder::Little => u32::from_le_bytes(bytes),
    }
}

fn f64_at(data: &[u8], pos: usize, order: ByteOrder) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[pos..pos + 8]);
    match order {
        ByteOrder::Big => f64::from_be_bytes(bytes),
        ByteOrder::Little => f64::from_le_bytes(bytes),
    }
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn detect_byte_order(record: &[u8]) -> Option<ByteOrder> {
    let plausible = |order| {
        let year = u16_at(record, 20, order);
        let day = u16_at(record, 22, order);
        (1900..=2100).contains(&year) && (1..=366).contains(&day)
    };
    if plausible(ByteOrder::Big) {
        Some(ByteOrder::Big)
    } else if plausible(ByteOrder::Little) {
        Some(ByteOrder::Little)
    } else {
        None
    }
}

pub fn sample_rate_from_factors(factor: i16, multiplier: i16) -> f64 {
    let (f, m) = (factor as f64, multiplier as f64);
    match (factor, multiplier) {
        (0, _) | (_, 0) => 0.0,
        (f_, m_) if f_ > 0 && m_ > 0 => f * m,
        (f_, _) if f_ > 0 => -f / m,
        (_, m_) if m_ > 0 => -m / f,
        _ => 1.0 / (f * m),
    }
}

fn btime_nanos(record: &[u8], order: ByteOrder, offset: usize) -> Result<i64> {
    let year = u16_at(record, 20, order) as i32;
    let day = u16_at(record, 22, order) as u32;
    let (hour, minute, second) = (record[24] as u32, record[25] as u32, record[26] as i64);
    let fract = u16_at(record, 28, order) as i64;

    let midnight = NaiveDate::from_yo_opt(year, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| SdsError::InvalidHeader {
            offset,
            reason: format!("invalid BTIME {year}.{day:03} {hour}:{minute}"),
        })?;

    // second may be 60 during a leap second
    Ok(midnight.and_utc().timestamp() * NANOS_PER_SECOND
        + second * NANOS_PER_SECOND
        + fract * 100_000)
}

/// Parses the fixed header and blockette chain of the record at `offset`.
pub fn parse_record_header(data: &[u8], offset: usize) -> Result<RecordHeader> {
    let invalid = |reason: &str| SdsError::InvalidHeader {
        offset,
        reason: reason.to_string(),
    };

    let record = &data[offset..];
    if record.len() < FIXED_HEADER_SIZE {
        return Err(invalid("truncated fixed header"));
    }
    let quality = record[6];
    if !b"DRQM".contains(&quality) {
        return Err(invalid("unknown data quality indicator"));
    }
    let order = detect_byte_order(record).ok_or_else(|| invalid("implausible start time"))?;

    let sample_count = u16_at(record, 30, order) as usize;
    let factor = i16_at(record, 32, order);
    let multiplier = i16_at(record, 34, order);
    let activity_flags = record[36];
    let time_correction = u32_at(record, 40, order) as i32 as i64;
    let data_offset = u16_at(record, 44, order) as usize;

    let mut start_nanos = btime_nanos(record, order, offset)?;
    if activity_flags & ACTIVITY_TIME_CORRECTION_APPLIED == 0 {
        start_nanos += time_correction * 100_000;
    }

    let mut sampling_rate = sample_rate_from_factors(factor, multiplier);
    let mut blockette_1000 = None;

    let mut next = u16_at(record, 46, order) as usize;
    while next != 0 {
        if next < FIXED_HEADER_SIZE || next + 4 > record.len() {
            return Err(invalid("blockette offset out of range"));
        }
        let kind = u16_at(record, next, order);
        let following = u16_at(record, next + 2, order) as usize;

        match kind {
            BLOCKETTE_1000 if next + BLOCKETTE_1000_SIZE <= record.len() => {
                blockette_1000 = Some((record[next + 4], record[next + 5], record[next + 6]));
            }
            BLOCKETTE_1001 if next + BLOCKETTE_1001_SIZE <= record.len() => {
                start_nanos += (record[next + 5] as i8) as i64 * 1_000;
            }
            BLOCKETTE_100 if next + BLOCKETTE_100_SIZE <= record.len() => {
                let rate = f32::from_bits(u32_at(record, next + 4, order)) as f64;
                if rate > 0.0 {
                    sampling_rate = rate;
                }
            }
            other => debug!("Ignoring blockette {} at record offset {}", other, offset),
        }

        if following != 0 && following <= next {
            return Err(invalid("blockette chain loops"));
        }
        next = following;
    }

    let (encoding, word_order, exponent) =
        blockette_1000.ok_or_else(|| invalid("missing blockette 1000"))?;
    if !(8..=16).contains(&exponent) {
        return Err(SdsError::InvalidRecordLength(1usize << exponent.min(31)));
    }
    let record_length = 1usize << exponent;
    if record_length > record.len() {
        return Err(invalid("record extends past end of data"));
    }
    if sample_count > 0 && (data_offset < FIXED_HEADER_SIZE || data_offset > record_length) {
        return Err(invalid("data offset out of range"));
    }

    Ok(RecordHeader {
        offset,
        sequence: ascii_field(&record[0..6]),
        quality,
        network: ascii_field(&record[18..20]),
        station: ascii_field(&record[8..13]),
        location: ascii_field(&record[13..15]),
        channel: ascii_field(&record[15..18]),
        start_nanos,
        sample_count,
        sampling_rate,
        encoding,
        byte_order: order,
        word_order: if word_order == 0 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        },
        record_length,
        data_offset,
    })
}

fn decode_samples(header: &RecordHeader, encoding: Encoding, record: &[u8]) -> Result<Samples> {
    let data = &record[header.data_offset..header.record_length];
    let n = header.sample_count;
    let order = header.word_order;

    if let Some(width) = encoding.sample_width() {
        if data.len() < n * width {
            return Err(SdsError::CorruptedData(format!(
                "record {} holds {} bytes, {} samples need {}",
                header.sequence,
                data.len(),
                n,
                n * width
            )));
        }
    }

    let samples = match encoding {
        Encoding::Int16 => Samples::Int(
            (0..n)
                .map(|i| u16_at(data, i * 2, order) as i16 as i32)
                .collect(),
        ),
        Encoding::Int32 => Samples::Int(
            (0..n)
                .map(|i| u32_at(data, i * 4, order) as i32)
                .collect(),
        ),
        Encoding::Float32 => Samples::Float(
            (0..n)
                .map(|i| f32::from_bits(u32_at(data, i * 4, order)))
                .collect(),
        ),
        Encoding::Float64 => Samples::Double(
            (0..n)
                .map(|i| f64_at(data, i * 8, order))
                .collect(),
        ),
        Encoding::Steim1 => Samples::Int(steim::decode(SteimLevel::One, data, n, order)?),
        Encoding::Steim2 => Samples::Int(steim::decode(SteimLevel::Two, data, n, order)?),
        Encoding::Ascii => return Err(SdsError::UnsupportedEncoding(encoding as u8)),
    };

    if samples.len() != n {
        warn!(
            "Record {} of {} decoded {} samples, header claims {}",
            header.sequence,
            header.id(),
            samples.len(),
            n
        );
    }

    Ok(samples)
}
