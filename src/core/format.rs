// Data structures for waveform traces and miniSEED records

use crate::core::constants::{ByteOrder, Encoding, NANOS_PER_SECOND};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::Range;

/// Identity and timing of one trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStats {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start: DateTime<Utc>,
    pub sampling_rate: f64,
}

impl TraceStats {
    /// `NET.STA.LOC.CHA`, the key traces are grouped by.
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(v) => v.len(),
            Samples::Float(v) => v.len(),
            Samples::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn same_kind(&self, other: &Samples) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Owned copy of a sub-range.
    pub fn slice(&self, range: Range<usize>) -> Samples {
        match self {
            Samples::Int(v) => Samples::Int(v[range].to_vec()),
            Samples::Float(v) => Samples::Float(v[range].to_vec()),
            Samples::Double(v) => Samples::Double(v[range].to_vec()),
        }
    }

    pub fn truncate(&mut self, len: usize) {
        match self {
            Samples::Int(v) => v.truncate(len),
            Samples::Float(v) => v.truncate(len),
            Samples::Double(v) => v.truncate(len),
        }
    }

    pub fn empty_like(&self) -> Samples {
        match self {
            Samples::Int(_) => Samples::Int(Vec::new()),
            Samples::Float(_) => Samples::Float(Vec::new()),
            Samples::Double(_) => Samples::Double(Vec::new()),
        }
    }

    /// Appends samples of the same kind. Returns false on a kind mismatch.
    pub fn extend_from(&mut self, other: &Samples) -> bool {
        match (self, other) {
            (Samples::Int(a), Samples::Int(b)) => a.extend_from_slice(b),
            (Samples::Float(a), Samples::Float(b)) => a.extend_from_slice(b),
            (Samples::Double(a), Samples::Double(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }

    pub fn value_f64(&self, index: usize) -> Option<f64> {
        match self {
            Samples::Int(v) => v.get(index).map(|x| *x as f64),
            Samples::Float(v) => v.get(index).map(|x| *x as f64),
            Samples::Double(v) => v.get(index).copied(),
        }
    }

    /// Appends a value converted to the buffer's own type.
    pub fn push_f64(&mut self, value: f64) {
        match self {
            Samples::Int(v) => v.push(value.round() as i32),
            Samples::Float(v) => v.push(value as f32),
            Samples::Double(v) => v.push(value),
        }
    }
}

/// Container layout the trace was read from; reused when writing it back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MseedAttributes {
    pub encoding: Encoding,
    pub record_length: usize,
    pub quality: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub stats: TraceStats,
    pub samples: Samples,
    pub mseed: Option<MseedAttributes>,
}

impl Trace {
    pub fn new(stats: TraceStats, samples: Samples) -> Self {
        Self {
            stats,
            samples,
            mseed: None,
        }
    }

    pub fn id(&self) -> String {
        self.stats.id()
    }

    pub fn npts(&self) -> usize {
        self.samples.len()
    }

    pub fn start_nanos(&self) -> i64 {
        to_nanos(&self.stats.start)
    }

    /// Offset of sample `index` from the trace start, rounded to the nanosecond.
    pub fn offset_nanos(&self, index: usize) -> i64 {
        if self.stats.sampling_rate <= 0.0 {
            return 0;
        }
        (index as f64 * NANOS_PER_SECOND as f64 / self.stats.sampling_rate).round() as i64
    }

    pub fn sample_time_nanos(&self, index: usize) -> i64 {
        self.start_nanos() + self.offset_nanos(index)
    }

    /// Timestamp of the last sample: `start + (n - 1) / rate`.
    pub fn end_nanos(&self) -> i64 {
        match self.npts() {
            0 => self.start_nanos(),
            n => self.sample_time_nanos(n - 1),
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        from_nanos(self.end_nanos())
    }

    /// Index of the first sample whose timestamp is `>= t`, or `npts()` if none.
    pub fn first_index_at_or_after(&self, t: i64) -> usize {
        let n = self.npts();
        let start = self.start_nanos();
        if n == 0 || t <= start {
            return 0;
        }
        let estimate = ((t - start) as f64 * self.stats.sampling_rate
            / NANOS_PER_SECOND as f64)
            .ceil();
        let mut index = (estimate.max(0.0) as usize).min(n);
        while index > 0 && self.sample_time_nanos(index - 1) >= t {
            index -= 1;
        }
        while index < n && self.sample_time_nanos(index) < t {
            index += 1;
        }
        index
    }

    /// Index of the last sample whose timestamp is `<= t`.
    pub fn last_index_at_or_before(&self, t: i64) -> Option<usize> {
        let n = self.npts();
        let start = self.start_nanos();
        if n == 0 || t < start {
            return None;
        }
        let estimate = ((t - start) as f64 * self.stats.sampling_rate
            / NANOS_PER_SECOND as f64)
            .floor();
        let mut index = (estimate.max(0.0) as usize).min(n - 1);
        while index + 1 < n && self.sample_time_nanos(index + 1) <= t {
            index += 1;
        }
        while index > 0 && self.sample_time_nanos(index) > t {
            index -= 1;
        }
        (self.sample_time_nanos(index) <= t).then_some(index)
    }

    /// Owned copy of the samples whose timestamps lie in `[start, end]`.
    ///
    /// The copy starts at the first retained sample. When nothing falls
    /// inside the window the result has zero samples and starts at `start`.
    pub fn slice(&self, start: i64, end: i64) -> Trace {
        let first = self.first_index_at_or_after(start);
        let last = self.last_index_at_or_before(end);

        let mut stats = self.stats.clone();
        let samples = match last {
            Some(last) if first <= last && first < self.npts() => {
                stats.start = from_nanos(self.sample_time_nanos(first));
                self.samples.slice(first..last + 1)
            }
            _ => {
                stats.start = from_nanos(start);
                self.samples.empty_like()
            }
        };

        Trace {
            stats,
            samples,
            mseed: self.mseed,
        }
    }
}

/// Parsed fixed header and blockettes of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader {
    pub offset: usize,
    pub sequence: String,
    pub quality: u8,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start_nanos: i64,
    pub sample_count: usize,
    pub sampling_rate: f64,
    pub encoding: u8,
    pub byte_order: ByteOrder,
    pub word_order: ByteOrder,
    pub record_length: usize,
    pub data_offset: usize,
}

impl RecordHeader {
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    /// Time of the first sample after this record, assuming continuity.
    pub fn next_sample_nanos(&self) -> i64 {
        if self.sampling_rate <= 0.0 {
            return self.start_nanos;
        }
        self.start_nanos
            + (self.sample_count as f64 * NANOS_PER_SECOND as f64 / self.sampling_rate).round()
                as i64
    }

    pub fn end_nanos(&self) -> i64 {
        if self.sample_count == 0 || self.sampling_rate <= 0.0 {
            return self.start_nanos;
        }
        self.start_nanos
            + ((self.sample_count - 1) as f64 * NANOS_PER_SECOND as f64 / self.sampling_rate)
                .round() as i64
    }
}

pub fn to_nanos(t: &DateTime<Utc>) -> i64 {
    t.timestamp()
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(t.timestamp_subsec_nanos() as i64)
}

pub fn from_nanos(ns: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(ns)
}
