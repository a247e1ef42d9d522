// Merging of same-id traces read from one file

use crate::core::constants::NANOS_PER_SECOND;
use crate::core::error::MergeError;
use crate::core::format::Trace;

/// Combines traces sharing a `NET.STA.LOC.CHA` id into one trace each.
///
/// Where two traces overlap, the later trace's samples replace the earlier
/// ones from its first sample on. Gaps are filled by linear interpolation
/// between the samples bounding the gap. Groups keep the order in which
/// their ids first appear.
pub fn merge_traces(traces: &[Trace]) -> Result<Vec<Trace>, MergeError> {
    let mut groups: Vec<(String, Vec<&Trace>)> = Vec::new();
    for trace in traces {
        let id = trace.id();
        match groups.iter_mut().find(|(key, _)| *key == id) {
            Some((_, members)) => members.push(trace),
            None => groups.push((id, vec![trace])),
        }
    }

    groups
        .into_iter()
        .map(|(id, mut members)| {
            members.sort_by_key(|t| t.start_nanos());
            merge_group(&id, &members)
        })
        .collect()
}

fn merge_group(id: &str, members: &[&Trace]) -> Result<Trace, MergeError> {
    let first = members[0];
    let rate = first.stats.sampling_rate;

    for other in &members[1..] {
        if (other.stats.sampling_rate - rate).abs() > rate.abs() * 1e-9 {
            return Err(MergeError::SamplingRateMismatch {
                id: id.to_string(),
                first: rate,
                second: other.stats.sampling_rate,
            });
        }
        if !other.samples.same_kind(&first.samples) {
            return Err(MergeError::SampleTypeMismatch { id: id.to_string() });
        }
    }

    let mut merged = first.clone();
    for next in &members[1..] {
        if next.samples.is_empty() {
            continue;
        }
        if merged.samples.is_empty() {
            merged = (*next).clone();
            continue;
        }

        let delta = NANOS_PER_SECOND as f64 / rate;
        let offset = ((next.start_nanos() - merged.start_nanos()) as f64 / delta)
            .round()
            .max(0.0) as usize;
        let len = merged.npts();

        if offset <= len {
            let next_end = offset + next.npts();
            let tail = (next_end < len).then(|| merged.samples.slice(next_end..len));
            merged.samples.truncate(offset);
            merged.samples.extend_from(&next.samples);
            if let Some(tail) = tail {
                merged.samples.extend_from(&tail);
            }
        } else {
            let gap = offset - len;
            let before = merged.samples.value_f64(len - 1).unwrap_or_default();
            let after = next.samples.value_f64(0).unwrap_or_default();
            for k in 1..=gap {
                let fraction = k as f64 / (gap + 1) as f64;
                merged.samples.push_f64(before + (after - before) * fraction);
            }
            merged.samples.extend_from(&next.samples);
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::{Samples, TraceStats};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 7, 1, 0, 0, 0).unwrap()
    }

    fn trace(channel: &str, offset_s: i64, rate: f64, samples: Samples) -> Trace {
        Trace::new(
            TraceStats {
                network: "5J".to_string(),
                station: "02050".to_string(),
                location: String::new(),
                channel: channel.to_string(),
                start: start() + Duration::seconds(offset_s),
                sampling_rate: rate,
            },
            samples,
        )
    }

    #[test]
    fn test_gap_is_interpolated() {
        let a = trace("HHZ", 0, 1.0, Samples::Int(vec![0, 0, 0, 10]));
        // samples at 4 and 5 missing
        let b = trace("HHZ", 6, 1.0, Samples::Int(vec![40, 41]));
        let merged = merge_traces(&[b, a]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].samples, Samples::Int(vec![0, 0, 0, 10, 20, 30, 40, 41]));
        assert_eq!(merged[0].stats.start, start());
    }

    #[test]
    fn test_overlap_prefers_later_trace() {
        let a = trace("HHZ", 0, 1.0, Samples::Double(vec![1.0, 2.0, 3.0, 4.0]));
        let b = trace("HHZ", 2, 1.0, Samples::Double(vec![30.0, 40.0, 50.0]));
        let merged = merge_traces(&[a, b]).unwrap();
        assert_eq!(
            merged[0].samples,
            Samples::Double(vec![1.0, 2.0, 30.0, 40.0, 50.0])
        );
    }

    #[test]
    fn test_contained_trace_keeps_tail() {
        let a = trace("HHZ", 0, 1.0, Samples::Int(vec![1, 2, 3, 4, 5, 6]));
        let b = trace("HHZ", 2, 1.0, Samples::Int(vec![30, 40]));
        let merged = merge_traces(&[a, b]).unwrap();
        assert_eq!(merged[0].samples, Samples::Int(vec![1, 2, 30, 40, 5, 6]));
    }

    #[test]
    fn test_distinct_ids_stay_apart() {
        let z = trace("HHZ", 0, 1.0, Samples::Int(vec![1]));
        let n = trace("HH1", 0, 1.0, Samples::Int(vec![2]));
        let merged = merge_traces(&[z, n]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].stats.channel, "HHZ");
        assert_eq!(merged[1].stats.channel, "HH1");
    }

    #[test]
    fn test_rate_mismatch_fails() {
        let a = trace("HHZ", 0, 100.0, Samples::Int(vec![1]));
        let b = trace("HHZ", 10, 50.0, Samples::Int(vec![1]));
        assert!(matches!(
            merge_traces(&[a, b]),
            Err(MergeError::SamplingRateMismatch { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_fails() {
        let a = trace("HHZ", 0, 1.0, Samples::Int(vec![1]));
        let b = trace("HHZ", 10, 1.0, Samples::Float(vec![1.0]));
        assert_eq!(
            merge_traces(&[a, b]),
            Err(MergeError::SampleTypeMismatch {
                id: "5J.02050..HHZ".to_string()
            })
        );
    }
}
