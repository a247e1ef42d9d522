// Steim1 / Steim2 difference compression

use crate::core::constants::{ByteOrder, STEIM_FRAME_SIZE, STEIM_FRAME_WORDS};
use crate::core::error::{Result, SdsError};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteimLevel {
    One,
    Two,
}

/// Output of one encoder pass: whole frames and the number of samples packed.
#[derive(Debug, Clone)]
pub struct SteimBlock {
    pub bytes: Vec<u8>,
    pub frames: usize,
    pub samples: usize,
}

fn read_word(data: &[u8], index: usize, order: ByteOrder) -> u32 {
    let bytes = [
        data[index * 4],
        data[index * 4 + 1],
        data[index * 4 + 2],
        data[index * 4 + 3],
    ];
    match order {
        ByteOrder::Big => u32::from_be_bytes(bytes),
        ByteOrder::Little => u32::from_le_bytes(bytes),
    }
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// Unpacks `count` fields of `bits` width, most significant first.
fn unpack(word: u32, count: u32, bits: u32, out: &mut Vec<i32>) {
    let mask = (1u32 << bits) - 1;
    for j in 0..count {
        let shift = (count - 1 - j) * bits;
        out.push(sign_extend((word >> shift) & mask, bits));
    }
}

fn decode_word(level: SteimLevel, nibble: u32, word: u32, out: &mut Vec<i32>) -> Result<()> {
    match (level, nibble) {
        (_, 0) => {}
        (_, 1) => unpack(word, 4, 8, out),
        (SteimLevel::One, 2) => unpack(word, 2, 16, out),
        (SteimLevel::One, _) => out.push(word as i32),
        (SteimLevel::Two, 2) => match word >> 30 {
            1 => unpack(word, 1, 30, out),
            2 => unpack(word, 2, 15, out),
            3 => unpack(word, 3, 10, out),
            dnib => {
                return Err(SdsError::CorruptedData(format!(
                    "Invalid Steim2 dnib {} for nibble 2",
                    dnib
                )))
            }
        },
        (SteimLevel::Two, _) => match word >> 30 {
            0 => unpack(word, 5, 6, out),
            1 => unpack(word, 6, 5, out),
            2 => unpack(word, 7, 4, out),
            dnib => {
                return Err(SdsError::CorruptedData(format!(
                    "Invalid Steim2 dnib {} for nibble 3",
                    dnib
                )))
            }
        },
    }
    Ok(())
}

/// Decodes `count` samples from Steim frames.
pub fn decode(level: SteimLevel, data: &[u8], count: usize, order: ByteOrder) -> Result<Vec<i32>> {
    let frames = data.len() / STEIM_FRAME_SIZE;
    let mut diffs: Vec<i32> = Vec::with_capacity(count + 8);
    let mut first = 0i32;
    let mut last = 0i32;

    for frame in 0..frames {
        let base = frame * STEIM_FRAME_WORDS;
        let control = read_word(data, base, order);

        for w in 1..STEIM_FRAME_WORDS {
            let word = read_word(data, base + w, order);
            if frame == 0 && w == 1 {
                first = word as i32;
                continue;
            }
            if frame == 0 && w == 2 {
                last = word as i32;
                continue;
            }
            let nibble = (control >> (30 - 2 * w as u32)) & 0x3;
            decode_word(level, nibble, word, &mut diffs)?;
        }

        if diffs.len() >= count {
            break;
        }
    }

    if count == 0 {
        return Ok(Vec::new());
    }
    if diffs.len() < count {
        return Err(SdsError::CorruptedData(format!(
            "Steim frames hold {} differences, header claims {} samples",
            diffs.len(),
            count
        )));
    }

    // The first difference refers to the previous record and is ignored.
    let mut samples = Vec::with_capacity(count);
    samples.push(first);
    for diff in &diffs[1..count] {
        let prev = samples[samples.len() - 1];
        samples.push(prev.wrapping_add(*diff));
    }

    if samples[count - 1] != last {
        warn!(
            "Steim reverse integration constant mismatch: expected {}, got {}",
            last,
            samples[count - 1]
        );
    }

    Ok(samples)
}

fn fits(values: &[i64], bits: u32) -> bool {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    values.iter().all(|v| *v >= min && *v <= max)
}

fn pack(values: &[i64], bits: u32) -> u32 {
    let mask = (1u64 << bits) - 1;
    let count = values.len() as u32;
    values.iter().enumerate().fold(0u32, |word, (j, v)| {
        let shift = (count - 1 - j as u32) * bits;
        word | ((((*v as u64) & mask) as u32) << shift)
    })
}

/// Picks the densest packing for the differences at the head of `diffs`.
/// Returns (nibble, word, differences consumed).
fn pack_word(level: SteimLevel, diffs: &[i64]) -> Result<(u32, u32, usize)> {
    match level {
        SteimLevel::One => {
            if diffs.len() >= 4 && fits(&diffs[..4], 8) {
                Ok((1, pack(&diffs[..4], 8), 4))
            } else if diffs.len() >= 2 && fits(&diffs[..2], 16) {
                Ok((2, pack(&diffs[..2], 16), 2))
            } else {
                Ok((3, diffs[0] as i32 as u32, 1))
            }
        }
        SteimLevel::Two => {
            // (count, bits, nibble, dnib)
            const LAYOUTS: [(usize, u32, u32, u32); 7] = [
                (7, 4, 3, 2),
                (6, 5, 3, 1),
                (5, 6, 3, 0),
                (4, 8, 1, 0),
                (3, 10, 2, 3),
                (2, 15, 2, 2),
                (1, 30, 2, 1),
            ];
            for (count, bits, nibble, dnib) in LAYOUTS {
                if diffs.len() >= count && fits(&diffs[..count], bits) {
                    let word = pack(&diffs[..count], bits);
                    let word = if nibble == 1 { word } else { (dnib << 30) | word };
                    return Ok((nibble, word, count));
                }
            }
            Err(SdsError::SteimOverflow(diffs[0]))
        }
    }
}

/// Packs as many leading samples as fit into at most `max_frames` frames.
pub fn encode(level: SteimLevel, samples: &[i32], max_frames: usize) -> Result<SteimBlock> {
    if samples.is_empty() || max_frames == 0 {
        return Ok(SteimBlock {
            bytes: Vec::new(),
            frames: 0,
            samples: 0,
        });
    }

    let mut diffs: Vec<i64> = Vec::with_capacity(samples.len());
    diffs.push(0);
    for pair in samples.windows(2) {
        let diff = match level {
            SteimLevel::One => pair[1].wrapping_sub(pair[0]) as i64,
            SteimLevel::Two => pair[1] as i64 - pair[0] as i64,
        };
        diffs.push(diff);
    }

    let mut frames: Vec<[u32; STEIM_FRAME_WORDS]> = Vec::new();
    let mut pos = 0usize;

    while frames.len() < max_frames && pos < diffs.len() {
        let mut frame = [0u32; STEIM_FRAME_WORDS];
        let mut control = 0u32;
        let first_word = if frames.is_empty() { 3 } else { 1 };

        for (w, slot) in frame.iter_mut().enumerate().skip(first_word) {
            if pos >= diffs.len() {
                break;
            }
            let (nibble, word, used) = pack_word(level, &diffs[pos..])?;
            *slot = word;
            control |= nibble << (30 - 2 * w as u32);
            pos += used;
        }

        frame[0] = control;
        frames.push(frame);
    }

    frames[0][1] = samples[0] as u32;
    frames[0][2] = samples[pos - 1] as u32;

    let bytes = frames
        .iter()
        .flat_map(|frame| frame.iter().flat_map(|word| word.to_be_bytes()))
        .collect();

    Ok(SteimBlock {
        bytes,
        frames: frames.len(),
        samples: pos,
    })
}
