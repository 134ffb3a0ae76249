//! Cue payload decoding
//!
//! The lighting desk drives the clock through a 28-channel window patched at
//! the configured start address:
//!
//! | Offset | Size | Field                                  |
//! |--------|------|----------------------------------------|
//! | 0      | 1    | control (reserved)                     |
//! | 1      | 2    | progress (16-bit, coarse/fine)         |
//! | 3      | 2    | threshold 1                            |
//! | 5      | 3    | time 1 (hour, minute, second)          |
//! | 8..28  |      | thresholds/times 2..5, same layout     |
//!
//! 16-bit values are `(coarse << 8 | fine) / 50`, time channels are scaled from
//! 0..=255 onto 0..=23 hours and 0..=59 minutes/seconds.

use byteorder::{BigEndian, ByteOrder};
use chrono::NaiveTime;

/// Channels in one DMX512 universe.
pub const UNIVERSE_SIZE: usize = 512;

/// Channels occupied by the cue payload.
pub const PAYLOAD_LEN: usize = 28;

/// Number of threshold/time checkpoints in a payload.
pub const CHECKPOINT_COUNT: usize = 5;

/// Highest 1-based start address that still fits the whole payload.
pub const MAX_ADDRESS: usize = UNIVERSE_SIZE - PAYLOAD_LEN + 1;

const PROGRESS_OFFSET: usize = 1;
const FIRST_CHECKPOINT_OFFSET: usize = 3;
const CHECKPOINT_STRIDE: usize = 5;

/// Divisor turning a raw 16-bit pair into a progress value.
const PROGRESS_SCALE: f64 = 50.0;

/// One complete universe of channel levels.
pub type ControlFrame = [u8; UNIVERSE_SIZE];

/// A scripted time and the progress value at which it is reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub threshold: f64,
    pub time: NaiveTime,
}

/// Decoded cue payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPayload {
    raw: [u8; PAYLOAD_LEN],
    pub control: u8,
    pub progress: f64,
    pub checkpoints: [Checkpoint; CHECKPOINT_COUNT],
}

impl ControlPayload {
    /// Cut the payload window out of a frame. `address` is 1-based and must
    /// not exceed [`MAX_ADDRESS`]; out-of-range addresses yield `None`.
    pub fn from_frame(frame: &ControlFrame, address: usize) -> Option<Self> {
        if address == 0 || address > MAX_ADDRESS {
            return None;
        }
        let start = address - 1;
        let mut raw = [0u8; PAYLOAD_LEN];
        raw.copy_from_slice(&frame[start..start + PAYLOAD_LEN]);
        Some(Self::from_window(raw))
    }

    pub fn from_window(raw: [u8; PAYLOAD_LEN]) -> Self {
        let checkpoints = std::array::from_fn(|i| {
            let offset = FIRST_CHECKPOINT_OFFSET + i * CHECKPOINT_STRIDE;
            Checkpoint {
                threshold: progress_value(&raw[offset..offset + 2]),
                time: scaled_time(&raw[offset + 2..offset + 5]),
            }
        });

        ControlPayload {
            raw,
            control: raw[0],
            progress: progress_value(&raw[PROGRESS_OFFSET..PROGRESS_OFFSET + 2]),
            checkpoints,
        }
    }

    pub fn raw(&self) -> &[u8; PAYLOAD_LEN] {
        &self.raw
    }

    /// Threshold `k` (1-based, as numbered on the desk).
    pub fn threshold(&self, k: usize) -> f64 {
        self.checkpoints[k - 1].threshold
    }

    /// Time `k` (1-based, as numbered on the desk).
    pub fn time(&self, k: usize) -> NaiveTime {
        self.checkpoints[k - 1].time
    }
}

/// Progress value of a big-endian channel pair.
pub fn progress_value(pair: &[u8]) -> f64 {
    BigEndian::read_u16(pair) as f64 / PROGRESS_SCALE
}

/// Scale a 0..=255 level onto 0..=max.
pub fn scale_level(level: u8, max: u32) -> u32 {
    (level as f64 / 255.0 * max as f64).round() as u32
}

fn scaled_time(channels: &[u8]) -> NaiveTime {
    let hour = scale_level(channels[0], 23);
    let minute = scale_level(channels[1], 59);
    let second = scale_level(channels[2], 59);
    // Scaled values are always within range.
    NaiveTime::from_hms_opt(hour, minute, second).unwrap_or(NaiveTime::MIN)
}

/// Level as a percentage of full, rounded to 0.1.
pub fn level_percent(level: u8) -> f64 {
    (level as f64 / 255.0 * 1000.0).round() / 10.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Inverse of [`scale_level`] for building test payloads.
    pub(crate) fn level_for(value: u32, max: u32) -> u8 {
        (0..=255u8)
            .find(|&l| scale_level(l, max) == value)
            .expect("value not representable")
    }

    /// Build a payload window from a progress value and five checkpoints.
    pub(crate) fn window(progress_raw: u16, checkpoints: [(u16, (u32, u32, u32)); 5]) -> [u8; PAYLOAD_LEN] {
        let mut raw = [0u8; PAYLOAD_LEN];
        raw[0] = 0xFF;
        BigEndian::write_u16(&mut raw[1..3], progress_raw);
        for (i, (threshold, (h, m, s))) in checkpoints.iter().enumerate() {
            let offset = FIRST_CHECKPOINT_OFFSET + i * CHECKPOINT_STRIDE;
            BigEndian::write_u16(&mut raw[offset..offset + 2], *threshold);
            raw[offset + 2] = level_for(*h, 23);
            raw[offset + 3] = level_for(*m, 59);
            raw[offset + 4] = level_for(*s, 59);
        }
        raw
    }

    #[test]
    fn test_progress_value_big_endian() {
        assert_eq!(progress_value(&[0, 50]), 1.0);
        assert_eq!(progress_value(&[0x57, 0xE4]), 450.0);
        assert_eq!(progress_value(&[0xFF, 0xFF]), 65535.0 / 50.0);
    }

    #[test]
    fn test_scale_level_endpoints() {
        assert_eq!(scale_level(0, 23), 0);
        assert_eq!(scale_level(255, 23), 23);
        assert_eq!(scale_level(255, 59), 59);
        assert_eq!(scale_level(128, 59), 30);
    }

    #[test]
    fn test_decode_layout() {
        let raw = window(
            50,
            [
                (50, (9, 20, 0)),
                (22500, (11, 0, 0)),
                (36000, (11, 59, 0)),
                (38950, (11, 59, 59)),
                (52500, (13, 0, 0)),
            ],
        );
        let payload = ControlPayload::from_window(raw);

        assert_eq!(payload.control, 0xFF);
        assert_eq!(payload.progress, 1.0);
        assert_eq!(payload.threshold(1), 1.0);
        assert_eq!(payload.threshold(2), 450.0);
        assert_eq!(payload.threshold(3), 720.0);
        assert_eq!(payload.threshold(4), 779.0);
        assert_eq!(payload.threshold(5), 1050.0);
        assert_eq!(payload.time(1), NaiveTime::from_hms_opt(9, 20, 0).unwrap());
        assert_eq!(payload.time(4), NaiveTime::from_hms_opt(11, 59, 59).unwrap());
        assert_eq!(payload.time(5), NaiveTime::from_hms_opt(13, 0, 0).unwrap());
    }

    #[test]
    fn test_from_frame_uses_one_based_address() {
        let mut frame = [0u8; UNIVERSE_SIZE];
        frame[399] = 7; // channel 400
        frame[400] = 0x01;
        frame[401] = 0x02;

        let payload = ControlPayload::from_frame(&frame, 400).unwrap();
        assert_eq!(payload.control, 7);
        assert_eq!(payload.progress, 0x0102 as f64 / 50.0);
        assert_eq!(payload.raw()[0], 7);
    }

    #[test]
    fn test_from_frame_rejects_out_of_range_address() {
        let frame = [1u8; UNIVERSE_SIZE];
        assert!(ControlPayload::from_frame(&frame, 0).is_none());
        assert!(ControlPayload::from_frame(&frame, MAX_ADDRESS + 1).is_none());
        assert!(ControlPayload::from_frame(&frame, MAX_ADDRESS).is_some());
    }

    #[test]
    fn test_level_percent() {
        assert_eq!(level_percent(0), 0.0);
        assert_eq!(level_percent(255), 100.0);
        assert_eq!(level_percent(128), 50.2);
    }
}
