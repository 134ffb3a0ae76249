//! Cue-driven time simulation
//!
//! While the desk is in control, the 16-bit progress channel walks through five
//! scripted checkpoints. Between checkpoints the displayed time is blended
//! linearly; at a checkpoint it snaps to the scripted value. Some phases keep
//! the second hand on real time so the clock still looks alive while the
//! hour/minute hands move.
//!
//! The threshold 2 -> 3 phase is the awkward one: the second hand has to leave
//! real time and land exactly on `time_3`'s second. Blending two
//! second-of-minute values directly runs backwards whenever the blend crosses
//! zero, so the second hand is instead driven from an anchor captured at
//! threshold 2 and advanced by a whole number of revolutions.

use chrono::{NaiveTime, TimeDelta, Timelike};
use log::debug;

use crate::payload::ControlPayload;
use crate::signal::SignalMonitor;

/// Which row of the cue schedule produced the current simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RealTime,
    FadeToFirst,
    First,
    FirstToSecond,
    Second,
    SecondToThird,
    Third,
    ThirdToFourth,
    Fourth,
    FourthToFifth,
    Fifth,
    Frozen,
}

/// Second-hand reference captured when progress sits exactly on threshold 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseAnchor {
    pub time: NaiveTime,
    /// Anchor second folded into -29..=30.
    pub second_offset: i32,
}

impl Default for PhaseAnchor {
    fn default() -> Self {
        PhaseAnchor {
            time: NaiveTime::MIN,
            second_offset: 0,
        }
    }
}

impl PhaseAnchor {
    fn capture(time: NaiveTime) -> Self {
        PhaseAnchor {
            time,
            second_offset: fold_second(time.second()),
        }
    }
}

#[derive(Debug, Default)]
pub struct TimeSimulator {
    anchor: PhaseAnchor,
    last: Option<NaiveTime>,
    phase: Option<Phase>,
}

impl TimeSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated time for this tick. Always defined: without a signal, or
    /// before anything was simulated, real time is shown.
    pub fn compute(&mut self, now: NaiveTime, signal: &SignalMonitor) -> NaiveTime {
        let (phase, time) = match signal.payload() {
            Some(payload) => self.evaluate(now, payload),
            None => (Phase::RealTime, now),
        };

        if self.phase != Some(phase) {
            debug!("Cue phase: {:?} -> {:?}", self.phase, phase);
            self.phase = Some(phase);
        }

        self.last = Some(time);
        time
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn anchor(&self) -> PhaseAnchor {
        self.anchor
    }

    fn evaluate(&mut self, now: NaiveTime, payload: &ControlPayload) -> (Phase, NaiveTime) {
        let progress = payload.progress;
        let [c1, c2, c3, c4, c5] = payload.checkpoints;
        let real_second = now.second();

        if progress == 0.0 {
            (Phase::RealTime, now)
        } else if progress < c1.threshold {
            let start = now.with_nanosecond(0).unwrap_or(now);
            let time = blend(start, c1.time, fraction(progress, 0.0, c1.threshold));
            (Phase::FadeToFirst, with_second(time, real_second))
        } else if progress == c1.threshold {
            (Phase::First, with_second(c1.time, real_second))
        } else if progress < c2.threshold {
            let time = blend(c1.time, c2.time, fraction(progress, c1.threshold, c2.threshold));
            (Phase::FirstToSecond, with_second(time, real_second))
        } else if progress == c2.threshold {
            let time = with_second(c2.time, real_second);
            self.anchor = PhaseAnchor::capture(time);
            (Phase::Second, time)
        } else if progress < c3.threshold {
            let time = blend(c2.time, c3.time, fraction(progress, c2.threshold, c3.threshold));
            let second = self.wrap_safe_second(
                progress - c2.threshold,
                c3.threshold - c2.threshold,
                c3.time.second(),
            );
            (Phase::SecondToThird, with_second(time, second))
        } else if progress == c3.threshold {
            (Phase::Third, c3.time)
        } else if progress < c4.threshold {
            let time = blend(c3.time, c4.time, fraction(progress, c3.threshold, c4.threshold));
            (Phase::ThirdToFourth, time)
        } else if progress == c4.threshold {
            (Phase::Fourth, c4.time)
        } else if progress < c5.threshold {
            let time = blend(c4.time, c5.time, fraction(progress, c4.threshold, c5.threshold));
            (Phase::FourthToFifth, with_second(time, real_second))
        } else if progress == c5.threshold {
            (Phase::Fifth, with_second(c5.time, real_second))
        } else {
            (Phase::Frozen, self.last.unwrap_or(now))
        }
    }

    /// Second hand for the threshold 2 -> 3 phase. Starts at the anchor,
    /// turns through the number of whole minutes closest to the phase length
    /// and ends on `target`.
    fn wrap_safe_second(&self, phase_progress: f64, phase_duration: f64, target: u32) -> u32 {
        if phase_duration <= 0.0 {
            return target;
        }
        let offset = self.anchor.second_offset as f64;
        let revolutions = (phase_duration / 60.0).round_ties_even() * 60.0;
        let raw = offset + (revolutions - offset + target as f64) / phase_duration * phase_progress;
        (raw.rem_euclid(60.0).floor() as u32).min(59)
    }
}

/// Fold a second-of-minute into -29..=30 so seconds past the half minute
/// count as "before the next minute".
pub fn fold_second(second: u32) -> i32 {
    ((second as i32 + 29) % 60) - 29
}

/// Position of `progress` inside `[from, to]`. Empty or inverted intervals
/// jump straight to their end.
fn fraction(progress: f64, from: f64, to: f64) -> f64 {
    let span = to - from;
    if span <= 0.0 {
        1.0
    } else {
        (progress - from) / span
    }
}

/// Linear interpolation of two times of day at microsecond resolution.
fn blend(from: NaiveTime, to: NaiveTime, fraction: f64) -> NaiveTime {
    let delta_us = (to - from).num_microseconds().unwrap_or(0);
    let step_us = (delta_us as f64 * fraction).round_ties_even() as i64;
    from + TimeDelta::microseconds(step_us)
}

fn with_second(time: NaiveTime, second: u32) -> NaiveTime {
    time.with_second(second).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::tests::window;
    use crate::payload::{PAYLOAD_LEN, UNIVERSE_SIZE};
    use std::time::Instant;

    const ADDRESS: usize = 400;

    // progress raw values are x50 of the threshold value
    const SHOW: [(u16, (u32, u32, u32)); 5] = [
        (50, (9, 20, 0)),
        (22500, (11, 0, 0)),
        (36000, (11, 59, 0)),
        (38950, (11, 59, 59)),
        (52500, (13, 0, 0)),
    ];

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn monitor_at(progress_raw: u16, checkpoints: [(u16, (u32, u32, u32)); 5]) -> SignalMonitor {
        let raw: [u8; PAYLOAD_LEN] = window(progress_raw, checkpoints);
        let mut frame = [0u8; UNIVERSE_SIZE];
        frame[ADDRESS - 1..ADDRESS - 1 + PAYLOAD_LEN].copy_from_slice(&raw);
        let now = Instant::now();
        let mut monitor = SignalMonitor::new(now);
        monitor.on_frame(&frame, ADDRESS, now);
        monitor
    }

    fn show_at(progress_raw: u16) -> SignalMonitor {
        monitor_at(progress_raw, SHOW)
    }

    #[test]
    fn test_idle_shows_real_time() {
        let mut sim = TimeSimulator::new();
        let monitor = SignalMonitor::new(Instant::now());
        let now = NaiveTime::from_hms_milli_opt(14, 3, 7, 250).unwrap();

        assert_eq!(sim.compute(now, &monitor), now);
        assert_eq!(sim.phase(), Some(Phase::RealTime));
    }

    #[test]
    fn test_zero_progress_is_passthrough() {
        let mut sim = TimeSimulator::new();
        let monitor = show_at(0);
        let now = NaiveTime::from_hms_micro_opt(20, 45, 13, 123_456).unwrap();

        assert_eq!(sim.compute(now, &monitor), now);
        assert_eq!(sim.phase(), Some(Phase::RealTime));
    }

    #[test]
    fn test_threshold_one_keeps_real_seconds() {
        let mut sim = TimeSimulator::new();
        let monitor = show_at(50);

        assert_eq!(sim.compute(hms(18, 5, 42), &monitor), hms(9, 20, 42));
        assert_eq!(sim.phase(), Some(Phase::First));
    }

    #[test]
    fn test_fade_to_first_halfway() {
        let checkpoints = [
            (100, (10, 0, 0)),
            (200, (11, 0, 0)),
            (300, (11, 59, 0)),
            (400, (11, 59, 59)),
            (500, (13, 0, 0)),
        ];
        let mut sim = TimeSimulator::new();
        let monitor = monitor_at(50, checkpoints);

        // 12:00:00 -> 10:00:00, halfway is 11:00
        let now = NaiveTime::from_hms_milli_opt(12, 0, 17, 800).unwrap();
        let time = sim.compute(now, &monitor);
        assert_eq!((time.hour(), time.minute(), time.second()), (11, 0, 17));
        assert_eq!(sim.phase(), Some(Phase::FadeToFirst));
    }

    #[test]
    fn test_first_to_second_blend() {
        let mut sim = TimeSimulator::new();
        // progress 225.5 is halfway between 1.0 and 450.0
        let monitor = show_at(11275);

        let time = sim.compute(hms(18, 0, 7), &monitor);
        // 09:20 -> 11:00 halfway is 10:10
        assert_eq!((time.hour(), time.minute(), time.second()), (10, 10, 7));
        assert_eq!(sim.phase(), Some(Phase::FirstToSecond));
    }

    #[test]
    fn test_threshold_two_captures_anchor() {
        let mut sim = TimeSimulator::new();
        let monitor = show_at(22500);

        assert_eq!(sim.compute(hms(18, 0, 0), &monitor), hms(11, 0, 0));
        assert_eq!(sim.anchor().second_offset, 0);
        assert_eq!(sim.anchor().time, hms(11, 0, 0));

        assert_eq!(sim.compute(hms(18, 0, 45), &monitor), hms(11, 0, 45));
        assert_eq!(sim.anchor().second_offset, -15);

        sim.compute(hms(18, 0, 30), &monitor);
        assert_eq!(sim.anchor().second_offset, 30);
    }

    #[test]
    fn test_fold_second_range() {
        assert_eq!(fold_second(0), 0);
        assert_eq!(fold_second(29), 29);
        assert_eq!(fold_second(30), 30);
        assert_eq!(fold_second(31), -29);
        assert_eq!(fold_second(59), -1);
    }

    #[test]
    fn test_exact_checkpoints() {
        let now = hms(18, 30, 21);

        let mut sim = TimeSimulator::new();
        assert_eq!(sim.compute(now, &show_at(36000)), hms(11, 59, 0));
        assert_eq!(sim.phase(), Some(Phase::Third));

        assert_eq!(sim.compute(now, &show_at(38950)), hms(11, 59, 59));
        assert_eq!(sim.phase(), Some(Phase::Fourth));

        assert_eq!(sim.compute(now, &show_at(52500)), hms(13, 0, 21));
        assert_eq!(sim.phase(), Some(Phase::Fifth));
    }

    #[test]
    fn test_third_to_fourth_blends_seconds() {
        let mut sim = TimeSimulator::new();
        // 720 -> 779, progress 749.5 is halfway: 11:59:00 -> 11:59:59 gives 11:59:29.5
        let monitor = show_at(37475);

        let time = sim.compute(hms(18, 0, 3), &monitor);
        assert_eq!((time.hour(), time.minute(), time.second()), (11, 59, 29));
        assert_eq!(time.nanosecond(), 500_000_000);
    }

    #[test]
    fn test_fourth_to_fifth_keeps_real_seconds() {
        let mut sim = TimeSimulator::new();
        // 779 -> 1050 at 914.5: 11:59:59 + 30:00.5
        let monitor = show_at(45725);

        let time = sim.compute(hms(18, 0, 3), &monitor);
        assert_eq!((time.hour(), time.minute(), time.second()), (12, 29, 3));
        assert_eq!(sim.phase(), Some(Phase::FourthToFifth));
    }

    #[test]
    fn test_wrap_safe_seconds_start_and_end() {
        let mut sim = TimeSimulator::new();
        sim.compute(hms(18, 0, 45), &show_at(22500));
        assert_eq!(sim.anchor().second_offset, -15);

        // One step into the phase: still on the anchor second
        let time = sim.compute(hms(18, 0, 46), &show_at(22501));
        assert_eq!(time.second(), 45);

        // Just before threshold 3 the hand lands on time_3's second
        let time = sim.compute(hms(18, 0, 47), &show_at(35999));
        assert_eq!(time.second(), 59);
        assert_eq!(sim.compute(hms(18, 0, 47), &show_at(36000)).second(), 0);
    }

    #[test]
    fn test_wrap_safe_seconds_never_run_backwards() {
        for anchor_second in [0, 14, 29, 30, 31, 45, 59] {
            let mut sim = TimeSimulator::new();
            sim.compute(hms(18, 0, anchor_second), &show_at(22500));

            let mut elapsed = 0u32;
            let mut previous = anchor_second;
            for raw in (22501..36000u16).step_by(7) {
                let second = sim.compute(hms(18, 0, 0), &show_at(raw)).second();
                let step = (second + 60 - previous) % 60;
                assert!(step <= 2, "anchor {} jumped {} -> {} at raw {}", anchor_second, previous, second, raw);
                elapsed += step;
                previous = second;
            }
            // Four revolutions over a 270 unit phase
            assert!(elapsed >= 180, "anchor {} only advanced {}s", anchor_second, elapsed);
        }
    }

    #[test]
    fn test_freeze_holds_previous_time() {
        let mut sim = TimeSimulator::new();
        let held = sim.compute(hms(18, 0, 12), &show_at(52500));
        assert_eq!(held, hms(13, 0, 12));

        let frozen = show_at(60000);
        assert_eq!(sim.compute(hms(18, 0, 13), &frozen), held);
        assert_eq!(sim.compute(hms(19, 44, 50), &frozen), held);
        assert_eq!(sim.phase(), Some(Phase::Frozen));
    }

    #[test]
    fn test_freeze_without_history_shows_real_time() {
        let mut sim = TimeSimulator::new();
        let now = hms(7, 7, 7);
        assert_eq!(sim.compute(now, &show_at(60000)), now);
    }

    #[test]
    fn test_repeated_compute_is_idempotent() {
        let now = hms(18, 22, 33);
        for raw in [0u16, 25, 50, 9000, 22500, 30000, 36000, 37000, 38950, 40000, 52500] {
            let monitor = show_at(raw);
            let mut sim = TimeSimulator::new();
            let first = sim.compute(now, &monitor);
            let anchor = sim.anchor();
            assert_eq!(sim.compute(now, &monitor), first, "raw {}", raw);
            assert_eq!(sim.anchor(), anchor);
        }
    }

    #[test]
    fn test_unordered_thresholds_do_not_panic() {
        let checkpoints = [
            (500, (9, 0, 0)),
            (100, (10, 0, 0)),
            (100, (11, 0, 0)),
            (0, (12, 0, 0)),
            (300, (13, 0, 0)),
        ];
        let mut sim = TimeSimulator::new();
        let now = hms(18, 0, 5);
        for raw in [1u16, 100, 250, 300, 499, 500, 501, 65535] {
            let _ = sim.compute(now, &monitor_at(raw, checkpoints));
        }
        // 0 < 250 < 500 is the fade into time 1
        assert_eq!(sim.compute(now, &monitor_at(250, checkpoints)).minute(), 30);
    }

    #[test]
    fn test_blend_and_fraction_helpers() {
        assert_eq!(fraction(5.0, 5.0, 5.0), 1.0);
        assert_eq!(fraction(6.0, 4.0, 8.0), 0.5);
        assert_eq!(blend(hms(9, 0, 0), hms(11, 0, 0), 0.25), hms(9, 30, 0));
        assert_eq!(blend(hms(11, 0, 0), hms(9, 0, 0), 0.5), hms(10, 0, 0));
    }
}
