use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const HOURS_ON_DIAL: f64 = 12.0;
const MINUTES_IN_HOUR: f64 = 60.0;
const SECONDS_IN_MINUTE: f64 = 60.0;

/// Rotation of each hand in degrees, as consumed by the dial renderer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HandAngles {
    pub hour: f64,
    pub minute: f64,
    pub second: f64,
}

impl HandAngles {
    /// Hands step per whole minute/second; sub-second fractions are ignored.
    pub fn from_time(time: &NaiveTime) -> Self {
        let hour = time.hour() as f64;
        let minute = time.minute() as f64;
        let second = time.second() as f64;

        HandAngles {
            hour: angle_deg(hour + minute / MINUTES_IN_HOUR, HOURS_ON_DIAL),
            minute: angle_deg(minute, MINUTES_IN_HOUR),
            second: angle_deg(second, SECONDS_IN_MINUTE),
        }
    }
}

/// Angle for `unit` out of `total`, counted clockwise from 12 o'clock and
/// expressed in the renderer's frame where the unrotated hand points at 3.
pub fn angle_deg(unit: f64, total: f64) -> f64 {
    90.0 - (360.0 * unit / total)
}
