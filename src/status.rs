use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::hands::HandAngles;
use crate::payload::level_percent;

/// Display snapshot published for the renderer.
///
/// The dial draws `hands`; the digital readout shows `real_time`, which is
/// always wall-clock time even while the desk drives the hands.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClockStatus {
    /// Wall-clock time, HH:MM:SS
    pub real_time: String,

    /// Time the hands are showing, HH:MM:SS
    pub simulated_time: String,

    pub hands: HandAngles,

    /// Name of the cue phase that produced `simulated_time`
    pub phase: String,

    pub is_receiving: bool,

    /// Delay between the last two DMX frames (milliseconds)
    pub inter_frame_delay_ms: f64,

    /// None while the rate is unknown (first frame, or idle)
    pub dmx_fps: Option<f64>,

    /// Duration of the last display tick (milliseconds)
    pub frame_length_ms: f64,

    pub render_fps: Option<f64>,

    pub address: usize,

    /// First three payload channels (control, progress coarse/fine)
    pub dmx_levels: Vec<u8>,

    /// Unix timestamp of last status update
    pub updated_ts: u64,
}

impl Default for ClockStatus {
    fn default() -> Self {
        ClockStatus {
            real_time: "00:00:00".to_string(),
            simulated_time: "00:00:00".to_string(),
            hands: HandAngles::default(),
            phase: "RealTime".to_string(),
            is_receiving: false,
            inter_frame_delay_ms: 0.0,
            dmx_fps: None,
            frame_length_ms: 0.0,
            render_fps: None,
            address: 0,
            dmx_levels: Vec::new(),
            updated_ts: 0,
        }
    }
}

impl ClockStatus {
    pub fn dmx_rate_text(&self) -> String {
        match self.dmx_fps {
            Some(fps) => format!("DMX: {:.1}fps", fps),
            None => "DMX: ??? fps".to_string(),
        }
    }

    pub fn render_rate_text(&self) -> String {
        match self.render_fps {
            Some(fps) => format!("{:.2}fps", fps),
            None => "???fps".to_string(),
        }
    }

    /// e.g. `DMX Data: 400: 255->100.0%, 0->0.0%, 50->19.6%`
    pub fn dmx_levels_text(&self) -> String {
        let levels: Vec<String> = self
            .dmx_levels
            .iter()
            .map(|&l| format!("{}->{:.1}%", l, level_percent(l)))
            .collect();
        format!("DMX Data: {}: {}", self.address, levels.join(", "))
    }

    /// Write the snapshot as JSON, replacing the file atomically so a reader
    /// never sees a half-written document.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}
