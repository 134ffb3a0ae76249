use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::net::ARTNET_PORT;
use crate::payload::MAX_ADDRESS;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub dmx: DmxConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmxConfig {
    pub universe: u16,
    pub address: usize,             // 1-based start channel of the cue payload
    pub timeout_ms: u64,            // Signal considered lost after this long without a frame
    pub bind: Ipv4Addr,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub tick_hz: u32,
    pub status_interval_secs: u64,
    pub status_file: Option<PathBuf>, // JSON snapshot for an external renderer
}

impl Default for DmxConfig {
    fn default() -> Self {
        DmxConfig {
            universe: 3,
            address: 400,
            timeout_ms: 1_000,
            bind: Ipv4Addr::UNSPECIFIED,
            port: ARTNET_PORT,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            tick_hz: 60,
            status_interval_secs: 10,
            status_file: None,
        }
    }
}

impl DmxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DisplayConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz.max(1) as f64)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}

impl ClockConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: ClockConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dmx.address == 0 || self.dmx.address > MAX_ADDRESS {
            return Err(anyhow!(
                "DMX address {} out of range (1..={} so the 28-channel payload fits)",
                self.dmx.address,
                MAX_ADDRESS
            ));
        }
        if self.dmx.universe > 0x7FFF {
            return Err(anyhow!("Art-Net universe {} exceeds 15-bit port address", self.dmx.universe));
        }
        if self.display.tick_hz == 0 {
            return Err(anyhow!("Tick rate must be at least 1 Hz"));
        }
        Ok(())
    }
}
