//! Clock Controller - the single consumer driving the display
//!
//! Each display tick:
//! 1. Drains every frame the DMX source has pending into the signal monitor
//! 2. Runs the signal timeout check
//! 3. Simulates the time to show and derives the hand angles
//! 4. Publishes a [`ClockStatus`] snapshot for the renderer
//!
//! Frame arrival and ticking are independent: a tick never waits for a frame.

use chrono::NaiveTime;
use log::{debug, info, warn};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};

use crate::config::ClockConfig;
use crate::hands::HandAngles;
use crate::payload::ControlFrame;
use crate::signal::{rate_per_second, SignalMonitor, Transition};
use crate::simulator::{Phase, TimeSimulator};
use crate::status::ClockStatus;
use crate::traits::DmxSource;

/// Upper bound on frames consumed per tick, so a flooded source cannot stall the display.
const MAX_FRAMES_PER_TICK: usize = 256;

/// Levels shown in the status readout.
const READOUT_LEVELS: usize = 3;

/// Everything the renderer needs for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockOutput {
    pub simulated: NaiveTime,
    pub hands: HandAngles,
    pub is_receiving: bool,
    pub inter_frame_delay: Duration,
}

pub struct ClockController<N>
where
    N: DmxSource,
{
    network: N,
    config: ClockConfig,

    monitor: SignalMonitor,
    simulator: TimeSimulator,

    // Render timing
    last_tick: Option<Instant>,
    frame_length: Duration,

    last_output: Option<ClockOutput>,
    last_source_error: Option<String>,

    // Shared status for the renderer
    status_shared: Arc<RwLock<ClockStatus>>,
}

impl<N> ClockController<N>
where
    N: DmxSource,
{
    pub fn new(network: N, status_shared: Arc<RwLock<ClockStatus>>, config: ClockConfig, now: Instant) -> Self {
        info!("=== Clock Controller Initialization ===");
        info!(
            "DMX: universe={}, address={}, timeout={:?}",
            config.dmx.universe,
            config.dmx.address,
            config.dmx.timeout()
        );
        info!("Display: {} Hz", config.display.tick_hz);

        ClockController {
            network,
            config,
            monitor: SignalMonitor::new(now),
            simulator: TimeSimulator::new(),
            last_tick: None,
            frame_length: Duration::ZERO,
            last_output: None,
            last_source_error: None,
            status_shared,
        }
    }

    // ========================================================================
    // PUBLIC API
    // ========================================================================

    pub fn get_status_shared(&self) -> Arc<RwLock<ClockStatus>> {
        self.status_shared.clone()
    }

    pub fn monitor(&self) -> &SignalMonitor {
        &self.monitor
    }

    pub fn phase(&self) -> Option<Phase> {
        self.simulator.phase()
    }

    pub fn on_frame(&mut self, frame: &ControlFrame, at: Instant) -> Transition {
        self.monitor.on_frame(frame, self.config.dmx.address, at)
    }

    /// One display tick. `now` drives timeouts and render timing, `wall` is the
    /// local time of day shown when the desk is not in control.
    pub fn process_loop_iteration(&mut self, now: Instant, wall: NaiveTime) -> ClockOutput {
        self.drain_frames();

        self.monitor.tick(now, self.config.dmx.timeout());

        if let Some(prev) = self.last_tick {
            self.frame_length = now.saturating_duration_since(prev);
        }
        self.last_tick = Some(now);

        let simulated = self.simulator.compute(wall, &self.monitor);
        let state = self.monitor.state();
        let output = ClockOutput {
            simulated,
            hands: HandAngles::from_time(&simulated),
            is_receiving: state.is_receiving,
            inter_frame_delay: state.inter_frame_delay,
        };

        self.last_output = Some(output);
        self.update_shared_status(wall);
        output
    }

    pub fn log_status(&self) {
        let status = match self.status_shared.read() {
            Ok(s) => s.clone(),
            Err(_) => return,
        };

        if status.is_receiving {
            info!(
                "[CLOCK] {} (real {})  {}  {}  phase:{}",
                status.simulated_time,
                status.real_time,
                status.dmx_rate_text(),
                status.dmx_levels_text(),
                status.phase
            );
        } else {
            info!(
                "[CLOCK] {}  no DMX  render:{}",
                status.real_time,
                status.render_rate_text()
            );
        }
    }

    // ========================================================================
    // FRAME INGESTION
    // ========================================================================

    fn drain_frames(&mut self) {
        for _ in 0..MAX_FRAMES_PER_TICK {
            match self.network.recv_frame() {
                Ok(Some((frame, at))) => {
                    self.last_source_error = None;
                    self.on_frame(&frame, at);
                }
                Ok(None) => return,
                Err(e) => {
                    let msg = e.to_string();
                    if self.last_source_error.as_deref() != Some(msg.as_str()) {
                        warn!("DMX source error: {}", msg);
                        self.last_source_error = Some(msg);
                    }
                    return;
                }
            }
        }
        debug!("Frame backlog exceeds {} per tick", MAX_FRAMES_PER_TICK);
    }

    // ========================================================================
    // UTILITY METHODS
    // ========================================================================

    fn update_shared_status(&self, wall: NaiveTime) {
        let output = match self.last_output {
            Some(o) => o,
            None => return,
        };

        if let Ok(mut status) = self.status_shared.write() {
            status.real_time = wall.format("%H:%M:%S").to_string();
            status.simulated_time = output.simulated.format("%H:%M:%S").to_string();
            status.hands = output.hands;
            status.phase = self
                .simulator
                .phase()
                .map(|p| format!("{:?}", p))
                .unwrap_or_else(|| "RealTime".to_string());
            status.is_receiving = output.is_receiving;
            status.inter_frame_delay_ms = output.inter_frame_delay.as_secs_f64() * 1000.0;
            status.dmx_fps = self.monitor.dmx_fps();
            status.frame_length_ms = self.frame_length.as_secs_f64() * 1000.0;
            status.render_fps = rate_per_second(self.frame_length);
            status.address = self.config.dmx.address;
            status.dmx_levels = self
                .monitor
                .payload()
                .map(|p| p.raw()[..READOUT_LEVELS].to_vec())
                .unwrap_or_default();
            status.updated_ts = SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
