//! DMX signal presence tracking
//!
//! Frames arrive whenever the desk (or the Art-Net node) decides to send them;
//! the display keeps ticking regardless. The monitor remembers the latest cue
//! payload and decides, per tick, whether the desk is still in control.

use log::{debug, info};
use std::time::{Duration, Instant};

use crate::payload::{ControlFrame, ControlPayload};

/// Observable outcome of feeding the monitor a frame or a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle -> Receiving
    Started,
    /// Receiving -> Receiving, delay updated
    Continued,
    /// All-zero frame (transport glitch) or unusable address, nothing changed
    Ignored,
    /// Receiving -> Idle after the timeout elapsed
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveState {
    pub is_receiving: bool,
    pub last_frame_at: Instant,
    pub inter_frame_delay: Duration,
}

#[derive(Debug)]
pub struct SignalMonitor {
    state: ReceiveState,
    payload: Option<ControlPayload>,
}

impl SignalMonitor {
    pub fn new(now: Instant) -> Self {
        SignalMonitor {
            state: ReceiveState {
                is_receiving: false,
                last_frame_at: now,
                inter_frame_delay: Duration::ZERO,
            },
            payload: None,
        }
    }

    pub fn on_frame(&mut self, frame: &ControlFrame, address: usize, now: Instant) -> Transition {
        if frame.iter().all(|&level| level == 0) {
            debug!("Dropped all-zero DMX frame");
            return Transition::Ignored;
        }

        let payload = match ControlPayload::from_frame(frame, address) {
            Some(p) => p,
            None => return Transition::Ignored,
        };

        let transition = if self.state.is_receiving {
            self.state.inter_frame_delay = now.saturating_duration_since(self.state.last_frame_at);
            Transition::Continued
        } else {
            info!("Started receiving DMX...");
            self.state.is_receiving = true;
            self.state.inter_frame_delay = Duration::ZERO;
            Transition::Started
        };

        self.payload = Some(payload);
        self.state.last_frame_at = now;
        transition
    }

    /// Drop back to idle once no frame has arrived for longer than `timeout`.
    pub fn tick(&mut self, now: Instant, timeout: Duration) -> Option<Transition> {
        if self.state.is_receiving && now.saturating_duration_since(self.state.last_frame_at) > timeout {
            info!("DMX Stream stopped...");
            self.state.is_receiving = false;
            return Some(Transition::Stopped);
        }
        None
    }

    pub fn state(&self) -> ReceiveState {
        self.state
    }

    pub fn is_receiving(&self) -> bool {
        self.state.is_receiving
    }

    /// Latest cue payload, only while the desk is in control.
    pub fn payload(&self) -> Option<&ControlPayload> {
        if self.state.is_receiving {
            self.payload.as_ref()
        } else {
            None
        }
    }

    /// Frame rate implied by the last inter-frame delay, `None` when unknown.
    pub fn dmx_fps(&self) -> Option<f64> {
        if !self.state.is_receiving {
            return None;
        }
        rate_per_second(self.state.inter_frame_delay).map(|fps| (fps * 10.0).round() / 10.0)
    }
}

/// Events per second for a given period; zero periods have no defined rate.
pub fn rate_per_second(period: Duration) -> Option<f64> {
    if period.is_zero() {
        None
    } else {
        Some(1.0 / period.as_secs_f64())
    }
}
