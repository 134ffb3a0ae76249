//! Hand-off between the receive thread and the display loop.
//!
//! The receiver blocks on the socket; the display loop must never block on
//! frame arrival. Frames therefore travel over a channel and the display side
//! drains it once per tick.

use anyhow::{anyhow, Result};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use crate::payload::ControlFrame;
use crate::traits::DmxSource;

pub type FrameMessage = (ControlFrame, Instant);

/// Non-blocking view of frames forwarded by [`forward_frames`].
pub struct ChannelSource {
    rx: Receiver<FrameMessage>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<FrameMessage>) -> Self {
        ChannelSource { rx }
    }
}

impl DmxSource for ChannelSource {
    fn recv_frame(&mut self) -> Result<Option<(ControlFrame, Instant)>> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(anyhow!("DMX receiver has stopped")),
        }
    }
}

/// Pump frames from `source` into `tx` until `running` is cleared or the
/// display side hangs up.
pub fn forward_frames<S: DmxSource>(mut source: S, tx: Sender<FrameMessage>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match source.recv_frame() {
            Ok(Some(msg)) => {
                if tx.send(msg).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("DMX receive failed: {}", e),
        }
    }
    info!("DMX receiver stopped.");
}
