use anyhow::Result;
use std::time::Instant;

use crate::payload::ControlFrame;

#[cfg_attr(test, mockall::automock)]
pub trait DmxSource {
    /// Receive a frame for the subscribed universe. Returns Ok(Some((frame, arrival)))
    /// if one arrived, Ok(None) if nothing is pending (timeout/wouldblock).
    fn recv_frame(&mut self) -> Result<Option<(ControlFrame, Instant)>>;
}
