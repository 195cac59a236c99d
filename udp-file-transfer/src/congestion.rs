//! AIMD congestion control for the sending side.
//!
//! [`CongestionController`] owns `cwnd` and `ssthresh` (both in bytes):
//!
//! - **Slow start** (`cwnd < ssthresh`): every new acknowledgment grows the
//!   window by one segment.
//! - **Congestion avoidance** (`cwnd >= ssthresh`): every new acknowledgment
//!   grows it by `SEGMENT_SIZE² / cwnd`, floored.  The floor is what slows
//!   growth down as the window gets large.
//! - **Timeout**: `ssthresh` halves to `cwnd / 2` and `cwnd` collapses to a
//!   single segment.
//!
//! `cwnd` never exceeds [`MAX_CWND_BYTES`].  Duplicate acknowledgments must be
//! filtered out by the caller before [`CongestionController::on_ack`].

use crate::packet::MAX_PAYLOAD_LEN;

/// Size of one full segment; the unit of window growth.
pub const SEGMENT_SIZE: u32 = MAX_PAYLOAD_LEN as u32;

/// Upper bound on the congestion window.
pub const MAX_CWND_BYTES: u32 = 51_200;

/// Slow-start threshold before the first loss.
pub const INITIAL_SSTHRESH: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CongestionController {
    cwnd: u32,
    ssthresh: u32,
}

impl Default for CongestionController {
    fn default() -> Self {
        Self::new()
    }
}

impl CongestionController {
    pub fn new() -> Self {
        Self {
            cwnd: SEGMENT_SIZE,
            ssthresh: INITIAL_SSTHRESH,
        }
    }

    /// Controller in an arbitrary state.  `cwnd` is clamped into
    /// `SEGMENT_SIZE..=MAX_CWND_BYTES`.
    pub fn with_state(cwnd: u32, ssthresh: u32) -> Self {
        Self {
            cwnd: cwnd.clamp(SEGMENT_SIZE, MAX_CWND_BYTES),
            ssthresh,
        }
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }

    /// Apply one new acknowledgment and return how many bytes the window grew.
    pub fn on_ack(&mut self) -> u32 {
        let grown = if self.in_slow_start() {
            self.cwnd + SEGMENT_SIZE
        } else {
            self.cwnd + SEGMENT_SIZE * SEGMENT_SIZE / self.cwnd
        };
        let next = grown.min(MAX_CWND_BYTES);
        let delta = next - self.cwnd;
        self.cwnd = next;
        delta
    }

    /// Multiplicative decrease after a retransmission timeout.
    pub fn on_timeout(&mut self) {
        self.ssthresh = self.cwnd / 2;
        self.cwnd = SEGMENT_SIZE;
    }
}
