//! Retransmission and inactivity timer management.
//!
//! Both endpoints are driven by a single cooperative loop, so timers are not
//! tasks: they are stopwatches that record a start instant and are polled
//! once per loop iteration.  This module provides:
//! - [`TimerConfig`]: every protocol timeout in one place.
//! - [`Stopwatch`]: a restartable start instant with an expiry check.
//! - [`TimerSet`]: the named stopwatches one endpoint owns (connection,
//!   SYN retry, FIN retry, FIN end grace).  Per-segment retransmit timers
//!   live on the segments themselves (see [`crate::sender::Segment`]).
//!
//! All instants come from `tokio::time`, so tests may pause the clock and let
//! the runtime auto-advance it.

use std::time::Duration;

use tokio::time::Instant;

/// Adjustable timeout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Inactivity limit after which a connection is closed without a FIN
    /// exchange.  Also bounds the client's handshake and teardown.
    pub connection_timeout: Duration,
    /// Retransmission timeout for SYN, FIN and data segments.
    pub retransmission_timeout: Duration,
    /// Grace period the client stays responsive after its FIN is answered,
    /// re-acknowledging retransmitted FINs from the server.
    pub client_end_timeout: Duration,
    /// Longest a loop iteration waits for a datagram before sweeping timers.
    pub poll_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            retransmission_timeout: Duration::from_millis(500),
            client_end_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// A restartable wall-clock stopwatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stopwatch {
    started: Option<Instant>,
}

impl Stopwatch {
    /// A stopwatch already running from now.
    pub fn started() -> Self {
        Self {
            started: Some(Instant::now()),
        }
    }

    /// (Re)start from now.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Time since the last start, or `None` while stopped.
    fn elapsed(&self) -> Option<Duration> {
        self.started.map(|t| t.elapsed())
    }

    /// `true` when running and at least `limit` has elapsed.
    pub fn expired(&self, limit: Duration) -> bool {
        self.elapsed().is_some_and(|e| e >= limit)
    }
}

/// Names of the stopwatches held in a [`TimerSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Inactivity timer, restarted by every valid datagram from the peer.
    Connection,
    /// SYN retransmission.
    SynRetry,
    /// FIN (or FIN-ACK) retransmission.
    FinRetry,
    /// Client end-of-connection grace window.
    FinEnd,
}

impl TimerKind {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            TimerKind::Connection => 0,
            TimerKind::SynRetry => 1,
            TimerKind::FinRetry => 2,
            TimerKind::FinEnd => 3,
        }
    }
}

/// The named stopwatches of one endpoint or one server connection.
#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    watches: [Stopwatch; TimerKind::COUNT],
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, kind: TimerKind) {
        self.watches[kind.index()].start();
    }

    pub fn stop(&mut self, kind: TimerKind) {
        self.watches[kind.index()].stop();
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.watches[kind.index()].is_running()
    }

    pub fn expired(&self, kind: TimerKind, limit: Duration) -> bool {
        self.watches[kind.index()].expired(limit)
    }
}
