//! Network simulator for deterministic testing.
//!
//! Real networks drop packets.  To exercise the reliability mechanisms
//! without depending on actual network conditions, this module provides:
//!
//! | Type               | Description                                        |
//! |--------------------|----------------------------------------------------|
//! | [`MemoryTransport`] | One end of an in-process datagram link.           |
//! | [`LossyTransport`]  | Wraps any [`Transport`] and drops outgoing        |
//! |                    | datagrams according to a [`SimulatorConfig`].      |
//!
//! Losses are reproducible: the deterministic mode drops every N-th send and
//! the random mode draws from a seeded RNG.  The binary also uses
//! [`LossyTransport`] when given `--drop-every` or `--loss-rate`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::socket::Transport;

/// Configuration for the fault-injection model.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Drop every N-th outgoing datagram (1-based count).  `None` or
    /// `Some(0)` disables the deterministic mode.
    pub drop_every: Option<u64>,
    /// Probability in `[0.0, 1.0]` that an outgoing datagram is dropped.
    pub loss_rate: f64,
    /// Seed for the loss RNG.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults: a transparent pass-through.
        Self {
            drop_every: None,
            loss_rate: 0.0,
            seed: 0,
        }
    }
}

impl SimulatorConfig {
    /// Deterministic mode: drop sends number `n`, `2n`, `3n`, ...
    pub fn drop_every(n: u64) -> Self {
        Self {
            drop_every: Some(n),
            ..Self::default()
        }
    }

    /// Random mode with a fixed seed.
    pub fn lossy(loss_rate: f64, seed: u64) -> Self {
        Self {
            loss_rate,
            seed,
            ..Self::default()
        }
    }

    /// `true` when no fault would ever be injected.
    pub fn is_transparent(&self) -> bool {
        self.drop_every.unwrap_or(0) == 0 && self.loss_rate <= 0.0
    }
}

// ---------------------------------------------------------------------------
// LossyTransport
// ---------------------------------------------------------------------------

/// A fault-injecting wrapper around another transport.
///
/// Dropped datagrams are reported to the caller as sent, exactly as a real
/// network would.  Receives pass through untouched; wrap both endpoints to
/// lose traffic in both directions.
#[derive(Debug)]
pub struct LossyTransport<T> {
    inner: T,
    config: SimulatorConfig,
    sent: AtomicU64,
    dropped: AtomicU64,
    rng: Mutex<StdRng>,
}

impl<T: Transport> LossyTransport<T> {
    pub fn new(inner: T, config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            rng: Mutex::new(rng),
        }
    }

    /// Datagrams the simulator discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Datagrams offered to `send_to` so far, dropped ones included.
    pub fn offered(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn should_drop(&self) -> bool {
        let count = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(n) = self.config.drop_every.filter(|&n| n > 0) {
            if count % n == 0 {
                return true;
            }
        }
        if self.config.loss_rate > 0.0 {
            if let Ok(mut rng) = self.rng.lock() {
                return rng.random::<f64>() < self.config.loss_rate;
            }
        }
        false
    }
}

impl<T: Transport> Transport for LossyTransport<T> {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        if self.should_drop() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            log::trace!("[sim] dropped {} bytes to {dest}", buf.len());
            return Ok(buf.len());
        }
        self.inner.send_to(buf, dest).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

type Datagram = (Vec<u8>, SocketAddr);

/// One end of an in-memory datagram link created by [`memory_pair`].
///
/// Datagrams addressed to anything other than the peer's address vanish,
/// like UDP sent to a port nobody listens on.
#[derive(Debug)]
pub struct MemoryTransport {
    local: SocketAddr,
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<Datagram>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
}

/// Build a connected pair of in-memory transports with the given addresses.
pub fn memory_pair(a: SocketAddr, b: SocketAddr) -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    let end_a = MemoryTransport {
        local: a,
        peer: b,
        tx: a_tx,
        rx: tokio::sync::Mutex::new(a_rx),
    };
    let end_b = MemoryTransport {
        local: b,
        peer: a,
        tx: b_tx,
        rx: tokio::sync::Mutex::new(b_rx),
    };
    (end_a, end_b)
}

impl Transport for MemoryTransport {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        if dest == self.peer {
            // A closed link behaves like an unreachable host: the send
            // still "succeeds".
            let _ = self.tx.send((buf.to_vec(), self.local));
        }
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some((bytes, from)) => {
                // Truncate like a datagram socket does.
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok((n, from))
            }
            // Peer gone: nothing will ever arrive again.
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
}
