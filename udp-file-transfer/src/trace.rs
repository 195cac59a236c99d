//! Per-packet trace events.
//!
//! Every packet sent, received or dropped by either endpoint produces one
//! [`TraceEvent`].  Its `Display` form is the trace line
//!
//! ```text
//! <SEND|RECV|DROP> <seq> <ack> <connId> [ACK] [SYN] [FIN] [DUP]
//! ```
//!
//! Events go to a [`TraceSink`]; which sink is used is decided by whoever
//! builds the endpoint (stdout in the binary, memory in tests).

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::packet::{flags, Header, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
    Drop,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Send => "SEND",
            Direction::Recv => "RECV",
            Direction::Drop => "DROP",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    pub direction: Direction,
    pub header: Header,
    /// Retransmission (on send) or duplicate (on receive).
    pub dup: bool,
}

impl TraceEvent {
    pub fn send(packet: &Packet, dup: bool) -> Self {
        Self {
            direction: Direction::Send,
            header: packet.header,
            dup,
        }
    }

    pub fn recv(packet: &Packet) -> Self {
        Self {
            direction: Direction::Recv,
            header: packet.header,
            dup: false,
        }
    }

    pub fn drop(packet: &Packet) -> Self {
        Self {
            direction: Direction::Drop,
            header: packet.header,
            dup: false,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        write!(f, "{} {} {} {}", self.direction, h.seq, h.ack, h.conn_id)?;
        if h.flags & flags::ACK != 0 {
            f.write_str(" ACK")?;
        }
        if h.flags & flags::SYN != 0 {
            f.write_str(" SYN")?;
        }
        if h.flags & flags::FIN != 0 {
            f.write_str(" FIN")?;
        }
        if self.dup {
            f.write_str(" DUP")?;
        }
        Ok(())
    }
}

/// Destination for trace events.
pub trait TraceSink: Send {
    fn record(&mut self, event: TraceEvent);
}

/// Prints one trace line per event on stdout.
#[derive(Debug, Default)]
pub struct StdoutTrace;

impl TraceSink for StdoutTrace {
    fn record(&mut self, event: TraceEvent) {
        println!("{event}");
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn record(&mut self, _event: TraceEvent) {}
}

/// Keeps events in memory; clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct MemoryTrace {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Trace lines recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

impl TraceSink for MemoryTrace {
    fn record(&mut self, event: TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
