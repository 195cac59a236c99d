//! Send-side sliding window.
//!
//! [`SendWindow`] holds every outstanding segment of the client's transfer in
//! sequence order.  Segments are created from file bytes, transmitted once,
//! marked acknowledged by cumulative ACKs and retired from the front of the
//! window.  When any segment's retransmission timer expires the whole window
//! is discarded and rebuilt from its left edge (go-back-N).
//!
//! # Protocol contract
//!
//! - The buffered segments cover exactly the file span `[blseek, flseek)`,
//!   and their sequence numbers are contiguous from `rel_seq`.
//! - ACKs are **cumulative**: `ack = K` acknowledges every byte before `K`.
//! - An ACK is valid only inside `(rel_seq, largest_seq]`, measured in
//!   modular distance from `rel_seq` (see [`crate::seq`]).
//!
//! This module only manages state; all socket and file I/O is the caller's
//! responsibility.

use std::collections::VecDeque;
use std::time::Duration;

use crate::packet::{flags, Packet};
use crate::seq::{ack_in_window, in_span, seq_add, seq_distance};
use crate::timer::Stopwatch;

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One outstanding segment of the send window.
#[derive(Debug, Clone)]
pub struct Segment {
    /// The segment as it goes on the wire.
    pub packet: Packet,
    /// Covered by a cumulative ACK.
    pub acked: bool,
    /// Started at first transmission; doubles as the retransmission timer
    /// and the sent-at-least-once flag.
    pub sent_at: Stopwatch,
}

impl Segment {
    pub fn seq(&self) -> u32 {
        self.packet.header.seq
    }

    pub fn len(&self) -> usize {
        self.packet.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packet.payload.is_empty()
    }

    /// Sequence number one past the last payload byte.
    pub fn end(&self) -> u32 {
        seq_add(self.seq(), self.len())
    }

    pub fn sent_once(&self) -> bool {
        self.sent_at.is_running()
    }
}

/// Result of offering a cumulative ACK to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The ACK lies inside the window.  `newly_acked` segments were marked.
    Accepted { newly_acked: usize },
    /// The ACK equals the left edge: it acknowledges nothing new.
    Duplicate,
    /// The ACK lies outside `(rel_seq, largest_seq]`.
    OutOfWindow,
}

impl AckOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AckOutcome::Accepted { .. })
    }
}

/// A segment handed out by [`SendWindow::take_unsent`] for transmission.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub packet: Packet,
    /// Covers sequence numbers that were already transmitted once.
    pub dup: bool,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// Sliding-window send state for the client's single connection.
///
/// # Sequence-number layout
///
/// ```text
///  rel_seq            next_seq       largest_seq
///     │                  │                │
///  ───┼──────────────────┼────────────────┼──────▶ seq space
///     │ <── buffered ───▶│                │
///     │ <───────── transmitted ──────────▶│
///  blseek             flseek                          (file offsets)
/// ```
///
/// `largest_seq` may run ahead of `next_seq` after a window drop rewinds the
/// sender; segments rebuilt inside that span are retransmissions.
#[derive(Debug)]
pub struct SendWindow {
    /// Outstanding segments, oldest first.
    segments: VecDeque<Segment>,
    /// Sequence number of the oldest unacknowledged byte (left edge).
    rel_seq: u32,
    /// Sequence number for the next new segment.
    next_seq: u32,
    /// One past the furthest byte ever transmitted.
    largest_seq: u32,
    /// Highest valid cumulative ACK seen.
    highest_ack: u32,
    /// File offset matching `rel_seq`.
    blseek: u64,
    /// File offset matching `next_seq`.
    flseek: u64,
    /// Set once the server has acknowledged any data.  Until then every new
    /// segment piggybacks the handshake ACK.
    first_ack_received: bool,
}

impl SendWindow {
    /// Window whose first data byte carries sequence number `start_seq` and
    /// sits at file offset 0.
    pub fn new(start_seq: u32) -> Self {
        Self {
            segments: VecDeque::new(),
            rel_seq: start_seq,
            next_seq: start_seq,
            largest_seq: start_seq,
            highest_ack: start_seq,
            blseek: 0,
            flseek: 0,
            first_ack_received: false,
        }
    }

    pub fn rel_seq(&self) -> u32 {
        self.rel_seq
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn largest_seq(&self) -> u32 {
        self.largest_seq
    }

    /// File offset of the left window edge.
    pub fn blseek(&self) -> u64 {
        self.blseek
    }

    /// File offset of the next byte to read.
    pub fn flseek(&self) -> u64 {
        self.flseek
    }

    pub fn first_ack_received(&self) -> bool {
        self.first_ack_received
    }

    /// Number of buffered segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Bytes currently buffered (`flseek - blseek`).
    pub fn outstanding_bytes(&self) -> u64 {
        self.flseek - self.blseek
    }

    pub fn all_acked(&self) -> bool {
        self.segments.iter().all(|s| s.acked)
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// `true` when `seq` falls in a span that has already been transmitted.
    pub fn is_dup(&self, seq: u32) -> bool {
        in_span(seq, self.rel_seq, self.largest_seq)
    }

    /// Append a new segment built from the next `payload.len()` file bytes.
    ///
    /// Before the server's first ACK the segment carries the ACK flag with
    /// `ack_number`, completing the handshake on the server side.
    pub fn push(&mut self, payload: Vec<u8>, conn_id: u16, ack_number: u32) {
        let (fl, ack) = if self.first_ack_received {
            (0, 0)
        } else {
            (flags::ACK, ack_number)
        };
        let len = payload.len();
        let packet = Packet::data(self.next_seq, ack, conn_id, fl, payload);
        self.segments.push_back(Segment {
            packet,
            acked: false,
            sent_at: Stopwatch::default(),
        });
        self.next_seq = seq_add(self.next_seq, len);
        self.flseek += len as u64;
    }

    /// Mark every never-sent segment as sent, start its retransmission timer
    /// and return copies to put on the wire.
    pub fn take_unsent(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        for i in 0..self.segments.len() {
            if self.segments[i].sent_once() {
                continue;
            }
            let seq = self.segments[i].seq();
            let end = self.segments[i].end();
            let dup = self.is_dup(seq);
            if seq_distance(self.rel_seq, end) > seq_distance(self.rel_seq, self.largest_seq) {
                self.largest_seq = end;
            }
            let seg = &mut self.segments[i];
            seg.sent_at.start();
            out.push(Outbound {
                packet: seg.packet.clone(),
                dup,
            });
        }
        out
    }

    /// `true` when some sent, unacknowledged segment has waited at least `rto`.
    pub fn retransmit_due(&self, rto: Duration) -> bool {
        self.segments
            .iter()
            .any(|s| !s.acked && s.sent_at.expired(rto))
    }

    /// Process a cumulative ACK number.
    ///
    /// Every segment that ends at or before `ack` is marked acknowledged.
    pub fn mark_ack(&mut self, ack: u32) -> AckOutcome {
        if !ack_in_window(ack, self.rel_seq, self.largest_seq) {
            return if seq_distance(self.rel_seq, ack) == 0 {
                AckOutcome::Duplicate
            } else {
                AckOutcome::OutOfWindow
            };
        }

        let acked_len = seq_distance(self.rel_seq, ack);
        if acked_len > seq_distance(self.rel_seq, self.highest_ack) {
            self.highest_ack = ack;
        }

        let mut newly_acked = 0;
        for seg in self.segments.iter_mut() {
            if seq_distance(self.rel_seq, seg.end()) > acked_len {
                break;
            }
            if !seg.acked {
                seg.acked = true;
                newly_acked += 1;
            }
        }
        self.first_ack_received = true;
        AckOutcome::Accepted { newly_acked }
    }

    /// Retire acknowledged segments from the front of the window.
    ///
    /// Advances `blseek` and `rel_seq` by the freed bytes and returns that
    /// count.  When the window empties while a previous ACK reached past
    /// everything buffered (which happens after a window drop), the edge also
    /// jumps forward to that ACK so bytes the server already holds are not
    /// sent again.
    pub fn shift_window(&mut self) -> usize {
        let mut freed = 0usize;
        while self.segments.front().is_some_and(|s| s.acked) {
            if let Some(seg) = self.segments.pop_front() {
                freed += seg.len();
            }
        }
        self.advance_edge(freed);

        if self.segments.is_empty() {
            let skip = seq_distance(self.rel_seq, self.highest_ack);
            if skip > 0 && skip <= seq_distance(self.rel_seq, self.largest_seq) {
                self.advance_edge(skip as usize);
                self.flseek = self.blseek;
                self.next_seq = self.rel_seq;
                freed += skip as usize;
            }
        }
        freed
    }

    fn advance_edge(&mut self, bytes: usize) {
        if bytes == 0 {
            return;
        }
        self.blseek += bytes as u64;
        self.rel_seq = seq_add(self.rel_seq, bytes);
    }

    /// Discard every buffered segment and rewind to the left edge.
    ///
    /// Returns the number of segments discarded.
    pub fn drop_all(&mut self) -> usize {
        let dropped = self.segments.len();
        self.segments.clear();
        self.flseek = self.blseek;
        self.next_seq = self.rel_seq;
        dropped
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
