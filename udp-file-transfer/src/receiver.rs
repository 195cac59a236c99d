//! Inbound byte reassembly for one server-side connection.
//!
//! [`ReassemblyBuffer`] is a fixed window of [`RWND_BYTES`] bytes plus a
//! parallel presence bitmap.  Offset 0 always corresponds to
//! `expected_seq`, the first byte not yet delivered to the output file.
//! Segments may arrive in any order; each byte is written at
//! `seq - expected_seq` (modulo the sequence space) and marked present.  The
//! longest present prefix is then flushed and the window slides forward.
//!
//! Overlapping segments overwrite each other: whichever copy arrives last
//! wins.  The transport gives no ordering guarantee, so neither copy is more
//! trustworthy than the other.

use crate::seq::{seq_add, seq_distance};

/// Capacity of the receive window in bytes.
pub const RWND_BYTES: usize = 51_200;

/// What happened to a segment offered to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// At least one byte not previously present was stored.
    Added,
    /// Every byte was already present or already delivered.
    Duplicate,
    /// The segment does not fit inside the receive window.
    OutOfWindow,
    /// Not eligible for buffering (FIN, or connection already closing).
    Rejected,
}

pub struct ReassemblyBuffer {
    /// Sequence number of the byte at offset 0.
    expected_seq: u32,
    data: Vec<u8>,
    present: Vec<bool>,
}

impl std::fmt::Debug for ReassemblyBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReassemblyBuffer")
            .field("expected_seq", &self.expected_seq)
            .field("contiguous", &self.contiguous_len())
            .finish()
    }
}

impl ReassemblyBuffer {
    pub fn new(expected_seq: u32) -> Self {
        Self {
            expected_seq,
            data: vec![0; RWND_BYTES],
            present: vec![false; RWND_BYTES],
        }
    }

    /// Next sequence number the peer must deliver; the cumulative ACK.
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    /// Advance past a sequence number that carries no data (a FIN).
    pub fn set_expected_seq(&mut self, seq: u32) {
        let shift = seq_distance(self.expected_seq, seq) as usize;
        self.move_window(shift);
        self.expected_seq = seq;
    }

    /// Store a segment's payload.
    ///
    /// A segment that begins before `expected_seq` but runs past it has its
    /// already-delivered prefix trimmed; a segment entirely before it is a
    /// duplicate.  A segment reaching beyond the window is rejected whole.
    pub fn add(&mut self, seq: u32, payload: &[u8]) -> AddOutcome {
        let len = payload.len();
        let offset = seq_distance(self.expected_seq, seq) as usize;
        if offset + len <= RWND_BYTES {
            return self.write_at(offset, payload);
        }

        let behind = seq_distance(seq, self.expected_seq) as usize;
        if behind > RWND_BYTES {
            return AddOutcome::OutOfWindow;
        }
        if behind >= len {
            return AddOutcome::Duplicate;
        }
        let tail = &payload[behind..];
        if tail.len() > RWND_BYTES {
            return AddOutcome::OutOfWindow;
        }
        self.write_at(0, tail)
    }

    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> AddOutcome {
        let mut fresh = false;
        for (i, &b) in bytes.iter().enumerate() {
            self.data[offset + i] = b;
            if !self.present[offset + i] {
                self.present[offset + i] = true;
                fresh = true;
            }
        }
        if fresh || bytes.is_empty() {
            AddOutcome::Added
        } else {
            AddOutcome::Duplicate
        }
    }

    /// Length of the run of present bytes starting at offset 0.
    pub fn contiguous_len(&self) -> usize {
        self.present.iter().take_while(|&&p| p).count()
    }

    /// Remove and return the contiguous prefix, advancing `expected_seq`.
    pub fn take_contiguous(&mut self) -> Vec<u8> {
        let n = self.contiguous_len();
        if n == 0 {
            return Vec::new();
        }
        let out = self.data[..n].to_vec();
        self.expected_seq = seq_add(self.expected_seq, n);
        self.move_window(n);
        out
    }

    /// Shift buffer and bitmap left by `bytes`, zero-filling the tail.
    fn move_window(&mut self, bytes: usize) {
        if bytes == 0 {
            return;
        }
        if bytes >= RWND_BYTES {
            self.data.fill(0);
            self.present.fill(false);
            return;
        }
        self.data.copy_within(bytes.., 0);
        self.present.copy_within(bytes.., 0);
        self.data[RWND_BYTES - bytes..].fill(0);
        self.present[RWND_BYTES - bytes..].fill(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::MAX_SEQ_NUM;
    use proptest::prelude::*;

    #[test]
    fn in_order_segment_flushes_immediately() {
        let mut r = ReassemblyBuffer::new(100);
        assert_eq!(r.add(100, b"hello"), AddOutcome::Added);
        assert_eq!(r.take_contiguous(), b"hello");
        assert_eq!(r.expected_seq(), 105);
        assert_eq!(r.contiguous_len(), 0);
    }

    #[test]
    fn out_of_order_waits_for_gap() {
        let mut r = ReassemblyBuffer::new(0);
        assert_eq!(r.add(5, b"world"), AddOutcome::Added);
        assert!(r.take_contiguous().is_empty());
        assert_eq!(r.expected_seq(), 0);

        assert_eq!(r.add(0, b"hello"), AddOutcome::Added);
        assert_eq!(r.take_contiguous(), b"helloworld");
        assert_eq!(r.expected_seq(), 10);
    }

    #[test]
    fn zero_bytes_are_data() {
        let mut r = ReassemblyBuffer::new(0);
        r.add(0, &[0, 0, 1, 0]);
        assert_eq!(r.take_contiguous(), vec![0, 0, 1, 0]);
    }

    #[test]
    fn repeated_segment_is_duplicate() {
        let mut r = ReassemblyBuffer::new(0);
        r.add(10, b"abc");
        assert_eq!(r.add(10, b"abc"), AddOutcome::Duplicate);
    }

    #[test]
    fn overlapping_bytes_last_writer_wins() {
        let mut r = ReassemblyBuffer::new(0);
        r.add(2, b"xxxx");
        r.add(0, b"abcd");
        assert_eq!(r.take_contiguous(), b"abcdxx");
    }

    #[test]
    fn already_delivered_segment_is_duplicate() {
        let mut r = ReassemblyBuffer::new(0);
        r.add(0, b"abcdef");
        r.take_contiguous();
        assert_eq!(r.add(0, b"abcdef"), AddOutcome::Duplicate);
        assert_eq!(r.expected_seq(), 6);
    }

    #[test]
    fn straddling_segment_is_trimmed() {
        let mut r = ReassemblyBuffer::new(0);
        r.add(0, b"abc");
        r.take_contiguous();
        assert_eq!(r.add(1, b"bcdef"), AddOutcome::Added);
        assert_eq!(r.take_contiguous(), b"def");
        assert_eq!(r.expected_seq(), 6);
    }

    #[test]
    fn segment_past_window_is_rejected() {
        let mut r = ReassemblyBuffer::new(0);
        let seq = (RWND_BYTES - 2) as u32;
        assert_eq!(r.add(seq, b"abc"), AddOutcome::OutOfWindow);
        assert_eq!(r.add(seq, b"ab"), AddOutcome::Added);
    }

    #[test]
    fn window_slides_after_flush() {
        let mut r = ReassemblyBuffer::new(0);
        r.add(0, &vec![1; 512]);
        r.take_contiguous();
        // Previously out of reach, now inside the window.
        let seq = RWND_BYTES as u32;
        assert_eq!(r.add(seq, &[9; 100]), AddOutcome::Added);
    }

    #[test]
    fn fin_advance_moves_edge() {
        let mut r = ReassemblyBuffer::new(50);
        r.set_expected_seq(51);
        assert_eq!(r.expected_seq(), 51);
    }

    #[test]
    fn reassembly_across_sequence_wrap() {
        let start = MAX_SEQ_NUM - 99;
        let mut r = ReassemblyBuffer::new(start);
        let data: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        // Second half first; its sequence number has wrapped past zero.
        let second = seq_add(start, 150);
        assert_eq!(second, 50);
        assert_eq!(r.add(second, &data[150..]), AddOutcome::Added);
        assert_eq!(r.add(start, &data[..150]), AddOutcome::Added);
        assert_eq!(r.take_contiguous(), data);
        assert_eq!(r.expected_seq(), 200);
    }

    fn arb_transfer() -> impl Strategy<Value = (Vec<u8>, Vec<(usize, usize)>)> {
        (1usize..4000, 1usize..=512).prop_flat_map(|(len, chunk)| {
            let spans: Vec<(usize, usize)> = (0..len)
                .step_by(chunk)
                .map(|start| (start, (start + chunk).min(len)))
                .collect();
            (
                proptest::collection::vec(any::<u8>(), len),
                Just(spans).prop_shuffle(),
            )
        })
    }

    proptest! {
        #[test]
        fn any_arrival_order_reassembles((data, spans) in arb_transfer(), start in 0..=MAX_SEQ_NUM) {
            let mut r = ReassemblyBuffer::new(start);
            let mut out = Vec::new();
            for (a, b) in spans {
                r.add(seq_add(start, a), &data[a..b]);
                out.extend(r.take_contiguous());
            }
            prop_assert_eq!(out, data);
        }
    }
}
