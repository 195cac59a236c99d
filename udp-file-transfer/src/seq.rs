//! Sequence-number arithmetic.
//!
//! Sequence and acknowledgement numbers live in the modular space
//! `0..=MAX_SEQ_NUM` rather than the full `u32` range.  Every comparison is
//! made by measuring the forward distance from a reference point (usually the
//! left edge of a window), which stays unambiguous as long as windows are
//! shorter than half the space.  Both `MAX_CWND_BYTES` and `RWND_BYTES` are.

/// Largest sequence number; the space wraps to 0 after it.
pub const MAX_SEQ_NUM: u32 = 102_400;

/// Number of distinct sequence numbers.
pub const SEQ_SPACE: u32 = MAX_SEQ_NUM + 1;

/// Initial sequence number used by the client's SYN.
pub const INIT_CLIENT_SEQ: u32 = 12_345;

/// Initial sequence number used by the server's SYN-ACK.
pub const INIT_SERVER_SEQ: u32 = 4_321;

/// `seq + n` in sequence space.
#[inline]
pub fn seq_add(seq: u32, n: usize) -> u32 {
    ((u64::from(seq) + n as u64) % u64::from(SEQ_SPACE)) as u32
}

/// Forward distance from `from` to `to`, in `0..SEQ_SPACE`.
#[inline]
pub fn seq_distance(from: u32, to: u32) -> u32 {
    let from = from % SEQ_SPACE;
    let to = to % SEQ_SPACE;
    if to >= from {
        to - from
    } else {
        to + SEQ_SPACE - from
    }
}

/// `true` when `seq` lies in the half-open span `[left, right)`.
#[inline]
pub fn in_span(seq: u32, left: u32, right: u32) -> bool {
    seq_distance(left, seq) < seq_distance(left, right)
}

/// `true` when a cumulative `ack` acknowledges at least one byte of the span
/// `[left, right)` and nothing beyond it, i.e. `ack` lies in `(left, right]`.
#[inline]
pub fn ack_in_window(ack: u32, left: u32, right: u32) -> bool {
    let d = seq_distance(left, ack);
    d > 0 && d <= seq_distance(left, right)
}
