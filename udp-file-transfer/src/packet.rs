//! Wire-format definitions for protocol segments.
//!
//! Every datagram exchanged between client and server is a [`Packet`].  This
//! module is responsible for:
//! - Defining the on-wire binary layout (header fields, flags, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for undersized or oversized input.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Connection ID         |   Reserved    |     Flags     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Payload (0-512 bytes) ...                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 12 bytes.
//! The payload length is not carried in the header; it is whatever follows
//! the header in the datagram, so payloads may contain zero bytes freely.

use thiserror::Error;

/// Bit-flag constants for the `flags` header field.
pub mod flags {
    /// Finish: sender has no more data to send.
    pub const FIN: u8 = 0b0000_0001;
    /// Synchronise sequence numbers (handshake initiation).
    pub const SYN: u8 = 0b0000_0010;
    /// Acknowledgement field is valid.
    pub const ACK: u8 = 0b0000_0100;
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 12;

/// Largest payload a single segment may carry.
pub const MAX_PAYLOAD_LEN: usize = 512;

/// Largest datagram either side will ever produce.
pub const MAX_PACKET_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_CONN_ID: usize = 8;
const OFF_RESERVED: usize = 10;
const OFF_FLAGS: usize = 11;

/// Fixed-size protocol header.
///
/// Fields are in host byte order; [`Packet::encode`] converts to big-endian
/// on the wire and [`Packet::decode`] converts back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Sequence number of the first payload byte in this segment.
    pub seq: u32,
    /// Acknowledgement number (next expected sequence number from the peer).
    /// Only meaningful when [`flags::ACK`] is set.
    pub ack: u32,
    /// Connection identifier assigned by the server; `0` before the
    /// handshake completes.
    pub conn_id: u16,
    /// Bitmask of [`flags`] constants.
    pub flags: u8,
}

/// A complete protocol datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a packet carrying no payload (SYN, ACK, FIN and combinations).
    pub fn control(seq: u32, ack: u32, conn_id: u16, flags: u8) -> Self {
        Self {
            header: Header {
                seq,
                ack,
                conn_id,
                flags,
            },
            payload: Vec::new(),
        }
    }

    /// Build a data segment.
    pub fn data(seq: u32, ack: u32, conn_id: u16, flags: u8, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
        Self {
            header: Header {
                seq,
                ack,
                conn_id,
                flags,
            },
            payload,
        }
    }

    pub fn is_syn(&self) -> bool {
        self.header.flags & flags::SYN != 0
    }

    pub fn is_ack(&self) -> bool {
        self.header.flags & flags::ACK != 0
    }

    pub fn is_fin(&self) -> bool {
        self.header.flags & flags::FIN != 0
    }

    /// Number of bytes this packet occupies on the wire.
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serialise this packet into a newly allocated byte vector of exactly
    /// `HEADER_LEN + payload.len()` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.wire_len()];

        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.header.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.header.ack.to_be_bytes());
        buf[OFF_CONN_ID..OFF_CONN_ID + 2].copy_from_slice(&self.header.conn_id.to_be_bytes());
        buf[OFF_RESERVED] = 0;
        buf[OFF_FLAGS] = self.header.flags & (flags::FIN | flags::SYN | flags::ACK);
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        buf
    }

    /// Parse a [`Packet`] from a raw datagram.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`], or
    /// - the payload following the header exceeds [`MAX_PAYLOAD_LEN`].
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::Malformed { len: buf.len() });
        }
        if buf.len() > MAX_PACKET_LEN {
            return Err(PacketError::Oversized {
                len: buf.len() - HEADER_LEN,
            });
        }

        let seq = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let ack = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let conn_id = u16::from_be_bytes([buf[OFF_CONN_ID], buf[OFF_CONN_ID + 1]]);
        let flags = buf[OFF_FLAGS] & (flags::FIN | flags::SYN | flags::ACK);

        Ok(Packet {
            header: Header {
                seq,
                ack,
                conn_id,
                flags,
            },
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Datagram shorter than the fixed header size.
    #[error("malformed packet: {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    Malformed { len: usize },
    /// Payload longer than any peer is allowed to send.
    #[error("oversized packet: {len}-byte payload exceeds {MAX_PAYLOAD_LEN} bytes")]
    Oversized { len: usize },
}
