//! `udp-file-transfer`: reliable one-way file transfer over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  data segments (≤512 B)   ┌──────────────────┐
//!  │  Client  │──────────────────────────▶│      Server      │
//!  │ SendWin  │                           │ ConnectionTable  │
//!  │ AIMD cc  │◀──────────────────────────│ Tcb → Reassembly │──▶ <dir>/<id>.file
//!  └────┬─────┘     cumulative ACKs       └────────┬─────────┘
//!       │                                          │
//!  ┌────▼──────────────────────────────────────────▼────┐
//!  │   Transport  (UdpTransport / MemoryTransport,      │
//!  │               optionally wrapped in LossyTransport) │
//!  └─────────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]:      wire format (serialise / deserialise)
//! - [`seq`]:         modular sequence-number arithmetic
//! - [`timer`]:       timeouts and stopwatches
//! - [`congestion`]:  AIMD congestion window
//! - [`sender`]:      client send window (go-back-N)
//! - [`receiver`]:    server reassembly buffer
//! - [`state`]:       finite-state-machine types
//! - [`client`]:      handshake, transfer loop, handwave
//! - [`server`]:      connection table and server loop
//! - [`socket`]:      async datagram transport abstraction
//! - [`simulator`]:   in-memory links and loss injection
//! - [`trace`]:       per-packet trace lines
//! - [`error`]:       fatal error taxonomy

pub mod client;
pub mod congestion;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod server;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;
pub mod trace;

pub use client::{Client, Outcome, TransferReport};
pub use error::TransferError;
pub use server::{SaveDir, Server};
