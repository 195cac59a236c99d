//! Finite-state-machine types for both endpoints.
//!
//! The client walks a straight line through its lifecycle; the server keeps
//! one [`ConnectionState`] per admitted connection.  Transitions live in
//! [`crate::client`] and [`crate::server`].
//!
//! ```text
//!  client:  Handshaking ──SYN-ACK──▶ Established ──EOF+all ACKed──▶ Closing ──▶ Closed
//!                │                        │                           │
//!                └────────── 10 s inactivity ─────────────────────────┴──────▶ Closed
//!
//!  server:  (SYN, id 0) ──▶ AwaitingAck ──ACK──▶ ConnectionSet ──FIN──▶ FinReceived ──ACK──▶ (removed)
//!                                 │                                          ▲
//!                                 └─────────────────FIN──────────────────────┘
//! ```

/// Lifecycle of the sending client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// SYN sent (or about to be); waiting for a valid SYN-ACK.
    #[default]
    Handshaking,
    /// Handshake complete; data transfer in progress.
    Established,
    /// FIN sent; waiting for the server's answer, then lingering in the
    /// end-of-connection grace window.
    Closing,
    /// All resources released.
    Closed,
}

/// State of one server-side connection control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// SYN received and answered; waiting for the client's first ACK.
    /// Replies in this state carry SYN alongside ACK.
    AwaitingAck,
    /// Handshake complete; data transfer in progress.
    ConnectionSet,
    /// Client FIN received and FIN-ACK sent; waiting for the closing ACK.
    FinReceived,
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
