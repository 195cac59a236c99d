//! Datagram transport abstraction.
//!
//! [`Transport`] is the only way the engines touch the network: send one
//! datagram to an address, receive the next datagram with its source.
//! [`UdpTransport`] is the production implementation over
//! `tokio::net::UdpSocket`; [`crate::simulator`] provides in-memory and
//! fault-injecting ones.  All protocol logic lives elsewhere; this module
//! owns only byte I/O.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::error::TransferError;

/// An async datagram socket.
///
/// All methods take `&self`; implementations must tolerate concurrent use.
pub trait Transport: Send + Sync {
    /// Send `buf` as a single datagram to `dest`.
    fn send_to(
        &self,
        buf: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Wait for the next datagram, copying it into `buf`.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Address this transport receives on.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Receive one datagram, waiting at most `wait`.
///
/// Returns `None` when nothing arrived in time.  A failed receive is logged
/// and also reported as `None`: to the protocol it is indistinguishable from
/// a lost packet.
pub async fn recv_within<T: Transport>(
    transport: &T,
    buf: &mut [u8],
    wait: Duration,
) -> Option<(usize, SocketAddr)> {
    match tokio::time::timeout(wait, transport.recv_from(buf)).await {
        Ok(Ok(received)) => Some(received),
        Ok(Err(e)) => {
            log::warn!("[socket] receive failed: {e}");
            None
        }
        Err(_elapsed) => None,
    }
}

// ---------------------------------------------------------------------------
// UdpTransport
// ---------------------------------------------------------------------------

/// [`Transport`] over a bound tokio UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    inner: UdpSocket,
}

impl UdpTransport {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port 0 lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, TransferError> {
        let inner = UdpSocket::bind(local_addr)
            .await
            .map_err(|source| TransferError::Bind {
                addr: local_addr.to_string(),
                source,
            })?;
        Ok(Self { inner })
    }
}

impl Transport for UdpTransport {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        self.inner.send_to(buf, dest).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
