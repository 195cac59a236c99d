//! The receiving endpoint.
//!
//! One [`Server`] owns one transport and a [`ConnectionTable`] of transmission
//! control blocks ([`Tcb`]), one per client.  Each loop iteration sweeps the
//! per-connection timers, waits briefly for a datagram and routes it by its
//! connection id:
//!
//! - SYN with id 0: admit a new connection and answer SYN-ACK.
//! - Data: reassemble, write the contiguous prefix to the connection's
//!   output file, answer with a cumulative ACK.
//! - FIN: answer FIN-ACK and wait for the closing ACK.
//!
//! Every connection writes to `<save_dir>/<id>.file`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, TransferError};
use crate::packet::{flags, Packet, MAX_PACKET_LEN};
use crate::receiver::{AddOutcome, ReassemblyBuffer, RWND_BYTES};
use crate::seq::{seq_add, seq_distance, INIT_SERVER_SEQ};
use crate::socket::{recv_within, Transport};
use crate::state::ConnectionState;
use crate::timer::{TimerConfig, TimerKind, TimerSet};
use crate::trace::{TraceEvent, TraceSink};

// ---------------------------------------------------------------------------
// SaveDir
// ---------------------------------------------------------------------------

/// Directory receiving one output file per connection.
#[derive(Debug, Clone)]
pub struct SaveDir {
    dir: PathBuf,
}

impl SaveDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Output path for connection `conn_id`.
    pub fn file_for(&self, conn_id: u16) -> PathBuf {
        self.dir.join(format!("{conn_id}.file"))
    }

    /// Create the directory (and parents) if missing.
    pub async fn ensure_exists(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| TransferError::OutputFile {
                path: self.dir.clone(),
                source,
            })
    }

    async fn create(&self, conn_id: u16) -> Result<(File, PathBuf)> {
        let path = self.file_for(conn_id);
        match File::create(&path).await {
            Ok(file) => Ok((file, path)),
            Err(source) => Err(TransferError::OutputFile { path, source }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tcb
// ---------------------------------------------------------------------------

/// Per-connection state held by the server.
#[derive(Debug)]
pub struct Tcb {
    state: ConnectionState,
    /// Sequence number of the server's next control packet.
    server_seq: u32,
    buffer: ReassemblyBuffer,
    /// `Connection` (inactivity) and `FinRetry`.
    timers: TimerSet,
    /// FIN-ACK kept for retransmission while in `FinReceived`.
    fin_ack: Option<Packet>,
    peer: SocketAddr,
    output: File,
    path: PathBuf,
    bytes_written: u64,
}

impl Tcb {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn server_seq(&self) -> u32 {
        self.server_seq
    }

    /// Cumulative ACK the server currently advertises.
    pub fn expected_seq(&self) -> u32 {
        self.buffer.expected_seq()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Bytes written to the output file so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Complete the handshake: the server's SYN consumed one number.
    fn promote(&mut self) {
        if self.state == ConnectionState::AwaitingAck {
            self.state = ConnectionState::ConnectionSet;
            self.server_seq = seq_add(self.server_seq, 1);
        }
    }

    /// Cumulative ACK for the current buffer state.
    fn reply(&self, conn_id: u16) -> Packet {
        let fl = if self.state == ConnectionState::AwaitingAck {
            flags::SYN | flags::ACK
        } else {
            flags::ACK
        };
        Packet::control(self.server_seq, self.buffer.expected_seq(), conn_id, fl)
    }

    /// `true` when a FIN at `seq` is not behind the delivered data.
    fn accepts_fin(&self, seq: u32) -> bool {
        self.state != ConnectionState::FinReceived
            && (seq_distance(self.buffer.expected_seq(), seq) as usize) < RWND_BYTES
    }

    /// `true` when `pkt` acknowledges the held FIN-ACK.
    fn is_closing_ack(&self, pkt: &Packet) -> bool {
        self.fin_ack
            .as_ref()
            .is_some_and(|fin_ack| pkt.header.ack == seq_add(fin_ack.header.seq, 1))
    }

    /// Enter `FinReceived` and build the FIN-ACK to send and keep.
    fn receive_fin(&mut self, conn_id: u16, seq: u32) -> Packet {
        self.promote();
        self.state = ConnectionState::FinReceived;
        self.buffer.set_expected_seq(seq_add(seq, 1));
        let fin_ack = Packet::control(
            self.server_seq,
            self.buffer.expected_seq(),
            conn_id,
            flags::FIN | flags::ACK,
        );
        self.fin_ack = Some(fin_ack.clone());
        self.timers.start(TimerKind::FinRetry);
        fin_ack
    }
}

// ---------------------------------------------------------------------------
// ConnectionTable
// ---------------------------------------------------------------------------

/// Connection id → [`Tcb`] map with admission and teardown.
#[derive(Debug)]
pub struct ConnectionTable {
    conns: HashMap<u16, Tcb>,
    next_id: u16,
    save_dir: SaveDir,
}

impl ConnectionTable {
    pub fn new(save_dir: SaveDir) -> Self {
        Self {
            conns: HashMap::new(),
            next_id: 1,
            save_dir,
        }
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub fn get(&self, conn_id: u16) -> Option<&Tcb> {
        self.conns.get(&conn_id)
    }

    /// Live connection ids in ascending order.
    pub fn ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.conns.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Next id that is neither 0 nor in use, or `None` when all are taken.
    fn allocate_id(&mut self) -> Option<u16> {
        for _ in 0..u16::MAX {
            let candidate = self.next_id;
            self.next_id = match self.next_id.wrapping_add(1) {
                0 => 1,
                n => n,
            };
            if candidate != 0 && !self.conns.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Create a connection for a SYN from `peer`.
    ///
    /// Returns the new id, or `None` when the id space is exhausted.
    pub async fn admit(&mut self, syn: &Packet, peer: SocketAddr) -> Result<Option<u16>> {
        let Some(conn_id) = self.allocate_id() else {
            return Ok(None);
        };
        let (output, path) = self.save_dir.create(conn_id).await?;

        let mut timers = TimerSet::new();
        timers.start(TimerKind::Connection);
        self.conns.insert(
            conn_id,
            Tcb {
                state: ConnectionState::AwaitingAck,
                server_seq: INIT_SERVER_SEQ,
                buffer: ReassemblyBuffer::new(seq_add(syn.header.seq, 1)),
                timers,
                fin_ack: None,
                peer,
                output,
                path,
                bytes_written: 0,
            },
        );
        log::info!("[server] ← SYN from {peer}; admitted connection {conn_id}");
        Ok(Some(conn_id))
    }

    /// Offer a data packet's payload to its connection's buffer.
    pub fn add_packet_to_buffer(&mut self, conn_id: u16, packet: &Packet) -> AddOutcome {
        match self.conns.get_mut(&conn_id) {
            Some(tcb) if tcb.state != ConnectionState::FinReceived && !packet.is_fin() => {
                tcb.buffer.add(packet.header.seq, &packet.payload)
            }
            _ => AddOutcome::Rejected,
        }
    }

    /// Write the contiguous prefix of a connection's buffer to its file.
    ///
    /// Returns the number of bytes written.
    pub async fn flush_buffer(&mut self, conn_id: u16) -> Result<usize> {
        let Some(tcb) = self.conns.get_mut(&conn_id) else {
            return Ok(0);
        };
        let bytes = tcb.buffer.take_contiguous();
        if bytes.is_empty() {
            return Ok(0);
        }
        let written = match tcb.output.write_all(&bytes).await {
            Ok(()) => tcb.output.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|source| TransferError::OutputFile {
            path: tcb.path.clone(),
            source,
        })?;
        tcb.bytes_written += bytes.len() as u64;
        Ok(bytes.len())
    }

    /// Flush and close a connection's file and forget the connection.
    pub async fn close(&mut self, conn_id: u16) -> Result<()> {
        let Some(mut tcb) = self.conns.remove(&conn_id) else {
            return Ok(());
        };
        tcb.output
            .flush()
            .await
            .map_err(|source| TransferError::OutputFile {
                path: tcb.path.clone(),
                source,
            })?;
        log::info!(
            "[server] connection {conn_id} closed; {} bytes in {}",
            tcb.bytes_written,
            tcb.path.display()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Accepts any number of concurrent uploads on one transport.
pub struct Server<T> {
    transport: T,
    table: ConnectionTable,
    config: TimerConfig,
    trace: Box<dyn TraceSink>,
}

impl<T: Transport> Server<T> {
    pub fn new(
        transport: T,
        save_dir: SaveDir,
        config: TimerConfig,
        trace: Box<dyn TraceSink>,
    ) -> Self {
        Self {
            transport,
            table: ConnectionTable::new(save_dir),
            config,
            trace,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.table.len()
    }

    pub fn connection_ids(&self) -> Vec<u16> {
        self.table.ids()
    }

    pub fn connection(&self, conn_id: u16) -> Option<&Tcb> {
        self.table.get(conn_id)
    }

    /// Serve forever.  Returns only on a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        log::info!("[server] listening on {}", self.transport.local_addr()?);
        loop {
            self.step().await?;
        }
    }

    /// One loop iteration: timer sweep, then at most one datagram.
    pub async fn step(&mut self) -> Result<()> {
        self.sweep().await?;
        let mut buf = [0u8; MAX_PACKET_LEN + 1];
        if let Some((n, from)) =
            recv_within(&self.transport, &mut buf, self.config.poll_interval).await
        {
            self.handle_datagram(&buf[..n], from).await?;
        }
        Ok(())
    }

    /// Close idle connections and retransmit pending FIN-ACKs.
    async fn sweep(&mut self) -> Result<()> {
        let timeout = self.config.connection_timeout;
        let idle: Vec<u16> = self
            .table
            .conns
            .iter()
            .filter(|(_, tcb)| tcb.timers.expired(TimerKind::Connection, timeout))
            .map(|(&id, _)| id)
            .collect();
        for conn_id in idle {
            log::warn!("[server] connection {conn_id} idle; closing");
            self.table.close(conn_id).await?;
        }

        let rto = self.config.retransmission_timeout;
        let mut resend = Vec::new();
        for tcb in self.table.conns.values_mut() {
            if tcb.state == ConnectionState::FinReceived
                && tcb.timers.expired(TimerKind::FinRetry, rto)
            {
                if let Some(fin_ack) = &tcb.fin_ack {
                    resend.push((fin_ack.clone(), tcb.peer));
                }
                tcb.timers.start(TimerKind::FinRetry);
            }
        }
        for (fin_ack, peer) in resend {
            log::debug!("[server] → FIN-ACK retransmit conn={}", fin_ack.header.conn_id);
            self.send(&fin_ack, peer, true).await;
        }
        Ok(())
    }

    /// Process one received datagram.
    pub async fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) -> Result<()> {
        let pkt = match Packet::decode(bytes) {
            Ok(pkt) => pkt,
            Err(e) => {
                log::debug!("[server] discarding datagram from {from}: {e}");
                return Ok(());
            }
        };
        let conn_id = pkt.header.conn_id;

        if conn_id == 0 {
            if pkt.is_syn() && !pkt.is_ack() && !pkt.is_fin() {
                self.trace.record(TraceEvent::recv(&pkt));
                return self.accept(&pkt, from).await;
            }
            log::debug!("[server] non-SYN without connection from {from}");
            self.trace.record(TraceEvent::drop(&pkt));
            return Ok(());
        }

        let Some(tcb) = self.table.conns.get_mut(&conn_id) else {
            log::debug!("[server] unknown connection {conn_id}");
            self.trace.record(TraceEvent::drop(&pkt));
            return Ok(());
        };
        if pkt.is_syn() || tcb.peer != from {
            self.trace.record(TraceEvent::drop(&pkt));
            return Ok(());
        }
        tcb.timers.start(TimerKind::Connection);

        if pkt.is_fin() {
            if !tcb.accepts_fin(pkt.header.seq) {
                log::debug!("[server] stale FIN seq={} conn={conn_id}", pkt.header.seq);
                self.trace.record(TraceEvent::drop(&pkt));
                return Ok(());
            }
            self.trace.record(TraceEvent::recv(&pkt));
            let fin_ack = tcb.receive_fin(conn_id, pkt.header.seq);
            let peer = tcb.peer;
            log::debug!("[server] ← FIN conn={conn_id}; → FIN-ACK");
            self.send(&fin_ack, peer, false).await;
            return Ok(());
        }

        if tcb.state == ConnectionState::FinReceived {
            if pkt.is_ack() && tcb.is_closing_ack(&pkt) {
                self.trace.record(TraceEvent::recv(&pkt));
                return self.table.close(conn_id).await;
            }
            self.trace.record(TraceEvent::drop(&pkt));
            return Ok(());
        }

        self.trace.record(TraceEvent::recv(&pkt));
        if pkt.is_ack() {
            tcb.promote();
        }
        let peer = tcb.peer;

        let outcome = if pkt.payload.is_empty() {
            AddOutcome::Added
        } else {
            self.table.add_packet_to_buffer(conn_id, &pkt)
        };
        if outcome == AddOutcome::OutOfWindow {
            log::debug!(
                "[server] seq={} len={} outside window conn={conn_id}",
                pkt.header.seq,
                pkt.payload.len()
            );
        }
        self.table.flush_buffer(conn_id).await?;

        let Some(tcb) = self.table.get(conn_id) else {
            return Ok(());
        };
        let reply = tcb.reply(conn_id);
        self.send(&reply, peer, outcome == AddOutcome::Duplicate).await;
        Ok(())
    }

    async fn accept(&mut self, syn: &Packet, from: SocketAddr) -> Result<()> {
        let Some(conn_id) = self.table.admit(syn, from).await? else {
            log::warn!("[server] no free connection id; ignoring SYN from {from}");
            return Ok(());
        };
        if let Some(tcb) = self.table.get(conn_id) {
            let reply = tcb.reply(conn_id);
            self.send(&reply, from, false).await;
        }
        Ok(())
    }

    async fn send(&mut self, packet: &Packet, peer: SocketAddr, dup: bool) {
        self.trace.record(TraceEvent::send(packet, dup));
        if let Err(e) = self.transport.send_to(&packet.encode(), peer).await {
            log::warn!("[server] send to {peer} failed: {e}");
        }
    }
}
