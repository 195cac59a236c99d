//! The sending endpoint.
//!
//! [`Client`] pushes one file to a server over a single connection:
//!
//! 1. **Handshake**: send SYN, retransmit it every RTO until a SYN-ACK
//!    acknowledging it arrives or the connection timer expires.
//! 2. **Transfer**: a single loop that fills the congestion window with new
//!    segments, sends them, and drains incoming ACKs.  Any segment waiting
//!    longer than the RTO drops the whole window (go-back-N) and collapses
//!    the congestion window.
//! 3. **Handwave**: once every byte is acknowledged, send FIN, wait for the
//!    server's FIN-ACK, acknowledge it, then linger for a grace period to
//!    re-acknowledge retransmitted FINs.
//!
//! Window bookkeeping lives in [`crate::sender::SendWindow`] and congestion
//! state in [`crate::congestion::CongestionController`]; this module owns the
//! loop, the timers and all I/O.

use std::io::SeekFrom;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::congestion::CongestionController;
use crate::error::{Result, TransferError};
use crate::packet::{flags, Packet, MAX_PACKET_LEN, MAX_PAYLOAD_LEN};
use crate::sender::{AckOutcome, SendWindow};
use crate::seq::{seq_add, INIT_CLIENT_SEQ, INIT_SERVER_SEQ};
use crate::socket::{recv_within, Transport};
use crate::state::ClientState;
use crate::timer::{TimerConfig, TimerKind, TimerSet};
use crate::trace::{TraceEvent, TraceSink};

/// How a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every byte was acknowledged and the connection was torn down.
    Completed,
    /// No valid SYN-ACK arrived before the connection timeout.
    HandshakeTimedOut,
    /// The server went silent during the data transfer.
    ConnectionTimedOut,
}

/// Summary returned by [`Client::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    pub outcome: Outcome,
    /// Id assigned by the server; 0 if the handshake never completed.
    pub connection_id: u16,
    /// File bytes acknowledged by the server.
    pub bytes_sent: u64,
    /// Number of go-back-N window drops.
    pub retransmit_drops: u32,
}

/// Sends one file to one server.
pub struct Client<T, R> {
    transport: T,
    peer: SocketAddr,
    source: R,
    source_len: u64,
    config: TimerConfig,
    trace: Box<dyn TraceSink>,

    state: ClientState,
    timers: TimerSet,
    window: SendWindow,
    cc: CongestionController,
    conn_id: u16,
    /// Next sequence number expected from the server.
    ack_number: u32,
    /// Client sequence number after the FIN.
    sequence_number: u32,
    retransmit_drops: u32,
}

impl<T, R> Client<T, R>
where
    T: Transport,
    R: AsyncRead + AsyncSeek + Unpin,
{
    /// Prepare a transfer of `source` to `peer`.
    ///
    /// The source is sized up front by seeking to its end.
    pub async fn new(
        transport: T,
        peer: SocketAddr,
        mut source: R,
        config: TimerConfig,
        trace: Box<dyn TraceSink>,
    ) -> Result<Self> {
        let source_len = source
            .seek(SeekFrom::End(0))
            .await
            .map_err(TransferError::SourceFile)?;
        Ok(Self {
            transport,
            peer,
            source,
            source_len,
            config,
            trace,
            state: ClientState::Handshaking,
            timers: TimerSet::new(),
            window: SendWindow::new(seq_add(INIT_CLIENT_SEQ, 1)),
            cc: CongestionController::new(),
            conn_id: 0,
            ack_number: 0,
            sequence_number: INIT_CLIENT_SEQ,
            retransmit_drops: 0,
        })
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Run the whole transfer.
    ///
    /// Timeouts are reported through [`TransferReport::outcome`]; only
    /// failures to read the source are errors.
    pub async fn run(mut self) -> Result<TransferReport> {
        log::info!(
            "[client] sending {} bytes to {}",
            self.source_len,
            self.peer
        );

        if !self.handshake().await {
            log::warn!("[client] no SYN-ACK from {}; giving up", self.peer);
            self.state = ClientState::Closed;
            return Ok(self.report(Outcome::HandshakeTimedOut));
        }
        log::info!("[client] connection {} established", self.conn_id);

        if !self.transfer().await? {
            log::warn!("[client] connection {} timed out", self.conn_id);
            self.state = ClientState::Closed;
            return Ok(self.report(Outcome::ConnectionTimedOut));
        }

        self.handwave().await;
        self.state = ClientState::Closed;
        log::info!(
            "[client] connection {} closed; {} bytes acknowledged, {} window drops",
            self.conn_id,
            self.window.blseek(),
            self.retransmit_drops
        );
        Ok(self.report(Outcome::Completed))
    }

    fn report(&self, outcome: Outcome) -> TransferReport {
        TransferReport {
            outcome,
            connection_id: self.conn_id,
            bytes_sent: self.window.blseek(),
            retransmit_drops: self.retransmit_drops,
        }
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    /// Returns `false` when the connection timer expired first.
    async fn handshake(&mut self) -> bool {
        let syn = Packet::control(INIT_CLIENT_SEQ, 0, 0, flags::SYN);
        self.send(&syn, false).await;
        self.timers.start(TimerKind::Connection);
        self.timers.start(TimerKind::SynRetry);

        loop {
            if self
                .timers
                .expired(TimerKind::Connection, self.config.connection_timeout)
            {
                return false;
            }
            if self
                .timers
                .expired(TimerKind::SynRetry, self.config.retransmission_timeout)
            {
                log::debug!("[client] retransmitting SYN");
                self.send(&syn, true).await;
                self.timers.start(TimerKind::SynRetry);
            }

            let Some(pkt) = self.next_packet(self.config.poll_interval).await else {
                continue;
            };
            if pkt.is_syn()
                && pkt.is_ack()
                && !pkt.is_fin()
                && pkt.header.seq == INIT_SERVER_SEQ
                && pkt.header.ack == seq_add(INIT_CLIENT_SEQ, 1)
                && pkt.header.conn_id != 0
            {
                self.trace.record(TraceEvent::recv(&pkt));
                self.conn_id = pkt.header.conn_id;
                self.ack_number = seq_add(pkt.header.seq, 1);
                self.sequence_number = seq_add(INIT_CLIENT_SEQ, 1);
                self.timers.stop(TimerKind::SynRetry);
                self.state = ClientState::Established;
                return true;
            }
            log::debug!("[client] not a SYN-ACK for our SYN: {:?}", pkt.header);
            self.trace.record(TraceEvent::drop(&pkt));
        }
    }

    // -----------------------------------------------------------------------
    // Data transfer
    // -----------------------------------------------------------------------

    /// Returns `Ok(false)` when the server went silent.
    async fn transfer(&mut self) -> Result<bool> {
        self.timers.start(TimerKind::Connection);
        loop {
            if self
                .timers
                .expired(TimerKind::Connection, self.config.connection_timeout)
            {
                return Ok(false);
            }

            if self.window.retransmit_due(self.config.retransmission_timeout) {
                self.drop_window();
            }

            let created = self.fill_window().await?;

            for out in self.window.take_unsent() {
                self.send(&out.packet, out.dup).await;
            }

            if created == 0 && self.source_exhausted() && self.window.all_acked() {
                self.sequence_number = self.window.next_seq();
                return Ok(true);
            }

            self.drain_acks().await;
        }
    }

    fn source_exhausted(&self) -> bool {
        self.window.flseek() >= self.source_len
    }

    fn available_window(&self) -> u64 {
        u64::from(self.cc.cwnd()).saturating_sub(self.window.outstanding_bytes())
    }

    /// Read as much of the file as the congestion window allows and cut it
    /// into segments.  Returns the number of segments created.
    async fn fill_window(&mut self) -> Result<usize> {
        let remaining = self.source_len - self.window.flseek().min(self.source_len);
        let n = self.available_window().min(remaining) as usize;
        if n == 0 {
            return Ok(0);
        }

        let mut buf = vec![0u8; n];
        self.source
            .seek(SeekFrom::Start(self.window.flseek()))
            .await
            .map_err(TransferError::SourceFile)?;
        self.source
            .read_exact(&mut buf)
            .await
            .map_err(TransferError::SourceFile)?;

        let mut created = 0;
        for chunk in buf.chunks(MAX_PAYLOAD_LEN) {
            self.window.push(chunk.to_vec(), self.conn_id, self.ack_number);
            created += 1;
        }
        Ok(created)
    }

    /// Go-back-N: discard the window and shrink the congestion window.
    fn drop_window(&mut self) {
        let dropped = self.window.drop_all();
        self.cc.on_timeout();
        self.retransmit_drops += 1;
        log::debug!(
            "[client] RTO: dropped {} segments, resending from seq {} (cwnd={} ssthresh={})",
            dropped,
            self.window.rel_seq(),
            self.cc.cwnd(),
            self.cc.ssthresh()
        );
    }

    /// Process every datagram that arrives within one poll interval.
    async fn drain_acks(&mut self) {
        let mut wait = self.config.poll_interval;
        while let Some(pkt) = self.next_packet(wait).await {
            wait = Duration::ZERO;
            self.on_ack(&pkt);
        }
    }

    fn on_ack(&mut self, pkt: &Packet) {
        if pkt.header.conn_id != self.conn_id {
            log::debug!("[client] packet for connection {}", pkt.header.conn_id);
            self.trace.record(TraceEvent::drop(pkt));
            return;
        }
        self.timers.start(TimerKind::Connection);

        if !pkt.is_ack() {
            self.trace.record(TraceEvent::drop(pkt));
            return;
        }
        match self.window.mark_ack(pkt.header.ack) {
            AckOutcome::Accepted { newly_acked } => {
                self.trace.record(TraceEvent::recv(pkt));
                let freed = self.window.shift_window();
                let grown = self.cc.on_ack();
                log::trace!(
                    "[client] ack {} covered {} segments, freed {} bytes, cwnd={} (+{})",
                    pkt.header.ack,
                    newly_acked,
                    freed,
                    self.cc.cwnd(),
                    grown
                );
            }
            outcome @ (AckOutcome::Duplicate | AckOutcome::OutOfWindow) => {
                log::trace!("[client] ack {}: {:?}", pkt.header.ack, outcome);
                self.trace.record(TraceEvent::drop(pkt));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Handwave
    // -----------------------------------------------------------------------

    async fn handwave(&mut self) {
        self.state = ClientState::Closing;
        let fin_seq = self.sequence_number;
        let fin = Packet::control(fin_seq, 0, self.conn_id, flags::FIN);
        self.sequence_number = seq_add(fin_seq, 1);

        self.send(&fin, false).await;
        self.timers.start(TimerKind::FinRetry);
        self.timers.start(TimerKind::Connection);

        // Whether the server's FIN has been acknowledged at least once.
        let mut closing_acked = false;
        loop {
            if self
                .timers
                .expired(TimerKind::Connection, self.config.connection_timeout)
            {
                log::warn!(
                    "[client] FIN on connection {} never answered; closing",
                    self.conn_id
                );
                return;
            }
            if self
                .timers
                .expired(TimerKind::FinRetry, self.config.retransmission_timeout)
            {
                self.send(&fin, true).await;
                self.timers.start(TimerKind::FinRetry);
            }

            let Some(pkt) = self.next_packet(self.config.poll_interval).await else {
                continue;
            };
            if self.answers_fin(&pkt) {
                self.trace.record(TraceEvent::recv(&pkt));
                if pkt.is_fin() {
                    self.send_closing_ack(&pkt, false).await;
                    closing_acked = true;
                }
                break;
            }
            self.trace.record(TraceEvent::drop(&pkt));
        }
        self.timers.stop(TimerKind::FinRetry);

        // Stay around long enough to re-acknowledge a retransmitted FIN in
        // case our closing ACK was lost.
        self.timers.start(TimerKind::FinEnd);
        while !self
            .timers
            .expired(TimerKind::FinEnd, self.config.client_end_timeout)
        {
            let Some(pkt) = self.next_packet(self.config.poll_interval).await else {
                continue;
            };
            if pkt.header.conn_id == self.conn_id && pkt.is_fin() {
                self.trace.record(TraceEvent::recv(&pkt));
                self.send_closing_ack(&pkt, closing_acked).await;
                closing_acked = true;
            } else {
                self.trace.record(TraceEvent::drop(&pkt));
            }
        }
    }

    fn answers_fin(&self, pkt: &Packet) -> bool {
        pkt.header.conn_id == self.conn_id
            && pkt.is_ack()
            && !pkt.is_syn()
            && pkt.header.seq == self.ack_number
            && pkt.header.ack == self.sequence_number
    }

    async fn send_closing_ack(&mut self, fin: &Packet, dup: bool) {
        let ack = Packet::control(
            self.sequence_number,
            seq_add(fin.header.seq, 1),
            self.conn_id,
            flags::ACK,
        );
        self.send(&ack, dup).await;
    }

    // -----------------------------------------------------------------------
    // I/O
    // -----------------------------------------------------------------------

    async fn send(&mut self, packet: &Packet, dup: bool) {
        self.trace.record(TraceEvent::send(packet, dup));
        if let Err(e) = self.transport.send_to(&packet.encode(), self.peer).await {
            log::warn!("[client] send to {} failed: {e}", self.peer);
        }
    }

    /// Next well-formed packet from the server, waiting at most `wait`.
    ///
    /// Datagrams from other addresses and undecodable ones are skipped.
    async fn next_packet(&mut self, wait: Duration) -> Option<Packet> {
        let mut buf = [0u8; MAX_PACKET_LEN + 1];
        loop {
            let (n, from) = recv_within(&self.transport, &mut buf, wait).await?;
            if from != self.peer {
                log::debug!("[client] ignoring datagram from {from}");
                continue;
            }
            match Packet::decode(&buf[..n]) {
                Ok(pkt) => return Some(pkt),
                Err(e) => log::debug!("[client] discarding datagram: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::simulator::{memory_pair, MemoryTransport};
    use crate::trace::MemoryTrace;

    fn addrs() -> (SocketAddr, SocketAddr) {
        (
            "127.0.0.1:40000".parse().unwrap(),
            "127.0.0.1:50000".parse().unwrap(),
        )
    }

    async fn client_for(
        data: Vec<u8>,
        trace: &MemoryTrace,
    ) -> (Client<MemoryTransport, Cursor<Vec<u8>>>, MemoryTransport) {
        let (client_addr, server_addr) = addrs();
        let (c, s) = memory_pair(client_addr, server_addr);
        let client = Client::new(
            c,
            server_addr,
            Cursor::new(data),
            TimerConfig::default(),
            Box::new(trace.clone()),
        )
        .await
        .unwrap();
        (client, s)
    }

    async fn recv_packet(t: &MemoryTransport) -> Packet {
        let mut buf = [0u8; MAX_PACKET_LEN];
        let (n, _) = t.recv_from(&mut buf).await.unwrap();
        Packet::decode(&buf[..n]).unwrap()
    }

    async fn send_packet(t: &MemoryTransport, p: &Packet) {
        let (client_addr, _) = addrs();
        t.send_to(&p.encode(), client_addr).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_times_out_handshake() {
        let trace = MemoryTrace::new();
        let (client, _server) = client_for(b"data".to_vec(), &trace).await;

        let report = client.run().await.unwrap();
        assert_eq!(report.outcome, Outcome::HandshakeTimedOut);
        assert_eq!(report.connection_id, 0);
        assert_eq!(report.bytes_sent, 0);

        let lines = trace.lines();
        assert_eq!(lines[0], "SEND 12345 0 0 SYN");
        assert!(lines[1..].iter().all(|l| l == "SEND 12345 0 0 SYN DUP"));
        // One SYN every RTO for the whole connection timeout.
        assert!(lines.len() >= 19, "only {} SYNs", lines.len());
    }

    #[tokio::test(start_paused = true)]
    async fn syn_ack_with_wrong_ack_is_dropped() {
        let trace = MemoryTrace::new();
        let (client, server) = client_for(Vec::new(), &trace).await;

        let peer = async {
            recv_packet(&server).await;
            let bogus = Packet::control(INIT_SERVER_SEQ, 999, 3, flags::SYN | flags::ACK);
            send_packet(&server, &bogus).await;
        };
        let (report, ()) = tokio::join!(client.run(), peer);

        assert_eq!(report.unwrap().outcome, Outcome::HandshakeTimedOut);
        assert!(trace.lines().contains(&"DROP 4321 999 3 ACK SYN".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_file_handshake_and_handwave() {
        let trace = MemoryTrace::new();
        let (client, server) = client_for(Vec::new(), &trace).await;

        let peer = async {
            let syn = recv_packet(&server).await;
            assert!(syn.is_syn());
            let syn_ack = Packet::control(INIT_SERVER_SEQ, 12346, 7, flags::SYN | flags::ACK);
            send_packet(&server, &syn_ack).await;

            let fin = recv_packet(&server).await;
            assert!(fin.is_fin());
            assert_eq!(fin.header.seq, 12346);
            assert_eq!(fin.header.conn_id, 7);
            let fin_ack = Packet::control(4322, 12347, 7, flags::FIN | flags::ACK);
            send_packet(&server, &fin_ack).await;

            let ack = recv_packet(&server).await;
            assert_eq!(ack.header.seq, 12347);
            assert_eq!(ack.header.ack, 4323);
            assert!(ack.is_ack() && !ack.is_fin());
        };
        let (report, ()) = tokio::join!(client.run(), peer);
        let report = report.unwrap();

        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.connection_id, 7);
        assert_eq!(report.bytes_sent, 0);
        assert_eq!(
            trace.lines(),
            vec![
                "SEND 12345 0 0 SYN",
                "RECV 4321 12346 7 ACK SYN",
                "SEND 12346 0 7 FIN",
                "RECV 4322 12347 7 ACK FIN",
                "SEND 12347 4323 7 ACK",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_segments_piggyback_handshake_ack() {
        let trace = MemoryTrace::new();
        let (client, server) = client_for(vec![7u8; 1000], &trace).await;

        let peer = async {
            recv_packet(&server).await;
            let syn_ack = Packet::control(INIT_SERVER_SEQ, 12346, 1, flags::SYN | flags::ACK);
            send_packet(&server, &syn_ack).await;

            // Initial cwnd is one segment.
            let first = recv_packet(&server).await;
            assert_eq!(first.header.seq, 12346);
            assert_eq!(first.header.ack, 4322);
            assert!(first.is_ack());
            assert_eq!(first.payload.len(), 512);

            let ack = Packet::control(4322, 12346 + 512, 1, flags::ACK);
            send_packet(&server, &ack).await;

            // After the first ACK new segments no longer carry the flag.
            let second = recv_packet(&server).await;
            assert_eq!(second.header.seq, 12346 + 512);
            assert!(!second.is_ack());
            assert_eq!(second.payload.len(), 488);
        };
        // The peer stops answering, so the client eventually gives up.
        let (report, ()) = tokio::join!(client.run(), peer);
        let report = report.unwrap();
        assert_eq!(report.outcome, Outcome::ConnectionTimedOut);
        assert_eq!(report.bytes_sent, 512);
        assert!(report.retransmit_drops > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unacked_segment_triggers_go_back_n() {
        let trace = MemoryTrace::new();
        let (client, server) = client_for(vec![1u8; 100], &trace).await;

        let peer = async {
            recv_packet(&server).await;
            let syn_ack = Packet::control(INIT_SERVER_SEQ, 12346, 2, flags::SYN | flags::ACK);
            send_packet(&server, &syn_ack).await;

            let original = recv_packet(&server).await;
            let resent = recv_packet(&server).await;
            assert_eq!(original.header.seq, resent.header.seq);
            assert_eq!(original.payload, resent.payload);

            let ack = Packet::control(4322, 12446, 2, flags::ACK);
            send_packet(&server, &ack).await;

            let fin = recv_packet(&server).await;
            assert!(fin.is_fin());
            assert_eq!(fin.header.seq, 12446);
            let fin_ack = Packet::control(4322, 12447, 2, flags::FIN | flags::ACK);
            send_packet(&server, &fin_ack).await;
            recv_packet(&server).await;
        };
        let (report, ()) = tokio::join!(client.run(), peer);
        let report = report.unwrap();

        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.bytes_sent, 100);
        assert_eq!(report.retransmit_drops, 1);
        assert!(trace.lines().contains(&"SEND 12346 4322 2 ACK DUP".to_string()));
    }

    /// Connect an empty-file client as connection 7 and return the FIN it sends.
    async fn accept_empty(server: &MemoryTransport) -> Packet {
        recv_packet(server).await;
        let syn_ack = Packet::control(INIT_SERVER_SEQ, 12346, 7, flags::SYN | flags::ACK);
        send_packet(server, &syn_ack).await;
        recv_packet(server).await
    }

    #[tokio::test(start_paused = true)]
    async fn plain_ack_then_fin_ack_is_acknowledged() {
        let trace = MemoryTrace::new();
        let (client, server) = client_for(Vec::new(), &trace).await;

        let peer = async {
            accept_empty(&server).await;
            send_packet(&server, &Packet::control(4322, 12347, 7, flags::ACK)).await;
            let fin_ack = Packet::control(4322, 12347, 7, flags::FIN | flags::ACK);
            send_packet(&server, &fin_ack).await;
            let first = recv_packet(&server).await;
            assert_eq!((first.header.seq, first.header.ack), (12347, 4323));

            // The closing ACK "got lost": the FIN-ACK comes again.
            send_packet(&server, &fin_ack).await;
            let second = recv_packet(&server).await;
            assert_eq!(first, second);
        };
        let (report, ()) = tokio::join!(client.run(), peer);

        assert_eq!(report.unwrap().outcome, Outcome::Completed);
        assert_eq!(
            trace.lines()[2..].to_vec(),
            vec![
                "SEND 12346 0 7 FIN",
                "RECV 4322 12347 7 ACK",
                "RECV 4322 12347 7 ACK FIN",
                "SEND 12347 4323 7 ACK",
                "RECV 4322 12347 7 ACK FIN",
                "SEND 12347 4323 7 ACK DUP",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retransmitted_fin_ack_is_reacknowledged_in_grace() {
        let trace = MemoryTrace::new();
        let (client, server) = client_for(Vec::new(), &trace).await;

        let peer = async {
            accept_empty(&server).await;
            let fin_ack = Packet::control(4322, 12347, 7, flags::FIN | flags::ACK);
            send_packet(&server, &fin_ack).await;
            recv_packet(&server).await;

            tokio::time::sleep(Duration::from_millis(800)).await;
            send_packet(&server, &fin_ack).await;
            let again = recv_packet(&server).await;
            assert_eq!((again.header.seq, again.header.ack), (12347, 4323));
            assert!(again.is_ack() && !again.is_fin());
        };
        let (report, ()) = tokio::join!(client.run(), peer);

        assert_eq!(report.unwrap().outcome, Outcome::Completed);
        let lines = trace.lines();
        assert_eq!(
            lines[lines.len() - 2..].to_vec(),
            vec!["RECV 4322 12347 7 ACK FIN", "SEND 12347 4323 7 ACK DUP"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_fin_is_resent_until_connection_timeout() {
        let trace = MemoryTrace::new();
        let (client, server) = client_for(Vec::new(), &trace).await;

        let started = tokio::time::Instant::now();
        let peer = async {
            let fin = accept_empty(&server).await;
            assert!(fin.is_fin());
        };
        let (report, ()) = tokio::join!(client.run(), peer);
        let report = report.unwrap();

        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.connection_id, 7);
        assert!(started.elapsed() >= Duration::from_secs(10));

        let lines = trace.lines();
        assert_eq!(lines[2], "SEND 12346 0 7 FIN");
        assert!(lines[3..].iter().all(|l| l == "SEND 12346 0 7 FIN DUP"));
        // One FIN every RTO for the whole connection timeout.
        assert!(lines.len() - 3 >= 15, "only {} FIN resends", lines.len() - 3);
    }
}
