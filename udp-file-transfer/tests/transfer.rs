//! End-to-end transfers between a client and a server over in-memory links.
//!
//! Both endpoints run in the same task on a paused tokio clock: the client's
//! `run` future is polled alongside repeated `Server::step` calls, and the
//! runtime auto-advances time whenever both sides are waiting.

use std::io::Cursor;
use std::net::SocketAddr;

use udp_file_transfer::simulator::{memory_pair, LossyTransport, SimulatorConfig};
use udp_file_transfer::socket::Transport;
use udp_file_transfer::timer::TimerConfig;
use udp_file_transfer::trace::{Direction, MemoryTrace, NullTrace};
use udp_file_transfer::{Client, Outcome, SaveDir, Server, TransferReport};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn addrs() -> (SocketAddr, SocketAddr) {
    (
        "127.0.0.1:41000".parse().unwrap(),
        "127.0.0.1:9000".parse().unwrap(),
    )
}

/// Deterministic, non-trivial file contents.
fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Run the client to completion while stepping the server, then keep
/// stepping until the server has released every connection.
async fn drive<C, S>(
    client: Client<C, Cursor<Vec<u8>>>,
    server: &mut Server<S>,
) -> TransferReport
where
    C: Transport,
    S: Transport,
{
    let client_run = client.run();
    tokio::pin!(client_run);
    let report = loop {
        tokio::select! {
            report = &mut client_run => break report.expect("client failed"),
            step = server.step() => step.expect("server failed"),
        }
    };

    for _ in 0..5_000 {
        if server.connection_count() == 0 {
            break;
        }
        server.step().await.expect("server failed");
    }
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn lossless_transfer_delivers_file() {
    let (client_addr, server_addr) = addrs();
    let (client_end, server_end) = memory_pair(client_addr, server_addr);
    let dir = tempfile::tempdir().unwrap();
    let trace = MemoryTrace::new();

    let mut server = Server::new(
        server_end,
        SaveDir::new(dir.path()),
        TimerConfig::default(),
        Box::new(NullTrace),
    );
    let data = payload(2000);
    let client = Client::new(
        client_end,
        server_addr,
        Cursor::new(data.clone()),
        TimerConfig::default(),
        Box::new(trace.clone()),
    )
    .await
    .unwrap();

    let report = drive(client, &mut server).await;

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.connection_id, 1);
    assert_eq!(report.bytes_sent, 2000);
    assert_eq!(report.retransmit_drops, 0);
    assert_eq!(server.connection_count(), 0);

    let received = std::fs::read(dir.path().join("1.file")).unwrap();
    assert_eq!(received, data);

    // Nothing was lost, so nothing was resent or dropped.
    let events = trace.events();
    assert!(events.iter().all(|e| !e.dup));
    assert!(events.iter().all(|e| e.direction != Direction::Drop));
    assert_eq!(trace.lines()[0], "SEND 12345 0 0 SYN");
}

#[tokio::test(start_paused = true)]
async fn every_third_datagram_lost_both_ways() {
    let (client_addr, server_addr) = addrs();
    let (client_end, server_end) = memory_pair(client_addr, server_addr);
    let dir = tempfile::tempdir().unwrap();

    let mut server = Server::new(
        LossyTransport::new(server_end, SimulatorConfig::drop_every(3)),
        SaveDir::new(dir.path()),
        TimerConfig::default(),
        Box::new(NullTrace),
    );
    let data = payload(5000);
    let trace = MemoryTrace::new();
    let client = Client::new(
        LossyTransport::new(client_end, SimulatorConfig::drop_every(3)),
        server_addr,
        Cursor::new(data.clone()),
        TimerConfig::default(),
        Box::new(trace.clone()),
    )
    .await
    .unwrap();

    let report = drive(client, &mut server).await;

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.bytes_sent, 5000);
    assert!(report.retransmit_drops > 0);
    assert_eq!(server.connection_count(), 0);

    let received =
        std::fs::read(dir.path().join(format!("{}.file", report.connection_id))).unwrap();
    assert_eq!(received, data);
    assert!(trace.events().iter().any(|e| e.dup));
}

#[tokio::test(start_paused = true)]
async fn seeded_random_loss_still_delivers() {
    let (client_addr, server_addr) = addrs();
    let (client_end, server_end) = memory_pair(client_addr, server_addr);
    let dir = tempfile::tempdir().unwrap();

    let mut server = Server::new(
        LossyTransport::new(server_end, SimulatorConfig::lossy(0.1, 11)),
        SaveDir::new(dir.path()),
        TimerConfig::default(),
        Box::new(NullTrace),
    );
    let data = payload(20_000);
    let client = Client::new(
        LossyTransport::new(client_end, SimulatorConfig::lossy(0.1, 29)),
        server_addr,
        Cursor::new(data.clone()),
        TimerConfig::default(),
        Box::new(NullTrace),
    )
    .await
    .unwrap();

    let report = drive(client, &mut server).await;

    assert_eq!(report.outcome, Outcome::Completed);
    let received =
        std::fs::read(dir.path().join(format!("{}.file", report.connection_id))).unwrap();
    assert_eq!(received, data);
}

#[tokio::test(start_paused = true)]
async fn empty_file_produces_empty_output() {
    let (client_addr, server_addr) = addrs();
    let (client_end, server_end) = memory_pair(client_addr, server_addr);
    let dir = tempfile::tempdir().unwrap();

    let mut server = Server::new(
        server_end,
        SaveDir::new(dir.path()),
        TimerConfig::default(),
        Box::new(NullTrace),
    );
    let client = Client::new(
        client_end,
        server_addr,
        Cursor::new(Vec::new()),
        TimerConfig::default(),
        Box::new(NullTrace),
    )
    .await
    .unwrap();

    let report = drive(client, &mut server).await;

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.bytes_sent, 0);
    let received = std::fs::read(dir.path().join("1.file")).unwrap();
    assert!(received.is_empty());
}

#[tokio::test(start_paused = true)]
async fn file_larger_than_window_crosses_sequence_wrap() {
    // 102_400 sequence numbers wrap before 120 KB have been sent.
    let (client_addr, server_addr) = addrs();
    let (client_end, server_end) = memory_pair(client_addr, server_addr);
    let dir = tempfile::tempdir().unwrap();

    let mut server = Server::new(
        server_end,
        SaveDir::new(dir.path()),
        TimerConfig::default(),
        Box::new(NullTrace),
    );
    let data = payload(120_000);
    let client = Client::new(
        client_end,
        server_addr,
        Cursor::new(data.clone()),
        TimerConfig::default(),
        Box::new(NullTrace),
    )
    .await
    .unwrap();

    let report = drive(client, &mut server).await;

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.bytes_sent, 120_000);
    let received = std::fs::read(dir.path().join("1.file")).unwrap();
    assert_eq!(received, data);
}
