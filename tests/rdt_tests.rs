//! End-to-end tests for the reliable-delivery engines.
//!
//! Each test spins up a sender engine and a receiver engine as separate
//! tokio tasks talking over loopback, usually with the fault-injecting
//! [`Simulator`] relay in between.  Faults are scripted per sequence number,
//! so every scenario is deterministic.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use rdt_over_udp::{
    config::RdtConfig,
    receiver::{Receiver, ReceiverStats},
    sender::{Sender, SenderStats},
    simulator::{FaultPlan, Simulator},
    socket::UdtSocket,
};

/// Bind a socket to an OS-assigned port on loopback.
async fn ephemeral() -> UdtSocket {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    UdtSocket::bind(addr).await.expect("bind failed")
}

/// Default protocol parameters with the timing knobs shrunk so loss-recovery
/// scenarios finish quickly.
fn fast_config() -> RdtConfig {
    RdtConfig {
        retry: Duration::from_millis(50),
        link_delay: Duration::from_millis(150),
        ..RdtConfig::default()
    }
}

/// Drive a complete transfer of `lines` through the simulator with the given
/// fault plan.  Returns the bytes the receiver emitted plus both engines'
/// counters.
async fn run_transfer(
    lines: &[&[u8]],
    plan: FaultPlan,
    config: RdtConfig,
) -> (Vec<u8>, SenderStats, ReceiverStats) {
    let snd_sock = ephemeral().await;
    let rcv_sock = ephemeral().await;

    let sim = Simulator::bind(snd_sock.local_addr, rcv_sock.local_addr, plan)
        .await
        .expect("simulator bind");
    let snd_peer = sim.sender_facing_addr().expect("sender-facing addr");
    let rcv_peer = sim.receiver_facing_addr().expect("receiver-facing addr");
    tokio::spawn(sim.run());

    let (line_tx, line_rx) = mpsc::channel(1);
    let (sink_tx, mut sink_rx) = mpsc::channel(32);

    let sender = tokio::spawn(Sender::new(snd_sock, snd_peer, config.clone()).run(line_rx));
    let receiver = tokio::spawn(Receiver::new(rcv_sock, rcv_peer, config).run(sink_tx));

    // Feed the input, then drop the channel to signal EOF.
    let feed = {
        let lines: Vec<Vec<u8>> = lines.iter().map(|l| l.to_vec()).collect();
        tokio::spawn(async move {
            for line in lines {
                line_tx.send(line).await.expect("feed line");
            }
        })
    };

    // Collect everything the receiver emits until its sink closes.
    let collect = tokio::spawn(async move {
        let mut out = Vec::new();
        while let Some(payload) = sink_rx.recv().await {
            out.extend_from_slice(&payload);
        }
        out
    });

    let joined = timeout(
        Duration::from_secs(10),
        async { tokio::join!(sender, receiver, feed, collect) },
    )
    .await
    .expect("transfer did not terminate");

    let (snd_res, rcv_res, feed_res, out_res) = joined;
    feed_res.unwrap();
    let snd_stats = snd_res.unwrap().expect("sender run failed");
    let rcv_stats = rcv_res.unwrap().expect("receiver run failed");
    (out_res.unwrap(), snd_stats, rcv_stats)
}

// ---------------------------------------------------------------------------
// S1: clean path — lossless channel, exact in-order delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clean_path_delivers_in_order() {
    let lines: &[&[u8]] = &[b"alpha\n", b"beta\n", b"gamma\n"];
    let (out, snd, rcv) = run_transfer(lines, FaultPlan::default(), fast_config()).await;

    assert_eq!(out, b"alpha\nbeta\ngamma\n");
    assert_eq!(snd.lines_sent, 3);
    assert_eq!(snd.retransmits, 0);
    assert_eq!(rcv.payloads_delivered, 3);
    assert_eq!(rcv.duplicates, 0);
    assert_eq!(rcv.nacks_sent, 0);
}

// ---------------------------------------------------------------------------
// S2: a dropped data packet is recovered by the retransmit timer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropped_packet_is_retransmitted_once() {
    let lines: &[&[u8]] = &[b"a\n", b"b\n", b"c\n"];
    let plan = FaultPlan {
        drop_data: vec![1],
        ..FaultPlan::default()
    };
    let (out, snd, rcv) = run_transfer(lines, plan, fast_config()).await;

    assert_eq!(out, b"a\nb\nc\n");
    assert_eq!(snd.retransmits, 1, "exactly the dropped packet is resent");
    assert_eq!(rcv.payloads_delivered, 3);
}

// ---------------------------------------------------------------------------
// S3: reordering — a later sequence overtakes an earlier one
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reordered_packet_is_buffered_until_gap_fills() {
    let lines: &[&[u8]] = &[b"a\n", b"b\n", b"c\n"];
    let plan = FaultPlan {
        hold_data: vec![1],
        ..FaultPlan::default()
    };
    let (out, _snd, rcv) = run_transfer(lines, plan, fast_config()).await;

    assert_eq!(out, b"a\nb\nc\n", "emission order survives reordering");
    assert_eq!(rcv.payloads_delivered, 3);
    assert_eq!(rcv.duplicates, 0);
}

// ---------------------------------------------------------------------------
// S4: corruption — checksum failure triggers NACK and retransmission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn corrupted_packet_triggers_nack_and_recovery() {
    let lines: &[&[u8]] = &[b"a\n", b"b\n", b"c\n"];
    let plan = FaultPlan {
        corrupt_data: vec![0],
        ..FaultPlan::default()
    };
    let (out, snd, rcv) = run_transfer(lines, plan, fast_config()).await;

    assert_eq!(out, b"a\nb\nc\n");
    assert!(rcv.nacks_sent >= 1, "checksum failure must be NACKed");
    assert!(snd.nacks_received >= 1);
    assert!(snd.retransmits >= 1);
}

// ---------------------------------------------------------------------------
// S5: an over-long line is truncated to the payload limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversize_line_truncates_to_eighty_bytes() {
    let mut long_line = vec![b'x'; 200];
    long_line.push(b'\n');
    let lines: &[&[u8]] = &[&long_line];
    let (out, snd, _rcv) = run_transfer(lines, FaultPlan::default(), fast_config()).await;

    assert_eq!(out, vec![b'x'; 80], "exactly the first 80 bytes arrive");
    assert_eq!(snd.lines_sent, 1, "one packet for the truncated line");
}

// ---------------------------------------------------------------------------
// S6: teardown robustness — most of the END burst is lost
// ---------------------------------------------------------------------------

#[tokio::test]
async fn teardown_survives_four_of_five_end_drops() {
    let lines: &[&[u8]] = &[b"last words\n"];
    let plan = FaultPlan {
        drop_end: 4,
        ..FaultPlan::default()
    };
    // run_transfer's timeout doubles as the termination assertion.
    let (out, snd, _rcv) = run_transfer(lines, plan, fast_config()).await;

    assert_eq!(out, b"last words\n");
    assert_eq!(snd.lines_sent, 1);
}

// ---------------------------------------------------------------------------
// Combined faults — drops, corruption, and reordering on one stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_survives_combined_faults() {
    let lines: Vec<Vec<u8>> = (0..10)
        .map(|i| format!("line {i:02}\n").into_bytes())
        .collect();
    let line_refs: Vec<&[u8]> = lines.iter().map(|l| l.as_slice()).collect();
    let plan = FaultPlan {
        drop_data: vec![0, 4, 7],
        corrupt_data: vec![2],
        hold_data: vec![5],
        drop_end: 2,
    };
    let (out, snd, rcv) = run_transfer(&line_refs, plan, fast_config()).await;

    let expected: Vec<u8> = lines.concat();
    assert_eq!(out, expected);
    assert_eq!(snd.lines_sent, 10);
    assert!(snd.retransmits >= 4, "three drops and one corruption recovered");
    assert_eq!(rcv.payloads_delivered, 10);
}

// ---------------------------------------------------------------------------
// Direct loopback — engines wired to each other, no relay in between
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_transfer_without_relay() {
    const MSG_COUNT: usize = 20;

    let snd_sock = ephemeral().await;
    let rcv_sock = ephemeral().await;
    let snd_peer = rcv_sock.local_addr;
    let rcv_peer = snd_sock.local_addr;

    let (line_tx, line_rx) = mpsc::channel(1);
    let (sink_tx, mut sink_rx) = mpsc::channel(32);

    let sender = tokio::spawn(Sender::new(snd_sock, snd_peer, fast_config()).run(line_rx));
    let receiver = tokio::spawn(Receiver::new(rcv_sock, rcv_peer, fast_config()).run(sink_tx));

    let feed = tokio::spawn(async move {
        for i in 0..MSG_COUNT {
            let line = format!("msg-{i:02}\n").into_bytes();
            line_tx.send(line).await.expect("feed");
        }
    });

    let collect = tokio::spawn(async move {
        let mut out = Vec::new();
        while let Some(payload) = sink_rx.recv().await {
            out.extend_from_slice(&payload);
        }
        out
    });

    let (snd_res, rcv_res, feed_res, out_res) = timeout(Duration::from_secs(10), async {
        tokio::join!(sender, receiver, feed, collect)
    })
    .await
    .expect("transfer did not terminate");

    feed_res.unwrap();
    let snd_stats = snd_res.unwrap().expect("sender run failed");
    rcv_res.unwrap().expect("receiver run failed");

    let expected: Vec<u8> = (0..MSG_COUNT)
        .flat_map(|i| format!("msg-{i:02}\n").into_bytes())
        .collect();
    assert_eq!(out_res.unwrap(), expected);
    assert_eq!(snd_stats.lines_sent, MSG_COUNT as u64);
    assert_eq!(snd_stats.retransmits, 0, "loopback without faults is clean");
}
