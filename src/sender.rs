//! Send-side engine: framing, pipelined transmission, retransmission.
//!
//! [`Sender`] drives one direction of a transfer.  It reads input lines from
//! an `mpsc` channel, frames them into data packets, and keeps up to a
//! window's worth in flight while reacting to acknowledgements and timer
//! ticks.  The event loop multiplexes three readiness sources with
//! `tokio::select!`:
//!
//! 1. **Input line** — eligible only while the channel is open *and* the
//!    window has a reservable sequence, so a full window back-pressures the
//!    input instead of spinning.
//! 2. **Inbound datagram** — an ACK releases one slot; a NACK retransmits
//!    the requested packet and releases everything before it (go-back-N); a
//!    malformed datagram retransmits the oldest outstanding slot.
//! 3. **Retry tick** — every [`retry`](crate::config::RdtConfig::retry) the
//!    stale prefix of the window is retransmitted.
//!
//! Delivering the timer through the same readiness mechanism as I/O means
//! the window is only ever touched from one task; there is no critical
//! section to guard.
//!
//! End of input is signalled by the channel closing.  The engine then drains
//! outstanding acknowledgements and finishes with a redundant burst of END
//! packets — END itself is never acknowledged, so the burst compensates for
//! possible loss.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::config::RdtConfig;
use crate::error::EngineError;
use crate::packet::{flags, Packet};
use crate::send_window::SendWindow;
use crate::socket::{SocketError, UdtSocket};

/// Counters accumulated by a [`Sender`] run, returned on completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Input lines framed and transmitted.
    pub lines_sent: u64,
    /// Datagrams handed to the wire, including retransmissions and END.
    pub packets_sent: u64,
    /// Data packets transmitted more than once.
    pub retransmits: u64,
    /// Valid ACK packets processed.
    pub acks_received: u64,
    /// Valid NACK packets processed.
    pub nacks_received: u64,
}

/// Send-side engine state for one transfer.
pub struct Sender {
    socket: UdtSocket,
    peer: SocketAddr,
    window: SendWindow,
    /// Next unused sequence number.
    next_seq: u32,
    config: RdtConfig,
    stats: SenderStats,
}

impl Sender {
    /// Create a sender that delivers to `peer` through `socket`.
    pub fn new(socket: UdtSocket, peer: SocketAddr, config: RdtConfig) -> Self {
        Self {
            socket,
            peer,
            window: SendWindow::new(config.window_size),
            next_seq: 0,
            config,
            stats: SenderStats::default(),
        }
    }

    /// Run the event loop until every input line is delivered, then tear
    /// down with the END burst.
    ///
    /// `lines` yields raw input lines (delimiter included); closing it marks
    /// end of input.  Returns the accumulated counters.
    pub async fn run(mut self, mut lines: mpsc::Receiver<Vec<u8>>) -> Result<SenderStats, EngineError> {
        let mut ticker = tokio::time::interval(self.config.retry);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut input_open = true;

        loop {
            tokio::select! {
                // ── Branch 1: next input line (window-gated) ──────────────
                maybe_line = lines.recv(), if input_open && self.window.is_available() => {
                    match maybe_line {
                        None => {
                            input_open = false;
                            log::debug!("[rdt:snd] input drained, {} in flight", self.window.in_flight());
                            if self.window.is_empty() {
                                break;
                            }
                        }
                        Some(line) => self.transmit_line(line).await?,
                    }
                }

                // ── Branch 2: inbound ACK / NACK ──────────────────────────
                result = self.socket.recv_from() => {
                    match result {
                        Ok((pkt, addr)) => {
                            if addr != self.peer {
                                continue;
                            }
                            self.on_packet(pkt).await?;
                            if !input_open && self.window.is_empty() {
                                break;
                            }
                        }
                        // Mangled on the way back; nudge the oldest slot.
                        Err(SocketError::Packet(e)) => {
                            log::warn!("[rdt:snd] ← malformed packet ({e:?})");
                            self.resend_oldest().await?;
                        }
                        Err(e @ SocketError::Io(_)) => return Err(e.into()),
                    }
                }

                // ── Branch 3: retransmit sweep ────────────────────────────
                _ = ticker.tick() => self.resend_expired().await?,
            }
        }

        self.finish().await?;
        log::info!(
            "[rdt:snd] done: {} line(s), {} packet(s), {} retransmit(s)",
            self.stats.lines_sent,
            self.stats.packets_sent,
            self.stats.retransmits
        );
        Ok(self.stats)
    }

    /// Frame one input line (truncating at the payload limit), transmit it,
    /// and park it in the window.
    async fn transmit_line(&mut self, line: Vec<u8>) -> Result<(), EngineError> {
        let packet = Packet::data(self.next_seq, line);
        self.socket.send_to(&packet, self.peer).await?;
        self.stats.packets_sent += 1;
        self.stats.lines_sent += 1;
        log::debug!(
            "[rdt:snd] → DATA seq={} len={} in_flight={}",
            packet.seq,
            packet.payload.len(),
            self.window.in_flight() + 1
        );
        let stored = self.window.store(self.next_seq, packet);
        debug_assert!(stored, "fresh sequence must land in a vacant slot");
        self.window.mark_sent(self.next_seq, Instant::now());
        self.next_seq += 1;
        Ok(())
    }

    /// Handle a validated inbound packet.
    async fn on_packet(&mut self, pkt: Packet) -> Result<(), EngineError> {
        if pkt.has_flags(flags::ACK) {
            self.stats.acks_received += 1;
            let released = self.window.remove(pkt.seq);
            log::debug!(
                "[rdt:snd] ← ACK seq={} released={} first_seq={}",
                pkt.seq,
                released,
                self.window.first_seq()
            );
        } else if pkt.has_flags(flags::NACK) {
            self.stats.nacks_received += 1;
            log::debug!("[rdt:snd] ← NACK seq={}", pkt.seq);
            if self.window.get(pkt.seq).is_some() {
                self.resend(pkt.seq).await?;
                // Everything before the requested sequence was received;
                // the NACK doubles as a cumulative acknowledgement.
                self.window.remove_through(pkt.seq);
            }
        }
        Ok(())
    }

    /// Retransmit the stored packet for `seq` and refresh its timestamp.
    async fn resend(&mut self, seq: u32) -> Result<(), EngineError> {
        if let Some(packet) = self.window.get(seq).cloned() {
            self.socket.send_to(&packet, self.peer).await?;
            self.window.mark_sent(seq, Instant::now());
            self.stats.packets_sent += 1;
            self.stats.retransmits += 1;
            log::debug!("[rdt:snd] ↻ DATA seq={} (retransmit)", seq);
        }
        Ok(())
    }

    /// Retransmit the oldest outstanding slot, if any.
    async fn resend_oldest(&mut self) -> Result<(), EngineError> {
        if !self.window.is_empty() {
            self.resend(self.window.first_seq()).await?;
        }
        Ok(())
    }

    /// Retransmit the stale prefix of the window.
    async fn resend_expired(&mut self) -> Result<(), EngineError> {
        for seq in self.window.expired(Instant::now(), self.config.link_delay) {
            self.resend(seq).await?;
        }
        Ok(())
    }

    /// Emit the END burst: redundant copies separated by a small delay.
    async fn finish(&mut self) -> Result<(), EngineError> {
        let end = Packet::end();
        for i in 1..=self.config.end_burst {
            self.socket.send_to(&end, self.peer).await?;
            self.stats.packets_sent += 1;
            log::debug!("[rdt:snd] → END ({i}/{})", self.config.end_burst);
            tokio::time::sleep(self.config.end_gap).await;
        }
        Ok(())
    }
}
