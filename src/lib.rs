//! `rdt-over-udp` — reliable, pipelined, in-order line delivery over an
//! unreliable datagram channel.
//!
//! # Architecture
//!
//! ```text
//!  stdin ──▶ ┌──────────┐   DATA (seq, checksum)   ┌──────────┐ ──▶ stdout
//!            │  Sender  │─────────────────────────▶│ Receiver │
//!            │  engine  │                          │  engine  │
//!            └────┬─────┘◀─────────────────────────└─────┬────┘
//!                 │          ACK / NACK                  │
//!            ┌────▼───────┐                        ┌─────▼──────┐
//!            │ SendWindow │ (in-flight packets +   │ RecvBuffer │ (reorder
//!            │            │  send timestamps)      │            │  + drain)
//!            └────┬───────┘                        └─────┬──────┘
//!                 │         raw UDP datagrams            │
//!            ┌────▼──────────────────────────────────────▼──────┐
//!            │   UdtSocket  (thin async wrapper, packet codec)  │
//!            └──────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]      — wire format (serialise / deserialise, checksum)
//! - [`send_window`] — sliding window of unacknowledged packets
//! - [`recv_buffer`] — reorder buffer driving in-order emission
//! - [`sender`]      — outbound engine: framing, pipelining, retransmits
//! - [`receiver`]    — inbound engine: validation, buffering, ACK/NACK
//! - [`socket`]      — async UDP socket abstraction
//! - [`config`]      — protocol constants and tunables
//! - [`error`]       — engine-level error type
//! - [`simulator`]   — lossy/reorder relay for deterministic tests

pub mod config;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod recv_buffer;
pub mod send_window;
pub mod sender;
pub mod simulator;
pub mod socket;
