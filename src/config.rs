//! Protocol constants and tunable engine parameters.
//!
//! The constants mirror the protocol defaults; [`RdtConfig`] carries the
//! subset an embedder (or a test) may want to adjust, such as shrinking the
//! timing knobs to keep loss-recovery tests fast.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default peer host for both roles.
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// Default sender-side local port.
pub const SENDER_PORT: u16 = 4030;
/// Default receiver-side local port.
pub const RECEIVER_PORT: u16 = 4040;

/// Send-window capacity (maximum packets in flight).
pub const WINDOW_SIZE: usize = 5;
/// Reorder-buffer capacity; must be ≥ [`WINDOW_SIZE`] so every in-flight
/// sequence fits inside the reorder range.
pub const BUFFER_SIZE: usize = 16;

/// Cadence of the retransmit sweep.
pub const RETRY: Duration = Duration::from_millis(150);
/// Age at which an unacknowledged packet is presumed lost.
pub const LINK_DELAY: Duration = Duration::from_millis(600);

/// How many END packets the sender emits at teardown.
pub const END_BURST: usize = 5;
/// Gap between consecutive END packets.
pub const END_GAP: Duration = Duration::from_micros(100);

/// Maximum bytes consumed from the input source per read; a longer line
/// arrives as multiple frames.
pub const MAX_LINE: usize = 500;

/// Tunable engine parameters.
#[derive(Debug, Clone)]
pub struct RdtConfig {
    /// Send-window capacity.
    pub window_size: usize,
    /// Reorder-buffer capacity.
    pub buffer_size: usize,
    /// Retransmit-sweep cadence.
    pub retry: Duration,
    /// Packet age threshold for retransmission.
    pub link_delay: Duration,
    /// END packets emitted at teardown.
    pub end_burst: usize,
    /// Gap between END packets.
    pub end_gap: Duration,
}

impl Default for RdtConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            buffer_size: BUFFER_SIZE,
            retry: RETRY,
            link_delay: LINK_DELAY,
            end_burst: END_BURST,
            end_gap: END_GAP,
        }
    }
}
