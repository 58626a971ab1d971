//! Engine-level error type shared by the sender and receiver engines.

use crate::socket::SocketError;

/// Errors that terminate an engine's event loop.
///
/// Recoverable conditions (bad checksums, duplicates, timeouts) are handled
/// inside the loops and never surface here.
#[derive(Debug)]
pub enum EngineError {
    /// The datagram layer failed; sends over loopback are not expected to
    /// fail, so this is fatal.
    Socket(SocketError),
    /// The output sink went away while payloads were still arriving.
    SinkClosed,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Socket(e) => write!(f, "datagram transport failed: {e}"),
            Self::SinkClosed => write!(f, "output sink closed"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Socket(e) => Some(e),
            Self::SinkClosed => None,
        }
    }
}

impl From<SocketError> for EngineError {
    fn from(e: SocketError) -> Self {
        Self::Socket(e)
    }
}
