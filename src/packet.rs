//! Wire-format definitions for protocol packets.
//!
//! Every datagram exchanged between the sender and the receiver is a
//! [`Packet`].  This module is responsible for:
//! - Defining the on-wire binary layout (header fields, flags, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for truncated, inconsistent, or corrupted input.
//! - Computing and verifying the RFC 1071 internet checksum that guards the
//!   header and payload against bit errors on the channel.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # On-wire layout
//!
//! ```text
//!  offset  0        2            6        8        10
//!          ├────────┼────────────┼────────┼────────┼──────────────┐
//!          │checksum│  sequence  │ length │ flags  │   payload    │
//!          │ u16 BE │   u32 BE   │ u16 BE │ u16 BE │ ≤ 80 bytes   │
//!          └────────┴────────────┴────────┴────────┴──────────────┘
//!                   ◀──────── checksum coverage ────────────────▶
//! ```
//!
//! The checksum is a 16-bit one's-complement sum over everything after the
//! checksum field itself, detecting single-bit flips and most short bursts.
//! It is not a cryptographic integrity check.

/// Bit-flag constants for the `flags` header field.
pub mod flags {
    /// Acknowledgement of a single sequence number.
    pub const ACK: u16 = 0x01;
    /// Negative acknowledgement carrying the first missing sequence number.
    pub const NACK: u16 = 0x02;
    /// Transfer termination — the sender has delivered everything.
    pub const END: u16 = 0x04;
}

/// Byte offset of the checksum field.
const SUM_OFFSET: usize = 0;
/// Byte offset of the sequence-number field.
const SEQ_OFFSET: usize = 2;
/// Byte offset of the payload-length field.
const LEN_OFFSET: usize = 6;
/// Byte offset of the flags field.
const FLAGS_OFFSET: usize = 8;

/// Size of the fixed header in bytes; payload starts here.
pub const HEADER_LEN: usize = 10;
/// Maximum payload carried by a data packet.
pub const MAX_PAYLOAD: usize = 80;
/// Maximum datagram size accepted on the wire.
pub const MAX_DATAGRAM: usize = 100;

/// A complete protocol datagram: header fields + payload bytes.
///
/// The `length` header field is derived from `payload.len()` on encode and
/// validated against the datagram size on decode, so it has no in-memory
/// representation of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Per-direction sequence number, origin 0.
    pub seq: u32,
    /// Bitmask of [`flags`] constants; `0` for data packets.
    pub flags: u16,
    /// Opaque payload bytes; empty for control packets.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a data packet, truncating the payload at [`MAX_PAYLOAD`] bytes.
    ///
    /// Truncation is silent: the tail of an over-long input line is dropped.
    pub fn data(seq: u32, mut payload: Vec<u8>) -> Self {
        payload.truncate(MAX_PAYLOAD);
        Self {
            seq,
            flags: 0,
            payload,
        }
    }

    /// Build an acknowledgement for `seq` (empty payload).
    pub fn ack(seq: u32) -> Self {
        Self {
            seq,
            flags: flags::ACK,
            payload: Vec::new(),
        }
    }

    /// Build a negative acknowledgement requesting retransmission of `seq`
    /// and releasing everything before it (empty payload).
    pub fn nack(seq: u32) -> Self {
        Self {
            seq,
            flags: flags::NACK,
            payload: Vec::new(),
        }
    }

    /// Build the transfer-termination packet.
    pub fn end() -> Self {
        Self {
            seq: 0,
            flags: flags::END,
            payload: Vec::new(),
        }
    }

    /// `true` when any flag in `mask` is set on this packet.
    pub fn has_flags(&self, mask: u16) -> bool {
        self.flags & mask != 0
    }

    /// Serialise this packet into a newly allocated byte vector.
    ///
    /// Writes the fixed header and payload, then computes the checksum over
    /// `[SEQ_OFFSET..]` and stores it at offset 0.  Callers are responsible
    /// for keeping data payloads within [`MAX_PAYLOAD`] (the constructors
    /// enforce this).
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.payload.len() <= MAX_PAYLOAD);
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[SEQ_OFFSET..SEQ_OFFSET + 4].copy_from_slice(&self.seq.to_be_bytes());
        buf[LEN_OFFSET..LEN_OFFSET + 2]
            .copy_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf[FLAGS_OFFSET..FLAGS_OFFSET + 2].copy_from_slice(&self.flags.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        let sum = checksum(&buf[SEQ_OFFSET..]);
        buf[SUM_OFFSET..SUM_OFFSET + 2].copy_from_slice(&sum.to_be_bytes());
        buf
    }

    /// Parse a [`Packet`] from a raw datagram.
    ///
    /// Requires at least a full header, a matching checksum, and a length
    /// field consistent with the datagram size.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort);
        }
        if !verify_checksum(buf) {
            return Err(PacketError::ChecksumFailed);
        }
        let len = u16::from_be_bytes([buf[LEN_OFFSET], buf[LEN_OFFSET + 1]]) as usize;
        if len != buf.len() - HEADER_LEN {
            return Err(PacketError::LengthMismatch);
        }
        let seq = u32::from_be_bytes([
            buf[SEQ_OFFSET],
            buf[SEQ_OFFSET + 1],
            buf[SEQ_OFFSET + 2],
            buf[SEQ_OFFSET + 3],
        ]);
        let flags = u16::from_be_bytes([buf[FLAGS_OFFSET], buf[FLAGS_OFFSET + 1]]);
        Ok(Self {
            seq,
            flags,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

/// Recompute the checksum of a raw datagram and compare it to the stored
/// field.  The datagram must hold at least a full header.
pub fn verify_checksum(buf: &[u8]) -> bool {
    let stored = u16::from_be_bytes([buf[SUM_OFFSET], buf[SUM_OFFSET + 1]]);
    checksum(&buf[SEQ_OFFSET..]) == stored
}

/// RFC 1071 internet checksum over `bytes`.
///
/// Sums 16-bit big-endian words (an odd trailing byte is padded with a zero
/// low byte), folds the carries back into 16 bits, and complements.
fn checksum(bytes: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = bytes.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u32::from(*last) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Datagram shorter than the fixed header size.
    BufferTooShort,
    /// `length` field does not match the actual payload size.
    LengthMismatch,
    /// Checksum did not match the recomputed value.
    ChecksumFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let pkt = Packet::data(7, b"hello\n".to_vec());
        let decoded = Packet::decode(&pkt.encode()).expect("decode");
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn roundtrip_empty_payload() {
        for pkt in [Packet::ack(3), Packet::nack(0), Packet::end()] {
            let bytes = pkt.encode();
            assert_eq!(bytes.len(), HEADER_LEN);
            assert_eq!(Packet::decode(&bytes).expect("decode"), pkt);
        }
    }

    #[test]
    fn roundtrip_max_payload() {
        let pkt = Packet::data(u32::MAX, vec![0xAB; MAX_PAYLOAD]);
        assert_eq!(pkt.payload.len(), MAX_PAYLOAD);
        assert_eq!(Packet::decode(&pkt.encode()).expect("decode"), pkt);
    }

    #[test]
    fn data_constructor_truncates() {
        let pkt = Packet::data(0, vec![b'x'; 200]);
        assert_eq!(pkt.payload.len(), MAX_PAYLOAD);
        assert_eq!(pkt.flags, 0);
    }

    #[test]
    fn decode_short_buffer_returns_error() {
        assert_eq!(Packet::decode(&[]), Err(PacketError::BufferTooShort));
        assert_eq!(
            Packet::decode(&[0u8; HEADER_LEN - 1]),
            Err(PacketError::BufferTooShort)
        );
    }

    #[test]
    fn decode_length_mismatch_returns_error() {
        let mut bytes = Packet::data(1, b"abcd".to_vec()).encode();
        // Rewrite the length field and re-seal the checksum so only the
        // length inconsistency remains.
        bytes[LEN_OFFSET..LEN_OFFSET + 2].copy_from_slice(&2u16.to_be_bytes());
        let sum = checksum(&bytes[SEQ_OFFSET..]);
        bytes[SUM_OFFSET..SUM_OFFSET + 2].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(Packet::decode(&bytes), Err(PacketError::LengthMismatch));
    }

    #[test]
    fn flag_helpers() {
        assert!(Packet::ack(0).has_flags(flags::ACK));
        assert!(!Packet::ack(0).has_flags(flags::NACK));
        assert!(Packet::nack(0).has_flags(flags::NACK));
        assert!(Packet::end().has_flags(flags::END));
        assert!(!Packet::data(0, vec![]).has_flags(flags::ACK | flags::NACK | flags::END));
    }

    #[test]
    fn checksum_verifies_clean_datagram() {
        let bytes = Packet::data(42, b"payload".to_vec()).encode();
        assert!(verify_checksum(&bytes));
    }

    #[test]
    fn any_single_byte_flip_fails_checksum() {
        let bytes = Packet::data(42, b"corruption target\n".to_vec()).encode();
        for i in 0..bytes.len() {
            for mask in [0x01u8, 0xFF] {
                let mut corrupted = bytes.clone();
                corrupted[i] ^= mask;
                assert!(
                    Packet::decode(&corrupted).is_err(),
                    "flip of byte {i} with mask {mask:#04x} went undetected"
                );
            }
        }
    }

    #[test]
    fn checksum_covers_odd_payload_length() {
        let pkt = Packet::data(9, b"odd".to_vec());
        let mut bytes = pkt.encode();
        assert!(verify_checksum(&bytes));
        let last = bytes.len() - 1;
        bytes[last] ^= 0x10;
        assert!(!verify_checksum(&bytes));
    }
}
