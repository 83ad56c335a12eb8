//! Fixed 64-byte file header.
//!
//! The header is written twice by the builder: a zeroed placeholder when the
//! output file is opened, then the populated version during finalize once the
//! footer's position is known. Readers parse it in place at offset 0.

use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{BBF_MAGIC, HEADER_SIZE, VERSION};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BbfHeader {
    magic: [u8; 4],
    version: U16,
    header_len: U16,
    flags: U32,
    alignment: u8,
    ream_size: u8,
    reserved_extra: [u8; 2],
    footer_offset: U64,
    reserved: [u8; 40],
}

const _: () = assert!(std::mem::size_of::<BbfHeader>() == HEADER_SIZE);

impl BbfHeader {
    pub fn new(flags: u32, alignment: u8, ream_size: u8, footer_offset: u64) -> Self {
        Self {
            magic: BBF_MAGIC,
            version: U16::new(VERSION),
            header_len: U16::new(HEADER_SIZE as u16),
            flags: U32::new(flags),
            alignment,
            ream_size,
            reserved_extra: [0u8; 2],
            footer_offset: U64::new(footer_offset),
            reserved: [0u8; 40],
        }
    }

    wire_accessors! {
        flags: U32 => u32,
        footer_offset: U64 => u64,
    }

    wire_getters! {
        version: u16,
        header_len: u16,
    }

    pub fn magic(&self) -> &[u8; 4] {
        &self.magic
    }

    /// True when the four magic bytes spell `BBF3`.
    pub fn magic_ok(&self) -> bool {
        self.magic == BBF_MAGIC
    }

    /// Payload alignment exponent: assets start on `2^alignment` boundaries.
    pub fn alignment(&self) -> u8 {
        self.alignment
    }

    /// Small-asset threshold exponent for variable reams.
    pub fn ream_size(&self) -> u8 {
        self.ream_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{DEFAULT_GUARD_ALIGNMENT, DEFAULT_SMALL_REAM_THRESHOLD, FLAG_PETRIFIED};

    #[test]
    fn header_size_is_64() {
        assert_eq!(std::mem::size_of::<BbfHeader>(), 64);
    }

    #[test]
    fn header_roundtrip() {
        let header = BbfHeader::new(
            FLAG_PETRIFIED,
            DEFAULT_GUARD_ALIGNMENT,
            DEFAULT_SMALL_REAM_THRESHOLD,
            8192,
        );

        let bytes = header.as_bytes();
        let parsed = BbfHeader::ref_from_bytes(bytes).unwrap();

        assert!(parsed.magic_ok());
        assert_eq!(parsed.version(), VERSION);
        assert_eq!(parsed.header_len(), 64);
        assert_eq!(parsed.flags(), FLAG_PETRIFIED);
        assert_eq!(parsed.alignment(), 12);
        assert_eq!(parsed.ream_size(), 16);
        assert_eq!(parsed.footer_offset(), 8192);
    }

    #[test]
    fn header_fields_sit_at_wire_offsets() {
        let header = BbfHeader::new(0x0000_0002, 12, 16, 0x0102_0304_0506_0708);
        let bytes = header.as_bytes();

        assert_eq!(&bytes[0..4], b"BBF3");
        assert_eq!(&bytes[4..6], &3u16.to_le_bytes());
        assert_eq!(&bytes[6..8], &64u16.to_le_bytes());
        assert_eq!(&bytes[8..12], &2u32.to_le_bytes());
        assert_eq!(bytes[12], 12);
        assert_eq!(bytes[13], 16);
        assert_eq!(&bytes[16..24], &0x0102_0304_0506_0708u64.to_le_bytes());
        assert!(bytes[24..64].iter().all(|&b| b == 0));
    }

    #[test]
    fn bad_magic_is_detected() {
        let mut header = BbfHeader::new(0, 12, 16, 64);
        header.magic = *b"NOPE";
        assert!(!header.magic_ok());
    }
}
