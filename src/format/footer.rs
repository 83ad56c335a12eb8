//! 208-byte directory footer.
//!
//! The footer indexes the directory region: absolute offsets and entry counts
//! for each table, the string pool's position and size, and the XXH3-64
//! digest of the index region (all tables plus the string pool, in write
//! order). In a freshly built container it is the last record in the file; in
//! a petrified container it sits immediately after the header.

use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::FOOTER_SIZE;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct BbfFooter {
    asset_offset: U64,
    page_offset: U64,
    section_offset: U64,
    meta_offset: U64,
    expansion_offset: U64,
    string_pool_offset: U64,
    string_pool_size: U64,
    asset_count: U64,
    page_count: U64,
    section_count: U64,
    meta_count: U64,
    expansion_count: U64,
    flags: U32,
    footer_len: u8,
    padding: [u8; 3],
    footer_hash: U64,
    reserved: [u8; 96],
}

const _: () = assert!(std::mem::size_of::<BbfFooter>() == FOOTER_SIZE);

impl BbfFooter {
    /// A zeroed footer with only its length byte set; the builder fills in
    /// offsets and counts as tables are emitted.
    pub fn empty() -> Self {
        let mut footer = Self::new_zeroed();
        footer.footer_len = FOOTER_SIZE as u8;
        footer
    }

    wire_accessors! {
        asset_offset: U64 => u64,
        page_offset: U64 => u64,
        section_offset: U64 => u64,
        meta_offset: U64 => u64,
        expansion_offset: U64 => u64,
        string_pool_offset: U64 => u64,
        string_pool_size: U64 => u64,
        asset_count: U64 => u64,
        page_count: U64 => u64,
        section_count: U64 => u64,
        meta_count: U64 => u64,
        expansion_count: U64 => u64,
        flags: U32 => u32,
        footer_hash: U64 => u64,
    }

    pub fn footer_len(&self) -> u8 {
        self.footer_len
    }
}
