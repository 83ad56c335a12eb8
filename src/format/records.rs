//! Directory table records.
//!
//! Five record kinds make up the directory tables. All are fixed-size,
//! little-endian, and 1-byte packed so a table parses as a zerocopy slice
//! straight out of the mapped file:
//!
//! | Record | Size | Purpose |
//! |---|---|---|
//! | [`AssetRecord`] | 48 | one unique payload: offset, XXH3-128, size, type |
//! | [`PageRecord`] | 16 | one reading position, referencing an asset |
//! | [`SectionRecord`] | 32 | a named range marker starting at a page index |
//! | [`MetaRecord`] | 32 | a key/value pair with an optional parent key |
//! | [`ExpansionRecord`] | 84 | reserved for future revisions, count 0 today |
//!
//! String-typed fields hold byte offsets into the string pool, with
//! `INVALID_OFFSET` meaning absent.

use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{
    MediaType, ASSET_RECORD_SIZE, EXPANSION_RECORD_SIZE, META_RECORD_SIZE, PAGE_RECORD_SIZE,
    SECTION_RECORD_SIZE,
};

/// A unique payload in the container, content-addressed by XXH3-128.
///
/// The hash is stored as two u64 halves, low half first.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct AssetRecord {
    file_offset: U64,
    hash_low: U64,
    hash_high: U64,
    file_size: U64,
    flags: U32,
    reserved_value: [u8; 2],
    media_type: u8,
    reserved: [u8; 9],
}

const _: () = assert!(std::mem::size_of::<AssetRecord>() == ASSET_RECORD_SIZE);

impl AssetRecord {
    pub fn new(file_offset: u64, hash: u128, file_size: u64, flags: u32, media: MediaType) -> Self {
        Self {
            file_offset: U64::new(file_offset),
            hash_low: U64::new(hash as u64),
            hash_high: U64::new((hash >> 64) as u64),
            file_size: U64::new(file_size),
            flags: U32::new(flags),
            reserved_value: [0u8; 2],
            media_type: media as u8,
            reserved: [0u8; 9],
        }
    }

    wire_accessors! {
        file_offset: U64 => u64,
    }

    wire_getters! {
        file_size: u64,
        flags: u32,
    }

    /// The 128-bit content hash, recombined from its stored halves.
    pub fn hash(&self) -> u128 {
        ((self.hash_high.get() as u128) << 64) | self.hash_low.get() as u128
    }

    pub fn media_type(&self) -> MediaType {
        MediaType::from_u8(self.media_type)
    }
}

/// One ordered position in the book, referring to exactly one asset.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PageRecord {
    asset_index: U64,
    flags: U32,
    reserved: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<PageRecord>() == PAGE_RECORD_SIZE);

impl PageRecord {
    pub fn new(asset_index: u64, flags: u32) -> Self {
        Self {
            asset_index: U64::new(asset_index),
            flags: U32::new(flags),
            reserved: [0u8; 4],
        }
    }

    wire_getters! {
        asset_index: u64,
        flags: u32,
    }
}

/// A named range marker: a title, a starting page index, and an optional
/// parent title for nesting.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SectionRecord {
    title_offset: U64,
    start_page_index: U64,
    parent_offset: U64,
    reserved: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<SectionRecord>() == SECTION_RECORD_SIZE);

impl SectionRecord {
    pub fn new(title_offset: u64, start_page_index: u64, parent_offset: u64) -> Self {
        Self {
            title_offset: U64::new(title_offset),
            start_page_index: U64::new(start_page_index),
            parent_offset: U64::new(parent_offset),
            reserved: [0u8; 8],
        }
    }

    wire_getters! {
        title_offset: u64,
        start_page_index: u64,
        parent_offset: u64,
    }
}

/// A key/value metadata pair with an optional parent key for hierarchy.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MetaRecord {
    key_offset: U64,
    value_offset: U64,
    parent_offset: U64,
    reserved: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<MetaRecord>() == META_RECORD_SIZE);

impl MetaRecord {
    pub fn new(key_offset: u64, value_offset: u64, parent_offset: u64) -> Self {
        Self {
            key_offset: U64::new(key_offset),
            value_offset: U64::new(value_offset),
            parent_offset: U64::new(parent_offset),
            reserved: [0u8; 8],
        }
    }

    wire_getters! {
        key_offset: u64,
        value_offset: u64,
        parent_offset: u64,
    }
}

/// Reserved for forward compatibility; current writers emit a count of 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ExpansionRecord {
    reserved_slots: [U64; 10],
    flags: U32,
}

const _: () = assert!(std::mem::size_of::<ExpansionRecord>() == EXPANSION_RECORD_SIZE);

impl ExpansionRecord {
    pub fn empty() -> Self {
        Self::new_zeroed()
    }

    wire_getters! {
        flags: u32,
    }
}
