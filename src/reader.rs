//! # Container Reader
//!
//! Validated, bounds-checked, zero-copy views over a memory-mapped
//! container. The reader maps the whole file read-only at open and hands out
//! borrowed views for its entire lifetime; nothing is copied until a caller
//! decides to.
//!
//! ## Safety Model
//!
//! Every accessor funnels through one range predicate: a view of `size`
//! bytes at `offset` exists only when `offset + size` neither wraps nor
//! exceeds the file size captured at open. Accessors return `Option` and are
//! total over arbitrary input bytes; a corrupted or truncated container
//! yields `None`, never a panic and never an out-of-bounds read.
//!
//! ## View Shape
//!
//! Directory tables come back as typed zerocopy slices
//! (`&[AssetRecord]` and friends), so indexing one is already the
//! bounds-checked entry accessor. The footer is threaded explicitly through
//! every accessor that depends on it; the reader keeps no hidden parse
//! state.
//!
//! ## Sharing
//!
//! The mapping is private and read-only, so any number of readers may open
//! the same container concurrently.

use std::fs::File;
use std::path::Path;

use eyre::{Result, WrapErr};
use memmap2::Mmap;
use xxhash_rust::xxh3::{xxh3_128, xxh3_64};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

use crate::format::{
    AssetRecord, BbfFooter, BbfHeader, ExpansionRecord, MetaRecord, PageRecord, SectionRecord,
    FOOTER_SIZE, HEADER_SIZE, INVALID_OFFSET, MAX_BALE_SIZE, MAX_FORME_SIZE,
};

pub struct Reader {
    mmap: Mmap,
    file_size: u64,
}

impl Reader {
    /// Opens `path` read-only and maps its entire contents. The file size is
    /// captured here and never re-checked.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open container '{}'", path.display()))?;
        let file_size = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat container '{}'", path.display()))?
            .len();

        // SAFETY: Mmap::map is unsafe because the file could be modified
        // externally while mapped, invalidating the view. This is safe
        // because:
        // 1. The mapping is read-only and private to this process
        // 2. Finalized containers are immutable by contract (the builder has
        //    closed the file, petrification writes a new file)
        // 3. All access goes through view(), which bounds-checks against the
        //    size captured at open
        let mmap = unsafe {
            Mmap::map(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self { mmap, file_size })
    }

    /// The mapped file's size in bytes, as captured at open.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Header view at offset 0, present when the file is at least 64 bytes.
    /// Magic and version are the caller's to check via
    /// [`BbfHeader::magic_ok`].
    pub fn header(&self) -> Option<&BbfHeader> {
        let bytes = self.view(0, HEADER_SIZE as u64)?;
        BbfHeader::ref_from_bytes(bytes).ok()
    }

    /// Footer view at `offset` (normally `header.footer_offset()`). Rejects
    /// ranges outside the file and footers whose length byte is wrong.
    pub fn footer(&self, offset: u64) -> Option<&BbfFooter> {
        let bytes = self.view(offset, FOOTER_SIZE as u64)?;
        let footer = BbfFooter::ref_from_bytes(bytes).ok()?;
        if footer.footer_len() as usize != FOOTER_SIZE {
            return None;
        }
        Some(footer)
    }

    pub fn asset_table(&self, footer: &BbfFooter) -> Option<&[AssetRecord]> {
        self.record_table(footer.asset_offset(), footer.asset_count())
    }

    pub fn page_table(&self, footer: &BbfFooter) -> Option<&[PageRecord]> {
        self.record_table(footer.page_offset(), footer.page_count())
    }

    pub fn section_table(&self, footer: &BbfFooter) -> Option<&[SectionRecord]> {
        self.record_table(footer.section_offset(), footer.section_count())
    }

    pub fn meta_table(&self, footer: &BbfFooter) -> Option<&[MetaRecord]> {
        self.record_table(footer.meta_offset(), footer.meta_count())
    }

    pub fn expansion_table(&self, footer: &BbfFooter) -> Option<&[ExpansionRecord]> {
        self.record_table(footer.expansion_offset(), footer.expansion_count())
    }

    /// The payload bytes of `asset`: `file_size` bytes at `file_offset`.
    pub fn asset_data(&self, asset: &AssetRecord) -> Option<&[u8]> {
        self.view(asset.file_offset(), asset.file_size())
    }

    /// The NUL-terminated string at pool offset `offset`.
    ///
    /// Rejects the absent sentinel, offsets at or past the pool's end, and
    /// strings with no terminator within [`MAX_FORME_SIZE`] bytes (a
    /// corrupted pool must not trigger an unbounded scan). Bytes up to the
    /// terminator must be UTF-8.
    pub fn string_view<'a>(&'a self, footer: &BbfFooter, offset: u64) -> Option<&'a str> {
        if offset == INVALID_OFFSET {
            return None;
        }

        let pool_size = footer.string_pool_size();
        if offset >= pool_size {
            return None;
        }

        let start = footer.string_pool_offset().checked_add(offset)?;
        let limit = (pool_size - offset).min(MAX_FORME_SIZE);
        let bytes = self.view(start, limit)?;

        let nul = bytes.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&bytes[..nul]).ok()
    }

    /// XXH3-128 of the payload bytes `asset` points at, for comparison with
    /// the stored content hash.
    pub fn compute_asset_hash(&self, asset: &AssetRecord) -> Option<u128> {
        Some(xxh3_128(self.asset_data(asset)?))
    }

    /// True when the stored content hash matches the payload bytes.
    pub fn asset_hash_matches(&self, asset: &AssetRecord) -> Option<bool> {
        Some(self.compute_asset_hash(asset)? == asset.hash())
    }

    /// Recomputes the XXH3-64 of the index region (all directory tables plus
    /// the string pool, in write order) and compares it with the footer's
    /// stored digest. Implausibly large regions are rejected rather than
    /// hashed.
    pub fn verify_index_hash(&self, footer: &BbfFooter) -> Option<bool> {
        let start = footer.asset_offset();
        let end = footer
            .string_pool_offset()
            .checked_add(footer.string_pool_size())?;
        if end < start {
            return None;
        }

        let size = end - start;
        if size > MAX_BALE_SIZE {
            return None;
        }

        let bytes = self.view(start, size)?;
        Some(xxh3_64(bytes) == footer.footer_hash())
    }

    fn is_safe(&self, offset: u64, size: u64) -> bool {
        match offset.checked_add(size) {
            Some(end) => end <= self.file_size,
            None => false,
        }
    }

    fn view(&self, offset: u64, size: u64) -> Option<&[u8]> {
        if !self.is_safe(offset, size) {
            return None;
        }
        Some(&self.mmap[offset as usize..(offset + size) as usize])
    }

    fn record_table<T>(&self, offset: u64, count: u64) -> Option<&[T]>
    where
        T: FromBytes + Immutable + KnownLayout + Unaligned,
    {
        let size = (std::mem::size_of::<T>() as u64).checked_mul(count)?;
        let bytes = self.view(offset, size)?;
        <[T]>::ref_from_bytes(bytes).ok()
    }
}
