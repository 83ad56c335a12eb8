//! # Container Builder
//!
//! Streaming ingestion of input files into a growing payload region, with
//! content-addressed deduplication and alignment-aware placement, finalized
//! by emitting the directory tables and a self-describing footer.
//!
//! ## Write Pipeline
//!
//! ```text
//! input file -> XXH3-128 (16 KiB chunks) -> dedup probe
//!     hit:  append page record, done
//!     miss: pad to boundary -> stream payload -> append asset + page records
//! ```
//!
//! Payload bytes are written exactly once per distinct content hash; pages
//! are 16-byte references into the asset table. Alignment is the guard
//! boundary (`2^alignment_exp`, default 4096) unless the variable-ream flag
//! is set and the payload is smaller than the ream threshold, in which case
//! the payload packs on an 8-byte boundary.
//!
//! ## Finalize
//!
//! Tables are appended in fixed order (assets, pages, sections, metadata,
//! string pool), feeding a running XXH3-64 whose digest becomes the footer's
//! index hash. The footer lands last, and the zeroed placeholder header at
//! offset 0 is rewritten with the footer's position. A builder dropped
//! without `finalize` leaves a partial file on disk; deleting it is the
//! caller's responsibility.
//!
//! ## Failure Model
//!
//! User-visible failures (unreadable input, out-of-range section index,
//! empty metadata key) return `Err` without mutating builder state or the
//! output file. Allocation failure aborts, as everywhere in Rust.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use xxhash_rust::xxh3::Xxh3;
use zerocopy::IntoBytes;

use crate::dedup::AssetIndex;
use crate::format::{
    AssetRecord, BbfFooter, BbfHeader, MediaType, MetaRecord, PageRecord, SectionRecord,
    DEFAULT_GUARD_ALIGNMENT, DEFAULT_SMALL_REAM_THRESHOLD, FLAG_VARIABLE_REAM, FOOTER_SIZE,
    HEADER_SIZE, INVALID_OFFSET,
};
use crate::intern::StringPool;

const WRITE_BUFFER_SIZE: usize = 64 * 1024;
const HASH_CHUNK_SIZE: usize = 16 * 1024;
const ZERO_PAD: [u8; 4096] = [0u8; 4096];

/// Construction-time knobs for a [`Builder`].
#[derive(Debug, Clone, Copy)]
pub struct BuilderOptions {
    /// Payload alignment exponent; assets start on `2^alignment_exp`
    /// boundaries.
    pub alignment_exp: u8,
    /// Assets smaller than `2^ream_exp` bytes relax to 8-byte alignment when
    /// [`FLAG_VARIABLE_REAM`] is set.
    pub ream_exp: u8,
    /// Header flag bits written verbatim into the finalized header.
    pub flags: u32,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            alignment_exp: DEFAULT_GUARD_ALIGNMENT,
            ream_exp: DEFAULT_SMALL_REAM_THRESHOLD,
            flags: 0,
        }
    }
}

impl BuilderOptions {
    /// Defaults plus the variable-ream flag: small assets pack on 8-byte
    /// boundaries.
    pub fn variable_ream() -> Self {
        Self {
            flags: FLAG_VARIABLE_REAM,
            ..Self::default()
        }
    }
}

/// Writes a new container. One builder owns its output path exclusively
/// until [`finalize`](Builder::finalize) consumes it.
pub struct Builder {
    out: BufWriter<File>,
    current_offset: u64,
    options: BuilderOptions,
    pool: StringPool,
    dedup: AssetIndex,
    assets: Vec<AssetRecord>,
    pages: Vec<PageRecord>,
    sections: Vec<SectionRecord>,
    metadata: Vec<MetaRecord>,
}

impl Builder {
    /// Opens `path` for writing and reserves the 64-byte header slot.
    pub fn create<P: AsRef<Path>>(path: P, options: BuilderOptions) -> Result<Self> {
        let path = path.as_ref();

        let file = File::create(path)
            .wrap_err_with(|| format!("failed to create container '{}'", path.display()))?;
        let mut out = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        // Placeholder header; finalize rewrites it once the footer offset is
        // known.
        out.write_all(&[0u8; HEADER_SIZE])
            .wrap_err_with(|| format!("failed to reserve header in '{}'", path.display()))?;

        Ok(Self {
            out,
            current_offset: HEADER_SIZE as u64,
            options,
            pool: StringPool::new(),
            dedup: AssetIndex::new(),
            assets: Vec::new(),
            pages: Vec::new(),
            sections: Vec::new(),
            metadata: Vec::new(),
        })
    }

    /// Appends one page whose payload is the content of `path`.
    ///
    /// The payload is hashed first; if an identical asset is already stored,
    /// only a page record is added and no payload bytes are written. An
    /// unreadable input fails the call with builder state untouched.
    pub fn add_page<P: AsRef<Path>>(
        &mut self,
        path: P,
        page_flags: u32,
        asset_flags: u32,
    ) -> Result<()> {
        let path = path.as_ref();
        let media = detect_media_type(path);

        let mut input = File::open(path)
            .wrap_err_with(|| format!("failed to open page input '{}'", path.display()))?;
        let file_size = input
            .metadata()
            .wrap_err_with(|| format!("failed to stat page input '{}'", path.display()))?
            .len();

        let hash = hash_file(&mut input)
            .wrap_err_with(|| format!("failed to hash page input '{}'", path.display()))?;

        if let Some(asset_index) = self.dedup.find(hash) {
            self.pages.push(PageRecord::new(asset_index, page_flags));
            return Ok(());
        }

        input
            .seek(SeekFrom::Start(0))
            .wrap_err_with(|| format!("failed to rewind page input '{}'", path.display()))?;

        let mut boundary = 1u64 << self.options.alignment_exp;
        if self.options.flags & FLAG_VARIABLE_REAM != 0 && file_size < (1u64 << self.options.ream_exp)
        {
            boundary = 8;
        }

        self.write_padding(boundary)?;
        let start_offset = self.current_offset;

        let copied = self.write_payload(&mut input, file_size)?;
        ensure!(
            copied == file_size,
            "page input '{}' changed size during ingestion ({} of {} bytes read)",
            path.display(),
            copied,
            file_size
        );

        let asset_index = self.assets.len() as u64;
        self.assets.push(AssetRecord::new(
            start_offset,
            hash,
            file_size,
            asset_flags,
            media,
        ));
        self.dedup.insert(hash, asset_index);
        self.pages.push(PageRecord::new(asset_index, page_flags));

        Ok(())
    }

    /// Appends a key/value metadata record, optionally parented to another
    /// key. Empty keys and values are rejected.
    pub fn add_meta(&mut self, key: &str, value: &str, parent: Option<&str>) -> Result<()> {
        ensure!(
            !key.is_empty() && !value.is_empty(),
            "metadata key and value must be non-empty"
        );

        let key_offset = self.pool.intern(key);
        let value_offset = self.pool.intern(value);
        let parent_offset = parent.map_or(INVALID_OFFSET, |p| self.pool.intern(p));

        self.metadata
            .push(MetaRecord::new(key_offset, value_offset, parent_offset));
        Ok(())
    }

    /// Appends a section marker starting at page `start_index` (which may
    /// equal the current page count, marking a section about to begin).
    pub fn add_section(&mut self, name: &str, start_index: u64, parent: Option<&str>) -> Result<()> {
        ensure!(!name.is_empty(), "section name must be non-empty");
        ensure!(
            start_index <= self.pages.len() as u64,
            "section '{}' starts at page {} but only {} pages exist",
            name,
            start_index,
            self.pages.len()
        );

        let title_offset = self.pool.intern(name);
        let parent_offset = parent.map_or(INVALID_OFFSET, |p| self.pool.intern(p));

        self.sections
            .push(SectionRecord::new(title_offset, start_index, parent_offset));
        Ok(())
    }

    pub fn asset_count(&self) -> u64 {
        self.assets.len() as u64
    }

    pub fn page_count(&self) -> u64 {
        self.pages.len() as u64
    }

    pub fn section_count(&self) -> u64 {
        self.sections.len() as u64
    }

    pub fn meta_count(&self) -> u64 {
        self.metadata.len() as u64
    }

    /// Emits the directory tables and footer, rewrites the header, and
    /// flushes. A container with no assets is rejected.
    pub fn finalize(self) -> Result<()> {
        ensure!(!self.assets.is_empty(), "cannot finalize an empty book");

        let Self {
            mut out,
            mut current_offset,
            options,
            pool,
            assets,
            pages,
            sections,
            metadata,
            ..
        } = self;

        let mut index_hash = Xxh3::new();
        let mut footer = BbfFooter::empty();

        footer.set_asset_offset(current_offset);
        footer.set_asset_count(assets.len() as u64);
        append_table(&mut out, &mut current_offset, &mut index_hash, assets.as_bytes())?;

        footer.set_page_offset(current_offset);
        footer.set_page_count(pages.len() as u64);
        append_table(&mut out, &mut current_offset, &mut index_hash, pages.as_bytes())?;

        footer.set_section_offset(current_offset);
        footer.set_section_count(sections.len() as u64);
        append_table(&mut out, &mut current_offset, &mut index_hash, sections.as_bytes())?;

        footer.set_meta_offset(current_offset);
        footer.set_meta_count(metadata.len() as u64);
        append_table(&mut out, &mut current_offset, &mut index_hash, metadata.as_bytes())?;

        // Expansion table is reserved: offset 0 (absent), count 0.

        footer.set_string_pool_offset(current_offset);
        footer.set_string_pool_size(pool.used_size());
        append_table(&mut out, &mut current_offset, &mut index_hash, pool.as_bytes())?;

        footer.set_footer_hash(index_hash.digest());

        let footer_offset = current_offset;
        debug_assert_eq!(footer.footer_len() as usize, FOOTER_SIZE);
        out.write_all(footer.as_bytes())
            .wrap_err("failed to write footer")?;

        let header = BbfHeader::new(
            options.flags,
            options.alignment_exp,
            options.ream_exp,
            footer_offset,
        );
        out.seek(SeekFrom::Start(0))
            .wrap_err("failed to seek back to the header slot")?;
        out.write_all(header.as_bytes())
            .wrap_err("failed to write header")?;

        out.flush().wrap_err("failed to flush container")?;
        Ok(())
    }

    fn write_padding(&mut self, boundary: u64) -> Result<()> {
        let remainder = self.current_offset % boundary;
        if remainder == 0 {
            return Ok(());
        }

        let padding = boundary - remainder;
        let mut left = padding;
        while left > 0 {
            let chunk = left.min(ZERO_PAD.len() as u64) as usize;
            self.out
                .write_all(&ZERO_PAD[..chunk])
                .wrap_err("failed to write alignment padding")?;
            left -= chunk as u64;
        }

        self.current_offset += padding;
        Ok(())
    }

    fn write_payload(&mut self, input: &mut File, file_size: u64) -> Result<u64> {
        let mut buf = [0u8; HASH_CHUNK_SIZE];
        let mut copied = 0u64;
        let mut input = input.take(file_size);

        loop {
            let n = input.read(&mut buf).wrap_err("failed to read page input")?;
            if n == 0 {
                break;
            }
            self.out
                .write_all(&buf[..n])
                .wrap_err("failed to write payload")?;
            self.current_offset += n as u64;
            copied += n as u64;
        }

        Ok(copied)
    }
}

fn append_table(
    out: &mut BufWriter<File>,
    current_offset: &mut u64,
    index_hash: &mut Xxh3,
    bytes: &[u8],
) -> Result<()> {
    out.write_all(bytes).wrap_err("failed to write directory table")?;
    index_hash.update(bytes);
    *current_offset += bytes.len() as u64;
    Ok(())
}

fn hash_file(input: &mut File) -> Result<u128> {
    let mut hasher = Xxh3::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];

    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.digest128())
}

/// Media type from the file extension, case-insensitive. `jpg` and `jpeg`
/// collapse to the same type; anything unrecognized (or no extension at all)
/// is `Unknown`.
fn detect_media_type(path: &Path) -> MediaType {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return MediaType::Unknown;
    };

    match ext.to_ascii_lowercase().as_str() {
        "avif" => MediaType::Avif,
        "png" => MediaType::Png,
        "webp" => MediaType::Webp,
        "jxl" => MediaType::Jxl,
        "bmp" => MediaType::Bmp,
        "gif" => MediaType::Gif,
        "tiff" => MediaType::Tiff,
        "jpg" | "jpeg" => MediaType::Jpg,
        _ => MediaType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn media_detection_by_extension() {
        assert_eq!(detect_media_type(Path::new("a.png")), MediaType::Png);
        assert_eq!(detect_media_type(Path::new("a.PNG")), MediaType::Png);
        assert_eq!(detect_media_type(Path::new("a.jpg")), MediaType::Jpg);
        assert_eq!(detect_media_type(Path::new("a.JPEG")), MediaType::Jpg);
        assert_eq!(detect_media_type(Path::new("a.tiff")), MediaType::Tiff);
        assert_eq!(detect_media_type(Path::new("a.avif")), MediaType::Avif);
        assert_eq!(detect_media_type(Path::new("a.txt")), MediaType::Unknown);
        assert_eq!(detect_media_type(Path::new("noext")), MediaType::Unknown);
    }

    #[test]
    fn missing_input_fails_without_mutating_state() {
        let dir = tempdir().unwrap();
        let mut builder =
            Builder::create(dir.path().join("out.bbf"), BuilderOptions::default()).unwrap();

        let result = builder.add_page(dir.path().join("does-not-exist.png"), 0, 0);
        assert!(result.is_err());
        assert_eq!(builder.asset_count(), 0);
        assert_eq!(builder.page_count(), 0);
    }

    #[test]
    fn section_past_page_count_is_rejected() {
        let dir = tempdir().unwrap();
        let mut builder =
            Builder::create(dir.path().join("out.bbf"), BuilderOptions::default()).unwrap();

        assert!(builder.add_section("ch1", 1, None).is_err());
        assert!(builder.add_section("ch1", 0, None).is_ok());
        assert_eq!(builder.section_count(), 1);
    }

    #[test]
    fn empty_meta_key_or_value_is_rejected() {
        let dir = tempdir().unwrap();
        let mut builder =
            Builder::create(dir.path().join("out.bbf"), BuilderOptions::default()).unwrap();

        assert!(builder.add_meta("", "x", None).is_err());
        assert!(builder.add_meta("x", "", None).is_err());
        assert!(builder.add_meta("x", "y", None).is_ok());
        assert_eq!(builder.meta_count(), 1);
    }

    #[test]
    fn finalize_with_no_assets_is_rejected() {
        let dir = tempdir().unwrap();
        let builder =
            Builder::create(dir.path().join("out.bbf"), BuilderOptions::default()).unwrap();

        assert!(builder.finalize().is_err());
    }

    #[test]
    fn duplicate_content_stores_one_asset() {
        let dir = tempdir().unwrap();
        let input_a = dir.path().join("a.png");
        let input_b = dir.path().join("b.png");
        std::fs::write(&input_a, vec![0x41u8; 2048]).unwrap();
        std::fs::write(&input_b, vec![0x41u8; 2048]).unwrap();

        let mut builder =
            Builder::create(dir.path().join("out.bbf"), BuilderOptions::default()).unwrap();
        builder.add_page(&input_a, 0, 0).unwrap();
        builder.add_page(&input_b, 0, 0).unwrap();
        builder.add_page(&input_a, 0, 0).unwrap();

        assert_eq!(builder.asset_count(), 1);
        assert_eq!(builder.page_count(), 3);
    }
}
