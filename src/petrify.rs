//! # Petrification
//!
//! A format-preserving rewrite that relocates the directory (footer plus
//! index tables) from the tail of a container to the head, so a reader
//! touches a single memory page to discover the whole structure. The
//! petrified file has identical semantics: same payload bytes per page, same
//! metadata triples, same section sequence.
//!
//! ## Layout Shift
//!
//! ```text
//! source:   [header][payload........][index tables][footer]
//! result:   [header][footer][index tables][payload........]
//! ```
//!
//! The format stores absolute file offsets, so the move rewrites every
//! affected offset: directory-table offsets in the footer shift by the index
//! region's displacement, and each asset record's payload offset shifts by
//! the payload region's displacement. After the asset patch pass the index
//! hash is recomputed over the relocated region and the footer updated, so
//! the petrified file's stored digest matches its bytes.
//!
//! ## Atomicity
//!
//! The result is assembled in a sibling temporary file and renamed over the
//! destination, so the destination is never observable half-written. The
//! temp file is removed on failure.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{bail, ensure, Result, WrapErr};
use xxhash_rust::xxh3::Xxh3;
use zerocopy::{FromBytes, IntoBytes};

use crate::format::{
    AssetRecord, BbfFooter, BbfHeader, ASSET_RECORD_SIZE, FLAG_PETRIFIED, FOOTER_SIZE, HEADER_SIZE,
    MAX_BALE_SIZE,
};

const COPY_CHUNK_SIZE: usize = 64 * 1024;
const PATCH_BATCH_RECORDS: usize = 64;

/// Rewrites the container at `source` into a petrified container at
/// `destination`.
///
/// The source must be a valid, finalized, non-petrified container and must
/// not be open for write. Petrifying an already-petrified file fails.
pub fn petrify_file<P: AsRef<Path>, Q: AsRef<Path>>(source: P, destination: Q) -> Result<()> {
    let source = source.as_ref();
    let destination = destination.as_ref();

    let mut src = File::open(source)
        .wrap_err_with(|| format!("failed to open petrify source '{}'", source.display()))?;
    let file_size = src
        .metadata()
        .wrap_err_with(|| format!("failed to stat petrify source '{}'", source.display()))?
        .len();

    let plan = PetrifyPlan::read(&mut src, file_size)
        .wrap_err_with(|| format!("'{}' is not petrifiable", source.display()))?;

    let tmp_path = sibling_tmp_path(destination);
    let result = write_petrified(&mut src, &plan, &tmp_path);

    match result {
        Ok(()) => fs::rename(&tmp_path, destination).wrap_err_with(|| {
            format!(
                "failed to move petrified container into place at '{}'",
                destination.display()
            )
        }),
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

/// Everything derived from the source's header and footer before any output
/// is written.
struct PetrifyPlan {
    new_header: BbfHeader,
    new_footer: BbfFooter,
    index_start: u64,
    index_size: u64,
    data_size: u64,
    shift_data: u64,
}

impl PetrifyPlan {
    fn read(src: &mut File, file_size: u64) -> Result<Self> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        src.read_exact(&mut header_bytes)
            .wrap_err("source is too small to hold a header")?;
        let header = BbfHeader::ref_from_bytes(&header_bytes)
            .map_err(|e| eyre::eyre!("failed to parse header: {e:?}"))?;

        ensure!(header.magic_ok(), "bad magic, not a BBF container");
        ensure!(
            header.header_len() as usize == HEADER_SIZE,
            "unsupported header length {}",
            header.header_len()
        );
        ensure!(
            header.flags() & FLAG_PETRIFIED == 0,
            "container is already petrified"
        );

        let footer_offset = header.footer_offset();
        ensure!(
            footer_offset >= HEADER_SIZE as u64,
            "footer offset {} overlaps the header",
            footer_offset
        );
        let footer_end = footer_offset
            .checked_add(FOOTER_SIZE as u64)
            .filter(|&end| end <= file_size);
        ensure!(
            footer_end.is_some(),
            "footer offset {} is past the end of the file",
            footer_offset
        );

        let mut footer_bytes = [0u8; FOOTER_SIZE];
        src.seek(SeekFrom::Start(footer_offset))
            .wrap_err("failed to seek to source footer")?;
        src.read_exact(&mut footer_bytes)
            .wrap_err("failed to read source footer")?;
        let footer = BbfFooter::ref_from_bytes(&footer_bytes)
            .map_err(|e| eyre::eyre!("failed to parse footer: {e:?}"))?;
        ensure!(
            footer.footer_len() as usize == FOOTER_SIZE,
            "unsupported footer length {}",
            footer.footer_len()
        );

        let index_start = footer.asset_offset();
        ensure!(
            index_start >= HEADER_SIZE as u64 && index_start <= footer_offset,
            "directory region at {} is out of place",
            index_start
        );

        let index_size = footer_offset - index_start;
        ensure!(
            index_size <= MAX_BALE_SIZE,
            "directory region of {} bytes is implausibly large",
            index_size
        );
        let data_size = index_start - HEADER_SIZE as u64;

        let new_index_start = (HEADER_SIZE + FOOTER_SIZE) as u64;
        let new_data_start = new_index_start + index_size;
        let shift_index = new_index_start as i64 - index_start as i64;
        let shift_data = new_data_start - HEADER_SIZE as u64;

        let mut new_header = *header;
        new_header.set_flags(header.flags() | FLAG_PETRIFIED);
        new_header.set_footer_offset(HEADER_SIZE as u64);

        let mut new_footer = *footer;
        new_footer.set_asset_offset(shift_offset(footer.asset_offset(), shift_index));
        new_footer.set_page_offset(shift_offset(footer.page_offset(), shift_index));
        new_footer.set_section_offset(shift_offset(footer.section_offset(), shift_index));
        new_footer.set_meta_offset(shift_offset(footer.meta_offset(), shift_index));
        new_footer.set_string_pool_offset(shift_offset(footer.string_pool_offset(), shift_index));
        // 0 means "no expansion table"; only a real offset shifts.
        if footer.expansion_offset() != 0 {
            new_footer.set_expansion_offset(shift_offset(footer.expansion_offset(), shift_index));
        }

        Ok(Self {
            new_header,
            new_footer,
            index_start,
            index_size,
            data_size,
            shift_data,
        })
    }
}

fn write_petrified(src: &mut File, plan: &PetrifyPlan, tmp_path: &Path) -> Result<()> {
    let tmp_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp_path)
        .wrap_err_with(|| format!("failed to create temp file '{}'", tmp_path.display()))?;
    let mut out = BufWriter::with_capacity(COPY_CHUNK_SIZE, tmp_file);

    out.write_all(plan.new_header.as_bytes())
        .wrap_err("failed to write petrified header")?;
    out.write_all(plan.new_footer.as_bytes())
        .wrap_err("failed to write petrified footer")?;

    src.seek(SeekFrom::Start(plan.index_start))
        .wrap_err("failed to seek to source index region")?;
    copy_range(src, &mut out, plan.index_size).wrap_err("failed to copy index region")?;

    src.seek(SeekFrom::Start(HEADER_SIZE as u64))
        .wrap_err("failed to seek to source payload region")?;
    copy_range(src, &mut out, plan.data_size).wrap_err("failed to copy payload region")?;

    out.flush().wrap_err("failed to flush petrified container")?;
    let mut tmp = out
        .into_inner()
        .wrap_err("failed to hand back the temp file")?;

    patch_asset_offsets(
        &mut tmp,
        plan.new_footer.asset_offset(),
        plan.new_footer.asset_count(),
        plan.shift_data,
    )?;

    // The asset patch changed index-region bytes, so the stored digest must
    // be rebuilt from what actually landed on disk.
    let new_index_start = (HEADER_SIZE + FOOTER_SIZE) as u64;
    let digest = hash_region(&mut tmp, new_index_start, plan.index_size)?;
    let mut final_footer = plan.new_footer;
    final_footer.set_footer_hash(digest);

    tmp.seek(SeekFrom::Start(HEADER_SIZE as u64))
        .wrap_err("failed to seek to the petrified footer")?;
    tmp.write_all(final_footer.as_bytes())
        .wrap_err("failed to rewrite the petrified footer")?;

    tmp.sync_all()
        .wrap_err("failed to sync petrified container")?;
    Ok(())
}

/// Patches `file_offset` in every asset record of the (already relocated)
/// asset table, in batches of 64 records.
fn patch_asset_offsets(file: &mut File, table_offset: u64, count: u64, shift: u64) -> Result<()> {
    let mut buf = vec![0u8; PATCH_BATCH_RECORDS * ASSET_RECORD_SIZE];
    let mut remaining = count;
    let mut pos = table_offset;

    while remaining > 0 {
        let batch = remaining.min(PATCH_BATCH_RECORDS as u64) as usize;
        let bytes = &mut buf[..batch * ASSET_RECORD_SIZE];

        file.seek(SeekFrom::Start(pos))
            .wrap_err("failed to seek to asset batch")?;
        file.read_exact(bytes)
            .wrap_err("failed to read asset batch")?;

        let records = <[AssetRecord]>::mut_from_bytes(bytes)
            .map_err(|e| eyre::eyre!("failed to parse asset batch: {e:?}"))?;
        for record in records {
            let Some(shifted) = record.file_offset().checked_add(shift) else {
                bail!("asset offset {} overflows when shifted", record.file_offset());
            };
            record.set_file_offset(shifted);
        }

        file.seek(SeekFrom::Start(pos))
            .wrap_err("failed to seek back to asset batch")?;
        file.write_all(bytes)
            .wrap_err("failed to write patched asset batch")?;

        pos += (batch * ASSET_RECORD_SIZE) as u64;
        remaining -= batch as u64;
    }

    Ok(())
}

fn hash_region(file: &mut File, offset: u64, size: u64) -> Result<u64> {
    file.seek(SeekFrom::Start(offset))
        .wrap_err("failed to seek to index region")?;

    let mut hasher = Xxh3::new();
    let mut buf = [0u8; COPY_CHUNK_SIZE];
    let mut remaining = size;

    while remaining > 0 {
        let chunk = remaining.min(buf.len() as u64) as usize;
        file.read_exact(&mut buf[..chunk])
            .wrap_err("failed to read index region")?;
        hasher.update(&buf[..chunk]);
        remaining -= chunk as u64;
    }

    Ok(hasher.digest())
}

fn copy_range(src: &mut File, out: &mut BufWriter<File>, size: u64) -> Result<()> {
    let mut buf = [0u8; COPY_CHUNK_SIZE];
    let mut remaining = size;

    while remaining > 0 {
        let chunk = remaining.min(buf.len() as u64) as usize;
        src.read_exact(&mut buf[..chunk])?;
        out.write_all(&buf[..chunk])?;
        remaining -= chunk as u64;
    }

    Ok(())
}

fn shift_offset(offset: u64, shift: i64) -> u64 {
    (offset as i64 + shift) as u64
}

fn sibling_tmp_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn non_bbf_source_is_rejected() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("not-a-container");
        fs::write(&source, vec![0u8; 1024]).unwrap();

        let result = petrify_file(&source, dir.path().join("out.bbf"));
        assert!(result.is_err());
        assert!(!dir.path().join("out.bbf").exists());
    }

    #[test]
    fn missing_source_is_rejected() {
        let dir = tempdir().unwrap();
        let result = petrify_file(dir.path().join("absent.bbf"), dir.path().join("out.bbf"));
        assert!(result.is_err());
    }

    #[test]
    fn footer_offset_past_end_is_rejected() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("truncated.bbf");

        // Valid header pointing at a footer that does not exist.
        let header = BbfHeader::new(0, 12, 16, 1 << 40);
        fs::write(&source, header.as_bytes()).unwrap();

        let result = petrify_file(&source, dir.path().join("out.bbf"));
        assert!(result.is_err());
        assert!(!dir.path().join("out.bbf.tmp").exists());
    }
}
