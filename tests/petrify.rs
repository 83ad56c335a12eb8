//! Petrification coverage: layout after the transform, semantic equivalence
//! with the source container, and rejection of already-petrified input.

use std::fs;
use std::path::PathBuf;

use tempfile::{tempdir, TempDir};

use bbf::{
    petrify_file, Builder, BuilderOptions, Reader, FLAG_PETRIFIED, FOOTER_SIZE, HEADER_SIZE,
    INVALID_OFFSET,
};

fn write_input(dir: &TempDir, name: &str, byte: u8, len: usize) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, vec![byte; len]).unwrap();
    path
}

fn build_source_book(dir: &TempDir) -> PathBuf {
    let a = write_input(dir, "A.png", b'A', 2048);
    let b = write_input(dir, "B.png", b'B', 1024);
    let c = write_input(dir, "C.png", b'C', 512);

    let out = dir.path().join("book.bbf");
    let mut builder = Builder::create(&out, BuilderOptions::default()).unwrap();
    builder.add_page(&a, 0, 0).unwrap();
    builder.add_page(&b, 0, 0).unwrap();
    builder.add_page(&a, 0, 0).unwrap(); // dedup: page 2 shares asset 0
    builder.add_page(&c, 0, 0).unwrap();
    builder.add_meta("title", "Book", None).unwrap();
    builder.add_meta("author", "X", Some("title")).unwrap();
    builder.add_section("Part I", 0, None).unwrap();
    builder.add_section("Chapter 1", 1, Some("Part I")).unwrap();
    builder.finalize().unwrap();
    out
}

#[test]
fn petrified_directory_sits_behind_the_header() {
    let dir = tempdir().unwrap();
    let source = build_source_book(&dir);
    let dest = dir.path().join("book.petrified.bbf");

    petrify_file(&source, &dest).unwrap();

    let reader = Reader::open(&dest).unwrap();
    let header = reader.header().unwrap();

    assert!(header.magic_ok());
    assert_eq!(header.flags() & FLAG_PETRIFIED, FLAG_PETRIFIED);
    assert_eq!(header.footer_offset(), HEADER_SIZE as u64);

    let footer = reader.footer(header.footer_offset()).unwrap();
    assert_eq!(footer.asset_offset(), (HEADER_SIZE + FOOTER_SIZE) as u64);
}

#[test]
fn petrified_payloads_and_hashes_survive() {
    let dir = tempdir().unwrap();
    let source = build_source_book(&dir);
    let dest = dir.path().join("book.petrified.bbf");
    petrify_file(&source, &dest).unwrap();

    let src_reader = Reader::open(&source).unwrap();
    let src_footer = src_reader
        .footer(src_reader.header().unwrap().footer_offset())
        .unwrap();

    let dst_reader = Reader::open(&dest).unwrap();
    let dst_footer = dst_reader
        .footer(dst_reader.header().unwrap().footer_offset())
        .unwrap();

    assert_eq!(dst_footer.asset_count(), src_footer.asset_count());
    assert_eq!(dst_footer.page_count(), src_footer.page_count());

    let src_assets = src_reader.asset_table(src_footer).unwrap();
    let src_pages = src_reader.page_table(src_footer).unwrap();
    let dst_assets = dst_reader.asset_table(dst_footer).unwrap();
    let dst_pages = dst_reader.page_table(dst_footer).unwrap();

    for (src_page, dst_page) in src_pages.iter().zip(dst_pages) {
        assert_eq!(dst_page.asset_index(), src_page.asset_index());

        let src_data = src_reader
            .asset_data(&src_assets[src_page.asset_index() as usize])
            .unwrap();
        let dst_data = dst_reader
            .asset_data(&dst_assets[dst_page.asset_index() as usize])
            .unwrap();
        assert_eq!(src_data, dst_data);
    }

    for asset in dst_assets {
        assert_eq!(dst_reader.asset_hash_matches(asset), Some(true));
    }
}

#[test]
fn petrified_metadata_and_sections_are_equivalent() {
    let dir = tempdir().unwrap();
    let source = build_source_book(&dir);
    let dest = dir.path().join("book.petrified.bbf");
    petrify_file(&source, &dest).unwrap();

    let src_reader = Reader::open(&source).unwrap();
    let src_footer = src_reader
        .footer(src_reader.header().unwrap().footer_offset())
        .unwrap();
    let dst_reader = Reader::open(&dest).unwrap();
    let dst_footer = dst_reader
        .footer(dst_reader.header().unwrap().footer_offset())
        .unwrap();

    let resolve = |reader: &Reader, footer: &bbf::BbfFooter, offset: u64| -> Option<String> {
        if offset == INVALID_OFFSET {
            return None;
        }
        reader.string_view(footer, offset).map(str::to_owned)
    };

    let src_meta: Vec<_> = src_reader
        .meta_table(src_footer)
        .unwrap()
        .iter()
        .map(|m| {
            (
                resolve(&src_reader, src_footer, m.key_offset()),
                resolve(&src_reader, src_footer, m.value_offset()),
                resolve(&src_reader, src_footer, m.parent_offset()),
            )
        })
        .collect();
    let dst_meta: Vec<_> = dst_reader
        .meta_table(dst_footer)
        .unwrap()
        .iter()
        .map(|m| {
            (
                resolve(&dst_reader, dst_footer, m.key_offset()),
                resolve(&dst_reader, dst_footer, m.value_offset()),
                resolve(&dst_reader, dst_footer, m.parent_offset()),
            )
        })
        .collect();
    assert_eq!(src_meta, dst_meta);

    let src_sections: Vec<_> = src_reader
        .section_table(src_footer)
        .unwrap()
        .iter()
        .map(|s| {
            (
                resolve(&src_reader, src_footer, s.title_offset()),
                s.start_page_index(),
                resolve(&src_reader, src_footer, s.parent_offset()),
            )
        })
        .collect();
    let dst_sections: Vec<_> = dst_reader
        .section_table(dst_footer)
        .unwrap()
        .iter()
        .map(|s| {
            (
                resolve(&dst_reader, dst_footer, s.title_offset()),
                s.start_page_index(),
                resolve(&dst_reader, dst_footer, s.parent_offset()),
            )
        })
        .collect();
    assert_eq!(src_sections, dst_sections);
}

#[test]
fn petrified_index_hash_matches_the_relocated_bytes() {
    let dir = tempdir().unwrap();
    let source = build_source_book(&dir);
    let dest = dir.path().join("book.petrified.bbf");
    petrify_file(&source, &dest).unwrap();

    let reader = Reader::open(&dest).unwrap();
    let footer = reader
        .footer(reader.header().unwrap().footer_offset())
        .unwrap();

    // The asset-offset patch changes the index region, so the transform must
    // have stored a recomputed digest.
    assert_eq!(reader.verify_index_hash(footer), Some(true));
}

#[test]
fn petrifying_twice_is_rejected() {
    let dir = tempdir().unwrap();
    let source = build_source_book(&dir);
    let once = dir.path().join("once.bbf");
    let twice = dir.path().join("twice.bbf");

    petrify_file(&source, &once).unwrap();
    let result = petrify_file(&once, &twice);

    assert!(result.is_err());
    assert!(!twice.exists());
    // No temp debris either.
    assert!(!dir.path().join("twice.bbf.tmp").exists());
}

#[test]
fn source_container_is_left_untouched() {
    let dir = tempdir().unwrap();
    let source = build_source_book(&dir);
    let before = fs::read(&source).unwrap();

    petrify_file(&source, dir.path().join("out.bbf")).unwrap();

    assert_eq!(fs::read(&source).unwrap(), before);
}

#[test]
fn variable_ream_book_petrifies_cleanly() {
    let dir = tempdir().unwrap();
    let small = write_input(&dir, "small.png", 0x01, 64);
    let large = write_input(&dir, "large.png", 0x02, 100_000);

    let source = dir.path().join("ream.bbf");
    let mut builder = Builder::create(&source, BuilderOptions::variable_ream()).unwrap();
    builder.add_page(&small, 0, 0).unwrap();
    builder.add_page(&large, 0, 0).unwrap();
    builder.finalize().unwrap();

    let dest = dir.path().join("ream.petrified.bbf");
    petrify_file(&source, &dest).unwrap();

    let reader = Reader::open(&dest).unwrap();
    let footer = reader
        .footer(reader.header().unwrap().footer_offset())
        .unwrap();
    for asset in reader.asset_table(footer).unwrap() {
        assert_eq!(reader.asset_hash_matches(asset), Some(true));
    }
    assert_eq!(reader.verify_index_hash(footer), Some(true));
}
