//! Fuzz testing for reader bounds safety.
//!
//! Presents arbitrary bytes as a mapped container and walks every accessor.
//! The reader must never panic and never hand out a view that extends past
//! the end of the file, no matter what the bytes claim.

#![no_main]

use std::io::Write;

use libfuzzer_sys::fuzz_target;

use bbf::Reader;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(data).expect("write fuzz input");

    let Ok(reader) = Reader::open(file.path()) else {
        return;
    };

    let Some(header) = reader.header() else {
        return;
    };
    let _ = header.magic_ok();

    let Some(footer) = reader.footer(header.footer_offset()) else {
        return;
    };

    if let Some(assets) = reader.asset_table(footer) {
        for asset in assets {
            if let Some(payload) = reader.asset_data(asset) {
                assert_eq!(payload.len() as u64, asset.file_size());
            }
            let _ = reader.asset_hash_matches(asset);
        }
    }

    if let Some(pages) = reader.page_table(footer) {
        for page in pages {
            let _ = page.asset_index();
        }
    }

    if let Some(sections) = reader.section_table(footer) {
        for section in sections {
            let _ = reader.string_view(footer, section.title_offset());
            let _ = reader.string_view(footer, section.parent_offset());
        }
    }

    if let Some(meta) = reader.meta_table(footer) {
        for record in meta {
            let _ = reader.string_view(footer, record.key_offset());
            let _ = reader.string_view(footer, record.value_offset());
            let _ = reader.string_view(footer, record.parent_offset());
        }
    }

    let _ = reader.expansion_table(footer);
    let _ = reader.verify_index_hash(footer);
});
