//! # BBF - Bound Book Format Container
//!
//! BBF packs an ordered sequence of binary assets (typically the page images
//! of a book) into a single content-addressed file together with hierarchical
//! section markers and key/value metadata. The design goals:
//!
//! - **Zero-copy reads**: the reader memory-maps the container and hands out
//!   borrowed views; payloads can go straight to an image decoder
//! - **Content addressing**: identical payloads are stored once and referenced
//!   by any number of pages (XXH3-128 dedup)
//! - **Alignment awareness**: payloads start on power-of-two boundaries so a
//!   mapped view is directly usable; small assets can opt into 8-byte "ream"
//!   packing to cut fragmentation
//! - **Integrity**: every payload carries its 128-bit content hash and the
//!   directory region carries an XXH3-64 digest
//!
//! ## Quick Start
//!
//! ```ignore
//! use bbf::{Builder, BuilderOptions, Reader};
//!
//! let mut builder = Builder::create("book.bbf", BuilderOptions::default())?;
//! builder.add_page("pages/cover.png", 0, 0)?;
//! builder.add_page("pages/001.avif", 0, 0)?;
//! builder.add_meta("title", "An Example Book", None)?;
//! builder.add_section("Chapter 1", 1, None)?;
//! builder.finalize()?;
//!
//! let reader = Reader::open("book.bbf")?;
//! let header = reader.header().expect("truncated container");
//! let footer = reader.footer(header.footer_offset()).expect("bad footer");
//! for page in reader.page_table(footer).expect("bad page table") {
//!     let asset = &reader.asset_table(footer).unwrap()[page.asset_index() as usize];
//!     let bytes = reader.asset_data(asset).expect("payload out of bounds");
//!     // decode bytes...
//! }
//! ```
//!
//! ## File Layout
//!
//! ```text
//! +--------------------+  offset 0
//! | Header (64 B)      |  magic, version, flags, footer offset
//! +--------------------+
//! | Payload region     |  assets, each padded to its alignment boundary
//! |  ...               |
//! +--------------------+
//! | Asset table        |  \
//! | Page table         |   |
//! | Section table      |   |  "index region", XXH3-64 digest in footer
//! | Metadata table     |   |
//! | String pool        |  /
//! +--------------------+
//! | Footer (208 B)     |  table offsets, counts, index hash
//! +--------------------+
//! ```
//!
//! A *petrified* container (see [`petrify_file`]) has the same contents with
//! the footer and index region relocated directly behind the header, so a
//! reader discovers the whole structure in the first mapped page.
//!
//! ## Module Overview
//!
//! - [`format`]: on-disk header/footer/record layouts and format constants
//! - [`intern`]: deduplicated, offset-addressed string pool
//! - [`dedup`]: 128-bit content-hash to asset-index probing table
//! - [`builder`]: streaming ingestion, dedup, alignment, index emission
//! - [`reader`]: bounds-checked zero-copy views over a mapped container
//! - [`petrify`]: directory relocation transform
//! - [`ffi`]: opaque-handle C ABI over the reader for host embedding
//!
//! ## Concurrency Model
//!
//! Builder, reader, and petrification are single-threaded per instance; a
//! builder owns its output file exclusively, while any number of readers may
//! map the same container concurrently.

#[macro_use]
mod macros;

pub mod builder;
pub mod dedup;
pub mod ffi;
pub mod format;
pub mod intern;
pub mod petrify;
pub mod reader;

pub use builder::{Builder, BuilderOptions};
pub use format::{
    AssetRecord, BbfFooter, BbfHeader, ExpansionRecord, MediaType, MetaRecord, PageRecord,
    SectionRecord, DEFAULT_GUARD_ALIGNMENT, DEFAULT_SMALL_REAM_THRESHOLD, FLAG_PETRIFIED,
    FLAG_VARIABLE_REAM, FOOTER_SIZE, HEADER_SIZE, INVALID_OFFSET, MAX_BALE_SIZE, MAX_FORME_SIZE,
    VERSION,
};
pub use petrify::petrify_file;
pub use reader::Reader;
