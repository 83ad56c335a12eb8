//! # C ABI Embedding Surface
//!
//! Opaque-handle wrappers over [`Reader`] for host runtimes that load the
//! reader as a shared library. Each function is a thin pass-through to the
//! corresponding accessor: NULL (or 0) is the absent marker, pointers borrow
//! from the reader's mapping and stay valid until `bbf_reader_close`.
//!
//! The footer is passed explicitly wherever an accessor depends on it, the
//! same as in the Rust API; the handle carries no hidden parse state.
//!
//! ## Safety
//!
//! Callers own the contract a C API cannot express: handles come from
//! `bbf_reader_open` and are closed exactly once, struct pointers come from
//! the accessors of the same reader, and nothing is used after close.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;

use crate::format::{
    AssetRecord, BbfFooter, BbfHeader, ExpansionRecord, MetaRecord, PageRecord, SectionRecord,
};
use crate::reader::Reader;

/// Opens a container and returns an owned handle, or NULL on failure.
///
/// # Safety
///
/// `path` must be a valid NUL-terminated string. The returned handle must be
/// released with [`bbf_reader_close`].
#[no_mangle]
pub unsafe extern "C" fn bbf_reader_open(path: *const c_char) -> *mut Reader {
    if path.is_null() {
        return ptr::null_mut();
    }
    let Ok(path) = CStr::from_ptr(path).to_str() else {
        return ptr::null_mut();
    };

    match Reader::open(Path::new(path)) {
        Ok(reader) => Box::into_raw(Box::new(reader)),
        Err(_) => ptr::null_mut(),
    }
}

/// Releases a handle returned by [`bbf_reader_open`]. NULL is a no-op.
///
/// # Safety
///
/// `reader` must not be used afterwards; every view borrowed from it is
/// invalidated.
#[no_mangle]
pub unsafe extern "C" fn bbf_reader_close(reader: *mut Reader) {
    if !reader.is_null() {
        drop(Box::from_raw(reader));
    }
}

/// # Safety
///
/// `reader` must be a live handle from [`bbf_reader_open`] or NULL.
#[no_mangle]
pub unsafe extern "C" fn bbf_reader_header(reader: *const Reader) -> *const BbfHeader {
    let Some(reader) = reader.as_ref() else {
        return ptr::null();
    };
    reader.header().map_or(ptr::null(), |h| h as *const _)
}

/// # Safety
///
/// `reader` must be a live handle; `header` must come from
/// [`bbf_reader_header`] on the same reader or be NULL.
#[no_mangle]
pub unsafe extern "C" fn bbf_reader_footer(
    reader: *const Reader,
    header: *const BbfHeader,
) -> *const BbfFooter {
    let (Some(reader), Some(header)) = (reader.as_ref(), header.as_ref()) else {
        return ptr::null();
    };
    reader
        .footer(header.footer_offset())
        .map_or(ptr::null(), |f| f as *const _)
}

macro_rules! table_and_entry_fns {
    ($($table_fn:ident, $entry_fn:ident, $record:ty, $table:ident, $count:ident;)*) => {
        $(
            /// Start of the table, or NULL when the footer's range is
            /// invalid. Empty tables return a dangling-but-unread pointer to
            /// their zero-length slice.
            ///
            /// # Safety
            ///
            /// `reader` must be a live handle; `footer` must come from
            /// [`bbf_reader_footer`] on the same reader or be NULL.
            #[no_mangle]
            pub unsafe extern "C" fn $table_fn(
                reader: *const Reader,
                footer: *const BbfFooter,
            ) -> *const $record {
                let (Some(reader), Some(footer)) = (reader.as_ref(), footer.as_ref()) else {
                    return ptr::null();
                };
                reader.$table(footer).map_or(ptr::null(), |t| t.as_ptr())
            }

            /// Entry `index` of the table, bounds-checked against the
            /// footer's count.
            ///
            /// # Safety
            ///
            /// `reader` and `footer` as for the table accessor; `table` must
            /// be the pointer that accessor returned.
            #[no_mangle]
            pub unsafe extern "C" fn $entry_fn(
                reader: *const Reader,
                footer: *const BbfFooter,
                table: *const $record,
                index: u64,
            ) -> *const $record {
                let (Some(_), Some(footer)) = (reader.as_ref(), footer.as_ref()) else {
                    return ptr::null();
                };
                if table.is_null() || index >= footer.$count() {
                    return ptr::null();
                }
                table.add(index as usize)
            }
        )*
    };
}

table_and_entry_fns! {
    bbf_reader_asset_table, bbf_reader_asset_entry, AssetRecord, asset_table, asset_count;
    bbf_reader_page_table, bbf_reader_page_entry, PageRecord, page_table, page_count;
    bbf_reader_section_table, bbf_reader_section_entry, SectionRecord, section_table, section_count;
    bbf_reader_meta_table, bbf_reader_meta_entry, MetaRecord, meta_table, meta_count;
    bbf_reader_expansion_table, bbf_reader_expansion_entry, ExpansionRecord, expansion_table, expansion_count;
}

/// Start of the asset's payload bytes (`file_size` bytes long), or NULL.
///
/// # Safety
///
/// `reader` must be a live handle; `asset` must come from the same reader's
/// asset table or be NULL.
#[no_mangle]
pub unsafe extern "C" fn bbf_reader_asset_data(
    reader: *const Reader,
    asset: *const AssetRecord,
) -> *const u8 {
    let (Some(reader), Some(asset)) = (reader.as_ref(), asset.as_ref()) else {
        return ptr::null();
    };
    reader.asset_data(asset).map_or(ptr::null(), |d| d.as_ptr())
}

/// The NUL-terminated string at pool offset `offset`, or NULL for the
/// sentinel, out-of-pool offsets, and unterminated strings.
///
/// # Safety
///
/// `reader` must be a live handle; `footer` must come from
/// [`bbf_reader_footer`] on the same reader or be NULL.
#[no_mangle]
pub unsafe extern "C" fn bbf_reader_string(
    reader: *const Reader,
    footer: *const BbfFooter,
    offset: u64,
) -> *const c_char {
    let (Some(reader), Some(footer)) = (reader.as_ref(), footer.as_ref()) else {
        return ptr::null();
    };
    // string_view stops at the pool's NUL terminator, so the start pointer
    // is a valid C string within the mapping.
    reader
        .string_view(footer, offset)
        .map_or(ptr::null(), |s| s.as_ptr() as *const c_char)
}

/// 1 when the header's magic bytes spell `BBF3`, else 0.
///
/// # Safety
///
/// `header` must come from [`bbf_reader_header`] or be NULL.
#[no_mangle]
pub unsafe extern "C" fn bbf_reader_check_magic(header: *const BbfHeader) -> c_int {
    header.as_ref().is_some_and(|h| h.magic_ok()) as c_int
}

/// Computes XXH3-128 of the asset's payload into `out_low`/`out_high`.
/// Returns 1 on success, 0 when the payload range is invalid.
///
/// # Safety
///
/// `reader` and `asset` as for [`bbf_reader_asset_data`]; `out_low` and
/// `out_high` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn bbf_reader_compute_asset_hash(
    reader: *const Reader,
    asset: *const AssetRecord,
    out_low: *mut u64,
    out_high: *mut u64,
) -> c_int {
    let (Some(reader), Some(asset)) = (reader.as_ref(), asset.as_ref()) else {
        return 0;
    };
    if out_low.is_null() || out_high.is_null() {
        return 0;
    }

    match reader.compute_asset_hash(asset) {
        Some(hash) => {
            *out_low = hash as u64;
            *out_high = (hash >> 64) as u64;
            1
        }
        None => 0,
    }
}
