//! Wire-field accessor macros.
//!
//! Every multi-byte field in an on-disk struct is a
//! `zerocopy::little_endian` wrapper so the struct parses in place from a
//! mapped container on any host. These internal macros stamp out the
//! `.get()`/`::new()` boilerplate from a field list. The caller names the
//! wrapper alongside the native type, which keeps each macro a single
//! expansion:
//!
//! ```ignore
//! use zerocopy::little_endian::{U32, U64};
//!
//! #[repr(C)]
//! struct BbfFooter {
//!     asset_offset: U64,
//!     flags: U32,
//! }
//!
//! impl BbfFooter {
//!     wire_accessors! {
//!         asset_offset: U64 => u64,
//!         flags: U32 => u32,
//!     }
//! }
//! ```
//!
//! `wire_accessors!` emits a getter and a setter per field, for structs the
//! builder fills incrementally and the petrifier rewrites (header, footer,
//! asset records). `wire_getters!` emits getters only, for records that are
//! immutable once constructed.

/// Getter/setter pairs for little-endian wire fields.
macro_rules! wire_accessors {
    ($($field:ident : $wrapper:ident => $native:ty),* $(,)?) => {
        ::paste::paste! {
            $(
                #[inline]
                pub fn $field(&self) -> $native {
                    self.$field.get()
                }

                #[inline]
                pub fn [<set_ $field>](&mut self, value: $native) {
                    self.$field = ::zerocopy::little_endian::$wrapper::new(value);
                }
            )*
        }
    };
}

/// Getters only, for wire fields that are never rewritten.
macro_rules! wire_getters {
    ($($field:ident : $native:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $field(&self) -> $native {
                self.$field.get()
            }
        )*
    };
}
