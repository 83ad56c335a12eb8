//! # String Interning Pool
//!
//! Deduplicated, offset-addressed storage for every string a container
//! carries (metadata keys and values, section titles). Strings live
//! back-to-back in one append-only buffer, NUL-terminated, and records refer
//! to them by byte offset within the pool. Interning the same string twice
//! returns the same offset, so a metadata parent reference costs eight bytes
//! regardless of how many children share it.
//!
//! Lookup is an open-addressed, linear-probe table keyed by the XXH3-64 of
//! the string. Slots hold `Option<Slot>` so occupancy is explicit; a string
//! whose digest happens to be zero interns exactly once like any other.
//! Probe collisions are broken by comparing the candidate against the stored
//! bytes. The table doubles at 75% load, the buffer grows as a plain `Vec`.

use xxhash_rust::xxh3::xxh3_64;

use crate::format::INVALID_OFFSET;

const INITIAL_POOL_BYTES: usize = 4096;
const INITIAL_TABLE_SLOTS: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct Slot {
    hash: u64,
    offset: u64,
}

#[derive(Debug)]
pub struct StringPool {
    data: Vec<u8>,
    slots: Vec<Option<Slot>>,
    entries: usize,
}

impl StringPool {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(INITIAL_POOL_BYTES),
            slots: vec![None; INITIAL_TABLE_SLOTS],
            entries: 0,
        }
    }

    /// Returns the pool offset at which `s` is stored, appending it on first
    /// sight. The empty string is not stored; it interns to the absent
    /// sentinel.
    pub fn intern(&mut self, s: &str) -> u64 {
        if s.is_empty() {
            return INVALID_OFFSET;
        }

        // Grow before probing so the insertion slot is computed against the
        // final table size.
        if (self.entries + 1) * 4 > self.slots.len() * 3 {
            self.grow_table();
        }

        let hash = xxh3_64(s.as_bytes());
        let mask = self.slots.len() - 1;
        let mut slot = hash as usize & mask;

        while let Some(entry) = self.slots[slot] {
            if entry.hash == hash && self.stored_eq(entry.offset, s) {
                return entry.offset;
            }
            slot = (slot + 1) & mask;
        }

        let offset = self.data.len() as u64;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);

        self.slots[slot] = Some(Slot { hash, offset });
        self.entries += 1;

        offset
    }

    /// The string stored at `offset`, if the offset is a valid entry start.
    pub fn get(&self, offset: u64) -> Option<&str> {
        let start = usize::try_from(offset).ok()?;
        if start >= self.data.len() {
            return None;
        }
        let nul = self.data[start..].iter().position(|&b| b == 0)?;
        std::str::from_utf8(&self.data[start..start + nul]).ok()
    }

    /// Raw pool bytes, exactly as flushed to disk.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn used_size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    fn stored_eq(&self, offset: u64, s: &str) -> bool {
        let start = offset as usize;
        let end = start + s.len();
        end < self.data.len() && &self.data[start..end] == s.as_bytes() && self.data[end] == 0
    }

    fn grow_table(&mut self) {
        let new_cap = self.slots.len() * 2;
        let mask = new_cap - 1;
        let mut new_slots = vec![None; new_cap];

        for entry in self.slots.iter().flatten() {
            let mut slot = entry.hash as usize & mask;
            while new_slots[slot].is_some() {
                slot = (slot + 1) & mask;
            }
            new_slots[slot] = Some(*entry);
        }

        self.slots = new_slots;
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_twice_returns_the_same_offset() {
        let mut pool = StringPool::new();
        let first = pool.intern("title");
        let second = pool.intern("title");

        assert_eq!(first, second);
        assert_eq!(pool.entry_count(), 1);
        assert_eq!(pool.used_size(), 6);
    }

    #[test]
    fn distinct_strings_get_distinct_offsets() {
        let mut pool = StringPool::new();
        let a = pool.intern("author");
        let b = pool.intern("title");

        assert_ne!(a, b);
        assert_eq!(pool.get(a), Some("author"));
        assert_eq!(pool.get(b), Some("title"));
    }

    #[test]
    fn empty_string_interns_to_the_sentinel() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern(""), INVALID_OFFSET);
        assert_eq!(pool.used_size(), 0);
        assert_eq!(pool.entry_count(), 0);
    }

    #[test]
    fn pool_bytes_are_nul_terminated_in_insertion_order() {
        let mut pool = StringPool::new();
        pool.intern("ab");
        pool.intern("c");
        pool.intern("ab");

        assert_eq!(pool.as_bytes(), b"ab\0c\0");
    }

    #[test]
    fn offsets_into_the_middle_of_an_entry_are_not_entry_starts() {
        let mut pool = StringPool::new();
        let offset = pool.intern("abc");
        assert_eq!(offset, 0);

        // Reading from a mid-entry offset yields the suffix, as on disk.
        assert_eq!(pool.get(1), Some("bc"));
        assert_eq!(pool.get(100), None);
    }

    #[test]
    fn table_survives_growth_past_the_load_factor() {
        let mut pool = StringPool::new();
        let count = INITIAL_TABLE_SLOTS; // forces at least one doubling
        let mut offsets = Vec::with_capacity(count);

        for i in 0..count {
            offsets.push(pool.intern(&format!("string-{i}")));
        }

        for (i, &offset) in offsets.iter().enumerate() {
            assert_eq!(pool.intern(&format!("string-{i}")), offset);
        }
        assert_eq!(pool.entry_count(), count);
    }
}
