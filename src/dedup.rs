//! # Asset Dedup Index
//!
//! Maps a 128-bit content hash to the index of the asset record that already
//! stores that payload. The builder probes this before writing any bytes, so
//! a book with one cover image repeated a hundred times stores the payload
//! once and a hundred 16-byte page records.
//!
//! Same shape as the string pool's table: open addressing, linear probing,
//! `Option<Slot>` occupancy, power-of-two capacity. Probing starts at the low
//! 64 bits of the hash; full-width equality decides a match. The table grows
//! at 70% load and never deletes.

const INITIAL_TABLE_SLOTS: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct Slot {
    hash: u128,
    asset_index: u64,
}

#[derive(Debug)]
pub struct AssetIndex {
    slots: Vec<Option<Slot>>,
    count: usize,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self {
            slots: vec![None; INITIAL_TABLE_SLOTS],
            count: 0,
        }
    }

    /// The asset index previously recorded for `hash`, if any.
    pub fn find(&self, hash: u128) -> Option<u64> {
        let mask = self.slots.len() - 1;
        let mut slot = hash as u64 as usize & mask;

        while let Some(entry) = self.slots[slot] {
            if entry.hash == hash {
                return Some(entry.asset_index);
            }
            slot = (slot + 1) & mask;
        }

        None
    }

    /// Records `hash -> asset_index`. Callers probe with [`find`] first; a
    /// duplicate insert would shadow the original entry.
    ///
    /// [`find`]: AssetIndex::find
    pub fn insert(&mut self, hash: u128, asset_index: u64) {
        if (self.count + 1) * 10 > self.slots.len() * 7 {
            self.grow_table();
        }

        let mask = self.slots.len() - 1;
        let mut slot = hash as u64 as usize & mask;
        while self.slots[slot].is_some() {
            slot = (slot + 1) & mask;
        }

        self.slots[slot] = Some(Slot { hash, asset_index });
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn grow_table(&mut self) {
        let new_cap = self.slots.len() * 2;
        let mask = new_cap - 1;
        let mut new_slots = vec![None; new_cap];

        for entry in self.slots.iter().flatten() {
            let mut slot = entry.hash as u64 as usize & mask;
            while new_slots[slot].is_some() {
                slot = (slot + 1) & mask;
            }
            new_slots[slot] = Some(*entry);
        }

        self.slots = new_slots;
    }
}

impl Default for AssetIndex {
    fn default() -> Self {
        Self::new()
    }
}
