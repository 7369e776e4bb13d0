use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use crate::core::types::DocKey;

// Fixed seeds keep string-key hashes identical across processes
const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Concurrent external key -> docid map.
///
/// String keys are stored by their 64-bit hash, integer keys by value.
pub struct KeyMap {
    map: DashMap<u64, u32>,
    hasher: RandomState,
}

impl KeyMap {
    pub fn new() -> Self {
        KeyMap {
            map: DashMap::new(),
            hasher: RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]),
        }
    }

    fn slot(&self, key: &DocKey) -> u64 {
        match key {
            DocKey::Str(s) => self.hasher.hash_one(s.as_bytes()),
            DocKey::Long(v) => *v as u64,
        }
    }

    /// Map `key` to `docid`, returning the docid it replaced
    pub fn insert(&self, key: &DocKey, docid: u32) -> Option<u32> {
        self.map.insert(self.slot(key), docid)
    }

    /// Map `key` to `docid` unless it already maps to a later docid
    pub fn insert_latest(&self, key: &DocKey, docid: u32) {
        match self.map.entry(self.slot(key)) {
            Entry::Occupied(mut e) => {
                if *e.get() < docid {
                    e.insert(docid);
                }
            }
            Entry::Vacant(e) => {
                e.insert(docid);
            }
        }
    }

    pub fn get(&self, key: &DocKey) -> Option<u32> {
        self.map.get(&self.slot(key)).map(|v| *v)
    }

    pub fn remove(&self, key: &DocKey) -> Option<u32> {
        self.map.remove(&self.slot(key)).map(|(_, docid)| docid)
    }

    /// Remove `key` only while it still maps to `docid`
    pub fn remove_if(&self, key: &DocKey, docid: u32) -> bool {
        self.map.remove_if(&self.slot(key), |_, v| *v == docid).is_some()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new()
    }
}
