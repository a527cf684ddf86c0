//! String Interning Pool
//!
//! Deduplicated storage for element names, attribute names, namespace
//! prefixes and namespace URIs. Names repeat heavily across a tree, so each
//! distinct string is stored once and nodes carry a `u32` id.
//!
//! Id 0 is reserved for "no string".

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Location of an interned string inside the pool buffer
#[derive(Debug, Clone, Copy)]
struct Entry {
    offset: u32,
    len: u32,
}

/// Append-only string interning pool
///
/// Memory layout:
/// - `entries`: (offset, len) into `data` for each interned string id
/// - `data`: concatenated string bytes
/// - `hash_index`: hash -> ids with that hash (handles rare collisions)
#[derive(Debug)]
pub struct StringPool {
    entries: Vec<Entry>,
    data: String,
    hash_index: HashMap<u64, Vec<u32>>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    /// Create a new empty string pool
    pub fn new() -> Self {
        let mut pool = StringPool {
            entries: Vec::with_capacity(64),
            data: String::with_capacity(1024),
            hash_index: HashMap::new(),
        };
        pool.entries.push(Entry { offset: 0, len: 0 });
        pool
    }

    #[inline]
    fn compute_hash(s: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Intern a string, returning the id of an existing copy when present
    pub fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }

        let hash = Self::compute_hash(s);
        if let Some(ids) = self.hash_index.get(&hash) {
            for &id in ids {
                if self.get_str(id) == Some(s) {
                    return id;
                }
            }
        }

        let offset = self.data.len() as u32;
        self.data.push_str(s);

        let id = self.entries.len() as u32;
        self.entries.push(Entry {
            offset,
            len: s.len() as u32,
        });
        self.hash_index.entry(hash).or_default().push(id);

        id
    }

    /// Look up the id of an already interned string without inserting it
    pub fn lookup(&self, s: &str) -> Option<u32> {
        if s.is_empty() {
            return Some(0);
        }
        let ids = self.hash_index.get(&Self::compute_hash(s))?;
        ids.iter().copied().find(|&id| self.get_str(id) == Some(s))
    }

    /// Get a string by id
    pub fn get_str(&self, id: u32) -> Option<&str> {
        let entry = self.entries.get(id as usize)?;
        let start = entry.offset as usize;
        self.data.get(start..start + entry.len as usize)
    }

    /// Number of distinct strings stored, including the reserved empty entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool holds no strings besides the reserved entry
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Total bytes of string storage
    pub fn bytes_used(&self) -> usize {
        self.data.len()
    }
}
