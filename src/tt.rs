/// A single entry in the node-count cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerftEntry {
    /// Position key: Zobrist hash mixed with the occupancy
    pub key: u64,
    /// Remaining depth the count was taken at
    pub depth: u8,
    pub nodes: u64,
}

impl PerftEntry {
    pub fn empty() -> Self {
        PerftEntry::default()
    }
}

/// Node-count cache for nodes-only perft.
///
/// Entries only ever answer a probe at exactly the depth they were stored at; a subtree count
/// at another depth is a different number.
pub struct PerftTable {
    /// Table entries (power of 2 size for fast modulo via bitmask)
    entries: Vec<PerftEntry>,
    size_mask: usize,
    pub hits: u64,
    pub stores: u64,
    pub collisions: u64,
}

impl PerftTable {
    /// Create a table with approximately `size_mb` megabytes of memory
    pub fn new(size_mb: usize) -> Self {
        let entry_size = std::mem::size_of::<PerftEntry>();
        let num_entries = (size_mb * 1024 * 1024) / entry_size;
        // Round down to nearest power of 2
        let num_entries = num_entries.next_power_of_two() >> 1;
        let num_entries = num_entries.max(1024);

        PerftTable {
            entries: vec![PerftEntry::empty(); num_entries],
            size_mask: num_entries - 1,
            hits: 0,
            stores: 0,
            collisions: 0,
        }
    }

    /// Cache key of a position. The occupancy is folded in so two positions whose Zobrist
    /// keys happen to collide still need the same piece layout to share an entry.
    #[inline]
    pub fn key(hash: u64, occupied: u64) -> u64 {
        hash ^ occupied
    }

    #[inline]
    fn index(&self, key: u64) -> usize {
        (key as usize) & self.size_mask
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn probe(&mut self, key: u64, depth: u8) -> Option<u64> {
        let entry = &self.entries[self.index(key)];
        // An all-zero slot is empty, never a hit
        if entry.nodes == 0 || entry.key != key || entry.depth != depth {
            return None;
        }
        self.hits += 1;
        Some(entry.nodes)
    }

    /// Store a subtree count, always replacing.
    pub fn store(&mut self, key: u64, depth: u8, nodes: u64) {
        let idx = self.index(key);
        let existing = &self.entries[idx];
        if existing.nodes != 0 && existing.key != key {
            self.collisions += 1;
        }
        self.entries[idx] = PerftEntry { key, depth, nodes };
        self.stores += 1;
    }

    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = PerftEntry::empty();
        }
        self.hits = 0;
        self.stores = 0;
        self.collisions = 0;
    }

    /// Percentage of entries in use
    pub fn fill_rate(&self) -> f64 {
        let used = self.entries.iter().filter(|e| e.nodes != 0).count();
        (used as f64) / (self.entries.len() as f64) * 100.0
    }

    pub fn info(&self) -> String {
        format!(
            "PerftTable: {} entries, {:.1}% filled, {} hits, {} stores, {} collisions",
            self.entries.len(),
            self.fill_rate(),
            self.hits,
            self.stores,
            self.collisions
        )
    }
}
