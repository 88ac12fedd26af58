//! String deduplication table.
//!
//! Maps string content to the address of an existing heap string so that
//! repeated literals share one allocation. Entries do not keep their string
//! alive; sweep purges entries whose string died.

use rustc_hash::FxHashMap;

pub(crate) struct StringTable {
    entries: FxHashMap<Box<str>, usize>,
}

impl StringTable {
    pub(crate) fn new() -> StringTable {
        StringTable {
            entries: FxHashMap::default(),
        }
    }

    pub(crate) fn lookup(&self, text: &str) -> Option<usize> {
        self.entries.get(text).copied()
    }

    pub(crate) fn insert(&mut self, text: &str, addr: usize) {
        self.entries.insert(text.into(), addr);
    }

    /// Drop the entry for `text` if it still points at `addr`. A newer
    /// string of the same content keeps its own entry.
    pub(crate) fn forget(&mut self, text: &str, addr: usize) {
        if self.entries.get(text) == Some(&addr) {
            self.entries.remove(text);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
