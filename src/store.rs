//! Per-style generation status table.

use crate::models::{PhotoStyle, ResultEntry};

/// One [`ResultEntry`] per [`PhotoStyle`], in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    entries: Vec<ResultEntry>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    /// A fresh table with every style idle.
    pub fn new() -> Self {
        Self { entries: PhotoStyle::ALL.iter().map(|s| ResultEntry::idle(*s)).collect() }
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn get(&self, style: PhotoStyle) -> &ResultEntry {
        &self.entries[style.index()]
    }

    /// Replace the entry for `entry.style`, leaving every other entry untouched.
    pub fn update(&mut self, entry: ResultEntry) {
        let idx = entry.style.index();
        self.entries[idx] = entry;
    }

    /// Apply a settlement only if the entry is still waiting on `ticket`.
    ///
    /// Returns false when the settlement is stale and was discarded.
    pub fn settle(&mut self, ticket: u64, entry: ResultEntry) -> bool {
        let current = self.get(entry.style);
        if !current.is_pending || current.ticket != ticket {
            return false;
        }
        self.update(entry);
        true
    }

    pub fn any_pending(&self) -> bool {
        self.entries.iter().any(|e| e.is_pending)
    }
}
