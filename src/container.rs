//! Generic registry for "open item" entities (orders, loans): lookup by id,
//! plus an iteration order over the currently-open subset.
//!
//! The source system models the open index as a Python generator that
//! lazily compacts itself; we replace that with a map plus a vector of ids
//! (the "open index"), marking vector slots stale on close and compacting
//! the vector when enough of it has gone stale. This keeps iteration O(open
//! count) amortized without ever losing an open entry from the index.

const REINDEX_EVERY: usize = 50;

/// A trait for anything the container can track, so it can ask its own
/// "is this still open" question when iterating.
pub trait OpenItem {
    fn is_open(&self) -> bool;
}

pub struct ExchangeObjectContainer<T> {
    items: std::collections::HashMap<String, T>,
    // Insertion-ordered ids, may contain ids whose item has since closed.
    open_index: Vec<String>,
    iterations_since_reindex: usize,
}

impl<T: OpenItem> Default for ExchangeObjectContainer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: OpenItem> ExchangeObjectContainer<T> {
    pub fn new() -> Self {
        Self {
            items: std::collections::HashMap::new(),
            open_index: Vec::new(),
            iterations_since_reindex: 0,
        }
    }

    /// Registers a new item, in id-allocation order, at the back of the open
    /// index. Callers should only add items that start out open.
    pub fn add(&mut self, id: String, item: T) {
        debug_assert!(item.is_open(), "items must be added while open");
        self.open_index.push(id.clone());
        self.items.insert(id, item);
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.items.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids of currently-open items, in insertion order. Compacts the open
    /// index first if it has drifted too far from reality, so the returned
    /// list is never longer than necessary.
    pub fn open_ids(&mut self) -> Vec<String> {
        self.maybe_reindex();
        self.open_index
            .iter()
            .filter(|id| self.items.get(*id).is_some_and(OpenItem::is_open))
            .cloned()
            .collect()
    }

    pub fn get_open(&mut self) -> Vec<&T> {
        let ids = self.open_ids();
        ids.into_iter().filter_map(|id| self.items.get(&id)).collect()
    }

    /// Called after an item's state changes (e.g. a fill, a cancel). Drives
    /// the periodic compaction; does not need to know whether the item
    /// closed, only that an iteration step happened.
    pub fn note_iteration(&mut self) {
        self.iterations_since_reindex += 1;
        self.maybe_reindex();
    }

    fn maybe_reindex(&mut self) {
        let stale = self
            .open_index
            .iter()
            .filter(|id| !self.items.get(*id).is_some_and(OpenItem::is_open))
            .count();
        let stale_ratio_high = !self.open_index.is_empty() && stale * 4 > self.open_index.len();
        if self.iterations_since_reindex >= REINDEX_EVERY || stale_ratio_high {
            self.open_index.retain(|id| self.items.get(id).is_some_and(OpenItem::is_open));
            self.iterations_since_reindex = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone)]
    struct Item {
        open: bool,
    }

    impl OpenItem for Item {
        fn is_open(&self) -> bool {
            self.open
        }
    }

    #[test]
    fn open_ids_preserves_insertion_order() {
        let mut c = ExchangeObjectContainer::new();
        c.add("a".into(), Item { open: true });
        c.add("b".into(), Item { open: true });
        c.add("c".into(), Item { open: true });
        assert_eq!(c.open_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn closed_items_are_skipped_without_losing_open_ones() {
        let mut c = ExchangeObjectContainer::new();
        c.add("a".into(), Item { open: true });
        c.add("b".into(), Item { open: true });
        c.get_mut("a").unwrap().open = false;
        assert_eq!(c.open_ids(), vec!["b"]);
    }

    #[test]
    fn compacts_after_enough_iterations_without_dropping_open_entries() {
        let mut c = ExchangeObjectContainer::new();
        for i in 0..200 {
            c.add(i.to_string(), Item { open: i % 2 == 0 });
        }
        for _ in 0..200 {
            c.note_iteration();
        }
        // Index should have compacted down to just the open half.
        assert!(c.open_index.len() <= 100);
        let open = c.open_ids();
        assert_eq!(open.len(), 100);
        assert!(open.iter().all(|id| id.parse::<i32>().unwrap() % 2 == 0));
    }

    #[test]
    fn never_loses_an_open_entry_across_many_closes() {
        let mut c = ExchangeObjectContainer::new();
        for i in 0..500 {
            c.add(i.to_string(), Item { open: true });
        }
        for i in 0..490 {
            c.get_mut(&i.to_string()).unwrap().open = false;
            c.note_iteration();
        }
        let open = c.open_ids();
        assert_eq!(open.len(), 10);
    }

    proptest! {
        // For any sequence of closes interleaved with reindex-triggering
        // iterations, the open index must report exactly the items that are
        // still open, in insertion order — never more, never fewer.
        #[test]
        fn open_ids_always_matches_the_true_open_set(
            close_order in proptest::collection::vec(0usize..100, 0..300),
        ) {
            let mut c = ExchangeObjectContainer::new();
            for i in 0..100 {
                c.add(i.to_string(), Item { open: true });
            }

            for id in close_order {
                if let Some(item) = c.get_mut(&id.to_string()) {
                    item.open = false;
                }
                c.note_iteration();

                let expected: Vec<String> =
                    (0..100).map(|i| i.to_string()).filter(|id| c.get(id).unwrap().is_open()).collect();
                let actual = c.open_ids();
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
