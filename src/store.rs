//! # Entry Store
//!
//! Ordered, status-indexed collection of in-flight entries with
//! parent/child bookkeeping.
//!
//! Ordering is an explicit doubly-linked chain over an id-indexed map, with
//! insert-before/insert-after-anchor primitives. Children are always placed
//! immediately next to their parent, so "child before parent" vs "child
//! after parent" is how a plugin expresses override precedence: the reduce
//! phase folds entries in store order and later entries win.
//!
//! The store performs no I/O; every operation is a local mutation. It is
//! only ever mutated from inside the serialized build queue, which is the
//! single-writer discipline the engine relies on.

use crate::entry::{Entry, EntryStatus};
use std::collections::HashMap;

struct Node {
    entry: Entry,
    prev: Option<String>,
    next: Option<String>,
}

/// Ordered entry collection with per-status counts and a dirty flag.
#[derive(Default)]
pub struct EntryStore {
    nodes: HashMap<String, Node>,
    head: Option<String>,
    tail: Option<String>,
    /// Child id -> parent id.
    parents: HashMap<String, String>,
    statuses: HashMap<String, EntryStatus>,
    counts: [usize; EntryStatus::COUNT],
    has_updates: bool,
}

impl EntryStore {
    pub fn new() -> Self {
        EntryStore {
            nodes: HashMap::new(),
            head: None,
            tail: None,
            parents: HashMap::new(),
            statuses: HashMap::new(),
            counts: [0; EntryStatus::COUNT],
            has_updates: false,
        }
    }

    /// Adds, replaces or removes an entry and repositions it if needed.
    ///
    /// A valueless entry is a deletion request: the entry and its subtree
    /// are removed and `false` is returned. Otherwise the entry is placed:
    ///
    /// - with no known parent, a new entry is appended; an existing one is
    ///   replaced in place when `replace_self`, or moved to the end when
    ///   not (a changed identity re-evaluates its priority);
    /// - with a parent in the store, any prior occurrence is removed and
    ///   the entry is (re)inserted immediately before or after the parent
    ///   per `put_before_parent`.
    ///
    /// Setting the status to `Pending` on an entry that already had a
    /// status invalidates its descendants, exactly as
    /// [`set_entry_status`](Self::set_entry_status) does.
    pub fn update_entry(
        &mut self,
        mut entry: Entry,
        parent_id: Option<&str>,
        status: EntryStatus,
        replace_self: bool,
        put_before_parent: bool,
    ) -> bool {
        if entry.value.is_none() {
            self.remove_subtree(&entry.id, true);
            return false;
        }

        let id = entry.id.clone();

        if let Some(pid) = parent_id {
            if pid != id {
                self.parents.insert(id.clone(), pid.to_string());
                entry.parent_id = Some(pid.to_string());
            }
        }

        let exists = self.nodes.contains_key(&id);
        let anchor = parent_id
            .filter(|pid| *pid != id && self.nodes.contains_key(*pid))
            .map(str::to_string);

        match anchor {
            None => {
                if !exists {
                    self.insert_node(entry);
                    self.link_last(&id);
                } else if replace_self {
                    self.replace_value(&id, entry);
                } else {
                    self.replace_value(&id, entry);
                    self.unlink(&id);
                    self.link_last(&id);
                }
            }
            Some(pid) => {
                if exists {
                    self.unlink(&id);
                    self.replace_value(&id, entry);
                } else {
                    self.insert_node(entry);
                }
                if put_before_parent {
                    self.link_before(&pid, &id);
                } else {
                    self.link_after(&pid, &id);
                }
            }
        }

        self.set_entry_status(&id, status);
        self.has_updates = true;

        true
    }

    /// Removes all descendants of the entry with the given id and,
    /// optionally, the entry itself.
    pub fn remove_subtree(&mut self, entry_id: &str, remove_itself: bool) {
        if remove_itself && self.nodes.contains_key(entry_id) {
            if let Some(status) = self.statuses.remove(entry_id) {
                self.counts[status.index()] -= 1;
            }
            self.parents.remove(entry_id);
            self.unlink(entry_id);
            self.nodes.remove(entry_id);
            self.has_updates = true;
        }

        let children: Vec<String> = self
            .parents
            .iter()
            .filter(|(_, parent)| parent.as_str() == entry_id)
            .map(|(child, _)| child.clone())
            .collect();

        for child in children {
            self.remove_subtree(&child, true);
        }
    }

    /// Snapshot of entries in store order, optionally filtered by status.
    pub fn get_entries(&self, status: Option<EntryStatus>) -> Vec<Entry> {
        self.ids_in_order()
            .into_iter()
            .filter(|id| match status {
                Some(wanted) => self.statuses.get(id) == Some(&wanted),
                None => true,
            })
            .map(|id| self.nodes[&id].entry.clone())
            .collect()
    }

    /// Number of entries with the given status, or all entries.
    pub fn count_entries(&self, status: Option<EntryStatus>) -> usize {
        match status {
            Some(status) => self.counts[status.index()],
            None => self.nodes.len(),
        }
    }

    /// Sets the status of an entry. A no-op if unchanged. Transitioning
    /// into `Pending` on an entry that already had a status removes its
    /// descendants: loading and mapping are about to regenerate them.
    pub fn set_entry_status(&mut self, entry_id: &str, new_status: EntryStatus) {
        let previous = self.statuses.get(entry_id).copied();
        if previous == Some(new_status) {
            return;
        }

        if let Some(previous) = previous {
            self.counts[previous.index()] -= 1;
        }
        self.counts[new_status.index()] += 1;
        self.statuses.insert(entry_id.to_string(), new_status);

        if new_status == EntryStatus::Pending && previous.is_some() {
            self.remove_subtree(entry_id, false);
        }

        self.has_updates = true;
    }

    pub fn get_entry_status(&self, entry_id: &str) -> Option<EntryStatus> {
        self.statuses.get(entry_id).copied()
    }

    pub fn get_entry(&self, entry_id: &str) -> Option<&Entry> {
        self.nodes.get(entry_id).map(|node| &node.entry)
    }

    pub fn has_updates(&self) -> bool {
        self.has_updates
    }

    pub fn clear_updates(&mut self) {
        self.has_updates = false;
    }

    fn ids_in_order(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head.clone();
        while let Some(id) = cursor {
            cursor = self.nodes[&id].next.clone();
            ids.push(id);
        }
        ids
    }

    fn insert_node(&mut self, entry: Entry) {
        let id = entry.id.clone();
        self.nodes.insert(
            id,
            Node {
                entry,
                prev: None,
                next: None,
            },
        );
    }

    fn replace_value(&mut self, id: &str, entry: Entry) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.entry = entry;
        }
    }

    fn unlink(&mut self, id: &str) {
        let (prev, next) = match self.nodes.get_mut(id) {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };

        match &prev {
            Some(prev_id) => self.nodes.get_mut(prev_id).unwrap().next = next.clone(),
            None if self.head.as_deref() == Some(id) => self.head = next.clone(),
            None => {}
        }
        match &next {
            Some(next_id) => self.nodes.get_mut(next_id).unwrap().prev = prev.clone(),
            None if self.tail.as_deref() == Some(id) => self.tail = prev,
            None => {}
        }
    }

    fn link_last(&mut self, id: &str) {
        match self.tail.take() {
            Some(old_tail) => {
                self.nodes.get_mut(&old_tail).unwrap().next = Some(id.to_string());
                self.nodes.get_mut(id).unwrap().prev = Some(old_tail);
            }
            None => self.head = Some(id.to_string()),
        }
        self.tail = Some(id.to_string());
    }

    fn link_before(&mut self, anchor: &str, id: &str) {
        let anchor_prev = self.nodes[anchor].prev.clone();
        match &anchor_prev {
            Some(prev_id) => self.nodes.get_mut(prev_id).unwrap().next = Some(id.to_string()),
            None => self.head = Some(id.to_string()),
        }
        {
            let node = self.nodes.get_mut(id).unwrap();
            node.prev = anchor_prev;
            node.next = Some(anchor.to_string());
        }
        self.nodes.get_mut(anchor).unwrap().prev = Some(id.to_string());
    }

    fn link_after(&mut self, anchor: &str, id: &str) {
        let anchor_next = self.nodes[anchor].next.clone();
        match &anchor_next {
            Some(next_id) => self.nodes.get_mut(next_id).unwrap().prev = Some(id.to_string()),
            None => self.tail = Some(id.to_string()),
        }
        {
            let node = self.nodes.get_mut(id).unwrap();
            node.next = anchor_next;
            node.prev = Some(anchor.to_string());
        }
        self.nodes.get_mut(anchor).unwrap().next = Some(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryValue;
    use serde_json::json;

    fn entry(id: &str) -> Entry {
        Entry::new(id, EntryValue::Object(json!({ "id": id })))
    }

    fn order(store: &EntryStore) -> Vec<String> {
        store
            .get_entries(None)
            .into_iter()
            .map(|e| e.id)
            .collect()
    }

    #[test]
    fn test_append_without_parent() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Pending, false, false);
        store.update_entry(entry("b"), None, EntryStatus::Pending, false, false);
        store.update_entry(entry("c"), None, EntryStatus::Pending, false, false);
        assert_eq!(order(&store), vec!["a", "b", "c"]);
        assert_eq!(store.count_entries(Some(EntryStatus::Pending)), 3);
    }

    #[test]
    fn test_replace_in_place_keeps_position() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Pending, false, false);
        store.update_entry(entry("b"), None, EntryStatus::Pending, false, false);

        let replaced = Entry::new("a", EntryValue::Object(json!({"new": true})));
        store.update_entry(replaced, None, EntryStatus::Loaded, true, false);

        assert_eq!(order(&store), vec!["a", "b"]);
        assert_eq!(
            store.get_entry("a").unwrap().value.as_ref().unwrap().as_object(),
            Some(&json!({"new": true}))
        );
        assert_eq!(store.get_entry_status("a"), Some(EntryStatus::Loaded));
    }

    #[test]
    fn test_reinsert_without_replace_moves_to_end() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Pending, false, false);
        store.update_entry(entry("b"), None, EntryStatus::Pending, false, false);

        store.update_entry(entry("a"), None, EntryStatus::Pending, false, false);
        assert_eq!(order(&store), vec!["b", "a"]);
    }

    #[test]
    fn test_no_duplicate_ids() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Pending, false, false);
        store.update_entry(entry("a"), None, EntryStatus::Pending, true, false);
        assert_eq!(store.count_entries(None), 1);
    }

    #[test]
    fn test_child_placed_after_parent() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Loaded, false, false);
        store.update_entry(entry("b"), None, EntryStatus::Loaded, false, false);
        store.update_entry(entry("a.child"), Some("a"), EntryStatus::Pending, false, false);
        assert_eq!(order(&store), vec!["a", "a.child", "b"]);
    }

    #[test]
    fn test_child_placed_before_parent() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Loaded, false, false);
        store.update_entry(entry("b"), None, EntryStatus::Loaded, false, false);
        store.update_entry(entry("b.base"), Some("b"), EntryStatus::Pending, false, true);
        assert_eq!(order(&store), vec!["a", "b.base", "b"]);
    }

    #[test]
    fn test_children_stay_adjacent_after_reinsert() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Loaded, false, false);
        store.update_entry(entry("b"), None, EntryStatus::Loaded, false, false);
        store.update_entry(entry("a.child"), Some("a"), EntryStatus::Pending, false, false);
        // Re-delivering the child keeps it next to its parent.
        store.update_entry(entry("a.child"), Some("a"), EntryStatus::Pending, false, false);
        assert_eq!(order(&store), vec!["a", "a.child", "b"]);
    }

    #[test]
    fn test_unknown_parent_degrades_to_append() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Loaded, false, false);
        store.update_entry(entry("x"), Some("missing"), EntryStatus::Pending, false, true);
        assert_eq!(order(&store), vec!["a", "x"]);
    }

    #[test]
    fn test_valueless_entry_removes_subtree() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Loaded, false, false);
        store.update_entry(entry("a.child"), Some("a"), EntryStatus::Loaded, false, false);

        let inserted = store.update_entry(
            Entry::tombstone("a"),
            None,
            EntryStatus::Pending,
            false,
            false,
        );
        assert!(!inserted);
        assert_eq!(store.count_entries(None), 0);
    }

    #[test]
    fn test_subtree_invalidation_on_pending_reset() {
        // A (root) -> B -> C; resetting A removes B and C, leaves D alone.
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Mapped, false, false);
        store.update_entry(entry("b"), Some("a"), EntryStatus::Mapped, false, false);
        store.update_entry(entry("c"), Some("b"), EntryStatus::Mapped, false, false);
        store.update_entry(entry("d"), None, EntryStatus::Mapped, false, false);

        store.set_entry_status("a", EntryStatus::Pending);

        assert_eq!(order(&store), vec!["a", "d"]);
        assert_eq!(store.count_entries(Some(EntryStatus::Pending)), 1);
        assert_eq!(store.count_entries(Some(EntryStatus::Mapped)), 1);
    }

    #[test]
    fn test_set_status_same_value_is_noop() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Pending, false, false);
        store.clear_updates();
        store.set_entry_status("a", EntryStatus::Pending);
        assert!(!store.has_updates());
    }

    #[test]
    fn test_status_counts_track_transitions() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Pending, false, false);
        store.set_entry_status("a", EntryStatus::Loading);
        store.set_entry_status("a", EntryStatus::Loaded);

        assert_eq!(store.count_entries(Some(EntryStatus::Pending)), 0);
        assert_eq!(store.count_entries(Some(EntryStatus::Loading)), 0);
        assert_eq!(store.count_entries(Some(EntryStatus::Loaded)), 1);
    }

    #[test]
    fn test_dirty_flag_pair() {
        let mut store = EntryStore::new();
        assert!(!store.has_updates());
        store.update_entry(entry("a"), None, EntryStatus::Pending, false, false);
        assert!(store.has_updates());
        store.clear_updates();
        assert!(!store.has_updates());
        store.remove_subtree("a", true);
        assert!(store.has_updates());
    }

    #[test]
    fn test_get_entries_filters_by_status() {
        let mut store = EntryStore::new();
        store.update_entry(entry("a"), None, EntryStatus::Pending, false, false);
        store.update_entry(entry("b"), None, EntryStatus::Loaded, false, false);

        let pending = store.get_entries(Some(EntryStatus::Pending));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "a");
        assert_eq!(store.get_entries(None).len(), 2);
    }
}
