//! Category store - raw membership with no policy
//!
//! Each identifier maps to at most one category, so exclusivity holds by
//! construction. The store neither logs nor resolves conflicts; that is the
//! registry's job.

use std::collections::HashMap;

use armory_core::{Category, Identifier};
use armory_wire::FullState;

/// Identifier -> category map
#[derive(Debug, Default, Clone)]
pub struct RegistryStore {
    entries: HashMap<Identifier, Category>,
}

impl RegistryStore {
    pub fn new() -> Self {
        RegistryStore::default()
    }

    /// Is `id` in `category`?
    pub fn contains(&self, category: Category, id: &Identifier) -> bool {
        self.entries.get(id) == Some(&category)
    }

    /// Put `id` into `category`
    ///
    /// Returns false if it was already there. An entry in another category
    /// is replaced, since an identifier holds a single category.
    pub fn add(&mut self, category: Category, id: Identifier) -> bool {
        if self.contains(category, &id) {
            return false;
        }
        self.entries.insert(id, category);
        true
    }

    /// Take `id` out of `category`; false if it was not there
    pub fn remove(&mut self, category: Category, id: &Identifier) -> bool {
        if !self.contains(category, id) {
            return false;
        }
        self.entries.remove(id);
        true
    }

    /// Take `id` out of whichever category holds it
    pub fn remove_any(&mut self, id: &Identifier) -> Option<Category> {
        self.entries.remove(id)
    }

    /// Category currently holding `id`, skipping `excluding`
    pub fn find_category(&self, id: &Identifier, excluding: Option<Category>) -> Option<Category> {
        self.entries
            .get(id)
            .copied()
            .filter(|category| Some(*category) != excluding)
    }

    /// Number of identifiers across all categories
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of identifiers in one category
    pub fn count(&self, category: Category) -> usize {
        self.entries.values().filter(|c| **c == category).count()
    }

    /// Iterate all (identifier, category) entries
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, Category)> {
        self.entries.iter().map(|(id, c)| (id, *c))
    }

    /// Copy out the four lists
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (id, category) in self.iter() {
            snapshot.push(category, id.clone());
        }
        snapshot.sort();
        snapshot
    }

    /// Swap in the contents of a snapshot
    ///
    /// An identifier listed under several categories ends in the last one in
    /// category order.
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.entries.clear();
        for (category, ids) in snapshot.into_lists() {
            for id in ids {
                self.entries.insert(id, category);
            }
        }
    }
}

/// Four identifier lists, one per category
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    lists: [Vec<Identifier>; 4],
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot::default()
    }

    pub fn list(&self, category: Category) -> &[Identifier] {
        &self.lists[category.index()]
    }

    pub fn push(&mut self, category: Category, id: Identifier) {
        self.lists[category.index()].push(id);
    }

    /// Total entries across all lists
    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    /// Sort each list for stable output
    pub fn sort(&mut self) {
        for list in self.lists.iter_mut() {
            list.sort();
        }
    }

    /// Iterate (category, list) in wire order
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Identifier])> {
        Category::ALL
            .into_iter()
            .map(move |category| (category, self.list(category)))
    }

    pub fn into_lists(self) -> impl Iterator<Item = (Category, Vec<Identifier>)> {
        Category::ALL.into_iter().zip(self.lists)
    }

    /// Wire form of this snapshot
    pub fn to_full_state(&self) -> FullState {
        FullState::from_identifiers(self.iter())
    }
}
