use std::collections::BTreeSet;

/// Ids picked for a bulk action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<u64>,
}

impl Selection {
    /// Adds `id` if absent, removes it otherwise. Returns whether it is
    /// selected afterwards.
    pub fn toggle(&mut self, id: u64) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn replace<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = u64>,
    {
        self.ids = ids.into_iter().collect();
    }

    pub fn remove(&mut self, id: u64) {
        self.ids.remove(&id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&u64) -> bool,
    {
        self.ids.retain(keep);
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &BTreeSet<u64> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
