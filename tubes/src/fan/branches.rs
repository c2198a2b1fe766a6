//! A small arena of fan branches with stable handles.

use smallvec::SmallVec;
use std::rc::Weak;

/// Stable handle of one branch of a fan.
///
/// Handles are never reused, so a handle taken from a snapshot can be checked
/// against the live collection later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct BranchId(u64);

/// Snapshot of branch handles, taken before a broadcast.
pub(crate) type Snapshot = SmallVec<[BranchId; 8]>;

/// Branches in attachment order.
pub(crate) struct Branches<P> {
    next_id: u64,
    entries: Vec<(BranchId, P)>,
}

impl<P> Branches<P> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Reserves the handle the next inserted branch will use.
    pub(crate) fn next_id(&mut self) -> BranchId {
        let id = BranchId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, id: BranchId, branch: P) {
        // Handles are handed out in increasing order, so pushing keeps the
        // entries sorted.
        debug_assert!(self.entries.last().is_none_or(|(last, _)| *last < id));
        self.entries.push((id, branch));
    }

    pub(crate) fn remove(&mut self, id: BranchId) -> Option<P> {
        let index = self.position(id)?;
        Some(self.entries.remove(index).1)
    }

    pub(crate) fn get(&self, id: BranchId) -> Option<&P> {
        let index = self.position(id)?;
        Some(&self.entries[index].1)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn ids(&self) -> Snapshot {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    fn position(&self, id: BranchId) -> Option<usize> {
        self.entries.binary_search_by_key(&id, |(id, _)| *id).ok()
    }
}

impl<P: Clone> Branches<P> {
    /// Clones every branch, in attachment order.
    pub(crate) fn snapshot(&self) -> Vec<P> {
        self.entries.iter().map(|(_, branch)| branch.clone()).collect()
    }
}

impl<T: ?Sized> Branches<Weak<T>> {
    /// Forgets branches that have been dropped.
    pub(crate) fn prune(&mut self) {
        self.entries.retain(|(_, branch)| branch.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn handles_are_stable_across_removal() {
        let mut branches = Branches::new();
        let ids: Vec<BranchId> = (0..4)
            .map(|i| {
                let id = branches.next_id();
                branches.insert(id, i);
                id
            })
            .collect();
        assert_eq!(branches.remove(ids[1]), Some(1));
        assert_eq!(branches.remove(ids[1]), None);
        assert_eq!(branches.get(ids[2]), Some(&2));
        assert_eq!(branches.get(ids[1]), None);
        assert_eq!(branches.ids().as_slice(), &[ids[0], ids[2], ids[3]]);
        assert_eq!(branches.snapshot(), vec![0, 2, 3]);
    }

    #[test]
    fn handles_are_never_reused() {
        let mut branches = Branches::new();
        let first = branches.next_id();
        branches.insert(first, ());
        branches.remove(first);
        let second = branches.next_id();
        assert_ne!(first, second);
    }

    #[test]
    fn prune_drops_dead_branches() {
        let mut branches = Branches::new();
        let alive = Rc::new(1);
        let dead = Rc::new(2);
        let id = branches.next_id();
        branches.insert(id, Rc::downgrade(&alive));
        let id = branches.next_id();
        branches.insert(id, Rc::downgrade(&dead));
        drop(dead);
        branches.prune();
        assert_eq!(branches.len(), 1);
    }
}
