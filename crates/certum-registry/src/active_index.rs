//! Dense index of active certificate ids.
//!
//! Backed by a vector plus an id -> position map. Removal swaps the last
//! element into the vacated slot, so insert and remove are O(1) and the
//! enumeration order changes whenever something is removed.

use certum_core::CertificateId;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ActiveIndex {
    ids: Vec<CertificateId>,
    positions: HashMap<CertificateId, usize>,
}

impl ActiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The id stored at `index`, for `0 <= index < count()`.
    pub fn id_at(&self, index: usize) -> Option<CertificateId> {
        self.ids.get(index).copied()
    }

    pub fn contains(&self, id: CertificateId) -> bool {
        self.positions.contains_key(&id)
    }

    /// A contiguous window of at most `limit` ids starting at `offset`.
    /// Empty when `offset` is past the end.
    pub fn page(&self, offset: usize, limit: usize) -> &[CertificateId] {
        if offset >= self.ids.len() {
            return &[];
        }
        let end = offset.saturating_add(limit).min(self.ids.len());
        &self.ids[offset..end]
    }

    pub fn iter(&self) -> impl Iterator<Item = CertificateId> + '_ {
        self.ids.iter().copied()
    }

    /// Returns false if the id was already present.
    pub(crate) fn insert(&mut self, id: CertificateId) -> bool {
        if self.positions.contains_key(&id) {
            return false;
        }
        self.positions.insert(id, self.ids.len());
        self.ids.push(id);
        true
    }

    /// Returns false if the id was not present.
    pub(crate) fn remove(&mut self, id: CertificateId) -> bool {
        let Some(pos) = self.positions.remove(&id) else {
            return false;
        };
        self.ids.swap_remove(pos);
        if let Some(&moved) = self.ids.get(pos) {
            self.positions.insert(moved, pos);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(index: &ActiveIndex) -> Vec<u64> {
        let mut v: Vec<u64> = index.iter().map(|id| id.value()).collect();
        v.sort_unstable();
        v
    }

    fn assert_consistent(index: &ActiveIndex) {
        assert_eq!(index.ids.len(), index.positions.len());
        for (i, id) in index.ids.iter().enumerate() {
            assert_eq!(index.positions[id], i);
        }
    }

    #[test]
    fn test_insert_and_enumerate() {
        let mut index = ActiveIndex::new();
        for n in 1..=4 {
            assert!(index.insert(CertificateId(n)));
        }
        assert_eq!(index.count(), 4);
        assert_eq!(index.id_at(0), Some(CertificateId(1)));
        assert_eq!(index.id_at(4), None);
        assert_consistent(&index);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut index = ActiveIndex::new();
        assert!(index.insert(CertificateId(1)));
        assert!(!index.insert(CertificateId(1)));
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn test_swap_remove_moves_last_into_hole() {
        let mut index = ActiveIndex::new();
        for n in 1..=4 {
            index.insert(CertificateId(n));
        }
        assert!(index.remove(CertificateId(2)));
        assert_eq!(index.count(), 3);
        assert_eq!(index.id_at(1), Some(CertificateId(4)));
        assert!(!index.contains(CertificateId(2)));
        assert_eq!(ids(&index), vec![1, 3, 4]);
        assert_consistent(&index);
    }

    #[test]
    fn test_remove_last_and_missing() {
        let mut index = ActiveIndex::new();
        index.insert(CertificateId(1));
        index.insert(CertificateId(2));
        assert!(index.remove(CertificateId(2)));
        assert!(!index.remove(CertificateId(2)));
        assert!(!index.remove(CertificateId(99)));
        assert_eq!(ids(&index), vec![1]);
        assert_consistent(&index);
    }

    #[test]
    fn test_remove_until_empty() {
        let mut index = ActiveIndex::new();
        for n in 1..=5 {
            index.insert(CertificateId(n));
        }
        for n in [3, 1, 5, 2, 4] {
            assert!(index.remove(CertificateId(n)));
            assert_consistent(&index);
        }
        assert!(index.is_empty());
    }

    #[test]
    fn test_page_windows() {
        let mut index = ActiveIndex::new();
        for n in 1..=5 {
            index.insert(CertificateId(n));
        }
        assert_eq!(index.page(0, 2).len(), 2);
        assert_eq!(index.page(4, 10), &[CertificateId(5)]);
        assert!(index.page(5, 10).is_empty());
        assert!(index.page(0, 0).is_empty());
        assert_eq!(index.page(1, usize::MAX).len(), 4);
    }
}
