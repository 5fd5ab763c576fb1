// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified page index — the virtual ordered list of pages spanning all loaded
// source documents, plus the user's edits (order, deletions, rotation
// deltas).
//
// Invariants, maintained across every mutation:
//   - the order is always a permutation of exactly the live unified pages;
//   - the deletion set is a subset of the order;
//   - at least one ordered page is outside the deletion set.
//
// All mutations are synchronous and atomic from the caller's perspective.

use std::collections::{BTreeMap, HashMap, HashSet};

use helvety_core::error::{HelvetyError, Result};
use helvety_core::types::{DocumentId, Rotation, UnifiedPage, UnifiedPageNumber};
use tracing::{debug, info};

/// The unified page index.
#[derive(Debug)]
pub struct UnifiedPageIndex {
    /// Live unified pages, keyed by their number.
    pages: BTreeMap<UnifiedPageNumber, UnifiedPage>,
    /// Display and export order; single source of truth.
    order: Vec<UnifiedPageNumber>,
    /// Pages currently excluded from export.
    deleted: HashSet<UnifiedPageNumber>,
    /// User-applied rotation deltas. Absence means no delta.
    rotations: HashMap<UnifiedPageNumber, Rotation>,
    /// Next unified number to assign; monotonic across the whole session.
    next_number: u32,
}

impl Default for UnifiedPageIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl UnifiedPageIndex {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            order: Vec::new(),
            deleted: HashSet::new(),
            rotations: HashMap::new(),
            next_number: 1,
        }
    }

    // -- Document lifecycle ---------------------------------------------------

    /// Append one unified page per original page of each new document, in the
    /// order given, continuing the existing numbering. The new numbers are
    /// appended to the end of the order. Returns the assigned numbers.
    pub fn add_documents(
        &mut self,
        docs: &[(DocumentId, usize)],
    ) -> Vec<UnifiedPageNumber> {
        let mut assigned = Vec::new();
        for &(document, page_count) in docs {
            for original_index in 0..page_count {
                let number = UnifiedPageNumber(self.next_number);
                self.next_number += 1;
                self.pages.insert(
                    number,
                    UnifiedPage {
                        number,
                        document,
                        original_index,
                    },
                );
                self.order.push(number);
                assigned.push(number);
            }
        }
        info!(added = assigned.len(), total = self.order.len(), "pages added to index");
        assigned
    }

    /// Remove every unified page owned by `document` from the order, page
    /// set, deletion set, and rotation map. Returns the removed numbers.
    pub fn remove_document(&mut self, document: DocumentId) -> Vec<UnifiedPageNumber> {
        let removed: Vec<UnifiedPageNumber> = self
            .pages
            .values()
            .filter(|page| page.document == document)
            .map(|page| page.number)
            .collect();

        for number in &removed {
            self.pages.remove(number);
            self.deleted.remove(number);
            self.rotations.remove(number);
        }
        self.order.retain(|number| !removed.contains(number));

        // Removal may take the only visible pages with it. Reconcile by
        // restoring the remaining pages rather than stranding the session
        // with nothing exportable.
        if !self.order.is_empty() && self.visible_count() == 0 {
            debug!("all remaining pages were deleted, restoring them");
            self.deleted.clear();
        }

        debug!(removed = removed.len(), "document pages removed from index");
        removed
    }

    // -- Order ----------------------------------------------------------------

    /// Replace the page order wholesale.
    ///
    /// The supplied sequence must be an exact permutation of the current
    /// order's element set; anything else (drops, duplicates, foreign
    /// numbers) is rejected and the state left unchanged.
    pub fn reorder(&mut self, new_order: Vec<UnifiedPageNumber>) -> Result<()> {
        if new_order.len() != self.order.len() {
            return Err(HelvetyError::InvalidReorder(format!(
                "expected {} pages, got {}",
                self.order.len(),
                new_order.len()
            )));
        }
        let current: HashSet<_> = self.order.iter().copied().collect();
        let supplied: HashSet<_> = new_order.iter().copied().collect();
        if supplied.len() != new_order.len() {
            return Err(HelvetyError::InvalidReorder(
                "sequence contains duplicates".into(),
            ));
        }
        if supplied != current {
            return Err(HelvetyError::InvalidReorder(
                "sequence references pages outside the current set".into(),
            ));
        }
        self.order = new_order;
        Ok(())
    }

    // -- Deletion -------------------------------------------------------------

    /// Flip a page's deletion state. Removing the last visible page is
    /// rejected and leaves the state unchanged.
    pub fn toggle_deletion(&mut self, page: UnifiedPageNumber) -> Result<()> {
        if !self.pages.contains_key(&page) {
            return Err(HelvetyError::UnknownPage(page.0));
        }
        if self.deleted.contains(&page) {
            self.deleted.remove(&page);
        } else {
            if self.visible_count() <= 1 {
                return Err(HelvetyError::LastVisiblePage);
            }
            self.deleted.insert(page);
        }
        Ok(())
    }

    pub fn is_deleted(&self, page: UnifiedPageNumber) -> bool {
        self.deleted.contains(&page)
    }

    fn visible_count(&self) -> usize {
        self.order
            .iter()
            .filter(|number| !self.deleted.contains(number))
            .count()
    }

    // -- Rotation -------------------------------------------------------------

    /// Apply a rotation delta to a page, composing with any existing delta
    /// and normalizing to a quarter turn. A net delta of zero is stored as
    /// absence.
    pub fn rotate(&mut self, page: UnifiedPageNumber, delta_degrees: i32) -> Result<()> {
        if !self.pages.contains_key(&page) {
            return Err(HelvetyError::UnknownPage(page.0));
        }
        let current = self.user_rotation(page);
        let next = current.compose(Rotation::from_degrees(delta_degrees));
        if next == Rotation::R0 {
            self.rotations.remove(&page);
        } else {
            self.rotations.insert(page, next);
        }
        Ok(())
    }

    /// Remove any user rotation delta. Idempotent.
    pub fn reset_rotation(&mut self, page: UnifiedPageNumber) {
        self.rotations.remove(&page);
    }

    /// The user's rotation delta for a page; `R0` when none applied.
    pub fn user_rotation(&self, page: UnifiedPageNumber) -> Rotation {
        self.rotations.get(&page).copied().unwrap_or(Rotation::R0)
    }

    /// Whether the page should display a "rotated" badge. Keys off the user
    /// delta only, never the combined effective rotation.
    pub fn is_user_rotated(&self, page: UnifiedPageNumber) -> bool {
        crate::rotation::shows_rotation_badge(self.user_rotation(page))
    }

    // -- Queries --------------------------------------------------------------

    /// 1-based position of `page` among the non-deleted entries of the order;
    /// `None` if the page is deleted or unknown.
    pub fn final_page_number(&self, page: UnifiedPageNumber) -> Option<usize> {
        if self.deleted.contains(&page) {
            return None;
        }
        self.order
            .iter()
            .filter(|number| !self.deleted.contains(number))
            .position(|&number| number == page)
            .map(|position| position + 1)
    }

    /// The non-deleted pages in order: the sequence an export processes.
    pub fn visible_pages(&self) -> Vec<UnifiedPage> {
        self.order
            .iter()
            .filter(|number| !self.deleted.contains(number))
            .filter_map(|number| self.pages.get(number).copied())
            .collect()
    }

    /// Look up a live unified page.
    pub fn page(&self, number: UnifiedPageNumber) -> Option<UnifiedPage> {
        self.pages.get(&number).copied()
    }

    /// The full order, deleted pages included.
    pub fn order(&self) -> &[UnifiedPageNumber] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_documents(index: &mut UnifiedPageIndex) -> (DocumentId, DocumentId) {
        let a = DocumentId::new();
        let b = DocumentId::new();
        index.add_documents(&[(a, 3), (b, 3)]);
        (a, b)
    }

    #[test]
    fn numbering_is_monotonic_across_documents() {
        let mut index = UnifiedPageIndex::new();
        two_documents(&mut index);
        let numbers: Vec<u32> = index.order().iter().map(|n| n.0).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn numbers_are_never_reused_after_removal() {
        let mut index = UnifiedPageIndex::new();
        let (a, _b) = two_documents(&mut index);
        index.remove_document(a);
        let c = DocumentId::new();
        let assigned = index.add_documents(&[(c, 2)]);
        assert_eq!(assigned, vec![UnifiedPageNumber(7), UnifiedPageNumber(8)]);
    }

    #[test]
    fn removal_purges_order_deletions_and_rotations() {
        let mut index = UnifiedPageIndex::new();
        let (a, _b) = two_documents(&mut index);
        index.toggle_deletion(UnifiedPageNumber(1)).unwrap();
        index.rotate(UnifiedPageNumber(2), 90).unwrap();

        let removed = index.remove_document(a);
        assert_eq!(removed.len(), 3);
        assert_eq!(index.len(), 3);
        assert!(!index.is_deleted(UnifiedPageNumber(1)));
        assert_eq!(index.user_rotation(UnifiedPageNumber(2)), Rotation::R0);
    }

    #[test]
    fn reorder_rejects_drops_and_duplicates() {
        let mut index = UnifiedPageIndex::new();
        two_documents(&mut index);

        let too_short = vec![UnifiedPageNumber(1), UnifiedPageNumber(2)];
        assert!(index.reorder(too_short).is_err());

        let duplicated: Vec<_> = [1, 2, 3, 4, 5, 5].map(UnifiedPageNumber).into();
        assert!(index.reorder(duplicated).is_err());

        let foreign: Vec<_> = [1, 2, 3, 4, 5, 99].map(UnifiedPageNumber).into();
        assert!(index.reorder(foreign).is_err());

        // State unchanged after rejections.
        let numbers: Vec<u32> = index.order().iter().map(|n| n.0).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn reorder_accepts_a_true_permutation() {
        let mut index = UnifiedPageIndex::new();
        two_documents(&mut index);
        let reversed: Vec<_> = [6, 5, 4, 3, 2, 1].map(UnifiedPageNumber).into();
        index.reorder(reversed).unwrap();
        assert_eq!(index.order()[0], UnifiedPageNumber(6));
    }

    #[test]
    fn last_visible_page_cannot_be_deleted() {
        let mut index = UnifiedPageIndex::new();
        let a = DocumentId::new();
        index.add_documents(&[(a, 2)]);

        index.toggle_deletion(UnifiedPageNumber(1)).unwrap();
        let err = index.toggle_deletion(UnifiedPageNumber(2)).unwrap_err();
        assert!(matches!(err, HelvetyError::LastVisiblePage));
        // State unchanged: page 2 still visible.
        assert!(!index.is_deleted(UnifiedPageNumber(2)));
    }

    #[test]
    fn undeleting_is_always_allowed() {
        let mut index = UnifiedPageIndex::new();
        let a = DocumentId::new();
        index.add_documents(&[(a, 2)]);
        index.toggle_deletion(UnifiedPageNumber(1)).unwrap();
        index.toggle_deletion(UnifiedPageNumber(1)).unwrap();
        assert!(!index.is_deleted(UnifiedPageNumber(1)));
    }

    #[test]
    fn rotation_composes_and_zero_is_absence() {
        let mut index = UnifiedPageIndex::new();
        let a = DocumentId::new();
        index.add_documents(&[(a, 1)]);
        let p = UnifiedPageNumber(1);

        index.rotate(p, 90).unwrap();
        index.rotate(p, 90).unwrap();
        assert_eq!(index.user_rotation(p), Rotation::R180);

        index.rotate(p, 180).unwrap();
        assert_eq!(index.user_rotation(p), Rotation::R0);
        assert!(!index.is_user_rotated(p));
    }

    #[test]
    fn reset_rotation_is_idempotent() {
        let mut index = UnifiedPageIndex::new();
        let a = DocumentId::new();
        index.add_documents(&[(a, 1)]);
        let p = UnifiedPageNumber(1);

        index.rotate(p, 270).unwrap();
        index.reset_rotation(p);
        index.reset_rotation(p);
        assert_eq!(index.user_rotation(p), Rotation::R0);
    }

    #[test]
    fn final_page_number_skips_deleted() {
        let mut index = UnifiedPageIndex::new();
        two_documents(&mut index);
        index.toggle_deletion(UnifiedPageNumber(2)).unwrap();

        assert_eq!(index.final_page_number(UnifiedPageNumber(1)), Some(1));
        assert_eq!(index.final_page_number(UnifiedPageNumber(2)), None);
        assert_eq!(index.final_page_number(UnifiedPageNumber(3)), Some(2));
        assert_eq!(index.final_page_number(UnifiedPageNumber(6)), Some(5));
    }

    #[test]
    fn removal_restores_pages_when_nothing_visible_remains() {
        let mut index = UnifiedPageIndex::new();
        let (a, _b) = two_documents(&mut index);
        // Delete every page of document B (pages 4–6 stay deletable while
        // document A provides visible pages).
        index.toggle_deletion(UnifiedPageNumber(4)).unwrap();
        index.toggle_deletion(UnifiedPageNumber(5)).unwrap();
        index.toggle_deletion(UnifiedPageNumber(6)).unwrap();

        index.remove_document(a);
        // Only B's deleted pages remain; they come back visible.
        assert_eq!(index.visible_pages().len(), 3);
    }

    #[test]
    fn order_stays_a_permutation_of_live_pages() {
        let mut index = UnifiedPageIndex::new();
        let (a, _b) = two_documents(&mut index);
        index.toggle_deletion(UnifiedPageNumber(4)).unwrap();
        index.remove_document(a);

        let live: HashSet<_> = index.visible_pages().iter().map(|p| p.number).collect();
        let ordered: HashSet<_> = index.order().iter().copied().collect();
        assert!(live.is_subset(&ordered));
        assert_eq!(index.order().len(), 3);
    }
}
