use super::Strategy;
use crate::prelude::*;

use std::ops::Range;

/// What happened to a single input block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// clipped, `cells` cells survived
    Clipped { cells: usize },
    /// bounds do not overlap the kept region, no geometric work was done
    SkippedDisjoint,
    /// clipped but nothing survived
    SkippedEmpty,
    /// never processed because available memory fell below the hard floor
    SkippedMemory,
}

#[derive(Debug, Clone, PartialEq, Deref)]
/// The output of [`ClipEngine::clip`](super::ClipEngine::clip): the surviving part of the
/// mesh together with the fate of every input block.
///
/// Dereferences to the clipped [`Mesh`]. Blocks that contributed nothing are absent from
/// the mesh; `statuses` has one entry per input block, in input order.
pub struct ClippedResult<F = f64> {
    #[deref]
    mesh: Mesh<F>,
    statuses: Vec<BlockStatus>,
    strategy: Strategy,
}

impl<F: Numeric> ClippedResult<F> {
    pub(crate) fn new(blocks: Vec<Block<F>>, statuses: Vec<BlockStatus>, strategy: Strategy) -> Self {
        Self {
            mesh: Mesh::new(blocks),
            statuses,
            strategy,
        }
    }

    pub fn mesh(&self) -> &Mesh<F> {
        &self.mesh
    }

    pub fn into_mesh(self) -> Mesh<F> {
        self.mesh
    }

    /// the surviving blocks, ready for [`reduce`](crate::reduce)
    pub fn into_blocks(self) -> Vec<Block<F>> {
        self.mesh.into_blocks()
    }

    pub fn statuses(&self) -> &[BlockStatus] {
        &self.statuses
    }

    /// the strategy that was actually run, never [`Strategy::Auto`]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// some blocks were never processed because memory ran out
    pub fn is_partial(&self) -> bool {
        self.statuses
            .iter()
            .any(|s| *s == BlockStatus::SkippedMemory)
    }

    /// Indices of the blocks left unprocessed. Processing stops at the first such block,
    /// so they always form a contiguous range that extends to the last block.
    pub fn skipped_memory(&self) -> Option<Range<usize>> {
        let first = self
            .statuses
            .iter()
            .position(|s| *s == BlockStatus::SkippedMemory)?;
        Some(first..self.statuses.len())
    }

    pub fn clipped_blocks(&self) -> usize {
        self.count(|s| matches!(s, BlockStatus::Clipped { .. }))
    }

    pub fn skipped_disjoint(&self) -> usize {
        self.count(|s| *s == BlockStatus::SkippedDisjoint)
    }

    pub fn skipped_empty(&self) -> usize {
        self.count(|s| *s == BlockStatus::SkippedEmpty)
    }

    fn count<P: Fn(&BlockStatus) -> bool>(&self, predicate: P) -> usize {
        self.statuses.iter().filter(|s| predicate(s)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_skips_form_the_tail() {
        let mut statuses = vec![BlockStatus::Clipped { cells: 1 }; 4];
        statuses.insert(1, BlockStatus::SkippedDisjoint);
        statuses.extend([BlockStatus::SkippedMemory; 3]);

        let result = ClippedResult::<f64>::new(Vec::new(), statuses, Strategy::BlockWise);
        assert!(result.is_partial());
        assert_eq!(result.skipped_memory(), Some(5..8));
        assert_eq!(result.clipped_blocks(), 4);
        assert_eq!(result.skipped_disjoint(), 1);
        assert_eq!(result.skipped_empty(), 0);
    }

    #[test]
    fn complete_results_are_not_partial() {
        let result = ClippedResult::<f64>::new(
            Vec::new(),
            vec![BlockStatus::SkippedEmpty],
            Strategy::Monolithic,
        );
        assert!(!result.is_partial());
        assert_eq!(result.skipped_memory(), None);
        assert_eq!(result.cell_count(), 0);
    }
}
