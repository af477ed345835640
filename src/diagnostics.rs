//! Diagnostics raised while clipping, reducing and writing.
//!
//! Recoverable conditions (a dropped cell shape, a skipped field, a block that was not
//! processed) are not errors: work continues and a [`Diagnostic`] is handed to the
//! [`Diagnostics`] sink that the caller threads through every stage. The default sink,
//! [`TracingDiagnostics`], forwards everything to `tracing`; a `Vec<Diagnostic>` collects
//! them for later inspection.

use crate::mesh::{BoxOverlap, CellShape};

use tracing::{debug, info, warn};

/// Why a block contributed nothing to a clipped result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// the block bounds do not overlap the kept region
    Disjoint,
    /// the block was clipped but no cell survived
    Empty,
    /// the block was never processed because memory ran out
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// a block was skipped, see [`SkipReason`]
    BlockSkipped {
        block: usize,
        name: String,
        reason: SkipReason,
    },
    /// available memory fell below the soft floor and scratch buffers were released
    MemoryThrottled { available: u64, soft_floor: u64 },
    /// available memory stayed below the hard floor; `block` and everything after it
    /// was left unprocessed
    MemoryExhausted {
        block: usize,
        available: u64,
        hard_floor: u64,
    },
    /// how a clip box sits relative to the mesh bounds, and whether the box is inverted
    BoxOverlap { overlap: BoxOverlap, invert: bool },
    /// cells of a shape without a simplex decomposition were kept or dropped whole in
    /// exact mode
    WholeCellFallback { shape: CellShape, cells: usize },
    /// cells of a shape outside the output vocabulary were dropped from the geometry
    UnsupportedCellShape { shape: CellShape, cells: usize },
    /// cells of a shape without a decomposition table were left as they are during
    /// canonicalization
    NotCanonicalized { shape: CellShape, cells: usize },
    /// a field with a component count other than 1 or 3 was not written
    UnsupportedFieldShape { field: String, components: usize },
    /// coincident points were merged during reduction
    PointsMerged { before: usize, after: usize },
}

/// Sink for [`Diagnostic`]s
pub trait Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl Diagnostics for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Forwards every diagnostic to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::BlockSkipped {
                block,
                name,
                reason: SkipReason::Memory,
            } => warn!(block, name = %name, "Block left unprocessed, memory exhausted"),
            Diagnostic::BlockSkipped {
                block,
                name,
                reason,
            } => debug!(block, name = %name, reason = ?reason, "Block skipped"),
            Diagnostic::MemoryThrottled {
                available,
                soft_floor,
            } => info!(available, soft_floor, "Below soft memory floor, releasing buffers"),
            Diagnostic::MemoryExhausted {
                block,
                available,
                hard_floor,
            } => warn!(
                block,
                available, hard_floor, "Below hard memory floor, stopping before block"
            ),
            Diagnostic::BoxOverlap { overlap, invert } if overlap.disjoint => {
                warn!(invert, "{}", overlap.summary(invert))
            }
            Diagnostic::BoxOverlap { overlap, invert } => info!(
                fraction = format!("{:.3}", overlap.fraction),
                fully_inside = overlap.fully_inside,
                invert,
                "{}",
                overlap.summary(invert)
            ),
            Diagnostic::WholeCellFallback { shape, cells } => {
                warn!(shape = %shape, cells, "No decomposition for shape, cells clipped whole")
            }
            Diagnostic::UnsupportedCellShape { shape, cells } => {
                warn!(shape = %shape, cells, "Unsupported cell shape dropped from geometry")
            }
            Diagnostic::NotCanonicalized { shape, cells } => {
                warn!(shape = %shape, cells, "Cell shape left as is during canonicalization")
            }
            Diagnostic::UnsupportedFieldShape { field, components } => {
                warn!(field = %field, components, "Field is neither scalar nor vector, skipped")
            }
            Diagnostic::PointsMerged { before, after } => {
                debug!(before, after, "Merged coincident points")
            }
        }
    }
}
