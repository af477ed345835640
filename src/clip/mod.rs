//! # Clipping
//!
//! [`ClipEngine::clip`] extracts the part of a [`Mesh`] selected by a
//! [`ClipPredicate`]. Two strategies are available:
//!
//! * **monolithic**: all blocks are merged into one working block which is clipped in a
//!   single pass. Fast, but the working copy of the mesh must fit in memory at once.
//! * **block-wise**: blocks are clipped one at a time. Blocks whose bounds cannot
//!   overlap the kept region are skipped without geometric work, and available memory is
//!   checked before every block. When it falls below the hard floor of the
//!   [`MemoryBudget`](crate::MemoryBudget) the remaining blocks are left unprocessed and a
//!   partial [`ClippedResult`] is returned.
//!
//! [`Strategy::Auto`] picks the monolithic path for single block meshes below
//! [`ClipConfig::large_dataset_threshold`] cells.
//!
//! Within a block every cell is handled according to the [`ClipMode`]: `Exact` cuts
//! straddling cells at the predicate surface, `Crinkle` keeps or drops them whole.

mod cut;
mod engine;
mod result;

pub use engine::ClipEngine;
pub use result::{BlockStatus, ClippedResult};

use crate::prelude::*;

use serde::{Deserialize, Serialize};

/// How cells that straddle the predicate surface are treated
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipMode {
    /// cut straddling cells into simplices at the predicate surface
    #[display(fmt = "exact")]
    Exact,
    /// keep every cell touching the region whole (or, inverted, every cell that does not)
    #[display(fmt = "crinkle")]
    Crinkle,
}

impl Default for ClipMode {
    fn default() -> Self {
        ClipMode::Exact
    }
}

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// decide from the shape of the mesh
    #[display(fmt = "auto")]
    Auto,
    #[display(fmt = "monolithic")]
    Monolithic,
    #[display(fmt = "block-wise")]
    BlockWise,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Auto
    }
}

/// Clip `mesh` with the default [`ClipConfig`], reading available memory from the host
/// and reporting diagnostics through `tracing`.
///
/// ```
/// use ensclip::{Block, Bounds, CellShape, ClipMode, ClipPredicate, Mesh};
///
/// let block = Block::new("fluid", vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.], [0., 0., 1.]])
///     .with_cells(CellShape::Tetra, vec![0, 1, 2, 3])?;
/// let mesh = Mesh::single(block);
///
/// let far_away = ClipPredicate::boxed(Bounds::new(5., 6., 5., 6., 5., 6.)?);
/// let clipped = ensclip::clip(&mesh, &far_away, ClipMode::Exact)?;
/// assert_eq!(clipped.cell_count(), 0);
/// # Ok::<(), ensclip::Error>(())
/// ```
pub fn clip<F: Numeric>(
    mesh: &Mesh<F>,
    predicate: &ClipPredicate,
    mode: ClipMode,
) -> Result<ClippedResult<F>, Error> {
    ClipEngine::new(ClipConfig::default()).clip(
        mesh,
        predicate,
        mode,
        &mut TracingDiagnostics,
        &mut NoProgress,
    )
}
