use super::cut::{ClipScratch, Clipper};
use super::{BlockStatus, ClipMode, ClippedResult, Strategy};
use crate::diagnostics::SkipReason;
use crate::memory::{MemoryBudgetMonitor, MemoryProbe, SystemMemory};
use crate::prelude::*;
use crate::reduce::concatenate;
use crate::traits::ProgressSpan;

use std::borrow::Cow;
use tracing::{debug, info, warn};

/// Runs clip operations with a fixed configuration and memory monitor.
///
/// The engine holds no state between calls other than its monitor; scratch buffers are
/// created and dropped inside every [`clip`](ClipEngine::clip) call.
///
/// ```
/// use ensclip::memory::FixedMemory;
/// use ensclip::prelude::*;
/// use ensclip::MemoryBudgetMonitor;
///
/// let monitor = MemoryBudgetMonitor::new(FixedMemory(u64::MAX));
/// let mut engine = ClipEngine::with_monitor(ClipConfig::default(), monitor);
///
/// let mesh: Mesh<f64> = Mesh::new(Vec::new());
/// let plane = ClipPredicate::plane([0., 0., 0.], [0., 0., 1.]);
/// let clipped = engine.clip(&mesh, &plane, ClipMode::Exact, &mut Vec::new(), &mut NoProgress)?;
/// assert!(clipped.is_empty());
/// # Ok::<(), ensclip::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ClipEngine<P = SystemMemory> {
    config: ClipConfig,
    monitor: MemoryBudgetMonitor<P>,
}

impl ClipEngine<SystemMemory> {
    pub fn new(config: ClipConfig) -> Self {
        Self::with_monitor(config, MemoryBudgetMonitor::default())
    }
}

impl Default for ClipEngine<SystemMemory> {
    fn default() -> Self {
        Self::new(ClipConfig::default())
    }
}

impl<P: MemoryProbe> ClipEngine<P> {
    pub fn with_monitor(config: ClipConfig, monitor: MemoryBudgetMonitor<P>) -> Self {
        Self { config, monitor }
    }

    pub fn config(&self) -> &ClipConfig {
        &self.config
    }

    pub fn monitor(&self) -> &MemoryBudgetMonitor<P> {
        &self.monitor
    }

    /// The strategy a clip of `mesh` runs with, [`Strategy::Auto`] resolved.
    pub fn strategy_for<F: Numeric>(&self, mesh: &Mesh<F>) -> Strategy {
        match self.config.strategy {
            Strategy::Auto => {
                if mesh.len() == 1 && mesh.cell_count() < self.config.large_dataset_threshold {
                    Strategy::Monolithic
                } else {
                    Strategy::BlockWise
                }
            }
            forced => forced,
        }
    }

    /// Clip `mesh` to the region kept by `predicate`.
    ///
    /// The configuration, the predicate and the mesh invariants are validated before any
    /// block is touched.
    /// Running out of memory is not an error: the result is partial and
    /// [`ClippedResult::skipped_memory`] names the unprocessed blocks.
    pub fn clip<F: Numeric>(
        &mut self,
        mesh: &Mesh<F>,
        predicate: &ClipPredicate,
        mode: ClipMode,
        diagnostics: &mut dyn Diagnostics,
        progress: &mut dyn Progress,
    ) -> Result<ClippedResult<F>, Error> {
        self.config.validate()?;
        predicate.validate()?;
        mesh.validate()?;

        let strategy = self.strategy_for(mesh);

        info!(
            blocks = mesh.len(),
            points = mesh.point_count(),
            cells = mesh.cell_count(),
            mode = %mode,
            strategy = %strategy,
            invert = predicate.invert,
            "Clipping mesh"
        );

        if let (ClipShape::Box { bounds }, Some(mesh_bounds)) = (&predicate.shape, mesh.bounds()) {
            diagnostics.report(Diagnostic::BoxOverlap {
                overlap: bounds.overlap_report(&mesh_bounds),
                invert: predicate.invert,
            });
        }

        let mut progress = ProgressSpan::new(progress);
        let clipper = Clipper::new(predicate, mode);

        let result = match strategy {
            Strategy::Monolithic => {
                self.clip_monolithic(mesh, predicate, clipper, diagnostics, &mut progress)?
            }
            _ => self.clip_block_wise(mesh, predicate, clipper, diagnostics, &mut progress),
        };

        progress.finish();

        info!(
            points = result.point_count(),
            cells = result.cell_count(),
            clipped = result.clipped_blocks(),
            disjoint = result.skipped_disjoint(),
            empty = result.skipped_empty(),
            partial = result.is_partial(),
            "Clip finished"
        );

        Ok(result)
    }

    /// Merge every block into one working block and clip it in a single pass. Every input
    /// block shares the status of that single unit of work.
    fn clip_monolithic<F: Numeric>(
        &mut self,
        mesh: &Mesh<F>,
        predicate: &ClipPredicate,
        mut clipper: Clipper,
        diagnostics: &mut dyn Diagnostics,
        progress: &mut ProgressSpan,
    ) -> Result<ClippedResult<F>, Error> {
        let overlaps = mesh
            .bounds()
            .map(|bounds| predicate.overlaps(&bounds))
            .unwrap_or(false);

        if !overlaps {
            debug!("Mesh bounds do not overlap the kept region");
            return Ok(skip_all(mesh, 0, SkipReason::Disjoint, Strategy::Monolithic, diagnostics));
        }

        let mut scratch = ClipScratch::default();
        if !self.memory_available(0, &mut scratch, diagnostics) {
            return Ok(skip_all(mesh, 0, SkipReason::Memory, Strategy::Monolithic, diagnostics));
        }

        let working: Cow<Block<F>> = match mesh.blocks() {
            [single] => Cow::Borrowed(single),
            blocks => Cow::Owned(concatenate(blocks, "merged")?),
        };

        if let Some(bounds) = self.prefilter_bounds(predicate) {
            debug!(bounds = %bounds, "Pre-filtering cells");
            clipper = clipper.with_prefilter(bounds);
        }

        progress.set_range(0.0, 1.0);
        let clipped = clipper.clip_block(&working, &mut scratch, diagnostics, progress);

        let status = if clipped.is_empty() {
            BlockStatus::SkippedEmpty
        } else {
            BlockStatus::Clipped {
                cells: clipped.cell_count(),
            }
        };

        let blocks = match status {
            BlockStatus::Clipped { .. } => vec![clipped],
            _ => Vec::new(),
        };

        Ok(ClippedResult::new(
            blocks,
            vec![status; mesh.len()],
            Strategy::Monolithic,
        ))
    }

    /// Clip one block at a time, checking memory before each.
    fn clip_block_wise<F: Numeric>(
        &mut self,
        mesh: &Mesh<F>,
        predicate: &ClipPredicate,
        clipper: Clipper,
        diagnostics: &mut dyn Diagnostics,
        progress: &mut ProgressSpan,
    ) -> ClippedResult<F> {
        let total = mesh.len();
        let mut blocks = Vec::new();
        let mut statuses = Vec::with_capacity(total);
        let mut scratch = ClipScratch::default();

        for (index, block) in mesh.iter().enumerate() {
            progress.set_range(index as f64 / total as f64, (index + 1) as f64 / total as f64);

            let overlaps = block
                .bounds()
                .map(|bounds| predicate.overlaps(&bounds))
                .unwrap_or(false);

            if !overlaps {
                statuses.push(BlockStatus::SkippedDisjoint);
                diagnostics.report(Diagnostic::BlockSkipped {
                    block: index,
                    name: block.name.clone(),
                    reason: SkipReason::Disjoint,
                });
                continue;
            }

            if !self.memory_available(index, &mut scratch, diagnostics) {
                let rest = skip_all(&mesh[index..], index, SkipReason::Memory, Strategy::BlockWise, diagnostics);
                statuses.extend_from_slice(rest.statuses());
                break;
            }

            let clipped = clipper.clip_block(block, &mut scratch, diagnostics, progress);
            debug!(
                block = index,
                name = %block.name,
                cells_in = block.cell_count(),
                cells_out = clipped.cell_count(),
                "Clipped block"
            );

            if clipped.is_empty() {
                statuses.push(BlockStatus::SkippedEmpty);
                diagnostics.report(Diagnostic::BlockSkipped {
                    block: index,
                    name: block.name.clone(),
                    reason: SkipReason::Empty,
                });
            } else {
                statuses.push(BlockStatus::Clipped {
                    cells: clipped.cell_count(),
                });
                blocks.push(clipped);
            }
        }

        ClippedResult::new(blocks, statuses, Strategy::BlockWise)
    }

    /// The pre-block memory check, reported as diagnostics. `false` means stop before
    /// `block`.
    fn memory_available(
        &mut self,
        block: usize,
        scratch: &mut ClipScratch,
        diagnostics: &mut dyn Diagnostics,
    ) -> bool {
        let budget = self.config.memory;
        let releases = self.monitor.release_requests();

        match self.monitor.check(&budget, scratch) {
            Ok(available) => {
                if self.monitor.release_requests() > releases {
                    diagnostics.report(Diagnostic::MemoryThrottled {
                        available,
                        soft_floor: budget.soft_floor_bytes,
                    });
                }
                true
            }
            Err(exhausted) => {
                warn!(block, error = %exhausted, "Stopping clip");
                diagnostics.report(Diagnostic::MemoryExhausted {
                    block,
                    available: exhausted.available,
                    hard_floor: exhausted.hard_floor,
                });
                false
            }
        }
    }

    /// the enlarged predicate box, for non-inverted box and sphere predicates only
    fn prefilter_bounds(&self, predicate: &ClipPredicate) -> Option<Bounds> {
        if !self.config.prefilter || predicate.invert {
            return None;
        }

        match predicate.shape {
            ClipShape::Box { .. } | ClipShape::Sphere { .. } => predicate
                .shape_bounds()
                .map(|bounds| bounds.expanded(self.config.prefilter_margin)),
            ClipShape::Plane { .. } => None,
        }
    }
}

/// mark every block of `blocks` (the first one having index `first`) as skipped
fn skip_all<F: Numeric>(
    blocks: &[Block<F>],
    first: usize,
    reason: SkipReason,
    strategy: Strategy,
    diagnostics: &mut dyn Diagnostics,
) -> ClippedResult<F> {
    let status = match reason {
        SkipReason::Disjoint => BlockStatus::SkippedDisjoint,
        SkipReason::Empty => BlockStatus::SkippedEmpty,
        SkipReason::Memory => BlockStatus::SkippedMemory,
    };

    for (offset, block) in blocks.iter().enumerate() {
        diagnostics.report(Diagnostic::BlockSkipped {
            block: first + offset,
            name: block.name.clone(),
            reason,
        });
    }

    ClippedResult::new(Vec::new(), vec![status; blocks.len()], strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FixedMemory, ScriptedMemory};

    const GIB: u64 = 1024 * 1024 * 1024;

    fn tet_block(name: &str, offset: f64) -> Block<f64> {
        Block::new(
            name,
            vec![
                [offset, 0., 0.],
                [offset + 1., 0., 0.],
                [offset, 1., 0.],
                [offset, 0., 1.],
            ],
        )
        .with_cells(CellShape::Tetra, vec![0, 1, 2, 3])
        .unwrap()
    }

    fn engine(strategy: Strategy, memory: u64) -> ClipEngine<FixedMemory> {
        let config = ClipConfig {
            strategy,
            ..ClipConfig::default()
        };
        ClipEngine::with_monitor(config, MemoryBudgetMonitor::new(FixedMemory(memory)))
    }

    #[test]
    fn auto_picks_monolithic_for_small_single_blocks() {
        let engine = engine(Strategy::Auto, 8 * GIB);
        assert_eq!(
            engine.strategy_for(&Mesh::single(tet_block("a", 0.0))),
            Strategy::Monolithic
        );
        assert_eq!(
            engine.strategy_for(&Mesh::new(vec![tet_block("a", 0.0), tet_block("b", 2.0)])),
            Strategy::BlockWise
        );
    }

    #[test]
    fn invalid_predicate_is_rejected_first() {
        let mesh = Mesh::single(tet_block("a", 0.0));
        let bad = ClipPredicate::sphere([0.0; 3], f64::NAN);

        let err = engine(Strategy::Auto, 8 * GIB)
            .clip(&mesh, &bad, ClipMode::Exact, &mut Vec::new(), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPredicate(_)));
    }

    #[test]
    fn negative_prefilter_margin_is_rejected() {
        let mesh = Mesh::single(tet_block("a", 0.0));
        let config = ClipConfig {
            prefilter_margin: -0.6,
            ..ClipConfig::default()
        };
        let mut engine =
            ClipEngine::with_monitor(config, MemoryBudgetMonitor::new(FixedMemory(8 * GIB)));
        let unit = ClipPredicate::sphere([0.0; 3], 1.0);

        let err = engine
            .clip(&mesh, &unit, ClipMode::Crinkle, &mut Vec::new(), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfig(crate::error::InvalidConfig::PrefilterMargin { .. })
        ));
    }

    #[test]
    fn non_finite_points_are_rejected_before_clipping() {
        let mut block = tet_block("a", 0.0);
        block.points = vec![[f64::NAN, 0., 0.]; 4];
        let mesh = Mesh::single(block);
        let unit = ClipPredicate::boxed(Bounds::new(0., 1., 0., 1., 0., 1.).unwrap());

        let err = engine(Strategy::BlockWise, 8 * GIB)
            .clip(&mesh, &unit, ClipMode::Exact, &mut Vec::new(), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMesh(_)));
    }

    #[test]
    fn disjoint_blocks_do_no_work() {
        let mesh = Mesh::new(vec![tet_block("near", 0.0), tet_block("far", 10.0)]);
        let plane = ClipPredicate::plane([5.0, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        let mut diagnostics = Vec::new();

        let result = engine(Strategy::BlockWise, 8 * GIB)
            .clip(&mesh, &plane, ClipMode::Exact, &mut diagnostics, &mut NoProgress)
            .unwrap();

        assert_eq!(
            result.statuses(),
            &[BlockStatus::Clipped { cells: 1 }, BlockStatus::SkippedDisjoint]
        );
        assert!(diagnostics.contains(&Diagnostic::BlockSkipped {
            block: 1,
            name: "far".into(),
            reason: SkipReason::Disjoint
        }));
    }

    #[test]
    fn throttling_releases_scratch_and_continues() {
        let mesh = Mesh::new(vec![tet_block("a", 0.0), tet_block("b", 0.5)]);
        let plane = ClipPredicate::plane([0.0; 3], [1.0, 0.0, 0.0]);
        let probe = ScriptedMemory::new(vec![8 * GIB, GIB / 2 + 1, GIB - 1]);
        let mut engine = ClipEngine::with_monitor(
            ClipConfig {
                strategy: Strategy::BlockWise,
                ..ClipConfig::default()
            },
            MemoryBudgetMonitor::new(probe),
        );
        let mut diagnostics = Vec::new();

        let result = engine
            .clip(&mesh, &plane, ClipMode::Crinkle, &mut diagnostics, &mut NoProgress)
            .unwrap();

        assert!(!result.is_partial());
        assert_eq!(result.clipped_blocks(), 2);
        assert_eq!(engine.monitor().probe().releases(), 1);
        assert!(diagnostics.contains(&Diagnostic::MemoryThrottled {
            available: GIB - 1,
            soft_floor: GIB
        }));
    }

    #[test]
    fn monolithic_memory_abort_skips_everything() {
        let mesh = Mesh::single(tet_block("a", 0.0));
        let plane = ClipPredicate::plane([0.0; 3], [1.0, 0.0, 0.0]);

        let result = engine(Strategy::Monolithic, 1)
            .clip(&mesh, &plane, ClipMode::Exact, &mut Vec::new(), &mut NoProgress)
            .unwrap();

        assert_eq!(result.statuses(), &[BlockStatus::SkippedMemory]);
        assert_eq!(result.skipped_memory(), Some(0..1));
    }

    #[test]
    fn forced_monolithic_merges_blocks() {
        let mesh = Mesh::new(vec![tet_block("a", 0.0), tet_block("b", 2.0)]);
        let plane = ClipPredicate::plane([-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);

        let result = engine(Strategy::Monolithic, 8 * GIB)
            .clip(&mesh, &plane, ClipMode::Exact, &mut Vec::new(), &mut NoProgress)
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.cell_count(), 2);
        assert_eq!(result.point_count(), 8);
        assert_eq!(result.strategy(), Strategy::Monolithic);
    }

    #[test]
    fn progress_is_monotonic_and_completes() {
        let mesh = Mesh::new((0..4).map(|i| tet_block("b", i as f64)).collect());
        let plane = ClipPredicate::plane([0.0; 3], [1.0, 0.0, 0.0]);
        let mut seen = Vec::new();
        let mut sink = |x: f64| seen.push(x);

        engine(Strategy::BlockWise, 8 * GIB)
            .clip(&mesh, &plane, ClipMode::Exact, &mut Vec::new(), &mut sink)
            .unwrap();

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&1.0));
    }
}
