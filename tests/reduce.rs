mod common;

use common::{linear_pressure, row_of_blocks, volume};

use ensclip::memory::FixedMemory;
use ensclip::prelude::*;
use ensclip::reduce::REDUCED_BLOCK;
use ensclip::{reduce, MemoryBudgetMonitor};

use approx::assert_relative_eq;

fn clip_block_wise(mesh: &Mesh<f64>, predicate: &ClipPredicate, mode: ClipMode) -> Vec<Block<f64>> {
    let config = ClipConfig {
        strategy: Strategy::BlockWise,
        ..ClipConfig::default()
    };
    let monitor = MemoryBudgetMonitor::new(FixedMemory(u64::MAX));
    ClipEngine::with_monitor(config, monitor)
        .clip(mesh, predicate, mode, &mut Vec::new(), &mut NoProgress)
        .unwrap()
        .into_blocks()
}

#[test]
fn shared_faces_are_merged() {
    let mesh = row_of_blocks(2, 2);
    let everything = ClipPredicate::sphere([1.0, 0.5, 0.5], 10.0);
    let blocks = clip_block_wise(&mesh, &everything, ClipMode::Crinkle);
    assert_eq!(blocks.len(), 2);

    let mut diagnostics = Vec::new();
    let reduced = reduce(blocks, &ReduceOptions::default(), &mut diagnostics).unwrap();

    assert_eq!(reduced.len(), 1);
    assert_eq!(reduced[0].name, REDUCED_BLOCK);
    assert_eq!(reduced.point_count(), 5 * 3 * 3);
    assert_eq!(reduced.cell_count(), 16);
    assert!(diagnostics.contains(&Diagnostic::PointsMerged {
        before: 54,
        after: 45
    }));

    let block = &reduced[0];
    let pressure = block.field("pressure").unwrap();
    for (index, value) in pressure.component(0).iter().enumerate() {
        assert_relative_eq!(*value, linear_pressure(block.point(index)), epsilon = 1e-12);
    }
}

#[test]
fn merging_can_be_disabled() {
    let mesh = row_of_blocks(2, 2);
    let everything = ClipPredicate::sphere([1.0, 0.5, 0.5], 10.0);
    let blocks = clip_block_wise(&mesh, &everything, ClipMode::Crinkle);

    let options = ReduceOptions {
        merge_points: false,
        ..ReduceOptions::default()
    };
    let reduced = reduce(blocks, &options, &mut Vec::new()).unwrap();

    assert_eq!(reduced.point_count(), 54);
}

#[test]
fn canonical_output_is_tetrahedral() {
    let mesh = row_of_blocks(3, 2);
    let plane = ClipPredicate::plane([1.5, 0.0, 0.0], [-1.0, 0.0, 0.0]);
    let blocks = clip_block_wise(&mesh, &plane, ClipMode::Exact);

    let options = ReduceOptions {
        canonicalize: true,
        ..ReduceOptions::default()
    };
    let reduced = reduce(blocks, &options, &mut Vec::new()).unwrap();
    let block = &reduced[0];

    assert_eq!(block.cell_count_of(CellShape::Hexa), 0);
    assert_eq!(block.cell_count(), block.cell_count_of(CellShape::Tetra));
    assert_relative_eq!(volume(&reduced), 1.5, max_relative = 1e-9);
}
