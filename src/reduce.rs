//! Merge the per-block output of a clip into a single block.
//!
//! Blocks are concatenated in order, coincident points are optionally merged and cells
//! are optionally rewritten into simplices. Every block has to carry the same fields:
//! zero filling a field that a block lacks would invent data, so it is an error instead.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{FieldComponentMismatch, MissingFieldInBlock};
use crate::mesh::{tet_volume6, Simplices};
use crate::prelude::*;

use ndarray::s;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use tracing::info;

/// name of the block produced by [`reduce`]
pub const REDUCED_BLOCK: &str = "clipped";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceOptions {
    /// merge points closer than `tolerance`
    pub merge_points: bool,
    /// absolute distance below which two points are the same
    pub tolerance: f64,
    /// rewrite volume cells as tetrahedra and quads as triangles
    pub canonicalize: bool,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            merge_points: true,
            tolerance: 1e-6,
            canonicalize: false,
        }
    }
}

/// Combine `blocks` into a mesh with a single block.
///
/// Fails with [`MissingFieldInBlock`] when a field is present in some blocks but not in
/// others and with [`FieldComponentMismatch`] when blocks disagree on the number of
/// components of a field. No blocks yield an empty block without fields.
///
/// ```
/// use ensclip::{Block, CellShape, ReduceOptions};
///
/// let tri = |name: &str| {
///     Block::new(name, vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]])
///         .with_cells(CellShape::Triangle, vec![0, 1, 2])
/// };
///
/// let mesh = ensclip::reduce(vec![tri("a")?, tri("b")?], &ReduceOptions::default(), &mut Vec::new())?;
/// assert_eq!(mesh.point_count(), 3);
/// assert_eq!(mesh.cell_count(), 2);
/// # Ok::<(), ensclip::Error>(())
/// ```
pub fn reduce<F: Numeric>(
    blocks: Vec<Block<F>>,
    options: &ReduceOptions,
    diagnostics: &mut dyn Diagnostics,
) -> Result<Mesh<F>, Error> {
    let inputs = blocks.len();
    let mut block = concatenate(&blocks, REDUCED_BLOCK)?;
    drop(blocks);

    if options.merge_points {
        block = merge_points(block, options.tolerance, diagnostics);
    }

    if options.canonicalize {
        block = canonicalize(block, diagnostics);
    }

    info!(
        blocks = inputs,
        points = block.point_count(),
        cells = block.cell_count(),
        "Reduced clip result"
    );

    Ok(Mesh::single(block))
}

/// Names and component counts of the fields shared by every block, in declaration order.
fn shared_fields<F: Numeric>(blocks: &[Block<F>]) -> Result<Vec<(String, usize)>, Error> {
    let mut fields: Vec<(String, usize)> = Vec::new();
    for field in blocks.iter().flat_map(|b| b.fields.iter()) {
        if !fields.iter().any(|(name, _)| *name == field.name) {
            fields.push((field.name.clone(), field.components()));
        }
    }

    for (name, expected) in &fields {
        for (index, block) in blocks.iter().enumerate() {
            let field = block.field(name).ok_or_else(|| {
                MissingFieldInBlock::new(name.clone(), index, block.name.clone())
            })?;

            if field.components() != *expected {
                return Err(FieldComponentMismatch::new(
                    name.clone(),
                    index,
                    *expected,
                    field.components(),
                )
                .into());
            }
        }
    }

    Ok(fields)
}

/// Append the points, cells and fields of `blocks` in order, offsetting connectivity by
/// the number of points before each block.
pub(crate) fn concatenate<F: Numeric>(blocks: &[Block<F>], name: &str) -> Result<Block<F>, Error> {
    blocks.iter().try_for_each(Block::validate)?;
    let fields = shared_fields(blocks)?;

    let total: usize = blocks.iter().map(Block::point_count).sum();
    let mut points = Vec::with_capacity(total);
    let mut cells: BTreeMap<CellShape, Vec<usize>> = BTreeMap::new();

    for block in blocks {
        let offset = points.len();
        points.extend_from_slice(&block.points);

        for (shape, connectivity) in &block.cells {
            cells
                .entry(*shape)
                .or_default()
                .extend(connectivity.iter().map(|node| node + offset));
        }
    }

    let fields = fields
        .into_iter()
        .map(|(field_name, components)| {
            let mut values = Array2::zeros((total, components));
            let mut row = 0;

            for field in blocks.iter().filter_map(|b| b.field(&field_name)) {
                let rows = field.point_count();
                values
                    .slice_mut(s![row..row + rows, ..])
                    .assign(field.values());
                row += rows;
            }

            FieldArray::new(field_name, values)
        })
        .collect();

    Ok(Block {
        name: name.to_string(),
        points,
        cells,
        fields,
    })
}

/// Merge points closer than `tolerance`. The first point of a cluster survives together
/// with its field values.
fn merge_points<F: Numeric>(
    block: Block<F>,
    tolerance: f64,
    diagnostics: &mut dyn Diagnostics,
) -> Block<F> {
    let before = block.point_count();
    let grid = SpatialHash::new(tolerance);

    let mut buckets: FxHashMap<[i64; 3], SmallVec<[usize; 2]>> = FxHashMap::default();
    let mut survivors: Vec<usize> = Vec::new();
    let mut remap = Vec::with_capacity(before);

    for index in 0..before {
        let p = block.point(index);
        let key = grid.key(p);

        let existing = grid.neighbours(key).find_map(|neighbour| {
            buckets.get(&neighbour)?.iter().copied().find(|candidate| {
                grid.coincident(block.point(survivors[*candidate]), p)
            })
        });

        match existing {
            Some(survivor) => remap.push(survivor),
            None => {
                let survivor = survivors.len();
                survivors.push(index);
                buckets.entry(key).or_default().push(survivor);
                remap.push(survivor);
            }
        }
    }

    if survivors.len() == before {
        return block;
    }

    diagnostics.report(Diagnostic::PointsMerged {
        before,
        after: survivors.len(),
    });

    let points = survivors.iter().map(|i| block.points[*i]).collect();
    let fields = block
        .fields
        .iter()
        .map(|field| field.select_points(&survivors))
        .collect();
    let cells = block
        .cells
        .into_iter()
        .map(|(shape, connectivity)| {
            let connectivity = connectivity.into_iter().map(|node| remap[node]).collect();
            (shape, connectivity)
        })
        .collect();

    Block {
        name: block.name,
        points,
        cells,
        fields,
    }
}

/// Uniform grid with cells the size of the merge tolerance. Coincident points always
/// fall into the same or an adjacent grid cell.
struct SpatialHash {
    tolerance: f64,
}

impl SpatialHash {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
        }
    }

    fn key(&self, p: [f64; 3]) -> [i64; 3] {
        if self.tolerance > 0.0 {
            p.map(|x| (x / self.tolerance).floor() as i64)
        } else {
            p.map(|x| x.to_bits() as i64)
        }
    }

    /// keys of the grid cells around `key`; keys saturated at the `i64` range repeat
    fn neighbours(&self, key: [i64; 3]) -> impl Iterator<Item = [i64; 3]> {
        let reach: i64 = if self.tolerance > 0.0 { 1 } else { 0 };
        (-reach..=reach).flat_map(move |i| {
            (-reach..=reach).flat_map(move |j| {
                (-reach..=reach).map(move |k| {
                    [
                        key[0].saturating_add(i),
                        key[1].saturating_add(j),
                        key[2].saturating_add(k),
                    ]
                })
            })
        })
    }

    fn coincident(&self, a: [f64; 3], b: [f64; 3]) -> bool {
        let d2: f64 = (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum();
        d2 <= self.tolerance * self.tolerance
    }
}

/// Rewrite every cell with a decomposition table as tetrahedra (volume shapes) or
/// triangles (surface shapes).
fn canonicalize<F: Numeric>(block: Block<F>, diagnostics: &mut dyn Diagnostics) -> Block<F> {
    let mut cells: BTreeMap<CellShape, Vec<usize>> = BTreeMap::new();

    for (shape, connectivity) in &block.cells {
        let count = connectivity.len() / shape.nodes();

        match shape.simplices() {
            _ if matches!(shape, CellShape::Tetra | CellShape::Triangle) => {
                cells.entry(*shape).or_default().extend_from_slice(connectivity);
            }
            Some(Simplices::Tetrahedra(table)) => {
                let tets = cells.entry(CellShape::Tetra).or_default();
                for nodes in connectivity.chunks_exact(shape.nodes()) {
                    for t in table {
                        let mut tet = [nodes[t[0]], nodes[t[1]], nodes[t[2]], nodes[t[3]]];
                        let volume6 = tet_volume6(
                            block.point(tet[0]),
                            block.point(tet[1]),
                            block.point(tet[2]),
                            block.point(tet[3]),
                        );
                        if volume6 < 0.0 {
                            tet.swap(1, 2);
                        }
                        tets.extend_from_slice(&tet);
                    }
                }
            }
            Some(Simplices::Triangles(table)) => {
                let tris = cells.entry(CellShape::Triangle).or_default();
                for nodes in connectivity.chunks_exact(shape.nodes()) {
                    for t in table {
                        tris.extend(t.iter().map(|i| nodes[*i]));
                    }
                }
            }
            None => {
                diagnostics.report(Diagnostic::NotCanonicalized {
                    shape: *shape,
                    cells: count,
                });
                cells.entry(*shape).or_default().extend_from_slice(connectivity);
            }
        }
    }

    Block { cells, ..block }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(name: &str, shift: f64) -> Block<f64> {
        Block::new(name, vec![[shift, 0., 0.], [shift + 1., 0., 0.], [shift, 1., 0.]])
            .with_cells(CellShape::Triangle, vec![0, 1, 2])
            .unwrap()
    }

    #[test]
    fn no_blocks_give_an_empty_block() {
        let mesh = reduce::<f64>(Vec::new(), &ReduceOptions::default(), &mut Vec::new()).unwrap();
        assert_eq!(mesh.len(), 1);
        assert!(mesh[0].is_empty());
        assert!(mesh[0].fields.is_empty());
        assert_eq!(mesh[0].name, REDUCED_BLOCK);
    }

    #[test]
    fn concatenation_offsets_connectivity() {
        let block = concatenate(&[tri("a", 0.0), tri("b", 5.0)], "merged").unwrap();
        assert_eq!(block.cells[&CellShape::Triangle], vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(block.point(3), [5.0, 0.0, 0.0]);
    }

    #[test]
    fn merge_keeps_the_first_point_and_its_values() {
        let a = tri("a", 0.0)
            .with_field(FieldArray::scalar("p", vec![1.0, 2.0, 3.0]))
            .unwrap();
        // shares the edge (1,0,0)-(0,1,0) up to a sub-tolerance wobble
        let b = Block::new("b", vec![[1.0 + 1e-8, 0., 0.], [0., 1., 0.], [1., 1., 0.]])
            .with_cells(CellShape::Triangle, vec![0, 1, 2])
            .unwrap()
            .with_field(FieldArray::scalar("p", vec![20.0, 30.0, 40.0]))
            .unwrap();

        let mut diagnostics = Vec::new();
        let mesh = reduce(vec![a, b], &ReduceOptions::default(), &mut diagnostics).unwrap();
        let block = &mesh[0];

        assert_eq!(block.point_count(), 4);
        assert_eq!(block.cells[&CellShape::Triangle], vec![0, 1, 2, 1, 2, 3]);
        assert_eq!(block.field("p").unwrap().component(0).to_vec(), vec![1., 2., 3., 40.]);
        assert_eq!(diagnostics, vec![Diagnostic::PointsMerged { before: 6, after: 4 }]);
    }

    #[test]
    fn merge_across_bucket_boundaries() {
        let block = Block::new("edge", vec![[1e-6 - 1e-9, 0., 0.], [1e-6 + 1e-9, 0., 0.]])
            .with_cells(CellShape::Bar, vec![0, 1])
            .unwrap();

        let merged = merge_points(block, 1e-6, &mut Vec::new());
        assert_eq!(merged.point_count(), 1);
    }

    #[test]
    fn merge_far_from_the_origin() {
        let far = 1e300;
        let block = Block::new("far", vec![[far, -far, 0.], [far, -far, 0.], [0., 0., 0.]])
            .with_cells(CellShape::Triangle, vec![0, 1, 2])
            .unwrap();

        let grid = SpatialHash::new(1e-6);
        let key = grid.key([far, -far, 0.0]);
        assert_eq!(key[0], i64::MAX);
        assert_eq!(key[1], i64::MIN);
        assert_eq!(grid.neighbours(key).count(), 27);

        let merged = merge_points(block, 1e-6, &mut Vec::new());
        assert_eq!(merged.point_count(), 2);
        assert_eq!(merged.cells[&CellShape::Triangle], vec![0, 0, 1]);
    }

    fn with_velocity(block: Block<f64>, components: usize) -> Block<f64> {
        let values = vec![0.0; block.point_count() * components];
        let field = FieldArray::from_flat("velocity", block.point_count(), components, values).unwrap();
        block.with_field(field).unwrap()
    }

    #[test]
    fn field_missing_from_a_block_is_an_error() {
        let a = with_velocity(tri("a", 0.0), 3);
        let b = tri("b", 5.0);

        let err = reduce(vec![a, b], &ReduceOptions::default(), &mut Vec::new()).unwrap_err();
        match err {
            Error::MissingFieldInBlock(missing) => {
                assert_eq!(missing, MissingFieldInBlock::new("velocity".into(), 1, "b".into()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn field_missing_from_the_first_block_is_an_error() {
        let a = tri("a", 0.0);
        let b = with_velocity(tri("b", 5.0), 3);

        let err = reduce(vec![a, b], &ReduceOptions::default(), &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingFieldInBlock(MissingFieldInBlock { block: 0, .. })
        ));
    }

    #[test]
    fn component_mismatch_is_an_error() {
        let a = with_velocity(tri("a", 0.0), 3);
        let b = with_velocity(tri("b", 5.0), 2);

        let err = reduce(vec![a, b], &ReduceOptions::default(), &mut Vec::new()).unwrap_err();
        match err {
            Error::FieldComponentMismatch(mismatch) => {
                assert_eq!(mismatch, FieldComponentMismatch::new("velocity".into(), 1, 3, 2));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn canonical_hexa_has_positive_tets() {
        let hexa = Block::new(
            "hexa",
            vec![
                [0., 0., 0.],
                [1., 0., 0.],
                [1., 1., 0.],
                [0., 1., 0.],
                [0., 0., 1.],
                [1., 0., 1.],
                [1., 1., 1.],
                [0., 1., 1.],
            ],
        )
        .with_cells(CellShape::Hexa, (0..8).collect())
        .unwrap()
        .with_cells(CellShape::Point, vec![0])
        .unwrap();

        let mut diagnostics = Vec::new();
        let block = canonicalize(hexa, &mut diagnostics);

        assert_eq!(block.cell_count_of(CellShape::Tetra), 6);
        assert_eq!(block.cell_count_of(CellShape::Hexa), 0);
        for t in block.cells_of(CellShape::Tetra) {
            let v = tet_volume6(block.point(t[0]), block.point(t[1]), block.point(t[2]), block.point(t[3]));
            assert!(v > 0.0);
        }
        assert_eq!(
            diagnostics,
            vec![Diagnostic::NotCanonicalized {
                shape: CellShape::Point,
                cells: 1
            }]
        );
    }
}
