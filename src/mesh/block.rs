use super::{Bounds, CellShape};
use crate::array::FieldArray;
use crate::error::InvalidMesh;
use crate::prelude::*;

use std::collections::BTreeMap;

/// One spatially or logically distinct piece of an unstructured mesh.
///
/// A block owns its points, its cells grouped by shape and the per-point fields defined on
/// it. Connectivity is stored flattened per shape: the `n`th cell of shape `s` is
/// `cells[s][n * s.nodes()..(n + 1) * s.nodes()]`, each entry an index into `points`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block<F = f64> {
    pub name: String,
    pub points: Vec<[F; 3]>,
    pub cells: BTreeMap<CellShape, Vec<usize>>,
    pub fields: Vec<FieldArray>,
}

impl<F: Numeric> Block<F> {
    /// create a block without cells or fields
    pub fn new<T: Into<String>>(name: T, points: Vec<[F; 3]>) -> Self {
        Self {
            name: name.into(),
            points,
            cells: BTreeMap::new(),
            fields: Vec::new(),
        }
    }

    /// builder style variant of [`Block::push_cells`]
    pub fn with_cells(mut self, shape: CellShape, connectivity: Vec<usize>) -> Result<Self, Error> {
        self.push_cells(shape, connectivity)?;
        Ok(self)
    }

    /// builder style variant of [`Block::add_field`]
    pub fn with_field(mut self, field: FieldArray) -> Result<Self, Error> {
        self.add_field(field)?;
        Ok(self)
    }

    /// Append cells of a single shape. The connectivity is checked against the point
    /// array of this block.
    pub fn push_cells(&mut self, shape: CellShape, connectivity: Vec<usize>) -> Result<(), Error> {
        check_connectivity(&self.name, shape, &connectivity, self.points.len())?;

        if connectivity.is_empty() {
            return Ok(());
        }

        self.cells.entry(shape).or_default().extend(connectivity);
        Ok(())
    }

    /// Attach a per-point field. A field with the same name is replaced.
    pub fn add_field(&mut self, field: FieldArray) -> Result<(), Error> {
        check_field(&self.name, &field, self.points.len())?;

        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }

        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldArray> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// coordinates of a single point in double precision
    pub fn point(&self, index: usize) -> [f64; 3] {
        let p = self.points[index];
        [p[0].as_f64(), p[1].as_f64(), p[2].as_f64()]
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells
            .iter()
            .map(|(shape, conn)| conn.len() / shape.nodes())
            .sum()
    }

    pub fn cell_count_of(&self, shape: CellShape) -> usize {
        self.cells
            .get(&shape)
            .map(|conn| conn.len() / shape.nodes())
            .unwrap_or(0)
    }

    /// iterate over the node lists of every cell of `shape`
    pub fn cells_of(&self, shape: CellShape) -> impl Iterator<Item = &[usize]> {
        self.cells
            .get(&shape)
            .map(|conn| conn.as_slice())
            .unwrap_or(&[])
            .chunks_exact(shape.nodes())
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }

    /// bounds of all points of the block, `None` when the block has no points
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points((0..self.points.len()).map(|i| self.point(i)))
    }

    /// Check the block invariants: coordinates are finite, connectivity indexes into this
    /// block's points and every field has one row per point.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(index) = (0..self.points.len()).find(|i| !is_finite(self.point(*i))) {
            return Err(InvalidMesh::NonFinitePoint {
                block: self.name.clone(),
                index,
            }
            .into());
        }

        for (shape, conn) in &self.cells {
            check_connectivity(&self.name, *shape, conn, self.points.len())?;
        }

        for field in &self.fields {
            check_field(&self.name, field, self.points.len())?;
        }

        Ok(())
    }
}

fn is_finite(p: [f64; 3]) -> bool {
    p.iter().all(|x| x.is_finite())
}

fn check_connectivity(
    block: &str,
    shape: CellShape,
    connectivity: &[usize],
    points: usize,
) -> Result<(), InvalidMesh> {
    if connectivity.len() % shape.nodes() != 0 {
        return Err(InvalidMesh::RaggedConnectivity {
            block: block.to_string(),
            shape,
            len: connectivity.len(),
            nodes: shape.nodes(),
        });
    }

    if let Some(index) = connectivity.iter().find(|index| **index >= points) {
        return Err(InvalidMesh::ConnectivityOutOfRange {
            block: block.to_string(),
            shape,
            index: *index,
            points,
        });
    }

    Ok(())
}

fn check_field(block: &str, field: &FieldArray, points: usize) -> Result<(), InvalidMesh> {
    if field.point_count() != points {
        return Err(InvalidMesh::FieldLength {
            block: block.to_string(),
            field: field.name.clone(),
            expected: points,
            actual: field.point_count(),
        });
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Deref, Default)]
/// An ordered collection of [`Block`]s as handed over by a case file reader.
///
/// `Mesh` dereferences to the slice of its blocks.
pub struct Mesh<F = f64> {
    #[deref]
    blocks: Vec<Block<F>>,
}

impl<F: Numeric> Mesh<F> {
    pub fn new(blocks: Vec<Block<F>>) -> Self {
        Self { blocks }
    }

    /// a mesh made of a single block
    pub fn single(block: Block<F>) -> Self {
        Self {
            blocks: vec![block],
        }
    }

    pub fn blocks(&self) -> &[Block<F>] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block<F>> {
        self.blocks
    }

    pub fn point_count(&self) -> usize {
        self.blocks.iter().map(Block::point_count).sum()
    }

    pub fn cell_count(&self) -> usize {
        self.blocks.iter().map(Block::cell_count).sum()
    }

    /// bounds over every block, `None` when the mesh has no points
    pub fn bounds(&self) -> Option<Bounds> {
        self.blocks
            .iter()
            .filter_map(Block::bounds)
            .reduce(|a, b| a.union(&b))
    }

    /// Names of all fields in declaration order: the order of the first block that
    /// defines them, blocks visited in mesh order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();

        for field in self.blocks.iter().flat_map(|b| b.fields.iter()) {
            if !names.contains(&field.name.as_str()) {
                names.push(&field.name);
            }
        }

        names
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.blocks.iter().try_for_each(Block::validate)
    }
}
