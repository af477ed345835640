//! detail types carried by the variants of [`Error`](crate::Error)

use crate::mesh::CellShape;
use crate::prelude::*;

use std::path::PathBuf;

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    #[display(fmt = "x")]
    X,
    #[display(fmt = "y")]
    Y,
    #[display(fmt = "z")]
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A clip predicate that cannot describe a region. These are rejected before any block
/// of the mesh is touched.
#[derive(Display, Debug, Clone, PartialEq)]
pub enum InvalidPredicate {
    #[display(fmt = "bounds on the {} axis are inverted: min {} > max {}", axis, min, max)]
    InvertedBounds { axis: Axis, min: f64, max: f64 },
    #[display(fmt = "{} contains a non-finite value", what)]
    NonFinite { what: &'static str },
    #[display(fmt = "the plane normal has zero length")]
    ZeroNormal,
    #[display(fmt = "sphere radius must be finite and non-negative, got {}", radius)]
    InvalidRadius { radius: f64 },
}

/// Engine settings that would change the result of a clip rather than its cost
#[derive(Display, Debug, Clone, PartialEq)]
pub enum InvalidConfig {
    #[display(
        fmt = "pre-filter margin must be finite and non-negative, got {}",
        margin
    )]
    PrefilterMargin { margin: f64 },
}

/// Violations of the block invariants: coordinates must be finite, connectivity must
/// index into the block's own point array and every field must have one row per point.
#[derive(Display, Debug, Clone, PartialEq)]
pub enum InvalidMesh {
    #[display(fmt = "block `{}` has a non-finite coordinate at point {}", block, index)]
    NonFinitePoint { block: String, index: usize },
    #[display(
        fmt = "block `{}` has {} connectivity referencing node {} but only {} points",
        block,
        shape,
        index,
        points
    )]
    ConnectivityOutOfRange {
        block: String,
        shape: CellShape,
        index: usize,
        points: usize,
    },
    #[display(
        fmt = "block `{}` has {} connectivity of length {} which is not a multiple of {}",
        block,
        shape,
        len,
        nodes
    )]
    RaggedConnectivity {
        block: String,
        shape: CellShape,
        len: usize,
        nodes: usize,
    },
    #[display(
        fmt = "field `{}` in block `{}` has {} values but the block has {} points",
        field,
        block,
        actual,
        expected
    )]
    FieldLength {
        block: String,
        field: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Display, Debug, Clone, PartialEq, Eq, Constructor)]
#[display(
    fmt = "field `{}` is missing from block {} (`{}`) but defined in sibling blocks",
    field,
    block,
    block_name
)]
pub struct MissingFieldInBlock {
    pub field: String,
    pub block: usize,
    pub block_name: String,
}

#[derive(Display, Debug, Clone, PartialEq, Eq, Constructor)]
#[display(
    fmt = "field `{}` has {} components in block {} but {} in earlier blocks",
    field,
    actual,
    block,
    expected
)]
pub struct FieldComponentMismatch {
    pub field: String,
    pub block: usize,
    pub expected: usize,
    pub actual: usize,
}

#[derive(Display, Debug, Clone, PartialEq, Eq, Constructor)]
#[display(fmt = "{} {} exceeds the 32 bit range of the output format", what, count)]
pub struct TooLarge {
    pub what: &'static str,
    pub count: usize,
}

/// A filesystem error while serializing. `offset` is the number of bytes of the file
/// that had been handed to the writer when the failure occured. Nothing is left behind
/// under the final name and the temporary file is removed.
#[derive(thiserror::Error, Debug)]
#[error("failed to write `{}` at byte offset {offset}: {source}", .path.display())]
pub struct WriteFailed {
    pub path: PathBuf,
    pub offset: u64,
    #[source]
    pub source: std::io::Error,
}
