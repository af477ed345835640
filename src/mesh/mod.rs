//! # Mesh Information
//!
//! A [`Mesh`] is the in-memory form of an unstructured dataset as handed over by a case
//! file reader: an ordered list of [`Block`]s. Each block owns a point array, its cells
//! grouped by [`CellShape`] and the per-point fields defined on it.
//!
//! Blocks are the unit of work of the block-wise clipping strategy and become EnSight
//! parts when written. Points are generic over their storage precision (`f32` or `f64`,
//! see [`Numeric`](crate::Numeric)); all geometric computations happen in `f64`.
//!
//! ## Building a mesh by hand
//!
//! ```
//! use ensclip::{Block, CellShape, FieldArray, Mesh};
//!
//! let block = Block::new("fluid", vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.], [0., 0., 1.]])
//!     .with_cells(CellShape::Tetra, vec![0, 1, 2, 3])?
//!     .with_field(FieldArray::scalar("pressure", vec![1.0, 2.0, 3.0, 4.0]))?;
//!
//! let mesh = Mesh::single(block);
//! assert_eq!(mesh.cell_count(), 1);
//! # Ok::<(), ensclip::Error>(())
//! ```

mod block;
mod bounds;
mod cell;

pub use block::{Block, Mesh};
pub use bounds::{BoxOverlap, Bounds};
pub use cell::{CellShape, Simplices};

pub(crate) use cell::{cross, dot, norm2, sub, tet_volume6, WEDGE_TETS};
