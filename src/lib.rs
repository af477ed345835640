//! # ensclip
//!
//! Extract a spatial sub-region from a large unstructured mesh and write it as an
//! EnSight Gold file set.
//!
//! The crate is a chain of value-in / value-out stages that the caller wires together:
//!
//! ```no_run
//! use ensclip::prelude::*;
//!
//! # fn run(mesh: ensclip::Mesh<f64>) -> Result<(), ensclip::Error> {
//! let bounds = Bounds::new(-5.0, 5.0, -5.0, 5.0, -5.0, 5.0)?;
//! let predicate = ClipPredicate::boxed(bounds);
//!
//! let mut diagnostics = TracingDiagnostics;
//! let mut engine = ClipEngine::new(ClipConfig::default());
//! let clipped = engine.clip(&mesh, &predicate, ClipMode::Exact, &mut diagnostics, &mut NoProgress)?;
//! if clipped.is_partial() {
//!     eprintln!("blocks {:?} were not processed", clipped.skipped_memory());
//! }
//!
//! let reduced = ensclip::reduce(clipped.into_blocks(), &ReduceOptions::default(), &mut diagnostics)?;
//! ensclip::write_ensight("output", "clipped", &reduced, &WriteOptions::default(), &mut diagnostics)?;
//! # Ok(())
//! # }
//! ```
//!
//! Memory, not CPU time, is the scarce resource on very large meshes: the block-wise
//! strategy processes one block at a time and stops cleanly (returning a partial result)
//! when the host runs low on memory. See [`clip`] for the details.

pub mod array;
pub mod clip;
pub mod config;
pub mod diagnostics;
mod error;
pub mod memory;
pub mod mesh;
pub mod predicate;
pub mod prelude;
pub mod reduce;
mod traits;
pub mod write_ensight;

pub use array::{FieldArray, VariableKind};
pub use clip::{clip, BlockStatus, ClipEngine, ClipMode, ClippedResult, Strategy};
pub use config::{ClipConfig, Config};
pub use diagnostics::{Diagnostic, Diagnostics, TracingDiagnostics};
pub use error::{
    Axis, FieldComponentMismatch, InvalidConfig, InvalidMesh, InvalidPredicate,
    MissingFieldInBlock, TooLarge, WriteFailed,
};
pub use memory::{MemoryBudget, MemoryBudgetMonitor, MemoryProbe, SystemMemory};
pub use mesh::{Block, Bounds, CellShape, Mesh};
pub use predicate::{ClipPredicate, ClipShape};
pub use reduce::{reduce, ReduceOptions};
pub use traits::{Encode, NoProgress, Numeric, Progress};
pub use write_ensight::{
    write_case, write_ensight, write_geometry, write_metadata, write_variable, EnsightCaseManifest,
    GeometryFormat, GeometryReport, WriteOptions, WriteReport,
};

pub use ndarray;

use derive_more::From;

/// general purpose error enumeration for possible causes of failure.
#[derive(thiserror::Error, Debug, From)]
pub enum Error {
    #[error("An io error occured: `{0}`")]
    Io(std::io::Error),
    #[error("Invalid clip predicate: {0}")]
    InvalidPredicate(InvalidPredicate),
    #[error("Invalid clip configuration: {0}")]
    InvalidConfig(InvalidConfig),
    #[error("Invalid mesh: {0}")]
    InvalidMesh(InvalidMesh),
    #[error("{0}")]
    MissingFieldInBlock(MissingFieldInBlock),
    #[error("{0}")]
    FieldComponentMismatch(FieldComponentMismatch),
    #[error("{0}")]
    TooLarge(TooLarge),
    #[error("{0}")]
    WriteFailed(WriteFailed),
    #[error("Could not write XML metadata: `{0}`")]
    Xml(quick_xml::Error),
    #[error("Could not parse configuration: `{0}`")]
    Config(toml::de::Error),
}

/// Binary encoding marker type
#[derive(Debug, Clone, PartialEq)]
pub struct Binary;

/// ascii encoding marker type
#[derive(Debug, Clone, PartialEq)]
pub struct Ascii;
