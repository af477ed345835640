//! Common traits and types that are useful for working with `ensclip`
#![allow(unused_imports)]

pub use crate::array::FieldArray;
pub use crate::clip::{BlockStatus, ClipEngine, ClipMode, ClippedResult, Strategy};
pub use crate::config::{ClipConfig, Config};
pub use crate::diagnostics::{Diagnostic, Diagnostics, TracingDiagnostics};
pub use crate::mesh::{Block, Bounds, CellShape, Mesh};
pub use crate::predicate::{ClipPredicate, ClipShape};
pub use crate::reduce::ReduceOptions;
pub use crate::traits::{Encode, NoProgress, Numeric, Progress};
pub use crate::write_ensight::{GeometryFormat, WriteOptions};

pub(crate) use crate::{Ascii, Binary};
pub(crate) use crate::Error;
pub(crate) use std::io::Write;

pub(crate) use derive_more::{Constructor, Deref, DerefMut, Display, From, Into};

pub(crate) use ndarray::{Array2, ArrayView1, Axis as ArrayAxis};
