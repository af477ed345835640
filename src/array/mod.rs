//! container type for per-point field data carried through clipping and written to
//! EnSight variable files

use crate::prelude::*;

/// What kind of EnSight variable a field is written as
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    #[display(fmt = "scalar")]
    Scalar,
    #[display(fmt = "vector")]
    Vector,
}

impl VariableKind {
    pub fn components(self) -> usize {
        match self {
            VariableKind::Scalar => 1,
            VariableKind::Vector => 3,
        }
    }
}

#[derive(Deref, Clone, PartialEq, Debug)]
/// Per-point field such as pressure or velocity.
///
/// Values are stored as an `(points, components)` array: one row per point of the owning
/// [`Block`](crate::Block), one column per component. Scalars have a single column and
/// vectors three. Other component counts can be carried through clipping and reduction
/// but are skipped by the writer.
///
/// ## Example
///
/// ```
/// let velocity = ensclip::FieldArray::vector("velocity", vec![[1.0, 0.0, 0.0]; 8]);
/// assert_eq!(velocity.components(), 3);
/// assert_eq!(velocity.point_count(), 8);
/// ```
pub struct FieldArray {
    pub name: String,
    #[deref]
    values: Array2<f64>,
}

impl FieldArray {
    /// Construct a field from an `(points, components)` array
    pub fn new<T: Into<String>>(name: T, values: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// single component field, one value per point
    pub fn scalar<T: Into<String>>(name: T, values: Vec<f64>) -> Self {
        let n = values.len();
        let values = Array2::from_shape_vec((n, 1), values)
            .unwrap_or_else(|_| unreachable!("a (n, 1) shape always matches n values"));
        Self::new(name, values)
    }

    /// three component field, one vector per point
    pub fn vector<T: Into<String>>(name: T, values: Vec<[f64; 3]>) -> Self {
        let n = values.len();
        let flat: Vec<f64> = values.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((n, 3), flat)
            .unwrap_or_else(|_| unreachable!("a (n, 3) shape always matches 3n values"));
        Self::new(name, values)
    }

    /// Build a field from row-major values. Fails when `values` does not hold exactly
    /// `points * components` entries.
    pub fn from_flat<T: Into<String>>(
        name: T,
        points: usize,
        components: usize,
        values: Vec<f64>,
    ) -> Result<Self, ndarray::ShapeError> {
        let values = Array2::from_shape_vec((points, components), values)?;
        Ok(Self::new(name, values))
    }

    /// number of points this field has values for
    pub fn point_count(&self) -> usize {
        self.values.nrows()
    }

    pub fn components(&self) -> usize {
        self.values.ncols()
    }

    /// the variable kind this field is written as, `None` for unsupported component counts
    pub fn kind(&self) -> Option<VariableKind> {
        match self.components() {
            1 => Some(VariableKind::Scalar),
            3 => Some(VariableKind::Vector),
            _ => None,
        }
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// a single component of every point, i.e. one plane of an EnSight variable file
    pub fn component(&self, component: usize) -> ArrayView1<'_, f64> {
        self.values.column(component)
    }

    /// keep only the given rows, in the given order
    pub(crate) fn select_points(&self, rows: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            values: self.values.select(ArrayAxis(0), rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_planes() {
        let field = FieldArray::vector("u", vec![[1., 2., 3.], [4., 5., 6.]]);
        assert_eq!(field.kind(), Some(VariableKind::Vector));
        assert_eq!(field.component(0).to_vec(), vec![1., 4.]);
        assert_eq!(field.component(2).to_vec(), vec![3., 6.]);
    }

    #[test]
    fn from_flat_checks_length() {
        assert!(FieldArray::from_flat("t", 3, 2, vec![0.0; 5]).is_err());
        let field = FieldArray::from_flat("t", 3, 2, vec![0.0; 6]).unwrap();
        assert_eq!(field.kind(), None);
    }

    #[test]
    fn select_reorders_rows() {
        let field = FieldArray::scalar("p", vec![10., 20., 30.]);
        let picked = field.select_points(&[2, 0]);
        assert_eq!(picked.component(0).to_vec(), vec![30., 10.]);
    }
}
