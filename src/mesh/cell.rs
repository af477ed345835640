//! cell shapes and their fixed decompositions into simplices

use crate::prelude::*;

/// Shape of a cell in a [`Block`](crate::Block).
///
/// The first six variants are the output vocabulary of the EnSight Gold writer. Node order
/// follows the EnSight (and VTK) convention: hexahedra list the bottom face
/// counter-clockwise followed by the top face, wedges the bottom triangle followed by the
/// top triangle, and pyramids the base quad followed by the apex.
///
/// The remaining variants are shapes that a reader may hand over but that this crate does
/// not write. They survive clipping (whole-cell semantics) and are dropped, with a
/// reported count, by the geometry writer.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CellShape {
    #[display(fmt = "tetra4")]
    Tetra,
    #[display(fmt = "pyramid5")]
    Pyramid,
    #[display(fmt = "penta6")]
    Wedge,
    #[display(fmt = "hexa8")]
    Hexa,
    #[display(fmt = "tria3")]
    Triangle,
    #[display(fmt = "quad4")]
    Quad,
    #[display(fmt = "point")]
    Point,
    #[display(fmt = "bar2")]
    Bar,
    #[display(fmt = "tetra10")]
    Tetra10,
    #[display(fmt = "hexa20")]
    Hexa20,
}

/// hexahedron split into six tetrahedra around the 0-6 diagonal
const HEXA_TETS: [[usize; 4]; 6] = [
    [0, 1, 2, 6],
    [0, 2, 3, 6],
    [0, 3, 7, 6],
    [0, 7, 4, 6],
    [0, 4, 5, 6],
    [0, 5, 1, 6],
];

pub(crate) const WEDGE_TETS: [[usize; 4]; 3] = [[0, 1, 2, 3], [1, 2, 3, 4], [2, 3, 4, 5]];

const PYRAMID_TETS: [[usize; 4]; 2] = [[0, 1, 2, 4], [0, 2, 3, 4]];

const TETRA_TETS: [[usize; 4]; 1] = [[0, 1, 2, 3]];

const QUAD_TRIS: [[usize; 3]; 2] = [[0, 1, 2], [0, 2, 3]];

const TRIANGLE_TRIS: [[usize; 3]; 1] = [[0, 1, 2]];

/// local node indices of the simplices a cell decomposes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simplices {
    Tetrahedra(&'static [[usize; 4]]),
    Triangles(&'static [[usize; 3]]),
}

impl Simplices {
    pub fn len(&self) -> usize {
        match self {
            Simplices::Tetrahedra(tets) => tets.len(),
            Simplices::Triangles(tris) => tris.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CellShape {
    /// shapes written by the EnSight Gold writer, in the order they are written
    pub const VOCABULARY: [CellShape; 6] = [
        CellShape::Tetra,
        CellShape::Pyramid,
        CellShape::Wedge,
        CellShape::Hexa,
        CellShape::Triangle,
        CellShape::Quad,
    ];

    /// number of nodes of a single cell
    pub fn nodes(self) -> usize {
        match self {
            CellShape::Tetra => 4,
            CellShape::Pyramid => 5,
            CellShape::Wedge => 6,
            CellShape::Hexa => 8,
            CellShape::Triangle => 3,
            CellShape::Quad => 4,
            CellShape::Point => 1,
            CellShape::Bar => 2,
            CellShape::Tetra10 => 10,
            CellShape::Hexa20 => 20,
        }
    }

    /// element keyword in an EnSight Gold geometry file, `None` when the shape is outside
    /// the supported output vocabulary
    pub fn ensight_keyword(self) -> Option<&'static str> {
        match self {
            CellShape::Tetra
            | CellShape::Pyramid
            | CellShape::Wedge
            | CellShape::Hexa
            | CellShape::Triangle
            | CellShape::Quad => Some(self.keyword()),
            _ => None,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            CellShape::Tetra => "tetra4",
            CellShape::Pyramid => "pyramid5",
            CellShape::Wedge => "penta6",
            CellShape::Hexa => "hexa8",
            CellShape::Triangle => "tria3",
            CellShape::Quad => "quad4",
            CellShape::Point => "point",
            CellShape::Bar => "bar2",
            CellShape::Tetra10 => "tetra10",
            CellShape::Hexa20 => "hexa20",
        }
    }

    /// Fixed decomposition of a linear cell into tetrahedra (volume shapes) or triangles
    /// (surface shapes). Quadratic, line and point cells have no decomposition.
    pub fn simplices(self) -> Option<Simplices> {
        match self {
            CellShape::Tetra => Some(Simplices::Tetrahedra(&TETRA_TETS)),
            CellShape::Pyramid => Some(Simplices::Tetrahedra(&PYRAMID_TETS)),
            CellShape::Wedge => Some(Simplices::Tetrahedra(&WEDGE_TETS)),
            CellShape::Hexa => Some(Simplices::Tetrahedra(&HEXA_TETS)),
            CellShape::Triangle => Some(Simplices::Triangles(&TRIANGLE_TRIS)),
            CellShape::Quad => Some(Simplices::Triangles(&QUAD_TRIS)),
            _ => None,
        }
    }
}

/// six times the signed volume of a tetrahedron
pub(crate) fn tet_volume6(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    let u = sub(b, a);
    let v = sub(c, a);
    let w = sub(d, a);
    dot(u, cross(v, w))
}

pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn norm2(a: [f64; 3]) -> f64 {
    dot(a, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_hexa() -> [[f64; 3]; 8] {
        [
            [0., 0., 0.],
            [1., 0., 0.],
            [1., 1., 0.],
            [0., 1., 0.],
            [0., 0., 1.],
            [1., 0., 1.],
            [1., 1., 1.],
            [0., 1., 1.],
        ]
    }

    fn total_volume(points: &[[f64; 3]], tets: &[[usize; 4]]) -> f64 {
        tets.iter()
            .map(|t| tet_volume6(points[t[0]], points[t[1]], points[t[2]], points[t[3]]).abs() / 6.0)
            .sum()
    }

    #[test]
    fn hexa_decomposition_fills_the_cube() {
        let points = unit_hexa();
        approx::assert_relative_eq!(total_volume(&points, &HEXA_TETS), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn wedge_decomposition_fills_the_prism() {
        let points = [
            [0., 0., 0.],
            [1., 0., 0.],
            [0., 1., 0.],
            [0., 0., 1.],
            [1., 0., 1.],
            [0., 1., 1.],
        ];
        approx::assert_relative_eq!(total_volume(&points, &WEDGE_TETS), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn pyramid_decomposition_fills_the_pyramid() {
        let points = [
            [0., 0., 0.],
            [1., 0., 0.],
            [1., 1., 0.],
            [0., 1., 0.],
            [0.5, 0.5, 1.],
        ];
        approx::assert_relative_eq!(total_volume(&points, &PYRAMID_TETS), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn vocabulary_is_sorted() {
        let mut sorted = CellShape::VOCABULARY;
        sorted.sort();
        assert_eq!(sorted, CellShape::VOCABULARY);
        assert!(CellShape::VOCABULARY.iter().all(|s| s.ensight_keyword().is_some()));
        assert_eq!(CellShape::Hexa20.ensight_keyword(), None);
    }
}
