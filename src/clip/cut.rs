//! Cell level clipping.
//!
//! Exact clipping decomposes straddling cells into simplices and cuts every simplex at the
//! predicate surface. A region is either the intersection of a few cutters (a half space,
//! the six faces of a box, or a ball) or, for an inverted box, the complement of such an
//! intersection, which is cut as a disjoint union: every face in turn splits off the part
//! outside of it and passes the part inside on to the next face.
//!
//! New vertices are shared between all simplices that cut the same edge with the same
//! cutter, so neighbouring pieces reference identical points.

use super::ClipMode;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Axis;
use crate::memory::Release;
use crate::mesh::{cross, dot, norm2, sub, tet_volume6, Simplices, WEDGE_TETS};
use crate::predicate::{ClipPredicate, ClipShape};
use crate::prelude::*;
use crate::traits::ProgressSpan;

use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};
use std::collections::BTreeMap;

/// pieces smaller than this fraction of the (cubed / squared) cell size are dropped
const DEGENERATE: f64 = 1e-12;

/// cells between two progress updates
const PROGRESS_STRIDE: usize = 4096;

const UNMAPPED: usize = usize::MAX;

type Tet = [usize; 4];
type Tri = [usize; 3];

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Cutter {
    /// keeps `dot(p - origin, normal) >= 0`
    HalfSpace { origin: [f64; 3], normal: [f64; 3] },
    /// keeps the closed ball, or everything outside its interior
    Ball {
        center: [f64; 3],
        radius: f64,
        keep_inside: bool,
    },
}

impl Cutter {
    /// non-negative on the kept side, negative on the rejected side
    fn value(&self, p: [f64; 3]) -> f64 {
        match self {
            Cutter::HalfSpace { origin, normal } => dot(sub(p, *origin), *normal),
            Cutter::Ball {
                center,
                radius,
                keep_inside,
            } => {
                let inside = radius * radius - norm2(sub(p, *center));
                if *keep_inside {
                    inside
                } else {
                    -inside
                }
            }
        }
    }

    /// Parameter along `a -> b` at which the segment crosses the cutter surface. The end
    /// points lie on different sides.
    fn crossing(&self, a: [f64; 3], b: [f64; 3]) -> f64 {
        let linear = |va: f64, vb: f64| if va == vb { 0.5 } else { va / (va - vb) };

        let t = match self {
            Cutter::HalfSpace { .. } => linear(self.value(a), self.value(b)),
            Cutter::Ball { center, radius, .. } => {
                let d = sub(b, a);
                let f = sub(a, *center);
                let qa = dot(d, d);
                let qb = 2.0 * dot(f, d);
                let qc = dot(f, f) - radius * radius;
                let discriminant = qb * qb - 4.0 * qa * qc;

                if qa == 0.0 || discriminant < 0.0 {
                    linear(self.value(a), self.value(b))
                } else {
                    let root = discriminant.sqrt();
                    let near = (-qb - root) / (2.0 * qa);
                    let far = (-qb + root) / (2.0 * qa);
                    if (0.0..=1.0).contains(&near) {
                        near
                    } else if (0.0..=1.0).contains(&far) {
                        far
                    } else {
                        linear(self.value(a), self.value(b))
                    }
                }
            }
        };

        t.clamp(0.0, 1.0)
    }
}

/// The kept part of space, expressed through cutters
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Region {
    /// points kept by every cutter
    Intersection(SmallVec<[Cutter; 6]>),
    /// points rejected by at least one cutter
    Complement(SmallVec<[Cutter; 6]>),
}

impl Region {
    pub(crate) fn new(shape: &ClipShape, invert: bool) -> Self {
        match shape {
            ClipShape::Plane { origin, normal } => {
                let normal = if invert {
                    [-normal[0], -normal[1], -normal[2]]
                } else {
                    *normal
                };
                Region::Intersection(smallvec![Cutter::HalfSpace {
                    origin: *origin,
                    normal
                }])
            }
            ClipShape::Box { bounds } => {
                let mut faces = SmallVec::new();
                for axis in Axis::ALL {
                    let mut normal = [0.0; 3];
                    normal[axis.index()] = 1.0;
                    faces.push(Cutter::HalfSpace {
                        origin: bounds.min(),
                        normal,
                    });

                    normal[axis.index()] = -1.0;
                    faces.push(Cutter::HalfSpace {
                        origin: bounds.max(),
                        normal,
                    });
                }

                if invert {
                    Region::Complement(faces)
                } else {
                    Region::Intersection(faces)
                }
            }
            ClipShape::Sphere { center, radius } => Region::Intersection(smallvec![Cutter::Ball {
                center: *center,
                radius: *radius,
                keep_inside: !invert,
            }]),
        }
    }

    /// a cell whose nodes are all kept lies completely in the kept region
    fn keeps_convex(&self) -> bool {
        match self {
            Region::Intersection(cutters) => cutters.iter().all(|c| {
                matches!(
                    c,
                    Cutter::HalfSpace { .. }
                        | Cutter::Ball {
                            keep_inside: true,
                            ..
                        }
                )
            }),
            Region::Complement(_) => false,
        }
    }

    /// a cell whose nodes are all rejected lies completely in the rejected region
    fn rejects_convex(&self) -> bool {
        match self {
            Region::Intersection(cutters) => {
                cutters.len() == 1
                    && matches!(
                        cutters[0],
                        Cutter::HalfSpace { .. }
                            | Cutter::Ball {
                                keep_inside: false,
                                ..
                            }
                    )
            }
            Region::Complement(_) => true,
        }
    }

    /// append the parts of `piece` inside the region to `out`
    fn cut<P: Piece, V: Vertices>(&self, verts: &mut V, piece: P, out: &mut Vec<P>) {
        let mut current: SmallVec<[P; 8]> = smallvec![piece];
        let mut next: SmallVec<[P; 8]> = SmallVec::new();

        match self {
            Region::Intersection(cutters) => {
                for (id, cutter) in cutters.iter().enumerate() {
                    for p in current.drain(..) {
                        p.cut(verts, cutter, id, false, &mut next);
                    }
                    std::mem::swap(&mut current, &mut next);
                }
                out.extend(current);
            }
            Region::Complement(cutters) => {
                for (id, cutter) in cutters.iter().enumerate() {
                    for p in current.drain(..) {
                        p.cut(verts, cutter, id, true, out);
                        p.cut(verts, cutter, id, false, &mut next);
                    }
                    std::mem::swap(&mut current, &mut next);
                }
            }
        }
    }
}

/// Vertex storage that simplices are cut against
pub(crate) trait Vertices {
    fn position(&self, vertex: usize) -> [f64; 3];

    /// The vertex where the edge `lo -> hi` crosses the surface of cutter `id`. `lo < hi`.
    fn split_edge(&mut self, lo: usize, hi: usize, cutter: &Cutter, id: usize) -> usize;
}

fn edge_vertex<V: Vertices>(verts: &mut V, cutter: &Cutter, id: usize, a: usize, b: usize) -> usize {
    if a < b {
        verts.split_edge(a, b, cutter, id)
    } else {
        verts.split_edge(b, a, cutter, id)
    }
}

fn lerp(a: [f64; 3], b: [f64; 3], t: f64) -> [f64; 3] {
    [
        a[0] + t * (b[0] - a[0]),
        a[1] + t * (b[1] - a[1]),
        a[2] + t * (b[2] - a[2]),
    ]
}

/// a simplex that can be cut by a single cutter
trait Piece: Copy {
    /// Append the part of `self` on the kept side of `cutter` (the rejected side when
    /// `flip` is set) to `out`.
    fn cut<V: Vertices, E: Extend<Self>>(
        self,
        verts: &mut V,
        cutter: &Cutter,
        id: usize,
        flip: bool,
        out: &mut E,
    );
}

type Sides = (SmallVec<[usize; 4]>, SmallVec<[usize; 4]>);

fn sides<V: Vertices>(verts: &V, nodes: &[usize], cutter: &Cutter, flip: bool) -> Sides {
    let mut kept = SmallVec::new();
    let mut rejected = SmallVec::new();

    for &node in nodes {
        let value = cutter.value(verts.position(node));
        let value = if flip { -value } else { value };
        if value >= 0.0 {
            kept.push(node);
        } else {
            rejected.push(node);
        }
    }

    (kept, rejected)
}

fn wedge_tets(wedge: [usize; 6]) -> impl Iterator<Item = Tet> {
    WEDGE_TETS
        .iter()
        .map(move |t| [wedge[t[0]], wedge[t[1]], wedge[t[2]], wedge[t[3]]])
}

impl Piece for Tet {
    fn cut<V: Vertices, E: Extend<Self>>(
        self,
        verts: &mut V,
        cutter: &Cutter,
        id: usize,
        flip: bool,
        out: &mut E,
    ) {
        let (kept, rejected) = sides(&*verts, &self, cutter, flip);
        let mut split = |a: usize, b: usize| edge_vertex(verts, cutter, id, a, b);

        match (kept.as_slice(), rejected.as_slice()) {
            (_, []) => out.extend(Some(self)),
            ([], _) => {}
            (&[a], &[b, c, d]) => out.extend(Some([a, split(a, b), split(a, c), split(a, d)])),
            (&[a, b], &[c, d]) => {
                let wedge = [a, split(a, c), split(a, d), b, split(b, c), split(b, d)];
                out.extend(wedge_tets(wedge));
            }
            (&[a, b, c], &[d]) => {
                let wedge = [a, b, c, split(a, d), split(b, d), split(c, d)];
                out.extend(wedge_tets(wedge));
            }
            // four nodes always fall into one of the arms above
            _ => {}
        }
    }
}

impl Piece for Tri {
    fn cut<V: Vertices, E: Extend<Self>>(
        self,
        verts: &mut V,
        cutter: &Cutter,
        id: usize,
        flip: bool,
        out: &mut E,
    ) {
        let (kept, rejected) = sides(&*verts, &self, cutter, flip);
        let mut split = |a: usize, b: usize| edge_vertex(verts, cutter, id, a, b);

        match (kept.as_slice(), rejected.as_slice()) {
            (_, []) => out.extend(Some(self)),
            ([], _) => {}
            (&[a], &[b, c]) => out.extend(Some([a, split(a, b), split(a, c)])),
            (&[a, b], &[c]) => {
                let bc = split(b, c);
                let ac = split(a, c);
                out.extend([[a, b, bc], [a, bc, ac]]);
            }
            _ => {}
        }
    }
}

/// positively oriented copy of `tet`, `None` when it has no volume
fn oriented_tet<V: Vertices>(verts: &V, tet: Tet, tolerance: f64) -> Option<Tet> {
    let volume6 = tet_volume6(
        verts.position(tet[0]),
        verts.position(tet[1]),
        verts.position(tet[2]),
        verts.position(tet[3]),
    );

    if volume6.abs() <= tolerance {
        None
    } else if volume6 < 0.0 {
        Some([tet[0], tet[2], tet[1], tet[3]])
    } else {
        Some(tet)
    }
}

/// `p` lies in the closed tetrahedron
fn tet_contains<V: Vertices>(verts: &V, tet: Tet, p: [f64; 3]) -> bool {
    let [a, b, c, d] = [
        verts.position(tet[0]),
        verts.position(tet[1]),
        verts.position(tet[2]),
        verts.position(tet[3]),
    ];
    let volume6 = tet_volume6(a, b, c, d);
    if volume6 == 0.0 {
        return false;
    }

    [
        tet_volume6(p, b, c, d),
        tet_volume6(a, p, c, d),
        tet_volume6(a, b, p, d),
        tet_volume6(a, b, c, p),
    ]
    .iter()
    .all(|v| v * volume6 >= 0.0)
}

fn triangle_normal<V: Vertices>(verts: &V, tri: Tri) -> [f64; 3] {
    let a = verts.position(tri[0]);
    cross(sub(verts.position(tri[1]), a), sub(verts.position(tri[2]), a))
}

/// copy of `tri` facing the same way as `reference`, `None` when it has no area
fn oriented_tri<V: Vertices>(verts: &V, tri: Tri, reference: [f64; 3], tolerance: f64) -> Option<Tri> {
    let normal = triangle_normal(verts, tri);

    if norm2(normal).sqrt() <= tolerance {
        None
    } else if dot(normal, reference) < 0.0 {
        Some([tri[0], tri[2], tri[1]])
    } else {
        Some(tri)
    }
}

/// largest extent of a cell, the length scale for degeneracy checks
fn cell_size(bounds: &Bounds) -> f64 {
    Axis::ALL
        .iter()
        .map(|axis| bounds.extent(*axis))
        .fold(0.0, f64::max)
}

/// Simplices used to test whether a cell touches a region. Quadratic cells are tested
/// through their corner nodes.
fn corner_simplices(shape: CellShape) -> Option<Simplices> {
    match shape {
        CellShape::Tetra10 => CellShape::Tetra.simplices(),
        CellShape::Hexa20 => CellShape::Hexa.simplices(),
        shape => shape.simplices(),
    }
}

/// positions only, used for the touch test
#[derive(Debug, Default)]
struct Geometry {
    points: Vec<[f64; 3]>,
}

impl Vertices for Geometry {
    fn position(&self, vertex: usize) -> [f64; 3] {
        self.points[vertex]
    }

    fn split_edge(&mut self, lo: usize, hi: usize, cutter: &Cutter, _id: usize) -> usize {
        let (a, b) = (self.points[lo], self.points[hi]);
        self.points.push(lerp(a, b, cutter.crossing(a, b)));
        self.points.len() - 1
    }
}

#[derive(Debug, Default)]
struct BuildScratch {
    /// source point -> output vertex
    source_map: Vec<usize>,
    /// (lo, hi, cutter) -> vertex on that edge
    edges: FxHashMap<(usize, usize, usize), usize>,
}

#[derive(Debug, Default)]
struct CellScratch {
    geometry: Geometry,
    tets: Vec<Tet>,
    tris: Vec<Tri>,
}

/// Buffers reused between the blocks of a single clip call.
#[derive(Debug, Default)]
pub(crate) struct ClipScratch {
    build: BuildScratch,
    cell: CellScratch,
}

impl Release for ClipScratch {
    fn release(&mut self) {
        *self = Self::default();
    }
}

/// Accumulates the output block: copied source points, interpolated cut vertices and
/// the field rows of both.
struct Builder<'a, F> {
    block: &'a Block<F>,
    scratch: &'a mut BuildScratch,
    points: Vec<[f64; 3]>,
    /// flattened rows, one vector per field of `block`
    fields: Vec<Vec<f64>>,
    cells: BTreeMap<CellShape, Vec<usize>>,
}

impl<'a, F: Numeric> Builder<'a, F> {
    fn new(block: &'a Block<F>, scratch: &'a mut BuildScratch) -> Self {
        scratch.source_map.clear();
        scratch.source_map.resize(block.point_count(), UNMAPPED);
        scratch.edges.clear();

        Self {
            block,
            scratch,
            points: Vec::new(),
            fields: vec![Vec::new(); block.fields.len()],
            cells: BTreeMap::new(),
        }
    }

    fn source(&mut self, index: usize) -> usize {
        let mapped = self.scratch.source_map[index];
        if mapped != UNMAPPED {
            return mapped;
        }

        let vertex = self.points.len();
        self.points.push(self.block.point(index));
        for (values, field) in self.fields.iter_mut().zip(&self.block.fields) {
            values.extend(field.row(index).iter().copied());
        }

        self.scratch.source_map[index] = vertex;
        vertex
    }

    fn copy_cell(&mut self, shape: CellShape, nodes: &[usize]) {
        let mapped: SmallVec<[usize; 8]> = nodes.iter().map(|n| self.source(*n)).collect();
        self.push(shape, &mapped);
    }

    fn push(&mut self, shape: CellShape, vertices: &[usize]) {
        self.cells.entry(shape).or_default().extend_from_slice(vertices);
    }

    /// drop vertices no cell references and convert back to the storage precision
    fn finish(self) -> Block<F> {
        let mut used = vec![false; self.points.len()];
        for connectivity in self.cells.values() {
            for vertex in connectivity {
                used[*vertex] = true;
            }
        }

        let mut remap = vec![UNMAPPED; self.points.len()];
        let mut kept = Vec::new();
        for (vertex, used) in used.into_iter().enumerate() {
            if used {
                remap[vertex] = kept.len();
                kept.push(vertex);
            }
        }

        let points = kept
            .iter()
            .map(|v| {
                let p = self.points[*v];
                [F::from_f64(p[0]), F::from_f64(p[1]), F::from_f64(p[2])]
            })
            .collect();

        let fields = self
            .block
            .fields
            .iter()
            .zip(&self.fields)
            .map(|(field, values)| {
                let components = field.components();
                let rows = Array2::from_shape_fn((kept.len(), components), |(row, c)| {
                    values[kept[row] * components + c]
                });
                FieldArray::new(field.name.clone(), rows)
            })
            .collect();

        let cells = self
            .cells
            .into_iter()
            .map(|(shape, connectivity)| {
                let connectivity = connectivity.into_iter().map(|v| remap[v]).collect();
                (shape, connectivity)
            })
            .collect();

        Block {
            name: self.block.name.clone(),
            points,
            cells,
            fields,
        }
    }
}

impl<'a, F: Numeric> Vertices for Builder<'a, F> {
    fn position(&self, vertex: usize) -> [f64; 3] {
        self.points[vertex]
    }

    fn split_edge(&mut self, lo: usize, hi: usize, cutter: &Cutter, id: usize) -> usize {
        if let Some(vertex) = self.scratch.edges.get(&(lo, hi, id)) {
            return *vertex;
        }

        let (a, b) = (self.points[lo], self.points[hi]);
        let t = cutter.crossing(a, b);

        let vertex = self.points.len();
        self.points.push(lerp(a, b, t));

        for (values, field) in self.fields.iter_mut().zip(&self.block.fields) {
            let components = field.components();
            for c in 0..components {
                let from = values[lo * components + c];
                let to = values[hi * components + c];
                values.push(from + t * (to - from));
            }
        }

        self.scratch.edges.insert((lo, hi, id), vertex);
        vertex
    }
}

/// one cell of a block with its node positions
struct Cell<'c> {
    shape: CellShape,
    nodes: &'c [usize],
    positions: &'c [[f64; 3]],
    bounds: Bounds,
}

/// Clips the cells of a block against a single predicate.
pub(crate) struct Clipper<'p> {
    predicate: &'p ClipPredicate,
    mode: ClipMode,
    /// the kept region
    region: Region,
    /// the shape itself, ignoring `invert`
    base: Region,
    shape_bounds: Option<Bounds>,
    prefilter: Option<Bounds>,
}

impl<'p> Clipper<'p> {
    pub(crate) fn new(predicate: &'p ClipPredicate, mode: ClipMode) -> Self {
        Self {
            predicate,
            mode,
            region: Region::new(&predicate.shape, predicate.invert),
            base: Region::new(&predicate.shape, false),
            shape_bounds: predicate.shape_bounds(),
            prefilter: None,
        }
    }

    /// skip every cell whose bounds do not overlap `bounds` without further work
    pub(crate) fn with_prefilter(mut self, bounds: Bounds) -> Self {
        self.prefilter = Some(bounds);
        self
    }

    pub(crate) fn clip_block<F: Numeric>(
        &self,
        block: &Block<F>,
        scratch: &mut ClipScratch,
        diagnostics: &mut dyn Diagnostics,
        progress: &mut ProgressSpan,
    ) -> Block<F> {
        let ClipScratch { build, cell: work } = scratch;
        let mut builder = Builder::new(block, build);

        let total = block.cell_count().max(1);
        let mut done = 0;
        let mut positions: SmallVec<[[f64; 3]; 8]> = SmallVec::new();

        for (&shape, connectivity) in &block.cells {
            let simplices = match self.mode {
                ClipMode::Exact => shape.simplices(),
                ClipMode::Crinkle => None,
            };

            for nodes in connectivity.chunks_exact(shape.nodes()) {
                done += 1;
                if done % PROGRESS_STRIDE == 0 {
                    progress.update(done as f64 / total as f64);
                }

                positions.clear();
                positions.extend(nodes.iter().map(|n| block.point(*n)));

                let bounds = match Bounds::from_points(positions.iter().copied()) {
                    Some(bounds) => bounds,
                    None => continue,
                };

                if let Some(prefilter) = &self.prefilter {
                    if !bounds.overlaps(prefilter) {
                        continue;
                    }
                }

                let cell = Cell {
                    shape,
                    nodes,
                    positions: &positions,
                    bounds,
                };

                match simplices {
                    Some(simplices) => self.exact_cell(&mut builder, work, &cell, simplices),
                    None => {
                        if self.touches(work, &cell) != self.predicate.invert {
                            builder.copy_cell(shape, nodes);
                        }
                    }
                }
            }

            if self.mode == ClipMode::Exact && simplices.is_none() && shape != CellShape::Point {
                diagnostics.report(Diagnostic::WholeCellFallback {
                    shape,
                    cells: connectivity.len() / shape.nodes(),
                });
            }
        }

        progress.update(1.0);
        builder.finish()
    }

    /// The cell has a node inside the (non-inverted) shape or its geometry intersects it.
    fn touches(&self, work: &mut CellScratch, cell: &Cell) -> bool {
        if cell.positions.iter().any(|p| self.predicate.inside_shape(*p)) {
            return true;
        }

        // every node strictly on the rejected side of a half space
        let shape_bounds = match &self.shape_bounds {
            Some(bounds) => bounds,
            None => return false,
        };

        if !cell.bounds.overlaps(shape_bounds) {
            return false;
        }

        let simplices = match corner_simplices(cell.shape) {
            Some(simplices) => simplices,
            None => return false,
        };

        let size = cell_size(&cell.bounds);
        let CellScratch {
            geometry,
            tets,
            tris,
        } = work;

        geometry.points.clear();
        geometry.points.extend_from_slice(cell.positions);

        match simplices {
            Simplices::Tetrahedra(table) => {
                let tolerance = DEGENERATE * size.powi(3);
                let cut = table.iter().any(|t| {
                    tets.clear();
                    self.base.cut(geometry, *t, tets);
                    tets.iter()
                        .any(|piece| oriented_tet(&*geometry, *piece, tolerance).is_some())
                });

                // a ball strictly inside the cell crosses none of its edges
                cut || match &self.predicate.shape {
                    ClipShape::Sphere { center, .. } => table
                        .iter()
                        .any(|t| tet_contains(&*geometry, *t, *center)),
                    _ => false,
                }
            }
            Simplices::Triangles(table) => {
                let tolerance = DEGENERATE * size * size;
                table.iter().any(|t| {
                    let reference = triangle_normal(&*geometry, *t);
                    tris.clear();
                    self.base.cut(geometry, *t, tris);
                    tris.iter().any(|piece| {
                        oriented_tri(&*geometry, *piece, reference, tolerance).is_some()
                    })
                })
            }
        }
    }

    fn exact_cell<F: Numeric>(
        &self,
        builder: &mut Builder<F>,
        work: &mut CellScratch,
        cell: &Cell,
        simplices: Simplices,
    ) {
        let nodes = cell.nodes.len();
        let kept = cell
            .positions
            .iter()
            .filter(|p| self.predicate.classify(**p))
            .count();

        if kept == nodes && (self.region.keeps_convex() || !self.touches(work, cell)) {
            builder.copy_cell(cell.shape, cell.nodes);
            return;
        }

        if kept == 0 && (self.region.rejects_convex() || !self.touches(work, cell)) {
            return;
        }

        let local: SmallVec<[usize; 8]> = cell.nodes.iter().map(|n| builder.source(*n)).collect();
        let size = cell_size(&cell.bounds);

        match simplices {
            Simplices::Tetrahedra(table) => {
                let tolerance = DEGENERATE * size.powi(3);
                for t in table {
                    let tet = [local[t[0]], local[t[1]], local[t[2]], local[t[3]]];

                    work.tets.clear();
                    self.region.cut(builder, tet, &mut work.tets);

                    for piece in &work.tets {
                        if let Some(piece) = oriented_tet(&*builder, *piece, tolerance) {
                            builder.push(CellShape::Tetra, &piece);
                        }
                    }
                }
            }
            Simplices::Triangles(table) => {
                let tolerance = DEGENERATE * size * size;
                for t in table {
                    let tri = [local[t[0]], local[t[1]], local[t[2]]];
                    let reference = triangle_normal(&*builder, tri);

                    work.tris.clear();
                    self.region.cut(builder, tri, &mut work.tris);

                    for piece in &work.tris {
                        if let Some(piece) = oriented_tri(&*builder, *piece, reference, tolerance) {
                            builder.push(CellShape::Triangle, &piece);
                        }
                    }
                }
            }
        }
    }
}
