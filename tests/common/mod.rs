#![allow(dead_code)]

use ensclip::{Block, CellShape, FieldArray, Mesh};

/// A block of `n`^3 hexahedra filling the cube `[origin, origin + size]`, carrying a
/// linear `pressure` (x + 2y + 3z) and a `velocity` of (y, -x, z).
pub fn hex_grid(name: &str, origin: [f64; 3], size: f64, n: usize) -> Block<f64> {
    let m = n + 1;
    let step = size / n as f64;
    let index = |i: usize, j: usize, k: usize| i + j * m + k * m * m;

    let mut points = Vec::with_capacity(m * m * m);
    for k in 0..m {
        for j in 0..m {
            for i in 0..m {
                points.push([
                    origin[0] + i as f64 * step,
                    origin[1] + j as f64 * step,
                    origin[2] + k as f64 * step,
                ]);
            }
        }
    }

    let mut connectivity = Vec::with_capacity(n * n * n * 8);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                connectivity.extend_from_slice(&[
                    index(i, j, k),
                    index(i + 1, j, k),
                    index(i + 1, j + 1, k),
                    index(i, j + 1, k),
                    index(i, j, k + 1),
                    index(i + 1, j, k + 1),
                    index(i + 1, j + 1, k + 1),
                    index(i, j + 1, k + 1),
                ]);
            }
        }
    }

    let pressure = points.iter().map(|p| linear_pressure(*p)).collect();
    let velocity = points.iter().map(|p| [p[1], -p[0], p[2]]).collect();

    Block::new(name, points)
        .with_cells(CellShape::Hexa, connectivity)
        .unwrap()
        .with_field(FieldArray::scalar("pressure", pressure))
        .unwrap()
        .with_field(FieldArray::vector("velocity", velocity))
        .unwrap()
}

pub fn linear_pressure(p: [f64; 3]) -> f64 {
    p[0] + 2.0 * p[1] + 3.0 * p[2]
}

/// `count` unit cube blocks of `n`^3 cells side by side along x
pub fn row_of_blocks(count: usize, n: usize) -> Mesh<f64> {
    Mesh::new(
        (0..count)
            .map(|b| hex_grid(&format!("block-{}", b), [b as f64, 0.0, 0.0], 1.0, n))
            .collect(),
    )
}

fn tet_volume(block: &Block<f64>, nodes: &[usize]) -> f64 {
    let [a, b, c, d] = [
        block.point(nodes[0]),
        block.point(nodes[1]),
        block.point(nodes[2]),
        block.point(nodes[3]),
    ];
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let w = [d[0] - a[0], d[1] - a[1], d[2] - a[2]];
    let det = u[0] * (v[1] * w[2] - v[2] * w[1]) - u[1] * (v[0] * w[2] - v[2] * w[0])
        + u[2] * (v[0] * w[1] - v[1] * w[0]);
    det.abs() / 6.0
}

/// Volume of the tetrahedra and of axis aligned hexahedra of a mesh
pub fn volume(mesh: &Mesh<f64>) -> f64 {
    let mut total = 0.0;

    for block in mesh.iter() {
        for nodes in block.cells_of(CellShape::Tetra) {
            total += tet_volume(block, nodes);
        }
        for nodes in block.cells_of(CellShape::Hexa) {
            let lo = block.point(nodes[0]);
            let hi = block.point(nodes[6]);
            total += ((hi[0] - lo[0]) * (hi[1] - lo[1]) * (hi[2] - lo[2])).abs();
        }
    }

    total
}

/// a fresh, empty directory below the system temp dir
pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("ensclip-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
