use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use ensclip::{Block, CellShape, FieldArray, GeometryFormat, Mesh, WriteOptions};

/// `n`^3 unit hexahedra carrying a random velocity field
fn grid(n: usize) -> Mesh<f32> {
    let m = n + 1;
    let index = |i: usize, j: usize, k: usize| i + j * m + k * m * m;

    let mut points = Vec::with_capacity(m * m * m);
    for k in 0..m {
        for j in 0..m {
            for i in 0..m {
                points.push([i as f32, j as f32, k as f32]);
            }
        }
    }

    let mut connectivity = Vec::with_capacity(8 * n * n * n);
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

    let velocity: Array2<f64> = Array2::random((points.len(), 3), Uniform::new(0., 10.));

    let block = Block::new("fluid", points)
        .with_cells(CellShape::Hexa, connectivity)
        .unwrap()
        .with_field(FieldArray::new("velocity", velocity))
        .unwrap();

    Mesh::single(block)
}

fn write_binary(mesh: &Mesh<f32>) -> usize {
    let mut writer: Vec<u8> = Vec::new();
    let options = WriteOptions {
        format: GeometryFormat::Binary,
        ..WriteOptions::default()
    };

    ensclip::write_geometry(&mut writer, mesh, &options, &mut Vec::new()).unwrap();
    ensclip::write_variable(&mut writer, mesh, "velocity", options.format, &mut Vec::new()).unwrap();

    writer.len()
}

fn write_binary_bench(c: &mut Criterion) {
    let small = grid(50);
    c.bench_function("write binary 50", |b| {
        b.iter(|| write_binary(black_box(&small)))
    });

    let large = grid(100);
    c.bench_function("write binary 100", |b| {
        b.iter(|| write_binary(black_box(&large)))
    });
}

criterion_group!(benches, write_binary_bench);
criterion_main!(benches);
