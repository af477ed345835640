use super::{to_i32, GeometryFormat, WriteOptions};
use crate::diagnostics::Diagnostic;
use crate::prelude::*;

use std::collections::BTreeMap;

/// What ended up in a geometry file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeometryReport {
    /// one part per block of the mesh
    pub parts: usize,
    pub points: usize,
    /// cells written per shape
    pub written: BTreeMap<CellShape, usize>,
    /// cells of shapes outside the output vocabulary that were left out
    pub dropped: BTreeMap<CellShape, usize>,
}

impl GeometryReport {
    pub fn cells_written(&self) -> usize {
        self.written.values().sum()
    }

    pub fn cells_dropped(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Write the geometry file of `mesh` in the format selected by `options`.
///
/// Every block becomes a part, numbered from 1 in mesh order. A mesh with a single block
/// names its part after [`WriteOptions::part_name`], otherwise parts carry the block
/// names. Cells of shapes outside the output vocabulary are left out and reported.
pub fn write_geometry<W: Write, F: Numeric>(
    mut writer: W,
    mesh: &Mesh<F>,
    options: &WriteOptions,
    diagnostics: &mut dyn Diagnostics,
) -> Result<GeometryReport, Error> {
    match options.format {
        GeometryFormat::Binary => {
            encode_geometry::<Binary, _, _>(&mut writer, mesh, options, diagnostics)
        }
        GeometryFormat::Ascii => {
            encode_geometry::<Ascii, _, _>(&mut writer, mesh, options, diagnostics)
        }
    }
}

fn encode_geometry<E: Encode, W: Write, F: Numeric>(
    writer: &mut W,
    mesh: &Mesh<F>,
    options: &WriteOptions,
    diagnostics: &mut dyn Diagnostics,
) -> Result<GeometryReport, Error> {
    let mut report = GeometryReport::default();

    E::write_line(writer, E::geometry_banner())?;
    E::write_line(writer, &options.description)?;
    E::write_line(writer, "node id assign")?;
    E::write_line(writer, "element id assign")?;

    for (index, block) in mesh.iter().enumerate() {
        let part_name = if mesh.len() == 1 {
            options.part_name.as_str()
        } else {
            block.name.as_str()
        };

        E::write_line(writer, "part")?;
        E::write_int(writer, to_i32("part number", index + 1)?)?;
        E::write_line(writer, part_name)?;

        E::write_line(writer, "coordinates")?;
        E::write_int(writer, to_i32("points", block.point_count())?)?;
        for axis in 0..3 {
            E::write_values(writer, block.points.iter().map(|p| p[axis].as_f64()))?;
        }

        for shape in CellShape::VOCABULARY {
            let count = block.cell_count_of(shape);
            let (keyword, connectivity) = match (shape.ensight_keyword(), block.cells.get(&shape)) {
                (Some(keyword), Some(connectivity)) if count > 0 => (keyword, connectivity),
                _ => continue,
            };

            E::write_line(writer, keyword)?;
            E::write_int(writer, to_i32("cells", count)?)?;
            E::write_connectivity(writer, connectivity, shape.nodes())?;

            *report.written.entry(shape).or_default() += count;
        }

        for (shape, _) in block.cells.iter() {
            let count = block.cell_count_of(*shape);
            if shape.ensight_keyword().is_none() && count > 0 {
                *report.dropped.entry(*shape).or_default() += count;
            }
        }

        report.parts += 1;
        report.points += block.point_count();
    }

    for (shape, cells) in &report.dropped {
        diagnostics.report(Diagnostic::UnsupportedCellShape {
            shape: *shape,
            cells: *cells,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tet_block(name: &str) -> Block<f64> {
        Block::new(
            name,
            vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
        )
        .with_cells(CellShape::Tetra, vec![0, 1, 2, 3])
        .unwrap()
    }

    fn read_line(bytes: &[u8], offset: usize) -> String {
        String::from_utf8_lossy(&bytes[offset..offset + 80])
            .trim_end()
            .to_string()
    }

    fn read_int(bytes: &[u8], offset: usize) -> i32 {
        i32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn binary_single_tetra_layout() {
        let mesh = Mesh::single(tet_block("fluid"));
        let mut buffer = Vec::new();
        let mut diagnostics = Vec::new();

        let report =
            write_geometry(&mut buffer, &mesh, &WriteOptions::default(), &mut diagnostics)
                .unwrap();

        // 4 header lines, part + int + name, coordinates + int + 12 floats,
        // tetra4 + int + 4 ints
        assert_eq!(buffer.len(), 4 * 80 + 80 + 4 + 80 + 80 + 4 + 48 + 80 + 4 + 16);
        assert_eq!(read_line(&buffer, 0), "C Binary");
        assert_eq!(read_line(&buffer, 240), "element id assign");
        assert_eq!(read_line(&buffer, 320), "part");
        assert_eq!(read_int(&buffer, 400), 1);
        assert_eq!(read_line(&buffer, 404), "Volume");
        assert_eq!(read_int(&buffer, 564), 4);

        let tetra = 568 + 48;
        assert_eq!(read_line(&buffer, tetra), "tetra4");
        assert_eq!(read_int(&buffer, tetra + 80), 1);
        let nodes: Vec<i32> = (0..4).map(|i| read_int(&buffer, tetra + 84 + 4 * i)).collect();
        assert_eq!(nodes, vec![1, 2, 3, 4]);

        assert_eq!(report.parts, 1);
        assert_eq!(report.written.get(&CellShape::Tetra), Some(&1));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unsupported_shapes_are_dropped_and_reported() {
        let block = tet_block("fluid")
            .with_cells(CellShape::Bar, vec![0, 1, 1, 2])
            .unwrap();
        let mesh = Mesh::single(block);
        let mut buffer = Vec::new();
        let mut diagnostics = Vec::new();

        let report =
            write_geometry(&mut buffer, &mesh, &WriteOptions::default(), &mut diagnostics)
                .unwrap();

        assert_eq!(report.cells_written(), 1);
        assert_eq!(report.dropped.get(&CellShape::Bar), Some(&2));
        assert_eq!(
            diagnostics,
            vec![Diagnostic::UnsupportedCellShape {
                shape: CellShape::Bar,
                cells: 2
            }]
        );
        assert!(!String::from_utf8_lossy(&buffer).contains("bar2"));
    }

    #[test]
    fn ascii_layout() {
        let mesh = Mesh::single(tet_block("fluid"));
        let options = WriteOptions {
            format: GeometryFormat::Ascii,
            description: "unit tetrahedron".into(),
            ..Default::default()
        };
        let mut buffer = Vec::new();

        write_geometry(&mut buffer, &mesh, &options, &mut Vec::new()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "EnSight Gold Geometry File");
        assert_eq!(lines[1], "unit tetrahedron");
        assert_eq!(lines[4], "part");
        assert_eq!(lines[5], "         1");
        assert_eq!(lines[6], "Volume");
        assert_eq!(lines[7], "coordinates");
        assert_eq!(lines[8], "         4");
        assert_eq!(lines[9], " 0.00000e+00");
        assert_eq!(lines[10], " 1.00000e+00");
        assert_eq!(lines[21], "tetra4");
        assert_eq!(lines[22], "         1");
        assert_eq!(lines[23], "         1         2         3         4");
        assert_eq!(lines.len(), 24);
    }

    #[test]
    fn blocks_become_numbered_parts() {
        let mesh = Mesh::new(vec![tet_block("inlet"), tet_block("outlet")]);
        let options = WriteOptions {
            format: GeometryFormat::Ascii,
            ..Default::default()
        };
        let mut buffer = Vec::new();

        let report = write_geometry(&mut buffer, &mesh, &options, &mut Vec::new()).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(report.parts, 2);
        assert_eq!(report.points, 8);
        assert!(text.contains("part\n         2\noutlet\n"));
        assert!(text.contains("part\n         1\ninlet\n"));
    }
}
