use super::{to_i32, GeometryFormat};
use crate::array::VariableKind;
use crate::diagnostics::Diagnostic;
use crate::error::{FieldComponentMismatch, MissingFieldInBlock};
use crate::prelude::*;

/// Component count of the field `name`, checked to be present with the same number of
/// components in every block of the mesh.
pub(crate) fn field_components<F: Numeric>(mesh: &Mesh<F>, name: &str) -> Result<usize, Error> {
    let mut components = None;

    for (index, block) in mesh.iter().enumerate() {
        let field = block
            .field(name)
            .ok_or_else(|| MissingFieldInBlock::new(name.to_string(), index, block.name.clone()))?;

        match components {
            None => components = Some(field.components()),
            Some(expected) if expected != field.components() => {
                return Err(FieldComponentMismatch::new(
                    name.to_string(),
                    index,
                    expected,
                    field.components(),
                )
                .into())
            }
            Some(_) => {}
        }
    }

    Ok(components.unwrap_or(0))
}

/// Write the per-node variable file of the field `name`.
///
/// The description line is the field name, followed by one `part` section per block.
/// Scalars are written one value per point, vectors as an X, a Y and a Z plane. Fields
/// with a component count other than 1 or 3 are reported and nothing is written, in which
/// case `Ok(None)` is returned.
///
/// A field that is missing from some block is an error; no bytes are written in that case.
pub fn write_variable<W: Write, F: Numeric>(
    mut writer: W,
    mesh: &Mesh<F>,
    name: &str,
    format: GeometryFormat,
    diagnostics: &mut dyn Diagnostics,
) -> Result<Option<VariableKind>, Error> {
    let components = field_components(mesh, name)?;

    let kind = match components {
        1 => VariableKind::Scalar,
        3 => VariableKind::Vector,
        _ => {
            diagnostics.report(Diagnostic::UnsupportedFieldShape {
                field: name.to_string(),
                components,
            });
            return Ok(None);
        }
    };

    match format {
        GeometryFormat::Binary => encode_variable::<Binary, _, _>(&mut writer, mesh, name, kind)?,
        GeometryFormat::Ascii => encode_variable::<Ascii, _, _>(&mut writer, mesh, name, kind)?,
    }

    Ok(Some(kind))
}

fn encode_variable<E: Encode, W: Write, F: Numeric>(
    writer: &mut W,
    mesh: &Mesh<F>,
    name: &str,
    kind: VariableKind,
) -> Result<(), Error> {
    E::write_line(writer, name)?;

    for (index, block) in mesh.iter().enumerate() {
        // presence was checked by `field_components`
        let field = match block.field(name) {
            Some(field) => field,
            None => continue,
        };

        E::write_line(writer, "part")?;
        E::write_int(writer, to_i32("part number", index + 1)?)?;
        E::write_line(writer, "coordinates")?;

        for component in 0..kind.components() {
            E::write_values(writer, field.component(component).iter().copied())?;
        }
    }

    Ok(())
}
