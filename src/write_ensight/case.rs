use crate::array::VariableKind;
use crate::prelude::*;

/// One `per node` variable line of a case file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseVariable {
    pub name: String,
    pub kind: VariableKind,
    /// file name relative to the case file
    pub file: String,
}

/// The case file tying a geometry file and its variable files together.
///
/// Variables are listed in the order they were pushed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnsightCaseManifest {
    /// geometry file name relative to the case file
    pub geometry: String,
    pub variables: Vec<CaseVariable>,
}

impl EnsightCaseManifest {
    pub fn new<T: Into<String>>(geometry: T) -> Self {
        Self {
            geometry: geometry.into(),
            variables: Vec::new(),
        }
    }

    pub fn push<N: Into<String>, T: Into<String>>(&mut self, name: N, kind: VariableKind, file: T) {
        self.variables.push(CaseVariable {
            name: name.into(),
            kind,
            file: file.into(),
        });
    }

    pub fn variable(&self, name: &str) -> Option<&CaseVariable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// Write the text of a case file
pub fn write_case<W: Write>(mut writer: W, manifest: &EnsightCaseManifest) -> Result<(), Error> {
    writeln!(writer, "FORMAT")?;
    writeln!(writer, "type: ensight gold")?;
    writeln!(writer)?;
    writeln!(writer, "GEOMETRY")?;
    writeln!(writer, "model: {}", manifest.geometry)?;
    writeln!(writer)?;
    writeln!(writer, "VARIABLE")?;

    for variable in &manifest.variables {
        writeln!(
            writer,
            "{} per node: {} {}",
            variable.kind, variable.name, variable.file
        )?;
    }

    writeln!(writer)?;

    Ok(())
}
