//! # EnSight Gold output
//!
//! [`write_ensight`] writes a complete file set for a mesh into a directory. Given the
//! base name `N`:
//!
//! * `N.geo`: the geometry, one part per block
//! * `N_<field>`: one per-node variable file per scalar or vector field
//! * `N.case`: the case file listing the files above
//! * `N.xml`: optional `CEImetadata` with unit labels
//!
//! The geometry and variable files are written in the `C Binary` flavour (80 byte
//! records, big endian `i32` and `f32`) or as ASCII, see [`GeometryFormat`]. Output is a
//! pure function of the mesh and the options: writing twice gives identical bytes.
//!
//! Every file is first written under a `.tmp` name and renamed into place once it is
//! complete, so a failed write never leaves a truncated file under its final name.
//!
//! The individual writers ([`write_geometry`], [`write_variable`], [`write_case`] and
//! [`write_metadata`]) work on any [`Write`](std::io::Write) and can be used on their own.

mod case;
mod encode;
mod geometry;
mod metadata;
mod variable;

pub use case::{write_case, CaseVariable, EnsightCaseManifest};
pub use geometry::{write_geometry, GeometryReport};
pub use metadata::{units, write_metadata, Units};
pub use variable::write_variable;

use crate::diagnostics::Diagnostic;
use crate::error::{TooLarge, WriteFailed};
use crate::prelude::*;

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Encoding of the geometry and variable files
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryFormat {
    #[display(fmt = "binary")]
    Binary,
    #[display(fmt = "ascii")]
    Ascii,
}

impl Default for GeometryFormat {
    fn default() -> Self {
        GeometryFormat::Binary
    }
}

/// Settings of the EnSight Gold writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub format: GeometryFormat,
    /// second line of the geometry file
    pub description: String,
    /// name of the part when the mesh has a single block
    pub part_name: String,
    /// also write the `N.xml` metadata file
    pub write_metadata: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            format: GeometryFormat::Binary,
            description: "Clipped mesh".to_string(),
            part_name: "Volume".to_string(),
            write_metadata: true,
        }
    }
}

/// Summary of a written file set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub geometry: GeometryReport,
    /// the case file contents: geometry file and every written variable
    pub manifest: EnsightCaseManifest,
    /// fields that were neither scalar nor vector
    pub skipped_fields: Vec<String>,
    /// every file written, in the order they were written
    pub files: Vec<PathBuf>,
}

/// Write the EnSight Gold file set of `mesh` to `dir` using the base name `base`.
///
/// `dir` is created when it does not exist. Fields are written in declaration order (see
/// [`Mesh::field_names`]). Fields must be defined in every block with the same number of
/// components; this is checked before any file is written.
///
/// ```no_run
/// # fn run(mesh: ensclip::Mesh<f64>) -> Result<(), ensclip::Error> {
/// let mut diagnostics = Vec::new();
/// let report = ensclip::write_ensight(
///     "output",
///     "clipped",
///     &mesh,
///     &ensclip::WriteOptions::default(),
///     &mut diagnostics,
/// )?;
/// println!("wrote {} cells", report.geometry.cells_written());
/// # Ok(())
/// # }
/// ```
pub fn write_ensight<P: AsRef<Path>, F: Numeric>(
    dir: P,
    base: &str,
    mesh: &Mesh<F>,
    options: &WriteOptions,
    diagnostics: &mut dyn Diagnostics,
) -> Result<WriteReport, Error> {
    let dir = dir.as_ref();

    mesh.validate()?;
    to_i32("points", mesh.point_count())?;

    // inspect every field up front so a bad field never leaves a partial file set
    let mut fields = Vec::new();
    let mut skipped_fields = Vec::new();
    for name in mesh.field_names() {
        let components = variable::field_components(mesh, name)?;
        if components == 1 || components == 3 {
            fields.push(name);
        } else {
            diagnostics.report(Diagnostic::UnsupportedFieldShape {
                field: name.to_string(),
                components,
            });
            skipped_fields.push(name.to_string());
        }
    }

    info!(
        dir = %dir.display(),
        base,
        format = %options.format,
        points = mesh.point_count(),
        cells = mesh.cell_count(),
        fields = fields.len(),
        "Writing EnSight Gold file set"
    );

    fs::create_dir_all(dir)?;

    let mut files = Vec::new();

    let geometry_file = format!("{}.geo", base);
    let path = dir.join(&geometry_file);
    let geometry = write_file(&path, |writer| {
        write_geometry(writer, mesh, options, diagnostics)
    })?;
    files.push(path);

    let mut manifest = EnsightCaseManifest::new(geometry_file);
    for name in fields {
        let file = variable_file_name(base, name, &manifest);
        let path = dir.join(&file);

        // kinds were checked above, so every field is written
        let kind = write_file(&path, |writer| {
            write_variable(writer, mesh, name, options.format, diagnostics)
        })?;
        if let Some(kind) = kind {
            debug!(field = name, kind = %kind, file = %file, "Wrote variable");
            manifest.push(name, kind, file);
        }
        files.push(path);
    }

    let path = dir.join(format!("{}.case", base));
    write_file(&path, |writer| write_case(writer, &manifest))?;
    files.push(path);

    if options.write_metadata {
        let path = dir.join(format!("{}.xml", base));
        let names: Vec<&str> = manifest.variables.iter().map(|v| v.name.as_str()).collect();
        write_file(&path, |writer| write_metadata(writer, &names))?;
        files.push(path);
    }

    info!(
        files = files.len(),
        cells = geometry.cells_written(),
        dropped = geometry.cells_dropped(),
        skipped_fields = skipped_fields.len(),
        "Finished writing EnSight Gold file set"
    );

    Ok(WriteReport {
        geometry,
        manifest,
        skipped_fields,
        files,
    })
}

pub(crate) fn to_i32(what: &'static str, count: usize) -> Result<i32, Error> {
    i32::try_from(count).map_err(|_| TooLarge::new(what, count).into())
}

/// Replace every character outside `[A-Za-z0-9_.-]` with an underscore
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `N_<field>`, with a numeric suffix when two fields sanitize to the same name
fn variable_file_name(base: &str, field: &str, manifest: &EnsightCaseManifest) -> String {
    let stem = format!("{}_{}", base, sanitize_file_name(field));
    let taken = |name: &str| manifest.variables.iter().any(|v| v.file == name);

    if !taken(&stem) {
        return stem;
    }

    let mut suffix = 2;
    loop {
        let name = format!("{}_{}", stem, suffix);
        if !taken(&name) {
            return name;
        }
        suffix += 1;
    }
}

/// Counts the bytes accepted by the inner writer
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Run `generate` against a buffered writer on `<path>.tmp` and rename the result to
/// `path`. On failure the temporary file is removed and io errors are reported with the
/// byte offset reached.
fn write_file<T, G>(path: &Path, generate: G) -> Result<T, Error>
where
    G: FnOnce(&mut CountingWriter<BufWriter<File>>) -> Result<T, Error>,
{
    let temporary = temporary_path(path);
    let failed = |offset: u64, source: io::Error| {
        Error::from(WriteFailed {
            path: path.to_path_buf(),
            offset,
            source,
        })
    };

    let file = File::create(&temporary).map_err(|source| failed(0, source))?;
    let mut writer = CountingWriter {
        inner: BufWriter::new(file),
        written: 0,
    };

    let outcome = match generate(&mut writer) {
        Ok(value) => writer.flush().map(|_| value).map_err(Error::from),
        Err(error) => Err(error),
    };
    let offset = writer.written;
    drop(writer);

    match outcome {
        Ok(value) => {
            fs::rename(&temporary, path).map_err(|source| failed(offset, source))?;
            Ok(value)
        }
        Err(error) => {
            // cleanup errors are ignored
            let _ = fs::remove_file(&temporary);
            match error {
                Error::Io(source) => Err(failed(offset, source)),
                other => Err(other),
            }
        }
    }
}
