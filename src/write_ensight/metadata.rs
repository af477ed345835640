//! `CEImetadata` companion file carrying unit labels. The file is informational, readers
//! of the case do not depend on it.

use crate::prelude::*;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

/// unit label and dimension string of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Units {
    pub label: &'static str,
    pub dims: &'static str,
}

const UNITLESS: Units = Units { label: "", dims: "" };

/// substrings of lower case field names and the units they imply, first match wins
const UNIT_TABLE: [(&[&str], Units); 6] = [
    (
        &["pressure"],
        Units {
            label: "Pa",
            dims: "M/LTT",
        },
    ),
    (
        &["velocity"],
        Units {
            label: "m s^-1",
            dims: "L/T",
        },
    ),
    (
        &[
            "turb_kinetic_energy",
            "turbulent_kinetic_energy",
            "turbulence_kinetic_energy",
            "turbulent kinetic energy",
            "turbulence kinetic energy",
        ],
        Units {
            label: "m^2 s^-2",
            dims: "LL/TT",
        },
    ),
    (
        &["turb_diss", "dissipation"],
        Units {
            label: "m^2 s^-3",
            dims: "LL/TTT",
        },
    ),
    (
        &["temperature"],
        Units {
            label: "K",
            dims: "Θ",
        },
    ),
    (
        &["density"],
        Units {
            label: "kg m^-3",
            dims: "M/LLL",
        },
    ),
];

/// Look up the units of a field from its name, case insensitive
pub fn units(name: &str) -> Units {
    let name = name.to_lowercase();

    UNIT_TABLE
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| name.contains(p)))
        .map(|(_, units)| *units)
        .unwrap_or(UNITLESS)
}

/// Write the metadata document for the given fields, followed by the standard
/// `Coordinates` and `Time` entries and the SI case tags.
pub fn write_metadata<W: Write>(writer: W, fields: &[&str]) -> Result<(), Error> {
    let mut writer = Writer::new_with_indent(writer, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("CEImetadata").with_attributes([("version", "1.0")]),
    ))?;

    writer.write_event(Event::Start(BytesStart::new("vars")))?;
    writer.write_event(Event::Start(BytesStart::new("metatags")))?;
    tag(&mut writer, "ENS_UNITS_LABEL", "str", "")?;
    tag(&mut writer, "ENS_UNITS_DIMS", "str", "")?;
    writer.write_event(Event::End(BytesEnd::new("metatags")))?;

    writer.write_event(Event::Start(BytesStart::new("varlist")))?;
    for field in fields {
        var(&mut writer, field, units(field))?;
    }
    var(
        &mut writer,
        "Coordinates",
        Units {
            label: "m",
            dims: "L",
        },
    )?;
    var(
        &mut writer,
        "Time",
        Units {
            label: "s",
            dims: "T",
        },
    )?;
    writer.write_event(Event::End(BytesEnd::new("varlist")))?;
    writer.write_event(Event::End(BytesEnd::new("vars")))?;

    writer.write_event(Event::Start(BytesStart::new("case")))?;
    writer.write_event(Event::Start(BytesStart::new("metatags")))?;
    tag(&mut writer, "ENS_UNITS_LABEL", "flt", "2.0")?;
    tag(&mut writer, "ENS_UNITS_DIMS", "flt", "1.0")?;
    tag(&mut writer, "ENS_UNITS_SYSTEM", "flt", "1.0")?;
    tag(&mut writer, "ENS_UNITS_SYSTEM_NAME", "str", "SI")?;
    writer.write_event(Event::End(BytesEnd::new("metatags")))?;
    writer.write_event(Event::End(BytesEnd::new("case")))?;

    writer.write_event(Event::End(BytesEnd::new("CEImetadata")))?;

    // trailing newline after the root element
    writer.into_inner().write_all(b"\n")?;

    Ok(())
}

fn tag<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    kind: &str,
    value: &str,
) -> Result<(), quick_xml::Error> {
    element(writer, "tag", [("name", name), ("type", kind)], value)
}

fn var<W: Write>(writer: &mut Writer<W>, name: &str, units: Units) -> Result<(), quick_xml::Error> {
    element(
        writer,
        "var",
        [
            ("name", name),
            ("ENS_UNITS_LABEL", units.label),
            ("ENS_UNITS_DIMS", units.dims),
        ],
        "",
    )
}

/// an element with text content on a single line
fn element<'a, W, I>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: I,
    text: &str,
) -> Result<(), quick_xml::Error>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    writer.write_event(Event::Start(
        BytesStart::new(name).with_attributes(attributes),
    ))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
