//! primitive record layout of the two EnSight Gold flavours

use crate::prelude::*;

use std::fmt;
use std::io;

/// width of every text record in a `C Binary` file
const LINE_WIDTH: usize = 80;

/// ascii connectivity is wrapped after this many nodes
const NODES_PER_LINE: usize = 10;

impl Encode for Binary {
    fn geometry_banner() -> &'static str {
        "C Binary"
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
        let mut record = [b' '; LINE_WIDTH];
        let bytes = line.as_bytes();
        let len = bytes.len().min(LINE_WIDTH);
        record[..len].copy_from_slice(&bytes[..len]);
        writer.write_all(&record)
    }

    fn write_int<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
        writer.write_all(&value.to_be_bytes())
    }

    fn write_values<W, I>(writer: &mut W, values: I) -> io::Result<()>
    where
        W: Write,
        I: Iterator<Item = f64>,
    {
        for value in values {
            writer.write_all(&(value as f32).to_be_bytes())?;
        }
        Ok(())
    }

    fn write_connectivity<W: Write>(
        writer: &mut W,
        nodes: &[usize],
        _nodes_per_cell: usize,
    ) -> io::Result<()> {
        // node indices are bounded by the point count, which the caller checked
        for node in nodes {
            writer.write_all(&((*node + 1) as i32).to_be_bytes())?;
        }
        Ok(())
    }
}

impl Encode for Ascii {
    fn geometry_banner() -> &'static str {
        "EnSight Gold Geometry File"
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
        writeln!(writer, "{}", line)
    }

    fn write_int<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
        writeln!(writer, "{:>10}", value)
    }

    fn write_values<W, I>(writer: &mut W, values: I) -> io::Result<()>
    where
        W: Write,
        I: Iterator<Item = f64>,
    {
        for value in values {
            writeln!(writer, "{}", Exponential(value))?;
        }
        Ok(())
    }

    fn write_connectivity<W: Write>(
        writer: &mut W,
        nodes: &[usize],
        nodes_per_cell: usize,
    ) -> io::Result<()> {
        if nodes_per_cell == 0 {
            return Ok(());
        }

        for cell in nodes.chunks(nodes_per_cell) {
            for (position, node) in cell.iter().enumerate() {
                write!(writer, "{:>10}", node + 1)?;
                if (position + 1) % NODES_PER_LINE == 0 {
                    writeln!(writer)?;
                }
            }
            if nodes_per_cell % NODES_PER_LINE != 0 {
                writeln!(writer)?;
            }
        }

        Ok(())
    }
}

/// Formats a value like C's `%12.5e`: five decimals, a signed exponent of at least two
/// digits, right aligned in twelve columns.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Exponential(pub f64);

impl fmt::Display for Exponential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;

        if value.is_nan() {
            return write!(f, "{:>12}", "nan");
        }
        if value.is_infinite() {
            let text = if value > 0.0 { "inf" } else { "-inf" };
            return write!(f, "{:>12}", text);
        }

        let formatted = format!("{:.5e}", value);
        let (mantissa, exponent) = formatted
            .split_once('e')
            .unwrap_or((formatted.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };

        let text = format!("{}e{}{:02}", mantissa, sign, exponent.abs());
        write!(f, "{:>12}", text)
    }
}
