//! # Traits
//!
//! General purpose traits shared by the clipping engine, the reducer and the writers.
//!
//! * [`Numeric`] abstracts over the floating point precision of mesh coordinates. Readers
//!   hand over either `f32` or `f64` points and everything downstream is generic over it.
//! * [`Encode`] is implemented by the encoding marker types [`Binary`](crate::Binary) and
//!   [`Ascii`](crate::Ascii) and knows how to lay out the primitive records of an EnSight
//!   Gold file (80 byte lines, integers, float planes and connectivity).
//! * [`Progress`] receives advisory progress fractions from long running operations.

use std::fmt::Debug;
use std::io::Write;

/// Floating point type that mesh coordinates can be stored in.
///
/// All geometric work happens in `f64`; `Numeric` converts in and out of the
/// storage precision.
pub trait Numeric: num_traits::Float + Default + Debug + Send + Sync + 'static {
    fn as_f64(self) -> f64;

    fn from_f64(value: f64) -> Self;
}

impl Numeric for f64 {
    fn as_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

impl Numeric for f32 {
    fn as_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// Describes how the primitive records of an EnSight Gold file are encoded.
///
/// The geometry and variable writers are written once against this trait and
/// monomorphised for [`Binary`](crate::Binary) and [`Ascii`](crate::Ascii). The binary
/// layout is the `C Binary` flavour: fixed 80 byte space padded lines, big endian
/// `i32` integers and big endian `f32` values.
pub trait Encode {
    /// the first line of a geometry file
    fn geometry_banner() -> &'static str;

    /// write a single line of text (description lines, keywords)
    fn write_line<W: Write>(writer: &mut W, line: &str) -> std::io::Result<()>;

    /// write a single integer record (part numbers, counts)
    fn write_int<W: Write>(writer: &mut W, value: i32) -> std::io::Result<()>;

    /// write a contiguous plane of floating point values
    fn write_values<W, I>(writer: &mut W, values: I) -> std::io::Result<()>
    where
        W: Write,
        I: Iterator<Item = f64>;

    /// write the connectivity of every cell of a single shape. `nodes` is the flattened,
    /// zero based connectivity and is written one based.
    fn write_connectivity<W: Write>(
        writer: &mut W,
        nodes: &[usize],
        nodes_per_cell: usize,
    ) -> std::io::Result<()>;
}

/// Observer for advisory progress of long running operations.
///
/// Values are fractions in `[0, 1]`. Callers inside this crate only ever report
/// monotonically non-decreasing values. Progress carries no cancellation semantics.
pub trait Progress {
    fn update(&mut self, fraction: f64);
}

impl<T> Progress for T
where
    T: FnMut(f64),
{
    fn update(&mut self, fraction: f64) {
        self(fraction)
    }
}

/// Progress sink that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&mut self, _fraction: f64) {}
}

/// Maps the progress of a sub-operation onto a sub-range of the parent progress and
/// guarantees that reported values never decrease.
pub(crate) struct ProgressSpan<'a> {
    sink: &'a mut dyn Progress,
    start: f64,
    width: f64,
    last: f64,
}

impl<'a> ProgressSpan<'a> {
    pub(crate) fn new(sink: &'a mut dyn Progress) -> Self {
        Self {
            sink,
            start: 0.0,
            width: 1.0,
            last: 0.0,
        }
    }

    /// restrict further updates to `[start, end]` of the parent range
    pub(crate) fn set_range(&mut self, start: f64, end: f64) {
        self.start = start.clamp(0.0, 1.0);
        self.width = (end.clamp(0.0, 1.0) - self.start).max(0.0);
    }

    pub(crate) fn update(&mut self, local: f64) {
        let value = self.start + self.width * local.clamp(0.0, 1.0);
        if value > self.last {
            self.last = value;
            self.sink.update(value);
        }
    }

    pub(crate) fn finish(&mut self) {
        if self.last < 1.0 {
            self.last = 1.0;
            self.sink.update(1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_span_is_monotonic() {
        let mut seen = Vec::new();
        let mut sink = |x: f64| seen.push(x);
        {
            let mut span = ProgressSpan::new(&mut sink);
            span.set_range(0.0, 0.5);
            span.update(0.5);
            span.update(0.2);
            span.set_range(0.5, 1.0);
            span.update(0.0);
            span.update(1.0);
            span.finish();
        }

        assert_eq!(seen, vec![0.25, 0.5, 1.0]);
    }
}
