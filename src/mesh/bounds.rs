use crate::error::{Axis, InvalidPredicate};
use crate::prelude::*;

use serde::{Deserialize, Serialize};

/// Axis aligned bounding box, closed on every side.
///
/// Construct through [`Bounds::new`] which enforces `min <= max` on every axis.
#[derive(Display, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[display(
    fmt = "x [{}, {}] y [{}, {}] z [{}, {}]",
    xmin,
    xmax,
    ymin,
    ymax,
    zmin,
    zmax
)]
pub struct Bounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
}

/// How a clip box sits relative to the bounds of the mesh it is applied to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxOverlap {
    /// fraction of the clip box volume that lies inside the mesh bounds
    pub fraction: f64,
    /// the clip box lies completely inside the mesh bounds
    pub fully_inside: bool,
    /// the clip box and the mesh bounds share no point
    pub disjoint: bool,
}

impl BoxOverlap {
    /// One line description for logs. A zero fraction alone says nothing about the
    /// result: a flat box still touches cells and an inverted box keeps the rest.
    pub fn summary(&self, invert: bool) -> &'static str {
        match (self.disjoint, invert) {
            (true, false) => "Clip box lies outside the mesh bounds, nothing will be kept",
            (true, true) => "Clip box lies outside the mesh bounds, everything will be kept",
            (false, _) => "Clip box overlap with mesh bounds",
        }
    }
}

impl Bounds {
    /// bounds in the `xmin, xmax, ymin, ymax, zmin, zmax` order used throughout EnSight
    pub fn new(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        zmin: f64,
        zmax: f64,
    ) -> Result<Self, InvalidPredicate> {
        let bounds = Self {
            xmin,
            xmax,
            ymin,
            ymax,
            zmin,
            zmax,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// construct from a `[xmin, xmax, ymin, ymax, zmin, zmax]` array
    pub fn from_array(b: [f64; 6]) -> Result<Self, InvalidPredicate> {
        Self::new(b[0], b[1], b[2], b[3], b[4], b[5])
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.xmin, self.xmax, self.ymin, self.ymax, self.zmin, self.zmax]
    }

    /// smallest bounds containing every point, `None` for an empty iterator
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut min = first;
        let mut max = first;

        for p in iter {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        Some(Self::from_min_max(min, max))
    }

    pub(crate) fn from_min_max(min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            xmin: min[0],
            xmax: max[0],
            ymin: min[1],
            ymax: max[1],
            zmin: min[2],
            zmax: max[2],
        }
    }

    pub fn validate(&self) -> Result<(), InvalidPredicate> {
        if self.to_array().iter().any(|v| !v.is_finite()) {
            return Err(InvalidPredicate::NonFinite { what: "bounds" });
        }

        for axis in Axis::ALL {
            let (min, max) = self.interval(axis);
            if min > max {
                return Err(InvalidPredicate::InvertedBounds { axis, min, max });
            }
        }

        Ok(())
    }

    pub fn min(&self) -> [f64; 3] {
        [self.xmin, self.ymin, self.zmin]
    }

    pub fn max(&self) -> [f64; 3] {
        [self.xmax, self.ymax, self.zmax]
    }

    pub fn interval(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::X => (self.xmin, self.xmax),
            Axis::Y => (self.ymin, self.ymax),
            Axis::Z => (self.zmin, self.zmax),
        }
    }

    pub fn extent(&self, axis: Axis) -> f64 {
        let (min, max) = self.interval(axis);
        max - min
    }

    pub fn volume(&self) -> f64 {
        Axis::ALL.iter().map(|a| self.extent(*a)).product()
    }

    pub fn contains(&self, p: [f64; 3]) -> bool {
        p[0] >= self.xmin
            && p[0] <= self.xmax
            && p[1] >= self.ymin
            && p[1] <= self.ymax
            && p[2] >= self.zmin
            && p[2] <= self.zmax
    }

    /// `other` lies completely inside `self`
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        self.contains(other.min()) && self.contains(other.max())
    }

    /// Separating axis test on closed intervals: two boxes are disjoint iff their
    /// intervals fail to overlap on at least one axis.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        Axis::ALL.iter().all(|axis| {
            let (a_min, a_max) = self.interval(*axis);
            let (b_min, b_max) = other.interval(*axis);
            a_min <= b_max && b_min <= a_max
        })
    }

    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        if !self.overlaps(other) {
            return None;
        }

        let a_min = self.min();
        let a_max = self.max();
        let b_min = other.min();
        let b_max = other.max();

        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for i in 0..3 {
            min[i] = a_min[i].max(b_min[i]);
            max[i] = a_max[i].min(b_max[i]);
        }

        Some(Self::from_min_max(min, max))
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        let a_min = self.min();
        let a_max = self.max();
        let b_min = other.min();
        let b_max = other.max();

        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for i in 0..3 {
            min[i] = a_min[i].min(b_min[i]);
            max[i] = a_max[i].max(b_max[i]);
        }

        Self::from_min_max(min, max)
    }

    /// extend every axis on both sides by `fraction` of that axis' extent
    pub fn expanded(&self, fraction: f64) -> Bounds {
        let mut min = self.min();
        let mut max = self.max();

        for axis in Axis::ALL {
            let pad = self.extent(axis) * fraction;
            min[axis.index()] -= pad;
            max[axis.index()] += pad;
        }

        Self::from_min_max(min, max)
    }

    pub fn corners(&self) -> [[f64; 3]; 8] {
        let (x0, x1) = (self.xmin, self.xmax);
        let (y0, y1) = (self.ymin, self.ymax);
        let (z0, z1) = (self.zmin, self.zmax);

        [
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y1, z0],
            [x0, y1, z0],
            [x0, y0, z1],
            [x1, y0, z1],
            [x1, y1, z1],
            [x0, y1, z1],
        ]
    }

    /// the point of the box closest to `p`
    pub fn closest_point(&self, p: [f64; 3]) -> [f64; 3] {
        [
            p[0].clamp(self.xmin, self.xmax),
            p[1].clamp(self.ymin, self.ymax),
            p[2].clamp(self.zmin, self.zmax),
        ]
    }

    /// Treat `self` as a clip box and report how much of it overlaps `mesh`.
    pub fn overlap_report(&self, mesh: &Bounds) -> BoxOverlap {
        let fully_inside = mesh.contains_bounds(self);
        let clip_volume = self.volume();

        let intersection = self.intersection(mesh);
        let fraction = match intersection {
            Some(overlap) if clip_volume > 0.0 => overlap.volume() / clip_volume,
            _ => 0.0,
        };

        BoxOverlap {
            fraction,
            fully_inside,
            disjoint: intersection.is_none(),
        }
    }
}
