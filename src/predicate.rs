//! geometric predicates that decide which part of a mesh is kept

use crate::error::InvalidPredicate;
use crate::mesh::{dot, norm2, sub, Bounds};

use serde::{Deserialize, Serialize};

/// The shape of the clip region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClipShape {
    /// keeps the half space the normal points into
    Plane { origin: [f64; 3], normal: [f64; 3] },
    /// keeps the inside of the (closed) box
    Box { bounds: Bounds },
    /// keeps the inside of the (closed) ball
    Sphere { center: [f64; 3], radius: f64 },
}

/// A clip shape together with the side of it that is kept.
///
/// Without `invert` a plane keeps the side its normal points into
/// (`dot(p - origin, normal) >= 0`) while boxes and spheres keep their inside. `invert`
/// keeps the complement.
///
/// ```
/// use ensclip::{Bounds, ClipPredicate};
///
/// let keep_inside = ClipPredicate::boxed(Bounds::new(-1., 1., -1., 1., -1., 1.)?);
/// assert!(keep_inside.classify([0.0, 1.0, 0.0]));
/// assert!(!keep_inside.clone().inverted().classify([0.0, 1.0, 0.0]));
/// # Ok::<(), ensclip::InvalidPredicate>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipPredicate {
    pub shape: ClipShape,
    #[serde(default)]
    pub invert: bool,
}

impl ClipPredicate {
    pub fn plane(origin: [f64; 3], normal: [f64; 3]) -> Self {
        Self {
            shape: ClipShape::Plane { origin, normal },
            invert: false,
        }
    }

    pub fn boxed(bounds: Bounds) -> Self {
        Self {
            shape: ClipShape::Box { bounds },
            invert: false,
        }
    }

    pub fn sphere(center: [f64; 3], radius: f64) -> Self {
        Self {
            shape: ClipShape::Sphere { center, radius },
            invert: false,
        }
    }

    /// flip the kept side
    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Reject predicates that cannot describe a region. Called by the engine before any
    /// block is touched.
    pub fn validate(&self) -> Result<(), InvalidPredicate> {
        match &self.shape {
            ClipShape::Plane { origin, normal } => {
                if !all_finite(origin) {
                    return Err(InvalidPredicate::NonFinite {
                        what: "plane origin",
                    });
                }
                if !all_finite(normal) {
                    return Err(InvalidPredicate::NonFinite {
                        what: "plane normal",
                    });
                }
                if norm2(*normal) == 0.0 {
                    return Err(InvalidPredicate::ZeroNormal);
                }
            }
            ClipShape::Box { bounds } => bounds.validate()?,
            ClipShape::Sphere { center, radius } => {
                if !all_finite(center) {
                    return Err(InvalidPredicate::NonFinite {
                        what: "sphere center",
                    });
                }
                if !radius.is_finite() || *radius < 0.0 {
                    return Err(InvalidPredicate::InvalidRadius { radius: *radius });
                }
            }
        }

        Ok(())
    }

    /// point lies inside the shape, ignoring `invert`
    pub fn inside_shape(&self, p: [f64; 3]) -> bool {
        match &self.shape {
            ClipShape::Plane { origin, normal } => dot(sub(p, *origin), *normal) >= 0.0,
            ClipShape::Box { bounds } => bounds.contains(p),
            ClipShape::Sphere { center, radius } => norm2(sub(p, *center)) <= radius * radius,
        }
    }

    /// the point is kept by this predicate
    pub fn classify(&self, p: [f64; 3]) -> bool {
        self.inside_shape(p) != self.invert
    }

    /// Conservative overlap test between a block's bounds and the kept region.
    ///
    /// `false` guarantees that no part of the block can be kept, `true` only means the
    /// block has to be clipped cell by cell.
    pub fn overlaps(&self, block: &Bounds) -> bool {
        if self.invert {
            !self.shape_contains_bounds(block)
        } else {
            self.shape_overlaps_bounds(block)
        }
    }

    fn shape_overlaps_bounds(&self, block: &Bounds) -> bool {
        match &self.shape {
            ClipShape::Plane { .. } => block.corners().iter().any(|c| self.inside_shape(*c)),
            ClipShape::Box { bounds } => bounds.overlaps(block),
            ClipShape::Sphere { center, radius } => {
                let closest = block.closest_point(*center);
                norm2(sub(closest, *center)) <= radius * radius
            }
        }
    }

    fn shape_contains_bounds(&self, block: &Bounds) -> bool {
        match &self.shape {
            // the rejected side of an inverted plane is closed, the kept side open
            ClipShape::Plane { .. } => block.corners().iter().all(|c| self.inside_shape(*c)),
            ClipShape::Box { bounds } => bounds.contains_bounds(block),
            ClipShape::Sphere { .. } => block.corners().iter().all(|c| self.inside_shape(*c)),
        }
    }

    /// bounds of the shape, `None` for the unbounded half space of a plane
    pub fn shape_bounds(&self) -> Option<Bounds> {
        match &self.shape {
            ClipShape::Plane { .. } => None,
            ClipShape::Box { bounds } => Some(*bounds),
            ClipShape::Sphere { center, radius } => Some(Bounds::from_min_max(
                [center[0] - radius, center[1] - radius, center[2] - radius],
                [center[0] + radius, center[1] + radius, center[2] + radius],
            )),
        }
    }
}

fn all_finite(v: &[f64; 3]) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(min: f64, max: f64) -> Bounds {
        Bounds::new(min, max, min, max, min, max).unwrap()
    }

    #[test]
    fn plane_keeps_the_normal_side() {
        let p = ClipPredicate::plane([0., 0., 0.], [1., 0., 0.]);
        assert!(p.classify([0.0, 5.0, 5.0]));
        assert!(p.classify([1.0, 0.0, 0.0]));
        assert!(!p.classify([-1.0, 0.0, 0.0]));
        assert!(p.inverted().classify([-1.0, 0.0, 0.0]));
    }

    #[test]
    fn sphere_boundary_is_inside() {
        let s = ClipPredicate::sphere([0., 0., 0.], 2.0);
        assert!(s.classify([2.0, 0.0, 0.0]));
        assert!(!s.classify([2.0, 0.1, 0.0]));
    }

    #[test]
    fn box_overlap_is_separating_axis() {
        let p = ClipPredicate::boxed(cube(-5.0, 5.0));
        assert!(p.overlaps(&cube(4.0, 8.0)));
        assert!(!p.overlaps(&Bounds::new(6.0, 8.0, -1.0, 1.0, -1.0, 1.0).unwrap()));
    }

    #[test]
    fn inverted_box_skips_contained_blocks() {
        let p = ClipPredicate::boxed(cube(-5.0, 5.0)).inverted();
        assert!(!p.overlaps(&cube(-1.0, 1.0)));
        assert!(p.overlaps(&cube(4.0, 8.0)));
    }

    #[test]
    fn sphere_overlap_uses_closest_point() {
        let s = ClipPredicate::sphere([0., 0., 0.], 1.0);
        // every corner is outside the sphere, the nearest face point is not
        assert!(s.overlaps(&Bounds::new(0.9, 2.0, -0.5, 0.5, -0.5, 0.5).unwrap()));
        assert!(!s.overlaps(&cube(0.9, 2.0)));
    }

    #[test]
    fn plane_overlap_checks_corners() {
        let p = ClipPredicate::plane([0., 0., 0.], [0., 0., 1.]);
        assert!(!p.overlaps(&Bounds::new(0., 1., 0., 1., -2., -1.).unwrap()));
        assert!(p.overlaps(&Bounds::new(0., 1., 0., 1., -2., 0.).unwrap()));

        let inverted = p.inverted();
        assert!(!inverted.overlaps(&Bounds::new(0., 1., 0., 1., 0., 1.).unwrap()));
        assert!(inverted.overlaps(&Bounds::new(0., 1., 0., 1., -1., 1.).unwrap()));
    }

    #[test]
    fn validation() {
        assert_eq!(
            ClipPredicate::plane([0.; 3], [0.; 3]).validate(),
            Err(InvalidPredicate::ZeroNormal)
        );
        assert!(ClipPredicate::sphere([0.; 3], -1.0).validate().is_err());
        assert!(ClipPredicate::sphere([f64::NAN, 0., 0.], 1.0).validate().is_err());

        let bad = ClipPredicate {
            shape: ClipShape::Box {
                bounds: Bounds {
                    xmin: 1.0,
                    xmax: 0.0,
                    ymin: 0.0,
                    ymax: 1.0,
                    zmin: 0.0,
                    zmax: 1.0,
                },
            },
            invert: false,
        };
        assert!(bad.validate().is_err());
    }
}
