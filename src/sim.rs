//! The secondary-motion solver.
//!
//! A [`Rig`][self::Rig] owns the point buffers, the constraint network and
//! the collider/grabber sets, and advances them one frame at a time with
//! [`Rig::step`][self::Rig::step]. Each step runs a fixed phase order:
//! capture the driving-frame delta, then per substep refresh swept collider
//! state, integrate points, relax constraints (with embedded collision
//! pushout), optionally run the surface collision pass, and finally write
//! bone poses back out.

mod bitset;
pub mod collider;
pub mod constraint;
pub mod grabber;
mod integrate;
pub mod point;
mod pose;
mod solver;
pub mod surface;

pub use collider::{Collider, ColliderKey, ColliderSet, ColliderShape, SurfacePolarity};
pub use constraint::{Constraint, ConstraintKind, ConstraintSeed, ConstraintSet};
pub use grabber::{Grabber, GrabberKey, GrabberSet};
pub use point::{GrabberHold, MovableLimit, PointParams, PointSet, StiffnessPair, StiffnessProfile};
pub use surface::SurfaceFace;

use crate::math as m;
use thiserror::Error;

//

/// Hard cap on how far a bone may deviate from its reference direction.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct AngleLimit {
    /// Maximum angle between the live bone direction and the reference.
    pub max_angle: m::Angle,
    /// When true the reference is the live parent-to-grandparent direction;
    /// when false it is the original animated direction of the bone.
    pub from_root: bool,
}

/// A flat collider such as a floor. Points below it are projected back onto
/// it and pick up its friction.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Plane {
    pub normal: m::Unit<m::Vec3>,
    /// Signed distance of the plane from the origin along the normal.
    pub offset: f32,
    /// Friction floor applied to points in contact.
    pub friction: f32,
}

impl Plane {
    /// A horizontal floor at the given height.
    pub fn floor(height: f32) -> Self {
        Plane {
            normal: m::Unit::unit_y(),
            offset: height,
            friction: 0.5,
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }
}

/// Which constraint families the relaxation phase acts on.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ConstraintFamilies {
    pub structural_vertical: bool,
    pub structural_horizontal: bool,
    pub shear: bool,
    pub bending_vertical: bool,
    pub bending_horizontal: bool,
}

impl Default for ConstraintFamilies {
    fn default() -> Self {
        Self {
            structural_vertical: true,
            structural_horizontal: true,
            shear: true,
            bending_vertical: true,
            bending_horizontal: true,
        }
    }
}

impl ConstraintFamilies {
    pub(crate) fn enabled(&self, kind: ConstraintKind) -> bool {
        match kind {
            ConstraintKind::StructuralVertical => self.structural_vertical,
            ConstraintKind::StructuralHorizontal => self.structural_horizontal,
            ConstraintKind::Shear => self.shear,
            ConstraintKind::BendingVertical => self.bending_vertical,
            ConstraintKind::BendingHorizontal => self.bending_horizontal,
        }
    }
}

/// Tunable parameters of a [`Rig`][self::Rig]. Plain data with no host
/// dependency; the per-point stiffness curves are expected to already be
/// evaluated to scalars by the authoring side.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct RigParams {
    /// Number of substeps each step is divided into.
    pub substeps: usize,
    /// Number of relaxation passes over the constraint network per substep.
    pub relaxation: usize,
    /// Per-frame cap on how much of the root's translation is entrained
    /// into the simulated points. `None` means no cap.
    pub root_slide_limit: Option<f32>,
    /// Per-frame cap on entrained root rotation.
    pub root_rotate_limit: Option<m::Angle>,
    pub angle_limit: Option<AngleLimit>,
    pub families: ConstraintFamilies,
    /// Master switch for collider response during relaxation.
    pub collision: bool,
    /// Run the quad-surface collision pass after relaxation.
    pub surface_collision: bool,
    pub floor: Option<Plane>,
    /// Safety cap on per-substep displacement magnitude, guarding against
    /// blow-up from torn constraints.
    pub displacement_limit: Option<f32>,
}

impl Default for RigParams {
    fn default() -> Self {
        Self {
            substeps: 1,
            relaxation: 3,
            root_slide_limit: None,
            root_rotate_limit: None,
            angle_limit: None,
            families: ConstraintFamilies::default(),
            collision: true,
            surface_collision: false,
            floor: None,
            displacement_limit: Some(10.0),
        }
    }
}

/// Per-frame inputs to [`Rig::step`][self::Rig::step].
///
/// All pose data is a read-only snapshot; mutating the underlying source
/// mid-step has no effect on the running step.
#[derive(Clone, Copy, Debug)]
pub struct StepContext<'a> {
    /// Frame timestep in seconds.
    pub dt: f32,
    /// The driving root frame (position/rotation/scale) used for
    /// entrainment.
    pub root: m::Transform,
    /// This frame's animated pose of every point, in world space.
    pub driven: &'a [m::Pose],
    /// World positions of the external movable-limit anchors.
    pub anchors: &'a [m::Vec3],
    /// Wind force; scaled per point by `wind_scale / mass`.
    pub wind: m::Vec3,
    /// 0 = output follows the simulation, 1 = output follows the animation.
    pub blend_ratio: f32,
    /// Global fade of the whole simulation: 1 = fully simulated,
    /// 0 = animation only.
    pub fade: f32,
    /// Suppress entrainment clamping for this step, e.g. right after a
    /// deliberate root teleport.
    pub warp: bool,
}

impl<'a> StepContext<'a> {
    pub fn new(dt: f32, driven: &'a [m::Pose]) -> Self {
        Self {
            dt,
            root: m::Transform::identity(),
            driven,
            anchors: &[],
            wind: m::Vec3::zero(),
            blend_ratio: 0.0,
            fade: 1.0,
            warp: false,
        }
    }

    pub fn with_root(mut self, root: m::Transform) -> Self {
        self.root = root;
        self
    }

    pub fn with_anchors(mut self, anchors: &'a [m::Vec3]) -> Self {
        self.anchors = anchors;
        self
    }

    pub fn with_wind(mut self, wind: m::Vec3) -> Self {
        self.wind = wind;
        self
    }

    pub fn with_blend(mut self, blend_ratio: f32, fade: f32) -> Self {
        self.blend_ratio = blend_ratio;
        self.fade = fade;
        self
    }

    pub fn with_warp(mut self) -> Self {
        self.warp = true;
        self
    }
}

/// Errors detected while assembling a rig from authored buffers.
#[derive(Clone, Copy, Debug, Error)]
pub enum BuildError {
    #[error("point index {index} out of range ({count} points)")]
    PointOutOfRange { index: usize, count: usize },
    #[error("constraint links point {index} to itself")]
    SelfLink { index: usize },
    #[error("point {point} has parent {parent}, but parents must precede their children")]
    HierarchyOrder { point: usize, parent: usize },
    #[error("free point {point} must have positive finite mass (got {mass})")]
    InvalidMass { point: usize, mass: f32 },
}

/// Errors that make a step refuse to run. The rig state is untouched when
/// one of these is returned.
#[derive(Clone, Copy, Debug, Error)]
pub enum StepError {
    #[error("expected {expected} driven poses, got {got}")]
    DrivenPoseCount { expected: usize, got: usize },
    #[error("timestep must be positive and finite (got {dt})")]
    InvalidTimestep { dt: f32 },
    #[error("movable limit references anchor {index}, but only {count} anchors were provided")]
    MissingAnchor { index: usize, count: usize },
}

//

/// A simulated secondary-motion rig: point buffers, constraint network,
/// colliders and grabbers, plus the tuning parameters.
pub struct Rig {
    pub params: RigParams,
    pub colliders: ColliderSet,
    pub grabbers: GrabberSet,
    points: PointSet,
    constraints: ConstraintSet,
    faces: Vec<SurfaceFace>,
    prev_root: Option<m::Transform>,
    // highest anchor index any point's movable limit refers to
    max_anchor: Option<usize>,
}

impl Rig {
    /// Assemble a rig from authored buffers: the ordered point list, the
    /// typed constraint seeds with precomputed rest lengths, and the quads
    /// for the optional surface collision pass.
    ///
    /// This is where the constraint network is partitioned into
    /// write-disjoint groups, and where collision flags on fully pinned
    /// pairs are suppressed.
    pub fn new(
        points: Vec<PointParams>,
        seeds: Vec<ConstraintSeed>,
        faces: Vec<SurfaceFace>,
        params: RigParams,
    ) -> Result<Self, BuildError> {
        let count = points.len();
        let mut max_anchor = None;
        for (i, point) in points.iter().enumerate() {
            if let Some(parent) = point.parent {
                if parent >= count {
                    return Err(BuildError::PointOutOfRange {
                        index: parent,
                        count,
                    });
                }
                if parent >= i {
                    return Err(BuildError::HierarchyOrder { point: i, parent });
                }
            }
            if let Some(child) = point.child {
                if child >= count {
                    return Err(BuildError::PointOutOfRange {
                        index: child,
                        count,
                    });
                }
                if child == i {
                    return Err(BuildError::SelfLink { index: i });
                }
            }
            if !point.is_pinned() && !(point.mass.is_finite() && point.mass > 0.0) {
                return Err(BuildError::InvalidMass {
                    point: i,
                    mass: point.mass,
                });
            }
            if let Some(limit) = point.movable_limit {
                max_anchor = Some(max_anchor.map_or(limit.anchor, |a: usize| a.max(limit.anchor)));
            }
        }
        for face in &faces {
            for &index in &face.points {
                if index >= count {
                    return Err(BuildError::PointOutOfRange { index, count });
                }
            }
        }
        let constraints = ConstraintSet::build(seeds, &points)?;
        let points = PointSet::new(points);
        Ok(Self {
            params,
            colliders: ColliderSet::new(),
            grabbers: GrabberSet::new(),
            points,
            constraints,
            faces,
            prev_root: None,
            max_anchor,
        })
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn points(&self) -> &PointSet {
        &self.points
    }

    #[inline]
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Resolved world positions after the latest step.
    #[inline]
    pub fn final_positions(&self) -> &[m::Vec3] {
        &self.points.final_position
    }

    /// Reconstructed world rotations after the latest step.
    #[inline]
    pub fn final_rotations(&self) -> &[m::Rotor3] {
        &self.points.final_rotation
    }

    /// The resolved pose of one point.
    pub fn final_pose(&self, index: usize) -> Option<m::Pose> {
        Some(m::Pose::new(
            *self.points.final_position.get(index)?,
            *self.points.final_rotation.get(index)?,
        ))
    }

    /// Advance the simulation by one frame.
    ///
    /// Refuses to run (leaving all state untouched) if the inputs reference
    /// entries that don't exist; see [`StepError`][self::StepError].
    pub fn step(&mut self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        if ctx.driven.len() != self.points.len() {
            return Err(StepError::DrivenPoseCount {
                expected: self.points.len(),
                got: ctx.driven.len(),
            });
        }
        if !(ctx.dt.is_finite() && ctx.dt > 0.0) {
            return Err(StepError::InvalidTimestep { dt: ctx.dt });
        }
        if let Some(max_anchor) = self.max_anchor {
            if max_anchor >= ctx.anchors.len() {
                return Err(StepError::MissingAnchor {
                    index: max_anchor,
                    count: ctx.anchors.len(),
                });
            }
        }

        self.points.set_driven(ctx.driven);

        //
        // capture the driving-frame delta
        //

        let root = ctx.root;
        let prev_root = self.prev_root.unwrap_or(root);
        self.prev_root = Some(root);

        let mut slide = root.translation - prev_root.translation;
        let mut rotation = root.rotation * prev_root.rotation.reversed();
        if !ctx.warp {
            if let Some(limit) = self.params.root_slide_limit {
                let mag = slide.mag();
                if mag > limit {
                    slide = slide * (limit / mag);
                }
            }
            if let Some(limit) = self.params.root_rotate_limit {
                let angle = m::rotor_angle(rotation);
                if angle > limit.rad() {
                    rotation = m::rotor_fraction(rotation, limit.rad() / angle);
                }
            }
        }

        let substeps = self.params.substeps.max(1);
        let substep_inputs = integrate::SubstepInputs {
            dt: ctx.dt / substeps as f32,
            wind: ctx.wind,
            slide: slide / substeps as f32,
            rotation: m::rotor_fraction(rotation, 1.0 / substeps as f32),
            pivot: root.translation,
            anchors: ctx.anchors,
            floor: self.params.floor,
            displacement_limit: self.params.displacement_limit,
        };

        //
        // substep loop
        //

        for substep in 0..substeps {
            let t = (substep + 1) as f32 / substeps as f32;
            self.colliders.refresh(t);
            self.grabbers.refresh(t);

            integrate::integrate(&mut self.points, &self.grabbers, &substep_inputs);

            for pass in 0..self.params.relaxation {
                solver::relax_pass(
                    &mut self.points,
                    &self.constraints,
                    &self.colliders,
                    &self.params,
                    pass,
                );
            }

            if self.params.surface_collision && !self.faces.is_empty() {
                surface::collide_surfaces(&mut self.points, &self.faces, &self.colliders);
            }
        }

        //
        // write results back to bone poses
        //

        let alpha = m::smoothstep01(ctx.blend_ratio).max(1.0 - ctx.fade.clamp(0.0, 1.0));
        pose::write_poses(&mut self.points, &self.params, alpha);

        Ok(())
    }
}
