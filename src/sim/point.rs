//! Per-particle parameters and live simulation state.

use super::grabber::GrabberKey;
use crate::math as m;

/// Pin weights at or below this are treated as fully pinned.
pub(crate) const PIN_EPS: f32 = 1e-6;

/// Shrink/stretch stiffness of one constraint family, both in [0, 1].
///
/// Shrink applies when the link is over-extended and has to be pulled
/// shorter, stretch when it is compressed and has to be pushed apart.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StiffnessPair {
    pub shrink: f32,
    pub stretch: f32,
}

impl Default for StiffnessPair {
    fn default() -> Self {
        Self {
            shrink: 1.0,
            stretch: 1.0,
        }
    }
}

impl StiffnessPair {
    pub fn new(shrink: f32, stretch: f32) -> Self {
        Self { shrink, stretch }
    }

    pub const ZERO: Self = Self {
        shrink: 0.0,
        stretch: 0.0,
    };
}

/// Per-point stiffness scalars for all five constraint families,
/// pre-evaluated from authoring curves.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StiffnessProfile {
    pub structural_vertical: StiffnessPair,
    pub structural_horizontal: StiffnessPair,
    pub shear: StiffnessPair,
    pub bending_vertical: StiffnessPair,
    pub bending_horizontal: StiffnessPair,
}

impl StiffnessProfile {
    pub fn pair(&self, kind: super::ConstraintKind) -> StiffnessPair {
        use super::ConstraintKind as K;
        match kind {
            K::StructuralVertical => self.structural_vertical,
            K::StructuralHorizontal => self.structural_horizontal,
            K::Shear => self.shear,
            K::BendingVertical => self.bending_vertical,
            K::BendingHorizontal => self.bending_horizontal,
        }
    }
}

/// Tether keeping a point within a sphere around an external moving anchor.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct MovableLimit {
    /// Index into the anchor slice passed in the step context.
    pub anchor: usize,
    pub radius: f32,
}

/// Read-only per-particle parameters. The live state lives in
/// [`PointSet`][self::PointSet]'s parallel arrays.
#[derive(Clone, Copy, Debug)]
pub struct PointParams {
    /// Index of the parent point; `None` for a chain root.
    /// Parents always precede their children in the point list.
    pub parent: Option<usize>,
    /// Index of the child point this one's bone axis aims at.
    pub child: Option<usize>,
    /// 0 = fully animation-driven, 1 = fully free to simulate.
    pub pin_weight: f32,
    pub mass: f32,
    /// Velocity damping in [0, 1].
    pub resistance: f32,
    /// Pull-to-animated-pose strength in [0, 1].
    pub hardness: f32,
    pub friction_scale: f32,
    pub wind_scale: f32,
    /// Extra give added to the stretch limit of the horizontal-family
    /// constraints this point participates in.
    pub slider_length: f32,
    pub stiffness: StiffnessProfile,
    /// Authored local rest direction toward the child, used for rotation
    /// reconstruction.
    pub bone_axis: m::Unit<m::Vec3>,
    /// Gravity, already scaled for this point.
    pub gravity: m::Vec3,
    /// Authored world-space bind pose; seeds the simulation state.
    pub rest_pose: m::Pose,
    pub movable_limit: Option<MovableLimit>,
}

impl PointParams {
    pub fn new(rest_pose: m::Pose) -> Self {
        Self {
            parent: None,
            child: None,
            pin_weight: 1.0,
            mass: 1.0,
            resistance: 0.05,
            hardness: 0.0,
            friction_scale: 1.0,
            wind_scale: 1.0,
            slider_length: 0.0,
            stiffness: StiffnessProfile::default(),
            bone_axis: m::Unit::unit_y(),
            gravity: m::Vec3::new(0.0, -9.81, 0.0),
            rest_pose,
            movable_limit: None,
        }
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_child(mut self, child: usize) -> Self {
        self.child = Some(child);
        self
    }

    /// Fully pin the point to its driving pose.
    pub fn pinned(mut self) -> Self {
        self.pin_weight = 0.0;
        self
    }

    pub fn with_pin_weight(mut self, pin_weight: f32) -> Self {
        self.pin_weight = pin_weight;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_resistance(mut self, resistance: f32) -> Self {
        self.resistance = resistance;
        self
    }

    pub fn with_hardness(mut self, hardness: f32) -> Self {
        self.hardness = hardness;
        self
    }

    pub fn with_friction_scale(mut self, friction_scale: f32) -> Self {
        self.friction_scale = friction_scale;
        self
    }

    pub fn with_wind_scale(mut self, wind_scale: f32) -> Self {
        self.wind_scale = wind_scale;
        self
    }

    pub fn with_slider_length(mut self, slider_length: f32) -> Self {
        self.slider_length = slider_length;
        self
    }

    pub fn with_gravity(mut self, gravity: m::Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_stiffness(mut self, stiffness: StiffnessProfile) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_bone_axis(mut self, bone_axis: m::Unit<m::Vec3>) -> Self {
        self.bone_axis = bone_axis;
        self
    }

    pub fn with_movable_limit(mut self, anchor: usize, radius: f32) -> Self {
        self.movable_limit = Some(MovableLimit { anchor, radius });
        self
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_weight <= PIN_EPS
    }
}

/// Sticky attachment of a point to a grabber: once captured, the point
/// keeps following the grabber surface at the captured distance.
#[derive(Clone, Copy, Debug)]
pub struct GrabberHold {
    pub grabber: GrabberKey,
    pub distance: f32,
}

/// All per-point storage, parallel arrays indexed by point index.
///
/// Mutable simulation state is kept in separate arrays (rather than one
/// struct per point) so the solver phases can borrow exactly the fields
/// they write.
pub struct PointSet {
    pub(crate) params: Vec<PointParams>,
    pub(crate) position: Vec<m::Vec3>,
    pub(crate) old_position: Vec<m::Vec3>,
    /// This substep's externally animated pose of each point.
    pub(crate) driven: Vec<m::Pose>,
    pub(crate) final_position: Vec<m::Vec3>,
    pub(crate) final_rotation: Vec<m::Rotor3>,
    /// Deferred collision correction, consumed and reset by integration.
    pub(crate) push_out: Vec<m::Vec3>,
    /// Transient contact friction, consumed and reset by integration.
    pub(crate) friction: Vec<f32>,
    pub(crate) hold: Vec<Option<GrabberHold>>,
    /// Last non-degenerate bone direction, the fallback when the live
    /// direction collapses to zero length.
    pub(crate) last_direction: Vec<m::Vec3>,
}

impl PointSet {
    pub(crate) fn new(params: Vec<PointParams>) -> Self {
        let count = params.len();
        let position: Vec<m::Vec3> = params.iter().map(|p| p.rest_pose.translation).collect();
        let rotation: Vec<m::Rotor3> = params.iter().map(|p| p.rest_pose.rotation).collect();
        let last_direction = params
            .iter()
            .enumerate()
            .map(|(i, p)| match p.child {
                Some(child) => position[child] - position[i],
                None => m::Vec3::zero(),
            })
            .collect();
        Self {
            driven: params.iter().map(|p| p.rest_pose).collect(),
            old_position: position.clone(),
            final_position: position.clone(),
            final_rotation: rotation,
            push_out: vec![m::Vec3::zero(); count],
            friction: vec![0.0; count],
            hold: vec![None; count],
            last_direction,
            position,
            params,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn params(&self) -> &[PointParams] {
        &self.params
    }

    /// Raw simulated positions (before blending toward the animation).
    #[inline]
    pub fn positions(&self) -> &[m::Vec3] {
        &self.position
    }

    /// The grabber a point is currently captured by, if any.
    #[inline]
    pub fn hold(&self, index: usize) -> Option<GrabberHold> {
        self.hold.get(index).copied().flatten()
    }

    pub(crate) fn set_driven(&mut self, poses: &[m::Pose]) {
        self.driven.copy_from_slice(poses);
    }
}
