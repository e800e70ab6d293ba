//! swingbone computes believable secondary motion (hair, cloth, tails,
//! accessories) for chains of mass points attached to an animated skeleton.
//!
//! The crate is a pure numerical core: the host hands it point/constraint
//! buffers once and a driving-pose snapshot every frame, and gets back
//! resolved world positions and bone rotations. Topology authoring, editing
//! UI, persistence and rendering all live outside.

pub mod math;
pub use math::{uv, Angle, Pose, Rotor3, Transform, Unit, Vec3};

pub mod sim;
pub use sim::{
    collider::{Collider, ColliderKey, ColliderSet, ColliderShape, SurfacePolarity},
    constraint::{Constraint, ConstraintKind, ConstraintSeed, ConstraintSet},
    grabber::{Grabber, GrabberKey, GrabberSet},
    point::{GrabberHold, MovableLimit, PointParams, PointSet, StiffnessPair, StiffnessProfile},
    surface::SurfaceFace,
    AngleLimit, BuildError, ConstraintFamilies, Plane, Rig, RigParams, StepContext, StepError,
};
