//! Types, aliases and helper operations for doing math with `ultraviolet`.
use std::f32::consts::PI;
pub use ultraviolet as uv;

/// A Pose has a rotation and a translation, no scaling.
///
/// This is the transformation type used for bones and colliders
/// because the solver does not support scaling transforms.
pub type Pose = uv::Isometry3;
/// A Transform is a [`Pose`][self::Pose] plus a uniform scaling.
///
/// Only used for the driving root frame; simulated state is unscaled.
pub type Transform = uv::Similarity3;
pub type Vec3 = uv::Vec3;
pub type Rotor3 = uv::Rotor3;
pub type Bivec3 = uv::Bivec3;

/// An angle in either degrees or radians.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Angle {
    Rad(f32),
    Deg(f32),
}
impl Angle {
    /// Get the angle as degrees.
    #[inline]
    pub fn deg(&self) -> f32 {
        match self {
            Angle::Rad(rad) => rad * 180.0 / PI,
            Angle::Deg(deg) => *deg,
        }
    }

    /// Get the angle as radians.
    #[inline]
    pub fn rad(&self) -> f32 {
        match self {
            Angle::Rad(rad) => *rad,
            Angle::Deg(deg) => deg * PI / 180.0,
        }
    }
}
impl Default for Angle {
    fn default() -> Self {
        Angle::Rad(0.0)
    }
}

/// A wrapper type to indicate a vector should always be normalized.
#[derive(Clone, Copy, Debug)]
pub struct Unit<T>(T);

impl Unit<Vec3> {
    pub fn new_normalize(v: Vec3) -> Self {
        Unit(v.normalized())
    }

    pub const fn new_unchecked(v: Vec3) -> Self {
        Unit(v)
    }

    pub fn unit_x() -> Self {
        Unit(Vec3::unit_x())
    }

    pub fn unit_y() -> Self {
        Unit(Vec3::unit_y())
    }

    pub fn unit_z() -> Self {
        Unit(Vec3::unit_z())
    }
}

impl std::ops::Mul<Unit<Vec3>> for Rotor3 {
    type Output = Unit<Vec3>;

    fn mul(self, rhs: Unit<Vec3>) -> Self::Output {
        Unit(self * rhs.0)
    }
}

impl<T> std::ops::Deref for Unit<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> std::ops::Neg for Unit<T>
where
    T: std::ops::Neg,
{
    type Output = Unit<<T as std::ops::Neg>::Output>;

    fn neg(self) -> Self::Output {
        Unit(-self.0)
    }
}

#[cfg(feature = "serde-types")]
impl serde::Serialize for Unit<Vec3> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(feature = "serde-types")]
impl<'de> serde::Deserialize<'de> for Unit<Vec3> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Unit::new_normalize(Vec3::deserialize(deserializer)?))
    }
}

/// Linear interpolation between two vectors.
#[inline]
pub fn lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

/// The classic cubic smoothstep, with the input clamped to [0, 1].
#[inline]
pub fn smoothstep01(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Rotate `v` about the given unit-length axis by `angle` radians
/// (Rodrigues' formula).
#[inline]
pub fn rotate_about_axis(v: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    v * cos + axis.cross(v) * sin + axis * (axis.dot(v) * (1.0 - cos))
}

/// The rotor taking unit vector `from` to unit vector `to` along the
/// shortest arc. Antiparallel inputs get an arbitrary half-turn instead of
/// a degenerate rotor.
pub fn rotor_between(from: Vec3, to: Vec3) -> Rotor3 {
    if from.dot(to) < -0.999_999 {
        // pick any vector not parallel to `from` to span the turn plane
        let helper = if from.x.abs() < 0.9 {
            Vec3::unit_x()
        } else {
            Vec3::unit_y()
        };
        let plane = from.wedge(helper).normalized();
        Rotor3::from_angle_plane(PI, plane)
    } else {
        Rotor3::from_rotation_between(from, to)
    }
}

/// Normalized linear interpolation between rotors,
/// taking the shorter path around.
pub fn rotor_nlerp(a: Rotor3, b: Rotor3, t: f32) -> Rotor3 {
    let dot = a.s * b.s + a.bv.xy * b.bv.xy + a.bv.xz * b.bv.xz + a.bv.yz * b.bv.yz;
    let sign = if dot < 0.0 { -1.0 } else { 1.0 };
    let s = a.s + (sign * b.s - a.s) * t;
    let bv = Bivec3::new(
        a.bv.xy + (sign * b.bv.xy - a.bv.xy) * t,
        a.bv.xz + (sign * b.bv.xz - a.bv.xz) * t,
        a.bv.yz + (sign * b.bv.yz - a.bv.yz) * t,
    );
    let mag_sq = s * s + bv.xy * bv.xy + bv.xz * bv.xz + bv.yz * bv.yz;
    if mag_sq <= f32::EPSILON {
        return Rotor3::identity();
    }
    let inv_mag = mag_sq.sqrt().recip();
    Rotor3::new(s * inv_mag, bv * inv_mag)
}

/// The absolute rotation angle of a rotor, in [0, pi].
#[inline]
pub fn rotor_angle(r: Rotor3) -> f32 {
    2.0 * r.s.abs().clamp(0.0, 1.0).acos()
}

/// A fraction of a rotor's rotation, e.g. `rotor_fraction(r, 0.5)` rotates
/// half as far around the same plane.
pub fn rotor_fraction(r: Rotor3, t: f32) -> Rotor3 {
    let shortest = if r.s < 0.0 {
        Rotor3::new(-r.s, -r.bv)
    } else {
        r
    };
    rotor_nlerp(Rotor3::identity(), shortest, t)
}

/// Interpolate between two poses, nlerping the rotation.
pub fn pose_lerp(a: Pose, b: Pose, t: f32) -> Pose {
    Pose::new(
        lerp(a.translation, b.translation, t),
        rotor_nlerp(a.rotation, b.rotation, t),
    )
}
