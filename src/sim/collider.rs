//! Capsule/sphere collision volumes consumed during constraint relaxation.

use crate::math as m;

use thunderdome as td;

/// Key type to look up a collider stored in a [`Rig`][super::Rig].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColliderKey(pub(crate) td::Index);

impl ColliderKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of
    /// this key, e.g. for building your own collider-to-entity mappings.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// The physical shape of a collider.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum ColliderShape {
    Sphere {
        radius: f32,
    },
    /// A capsule along the pose's local Y axis. `tail_radius` lets the
    /// far end taper (or flare) relative to the near end.
    Capsule {
        height: f32,
        radius: f32,
        tail_radius: f32,
    },
}

impl ColliderShape {
    #[inline]
    pub fn max_radius(&self) -> f32 {
        match *self {
            ColliderShape::Sphere { radius } => radius,
            ColliderShape::Capsule {
                radius,
                tail_radius,
                ..
            } => radius.max(tail_radius),
        }
    }
}

/// Which side of a quad surface the collider acts on
/// in the surface collision pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum SurfacePolarity {
    #[default]
    TwoSided,
    /// Only act from the surface's front side.
    Push,
    /// Only act from the surface's back side.
    Pull,
}

/// Working geometry of a collider, sampled once per substep by sweeping
/// between the previous and current pose.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Swept {
    pub p0: m::Vec3,
    pub p1: m::Vec3,
    pub r0: f32,
    pub r1: f32,
    pub aabb: Aabb,
}

impl Default for Swept {
    fn default() -> Self {
        Self {
            p0: m::Vec3::zero(),
            p1: m::Vec3::zero(),
            r0: 0.0,
            r1: 0.0,
            aabb: Aabb::point(m::Vec3::zero()),
        }
    }
}

impl Swept {
    /// Radius at parameter `t` along the core segment.
    #[inline]
    pub fn radius_at(&self, t: f32) -> f32 {
        self.r0 + (self.r1 - self.r0) * t
    }
}

/// A sphere or capsule volume that simulated points are pushed out of.
///
/// The host owns its motion: call [`set_pose`][Self::set_pose] once per
/// frame and the solver interpolates across substeps.
#[derive(Clone, Copy, Debug)]
pub struct Collider {
    pub shape: ColliderShape,
    /// Friction coefficient imparted to points this collider contacts.
    pub friction: f32,
    pub enabled: bool,
    pub polarity: SurfacePolarity,
    pose: m::Pose,
    prev_pose: m::Pose,
    pub(crate) swept: Swept,
}

impl Collider {
    pub fn new_sphere(radius: f32) -> Self {
        Self::with_shape(ColliderShape::Sphere { radius })
    }

    pub fn new_capsule(height: f32, radius: f32) -> Self {
        Self::with_shape(ColliderShape::Capsule {
            height,
            radius,
            tail_radius: radius,
        })
    }

    fn with_shape(shape: ColliderShape) -> Self {
        Self {
            shape,
            friction: 0.3,
            enabled: true,
            polarity: SurfacePolarity::default(),
            pose: m::Pose::identity(),
            prev_pose: m::Pose::identity(),
            swept: Swept::default(),
        }
    }

    pub fn with_tail_radius(mut self, tail_radius: f32) -> Self {
        if let ColliderShape::Capsule {
            tail_radius: ref mut t,
            ..
        } = self.shape
        {
            *t = tail_radius;
        }
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_polarity(mut self, polarity: SurfacePolarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn at(mut self, pose: m::Pose) -> Self {
        self.pose = pose;
        self.prev_pose = pose;
        self
    }

    /// Record this frame's pose; the previous one is kept for swept
    /// interpolation across substeps.
    pub fn set_pose(&mut self, pose: m::Pose) {
        self.prev_pose = self.pose;
        self.pose = pose;
    }

    /// Move without sweeping, e.g. after a teleport.
    pub fn teleport(&mut self, pose: m::Pose) {
        self.prev_pose = pose;
        self.pose = pose;
    }

    #[inline]
    pub fn pose(&self) -> m::Pose {
        self.pose
    }

    /// Degenerate colliders produce no contacts.
    #[inline]
    pub(crate) fn is_degenerate(&self) -> bool {
        let r = self.shape.max_radius();
        !(r.is_finite() && r > f32::EPSILON)
    }

    pub(crate) fn refresh(&mut self, t: f32) {
        let pose = m::pose_lerp(self.prev_pose, self.pose, t);
        let (p0, p1, r0, r1) = match self.shape {
            ColliderShape::Sphere { radius } => {
                (pose.translation, pose.translation, radius, radius)
            }
            ColliderShape::Capsule {
                height,
                radius,
                tail_radius,
            } => {
                let half = pose.rotation * (m::Vec3::unit_y() * (height * 0.5));
                (
                    pose.translation - half,
                    pose.translation + half,
                    radius,
                    tail_radius,
                )
            }
        };
        let aabb = Aabb::point(p0)
            .expanded_to(p1)
            .inflated(r0.max(r1));
        self.swept = Swept {
            p0,
            p1,
            r0,
            r1,
            aabb,
        };
    }
}

/// Axis-aligned bounding box, used to cheaply cull segment/collider pairs.
#[derive(Clone, Copy, Debug)]
pub struct Aabb {
    pub min: m::Vec3,
    pub max: m::Vec3,
}

impl Aabb {
    #[inline]
    pub fn point(p: m::Vec3) -> Self {
        Self { min: p, max: p }
    }

    #[inline]
    pub fn expanded_to(self, p: m::Vec3) -> Self {
        Self {
            min: self.min.min_by_component(p),
            max: self.max.max_by_component(p),
        }
    }

    #[inline]
    pub fn inflated(self, r: f32) -> Self {
        let r = m::Vec3::new(r, r, r);
        Self {
            min: self.min - r,
            max: self.max + r,
        }
    }

    #[inline]
    pub fn contains(&self, p: m::Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Closest point on segment `ab` to point `p`,
/// returned with its parameter along the segment.
pub(crate) fn closest_on_segment(p: m::Vec3, a: m::Vec3, b: m::Vec3) -> (m::Vec3, f32) {
    let ab = b - a;
    let len_sq = ab.mag_sq();
    if len_sq <= f32::EPSILON {
        return (a, 0.0);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

/// Parameters of the closest point pair between segments `a0a1` and `b0b1`.
pub(crate) fn closest_segment_segment(
    a0: m::Vec3,
    a1: m::Vec3,
    b0: m::Vec3,
    b1: m::Vec3,
) -> (f32, f32) {
    let d1 = a1 - a0;
    let d2 = b1 - b0;
    let r = a0 - b0;
    let len1_sq = d1.mag_sq();
    let len2_sq = d2.mag_sq();
    let proj2 = d2.dot(r);

    if len1_sq <= f32::EPSILON && len2_sq <= f32::EPSILON {
        return (0.0, 0.0);
    }
    if len1_sq <= f32::EPSILON {
        return (0.0, (proj2 / len2_sq).clamp(0.0, 1.0));
    }
    let proj1 = d1.dot(r);
    if len2_sq <= f32::EPSILON {
        return ((-proj1 / len1_sq).clamp(0.0, 1.0), 0.0);
    }

    let along = d1.dot(d2);
    let denom = len1_sq * len2_sq - along * along;
    let mut s = if denom > f32::EPSILON {
        ((along * proj2 - proj1 * len2_sq) / denom).clamp(0.0, 1.0)
    } else {
        // parallel segments
        0.0
    };
    let mut t = (along * s + proj2) / len2_sq;
    if t < 0.0 {
        t = 0.0;
        s = (-proj1 / len1_sq).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((along - proj1) / len1_sq).clamp(0.0, 1.0);
    }
    (s, t)
}

/// Manager struct holding the colliders of a rig.
#[derive(Default)]
pub struct ColliderSet {
    colliders: td::Arena<Collider>,
}

impl ColliderSet {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, collider: Collider) -> ColliderKey {
        ColliderKey(self.colliders.insert(collider))
    }

    /// Access a collider, if it still exists.
    #[inline]
    pub fn get(&self, key: ColliderKey) -> Option<&Collider> {
        self.colliders.get(key.0)
    }

    /// Mutably access a collider, if it still exists.
    #[inline]
    pub fn get_mut(&mut self, key: ColliderKey) -> Option<&mut Collider> {
        self.colliders.get_mut(key.0)
    }

    /// Remove a collider, returning it if it still existed.
    #[inline]
    pub fn remove(&mut self, key: ColliderKey) -> Option<Collider> {
        self.colliders.remove(key.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColliderKey, &Collider)> {
        self.colliders.iter().map(|(idx, c)| (ColliderKey(idx), c))
    }

    /// Sample every collider's swept state at parameter `t` of the frame.
    pub(crate) fn refresh(&mut self, t: f32) {
        for (_, collider) in self.colliders.iter_mut() {
            collider.refresh(t);
        }
    }
}
