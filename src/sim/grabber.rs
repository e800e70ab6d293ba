//! Grabbers: spheres of influence that attract nearby free points,
//! used for interactive manipulation.

use crate::math as m;

use thunderdome as td;

/// Key type to look up a grabber stored in a [`Rig`][super::Rig].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrabberKey(pub(crate) td::Index);

impl GrabberKey {
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// A sphere of influence. An unheld free point inside the radius captures
/// the nearest enabled grabber and follows its surface at the captured
/// distance until the grabber disables or disappears.
#[derive(Clone, Copy, Debug)]
pub struct Grabber {
    pub radius: f32,
    /// Pull strength in [0, 1].
    pub force: f32,
    pub enabled: bool,
    pose: m::Pose,
    prev_pose: m::Pose,
    /// Swept center for the current substep.
    pub(crate) center: m::Vec3,
}

impl Grabber {
    pub fn new(radius: f32, force: f32) -> Self {
        Self {
            radius,
            force,
            enabled: true,
            pose: m::Pose::identity(),
            prev_pose: m::Pose::identity(),
            center: m::Vec3::zero(),
        }
    }

    pub fn at(mut self, pose: m::Pose) -> Self {
        self.pose = pose;
        self.prev_pose = pose;
        self.center = pose.translation;
        self
    }

    /// Record this frame's pose; the previous one is kept for swept
    /// interpolation across substeps.
    pub fn set_pose(&mut self, pose: m::Pose) {
        self.prev_pose = self.pose;
        self.pose = pose;
    }

    /// Move without sweeping.
    pub fn teleport(&mut self, pose: m::Pose) {
        self.prev_pose = pose;
        self.pose = pose;
    }

    #[inline]
    pub fn pose(&self) -> m::Pose {
        self.pose
    }

    #[inline]
    pub(crate) fn is_degenerate(&self) -> bool {
        !(self.radius.is_finite() && self.radius > f32::EPSILON)
    }

    pub(crate) fn refresh(&mut self, t: f32) {
        self.center = m::lerp(self.prev_pose.translation, self.pose.translation, t);
    }
}

/// Manager struct holding the grabbers of a rig.
#[derive(Default)]
pub struct GrabberSet {
    grabbers: td::Arena<Grabber>,
}

impl GrabberSet {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, grabber: Grabber) -> GrabberKey {
        GrabberKey(self.grabbers.insert(grabber))
    }

    /// Access a grabber, if it still exists.
    #[inline]
    pub fn get(&self, key: GrabberKey) -> Option<&Grabber> {
        self.grabbers.get(key.0)
    }

    /// Mutably access a grabber, if it still exists.
    #[inline]
    pub fn get_mut(&mut self, key: GrabberKey) -> Option<&mut Grabber> {
        self.grabbers.get_mut(key.0)
    }

    /// Remove a grabber, returning it if it still existed.
    /// Points held by it release on the next step.
    #[inline]
    pub fn remove(&mut self, key: GrabberKey) -> Option<Grabber> {
        self.grabbers.remove(key.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.grabbers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.grabbers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GrabberKey, &Grabber)> {
        self.grabbers.iter().map(|(idx, g)| (GrabberKey(idx), g))
    }

    pub(crate) fn refresh(&mut self, t: f32) {
        for (_, grabber) in self.grabbers.iter_mut() {
            grabber.refresh(t);
        }
    }
}
