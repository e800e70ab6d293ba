//! Iterative constraint relaxation with embedded collision pushout.
//!
//! Constraints are processed group by group; the group partition guarantees
//! that no two constraints in a group share an endpoint, so endpoint writes
//! within a group are unordered and, with the `parallel` feature, run on
//! multiple threads.

// this module touches nearly everything in super
use super::*;

use super::collider::{closest_on_segment, closest_segment_segment, Aabb};
use super::point::PointParams;
use itertools::izip;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Raw view of the mutable point state written during a relax pass.
///
/// SAFETY: all access goes through point indices validated at build time,
/// and within one group no two constraints share an index, so concurrent
/// writes never alias.
struct RelaxView {
    position: *mut m::Vec3,
    push_out: *mut m::Vec3,
    friction: *mut f32,
}

unsafe impl Sync for RelaxView {}

impl RelaxView {
    #[allow(clippy::mut_from_ref)]
    unsafe fn position(&self, i: usize) -> &mut m::Vec3 {
        &mut *self.position.add(i)
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn push_out(&self, i: usize) -> &mut m::Vec3 {
        &mut *self.push_out.add(i)
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn friction(&self, i: usize) -> &mut f32 {
        &mut *self.friction.add(i)
    }
}

/// One full pass over the constraint network.
///
/// Collision work runs on every other pass only; each collision-enabled
/// pass first snaps already-penetrating points out of the colliders, then
/// resolves segment contacts per constraint.
pub(crate) fn relax_pass(
    points: &mut PointSet,
    constraints: &ConstraintSet,
    colliders: &ColliderSet,
    cfg: &RigParams,
    pass: usize,
) {
    let collide = cfg.collision && pass % 2 == 0;
    if collide {
        pushout_points(points, colliders);
    }

    let PointSet {
        params,
        position,
        push_out,
        friction,
        ..
    } = points;
    let params: &[PointParams] = params;
    let view = RelaxView {
        position: position.as_mut_ptr(),
        push_out: push_out.as_mut_ptr(),
        friction: friction.as_mut_ptr(),
    };

    for group in constraints.groups() {
        #[cfg(feature = "parallel")]
        group
            .par_iter()
            .for_each(|c| relax_one(c, params, &view, colliders, cfg, collide));
        #[cfg(not(feature = "parallel"))]
        for c in group {
            relax_one(c, params, &view, colliders, cfg, collide);
        }
    }
}

fn relax_one(
    constraint: &Constraint,
    params: &[PointParams],
    view: &RelaxView,
    colliders: &ColliderSet,
    cfg: &RigParams,
    collide: bool,
) {
    let pa = &params[constraint.a];
    let pb = &params[constraint.b];
    if pa.is_pinned() && pb.is_pinned() {
        return;
    }

    if cfg.families.enabled(constraint.kind) {
        // SAFETY: endpoints are distinct, in range, and not written by any
        // other constraint of this group
        let (a, b) = unsafe { (view.position(constraint.a), view.position(constraint.b)) };

        let offset = *b - *a;
        let dist = offset.mag();
        // coincident endpoints have no direction to correct along
        if dist > f32::EPSILON {
            let shrink_limit = constraint.rest_length;
            let stretch_limit = if constraint.kind.has_slack() {
                constraint.rest_length + pa.slider_length + pb.slider_length
            } else {
                shrink_limit
            };
            let force = if dist > stretch_limit {
                dist - stretch_limit
            } else if dist < shrink_limit {
                dist - shrink_limit
            } else {
                0.0
            };

            if force != 0.0 {
                let (stiff_a, stiff_b) = (
                    pa.stiffness.pair(constraint.kind),
                    pb.stiffness.pair(constraint.kind),
                );
                // shrink stiffness resists over-extension, stretch resists
                // compression
                let stiffness = if force >= 0.0 {
                    0.5 * (stiff_a.shrink + stiff_b.shrink)
                } else {
                    0.5 * (stiff_a.stretch + stiff_b.stretch)
                };
                let weight_sum = pa.pin_weight + pb.pin_weight;
                if stiffness > 0.0 && weight_sum > f32::EPSILON {
                    let correction = offset * (force * stiffness / dist);
                    *a += correction * (pa.pin_weight / weight_sum);
                    *b -= correction * (pb.pin_weight / weight_sum);
                }
            }
        }
    }

    if collide && constraint.collision {
        collide_segment(constraint, pa, pb, view, colliders);
    }
}

/// Resolve the segment between a constraint's endpoints against every
/// enabled collider. Half of each correction is applied in place, the other
/// half accumulates into the push-out force consumed by the next
/// integration, so collision response never acts like an infinitely stiff
/// wall.
fn collide_segment(
    constraint: &Constraint,
    pa: &PointParams,
    pb: &PointParams,
    view: &RelaxView,
    colliders: &ColliderSet,
) {
    // SAFETY: as in relax_one; friction/push_out use the same indices
    let (a, b) = unsafe { (view.position(constraint.a), view.position(constraint.b)) };

    for (_, coll) in colliders.iter() {
        if !coll.enabled || coll.is_degenerate() {
            continue;
        }
        let swept = &coll.swept;
        let seg_aabb = Aabb::point(*a).expanded_to(*b);
        if !seg_aabb.overlaps(&swept.aabb) {
            continue;
        }

        let (s, t) = closest_segment_segment(*a, *b, swept.p0, swept.p1);
        let on_segment = *a + (*b - *a) * s;
        let on_core = swept.p0 + (swept.p1 - swept.p0) * t;
        let radius = swept.radius_at(t);
        let delta = on_segment - on_core;
        let dist = delta.mag();
        if dist <= f32::EPSILON || dist >= radius {
            continue;
        }

        let normal = delta / dist;
        let correction = normal * ((radius - dist) * 0.5);
        let seg = *b - *a;
        let seg_mag = seg.mag();
        let face_on = if seg_mag > f32::EPSILON {
            1.0 - (normal.dot(seg / seg_mag)).abs()
        } else {
            1.0
        };

        if !pa.is_pinned() {
            let share = 1.0 - s;
            *a += correction * share;
            unsafe {
                *view.push_out(constraint.a) += correction * share;
                let friction = view.friction(constraint.a);
                *friction = friction.max(coll.friction * face_on);
            }
        }
        if !pb.is_pinned() {
            let share = s;
            *b += correction * share;
            unsafe {
                *view.push_out(constraint.b) += correction * share;
                let friction = view.friction(constraint.b);
                *friction = friction.max(coll.friction * face_on);
            }
        }
    }
}

/// Unconditional stay-outside snap: project every free point that is
/// already inside a collider back onto its surface.
fn pushout_points(points: &mut PointSet, colliders: &ColliderSet) {
    let PointSet {
        params, position, ..
    } = points;

    for (param, pos) in izip!(&*params, position) {
        if param.is_pinned() {
            continue;
        }
        for (_, coll) in colliders.iter() {
            if !coll.enabled || coll.is_degenerate() {
                continue;
            }
            let swept = &coll.swept;
            if !swept.aabb.contains(*pos) {
                continue;
            }
            let (core, t) = closest_on_segment(*pos, swept.p0, swept.p1);
            let radius = swept.radius_at(t);
            let delta = *pos - core;
            let dist = delta.mag();
            // a point exactly on the core has no well-defined normal; skip
            if dist > f32::EPSILON && dist < radius {
                *pos = core + delta * (radius / dist);
            }
        }
    }
}
