//! Per-point Verlet integration: entrainment of the moving root frame,
//! external forces, damping, hardness pull, grabber resolution and the
//! floor clip.

use super::{
    grabber::GrabberSet,
    point::{GrabberHold, PointSet},
    Plane,
};
use crate::math as m;

use itertools::izip;

/// Inputs shared by every point for one substep.
pub(crate) struct SubstepInputs<'a> {
    pub dt: f32,
    pub wind: m::Vec3,
    /// Entrained root translation for this substep, already clamped.
    pub slide: m::Vec3,
    /// Entrained root rotation for this substep, already clamped.
    pub rotation: m::Rotor3,
    /// Point the entrained rotation pivots around (the root position).
    pub pivot: m::Vec3,
    pub anchors: &'a [m::Vec3],
    pub floor: Option<Plane>,
    pub displacement_limit: Option<f32>,
}

pub(crate) fn integrate(points: &mut PointSet, grabbers: &GrabberSet, inp: &SubstepInputs<'_>) {
    let dt_sq = inp.dt * inp.dt;

    let PointSet {
        params,
        position,
        old_position,
        driven,
        push_out,
        friction,
        hold,
        ..
    } = points;

    for (param, pos, old, driven, push, friction, hold) in izip!(
        params,
        position,
        old_position,
        &*driven,
        push_out,
        friction,
        hold
    ) {
        //
        // pinned points track the driving pose exactly
        //

        if param.is_pinned() {
            *old = *pos;
            *pos = driven.translation;
            *friction = 0.0;
            continue;
        }

        //
        // entrainment: carry free points along with the moving root
        //

        *pos = inp.pivot + inp.rotation * (*pos - inp.pivot) + inp.slide;
        *old = inp.pivot + inp.rotation * (*old - inp.pivot) + inp.slide;

        if let Some(limit) = param.movable_limit {
            let anchor = inp.anchors[limit.anchor];
            let offset = *pos - anchor;
            let dist = offset.mag();
            if dist > limit.radius {
                *pos = anchor + offset * (limit.radius / dist);
            }
        }

        //
        // Verlet displacement
        //

        let accel = param.gravity + inp.wind * (param.wind_scale / param.mass);
        let mut d = (*pos - *old) + accel * (dt_sq * 0.5) + *push;
        d *= 1.0 - param.resistance.clamp(0.0, 1.0);
        d *= 1.0 - (*friction * param.friction_scale).clamp(0.0, 1.0);
        if let Some(limit) = inp.displacement_limit {
            let mag = d.mag();
            if mag > limit {
                log::debug!("clamping runaway displacement ({mag} > {limit})");
                d *= limit / mag;
            }
        }
        *push = m::Vec3::zero();
        *friction = 0.0;

        *old = *pos;
        *pos += d;

        if param.hardness > 0.0 {
            *pos = m::lerp(*pos, driven.translation, param.hardness.clamp(0.0, 1.0));
        }

        //
        // grabber resolution
        //

        match *hold {
            Some(held) => match grabbers.get(held.grabber) {
                Some(grabber) if grabber.enabled && !grabber.is_degenerate() => {
                    let offset = *pos - grabber.center;
                    let dist = offset.mag();
                    if dist > f32::EPSILON {
                        let target = grabber.center + offset * (held.distance / dist);
                        *pos = m::lerp(*pos, target, grabber.force.clamp(0.0, 1.0));
                    }
                }
                _ => *hold = None,
            },
            None => {
                let mut nearest: Option<(GrabberHold, f32)> = None;
                for (key, grabber) in grabbers.iter() {
                    if !grabber.enabled || grabber.is_degenerate() {
                        continue;
                    }
                    let dist_sq = (*pos - grabber.center).mag_sq();
                    if dist_sq > grabber.radius * grabber.radius {
                        continue;
                    }
                    if nearest.map_or(true, |(_, best)| dist_sq < best) {
                        nearest = Some((
                            GrabberHold {
                                grabber: key,
                                distance: dist_sq.sqrt(),
                            },
                            dist_sq,
                        ));
                    }
                }
                if let Some((capture, _)) = nearest {
                    *hold = Some(capture);
                }
            }
        }

        //
        // floor clip
        //

        if let Some(plane) = inp.floor {
            let depth = pos.dot(*plane.normal) - plane.offset;
            if depth < 0.0 {
                *pos -= *plane.normal * depth;
                *friction = friction.max(plane.friction);
            }
        }
    }
}
