//! Write-back of resolved positions to bone poses: the animation blend,
//! the angular deviation limiter, and bone-axis rotation reconstruction.

use super::{point::PointSet, RigParams};
use crate::math as m;

pub(crate) fn write_poses(points: &mut PointSet, cfg: &RigParams, alpha: f32) {
    let count = points.len();

    //
    // blend simulated positions toward the animation
    //

    for i in 0..count {
        points.final_position[i] = if points.params[i].is_pinned() {
            points.driven[i].translation
        } else {
            m::lerp(points.position[i], points.driven[i].translation, alpha)
        };
    }

    //
    // angular deviation limiter (hard clamp, parents first so corrections
    // cascade down the chain)
    //

    if let Some(limit) = cfg.angle_limit {
        let max_angle = limit.max_angle.rad();
        for i in 0..count {
            let param = &points.params[i];
            if param.is_pinned() {
                continue;
            }
            let Some(parent) = param.parent else {
                continue;
            };
            let dir = points.final_position[i] - points.final_position[parent];
            let dir_mag = dir.mag();
            if dir_mag <= f32::EPSILON {
                continue;
            }

            let animated = points.driven[i].translation - points.driven[parent].translation;
            let reference = if limit.from_root {
                match points.params[parent].parent {
                    Some(grandparent) => {
                        let live = points.final_position[parent]
                            - points.final_position[grandparent];
                        if live.mag_sq() > f32::EPSILON {
                            live
                        } else {
                            animated
                        }
                    }
                    None => animated,
                }
            } else {
                animated
            };
            let ref_mag = reference.mag();
            if ref_mag <= f32::EPSILON {
                continue;
            }

            let dir_n = dir / dir_mag;
            let ref_n = reference / ref_mag;
            let angle = dir_n.dot(ref_n).clamp(-1.0, 1.0).acos();
            if angle <= max_angle {
                continue;
            }

            let axis = dir_n.cross(ref_n);
            let axis_mag = axis.mag();
            if axis_mag <= f32::EPSILON {
                // exactly opposed directions have no unique arc; leave as is
                continue;
            }
            // rotate back toward the reference by exactly the excess
            let clamped = m::rotate_about_axis(dir, axis / axis_mag, angle - max_angle);
            points.final_position[i] = points.final_position[parent] + clamped;
        }
    }

    //
    // rotation reconstruction: swing the driven orientation so the authored
    // bone axis lines up with the live direction toward the child
    //

    for i in 0..count {
        let param = points.params[i];
        let driven_rotation = points.driven[i].rotation;
        if param.is_pinned() {
            points.final_rotation[i] = driven_rotation;
            continue;
        }
        let Some(child) = param.child else {
            points.final_rotation[i] = driven_rotation;
            continue;
        };

        let mut dir = points.final_position[child] - points.final_position[i];
        if dir.mag_sq() <= f32::EPSILON {
            // degenerate; fall back to the last valid direction
            dir = points.last_direction[i];
        } else {
            points.last_direction[i] = dir;
        }
        if dir.mag_sq() <= f32::EPSILON {
            points.final_rotation[i] = driven_rotation;
            continue;
        }

        let authored_axis = driven_rotation * *param.bone_axis;
        let swing = m::rotor_between(authored_axis, dir.normalized());
        points.final_rotation[i] = (swing * driven_rotation).normalized();
    }
}
