//! Surface-level collision for thin cloth-like sheets,
//! keeping whole quads (not just per-edge segments) outside the colliders.

use super::{
    collider::{closest_on_segment, ColliderSet, SurfacePolarity},
    point::PointSet,
};
use crate::math as m;

/// Four point indices forming a quad of the simulated sheet.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct SurfaceFace {
    pub points: [usize; 4],
}

impl SurfaceFace {
    pub fn new(points: [usize; 4]) -> Self {
        Self { points }
    }
}

pub(crate) fn collide_surfaces(
    points: &mut PointSet,
    faces: &[SurfaceFace],
    colliders: &ColliderSet,
) {
    for face in faces {
        for tri in [[0, 1, 2], [0, 2, 3]] {
            let idx = [
                face.points[tri[0]],
                face.points[tri[1]],
                face.points[tri[2]],
            ];
            collide_triangle(points, idx, colliders);
        }
    }
}

fn collide_triangle(points: &mut PointSet, idx: [usize; 3], colliders: &ColliderSet) {
    let corners = [
        points.position[idx[0]],
        points.position[idx[1]],
        points.position[idx[2]],
    ];
    let normal = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
    let normal_mag = normal.mag();
    if normal_mag <= f32::EPSILON {
        return;
    }
    let normal = normal / normal_mag;
    let centroid = (corners[0] + corners[1] + corners[2]) / 3.0;

    for (_, coll) in colliders.iter() {
        if !coll.enabled || coll.is_degenerate() {
            continue;
        }
        let swept = &coll.swept;

        // cast from the collider core along the triangle normal
        let (origin, t) = closest_on_segment(centroid, swept.p0, swept.p1);
        let radius = swept.radius_at(t);
        let height = (origin - corners[0]).dot(normal);
        match coll.polarity {
            SurfacePolarity::TwoSided => {}
            SurfacePolarity::Push if height <= 0.0 => continue,
            SurfacePolarity::Pull if height >= 0.0 => continue,
            _ => {}
        }
        if height.abs() >= radius {
            continue;
        }

        let hit = origin - normal * height;
        if !triangle_contains(&corners, normal, hit) {
            continue;
        }

        let depth = radius - height.abs();
        let dists = [
            (corners[0] - centroid).mag(),
            (corners[1] - centroid).mag(),
            (corners[2] - centroid).mag(),
        ];
        let dist_sum: f32 = dists.iter().sum();
        if dist_sum <= f32::EPSILON {
            continue;
        }

        for (corner, (&index, &dist)) in corners.iter().zip(idx.iter().zip(dists.iter())) {
            if points.params[index].is_pinned() {
                continue;
            }
            let away = *corner - hit;
            let away_mag = away.mag();
            if away_mag <= f32::EPSILON {
                continue;
            }
            points.position[index] += away * (depth * (dist / dist_sum) / away_mag);
        }
    }
}

/// Sign-consistent cross-product containment test for a point already on
/// the triangle's plane.
fn triangle_contains(corners: &[m::Vec3; 3], normal: m::Vec3, p: m::Vec3) -> bool {
    for (a, b) in [
        (corners[0], corners[1]),
        (corners[1], corners[2]),
        (corners[2], corners[0]),
    ] {
        if (b - a).cross(p - a).dot(normal) < -f32::EPSILON {
            return false;
        }
    }
    true
}
