//! The typed distance-constraint network and its race-free group partition.

use super::{bitset::IndexBits, point::PointParams, BuildError};

use std::ops::Range;

/// The five constraint families.
///
/// Vertical families run along the point hierarchy, horizontal families
/// across sibling chains; shear links run diagonally and bending links skip
/// one level to resist folding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum ConstraintKind {
    StructuralVertical,
    StructuralHorizontal,
    Shear,
    BendingVertical,
    BendingHorizontal,
}

impl ConstraintKind {
    pub const ALL: [Self; 5] = [
        Self::StructuralVertical,
        Self::StructuralHorizontal,
        Self::Shear,
        Self::BendingVertical,
        Self::BendingHorizontal,
    ];

    /// Whether the family gets slider slack added to its stretch limit.
    /// This is the woven/crossed direction of the network, where a bit of
    /// deliberate give keeps cloth-like sheets from locking up.
    #[inline]
    pub(crate) fn has_slack(self) -> bool {
        matches!(
            self,
            Self::StructuralHorizontal | Self::Shear | Self::BendingHorizontal
        )
    }
}

/// Authored constraint input: a typed point pair with its precomputed rest
/// length.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ConstraintSeed {
    pub kind: ConstraintKind,
    pub a: usize,
    pub b: usize,
    pub rest_length: f32,
    /// Whether this link's segment takes part in collider pushout.
    pub collision: bool,
}

impl ConstraintSeed {
    pub fn new(kind: ConstraintKind, a: usize, b: usize, rest_length: f32) -> Self {
        Self {
            kind,
            a,
            b,
            rest_length,
            collision: true,
        }
    }

    pub fn without_collision(mut self) -> Self {
        self.collision = false;
        self
    }
}

/// A validated constraint as stored in the partitioned set.
#[derive(Clone, Copy, Debug)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub a: usize,
    pub b: usize,
    pub rest_length: f32,
    pub collision: bool,
}

/// The full constraint network, stored grouped: constraints are reordered so
/// that each group is a contiguous slice, and no two constraints within a
/// group reference a common point index. Groups are therefore mutually safe
/// for unordered (or parallel) endpoint writes.
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
    groups: Vec<Range<usize>>,
}

impl ConstraintSet {
    /// Validate seeds and partition them with the greedy rule: a constraint
    /// joins the first group where neither of its endpoints already appears,
    /// otherwise a new group opens.
    ///
    /// Collision flags are suppressed where both endpoints are pinned.
    pub(crate) fn build(
        seeds: Vec<ConstraintSeed>,
        points: &[PointParams],
    ) -> Result<Self, BuildError> {
        let count = points.len();
        for seed in &seeds {
            for index in [seed.a, seed.b] {
                if index >= count {
                    return Err(BuildError::PointOutOfRange { index, count });
                }
            }
            if seed.a == seed.b {
                return Err(BuildError::SelfLink { index: seed.a });
            }
        }

        let mut members: Vec<Vec<Constraint>> = Vec::new();
        let mut touched: Vec<IndexBits> = Vec::new();
        for seed in seeds {
            let both_pinned = points[seed.a].is_pinned() && points[seed.b].is_pinned();
            let constraint = Constraint {
                kind: seed.kind,
                a: seed.a,
                b: seed.b,
                rest_length: seed.rest_length,
                collision: seed.collision && !both_pinned,
            };
            let group = touched
                .iter()
                .position(|bits| !bits.has(seed.a) && !bits.has(seed.b));
            let group = match group {
                Some(group) => group,
                None => {
                    members.push(Vec::new());
                    touched.push(IndexBits::with_capacity(count));
                    members.len() - 1
                }
            };
            touched[group].set(seed.a);
            touched[group].set(seed.b);
            members[group].push(constraint);
        }

        let mut constraints = Vec::with_capacity(members.iter().map(Vec::len).sum());
        let mut groups = Vec::with_capacity(members.len());
        for group in members {
            let start = constraints.len();
            constraints.extend(group);
            groups.push(start..constraints.len());
        }
        log::debug!(
            "partitioned {} constraints into {} groups",
            constraints.len(),
            groups.len()
        );

        Ok(Self {
            constraints,
            groups,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    #[inline]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    #[inline]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> impl Iterator<Item = &[Constraint]> {
        self.groups
            .iter()
            .map(move |range| &self.constraints[range.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math as m;

    fn chain_points(count: usize) -> Vec<PointParams> {
        (0..count)
            .map(|_| PointParams::new(m::Pose::identity()))
            .collect()
    }

    fn seeds_from_pairs(pairs: &[(usize, usize)]) -> Vec<ConstraintSeed> {
        pairs
            .iter()
            .map(|&(a, b)| ConstraintSeed::new(ConstraintKind::StructuralVertical, a, b, 1.0))
            .collect()
    }

    #[test]
    fn chain_partitions_into_two_groups() {
        // consecutive links of a chain conflict pairwise,
        // so a path graph colors into alternating groups
        let set = ConstraintSet::build(
            seeds_from_pairs(&[(0, 1), (1, 2), (2, 3), (3, 4)]),
            &chain_points(5),
        )
        .unwrap();
        assert_eq!(set.group_count(), 2);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn groups_never_share_an_endpoint() {
        let set = ConstraintSet::build(
            seeds_from_pairs(&[(0, 1), (1, 2), (0, 2), (2, 3), (3, 0), (1, 3)]),
            &chain_points(4),
        )
        .unwrap();
        for group in set.groups() {
            let mut seen = Vec::new();
            for constraint in group {
                assert!(!seen.contains(&constraint.a));
                assert!(!seen.contains(&constraint.b));
                seen.push(constraint.a);
                seen.push(constraint.b);
            }
        }
    }

    #[test]
    fn self_link_is_rejected() {
        let result = ConstraintSet::build(seeds_from_pairs(&[(1, 1)]), &chain_points(3));
        assert!(matches!(result, Err(BuildError::SelfLink { index: 1 })));
    }

    #[test]
    fn out_of_range_endpoint_is_rejected() {
        let result = ConstraintSet::build(seeds_from_pairs(&[(0, 7)]), &chain_points(3));
        assert!(matches!(
            result,
            Err(BuildError::PointOutOfRange { index: 7, count: 3 })
        ));
    }

    #[test]
    fn collision_suppressed_when_both_endpoints_pinned() {
        let points = vec![
            PointParams::new(m::Pose::identity()).pinned(),
            PointParams::new(m::Pose::identity()).pinned(),
            PointParams::new(m::Pose::identity()),
        ];
        let set = ConstraintSet::build(seeds_from_pairs(&[(0, 1), (1, 2)]), &points).unwrap();
        let constraints = set.constraints();
        let pinned_pair = constraints.iter().find(|c| c.a == 0).unwrap();
        let mixed_pair = constraints.iter().find(|c| c.a == 1).unwrap();
        assert!(!pinned_pair.collision);
        assert!(mixed_pair.collision);
    }
}
