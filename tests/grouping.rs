//! Property tests for the constraint-group partition: for any input graph,
//! no group may contain two constraints sharing a point index, and the
//! union of the groups must be exactly the input set.

use swingbone::{ConstraintKind, ConstraintSeed, Pose, PointParams, Rig, RigParams};

use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_seeds(rng: &mut StdRng, point_count: usize, constraint_count: usize) -> Vec<ConstraintSeed> {
    (0..constraint_count)
        .map(|i| {
            let a = rng.gen_range(0..point_count);
            let mut b = rng.gen_range(0..point_count);
            while b == a {
                b = rng.gen_range(0..point_count);
            }
            let kind = ConstraintKind::ALL[i % ConstraintKind::ALL.len()];
            ConstraintSeed::new(kind, a, b, rng.gen_range(0.05..2.0))
        })
        .collect()
}

fn build_rig(point_count: usize, seeds: Vec<ConstraintSeed>) -> Rig {
    let points = (0..point_count)
        .map(|_| PointParams::new(Pose::identity()))
        .collect();
    Rig::new(points, seeds, Vec::new(), RigParams::default()).unwrap()
}

#[test]
fn random_graphs_partition_race_free() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..50 {
        let point_count = rng.gen_range(2..60);
        let constraint_count = rng.gen_range(0..200);
        let seeds = random_seeds(&mut rng, point_count, constraint_count);
        let expected: Vec<(usize, usize, u32)> = {
            let mut pairs: Vec<_> = seeds
                .iter()
                .map(|s| (s.a, s.b, s.rest_length.to_bits()))
                .collect();
            pairs.sort_unstable();
            pairs
        };

        let rig = build_rig(point_count, seeds);
        let set = rig.constraints();

        // no two constraints in a group touch a common point
        for group in set.groups() {
            let mut touched = vec![false; point_count];
            for constraint in group {
                assert!(
                    !touched[constraint.a] && !touched[constraint.b],
                    "group shares point between constraints"
                );
                touched[constraint.a] = true;
                touched[constraint.b] = true;
            }
        }

        // the groups are a reordering of the input, nothing lost or invented
        let mut actual: Vec<(usize, usize, u32)> = set
            .constraints()
            .iter()
            .map(|c| (c.a, c.b, c.rest_length.to_bits()))
            .collect();
        actual.sort_unstable();
        assert_eq!(actual, expected);

        let group_sum: usize = set.groups().map(|g| g.len()).sum();
        assert_eq!(group_sum, set.len());
    }
}

#[test]
fn greedy_rule_reuses_the_first_open_group() {
    // (0,1) and (2,3) don't conflict, so they must share group 0;
    // (1,2) conflicts with both of them and opens group 1
    let seeds = vec![
        ConstraintSeed::new(ConstraintKind::StructuralVertical, 0, 1, 1.0),
        ConstraintSeed::new(ConstraintKind::StructuralHorizontal, 2, 3, 1.0),
        ConstraintSeed::new(ConstraintKind::Shear, 1, 2, 1.0),
    ];
    let rig = build_rig(4, seeds);
    let groups: Vec<Vec<(usize, usize)>> = rig
        .constraints()
        .groups()
        .map(|g| g.iter().map(|c| (c.a, c.b)).collect())
        .collect();
    assert_eq!(groups, vec![vec![(0, 1), (2, 3)], vec![(1, 2)]]);
}
