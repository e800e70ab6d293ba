//! Grabbers, entrainment, movable limits, blending and step refusal.

use swingbone::{
    uv, Grabber, Pose, PointParams, Rig, RigParams, Rotor3, StepContext, StepError, Vec3,
};

const DT: f32 = 1.0 / 60.0;

fn pose_at(position: Vec3) -> Pose {
    Pose::new(position, Rotor3::identity())
}

fn free_point_rig(start: Vec3) -> Rig {
    let points = vec![PointParams::new(pose_at(start))
        .with_gravity(Vec3::zero())
        .with_resistance(0.0)];
    Rig::new(points, Vec::new(), Vec::new(), RigParams::default()).unwrap()
}

#[test]
fn grabber_captures_and_holds_at_distance() {
    let start = Vec3::zero();
    let mut rig = free_point_rig(start);
    let key = rig
        .grabbers
        .insert(Grabber::new(1.0, 1.0).at(pose_at(Vec3::new(0.5, 0.0, 0.0))));
    let driven = [pose_at(start)];

    rig.step(&StepContext::new(DT, &driven)).unwrap();
    let hold = rig.points().hold(0).expect("point should be captured");
    assert!((hold.distance - 0.5).abs() < 1e-5);

    // drag the grabber away; the point follows at the captured distance
    rig.grabbers
        .get_mut(key)
        .unwrap()
        .teleport(pose_at(Vec3::new(4.0, 2.0, 0.0)));
    for _ in 0..30 {
        rig.step(&StepContext::new(DT, &driven)).unwrap();
        let dist = (rig.final_positions()[0] - Vec3::new(4.0, 2.0, 0.0)).mag();
        assert!(
            (dist - 0.5).abs() < 1e-3,
            "held point should ride the grabber surface, distance {}",
            dist
        );
    }

    // disabling the grabber releases the point
    rig.grabbers.get_mut(key).unwrap().enabled = false;
    rig.step(&StepContext::new(DT, &driven)).unwrap();
    assert!(rig.points().hold(0).is_none());
}

#[test]
fn root_slide_limit_makes_points_lag_and_warp_bypasses_it() {
    let start = Vec3::zero();
    let points = vec![PointParams::new(pose_at(start))
        .with_gravity(Vec3::zero())
        .with_resistance(0.0)];
    let params = RigParams {
        root_slide_limit: Some(0.1),
        ..RigParams::default()
    };
    let driven = [pose_at(start)];

    let jump = Vec3::new(10.0, 0.0, 0.0);
    let moved_root = uv::Similarity3::new(jump, Rotor3::identity(), 1.0);

    // clamped: only the slide limit's worth of root motion is entrained
    let mut rig = Rig::new(points.clone(), Vec::new(), Vec::new(), params).unwrap();
    rig.step(&StepContext::new(DT, &driven)).unwrap();
    rig.step(&StepContext::new(DT, &driven).with_root(moved_root))
        .unwrap();
    let lagged = rig.final_positions()[0];
    assert!(
        (lagged - Vec3::new(0.1, 0.0, 0.0)).mag() < 1e-4,
        "expected the point to lag the teleport, got {:?}",
        lagged
    );

    // warped: the full delta goes through
    let mut rig = Rig::new(points, Vec::new(), Vec::new(), params).unwrap();
    rig.step(&StepContext::new(DT, &driven)).unwrap();
    rig.step(
        &StepContext::new(DT, &driven)
            .with_root(moved_root)
            .with_warp(),
    )
    .unwrap();
    let warped = rig.final_positions()[0];
    assert!(
        (warped - jump).mag() < 1e-4,
        "expected the point to follow the teleport, got {:?}",
        warped
    );
}

#[test]
fn wind_pushes_points_downwind() {
    let start = Vec3::zero();
    let points = vec![PointParams::new(pose_at(start))
        .with_gravity(Vec3::zero())
        .with_resistance(0.0)
        .with_mass(0.5)
        .with_wind_scale(2.0)];
    let mut rig = Rig::new(points, Vec::new(), Vec::new(), RigParams::default()).unwrap();
    let driven = [pose_at(start)];

    let wind = Vec3::new(1.0, 0.0, 0.0);
    let mut last_x = 0.0;
    for _ in 0..60 {
        rig.step(&StepContext::new(DT, &driven).with_wind(wind))
            .unwrap();
        let p = rig.final_positions()[0];
        assert!(p.x >= last_x, "the point should accelerate downwind");
        assert!(p.y.abs() < 1e-6 && p.z.abs() < 1e-6);
        last_x = p.x;
    }
    assert!(last_x > 0.1, "wind had no visible effect, x = {}", last_x);
}

#[test]
fn movable_limit_tethers_a_point_to_its_anchor() {
    let start = Vec3::zero();
    let points = vec![PointParams::new(pose_at(start))
        .with_gravity(Vec3::new(0.0, -9.8, 0.0))
        .with_resistance(0.0)
        .with_movable_limit(0, 0.5)];
    let mut rig = Rig::new(points, Vec::new(), Vec::new(), RigParams::default()).unwrap();
    let driven = [pose_at(start)];
    let anchors = [Vec3::zero()];

    for _ in 0..300 {
        rig.step(&StepContext::new(DT, &driven).with_anchors(&anchors))
            .unwrap();
        // the clamp runs before the Verlet displacement, so the point can
        // overshoot the radius by at most one substep's worth of motion
        let dist = rig.points().positions()[0].mag();
        assert!(dist <= 0.55, "point escaped its tether: distance {}", dist);
    }
}

#[test]
fn full_blend_follows_the_animation() {
    let start = Vec3::new(0.0, 1.0, 0.0);
    let points = vec![PointParams::new(pose_at(start)).with_resistance(0.0)];
    let mut rig = Rig::new(points.clone(), Vec::new(), Vec::new(), RigParams::default()).unwrap();
    let driven = [pose_at(start)];

    for _ in 0..30 {
        rig.step(&StepContext::new(DT, &driven).with_blend(1.0, 1.0))
            .unwrap();
        // the simulated position falls away, but the output sticks to the pose
        assert!((rig.final_positions()[0] - start).mag() < 1e-5);
    }
    assert!(rig.points().positions()[0].y < start.y - 1e-3);

    // fade of zero shuts the simulation's influence off the same way
    let mut rig = Rig::new(points, Vec::new(), Vec::new(), RigParams::default()).unwrap();
    rig.step(&StepContext::new(DT, &driven).with_blend(0.0, 0.0))
        .unwrap();
    assert!((rig.final_positions()[0] - start).mag() < 1e-5);
}

#[test]
fn step_refuses_bad_input_and_leaves_state_alone() {
    let start = Vec3::new(0.3, 0.0, 0.0);
    let mut rig = free_point_rig(start);
    let driven = [pose_at(start)];

    // wrong driven pose count
    let err = rig.step(&StepContext::new(DT, &[])).unwrap_err();
    assert!(matches!(
        err,
        StepError::DrivenPoseCount {
            expected: 1,
            got: 0
        }
    ));

    // bad timestep
    let err = rig.step(&StepContext::new(0.0, &driven)).unwrap_err();
    assert!(matches!(err, StepError::InvalidTimestep { .. }));

    // missing movable-limit anchor
    let points = vec![PointParams::new(pose_at(start)).with_movable_limit(3, 0.5)];
    let mut tethered = Rig::new(points, Vec::new(), Vec::new(), RigParams::default()).unwrap();
    let err = tethered
        .step(&StepContext::new(DT, &driven))
        .unwrap_err();
    assert!(matches!(
        err,
        StepError::MissingAnchor { index: 3, count: 0 }
    ));

    // the refused steps must not have touched the state
    assert_eq!(rig.final_positions()[0], start);
}
