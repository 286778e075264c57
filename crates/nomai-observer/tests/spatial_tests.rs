//! Integration tests for the spatial analyzer: scale thresholds, overlap
//! pairing and viewpoint handling against live worlds.

use nomai_observer::prelude::*;
use nomai_scene::prelude::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn boxed(world: &mut SceneWorld, name: &str, x: f32) -> NodeId {
    let id = world.spawn(NodeSpec::new(name).with_position(Vec3::new(x, 0.0, 0.0)));
    world.add_component(id, Collider::cuboid(Vec3::splat(2.0))).unwrap();
    id
}

fn overlap_paths(issue: &SpatialIssue) -> (String, String) {
    match issue {
        SpatialIssue::ColliderOverlap {
            object1_path,
            object2_path,
            ..
        } => (object1_path.clone(), object2_path.clone()),
        other => panic!("expected an overlap, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Scale anomalies
// ---------------------------------------------------------------------------

#[test]
fn tiny_scale_is_reported_once_naming_the_axis() {
    let mut world = SceneWorld::with_builtins("Scale");
    world.spawn(NodeSpec::new("Speck").with_scale(Vec3::splat(0.001)));
    world.spawn(NodeSpec::new("Normal"));

    let issues = find_scale_anomalies(&world, 0.01, 100.0);
    assert_eq!(issues.len(), 1);
    match &issues[0] {
        SpatialIssue::ScaleAnomaly {
            object_path,
            scale,
            reason,
        } => {
            assert_eq!(object_path, "Speck");
            assert_eq!(*scale, [0.001, 0.001, 0.001]);
            assert!(reason.contains('X'), "reason was {reason}");
        }
        other => panic!("unexpected issue {other:?}"),
    }
}

#[test]
fn thresholds_themselves_are_not_anomalies() {
    let mut world = SceneWorld::with_builtins("Scale");
    world.spawn(NodeSpec::new("AtMin").with_scale(Vec3::splat(0.01)));
    world.spawn(NodeSpec::new("AtMax").with_scale(Vec3::splat(100.0)));
    world.spawn(NodeSpec::new("Mirrored").with_scale(Vec3::new(-1.0, 1.0, 1.0)));
    assert!(find_scale_anomalies(&world, 0.01, 100.0).is_empty());
}

#[test]
fn inactive_subtrees_are_ignored() {
    let mut world = SceneWorld::with_builtins("Scale");
    let parent = world.spawn(NodeSpec::new("Disabled").inactive());
    world
        .spawn_child(parent, NodeSpec::new("Huge").with_scale(Vec3::splat(500.0)))
        .unwrap();
    assert!(find_scale_anomalies(&world, 0.01, 100.0).is_empty());
}

proptest! {
    #[test]
    fn anomaly_iff_strictly_outside_range(s in 0.0001f32..1000.0) {
        let mut world = SceneWorld::with_builtins("Scale");
        world.spawn(NodeSpec::new("Probe").with_scale(Vec3::new(1.0, s, 1.0)));
        let flagged = !find_scale_anomalies(&world, 0.01, 100.0).is_empty();
        prop_assert_eq!(flagged, s < 0.01 || s > 100.0);
    }
}

// ---------------------------------------------------------------------------
// Collider overlaps
// ---------------------------------------------------------------------------

#[test]
fn overlapping_pair_reports_penetration_and_types() {
    let mut world = SceneWorld::with_builtins("Overlap");
    boxed(&mut world, "A", 0.0);
    let b = world.spawn(NodeSpec::new("B").with_position(Vec3::new(1.5, 0.0, 0.0)));
    world.add_component(b, Collider::sphere(1.0)).unwrap();

    let issues = find_collider_overlaps(&world, false);
    assert_eq!(issues.len(), 1);
    match &issues[0] {
        SpatialIssue::ColliderOverlap {
            object1_path,
            object2_path,
            collider_type1,
            collider_type2,
            penetration_depth,
        } => {
            assert_eq!((object1_path.as_str(), object2_path.as_str()), ("A", "B"));
            assert_eq!(collider_type1, "BoxCollider");
            assert_eq!(collider_type2, "SphereCollider");
            assert!((penetration_depth - 0.5).abs() < 1e-5);
        }
        other => panic!("unexpected issue {other:?}"),
    }
}

#[test]
fn triggers_only_count_when_included() {
    let mut world = SceneWorld::with_builtins("Overlap");
    boxed(&mut world, "Wall", 0.0);
    let zone = world.spawn(NodeSpec::new("Zone"));
    world
        .add_component(zone, Collider::cuboid(Vec3::splat(4.0)).trigger())
        .unwrap();

    assert!(find_collider_overlaps(&world, false).is_empty());
    assert_eq!(find_collider_overlaps(&world, true).len(), 1);
}

#[test]
fn colliders_on_one_node_never_overlap_themselves() {
    let mut world = SceneWorld::with_builtins("Overlap");
    let id = boxed(&mut world, "Compound", 0.0);
    world.add_component(id, Collider::sphere(0.5)).unwrap();
    assert!(find_collider_overlaps(&world, false).is_empty());
}

proptest! {
    /// Spawn order never changes how many times a pair is reported, even
    /// when both nodes carry several colliders.
    #[test]
    fn each_overlapping_pair_is_reported_exactly_once(
        order in Just(vec![("A", 0.0f32), ("B", 1.0), ("Far", 50.0), ("Farther", 100.0)]).prop_shuffle(),
        extra in any::<bool>(),
    ) {
        let mut world = SceneWorld::with_builtins("Shuffled");
        for (name, x) in &order {
            let id = boxed(&mut world, name, *x);
            if extra {
                world.add_component(id, Collider::sphere(0.75)).unwrap();
            }
        }

        let issues = find_collider_overlaps(&world, false);
        prop_assert_eq!(issues.len(), 1);
        let (first, second) = overlap_paths(&issues[0]);
        let mut pair = [first, second];
        pair.sort();
        prop_assert_eq!(pair, ["A".to_owned(), "B".to_owned()]);
    }
}

// ---------------------------------------------------------------------------
// Viewpoint
// ---------------------------------------------------------------------------

#[test]
fn off_screen_reasons_from_main_camera() {
    let mut world = SceneWorld::with_builtins("View");
    let cam = world.spawn(NodeSpec::new("Main Camera").with_tag(MAIN_CAMERA_TAG));
    world.add_component(cam, Camera::default()).unwrap();
    world.spawn(NodeSpec::new("Ahead").with_position(Vec3::new(0.0, 0.0, 10.0)));
    world.spawn(NodeSpec::new("Behind").with_position(Vec3::new(0.0, 0.0, -10.0)));
    world.spawn(NodeSpec::new("Beyond").with_position(Vec3::new(0.0, 0.0, 5000.0)));
    world.spawn(NodeSpec::new("Aside").with_position(Vec3::new(100.0, 0.0, 10.0)));

    let report = SpatialAnalyzer::new(SpatialConfig::default())
        .analyze_world(&world)
        .unwrap();
    let viewpoint = report.viewpoint.as_ref().unwrap();
    assert_eq!(viewpoint.camera_path.as_deref(), Some("Main Camera"));

    let reasons: Vec<(&str, &str)> = report
        .issues
        .iter()
        .filter_map(|i| match i {
            SpatialIssue::OffScreenObject {
                object_path, reason, ..
            } => Some((object_path.as_str(), reason.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(report.off_screen_count, 3);
    assert!(reasons.iter().any(|(p, r)| *p == "Behind" && r.starts_with("behind")));
    assert!(reasons.iter().any(|(p, r)| *p == "Beyond" && r.starts_with("beyond far")));
    assert!(reasons.iter().any(|(p, r)| *p == "Aside" && r.starts_with("outside")));
}

#[test]
fn no_camera_skips_visibility_only() {
    let mut world = SceneWorld::with_builtins("Dark");
    world.spawn(NodeSpec::new("Speck").with_scale(Vec3::splat(0.001)));

    let report = SpatialAnalyzer::new(SpatialConfig::default())
        .analyze_world(&world)
        .unwrap();
    assert!(report.viewpoint.is_none());
    assert_eq!(report.off_screen_count, 0);
    assert_eq!(report.scale_anomaly_count, 1);
}

#[test]
fn inverted_scale_range_is_an_error() {
    let config = SpatialConfig {
        min_scale: 10.0,
        max_scale: 1.0,
        ..SpatialConfig::default()
    };
    let world = SceneWorld::with_builtins("Any");
    assert!(SpatialAnalyzer::new(config).analyze_world(&world).is_err());
}
