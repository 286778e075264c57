//! Integration tests for the validation engine: rule toggling, severity
//! accounting, failure isolation and the built-in rules on captured worlds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nomai_capture::prelude::*;
use nomai_observer::prelude::*;
use nomai_observer::validation::{
    RULE_DUPLICATE_SIBLING_NAME, RULE_INTERACTION_LAYER_COLLIDER, RULE_SINGLE_INPUT_ROUTER,
};
use nomai_scene::prelude::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn captured(world: &SceneWorld) -> Vec<SceneNode> {
    capture_scene(world, &CaptureOptions::default())
}

/// A rule that counts its invocations and flags every node.
fn counting_rule(id: &str, severity: Severity, calls: &Arc<AtomicUsize>) -> Rule {
    let calls = Arc::clone(calls);
    Rule::new(id, "counts invocations", severity, move |ctx| {
        calls.fetch_add(1, Ordering::SeqCst);
        Some(ctx.finding("flagged"))
    })
}

fn ui_world(routers: usize) -> SceneWorld {
    let mut world = SceneWorld::with_builtins("Menu");
    let canvas = world.spawn(NodeSpec::new("Canvas"));
    world.add_component(canvas, Canvas::default()).unwrap();
    for i in 0..routers {
        let id = world.spawn(NodeSpec::new(format!("EventSystem{i}")));
        world.add_component(id, InputRouter::default()).unwrap();
    }
    world
}

// ---------------------------------------------------------------------------
// Rule toggling
// ---------------------------------------------------------------------------

#[test]
fn disabled_rule_is_never_invoked() {
    let mut world = SceneWorld::with_builtins("Toggle");
    for i in 0..5 {
        world.spawn(NodeSpec::new(format!("Node{i}")));
    }
    let roots = captured(&world);

    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = ValidationEngine::new();
    engine
        .register_rule(counting_rule("test.counter", Severity::Info, &calls))
        .unwrap();
    engine.set_rule_enabled("test.counter", false).unwrap();

    let report = engine.validate_scene(&roots);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(report.findings.is_empty());
    assert_eq!(report.rules_evaluated, 0);

    engine.set_rule_enabled("test.counter", true).unwrap();
    let report = engine.validate_scene(&roots);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(report.info_count, 5);
}

#[test]
fn registering_a_duplicate_id_fails() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = ValidationEngine::new();
    engine
        .register_rule(counting_rule("dup", Severity::Info, &calls))
        .unwrap();
    let err = engine
        .register_rule(counting_rule("dup", Severity::Error, &calls))
        .unwrap_err();
    assert!(matches!(err, ObserveError::DuplicateRule { ref id } if id == "dup"));
    assert!(matches!(
        engine.set_rule_enabled("missing", true),
        Err(ObserveError::UnknownRule { .. })
    ));
}

// ---------------------------------------------------------------------------
// Severity accounting
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn has_errors_tracks_error_count(
        nodes in 1usize..6,
        severities in proptest::collection::vec(0u8..3, 0..4),
    ) {
        let mut world = SceneWorld::with_builtins("Counts");
        for i in 0..nodes {
            world.spawn(NodeSpec::new(format!("N{i}")));
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let mut engine = ValidationEngine::new();
        for (i, s) in severities.iter().enumerate() {
            let severity = match s {
                0 => Severity::Info,
                1 => Severity::Warning,
                _ => Severity::Error,
            };
            engine.register_rule(counting_rule(&format!("r{i}"), severity, &calls)).unwrap();
        }

        let report = engine.validate_scene(&captured(&world));
        prop_assert_eq!(report.has_errors, report.error_count > 0);
        prop_assert_eq!(
            report.error_count + report.warning_count + report.info_count,
            report.findings.len()
        );
        prop_assert_eq!(report.findings.len(), nodes * severities.len());
    }
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[test]
fn panicking_rule_does_not_stop_later_rules() {
    let mut world = SceneWorld::with_builtins("Panics");
    world.spawn(NodeSpec::new("Only"));

    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = ValidationEngine::new();
    engine
        .register_rule(Rule::new("test.explodes", "always panics", Severity::Error, |_| {
            panic!("evaluator bug")
        }))
        .unwrap();
    engine
        .register_rule(counting_rule("test.after", Severity::Warning, &calls))
        .unwrap();

    let report = engine.validate_scene(&captured(&world));
    assert_eq!(report.failed_evaluations, 1);
    assert_eq!(report.warning_count, 1);
    assert!(!report.has_errors);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

#[test]
fn input_router_rule_counts_active_routers() {
    let engine = ValidationEngine::with_builtin_rules(&ValidationConfig::default());

    let single = engine.validate_scene(&captured(&ui_world(1)));
    assert_eq!(single.findings_for(RULE_SINGLE_INPUT_ROUTER).count(), 0);

    let none = engine.validate_scene(&captured(&ui_world(0)));
    let finding = none.findings_for(RULE_SINGLE_INPUT_ROUTER).next().unwrap();
    assert_eq!(finding.severity, Severity::Error);
    assert!(finding.auto_fix_suggestion.is_some());
    assert!(none.has_errors);

    let two = engine.validate_scene(&captured(&ui_world(2)));
    let findings: Vec<_> = two.findings_for(RULE_SINGLE_INPUT_ROUTER).collect();
    assert_eq!(findings.len(), 1);
    assert!(findings[0].message.contains("2 active"));
}

#[test]
fn router_rule_ignores_scenes_without_ui() {
    let engine = ValidationEngine::with_builtin_rules(&ValidationConfig::default());
    let mut world = SceneWorld::with_builtins("NoUi");
    world.spawn(NodeSpec::new("Ground"));
    let report = engine.validate_scene(&captured(&world));
    assert_eq!(report.findings_for(RULE_SINGLE_INPUT_ROUTER).count(), 0);
}

#[test]
fn interaction_layer_nodes_need_colliders() {
    let engine = ValidationEngine::with_builtin_rules(&ValidationConfig::default());
    let mut world = SceneWorld::with_builtins("Layers");
    world.spawn(NodeSpec::new("Lever").with_layer(8));
    let door = world.spawn(NodeSpec::new("Door").with_layer(8));
    world.add_component(door, Collider::cuboid(Vec3::ONE)).unwrap();
    world.spawn(NodeSpec::new("Ghost").with_layer(8).inactive());

    let report = engine.validate_scene(&captured(&world));
    let paths: Vec<&str> = report
        .findings_for(RULE_INTERACTION_LAYER_COLLIDER)
        .map(|f| f.object_path.as_str())
        .collect();
    assert_eq!(paths, vec!["Lever"]);
}

#[test]
fn duplicate_siblings_report_their_index() {
    let engine = ValidationEngine::with_builtin_rules(&ValidationConfig::default());
    let mut world = SceneWorld::with_builtins("Dups");
    let parent = world.spawn(NodeSpec::new("Props"));
    for name in ["Barrel", "Crate", "Barrel"] {
        world.spawn_child(parent, NodeSpec::new(name)).unwrap();
    }

    let report = engine.validate_scene(&captured(&world));
    let findings: Vec<_> = report.findings_for(RULE_DUPLICATE_SIBLING_NAME).collect();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].object_path, "Props/Barrel");
    assert_eq!(findings[0].array_index, 2);
}

#[test]
fn validate_object_prefixes_parent_path() {
    let mut engine = ValidationEngine::new();
    let calls = Arc::new(AtomicUsize::new(0));
    engine
        .register_rule(counting_rule("test.all", Severity::Info, &calls))
        .unwrap();

    let mut world = SceneWorld::with_builtins("Object");
    let level = world.spawn(NodeSpec::new("Level"));
    let room = world.spawn_child(level, NodeSpec::new("Room")).unwrap();
    world.spawn_child(room, NodeSpec::new("Chair")).unwrap();

    let node = capture_subtree(&world, room, &CaptureOptions::default()).unwrap();
    let report = engine.validate_object(&node, Some("Level"));
    let paths: Vec<&str> = report.findings.iter().map(|f| f.object_path.as_str()).collect();
    assert_eq!(paths, vec!["Level/Room", "Level/Room/Chair"]);
}
