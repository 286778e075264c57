//! Integration tests for the UI graph: occlusion between overlapping
//! elements and custom subsystems.

use nomai_observer::prelude::*;
use nomai_scene::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn canvas(world: &mut SceneWorld, name: &str, sort_order: i32) -> NodeId {
    let id = world.spawn(NodeSpec::new(name));
    world
        .add_component(
            id,
            Canvas {
                sort_order,
                ..Canvas::default()
            },
        )
        .unwrap();
    id
}

fn button(world: &mut SceneWorld, parent: NodeId, name: &str, offset: Vec2, size: Vec2) -> NodeId {
    let id = world.spawn_child(parent, NodeSpec::new(name)).unwrap();
    world
        .add_component(id, UiRect::new(UiKind::Button, offset, size))
        .unwrap();
    id
}

/// Reports a fixed list of elements.
struct Fixed(Vec<UiElementNode>);

impl InteractiveSubsystem for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    fn collect(&self, _world: &SceneWorld) -> anyhow::Result<Vec<UiElementNode>> {
        Ok(self.0.clone())
    }
}

fn element(name: &str, rect: [f32; 4], sort_order: i32) -> UiElementNode {
    UiElementNode {
        name: name.to_owned(),
        element_type: "Button".to_owned(),
        screen_position: [rect[0], rect[1]],
        size: [rect[2], rect[3]],
        visible: true,
        interactable: true,
        path: format!("Fixed/{name}"),
        source: "fixed".to_owned(),
        blocked_by: None,
        blocks_input: true,
        sort_order,
        draw_order: 0,
    }
}

// ---------------------------------------------------------------------------
// Occlusion
// ---------------------------------------------------------------------------

#[test]
fn upper_element_blocks_the_lower_one() {
    let mut world = SceneWorld::with_builtins("Stack");
    let back = canvas(&mut world, "Back", 0);
    let front = canvas(&mut world, "Front", 5);
    let full = Vec2::new(200.0, 100.0);
    button(&mut world, back, "Lower", Vec2::ZERO, full);
    button(&mut world, front, "Upper", Vec2::ZERO, full);

    let graph = capture_ui_state(&world).unwrap();
    let lower = graph.find_element_by_name("Lower").unwrap();
    let upper = graph.find_element_by_name("Upper").unwrap();
    assert_eq!(lower.blocked_by.as_deref(), Some("Front/Upper"));
    assert!(upper.blocked_by.is_none());
    assert_eq!(graph.elements[0].name, "Upper");
}

#[test]
fn later_sibling_draws_on_top_within_a_canvas() {
    let mut world = SceneWorld::with_builtins("Siblings");
    let hud = canvas(&mut world, "HUD", 0);
    button(&mut world, hud, "First", Vec2::ZERO, Vec2::new(50.0, 50.0));
    button(&mut world, hud, "Second", Vec2::new(25.0, 25.0), Vec2::new(50.0, 50.0));
    button(&mut world, hud, "Apart", Vec2::new(500.0, 500.0), Vec2::new(10.0, 10.0));

    let graph = capture_ui_state(&world).unwrap();
    assert_eq!(
        graph.find_element_by_name("First").unwrap().blocked_by.as_deref(),
        Some("HUD/Second")
    );
    assert!(graph.find_element_by_name("Second").unwrap().blocked_by.is_none());
    assert!(graph.find_element_by_name("Apart").unwrap().blocked_by.is_none());
    assert_eq!(graph.find_interactable_elements().len(), 3);
}

#[test]
fn namesake_siblings_get_distinct_paths() {
    let mut world = SceneWorld::with_builtins("Twins");
    let hud = canvas(&mut world, "HUD", 0);
    button(&mut world, hud, "Button", Vec2::ZERO, Vec2::new(50.0, 50.0));
    button(&mut world, hud, "Button", Vec2::new(10.0, 10.0), Vec2::new(50.0, 50.0));

    let graph = capture_ui_state(&world).unwrap();
    let paths: Vec<&str> = graph.elements.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["HUD/Button[1]", "HUD/Button"]);
    assert_eq!(graph.elements[1].blocked_by.as_deref(), Some("HUD/Button[1]"));
    assert!(graph.elements[0].blocked_by.is_none());
}

#[test]
fn descendant_never_blocks_its_own_ancestor() {
    let mut world = SceneWorld::with_builtins("Dialogs");
    let hud = canvas(&mut world, "HUD", 0);
    let full = Vec2::new(100.0, 100.0);
    let first = world.spawn_child(hud, NodeSpec::new("Panel")).unwrap();
    world
        .add_component(first, UiRect::new(UiKind::Panel, Vec2::ZERO, full))
        .unwrap();
    button(&mut world, first, "Close", Vec2::new(10.0, 10.0), Vec2::new(20.0, 20.0));
    let second = world.spawn_child(hud, NodeSpec::new("Panel")).unwrap();
    world
        .add_component(second, UiRect::new(UiKind::Panel, Vec2::ZERO, full))
        .unwrap();
    button(&mut world, second, "Close", Vec2::ZERO, full);

    let graph = capture_ui_state(&world).unwrap();
    let by_path = |path: &str| graph.elements.iter().find(|e| e.path == path).unwrap();

    // The second panel sits under its own Close button but is not blocked by it.
    assert!(by_path("HUD/Panel[1]").blocked_by.is_none());
    // The namesake panel's subtree is not the first panel's.
    assert_eq!(
        by_path("HUD/Panel/Close").blocked_by.as_deref(),
        Some("HUD/Panel[1]/Close")
    );
    assert_eq!(
        by_path("HUD/Panel").blocked_by.as_deref(),
        Some("HUD/Panel[1]/Close")
    );
}

#[test]
fn edge_touching_rects_do_not_block() {
    let graph = UiGraphBuilder::empty()
        .with_subsystem(Fixed(vec![
            element("Left", [0.0, 0.0, 10.0, 10.0], 1),
            element("Right", [10.0, 0.0, 10.0, 10.0], 0),
        ]))
        .capture_ui_state(&SceneWorld::new("Empty"))
        .unwrap();
    assert!(graph.find_blocked_elements().is_empty());
}

// ---------------------------------------------------------------------------
// Subsystems
// ---------------------------------------------------------------------------

#[test]
fn custom_subsystem_merges_with_builtins() {
    let mut world = SceneWorld::with_builtins("Mixed");
    let hud = canvas(&mut world, "HUD", 0);
    button(&mut world, hud, "Fire", Vec2::ZERO, Vec2::new(40.0, 40.0));

    let graph = UiGraphBuilder::new()
        .with_subsystem(Fixed(vec![element("Popup", [0.0, 0.0, 100.0, 100.0], 0)]))
        .capture_ui_state(&world)
        .unwrap();

    assert_eq!(graph.subsystems, vec!["canvas", "ui-document", "fixed"]);
    // Equal sort order: the later subsystem draws on top.
    assert_eq!(graph.elements[0].name, "Popup");
    assert_eq!(
        graph.find_element_by_name("Fire").unwrap().blocked_by.as_deref(),
        Some("Fixed/Popup")
    );
}

#[test]
fn ui_graph_json_uses_type_and_camel_case() {
    let mut world = SceneWorld::with_builtins("Json");
    let hud = canvas(&mut world, "HUD", 0);
    button(&mut world, hud, "Ok", Vec2::ZERO, Vec2::new(10.0, 10.0));

    let graph = capture_ui_state(&world).unwrap();
    let json = serde_json::to_value(&graph).unwrap();
    let first = &json["elements"][0];
    assert_eq!(first["type"], "Button");
    assert_eq!(first["screenPosition"], serde_json::json!([0.0, 0.0]));
    assert!(first["blockedBy"].is_null());
}
