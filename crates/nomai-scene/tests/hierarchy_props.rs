//! Property tests for the live node tree.
//!
//! Random sequences of spawn / despawn / re-parent operations must always
//! leave a well-formed tree: every live node reachable exactly once from the
//! roots, parent links consistent with child lists, and no cycles.

use std::collections::HashSet;

use nomai_scene::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum TreeOp {
    SpawnRoot,
    SpawnChild(usize),
    Despawn(usize),
    Reparent(usize, Option<usize>),
    Toggle(usize),
}

fn tree_op_strategy() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        Just(TreeOp::SpawnRoot),
        (0..64usize).prop_map(TreeOp::SpawnChild),
        (0..64usize).prop_map(TreeOp::Despawn),
        (0..64usize, prop::option::of(0..64usize)).prop_map(|(a, b)| TreeOp::Reparent(a, b)),
        (0..64usize).prop_map(TreeOp::Toggle),
    ]
}

fn pick(ids: &[NodeId], i: usize) -> Option<NodeId> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[i % ids.len()])
    }
}

fn assert_well_formed(world: &SceneWorld) {
    let order = world.preorder();
    let unique: HashSet<NodeId> = order.iter().copied().collect();
    assert_eq!(unique.len(), order.len(), "node visited twice");
    assert_eq!(order.len(), world.node_count(), "unreachable live node");

    for &id in &order {
        for &child in world.children(id) {
            assert_eq!(world.parent(child), Some(id));
        }
        if world.parent(id).is_none() {
            assert!(world.roots().contains(&id));
        }
        assert!(world.depth(id).is_some());
        let path = world.path(id).unwrap();
        assert_eq!(path.split('/').count(), world.depth(id).unwrap() + 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn random_ops_preserve_tree_shape(ops in prop::collection::vec(tree_op_strategy(), 1..60)) {
        let mut world = SceneWorld::new("Prop");
        let mut counter = 0u32;

        for op in ops {
            let alive = world.preorder();
            match op {
                TreeOp::SpawnRoot => {
                    counter += 1;
                    world.spawn(NodeSpec::new(format!("n{counter}")));
                }
                TreeOp::SpawnChild(i) => {
                    if let Some(parent) = pick(&alive, i) {
                        counter += 1;
                        world.spawn_child(parent, NodeSpec::new(format!("n{counter}"))).unwrap();
                    }
                }
                TreeOp::Despawn(i) => {
                    if let Some(id) = pick(&alive, i) {
                        world.despawn(id).unwrap();
                        prop_assert!(!world.is_alive(id));
                    }
                }
                TreeOp::Reparent(a, b) => {
                    if let Some(node) = pick(&alive, a) {
                        let target = b.and_then(|b| pick(&alive, b));
                        // Cycles are rejected; anything else must succeed.
                        let would_cycle = target
                            .map(|t| world.descendants(node).contains(&t))
                            .unwrap_or(false);
                        let result = world.set_parent(node, target);
                        prop_assert_eq!(result.is_err(), would_cycle);
                    }
                }
                TreeOp::Toggle(i) => {
                    if let Some(id) = pick(&alive, i) {
                        let active = world.node(id).unwrap().active;
                        world.set_active(id, !active).unwrap();
                    }
                }
            }
            assert_well_formed(&world);
        }
    }
}
