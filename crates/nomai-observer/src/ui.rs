//! Interactive-element graph builder.
//!
//! Each [`InteractiveSubsystem`] knows one way UI is represented in the
//! world and flattens it into [`UiElementNode`]s with absolute screen
//! rectangles. The builder merges every subsystem's elements, orders them
//! top-most first and resolves which element, if any, sits on top of each
//! one and intercepts its input.

use anyhow::Context;
use nomai_scene::builtin::{Canvas, UiDocument, UiRect, VisualElement};
use nomai_scene::math::{Rect, Vec2};
use nomai_scene::node::NodeId;
use nomai_scene::world::SceneWorld;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UiElementNode
// ---------------------------------------------------------------------------

/// One interactive (or input-blocking) element on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiElementNode {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: String,
    /// Bottom-left corner in screen pixels.
    pub screen_position: [f32; 2],
    /// Width and height in screen pixels.
    pub size: [f32; 2],
    pub visible: bool,
    pub interactable: bool,
    /// Unique path of the element. A segment shared with an earlier sibling
    /// carries that sibling count as a suffix, as in `HUD/Button[1]`.
    pub path: String,
    /// Name of the subsystem that produced the element.
    pub source: String,
    /// `path` of the top-most element covering this one, if any.
    pub blocked_by: Option<String>,
    /// Whether the element intercepts pointer input.
    pub blocks_input: bool,
    /// Subsystem-level order; higher draws on top.
    pub sort_order: i32,
    /// Order within the subsystem; higher draws on top.
    pub draw_order: usize,
}

impl UiElementNode {
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.screen_position[0],
            self.screen_position[1],
            self.size[0],
            self.size[1],
        )
    }

    fn contains_path(&self, other: &str) -> bool {
        other
            .strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// `name`, suffixed with `[n]` when `n` earlier siblings share it.
fn path_segment(name: &str, earlier_namesakes: usize) -> String {
    match earlier_namesakes {
        0 => name.to_owned(),
        n => format!("{name}[{n}]"),
    }
}

fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_owned()
    } else {
        format!("{parent}/{segment}")
    }
}

/// Path segment of `id` among its siblings.
fn node_segment(world: &SceneWorld, id: NodeId) -> Option<String> {
    let name = &world.node(id)?.name;
    let siblings = match world.parent(id) {
        Some(parent) => world.children(parent),
        None => world.roots(),
    };
    let earlier = siblings
        .iter()
        .take_while(|&&s| s != id)
        .filter(|&&s| world.node(s).is_some_and(|n| &n.name == name))
        .count();
    Some(path_segment(name, earlier))
}

/// Unique path of a live node, root first.
fn unique_node_path(world: &SceneWorld, id: NodeId) -> Option<String> {
    let mut segments = Vec::new();
    let mut current = Some(id);
    while let Some(node) = current {
        segments.push(node_segment(world, node)?);
        current = world.parent(node);
    }
    segments.reverse();
    Some(segments.join("/"))
}

// ---------------------------------------------------------------------------
// Subsystems
// ---------------------------------------------------------------------------

/// A source of interactive elements.
pub trait InteractiveSubsystem: Send + Sync {
    fn name(&self) -> &str;

    /// Every element this subsystem knows about, with `blocked_by` unset.
    fn collect(&self, world: &SceneWorld) -> anyhow::Result<Vec<UiElementNode>>;
}

/// Hierarchy-based UI: nodes carrying a [`UiRect`] below a [`Canvas`].
#[derive(Debug, Default)]
pub struct CanvasSubsystem;

impl CanvasSubsystem {
    pub const NAME: &'static str = "canvas";

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        world: &SceneWorld,
        canvas: &Canvas,
        node: NodeId,
        node_path: &str,
        origin: Vec2,
        chain_enabled: bool,
        draw_order: &mut usize,
        out: &mut Vec<UiElementNode>,
    ) {
        for &child in world.children(node) {
            if world.get_component::<Canvas>(child).is_some() {
                // Nested canvases are collected as roots of their own.
                continue;
            }
            let Some(segment) = node_segment(world, child) else {
                continue;
            };
            let path = join_path(node_path, &segment);
            let (origin, enabled) = match world.get_component::<UiRect>(child) {
                Some(rect) => {
                    let position = origin + rect.offset * canvas.scale_factor;
                    let enabled = chain_enabled && rect.enabled;
                    let visible = enabled && world.active_in_hierarchy(child);
                    if let Some(data) = world.node(child) {
                        out.push(UiElementNode {
                            name: data.name.clone(),
                            element_type: rect.kind.as_str().to_owned(),
                            screen_position: position.to_array(),
                            size: (rect.size * canvas.scale_factor).to_array(),
                            visible,
                            interactable: visible && rect.interactable,
                            path: path.clone(),
                            source: Self::NAME.to_owned(),
                            blocked_by: None,
                            blocks_input: rect.raycast_target,
                            sort_order: canvas.sort_order,
                            draw_order: *draw_order,
                        });
                        *draw_order += 1;
                    }
                    (position, enabled)
                }
                None => (origin, chain_enabled),
            };
            self.walk(world, canvas, child, &path, origin, enabled, draw_order, out);
        }
    }
}

impl InteractiveSubsystem for CanvasSubsystem {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn collect(&self, world: &SceneWorld) -> anyhow::Result<Vec<UiElementNode>> {
        let mut out = Vec::new();
        let mut draw_order = 0;
        for id in world.preorder() {
            let Some(canvas) = world.get_component::<Canvas>(id) else {
                continue;
            };
            if !(canvas.scale_factor.is_finite() && canvas.scale_factor > 0.0) {
                anyhow::bail!(
                    "canvas '{}' has invalid scale factor {}",
                    unique_node_path(world, id).unwrap_or_default(),
                    canvas.scale_factor
                );
            }
            let Some(path) = unique_node_path(world, id) else {
                continue;
            };
            self.walk(
                world,
                canvas,
                id,
                &path,
                Vec2::ZERO,
                canvas.enabled,
                &mut draw_order,
                &mut out,
            );
        }
        Ok(out)
    }
}

/// Document-based UI: [`UiDocument`] components holding a tree of
/// [`VisualElement`]s laid out in absolute screen pixels.
#[derive(Debug, Default)]
pub struct DocumentSubsystem;

impl DocumentSubsystem {
    pub const NAME: &'static str = "ui-document";

    /// Walk `elements` as one sibling list under `parent_path`.
    fn walk_siblings<'e>(
        elements: impl IntoIterator<Item = (&'e VisualElement, bool, i32)>,
        parent_path: &str,
        enabled: bool,
        out: &mut Vec<UiElementNode>,
    ) {
        let mut seen: Vec<&str> = Vec::new();
        for (element, visible, sort_order) in elements {
            let earlier = seen.iter().filter(|&&n| n == element.name).count();
            seen.push(&element.name);
            let path = join_path(parent_path, &path_segment(&element.name, earlier));
            Self::walk(element, path, visible, enabled, sort_order, out);
        }
    }

    fn walk(
        element: &VisualElement,
        path: String,
        visible: bool,
        enabled: bool,
        sort_order: i32,
        out: &mut Vec<UiElementNode>,
    ) {
        let visible = visible && element.visible;
        let enabled = enabled && element.enabled;
        out.push(UiElementNode {
            name: element.name.clone(),
            element_type: element.kind.as_str().to_owned(),
            screen_position: [element.rect.x, element.rect.y],
            size: [element.rect.width, element.rect.height],
            visible,
            interactable: visible && enabled && element.kind.is_interactive(),
            path: path.clone(),
            source: Self::NAME.to_owned(),
            blocked_by: None,
            blocks_input: element.picking,
            sort_order,
            draw_order: out.len(),
        });
        Self::walk_siblings(
            element.children.iter().map(|c| (c, visible, sort_order)),
            &path,
            enabled,
            out,
        );
    }
}

impl InteractiveSubsystem for DocumentSubsystem {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn collect(&self, world: &SceneWorld) -> anyhow::Result<Vec<UiElementNode>> {
        let mut out = Vec::new();
        for id in world.preorder() {
            let docs = world.get_components::<UiDocument>(id);
            if docs.is_empty() {
                continue;
            }
            let Some(path) = unique_node_path(world, id) else {
                continue;
            };
            let active = world.active_in_hierarchy(id);
            let roots = docs
                .into_iter()
                .map(|doc| (&doc.root, doc.enabled && active, doc.sort_order));
            Self::walk_siblings(roots, &path, true, &mut out);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// UiGraph
// ---------------------------------------------------------------------------

/// Every interactive element in the world, top-most first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiGraph {
    pub elements: Vec<UiElementNode>,
    /// Names of the subsystems that contributed, in query order.
    pub subsystems: Vec<String>,
}

impl UiGraph {
    pub fn find_element_by_name(&self, name: &str) -> Option<&UiElementNode> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn find_interactable_elements(&self) -> Vec<&UiElementNode> {
        self.elements.iter().filter(|e| e.interactable).collect()
    }

    pub fn find_blocked_elements(&self) -> Vec<&UiElementNode> {
        self.elements
            .iter()
            .filter(|e| e.blocked_by.is_some())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Queries every registered subsystem and resolves occlusion.
pub struct UiGraphBuilder {
    subsystems: Vec<Box<dyn InteractiveSubsystem>>,
}

impl Default for UiGraphBuilder {
    fn default() -> Self {
        Self::empty()
            .with_subsystem(CanvasSubsystem)
            .with_subsystem(DocumentSubsystem)
    }
}

impl std::fmt::Debug for UiGraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.subsystems.iter().map(|s| s.name()).collect();
        f.debug_struct("UiGraphBuilder")
            .field("subsystems", &names)
            .finish()
    }
}

impl UiGraphBuilder {
    /// A builder with the built-in canvas and document subsystems.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder with no subsystems.
    pub fn empty() -> Self {
        Self {
            subsystems: Vec::new(),
        }
    }

    /// Add a subsystem. Later subsystems draw on top of earlier ones at
    /// equal sort order.
    pub fn with_subsystem(mut self, subsystem: impl InteractiveSubsystem + 'static) -> Self {
        self.subsystems.push(Box::new(subsystem));
        self
    }

    /// Build the graph. Any failing subsystem fails the whole build.
    pub fn capture_ui_state(&self, world: &SceneWorld) -> anyhow::Result<UiGraph> {
        let mut keyed = Vec::new();
        for (rank, subsystem) in self.subsystems.iter().enumerate() {
            let elements = subsystem
                .collect(world)
                .with_context(|| format!("UI subsystem '{}' failed", subsystem.name()))?;
            tracing::debug!(subsystem = subsystem.name(), elements = elements.len(), "collected UI elements");
            keyed.extend(
                elements
                    .into_iter()
                    .map(|e| ((e.sort_order, rank, e.draw_order), e)),
            );
        }

        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        let mut elements: Vec<UiElementNode> = keyed.into_iter().map(|(_, e)| e).collect();
        resolve_occlusion(&mut elements);

        Ok(UiGraph {
            elements,
            subsystems: self.subsystems.iter().map(|s| s.name().to_owned()).collect(),
        })
    }
}

/// Set `blocked_by` on every element from the elements above it.
/// `elements` must be ordered top-most first. An element's own descendants
/// never block it.
fn resolve_occlusion(elements: &mut [UiElementNode]) {
    for i in 0..elements.len() {
        let rect = elements[i].rect();
        let blocker = elements[..i]
            .iter()
            .find(|above| {
                above.visible
                    && above.blocks_input
                    && !elements[i].contains_path(&above.path)
                    && above.rect().overlaps(&rect)
            })
            .map(|above| above.path.clone());
        elements[i].blocked_by = blocker;
    }
}

/// Build the UI graph with the built-in subsystems.
pub fn capture_ui_state(world: &SceneWorld) -> anyhow::Result<UiGraph> {
    UiGraphBuilder::new().capture_ui_state(world)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
