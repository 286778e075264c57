//! Validation rule engine.
//!
//! A [`Rule`] is an id, a severity and an evaluator closure that inspects one
//! captured node at a time and may return a [`ValidationFinding`]. The
//! [`ValidationEngine`] keeps rules in registration order and runs every
//! enabled rule against every node in scope. Disabled rules are skipped
//! before their evaluator is ever called.
//!
//! Rules run over the captured [`SceneNode`] tree rather than the live
//! world, so validation always agrees with the snapshot it is reported in.
//! Findings are independent: no rule suppresses another rule's finding.

use std::panic::{catch_unwind, AssertUnwindSafe};

use nomai_capture::record::SceneNode;
use nomai_capture::walker::panic_message;
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::ObserveError;

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// `arrayIndex` value meaning "not applicable".
pub const NO_ARRAY_INDEX: i64 = -1;

/// One rule violation on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFinding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    /// Slash-delimited path of the offending node.
    pub object_path: String,
    /// Index of the offending element within a collection, or `-1`.
    pub array_index: i64,
    /// Human-readable hint. Never applied automatically.
    pub auto_fix_suggestion: Option<String>,
}

/// Result of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub findings: Vec<ValidationFinding>,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    /// True exactly when `error_count > 0`.
    pub has_errors: bool,
    /// Number of enabled rules that were run.
    pub rules_evaluated: usize,
    pub nodes_scanned: usize,
    /// Evaluator invocations that panicked and were skipped.
    pub failed_evaluations: usize,
}

impl ValidationReport {
    fn new(findings: Vec<ValidationFinding>, rules_evaluated: usize, nodes_scanned: usize) -> Self {
        let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
        let error_count = count(Severity::Error);
        Self {
            error_count,
            warning_count: count(Severity::Warning),
            info_count: count(Severity::Info),
            has_errors: error_count > 0,
            rules_evaluated,
            nodes_scanned,
            failed_evaluations: 0,
            findings,
        }
    }

    pub fn findings_for(&self, rule_id: &str) -> impl Iterator<Item = &ValidationFinding> + '_ {
        let rule_id = rule_id.to_owned();
        self.findings.iter().filter(move |f| f.rule_id == rule_id)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Evaluates one node; `None` means the node passes.
pub type RuleEvaluator = Box<dyn Fn(&RuleContext<'_>) -> Option<ValidationFinding> + Send + Sync>;

/// A named validation rule.
pub struct Rule {
    pub id: String,
    pub description: String,
    pub severity: Severity,
    pub enabled: bool,
    pub auto_fix_hint: Option<String>,
    evaluator: RuleEvaluator,
}

impl Rule {
    pub fn new<F>(id: impl Into<String>, description: impl Into<String>, severity: Severity, evaluator: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> Option<ValidationFinding> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            description: description.into(),
            severity,
            enabled: true,
            auto_fix_hint: None,
            evaluator: Box::new(evaluator),
        }
    }

    pub fn with_auto_fix(mut self, hint: impl Into<String>) -> Self {
        self.auto_fix_hint = Some(hint.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Scan scope
// ---------------------------------------------------------------------------

/// A captured node together with its position in the scan scope.
#[derive(Debug)]
pub struct ScannedNode<'a> {
    pub node: &'a SceneNode,
    pub path: String,
    /// Depth relative to the scan root.
    pub depth: usize,
    /// The node and every ancestor inside the scope are active.
    pub active_in_hierarchy: bool,
    pub sibling_index: usize,
    /// The node's siblings, itself included.
    pub siblings: &'a [SceneNode],
}

fn flatten<'a>(
    siblings: &'a [SceneNode],
    parent_path: Option<&str>,
    depth: usize,
    parent_active: bool,
    out: &mut Vec<ScannedNode<'a>>,
) {
    for (index, node) in siblings.iter().enumerate() {
        let path = match parent_path {
            Some(parent) if !parent.is_empty() => format!("{parent}/{}", node.name),
            _ => node.name.clone(),
        };
        let active = parent_active && node.active;
        out.push(ScannedNode {
            node,
            path: path.clone(),
            depth,
            active_in_hierarchy: active,
            sibling_index: index,
            siblings,
        });
        flatten(&node.children, Some(&path), depth + 1, active, out);
    }
}

/// What an evaluator sees: one node, its place in the tree, and the whole
/// scan scope for rules that reason about more than one node.
pub struct RuleContext<'a> {
    rule: &'a Rule,
    index: usize,
    scope: &'a [ScannedNode<'a>],
    whole_scene: bool,
}

impl<'a> RuleContext<'a> {
    fn entry(&self) -> &'a ScannedNode<'a> {
        &self.scope[self.index]
    }

    pub fn node(&self) -> &'a SceneNode {
        self.entry().node
    }

    pub fn path(&self) -> &'a str {
        &self.entry().path
    }

    pub fn depth(&self) -> usize {
        self.entry().depth
    }

    pub fn active_in_hierarchy(&self) -> bool {
        self.entry().active_in_hierarchy
    }

    pub fn sibling_index(&self) -> usize {
        self.entry().sibling_index
    }

    pub fn siblings(&self) -> &'a [SceneNode] {
        self.entry().siblings
    }

    /// Every node in the scan, in pre-order.
    pub fn scope(&self) -> &'a [ScannedNode<'a>] {
        self.scope
    }

    /// True when the scan covers the whole world rather than one subtree.
    /// Rules about the world as a whole stay silent on a subtree scan, which
    /// cannot see nodes outside it.
    pub fn is_whole_scene(&self) -> bool {
        self.whole_scene
    }

    /// True for the first node of the scan. Scope-wide rules evaluate once
    /// by reporting only from here.
    pub fn is_scope_start(&self) -> bool {
        self.index == 0
    }

    /// A finding for this node, pre-filled with the rule's id, severity and
    /// hint.
    pub fn finding(&self, message: impl Into<String>) -> ValidationFinding {
        ValidationFinding {
            rule_id: self.rule.id.clone(),
            severity: self.rule.severity,
            message: message.into(),
            object_path: self.path().to_owned(),
            array_index: NO_ARRAY_INDEX,
            auto_fix_suggestion: self.rule.auto_fix_hint.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationEngine
// ---------------------------------------------------------------------------

/// Ordered rule registry.
#[derive(Debug, Default)]
pub struct ValidationEngine {
    rules: Vec<Rule>,
}

impl ValidationEngine {
    /// An engine with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine seeded with the built-in rules.
    pub fn with_builtin_rules(config: &ValidationConfig) -> Self {
        let mut engine = Self::new();
        for rule in builtin_rules(config) {
            engine.rules.push(rule);
        }
        engine
    }

    /// Append a rule. Ids are unique.
    pub fn register_rule(&mut self, rule: Rule) -> Result<(), ObserveError> {
        if self.rule(&rule.id).is_some() {
            return Err(ObserveError::DuplicateRule { id: rule.id });
        }
        tracing::debug!(rule = %rule.id, severity = ?rule.severity, "registered validation rule");
        self.rules.push(rule);
        Ok(())
    }

    pub fn set_rule_enabled(&mut self, id: &str, enabled: bool) -> Result<(), ObserveError> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ObserveError::UnknownRule { id: id.to_owned() })?;
        rule.enabled = enabled;
        Ok(())
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Rules in registration order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validate every node under the captured roots.
    pub fn validate_scene(&self, roots: &[SceneNode]) -> ValidationReport {
        let mut scope = Vec::new();
        flatten(roots, None, 0, true, &mut scope);
        self.run(&scope, true)
    }

    /// Validate a single captured subtree. `parent_path` prefixes every
    /// reported path.
    pub fn validate_object(&self, node: &SceneNode, parent_path: Option<&str>) -> ValidationReport {
        let mut scope = Vec::new();
        flatten(std::slice::from_ref(node), parent_path, 0, true, &mut scope);
        self.run(&scope, false)
    }

    fn run(&self, scope: &[ScannedNode<'_>], whole_scene: bool) -> ValidationReport {
        let mut findings = Vec::new();
        let mut rules_evaluated = 0;
        let mut failed = 0;

        for rule in self.rules.iter().filter(|r| r.enabled) {
            rules_evaluated += 1;
            for index in 0..scope.len() {
                let ctx = RuleContext {
                    rule,
                    index,
                    scope,
                    whole_scene,
                };
                match catch_unwind(AssertUnwindSafe(|| (rule.evaluator)(&ctx))) {
                    Ok(Some(finding)) => findings.push(finding),
                    Ok(None) => {}
                    Err(panic) => {
                        failed += 1;
                        tracing::warn!(
                            rule = %rule.id,
                            path = %ctx.path(),
                            panic = panic_message(panic.as_ref()),
                            "validation rule panicked -- skipping node"
                        );
                    }
                }
            }
        }

        let mut report = ValidationReport::new(findings, rules_evaluated, scope.len());
        report.failed_evaluations = failed;
        report
    }
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

pub const RULE_SINGLE_INPUT_ROUTER: &str = "ui.single_input_router";
pub const RULE_INTERACTION_LAYER_COLLIDER: &str = "physics.interaction_layer_collider";
pub const RULE_DUPLICATE_SIBLING_NAME: &str = "hierarchy.duplicate_sibling_name";
pub const RULE_EMPTY_NODE_NAME: &str = "hierarchy.empty_node_name";

/// Component types that make a scene interactive.
const UI_ROOT_TYPES: [&str; 2] = ["Canvas", "UiDocument"];

/// The built-in rules, in registration order.
pub fn builtin_rules(config: &ValidationConfig) -> Vec<Rule> {
    let router_type = config.input_router_type.clone();
    let layers = config.interaction_layers.clone();
    let collider_types = config.collider_types.clone();

    vec![
        Rule::new(
            RULE_SINGLE_INPUT_ROUTER,
            "A scene with interactive UI needs exactly one active input router",
            Severity::Error,
            move |ctx| {
                if !(ctx.is_whole_scene() && ctx.is_scope_start()) {
                    return None;
                }
                let active = ctx.scope().iter().filter(|n| n.active_in_hierarchy);
                let has_ui = active
                    .clone()
                    .any(|n| UI_ROOT_TYPES.iter().any(|t| n.node.has_component(t)));
                if !has_ui {
                    return None;
                }
                let routers: Vec<&str> = active
                    .filter(|n| n.node.has_component(&router_type))
                    .map(|n| n.path.as_str())
                    .collect();
                match routers.len() {
                    1 => None,
                    0 => Some(ctx.finding(format!(
                        "interactive UI present but no active {router_type} found"
                    ))),
                    n => Some(ctx.finding(format!(
                        "{n} active {router_type} nodes found ({}); exactly one is required",
                        routers.join(", ")
                    ))),
                }
            },
        )
        .with_auto_fix("Keep a single active input router and disable or remove the others"),
        Rule::new(
            RULE_INTERACTION_LAYER_COLLIDER,
            "Nodes on an interaction layer need a collider",
            Severity::Warning,
            move |ctx| {
                let node = ctx.node();
                if !ctx.active_in_hierarchy() || !layers.contains(&node.layer) {
                    return None;
                }
                let has_collider = collider_types.iter().any(|t| node.has_component(t));
                (!has_collider).then(|| {
                    ctx.finding(format!(
                        "node is on interaction layer {} but has no collider",
                        node.layer
                    ))
                })
            },
        )
        .with_auto_fix("Add a collider sized to the node's visual bounds"),
        Rule::new(
            RULE_DUPLICATE_SIBLING_NAME,
            "Sibling nodes should have distinct names",
            Severity::Info,
            |ctx| {
                let index = ctx.sibling_index();
                let name = &ctx.node().name;
                let earlier = ctx.siblings()[..index].iter().any(|s| &s.name == name);
                earlier.then(|| {
                    let mut finding =
                        ctx.finding(format!("another sibling is already named '{name}'"));
                    finding.array_index = index as i64;
                    finding
                })
            },
        )
        .with_auto_fix("Rename the node so its path is unambiguous"),
        Rule::new(
            RULE_EMPTY_NODE_NAME,
            "Nodes should be named",
            Severity::Warning,
            |ctx| {
                ctx.node()
                    .name
                    .trim()
                    .is_empty()
                    .then(|| ctx.finding("node has an empty name"))
            },
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
