//! Declarative rule files.
//!
//! A rule file is a JSON document of the form
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "id": "ui.buttons_need_collider",
//!       "description": "Buttons on the interaction layer need a collider",
//!       "severity": "Warning",
//!       "when": { "component": "Button", "layer": 8 },
//!       "check": { "kind": "requireComponent", "component": "BoxCollider" },
//!       "autoFix": "Add a BoxCollider"
//!     }
//!   ]
//! }
//! ```
//!
//! Each entry becomes a [`Rule`] registered through
//! [`ValidationEngine::register_rule`]. Loading is forgiving: a missing or
//! unparsable file, a malformed entry or a duplicate id is logged and
//! skipped; it never fails the caller.

use std::path::Path;

use nomai_capture::record::SceneNode;
use serde::{Deserialize, Serialize};

use crate::validation::{Rule, Severity, ValidationEngine};
use crate::ObserveError;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Which nodes a declarative rule applies to. Every present criterion must
/// match; an empty matcher matches every node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeMatcher {
    pub component: Option<String>,
    pub tag: Option<String>,
    pub layer: Option<i32>,
    pub name_prefix: Option<String>,
}

impl NodeMatcher {
    pub fn matches(&self, node: &SceneNode) -> bool {
        self.component
            .as_deref()
            .map_or(true, |c| node.has_component(c))
            && self.tag.as_deref().map_or(true, |t| node.tag == t)
            && self.layer.map_or(true, |l| node.layer == l)
            && self
                .name_prefix
                .as_deref()
                .map_or(true, |p| node.name.starts_with(p))
    }
}

/// The condition a matched node must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RuleCheck {
    RequireComponent { component: String },
    ForbidComponent { component: String },
    RequireTag { tag: String },
    RequireActive,
}

impl RuleCheck {
    /// Why `node` fails the check, or `None` when it passes.
    fn violation(&self, node: &SceneNode, active_in_hierarchy: bool) -> Option<String> {
        match self {
            RuleCheck::RequireComponent { component } => (!node.has_component(component))
                .then(|| format!("missing required component {component}")),
            RuleCheck::ForbidComponent { component } => node
                .has_component(component)
                .then(|| format!("carries forbidden component {component}")),
            RuleCheck::RequireTag { tag } => {
                (node.tag != *tag).then(|| format!("tag is '{}', expected '{tag}'", node.tag))
            }
            RuleCheck::RequireActive => {
                (!active_in_hierarchy).then(|| "node is inactive in the hierarchy".to_owned())
            }
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// One declarative rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub auto_fix: Option<String>,
    #[serde(default)]
    pub when: NodeMatcher,
    pub check: RuleCheck,
}

impl RuleSpec {
    pub fn into_rule(self) -> Rule {
        let RuleSpec {
            id,
            description,
            severity,
            enabled,
            auto_fix,
            when,
            check,
        } = self;
        let mut rule = Rule::new(id, description, severity, move |ctx| {
            let node = ctx.node();
            if !when.matches(node) {
                return None;
            }
            check
                .violation(node, ctx.active_in_hierarchy())
                .map(|message| ctx.finding(message))
        });
        rule.enabled = enabled;
        rule.auto_fix_hint = auto_fix;
        rule
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse rules from JSON text and register them. Returns the number of
/// rules registered.
pub fn load_rules_from_str(engine: &mut ValidationEngine, text: &str) -> usize {
    let document: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "rule file is not valid JSON -- skipping");
            return 0;
        }
    };
    let Some(entries) = document.get("rules").and_then(|r| r.as_array()) else {
        tracing::warn!("rule file has no \"rules\" array -- skipping");
        return 0;
    };

    let mut registered = 0;
    for (index, entry) in entries.iter().enumerate() {
        let spec: RuleSpec = match serde_json::from_value(entry.clone()) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(index, error = %e, "malformed rule entry -- skipping");
                continue;
            }
        };
        match engine.register_rule(spec.into_rule()) {
            Ok(()) => registered += 1,
            Err(ObserveError::DuplicateRule { id }) => {
                tracing::warn!(index, rule = %id, "duplicate rule id -- skipping");
            }
            Err(e) => tracing::warn!(index, error = %e, "rule rejected -- skipping"),
        }
    }
    tracing::info!(registered, total = entries.len(), "loaded declarative rules");
    registered
}

/// Read a rule file from disk and register its rules. A missing or
/// unreadable file registers nothing.
pub fn load_rule_file(engine: &mut ValidationEngine, path: impl AsRef<Path>) -> usize {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(text) => load_rules_from_str(engine, &text),
        Err(e) => {
            let err = ObserveError::RuleFile {
                path: path.display().to_string(),
                details: e.to_string(),
            };
            tracing::warn!(error = %err, "cannot read rule file -- skipping");
            0
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
