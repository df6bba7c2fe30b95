//! Serde model of a scenario document as authored.
//!
//! Nothing here is validated; [`crate::scenario::Scenario`] compiles a
//! document into its checked form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use scenaria_core::condition::Condition;
use scenaria_core::derived::DerivedSpec;
use scenaria_core::effect::EffectSpec;
use scenaria_core::store::{SchemaEntry, Store};

/// Reserved `next` value and node id marking the end of a scenario.
pub const TERMINAL: &str = "end";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDocument {
    #[serde(default)]
    pub title: Option<String>,
    /// Defaults to the first node.
    #[serde(default)]
    pub start: Option<String>,
    pub initial_state: Store,
    #[serde(default)]
    pub schema: BTreeMap<String, SchemaEntry>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub derived: Vec<DerivedSpec>,
    #[serde(default)]
    pub sidebar: Vec<String>,
    pub nodes: Vec<NodeDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Resolved by conditions, first match wins.
    Auto,
    /// Resolved by the host picking one of the available options.
    Choice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDocument {
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub mode: Option<NodeMode>,
    #[serde(default)]
    pub options: Vec<OptionDocument>,
    #[serde(default)]
    pub fallback: Option<OptionDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionDocument {
    /// Defaults to the option's zero-based index within its node.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: String,
    /// Absent means the option is always selectable.
    #[serde(default)]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub badge: Option<String>,
    #[serde(default)]
    pub bonus: Option<BonusDocument>,
    /// Absent or `end` terminates the scenario.
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BonusDocument {
    pub probability: f64,
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
    #[serde(default)]
    pub feedback: Option<String>,
}
