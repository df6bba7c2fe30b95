//! ## scenaria-engine::scenario
//! **Compiled, validated scenario graph**
//!
//! Loading a document resolves every condition, effect and formula against the
//! attribute schema, checks all node references and fixes each node's mode.
//! Anything wrong is reported here, before a simulation can start.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use scenaria_config::{EngineConfig, MixedNodePolicy};
use scenaria_core::condition::{self, Condition};
use scenaria_core::derived::DerivedFields;
use scenaria_core::effect::{Effect, EffectSpec};
use scenaria_core::error::{DefinitionError, EvalError};
use scenaria_core::store::{Schema, Store};

use crate::document::{NodeDocument, NodeMode, OptionDocument, ScenarioDocument, TERMINAL};
use crate::error::DocumentError;
use crate::random::RandomSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub mixed_nodes: MixedNodePolicy,
}

impl From<&EngineConfig> for LoadOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            mixed_nodes: config.mixed_nodes,
        }
    }
}

/// Where an option leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Node(String),
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bonus {
    pub probability: f64,
    pub effects: Vec<Effect>,
    pub feedback: Option<String>,
}

impl Bonus {
    /// Takes exactly one draw from `rng`. Probability 1 always fires and
    /// probability 0 never does, whatever the draw.
    pub fn draw<R: RandomSource + ?Sized>(&self, rng: &mut R) -> bool {
        let draw = rng.next_unit();
        self.probability >= 1.0 || (self.probability > 0.0 && draw < self.probability)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOption {
    pub id: String,
    pub label: String,
    pub conditions: Option<Vec<Condition>>,
    pub effects: Vec<Effect>,
    pub feedback: Option<String>,
    pub explanation: Option<String>,
    pub badge: Option<String>,
    pub bonus: Option<Bonus>,
    pub next: Next,
}

impl ScenarioOption {
    pub fn is_conditioned(&self) -> bool {
        self.conditions.is_some()
    }

    /// Whether the option's conditions hold. Unconditioned options always apply.
    pub fn applies(&self, store: &Store) -> Result<bool, EvalError> {
        match &self.conditions {
            Some(conditions) => condition::evaluate(conditions, store),
            None => Ok(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub prompt: String,
    pub mode: NodeMode,
    pub options: Vec<ScenarioOption>,
    pub fallback: Option<ScenarioOption>,
}

impl Node {
    pub fn option(&self, id: &str) -> Option<&ScenarioOption> {
        self.options.iter().find(|option| option.id == id)
    }

    fn successors(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .chain(self.fallback.as_ref())
            .filter_map(|option| match &option.next {
                Next::Node(id) => Some(id.as_str()),
                Next::End => None,
            })
    }
}

/// One row of the host-facing sidebar.
#[derive(Debug, Clone, PartialEq)]
pub struct SidebarEntry {
    pub path: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    title: String,
    start: String,
    initial: Store,
    schema: Schema,
    derived: DerivedFields,
    sidebar: Vec<SidebarEntry>,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Scenario {
    /// Reads and compiles a YAML (or JSON) scenario document.
    pub fn load<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        debug!("Loading scenario document {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, options)
    }

    pub fn from_yaml_str(text: &str, options: &LoadOptions) -> Result<Self, DocumentError> {
        let document: ScenarioDocument = serde_yaml::from_str(text)?;
        Self::compile(document, options)
    }

    pub fn compile(document: ScenarioDocument, options: &LoadOptions) -> Result<Self, DocumentError> {
        let ScenarioDocument {
            title,
            start,
            initial_state,
            schema: entries,
            aliases,
            derived,
            sidebar,
            nodes,
        } = document;

        if let Some(key) = initial_state.invalid_key() {
            return Err(DocumentError::InvalidKey(key));
        }
        let mut schema = Schema::infer(&initial_state);
        for (path, entry) in &entries {
            schema
                .constrain(path, entry)
                .map_err(definition(format!("schema entry `{path}`")))?;
        }
        let violation = schema
            .out_of_bounds(&initial_state)
            .map_err(|e| DocumentError::InitialState(e.into()))?;
        if let Some((path, value)) = violation {
            return Err(DocumentError::OutOfBounds { path, value });
        }

        let derived =
            DerivedFields::compile(&derived, &mut schema).map_err(definition("derived fields"))?;
        for (alias, target) in &aliases {
            schema
                .alias(alias, target)
                .map_err(definition(format!("alias `{alias}`")))?;
        }
        let initial = derived
            .recompute(&initial_state)
            .map_err(DocumentError::InitialState)?;

        let sidebar = sidebar
            .into_iter()
            .map(|path| {
                let (_, leaf) = schema.lookup(&path).ok_or_else(|| DocumentError::Definition {
                    context: "sidebar".into(),
                    source: DefinitionError::UnknownPath(path.clone()),
                })?;
                Ok(SidebarEntry {
                    label: leaf.label.clone(),
                    path,
                })
            })
            .collect::<Result<Vec<_>, DocumentError>>()?;

        if nodes.is_empty() {
            return Err(DocumentError::NoNodes);
        }
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if node.id == TERMINAL {
                return Err(DocumentError::ReservedNodeId(node.id.clone()));
            }
            if index.insert(node.id.clone(), position).is_some() {
                return Err(DocumentError::DuplicateNode(node.id.clone()));
            }
        }
        let compiled = nodes
            .iter()
            .map(|node| compile_node(node, &schema, &index, options))
            .collect::<Result<Vec<_>, _>>()?;

        let start = start.unwrap_or_else(|| nodes[0].id.clone());
        if !index.contains_key(&start) {
            return Err(DocumentError::UnknownStart(start));
        }

        let scenario = Self {
            title: title.unwrap_or_default(),
            start,
            initial,
            schema,
            derived,
            sidebar,
            nodes: compiled,
            index,
        };
        for node in scenario.unreachable() {
            warn!(node, "node is unreachable from the start node");
        }
        info!(
            title = %scenario.title,
            nodes = scenario.nodes.len(),
            derived = scenario.derived.len(),
            "Scenario loaded"
        );
        Ok(scenario)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    /// The initial snapshot with derived fields already computed.
    pub fn initial_state(&self) -> &Store {
        &self.initial
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn derived(&self) -> &DerivedFields {
        &self.derived
    }

    pub fn sidebar(&self) -> &[SidebarEntry] {
        &self.sidebar
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    /// Node ids that no path from the start node reaches, in document order.
    pub fn unreachable(&self) -> Vec<&str> {
        let mut seen = HashSet::from([self.start.as_str()]);
        let mut queue = VecDeque::from([self.start.as_str()]);
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.node(id) else { continue };
            for next in node.successors() {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        self.nodes
            .iter()
            .map(|node| node.id.as_str())
            .filter(|id| !seen.contains(id))
            .collect()
    }
}

fn definition(context: impl Into<String>) -> impl FnOnce(DefinitionError) -> DocumentError {
    let context = context.into();
    move |source| DocumentError::Definition { context, source }
}

fn compile_node(
    node: &NodeDocument,
    schema: &Schema,
    index: &HashMap<String, usize>,
    options: &LoadOptions,
) -> Result<Node, DocumentError> {
    if node.options.is_empty() && node.fallback.is_none() {
        return Err(DocumentError::EmptyNode(node.id.clone()));
    }

    let conditioned = node
        .options
        .iter()
        .filter(|option| option.conditions.is_some())
        .count();
    let unconditioned = node.options.len() - conditioned;
    let mode = match node.mode {
        Some(mode) => mode,
        None if unconditioned == 0 => NodeMode::Auto,
        None if conditioned == 0 => NodeMode::Choice,
        None => match options.mixed_nodes {
            MixedNodePolicy::Reject => return Err(DocumentError::AmbiguousNode(node.id.clone())),
            MixedNodePolicy::ConditionedFirst => {
                warn!(node = %node.id, "mixed node loaded as auto-resolving");
                NodeMode::Auto
            }
        },
    };
    if mode == NodeMode::Auto {
        if conditioned == 0 && node.fallback.is_none() {
            return Err(DocumentError::UngatedAutoNode(node.id.clone()));
        }
        if unconditioned > 0 {
            warn!(
                node = %node.id,
                ignored = unconditioned,
                "unconditioned options of an auto node are never selected"
            );
        }
    }

    let mut seen = HashSet::new();
    let mut compiled = Vec::with_capacity(node.options.len());
    for (position, option) in node.options.iter().enumerate() {
        let id = option.id.clone().unwrap_or_else(|| position.to_string());
        if !seen.insert(id.clone()) {
            return Err(DocumentError::DuplicateOption {
                node: node.id.clone(),
                option: id,
            });
        }
        compiled.push(compile_option(&node.id, id, option, schema, index)?);
    }

    let fallback = match &node.fallback {
        Some(option) => {
            if option.conditions.is_some() {
                warn!(node = %node.id, "conditions on a fallback are ignored");
            }
            let id = option.id.clone().unwrap_or_else(|| "fallback".into());
            let mut fallback = compile_option(&node.id, id, option, schema, index)?;
            fallback.conditions = None;
            Some(fallback)
        }
        None => None,
    };

    Ok(Node {
        id: node.id.clone(),
        prompt: node.prompt.clone(),
        mode,
        options: compiled,
        fallback,
    })
}

fn compile_option(
    node: &str,
    id: String,
    option: &OptionDocument,
    schema: &Schema,
    index: &HashMap<String, usize>,
) -> Result<ScenarioOption, DocumentError> {
    let context = format!("node `{node}` option `{id}`");

    let conditions = option
        .conditions
        .as_ref()
        .map(|list| {
            list.iter()
                .map(|condition| condition.resolve(schema))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
        .map_err(definition(context.clone()))?;
    let effects = compile_effects(&option.effects, schema).map_err(definition(context.clone()))?;

    let bonus = match &option.bonus {
        Some(bonus) => {
            if !(0.0..=1.0).contains(&bonus.probability) {
                return Err(DocumentError::InvalidProbability {
                    node: node.to_string(),
                    option: id,
                    probability: bonus.probability,
                });
            }
            Some(Bonus {
                probability: bonus.probability,
                effects: compile_effects(&bonus.effects, schema)
                    .map_err(definition(format!("{context} bonus")))?,
                feedback: bonus.feedback.clone(),
            })
        }
        None => None,
    };

    let next = match option.next.as_deref() {
        None | Some(TERMINAL) => Next::End,
        Some(target) if index.contains_key(target) => Next::Node(target.to_string()),
        Some(target) => {
            return Err(DocumentError::DanglingReference {
                node: node.to_string(),
                option: id,
                target: target.to_string(),
            })
        }
    };

    Ok(ScenarioOption {
        id,
        label: option.label.clone(),
        conditions,
        effects,
        feedback: option.feedback.clone(),
        explanation: option.explanation.clone(),
        badge: option.badge.clone(),
        bonus,
        next,
    })
}

fn compile_effects(specs: &[EffectSpec], schema: &Schema) -> Result<Vec<Effect>, DefinitionError> {
    specs.iter().map(|spec| Effect::compile(spec, schema)).collect()
}
