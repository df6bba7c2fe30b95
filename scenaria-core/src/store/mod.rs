//! ## scenaria-core::store
//! **Immutable, path-addressed simulation state**
//!
//! The store is a tree of named groups whose leaves are numbers, booleans or
//! numeric sequences. Paths are dot-separated (`cc.balance`). Every write
//! returns a new [`Store`]; untouched subtrees are shared between the old and
//! the new value, so earlier snapshots stay valid for audit and rollback.

mod schema;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use schema::{Bounds, LeafSpec, Schema, SchemaEntry};

/// The type of a leaf attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafType {
    Number,
    Bool,
    Sequence,
}

impl fmt::Display for LeafType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeafType::Number => "number",
            LeafType::Bool => "boolean",
            LeafType::Sequence => "sequence",
        };
        f.write_str(name)
    }
}

/// A leaf value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Sequence(Vec<f64>),
}

impl Value {
    pub fn leaf_type(&self) -> LeafType {
        match self {
            Value::Number(_) => LeafType::Number,
            Value::Bool(_) => LeafType::Bool,
            Value::Sequence(_) => LeafType::Sequence,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A node of the attribute tree: either a leaf value or a named group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Leaf(Value),
    Group(Arc<BTreeMap<String, Node>>),
}

/// Immutable attribute store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    root: Arc<BTreeMap<String, Node>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the leaf at `path`.
    pub fn get(&self, path: &str) -> Result<&Value, StoreError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let mut node = self
            .root
            .get(first)
            .ok_or_else(|| StoreError::UnknownPath(path.to_string()))?;

        for segment in segments {
            node = match node {
                Node::Group(children) => children
                    .get(segment)
                    .ok_or_else(|| StoreError::UnknownPath(path.to_string()))?,
                Node::Leaf(_) => return Err(StoreError::UnknownPath(path.to_string())),
            };
        }

        match node {
            Node::Leaf(value) => Ok(value),
            Node::Group(_) => Err(StoreError::NotALeaf(path.to_string())),
        }
    }

    /// Returns a new store with the leaf at `path` replaced by `value`.
    ///
    /// The path must already exist and the new value must have the same type
    /// as the current one. `self` is left untouched.
    pub fn set(&self, path: &str, value: Value) -> Result<Store, StoreError> {
        let segments: Vec<&str> = path.split('.').collect();
        let root = replace_in(&self.root, &segments, value, path)?;
        Ok(Store {
            root: Arc::new(root),
        })
    }

    /// Returns a new store with a new leaf at `path`, creating intermediate
    /// groups as needed. Used while assembling the initial snapshot.
    pub fn declare(&self, path: &str, value: Value) -> Result<Store, StoreError> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::UnknownPath(path.to_string()));
        }
        let root = declare_in(&self.root, &segments, value, path)?;
        Ok(Store {
            root: Arc::new(root),
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// All leaves in path order.
    pub fn leaves(&self) -> Vec<(String, &Value)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, "", &mut out);
        out
    }

    /// The first key (as written, with its parent path) that is empty or
    /// contains a `.`, which no dotted path could address.
    pub fn invalid_key(&self) -> Option<String> {
        find_invalid_key(&self.root, "")
    }

    /// Leaf-by-leaf differences between `self` (before) and `after`.
    pub fn diff<'a>(&'a self, after: &'a Store) -> Vec<(String, &'a Value, &'a Value)> {
        let before: BTreeMap<String, &Value> = self.leaves().into_iter().collect();
        after
            .leaves()
            .into_iter()
            .filter_map(|(path, new)| match before.get(&path) {
                Some(old) if *old != new => Some((path, *old, new)),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (path, value)) in self.leaves().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{path}: {value}")?;
        }
        f.write_str("}")
    }
}

fn replace_in(
    map: &BTreeMap<String, Node>,
    segments: &[&str],
    value: Value,
    path: &str,
) -> Result<BTreeMap<String, Node>, StoreError> {
    let (head, rest) = segments
        .split_first()
        .ok_or_else(|| StoreError::UnknownPath(path.to_string()))?;
    let existing = map
        .get(*head)
        .ok_or_else(|| StoreError::UnknownPath(path.to_string()))?;

    let replacement = match (existing, rest.is_empty()) {
        (Node::Leaf(current), true) => {
            if current.leaf_type() != value.leaf_type() {
                return Err(StoreError::TypeMismatch {
                    path: path.to_string(),
                    expected: value.leaf_type(),
                    found: current.leaf_type(),
                });
            }
            Node::Leaf(value)
        }
        (Node::Group(children), false) => {
            Node::Group(Arc::new(replace_in(children, rest, value, path)?))
        }
        (Node::Group(_), true) => return Err(StoreError::NotALeaf(path.to_string())),
        (Node::Leaf(_), false) => return Err(StoreError::UnknownPath(path.to_string())),
    };

    // Siblings are cloned as `Arc` handles, the subtrees themselves are shared.
    let mut updated = map.clone();
    updated.insert((*head).to_string(), replacement);
    Ok(updated)
}

fn declare_in(
    map: &BTreeMap<String, Node>,
    segments: &[&str],
    value: Value,
    path: &str,
) -> Result<BTreeMap<String, Node>, StoreError> {
    let (head, rest) = segments
        .split_first()
        .ok_or_else(|| StoreError::UnknownPath(path.to_string()))?;

    let replacement = match (map.get(*head), rest.is_empty()) {
        (None, true) => Node::Leaf(value),
        (None, false) => Node::Group(Arc::new(declare_in(&BTreeMap::new(), rest, value, path)?)),
        (Some(Node::Group(children)), false) => {
            Node::Group(Arc::new(declare_in(children, rest, value, path)?))
        }
        (Some(_), _) => return Err(StoreError::AlreadyDeclared(path.to_string())),
    };

    let mut updated = map.clone();
    updated.insert((*head).to_string(), replacement);
    Ok(updated)
}

fn collect_leaves<'a>(
    map: &'a BTreeMap<String, Node>,
    prefix: &str,
    out: &mut Vec<(String, &'a Value)>,
) {
    for (name, node) in map.iter() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match node {
            Node::Leaf(value) => out.push((path, value)),
            Node::Group(children) => collect_leaves(children, &path, out),
        }
    }
}

fn find_invalid_key(map: &BTreeMap<String, Node>, prefix: &str) -> Option<String> {
    for (name, node) in map.iter() {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        if name.is_empty() || name.contains('.') {
            return Some(path);
        }
        if let Node::Group(children) = node {
            if let Some(found) = find_invalid_key(children, &path) {
                return Some(found);
            }
        }
    }
    None
}
