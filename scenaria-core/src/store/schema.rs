//! Declared attribute paths, their leaf types and constraints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{LeafType, Store};
use crate::error::{DefinitionError, StoreError};

/// Inclusive numeric bounds applied whenever an effect writes the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bounds {
    pub fn clamp(&self, n: f64) -> f64 {
        let n = self.min.map_or(n, |min| n.max(min));
        self.max.map_or(n, |max| n.min(max))
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Constraint block for one path as written in a scenario document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaEntry {
    #[serde(default, rename = "type")]
    pub ty: Option<LeafType>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafSpec {
    pub ty: LeafType,
    pub bounds: Bounds,
    pub derived: bool,
    pub label: Option<String>,
}

/// The set of declared leaves. Formulas, conditions and effects are resolved
/// against it once, when the document loads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    leaves: BTreeMap<String, LeafSpec>,
    aliases: BTreeMap<String, String>,
}

impl Schema {
    /// Declares every leaf of `store` with its current type.
    pub fn infer(store: &Store) -> Self {
        let leaves = store
            .leaves()
            .into_iter()
            .map(|(path, value)| {
                let spec = LeafSpec {
                    ty: value.leaf_type(),
                    bounds: Bounds::default(),
                    derived: false,
                    label: None,
                };
                (path, spec)
            })
            .collect();
        Self {
            leaves,
            aliases: BTreeMap::new(),
        }
    }

    /// Attaches a document constraint block to an inferred leaf.
    pub fn constrain(&mut self, path: &str, entry: &SchemaEntry) -> Result<(), DefinitionError> {
        let spec = self
            .leaves
            .get_mut(path)
            .ok_or_else(|| DefinitionError::UnknownPath(path.to_string()))?;

        if let Some(ty) = entry.ty {
            if ty != spec.ty {
                return Err(DefinitionError::TypeMismatch {
                    context: format!("schema entry `{path}`"),
                    expected: ty,
                    found: spec.ty,
                });
            }
        }

        let bounds = Bounds {
            min: entry.min,
            max: entry.max,
        };
        if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
            if min > max {
                return Err(DefinitionError::InvertedBounds {
                    path: path.to_string(),
                    min,
                    max,
                });
            }
        }
        if !bounds.is_empty() && spec.ty != LeafType::Number {
            return Err(DefinitionError::UnsupportedOperation {
                op: "bounds",
                path: path.to_string(),
                found: spec.ty,
            });
        }
        spec.bounds = bounds;
        spec.label = entry.label.clone();
        Ok(())
    }

    /// Registers `alias` as a read-only name for `target`.
    pub fn alias(&mut self, alias: &str, target: &str) -> Result<(), DefinitionError> {
        if !self.leaves.contains_key(target) {
            return Err(DefinitionError::UnknownPath(target.to_string()));
        }
        if self.leaves.contains_key(alias) || self.aliases.contains_key(alias) {
            return Err(StoreError::AlreadyDeclared(alias.to_string()).into());
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    /// Declares a derived leaf.
    pub fn declare_derived(&mut self, name: &str, ty: LeafType) -> Result<(), DefinitionError> {
        if self.leaves.contains_key(name) || self.aliases.contains_key(name) {
            return Err(DefinitionError::ShadowsAttribute(name.to_string()));
        }
        self.leaves.insert(
            name.to_string(),
            LeafSpec {
                ty,
                bounds: Bounds::default(),
                derived: true,
                label: None,
            },
        );
        Ok(())
    }

    /// Maps an alias to its canonical path; canonical paths map to themselves.
    pub fn resolve<'a>(&'a self, path: &'a str) -> Option<&'a str> {
        if self.leaves.contains_key(path) {
            Some(path)
        } else {
            self.aliases.get(path).map(String::as_str)
        }
    }

    /// Looks up a path, following aliases.
    pub fn lookup(&self, path: &str) -> Option<(&str, &LeafSpec)> {
        let canonical = self.resolve(path)?;
        self.leaves
            .get_key_value(canonical)
            .map(|(k, spec)| (k.as_str(), spec))
    }

    pub fn is_alias(&self, path: &str) -> bool {
        self.aliases.contains_key(path)
    }

    /// Resolves a path that an effect wants to write.
    pub fn writable(&self, path: &str) -> Result<&LeafSpec, DefinitionError> {
        if self.is_alias(path) {
            return Err(DefinitionError::AliasNotWritable {
                path: path.to_string(),
            });
        }
        let spec = self
            .leaves
            .get(path)
            .ok_or_else(|| DefinitionError::UnknownPath(path.to_string()))?;
        if spec.derived {
            return Err(DefinitionError::DerivedNotWritable {
                path: path.to_string(),
            });
        }
        Ok(spec)
    }

    pub fn leaves(&self) -> impl Iterator<Item = (&str, &LeafSpec)> {
        self.leaves.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First bounded leaf of `store` whose value lies outside its bounds.
    pub fn out_of_bounds(&self, store: &Store) -> Result<Option<(String, f64)>, StoreError> {
        for (path, spec) in self.leaves.iter().filter(|(_, s)| !s.bounds.is_empty()) {
            if let Some(n) = store.get(path)?.as_number() {
                if spec.bounds.clamp(n) != n {
                    return Ok(Some((path.clone(), n)));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;

    fn schema() -> Schema {
        let store: Store =
            serde_yaml::from_str("score: 650\ncc: { balance: 300 }\nfrozen: false\n").unwrap();
        Schema::infer(&store)
    }

    #[test]
    fn infers_types_from_snapshot() {
        let schema = schema();
        assert_eq!(schema.lookup("cc.balance").unwrap().1.ty, LeafType::Number);
        assert_eq!(schema.lookup("frozen").unwrap().1.ty, LeafType::Bool);
        assert!(schema.lookup("cc").is_none());
    }

    #[test]
    fn bounds_only_on_numbers() {
        let mut schema = schema();
        let entry = SchemaEntry {
            min: Some(0.0),
            ..Default::default()
        };
        assert!(schema.constrain("score", &entry).is_ok());
        assert!(matches!(
            schema.constrain("frozen", &entry),
            Err(DefinitionError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let mut schema = schema();
        let entry = SchemaEntry {
            min: Some(900.0),
            max: Some(300.0),
            ..Default::default()
        };
        assert_eq!(
            schema.constrain("score", &entry),
            Err(DefinitionError::InvertedBounds {
                path: "score".into(),
                min: 900.0,
                max: 300.0
            })
        );
        assert!(schema.lookup("score").unwrap().1.bounds.is_empty());
    }

    #[test]
    fn misspelled_entry_fields_are_rejected() {
        let err = serde_yaml::from_str::<SchemaEntry>("{ minimum: 300 }").unwrap_err();
        assert!(err.to_string().contains("minimum"), "{err}");
    }

    #[test]
    fn declared_type_must_match_snapshot() {
        let mut schema = schema();
        let entry = SchemaEntry {
            ty: Some(LeafType::Bool),
            ..Default::default()
        };
        assert!(matches!(
            schema.constrain("score", &entry),
            Err(DefinitionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn aliases_are_read_only() {
        let mut schema = schema();
        schema.alias("legacy.score", "score").unwrap();
        assert_eq!(schema.resolve("legacy.score"), Some("score"));
        assert!(matches!(
            schema.writable("legacy.score"),
            Err(DefinitionError::AliasNotWritable { .. })
        ));
    }

    #[test]
    fn reports_out_of_bounds_leaves() {
        let store: Store = serde_yaml::from_str("score: 900\ncash: 10\n").unwrap();
        let mut schema = Schema::infer(&store);
        let entry = SchemaEntry {
            min: Some(300.0),
            max: Some(850.0),
            ..Default::default()
        };
        schema.constrain("score", &entry).unwrap();
        assert_eq!(
            schema.out_of_bounds(&store).unwrap(),
            Some(("score".to_string(), 900.0))
        );
        let fixed = store.set("score", Value::Number(850.0)).unwrap();
        assert_eq!(schema.out_of_bounds(&fixed).unwrap(), None);
    }
}
