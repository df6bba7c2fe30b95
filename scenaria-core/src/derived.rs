//! ## scenaria-core::derived
//! **Ordered pipeline of computed attributes**
//!
//! Derived fields are evaluated in declaration order after every completed
//! transition. Each result is written into the working store before the next
//! field runs, so a field may read raw attributes and any field declared
//! before it. Forward references and self references are rejected when the
//! pipeline is compiled.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{DefinitionError, EvalError};
use crate::expr::{self, Expression};
use crate::store::{Schema, Store};

/// A derived field as written in a scenario document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedSpec {
    pub name: String,
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedField {
    pub name: String,
    pub expression: Expression,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedFields {
    fields: Vec<DerivedField>,
}

impl DerivedFields {
    /// Compiles `specs` in order, declaring each field in `schema` once its
    /// formula has been checked. A formula can therefore only see the fields
    /// declared before it.
    pub fn compile(specs: &[DerivedSpec], schema: &mut Schema) -> Result<Self, DefinitionError> {
        let mut seen = HashSet::new();
        for spec in specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(DefinitionError::DuplicateField(spec.name.clone()));
            }
        }

        let mut fields = Vec::with_capacity(specs.len());
        for (idx, spec) in specs.iter().enumerate() {
            let later: HashSet<&str> = specs[idx + 1..].iter().map(|s| s.name.as_str()).collect();
            let tree = expr::parse_syntax(&spec.formula)?;
            for path in tree.paths() {
                if path == spec.name {
                    return Err(DefinitionError::SelfReference {
                        field: spec.name.clone(),
                    });
                }
                if schema.lookup(path).is_none() && later.contains(path) {
                    return Err(DefinitionError::ForwardReference {
                        field: spec.name.clone(),
                        name: path.to_string(),
                    });
                }
            }

            let expression = Expression::parse(&spec.formula, schema)?;
            schema.declare_derived(&spec.name, expression.result_type())?;
            fields.push(DerivedField {
                name: spec.name.clone(),
                expression,
            });
        }

        Ok(Self { fields })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedField> {
        self.fields.iter()
    }

    /// Recomputes every field over `store`. Fields missing from the store
    /// (the initial snapshot) are declared on the way.
    pub fn recompute(&self, store: &Store) -> Result<Store, EvalError> {
        self.fields.iter().try_fold(store.clone(), |acc, field| {
            let value = field.expression.evaluate(&acc)?;
            trace!(field = %field.name, value = %value, "recomputed derived field");
            let next = if acc.contains(&field.name) {
                acc.set(&field.name, value)?
            } else {
                acc.declare(&field.name, value)?
            };
            Ok(next)
        })
    }
}
