//! ## scenaria-core::condition
//! **Declarative predicates over store paths**
//!
//! A condition list is a conjunction; the empty list always holds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DefinitionError, EvalError};
use crate::store::{LeafType, Schema, Store, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn is_ordering(self) -> bool {
        matches!(self, CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompareOp::Eq => "eq",
            CompareOp::Neq => "neq",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        };
        f.write_str(name)
    }
}

/// `path op value`, e.g. `stats.onTimeStreak gte 2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    pub path: String,
    #[serde(alias = "operator")]
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    /// Checks the condition against the schema and rewrites an alias path to
    /// its canonical form.
    pub fn resolve(&self, schema: &Schema) -> Result<Condition, DefinitionError> {
        let (canonical, spec) = schema
            .lookup(&self.path)
            .ok_or_else(|| DefinitionError::UnknownPath(self.path.clone()))?;
        let context = self.to_string();

        if spec.ty == LeafType::Sequence || self.value.leaf_type() == LeafType::Sequence {
            return Err(DefinitionError::UnsupportedOperation {
                op: "compare",
                path: self.path.clone(),
                found: LeafType::Sequence,
            });
        }
        if spec.ty != self.value.leaf_type() {
            return Err(DefinitionError::TypeMismatch {
                context,
                expected: spec.ty,
                found: self.value.leaf_type(),
            });
        }
        if self.op.is_ordering() && spec.ty != LeafType::Number {
            return Err(DefinitionError::TypeMismatch {
                context,
                expected: LeafType::Number,
                found: spec.ty,
            });
        }

        Ok(Condition {
            path: canonical.to_string(),
            op: self.op,
            value: self.value.clone(),
        })
    }

    /// Evaluates the condition. Type mismatches are errors, never coerced.
    pub fn holds(&self, store: &Store) -> Result<bool, EvalError> {
        let current = store.get(&self.path)?;
        let mismatch = |expected: LeafType, found: LeafType| EvalError::TypeMismatch {
            context: self.to_string(),
            expected,
            found,
        };

        match (current, &self.value) {
            (Value::Number(a), Value::Number(b)) => Ok(match self.op {
                CompareOp::Eq => a == b,
                CompareOp::Neq => a != b,
                CompareOp::Gt => a > b,
                CompareOp::Gte => a >= b,
                CompareOp::Lt => a < b,
                CompareOp::Lte => a <= b,
            }),
            (Value::Bool(a), Value::Bool(b)) => match self.op {
                CompareOp::Eq => Ok(a == b),
                CompareOp::Neq => Ok(a != b),
                _ => Err(mismatch(LeafType::Number, LeafType::Bool)),
            },
            (current, literal) => Err(mismatch(current.leaf_type(), literal.leaf_type())),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.path, self.op, self.value)
    }
}

/// Evaluates a conjunction. The empty list is vacuously true.
pub fn evaluate(conditions: &[Condition], store: &Store) -> Result<bool, EvalError> {
    for condition in conditions {
        if !condition.holds(store)? {
            return Ok(false);
        }
    }
    Ok(true)
}
