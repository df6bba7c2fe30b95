//! ## scenaria-core::effect
//! **Declared mutations of the attribute store**
//!
//! An effect list is a small transaction: effects run strictly in order, each
//! one sees the results of the ones before it, and the caller only receives
//! the resulting store once the whole list succeeded.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DefinitionError, EvalError};
use crate::expr::Expression;
use crate::store::{Bounds, LeafType, Schema, Store, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Add,
    Set,
    #[serde(alias = "mul")]
    Multiply,
    #[serde(alias = "setByFormula")]
    SetByFormula,
}

impl EffectKind {
    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Add => "add",
            EffectKind::Set => "set",
            EffectKind::Multiply => "multiply",
            EffectKind::SetByFormula => "set_by_formula",
        }
    }
}

/// An effect as written in a scenario document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectSpec {
    pub path: String,
    pub op: EffectKind,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub formula: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Add(Value),
    Set(Value),
    Multiply(f64),
    SetByFormula(Expression),
}

/// A validated effect, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    path: String,
    operation: Operation,
    bounds: Bounds,
}

impl Effect {
    /// Validates `spec` against the schema: the target must be a writable
    /// leaf and the operand must suit both the operation and the leaf type.
    pub fn compile(spec: &EffectSpec, schema: &Schema) -> Result<Self, DefinitionError> {
        let leaf = schema.writable(&spec.path)?;
        let path = spec.path.clone();
        let unsupported = || DefinitionError::UnsupportedOperation {
            op: spec.op.name(),
            path: path.clone(),
            found: leaf.ty,
        };
        let literal = || {
            spec.value.clone().ok_or(DefinitionError::MissingOperand {
                op: spec.op.name(),
                path: path.clone(),
                operand: "value",
            })
        };
        let mismatch = |expected: LeafType, found: LeafType| DefinitionError::TypeMismatch {
            context: format!("{} {}", path, spec.op.name()),
            expected,
            found,
        };

        let operation = match spec.op {
            EffectKind::Add => {
                let value = literal()?;
                match (leaf.ty, value.leaf_type()) {
                    (LeafType::Number | LeafType::Sequence, LeafType::Number) => {
                        Operation::Add(value)
                    }
                    (LeafType::Bool, _) => return Err(unsupported()),
                    (_, found) => return Err(mismatch(LeafType::Number, found)),
                }
            }
            EffectKind::Set => {
                let value = literal()?;
                if value.leaf_type() != leaf.ty {
                    return Err(mismatch(leaf.ty, value.leaf_type()));
                }
                Operation::Set(value)
            }
            EffectKind::Multiply => {
                if leaf.ty != LeafType::Number {
                    return Err(unsupported());
                }
                match literal()? {
                    Value::Number(factor) => Operation::Multiply(factor),
                    other => return Err(mismatch(LeafType::Number, other.leaf_type())),
                }
            }
            EffectKind::SetByFormula => {
                if leaf.ty == LeafType::Sequence {
                    return Err(unsupported());
                }
                let text = spec
                    .formula
                    .as_deref()
                    .ok_or(DefinitionError::MissingOperand {
                        op: spec.op.name(),
                        path: path.clone(),
                        operand: "formula",
                    })?;
                let expression = Expression::parse(text, schema)?;
                if expression.result_type() != leaf.ty {
                    return Err(mismatch(leaf.ty, expression.result_type()));
                }
                Operation::SetByFormula(expression)
            }
        };

        Ok(Self {
            path: spec.path.clone(),
            operation,
            bounds: leaf.bounds,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn kind(&self) -> EffectKind {
        match self.operation {
            Operation::Add(_) => EffectKind::Add,
            Operation::Set(_) => EffectKind::Set,
            Operation::Multiply(_) => EffectKind::Multiply,
            Operation::SetByFormula(_) => EffectKind::SetByFormula,
        }
    }

    /// Applies this effect, returning the new store. `store` is not modified.
    pub fn apply(&self, store: &Store) -> Result<Store, EvalError> {
        let current = store.get(&self.path)?;
        let unsupported = |found: LeafType| EvalError::UnsupportedOperation {
            op: self.kind().name(),
            path: self.path.clone(),
            found,
        };

        let next = match (&self.operation, current) {
            (Operation::Add(Value::Number(delta)), Value::Number(n)) => {
                Value::Number(self.finite(n + delta)?)
            }
            (Operation::Add(Value::Number(item)), Value::Sequence(items)) => {
                let mut items = items.clone();
                items.push(*item);
                Value::Sequence(items)
            }
            (Operation::Add(_), other) => return Err(unsupported(other.leaf_type())),
            (Operation::Set(value), _) => value.clone(),
            (Operation::Multiply(factor), Value::Number(n)) => {
                Value::Number(self.finite(n * factor)?)
            }
            (Operation::Multiply(_), other) => return Err(unsupported(other.leaf_type())),
            (Operation::SetByFormula(expression), _) => expression.evaluate(store)?,
        };

        let next = match next {
            Value::Number(n) => Value::Number(self.bounds.clamp(n)),
            other => other,
        };

        debug!(effect = %self, value = %next, "applying effect");
        Ok(store.set(&self.path, next)?)
    }

    fn finite(&self, n: f64) -> Result<f64, EvalError> {
        if n.is_finite() {
            Ok(n)
        } else {
            Err(EvalError::NonFinite {
                expression: self.to_string(),
            })
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Operation::Add(v) => write!(f, "{} add {}", self.path, v),
            Operation::Set(v) => write!(f, "{} set {}", self.path, v),
            Operation::Multiply(v) => write!(f, "{} multiply {}", self.path, v),
            Operation::SetByFormula(e) => write!(f, "{} set_by_formula `{}`", self.path, e),
        }
    }
}

/// Folds `effects` over `store` in order. On error nothing is published and
/// the caller still holds the original store.
pub fn apply(effects: &[Effect], store: &Store) -> Result<Store, EvalError> {
    effects
        .iter()
        .try_fold(store.clone(), |acc, effect| effect.apply(&acc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SchemaEntry;
    use proptest::prelude::*;

    fn store() -> Store {
        serde_yaml::from_str(
            "score: 650\ncash: 1000\ncc: { balance: 300, limit: 1000 }\nriskFlags: []\nfrozen: false\n",
        )
        .unwrap()
    }

    fn compile(yaml: &str, schema: &Schema) -> Result<Effect, DefinitionError> {
        let spec: EffectSpec = serde_yaml::from_str(yaml).unwrap();
        Effect::compile(&spec, schema)
    }

    fn effects(yaml: &[&str], schema: &Schema) -> Vec<Effect> {
        yaml.iter().map(|y| compile(y, schema).unwrap()).collect()
    }

    #[test]
    fn add_set_multiply() {
        let store = store();
        let schema = Schema::infer(&store);
        let list = effects(
            &[
                "{ path: cc.balance, op: add, value: 200 }",
                "{ path: cash, op: set, value: 50 }",
                "{ path: cc.limit, op: mul, value: 1.5 }",
                "{ path: frozen, op: set, value: true }",
            ],
            &schema,
        );
        let out = apply(&list, &store).unwrap();
        assert_eq!(out.get("cc.balance").unwrap(), &Value::Number(500.0));
        assert_eq!(out.get("cash").unwrap(), &Value::Number(50.0));
        assert_eq!(out.get("cc.limit").unwrap(), &Value::Number(1500.0));
        assert_eq!(out.get("frozen").unwrap(), &Value::Bool(true));
    }

    #[test]
    fn effects_see_earlier_results() {
        let store = store();
        let schema = Schema::infer(&store);
        let list = effects(
            &[
                "{ path: cc.balance, op: add, value: 200 }",
                "{ path: cash, op: setByFormula, formula: cash - cc.balance }",
            ],
            &schema,
        );
        let out = apply(&list, &store).unwrap();
        assert_eq!(out.get("cash").unwrap(), &Value::Number(500.0));
    }

    #[test]
    fn add_appends_to_sequences() {
        let store = store();
        let schema = Schema::infer(&store);
        let list = effects(&["{ path: riskFlags, op: add, value: 3 }"], &schema);
        let out = apply(&list, &store).unwrap();
        assert_eq!(out.get("riskFlags").unwrap(), &Value::Sequence(vec![3.0]));
    }

    #[test]
    fn rejects_ill_typed_effects() {
        let schema = Schema::infer(&store());
        for yaml in [
            "{ path: riskFlags, op: multiply, value: 2 }",
            "{ path: frozen, op: add, value: 1 }",
            "{ path: score, op: set, value: true }",
            "{ path: score, op: set_by_formula, formula: score > 1 }",
            "{ path: score, op: add }",
            "{ path: score, op: set_by_formula }",
            "{ path: cc.apr, op: set, value: 1 }",
            "{ path: riskFlags, op: add, value: [1] }",
        ] {
            assert!(compile(yaml, &schema).is_err(), "{yaml} should be rejected");
        }
    }

    #[test]
    fn clamps_to_declared_bounds() {
        let store = store();
        let mut schema = Schema::infer(&store);
        schema
            .constrain(
                "score",
                &SchemaEntry {
                    min: Some(300.0),
                    max: Some(850.0),
                    ..Default::default()
                },
            )
            .unwrap();
        let list = effects(&["{ path: score, op: add, value: 500 }"], &schema);
        let out = apply(&list, &store).unwrap();
        assert_eq!(out.get("score").unwrap(), &Value::Number(850.0));
    }

    #[test]
    fn failed_list_publishes_nothing() {
        let store: Store = serde_yaml::from_str("a: 1\nb: 0\n").unwrap();
        let schema = Schema::infer(&store);
        let list = effects(
            &[
                "{ path: a, op: add, value: 1 }",
                "{ path: a, op: set_by_formula, formula: a / b }",
            ],
            &schema,
        );
        assert!(matches!(
            apply(&list, &store),
            Err(EvalError::DivisionByZero { .. })
        ));
        assert_eq!(store.get("a").unwrap(), &Value::Number(1.0));
    }

    proptest! {
        #[test]
        fn apply_never_mutates_its_input(
            delta in -1.0e6f64..1.0e6,
            factor in -10.0f64..10.0,
            flag in any::<bool>(),
        ) {
            let store = store();
            let snapshot = store.clone();
            let schema = Schema::infer(&store);
            let specs = [
                EffectSpec { path: "cc.balance".into(), op: EffectKind::Add, value: Some(Value::Number(delta)), formula: None },
                EffectSpec { path: "cash".into(), op: EffectKind::Multiply, value: Some(Value::Number(factor)), formula: None },
                EffectSpec { path: "frozen".into(), op: EffectKind::Set, value: Some(Value::Bool(flag)), formula: None },
                EffectSpec { path: "riskFlags".into(), op: EffectKind::Add, value: Some(Value::Number(delta)), formula: None },
            ];
            let list: Vec<Effect> = specs.iter().map(|s| Effect::compile(s, &schema).unwrap()).collect();
            let _ = apply(&list, &store).unwrap();
            prop_assert_eq!(&store, &snapshot);
        }

        #[test]
        fn bounded_leaves_stay_in_range(delta in -1.0e4f64..1.0e4, factor in -5.0f64..5.0) {
            let store = store();
            let mut schema = Schema::infer(&store);
            let entry = SchemaEntry { min: Some(300.0), max: Some(850.0), ..Default::default() };
            schema.constrain("score", &entry).unwrap();
            let specs = [
                EffectSpec { path: "score".into(), op: EffectKind::Add, value: Some(Value::Number(delta)), formula: None },
                EffectSpec { path: "score".into(), op: EffectKind::Multiply, value: Some(Value::Number(factor)), formula: None },
            ];
            for spec in &specs {
                let effect = Effect::compile(spec, &schema).unwrap();
                let out = effect.apply(&store).unwrap();
                let Value::Number(score) = out.get("score").unwrap() else {
                    panic!("score is numeric");
                };
                prop_assert!((300.0..=850.0).contains(score));
            }
        }
    }
}
