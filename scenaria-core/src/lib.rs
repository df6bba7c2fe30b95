//! # scenaria-core
//!
//! Rule evaluation layer for scenario simulations.
//! Everything here is pure: no I/O, no global state, no randomness.
//!
//! ### Key Submodules:
//! - `store`: Immutable, path-addressed attribute store and its schema
//! - `expr`: Formula language (nom parser, type checker, tree-walking interpreter)
//! - `condition`: Conjunctive `{path, op, value}` predicates
//! - `effect`: Ordered store mutations applied as a single fold
//! - `derived`: Computed attributes recomputed after every transition

pub mod condition;
pub mod derived;
pub mod effect;
pub mod error;
pub mod expr;
pub mod store;

pub mod prelude {
    pub use crate::condition::{CompareOp, Condition};
    pub use crate::derived::{DerivedFields, DerivedSpec};
    pub use crate::effect::{Effect, EffectKind, EffectSpec};
    pub use crate::error::*;
    pub use crate::expr::Expression;
    pub use crate::store::{Bounds, LeafType, Schema, SchemaEntry, Store, Value};
}

pub use error::{DefinitionError, EvalError, ParseError, StoreError};
