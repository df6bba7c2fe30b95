//! Error types shared by the store, the expression language and the rule
//! evaluators.

use thiserror::Error;

use crate::store::LeafType;

/// Failures of direct store access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("unknown attribute path `{0}`")]
    UnknownPath(String),

    #[error("attribute path `{0}` names a group, not a value")]
    NotALeaf(String),

    #[error("attribute `{path}` holds a {found}, cannot store a {expected}")]
    TypeMismatch {
        path: String,
        expected: LeafType,
        found: LeafType,
    },

    #[error("attribute path `{0}` is already declared")]
    AlreadyDeclared(String),
}

/// A formula that could not be parsed or resolved against the schema.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset} in `{expression}`")]
pub struct ParseError {
    pub expression: String,
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(expression: &str, offset: usize, message: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            offset,
            message: message.into(),
        }
    }
}

/// Failures while evaluating conditions, formulas or effects against a store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("type mismatch in `{context}`: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: LeafType,
        found: LeafType,
    },

    #[error("division by zero in `{expression}`")]
    DivisionByZero { expression: String },

    #[error("`{expression}` produced a non-finite number")]
    NonFinite { expression: String },

    #[error("operation `{op}` is not supported on {found} attribute `{path}`")]
    UnsupportedOperation {
        op: &'static str,
        path: String,
        found: LeafType,
    },
}

/// Load-time problems with a single condition, effect or derived field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("unknown attribute path `{0}`")]
    UnknownPath(String),

    #[error("`{context}` expects a {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: LeafType,
        found: LeafType,
    },

    #[error("operation `{op}` on `{path}` requires a {operand}")]
    MissingOperand {
        op: &'static str,
        path: String,
        operand: &'static str,
    },

    #[error("operation `{op}` is not supported on {found} attribute `{path}`")]
    UnsupportedOperation {
        op: &'static str,
        path: String,
        found: LeafType,
    },

    #[error("bounds of `{path}` are inverted: min {min} is greater than max {max}")]
    InvertedBounds { path: String, min: f64, max: f64 },

    #[error("`{path}` is an alias and cannot be written")]
    AliasNotWritable { path: String },

    #[error("`{path}` is a derived field and is recomputed after every transition")]
    DerivedNotWritable { path: String },

    #[error("derived field `{field}` references `{name}`, which is declared later")]
    ForwardReference { field: String, name: String },

    #[error("derived field `{field}` references itself")]
    SelfReference { field: String },

    #[error("derived field `{0}` shadows an existing attribute")]
    ShadowsAttribute(String),

    #[error("derived field `{0}` is declared twice")]
    DuplicateField(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
