//! ## scenaria-core::expr
//! **Formula language for derived fields and computed effects**
//!
//! A restricted arithmetic/boolean grammar, lowest precedence first:
//!
//! ```text
//! ternary     := or ( "?" ternary ":" ternary )?
//! or          := and ( "||" and )*
//! and         := equality ( "&&" equality )*
//! equality    := relational ( ("==" | "!=") relational )*
//! relational  := additive ( ("<=" | ">=" | "<" | ">") additive )*
//! additive    := term ( ("+" | "-") term )*
//! term        := unary ( ("*" | "/") unary )*
//! unary       := ("-" | "!") unary | primary
//! primary     := number | "true" | "false" | call | path | "(" ternary ")"
//! call        := builtin "(" ( ternary ( "," ternary )* )? ")"
//! ```
//!
//! Text is parsed into an explicit [`Expr`] tree, every path is resolved
//! against the [`Schema`] and the whole tree is type checked before an
//! [`Expression`] is handed out. Evaluation is a tree walk over a store
//! snapshot; nothing is ever delegated to host code.

mod check;
mod eval;
mod parser;

use std::fmt;

use crate::error::{EvalError, ParseError};
use crate::store::{LeafType, Schema, Store, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// The closed set of functions a formula may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Min,
    Max,
    Abs,
    Round,
    Floor,
    Ceil,
    Clamp,
    Len,
    Sum,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "abs" => Builtin::Abs,
            "round" => Builtin::Round,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "clamp" => Builtin::Clamp,
            "len" => Builtin::Len,
            "sum" => Builtin::Sum,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
            Builtin::Clamp => "clamp",
            Builtin::Len => "len",
            Builtin::Sum => "sum",
        }
    }
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
}

impl Expr {
    /// Every path the tree reads, in source order.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Path(path) => out.push(path),
            Expr::Unary(_, inner) => inner.collect_paths(out),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_paths(out);
                rhs.collect_paths(out);
            }
            Expr::Ternary(cond, then, otherwise) => {
                cond.collect_paths(out);
                then.collect_paths(out);
                otherwise.collect_paths(out);
            }
            Expr::Call(_, args) => args.iter().for_each(|arg| arg.collect_paths(out)),
        }
    }
}

/// Parses `text` into a tree without resolving any path.
pub fn parse_syntax(text: &str) -> Result<Expr, ParseError> {
    parser::parse(text)
}

/// A parsed, resolved and type-checked formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
    ty: LeafType,
}

impl Expression {
    /// Parses `text` and resolves it against `schema`.
    ///
    /// Unknown identifiers, wrong operand types and bad builtin arity are all
    /// reported here rather than at evaluation time.
    pub fn parse(text: &str, schema: &Schema) -> Result<Self, ParseError> {
        let tree = parser::parse(text)?;
        let (root, ty) = check::resolve(tree, schema, text)?;
        Ok(Self {
            source: text.to_string(),
            root,
            ty,
        })
    }

    /// Evaluates the formula against a store snapshot.
    pub fn evaluate(&self, store: &Store) -> Result<Value, EvalError> {
        eval::evaluate(&self.root, store, &self.source)
    }

    /// Static result type (number or boolean).
    pub fn result_type(&self) -> LeafType {
        self.ty
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &Expr {
        &self.root
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        serde_yaml::from_str(
            "score: 650\ncc: { balance: 300, limit: 1000 }\nstats: { onTimeStreak: 2 }\nfrozen: false\nriskFlags: [1, 2, 4]\n",
        )
        .unwrap()
    }

    fn eval(text: &str) -> Result<Value, EvalError> {
        let store = store();
        let schema = Schema::infer(&store);
        Expression::parse(text, &schema).unwrap().evaluate(&store)
    }

    #[test]
    fn utilization_formula() {
        assert_eq!(
            eval("cc.balance / cc.limit * 100").unwrap(),
            Value::Number(30.0)
        );
    }

    #[test]
    fn ternary_short_circuits_division() {
        let store: Store = serde_yaml::from_str("cc: { balance: 300, limit: 0 }").unwrap();
        let schema = Schema::infer(&store);
        let expr =
            Expression::parse("cc.limit > 0 ? (cc.balance / cc.limit) * 100 : 0", &schema).unwrap();
        assert_eq!(expr.evaluate(&store).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let store: Store = serde_yaml::from_str("cc: { balance: 300, limit: 0 }").unwrap();
        let schema = Schema::infer(&store);
        let expr = Expression::parse("cc.balance / cc.limit", &schema).unwrap();
        assert_eq!(
            expr.evaluate(&store),
            Err(EvalError::DivisionByZero {
                expression: "cc.balance / cc.limit".into()
            })
        );
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval("2 + 3 * 4").unwrap(), Value::Number(14.0));
        assert_eq!(eval("(2 + 3) * 4").unwrap(), Value::Number(20.0));
        assert_eq!(eval("10 - 4 - 3").unwrap(), Value::Number(3.0));
        assert_eq!(eval("12 / 3 / 2").unwrap(), Value::Number(2.0));
        assert_eq!(eval("-2 * -3").unwrap(), Value::Number(6.0));
        assert_eq!(eval("1 + 2 < 4 == true").unwrap(), Value::Bool(true));
    }

    #[test]
    fn boolean_logic() {
        assert_eq!(
            eval("score >= 650 && !frozen").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval("score > 700 || stats.onTimeStreak >= 2").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(eval("true ? 1 : 0").unwrap(), Value::Number(1.0));
        assert_eq!(
            eval("score > 800 ? 1 : score > 600 ? 2 : 3").unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn logical_operators_short_circuit() {
        let store: Store = serde_yaml::from_str("a: 0\nb: 5").unwrap();
        let schema = Schema::infer(&store);
        let expr = Expression::parse("a != 0 && b / a > 1", &schema).unwrap();
        assert_eq!(expr.evaluate(&store).unwrap(), Value::Bool(false));
    }

    #[test]
    fn builtins() {
        assert_eq!(eval("min(score, 600, 700)").unwrap(), Value::Number(600.0));
        assert_eq!(eval("max(1, 2)").unwrap(), Value::Number(2.0));
        assert_eq!(eval("abs(-3.5)").unwrap(), Value::Number(3.5));
        assert_eq!(eval("round(2.5)").unwrap(), Value::Number(3.0));
        assert_eq!(eval("clamp(score + 500, 300, 850)").unwrap(), Value::Number(850.0));
        assert_eq!(eval("len(riskFlags)").unwrap(), Value::Number(3.0));
        assert_eq!(eval("sum(riskFlags)").unwrap(), Value::Number(7.0));
    }

    #[test]
    fn unknown_identifier_is_a_parse_error() {
        let store = store();
        let schema = Schema::infer(&store);
        let err = Expression::parse("cc.apr * 2", &schema).unwrap_err();
        assert!(err.message.contains("cc.apr"), "{err}");
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn type_errors_are_parse_errors() {
        let store = store();
        let schema = Schema::infer(&store);
        for text in [
            "frozen + 1",
            "score && frozen",
            "score ? 1 : 0",
            "frozen ? 1 : false",
            "riskFlags * 2",
            "len(score)",
            "clamp(1, 2)",
            "frobnicate(1)",
        ] {
            assert!(Expression::parse(text, &schema).is_err(), "{text} should fail");
        }
    }

    #[test]
    fn syntax_errors_report_offsets() {
        let err = parse_syntax("1 + * 2").unwrap_err();
        assert_eq!(err.offset, 2);
        assert!(parse_syntax("(1 + 2").is_err());
        assert!(parse_syntax("").is_err());
        assert!(parse_syntax("1 2").is_err());
    }

    #[test]
    fn collects_paths() {
        let tree = parse_syntax("cc.limit > 0 ? cc.balance / cc.limit : score").unwrap();
        assert_eq!(tree.paths(), vec!["cc.limit", "cc.balance", "cc.limit", "score"]);
    }
}
