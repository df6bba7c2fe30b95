//! Tree-walking interpreter.

use super::{BinaryOp, Builtin, Expr, UnaryOp};
use crate::error::EvalError;
use crate::store::{LeafType, Store, Value};

pub(crate) fn evaluate(expr: &Expr, store: &Store, source: &str) -> Result<Value, EvalError> {
    let value = Interpreter { store, source }.eval(expr)?;
    if let Value::Number(n) = value {
        if !n.is_finite() {
            return Err(EvalError::NonFinite {
                expression: source.to_string(),
            });
        }
    }
    Ok(value)
}

struct Interpreter<'a> {
    store: &'a Store,
    source: &'a str,
}

impl Interpreter<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path(path) => Ok(self.store.get(path)?.clone()),
            Expr::Unary(UnaryOp::Neg, inner) => Ok(Value::Number(-self.number(inner)?)),
            Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!self.boolean(inner)?)),
            Expr::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs),
            Expr::Ternary(cond, then, otherwise) => {
                if self.boolean(cond)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call(builtin, args) => self.call(*builtin, args).map(Value::Number),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, EvalError> {
        let value = match op {
            BinaryOp::And => Value::Bool(self.boolean(lhs)? && self.boolean(rhs)?),
            BinaryOp::Or => Value::Bool(self.boolean(lhs)? || self.boolean(rhs)?),
            BinaryOp::Eq => Value::Bool(self.eval(lhs)? == self.eval(rhs)?),
            BinaryOp::Ne => Value::Bool(self.eval(lhs)? != self.eval(rhs)?),
            BinaryOp::Add => Value::Number(self.number(lhs)? + self.number(rhs)?),
            BinaryOp::Sub => Value::Number(self.number(lhs)? - self.number(rhs)?),
            BinaryOp::Mul => Value::Number(self.number(lhs)? * self.number(rhs)?),
            BinaryOp::Div => {
                let numerator = self.number(lhs)?;
                let denominator = self.number(rhs)?;
                if denominator == 0.0 {
                    return Err(EvalError::DivisionByZero {
                        expression: self.source.to_string(),
                    });
                }
                Value::Number(numerator / denominator)
            }
            BinaryOp::Lt => Value::Bool(self.number(lhs)? < self.number(rhs)?),
            BinaryOp::Le => Value::Bool(self.number(lhs)? <= self.number(rhs)?),
            BinaryOp::Gt => Value::Bool(self.number(lhs)? > self.number(rhs)?),
            BinaryOp::Ge => Value::Bool(self.number(lhs)? >= self.number(rhs)?),
        };
        Ok(value)
    }

    fn call(&self, builtin: Builtin, args: &[Expr]) -> Result<f64, EvalError> {
        match builtin {
            Builtin::Min | Builtin::Max => {
                let mut values = args.iter().map(|arg| self.number(arg));
                let first = values.next().transpose()?.ok_or_else(|| self.mismatch(
                    LeafType::Number,
                    LeafType::Sequence,
                ))?;
                values.try_fold(first, |acc, n| {
                    let n = n?;
                    Ok(if builtin == Builtin::Min { acc.min(n) } else { acc.max(n) })
                })
            }
            Builtin::Abs => Ok(self.number(&args[0])?.abs()),
            Builtin::Round => Ok(self.number(&args[0])?.round()),
            Builtin::Floor => Ok(self.number(&args[0])?.floor()),
            Builtin::Ceil => Ok(self.number(&args[0])?.ceil()),
            Builtin::Clamp => {
                let n = self.number(&args[0])?;
                let lo = self.number(&args[1])?;
                let hi = self.number(&args[2])?;
                Ok(n.max(lo).min(hi))
            }
            Builtin::Len => Ok(self.sequence(&args[0])?.len() as f64),
            Builtin::Sum => Ok(self.sequence(&args[0])?.iter().sum()),
        }
    }

    fn number(&self, expr: &Expr) -> Result<f64, EvalError> {
        match self.eval(expr)? {
            Value::Number(n) => Ok(n),
            other => Err(self.mismatch(LeafType::Number, other.leaf_type())),
        }
    }

    fn boolean(&self, expr: &Expr) -> Result<bool, EvalError> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(self.mismatch(LeafType::Bool, other.leaf_type())),
        }
    }

    fn sequence(&self, expr: &Expr) -> Result<Vec<f64>, EvalError> {
        match self.eval(expr)? {
            Value::Sequence(items) => Ok(items),
            other => Err(self.mismatch(LeafType::Sequence, other.leaf_type())),
        }
    }

    fn mismatch(&self, expected: LeafType, found: LeafType) -> EvalError {
        EvalError::TypeMismatch {
            context: self.source.to_string(),
            expected,
            found,
        }
    }
}
