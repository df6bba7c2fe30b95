//! Path resolution and static typing of parsed formulas.

use super::{BinaryOp, Builtin, Expr, UnaryOp};
use crate::error::ParseError;
use crate::store::{LeafType, Schema};

/// Resolves every path (aliases become canonical paths) and infers the
/// result type. Formulas must produce a number or a boolean.
pub(crate) fn resolve(
    expr: Expr,
    schema: &Schema,
    text: &str,
) -> Result<(Expr, LeafType), ParseError> {
    let checker = Checker { schema, text };
    let (expr, ty) = checker.check(expr)?;
    if ty == LeafType::Sequence {
        return Err(ParseError::new(
            text,
            0,
            "a formula must produce a number or a boolean, not a sequence",
        ));
    }
    Ok((expr, ty))
}

struct Checker<'a> {
    schema: &'a Schema,
    text: &'a str,
}

impl Checker<'_> {
    fn check(&self, expr: Expr) -> Result<(Expr, LeafType), ParseError> {
        match expr {
            Expr::Literal(value) => {
                let ty = value.leaf_type();
                Ok((Expr::Literal(value), ty))
            }
            Expr::Path(path) => match self.schema.lookup(&path) {
                Some((canonical, spec)) => Ok((Expr::Path(canonical.to_string()), spec.ty)),
                None => Err(ParseError::new(
                    self.text,
                    locate(self.text, &path),
                    format!("unknown attribute `{path}`"),
                )),
            },
            Expr::Unary(op, inner) => {
                let (inner, ty) = self.check(*inner)?;
                let expected = match op {
                    UnaryOp::Neg => LeafType::Number,
                    UnaryOp::Not => LeafType::Bool,
                };
                let symbol = if op == UnaryOp::Neg { "-" } else { "!" };
                self.expect(symbol, expected, ty)?;
                Ok((Expr::Unary(op, Box::new(inner)), expected))
            }
            Expr::Binary(op, lhs, rhs) => {
                let (lhs, lhs_ty) = self.check(*lhs)?;
                let (rhs, rhs_ty) = self.check(*rhs)?;
                let ty = self.binary_type(op, lhs_ty, rhs_ty)?;
                Ok((Expr::Binary(op, Box::new(lhs), Box::new(rhs)), ty))
            }
            Expr::Ternary(cond, then, otherwise) => {
                let (cond, cond_ty) = self.check(*cond)?;
                self.expect("?:", LeafType::Bool, cond_ty)?;
                let (then, then_ty) = self.check(*then)?;
                let (otherwise, otherwise_ty) = self.check(*otherwise)?;
                self.scalar("?:", then_ty)?;
                self.expect("?:", then_ty, otherwise_ty)?;
                Ok((
                    Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)),
                    then_ty,
                ))
            }
            Expr::Call(builtin, args) => {
                let mut checked = Vec::with_capacity(args.len());
                let mut types = Vec::with_capacity(args.len());
                for arg in args {
                    let (arg, ty) = self.check(arg)?;
                    checked.push(arg);
                    types.push(ty);
                }
                self.call_type(builtin, &types)?;
                Ok((Expr::Call(builtin, checked), LeafType::Number))
            }
        }
    }

    fn binary_type(
        &self,
        op: BinaryOp,
        lhs: LeafType,
        rhs: LeafType,
    ) -> Result<LeafType, ParseError> {
        let symbol = op.symbol();
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.expect(symbol, LeafType::Number, lhs)?;
                self.expect(symbol, LeafType::Number, rhs)?;
                Ok(LeafType::Number)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.expect(symbol, LeafType::Number, lhs)?;
                self.expect(symbol, LeafType::Number, rhs)?;
                Ok(LeafType::Bool)
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                self.scalar(symbol, lhs)?;
                self.expect(symbol, lhs, rhs)?;
                Ok(LeafType::Bool)
            }
            BinaryOp::And | BinaryOp::Or => {
                self.expect(symbol, LeafType::Bool, lhs)?;
                self.expect(symbol, LeafType::Bool, rhs)?;
                Ok(LeafType::Bool)
            }
        }
    }

    fn call_type(&self, builtin: Builtin, args: &[LeafType]) -> Result<(), ParseError> {
        let name = builtin.name();
        let (arity_ok, arg_type) = match builtin {
            Builtin::Min | Builtin::Max => (!args.is_empty(), LeafType::Number),
            Builtin::Abs | Builtin::Round | Builtin::Floor | Builtin::Ceil => {
                (args.len() == 1, LeafType::Number)
            }
            Builtin::Clamp => (args.len() == 3, LeafType::Number),
            Builtin::Len | Builtin::Sum => (args.len() == 1, LeafType::Sequence),
        };
        if !arity_ok {
            return Err(ParseError::new(
                self.text,
                locate(self.text, name),
                format!("wrong number of arguments to `{name}`"),
            ));
        }
        args.iter().try_for_each(|ty| self.expect(name, arg_type, *ty))
    }

    fn expect(&self, context: &str, expected: LeafType, found: LeafType) -> Result<(), ParseError> {
        if expected == found {
            Ok(())
        } else {
            Err(ParseError::new(
                self.text,
                0,
                format!("`{context}` expects a {expected}, found a {found}"),
            ))
        }
    }

    fn scalar(&self, context: &str, found: LeafType) -> Result<(), ParseError> {
        if found == LeafType::Sequence {
            Err(ParseError::new(
                self.text,
                0,
                format!("`{context}` cannot operate on a sequence"),
            ))
        } else {
            Ok(())
        }
    }
}

/// Byte offset of the first whole-word occurrence of `word` in `text`.
fn locate(text: &str, word: &str) -> usize {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.';
    text.match_indices(word)
        .find(|(idx, _)| {
            let before = text[..*idx].chars().next_back();
            let after = text[idx + word.len()..].chars().next();
            !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
        })
        .map_or(0, |(idx, _)| idx)
}
