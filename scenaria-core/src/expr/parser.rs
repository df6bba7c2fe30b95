//! Recursive-descent formula parser built on nom 8.
//!
//! Every token parser skips leading whitespace, so the grammar functions can
//! be written without thinking about blanks.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace0},
    combinator::{all_consuming, map_res, opt, recognize, value},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};

use super::{BinaryOp, Builtin, Expr, UnaryOp};
use crate::error::ParseError;
use crate::store::Value;

type Input<'a> = &'a str;

/// Deepest nesting of parentheses, ternaries and prefix operators accepted.
const MAX_DEPTH: usize = 64;

/// Parses a complete formula.
pub(crate) fn parse(text: &str) -> Result<Expr, ParseError> {
    if let Some(offset) = too_deep(text) {
        return Err(ParseError::new(text, offset, "formula nested too deeply"));
    }
    match all_consuming(terminated(ternary, multispace0)).parse(text) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = text.len() - e.input.len();
            let message = if e.input.trim().is_empty() {
                "unexpected end of formula".to_string()
            } else {
                format!("unexpected input `{}`", snippet(e.input.trim_start()))
            };
            Err(ParseError::new(text, offset, message))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(ParseError::new(text, text.len(), "unexpected end of formula"))
        }
    }
}

/// Offset at which `text` would make the parser recurse past `MAX_DEPTH`.
///
/// Overestimates rather than under: every `-` or `!` in a run counts as a
/// prefix operator, and a `?` stays open until the enclosing group or
/// argument ends.
fn too_deep(text: &str) -> Option<usize> {
    // Open ternaries per parenthesis level.
    let mut levels: Vec<usize> = vec![0];
    let mut depth = 0usize;
    let mut prefix = 0usize;
    for (offset, c) in text.char_indices() {
        match c {
            '(' => {
                depth += 1;
                levels.push(0);
                prefix = 0;
            }
            ')' => {
                if levels.len() > 1 {
                    let ternaries = levels.pop().unwrap_or_default();
                    depth -= 1 + ternaries;
                }
                prefix = 0;
            }
            ',' => {
                if let Some(ternaries) = levels.last_mut() {
                    depth -= *ternaries;
                    *ternaries = 0;
                }
                prefix = 0;
            }
            '?' => {
                depth += 1;
                if let Some(ternaries) = levels.last_mut() {
                    *ternaries += 1;
                }
                prefix = 0;
            }
            '-' | '!' => prefix += 1,
            c if c.is_whitespace() => {}
            _ => prefix = 0,
        }
        if depth + prefix > MAX_DEPTH {
            return Some(offset);
        }
    }
    None
}

fn snippet(rest: &str) -> &str {
    match rest.char_indices().nth(12) {
        Some((idx, _)) => &rest[..idx],
        None => rest,
    }
}

/// Wraps a token parser so that it skips leading whitespace.
fn token<'a, O, P>(
    inner: P,
) -> impl Parser<Input<'a>, Output = O, Error = nom::error::Error<Input<'a>>>
where
    P: Parser<Input<'a>, Output = O, Error = nom::error::Error<Input<'a>>>,
{
    preceded(multispace0, inner)
}

fn fold(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |lhs, (op, rhs)| {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    })
}

fn ternary(input: Input) -> IResult<Input, Expr> {
    let (input, cond) = logical_or(input)?;
    let (input, branches) =
        opt((token(char('?')), ternary, token(char(':')), ternary)).parse(input)?;
    let expr = match branches {
        Some((_, then, _, otherwise)) => {
            Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise))
        }
        None => cond,
    };
    Ok((input, expr))
}

fn logical_or(input: Input) -> IResult<Input, Expr> {
    let (input, first) = logical_and(input)?;
    let (input, rest) =
        many0(pair(value(BinaryOp::Or, token(tag("||"))), logical_and)).parse(input)?;
    Ok((input, fold(first, rest)))
}

fn logical_and(input: Input) -> IResult<Input, Expr> {
    let (input, first) = equality(input)?;
    let (input, rest) =
        many0(pair(value(BinaryOp::And, token(tag("&&"))), equality)).parse(input)?;
    Ok((input, fold(first, rest)))
}

fn equality(input: Input) -> IResult<Input, Expr> {
    let op = token(alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
    )));
    let (input, first) = relational(input)?;
    let (input, rest) = many0(pair(op, relational)).parse(input)?;
    Ok((input, fold(first, rest)))
}

fn relational(input: Input) -> IResult<Input, Expr> {
    let op = token(alt((
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
    )));
    let (input, first) = additive(input)?;
    let (input, rest) = many0(pair(op, additive)).parse(input)?;
    Ok((input, fold(first, rest)))
}

fn additive(input: Input) -> IResult<Input, Expr> {
    let op = token(alt((
        value(BinaryOp::Add, char('+')),
        value(BinaryOp::Sub, char('-')),
    )));
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(op, term)).parse(input)?;
    Ok((input, fold(first, rest)))
}

fn term(input: Input) -> IResult<Input, Expr> {
    let op = token(alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, char('/')),
    )));
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(op, unary)).parse(input)?;
    Ok((input, fold(first, rest)))
}

fn unary(input: Input) -> IResult<Input, Expr> {
    let mut op = token(alt((
        value(UnaryOp::Neg, char('-')),
        value(UnaryOp::Not, char('!')),
    )));
    match op.parse(input) {
        Ok((rest, op)) => {
            let (rest, operand) = unary(rest)?;
            Ok((rest, Expr::Unary(op, Box::new(operand))))
        }
        Err(nom::Err::Error(_)) => primary(input),
        Err(e) => Err(e),
    }
}

fn primary(input: Input) -> IResult<Input, Expr> {
    alt((
        number,
        delimited(token(char('(')), ternary, token(char(')'))),
        word,
    ))
    .parse(input)
}

fn number(input: Input) -> IResult<Input, Expr> {
    let digits = recognize(pair(digit1, opt(pair(char('.'), digit0))));
    let (input, n) = token(map_res(digits, |s: &str| s.parse::<f64>())).parse(input)?;
    Ok((input, Expr::Literal(Value::Number(n))))
}

fn segment(input: Input) -> IResult<Input, Input> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

/// Boolean literal, builtin call or attribute path.
fn word(input: Input) -> IResult<Input, Expr> {
    let (rest, name) = token(recognize(separated_list1(char('.'), segment))).parse(input)?;

    let call: IResult<Input, Vec<Expr>> = delimited(
        token(char('(')),
        separated_list0(token(char(',')), ternary),
        token(char(')')),
    )
    .parse(rest);

    if let Ok((after_call, args)) = call {
        return match Builtin::from_name(name) {
            Some(builtin) => Ok((after_call, Expr::Call(builtin, args))),
            // Unknown function: fail at the name so the offset points at it.
            None => Err(nom::Err::Failure(nom::error::Error::new(
                input.trim_start(),
                nom::error::ErrorKind::Verify,
            ))),
        };
    }

    let expr = match name {
        "true" => Expr::Literal(Value::Bool(true)),
        "false" => Expr::Literal(Value::Bool(false)),
        path => Expr::Path(path.to_string()),
    };
    Ok((rest, expr))
}
