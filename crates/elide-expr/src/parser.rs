//! Parser for the canonical condition syntax.
//!
//! Accepted surface (JavaScript-flavoured, as emitted by the contract front-end):
//!
//! ```text
//! top      := ident ':' brand | or
//! or       := and ('||' and)*
//! and      := equality ('&&' equality)*
//! equality := relation (('===' | '!==' | '==' | '!=') relation)*
//! relation := additive (('<=' | '>=' | '<' | '>') additive)?
//! additive := term (('+' | '-') term)*
//! term     := unary (('*' | '/' | '%') unary)*
//! unary    := ('!' | '-') unary | power
//! power    := postfix ('**' unary)?
//! postfix  := primary ('.' ident | '(' args ')')*
//! primary  := number | 'true' | 'false' | string | ident | '(' top ')'
//! ```
//!
//! `$` is an ordinary identifier (the brand placeholder). Brands may carry
//! numeric generics (`Vec<3>`).

use crate::expr::{BinaryOp, CompareOp, Expr, LogicOp, UnaryOp};
use crate::rational::Rational;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char as pchar, digit1, multispace0, satisfy},
    combinator::{all_consuming, cut, map, not, opt, peek, recognize, value},
    error::{ErrorKind, ParseError},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

/// Namespaces whose dotted calls are treated as plain functions, not methods.
const NAMESPACES: &[&str] = &["Number", "Math", "Array", "String", "Object"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprParseError {
    #[error("empty expression")]
    Empty,
    #[error("syntax error at offset {offset}: unexpected `{found}`")]
    Syntax { offset: usize, found: String },
    #[error("numeric literal out of range at offset {offset}")]
    NumberOutOfRange { offset: usize },
}

type PResult<'a, T> = IResult<&'a str, T>;

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> PResult<'a, O>,
) -> impl FnMut(&'a str) -> PResult<'a, O> {
    delimited(multispace0, inner, multispace0)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_continue)))(input)
}

fn number(input: &str) -> PResult<'_, Expr> {
    let (rest, text) = recognize(pair(digit1, opt(pair(pchar('.'), digit1))))(input)?;
    // A trailing identifier char means this was not a number (`1abc`).
    let (rest, _) = not(satisfy(is_ident_start))(rest)?;
    match Rational::parse_decimal(text) {
        Some(n) => Ok((rest, Expr::Num(n))),
        None => Err(nom::Err::Failure(nom::error::Error::from_error_kind(
            input,
            ErrorKind::TooLarge,
        ))),
    }
}

fn string_literal(input: &str) -> PResult<'_, Expr> {
    let single = delimited(pchar('\''), take_while(|c| c != '\''), pchar('\''));
    let double = delimited(pchar('"'), take_while(|c| c != '"'), pchar('"'));
    map(alt((single, double)), |s: &str| Expr::Str(s.to_string()))(input)
}

fn keyword_or_var(input: &str) -> PResult<'_, Expr> {
    map(identifier, |name| match name {
        "true" => Expr::Bool(true),
        "false" => Expr::Bool(false),
        other => Expr::Var(other.to_string()),
    })(input)
}

fn primary(input: &str) -> PResult<'_, Expr> {
    ws(alt((
        number,
        string_literal,
        keyword_or_var,
        delimited(pchar('('), top, cut(pchar(')'))),
    )))(input)
}

enum Postfix {
    Field(String),
    Args(Vec<Expr>),
}

fn postfix(input: &str) -> PResult<'_, Expr> {
    let (input, base) = primary(input)?;
    let field = map(preceded(ws(pchar('.')), identifier), |f: &str| {
        Postfix::Field(f.to_string())
    });
    let args = map(
        delimited(
            ws(pchar('(')),
            separated_list0(ws(pchar(',')), or_expr),
            cut(ws(pchar(')'))),
        ),
        Postfix::Args,
    );
    let (input, ops) = many0(alt((field, args)))(input)?;

    let mut expr = base;
    for op in ops {
        expr = match op {
            Postfix::Field(f) => Expr::member(expr, f),
            Postfix::Args(args) => match expr {
                Expr::Member(recv, method) => match *recv {
                    Expr::Var(ns) if NAMESPACES.contains(&ns.as_str()) => Expr::Call {
                        function: format!("{ns}.{method}"),
                        receiver: None,
                        args,
                    },
                    recv => Expr::Call {
                        function: method,
                        receiver: Some(Box::new(recv)),
                        args,
                    },
                },
                Expr::Var(function) => Expr::Call {
                    function,
                    receiver: None,
                    args,
                },
                _ => {
                    return Err(nom::Err::Failure(nom::error::Error::from_error_kind(
                        input,
                        ErrorKind::Verify,
                    )))
                }
            },
        };
    }
    Ok((input, expr))
}

fn power(input: &str) -> PResult<'_, Expr> {
    let (input, base) = postfix(input)?;
    let (input, exponent) = opt(preceded(ws(tag("**")), unary))(input)?;
    Ok(match exponent {
        Some(e) => (input, Expr::binary(BinaryOp::Pow, base, e)),
        None => (input, base),
    })
}

fn unary(input: &str) -> PResult<'_, Expr> {
    let not_op = map(
        preceded(ws(terminated(pchar('!'), not(pchar('=')))), unary),
        Expr::not,
    );
    let neg_op = map(preceded(ws(pchar('-')), unary), |e| match e {
        Expr::Num(n) => match n.checked_neg() {
            Some(neg) => Expr::Num(neg),
            None => Expr::unary(UnaryOp::Neg, Expr::Num(n)),
        },
        other => Expr::unary(UnaryOp::Neg, other),
    });
    alt((not_op, neg_op, power))(input)
}

fn left_assoc<'a, Op: Copy>(
    input: &'a str,
    operand: fn(&'a str) -> PResult<'a, Expr>,
    operator: impl FnMut(&'a str) -> PResult<'a, Op>,
    build: impl Fn(Op, Expr, Expr) -> Expr,
) -> PResult<'a, Expr> {
    let (input, first) = operand(input)?;
    let (input, rest) = many0(pair(ws(operator), operand))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, (op, rhs)| build(op, acc, rhs));
    Ok((input, expr))
}

fn term(input: &str) -> PResult<'_, Expr> {
    let op = alt((
        value(BinaryOp::Mul, terminated(pchar('*'), not(pchar('*')))),
        value(BinaryOp::Div, pchar('/')),
        value(BinaryOp::Rem, pchar('%')),
    ));
    left_assoc(input, unary, op, Expr::binary)
}

fn additive(input: &str) -> PResult<'_, Expr> {
    let op = alt((
        value(BinaryOp::Add, pchar('+')),
        value(BinaryOp::Sub, pchar('-')),
    ));
    left_assoc(input, term, op, Expr::binary)
}

fn relation(input: &str) -> PResult<'_, Expr> {
    let (input, lhs) = additive(input)?;
    let op = alt((
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Lt, pchar('<')),
        value(CompareOp::Gt, pchar('>')),
    ));
    let (input, rhs) = opt(pair(ws(op), additive))(input)?;
    Ok(match rhs {
        Some((op, rhs)) => (input, Expr::compare(op, lhs, rhs)),
        None => (input, lhs),
    })
}

fn equality(input: &str) -> PResult<'_, Expr> {
    let op = alt((
        value(CompareOp::Eq, tag("===")),
        value(CompareOp::Ne, tag("!==")),
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Ne, tag("!=")),
    ));
    left_assoc(input, relation, op, Expr::compare)
}

fn and_expr(input: &str) -> PResult<'_, Expr> {
    left_assoc(input, equality, tag("&&"), |_, l, r| {
        Expr::Logic(LogicOp::And, Box::new(l), Box::new(r))
    })
}

fn or_expr(input: &str) -> PResult<'_, Expr> {
    left_assoc(input, and_expr, tag("||"), |_, l, r| {
        Expr::Logic(LogicOp::Or, Box::new(l), Box::new(r))
    })
}

/// `Positive`, `Vec<3>`, `Range<0, 10>`.
fn brand_name(input: &str) -> PResult<'_, String> {
    let generics = delimited(
        ws(pchar('<')),
        separated_list0(ws(pchar(',')), digit1),
        ws(pchar('>')),
    );
    map(pair(identifier, opt(generics)), |(name, generics)| match generics {
        Some(args) => format!("{name}<{}>", args.join(", ")),
        None => name.to_string(),
    })(input)
}

fn brand_annotation(input: &str) -> PResult<'_, Expr> {
    let (input, (var, _, brand)) = tuple((ws(identifier), pchar(':'), ws(brand_name)))(input)?;
    // Only accept the annotation when nothing but `)` or end of input follows.
    let (input, _) = peek(alt((value((), pchar(')')), value((), nom::combinator::eof))))(input)?;
    Ok((input, Expr::branded(var, brand)))
}

fn top(input: &str) -> PResult<'_, Expr> {
    alt((brand_annotation, or_expr))(input)
}

/// Parse a condition expression.
pub fn parse_expr(text: &str) -> Result<Expr, ExprParseError> {
    if text.trim().is_empty() {
        return Err(ExprParseError::Empty);
    }
    match all_consuming(ws(top))(text) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = text.len() - e.input.len();
            if e.code == ErrorKind::TooLarge {
                return Err(ExprParseError::NumberOutOfRange { offset });
            }
            let found: String = e.input.trim_start().chars().take(12).collect();
            Err(ExprParseError::Syntax {
                offset,
                found: if found.is_empty() {
                    "end of input".to_string()
                } else {
                    found
                },
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(ExprParseError::Syntax {
            offset: text.len(),
            found: "end of input".to_string(),
        }),
    }
}

/// Parse an identifier that is allowed as a fact variable (`x`, `$`, `len_2`).
pub fn is_identifier(text: &str) -> bool {
    matches!(all_consuming(identifier)(text), Ok(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> Expr {
        parse_expr(text).unwrap_or_else(|e| panic!("parse `{text}`: {e}"))
    }

    #[test]
    fn parses_brand_predicates() {
        assert_eq!(p("$ > 0").to_string(), "$ > 0");
        assert_eq!(p("$ >= 0 && $ <= 255").to_string(), "$ >= 0 && $ <= 255");
        assert_eq!(p("$.length === 3").to_string(), "$.length == 3");
        assert_eq!(p("$ === $.trim()").to_string(), "$ == $.trim()");
    }

    #[test]
    fn namespaced_calls_have_no_receiver() {
        let e = p("Number.isFinite($)");
        match e {
            Expr::Call {
                function,
                receiver,
                args,
            } => {
                assert_eq!(function, "Number.isFinite");
                assert!(receiver.is_none());
                assert_eq!(args, vec![Expr::var("$")]);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_precedence() {
        let e = p("a + b * c > 0");
        assert_eq!(e.to_string(), "a + b * c > 0");
        let e = p("(a + b) * c > 0");
        assert_eq!(e.to_string(), "(a + b) * c > 0");
        let e = p("x ** 2 ** 3");
        assert_eq!(e.to_string(), "x ** 2 ** 3");
    }

    #[test]
    fn negative_literals_fold() {
        assert_eq!(p("x > -5"), Expr::compare(CompareOp::Gt, Expr::var("x"), Expr::int(-5)));
    }

    #[test]
    fn brand_annotations() {
        assert_eq!(p("x:Positive"), Expr::branded("x", "Positive"));
        assert_eq!(p("v: Vec<3>"), Expr::branded("v", "Vec<3>"));
        assert_eq!(p("(x: Port)"), Expr::branded("x", "Port"));
    }

    #[test]
    fn not_equal_is_not_negation() {
        assert_eq!(
            p("x != 0"),
            Expr::compare(CompareOp::Ne, Expr::var("x"), Expr::int(0))
        );
        assert_eq!(p("!(x > 0)"), Expr::not(p("x > 0")));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_expr("   "), Err(ExprParseError::Empty));
        assert!(matches!(parse_expr("x >"), Err(ExprParseError::Syntax { .. })));
        assert!(matches!(parse_expr("(x > 0"), Err(ExprParseError::Syntax { .. })));
        assert!(matches!(parse_expr("1abc > 0"), Err(ExprParseError::Syntax { .. })));
        assert!(matches!(
            parse_expr("x > 999999999999999999999999999999999999999999"),
            Err(ExprParseError::NumberOutOfRange { .. })
        ));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("$"));
        assert!(is_identifier("len_2"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier("a b"));
    }
}
