//! Expression algebra for contract conditions.
//!
//! Conditions arrive from the front-end as text (`"$ >= 0 && $ <= 255"`),
//! but every consumer downstream wants structure: rules match shapes,
//! the linear solver collects coefficients, and certificates render the
//! goal back out. `Expr` is the closed set of shapes the engine understands.

use crate::rational::Rational;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Placeholder variable used in brand predicates (`$ > 0`).
pub const PLACEHOLDER: &str = "$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
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
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => PREC_ADD,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => PREC_MUL,
            BinaryOp::Pow => PREC_POW,
        }
    }
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    /// The operator that holds when the operands are swapped (`a < b` ⇔ `b > a`).
    pub fn flipped(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
        }
    }

    /// The operator of the logical negation (`¬(a < b)` ⇔ `a >= b`), valid over ordered fields.
    pub fn negated(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
        }
    }

    pub fn is_strict(self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Gt)
    }

    fn precedence(self) -> u8 {
        match self {
            CompareOp::Eq | CompareOp::Ne => PREC_EQUALITY,
            _ => PREC_RELATIONAL,
        }
    }
}

const PREC_BRAND: u8 = 0;
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_EQUALITY: u8 = 3;
const PREC_RELATIONAL: u8 = 4;
const PREC_ADD: u8 = 5;
const PREC_MUL: u8 = 6;
const PREC_UNARY: u8 = 7;
const PREC_POW: u8 = 8;
const PREC_POSTFIX: u8 = 9;

/// A canonical condition expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Bool(bool),
    Num(Rational),
    Str(String),
    Var(String),
    /// Field access such as `$.length`.
    Member(Box<Expr>, String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Logic(LogicOp, Box<Expr>, Box<Expr>),
    /// `Number.isFinite($)` (namespaced, no receiver) or `$.trim()` (method on a receiver).
    Call {
        function: String,
        receiver: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    /// Brand annotation `x: Positive`.
    Branded { var: String, brand: String },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        Expr::Num(Rational::from(n))
    }

    pub fn num(n: Rational) -> Self {
        Expr::Num(n)
    }

    pub fn member(base: Expr, field: impl Into<String>) -> Self {
        Expr::Member(Box::new(base), field.into())
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary(op, Box::new(operand))
    }

    pub fn not(operand: Expr) -> Self {
        Expr::Unary(UnaryOp::Not, Box::new(operand))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn compare(op: CompareOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Compare(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Expr::Logic(LogicOp::And, Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        Expr::Logic(LogicOp::Or, Box::new(lhs), Box::new(rhs))
    }

    pub fn branded(var: impl Into<String>, brand: impl Into<String>) -> Self {
        Expr::Branded {
            var: var.into(),
            brand: brand.into(),
        }
    }

    /// Fold a list of conjuncts back into a left-nested `&&` chain.
    pub fn conjunction(parts: impl IntoIterator<Item = Expr>) -> Self {
        parts
            .into_iter()
            .reduce(Expr::and)
            .unwrap_or(Expr::Bool(true))
    }

    pub fn as_num(&self) -> Option<Rational> {
        match self {
            Expr::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Flatten nested `&&` into its conjuncts (a non-conjunction is its own single conjunct).
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        fn walk<'a>(e: &'a Expr, out: &mut Vec<&'a Expr>) {
            match e {
                Expr::Logic(LogicOp::And, l, r) => {
                    walk(l, out);
                    walk(r, out);
                }
                other => out.push(other),
            }
        }
        walk(self, &mut out);
        out
    }

    pub fn is_conjunction(&self) -> bool {
        matches!(self, Expr::Logic(LogicOp::And, _, _))
    }

    /// Variables (and brand-annotated names) referenced by this expression.
    ///
    /// Namespaced calls such as `Number.isFinite` contribute only their arguments.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Bool(_) | Expr::Num(_) | Expr::Str(_) => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Member(base, _) => base.collect_vars(out),
            Expr::Unary(_, e) => e.collect_vars(out),
            Expr::Binary(_, l, r) | Expr::Compare(_, l, r) | Expr::Logic(_, l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
            Expr::Call { receiver, args, .. } => {
                if let Some(recv) = receiver {
                    recv.collect_vars(out);
                }
                for a in args {
                    a.collect_vars(out);
                }
            }
            Expr::Branded { var, .. } => {
                out.insert(var.clone());
            }
        }
    }

    pub fn has_free_vars(&self) -> bool {
        !self.free_vars().is_empty()
    }

    /// Replace every occurrence of variable `name` with `replacement`.
    ///
    /// A brand annotation on `name` is renamed when the replacement is itself
    /// a variable; otherwise the annotation is left untouched.
    pub fn substitute(&self, name: &str, replacement: &Expr) -> Expr {
        match self {
            Expr::Var(v) if v == name => replacement.clone(),
            Expr::Bool(_) | Expr::Num(_) | Expr::Str(_) | Expr::Var(_) => self.clone(),
            Expr::Member(base, field) => {
                Expr::Member(Box::new(base.substitute(name, replacement)), field.clone())
            }
            Expr::Unary(op, e) => Expr::Unary(*op, Box::new(e.substitute(name, replacement))),
            Expr::Binary(op, l, r) => Expr::Binary(
                *op,
                Box::new(l.substitute(name, replacement)),
                Box::new(r.substitute(name, replacement)),
            ),
            Expr::Compare(op, l, r) => Expr::Compare(
                *op,
                Box::new(l.substitute(name, replacement)),
                Box::new(r.substitute(name, replacement)),
            ),
            Expr::Logic(op, l, r) => Expr::Logic(
                *op,
                Box::new(l.substitute(name, replacement)),
                Box::new(r.substitute(name, replacement)),
            ),
            Expr::Call {
                function,
                receiver,
                args,
            } => Expr::Call {
                function: function.clone(),
                receiver: receiver
                    .as_ref()
                    .map(|r| Box::new(r.substitute(name, replacement))),
                args: args.iter().map(|a| a.substitute(name, replacement)).collect(),
            },
            Expr::Branded { var, brand } => match replacement {
                Expr::Var(new_name) if var == name => Expr::Branded {
                    var: new_name.clone(),
                    brand: brand.clone(),
                },
                _ => self.clone(),
            },
        }
    }

    /// Instantiate a brand predicate for a concrete variable (`$ > 0` → `x > 0`).
    pub fn instantiate(&self, var: &str) -> Expr {
        self.substitute(PLACEHOLDER, &Expr::var(var))
    }

    /// Whether this expression can denote a boolean condition.
    ///
    /// Arithmetic, numeric and string literals are rejected; variables,
    /// members and calls are accepted because their type is not known here.
    pub fn is_boolean(&self) -> bool {
        match self {
            Expr::Bool(_) | Expr::Compare(..) | Expr::Branded { .. } => true,
            Expr::Var(_) | Expr::Member(..) | Expr::Call { .. } => true,
            Expr::Logic(_, l, r) => l.is_boolean() && r.is_boolean(),
            Expr::Unary(UnaryOp::Not, e) => e.is_boolean(),
            Expr::Unary(UnaryOp::Neg, _) | Expr::Num(_) | Expr::Str(_) | Expr::Binary(..) => false,
        }
    }

    /// Normal form used for syntactic identity checks.
    ///
    /// - `<`/`<=` become `>`/`>=` with swapped operands,
    /// - `==`/`!=` order their operands by rendered text,
    /// - double negation is removed and `!(a > b)` becomes `b >= a`,
    /// - `-<number>` folds into a negative literal.
    pub fn canonical(&self) -> Expr {
        match self {
            Expr::Bool(_) | Expr::Num(_) | Expr::Str(_) | Expr::Var(_) | Expr::Branded { .. } => {
                self.clone()
            }
            Expr::Member(base, field) => Expr::Member(Box::new(base.canonical()), field.clone()),
            Expr::Unary(UnaryOp::Neg, e) => match e.canonical() {
                Expr::Num(n) => match n.checked_neg() {
                    Some(neg) => Expr::Num(neg),
                    None => Expr::unary(UnaryOp::Neg, Expr::Num(n)),
                },
                other => Expr::unary(UnaryOp::Neg, other),
            },
            Expr::Unary(UnaryOp::Not, e) => match e.as_ref() {
                Expr::Unary(UnaryOp::Not, inner) => inner.canonical(),
                Expr::Compare(op, l, r) => {
                    Expr::compare(op.negated(), (**l).clone(), (**r).clone()).canonical()
                }
                Expr::Bool(b) => Expr::Bool(!b),
                other => Expr::not(other.canonical()),
            },
            Expr::Binary(op, l, r) => Expr::binary(*op, l.canonical(), r.canonical()),
            Expr::Compare(op, l, r) => {
                let (l, r) = (l.canonical(), r.canonical());
                match op {
                    CompareOp::Lt | CompareOp::Le => Expr::compare(op.flipped(), r, l),
                    CompareOp::Gt | CompareOp::Ge => Expr::compare(*op, l, r),
                    CompareOp::Eq | CompareOp::Ne => {
                        if l.to_string() <= r.to_string() {
                            Expr::compare(*op, l, r)
                        } else {
                            Expr::compare(*op, r, l)
                        }
                    }
                }
            }
            Expr::Logic(op, l, r) => Expr::Logic(*op, Box::new(l.canonical()), Box::new(r.canonical())),
            Expr::Call {
                function,
                receiver,
                args,
            } => Expr::Call {
                function: function.clone(),
                receiver: receiver.as_ref().map(|r| Box::new(r.canonical())),
                args: args.iter().map(Expr::canonical).collect(),
            },
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Branded { .. } => PREC_BRAND,
            Expr::Logic(LogicOp::Or, ..) => PREC_OR,
            Expr::Logic(LogicOp::And, ..) => PREC_AND,
            Expr::Compare(op, ..) => op.precedence(),
            Expr::Binary(op, ..) => op.precedence(),
            Expr::Unary(..) => PREC_UNARY,
            Expr::Num(n) if n.is_negative() => PREC_UNARY,
            Expr::Member(..) | Expr::Call { .. } => PREC_POSTFIX,
            _ => PREC_POSTFIX + 1,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, min_prec: u8) -> fmt::Result {
        if self.precedence() < min_prec {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Num(n) => write!(f, "{n}"),
            Expr::Str(s) => write!(f, "'{s}'"),
            Expr::Var(v) => f.write_str(v),
            Expr::Member(base, field) => {
                base.fmt_child(f, PREC_POSTFIX)?;
                write!(f, ".{field}")
            }
            Expr::Unary(op, e) => {
                f.write_str(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                })?;
                // `- -x` must not print as `--x`; `-(-1)` keeps its parens.
                e.fmt_child(f, PREC_UNARY + 1)
            }
            Expr::Binary(op, l, r) => {
                let prec = op.precedence();
                if *op == BinaryOp::Pow {
                    l.fmt_child(f, prec + 1)?;
                    write!(f, " ** ")?;
                    r.fmt_child(f, PREC_UNARY)
                } else {
                    l.fmt_child(f, prec)?;
                    write!(f, " {} ", op.symbol())?;
                    r.fmt_child(f, prec + 1)
                }
            }
            Expr::Compare(op, l, r) => {
                let prec = op.precedence();
                l.fmt_child(f, prec + 1)?;
                write!(f, " {} ", op.symbol())?;
                r.fmt_child(f, prec + 1)
            }
            Expr::Logic(op, l, r) => {
                let (prec, sym) = match op {
                    LogicOp::And => (PREC_AND, "&&"),
                    LogicOp::Or => (PREC_OR, "||"),
                };
                l.fmt_child(f, prec)?;
                write!(f, " {sym} ")?;
                r.fmt_child(f, prec + 1)
            }
            Expr::Call {
                function,
                receiver,
                args,
            } => {
                if let Some(recv) = receiver {
                    recv.fmt_child(f, PREC_POSTFIX)?;
                    f.write_str(".")?;
                }
                write!(f, "{function}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    a.fmt_child(f, PREC_OR)?;
                }
                f.write_str(")")
            }
            Expr::Branded { var, brand } => write!(f, "{var}: {brand}"),
        }
    }
}

// Expressions travel through certificates and decision records as their
// canonical text; the parser is the single source of truth for the shape.
impl Serialize for Expr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        crate::parser::parse_expr(&text).map_err(serde::de::Error::custom)
    }
}
