//! Code fragment rendering for runtime checks

use std::fmt;

use crate::contract::UnOp;

use super::runtime::RuntimeExpr;

impl fmt::Display for RuntimeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeExpr::Int(n) => write!(f, "{n}"),
            RuntimeExpr::Float(x) => write!(f, "{x:?}"),
            RuntimeExpr::Bool(b) => write!(f, "{b}"),
            RuntimeExpr::Str(s) => write!(f, "{s:?}"),
            RuntimeExpr::Var(name) => write!(f, "{name}"),
            RuntimeExpr::Unary { op: UnOp::Not, expr } => write!(f, "!({expr})"),
            RuntimeExpr::Unary { op: UnOp::Neg, expr } => write!(f, "-({expr})"),
            RuntimeExpr::Binary { left, op, right } => write!(f, "({left} {op} {right})"),
            RuntimeExpr::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "(if {cond} {{ {then_branch} }} else {{ {else_branch} }})"),
            RuntimeExpr::Index { array, index } => write!(f, "{array}[{index}]"),
            RuntimeExpr::Len(array) => write!(f, "{array}.len()"),
            RuntimeExpr::Iterate {
                combinator,
                var,
                lower,
                upper,
                body,
            } => write!(f, "({lower}..{upper}).{}(|{var}| {body})", combinator.name()),
        }
    }
}
