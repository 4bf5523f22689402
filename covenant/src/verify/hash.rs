//! Contract hashing
//!
//! Canonicalizes a contract together with its binding context into a
//! prefix-form string and digests it with SHA-256. The digest is the cache
//! key: equal for semantically identical contracts (bound variables are
//! renamed by binder position), different on any change to an operator,
//! literal, free variable, type, or the surrounding preconditions and body.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::contract::{ContractExpr, Param, QuantKind, Type, UnOp};

/// SHA-256 digest identifying one verification obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContractHash {
    bytes: [u8; 32],
}

impl ContractHash {
    /// Digest an already canonicalized form
    pub fn of_canonical(canonical: &str) -> Self {
        let digest = Sha256::digest(canonical.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// 64 lowercase hex characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self { bytes })
    }

    /// Short prefix for log lines (8 hex chars)
    pub fn short(&self) -> String {
        hex::encode(&self.bytes[..4])
    }
}

impl fmt::Display for ContractHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Canonical prefix form of an expression.
pub fn canonicalize(expr: &ContractExpr) -> String {
    let mut canon = Canonicalizer::default();
    canon.expr(expr);
    canon.out
}

/// Canonical form of a type
pub fn canonical_type(ty: &Type) -> String {
    match ty {
        Type::Int => "INT".to_string(),
        Type::Float => "FLOAT".to_string(),
        Type::Bool => "BOOL".to_string(),
        Type::String => "STRING".to_string(),
        Type::Array(elem) => format!("(ARRAY {})", canonical_type(elem)),
    }
}

/// Cache key for a precondition feasibility check.
pub fn precondition_key(params: &[Param], condition: &ContractExpr) -> ContractHash {
    let mut text = canonical_params(params);
    text.push_str("(PRE ");
    text.push_str(&canonicalize(condition));
    text.push(')');
    ContractHash::of_canonical(&text)
}

/// Cache key for a postcondition validity check.
///
/// Every precondition is an assumption of the postcondition query, in
/// order, so editing any of them changes the key.
pub fn postcondition_key<'a>(
    params: &[Param],
    ret_ty: &Type,
    preconditions: impl IntoIterator<Item = &'a ContractExpr>,
    body: Option<&ContractExpr>,
    condition: &ContractExpr,
) -> ContractHash {
    let mut text = canonical_params(params);
    text.push_str(&format!("(RETURNS {})", canonical_type(ret_ty)));
    text.push_str("(ASSUME");
    for pre in preconditions {
        text.push(' ');
        text.push_str(&canonicalize(pre));
    }
    text.push(')');
    match body {
        Some(body) => text.push_str(&format!("(BODY {})", canonicalize(body))),
        None => text.push_str("(BODY NONE)"),
    }
    text.push_str(&format!("(POST {})", canonicalize(condition)));
    ContractHash::of_canonical(&text)
}

fn canonical_params(params: &[Param]) -> String {
    let mut text = String::from("(PARAMS");
    for param in params {
        text.push_str(&format!(" ({} {})", reference(&param.name), canonical_type(&param.ty)));
    }
    text.push(')');
    text
}

/// Free references carry their byte length, like string literals
fn reference(name: &str) -> String {
    format!("REF:{}:{name}", name.len())
}

#[derive(Default)]
struct Canonicalizer {
    out: String,
    /// Binders in scope, innermost last: (source name, binder position)
    scopes: Vec<(String, usize)>,
    next_binder: usize,
}

impl Canonicalizer {
    fn expr(&mut self, expr: &ContractExpr) {
        match expr {
            ContractExpr::IntLit(n) => self.out.push_str(&format!("INT:{n}")),
            ContractExpr::FloatLit(x) => self.out.push_str(&format!("FLOAT:{x:?}")),
            ContractExpr::BoolLit(b) => self.out.push_str(&format!("BOOL:{b}")),
            ContractExpr::StringLit(s) => self.out.push_str(&format!("STR:{}:{s}", s.len())),
            ContractExpr::Var(name) => {
                let bound = self.scopes.iter().rev().find(|(n, _)| n == name);
                match bound {
                    Some((_, position)) => self.out.push_str(&format!("BVAR:{position}")),
                    None => self.out.push_str(&reference(name)),
                }
            }
            ContractExpr::Unary { op, expr } => {
                let tag = match op {
                    UnOp::Neg => "NEG",
                    UnOp::Not => "NOT",
                };
                self.node(tag, &[expr.as_ref()]);
            }
            ContractExpr::Binary { left, op, right } => self.node(&op.to_string(), &[left.as_ref(), right.as_ref()]),
            ContractExpr::If {
                cond,
                then_branch,
                else_branch,
            } => self.node("IF", &[cond.as_ref(), then_branch.as_ref(), else_branch.as_ref()]),
            ContractExpr::Index { array, index } => self.node("INDEX", &[array.as_ref(), index.as_ref()]),
            ContractExpr::Len(array) => self.node("LEN", &[array.as_ref()]),
            ContractExpr::Implies {
                antecedent,
                consequent,
            } => self.node("=>", &[antecedent.as_ref(), consequent.as_ref()]),
            ContractExpr::Quantifier { kind, vars, body } => {
                let tag = match kind {
                    QuantKind::Forall => "FORALL",
                    QuantKind::Exists => "EXISTS",
                };
                self.out.push('(');
                self.out.push_str(tag);
                self.out.push_str(" (");
                let depth = self.scopes.len();
                for var in vars {
                    let position = self.next_binder;
                    self.next_binder += 1;
                    self.out.push_str(&format!("(BVAR:{position} {})", canonical_type(&var.ty)));
                    self.scopes.push((var.name.clone(), position));
                }
                self.out.push_str(") ");
                self.expr(body);
                self.scopes.truncate(depth);
                self.out.push(')');
            }
        }
    }

    fn node(&mut self, tag: &str, children: &[&ContractExpr]) {
        self.out.push('(');
        self.out.push_str(tag);
        for child in children {
            self.out.push(' ');
            self.expr(child);
        }
        self.out.push(')');
    }
}
