//! Runtime check lowering
//!
//! Lowers a whole contract or inline assertion into the expression the code
//! generator emits: bounded quantifiers become nested iteration, remaining
//! implications become disjunctions.

use crate::contract::{BinOp, BoundVar, ContractExpr, QuantKind, UnOp};

use super::compile::{plan_quantifier, Combinator, QuantifierPlan};
use super::lower::lower_implication;

/// Expression emitted into generated code
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeExpr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Var(String),
    Unary {
        op: UnOp,
        expr: Box<RuntimeExpr>,
    },
    Binary {
        left: Box<RuntimeExpr>,
        op: BinOp,
        right: Box<RuntimeExpr>,
    },
    If {
        cond: Box<RuntimeExpr>,
        then_branch: Box<RuntimeExpr>,
        else_branch: Box<RuntimeExpr>,
    },
    /// Indexed element read
    Index {
        array: Box<RuntimeExpr>,
        index: Box<RuntimeExpr>,
    },
    Len(Box<RuntimeExpr>),
    /// `(lower..upper).all(|var| body)` or `.any(...)`
    Iterate {
        combinator: Combinator,
        var: String,
        lower: Box<RuntimeExpr>,
        upper: Box<RuntimeExpr>,
        body: Box<RuntimeExpr>,
    },
}

/// A quantifier that could not be compiled to iteration
#[derive(Debug, Clone, PartialEq)]
pub struct StaticOnlyQuantifier {
    pub kind: QuantKind,
    pub unresolved: Vec<String>,
    /// Source form of the quantifier, for diagnostics
    pub source: String,
}

impl std::fmt::Display for StaticOnlyQuantifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "static-only {}: no finite range for `{}` in {}",
            self.kind,
            self.unresolved.join("`, `"),
            self.source
        )
    }
}

/// Runtime form of a contract
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCheck {
    Executable { expr: RuntimeExpr },
    /// At least one quantifier has no inferable range; nothing is emitted
    /// and the contract is checked by the solver only
    StaticOnly { quantifiers: Vec<StaticOnlyQuantifier> },
}

impl RuntimeCheck {
    pub fn is_executable(&self) -> bool {
        matches!(self, RuntimeCheck::Executable { .. })
    }

    /// Rendered code fragment, if executable
    pub fn fragment(&self) -> Option<String> {
        match self {
            RuntimeCheck::Executable { expr } => Some(expr.to_string()),
            RuntimeCheck::StaticOnly { .. } => None,
        }
    }

    /// Informational annotations for static-only quantifiers
    pub fn annotations(&self) -> Vec<String> {
        match self {
            RuntimeCheck::Executable { .. } => Vec::new(),
            RuntimeCheck::StaticOnly { quantifiers } => {
                quantifiers.iter().map(|q| q.to_string()).collect()
            }
        }
    }
}

/// Lower a contract expression into its runtime check.
pub fn lower_runtime_check(expr: &ContractExpr) -> RuntimeCheck {
    let mut lowerer = RuntimeLowerer::default();
    let lowered = lowerer.lower(expr);
    if lowerer.static_only.is_empty() {
        RuntimeCheck::Executable { expr: lowered }
    } else {
        RuntimeCheck::StaticOnly {
            quantifiers: lowerer.static_only,
        }
    }
}

#[derive(Default)]
struct RuntimeLowerer {
    static_only: Vec<StaticOnlyQuantifier>,
}

impl RuntimeLowerer {
    fn lower(&mut self, expr: &ContractExpr) -> RuntimeExpr {
        match expr {
            ContractExpr::IntLit(n) => RuntimeExpr::Int(*n),
            ContractExpr::FloatLit(x) => RuntimeExpr::Float(*x),
            ContractExpr::BoolLit(b) => RuntimeExpr::Bool(*b),
            ContractExpr::StringLit(s) => RuntimeExpr::Str(s.clone()),
            ContractExpr::Var(name) => RuntimeExpr::Var(name.clone()),
            ContractExpr::Unary { op, expr } => RuntimeExpr::Unary {
                op: *op,
                expr: Box::new(self.lower(expr)),
            },
            ContractExpr::Binary { left, op, right } => RuntimeExpr::Binary {
                left: Box::new(self.lower(left)),
                op: *op,
                right: Box::new(self.lower(right)),
            },
            ContractExpr::If {
                cond,
                then_branch,
                else_branch,
            } => RuntimeExpr::If {
                cond: Box::new(self.lower(cond)),
                then_branch: Box::new(self.lower(then_branch)),
                else_branch: Box::new(self.lower(else_branch)),
            },
            ContractExpr::Index { array, index } => RuntimeExpr::Index {
                array: Box::new(self.lower(array)),
                index: Box::new(self.lower(index)),
            },
            ContractExpr::Len(array) => RuntimeExpr::Len(Box::new(self.lower(array))),
            ContractExpr::Implies {
                antecedent,
                consequent,
            } => self.lower(&lower_implication(antecedent, consequent)),
            ContractExpr::Quantifier { kind, vars, body } => {
                self.lower_quantifier(expr, *kind, vars, body)
            }
        }
    }

    fn lower_quantifier(
        &mut self,
        source: &ContractExpr,
        kind: QuantKind,
        vars: &[BoundVar],
        body: &ContractExpr,
    ) -> RuntimeExpr {
        match plan_quantifier(kind, vars, body) {
            QuantifierPlan::Loop(plan) => {
                let mut body = self.lower(&plan.predicate);
                for lv in plan.loops.iter().rev() {
                    body = RuntimeExpr::Iterate {
                        combinator: plan.combinator,
                        var: lv.name.clone(),
                        lower: Box::new(self.lower(&lv.lower)),
                        upper: Box::new(self.lower(&lv.upper)),
                        body: Box::new(body),
                    };
                }
                body
            }
            QuantifierPlan::StaticOnly { kind, unresolved } => {
                self.static_only.push(StaticOnlyQuantifier {
                    kind,
                    unresolved,
                    source: source.to_string(),
                });
                // Placeholder; a static-only check is never emitted
                RuntimeExpr::Bool(true)
            }
        }
    }
}
