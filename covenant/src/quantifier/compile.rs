//! Quantifier compiler
//!
//! Turns a `forall`/`exists` node into a nested-iteration plan when every
//! bound variable has an inferable finite range, or into a static-only
//! marker when it does not.

use crate::contract::{BoundVar, ContractExpr, QuantKind, Type};

use super::bounds::{extract_bounds, BoundExtraction};

/// Iteration combinator used by the generated check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// True iff the predicate holds for every value (true on an empty range)
    All,
    /// True iff the predicate holds for some value (false on an empty range)
    Any,
}

impl Combinator {
    pub fn for_kind(kind: QuantKind) -> Self {
        match kind {
            QuantKind::Forall => Combinator::All,
            QuantKind::Exists => Combinator::Any,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Combinator::All => "all",
            Combinator::Any => "any",
        }
    }
}

/// One level of the nested iteration
#[derive(Debug, Clone, PartialEq)]
pub struct LoopVar {
    pub name: String,
    pub ty: Type,
    /// Inclusive lower bound
    pub lower: ContractExpr,
    /// Exclusive upper bound
    pub upper: ContractExpr,
}

/// Executable plan for a bounded quantifier.
///
/// `loops` is outermost first, in declaration order. `predicate` is
/// evaluated inside the innermost loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopPlan {
    pub kind: QuantKind,
    pub combinator: Combinator,
    pub loops: Vec<LoopVar>,
    pub predicate: ContractExpr,
}

/// Outcome of compiling a single quantifier
#[derive(Debug, Clone, PartialEq)]
pub enum QuantifierPlan {
    Loop(LoopPlan),
    /// No executable check; the property is left to the solver
    StaticOnly {
        kind: QuantKind,
        /// Bound variables whose range could not be inferred
        unresolved: Vec<String>,
    },
}

impl QuantifierPlan {
    pub fn is_static_only(&self) -> bool {
        matches!(self, QuantifierPlan::StaticOnly { .. })
    }

    pub fn kind(&self) -> QuantKind {
        match self {
            QuantifierPlan::Loop(plan) => plan.kind,
            QuantifierPlan::StaticOnly { kind, .. } => *kind,
        }
    }
}

/// Compile a quantifier node. Returns `None` if `expr` is not a quantifier.
pub fn compile_quantifier(expr: &ContractExpr) -> Option<QuantifierPlan> {
    match expr {
        ContractExpr::Quantifier { kind, vars, body } => Some(plan_quantifier(*kind, vars, body)),
        _ => None,
    }
}

/// Build the plan for `kind vars. body`.
pub fn plan_quantifier(kind: QuantKind, vars: &[BoundVar], body: &ContractExpr) -> QuantifierPlan {
    // Nothing to iterate: the body is checked once, as a plain boolean
    if vars.is_empty() {
        return QuantifierPlan::Loop(LoopPlan {
            kind,
            combinator: Combinator::for_kind(kind),
            loops: Vec::new(),
            predicate: body.clone(),
        });
    }

    // forall: the guard is the antecedent of the body implication.
    // exists: the body itself is the guard conjunction.
    let (guard, consequent) = match (kind, body) {
        (
            QuantKind::Forall,
            ContractExpr::Implies {
                antecedent,
                consequent,
            },
        ) => (antecedent.as_ref(), Some(consequent.as_ref())),
        (QuantKind::Forall, _) => {
            return QuantifierPlan::StaticOnly {
                kind,
                unresolved: vars.iter().map(|v| v.name.clone()).collect(),
            };
        }
        (QuantKind::Exists, body) => (body, None),
    };

    let extraction = extract_bounds(vars, guard);
    let mut unresolved = extraction.unresolved();
    // Only integer variables can be iterated
    for var in vars {
        if var.ty != Type::Int && !unresolved.contains(&var.name) {
            unresolved.push(var.name.clone());
        }
    }
    if !unresolved.is_empty() {
        return QuantifierPlan::StaticOnly { kind, unresolved };
    }

    let predicate = build_predicate(&extraction, consequent);
    let loops = vars
        .iter()
        .zip(extraction.ranges)
        .filter_map(|(var, (_, range))| {
            Some(LoopVar {
                name: var.name.clone(),
                ty: var.ty.clone(),
                lower: range.lower?,
                upper: range.upper?,
            })
        })
        .collect();

    QuantifierPlan::Loop(LoopPlan {
        kind,
        combinator: Combinator::for_kind(kind),
        loops,
        predicate,
    })
}

fn build_predicate(extraction: &BoundExtraction<'_>, consequent: Option<&ContractExpr>) -> ContractExpr {
    let residual: Vec<ContractExpr> = extraction.residual.iter().map(|e| (*e).clone()).collect();
    match consequent {
        Some(consequent) if residual.is_empty() => consequent.clone(),
        Some(consequent) => {
            ContractExpr::implies(ContractExpr::conjunction(residual), consequent.clone())
        }
        None => ContractExpr::conjunction(residual),
    }
}
