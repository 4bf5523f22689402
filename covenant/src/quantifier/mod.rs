//! Bound inference and quantifier compilation
//!
//! Decides, for each `forall`/`exists` in a contract, whether an
//! executable runtime check can be emitted:
//!
//! - `bounds`: flattens a guard conjunction and extracts `[lower, upper)`
//!   ranges for the quantified variables
//! - `compile`: builds a nested-iteration `LoopPlan` or a static-only marker
//! - `lower`: rewrites implications into disjunctions
//! - `runtime`: lowers a whole contract into a `RuntimeCheck`
//!
//! Nothing here touches the solver or the verification cache.

pub mod bounds;
mod compile;
mod lower;
mod render;
mod runtime;

pub use bounds::{extract_bounds, flatten_conjunction, BoundExtraction, BoundRange};
pub use compile::{compile_quantifier, plan_quantifier, Combinator, LoopPlan, LoopVar, QuantifierPlan};
pub use lower::{lower_implication, lower_implications};
pub use runtime::{lower_runtime_check, RuntimeCheck, RuntimeExpr, StaticOnlyQuantifier};

use std::collections::HashMap;
use std::fmt;

use crate::contract::{ContractExpr, ContractFile};

/// Where a runtime check comes from (1-based positions)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSite {
    Precondition(usize),
    Postcondition(usize),
    /// Inline assertion, numbered within its function
    Assertion(usize),
}

impl fmt::Display for CheckSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckSite::Precondition(i) => write!(f, "pre #{i}"),
            CheckSite::Postcondition(i) => write!(f, "post #{i}"),
            CheckSite::Assertion(i) => write!(f, "assert #{i}"),
        }
    }
}

/// Runtime check for one contract or inline assertion
#[derive(Debug, Clone, PartialEq)]
pub struct SiteCheck {
    pub function: String,
    pub site: CheckSite,
    pub check: RuntimeCheck,
}

/// Lower every contract of `file`, then its inline assertions.
pub fn file_runtime_checks(file: &ContractFile) -> Vec<SiteCheck> {
    let mut checks = Vec::new();
    for func in &file.functions {
        for (i, pre) in func.preconditions.iter().enumerate() {
            checks.push(SiteCheck {
                function: func.name.clone(),
                site: CheckSite::Precondition(i + 1),
                check: lower_runtime_check(&pre.condition),
            });
        }
        for (i, post) in func.postconditions.iter().enumerate() {
            checks.push(SiteCheck {
                function: func.name.clone(),
                site: CheckSite::Postcondition(i + 1),
                check: lower_runtime_check(&post.condition),
            });
        }
    }
    let mut counters: HashMap<&str, usize> = HashMap::new();
    for assertion in &file.assertions {
        let n = counters.entry(assertion.function.as_str()).or_default();
        *n += 1;
        checks.push(SiteCheck {
            function: assertion.function.clone(),
            site: CheckSite::Assertion(*n),
            check: lower_runtime_check(&assertion.expr),
        });
    }
    checks
}

/// Compile every quantifier occurring in `expr`, outermost first.
///
/// This is the per-quantifier view handed to the code generator; nested
/// quantifiers are reported alongside their enclosing one.
pub fn quantifier_plans(expr: &ContractExpr) -> Vec<QuantifierPlan> {
    let mut plans = Vec::new();
    collect_plans(expr, &mut plans);
    plans
}

fn collect_plans(expr: &ContractExpr, out: &mut Vec<QuantifierPlan>) {
    match expr {
        ContractExpr::IntLit(_)
        | ContractExpr::FloatLit(_)
        | ContractExpr::BoolLit(_)
        | ContractExpr::StringLit(_)
        | ContractExpr::Var(_) => {}
        ContractExpr::Unary { expr, .. } => collect_plans(expr, out),
        ContractExpr::Binary { left, right, .. } => {
            collect_plans(left, out);
            collect_plans(right, out);
        }
        ContractExpr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_plans(cond, out);
            collect_plans(then_branch, out);
            collect_plans(else_branch, out);
        }
        ContractExpr::Index { array, index } => {
            collect_plans(array, out);
            collect_plans(index, out);
        }
        ContractExpr::Len(array) => collect_plans(array, out),
        ContractExpr::Implies {
            antecedent,
            consequent,
        } => {
            collect_plans(antecedent, out);
            collect_plans(consequent, out);
        }
        ContractExpr::Quantifier { kind, vars, body } => {
            out.push(plan_quantifier(*kind, vars, body));
            collect_plans(body, out);
        }
    }
}
