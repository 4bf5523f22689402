//! Bound inference
//!
//! Extracts a finite half-open range `[lower, upper)` for each quantified
//! variable from the comparisons in a quantifier's guard conjunction.

use crate::contract::{BinOp, BoundVar, ContractExpr};

/// Iteration range of one quantified variable.
///
/// Both bounds are normalized at extraction time: `lower` is inclusive,
/// `upper` is exclusive, whatever operator the source used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundRange {
    pub lower: Option<ContractExpr>,
    pub upper: Option<ContractExpr>,
}

impl BoundRange {
    pub fn new(lower: ContractExpr, upper: ContractExpr) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Both bounds resolved
    pub fn is_complete(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }
}

/// Which end of the range a guard leaf constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Lower,
    Upper,
}

/// A guard leaf recognized as a bound on one variable
#[derive(Debug, Clone, PartialEq)]
pub struct BoundLeaf {
    /// Position of the variable in the quantifier's binder list
    pub var_index: usize,
    pub side: BoundSide,
    /// Normalized bound expression (already adjusted by +1 where needed)
    pub bound: ContractExpr,
}

/// Result of running bound inference over a guard
#[derive(Debug, Clone, PartialEq)]
pub struct BoundExtraction<'a> {
    /// One range per bound variable, in declaration order
    pub ranges: Vec<(String, BoundRange)>,
    /// Guard leaves that did not contribute a bound, in source order
    pub residual: Vec<&'a ContractExpr>,
}

impl BoundExtraction<'_> {
    /// Names of variables missing a lower or upper bound
    pub fn unresolved(&self) -> Vec<String> {
        self.ranges
            .iter()
            .filter(|(_, range)| !range.is_complete())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.ranges.iter().all(|(_, range)| range.is_complete())
    }

    pub fn range_of(&self, name: &str) -> Option<&BoundRange> {
        self.ranges.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }
}

/// Flatten all top-level `&&` nodes into their leaves, in source order.
///
/// A guard without a conjunction is a one-element list.
pub fn flatten_conjunction(expr: &ContractExpr) -> Vec<&ContractExpr> {
    let mut leaves = Vec::new();
    collect_conjuncts(expr, &mut leaves);
    leaves
}

fn collect_conjuncts<'a>(expr: &'a ContractExpr, out: &mut Vec<&'a ContractExpr>) {
    match expr {
        ContractExpr::Binary {
            left,
            op: BinOp::And,
            right,
        } => {
            collect_conjuncts(left, out);
            collect_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

/// Recognize a single guard leaf as a bound on one of `vars`.
///
/// Exactly one side must be a bare reference to a bound variable and the
/// other side must not mention any bound variable.
pub fn classify_leaf(leaf: &ContractExpr, vars: &[BoundVar]) -> Option<BoundLeaf> {
    let ContractExpr::Binary { left, op, right } = leaf else {
        return None;
    };
    if !matches!(op, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge) {
        return None;
    }

    let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
    let var_position = |e: &ContractExpr| match e {
        ContractExpr::Var(name) => names.iter().position(|n| *n == name.as_str()),
        _ => None,
    };

    // Normalize to `v op bound` with the variable on the left
    let (var_index, op, bound) = match (var_position(left.as_ref()), var_position(right.as_ref())) {
        (Some(idx), None) if !right.mentions_any(&names) => (idx, *op, right.as_ref()),
        (None, Some(idx)) if !left.mentions_any(&names) => (idx, op.flipped(), left.as_ref()),
        _ => return None,
    };
    // Ranges are over integers; other literals stay in the predicate
    if matches!(
        bound,
        ContractExpr::FloatLit(_) | ContractExpr::BoolLit(_) | ContractExpr::StringLit(_)
    ) {
        return None;
    }

    let (side, bound) = match op {
        BinOp::Ge => (BoundSide::Lower, bound.clone()),
        BinOp::Lt => (BoundSide::Upper, bound.clone()),
        // No exclusive form of `i64::MAX` exists
        BinOp::Gt | BinOp::Le if *bound == ContractExpr::IntLit(i64::MAX) => return None,
        BinOp::Gt => (BoundSide::Lower, bound.clone().plus_one()),
        BinOp::Le => (BoundSide::Upper, bound.clone().plus_one()),
        _ => return None,
    };

    Some(BoundLeaf {
        var_index,
        side,
        bound,
    })
}

/// Extract a range for every variable in `vars` from `guard`.
///
/// The first lower and the first upper bound found for a variable win.
/// Later bound-shaped leaves on an already bounded side are not used for
/// tightening; they stay in `residual` so the loop predicate still checks
/// them.
pub fn extract_bounds<'a>(vars: &[BoundVar], guard: &'a ContractExpr) -> BoundExtraction<'a> {
    let mut ranges: Vec<(String, BoundRange)> = vars
        .iter()
        .map(|v| (v.name.clone(), BoundRange::default()))
        .collect();
    let mut residual = Vec::new();

    for leaf in flatten_conjunction(guard) {
        let Some(classified) = classify_leaf(leaf, vars) else {
            residual.push(leaf);
            continue;
        };
        let range = &mut ranges[classified.var_index].1;
        let slot = match classified.side {
            BoundSide::Lower => &mut range.lower,
            BoundSide::Upper => &mut range.upper,
        };
        if slot.is_none() {
            *slot = Some(classified.bound);
        } else {
            residual.push(leaf);
        }
    }

    BoundExtraction { ranges, residual }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> ContractExpr {
        ContractExpr::var(name)
    }

    fn cmp(l: ContractExpr, op: BinOp, r: ContractExpr) -> ContractExpr {
        ContractExpr::binary(l, op, r)
    }

    fn n_plus_one() -> ContractExpr {
        ContractExpr::binary(var("n"), BinOp::Add, ContractExpr::int(1))
    }

    #[test]
    fn test_flatten_nested_conjunction() {
        let a = cmp(var("i"), BinOp::Ge, ContractExpr::int(0));
        let b = cmp(var("i"), BinOp::Lt, var("n"));
        let c = cmp(var("x"), BinOp::Eq, var("y"));
        let guard = ContractExpr::and(a.clone(), ContractExpr::and(b.clone(), c.clone()));
        assert_eq!(flatten_conjunction(&guard), vec![&a, &b, &c]);
    }

    #[test]
    fn test_flatten_single_comparison() {
        let a = cmp(var("i"), BinOp::Lt, var("n"));
        assert_eq!(flatten_conjunction(&a), vec![&a]);
    }

    #[test]
    fn test_flatten_does_not_descend_into_or() {
        let a = ContractExpr::or(var("p"), var("q"));
        assert_eq!(flatten_conjunction(&a).len(), 1);
    }

    #[test]
    fn test_operator_table() {
        let vars = [BoundVar::int("i")];
        let cases = [
            (cmp(var("i"), BinOp::Ge, var("a")), BoundSide::Lower, var("a")),
            (cmp(var("a"), BinOp::Le, var("i")), BoundSide::Lower, var("a")),
            (
                cmp(var("i"), BinOp::Gt, var("a")),
                BoundSide::Lower,
                ContractExpr::binary(var("a"), BinOp::Add, ContractExpr::int(1)),
            ),
            (
                cmp(var("a"), BinOp::Lt, var("i")),
                BoundSide::Lower,
                ContractExpr::binary(var("a"), BinOp::Add, ContractExpr::int(1)),
            ),
            (cmp(var("i"), BinOp::Lt, var("n")), BoundSide::Upper, var("n")),
            (cmp(var("n"), BinOp::Gt, var("i")), BoundSide::Upper, var("n")),
            (cmp(var("i"), BinOp::Le, var("n")), BoundSide::Upper, n_plus_one()),
            (cmp(var("n"), BinOp::Ge, var("i")), BoundSide::Upper, n_plus_one()),
        ];
        for (leaf, side, bound) in cases {
            let classified = classify_leaf(&leaf, &vars).unwrap();
            assert_eq!(classified.var_index, 0);
            assert_eq!(classified.side, side, "{leaf}");
            assert_eq!(classified.bound, bound, "{leaf}");
        }
    }

    #[test]
    fn test_literal_bounds_fold() {
        let vars = [BoundVar::int("i")];
        let leaf = cmp(var("i"), BinOp::Le, ContractExpr::int(9));
        assert_eq!(classify_leaf(&leaf, &vars).unwrap().bound, ContractExpr::int(10));
    }

    #[test]
    fn test_classify_rejects_non_bound_shapes() {
        let vars = [BoundVar::int("i"), BoundVar::int("j")];
        // both sides bound
        assert!(classify_leaf(&cmp(var("i"), BinOp::Lt, var("j")), &vars).is_none());
        // bound side mentions a bound variable
        let mixed = cmp(
            var("i"),
            BinOp::Lt,
            ContractExpr::binary(var("j"), BinOp::Add, ContractExpr::int(1)),
        );
        assert!(classify_leaf(&mixed, &vars).is_none());
        // not a bare reference
        let indexed = cmp(ContractExpr::index(var("a"), var("i")), BinOp::Ge, ContractExpr::int(0));
        assert!(classify_leaf(&indexed, &vars).is_none());
        // equality is not a range operator
        assert!(classify_leaf(&cmp(var("i"), BinOp::Eq, ContractExpr::int(0)), &vars).is_none());
        // free variables only
        assert!(classify_leaf(&cmp(var("x"), BinOp::Lt, var("n")), &vars).is_none());
    }

    #[test]
    fn test_extract_half_open_range() {
        let vars = [BoundVar::int("i")];
        let guard = ContractExpr::and(
            cmp(var("i"), BinOp::Ge, ContractExpr::int(0)),
            cmp(var("i"), BinOp::Lt, var("n")),
        );
        let extraction = extract_bounds(&vars, &guard);
        assert!(extraction.is_complete());
        assert_eq!(
            extraction.range_of("i"),
            Some(&BoundRange::new(ContractExpr::int(0), var("n")))
        );
        assert!(extraction.residual.is_empty());
    }

    #[test]
    fn test_extract_inclusive_upper_normalizes() {
        let vars = [BoundVar::int("i")];
        let guard = ContractExpr::and(
            cmp(var("i"), BinOp::Ge, ContractExpr::int(0)),
            cmp(var("i"), BinOp::Le, var("n")),
        );
        let extraction = extract_bounds(&vars, &guard);
        assert_eq!(extraction.range_of("i").unwrap().upper, Some(n_plus_one()));
    }

    #[test]
    fn test_first_match_wins_and_redundant_bound_is_residual() {
        let vars = [BoundVar::int("i")];
        let redundant = cmp(var("i"), BinOp::Ge, ContractExpr::int(5));
        let guard = ContractExpr::conjunction(vec![
            cmp(var("i"), BinOp::Ge, ContractExpr::int(0)),
            redundant.clone(),
            cmp(var("i"), BinOp::Lt, var("n")),
        ]);
        let extraction = extract_bounds(&vars, &guard);
        let range = extraction.range_of("i").unwrap();
        assert_eq!(range.lower, Some(ContractExpr::int(0)));
        assert_eq!(extraction.residual, vec![&redundant]);
    }

    #[test]
    fn test_missing_upper_is_unresolved() {
        let vars = [BoundVar::int("i"), BoundVar::int("j")];
        let guard = ContractExpr::conjunction(vec![
            cmp(var("i"), BinOp::Ge, ContractExpr::int(0)),
            cmp(var("i"), BinOp::Lt, var("n")),
            cmp(var("j"), BinOp::Ge, ContractExpr::int(0)),
        ]);
        let extraction = extract_bounds(&vars, &guard);
        assert!(!extraction.is_complete());
        assert_eq!(extraction.unresolved(), vec!["j".to_string()]);
    }

    #[test]
    fn test_residual_keeps_source_order() {
        let vars = [BoundVar::int("i")];
        let p = cmp(ContractExpr::index(var("a"), var("i")), BinOp::Ne, ContractExpr::int(0));
        let q = cmp(var("x"), BinOp::Gt, ContractExpr::int(1));
        let guard = ContractExpr::conjunction(vec![
            p.clone(),
            cmp(var("i"), BinOp::Ge, ContractExpr::int(0)),
            q.clone(),
            cmp(var("i"), BinOp::Lt, var("n")),
        ]);
        let extraction = extract_bounds(&vars, &guard);
        assert!(extraction.is_complete());
        assert_eq!(extraction.residual, vec![&p, &q]);
    }

    #[test]
    fn test_bound_order_and_orientation_do_not_matter() {
        let vars = [BoundVar::int("i")];
        let expected = BoundRange::new(ContractExpr::int(0), var("n"));
        let lower = [
            cmp(var("i"), BinOp::Ge, ContractExpr::int(0)),
            cmp(ContractExpr::int(0), BinOp::Le, var("i")),
        ];
        let upper = [
            cmp(var("i"), BinOp::Lt, var("n")),
            cmp(var("n"), BinOp::Gt, var("i")),
        ];
        for lo in &lower {
            for hi in &upper {
                for guard in [
                    ContractExpr::and(lo.clone(), hi.clone()),
                    ContractExpr::and(hi.clone(), lo.clone()),
                ] {
                    let extraction = extract_bounds(&vars, &guard);
                    assert_eq!(extraction.range_of("i"), Some(&expected), "{guard}");
                    assert!(extraction.residual.is_empty(), "{guard}");
                }
            }
        }
    }

    #[test]
    fn test_non_integer_literal_is_not_a_bound() {
        let vars = [BoundVar::int("i")];
        let fractional = cmp(var("i"), BinOp::Lt, ContractExpr::FloatLit(2.5));
        assert!(classify_leaf(&fractional, &vars).is_none());
        assert!(classify_leaf(&cmp(ContractExpr::FloatLit(0.5), BinOp::Le, var("i")), &vars).is_none());

        let guard = ContractExpr::and(cmp(var("i"), BinOp::Ge, ContractExpr::int(0)), fractional.clone());
        let extraction = extract_bounds(&vars, &guard);
        assert_eq!(extraction.unresolved(), vec!["i".to_string()]);
        assert_eq!(extraction.residual, vec![&fractional]);
    }

    #[test]
    fn test_inclusive_max_literal_is_not_widened() {
        let vars = [BoundVar::int("i")];
        let at_max = cmp(var("i"), BinOp::Le, ContractExpr::int(i64::MAX));
        assert!(classify_leaf(&at_max, &vars).is_none());
        assert!(classify_leaf(&cmp(ContractExpr::int(i64::MAX), BinOp::Lt, var("i")), &vars).is_none());
        // Exclusive form of the same literal is still a bound
        let below_max = cmp(var("i"), BinOp::Lt, ContractExpr::int(i64::MAX));
        assert_eq!(classify_leaf(&below_max, &vars).unwrap().bound, ContractExpr::int(i64::MAX));
    }
}
