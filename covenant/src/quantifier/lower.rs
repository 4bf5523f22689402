//! Implication lowering

use crate::contract::{ContractExpr, QuantKind};

use super::compile::plan_quantifier;

/// Rewrite implications `a -> c` into `!(a) || c`.
///
/// The body implication of a `forall` whose bound variables all have an
/// inferable range is its guard and is kept, so quantifier planning still
/// sees it after this pass. Its antecedent and consequent are lowered.
/// Every other implication is rewritten, quantifier bodies included.
pub fn lower_implications(expr: &ContractExpr) -> ContractExpr {
    match expr {
        ContractExpr::IntLit(_)
        | ContractExpr::FloatLit(_)
        | ContractExpr::BoolLit(_)
        | ContractExpr::StringLit(_)
        | ContractExpr::Var(_) => expr.clone(),
        ContractExpr::Unary { op, expr } => ContractExpr::unary(*op, lower_implications(expr)),
        ContractExpr::Binary { left, op, right } => {
            ContractExpr::binary(lower_implications(left), *op, lower_implications(right))
        }
        ContractExpr::If {
            cond,
            then_branch,
            else_branch,
        } => ContractExpr::if_then_else(
            lower_implications(cond),
            lower_implications(then_branch),
            lower_implications(else_branch),
        ),
        ContractExpr::Index { array, index } => {
            ContractExpr::index(lower_implications(array), lower_implications(index))
        }
        ContractExpr::Len(array) => ContractExpr::len(lower_implications(array)),
        ContractExpr::Implies {
            antecedent,
            consequent,
        } => lower_implication(&lower_implications(antecedent), &lower_implications(consequent)),
        ContractExpr::Quantifier { kind, vars, body } => {
            let body = match body.as_ref() {
                ContractExpr::Implies {
                    antecedent,
                    consequent,
                } if *kind == QuantKind::Forall && !plan_quantifier(*kind, vars, body).is_static_only() => {
                    ContractExpr::implies(lower_implications(antecedent), lower_implications(consequent))
                }
                other => lower_implications(other),
            };
            ContractExpr::Quantifier {
                kind: *kind,
                vars: vars.clone(),
                body: Box::new(body),
            }
        }
    }
}

/// `!(antecedent) || consequent` for a single implication node
pub fn lower_implication(antecedent: &ContractExpr, consequent: &ContractExpr) -> ContractExpr {
    ContractExpr::or(ContractExpr::not(antecedent.clone()), consequent.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{BinOp, BoundVar};

    #[test]
    fn test_lower_simple_implication() {
        let p = ContractExpr::binary(ContractExpr::var("x"), BinOp::Gt, ContractExpr::int(0));
        let q = ContractExpr::binary(ContractExpr::var("y"), BinOp::Gt, ContractExpr::int(0));
        let lowered = lower_implications(&ContractExpr::implies(p.clone(), q.clone()));
        assert_eq!(lowered, ContractExpr::or(ContractExpr::not(p), q));
    }

    #[test]
    fn test_lower_nested_in_conditional() {
        let imp = ContractExpr::implies(ContractExpr::var("a"), ContractExpr::var("b"));
        let e = ContractExpr::if_then_else(ContractExpr::var("c"), imp, ContractExpr::bool(true));
        let ContractExpr::If { then_branch, .. } = lower_implications(&e) else {
            panic!("shape changed");
        };
        assert_eq!(
            *then_branch,
            ContractExpr::or(ContractExpr::not(ContractExpr::var("a")), ContractExpr::var("b"))
        );
    }

    #[test]
    fn test_lower_leaves_implication_free_tree_unchanged() {
        let e = ContractExpr::and(ContractExpr::var("a"), ContractExpr::len(ContractExpr::var("xs")));
        assert_eq!(lower_implications(&e), e);
    }

    #[test]
    fn test_bounded_guard_survives_lowering() {
        let i = || ContractExpr::var("i");
        let guard = ContractExpr::and(
            ContractExpr::binary(i(), BinOp::Ge, ContractExpr::int(0)),
            ContractExpr::binary(i(), BinOp::Lt, ContractExpr::var("n")),
        );
        let q = ContractExpr::forall(
            vec![BoundVar::int("i")],
            ContractExpr::implies(guard.clone(), ContractExpr::implies(ContractExpr::var("p"), ContractExpr::var("q"))),
        );
        let lowered = lower_implications(&q);
        let expected = ContractExpr::forall(
            vec![BoundVar::int("i")],
            ContractExpr::implies(
                guard,
                ContractExpr::or(ContractExpr::not(ContractExpr::var("p")), ContractExpr::var("q")),
            ),
        );
        assert_eq!(lowered, expected);
        assert!(!crate::quantifier::compile_quantifier(&lowered).unwrap().is_static_only());
    }

    #[test]
    fn test_unbounded_guard_is_lowered() {
        let i = || ContractExpr::var("i");
        let guard = ContractExpr::binary(i(), BinOp::Ge, ContractExpr::int(0));
        let consequent = ContractExpr::binary(i(), BinOp::Ne, ContractExpr::int(-1));
        let q = ContractExpr::forall(vec![BoundVar::int("i")], ContractExpr::implies(guard.clone(), consequent.clone()));
        assert_eq!(
            lower_implications(&q),
            ContractExpr::forall(
                vec![BoundVar::int("i")],
                ContractExpr::or(ContractExpr::not(guard), consequent),
            )
        );
    }
}
