use crate::operators::{GremlinOperator, Mutation, Replacement, Target};
use crate::syntax::{CmpOpKind, Expr};

/// Swap comparison operators to expose boundary-condition test gaps.
///
/// `<` becomes `<=` and `>`; `==` becomes `!=`; and so on. Identity and
/// membership comparisons (`is`, `in`) are left alone.
pub struct ComparisonOperator;

fn replacements_for(op: CmpOpKind) -> &'static [CmpOpKind] {
    match op {
        CmpOpKind::Lt => &[CmpOpKind::LtE, CmpOpKind::Gt],
        CmpOpKind::LtE => &[CmpOpKind::Lt, CmpOpKind::Gt],
        CmpOpKind::Gt => &[CmpOpKind::GtE, CmpOpKind::Lt],
        CmpOpKind::GtE => &[CmpOpKind::Gt, CmpOpKind::Lt],
        CmpOpKind::Eq => &[CmpOpKind::NotEq],
        CmpOpKind::NotEq => &[CmpOpKind::Eq],
        _ => &[],
    }
}

impl GremlinOperator for ComparisonOperator {
    fn name(&self) -> &'static str {
        "comparison"
    }

    fn description(&self) -> &'static str {
        "Swap comparison operators (<, <=, >, >=, ==, !=)"
    }

    fn can_mutate(&self, target: Target<'_>) -> bool {
        let Target::Expr(Expr::Compare { ops, .. }) = target else {
            return false;
        };
        ops.iter().any(|op| !replacements_for(*op).is_empty())
    }

    fn mutate(&self, target: Target<'_>) -> Vec<Mutation> {
        let Target::Expr(expr @ Expr::Compare { ops, .. }) = target else {
            return Vec::new();
        };

        let mut mutations = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            for replacement in replacements_for(*op) {
                let mut mutated = expr.clone();
                let Expr::Compare { ops: new_ops, .. } = &mut mutated else {
                    unreachable!("clone of a comparison is a comparison");
                };
                new_ops[i] = *replacement;
                mutations.push(Mutation {
                    replacement: Replacement::Expr(mutated),
                    description: format!("{} to {}", op.symbol(), replacement.symbol()),
                });
            }
        }
        mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_module;
    use crate::syntax::printer::print_expr;
    use crate::syntax::Stmt;

    fn first_expr(source: &str) -> Expr {
        let module = parse_module(source).expect("parse should succeed");
        match &module.body[0] {
            Stmt::Assign { value, .. } => value.clone(),
            Stmt::ExprStmt { value, .. } => value.clone(),
            other => panic!("unexpected stmt {other:?}"),
        }
    }

    #[test]
    fn ge_yields_gt_and_lt() {
        let expr = first_expr("x = age >= 18\n");
        let op = ComparisonOperator;
        assert!(op.can_mutate(Target::Expr(&expr)));

        let muts = op.mutate(Target::Expr(&expr));
        let descs: Vec<&str> = muts.iter().map(|m| m.description.as_str()).collect();
        assert_eq!(descs, vec![">= to >", ">= to <"]);

        let Replacement::Expr(first) = &muts[0].replacement else {
            panic!("expected expression replacement");
        };
        assert_eq!(print_expr(first), "age > 18");
    }

    #[test]
    fn eq_yields_only_neq() {
        let expr = first_expr("x = a == b\n");
        let muts = ComparisonOperator.mutate(Target::Expr(&expr));
        assert_eq!(muts.len(), 1);
        assert_eq!(muts[0].description, "== to !=");
    }

    #[test]
    fn chained_comparison_mutates_each_op() {
        let expr = first_expr("x = 0 < a < 10\n");
        let muts = ComparisonOperator.mutate(Target::Expr(&expr));
        // Two ops, two replacements each.
        assert_eq!(muts.len(), 4);
        let descs: Vec<&str> = muts.iter().map(|m| m.description.as_str()).collect();
        assert_eq!(descs, vec!["< to <=", "< to >", "< to <=", "< to >"]);
    }

    #[test]
    fn is_and_in_are_not_mutated() {
        let expr = first_expr("x = a is None\n");
        assert!(!ComparisonOperator.can_mutate(Target::Expr(&expr)));

        let expr = first_expr("x = a in xs\n");
        assert!(!ComparisonOperator.can_mutate(Target::Expr(&expr)));
    }

    #[test]
    fn original_node_is_untouched() {
        let expr = first_expr("x = a < b\n");
        let before = print_expr(&expr);
        let _ = ComparisonOperator.mutate(Target::Expr(&expr));
        assert_eq!(print_expr(&expr), before);
    }
}
