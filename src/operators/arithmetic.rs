use crate::operators::{GremlinOperator, Mutation, Replacement, Target};
use crate::syntax::{BinOpKind, Expr};

/// Swap arithmetic operators to expose calculation test gaps.
pub struct ArithmeticOperator;

fn replacement_for(op: BinOpKind) -> Option<BinOpKind> {
    match op {
        BinOpKind::Add => Some(BinOpKind::Sub),
        BinOpKind::Sub => Some(BinOpKind::Add),
        BinOpKind::Mul => Some(BinOpKind::Div),
        BinOpKind::Div => Some(BinOpKind::Mul),
        BinOpKind::FloorDiv => Some(BinOpKind::Div),
        BinOpKind::Mod => Some(BinOpKind::FloorDiv),
        BinOpKind::Pow => Some(BinOpKind::Mul),
        _ => None,
    }
}

impl GremlinOperator for ArithmeticOperator {
    fn name(&self) -> &'static str {
        "arithmetic"
    }

    fn description(&self) -> &'static str {
        "Swap arithmetic operators (+, -, *, /, //, %, **)"
    }

    fn can_mutate(&self, target: Target<'_>) -> bool {
        let Target::Expr(Expr::BinOp { op, .. }) = target else {
            return false;
        };
        replacement_for(*op).is_some()
    }

    fn mutate(&self, target: Target<'_>) -> Vec<Mutation> {
        let Target::Expr(expr @ Expr::BinOp { op, .. }) = target else {
            return Vec::new();
        };
        let Some(replacement) = replacement_for(*op) else {
            return Vec::new();
        };

        let mut mutated = expr.clone();
        let Expr::BinOp { op: new_op, .. } = &mut mutated else {
            unreachable!("clone of a binary op is a binary op");
        };
        *new_op = replacement;

        vec![Mutation {
            replacement: Replacement::Expr(mutated),
            description: format!("{} to {}", op.symbol(), replacement.symbol()),
        }]
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
            other => panic!("unexpected stmt {other:?}"),
        }
    }

    #[test]
    fn add_becomes_sub() {
        let expr = first_expr("x = a + b\n");
        let muts = ArithmeticOperator.mutate(Target::Expr(&expr));
        assert_eq!(muts.len(), 1);
        assert_eq!(muts[0].description, "+ to -");

        let Replacement::Expr(mutated) = &muts[0].replacement else {
            panic!("expected expression replacement");
        };
        assert_eq!(print_expr(mutated), "a - b");
    }

    #[test]
    fn floordiv_becomes_truediv() {
        let expr = first_expr("x = a // b\n");
        let muts = ArithmeticOperator.mutate(Target::Expr(&expr));
        assert_eq!(muts[0].description, "// to /");
    }

    #[test]
    fn mod_becomes_floordiv() {
        let expr = first_expr("x = a % b\n");
        let muts = ArithmeticOperator.mutate(Target::Expr(&expr));
        assert_eq!(muts[0].description, "% to //");
    }

    #[test]
    fn pow_becomes_mul() {
        let expr = first_expr("x = a ** b\n");
        let muts = ArithmeticOperator.mutate(Target::Expr(&expr));
        assert_eq!(muts[0].description, "** to *");
    }

    #[test]
    fn bitwise_ops_are_left_alone() {
        let expr = first_expr("x = a | b\n");
        assert!(!ArithmeticOperator.can_mutate(Target::Expr(&expr)));
        assert!(ArithmeticOperator.mutate(Target::Expr(&expr)).is_empty());
    }
}
