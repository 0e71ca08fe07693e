use crate::operators::{GremlinOperator, Mutation, Replacement, Target};
use crate::syntax::{BoolOpKind, Expr, UnaryOpKind};

/// Flip boolean connectives and literals to expose logic test gaps.
///
/// `and` swaps with `or`, `not x` drops the negation, and `True`/`False`
/// literals flip.
pub struct BooleanOperator;

impl GremlinOperator for BooleanOperator {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn description(&self) -> &'static str {
        "Swap boolean operators and values (and/or, True/False, not x -> x)"
    }

    fn can_mutate(&self, target: Target<'_>) -> bool {
        let Target::Expr(expr) = target else {
            return false;
        };
        matches!(
            expr,
            Expr::BoolOp { .. }
                | Expr::UnaryOp {
                    op: UnaryOpKind::Not,
                    ..
                }
                | Expr::Bool { .. }
        )
    }

    fn mutate(&self, target: Target<'_>) -> Vec<Mutation> {
        let Target::Expr(expr) = target else {
            return Vec::new();
        };

        match expr {
            Expr::BoolOp { op, .. } => {
                let swapped = match op {
                    BoolOpKind::And => BoolOpKind::Or,
                    BoolOpKind::Or => BoolOpKind::And,
                };
                let mut mutated = expr.clone();
                let Expr::BoolOp { op: new_op, .. } = &mut mutated else {
                    unreachable!("clone of a bool op is a bool op");
                };
                *new_op = swapped;
                vec![Mutation {
                    replacement: Replacement::Expr(mutated),
                    description: format!("{} to {}", op.symbol(), swapped.symbol()),
                }]
            }
            Expr::UnaryOp {
                op: UnaryOpKind::Not,
                operand,
                ..
            } => vec![Mutation {
                replacement: Replacement::Expr((**operand).clone()),
                description: "not x to x".to_string(),
            }],
            Expr::Bool { value, loc } => vec![Mutation {
                replacement: Replacement::Expr(Expr::Bool {
                    value: !value,
                    loc: *loc,
                }),
                description: if *value {
                    "True to False".to_string()
                } else {
                    "False to True".to_string()
                },
            }],
            _ => Vec::new(),
        }
    }
}
