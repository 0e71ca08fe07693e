use crate::operators::{GremlinOperator, Mutation, Replacement, Target};
use crate::syntax::Expr;

/// Shift integer constants in comparisons by one to expose off-by-one gaps.
///
/// `x >= 18` yields `x >= 17` and `x >= 19`. Only integer literals directly
/// on either side of a comparison participate; booleans are a different node
/// kind in this tree so they never match.
pub struct BoundaryOperator;

const DELTAS: [i64; 2] = [-1, 1];

fn int_value(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Int { value, .. } => Some(*value),
        _ => None,
    }
}

impl GremlinOperator for BoundaryOperator {
    fn name(&self) -> &'static str {
        "boundary"
    }

    fn description(&self) -> &'static str {
        "Shift boundary values by +/- 1 in comparisons"
    }

    fn can_mutate(&self, target: Target<'_>) -> bool {
        let Target::Expr(Expr::Compare {
            left, comparators, ..
        }) = target
        else {
            return false;
        };
        int_value(left).is_some() || comparators.iter().any(|c| int_value(c).is_some())
    }

    fn mutate(&self, target: Target<'_>) -> Vec<Mutation> {
        let Target::Expr(expr @ Expr::Compare {
            left, comparators, ..
        }) = target
        else {
            return Vec::new();
        };

        let mut mutations = Vec::new();

        if let Some(value) = int_value(left) {
            for delta in DELTAS {
                let mut mutated = expr.clone();
                let Expr::Compare { left: new_left, .. } = &mut mutated else {
                    unreachable!("clone of a comparison is a comparison");
                };
                set_int(new_left, value + delta);
                mutations.push(Mutation {
                    replacement: Replacement::Expr(mutated),
                    description: format!("constant {} to {}", value, value + delta),
                });
            }
        }

        for (i, comp) in comparators.iter().enumerate() {
            let Some(value) = int_value(comp) else {
                continue;
            };
            for delta in DELTAS {
                let mut mutated = expr.clone();
                let Expr::Compare {
                    comparators: new_comps,
                    ..
                } = &mut mutated
                else {
                    unreachable!("clone of a comparison is a comparison");
                };
                set_int(&mut new_comps[i], value + delta);
                mutations.push(Mutation {
                    replacement: Replacement::Expr(mutated),
                    description: format!("constant {} to {}", value, value + delta),
                });
            }
        }

        mutations
    }
}

fn set_int(expr: &mut Expr, new_value: i64) {
    if let Expr::Int { value, .. } = expr {
        *value = new_value;
    }
}
