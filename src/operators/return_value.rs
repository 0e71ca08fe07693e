use crate::operators::{GremlinOperator, Mutation, Replacement, Target};
use crate::syntax::{Expr, Stmt};

/// Replace return values to verify tests actually inspect them.
///
/// `return e` becomes `return None`; boolean returns additionally flip.
/// Bare returns and explicit `return None` have nothing to weaken.
pub struct ReturnOperator;

fn returned_value(target: Target<'_>) -> Option<&Expr> {
    let Target::Stmt(Stmt::Return {
        value: Some(value), ..
    }) = target
    else {
        return None;
    };
    if value.is_none_literal() {
        return None;
    }
    Some(value)
}

impl GremlinOperator for ReturnOperator {
    fn name(&self) -> &'static str {
        "return"
    }

    fn description(&self) -> &'static str {
        "Replace return values with None or the negated boolean"
    }

    fn can_mutate(&self, target: Target<'_>) -> bool {
        returned_value(target).is_some()
    }

    fn mutate(&self, target: Target<'_>) -> Vec<Mutation> {
        let Some(value) = returned_value(target) else {
            return Vec::new();
        };
        let Target::Stmt(stmt) = target else {
            return Vec::new();
        };
        let loc = stmt.loc();

        let mut mutations = vec![Mutation {
            replacement: Replacement::Stmt(Stmt::Return {
                value: Some(Expr::NoneLit { loc }),
                loc,
            }),
            description: "return value to None".to_string(),
        }];

        if let Expr::Bool { value: b, loc: bloc } = value {
            mutations.push(Mutation {
                replacement: Replacement::Stmt(Stmt::Return {
                    value: Some(Expr::Bool {
                        value: !b,
                        loc: *bloc,
                    }),
                    loc,
                }),
                description: if *b {
                    "return True to False".to_string()
                } else {
                    "return False to True".to_string()
                },
            });
        }

        mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_module;
    use crate::syntax::printer::print_stmt;

    fn first_return(source: &str) -> Stmt {
        let module = parse_module(source).expect("parse should succeed");
        let Stmt::FunctionDef { body, .. } = &module.body[0] else {
            panic!("expected function def");
        };
        body[0].clone()
    }

    #[test]
    fn return_value_becomes_none() {
        let stmt = first_return("def f(): return x + 1\n");
        let muts = ReturnOperator.mutate(Target::Stmt(&stmt));
        assert_eq!(muts.len(), 1);
        assert_eq!(muts[0].description, "return value to None");

        let Replacement::Stmt(mutated) = &muts[0].replacement else {
            panic!("expected statement replacement");
        };
        assert_eq!(print_stmt(mutated), "return None");
    }

    #[test]
    fn boolean_return_also_flips() {
        let stmt = first_return("def f(): return True\n");
        let muts = ReturnOperator.mutate(Target::Stmt(&stmt));
        let descs: Vec<&str> = muts.iter().map(|m| m.description.as_str()).collect();
        assert_eq!(descs, vec!["return value to None", "return True to False"]);
    }

    #[test]
    fn bare_return_is_skipped() {
        let stmt = first_return("def f(): return\n");
        assert!(!ReturnOperator.can_mutate(Target::Stmt(&stmt)));
    }

    #[test]
    fn return_none_is_skipped() {
        let stmt = first_return("def f(): return None\n");
        assert!(!ReturnOperator.can_mutate(Target::Stmt(&stmt)));
    }
}
