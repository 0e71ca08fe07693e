//! Switch-embedding instrumentation.
//!
//! Every candidate mutation is compiled into the module behind a check of
//! `__gremlin_active__`, a module-level binding read once from the
//! `ACTIVE_GREMLIN` environment variable at import time. With the variable
//! unset every dispatch falls through to the original node, so the
//! instrumented module is behaviourally identical to its source.

use std::path::Path;

use crate::finder::{node_mutations, IdGen};
use crate::gremlin::Gremlin;
use crate::operators::{GremlinOperator, Replacement, Target};
use crate::syntax::printer::{print_expr, print_module, print_stmt};
use crate::syntax::{Expr, ImportName, Loc, Module, Param, Stmt, SyntaxError, WithItem};

/// Environment variable naming the active gremlin; empty means none.
pub const ACTIVE_GREMLIN_ENV: &str = "ACTIVE_GREMLIN";

/// Module-level binding holding the activation key. The `__gremlin` prefix
/// is reserved; the trailing double underscore keeps the name out of class
/// attribute mangling.
const SWITCH_NAME: &str = "__gremlin_active__";

const OS_ALIAS: &str = "__gremlin_os__";

/// Result of instrumenting one module.
#[derive(Debug, Clone)]
pub struct InstrumentedModule {
    pub module: Module,
    pub gremlins: Vec<Gremlin>,
}

/// Parse and instrument one source file, returning rendered Python.
pub fn instrument_source(
    source: &str,
    path: &Path,
    operators: &[&dyn GremlinOperator],
    ids: &mut IdGen,
) -> Result<(String, Vec<Gremlin>), SyntaxError> {
    let module = crate::syntax::parse_module(source)?;
    let instrumented = instrument_module(&module, path, operators, ids);
    Ok((print_module(&instrumented.module), instrumented.gremlins))
}

/// Rewrite a parsed module so every mutation point dispatches on the
/// activation key. Gremlin ids come from `ids` in pre-order discovery order.
pub fn instrument_module(
    module: &Module,
    path: &Path,
    operators: &[&dyn GremlinOperator],
    ids: &mut IdGen,
) -> InstrumentedModule {
    let mut instrumenter = Instrumenter {
        path,
        operators,
        ids,
        gremlins: Vec::new(),
    };

    // The switch assignment must stay behind the docstring and any
    // `__future__` imports, which Python requires first. Statements in that
    // prefix run before the key is readable and are copied untouched.
    let insert_at = prelude_index(&module.body);

    let mut body = Vec::new();
    body.extend(module.body[..insert_at].iter().cloned());
    body.extend(prelude_stmts());
    for stmt in &module.body[insert_at..] {
        body.push(instrumenter.rewrite_stmt(stmt));
    }

    InstrumentedModule {
        module: Module { body },
        gremlins: instrumenter.gremlins,
    }
}

fn prelude_index(body: &[Stmt]) -> usize {
    let mut index = 0;
    if let Some(Stmt::ExprStmt {
        value: Expr::Str { .. },
        ..
    }) = body.first()
    {
        index = 1;
    }
    while let Some(Stmt::FromImport { module, .. }) = body.get(index) {
        if module != "__future__" {
            break;
        }
        index += 1;
    }
    index
}

fn prelude_stmts() -> Vec<Stmt> {
    let loc = Loc::new(1, 1);
    vec![
        Stmt::Import {
            names: vec![ImportName {
                name: "os".to_string(),
                alias: Some(OS_ALIAS.to_string()),
            }],
            loc,
        },
        Stmt::Assign {
            target: Expr::Name {
                id: SWITCH_NAME.to_string(),
                loc,
            },
            value: Expr::Call {
                func: Box::new(Expr::Attribute {
                    value: Box::new(Expr::Attribute {
                        value: Box::new(Expr::Name {
                            id: OS_ALIAS.to_string(),
                            loc,
                        }),
                        attr: "environ".to_string(),
                        loc,
                    }),
                    attr: "get".to_string(),
                    loc,
                }),
                args: vec![
                    Expr::Str {
                        value: ACTIVE_GREMLIN_ENV.to_string(),
                        loc,
                    },
                    Expr::Str {
                        value: String::new(),
                        loc,
                    },
                ],
                kwargs: Vec::new(),
                loc,
            },
            loc,
        },
    ]
}

fn key_check(id: &str, loc: Loc) -> Expr {
    Expr::Compare {
        left: Box::new(Expr::Name {
            id: SWITCH_NAME.to_string(),
            loc,
        }),
        ops: vec![crate::syntax::CmpOpKind::Eq],
        comparators: vec![Expr::Str {
            value: id.to_string(),
            loc,
        }],
        loc,
    }
}

struct Instrumenter<'a> {
    path: &'a Path,
    operators: &'a [&'a dyn GremlinOperator],
    ids: &'a mut IdGen,
    gremlins: Vec<Gremlin>,
}

impl Instrumenter<'_> {
    fn record(
        &mut self,
        operator: &dyn GremlinOperator,
        description: String,
        original: String,
        mutated: String,
        line: u32,
    ) -> String {
        let id = self.ids.next_id();
        self.gremlins.push(Gremlin {
            id: id.clone(),
            path: self.path.to_path_buf(),
            line,
            operator: operator.name().to_string(),
            description,
            original,
            mutated,
        });
        id
    }

    fn rewrite_stmt(&mut self, stmt: &Stmt) -> Stmt {
        // The statement's own gremlins take ids before anything nested in it.
        let mut entries = Vec::new();
        for (op, mutation) in node_mutations(Target::Stmt(stmt), self.operators) {
            let Replacement::Stmt(replacement) = mutation.replacement else {
                continue;
            };
            let id = self.record(
                op,
                mutation.description,
                print_stmt(stmt),
                print_stmt(&replacement),
                stmt.loc().line,
            );
            entries.push((id, replacement));
        }

        let rewritten = self.rewrite_stmt_children(stmt);
        if entries.is_empty() {
            return rewritten;
        }

        // Variants hold the pristine node: when one is active, every other
        // dispatch in the module falls through to its original anyway.
        let loc = stmt.loc();
        let mut result = rewritten;
        for (id, variant) in entries.into_iter().rev() {
            result = Stmt::If {
                test: key_check(&id, loc),
                body: vec![variant],
                orelse: vec![result],
                loc,
            };
        }
        result
    }

    fn rewrite_stmt_children(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::FunctionDef {
                name,
                params,
                returns,
                decorators,
                body,
                loc,
            } => {
                let params = params
                    .iter()
                    .map(|p| Param {
                        kind: p.kind,
                        name: p.name.clone(),
                        annotation: p.annotation.clone(),
                        default: p.default.as_ref().map(|d| self.rewrite_expr(d)),
                    })
                    .collect();
                let body = self.rewrite_body(body);
                Stmt::FunctionDef {
                    name: name.clone(),
                    params,
                    returns: returns.clone(),
                    decorators: decorators.clone(),
                    body,
                    loc: *loc,
                }
            }
            Stmt::ClassDef {
                name,
                bases,
                decorators,
                body,
                loc,
            } => Stmt::ClassDef {
                name: name.clone(),
                bases: bases.clone(),
                decorators: decorators.clone(),
                body: self.rewrite_body(body),
                loc: *loc,
            },
            Stmt::Return { value, loc } => Stmt::Return {
                value: value.as_ref().map(|v| self.rewrite_expr(v)),
                loc: *loc,
            },
            Stmt::If {
                test,
                body,
                orelse,
                loc,
            } => {
                let test = self.rewrite_expr(test);
                let body = self.rewrite_body(body);
                let orelse = self.rewrite_body(orelse);
                Stmt::If {
                    test,
                    body,
                    orelse,
                    loc: *loc,
                }
            }
            Stmt::While { test, body, loc } => {
                let test = self.rewrite_expr(test);
                let body = self.rewrite_body(body);
                Stmt::While {
                    test,
                    body,
                    loc: *loc,
                }
            }
            Stmt::For {
                target,
                iter,
                body,
                loc,
            } => {
                let target = self.rewrite_expr(target);
                let iter = self.rewrite_expr(iter);
                let body = self.rewrite_body(body);
                Stmt::For {
                    target,
                    iter,
                    body,
                    loc: *loc,
                }
            }
            Stmt::With { items, body, loc } => {
                let items = items
                    .iter()
                    .map(|item| WithItem {
                        context: self.rewrite_expr(&item.context),
                        alias: item.alias.clone(),
                    })
                    .collect();
                let body = self.rewrite_body(body);
                Stmt::With {
                    items,
                    body,
                    loc: *loc,
                }
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                loc,
            } => {
                let body = self.rewrite_body(body);
                let handlers = handlers
                    .iter()
                    .map(|h| crate::syntax::ast::ExceptHandler {
                        typ: h.typ.clone(),
                        name: h.name.clone(),
                        body: self.rewrite_body(&h.body),
                        loc: h.loc,
                    })
                    .collect();
                let orelse = self.rewrite_body(orelse);
                let finalbody = self.rewrite_body(finalbody);
                Stmt::Try {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                    loc: *loc,
                }
            }
            Stmt::Assign { target, value, loc } => {
                let target = self.rewrite_expr(target);
                let value = self.rewrite_expr(value);
                Stmt::Assign {
                    target,
                    value,
                    loc: *loc,
                }
            }
            Stmt::AnnAssign {
                target,
                annotation,
                value,
                loc,
            } => {
                let target = self.rewrite_expr(target);
                let value = value.as_ref().map(|v| self.rewrite_expr(v));
                Stmt::AnnAssign {
                    target,
                    annotation: annotation.clone(),
                    value,
                    loc: *loc,
                }
            }
            Stmt::AugAssign {
                target,
                op,
                value,
                loc,
            } => {
                let target = self.rewrite_expr(target);
                let value = self.rewrite_expr(value);
                Stmt::AugAssign {
                    target,
                    op: *op,
                    value,
                    loc: *loc,
                }
            }
            Stmt::ExprStmt { value, loc } => Stmt::ExprStmt {
                value: self.rewrite_expr(value),
                loc: *loc,
            },
            Stmt::Raise { value, loc } => Stmt::Raise {
                value: value.as_ref().map(|v| self.rewrite_expr(v)),
                loc: *loc,
            },
            Stmt::Assert { test, msg, loc } => {
                let test = self.rewrite_expr(test);
                let msg = msg.as_ref().map(|m| self.rewrite_expr(m));
                Stmt::Assert {
                    test,
                    msg,
                    loc: *loc,
                }
            }
            Stmt::Import { .. }
            | Stmt::FromImport { .. }
            | Stmt::Pass { .. }
            | Stmt::Break { .. }
            | Stmt::Continue { .. } => stmt.clone(),
        }
    }

    fn rewrite_body(&mut self, body: &[Stmt]) -> Vec<Stmt> {
        body.iter().map(|s| self.rewrite_stmt(s)).collect()
    }

    fn rewrite_expr(&mut self, expr: &Expr) -> Expr {
        let mut entries = Vec::new();
        for (op, mutation) in node_mutations(Target::Expr(expr), self.operators) {
            let Replacement::Expr(replacement) = mutation.replacement else {
                continue;
            };
            let id = self.record(
                op,
                mutation.description,
                print_expr(expr),
                print_expr(&replacement),
                expr.loc().line,
            );
            entries.push((id, replacement));
        }

        let rewritten = self.rewrite_expr_children(expr);
        if entries.is_empty() {
            return rewritten;
        }

        let loc = expr.loc();
        let mut result = rewritten;
        for (id, variant) in entries.into_iter().rev() {
            result = Expr::IfExp {
                test: Box::new(key_check(&id, loc)),
                body: Box::new(variant),
                orelse: Box::new(result),
                loc,
            };
        }
        result
    }

    fn rewrite_expr_children(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Compare {
                left,
                ops,
                comparators,
                loc,
            } => {
                let left = self.rewrite_expr(left);
                let comparators = comparators.iter().map(|c| self.rewrite_expr(c)).collect();
                Expr::Compare {
                    left: Box::new(left),
                    ops: ops.clone(),
                    comparators,
                    loc: *loc,
                }
            }
            Expr::BinOp {
                left,
                op,
                right,
                loc,
            } => {
                let left = self.rewrite_expr(left);
                let right = self.rewrite_expr(right);
                Expr::BinOp {
                    left: Box::new(left),
                    op: *op,
                    right: Box::new(right),
                    loc: *loc,
                }
            }
            Expr::UnaryOp { op, operand, loc } => Expr::UnaryOp {
                op: *op,
                operand: Box::new(self.rewrite_expr(operand)),
                loc: *loc,
            },
            Expr::BoolOp { op, values, loc } => Expr::BoolOp {
                op: *op,
                values: values.iter().map(|v| self.rewrite_expr(v)).collect(),
                loc: *loc,
            },
            Expr::IfExp {
                test,
                body,
                orelse,
                loc,
            } => {
                // Children in textual order: body, test, orelse.
                let body = self.rewrite_expr(body);
                let test = self.rewrite_expr(test);
                let orelse = self.rewrite_expr(orelse);
                Expr::IfExp {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                    loc: *loc,
                }
            }
            Expr::Call {
                func,
                args,
                kwargs,
                loc,
            } => {
                let func = self.rewrite_expr(func);
                let args = args.iter().map(|a| self.rewrite_expr(a)).collect();
                let kwargs = kwargs
                    .iter()
                    .map(|(name, value)| (name.clone(), self.rewrite_expr(value)))
                    .collect();
                Expr::Call {
                    func: Box::new(func),
                    args,
                    kwargs,
                    loc: *loc,
                }
            }
            Expr::Attribute { value, attr, loc } => Expr::Attribute {
                value: Box::new(self.rewrite_expr(value)),
                attr: attr.clone(),
                loc: *loc,
            },
            Expr::Subscript { value, index, loc } => {
                let value = self.rewrite_expr(value);
                let index = self.rewrite_expr(index);
                Expr::Subscript {
                    value: Box::new(value),
                    index: Box::new(index),
                    loc: *loc,
                }
            }
            Expr::Slice {
                lower,
                upper,
                step,
                loc,
            } => Expr::Slice {
                lower: lower.as_ref().map(|e| Box::new(self.rewrite_expr(e))),
                upper: upper.as_ref().map(|e| Box::new(self.rewrite_expr(e))),
                step: step.as_ref().map(|e| Box::new(self.rewrite_expr(e))),
                loc: *loc,
            },
            Expr::Starred { value, loc } => Expr::Starred {
                value: Box::new(self.rewrite_expr(value)),
                loc: *loc,
            },
            Expr::Tuple { elts, loc } => Expr::Tuple {
                elts: elts.iter().map(|e| self.rewrite_expr(e)).collect(),
                loc: *loc,
            },
            Expr::List { elts, loc } => Expr::List {
                elts: elts.iter().map(|e| self.rewrite_expr(e)).collect(),
                loc: *loc,
            },
            Expr::Dict { items, loc } => Expr::Dict {
                items: items
                    .iter()
                    .map(|(k, v)| (self.rewrite_expr(k), self.rewrite_expr(v)))
                    .collect(),
                loc: *loc,
            },
            Expr::Name { .. }
            | Expr::Int { .. }
            | Expr::Float { .. }
            | Expr::Str { .. }
            | Expr::Bool { .. }
            | Expr::NoneLit { .. } => expr.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::count_mutations;
    use crate::operators::OperatorRegistry;
    use crate::syntax::parse_module;
    use std::path::PathBuf;

    fn instrument(source: &str, enabled: Option<&[&str]>) -> (String, Vec<Gremlin>) {
        let registry = OperatorRegistry::builtin();
        let names: Option<Vec<String>> =
            enabled.map(|ns| ns.iter().map(|s| s.to_string()).collect());
        let operators = registry.enabled(names.as_deref());

        let module = parse_module(source).expect("parse should succeed");
        let total = count_mutations(&module, &operators);
        let mut ids = IdGen::new(total);
        let path = PathBuf::from("src/example.py");
        instrument_source(source, &path, &operators, &mut ids).expect("instrument")
    }

    #[test]
    fn is_adult_catalogue_matches_expected_ids() {
        let (_, gremlins) = instrument(
            "def is_adult(age): return age >= 18\n",
            Some(&["comparison", "boundary"]),
        );

        let summary: Vec<(String, String)> = gremlins
            .iter()
            .map(|g| (g.id.clone(), g.description.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("g001".to_string(), ">= to >".to_string()),
                ("g002".to_string(), ">= to <".to_string()),
                ("g003".to_string(), "constant 18 to 17".to_string()),
                ("g004".to_string(), "constant 18 to 19".to_string()),
            ]
        );
        assert!(gremlins.iter().all(|g| g.line == 1));
    }

    #[test]
    fn instrumented_module_renders_dispatch_chain() {
        let (source, _) = instrument(
            "def is_adult(age): return age >= 18\n",
            Some(&["comparison", "boundary"]),
        );
        let expected = "\
import os as __gremlin_os__
__gremlin_active__ = __gremlin_os__.environ.get('ACTIVE_GREMLIN', '')
def is_adult(age):
    return age > 18 if __gremlin_active__ == 'g001' else age < 18 if __gremlin_active__ == 'g002' else age >= 17 if __gremlin_active__ == 'g003' else age >= 19 if __gremlin_active__ == 'g004' else age >= 18
";
        assert_eq!(source, expected);
    }

    #[test]
    fn return_dispatch_is_a_statement_cascade() {
        let (source, gremlins) = instrument("def f(): return compute()\n", Some(&["return"]));

        assert_eq!(gremlins.len(), 1);
        assert_eq!(gremlins[0].description, "return value to None");
        assert!(source.contains("if __gremlin_active__ == 'g001':"));
        assert!(source.contains("return None"));
        assert!(source.contains("return compute()"));
    }

    #[test]
    fn instrumented_output_reparses() {
        let source = "\
def grade(score):
    if score >= 90 and score <= 100:
        return 'A'
    elif score >= 80:
        return 'B'
    return 'F'
";
        let (instrumented, gremlins) = instrument(source, None);
        assert!(!gremlins.is_empty());
        parse_module(&instrumented).expect("instrumented module should reparse");
    }

    #[test]
    fn instrumentation_is_deterministic() {
        let source = "def f(a, b):\n    return a + b > 0 or not b\n";
        let first = instrument(source, None);
        let second = instrument(source, None);
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn ids_are_dense_from_one() {
        let source = "def f(x):\n    if x > 0:\n        return x - 1\n    return 0\n";
        let (_, gremlins) = instrument(source, None);
        for (i, g) in gremlins.iter().enumerate() {
            assert_eq!(g.id, format!("g{:03}", i + 1));
        }
    }

    #[test]
    fn prelude_follows_docstring_and_future_imports() {
        let source = "\
'''Utility helpers.'''
from __future__ import annotations
import math

def f(x): return x > 0
";
        let (instrumented, _) = instrument(source, None);
        let lines: Vec<&str> = instrumented.lines().collect();
        assert_eq!(lines[0], "'Utility helpers.'");
        assert_eq!(lines[1], "from __future__ import annotations");
        assert_eq!(lines[2], "import os as __gremlin_os__");
        assert!(lines[3].starts_with("__gremlin_active__ = "));
        assert_eq!(lines[4], "import math");
    }

    #[test]
    fn catalogue_length_matches_finder_count() {
        let source = "\
def f(a, b):
    while a < b:
        a += 1
    return a * 2 == b or a != 0
";
        let registry = OperatorRegistry::builtin();
        let operators = registry.enabled(None);
        let module = parse_module(source).expect("parse");
        let total = count_mutations(&module, &operators);

        let mut ids = IdGen::new(total);
        let path = PathBuf::from("src/example.py");
        let result = instrument_module(&module, &path, &operators, &mut ids);
        assert_eq!(result.gremlins.len(), total);
    }

    #[test]
    fn original_fragments_are_recorded() {
        let (_, gremlins) = instrument(
            "def is_adult(age): return age >= 18\n",
            Some(&["comparison"]),
        );
        assert_eq!(gremlins[0].original, "age >= 18");
        assert_eq!(gremlins[0].mutated, "age > 18");
    }
}
