//! Mutation-point discovery.
//!
//! The finder walks a parsed module in source order (pre-order) and asks each
//! enabled operator, in registry order, whether it can rewrite the node. The
//! instrumenter drives the same walk, so everything that decides gremlin
//! identity lives here.

use tracing::warn;

use crate::operators::{GremlinOperator, Mutation, Replacement, Target};
use crate::syntax::printer::{print_expr, print_stmt};
use crate::syntax::{Expr, Module, Stmt};

/// Generator for dense, zero-padded gremlin ids (`g001`, `g002`, ...).
///
/// Width grows beyond three digits only when the run discovers more than 999
/// mutations, which keeps ids stable for ordinary projects.
#[derive(Debug, Clone)]
pub struct IdGen {
    next: usize,
    width: usize,
}

impl IdGen {
    /// Create a generator sized for the expected total mutation count.
    pub fn new(total: usize) -> Self {
        let mut width = 3;
        let mut bound = 999;
        while total > bound {
            width += 1;
            bound = bound * 10 + 9;
        }
        Self { next: 1, width }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("g{:0width$}", self.next, width = self.width);
        self.next += 1;
        id
    }
}

/// All mutations one node yields, tagged with the operator that made them.
///
/// Operators apply in registry order; variants keep the order their operator
/// returned them in. Variants that fail to differ from the original node are
/// dropped here so a misbehaving operator degrades to a warning instead of a
/// broken catalogue.
pub fn node_mutations<'a>(
    target: Target<'_>,
    operators: &[&'a dyn GremlinOperator],
) -> Vec<(&'a dyn GremlinOperator, Mutation)> {
    let mut out = Vec::new();
    for op in operators {
        if !op.can_mutate(target) {
            continue;
        }
        for mutation in op.mutate(target) {
            if !differs_from_original(target, &mutation.replacement) {
                warn!(
                    operator = op.name(),
                    description = %mutation.description,
                    "operator produced a variant identical to the original, dropping"
                );
                continue;
            }
            out.push((*op, mutation));
        }
    }
    out
}

fn differs_from_original(target: Target<'_>, replacement: &Replacement) -> bool {
    match (target, replacement) {
        (Target::Expr(original), Replacement::Expr(mutated)) => {
            print_expr(original) != print_expr(mutated)
        }
        (Target::Stmt(original), Replacement::Stmt(mutated)) => {
            print_stmt(original) != print_stmt(mutated)
        }
        // A category change is a defect in the operator; treat as no-op.
        _ => false,
    }
}

/// Count every mutation the enabled operators would produce for a module.
///
/// Used to size gremlin ids before instrumentation; the walk order here
/// matches the instrumenter's exactly.
pub fn count_mutations(module: &Module, operators: &[&dyn GremlinOperator]) -> usize {
    let mut count = 0;
    for stmt in &module.body {
        count_stmt(stmt, operators, &mut count);
    }
    count
}

fn count_stmt(stmt: &Stmt, operators: &[&dyn GremlinOperator], count: &mut usize) {
    *count += node_mutations(Target::Stmt(stmt), operators).len();
    match stmt {
        Stmt::FunctionDef { params, body, .. } => {
            for param in params {
                if let Some(default) = &param.default {
                    count_expr(default, operators, count);
                }
            }
            for s in body {
                count_stmt(s, operators, count);
            }
        }
        Stmt::ClassDef { body, .. } => {
            for s in body {
                count_stmt(s, operators, count);
            }
        }
        Stmt::Return { value, .. } => {
            if let Some(v) = value {
                count_expr(v, operators, count);
            }
        }
        Stmt::If {
            test, body, orelse, ..
        } => {
            count_expr(test, operators, count);
            for s in body {
                count_stmt(s, operators, count);
            }
            for s in orelse {
                count_stmt(s, operators, count);
            }
        }
        Stmt::While { test, body, .. } => {
            count_expr(test, operators, count);
            for s in body {
                count_stmt(s, operators, count);
            }
        }
        Stmt::For {
            target, iter, body, ..
        } => {
            count_expr(target, operators, count);
            count_expr(iter, operators, count);
            for s in body {
                count_stmt(s, operators, count);
            }
        }
        Stmt::With { items, body, .. } => {
            for item in items {
                count_expr(&item.context, operators, count);
            }
            for s in body {
                count_stmt(s, operators, count);
            }
        }
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        } => {
            for s in body {
                count_stmt(s, operators, count);
            }
            for handler in handlers {
                for s in &handler.body {
                    count_stmt(s, operators, count);
                }
            }
            for s in orelse {
                count_stmt(s, operators, count);
            }
            for s in finalbody {
                count_stmt(s, operators, count);
            }
        }
        Stmt::Assign { target, value, .. } => {
            count_expr(target, operators, count);
            count_expr(value, operators, count);
        }
        Stmt::AnnAssign { target, value, .. } => {
            count_expr(target, operators, count);
            if let Some(v) = value {
                count_expr(v, operators, count);
            }
        }
        Stmt::AugAssign { target, value, .. } => {
            count_expr(target, operators, count);
            count_expr(value, operators, count);
        }
        Stmt::ExprStmt { value, .. } => count_expr(value, operators, count),
        Stmt::Raise { value, .. } => {
            if let Some(v) = value {
                count_expr(v, operators, count);
            }
        }
        Stmt::Assert { test, msg, .. } => {
            count_expr(test, operators, count);
            if let Some(m) = msg {
                count_expr(m, operators, count);
            }
        }
        Stmt::Import { .. }
        | Stmt::FromImport { .. }
        | Stmt::Pass { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. } => {}
    }
}

fn count_expr(expr: &Expr, operators: &[&dyn GremlinOperator], count: &mut usize) {
    *count += node_mutations(Target::Expr(expr), operators).len();
    for child in expr_children(expr) {
        count_expr(child, operators, count);
    }
}

/// Child expressions in textual source order.
///
/// Annotations, decorators, and class bases are intentionally absent from
/// the walk: mutating them cannot change test-observable behaviour.
pub fn expr_children(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Compare {
            left, comparators, ..
        } => {
            let mut children = vec![left.as_ref()];
            children.extend(comparators.iter());
            children
        }
        Expr::BinOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        Expr::UnaryOp { operand, .. } => vec![operand.as_ref()],
        Expr::BoolOp { values, .. } => values.iter().collect(),
        Expr::IfExp {
            test, body, orelse, ..
        } => vec![body.as_ref(), test.as_ref(), orelse.as_ref()],
        Expr::Call {
            func, args, kwargs, ..
        } => {
            let mut children = vec![func.as_ref()];
            children.extend(args.iter());
            children.extend(kwargs.iter().map(|(_, v)| v));
            children
        }
        Expr::Attribute { value, .. } => vec![value.as_ref()],
        Expr::Subscript { value, index, .. } => vec![value.as_ref(), index.as_ref()],
        Expr::Slice {
            lower, upper, step, ..
        } => {
            let mut children = Vec::new();
            if let Some(lower) = lower {
                children.push(lower.as_ref());
            }
            if let Some(upper) = upper {
                children.push(upper.as_ref());
            }
            if let Some(step) = step {
                children.push(step.as_ref());
            }
            children
        }
        Expr::Starred { value, .. } => vec![value.as_ref()],
        Expr::Tuple { elts, .. } | Expr::List { elts, .. } => elts.iter().collect(),
        Expr::Dict { items, .. } => items.iter().flat_map(|(k, v)| [k, v]).collect(),
        Expr::Name { .. }
        | Expr::Int { .. }
        | Expr::Float { .. }
        | Expr::Str { .. }
        | Expr::Bool { .. }
        | Expr::NoneLit { .. } => Vec::new(),
    }
}
