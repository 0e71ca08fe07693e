use crate::syntax::ast::{
    BinOpKind, BoolOpKind, Expr, Module, Param, ParamKind, Stmt, UnaryOpKind,
};

/// Render a module back to runnable Python source.
///
/// Output is normalized: 4-space indents, one statement per line, and
/// precedence-driven parenthesization. It is not required to match the input
/// byte-for-byte, only to evaluate identically.
pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    for stmt in &module.body {
        write_stmt(&mut out, stmt, 0);
    }
    out
}

/// Render a single statement at top level, mainly for mutant descriptions.
pub fn print_stmt(stmt: &Stmt) -> String {
    let mut out = String::new();
    write_stmt(&mut out, stmt, 0);
    // Single-line fragments read better without the trailing newline.
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

/// Render an expression fragment.
pub fn print_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0);
    out
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("    ");
    }
}

fn write_body(out: &mut String, body: &[Stmt], indent: usize) {
    if body.is_empty() {
        push_indent(out, indent);
        out.push_str("pass\n");
        return;
    }
    for stmt in body {
        write_stmt(out, stmt, indent);
    }
}

fn write_stmt(out: &mut String, stmt: &Stmt, indent: usize) {
    match stmt {
        Stmt::FunctionDef {
            name,
            params,
            returns,
            decorators,
            body,
            ..
        } => {
            for dec in decorators {
                push_indent(out, indent);
                out.push('@');
                write_expr(out, dec, 0);
                out.push('\n');
            }
            push_indent(out, indent);
            out.push_str("def ");
            out.push_str(name);
            out.push('(');
            write_params(out, params);
            out.push(')');
            if let Some(ret) = returns {
                out.push_str(" -> ");
                write_expr(out, ret, 0);
            }
            out.push_str(":\n");
            write_body(out, body, indent + 1);
        }
        Stmt::ClassDef {
            name,
            bases,
            decorators,
            body,
            ..
        } => {
            for dec in decorators {
                push_indent(out, indent);
                out.push('@');
                write_expr(out, dec, 0);
                out.push('\n');
            }
            push_indent(out, indent);
            out.push_str("class ");
            out.push_str(name);
            if !bases.is_empty() {
                out.push('(');
                for (i, base) in bases.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_expr(out, base, 0);
                }
                out.push(')');
            }
            out.push_str(":\n");
            write_body(out, body, indent + 1);
        }
        Stmt::Return { value, .. } => {
            push_indent(out, indent);
            out.push_str("return");
            if let Some(v) = value {
                out.push(' ');
                write_expr(out, v, 0);
            }
            out.push('\n');
        }
        Stmt::If {
            test, body, orelse, ..
        } => {
            push_indent(out, indent);
            out.push_str("if ");
            write_expr(out, test, 0);
            out.push_str(":\n");
            write_body(out, body, indent + 1);
            write_orelse(out, orelse, indent);
        }
        Stmt::While { test, body, .. } => {
            push_indent(out, indent);
            out.push_str("while ");
            write_expr(out, test, 0);
            out.push_str(":\n");
            write_body(out, body, indent + 1);
        }
        Stmt::For {
            target, iter, body, ..
        } => {
            push_indent(out, indent);
            out.push_str("for ");
            write_expr(out, target, 0);
            out.push_str(" in ");
            write_expr(out, iter, 0);
            out.push_str(":\n");
            write_body(out, body, indent + 1);
        }
        Stmt::With { items, body, .. } => {
            push_indent(out, indent);
            out.push_str("with ");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, &item.context, 0);
                if let Some(alias) = &item.alias {
                    out.push_str(" as ");
                    write_expr(out, alias, 0);
                }
            }
            out.push_str(":\n");
            write_body(out, body, indent + 1);
        }
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        } => {
            push_indent(out, indent);
            out.push_str("try:\n");
            write_body(out, body, indent + 1);
            for handler in handlers {
                push_indent(out, indent);
                out.push_str("except");
                if let Some(typ) = &handler.typ {
                    out.push(' ');
                    write_expr(out, typ, 0);
                    if let Some(name) = &handler.name {
                        out.push_str(" as ");
                        out.push_str(name);
                    }
                }
                out.push_str(":\n");
                write_body(out, &handler.body, indent + 1);
            }
            if !orelse.is_empty() {
                push_indent(out, indent);
                out.push_str("else:\n");
                write_body(out, orelse, indent + 1);
            }
            if !finalbody.is_empty() {
                push_indent(out, indent);
                out.push_str("finally:\n");
                write_body(out, finalbody, indent + 1);
            }
        }
        Stmt::Assign { target, value, .. } => {
            push_indent(out, indent);
            write_expr(out, target, 0);
            out.push_str(" = ");
            write_expr(out, value, 0);
            out.push('\n');
        }
        Stmt::AnnAssign {
            target,
            annotation,
            value,
            ..
        } => {
            push_indent(out, indent);
            write_expr(out, target, 0);
            out.push_str(": ");
            write_expr(out, annotation, 0);
            if let Some(v) = value {
                out.push_str(" = ");
                write_expr(out, v, 0);
            }
            out.push('\n');
        }
        Stmt::AugAssign {
            target, op, value, ..
        } => {
            push_indent(out, indent);
            write_expr(out, target, 0);
            out.push(' ');
            out.push_str(op.symbol());
            out.push_str("= ");
            write_expr(out, value, 0);
            out.push('\n');
        }
        Stmt::ExprStmt { value, .. } => {
            push_indent(out, indent);
            write_expr(out, value, 0);
            out.push('\n');
        }
        Stmt::Import { names, .. } => {
            push_indent(out, indent);
            out.push_str("import ");
            write_import_names(out, names);
            out.push('\n');
        }
        Stmt::FromImport { module, names, .. } => {
            push_indent(out, indent);
            out.push_str("from ");
            out.push_str(module);
            out.push_str(" import ");
            write_import_names(out, names);
            out.push('\n');
        }
        Stmt::Raise { value, .. } => {
            push_indent(out, indent);
            out.push_str("raise");
            if let Some(v) = value {
                out.push(' ');
                write_expr(out, v, 0);
            }
            out.push('\n');
        }
        Stmt::Assert { test, msg, .. } => {
            push_indent(out, indent);
            out.push_str("assert ");
            write_expr(out, test, 0);
            if let Some(m) = msg {
                out.push_str(", ");
                write_expr(out, m, 0);
            }
            out.push('\n');
        }
        Stmt::Pass { .. } => {
            push_indent(out, indent);
            out.push_str("pass\n");
        }
        Stmt::Break { .. } => {
            push_indent(out, indent);
            out.push_str("break\n");
        }
        Stmt::Continue { .. } => {
            push_indent(out, indent);
            out.push_str("continue\n");
        }
    }
}

fn write_orelse(out: &mut String, orelse: &[Stmt], indent: usize) {
    if orelse.is_empty() {
        return;
    }
    // A single nested `if` renders as `elif`.
    if orelse.len() == 1 {
        if let Stmt::If {
            test, body, orelse, ..
        } = &orelse[0]
        {
            push_indent(out, indent);
            out.push_str("elif ");
            write_expr(out, test, 0);
            out.push_str(":\n");
            write_body(out, body, indent + 1);
            write_orelse(out, orelse, indent);
            return;
        }
    }
    push_indent(out, indent);
    out.push_str("else:\n");
    write_body(out, orelse, indent + 1);
}

fn write_import_names(out: &mut String, names: &[crate::syntax::ast::ImportName]) {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&name.name);
        if let Some(alias) = &name.alias {
            out.push_str(" as ");
            out.push_str(alias);
        }
    }
}

fn write_params(out: &mut String, params: &[Param]) {
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match param.kind {
            ParamKind::Plain => {}
            ParamKind::Star => out.push('*'),
            ParamKind::DoubleStar => out.push_str("**"),
        }
        out.push_str(&param.name);
        if let Some(ann) = &param.annotation {
            out.push_str(": ");
            write_expr(out, ann, 0);
        }
        if let Some(default) = &param.default {
            if param.annotation.is_some() {
                out.push_str(" = ");
            } else {
                out.push('=');
            }
            write_expr(out, default, 0);
        }
    }
}

/// Binding strength of an expression form; higher binds tighter.
fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Tuple { .. } => 15, // always printed with its own parens
        Expr::IfExp { .. } => 1,
        Expr::BoolOp {
            op: BoolOpKind::Or, ..
        } => 2,
        Expr::BoolOp {
            op: BoolOpKind::And,
            ..
        } => 3,
        Expr::UnaryOp {
            op: UnaryOpKind::Not,
            ..
        } => 4,
        Expr::Compare { .. } => 5,
        Expr::BinOp { op, .. } => match op {
            BinOpKind::BitOr => 6,
            BinOpKind::BitXor => 7,
            BinOpKind::BitAnd => 8,
            BinOpKind::LShift | BinOpKind::RShift => 9,
            BinOpKind::Add | BinOpKind::Sub => 10,
            BinOpKind::Mul | BinOpKind::Div | BinOpKind::FloorDiv | BinOpKind::Mod => 11,
            BinOpKind::Pow => 13,
        },
        Expr::UnaryOp { .. } => 12,
        Expr::Starred { .. } => 1,
        Expr::Slice { .. } => 1,
        Expr::Call { .. } | Expr::Attribute { .. } | Expr::Subscript { .. } => 14,
        _ => 15,
    }
}

fn write_expr(out: &mut String, expr: &Expr, min_prec: u8) {
    let prec = precedence(expr);
    let parens = prec < min_prec;
    if parens {
        out.push('(');
    }

    match expr {
        Expr::Compare {
            left,
            ops,
            comparators,
            ..
        } => {
            write_expr(out, left, 6);
            for (op, comp) in ops.iter().zip(comparators) {
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                write_expr(out, comp, 6);
            }
        }
        Expr::BinOp {
            left, op, right, ..
        } => {
            if *op == BinOpKind::Pow {
                // Right-associative; the exponent may be a unary factor.
                write_expr(out, left, 14);
                out.push_str(" ** ");
                write_expr(out, right, 12);
            } else {
                write_expr(out, left, prec);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                write_expr(out, right, prec + 1);
            }
        }
        Expr::UnaryOp { op, operand, .. } => {
            out.push_str(op.symbol());
            write_expr(out, operand, prec);
        }
        Expr::BoolOp { op, values, .. } => {
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                    out.push_str(op.symbol());
                    out.push(' ');
                }
                write_expr(out, value, prec + 1);
            }
        }
        Expr::IfExp {
            test, body, orelse, ..
        } => {
            write_expr(out, body, 2);
            out.push_str(" if ");
            write_expr(out, test, 2);
            out.push_str(" else ");
            write_expr(out, orelse, 1);
        }
        Expr::Call {
            func, args, kwargs, ..
        } => {
            write_expr(out, func, 14);
            out.push('(');
            let mut first = true;
            for arg in args {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                write_expr(out, arg, 0);
            }
            for (name, value) in kwargs {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                match name {
                    Some(name) => {
                        out.push_str(name);
                        out.push('=');
                    }
                    None => out.push_str("**"),
                }
                write_expr(out, value, 0);
            }
            out.push(')');
        }
        Expr::Attribute { value, attr, .. } => {
            write_expr(out, value, 14);
            out.push('.');
            out.push_str(attr);
        }
        Expr::Subscript { value, index, .. } => {
            write_expr(out, value, 14);
            out.push('[');
            write_expr(out, index, 0);
            out.push(']');
        }
        Expr::Slice {
            lower, upper, step, ..
        } => {
            if let Some(lower) = lower {
                write_expr(out, lower, 2);
            }
            out.push(':');
            if let Some(upper) = upper {
                write_expr(out, upper, 2);
            }
            if let Some(step) = step {
                out.push(':');
                write_expr(out, step, 2);
            }
        }
        Expr::Starred { value, .. } => {
            out.push('*');
            write_expr(out, value, 2);
        }
        Expr::Name { id, .. } => out.push_str(id),
        Expr::Int { value, .. } => out.push_str(&value.to_string()),
        Expr::Float { repr, .. } => out.push_str(repr),
        Expr::Str { value, .. } => write_str_literal(out, value),
        Expr::Bool { value, .. } => out.push_str(if *value { "True" } else { "False" }),
        Expr::NoneLit { .. } => out.push_str("None"),
        Expr::Tuple { elts, .. } => {
            out.push('(');
            for (i, elt) in elts.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, elt, 0);
            }
            if elts.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        Expr::List { elts, .. } => {
            out.push('[');
            for (i, elt) in elts.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, elt, 0);
            }
            out.push(']');
        }
        Expr::Dict { items, .. } => {
            out.push('{');
            for (i, (key, value)) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, key, 0);
                out.push_str(": ");
                write_expr(out, value, 0);
            }
            out.push('}');
        }
    }

    if parens {
        out.push(')');
    }
}

fn write_str_literal(out: &mut String, value: &str) {
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out.push('\'');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_module;

    fn roundtrip(source: &str) -> String {
        let module = parse_module(source).expect("parse should succeed");
        print_module(&module)
    }

    #[test]
    fn prints_simple_function() {
        let out = roundtrip("def is_adult(age): return age >= 18\n");
        assert_eq!(out, "def is_adult(age):\n    return age >= 18\n");
    }

    #[test]
    fn printed_output_reparses_to_same_tree() {
        let source = "\
def clamp(x, lo, hi):
    if x < lo:
        return lo
    elif x > hi:
        return hi
    return x
";
        let first = parse_module(source).expect("parse");
        let printed = print_module(&first);
        let second = parse_module(&printed).expect("reparse");
        assert_eq!(first, second);
    }

    #[test]
    fn parenthesizes_by_precedence() {
        let out = roundtrip("x = (a + b) * c\n");
        assert_eq!(out, "x = (a + b) * c\n");

        let out = roundtrip("y = a + b * c\n");
        assert_eq!(out, "y = a + b * c\n");
    }

    #[test]
    fn nested_comparison_keeps_parens() {
        let out = roundtrip("x = (a < b) == c\n");
        assert_eq!(out, "x = (a < b) == c\n");
    }

    #[test]
    fn ternary_chain_prints_flat() {
        let out = roundtrip("x = 1 if a else 2 if b else 3\n");
        assert_eq!(out, "x = 1 if a else 2 if b else 3\n");
    }

    #[test]
    fn ternary_in_arith_gets_parens() {
        let out = roundtrip("x = (1 if a else 2) + 3\n");
        assert_eq!(out, "x = (1 if a else 2) + 3\n");
    }

    #[test]
    fn power_prints_right_associative() {
        assert_eq!(roundtrip("x = 2 ** 3 ** 2\n"), "x = 2 ** 3 ** 2\n");
        assert_eq!(roundtrip("x = (2 ** 3) ** 2\n"), "x = (2 ** 3) ** 2\n");
    }

    #[test]
    fn string_escapes_survive() {
        let out = roundtrip("s = 'a\\nb\\'c'\n");
        assert_eq!(out, "s = 'a\\nb\\'c'\n");
    }

    #[test]
    fn single_element_tuple_keeps_comma() {
        let out = roundtrip("t = (1,)\n");
        assert_eq!(out, "t = (1,)\n");
    }

    #[test]
    fn empty_block_prints_pass() {
        use crate::syntax::ast::{Loc, Module, Stmt};
        let module = Module {
            body: vec![Stmt::While {
                test: crate::syntax::ast::Expr::Bool {
                    value: true,
                    loc: Loc::new(1, 7),
                },
                body: Vec::new(),
                loc: Loc::new(1, 1),
            }],
        };
        assert_eq!(print_module(&module), "while True:\n    pass\n");
    }

    #[test]
    fn slices_print_back() {
        assert_eq!(roundtrip("h = xs[:n]\n"), "h = xs[:n]\n");
        assert_eq!(roundtrip("s = xs[::2]\n"), "s = xs[::2]\n");
        assert_eq!(roundtrip("m = xs[a:b]\n"), "m = xs[a:b]\n");
    }

    #[test]
    fn try_with_prints_back() {
        let source = "\
try:
    with open(p) as f:
        data = f.read()
except OSError as e:
    log(e)
finally:
    done()
";
        let first = parse_module(source).expect("parse");
        let printed = print_module(&first);
        assert_eq!(parse_module(&printed).expect("reparse"), first);
    }
}
