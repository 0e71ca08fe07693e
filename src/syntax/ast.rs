use std::fmt;

/// Source position of a node, 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub line: u32,
    pub col: u32,
}

impl Loc {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A parsed Python module: a sequence of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

/// How a function parameter binds: plain, `*args`, or `**kwargs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Plain,
    Star,
    DoubleStar,
}

/// A function parameter, optionally annotated and defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub kind: ParamKind,
    pub name: String,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

/// One `import a as b` style binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

/// One `with` context manager, optionally aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context: Expr,
    pub alias: Option<Expr>,
}

/// One `except` clause of a `try` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub typ: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    FunctionDef {
        name: String,
        params: Vec<Param>,
        returns: Option<Expr>,
        decorators: Vec<Expr>,
        body: Vec<Stmt>,
        loc: Loc,
    },
    ClassDef {
        name: String,
        bases: Vec<Expr>,
        decorators: Vec<Expr>,
        body: Vec<Stmt>,
        loc: Loc,
    },
    Return {
        value: Option<Expr>,
        loc: Loc,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        /// `elif` chains parse as a nested `If` inside `orelse`.
        orelse: Vec<Stmt>,
        loc: Loc,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        loc: Loc,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        loc: Loc,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        loc: Loc,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
        loc: Loc,
    },
    Assign {
        target: Expr,
        value: Expr,
        loc: Loc,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
        loc: Loc,
    },
    AugAssign {
        target: Expr,
        op: BinOpKind,
        value: Expr,
        loc: Loc,
    },
    ExprStmt {
        value: Expr,
        loc: Loc,
    },
    Import {
        names: Vec<ImportName>,
        loc: Loc,
    },
    FromImport {
        module: String,
        names: Vec<ImportName>,
        loc: Loc,
    },
    Raise {
        value: Option<Expr>,
        loc: Loc,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
        loc: Loc,
    },
    Pass {
        loc: Loc,
    },
    Break {
        loc: Loc,
    },
    Continue {
        loc: Loc,
    },
}

impl Stmt {
    pub fn loc(&self) -> Loc {
        match self {
            Stmt::FunctionDef { loc, .. }
            | Stmt::ClassDef { loc, .. }
            | Stmt::Return { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::While { loc, .. }
            | Stmt::For { loc, .. }
            | Stmt::With { loc, .. }
            | Stmt::Try { loc, .. }
            | Stmt::Assign { loc, .. }
            | Stmt::AnnAssign { loc, .. }
            | Stmt::AugAssign { loc, .. }
            | Stmt::ExprStmt { loc, .. }
            | Stmt::Import { loc, .. }
            | Stmt::FromImport { loc, .. }
            | Stmt::Raise { loc, .. }
            | Stmt::Assert { loc, .. }
            | Stmt::Pass { loc }
            | Stmt::Break { loc }
            | Stmt::Continue { loc } => *loc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Chained comparison: `left ops[0] comparators[0] ops[1] comparators[1] ...`
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOpKind>,
        comparators: Vec<Expr>,
        loc: Loc,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOpKind,
        right: Box<Expr>,
        loc: Loc,
    },
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<Expr>,
        loc: Loc,
    },
    /// `and`/`or` with two or more operands, as Python flattens them.
    BoolOp {
        op: BoolOpKind,
        values: Vec<Expr>,
        loc: Loc,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
        loc: Loc,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        /// `(Some(name), value)` for `name=value`, `(None, value)` for `**value`.
        kwargs: Vec<(Option<String>, Expr)>,
        loc: Loc,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
        loc: Loc,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
        loc: Loc,
    },
    /// Only valid inside a subscript: `lower:upper:step` with optional parts.
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
        loc: Loc,
    },
    /// `*expr` in a call argument list.
    Starred {
        value: Box<Expr>,
        loc: Loc,
    },
    Name {
        id: String,
        loc: Loc,
    },
    Int {
        value: i64,
        loc: Loc,
    },
    /// Floats keep their source lexeme so printing never reformats them.
    Float {
        repr: String,
        loc: Loc,
    },
    Str {
        value: String,
        loc: Loc,
    },
    Bool {
        value: bool,
        loc: Loc,
    },
    NoneLit {
        loc: Loc,
    },
    Tuple {
        elts: Vec<Expr>,
        loc: Loc,
    },
    List {
        elts: Vec<Expr>,
        loc: Loc,
    },
    Dict {
        items: Vec<(Expr, Expr)>,
        loc: Loc,
    },
}

impl Expr {
    pub fn loc(&self) -> Loc {
        match self {
            Expr::Compare { loc, .. }
            | Expr::BinOp { loc, .. }
            | Expr::UnaryOp { loc, .. }
            | Expr::BoolOp { loc, .. }
            | Expr::IfExp { loc, .. }
            | Expr::Call { loc, .. }
            | Expr::Attribute { loc, .. }
            | Expr::Subscript { loc, .. }
            | Expr::Slice { loc, .. }
            | Expr::Starred { loc, .. }
            | Expr::Name { loc, .. }
            | Expr::Int { loc, .. }
            | Expr::Float { loc, .. }
            | Expr::Str { loc, .. }
            | Expr::Bool { loc, .. }
            | Expr::NoneLit { loc }
            | Expr::Tuple { loc, .. }
            | Expr::List { loc, .. }
            | Expr::Dict { loc, .. } => *loc,
        }
    }

    /// True for the `None` literal.
    pub fn is_none_literal(&self) -> bool {
        matches!(self, Expr::NoneLit { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOpKind {
    Lt,
    LtE,
    Gt,
    GtE,
    Eq,
    NotEq,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOpKind::Lt => "<",
            CmpOpKind::LtE => "<=",
            CmpOpKind::Gt => ">",
            CmpOpKind::GtE => ">=",
            CmpOpKind::Eq => "==",
            CmpOpKind::NotEq => "!=",
            CmpOpKind::Is => "is",
            CmpOpKind::IsNot => "is not",
            CmpOpKind::In => "in",
            CmpOpKind::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitOr,
    BitXor,
    BitAnd,
    LShift,
    RShift,
}

impl BinOpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mul => "*",
            BinOpKind::Div => "/",
            BinOpKind::FloorDiv => "//",
            BinOpKind::Mod => "%",
            BinOpKind::Pow => "**",
            BinOpKind::BitOr => "|",
            BinOpKind::BitXor => "^",
            BinOpKind::BitAnd => "&",
            BinOpKind::LShift => "<<",
            BinOpKind::RShift => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOpKind {
    Not,
    Neg,
    Pos,
    Invert,
}

impl UnaryOpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOpKind::Not => "not ",
            UnaryOpKind::Neg => "-",
            UnaryOpKind::Pos => "+",
            UnaryOpKind::Invert => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOpKind {
    And,
    Or,
}

impl BoolOpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            BoolOpKind::And => "and",
            BoolOpKind::Or => "or",
        }
    }
}
