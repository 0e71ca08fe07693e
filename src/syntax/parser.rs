use crate::syntax::ast::{
    BinOpKind, BoolOpKind, CmpOpKind, ExceptHandler, Expr, ImportName, Loc, Module, Param,
    ParamKind, Stmt, UnaryOpKind, WithItem,
};
use crate::syntax::lexer::{tokenize, Keyword, Op, Token, TokenKind};
use crate::syntax::SyntaxError;

/// Parse a complete module from source text.
pub fn parse_module(source: &str) -> Result<Module, SyntaxError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_ahead(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn loc(&self) -> Loc {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        Loc::new(t.line, t.col)
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos.min(self.tokens.len() - 1)].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let loc = self.loc();
        SyntaxError::new(message, loc.line, loc.col)
    }

    fn eat_op(&mut self, op: Op) -> bool {
        if *self.peek() == TokenKind::Op(op) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: Op, what: &str) -> Result<(), SyntaxError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if *self.peek() == TokenKind::Keyword(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_newline(&mut self) -> Result<(), SyntaxError> {
        match self.peek() {
            TokenKind::Newline => {
                self.bump();
                Ok(())
            }
            TokenKind::EndOfFile => Ok(()),
            other => Err(self.error(format!("expected end of line, found {other:?}"))),
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek().clone() {
            TokenKind::Name(name) => {
                self.bump();
                Ok(name)
            }
            other => Err(self.error(format!("expected {what}, found {other:?}"))),
        }
    }

    fn module(mut self) -> Result<Module, SyntaxError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::EndOfFile => break,
                TokenKind::Newline => {
                    self.bump();
                }
                _ => body.push(self.statement()?),
            }
        }
        Ok(Module { body })
    }

    /// A suite after `:` is either an indented block or a simple statement on
    /// the same line (`def f(x): return x`).
    fn block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if *self.peek() != TokenKind::Newline {
            return Ok(vec![self.simple_statement()?]);
        }
        self.bump();
        if *self.peek() != TokenKind::Indent {
            return Err(self.error("expected an indented block"));
        }
        self.bump();

        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Dedent => {
                    self.bump();
                    break;
                }
                TokenKind::EndOfFile => break,
                TokenKind::Newline => {
                    self.bump();
                }
                _ => body.push(self.statement()?),
            }
        }
        Ok(body)
    }

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        match self.peek() {
            TokenKind::Op(Op::At) => self.decorated(),
            TokenKind::Keyword(Keyword::Def) => self.function_def(Vec::new()),
            TokenKind::Keyword(Keyword::Class) => self.class_def(Vec::new()),
            TokenKind::Keyword(Keyword::If) => self.if_statement(),
            TokenKind::Keyword(Keyword::While) => self.while_statement(),
            TokenKind::Keyword(Keyword::For) => self.for_statement(),
            TokenKind::Keyword(Keyword::With) => self.with_statement(),
            TokenKind::Keyword(Keyword::Try) => self.try_statement(),
            _ => self.simple_statement(),
        }
    }

    fn decorated(&mut self) -> Result<Stmt, SyntaxError> {
        let mut decorators = Vec::new();
        while self.eat_op(Op::At) {
            decorators.push(self.expression()?);
            self.expect_newline()?;
            while *self.peek() == TokenKind::Newline {
                self.bump();
            }
        }
        match self.peek() {
            TokenKind::Keyword(Keyword::Def) => self.function_def(decorators),
            TokenKind::Keyword(Keyword::Class) => self.class_def(decorators),
            other => Err(self.error(format!(
                "expected 'def' or 'class' after decorator, found {other:?}"
            ))),
        }
    }

    fn function_def(&mut self, decorators: Vec<Expr>) -> Result<Stmt, SyntaxError> {
        let loc = self.loc();
        self.bump(); // def
        let name = self.expect_name("function name")?;
        self.expect_op(Op::LParen, "'('")?;

        let mut params = Vec::new();
        while *self.peek() != TokenKind::Op(Op::RParen) {
            let kind = if self.eat_op(Op::DoubleStar) {
                ParamKind::DoubleStar
            } else if self.eat_op(Op::Star) {
                ParamKind::Star
            } else {
                ParamKind::Plain
            };
            let pname = self.expect_name("parameter name")?;
            let annotation = if self.eat_op(Op::Colon) {
                Some(self.expression()?)
            } else {
                None
            };
            let default = if self.eat_op(Op::Assign) {
                Some(self.expression()?)
            } else {
                None
            };
            params.push(Param {
                kind,
                name: pname,
                annotation,
                default,
            });
            if !self.eat_op(Op::Comma) {
                break;
            }
        }
        self.expect_op(Op::RParen, "')'")?;

        let returns = if self.eat_op(Op::Arrow) {
            Some(self.expression()?)
        } else {
            None
        };

        self.expect_op(Op::Colon, "':'")?;
        let body = self.block()?;
        Ok(Stmt::FunctionDef {
            name,
            params,
            returns,
            decorators,
            body,
            loc,
        })
    }

    fn class_def(&mut self, decorators: Vec<Expr>) -> Result<Stmt, SyntaxError> {
        let loc = self.loc();
        self.bump(); // class
        let name = self.expect_name("class name")?;

        let mut bases = Vec::new();
        if self.eat_op(Op::LParen) {
            while *self.peek() != TokenKind::Op(Op::RParen) {
                bases.push(self.expression()?);
                if !self.eat_op(Op::Comma) {
                    break;
                }
            }
            self.expect_op(Op::RParen, "')'")?;
        }

        self.expect_op(Op::Colon, "':'")?;
        let body = self.block()?;
        Ok(Stmt::ClassDef {
            name,
            bases,
            decorators,
            body,
            loc,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.loc();
        self.bump(); // if / elif
        let test = self.expression()?;
        self.expect_op(Op::Colon, "':'")?;
        let body = self.block()?;

        let orelse = if *self.peek() == TokenKind::Keyword(Keyword::Elif) {
            vec![self.if_statement()?]
        } else if self.eat_keyword(Keyword::Else) {
            self.expect_op(Op::Colon, "':'")?;
            self.block()?
        } else {
            Vec::new()
        };

        Ok(Stmt::If {
            test,
            body,
            orelse,
            loc,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.loc();
        self.bump();
        let test = self.expression()?;
        self.expect_op(Op::Colon, "':'")?;
        let body = self.block()?;
        Ok(Stmt::While { test, body, loc })
    }

    fn for_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.loc();
        self.bump();
        let target = self.target_list()?;
        if !self.eat_keyword(Keyword::In) {
            return Err(self.error("expected 'in' in for statement"));
        }
        let iter = self.expression_list()?;
        self.expect_op(Op::Colon, "':'")?;
        let body = self.block()?;
        Ok(Stmt::For {
            target,
            iter,
            body,
            loc,
        })
    }

    fn with_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.loc();
        self.bump();
        let mut items = Vec::new();
        loop {
            let context = self.expression()?;
            let alias = if self.eat_keyword(Keyword::As) {
                Some(self.postfix()?)
            } else {
                None
            };
            items.push(WithItem { context, alias });
            if !self.eat_op(Op::Comma) {
                break;
            }
        }
        self.expect_op(Op::Colon, "':'")?;
        let body = self.block()?;
        Ok(Stmt::With { items, body, loc })
    }

    fn try_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.loc();
        self.bump();
        self.expect_op(Op::Colon, "':'")?;
        let body = self.block()?;

        let mut handlers = Vec::new();
        while *self.peek() == TokenKind::Keyword(Keyword::Except) {
            let hloc = self.loc();
            self.bump();
            let typ = if *self.peek() != TokenKind::Op(Op::Colon) {
                Some(self.expression()?)
            } else {
                None
            };
            let name = if self.eat_keyword(Keyword::As) {
                Some(self.expect_name("exception alias")?)
            } else {
                None
            };
            self.expect_op(Op::Colon, "':'")?;
            let hbody = self.block()?;
            handlers.push(ExceptHandler {
                typ,
                name,
                body: hbody,
                loc: hloc,
            });
        }

        let orelse = if self.eat_keyword(Keyword::Else) {
            self.expect_op(Op::Colon, "':'")?;
            self.block()?
        } else {
            Vec::new()
        };

        let finalbody = if self.eat_keyword(Keyword::Finally) {
            self.expect_op(Op::Colon, "':'")?;
            self.block()?
        } else {
            Vec::new()
        };

        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.error("try statement needs an except or finally clause"));
        }

        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            loc,
        })
    }

    fn simple_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.loc();
        let stmt = match self.peek().clone() {
            TokenKind::Keyword(Keyword::Return) => {
                self.bump();
                let value = if matches!(self.peek(), TokenKind::Newline | TokenKind::EndOfFile) {
                    None
                } else {
                    Some(self.expression_list()?)
                };
                Stmt::Return { value, loc }
            }
            TokenKind::Keyword(Keyword::Pass) => {
                self.bump();
                Stmt::Pass { loc }
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.bump();
                Stmt::Break { loc }
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.bump();
                Stmt::Continue { loc }
            }
            TokenKind::Keyword(Keyword::Raise) => {
                self.bump();
                let value = if matches!(self.peek(), TokenKind::Newline | TokenKind::EndOfFile) {
                    None
                } else {
                    Some(self.expression()?)
                };
                Stmt::Raise { value, loc }
            }
            TokenKind::Keyword(Keyword::Assert) => {
                self.bump();
                let test = self.expression()?;
                let msg = if self.eat_op(Op::Comma) {
                    Some(self.expression()?)
                } else {
                    None
                };
                Stmt::Assert { test, msg, loc }
            }
            TokenKind::Keyword(Keyword::Import) => {
                self.bump();
                let names = self.import_names()?;
                Stmt::Import { names, loc }
            }
            TokenKind::Keyword(Keyword::From) => {
                self.bump();
                let module = self.dotted_name()?;
                if !self.eat_keyword(Keyword::Import) {
                    return Err(self.error("expected 'import' in from-import"));
                }
                let names = self.import_names()?;
                Stmt::FromImport { module, names, loc }
            }
            _ => {
                let target = self.expression_list()?;
                match self.peek().clone() {
                    TokenKind::Op(Op::Assign) => {
                        self.bump();
                        let value = self.expression_list()?;
                        Stmt::Assign { target, value, loc }
                    }
                    TokenKind::Op(Op::Colon) => {
                        self.bump();
                        let annotation = self.expression()?;
                        let value = if self.eat_op(Op::Assign) {
                            Some(self.expression_list()?)
                        } else {
                            None
                        };
                        Stmt::AnnAssign {
                            target,
                            annotation,
                            value,
                            loc,
                        }
                    }
                    TokenKind::Op(aug)
                        if matches!(
                            aug,
                            Op::PlusAssign
                                | Op::MinusAssign
                                | Op::StarAssign
                                | Op::SlashAssign
                                | Op::DoubleSlashAssign
                                | Op::PercentAssign
                        ) =>
                    {
                        self.bump();
                        let op = match aug {
                            Op::PlusAssign => BinOpKind::Add,
                            Op::MinusAssign => BinOpKind::Sub,
                            Op::StarAssign => BinOpKind::Mul,
                            Op::SlashAssign => BinOpKind::Div,
                            Op::DoubleSlashAssign => BinOpKind::FloorDiv,
                            _ => BinOpKind::Mod,
                        };
                        let value = self.expression_list()?;
                        Stmt::AugAssign {
                            target,
                            op,
                            value,
                            loc,
                        }
                    }
                    _ => Stmt::ExprStmt { value: target, loc },
                }
            }
        };
        self.expect_newline()?;
        Ok(stmt)
    }

    fn import_names(&mut self) -> Result<Vec<ImportName>, SyntaxError> {
        let mut names = Vec::new();
        loop {
            let name = self.dotted_name()?;
            let alias = if self.eat_keyword(Keyword::As) {
                Some(self.expect_name("import alias")?)
            } else {
                None
            };
            names.push(ImportName { name, alias });
            if !self.eat_op(Op::Comma) {
                break;
            }
        }
        Ok(names)
    }

    fn dotted_name(&mut self) -> Result<String, SyntaxError> {
        let mut name = match self.peek().clone() {
            TokenKind::Name(n) => {
                self.bump();
                n
            }
            other => return Err(self.error(format!("expected module name, found {other:?}"))),
        };
        while self.eat_op(Op::Dot) {
            name.push('.');
            name.push_str(&self.expect_name("name after '.'")?);
        }
        Ok(name)
    }

    /// `for` targets: one or more names/attributes joined by commas.
    fn target_list(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let first = self.postfix()?;
        if *self.peek() != TokenKind::Op(Op::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(Op::Comma) {
            if matches!(self.peek(), TokenKind::Keyword(Keyword::In)) {
                break;
            }
            elts.push(self.postfix()?);
        }
        Ok(Expr::Tuple { elts, loc })
    }

    /// Comma-separated expressions become a tuple (`return a, b`).
    fn expression_list(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let first = self.expression()?;
        if *self.peek() != TokenKind::Op(Op::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(Op::Comma) {
            if matches!(
                self.peek(),
                TokenKind::Newline
                    | TokenKind::EndOfFile
                    | TokenKind::Op(Op::Assign)
                    | TokenKind::Op(Op::RParen)
                    | TokenKind::Op(Op::RBracket)
                    | TokenKind::Op(Op::Colon)
            ) {
                break;
            }
            elts.push(self.expression()?);
        }
        Ok(Expr::Tuple { elts, loc })
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let body = self.or_expr()?;
        if !self.eat_keyword(Keyword::If) {
            return Ok(body);
        }
        let test = self.or_expr()?;
        if !self.eat_keyword(Keyword::Else) {
            return Err(self.error("expected 'else' in conditional expression"));
        }
        let orelse = self.expression()?;
        Ok(Expr::IfExp {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
            loc,
        })
    }

    fn or_expr(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let first = self.and_expr()?;
        if *self.peek() != TokenKind::Keyword(Keyword::Or) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword(Keyword::Or) {
            values.push(self.and_expr()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOpKind::Or,
            values,
            loc,
        })
    }

    fn and_expr(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let first = self.not_expr()?;
        if *self.peek() != TokenKind::Keyword(Keyword::And) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword(Keyword::And) {
            values.push(self.not_expr()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOpKind::And,
            values,
            loc,
        })
    }

    fn not_expr(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        if self.eat_keyword(Keyword::Not) {
            let operand = self.not_expr()?;
            return Ok(Expr::UnaryOp {
                op: UnaryOpKind::Not,
                operand: Box::new(operand),
                loc,
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let left = self.bit_or()?;

        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = match self.peek() {
                TokenKind::Op(Op::Lt) => CmpOpKind::Lt,
                TokenKind::Op(Op::LtE) => CmpOpKind::LtE,
                TokenKind::Op(Op::Gt) => CmpOpKind::Gt,
                TokenKind::Op(Op::GtE) => CmpOpKind::GtE,
                TokenKind::Op(Op::EqEq) => CmpOpKind::Eq,
                TokenKind::Op(Op::NotEq) => CmpOpKind::NotEq,
                TokenKind::Keyword(Keyword::In) => CmpOpKind::In,
                TokenKind::Keyword(Keyword::Is) => {
                    self.bump();
                    let op = if self.eat_keyword(Keyword::Not) {
                        CmpOpKind::IsNot
                    } else {
                        CmpOpKind::Is
                    };
                    ops.push(op);
                    comparators.push(self.bit_or()?);
                    continue;
                }
                TokenKind::Keyword(Keyword::Not) => {
                    // `not in`
                    self.bump();
                    if !self.eat_keyword(Keyword::In) {
                        return Err(self.error("expected 'in' after 'not' in comparison"));
                    }
                    ops.push(CmpOpKind::NotIn);
                    comparators.push(self.bit_or()?);
                    continue;
                }
                _ => break,
            };
            self.bump();
            ops.push(op);
            comparators.push(self.bit_or()?);
        }

        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
            loc,
        })
    }

    fn bit_or(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let mut left = self.bit_xor()?;
        while self.eat_op(Op::Pipe) {
            let right = self.bit_xor()?;
            left = Expr::BinOp {
                left: Box::new(left),
                op: BinOpKind::BitOr,
                right: Box::new(right),
                loc,
            };
        }
        Ok(left)
    }

    fn bit_xor(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let mut left = self.bit_and()?;
        while self.eat_op(Op::Caret) {
            let right = self.bit_and()?;
            left = Expr::BinOp {
                left: Box::new(left),
                op: BinOpKind::BitXor,
                right: Box::new(right),
                loc,
            };
        }
        Ok(left)
    }

    fn bit_and(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let mut left = self.shift()?;
        while self.eat_op(Op::Amp) {
            let right = self.shift()?;
            left = Expr::BinOp {
                left: Box::new(left),
                op: BinOpKind::BitAnd,
                right: Box::new(right),
                loc,
            };
        }
        Ok(left)
    }

    fn shift(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let mut left = self.arith()?;
        loop {
            let op = match self.peek() {
                TokenKind::Op(Op::LShift) => BinOpKind::LShift,
                TokenKind::Op(Op::RShift) => BinOpKind::RShift,
                _ => break,
            };
            self.bump();
            let right = self.arith()?;
            left = Expr::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
                loc,
            };
        }
        Ok(left)
    }

    fn arith(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Op(Op::Plus) => BinOpKind::Add,
                TokenKind::Op(Op::Minus) => BinOpKind::Sub,
                _ => break,
            };
            self.bump();
            let right = self.term()?;
            left = Expr::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
                loc,
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                TokenKind::Op(Op::Star) => BinOpKind::Mul,
                TokenKind::Op(Op::Slash) => BinOpKind::Div,
                TokenKind::Op(Op::DoubleSlash) => BinOpKind::FloorDiv,
                TokenKind::Op(Op::Percent) => BinOpKind::Mod,
                _ => break,
            };
            self.bump();
            let right = self.factor()?;
            left = Expr::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
                loc,
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let op = match self.peek() {
            TokenKind::Op(Op::Minus) => Some(UnaryOpKind::Neg),
            TokenKind::Op(Op::Plus) => Some(UnaryOpKind::Pos),
            TokenKind::Op(Op::Tilde) => Some(UnaryOpKind::Invert),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.factor()?;
            return Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
                loc,
            });
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let base = self.postfix()?;
        if self.eat_op(Op::DoubleStar) {
            // `**` is right-associative and binds the exponent as a factor,
            // so `2 ** -1` parses.
            let exp = self.factor()?;
            return Ok(Expr::BinOp {
                left: Box::new(base),
                op: BinOpKind::Pow,
                right: Box::new(exp),
                loc,
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.atom()?;
        loop {
            let base_loc = expr.loc();
            if self.eat_op(Op::LParen) {
                let (args, kwargs) = self.call_arguments()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    kwargs,
                    loc: base_loc,
                };
            } else if self.eat_op(Op::Dot) {
                let attr = self.expect_name("attribute name")?;
                expr = Expr::Attribute {
                    value: Box::new(expr),
                    attr,
                    loc: base_loc,
                };
            } else if self.eat_op(Op::LBracket) {
                let index = self.subscript_index()?;
                self.expect_op(Op::RBracket, "']'")?;
                expr = Expr::Subscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                    loc: base_loc,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(Option<String>, Expr)>), SyntaxError> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while *self.peek() != TokenKind::Op(Op::RParen) {
            if self.eat_op(Op::DoubleStar) {
                kwargs.push((None, self.expression()?));
            } else if *self.peek() == TokenKind::Op(Op::Star) {
                let loc = self.loc();
                self.bump();
                let value = self.expression()?;
                args.push(Expr::Starred {
                    value: Box::new(value),
                    loc,
                });
            } else if let TokenKind::Name(name) = self.peek().clone() {
                // `name=expr` is a keyword argument; a bare name is positional.
                if self.peek_ahead(1) == Some(&TokenKind::Op(Op::Assign)) {
                    self.bump();
                    self.bump();
                    kwargs.push((Some(name), self.expression()?));
                } else {
                    args.push(self.expression()?);
                }
            } else {
                args.push(self.expression()?);
            }
            if !self.eat_op(Op::Comma) {
                break;
            }
        }
        self.expect_op(Op::RParen, "')'")?;
        Ok((args, kwargs))
    }

    /// A subscript index: an expression list or a slice with optional parts.
    fn subscript_index(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        let lower = if matches!(self.peek(), TokenKind::Op(Op::Colon)) {
            None
        } else {
            Some(self.expression_list()?)
        };

        if !self.eat_op(Op::Colon) {
            return lower.ok_or_else(|| self.error("expected subscript expression"));
        }

        let upper = if matches!(self.peek(), TokenKind::Op(Op::Colon) | TokenKind::Op(Op::RBracket))
        {
            None
        } else {
            Some(self.expression()?)
        };
        let step = if self.eat_op(Op::Colon) {
            if matches!(self.peek(), TokenKind::Op(Op::RBracket)) {
                None
            } else {
                Some(self.expression()?)
            }
        } else {
            None
        };

        Ok(Expr::Slice {
            lower: lower.map(Box::new),
            upper: upper.map(Box::new),
            step: step.map(Box::new),
            loc,
        })
    }

    fn atom(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.loc();
        match self.peek().clone() {
            TokenKind::Name(id) => {
                self.bump();
                Ok(Expr::Name { id, loc })
            }
            TokenKind::Int(value) => {
                self.bump();
                Ok(Expr::Int { value, loc })
            }
            TokenKind::Float(repr) => {
                self.bump();
                Ok(Expr::Float { repr, loc })
            }
            TokenKind::Str(first) => {
                self.bump();
                // Adjacent string literals concatenate.
                let mut value = first;
                while let TokenKind::Str(next) = self.peek().clone() {
                    self.bump();
                    value.push_str(&next);
                }
                Ok(Expr::Str { value, loc })
            }
            TokenKind::Keyword(Keyword::True) => {
                self.bump();
                Ok(Expr::Bool { value: true, loc })
            }
            TokenKind::Keyword(Keyword::False) => {
                self.bump();
                Ok(Expr::Bool { value: false, loc })
            }
            TokenKind::Keyword(Keyword::None) => {
                self.bump();
                Ok(Expr::NoneLit { loc })
            }
            TokenKind::Op(Op::LParen) => {
                self.bump();
                if self.eat_op(Op::RParen) {
                    return Ok(Expr::Tuple {
                        elts: Vec::new(),
                        loc,
                    });
                }
                let inner = self.expression_list()?;
                self.expect_op(Op::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Op(Op::LBracket) => {
                self.bump();
                let mut elts = Vec::new();
                while *self.peek() != TokenKind::Op(Op::RBracket) {
                    elts.push(self.expression()?);
                    if !self.eat_op(Op::Comma) {
                        break;
                    }
                }
                self.expect_op(Op::RBracket, "']'")?;
                Ok(Expr::List { elts, loc })
            }
            TokenKind::Op(Op::LBrace) => {
                self.bump();
                let mut items = Vec::new();
                while *self.peek() != TokenKind::Op(Op::RBrace) {
                    let key = self.expression()?;
                    self.expect_op(Op::Colon, "':' in dict literal")?;
                    let value = self.expression()?;
                    items.push((key, value));
                    if !self.eat_op(Op::Comma) {
                        break;
                    }
                }
                self.expect_op(Op::RBrace, "'}'")?;
                Ok(Expr::Dict { items, loc })
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }
}
