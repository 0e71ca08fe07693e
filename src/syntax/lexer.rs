use crate::syntax::SyntaxError;

/// One lexical token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Float(String),
    Str(String),
    Keyword(Keyword),
    Op(Op),
    Newline,
    Indent,
    Dedent,
    EndOfFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Def,
    Class,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Not,
    And,
    Or,
    Is,
    True,
    False,
    None,
    Pass,
    Break,
    Continue,
    Import,
    From,
    As,
    Raise,
    Assert,
    With,
    Try,
    Except,
    Finally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Lt,
    LtE,
    Gt,
    GtE,
    EqEq,
    NotEq,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    DoubleSlashAssign,
    PercentAssign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Arrow,
    Pipe,
    Caret,
    Amp,
    LShift,
    RShift,
    Tilde,
    At,
}

fn keyword_for(name: &str) -> Option<Keyword> {
    Some(match name {
        "def" => Keyword::Def,
        "class" => Keyword::Class,
        "return" => Keyword::Return,
        "if" => Keyword::If,
        "elif" => Keyword::Elif,
        "else" => Keyword::Else,
        "while" => Keyword::While,
        "for" => Keyword::For,
        "in" => Keyword::In,
        "not" => Keyword::Not,
        "and" => Keyword::And,
        "or" => Keyword::Or,
        "is" => Keyword::Is,
        "True" => Keyword::True,
        "False" => Keyword::False,
        "None" => Keyword::None,
        "pass" => Keyword::Pass,
        "break" => Keyword::Break,
        "continue" => Keyword::Continue,
        "import" => Keyword::Import,
        "from" => Keyword::From,
        "as" => Keyword::As,
        "raise" => Keyword::Raise,
        "assert" => Keyword::Assert,
        "with" => Keyword::With,
        "try" => Keyword::Try,
        "except" => Keyword::Except,
        "finally" => Keyword::Finally,
        _ => return None,
    })
}

/// Tokenize Python source into a stream ending in `EndOfFile`.
///
/// Indentation is tracked with a stack and surfaces as `Indent`/`Dedent`
/// tokens; newlines inside brackets are implicit joins and emit nothing.
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    paren_depth: usize,
    indents: Vec<u32>,
    tokens: Vec<Token>,
    at_line_start: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            paren_depth: 0,
            indents: vec![0],
            tokens: Vec::new(),
            at_line_start: true,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: u32, col: u32) {
        self.tokens.push(Token { kind, line, col });
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.line, self.col)
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.paren_depth == 0 {
                self.handle_indentation()?;
                if self.pos >= self.chars.len() {
                    break;
                }
            }

            let c = match self.peek() {
                Some(c) => c,
                None => break,
            };

            match c {
                ' ' | '\t' => {
                    self.bump();
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '\n' => {
                    self.bump();
                    if self.paren_depth == 0 {
                        self.emit_newline();
                        self.at_line_start = true;
                    }
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    // Explicit line continuation.
                    self.bump();
                    self.bump();
                }
                '\r' => {
                    self.bump();
                }
                '\'' | '"' => self.lex_string(None)?,
                c if c.is_ascii_digit() => self.lex_number()?,
                c if c == '_' || c.is_alphabetic() => self.lex_name()?,
                _ => self.lex_operator()?,
            }
        }

        // Close the final logical line and any open blocks.
        self.emit_newline();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, self.line, 1);
        }
        self.push(TokenKind::EndOfFile, self.line, self.col);
        Ok(self.tokens)
    }

    /// Emit a `Newline` unless the logical line was empty.
    fn emit_newline(&mut self) {
        match self.tokens.last().map(|t| &t.kind) {
            Some(TokenKind::Newline) | Some(TokenKind::Indent) | Some(TokenKind::Dedent) | None => {
            }
            _ => self.push(TokenKind::Newline, self.line, self.col),
        }
    }

    fn handle_indentation(&mut self) -> Result<(), SyntaxError> {
        loop {
            let mut width: u32 = 0;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => {
                        width += 1;
                        self.bump();
                    }
                    '\t' => {
                        width += 8 - (width % 8);
                        self.bump();
                    }
                    _ => break,
                }
            }

            // Blank and comment-only lines do not affect indentation.
            match self.peek() {
                Some('\n') => {
                    self.bump();
                    continue;
                }
                Some('\r') => {
                    self.bump();
                    continue;
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    continue;
                }
                None => {
                    self.at_line_start = false;
                    return Ok(());
                }
                _ => {}
            }

            let current = *self.indents.last().unwrap_or(&0);
            if width > current {
                self.indents.push(width);
                self.push(TokenKind::Indent, self.line, 1);
            } else if width < current {
                while *self.indents.last().unwrap_or(&0) > width {
                    self.indents.pop();
                    self.push(TokenKind::Dedent, self.line, 1);
                }
                if *self.indents.last().unwrap_or(&0) != width {
                    return Err(self.error("unindent does not match any outer indentation level"));
                }
            }
            self.at_line_start = false;
            return Ok(());
        }
    }

    fn lex_name(&mut self) -> Result<(), SyntaxError> {
        let (line, col) = (self.line, self.col);
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }

        // String prefixes: only plain and raw strings are in the subset.
        if (name == "r" || name == "R") && matches!(self.peek(), Some('\'') | Some('"')) {
            return self.lex_string(Some('r'));
        }
        if matches!(self.peek(), Some('\'') | Some('"')) && name.len() <= 2 {
            return Err(SyntaxError::new(
                format!("unsupported string prefix {name:?}"),
                line,
                col,
            ));
        }

        let kind = match keyword_for(&name) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Name(name),
        };
        self.push(kind, line, col);
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), SyntaxError> {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        let mut is_float = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                text.push(c);
                self.bump();
            } else if c == '.' && !is_float && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) {
                is_float = true;
                text.push(c);
                self.bump();
            } else if (c == 'e' || c == 'E')
                && self
                    .peek_at(1)
                    .is_some_and(|n| n.is_ascii_digit() || n == '+' || n == '-')
            {
                is_float = true;
                text.push(c);
                self.bump();
                if let Some(sign) = self.peek() {
                    if sign == '+' || sign == '-' {
                        text.push(sign);
                        self.bump();
                    }
                }
            } else {
                break;
            }
        }

        if is_float {
            self.push(TokenKind::Float(text), line, col);
        } else {
            let digits: String = text.chars().filter(|c| *c != '_').collect();
            let value: i64 = digits
                .parse()
                .map_err(|_| SyntaxError::new(format!("integer literal {text:?} out of range"), line, col))?;
            self.push(TokenKind::Int(value), line, col);
        }
        Ok(())
    }

    fn lex_string(&mut self, prefix: Option<char>) -> Result<(), SyntaxError> {
        let (line, col) = (self.line, self.col);
        let raw = prefix == Some('r');
        let quote = self.bump().expect("caller checked for a quote");

        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(SyntaxError::new("unterminated string literal", line, col));
            };

            if triple {
                if c == quote && self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    break;
                }
            } else if c == quote {
                break;
            } else if c == '\n' {
                return Err(SyntaxError::new("unterminated string literal", line, col));
            }

            if c == '\\' && !raw {
                let Some(escaped) = self.bump() else {
                    return Err(SyntaxError::new("unterminated string literal", line, col));
                };
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    '0' => value.push('\0'),
                    '\n' => {}
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            } else {
                value.push(c);
            }
        }

        self.push(TokenKind::Str(value), line, col);
        Ok(())
    }

    fn lex_operator(&mut self) -> Result<(), SyntaxError> {
        let (line, col) = (self.line, self.col);
        let c = self.bump().expect("caller checked for a char");
        let next = self.peek();

        let op = match (c, next) {
            ('*', Some('*')) => {
                self.bump();
                Op::DoubleStar
            }
            ('*', Some('=')) => {
                self.bump();
                Op::StarAssign
            }
            ('*', _) => Op::Star,
            ('/', Some('/')) => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Op::DoubleSlashAssign
                } else {
                    Op::DoubleSlash
                }
            }
            ('/', Some('=')) => {
                self.bump();
                Op::SlashAssign
            }
            ('/', _) => Op::Slash,
            ('+', Some('=')) => {
                self.bump();
                Op::PlusAssign
            }
            ('+', _) => Op::Plus,
            ('-', Some('=')) => {
                self.bump();
                Op::MinusAssign
            }
            ('-', Some('>')) => {
                self.bump();
                Op::Arrow
            }
            ('-', _) => Op::Minus,
            ('%', Some('=')) => {
                self.bump();
                Op::PercentAssign
            }
            ('%', _) => Op::Percent,
            ('<', Some('=')) => {
                self.bump();
                Op::LtE
            }
            ('<', Some('<')) => {
                self.bump();
                Op::LShift
            }
            ('<', _) => Op::Lt,
            ('>', Some('=')) => {
                self.bump();
                Op::GtE
            }
            ('>', Some('>')) => {
                self.bump();
                Op::RShift
            }
            ('>', _) => Op::Gt,
            ('=', Some('=')) => {
                self.bump();
                Op::EqEq
            }
            ('=', _) => Op::Assign,
            ('!', Some('=')) => {
                self.bump();
                Op::NotEq
            }
            ('(', _) => {
                self.paren_depth += 1;
                Op::LParen
            }
            (')', _) => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                Op::RParen
            }
            ('[', _) => {
                self.paren_depth += 1;
                Op::LBracket
            }
            (']', _) => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                Op::RBracket
            }
            ('{', _) => {
                self.paren_depth += 1;
                Op::LBrace
            }
            ('}', _) => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                Op::RBrace
            }
            (',', _) => Op::Comma,
            (':', _) => Op::Colon,
            ('.', _) => Op::Dot,
            ('|', _) => Op::Pipe,
            ('^', _) => Op::Caret,
            ('&', _) => Op::Amp,
            ('~', _) => Op::Tilde,
            ('@', _) => Op::At,
            (other, _) => {
                return Err(SyntaxError::new(
                    format!("unexpected character {other:?}"),
                    line,
                    col,
                ))
            }
        };

        self.push(TokenKind::Op(op), line, col);
        Ok(())
    }
}
