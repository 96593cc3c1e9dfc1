use super::ast::*;
use super::error::CompileError;
use super::lexer::{Lexer, Token, TokenKind};
use super::tables::CompilationContext;

/// Recursive-descent parser over an on-demand [`Lexer`].
///
/// The first unexpected token aborts parsing; there is no recovery.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    /// Set while reading publish arguments, where a bare `>` closes the command.
    in_publish: bool,
}

impl<'a> Parser<'a> {
    /// Creates a parser over `source`. Both interning tables in `ctx` are cleared.
    pub fn new(source: &'a [u8], ctx: &'a mut CompilationContext) -> Self {
        ctx.clear();
        Self {
            lexer: Lexer::new(source, ctx),
            in_publish: false,
        }
    }

    pub fn generate_ast(&mut self) -> Result<Program, CompileError> {
        let i18n = if self.eat(TokenKind::Sharp)? {
            Some(self.parse_i18n()?)
        } else {
            None
        };

        let mut dialogues = Vec::new();
        while self.lexer.has_next()? {
            dialogues.push(self.parse_dialogue()?);
        }

        Ok(Program { i18n, dialogues })
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn peek_is(&mut self, kind: TokenKind) -> Result<bool, CompileError> {
        Ok(self.lexer.peek()?.is(kind))
    }

    /// Consume the next token if it is `kind`.
    fn eat(&mut self, kind: TokenKind) -> Result<bool, CompileError> {
        if self.peek_is(kind)? {
            self.lexer.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        let tok = self.lexer.next()?;
        if tok.is(kind) {
            Ok(tok)
        } else {
            Err(unexpected(tok, kind.to_string()))
        }
    }

    // ── Top level ─────────────────────────────────────────────────

    fn parse_i18n(&mut self) -> Result<Vec<Token>, CompileError> {
        self.expect(TokenKind::LeftCurly)?;
        let mut languages = Vec::new();
        loop {
            languages.push(self.expect(TokenKind::String)?);
            let tok = self.lexer.next()?;
            match tok.kind {
                TokenKind::RightCurly => break,
                TokenKind::Comma => {}
                _ => return Err(unexpected(tok, "',' or '}'")),
            }
        }
        Ok(languages)
    }

    fn parse_dialogue(&mut self) -> Result<Dialogue, CompileError> {
        let mode = match self.lexer.peek()?.kind {
            TokenKind::Auto => FiringMode::Auto,
            TokenKind::Trigger => FiringMode::Trigger,
            TokenKind::Interact => FiringMode::Interact,
            _ => FiringMode::None,
        };
        if mode != FiringMode::None {
            self.lexer.next()?;
        }

        self.expect(TokenKind::Dialogue)?;
        let name = self.expect(TokenKind::Variable)?;

        let condition = if self.eat(TokenKind::When)? {
            self.expect(TokenKind::LeftParen)?;
            let condition = self.parse_expr()?;
            self.expect(TokenKind::RightParen)?;
            Some(condition)
        } else {
            None
        };

        let content = self.parse_block()?;

        Ok(Dialogue {
            name,
            condition,
            content,
            mode,
        })
    }

    // ── Commands ──────────────────────────────────────────────────

    /// `{ content }`
    fn parse_block(&mut self) -> Result<Content, CompileError> {
        self.expect(TokenKind::LeftCurly)?;
        let content = self.parse_content()?;
        self.expect(TokenKind::RightCurly)?;
        Ok(content)
    }

    fn parse_content(&mut self) -> Result<Content, CompileError> {
        let mut content = Vec::new();
        while !matches!(
            self.lexer.peek()?.kind,
            TokenKind::RightCurly | TokenKind::Eof
        ) {
            content.push(self.parse_command()?);
        }
        Ok(content)
    }

    fn parse_command(&mut self) -> Result<Command, CompileError> {
        let head = self.lexer.peek()?;
        match head.kind {
            TokenKind::Animate => {
                self.lexer.next()?;
                self.expect(TokenKind::At)?;
                let name = self.expect(TokenKind::Variable)?;
                let animation = self.parse_expr()?;
                Ok(Command::Animate { name, animation })
            }
            TokenKind::Sound => {
                self.lexer.next()?;
                Ok(Command::Sound {
                    effect: self.parse_expr()?,
                })
            }
            TokenKind::Delay => {
                self.lexer.next()?;
                Ok(Command::Delay {
                    time: self.parse_expr()?,
                })
            }
            TokenKind::Move => self.parse_move(),
            TokenKind::If => Ok(Command::If(self.parse_if()?)),
            TokenKind::Select => self.parse_select(),
            TokenKind::Goto => {
                self.lexer.next()?;
                Ok(Command::Goto {
                    name: self.expect(TokenKind::Variable)?,
                })
            }
            TokenKind::Use => {
                self.lexer.next()?;
                Ok(Command::Use {
                    name: self.expect(TokenKind::Variable)?,
                })
            }
            TokenKind::String => Ok(Command::Message(self.parse_message()?)),
            TokenKind::LeftSquare => Ok(Command::Speak(self.parse_speak()?)),
            TokenKind::Dollar => {
                self.lexer.next()?;
                let target = self.expect(TokenKind::Variable)?;
                self.expect(TokenKind::Equal)?;
                let expression = self.parse_expr()?;
                Ok(Command::Assign { target, expression })
            }
            TokenKind::Less => self.parse_publish(),
            _ => Err(unexpected(head, "command")),
        }
    }

    fn parse_move(&mut self) -> Result<Command, CompileError> {
        self.expect(TokenKind::Move)?;
        self.expect(TokenKind::At)?;
        let name = self.expect(TokenKind::Variable)?;
        self.expect(TokenKind::LeftParen)?;
        let x = self.parse_expr()?;
        self.expect(TokenKind::Comma)?;
        let y = self.parse_expr()?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::In)?;
        let time = self.parse_expr()?;
        Ok(Command::Move { name, x, y, time })
    }

    fn parse_if(&mut self) -> Result<If, CompileError> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LeftParen)?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RightParen)?;
        let true_block = self.parse_block()?;

        let otherwise = if self.eat(TokenKind::Else)? {
            let tok = self.lexer.peek()?;
            match tok.kind {
                TokenKind::If => Some(Else::If(Box::new(self.parse_if()?))),
                TokenKind::LeftCurly => Some(Else::Block(self.parse_block()?)),
                _ => return Err(unexpected(tok, "'if' or '{'")),
            }
        } else {
            None
        };

        Ok(If {
            condition,
            true_block,
            otherwise,
        })
    }

    /// `select ( option ... )`, with `{ ... }` accepted as well.
    fn parse_select(&mut self) -> Result<Command, CompileError> {
        self.expect(TokenKind::Select)?;
        let open = self.lexer.next()?;
        let close = match open.kind {
            TokenKind::LeftParen => TokenKind::RightParen,
            TokenKind::LeftCurly => TokenKind::RightCurly,
            _ => return Err(unexpected(open, "'(' or '{'")),
        };
        let mut options = Vec::new();
        loop {
            options.push(self.parse_option()?);
            self.eat(TokenKind::Comma)?;
            if self.peek_is(close)? {
                break;
            }
        }
        self.expect(close)?;
        Ok(Command::Select { options })
    }

    fn parse_option(&mut self) -> Result<SelectOption, CompileError> {
        let hint = self.expect(TokenKind::String)?;
        self.expect(TokenKind::Colon)?;
        let body = if self.peek_is(TokenKind::LeftCurly)? {
            OptionBody::Block(self.parse_block()?)
        } else {
            OptionBody::Command(Box::new(self.parse_command()?))
        };
        Ok(SelectOption { hint, body })
    }

    fn parse_message(&mut self) -> Result<Message, CompileError> {
        let text = self.expect(TokenKind::String)?;
        let time = if self.eat(TokenKind::In)? {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Message { text, time })
    }

    fn parse_speak(&mut self) -> Result<Speak, CompileError> {
        self.expect(TokenKind::LeftSquare)?;
        let speaker = self.expect(TokenKind::Variable)?;
        let state = if self.eat(TokenKind::LeftParen)? {
            let state = self.expect(TokenKind::Variable)?;
            self.expect(TokenKind::RightParen)?;
            Some(state)
        } else {
            None
        };
        self.expect(TokenKind::RightSquare)?;
        self.expect(TokenKind::Colon)?;

        let body = if self.peek_is(TokenKind::LeftCurly)? {
            SpeakBody::Block(self.parse_block()?)
        } else {
            SpeakBody::Message(self.parse_message()?)
        };

        Ok(Speak {
            speaker,
            state,
            body,
        })
    }

    /// `<event[, arg][, arg]>`. Arguments are full expressions, except that an
    /// unparenthesized `>` closes the command instead of comparing.
    fn parse_publish(&mut self) -> Result<Command, CompileError> {
        self.expect(TokenKind::Less)?;
        let name = self.expect(TokenKind::Variable)?;
        let mut params = Vec::new();
        while params.len() < 2 && self.eat(TokenKind::Comma)? {
            let outer = std::mem::replace(&mut self.in_publish, true);
            let param = self.parse_expr();
            self.in_publish = outer;
            params.push(param?);
        }
        self.expect(TokenKind::Greater)?;
        Ok(Command::Publish { name, params })
    }

    // ── Expression parsing (precedence climbing) ──────────────────

    pub(crate) fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        while self.eat(TokenKind::Or)? {
            let right = self.parse_and()?;
            left = Expr::binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_equality()?;
        while self.eat(TokenKind::And)? {
            let right = self.parse_equality()?;
            left = Expr::binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    /// `==` arrives as two `=` tokens.
    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_comparison()?;
        while self.eat(TokenKind::Equal)? {
            let tok = self.lexer.next()?;
            if !tok.is(TokenKind::Equal) {
                return Err(unexpected(tok, "'=' (for '==')"));
            }
            let right = self.parse_comparison()?;
            left = Expr::binary(BinOp::Equal, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            let less = match self.lexer.peek()?.kind {
                TokenKind::Less => true,
                TokenKind::Greater => false,
                _ => break,
            };
            // `< name` opens a publish command: bare identifiers are not operands.
            if less && self.lexer.peek_second()?.is(TokenKind::Variable) {
                break;
            }
            if !less && self.in_publish {
                break;
            }
            self.lexer.next()?;
            let or_equal = self.eat(TokenKind::Equal)?;
            let op = match (less, or_equal) {
                (true, false) => BinOp::Less,
                (true, true) => BinOp::LessEqual,
                (false, false) => BinOp::Greater,
                (false, true) => BinOp::GreaterEqual,
            };
            let right = self.parse_additive()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.lexer.peek()?.kind {
                TokenKind::Add => BinOp::Add,
                TokenKind::Sub => BinOp::Sub,
                _ => break,
            };
            self.lexer.next()?;
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_not()?;
        loop {
            let op = match self.lexer.peek()?.kind {
                TokenKind::Mul => BinOp::Mul,
                TokenKind::Div => BinOp::Div,
                TokenKind::Mod => BinOp::Mod,
                _ => break,
            };
            self.lexer.next()?;
            let right = self.parse_not()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, CompileError> {
        let tok = self.lexer.peek()?;
        if tok.is(TokenKind::Not) {
            self.lexer.next()?;
            let operand = self.parse_neg()?;
            return Ok(Expr::unary(UnaryOp::Not, operand, tok.line));
        }
        self.parse_neg()
    }

    fn parse_neg(&mut self) -> Result<Expr, CompileError> {
        let tok = self.lexer.peek()?;
        if tok.is(TokenKind::Sub) {
            self.lexer.next()?;
            let operand = self.parse_primary()?;
            return Ok(Expr::unary(UnaryOp::Neg, operand, tok.line));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let tok = self.lexer.next()?;
        match tok.kind {
            TokenKind::Int | TokenKind::Float | TokenKind::String | TokenKind::Bool => {
                Ok(Expr::leaf(tok))
            }
            TokenKind::Dollar => Ok(Expr::leaf(self.expect(TokenKind::Variable)?)),
            TokenKind::LeftParen => {
                let outer = std::mem::replace(&mut self.in_publish, false);
                let inner = self.parse_expr();
                self.in_publish = outer;
                let inner = inner?;
                self.expect(TokenKind::RightParen)?;
                Ok(inner)
            }
            _ => Err(unexpected(tok, "expression")),
        }
    }
}

fn unexpected(found: Token, expected: impl Into<String>) -> CompileError {
    CompileError::parser(found.line, expected, found.kind.to_string())
}
