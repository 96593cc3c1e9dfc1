use std::collections::VecDeque;

use super::error::CompileError;
use super::tables::CompilationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals. `value` is a constant id, the integer itself, the f32 bit
    // pattern, or 0/1 respectively.
    String,
    Int,
    Float,
    Bool,

    /// Identifier; `value` is its symbol id.
    Variable,

    // Keywords
    Dialogue,
    When,
    Select,
    If,
    Else,
    Goto,
    Use,
    In,
    And,
    Or,
    Not,
    Sound,
    Move,
    Animate,
    Delay,
    Interact,
    Trigger,
    Auto,

    // Operators & punctuation
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    Colon,
    Comma,
    LeftSquare,
    RightSquare,
    LeftParen,
    RightParen,
    LeftCurly,
    RightCurly,
    Dollar,
    Sharp,
    At,
    Less,
    Greater,

    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenKind::String => "string",
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::Bool => "boolean",
            TokenKind::Variable => "identifier",
            TokenKind::Dialogue => "'dialogue'",
            TokenKind::When => "'when'",
            TokenKind::Select => "'select'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::Goto => "'goto'",
            TokenKind::Use => "'use'",
            TokenKind::In => "'in'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::Sound => "'sound'",
            TokenKind::Move => "'move'",
            TokenKind::Animate => "'animate'",
            TokenKind::Delay => "'delay'",
            TokenKind::Interact => "'interact'",
            TokenKind::Trigger => "'trigger'",
            TokenKind::Auto => "'auto'",
            TokenKind::Add => "'+'",
            TokenKind::Sub => "'-'",
            TokenKind::Mul => "'*'",
            TokenKind::Div => "'/'",
            TokenKind::Mod => "'%'",
            TokenKind::Equal => "'='",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::LeftSquare => "'['",
            TokenKind::RightSquare => "']'",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftCurly => "'{'",
            TokenKind::RightCurly => "'}'",
            TokenKind::Dollar => "'$'",
            TokenKind::Sharp => "'#'",
            TokenKind::At => "'@'",
            TokenKind::Less => "'<'",
            TokenKind::Greater => "'>'",
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}

/// A scanned token. Copyable; the payload meaning depends on `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: i32,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, value: i32, line: u32) -> Self {
        Self { kind, value, line }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

fn keyword(word: &str) -> Option<(TokenKind, i32)> {
    let kind = match word {
        "dialogue" => TokenKind::Dialogue,
        "when" => TokenKind::When,
        "select" => TokenKind::Select,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "goto" => TokenKind::Goto,
        "use" => TokenKind::Use,
        "in" => TokenKind::In,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "sound" => TokenKind::Sound,
        "move" => TokenKind::Move,
        "animate" => TokenKind::Animate,
        "delay" => TokenKind::Delay,
        "interact" => TokenKind::Interact,
        "trigger" => TokenKind::Trigger,
        "auto" => TokenKind::Auto,
        "true" => return Some((TokenKind::Bool, 1)),
        "false" => return Some((TokenKind::Bool, 0)),
        _ => return None,
    };
    Some((kind, 0))
}

fn operator(ch: u8) -> Option<TokenKind> {
    Some(match ch {
        b'+' => TokenKind::Add,
        b'-' => TokenKind::Sub,
        b'*' => TokenKind::Mul,
        b'/' => TokenKind::Div,
        b'%' => TokenKind::Mod,
        b'=' => TokenKind::Equal,
        b':' => TokenKind::Colon,
        b',' => TokenKind::Comma,
        b'[' => TokenKind::LeftSquare,
        b']' => TokenKind::RightSquare,
        b'(' => TokenKind::LeftParen,
        b')' => TokenKind::RightParen,
        b'{' => TokenKind::LeftCurly,
        b'}' => TokenKind::RightCurly,
        b'$' => TokenKind::Dollar,
        b'#' => TokenKind::Sharp,
        b'@' => TokenKind::At,
        b'<' => TokenKind::Less,
        b'>' => TokenKind::Greater,
        _ => return None,
    })
}

/// The unrecognized character starting `bytes`, or its hex value when the
/// bytes there are not UTF-8.
fn notion_at(bytes: &[u8]) -> String {
    for len in 1..=bytes.len().min(4) {
        let decoded = bytes
            .get(..len)
            .and_then(|b| std::str::from_utf8(b).ok())
            .and_then(|s| s.chars().next());
        if let Some(ch) = decoded {
            return ch.to_string();
        }
    }
    bytes
        .first()
        .map_or_else(String::new, |b| format!("0x{b:02X}"))
}

/// On-demand tokenizer with a small lookahead buffer.
///
/// Identifiers and string literals are interned into the context's tables as
/// they are scanned, so token payloads are table ids.
pub struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    lookahead: VecDeque<Token>,
    ctx: &'a mut CompilationContext,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8], ctx: &'a mut CompilationContext) -> Self {
        Self {
            bytes: source,
            pos: 0,
            line: 1,
            lookahead: VecDeque::with_capacity(2),
            ctx,
        }
    }

    pub fn has_next(&mut self) -> Result<bool, CompileError> {
        Ok(!self.peek()?.is(TokenKind::Eof))
    }

    /// The next token without consuming it. Repeated calls return the same token.
    pub fn peek(&mut self) -> Result<Token, CompileError> {
        if let Some(&tok) = self.lookahead.front() {
            return Ok(tok);
        }
        let tok = self.scan()?;
        self.lookahead.push_back(tok);
        Ok(tok)
    }

    /// The token after [`peek`](Self::peek), without consuming either.
    pub fn peek_second(&mut self) -> Result<Token, CompileError> {
        while self.lookahead.len() < 2 {
            let tok = self.scan()?;
            self.lookahead.push_back(tok);
        }
        self.lookahead
            .get(1)
            .copied()
            .ok_or_else(|| CompileError::internal("lookahead buffer underflow"))
    }

    pub fn next(&mut self) -> Result<Token, CompileError> {
        match self.lookahead.pop_front() {
            Some(tok) => Ok(tok),
            None => self.scan(),
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn scan(&mut self) -> Result<Token, CompileError> {
        self.skip_whitespace_and_comments();

        let line = self.line;
        let Some(ch) = self.current() else {
            return Ok(Token::new(TokenKind::Eof, 0, line));
        };

        match ch {
            b'"' => {
                self.pos += 1;
                self.scan_string(line)
            }
            b'0'..=b'9' => self.scan_number(line),
            c if c.is_ascii_alphabetic() => Ok(self.scan_word(line)),
            c => match operator(c) {
                Some(kind) => {
                    self.pos += 1;
                    Ok(Token::new(kind, 0, line))
                }
                None => Err(CompileError::UnknownNotion {
                    line,
                    notion: notion_at(self.bytes.get(self.pos..).unwrap_or_default()),
                }),
            },
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current() {
            match ch {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    // Stop before the newline so the line counter sees it.
                    while self.current().is_some_and(|c| c != b'\n') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_string(&mut self, line: u32) -> Result<Token, CompileError> {
        let mut text = Vec::new();
        loop {
            match self.current() {
                None | Some(b'\n') => {
                    return Err(CompileError::UnexpectedEndOfString { line: self.line });
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let Some(escaped) = self.current() else {
                        return Err(CompileError::UnexpectedEndOfString { line: self.line });
                    };
                    self.pos += 1;
                    match escaped {
                        b'n' => text.push(b'\n'),
                        b't' => text.push(b'\t'),
                        b'\n' => {
                            self.line += 1;
                            text.push(b'\n');
                        }
                        other => text.push(other),
                    }
                }
                Some(c) => {
                    self.pos += 1;
                    text.push(c);
                }
            }
        }
        let id = self.ctx.constants.insert(&text);
        Ok(Token::new(TokenKind::String, id, line))
    }

    fn scan_number(&mut self, line: u32) -> Result<Token, CompileError> {
        let mut int: i32 = 0;
        let mut float: Option<f32> = None;
        let mut scale: f32 = 1.0;

        while let Some(ch) = self.current() {
            match ch {
                b'0'..=b'9' => {
                    let digit = ch - b'0';
                    match float.as_mut() {
                        // Accumulate in single precision.
                        #[allow(clippy::cast_possible_truncation)]
                        Some(f) => {
                            scale = (f64::from(scale) * 0.1) as f32;
                            *f += f32::from(digit) * scale;
                        }
                        None => {
                            int = int.wrapping_mul(10).wrapping_add(i32::from(digit));
                        }
                    }
                }
                b'.' => {
                    if float.is_some() {
                        return Err(CompileError::WrongNumber { line: self.line });
                    }
                    #[allow(clippy::cast_precision_loss)]
                    let seed = int as f32;
                    float = Some(seed);
                }
                _ => break,
            }
            self.pos += 1;
        }

        Ok(match float {
            #[allow(clippy::cast_possible_wrap)]
            Some(f) => Token::new(TokenKind::Float, f.to_bits() as i32, line),
            None => Token::new(TokenKind::Int, int, line),
        })
    }

    fn scan_word(&mut self, line: u32) -> Token {
        let start = self.pos;
        while self
            .current()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.pos += 1;
        }
        let word = String::from_utf8_lossy(self.bytes.get(start..self.pos).unwrap_or_default());
        match keyword(&word) {
            Some((kind, value)) => Token::new(kind, value, line),
            None => {
                let id = self.ctx.symbols.insert(word.as_bytes());
                Token::new(TokenKind::Variable, id, line)
            }
        }
    }
}
