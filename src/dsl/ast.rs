//! AST node types for dialogue scripts.
//!
//! Built in one parse call and read in one translate pass. Every child has a
//! single owner; sibling chains are plain `Vec`s.

use serde::Serialize;

use super::lexer::Token;

/// A complete source file.
#[derive(Debug, Clone)]
pub struct Program {
    /// Language names from a leading `#{ "en_GB", ... }` block (string tokens).
    pub i18n: Option<Vec<Token>>,
    pub dialogues: Vec<Dialogue>,
}

/// Which output group a dialogue is serialized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FiringMode {
    #[default]
    None,
    Auto,
    Trigger,
    Interact,
}

/// `[auto|trigger|interact] dialogue name [when (expr)] { content }`
#[derive(Debug, Clone)]
pub struct Dialogue {
    /// Variable token; `value` is the name's symbol id.
    pub name: Token,
    pub condition: Option<Expr>,
    pub content: Content,
    pub mode: FiringMode,
}

pub type Content = Vec<Command>;

#[derive(Debug, Clone)]
pub enum Command {
    /// `animate @name expr`
    Animate { name: Token, animation: Expr },
    /// `sound expr`
    Sound { effect: Expr },
    /// `delay expr`
    Delay { time: Expr },
    /// `move @name (x, y) in time`
    Move {
        name: Token,
        x: Expr,
        y: Expr,
        time: Expr,
    },
    /// `goto name`
    Goto { name: Token },
    /// `use name`
    Use { name: Token },
    If(If),
    /// `select { "hint": command ... }`
    Select { options: Vec<SelectOption> },
    /// `$target = expr`
    Assign { target: Token, expression: Expr },
    Message(Message),
    Speak(Speak),
    /// `<event[, expr][, expr]>`
    Publish { name: Token, params: Vec<Expr> },
}

/// `if (condition) { true_block } [else ...]`
#[derive(Debug, Clone)]
pub struct If {
    pub condition: Expr,
    pub true_block: Content,
    pub otherwise: Option<Else>,
}

/// An `else if` chain and a plain `else` block are mutually exclusive.
#[derive(Debug, Clone)]
pub enum Else {
    If(Box<If>),
    Block(Content),
}

#[derive(Debug, Clone)]
pub struct SelectOption {
    /// String token shown to the player.
    pub hint: Token,
    pub body: OptionBody,
}

#[derive(Debug, Clone)]
pub enum OptionBody {
    Command(Box<Command>),
    Block(Content),
}

/// `"text" [in expr]`
#[derive(Debug, Clone)]
pub struct Message {
    pub text: Token,
    pub time: Option<Expr>,
}

/// `[name(state)]: message` or `[name]: { content }`
#[derive(Debug, Clone)]
pub struct Speak {
    pub speaker: Token,
    pub state: Option<Token>,
    pub body: SpeakBody,
}

#[derive(Debug, Clone)]
pub enum SpeakBody {
    Message(Message),
    Block(Content),
}

/// Expressions.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Literal or `$variable` token.
    Leaf(Token),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl Expr {
    pub fn leaf(token: Token) -> Self {
        Self {
            kind: ExprKind::Leaf(token),
            line: token.line,
        }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        let line = left.line;
        Self {
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            line,
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr, line: u32) -> Self {
        Self {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            line,
        }
    }
}
