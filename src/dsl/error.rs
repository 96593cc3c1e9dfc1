use serde::Serialize;

/// A compilation error. Lexical and parse errors carry the 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A string literal ran into a raw newline or the end of the buffer.
    UnexpectedEndOfString { line: u32 },
    /// A number literal with more than one decimal point.
    WrongNumber { line: u32 },
    /// A character outside the operator table. Bytes that are not UTF-8 are
    /// shown in hex.
    UnknownNotion { line: u32, notion: String },
    /// The token at `line` does not fit the production being parsed.
    Parse {
        line: u32,
        expected: String,
        found: String,
    },
    /// `goto`/`use` names a dialogue that is never defined.
    UnresolvedDialogue { name: String },
    /// Two dialogues share a name, so jump addresses would be ambiguous.
    DuplicateDialogue { name: String, line: u32 },
    /// A broken invariant between pipeline stages.
    Internal { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Lexer,
    Parser,
    Compiler,
}

impl CompileError {
    pub fn parser(line: u32, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Parse {
            line,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnexpectedEndOfString { .. }
            | Self::WrongNumber { .. }
            | Self::UnknownNotion { .. } => ErrorKind::Lexer,
            Self::Parse { .. } => ErrorKind::Parser,
            Self::UnresolvedDialogue { .. }
            | Self::DuplicateDialogue { .. }
            | Self::Internal { .. } => ErrorKind::Compiler,
        }
    }

    /// Source line of the error, when it has one.
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::UnexpectedEndOfString { line }
            | Self::WrongNumber { line }
            | Self::UnknownNotion { line, .. }
            | Self::Parse { line, .. }
            | Self::DuplicateDialogue { line, .. } => Some(*line),
            Self::UnresolvedDialogue { .. } | Self::Internal { .. } => None,
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedEndOfString { line } => {
                write!(f, "Line {line}: unexpected end of string.")
            }
            Self::WrongNumber { line } => write!(f, "Line {line}: wrong number expression."),
            Self::UnknownNotion { line, notion } => {
                write!(f, "Line {line}: unknown notion {notion}")
            }
            Self::Parse {
                line,
                expected,
                found,
            } => write!(f, "Line {line}: expected {expected}, found {found}."),
            Self::UnresolvedDialogue { name } => {
                write!(f, "dialogue '{name}' is referenced but never defined.")
            }
            Self::DuplicateDialogue { name, line } => {
                write!(f, "Line {line}: dialogue '{name}' is defined more than once.")
            }
            Self::Internal { message } => write!(f, "internal compiler error: {message}"),
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_messages_carry_line() {
        assert_eq!(
            CompileError::WrongNumber { line: 4 }.to_string(),
            "Line 4: wrong number expression."
        );
        assert_eq!(
            CompileError::UnknownNotion { line: 2, notion: "&".into() }.to_string(),
            "Line 2: unknown notion &"
        );
    }

    #[test]
    fn kinds_group_by_stage() {
        assert_eq!(CompileError::UnexpectedEndOfString { line: 1 }.kind(), ErrorKind::Lexer);
        assert_eq!(CompileError::parser(1, "'{'", "'}'").kind(), ErrorKind::Parser);
        assert_eq!(
            CompileError::UnresolvedDialogue { name: "x".into() }.kind(),
            ErrorKind::Compiler
        );
        assert_eq!(CompileError::UnresolvedDialogue { name: "x".into() }.line(), None);
    }
}
