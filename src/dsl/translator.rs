use serde::Serialize;

use super::ast::*;
use super::error::CompileError;
use super::lexer::{Token, TokenKind};

/// IL opcodes. The discriminant is the 4-byte opcode written to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum CommandType {
    StartDialogue = 1,
    SetSpeaker = 2,
    SetSpeakerWithState = 3,
    Talk = 4,
    TalkInTime = 5,
    /// `use`: run another dialogue and return.
    Call = 6,
    /// `goto`: continue in another dialogue.
    Jump = 7,
    Option = 8,
    /// Reserved for the runtime; variables are read through operand tags.
    GetData = 9,
    SetData = 10,
    PlayAnimation = 11,
    PlaySound = 12,
    Add = 13,
    Sub = 14,
    Mul = 15,
    Div = 16,
    Mod = 17,
    Equal = 18,
    And = 19,
    Or = 20,
    Not = 21,
    Neg = 22,
    /// Jump to the target when the operand is false.
    ConditionalJump = 23,
    Move = 24,
    Delay = 25,
    Publish = 26,
    EndDialogue = 27,
    Less = 28,
    Greater = 29,
    LessEqual = 30,
    GreaterEqual = 31,
    /// Unconditional jump within a dialogue; ends a true block that has an `else`.
    Skip = 32,
}

impl CommandType {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Opcodes whose single parameter names a dialogue.
    pub fn targets_dialogue(self) -> bool {
        matches!(self, Self::Jump | Self::Call)
    }
}

impl From<BinOp> for CommandType {
    fn from(op: BinOp) -> Self {
        match op {
            BinOp::Add => Self::Add,
            BinOp::Sub => Self::Sub,
            BinOp::Mul => Self::Mul,
            BinOp::Div => Self::Div,
            BinOp::Mod => Self::Mod,
            BinOp::Less => Self::Less,
            BinOp::Greater => Self::Greater,
            BinOp::LessEqual => Self::LessEqual,
            BinOp::GreaterEqual => Self::GreaterEqual,
            BinOp::Equal => Self::Equal,
            BinOp::And => Self::And,
            BinOp::Or => Self::Or,
        }
    }
}

impl From<UnaryOp> for CommandType {
    fn from(op: UnaryOp) -> Self {
        match op {
            UnaryOp::Not => Self::Not,
            UnaryOp::Neg => Self::Neg,
        }
    }
}

/// Type tag preceding every typed operand value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OperandType {
    Variable = 0,
    String = 1,
    Int = 2,
    Float = 3,
    Bool = 4,
}

impl OperandType {
    fn of(token: Token) -> Result<Self, CompileError> {
        Ok(match token.kind {
            TokenKind::Variable => Self::Variable,
            TokenKind::String => Self::String,
            TokenKind::Int => Self::Int,
            TokenKind::Float => Self::Float,
            TokenKind::Bool => Self::Bool,
            other => {
                return Err(CompileError::internal(format!(
                    "{other} cannot be used as an operand"
                )))
            }
        })
    }
}

/// `[tag, value]` pair for a lowered operand.
fn operand(token: Token) -> Result<[i32; 2], CompileError> {
    Ok([OperandType::of(token)? as i32, token.value])
}

/// One IL instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ILCommand {
    pub command: CommandType,
    pub parameters: Vec<i32>,
}

impl ILCommand {
    /// Encoded size: opcode plus one word per parameter.
    pub fn byte_size(&self) -> u32 {
        u32::try_from(self.parameters.len())
            .map_or(u32::MAX, |n| n.saturating_mul(4).saturating_add(4))
    }
}

/// The IL for one dialogue.
#[derive(Debug, Clone, Serialize)]
pub struct TranslatedDialogue {
    /// Symbol id of the dialogue name.
    pub name: i32,
    pub mode: FiringMode,
    /// Source line of the dialogue name.
    pub line: u32,
    pub commands: Vec<ILCommand>,
    /// Sum of [`ILCommand::byte_size`] over `commands`.
    pub size: u32,
}

/// Lowers one dialogue at a time into IL with dialogue-relative jump targets.
#[derive(Debug)]
pub struct Translator {
    commands: Vec<ILCommand>,
    size: u32,
    next_temp: i32,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            size: 0,
            next_temp: -1,
        }
    }

    pub fn translate_dialogue(
        &mut self,
        dialogue: &Dialogue,
    ) -> Result<TranslatedDialogue, CompileError> {
        self.commands.clear();
        self.size = 0;
        self.next_temp = -1;

        let guard = match &dialogue.condition {
            Some(condition) => {
                let value = self.lower_expr(condition)?;
                Some(self.push_jump(CommandType::ConditionalJump, &operand(value)?))
            }
            None => None,
        };

        self.push(CommandType::StartDialogue, Vec::new());
        self.lower_content(&dialogue.content)?;
        self.push(CommandType::EndDialogue, Vec::new());

        // A failed guard skips the whole dialogue.
        if let Some(jump) = guard {
            self.patch_jump(jump)?;
        }

        Ok(TranslatedDialogue {
            name: dialogue.name.value,
            mode: dialogue.mode,
            line: dialogue.name.line,
            commands: std::mem::take(&mut self.commands),
            size: self.size,
        })
    }

    // ── Emission helpers ──────────────────────────────────────────

    fn push(&mut self, command: CommandType, parameters: Vec<i32>) -> usize {
        let cmd = ILCommand {
            command,
            parameters,
        };
        self.size = self.size.saturating_add(cmd.byte_size());
        self.commands.push(cmd);
        self.commands.len() - 1
    }

    /// Push a jump whose last parameter is a placeholder target.
    fn push_jump(&mut self, command: CommandType, leading: &[i32]) -> usize {
        let mut parameters = leading.to_vec();
        parameters.push(0);
        self.push(command, parameters)
    }

    fn patch_jump(&mut self, idx: usize) -> Result<(), CompileError> {
        self.patch_jump_to(idx, self.size)
    }

    fn patch_jump_to(&mut self, idx: usize, target: u32) -> Result<(), CompileError> {
        let target = i32::try_from(target)
            .map_err(|_| CompileError::internal("dialogue exceeds the addressable size"))?;
        let slot = self
            .commands
            .get_mut(idx)
            .and_then(|cmd| cmd.parameters.last_mut())
            .ok_or_else(|| CompileError::internal(format!("no jump placeholder at {idx}")))?;
        *slot = target;
        Ok(())
    }

    fn fresh_temp(&mut self) -> i32 {
        let id = self.next_temp;
        self.next_temp -= 1;
        id
    }

    // ── Commands ──────────────────────────────────────────────────

    fn lower_content(&mut self, content: &[Command]) -> Result<(), CompileError> {
        for command in content {
            self.lower_command(command)?;
        }
        Ok(())
    }

    fn lower_command(&mut self, command: &Command) -> Result<(), CompileError> {
        match command {
            Command::Animate { name, animation } => {
                let value = self.lower_expr(animation)?;
                let [tag, value] = operand(value)?;
                self.push(CommandType::PlayAnimation, vec![name.value, tag, value]);
            }
            Command::Sound { effect } => {
                let value = self.lower_expr(effect)?;
                self.push(CommandType::PlaySound, operand(value)?.to_vec());
            }
            Command::Delay { time } => {
                let value = self.lower_expr(time)?;
                self.push(CommandType::Delay, operand(value)?.to_vec());
            }
            Command::Move { name, x, y, time } => {
                let x = operand(self.lower_expr(x)?)?;
                let y = operand(self.lower_expr(y)?)?;
                let time = operand(self.lower_expr(time)?)?;
                let mut params = vec![name.value];
                params.extend(x);
                params.extend(y);
                params.extend(time);
                self.push(CommandType::Move, params);
            }
            Command::Goto { name } => {
                self.push(CommandType::Jump, vec![name.value]);
            }
            Command::Use { name } => {
                self.push(CommandType::Call, vec![name.value]);
            }
            Command::If(node) => self.lower_if(node)?,
            Command::Select { options } => {
                for option in options {
                    let jump = self.push_jump(CommandType::Option, &[option.hint.value]);
                    match &option.body {
                        OptionBody::Command(command) => self.lower_command(command)?,
                        OptionBody::Block(content) => self.lower_content(content)?,
                    }
                    self.patch_jump_to(jump, self.size.saturating_add(4))?;
                }
            }
            Command::Assign { target, expression } => self.lower_assign(*target, expression)?,
            Command::Message(message) => self.lower_message(message)?,
            Command::Speak(speak) => {
                match speak.state {
                    Some(state) => self.push(
                        CommandType::SetSpeakerWithState,
                        vec![speak.speaker.value, state.value],
                    ),
                    None => self.push(CommandType::SetSpeaker, vec![speak.speaker.value]),
                };
                match &speak.body {
                    SpeakBody::Message(message) => self.lower_message(message)?,
                    SpeakBody::Block(content) => self.lower_content(content)?,
                }
            }
            Command::Publish { name, params } => {
                let count = i32::try_from(params.len())
                    .map_err(|_| CompileError::internal("too many event parameters"))?;
                let mut parameters = vec![name.value, count];
                for param in params {
                    let value = self.lower_expr(param)?;
                    parameters.extend(operand(value)?);
                }
                self.push(CommandType::Publish, parameters);
            }
        }
        Ok(())
    }

    fn lower_if(&mut self, node: &If) -> Result<(), CompileError> {
        let condition = self.lower_expr(&node.condition)?;
        let jump_else = self.push_jump(CommandType::ConditionalJump, &operand(condition)?);

        self.lower_content(&node.true_block)?;

        match &node.otherwise {
            Some(otherwise) => {
                let jump_end = self.push_jump(CommandType::Skip, &[]);
                self.patch_jump(jump_else)?;
                match otherwise {
                    Else::If(chained) => self.lower_if(chained)?,
                    Else::Block(content) => self.lower_content(content)?,
                }
                self.patch_jump(jump_end)?;
            }
            None => self.patch_jump(jump_else)?,
        }
        Ok(())
    }

    fn lower_message(&mut self, message: &Message) -> Result<(), CompileError> {
        match &message.time {
            Some(time) => {
                let [tag, value] = operand(self.lower_expr(time)?)?;
                self.push(CommandType::TalkInTime, vec![message.text.value, tag, value]);
            }
            None => {
                self.push(CommandType::Talk, vec![message.text.value]);
            }
        }
        Ok(())
    }

    fn lower_assign(&mut self, target: Token, expression: &Expr) -> Result<(), CompileError> {
        let value = self.lower_expr(expression)?;

        // The result is the temporary the last command just wrote: retarget it.
        if value.is(TokenKind::Variable) && value.value < 0 {
            if let Some(last) = self.commands.last_mut() {
                if let Some(dest) = last.parameters.first_mut() {
                    if *dest == value.value {
                        *dest = target.value;
                        self.next_temp += 1;
                        return Ok(());
                    }
                }
            }
        }

        let [tag, value] = operand(value)?;
        self.push(CommandType::SetData, vec![target.value, tag, value]);
        Ok(())
    }

    // ── Expressions ───────────────────────────────────────────────

    /// Lower `expr`, returning the token that holds its value.
    fn lower_expr(&mut self, expr: &Expr) -> Result<Token, CompileError> {
        match &expr.kind {
            ExprKind::Leaf(token) => Ok(*token),
            ExprKind::Binary { op, left, right } => {
                let left = operand(self.lower_expr(left)?)?;
                let right = operand(self.lower_expr(right)?)?;
                let dest = self.fresh_temp();
                let mut params = vec![dest];
                params.extend(left);
                params.extend(right);
                self.push(CommandType::from(*op), params);
                Ok(Token::new(TokenKind::Variable, dest, expr.line))
            }
            ExprKind::Unary { op, operand: inner } => {
                let value = operand(self.lower_expr(inner)?)?;
                let dest = self.fresh_temp();
                let mut params = vec![dest];
                params.extend(value);
                self.push(CommandType::from(*op), params);
                Ok(Token::new(TokenKind::Variable, dest, expr.line))
            }
        }
    }
}
