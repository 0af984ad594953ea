#![forbid(unsafe_code)]

//! Data model shared by every part of the harness: the eight-token
//! instruction alphabet, exact-length programs, and the structural checks
//! that the generator's postconditions and the test suites rely on.

#[cfg(test)]
pub mod proptest_strategies;

use std::fmt;

/// One token of the tape language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    MoveLeft,
    MoveRight,
    Increment,
    Decrement,
    ReadByte,
    WriteByte,
    LoopOpen,
    LoopClose,
}

impl Instruction {
    /// Every instruction, in the canonical display order.
    pub const ALL: [Instruction; 8] = [
        Instruction::MoveLeft,
        Instruction::MoveRight,
        Instruction::Increment,
        Instruction::Decrement,
        Instruction::ReadByte,
        Instruction::WriteByte,
        Instruction::LoopOpen,
        Instruction::LoopClose,
    ];

    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::MoveLeft => b'<',
            Self::MoveRight => b'>',
            Self::Increment => b'+',
            Self::Decrement => b'-',
            Self::ReadByte => b',',
            Self::WriteByte => b'.',
            Self::LoopOpen => b'[',
            Self::LoopClose => b']',
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        char::from(self.as_byte())
    }

    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'<' => Some(Self::MoveLeft),
            b'>' => Some(Self::MoveRight),
            b'+' => Some(Self::Increment),
            b'-' => Some(Self::Decrement),
            b',' => Some(Self::ReadByte),
            b'.' => Some(Self::WriteByte),
            b'[' => Some(Self::LoopOpen),
            b']' => Some(Self::LoopClose),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_loop_token(self) -> bool {
        matches!(self, Self::LoopOpen | Self::LoopClose)
    }

    /// Net movement of the simulated data pointer: +1, -1, or 0.
    #[must_use]
    pub fn pointer_delta(self) -> i64 {
        match self {
            Self::MoveLeft => -1,
            Self::MoveRight => 1,
            _ => 0,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::MoveLeft => 1 << 0,
            Self::MoveRight => 1 << 1,
            Self::Increment => 1 << 2,
            Self::Decrement => 1 << 3,
            Self::ReadByte => 1 << 4,
            Self::WriteByte => 1 << 5,
            Self::LoopOpen => 1 << 6,
            Self::LoopClose => 1 << 7,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A subset of the instruction alphabet, used to constrain generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alphabet(u8);

impl Alphabet {
    pub const EMPTY: Alphabet = Alphabet(0);
    pub const FULL: Alphabet = Alphabet(0xff);

    /// Parse a token string such as `"<>+-[]"`. Rejects non-token bytes.
    pub fn from_tokens(tokens: &str) -> Result<Self, InvariantViolation> {
        let mut alphabet = Self::EMPTY;
        for (position, byte) in tokens.bytes().enumerate() {
            match Instruction::from_byte(byte) {
                Some(instruction) => alphabet = alphabet.with(instruction),
                None => return Err(InvariantViolation::ForeignByte { position, byte }),
            }
        }
        Ok(alphabet)
    }

    #[must_use]
    pub fn contains(self, instruction: Instruction) -> bool {
        self.0 & instruction.bit() != 0
    }

    #[must_use]
    pub fn with(self, instruction: Instruction) -> Self {
        Self(self.0 | instruction.bit())
    }

    #[must_use]
    pub fn without(self, instruction: Instruction) -> Self {
        Self(self.0 & !instruction.bit())
    }

    #[must_use]
    pub fn without_loops(self) -> Self {
        self.without(Instruction::LoopOpen)
            .without(Instruction::LoopClose)
    }

    #[must_use]
    pub fn has_loop_tokens(self) -> bool {
        self.contains(Instruction::LoopOpen) && self.contains(Instruction::LoopClose)
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Member instructions in `Instruction::ALL` order.
    pub fn instructions(self) -> impl Iterator<Item = Instruction> {
        Instruction::ALL
            .into_iter()
            .filter(move |instruction| self.contains(*instruction))
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in self.instructions() {
            write!(f, "{}", instruction.as_char())?;
        }
        Ok(())
    }
}

/// An ordered sequence of instructions of an exact length.
///
/// The persisted wire form is the raw token bytes, nothing else: the file
/// *is* the program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program(Vec<Instruction>);

impl Program {
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self(instructions)
    }

    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> Vec<u8> {
        self.0.iter().map(|instruction| instruction.as_byte()).collect()
    }

    /// Strict parse of the wire form: every byte must be a token.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvariantViolation> {
        let mut instructions = Vec::with_capacity(bytes.len());
        for (position, byte) in bytes.iter().enumerate() {
            match Instruction::from_byte(*byte) {
                Some(instruction) => instructions.push(instruction),
                None => return Err(InvariantViolation::ForeignByte { position, byte: *byte }),
            }
        }
        Ok(Self(instructions))
    }

    /// Check the pointer-offset invariant: the simulated offset never goes
    /// negative on any prefix, and ends at exactly zero when `restore` is set.
    pub fn check_offset(&self, restore: bool) -> Result<(), InvariantViolation> {
        let mut offset: i64 = 0;
        for (position, instruction) in self.0.iter().enumerate() {
            offset += instruction.pointer_delta();
            if offset < 0 {
                return Err(InvariantViolation::NegativeOffset { position });
            }
        }
        if restore && offset != 0 {
            return Err(InvariantViolation::ResidualOffset { offset });
        }
        Ok(())
    }

    /// Check bracket balance. Returns the maximum observed nesting depth.
    pub fn check_balance(&self) -> Result<usize, InvariantViolation> {
        let mut open_positions = Vec::new();
        let mut max_depth = 0;
        for (position, instruction) in self.0.iter().enumerate() {
            match instruction {
                Instruction::LoopOpen => {
                    open_positions.push(position);
                    max_depth = max_depth.max(open_positions.len());
                }
                Instruction::LoopClose => {
                    if open_positions.pop().is_none() {
                        return Err(InvariantViolation::UnmatchedLoopClose { position });
                    }
                }
                _ => {}
            }
        }
        if let Some(position) = open_positions.first() {
            return Err(InvariantViolation::UnmatchedLoopOpen {
                position: *position,
                snippet: self.snippet_from(*position),
            });
        }
        Ok(max_depth)
    }

    /// Check that every instruction is drawn from `alphabet`.
    pub fn check_alphabet(&self, alphabet: Alphabet) -> Result<(), InvariantViolation> {
        for (position, instruction) in self.0.iter().enumerate() {
            if !alphabet.contains(*instruction) {
                return Err(InvariantViolation::ForeignInstruction {
                    position,
                    instruction: *instruction,
                });
            }
        }
        Ok(())
    }

    fn snippet_from(&self, position: usize) -> String {
        const SNIPPET_TOKENS: usize = 12;
        self.0[position..]
            .iter()
            .take(SNIPPET_TOKENS)
            .map(|instruction| instruction.as_char())
            .collect()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.0 {
            write!(f, "{}", instruction.as_char())?;
        }
        Ok(())
    }
}

/// A structural invariant failure in a program or a token string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    NegativeOffset { position: usize },
    ResidualOffset { offset: i64 },
    UnmatchedLoopOpen { position: usize, snippet: String },
    UnmatchedLoopClose { position: usize },
    ForeignInstruction { position: usize, instruction: Instruction },
    ForeignByte { position: usize, byte: u8 },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeOffset { position } => {
                write!(f, "pointer offset went negative at instruction {position}")
            }
            Self::ResidualOffset { offset } => {
                write!(
                    f,
                    "pointer offset is {offset} after the final instruction, expected 0"
                )
            }
            Self::UnmatchedLoopOpen { position, snippet } => {
                write!(
                    f,
                    "unmatched loop open at instruction {position} (block starting with: {snippet})"
                )
            }
            Self::UnmatchedLoopClose { position } => {
                write!(f, "unmatched loop close at instruction {position}")
            }
            Self::ForeignInstruction { position, instruction } => {
                write!(
                    f,
                    "instruction '{instruction}' at {position} is outside the allowed alphabet"
                )
            }
            Self::ForeignByte { position, byte } => {
                write!(f, "byte 0x{byte:02x} at {position} is not a tape instruction")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}
