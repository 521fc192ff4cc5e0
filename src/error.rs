//! Error types for SIC/XE assembly.
//!
//! Every failure is fatal: the first error aborts the run. Errors raised
//! while processing a source line carry that line's number and text.

use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of an assembly failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unrecognized mnemonic, malformed label or operand syntax.
    Syntax,
    /// Wrong operand count for a directive or instruction.
    Arity,
    /// Malformed numeric, hex or byte literal.
    Value,
    /// Unresolved label.
    Reference,
    /// Displacement or address outside every encodable window.
    Range,
    /// Pseudo-instruction that cannot be rewritten.
    Conversion,
}

/// What went wrong, independent of where.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("label cannot be the name of a register: {0}")]
    RegisterLabel(String),

    #[error("duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("conflicting addressing modifiers: {0}")]
    ConflictingModifiers(String),

    #[error("{directive} accepts {expected} argument(s)")]
    DirectiveArity {
        directive: &'static str,
        expected: usize,
    },

    #[error("{mnemonic} accepts {expected} argument(s)")]
    InstructionArity {
        mnemonic: &'static str,
        expected: usize,
    },

    #[error("invalid hex address: {0}")]
    InvalidAddress(String),

    #[error("invalid length: {0}")]
    InvalidLength(String),

    #[error("invalid word value: {0}")]
    InvalidWord(String),

    #[error("invalid byte literal: {0}")]
    InvalidByteLiteral(String),

    #[error("no bytes found in BYTE variable: {0}")]
    EmptyByteLiteral(String),

    #[error("invalid register: {0}")]
    InvalidRegister(String),

    #[error("label not found: {0}")]
    LabelNotFound(String),

    #[error("base register not used and program counter out of range")]
    PcOutOfRange,

    #[error("base and program counter displacement out of range")]
    DisplacementOutOfRange,

    #[error("location counter exceeds addressable memory: {0:#X}")]
    AddressOverflow(u64),

    #[error("failed to convert {pseudo} statement: {reason}")]
    Conversion { pseudo: &'static str, reason: String },

    #[error("failed to generate object code: {0}")]
    ObjectCode(Box<ErrorKind>),
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::InvalidInstruction(_)
            | ErrorKind::RegisterLabel(_)
            | ErrorKind::DuplicateLabel(_)
            | ErrorKind::ConflictingModifiers(_)
            | ErrorKind::InvalidRegister(_) => ErrorCategory::Syntax,
            ErrorKind::DirectiveArity { .. } | ErrorKind::InstructionArity { .. } => {
                ErrorCategory::Arity
            }
            ErrorKind::InvalidAddress(_)
            | ErrorKind::InvalidLength(_)
            | ErrorKind::InvalidWord(_)
            | ErrorKind::InvalidByteLiteral(_)
            | ErrorKind::EmptyByteLiteral(_) => ErrorCategory::Value,
            ErrorKind::LabelNotFound(_) => ErrorCategory::Reference,
            ErrorKind::PcOutOfRange
            | ErrorKind::DisplacementOutOfRange
            | ErrorKind::AddressOverflow(_) => ErrorCategory::Range,
            ErrorKind::Conversion { .. } => ErrorCategory::Conversion,
            ErrorKind::ObjectCode(inner) => inner.category(),
        }
    }

    /// Attach the source line this failure belongs to.
    pub fn at(self, line: usize, text: &str) -> AsmError {
        AsmError::Line {
            line,
            text: text.to_string(),
            kind: self,
        }
    }
}

#[derive(Error, Debug)]
pub enum AsmError {
    #[error("line {line}: {kind}")]
    Line {
        line: usize,
        text: String,
        #[source]
        kind: ErrorKind,
    },

    #[error("empty assembly file")]
    EmptyFile,

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AsmError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            AsmError::Line { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// 1-based number of the offending source line, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            AsmError::Line { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Original text of the offending source line, if any.
    pub fn source_text(&self) -> Option<&str> {
        match self {
            AsmError::Line { text, .. } => Some(text),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AsmError>;
