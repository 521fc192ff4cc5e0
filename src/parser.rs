//! Source line tokenizing and the line model shared by both passes.
//!
//! A line is `[label] mnemonic [operand[,operand...]]`. Pseudo-instructions
//! are rewritten here, so later passes only see catalog instructions.

use crate::catalog::{Descriptor, Directive, Mnemonic, Register, StorageDirective};
use crate::error::ErrorKind;
use crate::expand::expand;

/// A machine instruction as written, after any pseudo-op rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub descriptor: &'static Descriptor,
    pub extended: bool,
}

/// Storage directive with its operand already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    Word(i32),
    ReserveWords(u32),
    ReserveBytes(u32),
    Bytes(Vec<u8>),
}

impl Storage {
    /// Bytes reserved, or `None` if the count does not fit the address space.
    pub fn size(&self) -> Option<u32> {
        match self {
            Storage::Word(_) => Some(3),
            Storage::ReserveWords(n) => n.checked_mul(3),
            Storage::ReserveBytes(n) => Some(*n),
            Storage::Bytes(bytes) => u32::try_from(bytes.len()).ok(),
        }
    }
}

/// What a source line does, decided once during Pass 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Directive(Directive),
    Storage(Storage),
    Instruction(Instruction),
}

/// One non-blank, non-comment line of source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number in the input.
    pub number: usize,
    pub text: String,
    pub label: Option<String>,
    pub kind: LineKind,
    pub operands: Vec<String>,
    pub location: u32,
    pub location_after: u32,
    /// Object code bytes, filled in by Pass 2.
    pub code: Option<Vec<u8>>,
}

impl SourceLine {
    /// Mnemonic after pseudo-op expansion, with the `+` marker if extended.
    pub fn mnemonic(&self) -> String {
        match &self.kind {
            LineKind::Directive(d) => d.name().to_string(),
            LineKind::Storage(s) => match s {
                Storage::Word(_) => StorageDirective::Word.name().to_string(),
                Storage::ReserveWords(_) => StorageDirective::Resw.name().to_string(),
                Storage::ReserveBytes(_) => StorageDirective::Resb.name().to_string(),
                Storage::Bytes(_) => StorageDirective::Byte.name().to_string(),
            },
            LineKind::Instruction(inst) if inst.extended => format!("+{}", inst.descriptor.name),
            LineKind::Instruction(inst) => inst.descriptor.name.to_string(),
        }
    }

    /// Whether the listing shows a location for this line.
    pub fn has_location(&self) -> bool {
        matches!(
            self.kind,
            LineKind::Directive(Directive::Start) | LineKind::Storage(_) | LineKind::Instruction(_)
        )
    }

    /// Object code as upper-case hex digits (empty when there is none).
    pub fn code_hex(&self) -> String {
        self.code
            .as_deref()
            .map(hex_string)
            .unwrap_or_default()
    }
}

pub(crate) fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// A line split into label, mnemonic and operands, before sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub label: Option<String>,
    pub mnemonic: ParsedMnemonic,
    pub operands: Vec<String>,
}

/// The line's mnemonic once pseudo-ops have been rewritten away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedMnemonic {
    Directive(Directive),
    Storage(StorageDirective),
    Instruction(Instruction),
}

/// Split a line into whitespace tokens, or `None` for blank and comment lines.
fn tokenize(line: &str) -> Option<Vec<&str>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.first() {
        None => None,
        Some(first) if first.starts_with('.') => None,
        Some(_) => Some(tokens),
    }
}

/// Replace `NAME[reg]` with the two operands `NAME, X`.
///
/// Only the index register can index, so the bracket contents are not read.
fn convert_indexing(operands: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(operands.len() + 1);
    for operand in operands {
        match (operand.find('['), operand.find(']')) {
            (Some(left), Some(right)) if left < right => {
                out.push(operand[..left].to_string());
                out.push(Register::X.name().to_string());
            }
            _ => out.push(operand),
        }
    }
    out
}

/// Parse one source line. Blank and comment lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ParsedLine>, ErrorKind> {
    let Some(tokens) = tokenize(line) else {
        return Ok(None);
    };

    let (label, (mnemonic, extended), rest) = if let Some(m) = Mnemonic::parse(tokens[0]) {
        (None, m, &tokens[1..])
    } else if let Some(m) = tokens.get(1).and_then(|t| Mnemonic::parse(t)) {
        (Some(tokens[0]), m, &tokens[2..])
    } else {
        return Err(ErrorKind::InvalidInstruction(tokens[0].to_string()));
    };

    if let Some(label) = label {
        if Register::parse(label).is_some() {
            return Err(ErrorKind::RegisterLabel(label.to_string()));
        }
    }

    let operands: Vec<String> = rest
        .iter()
        .flat_map(|token| token.split(','))
        .filter(|op| !op.is_empty())
        .map(str::to_string)
        .collect();
    let mut operands = convert_indexing(operands);

    let mnemonic = match mnemonic {
        Mnemonic::Directive(d) => ParsedMnemonic::Directive(d),
        Mnemonic::Storage(s) => ParsedMnemonic::Storage(s),
        Mnemonic::Machine(descriptor) => ParsedMnemonic::Instruction(Instruction {
            descriptor,
            extended,
        }),
        Mnemonic::Pseudo(pseudo) => {
            let expansion = expand(pseudo, &operands)?;
            operands = expansion.operands;
            ParsedMnemonic::Instruction(Instruction {
                descriptor: expansion.descriptor,
                extended,
            })
        }
    };

    Ok(Some(ParsedLine {
        label: label.map(str::to_string),
        mnemonic,
        operands,
    }))
}
