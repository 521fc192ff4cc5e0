//! Pass 1: classify every line, size it and assign locations.
//!
//! Labels are declared as they are met, so the label index is complete
//! when this pass returns and Pass 2 can resolve forward references.

use tracing::{Level, event};

use crate::catalog::{Directive, StorageDirective};
use crate::error::{AsmError, ErrorKind, Result};
use crate::parser::{LineKind, ParsedLine, ParsedMnemonic, SourceLine, Storage, parse_line};
use crate::symbols::LabelIndex;

/// Highest SIC/XE memory address; also the widest format 4 address field.
pub const MAX_ADDRESS: u32 = 0xF_FFFF;

/// Everything Pass 1 learns about a program.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Program name, taken from the label on START.
    pub name: String,
    pub start: u32,
    /// Final location counter value.
    pub end: u32,
    pub lines: Vec<SourceLine>,
    pub labels: LabelIndex,
}

/// Run Pass 1 over the source lines.
pub fn locate<I, S>(source: I) -> Result<Layout>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut layout = Layout {
        name: String::new(),
        start: 0,
        end: 0,
        lines: Vec::new(),
        labels: LabelIndex::new(),
    };

    for (index, text) in source.into_iter().enumerate() {
        let text = text.as_ref();
        let number = index + 1;
        let at = |kind: ErrorKind| kind.at(number, text);

        let Some(parsed) = parse_line(text).map_err(at)? else {
            continue;
        };

        let kind = classify(&parsed).map_err(at)?;
        let location = match kind {
            LineKind::Directive(Directive::Start) => {
                let address = start_address(&parsed.operands).map_err(at)?;
                layout.start = address;
                layout.name = parsed.label.clone().unwrap_or_default();
                address
            }
            _ => layout.end,
        };
        let location_after = advance(&kind, location).map_err(at)?;
        layout.end = location_after;

        if let Some(label) = &parsed.label {
            layout
                .labels
                .declare(label.clone(), location)
                .map_err(|dup| at(ErrorKind::DuplicateLabel(dup)))?;
        }

        let line = SourceLine {
            number,
            text: text.to_string(),
            label: parsed.label,
            kind,
            operands: parsed.operands,
            location,
            location_after,
            code: None,
        };
        event!(
            Level::TRACE,
            line = number,
            "{:06X} {} {:?}",
            location,
            line.mnemonic(),
            line.operands
        );
        layout.lines.push(line);
    }

    if layout.lines.is_empty() {
        return Err(AsmError::EmptyFile);
    }

    event!(
        Level::DEBUG,
        "pass 1: {} lines, {} labels, start {:06X}, end {:06X}",
        layout.lines.len(),
        layout.labels.len(),
        layout.start,
        layout.end
    );
    Ok(layout)
}

/// Decide the line kind, decoding storage operands on the way.
fn classify(parsed: &ParsedLine) -> std::result::Result<LineKind, ErrorKind> {
    let storage = match parsed.mnemonic {
        ParsedMnemonic::Directive(d) => return Ok(LineKind::Directive(d)),
        ParsedMnemonic::Instruction(inst) => return Ok(LineKind::Instruction(inst)),
        ParsedMnemonic::Storage(s) => s,
    };

    let [operand] = parsed.operands.as_slice() else {
        return Err(ErrorKind::DirectiveArity {
            directive: storage.name(),
            expected: 1,
        });
    };

    let decoded = match storage {
        StorageDirective::Word => Storage::Word(parse_word(operand)?),
        StorageDirective::Resw => Storage::ReserveWords(parse_length(operand)?),
        StorageDirective::Resb => Storage::ReserveBytes(parse_length(operand)?),
        StorageDirective::Byte => Storage::Bytes(decode_byte_literal(operand)?),
    };
    Ok(LineKind::Storage(decoded))
}

fn start_address(operands: &[String]) -> std::result::Result<u32, ErrorKind> {
    let [operand] = operands else {
        return Err(ErrorKind::DirectiveArity {
            directive: Directive::Start.name(),
            expected: 1,
        });
    };
    match u32::from_str_radix(operand, 16) {
        Ok(address) if address <= MAX_ADDRESS => Ok(address),
        _ => Err(ErrorKind::InvalidAddress(operand.clone())),
    }
}

/// Location counter value after a line of the given kind.
fn advance(kind: &LineKind, location: u32) -> std::result::Result<u32, ErrorKind> {
    let size = match kind {
        LineKind::Directive(_) => 0,
        LineKind::Instruction(inst) => inst.descriptor.size(inst.extended),
        LineKind::Storage(storage) => storage
            .size()
            .ok_or(ErrorKind::AddressOverflow(u64::from(u32::MAX) + 1))?,
    };
    // The counter may rest one past the last byte of memory
    let after = u64::from(location) + u64::from(size);
    if after > u64::from(MAX_ADDRESS) + 1 {
        return Err(ErrorKind::AddressOverflow(after));
    }
    Ok(after as u32)
}

fn parse_length(operand: &str) -> std::result::Result<u32, ErrorKind> {
    operand
        .parse::<u32>()
        .map_err(|_| ErrorKind::InvalidLength(operand.to_string()))
}

fn parse_word(operand: &str) -> std::result::Result<i32, ErrorKind> {
    match operand.parse::<i32>() {
        Ok(value) if (-0x80_0000..=0xFF_FFFF).contains(&value) => Ok(value),
        _ => Err(ErrorKind::InvalidWord(operand.to_string())),
    }
}

/// Decode a `C'text'` or `X'hexpairs'` literal into its bytes.
pub fn decode_byte_literal(literal: &str) -> std::result::Result<Vec<u8>, ErrorKind> {
    let invalid = || ErrorKind::InvalidByteLiteral(literal.to_string());

    let (hex, body) = if let Some(rest) = literal.strip_prefix("C'") {
        (false, rest)
    } else if let Some(rest) = literal.strip_prefix("X'") {
        (true, rest)
    } else {
        return Err(invalid());
    };
    let body = body.strip_suffix('\'').ok_or_else(invalid)?;

    if body.is_empty() {
        return Err(ErrorKind::EmptyByteLiteral(literal.to_string()));
    }
    if !hex {
        return Ok(body.as_bytes().to_vec());
    }

    if body.len() % 2 != 0 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    (0..body.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&body[i..i + 2], 16).map_err(|_| invalid()))
        .collect()
}
