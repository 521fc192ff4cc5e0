//! Pass 2: turn located lines into object code.
//!
//! Format 3 (`op n i x b p e disp12`) and format 4 (`op n i x b p e addr20`)
//! carry the addressing flags; formats 1 and 2 are the opcode alone or the
//! opcode followed by two register nibbles.

use tracing::{Level, event};

use crate::catalog::{
    Arity, Descriptor, Directive, Length, Register, is_immediate, is_indexed, is_indirect,
    strip_modifier,
};
use crate::error::{ErrorKind, Result};
use crate::layout::MAX_ADDRESS;
use crate::parser::{Instruction, LineKind, SourceLine, Storage};
use crate::symbols::LabelIndex;

/// PC-relative displacement window (signed 12 bits).
const PC_RANGE: std::ops::RangeInclusive<i64> = -2048..=2047;
/// Base-relative displacement window (unsigned 12 bits).
const BASE_RANGE: std::ops::RangeInclusive<i64> = 0..=4095;

/// How the address field of a format 3/4 instruction was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Constant operand or extended absolute address.
    Direct(i32),
    PcRelative(i32),
    BaseRelative(i32),
}

impl Addressing {
    fn value(self) -> i32 {
        match self {
            Addressing::Direct(v) | Addressing::PcRelative(v) | Addressing::BaseRelative(v) => v,
        }
    }
}

/// The n/i/x/b/p/e bits of a format 3/4 instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub indirect: bool,
    pub immediate: bool,
    pub indexed: bool,
    pub base: bool,
    pub pc: bool,
    pub extended: bool,
}

/// Encode a 3-byte format 3 instruction.
pub fn encode_format3(opcode: u8, flags: Flags, disp: i32) -> [u8; 3] {
    let word = (u32::from(opcode) << 16)
        | (u32::from(flags.indirect) << 17)
        | (u32::from(flags.immediate) << 16)
        | (u32::from(flags.indexed) << 15)
        | (u32::from(flags.base) << 14)
        | (u32::from(flags.pc) << 13)
        | (disp as u32 & 0xFFF);
    let [_, b0, b1, b2] = word.to_be_bytes();
    [b0, b1, b2]
}

/// Encode a 4-byte format 4 instruction. `b` and `p` are always clear and
/// `e` is always set.
pub fn encode_format4(opcode: u8, flags: Flags, address: i32) -> [u8; 4] {
    let word = (u32::from(opcode) << 24)
        | (u32::from(flags.indirect) << 25)
        | (u32::from(flags.immediate) << 24)
        | (u32::from(flags.indexed) << 23)
        | (1 << 20)
        | (address as u32 & 0xF_FFFF);
    word.to_be_bytes()
}

/// Choose PC-relative or base-relative addressing for a label target.
///
/// `pc` is the location just past the instruction; `base` is `None` while
/// base-relative addressing is disabled.
pub fn displacement(
    target: u32,
    pc: u32,
    base: Option<u32>,
) -> std::result::Result<Addressing, ErrorKind> {
    let prog_diff = i64::from(target) - i64::from(pc);
    if PC_RANGE.contains(&prog_diff) {
        return Ok(Addressing::PcRelative(prog_diff as i32));
    }

    let base = base.ok_or(ErrorKind::PcOutOfRange)?;
    let base_diff = i64::from(target) - i64::from(base);
    if BASE_RANGE.contains(&base_diff) {
        Ok(Addressing::BaseRelative(base_diff as i32))
    } else {
        Err(ErrorKind::DisplacementOutOfRange)
    }
}

/// Run Pass 2, storing object code on each line.
pub fn generate(lines: &mut [SourceLine], labels: &LabelIndex) -> Result<()> {
    let mut base = None;
    for line in lines.iter_mut() {
        base = generate_line(line, labels, base).map_err(|kind| kind.at(line.number, &line.text))?;
    }
    event!(Level::DEBUG, "pass 2: encoded {} lines", lines.len());
    Ok(())
}

/// Encode one line; returns the base register value for the next line.
fn generate_line(
    line: &mut SourceLine,
    labels: &LabelIndex,
    mut base: Option<u32>,
) -> std::result::Result<Option<u32>, ErrorKind> {
    let code = match &line.kind {
        LineKind::Instruction(inst) => Some(encode_instruction(
            *inst,
            &line.operands,
            line.location_after,
            labels,
            base,
        )?),
        LineKind::Storage(Storage::Word(value)) => {
            let [_, b0, b1, b2] = (*value as u32 & 0xFF_FFFF).to_be_bytes();
            Some(vec![b0, b1, b2])
        }
        LineKind::Storage(Storage::Bytes(bytes)) => Some(bytes.clone()),
        LineKind::Storage(Storage::ReserveWords(_) | Storage::ReserveBytes(_)) => None,
        LineKind::Directive(Directive::Base) => {
            let [operand] = line.operands.as_slice() else {
                return Err(ErrorKind::DirectiveArity {
                    directive: Directive::Base.name(),
                    expected: 1,
                });
            };
            let label = strip_modifier(operand);
            let value = labels
                .get(label)
                .ok_or_else(|| ErrorKind::LabelNotFound(label.to_string()))?;
            event!(Level::DEBUG, line = line.number, "base register set to {:06X}", value);
            base = Some(value);
            None
        }
        LineKind::Directive(Directive::NoBase) => {
            event!(Level::DEBUG, line = line.number, "base register disabled");
            base = None;
            None
        }
        LineKind::Directive(Directive::Start | Directive::End) => None,
    };

    if let Some(code) = &code {
        event!(
            Level::TRACE,
            line = line.number,
            "{:06X} {}",
            line.location,
            crate::parser::hex_string(code)
        );
    }
    line.code = code;
    Ok(base)
}

fn encode_instruction(
    inst: Instruction,
    operands: &[String],
    pc: u32,
    labels: &LabelIndex,
    base: Option<u32>,
) -> std::result::Result<Vec<u8>, ErrorKind> {
    let desc = inst.descriptor;

    // An indexed memory operand carries a trailing X that is not counted
    let mut count = operands.len();
    if desc.arity == Arity::One && is_indexed(operands) {
        count -= 1;
    }
    if count != desc.arity.count() {
        return Err(ErrorKind::InstructionArity {
            mnemonic: desc.name,
            expected: desc.arity.count(),
        });
    }

    let code = match desc.length {
        Length::One => Ok(vec![desc.opcode]),
        Length::Two => encode_registers(desc, operands),
        Length::ThreeOrFour => encode_memory(desc, inst.extended, operands, pc, labels, base),
    };
    code.map_err(|kind| ErrorKind::ObjectCode(Box::new(kind)))
}

fn register(operand: Option<&String>) -> std::result::Result<u8, ErrorKind> {
    let name = operand.map(String::as_str).unwrap_or_default();
    Register::parse(name)
        .map(Register::id)
        .ok_or_else(|| ErrorKind::InvalidRegister(name.to_string()))
}

fn encode_registers(desc: &Descriptor, operands: &[String]) -> std::result::Result<Vec<u8>, ErrorKind> {
    let r1 = register(operands.first())?;
    let r2 = match desc.arity {
        Arity::Two => register(operands.get(1))?,
        Arity::Zero | Arity::One => 0,
    };
    Ok(vec![desc.opcode, ((r1 & 0xF) << 4) | (r2 & 0xF)])
}

fn encode_memory(
    desc: &Descriptor,
    extended: bool,
    operands: &[String],
    pc: u32,
    labels: &LabelIndex,
    base: Option<u32>,
) -> std::result::Result<Vec<u8>, ErrorKind> {
    let operand = match desc.arity {
        Arity::Zero => None,
        Arity::One | Arity::Two => operands.first().map(String::as_str),
    };

    let mut flags = Flags {
        indirect: operand.is_some_and(is_indirect),
        immediate: operand.is_some_and(is_immediate),
        indexed: is_indexed(operands),
        extended,
        ..Flags::default()
    };

    let addressing = match operand {
        None => Addressing::Direct(0),
        Some(text) => {
            let bare = strip_modifier(text);
            if is_indirect(bare) || is_immediate(bare) {
                return Err(ErrorKind::ConflictingModifiers(text.to_string()));
            }
            resolve_target(bare, extended, pc, labels, base)?
        }
    };

    // Simple addressing is n=1, i=1
    if !flags.indirect && !flags.immediate {
        flags.indirect = true;
        flags.immediate = true;
    }

    if extended {
        return Ok(encode_format4(desc.opcode, flags, addressing.value()).to_vec());
    }
    flags.pc = matches!(addressing, Addressing::PcRelative(_));
    flags.base = matches!(addressing, Addressing::BaseRelative(_));
    Ok(encode_format3(desc.opcode, flags, addressing.value()).to_vec())
}

fn resolve_target(
    bare: &str,
    extended: bool,
    pc: u32,
    labels: &LabelIndex,
    base: Option<u32>,
) -> std::result::Result<Addressing, ErrorKind> {
    if let Ok(value) = bare.parse::<i32>() {
        if !constant_fits(value, extended) {
            event!(
                Level::WARN,
                "constant {} does not fit the {}-bit field and is truncated",
                value,
                if extended { 20 } else { 12 }
            );
        }
        return Ok(Addressing::Direct(value));
    }

    let target = labels
        .get(bare)
        .ok_or_else(|| ErrorKind::LabelNotFound(bare.to_string()))?;
    if !extended {
        return displacement(target, pc, base);
    }
    // A label one past the end of memory has no 20-bit address
    if target > MAX_ADDRESS {
        return Err(ErrorKind::AddressOverflow(u64::from(target)));
    }
    Ok(Addressing::Direct(target as i32))
}

/// Whether a numeric operand survives masking to the address field,
/// read either as unsigned or as two's complement.
fn constant_fits(value: i32, extended: bool) -> bool {
    let bits = if extended { 20 } else { 12 };
    (-(1 << (bits - 1))..(1 << bits)).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::locate;

    fn assemble_lines(source: &str) -> Vec<SourceLine> {
        let mut layout = locate(source.lines()).unwrap();
        generate(&mut layout.lines, &layout.labels).unwrap();
        layout.lines
    }

    fn codes(source: &str) -> Vec<String> {
        assemble_lines(source).iter().map(SourceLine::code_hex).collect()
    }

    fn generate_err(source: &str) -> ErrorKind {
        let mut layout = locate(source.lines()).unwrap();
        generate(&mut layout.lines, &layout.labels)
            .unwrap_err()
            .kind()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_encode_format3() {
        let flags = Flags {
            indirect: true,
            immediate: true,
            pc: true,
            ..Flags::default()
        };
        assert_eq!(encode_format3(0x14, flags, 0x02D), [0x17, 0x20, 0x2D]);
        // Negative displacement is kept as 12-bit two's complement
        assert_eq!(encode_format3(0x3C, flags, -3), [0x3F, 0x2F, 0xFD]);
    }

    #[test]
    fn test_encode_format4() {
        let flags = Flags {
            indirect: true,
            immediate: true,
            extended: true,
            ..Flags::default()
        };
        assert_eq!(encode_format4(0x48, flags, 0x1036), [0x4B, 0x10, 0x10, 0x36]);
        let flags = Flags {
            immediate: true,
            extended: true,
            ..Flags::default()
        };
        assert_eq!(encode_format4(0x74, flags, 4096), [0x75, 0x10, 0x10, 0x00]);
    }

    #[test]
    fn test_displacement_windows() {
        assert_eq!(displacement(0x1000 + 2047, 0x1000, None), Ok(Addressing::PcRelative(2047)));
        assert_eq!(displacement(0x1000 - 2048, 0x1000, None), Ok(Addressing::PcRelative(-2048)));
        assert_eq!(displacement(0x1000 + 2048, 0x1000, None), Err(ErrorKind::PcOutOfRange));
        assert_eq!(
            displacement(0x1000 + 2048, 0x1000, Some(0x1000)),
            Ok(Addressing::BaseRelative(2048))
        );
        assert_eq!(
            displacement(0x5000, 0x1000, Some(0x5000 - 4095)),
            Ok(Addressing::BaseRelative(4095))
        );
        assert_eq!(
            displacement(0x5000, 0x1000, Some(0x5000 - 4096)),
            Err(ErrorKind::DisplacementOutOfRange)
        );
        assert_eq!(
            displacement(0x0100, 0x1000, Some(0x0200)),
            Err(ErrorKind::DisplacementOutOfRange)
        );
    }

    #[test]
    fn test_copy_scenario() {
        let codes = codes("COPY START 1000\nFIRST LDA FIVE\nFIVE WORD 5\n END COPY");
        assert_eq!(codes, vec!["", "032000", "000005", ""]);
    }

    #[test]
    fn test_format1_and_format2() {
        let codes = codes(" FIX\n CLEAR X\n COMPR A,S\n TIXR T\n RMO %RA,LX\n SVC A");
        assert_eq!(codes, vec!["C4", "B410", "A004", "B850", "AC02", "B000"]);
    }

    #[test]
    fn test_addressing_modes() {
        let codes = codes(
            "P START 0\n LDA #3\n LDA @PTR\n LDA BUF,X\n LDA BUF[%RX]\n J @0\nPTR WORD 0\nBUF RESB 3",
        );
        assert_eq!(
            codes,
            vec!["", "010003", "022009", "03A009", "03A006", "3E0000", "000000", ""]
        );
    }

    #[test]
    fn test_immediate_label_is_pc_relative() {
        // LDB #LENGTH at 0, LENGTH at 6 -> disp 3
        let codes = codes(" LDB #LENGTH\n RSUB\nLENGTH WORD 0");
        assert_eq!(codes, vec!["692003", "4F0000", "000000"]);
    }

    #[test]
    fn test_backward_reference() {
        let codes = codes("LOOP TIX #10\n JLT LOOP");
        assert_eq!(codes, vec!["2D000A", "3B2FFA"]);
    }

    #[test]
    fn test_extended_uses_absolute_address() {
        let codes = codes("P START 1000\n +JSUB SUB\n +LDT #4096\nSUB RSUB");
        assert_eq!(codes, vec!["", "4B101008", "75101000", "4F0000"]);
    }

    #[test]
    fn test_base_relative() {
        let codes = codes(
            "P START 0\n BASE TARGET\n LDA TARGET\n RESB 2048\nTARGET WORD 1",
        );
        assert_eq!(codes[2], "034000");
    }

    #[test]
    fn test_nobase_disables_base() {
        let kind = generate_err(
            "P START 0\n BASE TARGET\n NOBASE\n LDA TARGET\n RESB 2048\nTARGET WORD 1",
        );
        assert_eq!(kind, ErrorKind::ObjectCode(Box::new(ErrorKind::PcOutOfRange)));
    }

    #[test]
    fn test_base_errors() {
        assert_eq!(
            generate_err(" BASE"),
            ErrorKind::DirectiveArity {
                directive: "BASE",
                expected: 1
            }
        );
        assert_eq!(
            generate_err(" BASE NOWHERE"),
            ErrorKind::LabelNotFound("NOWHERE".to_string())
        );
    }

    #[test]
    fn test_instruction_arity() {
        assert_eq!(
            generate_err(" RSUB X"),
            ErrorKind::InstructionArity {
                mnemonic: "RSUB",
                expected: 0
            }
        );
        assert_eq!(
            generate_err(" LDA"),
            ErrorKind::InstructionArity {
                mnemonic: "LDA",
                expected: 1
            }
        );
        assert_eq!(
            generate_err(" ADDR A"),
            ErrorKind::InstructionArity {
                mnemonic: "ADDR",
                expected: 2
            }
        );
        assert_eq!(
            generate_err(" LDA BUF,BUF\nBUF RESW 1"),
            ErrorKind::InstructionArity {
                mnemonic: "LDA",
                expected: 1
            }
        );
    }

    #[test]
    fn test_encoding_failures_are_wrapped() {
        assert_eq!(
            generate_err(" CLEAR Q"),
            ErrorKind::ObjectCode(Box::new(ErrorKind::InvalidRegister("Q".to_string())))
        );
        assert_eq!(
            generate_err(" J MISSING"),
            ErrorKind::ObjectCode(Box::new(ErrorKind::LabelNotFound("MISSING".to_string())))
        );
        assert_eq!(
            generate_err(" LDA @#5"),
            ErrorKind::ObjectCode(Box::new(ErrorKind::ConflictingModifiers("@#5".to_string())))
        );
    }

    #[test]
    fn test_extended_target_past_memory() {
        // TAIL sits at 0x100000, one past the last addressable byte
        let kind = generate_err("P START FFFF0\n +JSUB TAIL\n RESB 12\nTAIL RESB 0");
        assert_eq!(
            kind,
            ErrorKind::ObjectCode(Box::new(ErrorKind::AddressOverflow(0x10_0000)))
        );

        let codes = codes("P START FFFF0\n +JSUB LAST\n RESB 11\nLAST RESB 1");
        assert_eq!(codes[1], "4B1FFFFF");
    }

    #[test]
    fn test_constant_fits() {
        assert!(constant_fits(4095, false));
        assert!(constant_fits(-2048, false));
        assert!(!constant_fits(4096, false));
        assert!(!constant_fits(-2049, false));
        assert!(constant_fits(0xF_FFFF, true));
        assert!(!constant_fits(0x10_0000, true));
    }

    #[test]
    fn test_oversized_constant_is_masked() {
        // 5000 = 0x1388, only the low 12 bits reach the displacement
        let codes = codes(" LDA #5000\n +LDA #5000");
        assert_eq!(codes, vec!["010388", "01101388"]);
    }

    #[test]
    fn test_word_encoding() {
        let codes = codes("W1 WORD -1\nW2 WORD 4096\nW3 BYTE X'0A'");
        assert_eq!(codes, vec!["FFFFFF", "001000", "0A"]);
    }
}
