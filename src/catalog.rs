//! SIC/XE instruction catalog, directive keywords and register names.
//!
//! The assembler only needs each instruction's opcode, encoded length and
//! operand count; everything else about the machine is irrelevant here.

use phf::phf_map;

/// Encoded size class of a machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    One,
    Two,
    /// Three bytes, or four when written with a `+` prefix.
    ThreeOrFour,
}

/// Number of operands an instruction takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Zero,
    One,
    Two,
}

impl Arity {
    #[inline]
    pub fn count(self) -> usize {
        match self {
            Arity::Zero => 0,
            Arity::One => 1,
            Arity::Two => 2,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub name: &'static str,
    pub opcode: u8,
    pub length: Length,
    pub arity: Arity,
}

impl Descriptor {
    /// Encoded size in bytes.
    pub fn size(&self, extended: bool) -> u32 {
        match self.length {
            Length::One => 1,
            Length::Two => 2,
            Length::ThreeOrFour if extended => 4,
            Length::ThreeOrFour => 3,
        }
    }
}

macro_rules! op {
    ($name:literal, $opcode:literal, $length:ident, $arity:ident) => {
        Descriptor {
            name: $name,
            opcode: $opcode,
            length: Length::$length,
            arity: Arity::$arity,
        }
    };
}

/// Every SIC/XE machine instruction (compile-time perfect hash map)
pub static CATALOG: phf::Map<&'static str, Descriptor> = phf_map! {
    "ADD"    => op!("ADD",    0x18, ThreeOrFour, One),
    "ADDF"   => op!("ADDF",   0x58, ThreeOrFour, One),
    "ADDR"   => op!("ADDR",   0x90, Two,         Two),
    "AND"    => op!("AND",    0x40, ThreeOrFour, One),
    "CLEAR"  => op!("CLEAR",  0xB4, Two,         One),
    "COMP"   => op!("COMP",   0x28, ThreeOrFour, One),
    "COMPF"  => op!("COMPF",  0x88, ThreeOrFour, One),
    "COMPR"  => op!("COMPR",  0xA0, Two,         Two),
    "DIV"    => op!("DIV",    0x24, ThreeOrFour, One),
    "DIVF"   => op!("DIVF",   0x64, ThreeOrFour, One),
    "DIVR"   => op!("DIVR",   0x9C, Two,         Two),
    "FIX"    => op!("FIX",    0xC4, One,         Zero),
    "FLOAT"  => op!("FLOAT",  0xC0, One,         Zero),
    "HIO"    => op!("HIO",    0xF4, One,         Zero),
    "J"      => op!("J",      0x3C, ThreeOrFour, One),
    "JEQ"    => op!("JEQ",    0x30, ThreeOrFour, One),
    "JGT"    => op!("JGT",    0x34, ThreeOrFour, One),
    "JLT"    => op!("JLT",    0x38, ThreeOrFour, One),
    "JSUB"   => op!("JSUB",   0x48, ThreeOrFour, One),
    "LDA"    => op!("LDA",    0x00, ThreeOrFour, One),
    "LDB"    => op!("LDB",    0x68, ThreeOrFour, One),
    "LDCH"   => op!("LDCH",   0x50, ThreeOrFour, One),
    "LDF"    => op!("LDF",    0x70, ThreeOrFour, One),
    "LDL"    => op!("LDL",    0x08, ThreeOrFour, One),
    "LDS"    => op!("LDS",    0x6C, ThreeOrFour, One),
    "LDT"    => op!("LDT",    0x74, ThreeOrFour, One),
    "LDX"    => op!("LDX",    0x04, ThreeOrFour, One),
    "LPS"    => op!("LPS",    0xD0, ThreeOrFour, One),
    "MUL"    => op!("MUL",    0x20, ThreeOrFour, One),
    "MULF"   => op!("MULF",   0x60, ThreeOrFour, One),
    "MULR"   => op!("MULR",   0x98, Two,         Two),
    "NORM"   => op!("NORM",   0xC8, One,         Zero),
    "OR"     => op!("OR",     0x44, ThreeOrFour, One),
    "RD"     => op!("RD",     0xD8, ThreeOrFour, One),
    "RMO"    => op!("RMO",    0xAC, Two,         Two),
    "RSUB"   => op!("RSUB",   0x4C, ThreeOrFour, Zero),
    "SHIFTL" => op!("SHIFTL", 0xA4, Two,         Two),
    "SHIFTR" => op!("SHIFTR", 0xA8, Two,         Two),
    "SIO"    => op!("SIO",    0xF0, One,         Zero),
    "SSK"    => op!("SSK",    0xEC, ThreeOrFour, One),
    "STA"    => op!("STA",    0x0C, ThreeOrFour, One),
    "STB"    => op!("STB",    0x78, ThreeOrFour, One),
    "STCH"   => op!("STCH",   0x54, ThreeOrFour, One),
    "STF"    => op!("STF",    0x80, ThreeOrFour, One),
    "STI"    => op!("STI",    0xD4, ThreeOrFour, One),
    "STL"    => op!("STL",    0x14, ThreeOrFour, One),
    "STS"    => op!("STS",    0x7C, ThreeOrFour, One),
    "STSW"   => op!("STSW",   0xE8, ThreeOrFour, One),
    "STT"    => op!("STT",    0x84, ThreeOrFour, One),
    "STX"    => op!("STX",    0x10, ThreeOrFour, One),
    "SUB"    => op!("SUB",    0x1C, ThreeOrFour, One),
    "SUBF"   => op!("SUBF",   0x5C, ThreeOrFour, One),
    "SUBR"   => op!("SUBR",   0x94, Two,         Two),
    "SVC"    => op!("SVC",    0xB0, Two,         One),
    "TD"     => op!("TD",     0xE0, ThreeOrFour, One),
    "TIO"    => op!("TIO",    0xF8, One,         Zero),
    "TIX"    => op!("TIX",    0x2C, ThreeOrFour, One),
    "TIXR"   => op!("TIXR",   0xB8, Two,         One),
    "WD"     => op!("WD",     0xDC, ThreeOrFour, One),
};

/// Assembler directives that never occupy space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Start,
    End,
    Base,
    NoBase,
}

/// Directives that define or reserve storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDirective {
    Word,
    Resw,
    Resb,
    Byte,
}

/// Convenience mnemonics rewritten into a single catalog instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoOp {
    Mov,
    Ld,
    St,
}

impl Directive {
    pub fn name(self) -> &'static str {
        match self {
            Directive::Start => "START",
            Directive::End => "END",
            Directive::Base => "BASE",
            Directive::NoBase => "NOBASE",
        }
    }
}

impl StorageDirective {
    pub fn name(self) -> &'static str {
        match self {
            StorageDirective::Word => "WORD",
            StorageDirective::Resw => "RESW",
            StorageDirective::Resb => "RESB",
            StorageDirective::Byte => "BYTE",
        }
    }
}

impl PseudoOp {
    pub fn name(self) -> &'static str {
        match self {
            PseudoOp::Mov => "MOV",
            PseudoOp::Ld => "LD",
            PseudoOp::St => "ST",
        }
    }
}

/// A recognized mnemonic token, with any `+` prefix already removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Directive(Directive),
    Storage(StorageDirective),
    Pseudo(PseudoOp),
    Machine(&'static Descriptor),
}

impl Mnemonic {
    /// Classify a mnemonic token, returning it together with its extended flag.
    ///
    /// Directives are matched literally; only machine instructions and
    /// pseudo-instructions accept the `+` prefix.
    pub fn parse(token: &str) -> Option<(Mnemonic, bool)> {
        let directive = match token {
            "START" => Some(Mnemonic::Directive(Directive::Start)),
            "END" => Some(Mnemonic::Directive(Directive::End)),
            "BASE" => Some(Mnemonic::Directive(Directive::Base)),
            "NOBASE" => Some(Mnemonic::Directive(Directive::NoBase)),
            "WORD" => Some(Mnemonic::Storage(StorageDirective::Word)),
            "RESW" => Some(Mnemonic::Storage(StorageDirective::Resw)),
            "RESB" => Some(Mnemonic::Storage(StorageDirective::Resb)),
            "BYTE" => Some(Mnemonic::Storage(StorageDirective::Byte)),
            _ => None,
        };
        if let Some(mnemonic) = directive {
            return Some((mnemonic, false));
        }

        let extended = is_extended(token);
        let bare = strip_extended(token);
        let mnemonic = match bare {
            "MOV" => Mnemonic::Pseudo(PseudoOp::Mov),
            "LD" => Mnemonic::Pseudo(PseudoOp::Ld),
            "ST" => Mnemonic::Pseudo(PseudoOp::St),
            _ => Mnemonic::Machine(lookup(bare)?),
        };
        Some((mnemonic, extended))
    }
}

/// Look up a machine instruction, ignoring a leading `+`.
pub fn lookup(mnemonic: &str) -> Option<&'static Descriptor> {
    CATALOG.get(strip_extended(mnemonic))
}

pub fn is_known_mnemonic(token: &str) -> bool {
    Mnemonic::parse(token).is_some()
}

pub fn is_directive(token: &str) -> bool {
    matches!(Mnemonic::parse(token), Some((Mnemonic::Directive(_), _)))
}

pub fn is_storage_directive(token: &str) -> bool {
    matches!(Mnemonic::parse(token), Some((Mnemonic::Storage(_), _)))
}

pub fn is_pseudo_op(token: &str) -> bool {
    matches!(Mnemonic::parse(token), Some((Mnemonic::Pseudo(_), _)))
}

#[inline]
pub fn is_extended(mnemonic: &str) -> bool {
    mnemonic.starts_with('+')
}

#[inline]
pub fn is_indirect(operand: &str) -> bool {
    operand.starts_with('@')
}

#[inline]
pub fn is_immediate(operand: &str) -> bool {
    operand.starts_with('#')
}

/// True when the second operand names the index register (`LDA BUF,X`).
pub fn is_indexed<S: AsRef<str>>(operands: &[S]) -> bool {
    operands
        .get(1)
        .is_some_and(|op| Register::parse(op.as_ref()) == Some(Register::X))
}

fn strip_extended(mnemonic: &str) -> &str {
    mnemonic.strip_prefix('+').unwrap_or(mnemonic)
}

/// Remove a single `@` or `#` addressing prefix from an operand.
pub fn strip_modifier(operand: &str) -> &str {
    operand
        .strip_prefix('@')
        .or_else(|| operand.strip_prefix('#'))
        .unwrap_or(operand)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    A = 0,
    X = 1,
    L = 2,
    B = 3,
    S = 4,
    T = 5,
    F = 6,
    PC = 8,
    SW = 9,
}

/// Accepted register spellings: `%RA`, `AX` and `A` all name accumulator A.
static REGISTERS: phf::Map<&'static str, Register> = phf_map! {
    "%RA" => Register::A, "AX" => Register::A, "A" => Register::A,
    "%RX" => Register::X, "XX" => Register::X, "X" => Register::X,
    "%RL" => Register::L, "LX" => Register::L, "L" => Register::L,
    "%RB" => Register::B, "BX" => Register::B, "B" => Register::B,
    "%RS" => Register::S, "SX" => Register::S, "S" => Register::S,
    "%RT" => Register::T, "TX" => Register::T, "T" => Register::T,
    "%RF" => Register::F, "FX" => Register::F, "F" => Register::F,
    "%RPC" => Register::PC, "PCX" => Register::PC, "PC" => Register::PC,
    "%RSW" => Register::SW, "SWX" => Register::SW, "SW" => Register::SW,
};

impl Register {
    pub fn parse(name: &str) -> Option<Register> {
        REGISTERS.get(name).copied()
    }

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Canonical name, as used to build `LD<reg>` / `ST<reg>` mnemonics.
    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::X => "X",
            Register::L => "L",
            Register::B => "B",
            Register::S => "S",
            Register::T => "T",
            Register::F => "F",
            Register::PC => "PC",
            Register::SW => "SW",
        }
    }
}
