//! Rewriting of `MOV`, `LD` and `ST` into canonical SIC/XE instructions.
//!
//! - `MOV r1,r2` / `LD r1,r2` / `ST r1,r2` become `RMO r2,r1`
//! - `MOV r,m` / `LD r,m` become `LDr m`
//! - `MOV m,r` / `ST m,r` become `STr m`

use crate::catalog::{self, Descriptor, PseudoOp, Register};
use crate::error::ErrorKind;

/// A pseudo-instruction after rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub descriptor: &'static Descriptor,
    pub operands: Vec<String>,
}

/// Rewrite a pseudo-instruction into one catalog instruction.
///
/// The extended flag is not touched here; the caller keeps the one written
/// on the pseudo-op and applies it to the result.
pub fn expand(pseudo: PseudoOp, operands: &[String]) -> Result<Expansion, ErrorKind> {
    let conversion = |reason: String| ErrorKind::Conversion {
        pseudo: pseudo.name(),
        reason,
    };

    let [first, second] = operands else {
        return Err(ErrorKind::InstructionArity {
            mnemonic: pseudo.name(),
            expected: 2,
        });
    };

    match (Register::parse(first), Register::parse(second)) {
        // Register to register: RMO copies its first operand into the second
        (Some(_), Some(_)) => Ok(Expansion {
            descriptor: synthesize(pseudo, "RMO")?,
            operands: vec![second.clone(), first.clone()],
        }),
        (Some(dst), None) if pseudo != PseudoOp::St => load_or_store(pseudo, "LD", dst, second),
        (None, Some(src)) if pseudo != PseudoOp::Ld => load_or_store(pseudo, "ST", src, first),
        (_, _) => Err(conversion(match pseudo {
            PseudoOp::Mov => format!("neither {} nor {} is a register", first, second),
            PseudoOp::Ld => format!("first parameter {} is not a register", first),
            PseudoOp::St => format!("second parameter {} is not a register", second),
        })),
    }
}

fn load_or_store(
    pseudo: PseudoOp,
    prefix: &str,
    register: Register,
    memory: &str,
) -> Result<Expansion, ErrorKind> {
    let name = format!("{}{}", prefix, register.name());
    Ok(Expansion {
        descriptor: synthesize(pseudo, &name)?,
        operands: vec![memory.to_string()],
    })
}

fn synthesize(pseudo: PseudoOp, name: &str) -> Result<&'static Descriptor, ErrorKind> {
    catalog::lookup(name).ok_or_else(|| ErrorKind::Conversion {
        pseudo: pseudo.name(),
        reason: format!("{} is invalid", name),
    })
}
