//! SIC/XE Assembler - two-pass assembler for the SIC/XE architecture.
//!
//! Translates SIC/XE assembly into H/T/E object records and a listing.
//! Supports:
//!
//! - Formats 1-4 with simple, immediate (`#`), indirect (`@`), indexed
//!   (`,X` or `NAME[X]`) and extended (`+`) addressing
//! - Automatic choice of PC-relative or base-relative displacement
//! - `START`, `END`, `BASE`, `NOBASE`, `WORD`, `RESW`, `RESB`, `BYTE`
//! - `MOV`, `LD` and `ST` pseudo-instructions
//!
//! # Usage
//!
//! ```
//! use sicxe_assembler::assemble_source;
//!
//! let asm = assemble_source("COPY START 1000\nFIRST LDA FIVE\nFIVE WORD 5\n END COPY")?;
//! assert_eq!(asm.header_record(), "HCOPY  001000001006");
//! # Ok::<(), sicxe_assembler::AsmError>(())
//! ```

pub mod catalog;
pub mod codegen;
pub mod error;
pub mod expand;
pub mod layout;
pub mod output;
pub mod parser;
pub mod symbols;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{Level, event};

pub use crate::error::{AsmError, ErrorCategory, ErrorKind, Result};
pub use crate::parser::{LineKind, SourceLine};
pub use crate::symbols::LabelIndex;

/// A fully assembled program.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub name: String,
    pub start: u32,
    /// Final location counter value, written as the length in the H record.
    pub length: u32,
    pub lines: Vec<SourceLine>,
    pub labels: LabelIndex,
}

impl Assembly {
    pub fn header_record(&self) -> String {
        output::header_record(&self.name, self.start, self.length)
    }

    pub fn text_records(&self) -> Vec<output::TextRecord> {
        output::pack_text(&self.lines)
    }

    pub fn end_record(&self) -> String {
        output::end_record(self.start)
    }

    /// The H, T... and E records, in order.
    pub fn object_records(&self) -> Vec<String> {
        let mut records = vec![self.header_record()];
        records.extend(self.text_records().iter().map(ToString::to_string));
        records.push(self.end_record());
        records
    }

    pub fn listing(&self) -> Vec<String> {
        output::listing(&self.lines)
    }

    /// Object records joined with trailing newlines.
    pub fn object_text(&self) -> String {
        join_lines(self.object_records())
    }

    pub fn listing_text(&self) -> String {
        join_lines(self.listing())
    }
}

fn join_lines(lines: Vec<String>) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Assemble a sequence of source lines.
pub fn assemble<I, S>(source: I) -> Result<Assembly>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    // Pass 1: sizes, locations and labels
    let mut layout = layout::locate(source)?;

    // Pass 2: object code, once every label is known
    codegen::generate(&mut layout.lines, &layout.labels)?;

    Ok(Assembly {
        name: layout.name,
        start: layout.start,
        length: layout.end,
        lines: layout.lines,
        labels: layout.labels,
    })
}

/// Assemble source text, stripping a trailing carriage return from each line.
pub fn assemble_source(source: &str) -> Result<Assembly> {
    assemble(source.lines().map(|line| line.strip_suffix('\r').unwrap_or(line)))
}

/// Output options for [`assemble_file`].
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Write the `.lst` listing alongside the object file.
    pub listing: bool,
    /// Directory for outputs (defaults to the input's directory).
    pub output_dir: Option<PathBuf>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            listing: true,
            output_dir: None,
        }
    }
}

/// Paths written by [`assemble_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub object: PathBuf,
    pub listing: PathBuf,
}

/// Derive output paths: `NAME.asm` becomes `NAME.obj` / `NAME.lst`, any
/// other name gets the extensions appended.
pub fn output_paths(input: &Path, output_dir: Option<&Path>) -> OutputPaths {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let stem = file_name.strip_suffix(".asm").unwrap_or(&file_name);

    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    OutputPaths {
        object: dir.join(format!("{}.obj", stem)),
        listing: dir.join(format!("{}.lst", stem)),
    }
}

/// Read, assemble and write one source file.
pub fn assemble_file(input: &Path, options: &OutputOptions) -> Result<OutputPaths> {
    let source = fs::read_to_string(input).map_err(|e| AsmError::io(input, e))?;
    let assembly = assemble_source(&source)?;

    let paths = output_paths(input, options.output_dir.as_deref());
    fs::write(&paths.object, assembly.object_text())
        .map_err(|e| AsmError::io(&paths.object, e))?;
    if options.listing {
        fs::write(&paths.listing, assembly.listing_text())
            .map_err(|e| AsmError::io(&paths.listing, e))?;
    }

    event!(
        Level::INFO,
        "assembled {} -> {}",
        input.display(),
        paths.object.display()
    );
    Ok(paths)
}
