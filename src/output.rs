//! Object record and listing emission.
//!
//! Object records use the classic fixed-column layout:
//!
//! ```text
//! H NAME__ SSSSSS LLLLLL      name, start address, final location
//! T AAAAAA NN CC..CC          address, byte count, up to 30 code bytes
//! E SSSSSS                    start address
//! ```

use std::fmt;

use crate::parser::{SourceLine, hex_string};

/// Most code bytes a single text record carries (60 hex digits).
pub const MAX_TEXT_BYTES: usize = 30;

/// Fewest hex digits in the listing's location column.
const MIN_LOCATION_DIGITS: usize = 4;
/// Spaces between listing columns.
const COLUMN_GAP: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub address: u32,
    pub bytes: Vec<u8>,
}

impl fmt::Display for TextRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T{:06X}{:02X}{}",
            self.address,
            self.bytes.len(),
            hex_string(&self.bytes)
        )
    }
}

pub fn header_record(name: &str, start: u32, length: u32) -> String {
    let name: String = name.chars().take(6).collect();
    format!("H{:<6}{:06X}{:06X}", name, start, length)
}

pub fn end_record(start: u32) -> String {
    format!("E{:06X}", start)
}

/// Pack consecutive lines' object code into text records.
///
/// Lines without code are skipped without breaking the current record. A
/// record starts at the location of the first line that contributes to it.
pub fn pack_text(lines: &[SourceLine]) -> Vec<TextRecord> {
    let mut records = Vec::new();
    let mut current: Option<TextRecord> = None;

    for line in lines {
        let Some(code) = line.code.as_deref() else {
            continue;
        };

        let mut address = line.location;
        for chunk in code.chunks(MAX_TEXT_BYTES) {
            if current
                .as_ref()
                .is_some_and(|rec| rec.bytes.len() + chunk.len() > MAX_TEXT_BYTES)
            {
                records.extend(current.take());
            }
            current
                .get_or_insert_with(|| TextRecord {
                    address,
                    bytes: Vec::with_capacity(MAX_TEXT_BYTES),
                })
                .bytes
                .extend_from_slice(chunk);
            address += chunk.len() as u32;
        }
    }

    records.extend(current);
    records
}

/// Build the listing: location, original text, then object code aligned
/// after the longest source line.
///
/// Locations are zero-padded to the widest one in the program, four digits
/// at least, so the columns stay aligned past `FFFF`.
pub fn listing(lines: &[SourceLine]) -> Vec<String> {
    let width = lines
        .iter()
        .map(|line| line.text.chars().count())
        .max()
        .unwrap_or(0);
    let digits = lines
        .iter()
        .filter(|line| line.has_location())
        .map(|line| format!("{:X}", line.location).len())
        .max()
        .unwrap_or(0)
        .max(MIN_LOCATION_DIGITS);

    lines
        .iter()
        .map(|line| {
            let mut row = String::with_capacity(digits + COLUMN_GAP + width + 16);
            if line.has_location() {
                row.push_str(&format!("{:0digits$X}", line.location));
                row.push_str(&" ".repeat(COLUMN_GAP));
            } else {
                row.push_str(&" ".repeat(digits + COLUMN_GAP));
            }
            row.push_str(&line.text);

            let code = line.code_hex();
            if !code.is_empty() {
                let pad = width - line.text.chars().count();
                row.push_str(&" ".repeat(pad + COLUMN_GAP));
                row.push_str(&code);
            }
            row
        })
        .collect()
}
