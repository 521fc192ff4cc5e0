use pretty_assertions::assert_eq;
use sicxe_assembler::{
    AsmError, ErrorCategory, ErrorKind, OutputOptions, assemble_file, assemble_source,
};
use std::fs;
use std::path::Path;

fn fixture(name: &str, ext: &str) -> String {
    let path = format!("tests/{}.{}", name, ext);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read {}", path))
}

fn test_file(name: &str) {
    let source = fixture(name, "asm");
    let result =
        assemble_source(&source).unwrap_or_else(|e| panic!("Failed to assemble {}: {}", name, e));

    assert_eq!(result.object_text(), fixture(name, "obj"), "Object mismatch for {}", name);
    assert_eq!(result.listing_text(), fixture(name, "lst"), "Listing mismatch for {}", name);
}

fn error_kind(source: &str) -> ErrorKind {
    assemble_source(source)
        .unwrap_err()
        .kind()
        .cloned()
        .unwrap_or_else(|| panic!("expected a line error for {:?}", source))
}

/// Program with one `LDA TARGET` at 0 and `gap` reserved bytes before TARGET.
fn gap_program(gap: u32, base: bool) -> String {
    let base = if base { " BASE TARGET\n" } else { "" };
    format!("P START 0\n{} LDA TARGET\n RESB {}\nTARGET WORD 7\n END P", base, gap)
}

#[test]
fn test_sum() {
    test_file("sum");
}

#[test]
fn test_copy_records() {
    let asm = assemble_source("COPY START 1000\nFIRST LDA FIVE\nFIVE WORD 5\n END COPY").unwrap();
    assert_eq!(asm.header_record(), "HCOPY  001000001006");
    assert_eq!(asm.text_records()[0].to_string(), "T00100006032000000005");
    assert_eq!(asm.end_record(), "E001000");
    assert_eq!(asm.labels.get("FIVE"), Some(0x1003));
}

#[test]
fn test_pc_relative_upper_bound() {
    // LDA ends at 3, so TARGET at 3 + 2047 is the furthest PC-relative reach
    let asm = assemble_source(&gap_program(2047, false)).unwrap();
    assert_eq!(asm.lines[1].code_hex(), "0327FF");
}

#[test]
fn test_pc_relative_overflow_without_base() {
    let err = assemble_source(&gap_program(2048, false)).unwrap_err();
    assert_eq!(err.line(), Some(2));
    let kind = err.kind().unwrap();
    assert_eq!(kind.category(), ErrorCategory::Range);
    assert_eq!(kind, &ErrorKind::ObjectCode(Box::new(ErrorKind::PcOutOfRange)));
}

#[test]
fn test_base_relative_fallback() {
    // BASE at TARGET gives displacement 0 with b=1
    let asm = assemble_source(&gap_program(2048, true)).unwrap();
    assert_eq!(asm.lines[2].code_hex(), "034000");
    assert_eq!(asm.length, 3 + 2048 + 3);
}

#[test]
fn test_pseudo_instructions() {
    let asm = assemble_source(
        "P START 0\n MOV A,S\n MOV T,#3\n MOV BUF,X\n LD A,BUF\n ST BUF,L\nBUF RESW 1",
    )
    .unwrap();
    let codes: Vec<String> = asm.lines.iter().map(|l| l.code_hex()).collect();
    // RMO S,A / LDT #3 / STX BUF / LDA BUF / STL BUF
    assert_eq!(codes, vec!["", "AC40", "750003", "132006", "032003", "172000", ""]);
}

#[test]
fn test_ld_rejects_memory_destination() {
    let kind = error_kind(" LD BUFFER,A\nBUFFER RESW 1");
    assert_eq!(kind.category(), ErrorCategory::Conversion);
    assert_eq!(
        kind.to_string(),
        "failed to convert LD statement: first parameter BUFFER is not a register"
    );
}

#[test]
fn test_extended_program() {
    let asm = assemble_source(
        "BIG START 0\n +JSUB FAR\n RSUB\n RESB 4096\nFAR +LDA #1000000\n RSUB\n END BIG",
    )
    .unwrap();
    let records = asm.object_records();
    assert_eq!(
        records,
        vec![
            "HBIG   00000000100E",
            "T000000074B1010074F0000",
            "T00100707011F42404F0000",
            "E000000",
        ]
    );
}

#[test]
fn test_listing_past_64k_stays_aligned() {
    let asm = assemble_source("P START FFF0\n RESB 100\n LDA #1\n END P").unwrap();
    assert_eq!(
        asm.listing(),
        vec![
            "0FFF0    P START FFF0",
            "0FFF0     RESB 100",
            "10054     LDA #1         010001",
            "          END P",
        ]
    );
}

#[test]
fn test_extended_reference_past_memory_rejected() {
    let err = assemble_source("P START FFFFA\n +JSUB FAR\n RESB 10\nFAR RSUB").unwrap_err();
    assert_eq!(err.line(), Some(3));
    assert_eq!(err.kind().map(ErrorKind::category), Some(ErrorCategory::Range));
}

#[test]
fn test_errors_report_line() {
    let err = assemble_source("P START 0\n\n LDA\n END P").unwrap_err();
    assert_eq!(err.line(), Some(3));
    assert_eq!(err.source_text(), Some(" LDA"));
    assert_eq!(err.to_string(), "line 3: LDA accepts 1 argument(s)");
}

#[test]
fn test_undefined_label() {
    let kind = error_kind(" J NOWHERE");
    assert_eq!(kind.category(), ErrorCategory::Reference);
}

#[test]
fn test_empty_file() {
    assert!(matches!(assemble_source(""), Err(AsmError::EmptyFile)));
    assert!(matches!(
        assemble_source(". comment only\n\n\t\n"),
        Err(AsmError::EmptyFile)
    ));
}

#[test]
fn test_assemble_file_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sum.asm");
    fs::write(&input, fixture("sum", "asm")).unwrap();

    let paths = assemble_file(&input, &OutputOptions::default()).unwrap();
    assert_eq!(paths.object, dir.path().join("sum.obj"));
    assert_eq!(fs::read_to_string(&paths.object).unwrap(), fixture("sum", "obj"));
    assert_eq!(fs::read_to_string(&paths.listing).unwrap(), fixture("sum", "lst"));
}

#[test]
fn test_assemble_file_output_dir_without_listing() {
    let src_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let input = src_dir.path().join("copy.s");
    fs::write(&input, "COPY START 1000\nFIRST LDA FIVE\nFIVE WORD 5\n END COPY\n").unwrap();

    let options = OutputOptions {
        listing: false,
        output_dir: Some(out_dir.path().to_path_buf()),
    };
    let paths = assemble_file(&input, &options).unwrap();
    assert_eq!(paths.object, out_dir.path().join("copy.s.obj"));
    assert_eq!(
        fs::read_to_string(&paths.object).unwrap(),
        "HCOPY  001000001006\nT00100006032000000005\nE001000\n"
    );
    assert!(!paths.listing.exists());
}

#[test]
fn test_assemble_file_missing_input() {
    let err = assemble_file(Path::new("tests/no-such-file.asm"), &OutputOptions::default())
        .unwrap_err();
    assert!(matches!(err, AsmError::Io { .. }));
    assert_eq!(err.line(), None);
}

#[test]
fn test_failed_assembly_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.asm");
    fs::write(&input, " J MISSING\n").unwrap();

    assert!(assemble_file(&input, &OutputOptions::default()).is_err());
    assert!(!dir.path().join("bad.obj").exists());
    assert!(!dir.path().join("bad.lst").exists());
}
