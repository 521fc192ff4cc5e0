//! SIC/XE Assembler CLI
//!
//! Assembles `.asm` sources into `.obj` object records and `.lst` listings.
//!
//! # Usage
//!
//! ```bash
//! sicxe-asm copy.asm
//! sicxe-asm -o build/ prog1.asm prog2.asm --no-listing
//! RUST_LOG=sicxe_assembler=trace sicxe-asm copy.asm
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use tracing::{Level, event};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use sicxe_assembler::{AsmError, OutputOptions, assemble_file};

#[derive(ClapParser, Debug)]
#[command(name = "sicxe-asm")]
#[command(version)]
#[command(about = "Two-pass SIC/XE assembler producing H/T/E object records")]
struct Args {
    /// Assembly source files
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory (defaults to each input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Do not write the .lst listing
    #[arg(long = "no-listing")]
    no_listing: bool,

    /// Log progress (RUST_LOG overrides this)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) -> Result<(), String> {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .map_err(|e| format!("failed to initialise tracing filter: {e}"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

/// Print an error the way compilers do: `path:line: error: message`
/// followed by the offending source line.
fn report(input: &std::path::Path, err: &AsmError) {
    match err {
        AsmError::Line { line, text, kind } => {
            eprintln!("{}:{}: error: {}", input.display(), line, kind);
            eprintln!("    {}", text);
        }
        other => eprintln!("{}: error: {}", input.display(), other),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(msg) = init_tracing(args.verbose) {
        eprintln!("Error: {msg}");
        return ExitCode::from(2);
    }

    let options = OutputOptions {
        listing: !args.no_listing,
        output_dir: args.output_dir,
    };

    let mut has_errors = false;
    for input in &args.inputs {
        match assemble_file(input, &options) {
            Ok(paths) => {
                event!(Level::DEBUG, listing = ?paths.listing, "wrote outputs");
                println!("{} -> {}", input.display(), paths.object.display());
            }
            Err(err) => {
                report(input, &err);
                has_errors = true;
            }
        }
    }

    if has_errors {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
