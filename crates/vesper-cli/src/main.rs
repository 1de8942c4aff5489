//! Vesper CLI - Command-line driver for the Vesper compiler
//!
//! Runs the pipeline stage by stage (lex, parse, sema, codegen), printing
//! diagnostics as they are emitted. The process exits with 0 on success and
//! 1 when any error-severity diagnostic was produced or on I/O failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};

use vesper_core::ast::print_module;
use vesper_core::codegen::{CodeGen, CodeGenOptions, OutputFormat};
use vesper_core::diagnostics::DiagnosticEngine;
use vesper_core::lexer::Lexer;
use vesper_core::parser::Parser;
use vesper_core::sema::Sema;
use vesper_core::source::SourceMap;

#[derive(ClapParser)]
#[command(name = "vesper")]
#[command(version = vesper_core::VERSION)]
#[command(about = "The Vesper programming language", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a Vesper source file
    Compile(CompileArgs),
}

#[derive(clap::Args)]
struct CompileArgs {
    /// Path to the source file
    input: PathBuf,

    /// Output file path (derived from the input name when omitted)
    #[arg(short = 'o')]
    output: Option<PathBuf>,

    /// Output format: ir, obj, exe
    #[arg(long, default_value = "exe")]
    emit: String,

    /// Optimization level (0-3)
    #[arg(short = 'O', default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    opt_level: u8,

    /// Target triple (defaults to the host)
    #[arg(long)]
    target: Option<String>,

    /// Print the token stream to stdout
    #[arg(long)]
    dump_tokens: bool,

    /// Print an AST summary to stdout
    #[arg(long)]
    dump_ast: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Compile(args) => compile(&args),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run the full pipeline. `Ok(false)` means diagnostics were produced and the
/// driver should exit nonzero.
fn compile(args: &CompileArgs) -> Result<bool> {
    let format = OutputFormat::parse(&args.emit).map_err(|e| anyhow::anyhow!("{e}"))?;

    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not open file '{}'", args.input.display()))?;
    let filename = args.input.display().to_string();

    let mut diag = DiagnosticEngine::new();
    let mut source_map = SourceMap::new();
    let file = source_map.load_from_string(filename.clone(), source);
    let text = source_map
        .source(file)
        .expect("the file was just loaded")
        .to_string();

    // === Phase 1: lexical analysis ===
    if args.dump_tokens {
        let mut lexer = Lexer::new(&text, &filename);
        for token in lexer.lex_all(&mut diag) {
            println!(
                "{} '{}' @ {}:{}",
                token.kind, token.text, token.line, token.column
            );
        }
        if diag.has_errors() {
            return Ok(finish(&diag));
        }
    }

    // === Phase 2: parsing ===
    let module = Parser::from_source(&text, &filename, &mut diag).parse_module();
    if diag.has_errors() {
        return Ok(finish(&diag));
    }

    if args.dump_ast {
        print!("{}", print_module(&module));
    }

    // === Phase 3: semantic analysis ===
    Sema::new(&mut diag, &source_map, file).analyze(&module);
    if diag.has_errors() {
        return Ok(finish(&diag));
    }

    // === Phase 4: code generation ===
    let module_name = args
        .input
        .file_stem()
        .map_or_else(|| "module".to_string(), |s| s.to_string_lossy().into_owned());

    let opts = CodeGenOptions {
        target: args.target.clone(),
        opt_level: args.opt_level,
        format,
    };

    let mut codegen = CodeGen::new(&mut diag, &source_map, file, &module_name, opts)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    codegen
        .generate(&module)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if codegen.has_errors() {
        return Ok(finish(&diag));
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| derive_output_name(&args.input, format));
    codegen
        .write_output(&output)
        .with_context(|| format!("cannot write output to '{}'", output.display()))?;

    println!("Output written to {}", output.display());
    Ok(finish(&diag))
}

/// Print the closing error-count line; returns whether the run succeeded
fn finish(diag: &DiagnosticEngine) -> bool {
    if diag.error_count() > 0 {
        eprintln!("{} error(s) generated.", diag.error_count());
        return false;
    }
    true
}

fn derive_output_name(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "out".to_string(), |s| s.to_string_lossy().into_owned());
    match format {
        OutputFormat::Executable => PathBuf::from(stem),
        other => PathBuf::from(format!("{stem}.{}", other.extension())),
    }
}
