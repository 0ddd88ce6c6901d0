//! Pascal compiler library
//!
//! Provides the full pipeline from source text to either direct
//! execution (tree-free IR interpretation) or a 32-bit x86 NASM listing
//! handed to an external assembler and linker:
//!
//! source -> lexer -> parser -> semantic analysis -> IR -> optimizer
//!        -> { interpreter, NASM backend }
//!
//! Each stage is all-or-nothing; the first diagnostic aborts the
//! pipeline with a positioned [`CompileError`]. The interpretation path
//! and the toolchain path are independent: `compile_file` runs both and
//! reports each outcome.

pub mod ast;
pub mod config;
pub mod irgen;
pub mod lexer;
pub mod nasm;
pub mod optimizer;
pub mod parser;
pub mod semantic;
pub mod symbols;
pub mod token;
pub mod toolchain;

pub use config::{CompilerConfig, ToolchainConfig};
pub use lexer::{LexError, Lexer};
pub use nasm::{CodegenError, generate_nasm};
pub use parser::{ParseError, Parser, tokenize};
pub use semantic::{Analysis, SemanticError, analyze};
pub use token::{Token, TokenKind};

use pas_core::Instr;
use pas_interp::{FileSink, InputProvider, Interpreter, OutputSink, RuntimeError, StdinInput};
use std::fs;
use std::path::Path;

/// Any failure the pipeline can produce, by stage.
#[derive(Debug)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Semantic(SemanticError),
    Codegen(CodegenError),
    Runtime(RuntimeError),
    Toolchain(String),
    Io(std::io::Error),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "{}", e),
            CompileError::Parse(e) => write!(f, "{}", e),
            CompileError::Semantic(e) => write!(f, "{}", e),
            CompileError::Codegen(e) => write!(f, "Code generation error: {}", e),
            CompileError::Runtime(e) => write!(f, "Runtime error: {}", e),
            CompileError::Toolchain(message) => write!(f, "Toolchain error: {}", message),
            CompileError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError::Lex(e)
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<SemanticError> for CompileError {
    fn from(e: SemanticError) -> Self {
        CompileError::Semantic(e)
    }
}

impl From<CodegenError> for CompileError {
    fn from(e: CodegenError) -> Self {
        CompileError::Codegen(e)
    }
}

impl From<RuntimeError> for CompileError {
    fn from(e: RuntimeError) -> Self {
        CompileError::Runtime(e)
    }
}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e)
    }
}

/// Run the front end and the optimizer, producing finalized IR.
pub fn compile_to_ir(source: &str, config: &CompilerConfig) -> Result<Vec<Instr>, CompileError> {
    tracing::debug!("lexing");
    let tokens = tokenize(source)?;

    tracing::debug!("parsing");
    let program = Parser::new(tokens).parse()?;

    tracing::debug!("semantic analysis");
    analyze(&program)?;

    tracing::debug!("IR generation");
    let ir = irgen::generate(&program);
    tracing::trace!("raw IR:\n{}", pas_core::render_listing(&ir));

    if !config.optimize {
        return Ok(ir);
    }
    tracing::debug!("optimization");
    let optimized = optimizer::optimize_with_limit(ir, config.max_opt_passes);
    tracing::trace!("optimized IR:\n{}", pas_core::render_listing(&optimized));
    Ok(optimized)
}

/// Parse only; used by the `ast` dump command.
pub fn parse_program(source: &str) -> Result<ast::Program, CompileError> {
    let tokens = tokenize(source)?;
    Ok(Parser::new(tokens).parse()?)
}

/// Execute finalized IR against the given I/O providers. On a runtime
/// error the machine state is logged before the error is returned; the
/// sink is flushed on every path.
pub fn run_ir(
    ir: &[Instr],
    output: &mut dyn OutputSink,
    input: &mut dyn InputProvider,
) -> Result<(), RuntimeError> {
    let mut interpreter = Interpreter::new(ir)?;
    match interpreter.run(output, input) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("runtime error: {}\n{}", e, interpreter.dump_state());
            Err(e)
        }
    }
}

/// Compile a source string all the way to a NASM listing.
pub fn compile_to_asm(source: &str, config: &CompilerConfig) -> Result<String, CompileError> {
    let ir = compile_to_ir(source, config)?;
    Ok(generate_nasm(&ir)?)
}

/// The `compile` contract: interpret with `WRITE` output redirected to a
/// file, and, when an executable path is given, also emit assembly and
/// invoke the external toolchain. The two paths succeed or fail
/// independently; the first failure (interpretation taking precedence)
/// is returned after both have been attempted and reported.
pub fn compile_file(
    source_path: &Path,
    write_output: &Path,
    exe_output: Option<&Path>,
    config: &CompilerConfig,
) -> Result<(), CompileError> {
    let source = fs::read_to_string(source_path)?;
    let ir = compile_to_ir(&source, config)?;

    tracing::info!(
        "interpreting; WRITE output redirected to {}",
        write_output.display()
    );
    let interp_result = {
        let mut sink = FileSink::create(write_output)?;
        let mut input = StdinInput;
        run_ir(&ir, &mut sink, &mut input)
        // sink dropped here: flushed and closed whatever happened
    };
    match &interp_result {
        Ok(()) => tracing::info!("interpretation finished"),
        Err(e) => tracing::error!("interpretation failed: {}", e),
    }

    let mut build_result: Result<(), CompileError> = Ok(());
    if let Some(exe_path) = exe_output {
        tracing::info!("generating assembly for {}", exe_path.display());
        build_result = generate_nasm(&ir)
            .map_err(CompileError::from)
            .and_then(|asm| {
                toolchain::assemble_and_link(&asm, exe_path, &config.toolchain)
                    .map_err(CompileError::Toolchain)
            });
        match &build_result {
            Ok(()) => tracing::info!("executable written to {}", exe_path.display()),
            Err(e) => tracing::error!("build failed: {}", e),
        }
    }

    interp_result.map_err(CompileError::Runtime)?;
    build_result
}
