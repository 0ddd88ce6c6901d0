//! pasc - Pascal compiler CLI
//!
//! Compiles small Pascal programs: interprets them directly, or emits a
//! 32-bit x86 NASM listing and drives the external assembler/linker.
//! Diagnostics and logs go to stderr; program output and dumps go where
//! the subcommand says.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use pasc::CompilerConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "pasc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pascal compiler - interpret programs or build x86 executables", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interpret a program and redirect WRITE output to a file;
    /// optionally also build an executable
    Compile {
        /// Input .pas source file
        input: PathBuf,

        /// File receiving the program's WRITE output
        write_output: PathBuf,

        /// Optional executable to produce via the external toolchain
        exe_output: Option<PathBuf>,
    },

    /// Interpret a program with stdin/stdout I/O
    Run {
        /// Input .pas source file
        input: PathBuf,
    },

    /// Assemble and link an executable (no interpretation)
    Build {
        /// Input .pas source file
        input: PathBuf,

        /// Output executable path (defaults to input filename without .pas)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the intermediate NASM listing (.asm) next to the executable
        #[arg(long)]
        keep_asm: bool,
    },

    /// Print the abstract syntax tree
    Ast {
        /// Input .pas source file
        input: PathBuf,
    },

    /// Print the optimized intermediate representation
    Ir {
        /// Input .pas source file
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pasc=info".parse().expect("static directive parses")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Compile {
            input,
            write_output,
            exe_output,
        } => run_compile(&input, &write_output, exe_output.as_deref(), &config),
        Commands::Run { input } => run_interpret(&input, &config),
        Commands::Build {
            input,
            output,
            keep_asm,
        } => {
            let output = output.unwrap_or_else(|| {
                let stem = input.file_stem().unwrap_or_default();
                PathBuf::from(stem)
            });
            run_build(&input, &output, keep_asm, &config);
        }
        Commands::Ast { input } => run_ast_dump(&input),
        Commands::Ir { input } => run_ir_dump(&input, &config),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "pasc", &mut io::stdout());
        }
    }
}

fn load_config(path: Option<&Path>) -> CompilerConfig {
    match path {
        Some(path) => match CompilerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => CompilerConfig::default(),
    }
}

fn read_source(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn run_compile(
    input: &Path,
    write_output: &Path,
    exe_output: Option<&Path>,
    config: &CompilerConfig,
) {
    match pasc::compile_file(input, write_output, exe_output, config) {
        Ok(()) => {
            println!(
                "Compiled {}; WRITE output in {}",
                input.display(),
                write_output.display()
            );
            if let Some(exe) = exe_output {
                println!("Executable written to {}", exe.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_interpret(input: &Path, config: &CompilerConfig) {
    let source = read_source(input);
    let ir = match pasc::compile_to_ir(&source, config) {
        Ok(ir) => ir,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let mut sink = pas_interp::StdoutSink;
    let mut input_provider = pas_interp::StdinInput;
    if let Err(e) = pasc::run_ir(&ir, &mut sink, &mut input_provider) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_build(input: &Path, output: &Path, keep_asm: bool, config: &CompilerConfig) {
    let source = read_source(input);
    let asm = match pasc::compile_to_asm(&source, config) {
        Ok(asm) => asm,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if keep_asm {
        let asm_path = output.with_extension("asm");
        if let Err(e) = std::fs::write(&asm_path, &asm) {
            eprintln!("Error writing {}: {}", asm_path.display(), e);
            process::exit(1);
        }
        println!("Assembly saved to {}", asm_path.display());
    }

    match pasc::toolchain::assemble_and_link(&asm, output, &config.toolchain) {
        Ok(()) => println!("Compiled {} -> {}", input.display(), output.display()),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_ast_dump(input: &Path) {
    let source = read_source(input);
    match pasc::parse_program(&source) {
        Ok(program) => print!("{}", pasc::ast::render_tree(&program)),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_ir_dump(input: &Path, config: &CompilerConfig) {
    let source = read_source(input);
    match pasc::compile_to_ir(&source, config) {
        Ok(ir) => print!("{}", pas_core::render_listing(&ir)),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
