use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(
    name = "glint",
    version,
    about = "glint shader compiler — validate, transform, generate"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile .gsb shader modules to GLSL text or a SPIR-V binary
    Build {
        /// Input .gsb shader modules (compiled in parallel)
        inputs: Vec<PathBuf>,
        /// Output path (single input only; default: derived from the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Code generation target (glsl or spirv)
        #[arg(long, default_value = "glsl")]
        target: String,
        /// GLSL stage to emit (vert or frag; default: every declared entry)
        #[arg(long)]
        stage: Option<String>,
        /// Target OpenGL context version for GLSL output
        #[arg(long, default_value = "3.3")]
        gl_version: String,
        /// Target OpenGL ES instead of desktop GL
        #[arg(long)]
        es: bool,
        /// Apply the clip-space Y flip to the vertex position output
        #[arg(long)]
        flip_y: bool,
        /// Skip constant folding and dead-code elimination
        #[arg(long)]
        no_opt: bool,
        /// Compile-time option value, NAME=VALUE (repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
    },
    /// Deserialize and validate a module without generating code
    Check {
        /// Input .gsb shader module
        input: PathBuf,
    },
    /// Print a readable summary of a module's declarations
    View {
        /// Input .gsb shader module
        input: PathBuf,
    },
    /// Show BLAKE3 content hashes of a module and its functions
    Hash {
        /// Input .gsb shader module
        input: PathBuf,
        /// Show full 256-bit hashes instead of the short form
        #[arg(long)]
        full: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            inputs,
            output,
            target,
            stage,
            gl_version,
            es,
            flip_y,
            no_opt,
            set,
        } => cli::build::run(cli::build::BuildArgs {
            inputs,
            output,
            target,
            stage,
            gl_version,
            gl_es: es,
            flip_y,
            no_opt,
            set,
        }),
        Command::Check { input } => cli::check::run(&input),
        Command::View { input } => cli::view::run(&input),
        Command::Hash { input, full } => cli::hash::run(&input, full),
    }
}
