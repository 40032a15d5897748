use clap::{Parser, Subcommand};
use gox_core::compiler::{self, lexer};
use gox_core::config::FrontendConfig;
use gox_core::diagnostics::ErrorHandler;
use gox_core::{loader, serializer};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

const SOURCE_EXTENSION: &str = "gox";

#[derive(Parser)]
#[command(name = "gox")]
#[command(about = "GoxLang front end: source text to JSON AST", version, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./gox.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a .gox file and save its AST next to it as JSON
    Parse {
        /// Path to the .gox file
        file: PathBuf,

        /// Where to write the AST (defaults to the source path with the configured extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the AST to stdout instead of saving it
        #[arg(long)]
        stdout: bool,
    },

    /// Report diagnostics without producing an AST
    Check {
        file: PathBuf,
    },

    /// Dump the token stream as JSON
    Tokens {
        file: PathBuf,
    },
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FrontendConfig::load(path)?,
        None => FrontendConfig::discover(),
    };
    init_logging(&config);

    match &cli.command {
        Commands::Parse { file, output, stdout } => {
            parse_file(file, output.as_deref(), *stdout, &config)
        }
        Commands::Check { file } => check_file(file, &config),
        Commands::Tokens { file } => dump_tokens(file),
    }
}

fn init_logging(config: &FrontendConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log.level.as_str());
    env_logger::Builder::from_env(env).init();
}

fn read_source(filename: &Path) -> Result<String, String> {
    if filename.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
        return Err(format!("File must have .{} extension: {}", SOURCE_EXTENSION, filename.display()));
    }
    fs::read_to_string(filename)
        .map_err(|e| format!("Cannot read {}: {}", filename.display(), e))
}

fn parse_file(
    filename: &Path,
    output: Option<&Path>,
    to_stdout: bool,
    config: &FrontendConfig,
) -> Result<(), String> {
    let content = read_source(filename)?;
    let compilation = compiler::analyze(&content, &config.parser);

    if compilation.has_errors() {
        return Err(failure(filename, &compilation.errors));
    }

    if to_stdout {
        println!("{}", serializer::to_string(&compilation.program, config.output.pretty)?);
        return Ok(());
    }

    let output_filename = match output {
        Some(path) => path.to_path_buf(),
        None => filename.with_extension(&config.output.extension),
    };
    loader::save_program(&compilation.program, &output_filename, config.output.pretty)?;
    println!("Successfully parsed {}", filename.display());
    println!("AST saved to {}", output_filename.display());
    Ok(())
}

fn check_file(filename: &Path, config: &FrontendConfig) -> Result<(), String> {
    let content = read_source(filename)?;
    let compilation = compiler::analyze(&content, &config.parser);
    if compilation.has_errors() {
        return Err(failure(filename, &compilation.errors));
    }
    info!("{}: {} top-level statements", filename.display(), compilation.program.body.len());
    println!("{}: no errors", filename.display());
    Ok(())
}

fn dump_tokens(filename: &Path) -> Result<(), String> {
    let content = read_source(filename)?;
    let mut errors = ErrorHandler::new();
    let tokens = lexer::tokenize(&content, &mut errors);
    let json = serde_json::to_string_pretty(&tokens).map_err(|e| e.to_string())?;
    println!("{}", json);
    if errors.has_errors() {
        return Err(failure(filename, &errors));
    }
    Ok(())
}

/// Prints every diagnostic and builds the message `main` exits with.
fn failure(filename: &Path, errors: &ErrorHandler) -> String {
    eprintln!("Parsing failed for {}:", filename.display());
    errors.report();
    format!("{} error(s) in {}", errors.error_count(), filename.display())
}
