//! `canonc` - compile, check, or round-trip-emit a Canon project from the
//! command line. Gated behind the `cli` feature; not part of the core
//! library surface.

use anyhow::{bail, Context, Result};
use canonc::{compile_canon_project, serialize_canon_project, CompileOptions, SourceFile};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "canonc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging (equivalent to RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a project directory and write the serialized canonical form
    Compile {
        /// Directory containing `.canon` source files
        project_dir: PathBuf,
        /// Output directory for the canonical files
        #[arg(short, long, default_value = "out")]
        output: PathBuf,
    },
    /// Compile a project and report diagnostics without writing output
    Check {
        project_dir: PathBuf,
    },
    /// Compile and re-emit the canonical form to stdout instead of files
    Emit {
        project_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Compile { project_dir, output } => run_compile(&project_dir, &output),
        Command::Check { project_dir } => run_check(&project_dir),
        Command::Emit { project_dir } => run_emit(&project_dir),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt().with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| filter.to_string())).try_init();
}

fn load_project(project_dir: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(project_dir).with_context(|| format!("reading {}", project_dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("canon") {
            let content = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            files.push(SourceFile {
                path: path.display().to_string(),
                content,
            });
        }
    }
    if files.is_empty() {
        bail!("no .canon files found in {}", project_dir.display());
    }
    Ok(files)
}

fn run_check(project_dir: &Path) -> Result<()> {
    let files = load_project(project_dir)?;
    let result = compile_canon_project(&files, &CompileOptions::default());
    print_diagnostics(&result.diagnostics);
    if result.config.is_some() {
        println!("{}", "compiles cleanly".green());
        Ok(())
    } else {
        bail!("compilation failed");
    }
}

fn run_compile(project_dir: &Path, output: &Path) -> Result<()> {
    let files = load_project(project_dir)?;
    let result = compile_canon_project(&files, &CompileOptions::default());
    print_diagnostics(&result.diagnostics);
    let Some(config) = result.config else {
        bail!("compilation failed");
    };
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;
    for (name, source) in serialize_canon_project(&config) {
        fs::write(output.join(&name), source).with_context(|| format!("writing {name}"))?;
    }
    println!("{} wrote output to {}", "ok".green(), output.display());
    Ok(())
}

fn run_emit(project_dir: &Path) -> Result<()> {
    let files = load_project(project_dir)?;
    let result = compile_canon_project(&files, &CompileOptions::default());
    print_diagnostics(&result.diagnostics);
    let Some(config) = result.config else {
        bail!("compilation failed");
    };
    for (name, source) in serialize_canon_project(&config) {
        println!("--- {name} ---\n{source}");
    }
    Ok(())
}

fn print_diagnostics(diagnostics: &[canonc::diagnostics::Diagnostic]) {
    for diag in diagnostics {
        if diag.is_error() {
            eprintln!("{} {diag}", "error:".red().bold());
        } else {
            eprintln!("{} {diag}", "warning:".yellow().bold());
        }
    }
}
