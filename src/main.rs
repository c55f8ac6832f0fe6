use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use apicov::classfile::{self, InstructionKind, SymbolEntry};
use apicov::config::{CONFIG_FILE, ScanOptions};
use apicov::diagnostics::{CoverageError, ScanLog, render_error};
use apicov::printer::ReportFormat;

#[derive(Parser)]
#[command(name = "apicov", version, about = "Call-site coverage of JVM API surfaces")]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory of compiled classes for calls into the given surfaces
    Scan {
        /// Directory of compiled classes (may come from apicov.toml instead)
        root: Option<PathBuf>,
        /// Fully-qualified surface names
        surfaces: Vec<String>,
        /// Project file (defaults to ./apicov.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// File listing surface names, one per line
        #[arg(long)]
        surfaces_file: Option<PathBuf>,
        /// File listing excluded type@name@descriptor triples
        #[arg(long)]
        exclusions: Option<PathBuf>,
        /// TOML surface declarations
        #[arg(long, num_args = 1..)]
        declarations: Vec<PathBuf>,
        /// Directories holding compiled surface types
        #[arg(long, num_args = 1..)]
        classpath: Vec<PathBuf>,
        /// Report format
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,
        /// Write the report here instead of stdout; a directory gets `apicov-report.<ext>`
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// HTML page heading (defaults to the root directory name)
        #[arg(long)]
        title: Option<String>,
        /// Prefix for HTML call-site source links
        #[arg(long)]
        link_base: Option<String>,
        /// Track equals/hashCode/toString overrides too
        #[arg(long)]
        keep_object_methods: bool,
    },
    /// Dump a class file's header, symbol table and methods
    Inspect {
        /// Path to a .class file
        file: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Scan {
            root,
            surfaces,
            config,
            surfaces_file,
            exclusions,
            declarations,
            classpath,
            format,
            output,
            title,
            link_base,
            keep_object_methods,
        } => {
            let overrides = ScanOptions {
                root,
                surfaces,
                surfaces_file,
                exclusions,
                declarations,
                classpath,
                keep_object_methods,
                format,
                output,
                title,
                link_base,
            };
            run_scan(config.as_deref(), overrides)
        }
        Commands::Inspect { file } => inspect(&file),
    };

    if let Err(err) = result {
        render_error(&err);
        std::process::exit(1);
    }
}

fn run_scan(config: Option<&Path>, overrides: ScanOptions) -> Result<(), CoverageError> {
    let base = match config {
        Some(path) => ScanOptions::load(path)?,
        None if Path::new(CONFIG_FILE).is_file() => ScanOptions::load(Path::new(CONFIG_FILE))?,
        None => ScanOptions::default(),
    };
    let plan = base.merge(overrides).resolve()?;

    let mut log = ScanLog::new();
    let report = apicov::scan(&plan, &mut log)?;
    apicov::write_report(&plan, &report)?;

    let skipped = log.skipped_units().count();
    if skipped > 0 {
        eprintln!("warning: {skipped} unit(s) skipped; run with -v for details");
    }
    if let Some(path) = &plan.output {
        eprintln!("report written to {}", path.display());
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<(), CoverageError> {
    let bytes = std::fs::read(path).map_err(|e| CoverageError::io(path, e))?;
    let unit = classfile::open_unit(&bytes).map_err(|source| CoverageError::Unit {
        path: path.to_path_buf(),
        source,
    })?;

    println!("{} (version {}.{})", unit.name, unit.major_version, unit.minor_version);
    println!("  access: {:#06x}", unit.access.0);
    if let Some(super_name) = &unit.super_name {
        println!("  extends: {super_name}");
    }
    for interface in &unit.interfaces {
        println!("  implements: {interface}");
    }
    if let Some(source) = &unit.source_file {
        println!("  source: {source}");
    }
    for annotation in &unit.annotations {
        println!("  @{}", annotation.type_name);
    }

    println!();
    println!("Symbols:");
    for (slot, entry) in unit.symbol_table() {
        let (tag, member) = match entry {
            SymbolEntry::MethodRef(member) => ("Methodref", member),
            SymbolEntry::InterfaceMethodRef(member) => ("InterfaceMethodref", member),
            SymbolEntry::Other => continue,
        };
        println!(
            "  #{slot:<5} {tag:<19} {}.{}{}",
            member.owner, member.name, member.descriptor
        );
    }

    println!();
    println!("Methods:");
    for method in unit.methods() {
        let deprecated = if method.deprecated { " deprecated" } else { "" };
        println!(
            "  {}{} [{:#06x}{deprecated}]",
            method.name, method.descriptor, method.access.0
        );
        let Some(body) = method.code() else {
            continue;
        };
        for instruction in body.instructions() {
            match instruction {
                Ok(instruction) => {
                    if let InstructionKind::Invoke { kind, slot } = instruction.kind {
                        let line = body
                            .line_for(instruction.offset)
                            .map_or_else(|| "?".to_string(), |line| line.to_string());
                        println!(
                            "    {:>5}: {} #{slot} (line {line})",
                            instruction.offset,
                            kind.mnemonic()
                        );
                    }
                }
                Err(err) => {
                    println!("    error: {err}");
                    break;
                }
            }
        }
    }
    Ok(())
}
