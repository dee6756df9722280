use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sha2::{Digest, Sha256};
use std::{
    ffi::OsStr,
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use iflow_forge::{
    GeneratorConfig, generate_flow, generate_package,
    json_output::{DoctorJsonOutput, doctor_report},
    loader::load_integration_from_str,
    repair::repair_document,
};

#[derive(Parser, Debug)]
#[command(name = "iflow-forge", about = "Generate SAP Integration Suite iFlow packages")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "info", "iflow_forge=debug").
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble a document and write the importable ZIP.
    Build(BuildArgs),
    /// Print the repaired document and what was changed.
    Repair(RepairArgs),
    /// Assemble and lint documents without writing anything.
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Integration document (JSON).
    #[arg(long)]
    input: PathBuf,
    /// Where to write the package ZIP.
    #[arg(long)]
    out: PathBuf,
    /// Generator settings (JSON, or TOML with the `toml` feature).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Also write the bare `.iflw` file here.
    #[arg(long = "iflw-out")]
    iflw_out: Option<PathBuf>,
    /// Replace existing output files.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct RepairArgs {
    /// Integration document (JSON).
    #[arg(long)]
    input: PathBuf,
    /// Write the repaired document here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Replace an existing output file.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct DoctorArgs {
    /// Generator settings (JSON, or TOML with the `toml` feature).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit a machine-readable JSON report for a single document.
    #[arg(long)]
    json: bool,
    /// Read the document from stdin (requires --json).
    #[arg(long)]
    stdin: bool,
    /// Documents or directories of documents.
    #[arg(required_unless_present = "stdin")]
    targets: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);
    match cli.command {
        Commands::Build(args) => handle_build(args),
        Commands::Repair(args) => handle_repair(args),
        Commands::Doctor(args) => handle_doctor(args),
    }
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<GeneratorConfig> {
    match path {
        Some(path) => GeneratorConfig::load_from_file(path),
        None => Ok(GeneratorConfig::default()),
    }
}

fn handle_build(args: BuildArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let json = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let package = generate_package(&json, &config)
        .with_context(|| format!("failed to generate a package from {}", args.input.display()))?;
    for diagnostic in &package.diagnostics {
        eprintln!(
            "warning[{}]: {}{}",
            diagnostic.code,
            diagnostic.message,
            diagnostic
                .location
                .as_deref()
                .map(|loc| format!(" ({loc})"))
                .unwrap_or_default()
        );
    }

    write_output(&args.out, &package.zip_bytes, args.force)?;
    if let Some(path) = &args.iflw_out {
        write_output(path, package.iflw.as_bytes(), args.force)?;
    }
    println!(
        "Wrote {} ({}.iflw, blake3:{}, {})",
        args.out.display(),
        package.name,
        package.blake3,
        sha256_digest(&package.zip_bytes)
    );
    Ok(())
}

fn handle_repair(args: RepairArgs) -> Result<()> {
    let json = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let mut doc = load_integration_from_str(&json)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    let diagnostics = repair_document(&mut doc);
    let mut repaired = serde_json::to_string_pretty(&doc)?;
    repaired.push('\n');
    match &args.out {
        Some(path) => write_output(path, repaired.as_bytes(), args.force)?,
        None => print!("{repaired}"),
    }
    for diagnostic in &diagnostics {
        eprintln!(
            "{}: {} ({})",
            diagnostic.code,
            diagnostic.message,
            diagnostic.location.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn handle_doctor(args: DoctorArgs) -> Result<()> {
    if args.stdin && !args.json {
        anyhow::bail!("--stdin currently requires --json");
    }
    if args.stdin && !args.targets.is_empty() {
        anyhow::bail!("--stdin cannot be combined with file targets");
    }
    let config = load_config(args.config.as_deref())?;

    if args.json {
        let content = if args.stdin {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read document from stdin")?;
            buf
        } else {
            let [target] = args.targets.as_slice() else {
                anyhow::bail!("--json expects exactly one document");
            };
            fs::read_to_string(target)
                .with_context(|| format!("failed to read {}", target.display()))?
        };
        let report = doctor_report(&content, &config);
        let ok = report.ok;
        println!("{}", report.into_string());
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut failures = 0usize;
    for target in &args.targets {
        doctor_path(target, &config, &mut failures)?;
    }
    if failures == 0 {
        println!("All documents valid");
        Ok(())
    } else {
        Err(anyhow::anyhow!("{failures} document(s) failed validation"))
    }
}

fn doctor_path(path: &Path, config: &GeneratorConfig, failures: &mut usize) -> Result<()> {
    if path.is_dir() {
        let mut entries = fs::read_dir(path)
            .with_context(|| format!("failed to read directory {}", path.display()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("failed to read directory entry in {}", path.display()))?;
        entries.sort_by_key(|e| e.path());
        for entry in entries {
            doctor_path(&entry.path(), config, failures)?;
        }
        return Ok(());
    }
    if path.extension() != Some(OsStr::new("json")) {
        return Ok(());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    match generate_flow(&content, config) {
        Ok(flow) => {
            let report = DoctorJsonOutput::success(&flow);
            println!(
                "OK  {} ({}; {} node(s), {} diagnostic(s))",
                path.display(),
                flow.process_name,
                flow.nodes.len(),
                report.diagnostics.len()
            );
        }
        Err(err) => {
            *failures += 1;
            eprintln!("ERR {}: [{}] {err}", path.display(), err.code());
        }
    }
    Ok(())
}

fn write_output(path: &Path, content: &[u8], force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "refusing to overwrite existing file {}; pass --force to replace it",
            path.display()
        );
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn sha256_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}
