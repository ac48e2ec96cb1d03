use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::io::Write;
use std::path::PathBuf;

use gelfilter::config::{CompileMode, CompilerConfig};
use gelfilter::filter::{CompiledFilter, FilterCompiler, filter_clause};
use gelfilter::input::{BatchEntry, FilterSource, read_batch, read_filter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Filter document (JSON or YAML), or `-` to read stdin
    pub filter: Option<String>,

    /// Read the filter from a file (.json, .yaml, .yml)
    #[arg(short, long, conflicts_with = "filter")]
    pub input: Option<PathBuf>,

    /// Treat the input as JSON Lines, one filter per line
    #[arg(long)]
    pub batch: bool,

    /// Compilation mode (default: legacy)
    #[arg(short, long, value_enum)]
    pub mode: Option<CompileMode>,

    /// Maximum nesting depth (default: 32)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Prefix non-empty fragments with `filter `
    #[arg(long)]
    pub clause: bool,

    /// Print fragment and parameters as JSON
    #[arg(long)]
    pub json: bool,

    /// Settings file (YAML)
    #[arg(short, long, env = "GELFILTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of threads for batch mode (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn source(&self) -> FilterSource {
        if let Some(path) = &self.input {
            return FilterSource::File(path.clone());
        }
        match self.filter.as_deref() {
            None | Some("-") => FilterSource::Stdin,
            Some(text) => FilterSource::Inline(text.to_string()),
        }
    }
}

/// Settings file and environment first, then command line flags on top.
pub fn resolve_config(cli: &Cli) -> Result<CompilerConfig> {
    let mut config =
        CompilerConfig::load(cli.config.as_deref()).context("CLI: Failed to load settings")?;

    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(max_depth) = cli.max_depth {
        if max_depth == 0 {
            anyhow::bail!("CLI: --max-depth must be at least 1");
        }
        config.max_depth = max_depth;
    }
    if cli.clause {
        config.clause = true;
    }

    Ok(config)
}

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub clause: bool,
    pub json: bool,
}

impl OutputOptions {
    pub fn new(config: &CompilerConfig, cli: &Cli) -> Self {
        Self {
            clause: config.clause,
            // parameters are meaningless without their values
            json: cli.json || config.mode == CompileMode::Parameterized,
        }
    }
}

pub fn format_compiled(mut compiled: CompiledFilter, opts: &OutputOptions) -> Result<String> {
    if opts.clause {
        compiled.fragment = filter_clause(&compiled.fragment).unwrap_or_default();
    }
    if opts.json {
        serde_json::to_string(&compiled).context("Output: Failed to serialize result")
    } else {
        Ok(compiled.fragment)
    }
}

fn format_error(message: &str, opts: &OutputOptions) -> String {
    if opts.json {
        serde_json::json!({ "error": message }).to_string()
    } else {
        format!("error: {}", message)
    }
}

pub fn run_single<W: Write>(
    source: &FilterSource,
    compiler: &FilterCompiler,
    opts: &OutputOptions,
    out: &mut W,
) -> Result<()> {
    let document = read_filter(source)?;
    let compiled = compiler
        .compile(&document)
        .with_context(|| format!("Compiler: Failed to compile filter from {}", source.label()))?;

    writeln!(out, "{}", format_compiled(compiled, opts)?).context("Output: Failed to write")?;
    Ok(())
}

/// Compile every entry in parallel; results keep the input order.
pub fn compile_batch(
    entries: &[BatchEntry],
    compiler: &FilterCompiler,
) -> Vec<std::result::Result<CompiledFilter, String>> {
    entries
        .par_iter()
        .map(|entry| match &entry.document {
            Ok(document) => compiler.compile(document).map_err(|e| e.to_string()),
            Err(e) => Err(e.clone()),
        })
        .collect()
}

/// Returns the number of entries that failed.
pub fn run_batch<W: Write>(
    source: &FilterSource,
    compiler: &FilterCompiler,
    opts: &OutputOptions,
    out: &mut W,
) -> Result<usize> {
    let entries = read_batch(source)?;
    let start = std::time::Instant::now();
    let results = compile_batch(&entries, compiler);

    let mut failures = 0;
    for (entry, result) in entries.iter().zip(results) {
        let line = match result {
            Ok(compiled) => format_compiled(compiled, opts)?,
            Err(e) => {
                failures += 1;
                tracing::warn!("Line {}: {}", entry.line, e);
                format_error(&format!("line {}: {}", entry.line, e), opts)
            }
        };
        writeln!(out, "{}", line).context("Output: Failed to write")?;
    }

    tracing::info!(
        "Compiled {} filters from {} in {:.2}ms ({} failed)",
        entries.len(),
        source.label(),
        start.elapsed().as_secs_f64() * 1000.0,
        failures
    );
    Ok(failures)
}
