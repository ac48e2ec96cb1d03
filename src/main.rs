mod app;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;

use app::{Cli, OutputOptions, resolve_config, run_batch, run_single};
use gelfilter::FilterCompiler;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("CLI: Failed to initialize thread pool")?;
    }

    let config = resolve_config(&cli)?;
    tracing::info!(
        "Compiler: mode {}, max depth {}, clause {}",
        config.mode.label(),
        config.max_depth,
        config.clause
    );

    let compiler = FilterCompiler::from_config(&config);
    let opts = OutputOptions::new(&config, &cli);
    let source = cli.source();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if cli.batch {
        let failures = run_batch(&source, &compiler, &opts, &mut out)?;
        out.flush().context("Output: Failed to flush stdout")?;
        if failures > 0 {
            anyhow::bail!("Batch: {} filter(s) failed to compile", failures);
        }
    } else {
        run_single(&source, &compiler, &opts, &mut out)?;
        out.flush().context("Output: Failed to flush stdout")?;
    }

    Ok(())
}
