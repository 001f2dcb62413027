// Declare modules
pub mod cli;
pub mod config;
pub mod error;
pub mod formatter;
pub mod matcher;
pub mod models;

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use url::Url;

use self::cli::Cli;
use self::config::resolve_config;
use self::formatter::OutputGenerator;
use self::matcher::PrecacheMatcher;

/// Parses the command line and runs against the current directory.
pub fn run() -> Result<()> {
    let args = Cli::parse();
    let current_dir = env::current_dir().context("Failed to get current directory")?;
    let stdout = io::stdout();
    execute(&args, &current_dir, &mut stdout.lock())
}

/// Resolves the descriptor and emits whatever the flags ask for into `out`.
pub fn execute(args: &Cli, cwd: &Path, out: &mut impl Write) -> Result<()> {
    // 1. Resolve Configuration
    let resolved = resolve_config(args, cwd)?;
    let descriptor = &resolved.descriptor;
    log::debug!("Resolved descriptor: {:?}", descriptor);

    // 2. Diagnostics against the compiled patterns
    if !args.select.is_empty() || !args.cache_key.is_empty() {
        let matcher = PrecacheMatcher::new(descriptor)?;
        for path in &args.select {
            writeln!(out, "{}\t{}", matcher.select(path), path)?;
        }
        for raw in &args.cache_key {
            let url = Url::parse(raw).with_context(|| format!("Invalid URL: {}", raw))?;
            writeln!(out, "{}\t{}", raw, matcher.cache_key(&url))?;
        }
        return Ok(());
    }

    if args.check {
        writeln!(out, "{}", OutputGenerator::summary(&resolved))?;
        return Ok(());
    }

    // 3. Render
    let rendered = OutputGenerator::render(descriptor, args.format)?;

    // 4. Write to file or `out`
    match &args.out {
        Some(path) => {
            let path = cwd.join(path);
            fs::write(&path, format!("{}\n", rendered))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote descriptor to {}", path.display());
        }
        None => writeln!(out, "{}", rendered)?,
    }

    Ok(())
}
