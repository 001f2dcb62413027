use crate::app::models::RawDescriptor;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Toml,
    /// CommonJS module for the precaching build tool
    Workbox,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Load, validate and emit service-worker precache descriptors"
)]
pub struct Cli {
    /// Descriptor file (.toml or .json). Defaults to precache.toml or precache.json
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Named profile to layer over the base descriptor
    #[arg(long)]
    pub profile: Option<String>,

    /// Override the directory the build tool scans
    #[arg(long)]
    pub source_dir: Option<String>,

    /// Extra glob patterns to include (e.g., '**/*.css')
    #[arg(long, num_args = 1..)]
    pub include: Option<Vec<String>>,

    /// Extra glob patterns to exclude
    #[arg(long, num_args = 1..)]
    pub exclude: Option<Vec<String>>,

    /// Override where the generated service worker is written
    #[arg(long)]
    pub output_path: Option<String>,

    /// Extra query-parameter name regexes to ignore (e.g., '^ref$')
    #[arg(long, num_args = 1..)]
    pub ignore_param: Option<Vec<String>>,

    /// Output format for the resolved descriptor
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Write the rendered descriptor here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Only validate and print a summary
    #[arg(long)]
    pub check: bool,

    /// Report whether each relative path would be precached
    #[arg(long, num_args = 1..)]
    pub select: Vec<String>,

    /// Print the normalized cache key for each URL
    #[arg(long, num_args = 1..)]
    pub cache_key: Vec<String>,
}

impl Cli {
    /// CLI flags as the topmost descriptor layer.
    pub fn overrides(&self) -> RawDescriptor {
        RawDescriptor {
            source_directory: self.source_dir.clone(),
            include_patterns: self.include.clone(),
            exclude_patterns: self.exclude.clone(),
            output_path: self.output_path.clone(),
            ignored_query_parameter_patterns: self.ignore_param.clone(),
            ..Default::default()
        }
    }
}
