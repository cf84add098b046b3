pub mod prune;
pub mod resolve;
pub mod status;
pub mod tokenize;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use cairn_core::config::ClusterConfig;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cluster manifests into folders, write stubs, report and cache
    Resolve(resolve::ResolveArgs),
    /// Remove stale entries from an identity cache
    Prune(prune::PruneArgs),
    /// Show identity cache statistics
    Status(status::StatusArgs),
    /// Show how names tokenize and sanitize
    Tokenize(tokenize::TokenizeArgs),
}

pub fn run(cmd: Command, quiet: bool) -> anyhow::Result<()> {
    match cmd {
        Command::Resolve(args) => resolve::run(args, quiet),
        Command::Prune(args) => prune::run(args),
        Command::Status(args) => status::run(args),
        Command::Tokenize(args) => tokenize::run(args),
    }
}

/// Merged configuration from `path`, or defaults.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<ClusterConfig> {
    match path {
        Some(p) => ClusterConfig::load(Some(p))
            .with_context(|| format!("Cannot load config: {}", p.display())),
        None => ClusterConfig::load(None).context("Cannot load default config"),
    }
}

/// Default cache location inside an output directory.
pub(crate) fn default_cache_path(out_dir: &Path) -> PathBuf {
    out_dir.join(".cairn").join("cache.json")
}

pub(crate) fn default_report_path(out_dir: &Path) -> PathBuf {
    out_dir.join(".cairn").join("report.json")
}
