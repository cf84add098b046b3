use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use cairn_core::store::IdentityCache;

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Identity cache file
    #[arg(long)]
    pub cache: PathBuf,

    /// Only remove entries missing for more than N runs
    #[arg(long)]
    pub max_missing_runs: Option<u64>,

    /// Migrate caches written by older schema versions
    #[arg(long)]
    pub accept_legacy_cache: bool,
}

pub fn run(args: PruneArgs) -> anyhow::Result<()> {
    if !args.cache.exists() {
        anyhow::bail!("Cache file not found: {}", args.cache.display());
    }
    let mut cache = IdentityCache::load(&args.cache, args.accept_legacy_cache)
        .with_context(|| format!("Cannot load cache: {}", args.cache.display()))?
        .cache;
    let removed = cache.prune_stale(args.max_missing_runs);
    cache
        .save(&args.cache)
        .with_context(|| format!("Cannot write cache: {}", args.cache.display()))?;

    println!("Pruned {} stale entries", removed.len());
    for uid in &removed {
        println!("  {uid}");
    }
    Ok(())
}
