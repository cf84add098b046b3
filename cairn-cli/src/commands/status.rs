use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use cairn_core::store::IdentityCache;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Identity cache file
    #[arg(long)]
    pub cache: PathBuf,

    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: StatusArgs) -> anyhow::Result<()> {
    if !args.cache.exists() {
        anyhow::bail!("Cache file not found: {}", args.cache.display());
    }
    let loaded = IdentityCache::load(&args.cache, true)
        .with_context(|| format!("Cannot load cache: {}", args.cache.display()))?;
    let stats = loaded.cache.stats();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Cairn cache {}", args.cache.display());
    println!();
    println!("  Schema:  v{}", loaded.cache.schema_version);
    if let Some(version) = loaded.migrated_from {
        println!("  On disk: v{version} (legacy)");
    }
    println!("  Run id:  {}", stats.run_id);
    println!("  Entries: {}", stats.entries);
    println!("  Stale:   {}", stats.stale);
    let hash = &loaded.cache.config_hash;
    if hash.is_empty() {
        println!("  Config:  (none)");
    } else {
        println!("  Config:  {}", &hash[..hash.len().min(12)]);
    }
    Ok(())
}
