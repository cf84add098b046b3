use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use cairn_core::extract::ingest;
use cairn_core::pipeline::{ClusterPipeline, OutputPaths, RunContext, RunOptions, persist};
use cairn_core::progress::IndicatifReporter;
use cairn_core::store::IdentityCache;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Directory holding item manifests (*.json, *.yml, *.yaml)
    pub input: PathBuf,

    /// Output root for pages and redirect stubs
    #[arg(long)]
    pub out: PathBuf,

    /// Identity cache file (default: <out>/.cairn/cache.json)
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Report file (default: <out>/.cairn/report.json)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Configuration overrides (.toml, .json, .yaml)
    #[arg(long, env = "CAIRN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the report only
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore the cache for placement; moves are still recorded
    #[arg(long)]
    pub force_rebuild: bool,

    /// Drop long-stale entries from the saved cache
    #[arg(long)]
    pub prune_stale: bool,

    /// Migrate caches written by older schema versions
    #[arg(long)]
    pub accept_legacy_cache: bool,
}

pub fn run(args: ResolveArgs, quiet: bool) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let outputs = OutputPaths {
        cache: args
            .cache
            .clone()
            .unwrap_or_else(|| super::default_cache_path(&args.out)),
        report: args
            .report
            .clone()
            .unwrap_or_else(|| super::default_report_path(&args.out)),
        out_dir: args.out.clone(),
    };

    let loaded = IdentityCache::load(&outputs.cache, args.accept_legacy_cache)
        .with_context(|| format!("Cannot load cache: {}", outputs.cache.display()))?;
    if let Some(version) = loaded.migrated_from {
        info!(from = version, "Legacy cache migrated");
    }

    let options = RunOptions {
        dry_run: args.dry_run,
        force_rebuild: args.force_rebuild,
        prune_stale: args.prune_stale,
        accept_legacy: args.accept_legacy_cache,
    };
    let ctx = RunContext::new(config, loaded.cache, options);

    let set = ingest(&args.input, &ctx.lexicon)
        .with_context(|| format!("Cannot read manifests: {}", args.input.display()))?;

    let progress = if quiet {
        IndicatifReporter::hidden()
    } else {
        IndicatifReporter::new()
    };
    let outcome = ClusterPipeline::new(&ctx, &progress).run(&set);
    let summary = persist(&outcome, &outputs, args.dry_run)
        .with_context(|| format!("Cannot write outputs under {}", args.out.display()))?;

    if quiet {
        return Ok(());
    }
    let m = &outcome.report.metrics;
    println!("Clustered {} items", outcome.paths.len());
    println!("  Top-level folders: {}", m.top_level_count);
    println!(
        "  Roots:             {} -> {} ({} merges)",
        m.num_roots_pre_merge, m.num_roots_post_merge, m.num_merges_applied
    );
    println!("  Rerouted:          {}", m.num_items_rerouted);
    println!("  Misc:              {}", m.num_items_to_misc);
    println!("  Moves:             {}", outcome.report.moves.len());
    println!("  Collisions:        {}", outcome.report.collisions.len());
    if !m.capacity_constraint_ok {
        println!("  Warning: top-level folder cap exceeded");
    }
    println!();
    println!("  Report: {}", outputs.report.display());
    if args.dry_run {
        println!("  Dry run: cache and stubs not written");
    } else {
        println!(
            "  Cache:  {} ({} entries, {} pruned)",
            outputs.cache.display(),
            outcome.next_cache.entries.len(),
            outcome.pruned.len()
        );
        println!(
            "  Stubs:  {} written, {} skipped",
            summary.stubs.written.len(),
            summary.stubs.skipped.len()
        );
    }
    Ok(())
}
