//! Pipeline orchestrator: analyze → resolve → normalize → paths → report,
//! then an all-or-nothing persistence step.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::{info, instrument};

use crate::analyze::Analysis;
use crate::config::ClusterConfig;
use crate::error::PersistError;
use crate::extract::ItemSet;
use crate::normalize::NormalizationPass;
use crate::paths::assign_paths;
use crate::progress::ProgressReporter;
use crate::render::{Report, ReportInputs, StubSummary, write_stubs};
use crate::resolve::{RuleContext, resolve_all};
use crate::store::{IdentityCache, write_atomic};
use crate::text::Lexicon;
use crate::types::ItemId;

/// Switches for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Write the report only.
    pub dry_run: bool,
    /// Skip the cache rule so every item is clustered afresh; moves are
    /// still recorded.
    pub force_rebuild: bool,
    /// Prune stale entries missing for more than
    /// `thresholds.stale_prune_after_runs` runs from the next cache.
    pub prune_stale: bool,
    pub accept_legacy: bool,
}

/// Immutable state shared by every stage. The loaded cache is read-only;
/// the next snapshot is part of [`RunOutcome`].
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: ClusterConfig,
    pub lexicon: Lexicon,
    pub config_hash: String,
    pub cache: IdentityCache,
    pub options: RunOptions,
}

impl RunContext {
    pub fn new(config: ClusterConfig, cache: IdentityCache, options: RunOptions) -> Self {
        Self {
            lexicon: Lexicon::from_config(&config),
            config_hash: config.config_hash(),
            config,
            cache,
            options,
        }
    }
}

/// Everything a run produces, before anything touches disk.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub paths: BTreeMap<ItemId, String>,
    pub report: Report,
    pub next_cache: IdentityCache,
    /// Entries removed from `next_cache` by stale pruning.
    pub pruned: BTreeSet<ItemId>,
}

const STAGES: u64 = 5;

pub struct ClusterPipeline<'a> {
    ctx: &'a RunContext,
    progress: &'a dyn ProgressReporter,
}

impl<'a> ClusterPipeline<'a> {
    pub fn new(ctx: &'a RunContext, progress: &'a dyn ProgressReporter) -> Self {
        Self { ctx, progress }
    }

    /// Run every stage over `set`. Pure apart from logging.
    #[instrument(skip_all, name = "pipeline", fields(items = set.len()))]
    pub fn run(&self, set: &ItemSet) -> RunOutcome {
        let ctx = self.ctx;
        self.progress.start("Clustering", Some(STAGES));

        let analysis = Analysis::run(&set.items, &ctx.lexicon, &ctx.config);
        self.progress.advance(1);

        let rules = RuleContext::new(&ctx.config, &ctx.lexicon, &analysis);
        let resolutions = resolve_all(&set.items, &rules, &ctx.cache, ctx.options.force_rebuild);
        self.progress.advance(1);

        let normalized = NormalizationPass {
            config: &ctx.config,
            lexicon: &ctx.lexicon,
            cache: &ctx.cache,
        }
        .run(&set.items, &resolutions);
        self.progress.advance(1);

        let plan = assign_paths(&set.items, &normalized, &ctx.config, &ctx.lexicon);
        self.progress.advance(1);

        let report = Report::build(&ReportInputs {
            config: &ctx.config,
            config_hash: &ctx.config_hash,
            resolutions: &resolutions,
            normalized: &normalized,
            plan: &plan,
            prior: &ctx.cache,
            ingest_failures: &set.failures,
        });
        let mut next_cache = ctx.cache.advance(&plan.paths, &ctx.config_hash);
        let pruned = if ctx.options.prune_stale {
            next_cache.prune_stale(Some(ctx.config.thresholds.stale_prune_after_runs))
        } else {
            BTreeSet::new()
        };
        self.progress.advance(1);
        self.progress.finish();

        info!(
            items = plan.paths.len(),
            moves = report.moves.len(),
            collisions = report.collisions.len(),
            "Run complete"
        );
        RunOutcome {
            paths: plan.paths,
            report,
            next_cache,
            pruned,
        }
    }
}

/// Where run outputs go.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    /// Root for redirect stubs.
    pub out_dir: PathBuf,
    pub cache: PathBuf,
    pub report: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub report_written: bool,
    pub cache_written: bool,
    pub stubs: StubSummary,
}

/// Write the outcome. The report goes first and the cache last, so a failed
/// stub write never advances the cache. Dry runs write the report only.
#[instrument(skip_all, name = "persist")]
pub fn persist(
    outcome: &RunOutcome,
    outputs: &OutputPaths,
    dry_run: bool,
) -> Result<PersistSummary, PersistError> {
    let mut summary = PersistSummary::default();
    write_atomic(&outputs.report, outcome.report.to_json()?.as_bytes())?;
    summary.report_written = true;
    if dry_run {
        info!(report = %outputs.report.display(), "Dry run, report only");
        return Ok(summary);
    }

    let live: BTreeSet<String> = outcome.paths.values().cloned().collect();
    summary.stubs = write_stubs(&outputs.out_dir, &outcome.report.moves, &live)?;
    outcome.next_cache.save(&outputs.cache)?;
    summary.cache_written = true;
    Ok(summary)
}
