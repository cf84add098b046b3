//! Progress reporting for pipeline stages.
//!
//! The CLI draws an `indicatif` bar through [`IndicatifReporter`]; library
//! callers pass [`NoopReporter`] or their own implementation.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub trait ProgressReporter: Send + Sync {
    /// Begin a task with an optional number of steps.
    fn start(&self, task: &str, total: Option<u64>);

    fn advance(&self, amount: u64);

    fn finish(&self);

    fn message(&self, msg: &str);
}

#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn start(&self, _task: &str, _total: Option<u64>) {}
    fn advance(&self, _amount: u64) {}
    fn finish(&self) {}
    fn message(&self, _msg: &str) {}
}

/// Stage bar on stderr; hidden when stderr is not a terminal.
#[derive(Debug)]
pub struct IndicatifReporter {
    bar: ProgressBar,
}

impl Default for IndicatifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatifReporter {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_draw_target(target);
        Self { bar }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn start(&self, task: &str, total: Option<u64>) {
        let template = match total {
            Some(_) => "{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}",
            None => "{spinner:.green} {msg} {pos}",
        };
        let style = ProgressStyle::with_template(template)
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        self.bar.set_style(style);
        self.bar.set_length(total.unwrap_or(0));
        self.bar.set_message(task.to_string());
        self.bar.reset();
    }

    fn advance(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn message(&self, msg: &str) {
        self.bar.println(msg);
    }
}
