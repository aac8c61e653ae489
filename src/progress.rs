//! Progress reporting for long reachability runs.
//!
//! The engine treats progress as a write-only sink: it announces the total
//! number of steps once and then ticks. A sink can render however it
//! likes; its behavior can never influence the computed result.

use std::time::Duration;

/// Write-only observer of the reachability loop.
pub trait Progress {
    /// Announces a run of `total` steps. `min_interval_secs` is a redraw
    /// hint for rendering sinks; `label` names the run.
    fn start(&mut self, total: usize, min_interval_secs: f64, label: &str);

    /// Reports that step `k` has completed.
    fn update(&mut self, k: usize);
}

/// A sink that discards everything. Use when no reporting is needed.
#[derive(Debug, Default)]
pub struct NoOpProgress;

impl Progress for NoOpProgress {
    fn start(&mut self, _total: usize, _min_interval_secs: f64, _label: &str) {}

    fn update(&mut self, _k: usize) {}
}

/// Renders a terminal progress bar via `indicatif`.
#[derive(Default)]
pub struct BarProgress {
    bar: Option<indicatif::ProgressBar>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Progress for BarProgress {
    fn start(&mut self, total: usize, min_interval_secs: f64, label: &str) {
        let bar = indicatif::ProgressBar::new(total as u64);
        bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{msg} [{bar:40}] {pos}/{len} ({eta})")
                .unwrap(),
        );
        bar.set_message(label.to_string());
        if min_interval_secs > 0.0 {
            bar.enable_steady_tick(Duration::from_secs_f64(min_interval_secs));
        }
        self.bar = Some(bar);
    }

    fn update(&mut self, k: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(k as u64);
        }
    }
}
