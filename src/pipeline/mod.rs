pub mod directory;
pub mod output;
pub mod probe;
pub mod rank;
pub mod scheduler;
pub mod select;

use crate::config::Settings;
use crate::error::Result;
use crate::traits::{DirectorySource, Prober};
use crate::types::{Candidate, DirectoryStatus, ProbeResult};
use crate::utils;
use indicatif::ProgressBar;
use select::{Filter, SortBy};
use std::sync::Arc;

/// Selection and scheduling knobs for one run
#[derive(Debug, Clone)]
pub struct Plan {
    pub filter: Filter,
    pub sort_by: SortBy,
    pub limit: Option<usize>,
    pub concurrency: usize,
}

impl Plan {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            filter: Filter::new(
                &settings.protocols,
                &settings.countries,
                settings.exclude.as_deref(),
                settings.min_completion,
            )?,
            sort_by: settings.sort_by,
            // 0 in the config file means "no limit", same as --limit 0
            limit: settings.limit.filter(|&n| n > 0),
            concurrency: settings.concurrency,
        })
    }
}

/// Outcome of a full run
#[derive(Debug, Clone)]
pub struct Ranking {
    pub last_check: String,
    /// Mirrors listed in the directory before selection
    pub listed: usize,
    pub results: Vec<ProbeResult>,
}

/// Fetch the directory and narrow it down. Nothing is probed.
pub async fn fetch_and_select<D>(source: &D, plan: &Plan) -> Result<(DirectoryStatus, Vec<Candidate>)>
where
    D: DirectorySource + ?Sized,
{
    let directory = source.fetch_directory().await?;
    tracing::info!("number of mirrors: {}", directory.candidates.len());

    let selected = select::select(
        &directory.candidates,
        |c| plan.filter.matches(c),
        plan.sort_by,
        plan.limit,
    );
    tracing::info!("{} mirrors selected for rating", selected.len());
    for (i, c) in selected.iter().enumerate() {
        tracing::debug!(
            "{:3} {:<50} {}",
            i + 1,
            c.address,
            c.last_sync.as_deref().unwrap_or("never synced")
        );
    }

    Ok((directory, selected))
}

/// Directory -> selection -> bounded probing -> ranking.
///
/// Only the directory fetch can fail; it fails before any probe starts.
pub async fn run<D, P>(
    source: &D,
    prober: Arc<P>,
    plan: &Plan,
    progress: &ProgressBar,
) -> Result<Ranking>
where
    D: DirectorySource + ?Sized,
    P: Prober + 'static,
{
    let (directory, selected) = fetch_and_select(source, plan).await?;

    progress.set_length(selected.len() as u64);
    let rates = scheduler::rate_all(prober, selected, plan.concurrency, progress).await;
    progress.finish_and_clear();

    let results = rank::rank(rates);
    let usable = results.iter().filter(|r| r.is_usable()).count();
    tracing::info!("{} of {} mirrors answered", usable, results.len());
    for (i, r) in results.iter().enumerate() {
        tracing::debug!("{:3} {:<50} {}", i + 1, r.candidate.address, utils::format_rate(r));
    }

    Ok(Ranking {
        last_check: directory.last_check,
        listed: directory.candidates.len(),
        results,
    })
}
