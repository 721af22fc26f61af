//! Candidate selection: cheap filtering and ordering before anything is probed.

use crate::error::Result;
use crate::types::Candidate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ordering applied to survivors before truncation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Most recently synced first
    #[default]
    Age,
    /// Directory score, lower is better
    Score,
    /// Sync delay, lower is better
    Delay,
    /// Country name, alphabetical
    Country,
}

impl SortBy {
    fn compare(self, a: &Candidate, b: &Candidate) -> Ordering {
        match self {
            // Option orders None first, so reversing puts never-synced last
            SortBy::Age => b.last_sync.cmp(&a.last_sync),
            SortBy::Score => cmp_nulls_last(a.score, b.score, |x, y| x.total_cmp(&y)),
            SortBy::Delay => cmp_nulls_last(a.delay, b.delay, |x, y| x.cmp(&y)),
            SortBy::Country => a.country.cmp(&b.country),
        }
    }
}

fn cmp_nulls_last<T: Copy>(a: Option<T>, b: Option<T>, f: impl Fn(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => f(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Predicate built from the user's selection settings
#[derive(Debug, Clone, Default)]
pub struct Filter {
    protocols: Vec<String>,
    countries: Vec<String>,
    exclude: Option<Regex>,
    min_completion: Option<f64>,
}

impl Filter {
    pub fn new(
        protocols: &[String],
        countries: &[String],
        exclude: Option<&str>,
        min_completion: Option<f64>,
    ) -> Result<Self> {
        let exclude = match exclude {
            Some(pattern) => Some(Regex::new(pattern)?),
            None => None,
        };
        Ok(Self {
            protocols: protocols.iter().map(|p| p.to_lowercase()).collect(),
            countries: countries.iter().map(|c| c.to_lowercase()).collect(),
            exclude,
            min_completion,
        })
    }

    /// Keep only `protocol`
    #[cfg(test)]
    pub fn protocol(protocol: &str) -> Self {
        Self {
            protocols: vec![protocol.to_lowercase()],
            ..Self::default()
        }
    }

    pub fn matches(&self, c: &Candidate) -> bool {
        if !self.protocols.is_empty() && !self.protocols.contains(&c.protocol.to_lowercase()) {
            return false;
        }

        if !self.countries.is_empty() {
            let code = c.country_code.to_lowercase();
            let name = c.country.to_lowercase();
            if !self.countries.iter().any(|want| *want == code || *want == name) {
                return false;
            }
        }

        if let Some(ref re) = self.exclude {
            if re.is_match(&c.address) {
                return false;
            }
        }

        if let Some(min) = self.min_completion {
            if c.completion_pct.unwrap_or(0.0) < min {
                return false;
            }
        }

        true
    }
}

/// Filter, order (stable), then truncate to `limit`.
///
/// Survivors are cloned into a fresh Vec; the input is left untouched.
/// A limit larger than the survivor count returns every survivor.
pub fn select<P>(
    candidates: &[Candidate],
    predicate: P,
    order_by: SortBy,
    limit: Option<usize>,
) -> Vec<Candidate>
where
    P: Fn(&Candidate) -> bool,
{
    let mut selected: Vec<Candidate> = candidates.iter().filter(|&c| predicate(c)).cloned().collect();

    // sort_by is stable: ties keep their directory order
    selected.sort_by(|a, b| order_by.compare(a, b));

    if let Some(n) = limit {
        selected.truncate(n);
    }

    selected
}
