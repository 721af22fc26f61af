use crate::types::{ProbeResult, UNUSABLE_RATE};

/// Fastest first. Stable, so equal rates keep their arrival order, and
/// unusable results end up last. Any non-finite rate counts as unusable.
pub fn rank(mut results: Vec<ProbeResult>) -> Vec<ProbeResult> {
    results.sort_by(|a, b| sort_key(b).total_cmp(&sort_key(a)));
    results
}

fn sort_key(r: &ProbeResult) -> f64 {
    if r.is_usable() {
        r.rate
    } else {
        UNUSABLE_RATE
    }
}
