use crate::traits::Prober;
use crate::types::{Candidate, ProbeResult};
use indicatif::ProgressBar;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Probe every candidate with at most `max_concurrency` probes in flight.
///
/// Logic:
/// 1. Spawn one task per candidate right away
/// 2. Each task waits on the admission gate (a semaphore) before probing;
///    its permit is dropped when the task ends, whatever the outcome
/// 3. Results funnel into one channel, drained until every sender is gone
/// 4. A task that panicked never sent anything; its candidate is recorded
///    as unusable so the output still holds one result per candidate
///
/// Results come back in arrival order. The cap is clamped to
/// `1..=Semaphore::MAX_PERMITS`.
pub async fn rate_all<P>(
    prober: Arc<P>,
    candidates: Vec<Candidate>,
    max_concurrency: usize,
    progress: &ProgressBar,
) -> Vec<ProbeResult>
where
    P: Prober + 'static,
{
    let total = candidates.len();
    let gate = Arc::new(Semaphore::new(max_concurrency.clamp(1, Semaphore::MAX_PERMITS)));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut pending = Vec::with_capacity(total);
    for candidate in candidates {
        let prober = Arc::clone(&prober);
        let gate = Arc::clone(&gate);
        let tx = tx.clone();
        let pb = progress.clone();
        let fallback = candidate.clone();

        let handle = tokio::spawn(async move {
            let result = match gate.acquire_owned().await {
                Ok(_permit) => prober.probe(candidate).await,
                // The gate is never closed; keep the candidate anyway
                Err(_) => ProbeResult::unusable(candidate),
            };
            pb.inc(1);
            let _ = tx.send(result);
        });
        pending.push((fallback, handle));
    }
    drop(tx);

    let mut results = Vec::with_capacity(total);
    while let Some(result) = rx.recv().await {
        results.push(result);
    }

    let (fallbacks, handles): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
    let outcomes = futures::future::join_all(handles).await;
    for (candidate, outcome) in fallbacks.into_iter().zip(outcomes) {
        if let Err(e) = outcome {
            tracing::warn!("probe task for {} died: {}", candidate.address, e);
            progress.inc(1);
            results.push(ProbeResult::unusable(candidate));
        }
    }

    debug_assert_eq!(results.len(), total);
    results
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Test double: sleeps, counts overlapping calls, and fails on request.
    /// Addresses containing "fail" are unusable, "panic" makes the call panic,
    /// anything else gets a rate equal to its numeric suffix.
    #[derive(Default)]
    pub(crate) struct CountingProber {
        pub active: AtomicUsize,
        pub peak: AtomicUsize,
        pub calls: AtomicUsize,
        pub delay: Duration,
    }

    impl CountingProber {
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, candidate: Candidate) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if candidate.address.contains("panic") {
                panic!("probe blew up");
            }
            if candidate.address.contains("fail") {
                return ProbeResult::unusable(candidate);
            }
            let rate = candidate
                .address
                .rsplit('/')
                .find(|s| !s.is_empty())
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(1.0);
            ProbeResult::measured(candidate, rate)
        }
    }

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate::new("http", &format!("http://m{}.example/{}/", i, i + 1)))
            .collect()
    }

    fn unique_addresses(results: &[ProbeResult]) -> HashSet<String> {
        results.iter().map(|r| r.candidate.address.clone()).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_hundred_candidates_cap_five() {
        let prober = Arc::new(CountingProber::with_delay(Duration::from_millis(5)));
        let input = candidates(200);

        let results = rate_all(Arc::clone(&prober), input.clone(), 5, &ProgressBar::hidden()).await;

        assert_eq!(results.len(), 200);
        assert_eq!(unique_addresses(&results).len(), 200);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 200);
        assert!(prober.peak.load(Ordering::SeqCst) <= 5);
        assert!(prober.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failures_are_kept_not_dropped() {
        let prober = Arc::new(CountingProber::with_delay(Duration::from_millis(1)));
        let input: Vec<Candidate> = (0..60)
            .map(|i| {
                let tag = if i % 3 == 0 { "fail" } else { "ok" };
                Candidate::new("http", &format!("http://{}{}.example/", tag, i))
            })
            .collect();

        let results = rate_all(prober, input.clone(), 7, &ProgressBar::hidden()).await;

        assert_eq!(results.len(), input.len());
        assert_eq!(unique_addresses(&results), unique_addresses_of(&input));
        assert_eq!(results.iter().filter(|r| !r.is_usable()).count(), 20);
    }

    fn unique_addresses_of(input: &[Candidate]) -> HashSet<String> {
        input.iter().map(|c| c.address.clone()).collect()
    }

    #[tokio::test]
    async fn panicking_probe_still_yields_one_result() {
        let prober = Arc::new(CountingProber::default());
        let input = vec![
            Candidate::new("http", "http://good.example/3/"),
            Candidate::new("http", "http://panic.example/"),
            Candidate::new("http", "http://other.example/9/"),
        ];

        let results = rate_all(prober, input.clone(), 2, &ProgressBar::hidden()).await;

        assert_eq!(results.len(), 3);
        assert_eq!(unique_addresses(&results), unique_addresses_of(&input));
        let panicked = results
            .iter()
            .find(|r| r.candidate.address.contains("panic"))
            .unwrap();
        assert!(!panicked.is_usable());
    }

    #[tokio::test]
    async fn zero_cap_still_makes_progress() {
        let prober = Arc::new(CountingProber::default());
        let results = rate_all(Arc::clone(&prober), candidates(4), 0, &ProgressBar::hidden()).await;
        assert_eq!(results.len(), 4);
        assert_eq!(prober.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn oversized_cap_is_clamped() {
        let prober = Arc::new(CountingProber::default());
        let results = rate_all(prober, candidates(3), usize::MAX, &ProgressBar::hidden()).await;
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn empty_input() {
        let prober = Arc::new(CountingProber::default());
        let results = rate_all(prober, Vec::new(), 5, &ProgressBar::hidden()).await;
        assert!(results.is_empty());
    }
}
