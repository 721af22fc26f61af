use crate::traits::Prober;
use crate::types::{Candidate, ProbeResult};
use crate::utils;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;

/// Probes a mirror by downloading a fixed reference file and timing it
pub struct HttpProber {
    client: Client,
    probe_path: String,
}

impl HttpProber {
    /// The client's timeout bounds every probe.
    pub fn new(client: Client, probe_path: &str) -> Self {
        Self {
            client,
            probe_path: probe_path.trim_start_matches('/').to_string(),
        }
    }

    /// `<address>/<probe_path>`, joined the same way as mirrorlist lines
    pub fn target_url(&self, address: &str) -> String {
        utils::join_url(address, &self.probe_path)
    }

    /// Bytes received and seconds spent, or None on any failure
    async fn download(&self, url: &str) -> Option<(u64, f64)> {
        let start = Instant::now();

        let mut resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                // Connection refused, DNS failure, timeout...
                tracing::debug!("probe {} failed: {}", url, e);
                return None;
            }
        };

        if !resp.status().is_success() {
            tracing::debug!("probe {} answered {}", url, resp.status());
            return None;
        }

        // Drain chunk by chunk: only the size matters, the content is dropped
        let mut received: u64 = 0;
        loop {
            match resp.chunk().await {
                Ok(Some(chunk)) => received += chunk.len() as u64,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("probe {} broke after {} bytes: {}", url, received, e);
                    return None;
                }
            }
        }

        Some((received, start.elapsed().as_secs_f64()))
    }
}

/// bytes / seconds, or None when the clock did not advance
pub fn transfer_rate(bytes: u64, elapsed_secs: f64) -> Option<f64> {
    if elapsed_secs > 0.0 && elapsed_secs.is_finite() {
        Some(bytes as f64 / elapsed_secs)
    } else {
        None
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, candidate: Candidate) -> ProbeResult {
        let url = self.target_url(&candidate.address);
        tracing::debug!("rating {}", candidate.address);

        let rate = self
            .download(&url)
            .await
            .and_then(|(bytes, secs)| transfer_rate(bytes, secs));

        match rate {
            Some(rate) => ProbeResult::measured(candidate, rate),
            None => ProbeResult::unusable(candidate),
        }
    }
}
