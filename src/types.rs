use serde::{Deserialize, Serialize};

/// Rate recorded for a mirror whose probe failed. Sorts below every measured
/// rate, zero included.
pub const UNUSABLE_RATE: f64 = f64::NEG_INFINITY;

/// One mirror entry from the status directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub protocol: String, // e.g. "http", "https", "rsync"
    #[serde(rename = "url")]
    pub address: String, // e.g. "http://mirror.example.org/archlinux/"
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    // The directory reports null for mirrors that never synced.
    #[serde(default)]
    pub last_sync: Option<String>,
    #[serde(default)]
    pub delay: Option<i64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub completion_pct: Option<f64>,
    #[serde(default, rename = "duration_stddev")]
    pub duration_std_dev: Option<f64>,
    #[serde(default)]
    pub duration_avg: Option<f64>,
}

impl Candidate {
    /// Bare candidate with only protocol and address set (used by `probe`).
    pub fn new(protocol: &str, address: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            address: address.to_string(),
            country: String::new(),
            country_code: String::new(),
            last_sync: None,
            delay: None,
            score: None,
            completion_pct: None,
            duration_std_dev: None,
            duration_avg: None,
        }
    }
}

/// Envelope returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryStatus {
    pub cutoff: i64,
    pub check_frequency: i64,
    pub num_checks: i64,
    pub last_check: String,
    pub version: i64,
    #[serde(rename = "urls")]
    pub candidates: Vec<Candidate>,
}

/// Probe outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub candidate: Candidate,
    pub rate: f64, // bytes per second, UNUSABLE_RATE on failure
}

impl ProbeResult {
    /// NaN, infinite or negative rates are recorded as unusable.
    pub fn measured(candidate: Candidate, rate: f64) -> Self {
        if rate.is_finite() && rate >= 0.0 {
            Self { candidate, rate }
        } else {
            Self::unusable(candidate)
        }
    }

    pub fn unusable(candidate: Candidate) -> Self {
        Self {
            candidate,
            rate: UNUSABLE_RATE,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.rate.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "cutoff": 86400,
        "last_check": "2024-05-01T10:21:05.123Z",
        "num_checks": 91,
        "check_frequency": 600,
        "version": 3,
        "urls": [
            {
                "url": "http://mirror.example.org/archlinux/",
                "protocol": "http",
                "last_sync": "2024-05-01T09:00:00Z",
                "completion_pct": 1.0,
                "delay": 3600,
                "duration_avg": 0.42,
                "duration_stddev": 0.11,
                "score": 1.5,
                "active": true,
                "country": "Germany",
                "country_code": "DE",
                "isos": true,
                "ipv4": true,
                "ipv6": false,
                "details": "https://archlinux.org/mirrors/example/1/"
            },
            {
                "url": "rsync://stale.example.net/archlinux/",
                "protocol": "rsync",
                "last_sync": null,
                "completion_pct": 0.0,
                "delay": null,
                "duration_avg": null,
                "duration_stddev": null,
                "score": null,
                "active": true,
                "country": "",
                "country_code": ""
            }
        ]
    }"#;

    #[test]
    fn decodes_directory_payload() {
        let status: DirectoryStatus = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(status.cutoff, 86400);
        assert_eq!(status.check_frequency, 600);
        assert_eq!(status.version, 3);
        assert_eq!(status.candidates.len(), 2);

        let first = &status.candidates[0];
        assert_eq!(first.address, "http://mirror.example.org/archlinux/");
        assert_eq!(first.country_code, "DE");
        assert_eq!(first.duration_std_dev, Some(0.11));
        assert_eq!(first.delay, Some(3600));
    }

    #[test]
    fn null_health_stats_decode_as_none() {
        let status: DirectoryStatus = serde_json::from_str(SAMPLE).unwrap();
        let stale = &status.candidates[1];
        assert!(stale.last_sync.is_none());
        assert!(stale.score.is_none());
        assert!(stale.delay.is_none());
    }

    #[test]
    fn unusable_sorts_below_zero() {
        let c = Candidate::new("http", "http://a/");
        let zero = ProbeResult::measured(c.clone(), 0.0);
        let failed = ProbeResult::unusable(c);
        assert!(zero.is_usable());
        assert!(!failed.is_usable());
        assert!(failed.rate < zero.rate);
    }

    #[test]
    fn nonsense_rates_become_unusable() {
        let c = Candidate::new("http", "http://a/");
        for rate in [f64::NAN, f64::INFINITY, -1.0, f64::NEG_INFINITY] {
            let r = ProbeResult::measured(c.clone(), rate);
            assert!(!r.is_usable());
            assert_eq!(r.rate, UNUSABLE_RATE);
        }
        assert_eq!(ProbeResult::measured(c, 12.5).rate, 12.5);
    }
}
