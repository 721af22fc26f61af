use crate::error::Result;
use crate::types::ProbeResult;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client. The timeout covers the whole request including the
/// body, so it bounds each probe as well as the directory fetch.
pub fn build_client(timeout_secs: u64, connect_timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(connect_timeout_secs.max(1)))
        .build()?;
    Ok(client)
}

/// Progress bar for probing; hidden when `quiet`
pub fn probe_progress(len: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("|| "));
    }
    pb.set_message("Rating...");
    pb
}

/// `base` + `rest` with exactly one `/` between them. An empty `rest`
/// leaves `base` untouched.
pub fn join_url(base: &str, rest: &str) -> String {
    if rest.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        rest.trim_start_matches('/')
    )
}

/// Human-readable rate, e.g. "3.2500 MiB/s" or "unusable"
pub fn format_rate(result: &ProbeResult) -> String {
    if result.is_usable() {
        format!("{:.4} MiB/s", result.rate / 1024.0 / 1024.0)
    } else {
        "unusable".to_string()
    }
}

/// Back up a file if present
/// Naming: mirrorlist -> mirrorlist.bak.TIMESTAMP
pub async fn backup_file(path: &Path) -> Result<()> {
    if fs::try_exists(path).await.unwrap_or(false) {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let file_name = path.file_name().unwrap_or_default().to_string_lossy();
        let backup_name = format!("{}.bak.{}", file_name, timestamp);
        let backup_path = path.with_file_name(backup_name);

        fs::copy(path, &backup_path).await?;
        tracing::info!("backup created at {}", backup_path.display());
    }
    Ok(())
}

/// URL on a loopback port that was just released, so connecting is refused.
#[cfg(test)]
pub(crate) fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}
