//! Mirrorlist rendering and saving.

use crate::error::{MirrorError, Result};
use crate::types::ProbeResult;
use crate::utils;
use std::fmt::Write as _;
use std::path::Path;
use tokio::fs;

/// One `Server = <address>/<suffix>` line per result, ranked order preserved.
pub fn render_mirrorlist(
    results: &[ProbeResult],
    suffix: &str,
    last_check: &str,
    drop_unusable: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "##");
    let _ = writeln!(out, "## Mirrors ranked by transfer rate");
    let _ = writeln!(out, "## Directory checked: {}", last_check);
    let _ = writeln!(out, "## Generated: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "##");
    let _ = writeln!(out);

    for r in results {
        if drop_unusable && !r.is_usable() {
            continue;
        }
        let _ = writeln!(out, "Server = {}", utils::join_url(&r.candidate.address, suffix));
    }
    out
}

/// Write the mirrorlist, keeping a timestamped copy of what was there before.
/// A list without any `Server =` line is refused and the file left alone.
pub async fn save_mirrorlist(path: &Path, content: &str) -> Result<()> {
    if !content.lines().any(|l| l.starts_with("Server = ")) {
        return Err(MirrorError::Config(format!(
            "refusing to overwrite {} with a mirrorlist that has no servers",
            path.display()
        )));
    }
    utils::backup_file(path).await?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, content).await?;
    tracing::info!("mirrorlist written to {}", path.display());
    Ok(())
}
