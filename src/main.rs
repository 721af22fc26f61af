mod config;
mod error;
mod logging;
mod pipeline;
mod traits;
mod types;
mod utils;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::Settings;
use pipeline::directory::HttpDirectory;
use pipeline::probe::HttpProber;
use pipeline::select::SortBy;
use pipeline::{output, Plan};
use std::path::PathBuf;
use std::sync::Arc;
use traits::Prober;
use types::Candidate;

#[derive(Parser)]
#[command(name = "mirrank")]
#[command(about = "Rank package mirrors by measured transfer rate", long_about = None)]
struct Cli {
    /// Read settings from this file instead of the user config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors, no progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rate the selected mirrors and print a ranked mirrorlist
    Rank {
        #[command(flatten)]
        select: SelectArgs,

        #[command(flatten)]
        probe: ProbeArgs,

        /// Appended to every address in the mirrorlist
        #[arg(long)]
        suffix: Option<String>,

        /// Leave mirrors whose probe failed out of the list
        #[arg(long)]
        drop_unusable: bool,

        /// Write the mirrorlist here (existing file is backed up) instead of stdout
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Show which mirrors would be rated, without probing them
    List {
        #[command(flatten)]
        select: SelectArgs,
    },
    /// Rate a single mirror address (e.g. mirrank probe https://mirror.example/archlinux/)
    Probe {
        /// Mirror base address
        address: String,

        #[command(flatten)]
        probe: ProbeArgs,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct SelectArgs {
    /// Mirror status endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Keep mirrors using this protocol (repeatable)
    #[arg(long = "protocol", short = 'p')]
    protocols: Vec<String>,

    /// Keep mirrors in this country, by code or name (repeatable)
    #[arg(long = "country", short = 'c')]
    countries: Vec<String>,

    /// Drop mirrors whose address matches this regex
    #[arg(long)]
    exclude: Option<String>,

    /// Drop mirrors below this completion ratio (0.0 - 1.0)
    #[arg(long)]
    min_completion: Option<f64>,

    /// Number of mirrors kept after sorting (0 keeps all)
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Order used before the limit applies
    #[arg(long, value_enum)]
    sort: Option<SortBy>,
}

#[derive(Args)]
struct ProbeArgs {
    /// Maximum number of probes in flight
    #[arg(long, short = 'j')]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// File downloaded from each mirror to measure its rate
    #[arg(long)]
    probe_path: Option<String>,
}

impl SelectArgs {
    fn apply(self, s: &mut Settings) {
        if let Some(endpoint) = self.endpoint {
            s.endpoint = endpoint;
        }
        if !self.protocols.is_empty() {
            s.protocols = self.protocols;
        }
        if !self.countries.is_empty() {
            s.countries = self.countries;
        }
        if self.exclude.is_some() {
            s.exclude = self.exclude;
        }
        if self.min_completion.is_some() {
            s.min_completion = self.min_completion;
        }
        if let Some(limit) = self.limit {
            s.limit = if limit == 0 { None } else { Some(limit) };
        }
        if let Some(sort) = self.sort {
            s.sort_by = sort;
        }
    }
}

impl ProbeArgs {
    fn apply(self, s: &mut Settings) {
        if let Some(concurrency) = self.concurrency {
            s.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            s.timeout_secs = timeout;
        }
        if let Some(probe_path) = self.probe_path {
            s.probe_path = probe_path;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let (mut settings, loaded_from) = config::load(cli.config.as_deref())
        .await
        .context("could not load configuration")?;

    match cli.command {
        Commands::Rank {
            select,
            probe,
            suffix,
            drop_unusable,
            save,
        } => {
            select.apply(&mut settings);
            probe.apply(&mut settings);
            if let Some(suffix) = suffix {
                settings.suffix = suffix;
            }
            handle_rank(&settings, cli.quiet, drop_unusable, save).await?
        }
        Commands::List { select } => {
            select.apply(&mut settings);
            handle_list(&settings).await?
        }
        Commands::Probe { address, probe } => {
            probe.apply(&mut settings);
            handle_probe(&settings, &address).await?
        }
        Commands::Config => handle_config(&settings, loaded_from)?,
    }

    Ok(())
}

// --- Handlers ---

async fn handle_rank(
    settings: &Settings,
    quiet: bool,
    drop_unusable: bool,
    save: Option<PathBuf>,
) -> Result<()> {
    tracing::info!("mirrank started");

    let plan = Plan::from_settings(settings)?;
    let client = utils::build_client(settings.timeout_secs, settings.connect_timeout_secs)?;
    let directory = HttpDirectory::new(client.clone(), &settings.endpoint);
    let prober = Arc::new(HttpProber::new(client, &settings.probe_path));
    let progress = utils::probe_progress(0, quiet);

    let ranking = match pipeline::run(&directory, prober, &plan, &progress).await {
        Ok(ranking) => ranking,
        Err(e) => {
            progress.finish_and_clear();
            if e.is_transport() {
                tracing::error!("mirror directory unreachable: {}", e);
            } else {
                tracing::error!("mirror directory unusable: {}", e);
            }
            return Err(anyhow::Error::new(e).context("could not fetch the mirror directory"));
        }
    };
    tracing::info!(
        "{} of {} listed mirrors ranked",
        ranking.results.len(),
        ranking.listed
    );

    let text = output::render_mirrorlist(
        &ranking.results,
        &settings.suffix,
        &ranking.last_check,
        drop_unusable,
    );

    match save {
        Some(path) => output::save_mirrorlist(&path, &text).await?,
        None => {
            println!();
            print!("{}", text);
        }
    }

    Ok(())
}

async fn handle_list(settings: &Settings) -> Result<()> {
    let plan = Plan::from_settings(settings)?;
    let client = utils::build_client(settings.timeout_secs, settings.connect_timeout_secs)?;
    let directory = HttpDirectory::new(client, &settings.endpoint);

    let (status, selected) = pipeline::fetch_and_select(&directory, &plan)
        .await
        .context("could not fetch the mirror directory")?;

    println!(
        "Directory checked {} ({} mirrors, {} selected)",
        status.last_check,
        status.candidates.len(),
        selected.len()
    );
    println!("{}", "-".repeat(100));
    println!(
        "{:<4} {:<22} {:<4} {:<7} {:<15} URL",
        "RANK", "LAST SYNC", "CC", "SCORE", "DURATION"
    );
    println!("{}", "-".repeat(100));

    let fmt = |v: Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".to_string());
    for (i, c) in selected.iter().enumerate() {
        let duration = format!("{}±{}", fmt(c.duration_avg), fmt(c.duration_std_dev));
        println!(
            "{:<4} {:<22} {:<4} {:<7} {:<15} {}",
            i + 1,
            c.last_sync.as_deref().unwrap_or("never"),
            c.country_code,
            fmt(c.score),
            duration,
            c.address
        );
    }

    Ok(())
}

async fn handle_probe(settings: &Settings, address: &str) -> Result<()> {
    let client = utils::build_client(settings.timeout_secs, settings.connect_timeout_secs)?;
    let prober = HttpProber::new(client, &settings.probe_path);
    let protocol = address.split("://").next().unwrap_or("http");

    println!("Probing {}", prober.target_url(address));
    let result = prober.probe(Candidate::new(protocol, address)).await;
    println!("{:<50} {}", result.candidate.address, utils::format_rate(&result));

    Ok(())
}

fn handle_config(settings: &Settings, loaded_from: Option<PathBuf>) -> Result<()> {
    match loaded_from {
        Some(path) => println!("# loaded from {}", path.display()),
        None => match config::default_path() {
            Some(path) => println!("# built-in defaults ({} not found)", path.display()),
            None => println!("# built-in defaults"),
        },
    }
    print!("{}", settings.to_toml()?);
    Ok(())
}
