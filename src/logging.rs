//! Logging init: everything goes to stderr so stdout carries only the mirrorlist.

use tracing_subscriber::EnvFilter;

/// Map -v / -q counts to a default filter directive.
fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => "info",
        1 => "info,mirrank=debug",
        _ => "debug",
    }
}

/// Initialize structured logging on stderr. `RUST_LOG` wins over the flags.
pub fn init_logging(verbose: u8, quiet: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    // try_init: a second init (tests) is not an error worth crashing over
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
