use anyhow::{anyhow, Result};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Diagnostics go to stderr so stdout carries only the run report.
///
/// `TIDYTAGS_LOG`, then `RUST_LOG`, override the level chosen by flags.
pub fn init_tracing(verbose: bool, log_json: bool) -> Result<()> {
    let level = if verbose { "tidytags=debug" } else { "tidytags=info" };
    let filter = EnvFilter::try_from_env("TIDYTAGS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()
    };
    installed.map_err(|err| anyhow!("installing tracing subscriber: {err}"))
}
