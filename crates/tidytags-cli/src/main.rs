mod logging;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tidytags_engine::{PlanOptions, DEFAULT_SIMILARITY_THRESHOLD};
use tidytags_sync::{
    load_plan, report, AnalyzeOptions, JunkOptions, NormalizeOptions, RunConfig, TagPipeline,
};

#[derive(Debug, Parser)]
#[command(name = "tidytags")]
#[command(about = "Consolidate, normalize and prune bookmark tags")]
struct Cli {
    /// Read and decide everything, write nothing.
    #[arg(long, global = true)]
    dry_run: bool,
    #[arg(long, global = true)]
    verbose: bool,
    #[arg(long, global = true)]
    log_json: bool,
    /// Overrides TIDYTAGS_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    #[arg(long, global = true)]
    blocklist: Option<PathBuf>,
    #[arg(long, global = true)]
    reports_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Back up the tag list and write a consolidation plan; changes nothing.
    Analyze(AnalyzeArgs),
    /// Execute a consolidation plan (a saved one, or a freshly computed one).
    Apply {
        /// Plan written by an earlier `analyze` run.
        #[arg(long)]
        plan: Option<PathBuf>,
        #[command(flatten)]
        planning: PlanArgs,
    },
    /// Normalize tags on recently updated links.
    Normalize {
        /// Minutes to look back from now.
        #[arg(long, default_value_t = 15)]
        lookback: i64,
        #[arg(long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
        similarity_threshold: f64,
    },
    /// Find junk tags and delete them.
    Junk {
        /// Report only.
        #[arg(long)]
        analyze: bool,
        /// Only delete junk tags used at most this many times (0 = any).
        #[arg(long, default_value_t = 0)]
        min_usage: u64,
        /// Write junk_tags.json to the run's report directory.
        #[arg(long)]
        export: bool,
        /// Confirm deletion; without it the pass is a dry run.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Args)]
struct PlanArgs {
    /// Tags used fewer times than this are deleted.
    #[arg(long, default_value_t = 3)]
    threshold: u64,
    #[arg(long)]
    keep_low_use: bool,
    /// Also delete tags classified as junk.
    #[arg(long)]
    include_junk: bool,
}

impl Default for PlanArgs {
    fn default() -> Self {
        Self {
            threshold: 3,
            keep_low_use: false,
            include_junk: false,
        }
    }
}

impl PlanArgs {
    fn options(&self) -> PlanOptions {
        PlanOptions {
            low_use_threshold: self.threshold,
            delete_low_use: !self.keep_low_use,
            include_junk: self.include_junk,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    planning: PlanArgs,
    /// Minimum Jaro-Winkler score for near-duplicate review pairs.
    #[arg(long, default_value_t = 0.92)]
    review_threshold: f64,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            planning: PlanArgs::default(),
            review_threshold: 0.92,
        }
    }
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::from_env();
        config.dry_run = self.dry_run;
        if let Some(url) = &self.api_url {
            config.api_url = Some(url.clone());
        }
        if let Some(rules) = &self.rules {
            config.rules_path = Some(rules.clone());
        }
        if let Some(blocklist) = &self.blocklist {
            config.blocklist_path = blocklist.clone();
        }
        if let Some(dir) = &self.reports_dir {
            config.reports_dir = dir.clone();
        }
        config
    }
}

fn lookback_window(minutes: i64) -> Result<chrono::TimeDelta> {
    match chrono::TimeDelta::try_minutes(minutes) {
        Some(window) if minutes >= 0 => Ok(window),
        _ => bail!("--lookback {minutes} is out of range"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.log_json)?;

    let config = cli.run_config();
    let pipeline = TagPipeline::from_config(&config)?;
    tracing::info!(run_id = %pipeline.run_id(), dry_run = config.dry_run, "starting run");

    let errors = match cli.command.unwrap_or(Commands::Analyze(AnalyzeArgs::default())) {
        Commands::Analyze(args) => {
            let options = AnalyzeOptions {
                plan: args.planning.options(),
                review_threshold: args.review_threshold,
            };
            let summary = pipeline.analyze(&options).await?;
            println!("{}", report::render_analysis(&summary));
            0
        }
        Commands::Apply { plan, planning } => {
            let plan = match plan {
                Some(path) => Some(load_plan(&path).await?),
                None => None,
            };
            let summary = pipeline.apply(plan, &planning.options()).await?;
            println!("{}", report::render_apply(&summary));
            summary.errors
        }
        Commands::Normalize {
            lookback,
            similarity_threshold,
        } => {
            let options = NormalizeOptions {
                lookback: lookback_window(lookback)?,
                similarity_threshold,
            };
            let summary = pipeline.normalize_recent(&options).await?;
            println!("{}", report::render_normalize(&summary));
            summary.errors
        }
        Commands::Junk {
            analyze,
            min_usage,
            export,
            yes,
        } => {
            let options = JunkOptions {
                analyze_only: analyze,
                min_usage,
                export,
                confirmed: yes,
            };
            let summary = pipeline.remove_junk(&options).await?;
            println!("{}", report::render_junk(&summary));
            summary.errors
        }
    };

    if errors > 0 {
        bail!("{errors} store operation(s) failed; see log for details");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn plan_flags_map_onto_options() {
        let cli = Cli::parse_from(["tidytags", "apply", "--threshold", "5", "--keep-low-use", "--dry-run"]);
        assert!(cli.dry_run);
        match cli.command {
            Some(Commands::Apply { plan, planning }) => {
                assert!(plan.is_none());
                let options = planning.options();
                assert_eq!(options.low_use_threshold, 5);
                assert!(!options.delete_low_use);
                assert!(!options.include_junk);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn junk_defaults_to_unconfirmed() {
        let cli = Cli::parse_from(["tidytags", "junk", "--min-usage", "2"]);
        match cli.command {
            Some(Commands::Junk { yes, min_usage, analyze, .. }) => {
                assert!(!yes);
                assert!(!analyze);
                assert_eq!(min_usage, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn lookback_outside_the_time_range_is_an_error() {
        assert_eq!(lookback_window(15).unwrap(), chrono::TimeDelta::minutes(15));
        assert!(lookback_window(-1).is_err());
        assert!(lookback_window(i64::MAX).is_err());
    }
}
