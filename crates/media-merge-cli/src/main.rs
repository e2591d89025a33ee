use clap::{ArgAction, Parser, Subcommand};
use commands::{config, merge};
use media_merge_config::PathManager;
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "mediamerge")]
#[command(about = "mediamerge - Find the same movie or episode across media servers")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Write logs to a daily-rotated file instead of stderr.
    /// Without a PATH, logs go to the logs directory next to the config file.
    #[arg(long, global = true, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    log_file: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge library snapshots from every enabled server
    #[command(long_about = "Load the exported item listing of each configured server, collapse records that share a provider ID (IMDb, TMDb, TVDb, ...) into one, and report which servers disagree on watched state. Press Ctrl-C to cancel; a cancelled merge keeps nothing.")]
    Merge {
        /// Add or replace a server snapshot: NAME=PATH (repeatable)
        #[arg(long = "snapshot", value_name = "NAME=PATH", value_parser = merge::parse_snapshot_arg)]
        snapshots: Vec<(String, PathBuf)>,

        /// Read at most this many items per snapshot
        #[arg(long, value_name = "COUNT")]
        max_items: Option<usize>,

        /// List every merged record, not just the summary
        #[arg(long, action = ArgAction::SetTrue)]
        items: bool,

        /// Skip the unmerged look-alike title report
        #[arg(long, action = ArgAction::SetTrue)]
        no_name_collisions: bool,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the configured servers and merge options
    Show,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let log_file = match cli.log_file.clone() {
        Some(path) if path.as_os_str().is_empty() => Some(
            PathManager::resolve()
                .map_err(|e| color_eyre::eyre::eyre!("{}", e))?
                .default_log_file(),
        ),
        other => other,
    };
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);
    let config_path = cli.config.clone();

    match cli.command {
        Commands::Merge {
            snapshots,
            max_items,
            items,
            no_name_collisions,
        } => {
            let args = merge::MergeArgs {
                config_path,
                snapshots,
                max_items,
                list_items: items,
                skip_name_collisions: no_name_collisions,
            };
            merge::run_merge(args, &output).await
        }
        Commands::Config { cmd } => config::run_config(cmd, config_path, &output),
    }
}
