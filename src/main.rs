//! benchtrace CLI entry point.
//!
//! Parses command-line arguments and dispatches to the appropriate command handler.

use benchtrace::commands::{
    clean_command, config_display_command, config_set_command, plot_command, run_command,
    PlotArgs, RunOptions,
};
use benchtrace::completion::{print_completion_script, ShellType, SUPPORTED_SHELLS};
use benchtrace::output::print_error;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "benchtrace")]
#[command(
    version,
    about = "Trace resource usage of benchmark runs and plot comparisons",
    after_help = "EXAMPLES:
    # Run a benchmark and log CPU/memory/disk-read samples
    benchtrace run 'souffle -F facts -D out reachable.dl' tc_graph_4_souffle

    # Also track a database daemon the target talks to
    benchtrace run 'psql -f bench.sql' tc_graph_1_postgres --monitor postgres

    # Plot the last three runs, CPU and memory only
    benchtrace plot --last 3 --metrics cm

    # Compare specific logs, resampled to 1s buckets, CPU per worker
    benchtrace plot --logs a.log b.log --resample 1 --pretty"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command and log resource samples until it exits
    #[command(after_help = "EXAMPLES:
    benchtrace run 'make bench' nightly
    benchtrace run './engine --jobs 8' tc_ontology_8_custom --monitor postgres redis-server

TAG CONVENTION:
    Tags shaped like <program>_<dataset>_<workers>_<engine> let `plot`
    group runs, label series, and normalize CPU by worker count.")]
    Run {
        /// Shell command that launches the benchmark target
        cmd: String,

        /// Tag naming this run (see tag convention below)
        tag: String,

        /// Also track top-level system processes with these names
        #[arg(long, num_args = 1..)]
        monitor: Vec<String>,

        /// Directory for the log file (overrides config)
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Plot stats from previous runs
    #[command(after_help = "EXAMPLES:
    benchtrace plot --last 2
    benchtrace plot --logs runs/a.log runs/b.log --metrics cr
    benchtrace plot --last 5 --resample 1 --max-time 120 --out cmp/

METRICS:
    c = CPU percent, m = memory (MB), r = disk reads (KB)")]
    Plot {
        /// Paths to log files of runs
        #[arg(long, num_args = 1.., conflicts_with = "last")]
        logs: Vec<PathBuf>,

        /// Plot the N most recent runs instead
        #[arg(long)]
        last: Option<usize>,

        /// Metric selection, e.g. "cmr" (overrides config)
        #[arg(long)]
        metrics: Option<String>,

        /// Resample rows into buckets of this many seconds
        #[arg(long)]
        resample: Option<f64>,

        /// Normalize CPU percent by the tag's worker count
        #[arg(long)]
        pretty: bool,

        /// Cap the memory chart at this many MB
        #[arg(long)]
        max_mem: Option<f64>,

        /// Drop samples past this many seconds
        #[arg(long)]
        max_time: Option<f64>,

        /// Output directory for charts (default: <log-dir>/plots)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Directory to search for logs (overrides config)
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Remove old run logs
    Clean {
        /// Remove every log, including the newest
        #[arg(long, conflicts_with = "keep")]
        all: bool,

        /// How many recent logs to keep
        #[arg(long, default_value_t = 1)]
        keep: usize,

        /// Directory to clean (overrides config)
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Show or change configuration values
    Config {
        #[command(subcommand)]
        subcommand: Option<ConfigSubcommand>,
    },

    /// Generate a shell completion script
    #[command(hide = true)]
    Completions {
        /// Shell type (bash, zsh, or fish)
        shell: String,
    },
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Set a configuration value (log_dir, metrics, pretty)
    Set { key: String, value: String },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            cmd,
            tag,
            monitor,
            log_dir,
        } => match run_command(RunOptions {
            cmd,
            tag,
            monitor,
            log_dir,
        }) {
            // Propagate the target's own exit code.
            Ok(code) => std::process::exit(code),
            Err(e) => Err(e),
        },

        Commands::Plot {
            logs,
            last,
            metrics,
            resample,
            pretty,
            max_mem,
            max_time,
            out,
            log_dir,
        } => plot_command(PlotArgs {
            logs,
            last,
            metrics,
            resample,
            pretty,
            max_mem,
            max_time,
            out_dir: out,
            log_dir,
        }),

        Commands::Clean { all, keep, log_dir } => clean_command(log_dir, all, keep),

        Commands::Config { subcommand } => match subcommand {
            None => config_display_command(),
            Some(ConfigSubcommand::Set { key, value }) => config_set_command(&key, &value),
        },

        Commands::Completions { shell } => match ShellType::from_name(&shell) {
            Ok(shell_type) => {
                print_completion_script(shell_type, &mut Cli::command());
                Ok(())
            }
            Err(e) => {
                print_error(&format!(
                    "{}\nSupported shells: {}",
                    e,
                    SUPPORTED_SHELLS.join(", ")
                ));
                std::process::exit(1);
            }
        },
    };

    if let Err(e) = result {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn run_parses_cmd_and_tag() {
        let cli = Cli::try_parse_from(["benchtrace", "run", "sleep 5", "smoke"]).unwrap();
        if let Commands::Run {
            cmd, tag, monitor, ..
        } = cli.command
        {
            assert_eq!(cmd, "sleep 5");
            assert_eq!(tag, "smoke");
            assert!(monitor.is_empty());
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn run_accepts_multiple_monitor_names() {
        let cli = Cli::try_parse_from([
            "benchtrace",
            "run",
            "psql -f bench.sql",
            "tc_graph_1_postgres",
            "--monitor",
            "postgres",
            "redis-server",
        ])
        .unwrap();
        if let Commands::Run { monitor, .. } = cli.command {
            assert_eq!(monitor, vec!["postgres", "redis-server"]);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn run_requires_both_positionals() {
        assert!(Cli::try_parse_from(["benchtrace", "run"]).is_err());
        assert!(Cli::try_parse_from(["benchtrace", "run", "sleep 5"]).is_err());
    }

    #[test]
    fn plot_accepts_multiple_logs() {
        let cli =
            Cli::try_parse_from(["benchtrace", "plot", "--logs", "a.log", "b.log"]).unwrap();
        if let Commands::Plot { logs, last, .. } = cli.command {
            assert_eq!(logs.len(), 2);
            assert!(last.is_none());
        } else {
            panic!("Expected Plot command");
        }
    }

    #[test]
    fn plot_logs_and_last_conflict() {
        let result =
            Cli::try_parse_from(["benchtrace", "plot", "--logs", "a.log", "--last", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn plot_parses_shaping_flags() {
        let cli = Cli::try_parse_from([
            "benchtrace",
            "plot",
            "--last",
            "3",
            "--metrics",
            "cm",
            "--resample",
            "0.5",
            "--pretty",
            "--max-mem",
            "4096",
            "--max-time",
            "120",
        ])
        .unwrap();
        if let Commands::Plot {
            last,
            metrics,
            resample,
            pretty,
            max_mem,
            max_time,
            ..
        } = cli.command
        {
            assert_eq!(last, Some(3));
            assert_eq!(metrics.as_deref(), Some("cm"));
            assert_eq!(resample, Some(0.5));
            assert!(pretty);
            assert_eq!(max_mem, Some(4096.0));
            assert_eq!(max_time, Some(120.0));
        } else {
            panic!("Expected Plot command");
        }
    }

    #[test]
    fn clean_defaults_to_keeping_one() {
        let cli = Cli::try_parse_from(["benchtrace", "clean"]).unwrap();
        if let Commands::Clean { all, keep, .. } = cli.command {
            assert!(!all);
            assert_eq!(keep, 1);
        } else {
            panic!("Expected Clean command");
        }
    }

    #[test]
    fn clean_all_conflicts_with_keep() {
        assert!(Cli::try_parse_from(["benchtrace", "clean", "--all", "--keep", "2"]).is_err());
    }

    #[test]
    fn config_set_parses_key_value() {
        let cli = Cli::try_parse_from(["benchtrace", "config", "set", "metrics", "cm"]).unwrap();
        if let Commands::Config {
            subcommand: Some(ConfigSubcommand::Set { key, value }),
        } = cli.command
        {
            assert_eq!(key, "metrics");
            assert_eq!(value, "cm");
        } else {
            panic!("Expected Config set subcommand");
        }
    }

    #[test]
    fn config_without_subcommand_displays() {
        let cli = Cli::try_parse_from(["benchtrace", "config"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config { subcommand: None }
        ));
    }

    #[test]
    fn completions_is_hidden_but_parses() {
        let cli = Cli::try_parse_from(["benchtrace", "completions", "zsh"]).unwrap();
        if let Commands::Completions { shell } = cli.command {
            assert_eq!(shell, "zsh");
        } else {
            panic!("Expected Completions command");
        }
    }

    #[test]
    fn missing_subcommand_shows_usage() {
        assert!(Cli::try_parse_from(["benchtrace"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
