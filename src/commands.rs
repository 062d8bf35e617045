//! Command handlers behind the CLI.

use std::fs;
use std::path::PathBuf;

use chrono::Local;

use crate::config::Config;
use crate::error::{BenchtraceError, Result};
use crate::launch;
use crate::logfile::{self, LogWriter};
use crate::output;
use crate::plot::{self, Metric, PlotOptions};
use crate::sampler::{self, Sampler};
use crate::signal::Interrupt;

pub struct RunOptions {
    pub cmd: String,
    pub tag: String,
    pub monitor: Vec<String>,
    pub log_dir: Option<PathBuf>,
}

/// Launch the target, sample it until exit, and return the child's own
/// exit code so scripts wrapping `benchtrace run` see the real result.
pub fn run_command(opts: RunOptions) -> Result<i32> {
    let log_dir = match opts.log_dir {
        Some(dir) => dir,
        None => Config::load()?.log_dir,
    };

    output::print_header();
    output::print_sys_metadata();

    let interrupt = Interrupt::install()?;

    let log_path = log_dir.join(logfile::run_log_name(&opts.tag, Local::now()));
    let mut writer = LogWriter::create(&log_path)?;
    output::print_info(&format!("logging stats to: {}", log_path.display()));

    // The writer exists before the child does, so a failed launch never
    // leaves an unmonitored benchmark running.
    let mut target = match launch::launch(&opts.cmd) {
        Ok(target) => target,
        Err(e) => {
            let _ = fs::remove_file(&log_path);
            return Err(e);
        }
    };
    output::print_info(&format!(
        "started process: {} (pid {})",
        target.name, target.pid
    ));

    let mut sampler = Sampler::new(target.pid, opts.monitor);

    output::print_banner("SAMPLING");
    match sampler::sample_until_exit(&mut target.shell, &mut sampler, &mut writer, &interrupt) {
        Ok(outcome) if outcome.interrupted => {
            output::print_warning("interrupted, terminating child processes");
            let killed = sampler.kill_tracked();
            let _ = target.shell.kill();
            let status = target.shell.wait()?;
            output::print_info(&format!(
                "wrote {} samples, killed {} processes",
                outcome.rows, killed
            ));
            // 130 is the conventional SIGINT exit code.
            Ok(status.code().unwrap_or(130))
        }
        Ok(outcome) => {
            let status = target.shell.wait()?;
            output::print_banner("DONE");
            output::print_info(&format!(
                "wrote {} samples to {}",
                outcome.rows,
                log_path.display()
            ));
            if !status.success() {
                output::print_warning(&format!("target exited with {status}"));
            }
            Ok(status.code().unwrap_or(0))
        }
        Err(e) => {
            // The log written so far stays on disk. After best-effort
            // cleanup the run still reports the child's exit code.
            output::print_error(&e.to_string());
            let _ = sampler.kill_tracked();
            let _ = target.shell.kill();
            let status = target.shell.wait()?;
            Ok(status.code().unwrap_or(1))
        }
    }
}

pub struct PlotArgs {
    pub logs: Vec<PathBuf>,
    pub last: Option<usize>,
    pub metrics: Option<String>,
    pub resample: Option<f64>,
    pub pretty: bool,
    pub max_mem: Option<f64>,
    pub max_time: Option<f64>,
    pub out_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

pub fn plot_command(args: PlotArgs) -> Result<()> {
    let config = Config::load()?;
    let log_dir = args.log_dir.unwrap_or(config.log_dir);

    let paths = if args.logs.is_empty() {
        logfile::find_latest_logs(&log_dir, args.last.unwrap_or(1))?
    } else {
        args.logs
    };

    let selector = args.metrics.unwrap_or(config.metrics);
    let opts = PlotOptions {
        metrics: Metric::parse_selector(&selector)?,
        resample: args.resample,
        pretty: args.pretty || config.pretty,
        max_mem_mb: args.max_mem,
        max_time_secs: args.max_time,
        out_dir: args.out_dir.unwrap_or_else(|| log_dir.join("plots")),
    };

    for path in &paths {
        output::print_info(&format!("plotting {}", path.display()));
    }

    let series = plot::prepare_series(&paths, &opts)?;
    let index = plot::render(&series, &opts)?;
    output::print_info(&format!("wrote {}", index.display()));
    Ok(())
}

/// Remove old run logs, keeping the newest `keep` (none with `all`).
pub fn clean_command(log_dir: Option<PathBuf>, all: bool, keep: usize) -> Result<()> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => Config::load()?.log_dir,
    };

    let logs = match logfile::find_latest_logs(&log_dir, usize::MAX) {
        Ok(logs) => logs,
        Err(BenchtraceError::NoLogs(_)) => {
            output::print_info("nothing to clean");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let keep = if all { 0 } else { keep };
    let mut removed = 0;
    for path in logs.iter().skip(keep) {
        fs::remove_file(path)?;
        removed += 1;
    }

    output::print_info(&format!(
        "removed {} log(s), kept {}",
        removed,
        logs.len() - removed
    ));
    Ok(())
}

pub fn config_display_command() -> Result<()> {
    let config = Config::load()?;
    let path = Config::path()?;

    output::print_header();
    if path.exists() {
        output::print_info(&format!("config: {}", path.display()));
    } else {
        output::print_info(&format!("config: {} (defaults, no file)", path.display()));
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn config_set_command(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    match key {
        "log_dir" => config.log_dir = PathBuf::from(value),
        "metrics" => {
            // Must be a valid selector before it is persisted.
            Metric::parse_selector(value)?;
            config.metrics = value.to_string();
        }
        "pretty" => {
            config.pretty = value.parse().map_err(|_| {
                BenchtraceError::Config(format!("expected true/false for 'pretty', got '{value}'"))
            })?;
        }
        other => {
            return Err(BenchtraceError::Config(format!(
                "unknown config key '{other}' (valid: log_dir, metrics, pretty)"
            )));
        }
    }

    config.save()?;
    output::print_info(&format!("set {key} = {value}"));
    Ok(())
}
