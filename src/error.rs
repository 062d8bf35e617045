use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchtraceError {
    #[error("Failed to launch target command: {0}")]
    Launch(String),

    #[error("Target process did not appear within the startup window")]
    TargetNotFound,

    #[error("No log files found in {0}")]
    NoLogs(PathBuf),

    #[error("Log file not found: {0}")]
    LogNotFound(PathBuf),

    #[error("Malformed log {path} at line {line}: {reason}")]
    MalformedLog {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Unknown metric selector '{0}' (expected any of: c, m, r)")]
    InvalidMetric(char),

    #[error("Resample interval must be positive, got {0}")]
    InvalidResampleInterval(f64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to register signal handler: {0}")]
    SignalHandler(String),

    #[error("Plot rendering failed: {0}")]
    Plot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, BenchtraceError>;
