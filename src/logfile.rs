//! Run log files: CSV schema, naming convention and discovery.
//!
//! A run log is a flat CSV, one row per sampling tick:
//!
//! ```text
//! Time,CPU Percent,MEM Usage,IO Reads,_NProc
//! 0.05,103.2,18350080,1228800,3
//! ```
//!
//! Files are named `benchtrace-<tag>-<timestamp>.log`. The tag is free
//! form, but `<program>_<dataset>_<workers>_<engine>` unlocks grouping,
//! labeling and worker-count CPU normalization in `plot`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use regex::Regex;

use crate::error::{BenchtraceError, Result};

pub const LOG_EXTENSION: &str = "log";
const LOG_PREFIX: &str = "benchtrace";
const HEADER: [&str; 5] = ["Time", "CPU Percent", "MEM Usage", "IO Reads", "_NProc"];

/// One sampling tick: summed counters over the tracked process set.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    /// Elapsed seconds since the run started.
    pub time: f64,
    /// Summed CPU percent across tracked processes (can exceed 100).
    pub cpu_percent: f64,
    /// Summed resident memory in bytes.
    pub mem_bytes: f64,
    /// Summed cumulative bytes read from disk.
    pub io_read_bytes: f64,
    /// Number of processes in the tracked set at this tick.
    pub nproc: u64,
}

/// Incremental CSV writer for a run in progress.
///
/// Rows are flushed as they are written so a crashed or interrupted run
/// still leaves a usable log behind.
pub struct LogWriter {
    writer: csv::Writer<File>,
    last_time: f64,
}

impl LogWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self {
            writer,
            last_time: 0.0,
        })
    }

    pub fn append(&mut self, row: &SampleRow) -> Result<()> {
        // Elapsed time in a log is non-decreasing; clamp against clock
        // adjustments.
        let time = row.time.max(self.last_time);
        self.last_time = time;

        self.writer.write_record([
            format!("{:.2}", time),
            format!("{:.2}", row.cpu_percent),
            format!("{:.0}", row.mem_bytes),
            format!("{:.0}", row.io_read_bytes),
            row.nproc.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Parse a run log into rows.
pub fn read_log(path: &Path) -> Result<Vec<SampleRow>> {
    if !path.exists() {
        return Err(BenchtraceError::LogNotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1; data rows start at line 2.
        let line = idx + 2;
        rows.push(parse_row(&record, path, line)?);
    }
    Ok(rows)
}

fn parse_row(record: &csv::StringRecord, path: &Path, line: usize) -> Result<SampleRow> {
    let malformed = |reason: String| BenchtraceError::MalformedLog {
        path: path.to_path_buf(),
        line,
        reason,
    };

    if record.len() != HEADER.len() {
        return Err(malformed(format!(
            "expected {} fields, got {}",
            HEADER.len(),
            record.len()
        )));
    }

    let field = |i: usize| -> Result<f64> {
        record[i]
            .parse::<f64>()
            .map_err(|e| malformed(format!("field '{}': {}", HEADER[i], e)))
    };

    Ok(SampleRow {
        time: field(0)?,
        cpu_percent: field(1)?,
        mem_bytes: field(2)?,
        io_read_bytes: field(3)?,
        nproc: record[4]
            .parse::<u64>()
            .map_err(|e| malformed(format!("field '_NProc': {}", e)))?,
    })
}

/// Log file name for a run starting now: `benchtrace-<tag>-<timestamp>.log`.
pub fn run_log_name(tag: &str, started_at: DateTime<Local>) -> String {
    format!(
        "{}-{}-{}.{}",
        LOG_PREFIX,
        tag,
        started_at.format("%Y-%m-%dT%H:%M:%S"),
        LOG_EXTENSION
    )
}

/// Recover the run tag from a log path.
///
/// Falls back to the whole file stem for logs that were renamed or did
/// not come from `benchtrace run`.
pub fn tag_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let re = Regex::new(&format!(
        r"^{}-(.+)-\d{{4}}-\d{{2}}-\d{{2}}T\d{{2}}:\d{{2}}:\d{{2}}$",
        LOG_PREFIX
    ))
    .expect("static regex");

    match re.captures(&stem) {
        Some(caps) => caps[1].to_string(),
        None => stem,
    }
}

/// Structured view of a run tag.
///
/// Tags following `<program>_<dataset>_<workers>_<engine>` carry enough
/// information to group comparison plots and normalize CPU by worker
/// count. Anything else is kept verbatim as the series label.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTag {
    pub raw: String,
    pub parts: Option<TagParts>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagParts {
    pub program: String,
    pub dataset: String,
    pub workers: u32,
    pub engine: String,
}

impl RunTag {
    pub fn parse(raw: &str) -> Self {
        let re = Regex::new(r"^([^_\s]+)_([^_\s]+)_(\d+)_([^_\s]+)$").expect("static regex");

        let parts = re.captures(raw).and_then(|caps| {
            let workers: u32 = caps[3].parse().ok()?;
            Some(TagParts {
                program: caps[1].to_string(),
                dataset: caps[2].to_string(),
                workers,
                engine: caps[4].to_string(),
            })
        });

        Self {
            raw: raw.to_string(),
            parts,
        }
    }

    /// Worker count for CPU normalization; free-form tags count as 1.
    pub fn workers(&self) -> u32 {
        self.parts
            .as_ref()
            .map(|p| p.workers.max(1))
            .unwrap_or(1)
    }

    /// Legend label: `engine dataset (Nw)` when the tag parses.
    pub fn label(&self) -> String {
        match &self.parts {
            Some(p) => format!("{} {} ({}w)", p.engine, p.dataset, p.workers),
            None => self.raw.clone(),
        }
    }

    /// Runs with the same key belong to the same comparison group.
    pub fn group_key(&self) -> String {
        match &self.parts {
            Some(p) => format!("{}/{}", p.program, p.dataset),
            None => self.raw.clone(),
        }
    }
}

/// Newest `n` log files in `dir` by modification time.
pub fn find_latest_logs(dir: &Path, n: usize) -> Result<Vec<PathBuf>> {
    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        let mtime = entry
            .metadata()?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        logs.push((mtime, path));
    }

    if logs.is_empty() {
        return Err(BenchtraceError::NoLogs(dir.to_path_buf()));
    }

    logs.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(logs.into_iter().take(n).map(|(_, p)| p).collect())
}
