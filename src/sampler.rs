//! Process-set discovery and resource sampling.
//!
//! The sampler owns the set of processes whose counters are summed into
//! one log row per tick: the target, every descendant it spawns, and
//! optionally system-level processes matched by name (for engines that
//! hand work to a daemon instead of forking workers).

use std::collections::HashSet;
use std::process::Child;
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::error::Result;
use crate::logfile::{LogWriter, SampleRow};
use crate::output;
use crate::signal::Interrupt;

/// First polling interval after launch.
pub const INITIAL_INTERVAL: Duration = Duration::from_millis(50);
/// Ceiling for the adaptive interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(1);

/// Next polling interval given the current one and elapsed run time.
///
/// The interval doubles (capped at 1s) once the run has lasted 100x the
/// current interval, so short runs get dense samples while long runs
/// settle at one row per second:
///
/// ```text
/// 00s - 05s: 0.05s
/// 05s - 10s: 0.1s
/// 10s - 20s: 0.2s
/// 20s - 40s: 0.4s
/// 40s - 80s: 0.8s
/// 80s -    : 1s
/// ```
pub fn next_interval(current: Duration, elapsed_secs: f64) -> Duration {
    let dt = current.as_secs_f64();
    let cap = MAX_INTERVAL.as_secs_f64();
    if dt < cap && elapsed_secs > 100.0 * dt {
        Duration::from_secs_f64((2.0 * dt).min(cap))
    } else {
        current
    }
}

/// Counters summed over the tracked set at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub cpu_percent: f64,
    pub mem_bytes: u64,
    pub io_read_bytes: u64,
    pub nproc: usize,
    pub target_alive: bool,
}

/// Maintains the tracked process set and reads its counters.
pub struct Sampler {
    system: System,
    target: Pid,
    tracked: Vec<Pid>,
    seen: HashSet<Pid>,
    monitor_names: Vec<String>,
}

impl Sampler {
    pub fn new(target_pid: u32, monitor_names: Vec<String>) -> Self {
        let target = Pid::from_u32(target_pid);
        Self {
            system: System::new(),
            target,
            tracked: vec![target],
            seen: HashSet::from([target]),
            monitor_names,
        }
    }

    pub fn target(&self) -> u32 {
        self.target.as_u32()
    }

    /// Refresh the process table, grow the tracked set, and sum counters.
    ///
    /// Vanished processes are dropped from the set; the target itself is
    /// kept (and flagged) so the caller can report it while continuing to
    /// watch for monitored siblings.
    pub fn tick(&mut self) -> Sample {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_disk_usage(),
        );

        for pid in descendants(&self.system, self.target) {
            if self.seen.insert(pid) {
                self.tracked.push(pid);
            }
        }
        if !self.monitor_names.is_empty() {
            self.discover_monitored();
        }

        let mut sample = Sample {
            cpu_percent: 0.0,
            mem_bytes: 0,
            io_read_bytes: 0,
            nproc: 0,
            target_alive: true,
        };

        let mut gone: Vec<Pid> = Vec::new();
        for &pid in &self.tracked {
            match self.system.process(pid) {
                Some(process) => {
                    sample.cpu_percent += f64::from(process.cpu_usage());
                    sample.mem_bytes += process.memory();
                    sample.io_read_bytes += process.disk_usage().total_read_bytes;
                }
                None if pid == self.target => sample.target_alive = false,
                None => gone.push(pid),
            }
        }
        // Dead pids stay in `seen` so a recycled pid is not re-adopted.
        self.tracked.retain(|pid| !gone.contains(pid));
        sample.nproc = self.tracked.len();
        sample
    }

    /// Adopt top-level system processes whose name is on the monitor list.
    fn discover_monitored(&mut self) {
        let init = Pid::from_u32(1);
        let mut matched: Vec<Pid> = Vec::new();
        for (pid, process) in self.system.processes() {
            if process.parent() != Some(init) {
                continue;
            }
            let name = process.name().to_string_lossy();
            if self.monitor_names.iter().any(|m| name == m.as_str()) {
                matched.push(*pid);
            }
        }
        for pid in matched {
            if self.seen.insert(pid) {
                self.tracked.push(pid);
            }
        }
    }

    /// Force-terminate whatever is still running in the tracked set.
    ///
    /// Returns the number of processes that received the kill.
    pub fn kill_tracked(&mut self) -> usize {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());

        let mut killed = 0;
        for &pid in &self.tracked {
            if let Some(process) = self.system.process(pid) {
                if process.kill() {
                    killed += 1;
                }
            }
        }
        killed
    }

    #[cfg(test)]
    fn tracked_pids(&self) -> Vec<u32> {
        self.tracked.iter().map(|p| p.as_u32()).collect()
    }
}

/// All transitive children of `root` in the current process table.
pub(crate) fn descendants(system: &System, root: Pid) -> Vec<Pid> {
    let mut acc = Vec::new();
    collect_descendants(system, root, &mut acc);
    acc
}

fn collect_descendants(system: &System, root: Pid, acc: &mut Vec<Pid>) {
    for (pid, process) in system.processes() {
        if process.parent() == Some(root) {
            acc.push(*pid);
            collect_descendants(system, *pid, acc);
        }
    }
}

/// Outcome of the sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub rows: usize,
    pub interrupted: bool,
}

/// Poll the tracked set until the launched shell exits or SIGINT arrives.
///
/// One row is appended per tick; the interval adapts via
/// [`next_interval`]. The caller is responsible for cleanup when
/// `interrupted` comes back true.
pub fn sample_until_exit(
    shell: &mut Child,
    sampler: &mut Sampler,
    writer: &mut LogWriter,
    interrupt: &Interrupt,
) -> Result<LoopOutcome> {
    let start = Instant::now();
    let mut dt = INITIAL_INTERVAL;
    let mut rows = 0;
    let mut target_reported = false;

    while shell.try_wait()?.is_none() {
        if interrupt.is_raised() {
            output::end_stats_line();
            return Ok(LoopOutcome {
                rows,
                interrupted: true,
            });
        }

        let elapsed = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        let sample = sampler.tick();

        if !sample.target_alive && !target_reported {
            target_reported = true;
            output::end_stats_line();
            output::print_warning("target process is gone, still sampling the rest of the set");
        }

        let row = SampleRow {
            time: elapsed,
            cpu_percent: sample.cpu_percent,
            mem_bytes: sample.mem_bytes as f64,
            io_read_bytes: sample.io_read_bytes as f64,
            nproc: sample.nproc as u64,
        };
        writer.append(&row)?;
        output::print_stats_line(&row);
        rows += 1;

        dt = next_interval(dt, elapsed);
        std::thread::sleep(dt);
    }

    output::end_stats_line();
    Ok(LoopOutcome {
        rows,
        interrupted: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_follows_doubling_schedule() {
        // (elapsed, expected interval after the tick at that time)
        let expectations = [
            (0.0, 0.05),
            (4.9, 0.05),
            (5.1, 0.1),
            (9.9, 0.1),
            (10.1, 0.2),
            (20.1, 0.4),
            (40.1, 0.8),
            (80.1, 1.0),
            (500.0, 1.0),
        ];

        let mut dt = INITIAL_INTERVAL;
        for (elapsed, expected) in expectations {
            dt = next_interval(dt, elapsed);
            assert!(
                (dt.as_secs_f64() - expected).abs() < 1e-9,
                "at t={elapsed}: got {:?}, expected {expected}s",
                dt
            );
        }
    }

    #[test]
    fn interval_is_monotone_and_capped() {
        let mut dt = INITIAL_INTERVAL;
        let mut prev = dt;
        let mut t = 0.0;
        while t < 200.0 {
            dt = next_interval(dt, t);
            assert!(dt >= prev, "interval regressed at t={t}");
            assert!(dt <= MAX_INTERVAL);
            prev = dt;
            t += dt.as_secs_f64();
        }
        assert_eq!(dt, MAX_INTERVAL);
    }

    #[test]
    fn interval_does_not_jump_buckets() {
        // Even if a tick observes a late elapsed time, the interval only
        // doubles once per call.
        let dt = next_interval(INITIAL_INTERVAL, 60.0);
        assert!((dt.as_secs_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn samples_the_current_process() {
        let mut sampler = Sampler::new(std::process::id(), Vec::new());

        let first = sampler.tick();
        assert!(first.target_alive);
        assert!(first.nproc >= 1);
        assert!(first.mem_bytes > 0);

        std::thread::sleep(Duration::from_millis(220));
        let second = sampler.tick();
        assert!(second.target_alive);
        assert!(second.mem_bytes > 0);
    }

    #[test]
    fn missing_target_is_flagged_not_dropped() {
        // A pid this large should not exist.
        let mut sampler = Sampler::new(u32::MAX - 2, Vec::new());
        let sample = sampler.tick();

        assert!(!sample.target_alive);
        // The target stays in the set so its return is noticed.
        assert_eq!(sample.nproc, 1);
        assert_eq!(sample.cpu_percent, 0.0);
        assert_eq!(sample.mem_bytes, 0);
    }

    #[test]
    fn discovers_and_prunes_a_child_process() {
        let mut child = std::process::Command::new("sleep")
            .arg("10")
            .spawn()
            .expect("spawn sleep");
        let child_pid = child.id();

        let mut sampler = Sampler::new(std::process::id(), Vec::new());
        sampler.tick();
        assert!(
            sampler.tracked_pids().contains(&child_pid),
            "descendant was not adopted"
        );

        child.kill().unwrap();
        child.wait().unwrap();

        let after = sampler.tick();
        assert!(
            !sampler.tracked_pids().contains(&child_pid),
            "exited descendant was not pruned"
        );
        assert!(after.target_alive);
    }
}
