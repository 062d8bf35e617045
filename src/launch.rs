//! Launching the target command and resolving the process to monitor.
//!
//! Commands go through `sh -c`, and shells differ in whether they fork
//! before exec: a pipeline leaves the shell as the parent of several
//! children, while a simple command is usually exec'd in place. Both
//! shapes are handled here by polling the process table after spawn.

use std::process::{Child, Command};
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::error::{BenchtraceError, Result};
use crate::output;
use crate::sampler::descendants;

const DISCOVERY_ATTEMPTS: u32 = 5;
const DISCOVERY_PAUSE: Duration = Duration::from_secs(2);

/// A spawned shell together with the resolved process to monitor.
#[derive(Debug)]
pub struct LaunchedTarget {
    pub shell: Child,
    pub pid: u32,
    pub name: String,
}

/// Spawn `sh -c <cmd>` and resolve the target process.
///
/// If resolution fails the shell is killed before returning the error, so
/// no stray benchmark keeps running unmonitored.
pub fn launch(cmd: &str) -> Result<LaunchedTarget> {
    let mut shell = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .spawn()
        .map_err(|e| BenchtraceError::Launch(e.to_string()))?;

    match resolve_target(&mut shell) {
        Ok((pid, name)) => Ok(LaunchedTarget { shell, pid, name }),
        Err(e) => {
            let _ = shell.kill();
            let _ = shell.wait();
            Err(e)
        }
    }
}

/// Poll the process table until the shell's descendant shows up.
///
/// Picks the deepest descendant when the command fans out into several
/// processes (a warning is printed). When the shell exec'd the command in
/// place there are no descendants and the shell pid itself is the target.
fn resolve_target(shell: &mut Child) -> Result<(u32, String)> {
    let shell_pid = Pid::from_u32(shell.id());
    let mut system = System::new();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner());
    spinner.set_message("waiting for target process...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    for attempt in 0..DISCOVERY_ATTEMPTS {
        if shell.try_wait()?.is_some() {
            spinner.finish_and_clear();
            return Err(BenchtraceError::TargetNotFound);
        }

        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );

        let children = descendants(&system, shell_pid);
        match children.len() {
            0 => {
                // A simple command gets exec'd in place: the shell pid now
                // carries the target's name.
                if let Some(process) = system.process(shell_pid) {
                    let name = process.name().to_string_lossy();
                    if name != "sh" {
                        spinner.finish_and_clear();
                        return Ok((shell_pid.as_u32(), name.into_owned()));
                    }
                }
            }
            1 => {
                spinner.finish_and_clear();
                return Ok(target_of(&system, children[0]));
            }
            _ => {
                spinner.finish_and_clear();
                output::print_warning(
                    "target command led to multiple processes, monitoring the last one",
                );
                let last = *children.last().expect("non-empty");
                return Ok(target_of(&system, last));
            }
        }

        if attempt + 1 < DISCOVERY_ATTEMPTS {
            thread::sleep(DISCOVERY_PAUSE);
        }
    }

    spinner.finish_and_clear();
    Err(BenchtraceError::TargetNotFound)
}

fn target_of(system: &System, pid: Pid) -> (u32, String) {
    let name = system
        .process(pid)
        .map(|p| p.name().to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    (pid.as_u32(), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_a_forking_shell_command() {
        // `sleep` after a subshell fork: the shell stays the parent.
        let target = launch("sleep 5 & wait").expect("launch");
        let mut shell = target.shell;

        assert_eq!(target.name, "sleep");
        assert_ne!(target.pid, shell.id());

        let _ = shell.kill();
        let _ = shell.wait();
    }

    #[test]
    fn instantly_exiting_command_yields_no_target() {
        // `exit` is a shell builtin: nothing gets exec'd and the shell is
        // gone before a descendant can appear.
        let err = launch("exit 0").unwrap_err();
        assert!(matches!(err, BenchtraceError::TargetNotFound));
    }
}
