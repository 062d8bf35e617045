//! Shell completion script generation for bash, zsh and fish.

use clap::Command;
use clap_complete::{generate, Shell};

use crate::error::{BenchtraceError, Result};

pub const SUPPORTED_SHELLS: [&str; 3] = ["bash", "zsh", "fish"];

/// Shells we ship completion scripts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
}

impl ShellType {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "bash" => Ok(ShellType::Bash),
            "zsh" => Ok(ShellType::Zsh),
            "fish" => Ok(ShellType::Fish),
            other => Err(BenchtraceError::Config(format!(
                "unsupported shell '{other}'"
            ))),
        }
    }

    fn to_clap_shell(self) -> Shell {
        match self {
            ShellType::Bash => Shell::Bash,
            ShellType::Zsh => Shell::Zsh,
            ShellType::Fish => Shell::Fish,
        }
    }
}

/// Write the completion script for `shell` to stdout.
pub fn print_completion_script(shell: ShellType, cmd: &mut Command) {
    let name = cmd.get_name().to_string();
    generate(shell.to_clap_shell(), cmd, name, &mut std::io::stdout());
}
