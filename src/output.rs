use std::io::{self, Write};

use sysinfo::System;
use terminal_size::{terminal_size, Width};

use crate::logfile::SampleRow;

// ANSI color codes
pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const CYAN: &str = "\x1b[36m";
pub const RED: &str = "\x1b[31m";

const DEFAULT_TERMINAL_WIDTH: usize = 80;
const MIN_BANNER_WIDTH: usize = 20;
const MAX_BANNER_WIDTH: usize = 80;

pub fn print_error(msg: &str) {
    eprintln!("{RED}{BOLD}Error:{RESET} {}", msg);
}

pub fn print_warning(msg: &str) {
    println!("{YELLOW}Warning:{RESET} {}", msg);
}

pub fn print_info(msg: &str) {
    println!("{CYAN}Info:{RESET} {}", msg);
}

pub fn print_header() {
    println!("{CYAN}{BOLD}benchtrace v{}{RESET}", env!("CARGO_PKG_VERSION"));
    println!();
}

/// Print a phase banner sized to the terminal: `━━━ SAMPLING ━━━`.
pub fn print_banner(phase: &str) {
    let width = terminal_size()
        .map(|(Width(w), _)| w as usize)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH)
        .clamp(MIN_BANNER_WIDTH, MAX_BANNER_WIDTH);

    let label = format!(" {} ", phase);
    let remaining = width.saturating_sub(label.chars().count());
    let left = remaining / 2;
    let right = remaining - left;

    println!(
        "{CYAN}{BOLD}{}{}{}{RESET}",
        "━".repeat(left),
        label,
        "━".repeat(right)
    );
}

/// Print host CPU/memory metadata once before a run, so logs can be
/// interpreted relative to the machine that produced them.
pub fn print_sys_metadata() {
    let sys = System::new_all();

    println!("{BLUE}System CPU count:{RESET} {}", sys.cpus().len());
    println!(
        "{BLUE}System MEM total:{RESET} {} GB",
        sys.total_memory() / 1024 / 1024 / 1024
    );
    println!(
        "{BLUE}System MEM avail:{RESET} {} GB",
        sys.available_memory() / 1024 / 1024 / 1024
    );
    println!();
}

/// Redraw the in-place live stats line for the current tick.
///
/// Uses carriage return rather than a full progress bar: the line is pure
/// data and the sampling interval is the refresh rate.
pub fn print_stats_line(row: &SampleRow) {
    print!(
        "\r{DIM}STATS:{RESET} t={:.2}s cpu={:.1}% mem={:.1}MB reads={:.0}KB procs={}   ",
        row.time,
        row.cpu_percent,
        row.mem_bytes / 1_000_000.0,
        row.io_read_bytes / 1000.0,
        row.nproc
    );
    let _ = io::stdout().flush();
}

/// Terminate the live stats line before printing anything else.
pub fn end_stats_line() {
    println!();
}
