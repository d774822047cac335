// Output formatting and display for CLI

use crate::daemon::DaemonStatus;
use colored::*;
use nix::sys::signal::Signal;
use std::path::Path;

pub fn print_started(pid: u32, pid_file: &Path) {
    println!("{}", "✓ Daemon started".green().bold());
    println!("  {}: {}", "PID".bold(), pid);
    println!("  {}: {}", "PID file".bold(), pid_file.display());
}

pub fn print_status(status: &DaemonStatus) {
    if status.running {
        println!("{}", "✓ Daemon is running".green().bold());
        match status.pid {
            Some(pid) => println!("  {}: {}", "PID".bold(), pid),
            // Lock held but PID not written yet, or garbled
            None => println!("  {}: {}", "PID".bold(), "unknown".yellow()),
        }
    } else {
        println!("{}", "✗ Daemon is not running".red().bold());
    }
    println!("  {}: {}", "PID file".bold(), status.pid_file.display());
}

pub fn print_signalled(signal: Signal, pid_file: &Path) {
    println!(
        "{} Sent {} to the daemon of {}",
        "✓".green().bold(),
        signal,
        pid_file.display()
    );
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}
