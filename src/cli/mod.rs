// CLI module - start, query and stop a daemonized program

mod output;

use crate::config::{parse_signal, DaemonOptions, StreamTarget};
use crate::daemon;
use crate::error::Result;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Exit status of `status` when the daemon is not running
pub const EXIT_NOT_RUNNING: i32 = 3;

/// Daemonizer - run a program in the background under a PID file lock
#[derive(Parser)]
#[command(name = "daemonizer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start PROGRAM as a daemon
    Start {
        /// PID file path (overrides the config file)
        #[arg(short, long)]
        pid: Option<PathBuf>,

        /// Load options from a TOML or JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input for the daemon
        #[arg(long)]
        stdin: Option<String>,

        /// Output target for the daemon (a path, or "stdout")
        #[arg(long)]
        stdout: Option<String>,

        /// Error target for the daemon (a path, or "stdout")
        #[arg(long)]
        stderr: Option<String>,

        /// Program to run
        program: PathBuf,

        /// Arguments to pass to the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Check whether the daemon is running
    Status {
        /// PID file path
        #[arg(short, long)]
        pid: PathBuf,
    },

    /// Signal the daemon
    Stop {
        /// PID file path
        #[arg(short, long)]
        pid: PathBuf,

        /// Signal to send
        #[arg(short, long, default_value = "SIGTERM")]
        signal: String,

        /// Remove the PID file after signalling
        #[arg(short, long)]
        delete: bool,
    },
}

impl Cli {
    /// Parse arguments and run; returns the process exit status
    pub fn run() -> anyhow::Result<i32> {
        let cli = Cli::parse();
        cli.execute()
    }

    fn execute(self) -> anyhow::Result<i32> {
        match self.command {
            Commands::Start {
                pid,
                config,
                stdin,
                stdout,
                stderr,
                program,
                args,
            } => {
                let options = build_options(pid, config, stdin, stdout, stderr)?;
                let daemon_pid = start(&options, program, args)?;
                output::print_started(daemon_pid.as_raw() as u32, &options.pid);
                Ok(0)
            }

            Commands::Status { pid } => {
                let status = daemon::status(&pid)?;
                output::print_status(&status);
                Ok(if status.running { 0 } else { EXIT_NOT_RUNNING })
            }

            Commands::Stop {
                pid,
                signal,
                delete,
            } => {
                let signal = parse_signal(&signal)?;
                if daemon::kill(&pid, delete, signal)? {
                    output::print_signalled(signal, &pid);
                    Ok(0)
                } else {
                    output::print_error(&format!(
                        "Failed to deliver {} to the daemon of {}",
                        signal,
                        pid.display()
                    ));
                    Ok(1)
                }
            }
        }
    }
}

/// Merge the config file (if any) with command-line overrides
fn build_options(
    pid: Option<PathBuf>,
    config: Option<PathBuf>,
    stdin: Option<String>,
    stdout: Option<String>,
    stderr: Option<String>,
) -> Result<DaemonOptions> {
    let mut options = match &config {
        Some(config) => DaemonOptions::load(config)?,
        None => DaemonOptions::new(""),
    };

    if let Some(pid) = pid {
        options.pid = pid;
    }
    if let Some(stdin) = stdin {
        options.stdin = StreamTarget::from(stdin);
    }
    if let Some(stdout) = stdout {
        options.stdout = StreamTarget::from(stdout);
    }
    if let Some(stderr) = stderr {
        options.stderr = StreamTarget::from(stderr);
    }

    options.validate()?;
    Ok(options)
}

/// Daemonize a workload that replaces itself with `program`
fn start(options: &DaemonOptions, program: PathBuf, args: Vec<String>) -> Result<nix::unistd::Pid> {
    daemon::work(options, move |stdio| {
        let err = Command::new(&program)
            .args(&args)
            .stdin(Stdio::from(stdio.stdin))
            .stdout(Stdio::from(stdio.stdout))
            .stderr(Stdio::from(stdio.stderr))
            .exec();
        Err(err).with_context(|| format!("failed to exec {}", program.display()))
    })
}
