use crate::priority::Priority;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_OUTPUT: &str = "reboot,short";

/// Show new journal entries since last run
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Process all entries from the current boot
    #[arg(short = 'b')]
    pub this_boot: bool,

    /// Only show entries at or above priority
    #[arg(short = 'p', long, value_parser = parse_priority)]
    pub priority: Option<Priority>,

    /// Use alternative configuration file
    #[arg(long = "conf", value_name = "FILE")]
    pub conf: Option<PathBuf>,

    /// Enable debugging
    #[arg(long)]
    pub debug: bool,

    /// Don't update the cursor bookmark file
    #[arg(long)]
    pub dry_run: bool,

    /// Output format for journal entries, comma-separated list from
    /// --help-output
    #[arg(short = 'o', long, value_name = "FORMAT")]
    pub output: Option<String>,

    /// Read journal export JSON from FILE instead of running journalctl ('-' for stdin)
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Display available output formats
    #[arg(long)]
    pub help_output: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create exclusions config from new entries
    Debrief,
    /// Reset the cursor bookmark so all entries are shown next time
    Reset,
    /// Show exclusion statistics
    Stats,
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    s.parse::<Priority>().map_err(|_| {
        format!(
            "must be 0-7 or one of: {}",
            Priority::labels().join(", ")
        )
    })
}

impl Cli {
    /// Formatter names given with `-o`, if any.
    pub fn output_formats(&self) -> Option<Vec<String>> {
        self.output.as_ref().map(|output| {
            output
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
    }
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
