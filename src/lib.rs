//! Show new journal entries since the last run, filtered through
//! inclusion/exclusion rules and rendered by one or more output formats.

pub mod cli;
pub mod config;
pub mod cursor;
pub mod debrief;
pub mod entry;
pub mod filter;
pub mod format;
pub mod journal;
pub mod logging;
pub mod priority;

use crate::cli::{Command, DEFAULT_OUTPUT};
use crate::config::Config;
use crate::cursor::CursorFile;
use crate::filter::{FilterError, JournalFilter, RuleSpec};
use crate::format::{EntryFormatter, formatters, get_formatter};
use crate::journal::{
    JournalctlOptions, JournalctlSource, JsonLinesSource, LatestEntries, SourceError, at_or_above,
};
use anyhow::{Context, Result};
use std::io::{self, BufWriter, Write};
use tracing::debug;

pub use cli::{Cli, cli_parse};
pub use entry::{Entry, FieldValue};
pub use priority::Priority;

type EntrySource<'a> = Box<dyn Iterator<Item = Result<Entry, SourceError>> + 'a>;

/// Parse the command line and run.
pub fn run() -> Result<()> {
    let cli = cli_parse();
    let logging = logging::init_logging(cli.debug)?;
    let config = config::load_config(cli.conf.as_deref())?;
    if config.debug {
        logging.enable_debug()?;
    }

    run_with(&cli, &config)
}

/// Run with already loaded configuration.
pub fn run_with(cli: &Cli, config: &Config) -> Result<()> {
    if cli.help_output {
        return show_output_help(&mut io::stdout().lock()).or_else(ignore_broken_pipe);
    }

    let cursor_file = CursorFile::new(&config.cursor_file);
    debug!(cursor_file = %cursor_file.path().display());
    if cli.command == Some(Command::Reset) {
        cursor_file.reset()?;
        return Ok(());
    }

    let formatters = build_formatters(cli, config)?;
    let priority = cli.priority.or(config.priority);
    let saved = cursor_file.load()?;

    let source: EntrySource<'static> = match &cli.input {
        Some(path) => Box::new(JsonLinesSource::open(path)?),
        None => Box::new(JournalctlSource::spawn(&JournalctlOptions {
            after_cursor: saved.clone(),
            this_boot: cli.this_boot,
            priority,
        })?),
    };
    // A file can't seek, so skip up to the saved cursor while reading.
    let seek = saved
        .clone()
        .filter(|_| cli.input.is_some() && !cli.this_boot);

    let mut latest = LatestEntries::new(source, saved);
    if let Some(cursor) = seek {
        latest = latest.seek_after(cursor);
    }

    let outcome = {
        // journalctl filters by priority itself
        let entries: EntrySource<'_> = match priority {
            Some(priority) if cli.input.is_some() => {
                Box::new(at_or_above(latest.by_ref(), priority))
            }
            _ => Box::new(latest.by_ref()),
        };

        let inclusions: &[RuleSpec] = if config_inclusions_needed(&formatters) {
            config.inclusions.as_slice()
        } else {
            &[]
        };
        let mut jfilter = JournalFilter::new(entries, formatters, inclusions, &config.exclusions)
            .context("invalid filter rules")?;

        if cli.command == Some(Command::Stats) {
            jfilter
                .run(&mut io::sink())
                .and_then(|()| show_stats(&jfilter).map_err(FilterError::Sink))
        } else {
            let mut out = BufWriter::new(io::stdout().lock());
            jfilter.run(&mut out)
        }
    };

    match outcome {
        Ok(()) => {}
        Err(e) if e.is_broken_pipe() => debug!("output closed"),
        Err(e) => return Err(e.into()),
    }

    if cli.dry_run {
        debug!("dry run, not saving cursor");
    } else if let Some(cursor) = latest.cursor() {
        cursor_file.save(cursor)?;
    }
    Ok(())
}

fn build_formatters(cli: &Cli, config: &Config) -> Result<Vec<Box<dyn EntryFormatter>>> {
    let names = if cli.command == Some(Command::Debrief) {
        vec!["config".to_string()]
    } else {
        cli.output_formats()
            .or_else(|| config.output.clone())
            .unwrap_or_else(|| DEFAULT_OUTPUT.split(',').map(String::from).collect())
    };
    debug!(?names, "output formats");

    names
        .iter()
        .map(|name| get_formatter(name).map_err(anyhow::Error::from))
        .collect()
}

/// Configured inclusions only matter if some formatter relies on them.
fn config_inclusions_needed(formatters: &[Box<dyn EntryFormatter>]) -> bool {
    formatters.iter().any(|f| f.filter_inclusions().is_none())
}

fn show_stats<I>(jfilter: &JournalFilter<I>) -> io::Result<()>
where
    I: Iterator<Item = Result<Entry, SourceError>>,
{
    let mut out = io::stdout().lock();
    writeln!(out, "{:>10}  {}", "FREQUENCY", "EXCLUSION")?;
    for stat in jfilter.statistics() {
        writeln!(out, "{:>10}  {}", stat.hits, stat.exclusion)?;
    }
    out.flush()
}

fn show_output_help<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "Available output formats:")?;
    for info in formatters() {
        writeln!(out, "\n{}:", info.name)?;
        for line in info.description.lines() {
            let line = line.trim();
            if line.is_empty() {
                writeln!(out)?;
            } else {
                writeln!(out, "    {line}")?;
            }
        }
    }
    writeln!(out, "\nMultiple output formats can be used at the same time.")?;
    writeln!(out, "The default is '{DEFAULT_OUTPUT}'")?;
    out.flush()?;
    Ok(())
}

fn ignore_broken_pipe(err: anyhow::Error) -> Result<()> {
    match err.downcast_ref::<io::Error>() {
        Some(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        _ => Err(err),
    }
}
