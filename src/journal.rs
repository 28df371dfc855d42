//! Sources of journal entries
//!
//! Entries are read in `journalctl -o json` export form, one JSON object
//! per line, either from a `journalctl` child process or from a file.

use crate::entry::{Entry, FieldValue};
use crate::priority::Priority;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start journalctl: {0}")]
    Spawn(#[source] io::Error),

    #[error("read error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: invalid journal entry: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("journalctl exited with {0}")]
    Exit(ExitStatus),
}

/// Decodes one entry per non-blank line of JSON.
pub struct JsonLinesSource<R> {
    lines: io::Lines<R>,
    line: usize,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        JsonLinesSource {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl JsonLinesSource<Box<dyn BufRead>> {
    /// Read from `path`, or from stdin when it is `-`.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let reader: Box<dyn BufRead> = if path == Path::new("-") {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(path).map_err(|source| SourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            Box::new(BufReader::new(file))
        };
        Ok(JsonLinesSource::new(reader))
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<Entry, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(Entry::from_json_line(&line).map_err(|source| SourceError::Decode {
                line: self.line,
                source,
            }));
        }
    }
}

/// Options passed through to `journalctl`.
#[derive(Debug, Clone, Default)]
pub struct JournalctlOptions {
    /// Only entries after this cursor.
    pub after_cursor: Option<String>,
    /// All entries of the current boot; takes precedence over the cursor.
    /// Also the range when there is no cursor.
    pub this_boot: bool,
    pub priority: Option<Priority>,
}

impl JournalctlOptions {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "json".to_string(),
            "--no-pager".to_string(),
        ];
        match &self.after_cursor {
            Some(cursor) if !self.this_boot => args.push(format!("--after-cursor={cursor}")),
            _ => args.push("-b".to_string()),
        }
        if let Some(priority) = self.priority {
            args.push("-p".to_string());
            args.push(priority.level().to_string());
        }
        args
    }
}

/// Entries read from a `journalctl` child process.
///
/// A non-zero exit of the child is reported after its last entry.
pub struct JournalctlSource {
    child: Child,
    entries: JsonLinesSource<BufReader<ChildStdout>>,
    finished: bool,
}

impl JournalctlSource {
    pub fn spawn(options: &JournalctlOptions) -> Result<Self, SourceError> {
        let args = options.args();
        debug!(?args, "running journalctl");
        let mut child = Command::new("journalctl")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(SourceError::Spawn)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Spawn(io::Error::other("no stdout from journalctl")))?;

        Ok(JournalctlSource {
            child,
            entries: JsonLinesSource::new(BufReader::new(stdout)),
            finished: false,
        })
    }
}

impl Iterator for JournalctlSource {
    type Item = Result<Entry, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(item) = self.entries.next() {
            return Some(item);
        }

        self.finished = true;
        match self.child.wait() {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(SourceError::Exit(status))),
            Err(e) => Some(Err(e.into())),
        }
    }
}

impl Drop for JournalctlSource {
    fn drop(&mut self) {
        if !self.finished {
            // Stopped early; don't leave journalctl blocked on a full pipe.
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Keep entries at `priority` or more severe, as `journalctl -p` does.
///
/// Errors are passed through.
pub fn at_or_above<I>(entries: I, priority: Priority) -> impl Iterator<Item = I::Item>
where
    I: Iterator<Item = Result<Entry, SourceError>>,
{
    let level = i64::from(priority.level());
    entries.filter(move |item| match item {
        Ok(entry) => matches!(entry.get("PRIORITY"), Some(FieldValue::Int(p)) if *p <= level),
        Err(_) => true,
    })
}

/// Entries not yet seen, tracking the read position as they are consumed.
pub struct LatestEntries<I> {
    entries: I,
    seek: Option<String>,
    pending: VecDeque<Result<Entry, SourceError>>,
    cursor: Option<String>,
}

impl<I> LatestEntries<I>
where
    I: Iterator<Item = Result<Entry, SourceError>>,
{
    /// `cursor` is the saved read position, kept if no new entry carries one.
    pub fn new(entries: I, cursor: Option<String>) -> Self {
        LatestEntries {
            entries,
            seek: None,
            pending: VecDeque::new(),
            cursor,
        }
    }

    /// Skip entries up to and including the one at `cursor`.
    ///
    /// For sources that cannot seek themselves. If no entry has that
    /// cursor, nothing is skipped.
    pub fn seek_after(mut self, cursor: impl Into<String>) -> Self {
        self.seek = Some(cursor.into());
        self
    }

    /// Cursor of the last entry read.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    fn seek(&mut self, target: &str) {
        debug!(cursor = target, "seeking");
        let mut skipped = VecDeque::new();
        for item in self.entries.by_ref() {
            let found = matches!(&item, Ok(entry) if entry.cursor() == Some(target));
            let failed = item.is_err();
            skipped.push_back(item);
            if found {
                debug!(skipped = skipped.len(), "found cursor");
                return;
            }
            if failed {
                break;
            }
        }

        warn!(cursor = target, "cursor not found, reading all entries");
        self.pending = skipped;
    }
}

impl<I> Iterator for LatestEntries<I>
where
    I: Iterator<Item = Result<Entry, SourceError>>,
{
    type Item = Result<Entry, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(target) = self.seek.take() {
            self.seek(&target);
        }

        let item = match self.pending.pop_front() {
            Some(item) => item,
            None => self.entries.next()?,
        };
        if let Ok(entry) = &item {
            if let Some(cursor) = entry.cursor() {
                self.cursor = Some(cursor.to_string());
            }
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"{"__CURSOR":"c1","MESSAGE":"one"}

{"__CURSOR":"c2","MESSAGE":"two"}
{"__CURSOR":"c3","MESSAGE":"three"}
"#;

    fn messages<I: Iterator<Item = Result<Entry, SourceError>>>(entries: I) -> Vec<String> {
        entries
            .map(|e| e.unwrap().get_text("MESSAGE").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_json_lines_skip_blank_lines() {
        let source = JsonLinesSource::new(INPUT.as_bytes());
        assert_eq!(messages(source), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_decode_error_reports_line() {
        let mut source = JsonLinesSource::new("{}\nnot json\n".as_bytes());
        assert!(source.next().unwrap().is_ok());
        let err = source.next().unwrap().unwrap_err();
        assert!(matches!(err, SourceError::Decode { line: 2, .. }));
    }

    #[test]
    fn test_seek_after_saved_cursor() {
        let mut latest = LatestEntries::new(JsonLinesSource::new(INPUT.as_bytes()), None)
            .seek_after("c2");
        assert_eq!(messages(latest.by_ref()), vec!["three"]);
        assert_eq!(latest.cursor(), Some("c3"));
    }

    #[test]
    fn test_unknown_cursor_reads_everything() {
        let mut latest = LatestEntries::new(JsonLinesSource::new(INPUT.as_bytes()), None)
            .seek_after("gone");
        assert_eq!(messages(latest.by_ref()), vec!["one", "two", "three"]);
        assert_eq!(latest.cursor(), Some("c3"));
    }

    #[test]
    fn test_cursor_kept_when_nothing_new() {
        let mut latest =
            LatestEntries::new(JsonLinesSource::new(INPUT.as_bytes()), Some("c3".to_string()))
                .seek_after("c3");
        assert!(latest.next().is_none());
        assert_eq!(latest.cursor(), Some("c3"));
    }

    #[test]
    fn test_priority_filter() {
        let input = r#"{"PRIORITY":"2","MESSAGE":"crit"}
{"PRIORITY":"6","MESSAGE":"info"}
{"MESSAGE":"none"}
{"PRIORITY":"3","MESSAGE":"err"}
"#;
        let entries = at_or_above(JsonLinesSource::new(input.as_bytes()), Priority::Error);
        assert_eq!(messages(entries), vec!["crit", "err"]);
    }

    #[test]
    fn test_journalctl_arguments() {
        let mut options = JournalctlOptions {
            after_cursor: Some("s=1".to_string()),
            this_boot: false,
            priority: Some(Priority::Error),
        };
        assert_eq!(
            options.args(),
            vec!["-o", "json", "--no-pager", "--after-cursor=s=1", "-p", "3"]
        );

        options.this_boot = true;
        options.priority = None;
        assert_eq!(options.args(), vec!["-o", "json", "--no-pager", "-b"]);

        // First run, or after a reset.
        options.after_cursor = None;
        options.this_boot = false;
        assert_eq!(options.args(), vec!["-o", "json", "--no-pager", "-b"]);
    }
}
