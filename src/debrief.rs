//! Discovery of exclusion rules covering a batch of entries
//!
//! Repeatedly take the most frequent value of a definitive field, widen it
//! with every other field value shared by all entries carrying it, and
//! remove the entries the resulting rule covers.

use crate::entry::Entry;
use crate::filter::{Exclusion, FilterRule, RuleValue};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error};

/// Fields whose values differ between otherwise identical entries.
pub const DEFAULT_IGNORE_FIELDS: &[&str] = &[
    "__CURSOR",
    "__SEQNUM",
    "__SEQNUM_ID",
    "__REALTIME_TIMESTAMP",
    "_SOURCE_REALTIME_TIMESTAMP",
    "__MONOTONIC_TIMESTAMP",
    "_SOURCE_MONOTONIC_TIMESTAMP",
    "_SOURCE_BOOTTIME_TIMESTAMP",
    "_STREAM_ID",
    "INVOCATION_ID",
    "_SYSTEMD_INVOCATION_ID",
    "_BOOT_ID",
    "_PID",
    "SYSLOG_PID",
    "_MACHINE_ID",
    "_TRANSPORT",
    "_HOSTNAME",
    "_SYSTEMD_OWNER_UID",
    "_UID",
    "_AUDIT_LOGINUID",
    "_GID",
    "_CAP_EFFECTIVE",
    "PRIORITY",
    "SYSLOG_FACILITY",
    "_AUDIT_SESSION",
    "_SYSTEMD_SESSION",
    "_SYSTEMD_CGROUP",
    "_SYSTEMD_SLICE",
];

/// Every discovered rule includes one of these.
pub const DEFINITIVE_FIELDS: &[&str] = &["MESSAGE_ID", "MESSAGE", "CODE_FILE", "CODE_FUNCTION"];

/// One field value and the entries carrying it.
#[derive(Debug, Clone)]
pub struct CountedEntryField<'a> {
    pub field: &'a str,
    pub value: RuleValue,
    pub entries: Vec<&'a Entry>,
}

impl CountedEntryField<'_> {
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Occurrences of each `field=value` pair across some entries.
#[derive(Debug)]
pub struct EntryCounter<'a> {
    counts: Vec<CountedEntryField<'a>>,
    total_entries: usize,
}

impl<'a> EntryCounter<'a> {
    /// Count every field value not in `ignore_fields`.
    ///
    /// Values a rule cannot express (timestamps, lists) are not counted.
    pub fn count<I>(entries: I, ignore_fields: &BTreeSet<String>) -> Self
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        let mut index: HashMap<(&'a str, RuleValue), usize> = HashMap::new();
        let mut counts: Vec<CountedEntryField<'a>> = Vec::new();
        let mut total_entries = 0;

        for entry in entries {
            total_entries += 1;
            for (field, value) in entry.iter() {
                if ignore_fields.contains(field) {
                    continue;
                }
                let Some(value) = RuleValue::from_field(value) else {
                    continue;
                };
                match index.get(&(field, value.clone())) {
                    Some(&idx) => counts[idx].entries.push(entry),
                    None => {
                        index.insert((field, value.clone()), counts.len());
                        counts.push(CountedEntryField {
                            field,
                            value,
                            entries: vec![entry],
                        });
                    }
                }
            }
        }

        // Most frequent first; ties by field name, then value.
        counts.sort_by(|a, b| {
            b.count()
                .cmp(&a.count())
                .then_with(|| a.field.cmp(b.field))
                .then_with(|| a.value.to_string().cmp(&b.value.to_string()))
        });

        EntryCounter {
            counts,
            total_entries,
        }
    }

    pub fn counts(&self) -> &[CountedEntryField<'a>] {
        &self.counts
    }

    pub fn total_entries(&self) -> usize {
        self.total_entries
    }
}

/// Builds an exclusions list covering all entries of a batch.
#[derive(Debug, Clone)]
pub struct Debriefer {
    ignore_fields: BTreeSet<String>,
    definitive_fields: BTreeSet<String>,
}

impl Default for Debriefer {
    fn default() -> Self {
        Debriefer {
            ignore_fields: DEFAULT_IGNORE_FIELDS.iter().map(|f| f.to_string()).collect(),
            definitive_fields: DEFINITIVE_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl Debriefer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore these fields as well as the defaults.
    pub fn with_ignore_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Replace the set of fields allowed to anchor a rule.
    pub fn with_definitive_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definitive_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Exclusion rules covering `entries`, most covering first.
    ///
    /// Each rule is commented with how many of the entries remaining at
    /// that point it covers.
    pub fn discover(&self, entries: &[Entry]) -> Vec<Exclusion> {
        let mut remaining: Vec<&Entry> = entries.iter().collect();
        let mut exclusions = Vec::new();

        while !remaining.is_empty() {
            let counter = EntryCounter::count(remaining.iter().copied(), &self.ignore_fields);
            let Some(top) = counter
                .counts()
                .iter()
                .find(|c| self.definitive_fields.contains(c.field))
            else {
                debug!(remaining = remaining.len(), "no definitive field left");
                break;
            };

            let freq = top.count();
            let total = counter.total_entries();
            debug!(field = top.field, value = %top.value, freq, total, "top");

            let mut used = self.ignore_fields.clone();
            used.insert(top.field.to_string());
            let mut values = vec![(top.field.to_string(), top.value.clone())];

            // Anything else common to all of them?
            loop {
                let rule = FilterRule::from_values(values.clone());
                let selected = remaining.iter().copied().filter(|e| rule.matches(e));
                let counter = EntryCounter::count(selected, &used);
                let Some(next) = counter.counts().first() else {
                    break;
                };
                if next.count() < freq {
                    break;
                }
                debug!(field = next.field, value = %next.value, "common to all");
                used.insert(next.field.to_string());
                values.push((next.field.to_string(), next.value.clone()));
            }

            let rule = FilterRule::from_values(values);
            let before = remaining.len();
            remaining.retain(|e| !rule.matches(e));
            debug!(remaining = remaining.len(), "entries remaining");
            assert!(
                remaining.len() < before,
                "discovered rule {rule} covers none of its own entries"
            );

            exclusions.push(
                Exclusion::from_rule(rule).with_comment(format!("{freq} occurrences (out of {total})")),
            );
        }

        exclusions
    }
}

/// Render exclusions as a YAML `exclusions:` block for the config file.
pub fn render_exclusions(exclusions: &[Exclusion]) -> Result<String, serde_yaml::Error> {
    let mut out = String::from("exclusions:\n");
    for exclusion in exclusions {
        if let Some(comment) = exclusion.comment() {
            out.push_str(&format!("  # {comment}\n"));
        }
        let rule = serde_yaml::to_string(&exclusion.rule().to_yaml(true))?;
        for (idx, line) in rule.lines().enumerate() {
            out.push_str(if idx == 0 { "  - " } else { "    " });
            out.push_str(line);
            out.push('\n');
        }
    }
    Ok(out)
}

/// Like [`render_exclusions`], logging instead of failing.
pub(crate) fn render_exclusions_or_log(exclusions: &[Exclusion]) -> String {
    render_exclusions(exclusions).unwrap_or_else(|e| {
        error!("cannot render exclusions: {e}");
        String::new()
    })
}
