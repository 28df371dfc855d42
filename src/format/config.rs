use super::EntryFormatter;
use crate::debrief::{Debriefer, render_exclusions_or_log};
use crate::entry::Entry;

/// Collects entries, then suggests exclusions covering them.
#[derive(Debug, Default)]
pub struct ConfigFormatter {
    entries: Vec<Entry>,
    debriefer: Debriefer,
}

impl EntryFormatter for ConfigFormatter {
    fn name(&self) -> &'static str {
        "config"
    }

    fn format(&mut self, entry: &Entry) -> String {
        self.entries.push(entry.clone());
        String::new()
    }

    fn flush(&mut self) -> String {
        let entries = std::mem::take(&mut self.entries);
        let exclusions = self.debriefer.discover(&entries);
        render_exclusions_or_log(&exclusions)
    }
}
