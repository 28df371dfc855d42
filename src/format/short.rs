use super::EntryFormatter;
use crate::entry::{Entry, FieldValue};
use chrono::Local;

const TIMESTAMP_FORMAT: &str = "%b %d %T";

/// Syslog-style line: `Jan 02 15:04:05 host ident[pid]: message`.
#[derive(Debug, Default)]
pub struct ShortFormatter;

impl ShortFormatter {
    fn timestamp(entry: &Entry) -> Option<String> {
        match entry.get("__REALTIME_TIMESTAMP")? {
            FieldValue::Timestamp(ts) => Some(
                ts.with_timezone(&Local)
                    .format(TIMESTAMP_FORMAT)
                    .to_string(),
            ),
            other => Some(other.to_string()),
        }
    }

    fn identifier(entry: &Entry) -> String {
        let ident = entry
            .get("SYSLOG_IDENTIFIER")
            .or_else(|| entry.get("_COMM"))
            .map_or_else(|| "?".to_string(), ToString::to_string);

        match entry.get("_PID").or_else(|| entry.get("SYSLOG_PID")) {
            Some(pid) => format!("{ident}[{pid}]"),
            None => ident,
        }
    }
}

impl EntryFormatter for ShortFormatter {
    fn name(&self) -> &'static str {
        "short"
    }

    fn format(&mut self, entry: &Entry) -> String {
        let host = entry
            .get("_HOSTNAME")
            .map_or_else(|| "localhost".to_string(), ToString::to_string);
        let message = entry.get("MESSAGE").map(ToString::to_string).unwrap_or_default();
        let ident = Self::identifier(entry);

        match Self::timestamp(entry) {
            Some(ts) => format!("{ts} {host} {ident}: {message}\n"),
            None => format!("{host} {ident}: {message}\n"),
        }
    }
}
