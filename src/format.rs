//! Output formats for journal entries
//!
//! Every formatter turns the entries it is given into text and may add a
//! trailer once the input is exhausted. A formatter can scope which entries
//! it ever sees by declaring its own inclusion/exclusion rules; without
//! them it shares the configured defaults.
//!
//! Formatters are selected by name from a static registry (see
//! [`get_formatter`]), the same names accepted by `-o` and the `output`
//! config keyword.

mod cat;
mod config;
mod json;
mod login;
mod reboot;
mod short;
mod systemd;

pub use cat::CatFormatter;
pub use config::ConfigFormatter;
pub use json::{JsonFormatter, JsonPrettyFormatter};
pub use login::LoginFormatter;
pub use reboot::RebootFormatter;
pub use short::ShortFormatter;
pub use systemd::SystemdFormatter;

use crate::entry::Entry;
use crate::filter::RuleSpec;
use thiserror::Error;

/// Converts journal entries into text.
pub trait EntryFormatter {
    /// Registry name, as used with `-o`.
    fn name(&self) -> &'static str;

    /// Entries this formatter wants; `None` means use the configured defaults.
    fn filter_inclusions(&self) -> Option<Vec<RuleSpec>> {
        None
    }

    /// Entries this formatter never wants; `None` means use the configured defaults.
    fn filter_exclusions(&self) -> Option<Vec<RuleSpec>> {
        None
    }

    /// Format a single entry, including any newline required.
    fn format(&mut self, entry: &Entry) -> String;

    /// Closing output once there are no more entries.
    fn flush(&mut self) -> String {
        String::new()
    }
}

#[derive(Debug, Error)]
#[error("invalid output format '{0}'")]
pub struct UnknownFormatter(pub String);

/// A registry entry describing one output format.
pub struct FormatterInfo {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Box<dyn EntryFormatter>,
}

impl FormatterInfo {
    pub fn build(&self) -> Box<dyn EntryFormatter> {
        (self.build)()
    }
}

fn build<F: EntryFormatter + Default + 'static>() -> Box<dyn EntryFormatter> {
    Box::new(F::default())
}

static FORMATTERS: &[FormatterInfo] = &[
    FormatterInfo {
        name: "cat",
        description: "Only display MESSAGE field",
        build: build::<CatFormatter>,
    },
    FormatterInfo {
        name: "config",
        description: "Generate an exclusions list covering the entries seen,\n\
                      most frequent first, suitable for the config file",
        build: build::<ConfigFormatter>,
    },
    FormatterInfo {
        name: "json",
        description: "JSON format, one entry per line",
        build: build::<JsonFormatter>,
    },
    FormatterInfo {
        name: "json-pretty",
        description: "Pretty JSON format",
        build: build::<JsonPrettyFormatter>,
    },
    FormatterInfo {
        name: "login",
        description: "Show a summary of login sessions",
        build: build::<LoginFormatter>,
    },
    FormatterInfo {
        name: "reboot",
        description: "Display a message on each reboot\n\n\
                      Only shows reboots between entries that are to be shown.",
        build: build::<RebootFormatter>,
    },
    FormatterInfo {
        name: "short",
        description: "Syslog-like output: timestamp, host, identifier and message",
        build: build::<ShortFormatter>,
    },
    FormatterInfo {
        name: "systemd",
        description: "Show a summary of failed systemd units",
        build: build::<SystemdFormatter>,
    },
];

pub fn formatters() -> &'static [FormatterInfo] {
    FORMATTERS
}

pub fn list_formatters() -> Vec<&'static str> {
    FORMATTERS.iter().map(|info| info.name).collect()
}

/// Get a new formatter instance by name.
pub fn get_formatter(name: &str) -> Result<Box<dyn EntryFormatter>, UnknownFormatter> {
    FORMATTERS
        .iter()
        .find(|info| info.name == name)
        .map(FormatterInfo::build)
        .ok_or_else(|| UnknownFormatter(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registered_name_builds_matching_formatter() {
        for name in list_formatters() {
            let formatter = get_formatter(name).unwrap();
            assert_eq!(formatter.name(), name);
        }
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let err = get_formatter("none").err().unwrap();
        assert_eq!(err.to_string(), "invalid output format 'none'");
    }
}
