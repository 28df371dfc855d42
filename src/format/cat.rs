use super::EntryFormatter;
use crate::entry::Entry;

/// Only the `MESSAGE` field.
#[derive(Debug, Default)]
pub struct CatFormatter;

impl EntryFormatter for CatFormatter {
    fn name(&self) -> &'static str {
        "cat"
    }

    fn format(&mut self, entry: &Entry) -> String {
        match entry.get("MESSAGE") {
            Some(message) => format!("{message}\n"),
            None => "\n".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_only() {
        let entry: Entry = [("MESSAGE", "hello"), ("_COMM", "x")].into_iter().collect();
        assert_eq!(CatFormatter.format(&entry), "hello\n");
        assert_eq!(CatFormatter.format(&Entry::new()), "\n");
    }
}
