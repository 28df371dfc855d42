use super::EntryFormatter;
use crate::entry::{Entry, FieldValue};

/// Marks a change of `_BOOT_ID` between shown entries.
#[derive(Debug, Default)]
pub struct RebootFormatter {
    this_boot_id: Option<FieldValue>,
}

impl EntryFormatter for RebootFormatter {
    fn name(&self) -> &'static str {
        "reboot"
    }

    fn format(&mut self, entry: &Entry) -> String {
        let Some(boot_id) = entry.get("_BOOT_ID") else {
            return String::new();
        };

        let reboot = self
            .this_boot_id
            .as_ref()
            .is_some_and(|current| current != boot_id);
        self.this_boot_id = Some(boot_id.clone());

        if reboot {
            "-- Reboot --\n".to_string()
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot(id: &str) -> Entry {
        [("_BOOT_ID", FieldValue::convert("_BOOT_ID", id))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_reboot() {
        let mut formatter = RebootFormatter::default();
        let first = "0123456789abcdef0123456789abcdef";
        let second = "fedcba9876543210fedcba9876543210";

        assert_eq!(formatter.format(&boot(first)), "");
        assert_eq!(formatter.format(&Entry::new()), "");
        assert_eq!(formatter.format(&boot(first)), "");
        assert_eq!(formatter.format(&boot(second)), "-- Reboot --\n");
        assert_eq!(formatter.flush(), "");
    }
}
