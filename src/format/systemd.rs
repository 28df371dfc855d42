use super::EntryFormatter;
use crate::entry::Entry;
use crate::filter::RuleSpec;
use std::collections::HashMap;

/// `MESSAGE_ID` of systemd's "Unit entered failed state" message.
const UNIT_FAILED: &str = "d9b373ed55a64feb8242e02dbe79a49c";

/// Counts failed systemd units.
#[derive(Debug, Default)]
pub struct SystemdFormatter {
    failed: HashMap<String, usize>,
}

impl EntryFormatter for SystemdFormatter {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn filter_inclusions(&self) -> Option<Vec<RuleSpec>> {
        Some(vec![RuleSpec::new().field("MESSAGE_ID", [UNIT_FAILED])])
    }

    fn format(&mut self, entry: &Entry) -> String {
        if let Some(unit) = entry.get("UNIT").or_else(|| entry.get("USER_UNIT")) {
            *self.failed.entry(unit.to_string()).or_default() += 1;
        }
        String::new()
    }

    fn flush(&mut self) -> String {
        if self.failed.is_empty() {
            return String::new();
        }

        let mut units: Vec<(&String, &usize)> = self.failed.iter().collect();
        units.sort_by(|(a_unit, a_count), (b_unit, b_count)| {
            b_count
                .cmp(a_count)
                .then_with(|| a_unit.to_lowercase().cmp(&b_unit.to_lowercase()))
                .then_with(|| a_unit.cmp(b_unit))
        });

        let mut ret = String::from("\nFailed systemd units:\n\n");
        for (unit, count) in units {
            ret.push_str(&format!("{count:>5} x {unit}\n"));
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FieldValue;

    #[test]
    fn test_no_failed_units() {
        assert_eq!(SystemdFormatter::default().flush(), "");
    }

    #[test]
    fn test_systemd() {
        let mut formatter = SystemdFormatter::default();
        for unit in ["unit1", "unit2", "unit1", "Unit3"] {
            let entry: Entry = [
                ("MESSAGE_ID", FieldValue::convert("MESSAGE_ID", UNIT_FAILED)),
                (
                    "MESSAGE",
                    format!("Unit {unit}.service entered failed state.").into(),
                ),
                ("UNIT", format!("{unit}.service").into()),
            ]
            .into_iter()
            .collect();
            assert_eq!(formatter.format(&entry), "");
        }

        assert_eq!(
            formatter.flush().lines().collect::<Vec<_>>(),
            vec![
                "",
                "Failed systemd units:",
                "",
                "    2 x unit1.service",
                "    1 x unit2.service",
                "    1 x Unit3.service",
            ]
        );
    }
}
