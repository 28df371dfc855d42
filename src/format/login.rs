use super::EntryFormatter;
use crate::entry::Entry;
use crate::filter::RuleSpec;
use std::collections::BTreeMap;

/// `MESSAGE_ID` of systemd-logind's "New session" message.
const NEW_SESSION: &str = "8d45620c1a4348dbb17410da57c60c66";

/// Counts new login sessions per user.
#[derive(Debug, Default)]
pub struct LoginFormatter {
    logins: BTreeMap<String, usize>,
}

impl EntryFormatter for LoginFormatter {
    fn name(&self) -> &'static str {
        "login"
    }

    fn filter_inclusions(&self) -> Option<Vec<RuleSpec>> {
        Some(vec![
            RuleSpec::new()
                .field("MESSAGE_ID", [NEW_SESSION])
                .field("_COMM", ["systemd-logind"]),
        ])
    }

    fn format(&mut self, entry: &Entry) -> String {
        if let Some(user) = entry.get("USER_ID") {
            *self.logins.entry(user.to_string()).or_default() += 1;
        }
        String::new()
    }

    fn flush(&mut self) -> String {
        if self.logins.is_empty() {
            return String::new();
        }

        let mut ret = String::from("\nUser logins:\n\n");
        for (user, count) in &self.logins {
            ret.push_str(&format!("{count:>5} x {user}\n"));
        }
        ret
    }
}
