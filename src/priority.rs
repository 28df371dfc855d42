use std::fmt;
use std::str::FromStr;

/// Syslog priority levels as used by the journal `PRIORITY` field.
///
/// Lower numbers are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Emerg,
    Alert,
    Crit,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Priority {
    pub const ALL: [Priority; 8] = [
        Priority::Emerg,
        Priority::Alert,
        Priority::Crit,
        Priority::Error,
        Priority::Warning,
        Priority::Notice,
        Priority::Info,
        Priority::Debug,
    ];

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: i64) -> Option<Priority> {
        usize::try_from(level)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Emerg => "emerg",
            Priority::Alert => "alert",
            Priority::Crit => "crit",
            Priority::Error => "err",
            Priority::Warning => "warning",
            Priority::Notice => "notice",
            Priority::Info => "info",
            Priority::Debug => "debug",
        }
    }

    /// Sorted list of accepted labels, for error messages.
    pub fn labels() -> Vec<&'static str> {
        let mut labels: Vec<&'static str> = Self::ALL.iter().map(|p| p.label()).collect();
        labels.sort_unstable();
        labels
    }

    /// Resolve a YAML scalar (label, numeric string or integer) to a priority.
    pub fn from_yaml(value: &serde_yaml::Value) -> Option<Priority> {
        match value {
            serde_yaml::Value::String(s) => s.parse().ok(),
            serde_yaml::Value::Number(n) => n.as_i64().and_then(Priority::from_level),
            _ => None,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        if let Ok(level) = s.trim().parse::<i64>() {
            return Priority::from_level(level).ok_or_else(|| format!("invalid priority: {s}"));
        }

        Priority::ALL
            .iter()
            .copied()
            .find(|p| p.label() == s)
            .ok_or_else(|| format!("invalid priority: {s}"))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
