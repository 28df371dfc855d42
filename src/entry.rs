use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Field carrying the journal's opaque read position.
pub const CURSOR_FIELD: &str = "__CURSOR";

/// How the value of a given journal field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Int,
    Uuid,
    Realtime,
    Monotonic,
}

const UUID_FIELDS: &[&str] = &["MESSAGE_ID", "_BOOT_ID", "_MACHINE_ID"];

const INT_FIELDS: &[&str] = &[
    "PRIORITY",
    "SYSLOG_FACILITY",
    "SYSLOG_PID",
    "CODE_LINE",
    "ERRNO",
    "EXIT_STATUS",
    "LEADER",
    "_PID",
    "_UID",
    "_GID",
    "_AUDIT_SESSION",
    "_AUDIT_LOGINUID",
    "_SYSTEMD_SESSION",
    "_SYSTEMD_OWNER_UID",
    "OBJECT_PID",
    "OBJECT_UID",
    "OBJECT_GID",
    "OBJECT_AUDIT_SESSION",
    "OBJECT_AUDIT_LOGINUID",
    "COREDUMP_PID",
    "COREDUMP_UID",
    "COREDUMP_GID",
    "COREDUMP_SIGNAL",
    "USERSPACE_USEC",
    "INITRD_USEC",
    "KERNEL_USEC",
];

const REALTIME_FIELDS: &[&str] = &[
    "__REALTIME_TIMESTAMP",
    "_SOURCE_REALTIME_TIMESTAMP",
    "COREDUMP_TIMESTAMP",
];

const MONOTONIC_FIELDS: &[&str] = &["__MONOTONIC_TIMESTAMP", "_SOURCE_MONOTONIC_TIMESTAMP"];

pub fn field_kind(field: &str) -> FieldKind {
    if UUID_FIELDS.contains(&field) {
        FieldKind::Uuid
    } else if INT_FIELDS.contains(&field) {
        FieldKind::Int
    } else if REALTIME_FIELDS.contains(&field) {
        FieldKind::Realtime
    } else if MONOTONIC_FIELDS.contains(&field) {
        FieldKind::Monotonic
    } else {
        FieldKind::Text
    }
}

/// A single decoded journal field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Monotonic(Duration),
    Bytes(Vec<u8>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Convert a raw string value according to the field's kind.
    ///
    /// Values that don't parse as their expected kind are kept as text.
    pub fn convert(field: &str, raw: &str) -> FieldValue {
        let converted = match field_kind(field) {
            FieldKind::Text => None,
            FieldKind::Int => raw.trim().parse().ok().map(FieldValue::Int),
            FieldKind::Uuid => Uuid::parse_str(raw.trim()).ok().map(FieldValue::Uuid),
            FieldKind::Realtime => raw
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_micros)
                .map(FieldValue::Timestamp),
            FieldKind::Monotonic => raw
                .trim()
                .parse::<u64>()
                .ok()
                .map(|us| FieldValue::Monotonic(Duration::from_micros(us))),
        };

        converted.unwrap_or_else(|| FieldValue::Text(raw.to_string()))
    }

    /// Decode a value from `journalctl -o json` output.
    pub fn from_json(field: &str, value: &Value) -> Option<FieldValue> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(FieldValue::convert(field, s)),
            Value::Number(n) => Some(FieldValue::convert(field, &n.to_string())),
            Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
            Value::Array(items) => {
                let bytes: Option<Vec<u8>> = items
                    .iter()
                    .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect();
                match bytes {
                    Some(bytes) if !items.is_empty() => Some(FieldValue::Bytes(bytes)),
                    _ => Some(FieldValue::List(
                        items
                            .iter()
                            .filter_map(|item| FieldValue::from_json(field, item))
                            .collect(),
                    )),
                }
            }
            Value::Object(_) => Some(FieldValue::Text(value.to_string())),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Uuid(u) => write!(f, "{}", u.as_simple()),
            FieldValue::Timestamp(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            FieldValue::Monotonic(d) => write!(f, "{}", d.as_micros()),
            FieldValue::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            FieldValue::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Uuid(value)
    }
}

/// One journal record: a mapping of field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    fields: BTreeMap<String, FieldValue>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn cursor(&self) -> Option<&str> {
        self.get_text(CURSOR_FIELD)
    }

    /// Parse one line of `journalctl -o json` output.
    pub fn from_json_line(line: &str) -> Result<Entry, serde_json::Error> {
        let map: serde_json::Map<String, Value> = serde_json::from_str(line)?;
        Ok(map
            .iter()
            .filter_map(|(field, value)| {
                FieldValue::from_json(field, value).map(|v| (field.clone(), v))
            })
            .collect())
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Entry {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Entry {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_fields_are_converted() {
        let entry = Entry::from_json_line(
            r#"{"__CURSOR":"s=abc","PRIORITY":"3","_PID":"42","MESSAGE":"hello",
                "_BOOT_ID":"0123456789abcdef0123456789abcdef",
                "__REALTIME_TIMESTAMP":"5000000","__MONOTONIC_TIMESTAMP":"700"}"#,
        )
        .unwrap();

        assert_eq!(entry.get("PRIORITY"), Some(&FieldValue::Int(3)));
        assert_eq!(entry.get("_PID"), Some(&FieldValue::Int(42)));
        assert_eq!(entry.get_text("MESSAGE"), Some("hello"));
        assert_eq!(entry.cursor(), Some("s=abc"));
        assert!(matches!(entry.get("_BOOT_ID"), Some(FieldValue::Uuid(_))));
        assert_eq!(
            entry.get("__REALTIME_TIMESTAMP"),
            Some(&FieldValue::Timestamp(
                DateTime::from_timestamp_micros(5_000_000).unwrap()
            ))
        );
        assert_eq!(
            entry.get("__MONOTONIC_TIMESTAMP"),
            Some(&FieldValue::Monotonic(Duration::from_micros(700)))
        );
    }

    #[test]
    fn test_unparseable_typed_value_stays_text() {
        assert_eq!(
            FieldValue::convert("_PID", "not-a-pid"),
            FieldValue::Text("not-a-pid".to_string())
        );
    }

    #[test]
    fn test_binary_and_list_values() {
        let entry =
            Entry::from_json_line(r#"{"BDATA":[130,172],"MULTI":["a","b"],"GONE":null}"#).unwrap();
        assert_eq!(entry.get("BDATA"), Some(&FieldValue::Bytes(vec![0x82, 0xac])));
        assert_eq!(
            entry.get("MULTI"),
            Some(&FieldValue::List(vec!["a".into(), "b".into()]))
        );
        assert!(!entry.contains("GONE"));
    }
}
