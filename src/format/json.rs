use super::EntryFormatter;
use crate::entry::{Entry, FieldValue};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::ser::PrettyFormatter;
use tracing::error;

/// JSON view of an entry: UUIDs as strings, times as integer microseconds.
struct JsonEntry<'a>(&'a Entry);

struct JsonValue<'a>(&'a FieldValue);

impl Serialize for JsonEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, value) in self.0.iter() {
            map.serialize_entry(field, &JsonValue(value))?;
        }
        map.end()
    }
}

impl Serialize for JsonValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Int(n) => serializer.serialize_i64(*n),
            FieldValue::Uuid(u) => serializer.collect_str(&u.hyphenated()),
            FieldValue::Timestamp(ts) => serializer.serialize_i64(ts.timestamp_micros()),
            FieldValue::Monotonic(d) => {
                serializer.serialize_u64(u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
            }
            FieldValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => serializer.serialize_str(s),
                Err(_) => serializer.collect_seq(bytes),
            },
            FieldValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&JsonValue(item))?;
                }
                seq.end()
            }
        }
    }
}

fn to_json(entry: &Entry, pretty: bool) -> String {
    let result = if pretty {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"        ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        JsonEntry(entry)
            .serialize(&mut ser)
            .map(|()| String::from_utf8_lossy(&buf).into_owned())
    } else {
        serde_json::to_string(&JsonEntry(entry))
    };

    match result {
        Ok(mut json) => {
            json.push('\n');
            json
        }
        Err(e) => {
            error!("cannot serialize entry: {e}");
            String::new()
        }
    }
}

/// One JSON object per line.
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl EntryFormatter for JsonFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn format(&mut self, entry: &Entry) -> String {
        to_json(entry, false)
    }
}

/// Indented JSON objects.
#[derive(Debug, Default)]
pub struct JsonPrettyFormatter;

impl EntryFormatter for JsonPrettyFormatter {
    fn name(&self) -> &'static str {
        "json-pretty"
    }

    fn format(&mut self, entry: &Entry) -> String {
        to_json(entry, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn sample() -> Entry {
        let mut entry = Entry::from_json_line(
            r#"{"MESSAGE":"hello","PRIORITY":"6",
                "_BOOT_ID":"0123456789abcdef0123456789abcdef",
                "__REALTIME_TIMESTAMP":"1700000000000001",
                "__MONOTONIC_TIMESTAMP":"42"}"#,
        )
        .unwrap();
        entry.insert("BIN", FieldValue::Bytes(vec![0xff, 0x00]));
        entry.insert("TEXTBIN", FieldValue::Bytes(b"ok".to_vec()));
        entry
    }

    #[test]
    fn test_json_conversions() {
        let line = JsonFormatter.format(&sample());
        assert!(line.ends_with("}\n"));
        assert_eq!(line.matches('\n').count(), 1);

        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value,
            json!({
                "MESSAGE": "hello",
                "PRIORITY": 6,
                "_BOOT_ID": "01234567-89ab-cdef-0123-456789abcdef",
                "__REALTIME_TIMESTAMP": 1_700_000_000_000_001_i64,
                "__MONOTONIC_TIMESTAMP": 42,
                "BIN": [255, 0],
                "TEXTBIN": "ok",
            })
        );
    }

    #[test]
    fn test_json_pretty_indent() {
        let entry: Entry = [("MESSAGE", "hi")].into_iter().collect();
        assert_eq!(
            JsonPrettyFormatter.format(&entry),
            "{\n        \"MESSAGE\": \"hi\"\n}\n"
        );
    }
}
