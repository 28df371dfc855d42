use super::error::ValidationError;
use crate::entry::{Entry, FieldKind, FieldValue, field_kind};
use crate::priority::Priority;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

pub const PRIORITY_FIELD: &str = "PRIORITY";

/// How a `PRIORITY` field was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrioritySpec {
    /// A single level: this level or anything more severe.
    Threshold(Priority),
    /// An explicit list of levels, matched exactly.
    Exact(Vec<Priority>),
}

/// Declared match values for one field of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    Priority(PrioritySpec),
    Values(Vec<String>),
}

/// A rule as written by a user or declared by a formatter, before compilation.
///
/// Field order is kept as declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSpec {
    fields: Vec<(String, FieldSpec)>,
}

impl RuleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field matching any of `values`.
    pub fn field<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.push((
            field.into(),
            FieldSpec::Values(values.into_iter().map(Into::into).collect()),
        ));
        self
    }

    pub fn priority(mut self, spec: PrioritySpec) -> Self {
        self.fields
            .push((PRIORITY_FIELD.to_string(), FieldSpec::Priority(spec)));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(f, s)| (f.as_str(), s))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse one rule map from configuration.
    ///
    /// All problems within the map are reported, not just the first.
    pub fn from_yaml(value: &Value) -> Result<RuleSpec, Vec<ValidationError>> {
        let Value::Mapping(map) = value else {
            return Err(vec![ValidationError::NotAMap]);
        };

        let mut spec = RuleSpec::new();
        let mut errors = Vec::new();

        for (key, values) in map {
            let field = scalar_to_string(key).unwrap_or_else(|| yaml_inline(key));

            if field == PRIORITY_FIELD {
                match parse_priority(values) {
                    Some(p) => spec.fields.push((field, FieldSpec::Priority(p))),
                    None => errors.push(ValidationError::InvalidPriority { field }),
                }
                continue;
            }

            let Value::Sequence(items) = values else {
                errors.push(ValidationError::NotAList { field });
                continue;
            };

            let mut strings = Vec::with_capacity(items.len());
            for item in items {
                match scalar_to_string(item) {
                    Some(s) => strings.push(s),
                    None => errors.push(ValidationError::NotAString {
                        field: field.clone(),
                        value: yaml_inline(item),
                    }),
                }
            }
            spec.fields.push((field, FieldSpec::Values(strings)));
        }

        if errors.is_empty() {
            Ok(spec)
        } else {
            Err(errors)
        }
    }
}

fn parse_priority(value: &Value) -> Option<PrioritySpec> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(Priority::from_yaml)
            .collect::<Option<Vec<_>>>()
            .map(PrioritySpec::Exact),
        other => Priority::from_yaml(other).map(PrioritySpec::Threshold),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn yaml_inline(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{value:?}"))
}

/// A normalized, comparable rule value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleValue {
    Text(String),
    Int(i64),
    Uuid(Uuid),
}

impl RuleValue {
    /// Coerce a declared value according to the field it applies to.
    pub fn convert(field: &str, raw: &str) -> Result<RuleValue, ValidationError> {
        let invalid = |expected| ValidationError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            expected,
        };

        if field == PRIORITY_FIELD {
            return raw
                .parse::<Priority>()
                .map(|p| RuleValue::Int(i64::from(p.level())))
                .map_err(|_| ValidationError::InvalidPriority {
                    field: field.to_string(),
                });
        }

        match field_kind(field) {
            FieldKind::Int => raw
                .trim()
                .parse()
                .map(RuleValue::Int)
                .map_err(|_| invalid("integer")),
            FieldKind::Uuid => Uuid::parse_str(raw.trim())
                .map(RuleValue::Uuid)
                .map_err(|_| invalid("UUID")),
            _ => Ok(RuleValue::Text(raw.to_string())),
        }
    }

    /// Turn an observed entry value into a rule value matching it.
    ///
    /// Returns `None` for values a rule cannot express.
    pub fn from_field(value: &FieldValue) -> Option<RuleValue> {
        match value {
            FieldValue::Text(s) => Some(RuleValue::Text(s.clone())),
            FieldValue::Int(n) => Some(RuleValue::Int(*n)),
            FieldValue::Uuid(u) => Some(RuleValue::Uuid(*u)),
            FieldValue::Bytes(b) => std::str::from_utf8(b)
                .ok()
                .map(|s| RuleValue::Text(s.to_string())),
            FieldValue::Timestamp(_) | FieldValue::Monotonic(_) | FieldValue::List(_) => None,
        }
    }

    pub fn matches(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (RuleValue::Text(want), FieldValue::Text(got)) => want == got,
            (RuleValue::Text(want), FieldValue::Bytes(got)) => want.as_bytes() == got.as_slice(),
            (RuleValue::Int(want), FieldValue::Int(got)) => want == got,
            (RuleValue::Int(want), FieldValue::Text(got)) => {
                got.trim().parse::<i64>().ok() == Some(*want)
            }
            (RuleValue::Uuid(want), FieldValue::Uuid(got)) => want == got,
            (RuleValue::Uuid(want), FieldValue::Text(got)) => {
                Uuid::parse_str(got.trim()).is_ok_and(|u| u == *want)
            }
            _ => false,
        }
    }

    fn to_yaml(&self) -> Value {
        match self {
            RuleValue::Text(s) => Value::String(s.clone()),
            RuleValue::Int(n) => Value::Number((*n).into()),
            RuleValue::Uuid(u) => Value::String(u.as_simple().to_string()),
        }
    }
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::Text(s) => write!(f, "{s}"),
            RuleValue::Int(n) => write!(f, "{n}"),
            RuleValue::Uuid(u) => write!(f, "{}", u.as_simple()),
        }
    }
}

/// Normalize the declared values for `field` into comparable rule values.
///
/// A `PRIORITY` threshold expands to every level from 0 (emerg) up to and
/// including the threshold.
pub fn convert_values(field: &str, spec: &FieldSpec) -> Result<Vec<RuleValue>, ValidationError> {
    let values = match spec {
        FieldSpec::Priority(PrioritySpec::Threshold(p)) => (0..=i64::from(p.level()))
            .map(RuleValue::Int)
            .collect(),
        FieldSpec::Priority(PrioritySpec::Exact(levels)) => levels
            .iter()
            .map(|p| RuleValue::Int(i64::from(p.level())))
            .collect(),
        FieldSpec::Values(raw) => raw
            .iter()
            .map(|v| RuleValue::convert(field, v))
            .collect::<Result<Vec<_>, _>>()?,
    };

    if values.is_empty() {
        return Err(ValidationError::EmptyList {
            field: field.to_string(),
        });
    }
    Ok(values)
}

/// A regular expression matched at the start of a field value.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Recognize `/.../` delimited strings.
    pub fn delimited(raw: &str) -> Option<&str> {
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            Some(&raw[1..raw.len() - 1])
        } else {
            None
        }
    }

    pub fn compile(field: &str, raw: &str, pattern: &str) -> Result<Pattern, ValidationError> {
        debug!(field, pattern, "compiling pattern");
        let regex =
            Regex::new(&format!("^(?:{pattern})")).map_err(|source| {
                ValidationError::InvalidRegex {
                    field: field.to_string(),
                    pattern: raw.to_string(),
                    source,
                }
            })?;
        Ok(Pattern {
            source: raw.to_string(),
            regex,
        })
    }

    /// Binary values are tried as text when they are valid UTF-8.
    pub fn is_match(&self, value: &FieldValue) -> bool {
        let text = match value {
            FieldValue::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            other => other.as_text(),
        };
        text.is_some_and(|text| self.regex.is_match(text))
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// One candidate value of a field: a literal, or for exclusions a pattern.
#[derive(Debug, Clone)]
pub enum MatchValue {
    Literal(RuleValue),
    Regex(Pattern),
}

impl MatchValue {
    pub fn matches(&self, value: &FieldValue) -> bool {
        match self {
            MatchValue::Literal(literal) => literal.matches(value),
            MatchValue::Regex(pattern) => pattern.is_match(value),
        }
    }

    fn to_yaml(&self, escape_slashes: bool) -> Value {
        match self {
            MatchValue::Regex(pattern) => Value::String(pattern.source().to_string()),
            MatchValue::Literal(RuleValue::Text(s))
                if escape_slashes && Pattern::delimited(s).is_some() =>
            {
                Value::String(format!("/{}$/", regex::escape(s)))
            }
            MatchValue::Literal(literal) => literal.to_yaml(),
        }
    }
}

impl fmt::Display for MatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchValue::Literal(literal) => write!(f, "{literal}"),
            MatchValue::Regex(pattern) => write!(f, "{}", pattern.source()),
        }
    }
}

/// The values one field may take for a rule to match.
#[derive(Debug, Clone)]
pub struct FieldMatch {
    pub field: String,
    pub values: Vec<MatchValue>,
}

/// A mapping of field names to values significant for that field.
///
/// Matches an entry when every field has at least one matching value.
#[derive(Debug, Clone, Default)]
pub struct FilterRule {
    fields: Vec<FieldMatch>,
}

impl FilterRule {
    fn compile(spec: &RuleSpec, allow_regex: bool) -> Result<FilterRule, ValidationError> {
        let mut fields = Vec::new();
        for (field, field_spec) in spec.fields() {
            let values = match field_spec {
                FieldSpec::Values(raw) if allow_regex => {
                    let mut values = Vec::with_capacity(raw.len());
                    for value in raw {
                        match Pattern::delimited(value) {
                            Some(pattern) => {
                                values.push(MatchValue::Regex(Pattern::compile(
                                    field, value, pattern,
                                )?));
                            }
                            None => {
                                debug!(field, value = %value, "not a regex");
                                values.push(MatchValue::Literal(RuleValue::convert(
                                    field, value,
                                )?));
                            }
                        }
                    }
                    if values.is_empty() {
                        return Err(ValidationError::EmptyList {
                            field: field.to_string(),
                        });
                    }
                    values
                }
                other => convert_values(field, other)?
                    .into_iter()
                    .map(MatchValue::Literal)
                    .collect(),
            };
            fields.push(FieldMatch {
                field: field.to_string(),
                values,
            });
        }
        Ok(FilterRule { fields })
    }

    /// Build a literal rule from observed field values.
    pub fn from_values(values: Vec<(String, RuleValue)>) -> FilterRule {
        FilterRule {
            fields: values
                .into_iter()
                .map(|(field, value)| FieldMatch {
                    field,
                    values: vec![MatchValue::Literal(value)],
                })
                .collect(),
        }
    }

    pub fn fields(&self) -> &[FieldMatch] {
        &self.fields
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        self.fields.iter().all(|fm| {
            entry
                .get(&fm.field)
                .is_some_and(|value| fm.values.iter().any(|m| m.matches(value)))
        })
    }

    /// Render as a YAML mapping of field to value list.
    ///
    /// With `escape_slashes`, literal strings that would read back as a
    /// pattern are written as an anchored, escaped pattern instead.
    pub fn to_yaml(&self, escape_slashes: bool) -> Value {
        let mut map = Mapping::new();
        for fm in &self.fields {
            map.insert(
                Value::String(fm.field.clone()),
                Value::Sequence(fm.values.iter().map(|v| v.to_yaml(escape_slashes)).collect()),
            );
        }
        Value::Mapping(map)
    }
}

/// Flow form, e.g. `{MESSAGE: [foo, /bar/], PRIORITY: [0, 1, 2]}`.
impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, fm) in self.fields.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: [", fm.field)?;
            for (vidx, value) in fm.values.iter().enumerate() {
                if vidx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{value}")?;
            }
            write!(f, "]")?;
        }
        write!(f, "}}")
    }
}

/// Filter rule selecting entries of interest.
#[derive(Debug, Clone)]
pub struct Inclusion {
    rule: FilterRule,
}

impl Inclusion {
    pub fn new(spec: &RuleSpec) -> Result<Inclusion, ValidationError> {
        Ok(Inclusion {
            rule: FilterRule::compile(spec, false)?,
        })
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        self.rule.matches(entry)
    }

    pub fn rule(&self) -> &FilterRule {
        &self.rule
    }
}

/// Filter rule suppressing entries, counting how often it fired.
///
/// Values written as `/.../` are regular expressions matched at the start
/// of the field value.
#[derive(Debug, Clone)]
pub struct Exclusion {
    rule: FilterRule,
    hits: u64,
    comment: Option<String>,
}

impl Exclusion {
    pub fn new(spec: &RuleSpec) -> Result<Exclusion, ValidationError> {
        debug!("new exclusion rule:");
        for (field, values) in spec.fields() {
            debug!("{field}={values:?}");
        }

        Ok(Exclusion {
            rule: FilterRule::compile(spec, true)?,
            hits: 0,
            comment: None,
        })
    }

    pub fn from_rule(rule: FilterRule) -> Exclusion {
        Exclusion {
            rule,
            hits: 0,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Test the entry, counting a hit when it matches.
    pub fn matches(&mut self, entry: &Entry) -> bool {
        let matched = self.rule.matches(entry);
        if matched {
            debug!("excluding entry");
            self.hits += 1;
        }
        matched
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn rule(&self) -> &FilterRule {
        &self.rule
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pairs: &[(&str, &str)]) -> Entry {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_priority_threshold_expands_to_range() {
        let spec = FieldSpec::Priority(PrioritySpec::Threshold(Priority::Error));
        let values = convert_values(PRIORITY_FIELD, &spec).unwrap();
        assert_eq!(
            values,
            vec![
                RuleValue::Int(0),
                RuleValue::Int(1),
                RuleValue::Int(2),
                RuleValue::Int(3)
            ]
        );
    }

    #[test]
    fn test_priority_list_is_an_exact_set() {
        let spec = RuleSpec::from_yaml(&yaml("PRIORITY: [err, 6]")).unwrap();
        let excl = Exclusion::new(&spec).unwrap();
        assert_eq!(excl.to_string(), "{PRIORITY: [3, 6]}");
    }

    #[test]
    fn test_priority_values_in_plain_list_go_through_the_table() {
        let spec = RuleSpec::new().field(PRIORITY_FIELD, ["crit"]);
        let incl = Inclusion::new(&spec).unwrap();
        assert!(incl.matches(&[("PRIORITY", FieldValue::Int(2))].into_iter().collect()));

        let bad = RuleSpec::new().field(PRIORITY_FIELD, ["loud"]);
        assert!(matches!(
            Inclusion::new(&bad),
            Err(ValidationError::InvalidPriority { .. })
        ));
    }

    #[test]
    fn test_uuid_fields_are_coerced() {
        let spec = RuleSpec::new().field("MESSAGE_ID", ["8d45620c1a4348dbb17410da57c60c66"]);
        let incl = Inclusion::new(&spec).unwrap();
        let id = Uuid::parse_str("8d45620c-1a43-48db-b174-10da57c60c66").unwrap();
        let e: Entry = [("MESSAGE_ID", FieldValue::Uuid(id))].into_iter().collect();
        assert!(incl.matches(&e));

        let bad = RuleSpec::new().field("MESSAGE_ID", ["nope"]);
        assert!(matches!(
            Inclusion::new(&bad),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_regex_only_for_exclusions() {
        let spec = RuleSpec::new().field("MESSAGE", ["/exclude/"]);
        let mut excl = Exclusion::new(&spec).unwrap();
        let incl = Inclusion::new(&spec).unwrap();

        assert!(excl.matches(&entry(&[("MESSAGE", "exclude this")])));
        assert!(!incl.matches(&entry(&[("MESSAGE", "exclude this")])));
        assert!(incl.matches(&entry(&[("MESSAGE", "/exclude/")])));
    }

    #[test]
    fn test_regex_does_not_match_non_text() {
        let spec = RuleSpec::new().field("CODE_LINE", ["/1/"]);
        let mut excl = Exclusion::new(&spec).unwrap();
        let e: Entry = [("CODE_LINE", FieldValue::Int(12))].into_iter().collect();
        assert!(!excl.matches(&e));
        assert_eq!(excl.hits(), 0);
    }

    #[test]
    fn test_regex_matches_binary_text() {
        let spec = RuleSpec::new().field("MESSAGE", ["/Started /"]);
        let mut excl = Exclusion::new(&spec).unwrap();
        let coloured: Entry = [("MESSAGE", FieldValue::Bytes(b"Started \x1b[1mfoo".to_vec()))]
            .into_iter()
            .collect();
        let invalid: Entry = [("MESSAGE", FieldValue::Bytes(vec![b'S', 0xff]))]
            .into_iter()
            .collect();
        assert!(excl.matches(&coloured));
        assert!(!excl.matches(&invalid));
        assert_eq!(excl.hits(), 1);
    }

    #[test]
    fn test_invalid_regex_fails_at_construction() {
        let spec = RuleSpec::new().field("MESSAGE", ["/(mismatched parenth/"]);
        assert!(matches!(
            Exclusion::new(&spec),
            Err(ValidationError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_from_yaml_reports_every_bad_field() {
        let errors = RuleSpec::from_yaml(&yaml("MESSAGE: 1\nPRIORITY: -1\nX: [[a]]")).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(matches!(RuleSpec::from_yaml(&yaml("- 1")), Err(e) if e.len() == 1));
    }

    #[test]
    fn test_scalars_are_stringified() {
        let spec = RuleSpec::from_yaml(&yaml("MESSAGE: [1, true, foo]")).unwrap();
        let excl = Exclusion::new(&spec).unwrap();
        assert_eq!(excl.to_string(), "{MESSAGE: [1, true, foo]}");
    }

    #[test]
    fn test_empty_value_list_is_rejected() {
        let spec = RuleSpec::from_yaml(&yaml("MESSAGE: []")).unwrap();
        assert!(matches!(
            Exclusion::new(&spec),
            Err(ValidationError::EmptyList { .. })
        ));
    }

    #[test]
    fn test_slash_literal_is_escaped_when_rendered() {
        let rule = FilterRule::from_values(vec![(
            "MESSAGE".to_string(),
            RuleValue::Text("/a.b/".to_string()),
        )]);
        let rendered = rule.to_yaml(true);
        let spec = RuleSpec::from_yaml(&rendered).unwrap();
        let mut excl = Exclusion::new(&spec).unwrap();

        assert!(excl.matches(&entry(&[("MESSAGE", "/a.b/")])));
        assert!(!excl.matches(&entry(&[("MESSAGE", "/aXb/")])));
        assert!(!excl.matches(&entry(&[("MESSAGE", "/a.b/ and more")])));
    }
}
