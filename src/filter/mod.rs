//! Inclusion/exclusion rule matching for journal entries
//!
//! A rule maps field names to the values significant for that field.
//! Fields combine with AND; the values listed for one field combine with OR.
//!
//! # Rule shape
//!
//! ```text
//! - MESSAGE: [exclude this, or this]     # literal values
//!   SYSLOG_IDENTIFIER: [from here]
//! - MESSAGE: [/Started .* session/]      # exclusions only: regex, matched at the start
//! - PRIORITY: err                        # threshold: err or more severe (0..=3)
//! - PRIORITY: [err, info]                # exact set of levels
//! ```
//!
//! `MESSAGE_ID`, `_BOOT_ID` and `_MACHINE_ID` values are read as UUIDs and
//! numeric journal fields as integers, so they compare equal to the decoded
//! entry values.

pub mod engine;
pub mod error;
pub mod rule;

pub use engine::{ConsumerRules, ExclusionStatistics, FilterRules, JournalFilter};
pub use error::{FilterError, ValidationError};
pub use rule::{
    Exclusion, FieldMatch, FieldSpec, FilterRule, Inclusion, MatchValue, PRIORITY_FIELD, Pattern,
    PrioritySpec, RuleSpec, RuleValue, convert_values,
};
