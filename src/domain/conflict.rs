//! Ingredient conflict reference data.
//!
//! Conflict pairs are static input: two ingredient names flagged as
//! interacting, a severity on a bounded scale and a free-text note.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lowest accepted severity.
pub const MIN_SEVERITY: u8 = 1;
/// Highest accepted severity.
pub const MAX_SEVERITY: u8 = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("severity {0} is outside the accepted range {MIN_SEVERITY}..={MAX_SEVERITY}")]
pub struct SeverityOutOfRange(pub i64);

/// Severity of a conflict, 1 (mild) to 5 (severe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Severity(u8);

impl Severity {
    pub fn new(value: i64) -> Result<Self, SeverityOutOfRange> {
        Self::try_from(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Severity {
    type Error = SeverityOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(MIN_SEVERITY)..=i64::from(MAX_SEVERITY)).contains(&value) {
            Ok(Self(u8::try_from(value).map_err(|_| SeverityOutOfRange(value))?))
        } else {
            Err(SeverityOutOfRange(value))
        }
    }
}

impl From<Severity> for i64 {
    fn from(severity: Severity) -> Self {
        i64::from(severity.0)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conflict that is live for the current product selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPair {
    pub first: String,
    pub second: String,
    pub severity: Severity,
    pub note: String,
}

/// Import format of the conflict reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDefinition {
    pub ingredient_a: String,
    pub ingredient_b: String,
    pub severity: Severity,
    #[serde(default)]
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, true)]
    #[case(3, true)]
    #[case(5, true)]
    #[case(0, false)]
    #[case(6, false)]
    #[case(-1, false)]
    fn test_severity_bounds(#[case] raw: i64, #[case] valid: bool) {
        assert_eq!(Severity::new(raw).is_ok(), valid);
    }

    #[test]
    fn test_definition_rejects_out_of_range_severity() {
        let json = r#"{"ingredient_a":"Retinol","ingredient_b":"Citric Acid","severity":9}"#;
        assert!(serde_json::from_str::<ConflictDefinition>(json).is_err());
    }

    #[test]
    fn test_definition_note_defaults_to_empty() {
        let json = r#"{"ingredient_a":"Retinol","ingredient_b":"Citric Acid","severity":5}"#;
        let definition: ConflictDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.severity.value(), 5);
        assert!(definition.note.is_empty());
    }
}
