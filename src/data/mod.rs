//! Core data models for the student roster cache
//!
//! Upstream payloads are cached as opaque JSON. Only the student roster is
//! given a typed shape, because the validator needs to inspect it.

pub mod validator;

pub use validator::{DataQualityValidator, IssueKind, QualityIssue};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// First-level namespaces of the cache document
pub mod category {
    pub const STUDENTS: &str = "students";
    pub const BATCHES: &str = "batches";
    pub const CONTESTS: &str = "contests";
    pub const CONTEST_DETAILS: &str = "contest_details";
    pub const LEADERBOARDS: &str = "leaderboards";
}

/// Field holding the record list inside a student roster payload
pub const STUDENTS_FIELD: &str = "students";

/// A single student as returned by the upstream roster query
///
/// Every field is optional on the wire; the validator decides which
/// absences are defects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentRecord {
    pub id: Option<String>,
    pub leetcode_username: Option<String>,
    pub name: Option<String>,
    pub section: Option<String>,
    pub roll_number: Option<String>,
    pub rating: Option<f64>,
    pub total_solved: Option<i64>,
    pub easy_solved: Option<i64>,
    pub medium_solved: Option<i64>,
    pub hard_solved: Option<i64>,
    pub attended_contests_count: Option<i64>,
    pub global_ranking: Option<i64>,
    pub total_participants: Option<i64>,
    pub top_percentage: Option<f64>,
    pub badge: Option<String>,
    pub last_updated_at: Option<String>,
}

impl StudentRecord {
    /// Best human-readable identifier for log lines and issue reports
    pub fn identifier(&self) -> Option<&str> {
        [&self.leetcode_username, &self.name, &self.roll_number, &self.id]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .find(|v| !v.trim().is_empty())
    }
}

/// Batches for which zero records is the expected upstream answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownEmptySet(BTreeSet<String>);

impl KnownEmptySet {
    pub fn new<I, S>(batches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(batches.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, batch: &str) -> bool {
        self.0.contains(batch)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Canonical empty roster payload
pub fn empty_student_set() -> Value {
    empty_record_set(STUDENTS_FIELD)
}

/// `{ field: [] }`
pub fn empty_record_set(field: &str) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(field.to_string(), Value::Array(Vec::new()));
    Value::Object(map)
}

/// Number of records in a roster payload; anything without a list counts as zero
pub fn student_count(value: &Value) -> usize {
    record_count(value, STUDENTS_FIELD)
}

/// Number of elements in `value[field]` when it is an array
pub fn record_count(value: &Value, field: &str) -> usize {
    value
        .get(field)
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_student_record_parses_camel_case_payload() {
        let record: StudentRecord = serde_json::from_value(json!({
            "id": "42",
            "leetcodeUsername": "asha_codes",
            "name": "Asha",
            "section": "CSE-A",
            "rollNumber": "21CS042",
            "rating": 1650.5,
            "totalSolved": 300,
            "easySolved": 150,
            "mediumSolved": 120,
            "hardSolved": 30,
            "attendedContestsCount": 12,
            "recentContests": []
        }))
        .expect("record should parse");

        assert_eq!(record.leetcode_username.as_deref(), Some("asha_codes"));
        assert_eq!(record.roll_number.as_deref(), Some("21CS042"));
        assert_eq!(record.total_solved, Some(300));
        assert!(record.badge.is_none());
    }

    #[test]
    fn test_identifier_prefers_username_then_name() {
        let mut record = StudentRecord {
            name: Some("Ravi".into()),
            ..Default::default()
        };
        assert_eq!(record.identifier(), Some("Ravi"));

        record.leetcode_username = Some("ravi_k".into());
        assert_eq!(record.identifier(), Some("ravi_k"));

        assert_eq!(StudentRecord::default().identifier(), None);
    }

    #[test]
    fn test_student_count_handles_odd_shapes() {
        assert_eq!(student_count(&json!({"students": [{}, {}]})), 2);
        assert_eq!(student_count(&json!({"students": []})), 0);
        assert_eq!(student_count(&json!({"students": null})), 0);
        assert_eq!(student_count(&json!({})), 0);
        assert_eq!(student_count(&json!([1, 2, 3])), 0);
        assert_eq!(student_count(&empty_student_set()), 0);
    }

    #[test]
    fn test_empty_record_set_shape() {
        assert_eq!(empty_record_set("students"), json!({"students": []}));
    }

    #[test]
    fn test_known_empty_set_membership() {
        let known = KnownEmptySet::new(["citarIII"]);
        assert!(known.contains("citarIII"));
        assert!(!known.contains("batch24-28"));
        assert!(KnownEmptySet::default().is_empty());
    }
}
