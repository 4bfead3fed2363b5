//! Data-quality checks for cached student rosters
//!
//! Findings are plain values, never errors. Any finding marks the whole batch
//! as problematic, since batches are the unit of eviction.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::{StudentRecord, STUDENTS_FIELD};

const MAX_RATING: f64 = 4000.0;
const MAX_TOTAL_SOLVED: i64 = 3000;
const MAX_ATTENDED_CONTESTS: i64 = 1000;

/// Category of a data-quality finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    OutOfRange,
    SumMismatch,
    Negative,
    Malformed,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IssueKind::Missing => "missing",
            IssueKind::OutOfRange => "out of range",
            IssueKind::SumMismatch => "sum mismatch",
            IssueKind::Negative => "negative",
            IssueKind::Malformed => "malformed",
        };
        f.write_str(text)
    }
}

/// One defect found in one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityIssue {
    pub batch: String,
    pub student: String,
    pub field: &'static str,
    pub kind: IssueKind,
    pub observed: String,
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} (observed {})",
            self.student, self.field, self.kind, self.observed
        )
    }
}

/// Stateless rule set applied to student rosters
#[derive(Debug, Clone, Copy, Default)]
pub struct DataQualityValidator;

impl DataQualityValidator {
    pub fn new() -> Self {
        Self
    }

    /// Checks every record; an empty result means the batch is healthy
    pub fn validate(&self, records: &[StudentRecord], batch: &str) -> Vec<QualityIssue> {
        records
            .iter()
            .enumerate()
            .flat_map(|(index, record)| self.check_record(record, index, batch))
            .collect()
    }

    /// Checks a raw roster payload, reporting records that do not parse
    pub fn validate_payload(&self, payload: &Value, batch: &str) -> Vec<QualityIssue> {
        let Some(items) = payload.get(STUDENTS_FIELD).and_then(Value::as_array) else {
            return vec![QualityIssue {
                batch: batch.to_string(),
                student: "<roster>".to_string(),
                field: STUDENTS_FIELD,
                kind: IssueKind::Malformed,
                observed: type_name(payload.get(STUDENTS_FIELD)).to_string(),
            }];
        };

        let mut issues = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match serde_json::from_value::<StudentRecord>(item.clone()) {
                Ok(record) => issues.extend(self.check_record(&record, index, batch)),
                Err(e) => issues.push(QualityIssue {
                    batch: batch.to_string(),
                    student: format!("#{}", index),
                    field: "record",
                    kind: IssueKind::Malformed,
                    observed: e.to_string(),
                }),
            }
        }
        issues
    }

    fn check_record(&self, record: &StudentRecord, index: usize, batch: &str) -> Vec<QualityIssue> {
        let student = record
            .identifier()
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index));
        let issue = |field: &'static str, kind: IssueKind, observed: String| QualityIssue {
            batch: batch.to_string(),
            student: student.clone(),
            field,
            kind,
            observed,
        };
        let mut issues = Vec::new();

        if is_blank(&record.leetcode_username) {
            issues.push(issue("leetcodeUsername", IssueKind::Missing, describe(&record.leetcode_username)));
        }
        if is_blank(&record.name) {
            issues.push(issue("name", IssueKind::Missing, describe(&record.name)));
        }

        if let Some(rating) = record.rating {
            if !(0.0..=MAX_RATING).contains(&rating) {
                issues.push(issue("rating", IssueKind::OutOfRange, rating.to_string()));
            }
        }

        let total = record.total_solved.unwrap_or(0);
        let easy = record.easy_solved.unwrap_or(0);
        let medium = record.medium_solved.unwrap_or(0);
        let hard = record.hard_solved.unwrap_or(0);
        match easy.checked_add(medium).and_then(|s| s.checked_add(hard)) {
            Some(sum) if sum != total => {
                issues.push(issue("totalSolved", IssueKind::SumMismatch, format!("{} != {}", total, sum)));
            }
            Some(_) => {}
            // Counters too large to add cannot match any total
            None => issues.push(issue(
                "totalSolved",
                IssueKind::SumMismatch,
                format!("{} != {} + {} + {}", total, easy, medium, hard),
            )),
        }
        if total > MAX_TOTAL_SOLVED {
            issues.push(issue("totalSolved", IssueKind::OutOfRange, total.to_string()));
        }

        for (field, count) in [
            ("totalSolved", total),
            ("easySolved", easy),
            ("mediumSolved", medium),
            ("hardSolved", hard),
        ] {
            if count < 0 {
                issues.push(issue(field, IssueKind::Negative, count.to_string()));
            }
        }

        let attended = record.attended_contests_count.unwrap_or(0);
        if !(0..=MAX_ATTENDED_CONTESTS).contains(&attended) {
            issues.push(issue("attendedContestsCount", IssueKind::OutOfRange, attended.to_string()));
        }

        if is_blank(&record.section) {
            issues.push(issue("section", IssueKind::Missing, describe(&record.section)));
        }
        if is_blank(&record.roll_number) {
            issues.push(issue("rollNumber", IssueKind::Missing, describe(&record.roll_number)));
        }

        issues
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn describe(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("{:?}", v),
        None => "null".to_string(),
    }
}

fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "absent",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "bool",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_record() -> StudentRecord {
        StudentRecord {
            id: Some("1".into()),
            leetcode_username: Some("asha_codes".into()),
            name: Some("Asha".into()),
            section: Some("CSE-A".into()),
            roll_number: Some("21CS001".into()),
            rating: Some(1720.4),
            total_solved: Some(10),
            easy_solved: Some(5),
            medium_solved: Some(4),
            hard_solved: Some(1),
            attended_contests_count: Some(8),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_record_has_no_issues() {
        let issues = DataQualityValidator::new().validate(&[valid_record()], "b1");
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_sum_mismatch_yields_exactly_one_issue() {
        let record = StudentRecord {
            total_solved: Some(10),
            easy_solved: Some(3),
            medium_solved: Some(3),
            hard_solved: Some(3),
            ..valid_record()
        };

        let issues = DataQualityValidator::new().validate(&[record], "b1");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::SumMismatch);
        assert_eq!(issues[0].field, "totalSolved");
        assert_eq!(issues[0].observed, "10 != 9");
        assert_eq!(issues[0].student, "asha_codes");
    }

    #[test]
    fn test_overflowing_counters_are_a_mismatch_not_a_panic() {
        let record = StudentRecord {
            total_solved: Some(10),
            easy_solved: Some(i64::MAX),
            medium_solved: Some(1),
            hard_solved: Some(0),
            ..valid_record()
        };

        let issues = DataQualityValidator::new().validate(&[record], "b1");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::SumMismatch);
        assert_eq!(issues[0].observed, format!("10 != {} + 1 + 0", i64::MAX));
    }

    #[test]
    fn test_rating_out_of_range() {
        let validator = DataQualityValidator::new();
        for rating in [-1.0, 4000.5, 5000.0] {
            let record = StudentRecord { rating: Some(rating), ..valid_record() };
            let issues = validator.validate(&[record], "b1");
            assert_eq!(issues.len(), 1, "rating {}", rating);
            assert_eq!(issues[0].kind, IssueKind::OutOfRange);
            assert_eq!(issues[0].field, "rating");
        }

        let unrated = StudentRecord { rating: None, ..valid_record() };
        assert!(validator.validate(&[unrated], "b1").is_empty());
    }

    #[test]
    fn test_missing_identity_fields() {
        let record = StudentRecord {
            leetcode_username: None,
            name: Some("  ".into()),
            section: None,
            roll_number: Some(String::new()),
            ..valid_record()
        };

        let issues = DataQualityValidator::new().validate(&[record], "b1");

        let fields: Vec<_> = issues.iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["leetcodeUsername", "name", "section", "rollNumber"]);
        assert!(issues.iter().all(|i| i.kind == IssueKind::Missing));
        assert_eq!(issues[0].student, "1");
    }

    #[test]
    fn test_total_solved_above_ceiling() {
        let record = StudentRecord {
            total_solved: Some(3100),
            easy_solved: Some(1500),
            medium_solved: Some(1200),
            hard_solved: Some(400),
            ..valid_record()
        };

        let issues = DataQualityValidator::new().validate(&[record], "b1");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::OutOfRange);
        assert_eq!(issues[0].observed, "3100");
    }

    #[test]
    fn test_negative_counter_is_reported() {
        let record = StudentRecord {
            total_solved: Some(4),
            easy_solved: Some(6),
            medium_solved: Some(-2),
            hard_solved: Some(0),
            ..valid_record()
        };

        let issues = DataQualityValidator::new().validate(&[record], "b1");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Negative);
        assert_eq!(issues[0].field, "mediumSolved");
    }

    #[test]
    fn test_attended_contests_bounds() {
        let validator = DataQualityValidator::new();
        let too_many = StudentRecord { attended_contests_count: Some(1001), ..valid_record() };
        let negative = StudentRecord { attended_contests_count: Some(-1), ..valid_record() };
        let edge = StudentRecord { attended_contests_count: Some(1000), ..valid_record() };

        assert_eq!(validator.validate(&[too_many], "b1").len(), 1);
        assert_eq!(validator.validate(&[negative], "b1").len(), 1);
        assert!(validator.validate(&[edge], "b1").is_empty());
    }

    #[test]
    fn test_issues_from_multiple_records_are_concatenated() {
        let bad_rating = StudentRecord { rating: Some(5000.0), ..valid_record() };
        let no_section = StudentRecord { section: None, ..valid_record() };

        let issues =
            DataQualityValidator::new().validate(&[valid_record(), bad_rating, no_section], "b7");

        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.batch == "b7"));
    }

    #[test]
    fn test_validate_payload_flags_malformed_records() {
        let payload = json!({
            "students": [
                serde_json::to_value(valid_record()).expect("serialize"),
                {"leetcodeUsername": 12, "name": "Broken"}
            ]
        });

        let issues = DataQualityValidator::new().validate_payload(&payload, "b1");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::Malformed);
        assert_eq!(issues[0].student, "#1");
    }

    #[test]
    fn test_validate_payload_without_list_is_malformed() {
        let issues = DataQualityValidator::new().validate_payload(&json!({"students": "none"}), "b1");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].observed, "string");
    }

    #[test]
    fn test_issue_display() {
        let issue = QualityIssue {
            batch: "b1".into(),
            student: "asha_codes".into(),
            field: "rating",
            kind: IssueKind::OutOfRange,
            observed: "5000".into(),
        };
        assert_eq!(issue.to_string(), "asha_codes: rating out of range (observed 5000)");
    }
}
