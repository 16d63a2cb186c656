use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single time entry: what was worked on, when, and for how long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Caller-assigned identifier; the store does not generate ids.
    pub id: i64,
    pub project: String,
    pub task: String,
    pub date: NaiveDate,
    pub hours: f64,
}

impl Task {
    pub fn new(
        project: impl Into<String>,
        task: impl Into<String>,
        date: NaiveDate,
        hours: f64,
    ) -> Self {
        Self {
            id: next_id(),
            project: project.into(),
            task: task.into(),
            date,
            hours,
        }
    }
}

/// Convention carried over from the original store: ids are the creation
/// time in milliseconds since the epoch.
pub fn next_id() -> i64 {
    Utc::now().timestamp_millis()
}

/// Partial update for a task. Only fields that are `Some` are serialized,
/// so the server touches nothing else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.project.is_none() && self.task.is_none() && self.date.is_none() && self.hours.is_none()
    }
}

/// Validate an hours value at the input boundary: positive, in quarter-hour
/// steps. The store client itself never validates — the server owns that.
pub fn valid_hours(hours: f64) -> bool {
    if hours <= 0.0 {
        return false;
    }
    let quarters = hours * 4.0;
    (quarters - quarters.round()).abs() < 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn task_serializes_date_as_iso() {
        let t = Task {
            id: 1,
            project: "A".into(),
            task: "x".into(),
            date: d("2024-06-01"),
            hours: 2.0,
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["date"], "2024-06-01");
        assert_eq!(json["id"], 1);
        assert_eq!(json["hours"], 2.0);
    }

    #[test]
    fn task_forwards_exactly_what_is_given() {
        // No fabricated defaults: every field round-trips as supplied.
        let t = Task {
            id: 42,
            project: String::new(),
            task: String::new(),
            date: d("2024-01-01"),
            hours: 0.0,
        };
        let json = serde_json::to_string(&t).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn patch_serializes_only_supplied_fields() {
        let patch = TaskPatch {
            hours: Some(5.0),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"hours":5.0}"#);
    }

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        let patch = TaskPatch::default();
        assert!(patch.is_empty());
        assert_eq!(serde_json::to_string(&patch).unwrap(), "{}");
    }

    #[test]
    fn hours_granularity() {
        assert!(valid_hours(0.25));
        assert!(valid_hours(1.0));
        assert!(valid_hours(7.75));
        assert!(!valid_hours(0.0));
        assert!(!valid_hours(-1.0));
        assert!(!valid_hours(0.1));
        assert!(!valid_hours(1.3));
    }
}
