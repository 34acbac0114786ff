use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::error::RecordError;
use crate::task::{Task, validate_title};

/// Strictly decodes a serialized task list. Every element must decode as a
/// task, carry a valid title and a positive id, and keep `completedAt`
/// present exactly when `completed` is set. Ids must be unique.
#[tracing::instrument(skip(raw))]
pub fn parse_task_list(raw: &str) -> Result<Vec<Task>, RecordError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = value else {
        return Err(RecordError::NotAList);
    };

    let mut out = Vec::with_capacity(items.len());
    let mut seen = HashSet::with_capacity(items.len());

    for (idx, item) in items.into_iter().enumerate() {
        let index = idx + 1;
        let invalid = |reason: String| RecordError::InvalidRecord { index, reason };

        let mut task: Task = serde_json::from_value(item).map_err(|err| invalid(err.to_string()))?;

        if task.id == 0 {
            return Err(invalid("id must be a positive integer".to_string()));
        }
        task.title = validate_title(&task.title).map_err(|err| invalid(err.to_string()))?;
        if task.completed != task.completed_at.is_some() {
            return Err(invalid(
                "completedAt must be present exactly when completed is true".to_string(),
            ));
        }
        if !seen.insert(task.id) {
            return Err(RecordError::DuplicateId(task.id));
        }

        out.push(task);
    }

    debug!(count = out.len(), "decoded task list");
    Ok(out)
}

pub fn to_json(tasks: &[Task]) -> serde_json::Result<String> {
    serde_json::to_string(tasks)
}

/// Two-space indented form used for exported files.
pub fn to_json_pretty(tasks: &[Task]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(tasks)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{parse_task_list, to_json, to_json_pretty};
    use crate::error::RecordError;
    use crate::task::{Category, Priority, seed_tasks};

    #[test]
    fn decodes_the_persisted_record_shape() {
        let raw = json!([
            {
                "id": 5,
                "title": "  Buy groceries ",
                "description": "Milk",
                "completed": true,
                "priority": "high",
                "category": "Shopping",
                "dueDate": "2026-03-02T00:00:00.000Z",
                "createdAt": "2026-03-01T09:30:00.000Z",
                "completedAt": "2026-03-01T10:00:00.000Z"
            },
            {
                "id": 6,
                "title": "Stretch",
                "completed": false,
                "priority": "low",
                "category": "Health",
                "createdAt": "2026-03-01T09:30:00.000Z"
            }
        ])
        .to_string();

        let tasks = parse_task_list(&raw).expect("valid list");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Buy groceries");
        assert_eq!(tasks[0].priority, Priority::High);
        assert_eq!(tasks[0].category, Category::Shopping);
        assert_eq!(
            tasks[0].due_date,
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).single()
        );
        assert_eq!(tasks[1].description, None);
        assert_eq!(tasks[1].due_date, None);
        assert_eq!(tasks[1].completed_at, None);
    }

    #[test]
    fn rejects_non_list_payloads() {
        assert!(matches!(
            parse_task_list("{\"id\": 1}"),
            Err(RecordError::NotAList)
        ));
        assert!(matches!(
            parse_task_list("not json"),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_structural_mismatches() {
        let missing_created = json!([
            { "id": 1, "title": "a", "completed": false, "priority": "low" }
        ])
        .to_string();
        assert!(matches!(
            parse_task_list(&missing_created),
            Err(RecordError::InvalidRecord { index: 1, .. })
        ));

        let unknown_priority = json!([
            {
                "id": 1, "title": "a", "completed": false, "priority": "urgent",
                "createdAt": "2026-03-01T09:30:00.000Z"
            }
        ])
        .to_string();
        assert!(matches!(
            parse_task_list(&unknown_priority),
            Err(RecordError::InvalidRecord { .. })
        ));

        let bad_date = json!([
            {
                "id": 1, "title": "a", "completed": false, "priority": "low",
                "createdAt": "last tuesday"
            }
        ])
        .to_string();
        assert!(matches!(
            parse_task_list(&bad_date),
            Err(RecordError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn rejects_invariant_violations() {
        let done_without_stamp = json!([
            {
                "id": 1, "title": "a", "completed": true, "priority": "low",
                "createdAt": "2026-03-01T09:30:00.000Z"
            }
        ])
        .to_string();
        assert!(matches!(
            parse_task_list(&done_without_stamp),
            Err(RecordError::InvalidRecord { index: 1, .. })
        ));

        let blank_title = json!([
            {
                "id": 1, "title": "   ", "completed": false, "priority": "low",
                "createdAt": "2026-03-01T09:30:00.000Z"
            }
        ])
        .to_string();
        assert!(matches!(
            parse_task_list(&blank_title),
            Err(RecordError::InvalidRecord { .. })
        ));

        let duplicate = json!([
            {
                "id": 2, "title": "a", "completed": false, "priority": "low",
                "createdAt": "2026-03-01T09:30:00.000Z"
            },
            {
                "id": 2, "title": "b", "completed": false, "priority": "low",
                "createdAt": "2026-03-01T09:30:00.000Z"
            }
        ])
        .to_string();
        assert!(matches!(
            parse_task_list(&duplicate),
            Err(RecordError::DuplicateId(2))
        ));
    }

    #[test]
    fn serialized_lists_decode_back() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .single()
            .expect("valid now");
        let seeds = seed_tasks(now);

        let compact = to_json(&seeds).expect("serialize");
        assert!(compact.contains("\"createdAt\":\"2024-01-15T00:00:00.000Z\""));
        assert!(!compact.contains("completedAt\":null"));

        let pretty = to_json_pretty(&seeds).expect("serialize pretty");
        assert!(pretty.starts_with("[\n  {"));
        assert_eq!(parse_task_list(&pretty).expect("decode"), seeds);
    }
}
