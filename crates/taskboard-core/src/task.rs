use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::{iso_date_serde, to_millis};
use crate::error::ValidationError;

/// Longest title accepted once surrounding whitespace is trimmed.
pub const TITLE_MAX_CHARS: usize = 100;

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum,
)]
pub enum Category {
    #[default]
    Personal,
    Work,
    Shopping,
    Health,
    Learning,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Personal,
        Category::Work,
        Category::Shopping,
        Category::Health,
        Category::Learning,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Work => "Work",
            Self::Shopping => "Shopping",
            Self::Health => "Health",
            Self::Learning => "Learning",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub completed: bool,

    pub priority: Priority,

    #[serde(default)]
    pub category: Category,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_date_serde::option"
    )]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(with = "iso_date_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_date_serde::option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Flips completion, keeping `completed_at` in step with the flag.
    pub fn toggled(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.completed = !self.completed;
        next.completed_at = next.completed.then(|| to_millis(now));
        next
    }

    pub fn marked_complete(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.completed = true;
        next.completed_at = Some(to_millis(now));
        next
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.map(|due| due < now).unwrap_or(false)
    }

    pub fn matches_query(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(needle_lower))
                .unwrap_or(false)
            || self
                .category
                .as_str()
                .to_lowercase()
                .contains(needle_lower)
    }
}

/// Input of the add operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Category,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn into_task(self, id: u64, now: DateTime<Utc>) -> Result<Task, ValidationError> {
        let title = validate_title(&self.title)?;
        Ok(Task {
            id,
            title,
            description: normalize_description(self.description),
            completed: false,
            priority: self.priority,
            category: self.category,
            due_date: self.due_date.map(to_millis),
            created_at: to_millis(now),
            completed_at: None,
        })
    }
}

/// Values submitted by an edit form. Identity, completion and creation
/// time are never touched by an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEdit {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Category,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskEdit {
    /// Prefills the form from an existing task.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            category: task.category,
            due_date: task.due_date,
        }
    }

    pub fn apply(self, task: &Task) -> Result<Task, ValidationError> {
        let title = validate_title(&self.title)?;
        Ok(Task {
            title,
            description: normalize_description(self.description),
            priority: self.priority,
            category: self.category,
            due_date: self.due_date.map(to_millis),
            ..task.clone()
        })
    }
}

/// Trims `raw` and checks it is non-empty and at most
/// [`TITLE_MAX_CHARS`] characters long.
pub fn validate_title(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = trimmed.chars().count();
    if len > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong { len });
    }
    Ok(trimmed.to_string())
}

fn normalize_description(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

/// Sample list used when storage holds no task entry yet.
pub fn seed_tasks(now: DateTime<Utc>) -> Vec<Task> {
    let now = to_millis(now);
    let day = |y: i32, m: u32, d: u32| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single();

    vec![
        Task {
            id: 1,
            title: "Buy groceries".to_string(),
            description: Some("Milk, bread, eggs, and vegetables".to_string()),
            completed: false,
            priority: Priority::Medium,
            category: Category::Shopping,
            due_date: Some(now + Duration::days(2)),
            created_at: day(2024, 1, 15).unwrap_or(now),
            completed_at: None,
        },
        Task {
            id: 2,
            title: "Read a book".to_string(),
            description: Some("Finish reading 'The Pragmatic Programmer'".to_string()),
            completed: true,
            priority: Priority::Low,
            category: Category::Learning,
            due_date: None,
            created_at: day(2024, 1, 14).unwrap_or(now),
            completed_at: Some(day(2024, 1, 16).unwrap_or(now)),
        },
        Task {
            id: 3,
            title: "Complete project proposal".to_string(),
            description: Some("Draft and review the Q2 project proposal".to_string()),
            completed: false,
            priority: Priority::High,
            category: Category::Work,
            due_date: Some(now + Duration::days(1)),
            created_at: day(2024, 1, 13).unwrap_or(now),
            completed_at: None,
        },
        Task {
            id: 4,
            title: "Exercise for 30 minutes".to_string(),
            description: None,
            completed: false,
            priority: Priority::Medium,
            category: Category::Health,
            due_date: None,
            created_at: day(2024, 1, 12).unwrap_or(now),
            completed_at: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{
        Category, NewTask, Priority, TITLE_MAX_CHARS, TaskEdit, seed_tasks, validate_title,
    };
    use crate::error::ValidationError;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .single()
            .expect("valid now")
    }

    #[test]
    fn title_is_trimmed_and_bounded() {
        assert_eq!(validate_title("  walk dog  ").expect("valid"), "walk dog");
        assert_eq!(validate_title(""), Err(ValidationError::EmptyTitle));
        assert_eq!(validate_title(" \t "), Err(ValidationError::EmptyTitle));

        let exact = "x".repeat(TITLE_MAX_CHARS);
        assert!(validate_title(&exact).is_ok());
        let long = "x".repeat(TITLE_MAX_CHARS + 1);
        assert_eq!(
            validate_title(&long),
            Err(ValidationError::TitleTooLong { len: 101 })
        );
    }

    #[test]
    fn title_length_counts_characters_not_bytes() {
        let accented = "é".repeat(TITLE_MAX_CHARS);
        assert!(validate_title(&accented).is_ok());
    }

    #[test]
    fn new_task_drops_blank_description() {
        let draft = NewTask {
            title: "Call mom".to_string(),
            description: Some("   ".to_string()),
            ..NewTask::default()
        };
        let task = draft.into_task(7, now()).expect("valid task");
        assert_eq!(task.id, 7);
        assert_eq!(task.description, None);
        assert_eq!(task.category, Category::Personal);
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert_eq!(task.created_at, now());
    }

    #[test]
    fn toggling_keeps_completed_at_in_step() {
        let task = NewTask::titled("Stretch")
            .into_task(1, now())
            .expect("valid task");

        let done = task.toggled(now());
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(now()));

        let undone = done.toggled(now());
        assert!(!undone.completed);
        assert_eq!(undone.completed_at, None);
    }

    #[test]
    fn edit_keeps_identity_and_completion() {
        let task = NewTask::titled("Draft")
            .into_task(3, now())
            .expect("valid task")
            .toggled(now());

        let mut edit = TaskEdit::from_task(&task);
        edit.title = "  Final draft ".to_string();
        edit.priority = Priority::High;
        let edited = edit.apply(&task).expect("valid edit");

        assert_eq!(edited.id, 3);
        assert_eq!(edited.title, "Final draft");
        assert_eq!(edited.priority, Priority::High);
        assert!(edited.completed);
        assert_eq!(edited.completed_at, task.completed_at);
        assert_eq!(edited.created_at, task.created_at);

        let mut blank = TaskEdit::from_task(&task);
        blank.title = "  ".to_string();
        assert_eq!(blank.apply(&task), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn stamps_are_stored_at_millisecond_precision() {
        let precise = now() + Duration::nanoseconds(123_456_789);
        let millis = now() + Duration::milliseconds(123);

        let task = NewTask {
            due_date: Some(precise + Duration::days(1)),
            ..NewTask::titled("Stretch")
        }
        .into_task(1, precise)
        .expect("valid task");
        assert_eq!(task.created_at, millis);
        assert_eq!(task.due_date, Some(millis + Duration::days(1)));
        assert_eq!(task.toggled(precise).completed_at, Some(millis));
        assert_eq!(task.marked_complete(precise).completed_at, Some(millis));
    }

    #[test]
    fn seed_tasks_hold_completion_invariant() {
        let seeds = seed_tasks(now());
        assert_eq!(seeds.len(), 4);
        for task in &seeds {
            assert_eq!(task.completed, task.completed_at.is_some());
        }
        assert_eq!(seeds.iter().filter(|t| t.completed).count(), 1);
    }
}
