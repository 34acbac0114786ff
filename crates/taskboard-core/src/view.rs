use std::cmp::Ordering;

use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::trace;

use crate::task::{
  Priority,
  Task
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
  #[default]
  All,
  Pending,
  Completed,
  Overdue
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  clap::ValueEnum,
)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
  #[default]
  Created,
  Priority,
  #[value(name = "dueDate", alias = "due")]
  DueDate,
  Alphabetical
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFilter {
  pub search:         String,
  pub status:         StatusFilter,
  pub show_completed: bool
}

impl Default for ViewFilter {
  fn default() -> Self {
    Self {
      search:         String::new(),
      status:         StatusFilter::All,
      show_completed: true
    }
  }
}

impl ViewFilter {
  pub fn keeps(
    &self,
    task: &Task,
    needle_lower: &str,
    now: DateTime<Utc>
  ) -> bool {
    if !needle_lower.is_empty()
      && !task.matches_query(needle_lower)
    {
      return false;
    }

    match self.status {
      | StatusFilter::All => {
        self.show_completed
          || !task.completed
      }
      | StatusFilter::Pending => {
        !task.completed
      }
      | StatusFilter::Completed => {
        task.completed
      }
      | StatusFilter::Overdue => {
        task.is_overdue(now)
      }
    }
  }
}

/// Search, then status filter, then a stable sort. `now` is the single
/// instant every overdue check in the pass is made against.
#[tracing::instrument(skip(
  tasks, filter, now
))]
pub fn compute_view<'a>(
  tasks: &'a [Task],
  filter: &ViewFilter,
  sort: SortMode,
  now: DateTime<Utc>
) -> Vec<&'a Task> {
  let needle = filter.search.to_lowercase();

  let mut out: Vec<&Task> = tasks
    .iter()
    .filter(|task| {
      filter.keeps(task, &needle, now)
    })
    .collect();

  out.sort_by(|a, b| compare(a, b, sort));

  trace!(
    total = tasks.len(),
    shown = out.len(),
    "computed view"
  );
  out
}

fn compare(
  a: &Task,
  b: &Task,
  sort: SortMode
) -> Ordering {
  match sort {
    | SortMode::Created => {
      b.created_at.cmp(&a.created_at)
    }
    | SortMode::Priority => b
      .priority
      .rank()
      .cmp(&a.priority.rank()),
    | SortMode::DueDate => {
      match (a.due_date, b.due_date) {
        | (Some(x), Some(y)) => x.cmp(&y),
        | (Some(_), None) => {
          Ordering::Less
        }
        | (None, Some(_)) => {
          Ordering::Greater
        }
        | (None, None) => Ordering::Equal
      }
    }
    | SortMode::Alphabetical => a
      .title
      .to_lowercase()
      .cmp(&b.title.to_lowercase())
      .then_with(|| a.title.cmp(&b.title))
  }
}

pub fn is_overdue(
  task: &Task,
  now: DateTime<Utc>
) -> bool {
  task.is_overdue(now)
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
  pub total:                 usize,
  pub completed:             usize,
  pub pending:               usize,
  pub overdue:               usize,
  pub high_priority_pending: usize
}

impl TaskStats {
  /// Share of completed tasks in percent; 0 for an empty list.
  pub fn completion_percent(
    &self
  ) -> f64 {
    if self.total == 0 {
      return 0.0;
    }
    self.completed as f64 * 100.0
      / self.total as f64
  }
}

pub fn compute_stats(
  tasks: &[Task],
  now: DateTime<Utc>
) -> TaskStats {
  tasks.iter().fold(
    TaskStats {
      total: tasks.len(),
      ..TaskStats::default()
    },
    |mut stats, task| {
      if task.completed {
        stats.completed += 1;
      } else {
        stats.pending += 1;
        if task.priority == Priority::High
        {
          stats.high_priority_pending +=
            1;
        }
      }
      if task.is_overdue(now) {
        stats.overdue += 1;
      }
      stats
    }
  )
}
