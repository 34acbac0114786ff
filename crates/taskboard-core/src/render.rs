use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::selection::Selection;
use crate::task::{Priority, Task};
use crate::view::TaskStats;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, tasks, selection, now))]
    pub fn print_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[&Task],
        selection: &Selection,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["ID", "Done", "Priority", "Category", "Due", "Title"]
            .map(String::from)
            .to_vec();

        let rows = tasks
            .iter()
            .map(|task| {
                let marker = if selection.contains(task.id) { "*" } else { "" };
                let id = self.paint(&format!("{marker}{}", task.id), "33");
                let done = if task.completed { "x" } else { "" }.to_string();

                let due = task
                    .due_date
                    .map(|date| date.with_timezone(&Local).format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                let due = if task.is_overdue(now) {
                    self.paint(&due, "31")
                } else {
                    due
                };

                let priority = match task.priority {
                    | Priority::High => self.paint(task.priority.as_str(), "31"),
                    | Priority::Medium => self.paint(task.priority.as_str(), "36"),
                    | Priority::Low => task.priority.as_str().to_string(),
                };

                let title = match task.description.as_deref() {
                    | Some(desc) => format!("{} - {desc}", task.title),
                    | None => task.title.clone(),
                };
                let title = if task.completed {
                    self.paint(&title, "2")
                } else {
                    title
                };

                vec![id, done, priority, task.category.to_string(), due, title]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn print_stats<W: Write>(&self, out: &mut W, stats: &TaskStats) -> anyhow::Result<()> {
        writeln!(
            out,
            "{} total, {} completed, {} pending, {} overdue, {} high priority pending ({:.0}% done)",
            stats.total,
            stats.completed,
            stats.pending,
            self.paint(&stats.overdue.to_string(), "31"),
            stats.high_priority_pending,
            stats.completion_percent(),
        )?;
        Ok(())
    }

    pub fn print_task<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        if let Some(desc) = task.description.as_deref() {
            writeln!(out, "description {desc}")?;
        }
        writeln!(out, "completed   {}", task.completed)?;
        writeln!(out, "priority    {}", task.priority)?;
        writeln!(out, "category    {}", task.category)?;
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", due.with_timezone(&Local).format("%Y-%m-%d %H:%M"))?;
        }
        writeln!(out, "created     {}", task.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"))?;
        if let Some(done) = task.completed_at {
            writeln!(out, "completed   {}", done.with_timezone(&Local).format("%Y-%m-%d %H:%M"))?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || text.is_empty() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| visible_width(h)).collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    let pad = |cell: &str, width: usize| {
        let padding = width.saturating_sub(visible_width(cell));
        format!("{cell}{}", " ".repeat(padding))
    };

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h.as_str(), *w))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell.as_str(), *w))
            .collect();
        writeln!(writer, "{}", line.join(" ").trim_end())?;
    }

    Ok(())
}

fn visible_width(s: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(s).as_str())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            escaped = ch != 'm';
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Renderer, strip_ansi, visible_width};
    use crate::selection::Selection;
    use crate::task::NewTask;
    use crate::view::TaskStats;

    #[test]
    fn strips_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[31mlate\x1b[0m"), "late");
        assert_eq!(visible_width("\x1b[33m12\x1b[0m"), 2);
    }

    #[test]
    fn table_marks_selected_rows() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .single()
            .expect("valid now");
        let task = NewTask::titled("Water plants")
            .into_task(7, now)
            .expect("valid task");
        let mut selection = Selection::default();
        selection.toggle(7);

        let mut out = Vec::new();
        Renderer::plain()
            .print_task_table(&mut out, &[&task], &selection, now)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[2].starts_with("*7"));
        assert!(lines[2].ends_with("Water plants"));
    }

    #[test]
    fn stats_line_reports_progress() {
        let stats = TaskStats {
            total: 4,
            completed: 1,
            pending: 3,
            overdue: 0,
            high_priority_pending: 1,
        };
        let mut out = Vec::new();
        Renderer::plain().print_stats(&mut out, &stats).expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("4 total, 1 completed, 3 pending"));
        assert!(text.contains("(25% done)"));
    }
}
