use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::error::{ImportError, LoadError, ValidationError};
use crate::preferences::{load_dark_mode, save_dark_mode};
use crate::records::{parse_task_list, to_json, to_json_pretty};
use crate::selection::Selection;
use crate::storage::{Storage, TASKS_KEY};
use crate::task::{NewTask, Task, TaskEdit, seed_tasks};

/// Snapshots kept for undo; older ones are discarded.
pub const UNDO_DEPTH: usize = 10;

/// Owns the task list, its undo history and the bulk-action selection.
///
/// Every mutation snapshots the list first, swaps in the new list and
/// mirrors it to storage. Mirroring is best-effort: a failed write is
/// logged and the in-memory list stays authoritative.
#[derive(Debug)]
pub struct TaskStore<S: Storage> {
    tasks: Vec<Task>,
    undo: VecDeque<Vec<Task>>,
    selection: Selection,
    dark_mode: bool,
    storage: S,
}

impl<S: Storage> TaskStore<S> {
    /// Loads the persisted list, or seeds and persists the sample list when
    /// storage has no task entry yet.
    #[tracing::instrument(skip(storage, now))]
    pub fn open(storage: S, now: DateTime<Utc>) -> Result<Self, LoadError> {
        let raw = storage
            .get(TASKS_KEY)
            .map_err(|err| LoadError::Read(format!("{err:#}")))?;

        let (tasks, seeded) = match raw {
            | Some(raw) => (parse_task_list(&raw)?, false),
            | None => (seed_tasks(now), true),
        };
        let dark_mode = load_dark_mode(&storage);

        let mut store = Self {
            tasks,
            undo: VecDeque::with_capacity(UNDO_DEPTH),
            selection: Selection::default(),
            dark_mode,
            storage,
        };
        if seeded {
            store.persist();
        }

        info!(
            count = store.tasks.len(),
            seeded,
            dark_mode,
            "opened task store"
        );
        Ok(store)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.max_id().saturating_add(1)
    }

    fn max_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Ends the session, handing back the storage medium.
    pub fn into_storage(self) -> S {
        self.storage
    }

    #[tracing::instrument(skip(self, new_task, now), fields(title = %new_task.title))]
    pub fn add(&mut self, new_task: NewTask, now: DateTime<Utc>) -> Result<u64, ValidationError> {
        let id = self.next_id();
        let task = new_task.into_task(id, now)?;

        self.snapshot();
        let mut next = Vec::with_capacity(self.tasks.len() + 1);
        next.push(task);
        next.extend(self.tasks.iter().cloned());
        self.commit(next);

        debug!(id, count = self.tasks.len(), "task added");
        Ok(id)
    }

    /// Returns whether a task with `id` existed. The snapshot is taken
    /// either way.
    #[tracing::instrument(skip(self, now))]
    pub fn toggle_completion(&mut self, id: u64, now: DateTime<Utc>) -> bool {
        self.snapshot();
        let mut found = false;
        let next: Vec<Task> = self
            .tasks
            .iter()
            .map(|task| {
                if task.id == id {
                    found = true;
                    task.toggled(now)
                } else {
                    task.clone()
                }
            })
            .collect();
        self.commit(next);

        if !found {
            debug!(id, "toggle: no such task");
        }
        found
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: u64) -> bool {
        self.snapshot();
        let before = self.tasks.len();
        let next: Vec<Task> = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        let found = next.len() != before;
        self.commit(next);
        self.selection.remove(id);

        debug!(id, found, count = self.tasks.len(), "delete");
        found
    }

    /// Replaces the task carrying `task.id` wholesale. Title validation is
    /// the caller's job; see [`TaskStore::edit`].
    #[tracing::instrument(skip(self, task), fields(id = task.id))]
    pub fn update(&mut self, task: Task) -> bool {
        self.snapshot();
        let mut found = false;
        let next: Vec<Task> = self
            .tasks
            .iter()
            .map(|existing| {
                if existing.id == task.id {
                    found = true;
                    task.clone()
                } else {
                    existing.clone()
                }
            })
            .collect();
        self.commit(next);

        if !found {
            debug!(id = task.id, "update: no such task");
        }
        found
    }

    /// Validates an edit-form submission, then applies it via `update`.
    /// Returns `Ok(false)` without touching anything when `id` is unknown.
    #[tracing::instrument(skip(self, edit))]
    pub fn edit(&mut self, id: u64, edit: TaskEdit) -> Result<bool, ValidationError> {
        let Some(current) = self.get(id) else {
            debug!(id, "edit: no such task");
            return Ok(false);
        };
        let updated = edit.apply(current)?;
        Ok(self.update(updated))
    }

    /// Marks every listed task complete and clears the selection. Returns
    /// how many tasks matched.
    #[tracing::instrument(skip(self, ids, now), fields(ids = ids.len()))]
    pub fn bulk_complete(&mut self, ids: &BTreeSet<u64>, now: DateTime<Utc>) -> usize {
        self.snapshot();
        let mut matched = 0;
        let next: Vec<Task> = self
            .tasks
            .iter()
            .map(|task| {
                if ids.contains(&task.id) {
                    matched += 1;
                    task.marked_complete(now)
                } else {
                    task.clone()
                }
            })
            .collect();
        self.commit(next);
        self.selection.clear();

        debug!(matched, "bulk complete");
        matched
    }

    #[tracing::instrument(skip(self, ids), fields(ids = ids.len()))]
    pub fn bulk_delete(&mut self, ids: &BTreeSet<u64>) -> usize {
        self.snapshot();
        let before = self.tasks.len();
        let next: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| !ids.contains(&t.id))
            .cloned()
            .collect();
        let removed = before - next.len();
        self.commit(next);
        self.selection.clear();

        debug!(removed, count = self.tasks.len(), "bulk delete");
        removed
    }

    pub fn complete_selected(&mut self, now: DateTime<Utc>) -> usize {
        let ids = self.selection.ids().clone();
        self.bulk_complete(&ids, now)
    }

    pub fn delete_selected(&mut self) -> usize {
        let ids = self.selection.ids().clone();
        self.bulk_delete(&ids)
    }

    /// Toggles `id` in the selection. Unknown ids are never selected.
    pub fn toggle_selection(&mut self, id: u64) -> bool {
        if self.get(id).is_none() {
            debug!(id, "select: no such task");
            return false;
        }
        self.selection.toggle(id)
    }

    /// Selects exactly `ids`, typically the ids of the current view.
    pub fn select_all<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = u64>,
    {
        let existing: BTreeSet<u64> = self.tasks.iter().map(|t| t.id).collect();
        self.selection
            .replace(ids.into_iter().filter(|id| existing.contains(id)));
    }

    pub fn deselect_all(&mut self) {
        self.selection.clear();
    }

    /// Replaces the whole list with an imported one. Each imported id is
    /// shifted by the current maximum id. The payload is fully decoded
    /// before anything changes.
    #[tracing::instrument(skip(self, raw))]
    pub fn import_replace(&mut self, raw: &str) -> Result<usize, ImportError> {
        let imported = parse_task_list(raw)?;
        let base = self.max_id();

        let remapped = imported
            .into_iter()
            .map(|mut task| -> Result<Task, ImportError> {
                task.id = base
                    .checked_add(task.id)
                    .filter(|id| *id < u64::MAX)
                    .ok_or(ImportError::IdOverflow(task.id))?;
                Ok(task)
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.snapshot();
        let count = remapped.len();
        self.commit(remapped);
        self.prune_selection();

        info!(count, id_offset = base, "imported tasks");
        Ok(count)
    }

    /// Restores the most recent snapshot. Undo itself is not undoable.
    #[tracing::instrument(skip(self))]
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo.pop_back() else {
            debug!("undo: history empty");
            return false;
        };

        self.commit(previous);
        self.prune_selection();
        info!(remaining = self.undo.len(), "undo applied");
        true
    }

    pub fn export_json(&self) -> anyhow::Result<String> {
        to_json_pretty(&self.tasks).context("failed to serialize tasks for export")
    }

    /// Writes the export file for `date` into `dir` and returns its path.
    #[tracing::instrument(skip(self, dir))]
    pub fn export_to_dir(&self, dir: &Path, date: NaiveDate) -> anyhow::Result<PathBuf> {
        let payload = self.export_json()?;
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let path = dir.join(export_file_name(date));
        fs::write(&path, payload).with_context(|| format!("failed writing {}", path.display()))?;

        info!(file = %path.display(), count = self.tasks.len(), "exported tasks");
        Ok(path)
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn set_dark_mode(&mut self, dark_mode: bool) -> anyhow::Result<()> {
        self.dark_mode = dark_mode;
        save_dark_mode(&mut self.storage, dark_mode)
    }

    pub fn toggle_dark_mode(&mut self) -> anyhow::Result<bool> {
        let next = !self.dark_mode;
        self.set_dark_mode(next)?;
        Ok(next)
    }

    fn snapshot(&mut self) {
        self.undo.push_back(self.tasks.clone());
        while self.undo.len() > UNDO_DEPTH {
            self.undo.pop_front();
            debug!(depth = UNDO_DEPTH, "dropped oldest undo snapshot");
        }
    }

    fn commit(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.persist();
    }

    fn prune_selection(&mut self) {
        let existing: BTreeSet<u64> = self.tasks.iter().map(|t| t.id).collect();
        self.selection.retain(|id| existing.contains(id));
    }

    fn persist(&mut self) {
        let result = to_json(&self.tasks)
            .map_err(anyhow::Error::from)
            .and_then(|payload| self.storage.set(TASKS_KEY, &payload));

        if let Err(err) = result {
            warn!(
                error = %format!("{err:#}"),
                count = self.tasks.len(),
                "failed to persist tasks; keeping in-memory state"
            );
        }
    }
}

/// `tasks-YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("tasks-{}.json", date.format("%Y-%m-%d"))
}
