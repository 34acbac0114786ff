use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Key of the entry holding the serialized task list.
pub const TASKS_KEY: &str = "tasks";
/// Key of the display-preference entry.
pub const DARK_MODE_KEY: &str = "dark-mode";

/// A string-valued key-value medium the store mirrors its state into.
pub trait Storage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One `<key>.json` file per entry inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    pub data_dir: PathBuf,
}

impl FileStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file storage");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(file = %path.display(), "no entry on disk");
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        debug!(file = %path.display(), bytes = raw.len(), "read entry");
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        write_atomic(&path, value)
    }
}

#[tracing::instrument(skip(path, contents))]
fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = contents.len(), "saving entry atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

/// Keeps entries in process memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn entry(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
