use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::view::{
  SortMode,
  StatusFilter,
  ViewFilter
};

const CONFIG_ENV_VAR: &str =
  "TASKBOARD_CONFIG";
const APP_DIR: &str = "taskboard";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
  #[serde(default)]
  pub data_dir:    Option<PathBuf>,
  #[serde(default = "default_color")]
  pub color:       bool,
  #[serde(default)]
  pub view:        ViewDefaults,
  #[serde(skip)]
  pub loaded_from: Option<PathBuf>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewDefaults {
  #[serde(default)]
  pub sort:           SortMode,
  #[serde(default)]
  pub status:         StatusFilter,
  #[serde(default = "default_show_completed")]
  pub show_completed: bool
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_dir:    None,
      color:       true,
      view:        ViewDefaults::default(),
      loaded_from: None
    }
  }
}

impl Default for ViewDefaults {
  fn default() -> Self {
    Self {
      sort:           SortMode::default(),
      status:         StatusFilter::default(),
      show_completed: true
    }
  }
}

impl ViewDefaults {
  pub fn filter(&self) -> ViewFilter {
    ViewFilter {
      search:         String::new(),
      status:         self.status,
      show_completed: self.show_completed
    }
  }
}

fn default_color() -> bool {
  true
}

fn default_show_completed() -> bool {
  true
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) = resolve_config_path(
      config_override
    )?
    else {
      debug!("configuration disabled");
      return Ok(Self::default());
    };

    if !path.exists() {
      if config_override.is_some() {
        return Err(anyhow!(
          "config file {} does not \
           exist",
          path.display()
        ));
      }
      warn!(
          config = %path.display(),
          "no config file found; using defaults"
      );
      return Ok(Self::default());
    }

    info!(config = %path.display(), "loading config");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut cfg = Self::parse(&text)
      .with_context(|| {
        format!(
          "invalid config {}",
          path.display()
        )
      })?;
    cfg.loaded_from = Some(path);
    Ok(cfg)
  }

  pub fn parse(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut cfg: Config =
      toml::from_str(text)?;
    cfg.data_dir = cfg
      .data_dir
      .map(|dir| expand_tilde(&dir));
    Ok(cfg)
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    expand_tilde(path)
  } else if let Some(dir) =
    cfg.data_dir.as_ref()
  {
    dir.clone()
  } else {
    dirs::data_dir()
      .ok_or_else(|| {
        anyhow!(
          "cannot determine data \
           directory"
        )
      })?
      .join(APP_DIR)
  };

  debug!(dir = %dir.display(), "resolved data directory");
  Ok(dir)
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(expand_tilde(path)));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV_VAR)
    && !env_path.trim().is_empty()
  {
    if env_path == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      env_path
    )));
  }

  let base = dirs::config_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine config \
         directory"
      )
    })?;
  Ok(Some(
    base.join(APP_DIR).join("config.toml")
  ))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
