use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::{BIG5, Encoding};
use serde::Deserialize;

use crate::logging::LogLevel;

pub const DEFAULT_PREVIEW_CHARS: usize = 100;
const OUTPUT_DIR_NAME: &str = "modified";
const LOG_DIR_NAME: &str = "logs";

/// One layer of settings: a config file or the command line. Unset fields
/// fall through to the next layer.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigLayer {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub target_encoding: Option<String>,
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    #[serde(default)]
    pub preview_chars: Option<usize>,
}

impl ConfigLayer {
    /// Fields set in `self` win over `fallback`.
    pub fn over(self, fallback: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            output_dir: self.output_dir.or(fallback.output_dir),
            log_dir: self.log_dir.or(fallback.log_dir),
            target_encoding: self.target_encoding.or(fallback.target_encoding),
            log_level: self.log_level.or(fallback.log_level),
            preview_chars: self.preview_chars.or(fallback.preview_chars),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub target_encoding: &'static Encoding,
    pub log_level: LogLevel,
    pub preview_chars: usize,
}

impl Config {
    pub fn from_layer(layer: ConfigLayer) -> Result<Self> {
        let output_dir = match layer.output_dir {
            Some(dir) => dir,
            None => default_output_dir()?,
        };
        let target_encoding = match layer.target_encoding.as_deref() {
            Some(label) => resolve_target_encoding(label)?,
            None => BIG5,
        };
        Ok(Self {
            output_dir,
            log_dir: layer.log_dir.unwrap_or_else(default_log_dir),
            target_encoding,
            log_level: layer.log_level.unwrap_or_default(),
            preview_chars: layer.preview_chars.unwrap_or(DEFAULT_PREVIEW_CHARS),
        })
    }

    pub fn ensure_output_dir(&self) -> Result<()> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir)
                .with_context(|| format!("creating {}", self.output_dir.display()))?;
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        format!(
            "output_dir={}, log_dir={}, target_encoding={}, log_level={}, preview_chars={}",
            self.output_dir.display(),
            self.log_dir.display(),
            self.target_encoding.name(),
            self.log_level,
            self.preview_chars
        )
    }
}

/// Loads a config file: JSON when the extension is `.json`, YAML otherwise.
pub fn load_config_file(path: &Path) -> Result<ConfigLayer> {
    let data = fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    if path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
    {
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    } else {
        serde_yaml::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    }
}

pub fn resolve_target_encoding(label: &str) -> Result<&'static Encoding> {
    let trimmed = label.trim();
    let encoding = Encoding::for_label(trimmed.as_bytes())
        .ok_or_else(|| anyhow!("unknown target encoding '{trimmed}'"))?;
    if encoding.output_encoding() != encoding {
        bail!("{} cannot be used as a target encoding", encoding.name());
    }
    Ok(encoding)
}

fn default_output_dir() -> Result<PathBuf> {
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .filter(|value| !value.is_empty())
        .context("cannot determine the home directory; pass --output-dir")?;
    Ok(PathBuf::from(home).join("Desktop").join(OUTPUT_DIR_NAME))
}

fn default_log_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LOG_DIR_NAME)
}
