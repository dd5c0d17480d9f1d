use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::panic::{self, Location};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const LOG_PREFIX: &str = "app_log_";
const LOG_EXTENSION: &str = "jsonl";

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    pub timestamp: &'a str,
    pub level: LogLevel,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<&'a Path>,
}

/// Append-only diagnostic log for one run. One JSON object per line.
#[derive(Debug)]
pub struct RunLog {
    file: Option<PathBuf>,
    min_level: LogLevel,
    write_failed: Cell<bool>,
}

impl RunLog {
    /// Creates `<dir>/app_log_<YYYYMMDD_HHMMSS>.jsonl`, creating `dir` if needed.
    pub fn create(dir: &Path, min_level: LogLevel) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let file = dir.join(log_file_name(OffsetDateTime::now_utc())?);
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&file)
            .with_context(|| format!("opening {}", file.display()))?;
        Ok(Self {
            file: Some(file),
            min_level,
            write_failed: Cell::new(false),
        })
    }

    pub fn disabled() -> Self {
        Self {
            file: None,
            min_level: LogLevel::Error,
            write_failed: Cell::new(false),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Debug, None, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Info, None, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Warn, None, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.record(LogLevel::Error, None, message.as_ref());
    }

    pub fn file_event(&self, level: LogLevel, path: &Path, message: impl AsRef<str>) {
        self.record(level, Some(path), message.as_ref());
    }

    /// Records panics in this log before handing them to the previous hook.
    pub fn install_panic_hook(&self) {
        let Some(file) = self.file.clone() else {
            return;
        };
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(&file, info.payload(), info.location());
            previous(info);
        }));
    }

    fn record(&self, level: LogLevel, path: Option<&Path>, message: &str) {
        let Some(file) = &self.file else {
            return;
        };
        if level < self.min_level {
            return;
        }
        if let Err(err) = append_entry(file, level, path, message) {
            if !self.write_failed.replace(true) {
                eprintln!("warning: unable to write log {}: {err:#}", file.display());
            }
        }
    }
}

fn append_entry(file: &Path, level: LogLevel, path: Option<&Path>, message: &str) -> Result<()> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into());
    let entry = LogEntry {
        timestamp: &timestamp,
        level,
        message,
        path,
    };
    let json = serde_json::to_string(&entry)?;
    let mut handle = OpenOptions::new()
        .append(true)
        .create(true)
        .open(file)
        .with_context(|| format!("opening {}", file.display()))?;
    writeln!(handle, "{json}")?;
    Ok(())
}

fn log_panic(file: &Path, payload: &(dyn Any + Send), location: Option<&Location<'_>>) {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    let message = match location {
        Some(location) => format!("panic at {location}: {detail}"),
        None => format!("panic: {detail}"),
    };
    // The hook runs on the way down; nowhere left to report a failed write.
    let _ = append_entry(file, LogLevel::Error, None, &message);
}

fn log_file_name(now: OffsetDateTime) -> Result<String> {
    let stamp = now.format(format_description!("[year][month][day]_[hour][minute][second]"))?;
    Ok(format!("{LOG_PREFIX}{stamp}.{LOG_EXTENSION}"))
}

/// First `limit` characters of `text`.
pub fn head(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `limit` characters of `text`.
pub fn tail(text: &str, limit: usize) -> &str {
    if limit == 0 {
        return "";
    }
    match text.char_indices().rev().nth(limit - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
