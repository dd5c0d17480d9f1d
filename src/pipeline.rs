use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;

use crate::config::Config;
use crate::encoding::{CharsetDetector, decode_strict, encode_lossy, verify};
use crate::error::ConvertError;
use crate::files::{base_name, output_path_for};
use crate::layout::{RecordType, classify};
use crate::logging::{LogLevel, RunLog, head, tail};
use crate::transform::transform_records;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Unprocessed,
    Read,
    Transformed,
    PassThrough,
    Encoded,
    Written,
    Verified,
    Done,
    Failed,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileStage::Unprocessed => "unprocessed",
            FileStage::Read => "read",
            FileStage::Transformed => "transformed",
            FileStage::PassThrough => "pass-through",
            FileStage::Encoded => "encoded",
            FileStage::Written => "written",
            FileStage::Verified => "verified",
            FileStage::Done => "done",
            FileStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub record_type: RecordType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    pub replaced_chars: usize,
    pub dropped_lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl FileOutcome {
    fn pending(path: &Path, record_type: RecordType) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            output_path: None,
            record_type,
            encoding: None,
            replaced_chars: 0,
            dropped_lines: 0,
            error_kind: None,
            error_detail: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub success_count: usize,
    pub fail_count: usize,
    pub output_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    pub outcomes: Vec<FileOutcome>,
}

/// Drives each input through detect → decode → transform → encode → write → verify.
pub struct Converter<'a> {
    config: &'a Config,
    detector: Option<Box<dyn CharsetDetector>>,
    log: &'a RunLog,
}

impl<'a> Converter<'a> {
    /// A converter built without a detector fails every file with `DetectionUnavailable`.
    pub fn new(
        config: &'a Config,
        detector: Option<Box<dyn CharsetDetector>>,
        log: &'a RunLog,
    ) -> Self {
        match &detector {
            Some(detector) => log.debug(format!("encoding detector: {}", detector.describe())),
            None => log.error("no encoding detector available; every file will fail"),
        }
        Self {
            config,
            detector,
            log,
        }
    }

    pub fn run(&self, inputs: &[PathBuf]) -> RunSummary {
        let mut outcomes = Vec::with_capacity(inputs.len());
        for path in inputs {
            outcomes.push(self.convert(path));
            self.log.debug("-".repeat(50));
        }

        let success_count = outcomes.iter().filter(|outcome| outcome.success).count();
        RunSummary {
            success_count,
            fail_count: outcomes.len() - success_count,
            output_dir: self.config.output_dir.clone(),
            log_file: self.log.path().map(Path::to_path_buf),
            outcomes,
        }
    }

    pub fn convert(&self, path: &Path) -> FileOutcome {
        let record_type = classify(&base_name(path));
        let mut outcome = FileOutcome::pending(path, record_type);
        self.enter(path, FileStage::Unprocessed);

        match self.process(path, &mut outcome) {
            Ok(output) => {
                self.enter(path, FileStage::Done);
                self.log.file_event(
                    LogLevel::Info,
                    path,
                    format!("converted {} to {}", path.display(), output.display()),
                );
                outcome.success = true;
                outcome.output_path = Some(output);
            }
            Err(err) => {
                self.enter(path, FileStage::Failed);
                self.log.file_event(
                    LogLevel::Error,
                    path,
                    format!("failed to convert {}: {err}", path.display()),
                );
                outcome.error_kind = Some(err.kind());
                outcome.error_detail = Some(err.to_string());
            }
        }
        outcome
    }

    fn process(&self, path: &Path, outcome: &mut FileOutcome) -> Result<PathBuf, ConvertError> {
        if !path.exists() {
            return Err(ConvertError::Missing(path.to_path_buf()));
        }
        let detector = self
            .detector
            .as_deref()
            .ok_or_else(|| ConvertError::DetectionUnavailable(path.to_path_buf()))?;

        let bytes = fs::read(path).map_err(|source| ConvertError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let detected = detector
            .detect(&bytes)
            .ok_or_else(|| ConvertError::DetectionUnavailable(path.to_path_buf()))?;
        self.log.file_event(
            LogLevel::Debug,
            path,
            format!(
                "detected {} (confidence {:.2}, via {})",
                detected.name(),
                detected.confidence,
                detected.source
            ),
        );
        outcome.encoding = Some(detected.name().to_string());

        let content = decode_strict(&bytes, &detected).ok_or_else(|| ConvertError::Decode {
            path: path.to_path_buf(),
            encoding: detected.name().to_string(),
        })?;
        self.enter(path, FileStage::Read);
        self.log.file_event(
            LogLevel::Debug,
            path,
            format!(
                "read {} characters as {}; preview:\n{}",
                content.chars().count(),
                detected.name(),
                head(&content, self.config.preview_chars)
            ),
        );

        let text = self.reformat(path, content, outcome);

        let encoded = encode_lossy(&text, self.config.target_encoding).map_err(|reason| {
            ConvertError::Encode {
                path: path.to_path_buf(),
                encoding: self.config.target_encoding.name().to_string(),
                reason,
            }
        })?;
        outcome.replaced_chars = encoded.replaced;
        self.enter(path, FileStage::Encoded);
        let level = if encoded.replaced > 0 {
            LogLevel::Warn
        } else {
            LogLevel::Debug
        };
        self.log.file_event(
            level,
            path,
            format!(
                "encoded {} bytes as {}; {} characters replaced",
                encoded.bytes.len(),
                self.config.target_encoding.name(),
                encoded.replaced
            ),
        );

        let output = output_path_for(&self.config.output_dir, path).ok_or_else(|| {
            ConvertError::Write {
                path: path.to_path_buf(),
                detail: "input path has no file name".to_string(),
            }
        })?;
        write_output(&output, &encoded.bytes)?;
        self.enter(path, FileStage::Written);
        self.log.file_event(
            LogLevel::Debug,
            path,
            format!("wrote {} bytes to {}", encoded.bytes.len(), output.display()),
        );

        self.verify_output(path, &output);
        Ok(output)
    }

    /// Applies the record layout for the file's type, or passes the text through.
    fn reformat(&self, path: &Path, content: String, outcome: &mut FileOutcome) -> String {
        let Some(layout) = outcome.record_type.layout() else {
            self.enter(path, FileStage::PassThrough);
            self.log.file_event(
                LogLevel::Warn,
                path,
                "no record layout matches this file name; content passed through unchanged",
            );
            return content;
        };

        let result = transform_records(&content, layout);
        for fault in &result.faults {
            self.log.file_event(
                LogLevel::Error,
                path,
                format!(
                    "dropped line {}: {}\n  content: {}",
                    fault.line_number, fault.reason, fault.content
                ),
            );
        }
        outcome.dropped_lines = result.faults.len();
        self.enter(path, FileStage::Transformed);

        if result.records == 0 {
            self.log.file_event(
                LogLevel::Warn,
                path,
                format!("no {} records survived; output will be empty", layout.record_type),
            );
        }
        let preview = self.config.preview_chars;
        self.log.file_event(
            LogLevel::Debug,
            path,
            format!(
                "{} records as {} (header removed: {}, footer removed: {}); preview:\n{}\nending:\n{}",
                result.records,
                layout.record_type,
                result.header_removed,
                result.footer_removed,
                head(&result.text, preview),
                tail(&result.text, preview)
            ),
        );
        result.text
    }

    /// Re-reads `output` in the target encoding. A failure is logged, never returned.
    fn verify_output(&self, path: &Path, output: &Path) -> bool {
        let encoding = self.config.target_encoding;
        let bytes = match fs::read(output) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.log.file_event(
                    LogLevel::Error,
                    path,
                    format!("unable to re-read {}: {err}", output.display()),
                );
                return false;
            }
        };
        match verify(&bytes, encoding) {
            Some(text) => {
                self.enter(path, FileStage::Verified);
                self.log.file_event(
                    LogLevel::Debug,
                    path,
                    format!(
                        "{} reads back as {}; preview:\n{}",
                        output.display(),
                        encoding.name(),
                        head(&text, self.config.preview_chars)
                    ),
                );
                true
            }
            None => {
                self.log.file_event(
                    LogLevel::Error,
                    path,
                    format!("{} does not decode as {}", output.display(), encoding.name()),
                );
                false
            }
        }
    }

    fn enter(&self, path: &Path, stage: FileStage) {
        self.log.file_event(LogLevel::Debug, path, format!("stage: {stage}"));
    }
}

/// Writes `data` next to `path` under a temporary name, then renames it into place.
fn write_output(path: &Path, data: &[u8]) -> Result<(), ConvertError> {
    let failed = |action: &str, target: &Path, err: io::Error| ConvertError::Write {
        path: path.to_path_buf(),
        detail: format!("{action} {}: {err}", target.display()),
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|err| failed("creating directory", dir, err))?;

    let nonce = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let staged = dir.join(format!(".big5conv-{}-{nonce}.part", std::process::id()));
    let staged_write = fs::File::create(&staged).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(err) = staged_write.and_then(|()| fs::rename(&staged, path)) {
        let _ = fs::remove_file(&staged);
        return Err(failed("writing", path, err));
    }
    Ok(())
}
