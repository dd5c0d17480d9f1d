use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueHint};

mod config;
mod encoding;
mod error;
mod files;
mod layout;
mod logging;
mod pipeline;
mod transform;
use config::{Config, ConfigLayer, load_config_file};
use encoding::ChardetDetector;
use logging::{LogLevel, RunLog};
use pipeline::{Converter, RunSummary};

/// Convert Fled/Immi/Punish record files to fixed-width, CRLF-terminated Big5.
#[derive(Debug, Parser)]
#[command(name = "big5conv", version)]
struct Cli {
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    files: Vec<PathBuf>,
    #[arg(long = "glob", value_name = "GLOB")]
    globs: Vec<String>,
    #[arg(long = "output-dir", value_name = "DIR", value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,
    #[arg(long = "log-dir", value_name = "DIR", value_hint = ValueHint::DirPath)]
    log_dir: Option<PathBuf>,
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    #[arg(long = "target-encoding", value_name = "ENCODING")]
    target_encoding: Option<String>,
    #[arg(long = "log-level", value_enum)]
    log_level: Option<LogLevel>,
    #[arg(long = "preview-chars", value_name = "N")]
    preview_chars: Option<usize>,
    #[arg(long = "no-log", action = ArgAction::SetTrue)]
    no_log: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

impl Cli {
    fn config_layer(&self) -> ConfigLayer {
        ConfigLayer {
            output_dir: self.output_dir.clone(),
            log_dir: self.log_dir.clone(),
            target_encoding: self.target_encoding.clone(),
            log_level: self.log_level,
            preview_chars: self.preview_chars,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let mut layer = cli.config_layer();
    if let Some(path) = &cli.config {
        layer = layer.over(load_config_file(path)?);
    }
    let config = Config::from_layer(layer)?;
    let log = if cli.no_log {
        RunLog::disabled()
    } else {
        RunLog::create(&config.log_dir, config.log_level)?
    };
    log.install_panic_hook();

    log.debug("run started");
    let result = execute(&cli, &config, &log);
    if let Err(err) = &result {
        log.error(format!("run aborted: {err:?}"));
    }
    log.debug("run finished");
    result
}

fn execute(cli: &Cli, config: &Config, log: &RunLog) -> Result<()> {
    log.debug(format!("configuration: {}", config.describe()));
    log.debug(format!("arguments: files={:?}, globs={:?}", cli.files, cli.globs));
    config.ensure_output_dir()?;

    let inputs = files::resolve_inputs(&cli.files, &cli.globs)?;
    if inputs.is_empty() {
        log.info("no files selected; nothing to do");
        println!("no files selected; nothing to do.");
        return Ok(());
    }

    let converter = Converter::new(config, Some(Box::new(ChardetDetector)), log);
    let summary = converter.run(&inputs);
    log.info(format!(
        "finished: {} converted, {} failed, output in {}",
        summary.success_count,
        summary.fail_count,
        summary.output_dir.display()
    ));
    if summary.fail_count > 0 {
        log.warn(format!(
            "{} of {} files failed; see the entries above",
            summary.fail_count,
            inputs.len()
        ));
    }
    print_summary(&summary, cli.json)
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("processing complete");
    println!("converted: {}", summary.success_count);
    println!("failed: {}", summary.fail_count);
    println!("output directory: {}", summary.output_dir.display());
    if let Some(log_file) = &summary.log_file {
        println!("log: {}", log_file.display());
    }
    Ok(())
}
