//! This module configures `tracing_subscriber` to write to standard output and/or a rolling log
//! file.
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::anyhow;
use serde::Deserialize;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::from_env::optional_var;
use crate::from_env::FromEnvError;

pub const TRACING_MODE_VAR: &str = "SSRPACK_TRACING_MODE";

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum TracerMode {
  /// Output the Tracer logs to Stdout
  Stdout,
  /// Output the Tracer logs to hourly rotated files in the temp directory
  File,
}

impl TracerMode {
  /// Comma separated modes from `SSRPACK_TRACING_MODE`, in first-seen order
  pub fn from_env() -> Result<Vec<Self>, FromEnvError> {
    let Some(value) = optional_var(TRACING_MODE_VAR) else {
      return Ok(vec![]);
    };

    let mut tracer_modes = Vec::new();
    for token in value.split(',').map(str::trim).filter(|token| !token.is_empty()) {
      let mode = match token {
        "stdout" => TracerMode::Stdout,
        "file" => TracerMode::File,
        other => {
          return Err(FromEnvError::InvalidKey(
            TRACING_MODE_VAR.to_string(),
            anyhow!("expected stdout or file but got {other:?}"),
          ))
        }
      };
      if !tracer_modes.contains(&mode) {
        tracer_modes.push(mode);
      }
    }

    Ok(tracer_modes)
  }
}

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

pub struct Tracer {
  #[allow(unused)]
  worker_guards: Arc<Mutex<Vec<WorkerGuard>>>,
}

impl Tracer {
  pub fn new(options: &[TracerMode]) -> anyhow::Result<Self> {
    let mut worker_guards = vec![];

    let file_layer = if options.contains(&TracerMode::File) {
      let directory = std::env::temp_dir().join("ssrpack_trace");
      let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::HOURLY)
        .max_log_files(4)
        .filename_prefix("ssrpack-tracing")
        .build(&directory)
        .map_err(|err| anyhow!(err))?;
      let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
      worker_guards.push(worker_guard);

      Some(
        tracing_subscriber::fmt::layer()
          .with_writer(non_blocking)
          .with_ansi(false)
          .with_span_events(FmtSpan::CLOSE)
          .with_filter(env_filter()),
      )
    } else {
      None
    };

    let stdout_layer = if options.contains(&TracerMode::Stdout) {
      let (non_blocking, worker_guard) = tracing_appender::non_blocking(std::io::stdout());
      worker_guards.push(worker_guard);

      Some(
        tracing_subscriber::fmt::layer()
          .with_writer(non_blocking)
          .with_filter(env_filter()),
      )
    } else {
      None
    };

    let subscriber = Registry::default().with(file_layer).with(stdout_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(Self {
      worker_guards: Arc::new(Mutex::new(worker_guards)),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

  #[test]
  fn test_tracing_options_sets_to_none_if_no_mode_is_set() {
    let _guard = TEST_LOCK.lock();
    std::env::remove_var(TRACING_MODE_VAR);
    let options = TracerMode::from_env().unwrap();
    assert!(options.is_empty());
  }

  #[test]
  fn test_tracing_options_are_deduplicated() {
    let _guard = TEST_LOCK.lock();
    std::env::set_var(TRACING_MODE_VAR, "stdout, file,stdout");
    let options = TracerMode::from_env().unwrap();
    assert_eq!(options, vec![TracerMode::Stdout, TracerMode::File]);
    std::env::remove_var(TRACING_MODE_VAR);
  }

  #[test]
  fn test_tracing_options_rejects_unknown_mode() {
    let _guard = TEST_LOCK.lock();
    std::env::set_var(TRACING_MODE_VAR, "chrome");
    assert!(TracerMode::from_env().is_err());
    std::env::remove_var(TRACING_MODE_VAR);
  }
}
