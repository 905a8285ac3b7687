//! This module configures tracing and reads process configuration from the environment.
//!
//! Monitoring should only be initialized once.
use std::sync::Mutex;

pub use from_env::FromEnvError;
pub use node_env::NodeEnv;
pub use tracer::TracerMode;

mod from_env;
mod node_env;
mod tracer;

pub static MONITORING_GUARD: Mutex<Option<MonitoringGuard>> = Mutex::new(None);

pub struct MonitoringGuard {
  #[allow(unused)]
  tracer: tracer::Tracer,
}

#[derive(Debug)]
pub struct MonitoringOptions {
  pub tracing_options: Vec<TracerMode>,
}

impl MonitoringOptions {
  pub fn from_env() -> Result<Self, FromEnvError> {
    Ok(Self {
      tracing_options: TracerMode::from_env()?,
    })
  }
}

pub fn initialize_monitoring(options: MonitoringOptions) -> anyhow::Result<()> {
  let mut global = MONITORING_GUARD
    .lock()
    .map_err(|_| anyhow::anyhow!("Monitoring guard lock is poisoned"))?;
  if global.is_some() {
    tracing::warn!("Monitoring is getting set-up twice, this will no-op");
    return Ok(());
  }

  let tracer = tracer::Tracer::new(&options.tracing_options)?;
  *global = Some(MonitoringGuard { tracer });

  Ok(())
}

/// Initialize from `SSRPACK_TRACING_MODE`, logging to stdout when it is unset
pub fn initialize_from_env() -> anyhow::Result<()> {
  let mut options = MonitoringOptions::from_env()?;
  if options.tracing_options.is_empty() {
    options.tracing_options.push(TracerMode::Stdout);
  }
  initialize_monitoring(options)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_initialize_monitoring_multiple_times() {
    initialize_monitoring(MonitoringOptions {
      tracing_options: vec![TracerMode::Stdout],
    })
    .unwrap();

    initialize_monitoring(MonitoringOptions {
      tracing_options: vec![TracerMode::Stdout],
    })
    .unwrap();
  }
}
