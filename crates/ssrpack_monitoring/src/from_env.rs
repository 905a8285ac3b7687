use thiserror::Error;

#[derive(Debug, Error)]
pub enum FromEnvError {
  #[error("Missing required environment variable {0}")]
  MissingKey(String),
  #[error("Invalid value for environment variable {0}: {1}")]
  InvalidKey(String, #[source] anyhow::Error),
}

pub fn optional_var(key: &str) -> Option<String> {
  std::env::var(key).ok()
}

pub fn required_var(key: &str) -> Result<String, FromEnvError> {
  optional_var(key).ok_or_else(|| FromEnvError::MissingKey(key.to_string()))
}
