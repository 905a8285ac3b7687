use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use anyhow::anyhow;
use serde::Deserialize;
use serde::Serialize;

use crate::from_env::required_var;
use crate::from_env::FromEnvError;

pub const NODE_ENV: &str = "NODE_ENV";

/// The deployment environment, read from `NODE_ENV` at process start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeEnv {
  Test,
  Development,
  Production,
}

impl NodeEnv {
  /// A missing or unknown value is a fatal configuration error
  pub fn from_env() -> Result<Self, FromEnvError> {
    let value = required_var(NODE_ENV)?;
    value
      .parse()
      .map_err(|err| FromEnvError::InvalidKey(NODE_ENV.to_string(), err))
  }

  pub fn is_production(&self) -> bool {
    matches!(self, NodeEnv::Production)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      NodeEnv::Test => "test",
      NodeEnv::Development => "development",
      NodeEnv::Production => "production",
    }
  }
}

impl FromStr for NodeEnv {
  type Err = anyhow::Error;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value {
      "test" => Ok(NodeEnv::Test),
      "development" => Ok(NodeEnv::Development),
      "production" => Ok(NodeEnv::Production),
      other => Err(anyhow!(
        "expected one of test, development, production but got {other:?}"
      )),
    }
  }
}

impl Display for NodeEnv {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}
