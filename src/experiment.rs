// Copyright 2025 Chisomo Makombo Sakala
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use crate::command::CommandArgs;
use crate::error::UsageError;
use crate::result::RunResult;
use crate::sweep::Config;
use crate::value::Value;
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;

/// The unit of work run once per expanded configuration.
///
/// Returning `Ok(None)` is a contract violation: the runner aborts the sweep
/// with [`UsageError::MissingResult`]. Errors abort the sweep as well.
pub trait Experiment {
  fn run(&self, config: &Config) -> Result<Option<RunResult>>;
}

impl<E: Experiment + ?Sized> Experiment for Box<E> {
  fn run(&self, config: &Config) -> Result<Option<RunResult>> {
    (**self).run(config)
  }
}

/// Wraps a closure as an [`Experiment`].
pub fn from_fn<F>(f: F) -> FnExperiment<F>
where
  F: Fn(&Config) -> Result<Option<RunResult>>,
{
  FnExperiment(f)
}

/// See [`from_fn`].
pub struct FnExperiment<F>(F);

impl<F> Experiment for FnExperiment<F>
where
  F: Fn(&Config) -> Result<Option<RunResult>>,
{
  fn run(&self, config: &Config) -> Result<Option<RunResult>> {
    (self.0)(config)
  }
}

impl<F> fmt::Debug for FnExperiment<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("FnExperiment")
  }
}

type Factory = Box<dyn Fn() -> Box<dyn Experiment>>;

/// Maps experiment names to factories.
#[derive(Default)]
pub struct ExperimentRegistry {
  factories: BTreeMap<String, Factory>,
}

impl ExperimentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding the experiments shipped with the `sweep` binary.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register("echo", || Box::new(Echo));
    registry
  }

  /// Registers `factory` under `name`, replacing any previous entry.
  pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
  where
    F: Fn() -> Box<dyn Experiment> + 'static,
  {
    self.factories.insert(name.into(), Box::new(factory));
    self
  }

  pub fn names(&self) -> Vec<String> {
    self.factories.keys().cloned().collect()
  }

  pub fn resolve(&self, name: &str) -> Result<Box<dyn Experiment>, UsageError> {
    self
      .factories
      .get(name)
      .map(|factory| factory())
      .ok_or_else(|| UsageError::UnknownExperiment {
        name: name.to_string(),
        available: self.names(),
      })
  }
}

impl fmt::Debug for ExperimentRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExperimentRegistry")
      .field("names", &self.names())
      .finish()
  }
}

/// Where to find the experiment when it is not handed over directly.
#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentSource {
  /// A name registered in an [`ExperimentRegistry`].
  Named(String),
  /// An executable speaking the JSON stdin/stdout protocol of [`CommandArgs`].
  Command(CommandArgs),
}

impl ExperimentSource {
  pub fn resolve(&self, registry: &ExperimentRegistry) -> Result<Box<dyn Experiment>, UsageError> {
    match self {
      ExperimentSource::Named(name) => registry.resolve(name),
      ExperimentSource::Command(args) => Ok(Box::new(args.resolve()?)),
    }
  }
}

impl fmt::Display for ExperimentSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ExperimentSource::Named(name) => write!(f, "{}", name),
      ExperimentSource::Command(args) => write!(f, "{}", args.command.display()),
    }
  }
}

/// Returns its configuration unchanged, named after the config's scalar values.
#[derive(Debug, Clone, Copy)]
struct Echo;

impl Experiment for Echo {
  fn run(&self, config: &Config) -> Result<Option<RunResult>> {
    let parts: Vec<String> = config
      .values()
      .filter(|value| {
        matches!(
          value,
          Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
      })
      .map(|value| sanitize(&value.to_string()))
      .collect();
    let name = if parts.is_empty() {
      "run".to_string()
    } else {
      format!("run-{}", parts.join("-"))
    };

    Ok(Some(
      RunResult::new(name)
        .with("fields", config.len() as i64)
        .with_config(config.clone()),
    ))
  }
}

fn sanitize(part: &str) -> String {
  part
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
        c
      } else {
        '_'
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resolve_unknown_lists_available() {
    let registry = ExperimentRegistry::with_builtins();
    let err = registry.resolve("train").err().unwrap();

    match err {
      UsageError::UnknownExperiment { name, available } => {
        assert_eq!(name, "train");
        assert_eq!(available, vec!["echo".to_string()]);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn test_registered_closure_resolves() {
    let mut registry = ExperimentRegistry::new();
    registry.register("const", || {
      Box::new(from_fn(|_config| Ok(Some(RunResult::new("fixed")))))
    });

    let experiment = ExperimentSource::Named("const".to_string())
      .resolve(&registry)
      .unwrap();
    let result = experiment.run(&Config::new()).unwrap().unwrap();
    assert_eq!(result.name, "fixed");
  }

  #[test]
  fn test_echo_names_by_scalar_values() {
    let mut config = Config::new();
    config.insert("lr".to_string(), Value::from(0.01));
    config.insert("arch".to_string(), Value::from("res/net"));
    config.insert("layers".to_string(), Value::List(vec![Value::Int(1)]));

    let result = Echo.run(&config).unwrap().unwrap();
    assert_eq!(result.name, "run-0.01-res_net");
    assert!(result.has_valid_name());
    assert_eq!(result.config, Some(config));
  }
}
