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
use crate::error::PersistError;
use crate::error::SweepError;
use crate::error::UsageError;
use crate::experiment::Experiment;
use crate::experiment::ExperimentRegistry;
use crate::experiment::ExperimentSource;
use crate::persist::Persisted;
use crate::persist::Persister;
use crate::result::RunResult;
use crate::sweep::BaseConfig;
use crate::sweep::Field;
use crate::sweep::expand;
use crate::value::Value;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Artifact root used when none is given.
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Runs an experiment over every configuration of a base config.
pub struct Sweeper {
  artifact_dir: PathBuf,
  persister: Persister,
}

impl Default for Sweeper {
  fn default() -> Self {
    Self::new(DEFAULT_ARTIFACT_DIR)
  }
}

impl Sweeper {
  pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
    Self {
      artifact_dir: artifact_dir.into(),
      persister: Persister::default(),
    }
  }

  pub fn with_persister(mut self, persister: Persister) -> Self {
    self.persister = persister;
    self
  }

  pub fn artifact_dir(&self) -> &Path {
    &self.artifact_dir
  }

  pub fn persister(&self) -> &Persister {
    &self.persister
  }

  /// Resolves `source` once, then runs it. See [`Sweeper::run`].
  pub fn run_source(
    &self,
    source: &ExperimentSource,
    registry: &ExperimentRegistry,
    base: &BaseConfig,
  ) -> Result<Vec<(RunResult, Persisted)>, SweepError> {
    tracing::info!(experiment = %source, "Resolving experiment");
    let experiment = source.resolve(registry)?;
    self.run_with_report(&*experiment, base)
  }

  /// Runs `experiment` on each expanded configuration, in order, and returns
  /// the persisted results.
  pub fn run<E>(&self, experiment: &E, base: &BaseConfig) -> Result<Vec<RunResult>, SweepError>
  where
    E: Experiment + ?Sized,
  {
    let report = self.run_with_report(experiment, base)?;
    Ok(report.into_iter().map(|(result, _)| result).collect())
  }

  /// Like [`Sweeper::run`], also reporting where each result was written.
  ///
  /// The first experiment error, absent result or filesystem error aborts the
  /// sweep. Results already written stay on disk.
  pub fn run_with_report<E>(
    &self,
    experiment: &E,
    base: &BaseConfig,
  ) -> Result<Vec<(RunResult, Persisted)>, SweepError>
  where
    E: Experiment + ?Sized,
  {
    let configs = expand(base);
    let total = configs.len();
    let span = tracing::info_span!(
      "sweep",
      artifact_dir = %self.artifact_dir.display(),
      total
    );
    let _enter = span.enter();

    if total == 0 {
      let empty: Vec<&str> = base
        .fields()
        .filter_map(|(key, field)| match field {
          Field::Sweep(sweep) if sweep.is_empty() => Some(key),
          _ => None,
        })
        .collect();
      tracing::warn!(?empty, "A sweep field has no candidates. Nothing to run.");
    }

    fs::create_dir_all(&self.artifact_dir).map_err(|source| SweepError::CreateArtifactDir {
      path: self.artifact_dir.clone(),
      source,
    })?;

    tracing::info!("--- Starting sweep of {} configuration(s) ---", total);
    let mut report = Vec::with_capacity(total);

    for (idx, config) in configs.enumerate() {
      let config_span = tracing::info_span!("config", idx);
      let _enter = config_span.enter();
      let rendered = Value::Map(config.clone()).to_string();
      tracing::debug!(config = %rendered, "Running experiment");

      let result = experiment
        .run(&config)
        .map_err(|source| SweepError::Experiment {
          config: rendered.clone(),
          source,
        })?;
      let Some(mut result) = result else {
        return Err(UsageError::MissingResult { config: rendered }.into());
      };

      if result.config.is_none() {
        result.config = Some(config);
      }
      if !result.has_valid_name() {
        return Err(
          UsageError::InvalidResultName {
            name: result.name.clone(),
          }
          .into(),
        );
      }

      let result_dir = self.artifact_dir.join(&result.name);
      fs::create_dir_all(&result_dir).map_err(|source| PersistError::CreateDir {
        path: result_dir.clone(),
        source,
      })?;
      let persisted = self.persister.persist(&result, &result_dir)?;
      tracing::info!(
        name = %result.name,
        format = persisted.format,
        "Persisted result {}/{}",
        idx + 1,
        total
      );

      report.push((result, persisted));
    }

    tracing::info!("--- Sweep complete ---");
    Ok(report)
  }
}

/// Runs `experiment` over `base`, writing results under `artifact_dir` with
/// the default persister.
pub fn run<E>(
  experiment: &E,
  base: &BaseConfig,
  artifact_dir: impl AsRef<Path>,
) -> Result<Vec<RunResult>, SweepError>
where
  E: Experiment + ?Sized,
{
  Sweeper::new(artifact_dir.as_ref()).run(experiment, base)
}
