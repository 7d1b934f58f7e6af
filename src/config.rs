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
use crate::cli::RunArgs;
use crate::command::CommandArgs;
use crate::error::ConfigError;
use crate::error::UsageError;
use crate::experiment::ExperimentSource;
use crate::persist::TagRegistry;
use crate::persist::plain_from_yaml;
use crate::runner::DEFAULT_ARTIFACT_DIR;
use crate::sweep::BaseConfig;
use crate::value::Value;
use figment::Figment;
use figment::providers::Env;
use figment::providers::Format;
use figment::providers::Serialized;
use figment::providers::Toml;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

/// Settings file read from the working directory unless `--settings` points elsewhere.
pub const DEFAULT_SETTINGS_FILE: &str = "sweep.toml";

/// Prefix of the environment variables that override settings (`SWEEP_ARTIFACT_DIR`, ...).
pub const ENV_PREFIX: &str = "SWEEP_";

/// Runner settings, layered from defaults, the settings file, the
/// environment and finally the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
  /// Root directory receiving one subdirectory per result.
  pub artifact_dir: PathBuf,

  /// Registered experiment to run.
  #[serde(default)]
  pub experiment: Option<String>,

  /// External experiment process. Takes precedence over `experiment`.
  #[serde(default)]
  pub command: Option<CommandArgs>,

  /// Extra tags accepted by the readable result format.
  #[serde(default)]
  pub tags: Vec<String>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
      experiment: None,
      command: None,
      tags: Vec::new(),
    }
  }
}

/// The subset of settings the command line can override.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
  #[serde(skip_serializing_if = "Option::is_none")]
  artifact_dir: Option<PathBuf>,
  #[serde(skip_serializing_if = "Option::is_none")]
  experiment: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  command: Option<CommandArgs>,
}

impl Settings {
  /// Builds the figment without the command-line layer.
  pub fn figment(settings_file: Option<&Path>) -> Figment {
    let file = settings_file.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
    Figment::from(Serialized::defaults(Settings::default()))
      .merge(Toml::file(file))
      .merge(Env::prefixed(ENV_PREFIX).ignore(&["log_file", "settings"]))
  }

  pub fn load(settings_file: Option<&Path>) -> Result<Self, ConfigError> {
    Self::figment(settings_file)
      .extract()
      .map_err(|err| ConfigError::Settings(Box::new(err)))
  }

  /// Loads settings and applies the `run` flags on top.
  pub fn from_run_args(args: &RunArgs) -> Result<Self, ConfigError> {
    let overrides = CliOverrides {
      artifact_dir: args.artifact_dir.clone(),
      experiment: args.experiment.clone(),
      command: args.exec.clone().map(|command| CommandArgs {
        command,
        args: args.exec_args.clone(),
      }),
    };

    let mut settings: Settings = Self::figment(args.settings.as_deref())
      .merge(Serialized::defaults(overrides))
      .extract()
      .map_err(|err| ConfigError::Settings(Box::new(err)))?;
    // An explicit `--experiment` beats a command from lower layers.
    if args.experiment.is_some() {
      settings.command = None;
    }
    settings.tags.extend(args.tags.iter().cloned());
    Ok(settings)
  }

  /// The experiment to run: a command if one is configured, else a registered name.
  pub fn experiment_source(&self) -> Result<ExperimentSource, UsageError> {
    match (&self.command, &self.experiment) {
      (Some(command), _) => Ok(ExperimentSource::Command(command.clone())),
      (None, Some(name)) => Ok(ExperimentSource::Named(name.clone())),
      (None, None) => Err(UsageError::NoExperiment),
    }
  }

  pub fn tag_registry(&self) -> TagRegistry {
    TagRegistry::new().with(&self.tags)
  }
}

/// Reads a base configuration from a `.toml`, `.yaml`/`.yml` or `.json` file.
pub fn load_base_config(path: &Path) -> Result<BaseConfig, ConfigError> {
  let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let value = match path.extension().and_then(|ext| ext.to_str()) {
    Some("toml") => Value::from(toml::from_str::<serde_json::Value>(&content)?),
    Some("json") => Value::from(serde_json::from_str::<serde_json::Value>(&content)?),
    Some("yaml") | Some("yml") => yaml_to_value(serde_yaml::from_str(&content)?, "")?,
    _ => {
      return Err(ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
      });
    }
  };

  BaseConfig::from_value(value)
}

/// Config files may use any tag; only `!sweep` carries meaning.
fn yaml_to_value(yaml: serde_yaml::Value, path: &str) -> Result<Value, ConfigError> {
  plain_from_yaml(yaml, path, &mut |value, path| yaml_to_value(value, path))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sweep::Field;
  use crate::sweep::expand;
  use tempfile::tempdir;

  fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
  }

  #[test]
  fn test_load_toml_base_config() {
    let dir = tempdir().unwrap();
    let path = write(
      dir.path(),
      "base.toml",
      r#"
arch = "resnet"
lr = { sweep = [0.1, 0.01] }
batch = { sweep = [16, 32] }

[optimizer]
momentum = 0.9
"#,
    );

    let base = load_base_config(&path).unwrap();
    assert_eq!(base.combinations(), 4);
    assert_eq!(base.get("arch"), Some(&Field::Static(Value::from("resnet"))));

    let configs: Vec<_> = expand(&base).collect();
    assert_eq!(configs.len(), 4);
    assert_eq!(
      configs[0]["optimizer"].get("momentum"),
      Some(&Value::Float(0.9))
    );
  }

  #[test]
  fn test_load_yaml_base_config_with_tag() {
    let dir = tempdir().unwrap();
    let path = write(
      dir.path(),
      "base.yaml",
      "model_type: !sweep [resnet, efficientnet]\naugmenter_type: {sweep: [basic, optimized]}\nlog_dir: artifacts/logs\n",
    );

    let base = load_base_config(&path).unwrap();
    assert_eq!(base.sweep_keys(), vec!["model_type", "augmenter_type"]);
    assert_eq!(base.combinations(), 4);
  }

  #[test]
  fn test_load_json_base_config() {
    let dir = tempdir().unwrap();
    let path = write(
      dir.path(),
      "base.json",
      r#"{"seed": {"sweep": [1, 2, 3]}, "name": "demo"}"#,
    );

    let base = load_base_config(&path).unwrap();
    assert_eq!(base.sweep_keys(), vec!["seed"]);
    assert_eq!(base.combinations(), 3);
  }

  #[test]
  fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "base.ini", "a=1");
    assert!(matches!(
      load_base_config(&path),
      Err(ConfigError::UnsupportedFormat { .. })
    ));
  }

  #[test]
  fn test_missing_file() {
    assert!(matches!(
      load_base_config(Path::new("/no/such/base.toml")),
      Err(ConfigError::Read { .. })
    ));
  }

  #[test]
  fn test_settings_file_is_layered_over_defaults() {
    let dir = tempdir().unwrap();
    let path = write(
      dir.path(),
      "sweep.toml",
      r#"
artifact_dir = "out"
tags = ["point"]

[command]
command = "python3"
args = ["train.py"]
"#,
    );

    let settings = Settings::load(Some(path.as_path())).unwrap();
    assert_eq!(settings.artifact_dir, PathBuf::from("out"));
    assert!(settings.tag_registry().contains("point"));
    assert_eq!(
      settings.experiment_source().unwrap(),
      ExperimentSource::Command(CommandArgs {
        command: PathBuf::from("python3"),
        args: vec!["train.py".to_string()],
      })
    );
  }

  fn run_args(settings: &Path) -> RunArgs {
    RunArgs {
      config: PathBuf::from("base.toml"),
      experiment: None,
      exec: None,
      artifact_dir: None,
      settings: Some(settings.to_path_buf()),
      tags: vec![],
      exec_args: vec![],
    }
  }

  #[test]
  fn test_cli_experiment_overrides_settings_command() {
    let dir = tempdir().unwrap();
    let path = write(
      dir.path(),
      "sweep.toml",
      "[command]\ncommand = \"python3\"\nargs = [\"train.py\"]\n",
    );
    let args = RunArgs {
      experiment: Some("echo".to_string()),
      ..run_args(&path)
    };

    let settings = Settings::from_run_args(&args).unwrap();
    assert_eq!(settings.command, None);
    assert_eq!(
      settings.experiment_source().unwrap(),
      ExperimentSource::Named("echo".to_string())
    );
  }

  #[test]
  fn test_cli_exec_overrides_settings_experiment() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "sweep.toml", "experiment = \"echo\"\n");
    let args = RunArgs {
      exec: Some(PathBuf::from("sh")),
      exec_args: vec!["-c".to_string(), "true".to_string()],
      ..run_args(&path)
    };

    let settings = Settings::from_run_args(&args).unwrap();
    assert_eq!(
      settings.experiment_source().unwrap(),
      ExperimentSource::Command(CommandArgs {
        command: PathBuf::from("sh"),
        args: vec!["-c".to_string(), "true".to_string()],
      })
    );
  }

  #[test]
  fn test_defaults_without_settings_file() {
    let dir = tempdir().unwrap();
    let settings = Settings::load(Some(dir.path().join("absent.toml").as_path())).unwrap();

    assert_eq!(settings.artifact_dir, PathBuf::from(DEFAULT_ARTIFACT_DIR));
    assert!(matches!(
      settings.experiment_source(),
      Err(UsageError::NoExperiment)
    ));
  }
}
