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
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error enum for the sweeplab library.
#[derive(Error, Debug)]
pub enum SweepError {
  #[error("Configuration error")]
  Config(#[from] ConfigError),

  #[error("Usage error: {0}")]
  Usage(#[from] UsageError),

  #[error("Failed to persist result")]
  Persist(#[from] PersistError),

  #[error("Experiment failed for config {config}")]
  Experiment {
    config: String,
    #[source]
    source: anyhow::Error,
  },

  #[error("Failed to create artifact directory: {path}")]
  CreateArtifactDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Errors related to loading settings and base configurations (src/config.rs, src/sweep.rs).
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config file: {path}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Unsupported config file extension: {path} (expected .toml, .yaml, .yml or .json)")]
  UnsupportedFormat { path: PathBuf },

  #[error("Failed to parse TOML config: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("Failed to parse YAML config: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("Failed to parse JSON config: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Failed to load settings")]
  Settings(#[from] Box<figment::Error>),

  #[error("Base configuration must be a mapping at the top level, found {found}")]
  NotAMapping { found: &'static str },

  #[error("Sweep field '{key}' must hold a list of candidates, found {found}")]
  SweepNotAList { key: String, found: &'static str },

  #[error("Invalid config value")]
  Value(#[from] DecodeError),
}

/// Misuse of the runner contract. These are fatal and never retried.
#[derive(Error, Debug)]
pub enum UsageError {
  #[error("Experiment '{name}' is not registered. Available: {available:?}")]
  UnknownExperiment {
    name: String,
    available: Vec<String>,
  },

  #[error("Experiment executable not found: {path}")]
  ExecutableNotFound { path: PathBuf },

  #[error(
    "Experiment returned no result for config {config}. Did it forget to return one?"
  )]
  MissingResult { config: String },

  #[error("Result name '{name}' is not a valid directory name")]
  InvalidResultName { name: String },

  #[error("No experiment given. Pass --experiment <name> or --exec <path>")]
  NoExperiment,
}

/// Failure of one serialization tier. Recoverable when a later tier exists.
#[derive(Error, Debug)]
pub enum EncodeError {
  #[error("Value at '{path}' carries unregistered tag '!{tag}'")]
  UnregisteredTag { tag: String, path: String },

  #[error("Value at '{path}' uses the reserved tag '!{tag}', which only marks byte strings")]
  ReservedTag { tag: String, path: String },

  #[error("YAML serialization failed: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("Binary serialization failed: {0}")]
  Bincode(#[from] bincode::Error),
}

/// Failure to read back a persisted result.
#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("Value at '{path}' carries unregistered tag '!{tag}'")]
  UnregisteredTag { tag: String, path: String },

  #[error("YAML deserialization failed: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("Binary deserialization failed: {0}")]
  Bincode(#[from] bincode::Error),

  #[error("Invalid base64 payload for '!binary' value at '{path}'")]
  Base64 {
    path: String,
    #[source]
    source: base64::DecodeError,
  },

  #[error("Malformed result document: {0}")]
  Malformed(String),
}

/// Errors related to result persistence (src/persist.rs).
#[derive(Error, Debug)]
pub enum PersistError {
  #[error("No serialization format could encode result '{name}'")]
  Encode {
    name: String,
    #[source]
    source: EncodeError,
  },

  #[error("Failed to create result directory: {path}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to write result file: {path}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to remove stale result file: {path}")]
  Remove {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to read result file: {path}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to decode result file: {path}")]
  Decode {
    path: PathBuf,
    #[source]
    source: DecodeError,
  },

  #[error("No persisted result found in {dir}")]
  NotFound { dir: PathBuf },

  #[error("Persister has no formats configured")]
  NoFormats,
}
