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
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Run an experiment over every point of a parameter sweep")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Expand the base config and run the experiment once per configuration.
  Run(RunArgs),

  /// Print every expanded configuration as one JSON line, without running anything.
  Expand {
    /// Base config file (.toml, .yaml, .yml or .json).
    #[arg(long, short)]
    config: PathBuf,
  },

  /// List the registered experiments.
  List,
}

#[derive(Debug, Args)]
pub struct RunArgs {
  /// Base config file (.toml, .yaml, .yml or .json).
  /// Mark a sweep field with `lr = { sweep = [0.1, 0.01] }` or `lr: !sweep [0.1, 0.01]`.
  #[arg(long, short)]
  pub config: PathBuf,

  /// Name of a registered experiment (see `sweep list`).
  #[arg(long, short, conflicts_with = "exec")]
  pub experiment: Option<String>,

  /// Executable to run once per configuration. It reads the config as JSON on
  /// stdin and prints one JSON result object on stdout.
  #[arg(long)]
  pub exec: Option<PathBuf>,

  /// Directory receiving one subdirectory per result [default: artifacts].
  #[arg(long, short)]
  pub artifact_dir: Option<PathBuf>,

  /// Settings file [default: sweep.toml].
  #[arg(long, env = "SWEEP_SETTINGS")]
  pub settings: Option<PathBuf>,

  /// Extra tag allowed in the readable result format. Repeatable.
  #[arg(long = "tag")]
  pub tags: Vec<String>,

  /// All remaining arguments are passed to the `--exec` executable.
  #[arg(trailing_var_arg = true, allow_hyphen_values = true, requires = "exec")]
  pub exec_args: Vec<String>,
}
