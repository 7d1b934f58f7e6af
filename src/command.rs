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
use crate::error::UsageError;
use crate::experiment::Experiment;
use crate::result::RunResult;
use crate::sweep::Config;
use crate::value::map_to_json;
use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::thread;

/// Holds the executable command and base arguments for an out-of-process experiment.
///
/// The process is started once per configuration. It receives the
/// configuration as a JSON object on stdin and must print a single JSON
/// result object (`{"name": ..., "config": ..., "data": {...}}`) on stdout.
/// Printing `null` or nothing at all means no result was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandArgs {
  /// The command to execute (e.g., "python3" or "/path/to/binary").
  pub command: PathBuf,

  /// A list of base arguments to pass to the command (e.g., ["./train.py"]).
  #[serde(default)]
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub args: Vec<String>,
}

impl CommandArgs {
  /// Checks that an explicitly pathed executable exists.
  ///
  /// Bare program names (`python3`) are left to `PATH` lookup at spawn time.
  pub fn resolve(&self) -> Result<CommandExperiment, UsageError> {
    let pathed = self.command.is_absolute() || self.command.components().count() > 1;
    if pathed && !self.command.exists() {
      return Err(UsageError::ExecutableNotFound {
        path: self.command.clone(),
      });
    }
    Ok(CommandExperiment { args: self.clone() })
  }
}

/// An [`Experiment`] backed by an external process.
#[derive(Debug, Clone)]
pub struct CommandExperiment {
  args: CommandArgs,
}

impl Experiment for CommandExperiment {
  fn run(&self, config: &Config) -> Result<Option<RunResult>> {
    let CommandArgs { command, args } = &self.args;
    let input = serde_json::to_vec(&map_to_json(config))?;

    let mut cmd = Command::new(command);
    cmd
      .args(args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    tracing::debug!(cmd = ?cmd, "Spawning experiment process");
    let mut child = cmd
      .spawn()
      .with_context(|| format!("Failed to spawn experiment {}", command.display()))?;

    // Feed stdin while the outputs drain; the child may never read it.
    let mut stdin = child
      .stdin
      .take()
      .context("Failed to pipe experiment stdin")?;
    let writer = thread::spawn(move || match stdin.write_all(&input) {
      Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
      other => other,
    });

    let output = child
      .wait_with_output()
      .context("Failed to wait for experiment process")?;
    match writer.join() {
      Ok(written) => written.context("Failed to write config to experiment stdin")?,
      Err(_) => anyhow::bail!("Experiment stdin writer panicked"),
    }

    for line in String::from_utf8_lossy(&output.stderr).lines() {
      tracing::warn!(target: "experiment", "{}", line);
    }

    if !output.status.success() {
      anyhow::bail!(
        "Experiment process {} exited with {}",
        command.display(),
        output.status
      );
    }

    let stdout = String::from_utf8(output.stdout).context("Experiment stdout is not UTF-8")?;
    let stdout = stdout.trim();
    if stdout.is_empty() {
      return Ok(None);
    }

    let json: serde_json::Value =
      serde_json::from_str(stdout).context("Failed to parse experiment stdout as JSON")?;
    RunResult::from_json(json).context("Malformed result from experiment process")
  }
}
