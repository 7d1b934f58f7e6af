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

//! # Sweeplab
//!
//! `sweeplab` runs an experiment over every point of a parameter sweep. A
//! base configuration marks some fields as sweeps (ordered candidate lists);
//! the cross-product of those fields is expanded lazily into concrete
//! configurations, the experiment runs once per configuration, and each
//! returned result is written to `<artifact_dir>/<result name>/`.
//!
//! Results are written as `results.yaml` when every tag they carry is
//! registered, and as `results.bin` (bincode) otherwise.
//!
//! ```no_run
//! use sweeplab::experiment::from_fn;
//! use sweeplab::result::RunResult;
//! use sweeplab::sweep::BaseConfig;
//!
//! let base = BaseConfig::new()
//!   .sweep("lr", [0.1, 0.01])
//!   .set("arch", "resnet");
//! let experiment = from_fn(|config| {
//!   Ok(Some(RunResult::new(format!("run-{}", config["lr"])).with("accuracy", 0.9)))
//! });
//! let results = sweeplab::runner::run(&experiment, &base, "artifacts")?;
//! assert_eq!(results.len(), 2);
//! # Ok::<(), sweeplab::error::SweepError>(())
//! ```
//!
//! ## Core Modules
//!
//! * [`sweep`]: The [`sweep::Sweep`] marker, [`sweep::BaseConfig`] and the lazy [`sweep::expand`].
//! * [`runner`]: The [`runner::Sweeper`] orchestrating expansion, experiment calls and persistence.
//! * [`persist`]: Tiered result persistence with a tag whitelist for the readable format.
//! * [`experiment`]: The [`experiment::Experiment`] trait and the name-based registry.
//! * [`command`]: Out-of-process experiments speaking JSON over stdin/stdout.
//! * [`result`]: The [`result::RunResult`] returned by experiments.
//! * [`value`]: Plain data carried by configs and results.
//! * [`config`]: Layered settings and base config file loading.
//! * [`cli`]: Defines the `clap`-based command-line interface.
//! * [`error`]: Defines the custom error types for the library.
//! * [`logging`]: Provides the `setup_tracing` utility.

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod persist;
pub mod result;
pub mod runner;
pub mod sweep;
pub mod value;
