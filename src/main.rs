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
use Commands::Expand;
use Commands::List;
use Commands::Run;
use anyhow::Result;
use clap::Parser;
use sweeplab::cli::Cli;
use sweeplab::cli::Commands;
use sweeplab::config::Settings;
use sweeplab::config::load_base_config;
use sweeplab::experiment::ExperimentRegistry;
use sweeplab::logging::setup_tracing;
use sweeplab::persist::Persister;
use sweeplab::runner::Sweeper;
use sweeplab::sweep::expand;
use sweeplab::value::map_to_json;

fn main() -> Result<()> {
  let _guard = setup_tracing()?;

  let Cli { command } = Cli::parse();
  let main_span = tracing::info_span!("sweep_cli");
  let _enter = main_span.enter();
  let registry = ExperimentRegistry::with_builtins();

  match command {
    Run(run_args) => {
      tracing::info!("Initializing sweep...");

      let settings = Settings::from_run_args(&run_args)?;
      let source = settings.experiment_source()?;
      let base = load_base_config(&run_args.config)?;

      let sweeper = Sweeper::new(&settings.artifact_dir)
        .with_persister(Persister::with_tags(settings.tag_registry()));
      let report = sweeper.run_source(&source, &registry, &base)?;

      for (result, persisted) in &report {
        let line = serde_json::json!({
          "name": result.name,
          "format": persisted.format,
          "path": persisted.path,
        });
        println!("{}", line);
      }
      tracing::info!("Sweep produced {} result(s).", report.len());
    }
    Expand { config } => {
      let base = load_base_config(&config)?;
      for config in expand(&base) {
        println!("{}", map_to_json(&config));
      }
    }
    List => {
      for name in registry.names() {
        println!("{}", name);
      }
    }
  }

  Ok(())
}
