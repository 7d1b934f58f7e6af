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
use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use sweeplab::experiment::ExperimentRegistry;
use sweeplab::experiment::ExperimentSource;
use sweeplab::experiment::from_fn;
use sweeplab::persist::BINARY_FILE_NAME;
use sweeplab::persist::Persister;
use sweeplab::persist::TagRegistry;
use sweeplab::persist::YAML_FILE_NAME;
use sweeplab::result::RunResult;
use sweeplab::runner::Sweeper;
use sweeplab::runner::run;
use sweeplab::sweep::BaseConfig;
use sweeplab::sweep::Config;
use sweeplab::value::Value;
use tempfile::tempdir;

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
  fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }
}

impl io::Write for CapturedLogs {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
  let logs = CapturedLogs::default();
  let writer = logs.clone();
  let subscriber = tracing_subscriber::fmt()
    .with_writer(move || writer.clone())
    .with_ansi(false)
    .finish();
  let out = tracing::subscriber::with_default(subscriber, f);
  (out, logs.contents())
}

#[test]
fn test_learning_rate_sweep_end_to_end() {
  let temp = tempdir().unwrap();
  let base = BaseConfig::new()
    .sweep("lr", [0.1, 0.01])
    .set("arch", "resnet");
  let experiment = from_fn(|config| {
    let lr = config["lr"].as_f64().unwrap_or_default();
    Ok(Some(
      RunResult::new(format!("run-{}", config["lr"])).with("accuracy", 1.0 - lr),
    ))
  });

  let results = run(&experiment, &base, temp.path()).unwrap();
  let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, vec!["run-0.1", "run-0.01"]);

  let mut dirs: Vec<String> = std::fs::read_dir(temp.path())
    .unwrap()
    .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  dirs.sort();
  assert_eq!(dirs, vec!["run-0.01", "run-0.1"]);

  let persister = Persister::default();
  for result in &results {
    let dir = temp.path().join(&result.name);
    assert!(dir.join(YAML_FILE_NAME).exists());
    assert!(!dir.join(BINARY_FILE_NAME).exists());

    let loaded = persister.load(&dir).unwrap();
    assert_eq!(&loaded, result);
    let config = loaded.config.unwrap();
    assert_eq!(config["arch"], Value::from("resnet"));
  }
}

#[test]
fn test_explicit_config_is_not_overwritten() {
  let temp = tempdir().unwrap();
  let base = BaseConfig::new().sweep("seed", [1i64, 2]);
  let experiment = from_fn(|config| {
    let mut own = Config::new();
    own.insert("custom".to_string(), Value::from(true));
    let name = format!("seed-{}", config["seed"]);
    Ok(Some(RunResult::new(name).with_config(own)))
  });

  let results = run(&experiment, &base, temp.path()).unwrap();
  let persister = Persister::default();
  for result in results {
    let loaded = persister.load(&temp.path().join(&result.name)).unwrap();
    let config = loaded.config.unwrap();
    assert_eq!(config.len(), 1);
    assert_eq!(config["custom"], Value::Bool(true));
  }
}

#[test]
fn test_unregistered_tag_falls_back_with_warning() {
  let temp = tempdir().unwrap();
  let base = BaseConfig::new().set("arch", "resnet");
  let experiment = from_fn(|_config| {
    Ok(Some(
      RunResult::new("opaque").with("model", Value::tagged("torch_module", "<weights>")),
    ))
  });

  let (results, logs) = with_captured_logs(|| run(&experiment, &base, temp.path()));
  let results = results.unwrap();

  let dir = temp.path().join("opaque");
  assert!(!dir.join(YAML_FILE_NAME).exists());
  assert!(dir.join(BINARY_FILE_NAME).exists());
  assert!(logs.contains("WARN"), "{}", logs);
  assert!(logs.contains("torch_module"), "{}", logs);
  assert!(logs.contains("bincode"), "{}", logs);

  let loaded = Persister::default().load(&dir).unwrap();
  assert_eq!(loaded, results[0]);
}

#[test]
fn test_registered_tag_stays_readable() {
  let temp = tempdir().unwrap();
  let base = BaseConfig::new().set("arch", "resnet");
  let experiment = from_fn(|_config| {
    Ok(Some(
      RunResult::new("tagged").with("origin", Value::tagged("point", vec![Value::Int(0)])),
    ))
  });
  let persister = Persister::with_tags(TagRegistry::new().with(["point"]));

  let results = Sweeper::new(temp.path())
    .with_persister(persister)
    .run(&experiment, &base)
    .unwrap();

  let file = temp.path().join("tagged").join(YAML_FILE_NAME);
  let text = std::fs::read_to_string(&file).unwrap();
  assert!(text.contains("!point"), "{}", text);
  assert_eq!(results.len(), 1);
}

#[test]
fn test_existing_artifact_dir_is_reused() {
  let temp = tempdir().unwrap();
  let marker = temp.path().join("keep.txt");
  std::fs::write(&marker, "untouched").unwrap();

  let experiment = from_fn(|_config| Ok(Some(RunResult::new("only"))));
  run(&experiment, &BaseConfig::new(), temp.path()).unwrap();

  assert_eq!(std::fs::read_to_string(&marker).unwrap(), "untouched");
  assert!(temp.path().join("only").join(YAML_FILE_NAME).exists());
}

#[test]
fn test_named_source_resolves_from_registry() {
  let temp = tempdir().unwrap();
  let base = BaseConfig::new().sweep("depth", [18i64, 50]);

  let report = Sweeper::new(temp.path())
    .run_source(
      &ExperimentSource::Named("echo".to_string()),
      &ExperimentRegistry::with_builtins(),
      &base,
    )
    .unwrap();

  let names: Vec<&str> = report.iter().map(|(r, _)| r.name.as_str()).collect();
  assert_eq!(names, vec!["run-18", "run-50"]);
  assert!(report.iter().all(|(_, persisted)| persisted.format == "yaml"));
}
