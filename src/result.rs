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
use crate::error::DecodeError;
use crate::sweep::Config;
use crate::value::Map;
use crate::value::Value;
use crate::value::map_to_json;
use serde::Deserialize;
use serde::Serialize;
use std::path::Component;
use std::path::Path;

/// What an experiment returns for one configuration.
///
/// `name` becomes the result's directory under the artifact root. `config`
/// is back-filled by the runner when the experiment leaves it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
  pub name: String,
  pub config: Option<Config>,
  pub data: Map,
}

impl RunResult {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      config: None,
      data: Map::new(),
    }
  }

  /// Adds a payload field.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.data.insert(key.into(), value.into());
    self
  }

  pub fn with_config(mut self, config: Config) -> Self {
    self.config = Some(config);
    self
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.data.get(key)
  }

  /// True when `name` is a single plain path component.
  pub fn has_valid_name(&self) -> bool {
    let mut components = Path::new(&self.name).components();
    matches!(
      (components.next(), components.next()),
      (Some(Component::Normal(part)), None) if part == self.name.as_str()
    )
  }

  /// Decodes the JSON a process experiment prints on stdout.
  ///
  /// `null` means the experiment produced no result.
  pub fn from_json(json: serde_json::Value) -> Result<Option<Self>, DecodeError> {
    let mut object = match json {
      serde_json::Value::Null => return Ok(None),
      serde_json::Value::Object(object) => object,
      other => {
        return Err(DecodeError::Malformed(format!(
          "expected a JSON object, got {}",
          other
        )));
      }
    };

    let name = match object.remove("name") {
      Some(serde_json::Value::String(name)) => name,
      _ => {
        return Err(DecodeError::Malformed(
          "result is missing a string 'name'".to_string(),
        ));
      }
    };
    let config = match object.remove("config").map(Value::from) {
      None | Some(Value::Null) => None,
      Some(Value::Map(config)) => Some(config),
      Some(other) => {
        return Err(DecodeError::Malformed(format!(
          "'config' must be an object, got {}",
          other.kind()
        )));
      }
    };
    let data = match object.remove("data").map(Value::from) {
      None | Some(Value::Null) => Map::new(),
      Some(Value::Map(data)) => data,
      Some(other) => {
        return Err(DecodeError::Malformed(format!(
          "'data' must be an object, got {}",
          other.kind()
        )));
      }
    };

    Ok(Some(Self { name, config, data }))
  }

  pub fn to_json(&self) -> serde_json::Value {
    serde_json::json!({
      "name": self.name,
      "config": self.config.as_ref().map(map_to_json),
      "data": map_to_json(&self.data),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_name_validation() {
    assert!(RunResult::new("run-0.1").has_valid_name());
    assert!(RunResult::new("lr=0.01,arch=resnet").has_valid_name());

    for bad in ["", ".", "..", "a/b", "/abs", "run/"] {
      assert!(!RunResult::new(bad).has_valid_name(), "{:?} should be rejected", bad);
    }
  }

  #[test]
  fn test_from_json_null_is_absent() {
    assert_eq!(RunResult::from_json(serde_json::Value::Null).unwrap(), None);
  }

  #[test]
  fn test_from_json_reads_all_parts() {
    let json = serde_json::json!({
      "name": "run-a",
      "config": {"lr": 0.1},
      "data": {"accuracy": 0.93, "epochs": 3}
    });
    let result = RunResult::from_json(json).unwrap().unwrap();

    assert_eq!(result.name, "run-a");
    assert_eq!(result.config.as_ref().unwrap()["lr"], Value::Float(0.1));
    assert_eq!(result.get("accuracy"), Some(&Value::Float(0.93)));
    assert_eq!(result.get("epochs"), Some(&Value::Int(3)));
  }

  #[test]
  fn test_from_json_rejects_missing_name() {
    let err = RunResult::from_json(serde_json::json!({"data": {}})).unwrap_err();
    assert!(matches!(err, DecodeError::Malformed(_)));
  }

  #[test]
  fn test_to_json_shape() {
    let result = RunResult::new("r").with("loss", 1.5);
    assert_eq!(
      result.to_json(),
      serde_json::json!({"name": "r", "config": null, "data": {"loss": 1.5}})
    );
  }
}
