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
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Insertion-ordered string-keyed mapping used for configs and result payloads.
pub type Map = IndexMap<String, Value>;

/// Plain data carried by configurations and results.
///
/// The derived serde representation is the one written by the binary
/// fallback format. The readable format and the config loaders convert to and
/// from their own value trees by hand so that tags are checked structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  String(String),
  Bytes(Vec<u8>),
  List(Vec<Value>),
  Map(Map),
  /// A user-defined type. Its tag must be registered for the readable format
  /// to accept it.
  Tagged { tag: String, value: Box<Value> },
}

impl Value {
  /// Wraps `value` under a user-defined tag.
  pub fn tagged(tag: impl Into<String>, value: impl Into<Value>) -> Self {
    Value::Tagged {
      tag: tag.into(),
      value: Box::new(value.into()),
    }
  }

  /// Short name of the variant, used in error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "bool",
      Value::Int(_) => "int",
      Value::Float(_) => "float",
      Value::String(_) => "string",
      Value::Bytes(_) => "bytes",
      Value::List(_) => "list",
      Value::Map(_) => "map",
      Value::Tagged { .. } => "tagged",
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  /// Numeric view of ints and floats.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Value::Int(i) => Some(*i as f64),
      Value::Float(f) => Some(*f),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&Map> {
    match self {
      Value::Map(map) => Some(map),
      _ => None,
    }
  }

  /// Looks up `key` when this value is a map.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.as_map().and_then(|map| map.get(key))
  }

  /// Converts to JSON for the process protocol.
  ///
  /// Lossy: bytes become base64 strings, tags are dropped and non-finite
  /// floats become `null`.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Null => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(*b),
      Value::Int(i) => serde_json::Value::Number((*i).into()),
      Value::Float(f) => serde_json::Number::from_f64(*f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null),
      Value::String(s) => serde_json::Value::String(s.clone()),
      Value::Bytes(bytes) => serde_json::Value::String(BASE64.encode(bytes)),
      Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
      Value::Map(map) => map_to_json(map),
      Value::Tagged { value, .. } => value.to_json(),
    }
  }
}

/// Converts a map to a JSON object, preserving key order.
pub fn map_to_json(map: &Map) -> serde_json::Value {
  serde_json::Value::Object(
    map
      .iter()
      .map(|(key, value)| (key.clone(), value.to_json()))
      .collect(),
  )
}

impl From<serde_json::Value> for Value {
  fn from(json: serde_json::Value) -> Self {
    match json {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Bool(b),
      serde_json::Value::Number(n) => match n.as_i64() {
        Some(i) => Value::Int(i),
        None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
      },
      serde_json::Value::String(s) => Value::String(s),
      serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
      serde_json::Value::Object(object) => Value::Map(
        object
          .into_iter()
          .map(|(key, value)| (key, Value::from(value)))
          .collect(),
      ),
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Int(i)
  }
}

impl From<i32> for Value {
  fn from(i: i32) -> Self {
    Value::Int(i64::from(i))
  }
}

impl From<u32> for Value {
  fn from(i: u32) -> Self {
    Value::Int(i64::from(i))
  }
}

impl From<f64> for Value {
  fn from(f: f64) -> Self {
    Value::Float(f)
  }
}

impl From<f32> for Value {
  fn from(f: f32) -> Self {
    Value::Float(f64::from(f))
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<Vec<u8>> for Value {
  fn from(bytes: Vec<u8>) -> Self {
    Value::Bytes(bytes)
  }
}

impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::List(items)
  }
}

impl From<Map> for Value {
  fn from(map: Map) -> Self {
    Value::Map(map)
  }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(option: Option<T>) -> Self {
    option.map(Into::into).unwrap_or(Value::Null)
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => write!(f, "null"),
      Value::Bool(b) => write!(f, "{}", b),
      Value::Int(i) => write!(f, "{}", i),
      Value::Float(x) => write!(f, "{}", x),
      Value::String(s) => write!(f, "{}", s),
      Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
      Value::List(items) => {
        let items: Vec<String> = items.iter().map(|item| item.to_string()).collect();
        write!(f, "[{}]", items.join(", "))
      }
      Value::Map(map) => {
        let entries: Vec<String> = map
          .iter()
          .map(|(key, value)| format!("{}: {}", key, value))
          .collect();
        write!(f, "{{{}}}", entries.join(", "))
      }
      Value::Tagged { tag, value } => write!(f, "!{} {}", tag, value),
    }
  }
}
