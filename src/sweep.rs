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
use crate::error::ConfigError;
use crate::value::Map;
use crate::value::Value;
use indexmap::IndexMap;

/// Tag (YAML) or single table key (TOML/JSON/YAML) marking a sweep field in a config file.
pub const SWEEP_MARKER: &str = "sweep";

/// A fully expanded configuration: every field holds one concrete value.
pub type Config = Map;

/// An ordered list of candidate values for one configuration field.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
  items: Vec<Value>,
}

impl Sweep {
  pub fn new<I, V>(items: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    Self {
      items: items.into_iter().map(Into::into).collect(),
    }
  }

  pub fn items(&self) -> &[Value] {
    &self.items
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// One field of a [`BaseConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
  Static(Value),
  Sweep(Sweep),
}

/// A configuration where any top-level field may be a [`Sweep`].
///
/// Field order is insertion order and fixes the enumeration order of
/// [`expand`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseConfig {
  fields: IndexMap<String, Field>,
}

impl BaseConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets a static field.
  pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.fields.insert(key.into(), Field::Static(value.into()));
    self
  }

  /// Sets a sweep field.
  pub fn sweep<I, V>(mut self, key: impl Into<String>, items: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    self.fields.insert(key.into(), Field::Sweep(Sweep::new(items)));
    self
  }

  pub fn insert(&mut self, key: impl Into<String>, field: Field) -> Option<Field> {
    self.fields.insert(key.into(), field)
  }

  pub fn get(&self, key: &str) -> Option<&Field> {
    self.fields.get(key)
  }

  pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
    self.fields.iter().map(|(key, field)| (key.as_str(), field))
  }

  /// Names of the sweep fields, in enumeration order.
  pub fn sweep_keys(&self) -> Vec<&str> {
    self
      .fields
      .iter()
      .filter(|(_, field)| matches!(field, Field::Sweep(_)))
      .map(|(key, _)| key.as_str())
      .collect()
  }

  /// Number of configurations [`expand`] yields: the product of all
  /// candidate counts, or 1 when nothing is swept.
  pub fn combinations(&self) -> usize {
    self
      .fields
      .values()
      .map(|field| match field {
        Field::Static(_) => 1,
        Field::Sweep(sweep) => sweep.len(),
      })
      .product()
  }

  /// Builds a base config from plain data.
  ///
  /// Only top-level fields are inspected. A field is a sweep when it is
  /// tagged `!sweep` or is a map whose only key is `sweep`; in both cases the
  /// payload must be a list. Markers nested deeper stay plain data.
  pub fn from_value(value: Value) -> Result<Self, ConfigError> {
    let map = match value {
      Value::Map(map) => map,
      other => {
        return Err(ConfigError::NotAMapping {
          found: other.kind(),
        });
      }
    };

    let mut base = BaseConfig::new();
    for (key, value) in map {
      let field = match sweep_payload(value) {
        Ok(Value::List(items)) => Field::Sweep(Sweep { items }),
        Ok(other) => {
          return Err(ConfigError::SweepNotAList {
            key,
            found: other.kind(),
          });
        }
        Err(value) => Field::Static(value),
      };
      base.fields.insert(key, field);
    }
    Ok(base)
  }
}

/// Unwraps a sweep marker. Hands the value back in `Err` when unmarked.
fn sweep_payload(value: Value) -> Result<Value, Value> {
  match value {
    Value::Tagged { tag, value } if tag == SWEEP_MARKER => Ok(*value),
    Value::Map(mut map) if map.len() == 1 => match map.shift_remove(SWEEP_MARKER) {
      Some(payload) => Ok(payload),
      None => Err(Value::Map(map)),
    },
    other => Err(other),
  }
}

impl FromIterator<(String, Field)> for BaseConfig {
  fn from_iter<T: IntoIterator<Item = (String, Field)>>(iter: T) -> Self {
    Self {
      fields: iter.into_iter().collect(),
    }
  }
}

/// Lazily enumerates every concrete configuration of `base`.
///
/// The cross-product runs over sweep fields in insertion order with the last
/// one varying fastest. Static fields are copied into each configuration, so
/// configurations never alias each other or `base`. A sweep with no
/// candidates makes the whole sequence empty.
pub fn expand(base: &BaseConfig) -> Expansion<'_> {
  let sweeps: Vec<&Sweep> = base
    .fields
    .values()
    .filter_map(|field| match field {
      Field::Sweep(sweep) => Some(sweep),
      Field::Static(_) => None,
    })
    .collect();
  let remaining = base.combinations();

  Expansion {
    base,
    cursor: vec![0; sweeps.len()],
    sweeps,
    remaining,
  }
}

/// Iterator returned by [`expand`].
#[derive(Debug, Clone)]
pub struct Expansion<'a> {
  base: &'a BaseConfig,
  sweeps: Vec<&'a Sweep>,
  // Candidate index per sweep field, odometer style.
  cursor: Vec<usize>,
  remaining: usize,
}

impl Expansion<'_> {
  fn current(&self) -> Config {
    let mut sweep_idx = 0;
    self
      .base
      .fields
      .iter()
      .map(|(key, field)| {
        let value = match field {
          Field::Static(value) => value.clone(),
          Field::Sweep(_) => {
            let sweep = self.sweeps[sweep_idx];
            let value = sweep.items[self.cursor[sweep_idx]].clone();
            sweep_idx += 1;
            value
          }
        };
        (key.clone(), value)
      })
      .collect()
  }

  fn advance(&mut self) {
    for idx in (0..self.cursor.len()).rev() {
      self.cursor[idx] += 1;
      if self.cursor[idx] < self.sweeps[idx].len() {
        return;
      }
      self.cursor[idx] = 0;
    }
  }
}

impl Iterator for Expansion<'_> {
  type Item = Config;

  fn next(&mut self) -> Option<Config> {
    if self.remaining == 0 {
      return None;
    }
    let config = self.current();
    self.remaining -= 1;
    if self.remaining > 0 {
      self.advance();
    }
    Some(config)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl ExactSizeIterator for Expansion<'_> {}
