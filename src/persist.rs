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

//! Result persistence.
//!
//! A [`Persister`] holds an ordered list of [`Format`]s. Each result is
//! encoded with the first format that accepts it and written to that
//! format's fixed file name inside the result directory. The default list is
//! [`YamlFormat`] (`results.yaml`), which only accepts tags present in its
//! [`TagRegistry`], followed by [`BincodeFormat`] (`results.bin`), which
//! accepts anything.

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::error::PersistError;
use crate::result::RunResult;
use crate::value::Map;
use crate::value::Value;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_yaml::Mapping;
use serde_yaml::value::Tag;
use serde_yaml::value::TaggedValue;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

pub const YAML_FILE_NAME: &str = "results.yaml";
pub const BINARY_FILE_NAME: &str = "results.bin";

/// Tag used for byte strings in the readable format. Always registered.
pub const BINARY_TAG: &str = "binary";

/// Whitelist of tags the readable format may emit and read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRegistry {
  tags: BTreeSet<String>,
}

impl Default for TagRegistry {
  fn default() -> Self {
    Self {
      tags: BTreeSet::from([BINARY_TAG.to_string()]),
    }
  }
}

impl TagRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a tag. A leading `!` is ignored, as are empty tags.
  pub fn register(&mut self, tag: impl AsRef<str>) -> &mut Self {
    let tag = normalize_tag(tag.as_ref());
    if !tag.is_empty() {
      self.tags.insert(tag.to_string());
    }
    self
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.tags.iter().map(String::as_str)
  }

  pub fn with<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    for tag in tags {
      self.register(tag);
    }
    self
  }

  pub fn contains(&self, tag: &str) -> bool {
    self.tags.contains(normalize_tag(tag))
  }
}

fn normalize_tag(tag: &str) -> &str {
  tag.trim_start_matches('!')
}

/// One serialization tier.
pub trait Format {
  /// Short name used in logs and reports.
  fn name(&self) -> &'static str;

  /// Fixed file name inside the result directory.
  fn file_name(&self) -> &'static str;

  fn encode(&self, result: &RunResult) -> Result<Vec<u8>, EncodeError>;

  fn decode(&self, bytes: &[u8]) -> Result<RunResult, DecodeError>;
}

/// Human-readable YAML restricted to registered tags.
#[derive(Debug, Clone, Default)]
pub struct YamlFormat {
  tags: TagRegistry,
}

impl YamlFormat {
  pub fn new(tags: TagRegistry) -> Self {
    Self { tags }
  }

  fn to_yaml(&self, value: &Value, path: &str) -> Result<serde_yaml::Value, EncodeError> {
    Ok(match value {
      Value::Null => serde_yaml::Value::Null,
      Value::Bool(b) => serde_yaml::Value::Bool(*b),
      Value::Int(i) => serde_yaml::Value::Number((*i).into()),
      Value::Float(f) => serde_yaml::Value::Number((*f).into()),
      Value::String(s) => serde_yaml::Value::String(s.clone()),
      Value::Bytes(bytes) => tagged(BINARY_TAG, serde_yaml::Value::String(BASE64.encode(bytes))),
      Value::List(items) => serde_yaml::Value::Sequence(
        items
          .iter()
          .enumerate()
          .map(|(idx, item)| self.to_yaml(item, &format!("{}[{}]", path, idx)))
          .collect::<Result<_, _>>()?,
      ),
      Value::Map(map) => serde_yaml::Value::Mapping(self.map_to_yaml(map, path)?),
      Value::Tagged { tag, value } => {
        if normalize_tag(tag) == BINARY_TAG {
          return Err(EncodeError::ReservedTag {
            tag: BINARY_TAG.to_string(),
            path: path.to_string(),
          });
        }
        if !self.tags.contains(tag) {
          return Err(EncodeError::UnregisteredTag {
            tag: normalize_tag(tag).to_string(),
            path: path.to_string(),
          });
        }
        tagged(tag, self.to_yaml(value, path)?)
      }
    })
  }

  fn map_to_yaml(&self, map: &Map, path: &str) -> Result<Mapping, EncodeError> {
    let mut mapping = Mapping::new();
    for (key, value) in map {
      let child = join_path(path, key);
      mapping.insert(
        serde_yaml::Value::String(key.clone()),
        self.to_yaml(value, &child)?,
      );
    }
    Ok(mapping)
  }

  fn from_yaml(&self, yaml: serde_yaml::Value, path: &str) -> Result<Value, DecodeError> {
    Ok(match yaml {
      serde_yaml::Value::Tagged(tagged) => {
        let TaggedValue { tag, value } = *tagged;
        let tag = tag_name(&tag);
        if !self.tags.contains(&tag) {
          return Err(DecodeError::UnregisteredTag {
            tag,
            path: path.to_string(),
          });
        }
        match value {
          serde_yaml::Value::String(encoded) if tag == BINARY_TAG => Value::Bytes(
            BASE64
              .decode(encoded.as_bytes())
              .map_err(|source| DecodeError::Base64 {
                path: path.to_string(),
                source,
              })?,
          ),
          _ if tag == BINARY_TAG => {
            return Err(DecodeError::Malformed(format!(
              "'!{}' at '{}' must wrap a base64 string",
              BINARY_TAG, path
            )));
          }
          value => Value::Tagged {
            value: Box::new(self.from_yaml(value, path)?),
            tag,
          },
        }
      }
      other => plain_from_yaml(other, path, &mut |value, path| self.from_yaml(value, path))?,
    })
  }

  fn map_from_yaml(&self, yaml: serde_yaml::Value, path: &str) -> Result<Map, DecodeError> {
    match self.from_yaml(yaml, path)? {
      Value::Map(map) => Ok(map),
      other => Err(DecodeError::Malformed(format!(
        "'{}' must be a mapping, got {}",
        path,
        other.kind()
      ))),
    }
  }
}

impl Format for YamlFormat {
  fn name(&self) -> &'static str {
    "yaml"
  }

  fn file_name(&self) -> &'static str {
    YAML_FILE_NAME
  }

  fn encode(&self, result: &RunResult) -> Result<Vec<u8>, EncodeError> {
    let config = match &result.config {
      Some(config) => serde_yaml::Value::Mapping(self.map_to_yaml(config, "config")?),
      None => serde_yaml::Value::Null,
    };
    let mut document = Mapping::new();
    document.insert("name".into(), serde_yaml::Value::String(result.name.clone()));
    document.insert("config".into(), config);
    document.insert(
      "data".into(),
      serde_yaml::Value::Mapping(self.map_to_yaml(&result.data, "data")?),
    );

    Ok(serde_yaml::to_string(&document)?.into_bytes())
  }

  fn decode(&self, bytes: &[u8]) -> Result<RunResult, DecodeError> {
    let document: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
    let serde_yaml::Value::Mapping(mut document) = document else {
      return Err(DecodeError::Malformed(
        "result document must be a mapping".to_string(),
      ));
    };

    let name = match document.remove("name") {
      Some(serde_yaml::Value::String(name)) => name,
      _ => {
        return Err(DecodeError::Malformed(
          "result is missing a string 'name'".to_string(),
        ));
      }
    };
    let config = match document.remove("config") {
      None | Some(serde_yaml::Value::Null) => None,
      Some(config) => Some(self.map_from_yaml(config, "config")?),
    };
    let data = match document.remove("data") {
      None | Some(serde_yaml::Value::Null) => Map::new(),
      Some(data) => self.map_from_yaml(data, "data")?,
    };

    Ok(RunResult { name, config, data })
  }
}

/// Converts an untagged YAML node, recursing into children with `child`.
///
/// Shared by the result decoder and the base config loader, which differ
/// only in how they treat tags.
pub(crate) fn plain_from_yaml<E, F>(
  yaml: serde_yaml::Value,
  path: &str,
  child: &mut F,
) -> Result<Value, E>
where
  E: From<DecodeError>,
  F: FnMut(serde_yaml::Value, &str) -> Result<Value, E>,
{
  Ok(match yaml {
    serde_yaml::Value::Null => Value::Null,
    serde_yaml::Value::Bool(b) => Value::Bool(b),
    serde_yaml::Value::Number(n) => match n.as_i64() {
      Some(i) => Value::Int(i),
      None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
    },
    serde_yaml::Value::String(s) => Value::String(s),
    serde_yaml::Value::Sequence(items) => Value::List(
      items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| child(item, &format!("{}[{}]", path, idx)))
        .collect::<Result<_, _>>()?,
    ),
    serde_yaml::Value::Mapping(mapping) => {
      let mut map = Map::with_capacity(mapping.len());
      for (key, value) in mapping {
        let key = match key {
          serde_yaml::Value::String(key) => key,
          other => {
            return Err(
              DecodeError::Malformed(format!("non-string mapping key at '{}': {:?}", path, other))
                .into(),
            );
          }
        };
        let value = child(value, &join_path(path, &key))?;
        map.insert(key, value);
      }
      Value::Map(map)
    }
    serde_yaml::Value::Tagged(tagged) => {
      let TaggedValue { tag, value } = *tagged;
      Value::Tagged {
        tag: tag_name(&tag),
        value: Box::new(child(value, path)?),
      }
    }
  })
}

/// Unrestricted binary encoding of the whole result.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeFormat;

impl Format for BincodeFormat {
  fn name(&self) -> &'static str {
    "bincode"
  }

  fn file_name(&self) -> &'static str {
    BINARY_FILE_NAME
  }

  fn encode(&self, result: &RunResult) -> Result<Vec<u8>, EncodeError> {
    Ok(bincode::serialize(result)?)
  }

  fn decode(&self, bytes: &[u8]) -> Result<RunResult, DecodeError> {
    Ok(bincode::deserialize(bytes)?)
  }
}

/// Writes each result with the first format that can encode it.
pub struct Persister {
  formats: Vec<Box<dyn Format>>,
}

impl Default for Persister {
  fn default() -> Self {
    Self::with_tags(TagRegistry::default())
  }
}

impl Persister {
  /// A persister with no formats. Add tiers with [`Persister::push`].
  pub fn empty() -> Self {
    Self {
      formats: Vec::new(),
    }
  }

  /// YAML restricted to `tags`, falling back to bincode.
  pub fn with_tags(tags: TagRegistry) -> Self {
    let mut persister = Self::empty();
    persister.push(YamlFormat::new(tags)).push(BincodeFormat);
    persister
  }

  /// Appends a tier after the existing ones.
  pub fn push(&mut self, format: impl Format + 'static) -> &mut Self {
    self.formats.push(Box::new(format));
    self
  }

  pub fn formats(&self) -> impl Iterator<Item = &dyn Format> {
    self.formats.iter().map(|format| format.as_ref())
  }

  /// Encodes and writes `result` into `dir`, returning the written file.
  ///
  /// An encode failure moves on to the next tier with a warning; the last
  /// tier's failure is returned. Filesystem errors are never retried.
  pub fn persist(&self, result: &RunResult, dir: &Path) -> Result<Persisted, PersistError> {
    let mut last_error = None;

    for (idx, format) in self.formats.iter().enumerate() {
      match format.encode(result) {
        Ok(bytes) => {
          let path = dir.join(format.file_name());
          fs::write(&path, bytes).map_err(|source| PersistError::Write {
            path: path.clone(),
            source,
          })?;
          self.remove_stale(dir, format.file_name())?;
          tracing::debug!(result = %result.name, format = format.name(), path = %path.display(), "Result written");
          return Ok(Persisted {
            name: result.name.clone(),
            format: format.name(),
            path,
          });
        }
        Err(error) => {
          if let Some(next) = self.formats.get(idx + 1) {
            tracing::warn!(
              result = %result.name,
              %error,
              "{} serialization failed. Falling back to {} in {}; the file will not be human-readable and its tags are unchecked.",
              format.name(),
              next.name(),
              next.file_name(),
            );
          }
          last_error = Some(error);
        }
      }
    }

    match last_error {
      Some(source) => Err(PersistError::Encode {
        name: result.name.clone(),
        source,
      }),
      None => Err(PersistError::NoFormats),
    }
  }

  /// Deletes files left in `dir` by other tiers, so `load` sees one result.
  fn remove_stale(&self, dir: &Path, written: &str) -> Result<(), PersistError> {
    for format in &self.formats {
      if format.file_name() == written {
        continue;
      }
      let path = dir.join(format.file_name());
      match fs::remove_file(&path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed stale result file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(PersistError::Remove { path, source }),
      }
    }
    Ok(())
  }

  /// Reads back the result stored in `dir` by whichever tier wrote it.
  pub fn load(&self, dir: &Path) -> Result<RunResult, PersistError> {
    for format in &self.formats {
      let path = dir.join(format.file_name());
      if !path.exists() {
        continue;
      }
      let bytes = fs::read(&path).map_err(|source| PersistError::Read {
        path: path.clone(),
        source,
      })?;
      return format
        .decode(&bytes)
        .map_err(|source| PersistError::Decode { path, source });
    }
    Err(PersistError::NotFound {
      dir: dir.to_path_buf(),
    })
  }
}

/// Where and how a result was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted {
  pub name: String,
  pub format: &'static str,
  pub path: PathBuf,
}

fn tagged(tag: &str, value: serde_yaml::Value) -> serde_yaml::Value {
  serde_yaml::Value::Tagged(Box::new(TaggedValue {
    tag: Tag::new(normalize_tag(tag)),
    value,
  }))
}

fn tag_name(tag: &Tag) -> String {
  normalize_tag(&tag.to_string()).to_string()
}

fn join_path(path: &str, key: &str) -> String {
  if path.is_empty() {
    key.to_string()
  } else {
    format!("{}.{}", path, key)
  }
}
