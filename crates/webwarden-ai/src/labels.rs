//! Label space: the classifier's output indices and their category names.
//!
//! Loaded from either a plain JSON array (`["Adult", "Education", ...]`), an
//! object with a `labels` array, or a Hugging Face `config.json` carrying an
//! `id2label` map.

use std::path::Path;

use serde_json::Value;

use crate::InferenceError;

/// Ordered category names, indexed by model output position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpace {
    names: Vec<String>,
}

impl LabelSpace {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a label file from disk.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read labels {}: {e}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Parse any of the supported label layouts.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let space = match &value {
            Value::Array(items) => Self::from_array(items)?,
            Value::Object(map) => {
                if let Some(Value::Object(id2label)) = map.get("id2label") {
                    Self::from_id2label(id2label)?
                } else if let Some(Value::Array(items)) = map.get("labels") {
                    Self::from_array(items)?
                } else {
                    anyhow::bail!("expected an `id2label` map or a `labels` array");
                }
            }
            _ => anyhow::bail!("label file must be a JSON array or object"),
        };
        anyhow::ensure!(!space.is_empty(), "label space is empty");
        Ok(space)
    }

    fn from_array(items: &[Value]) -> anyhow::Result<Self> {
        let names = items
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("label {i} is not a string"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { names })
    }

    fn from_id2label(map: &serde_json::Map<String, Value>) -> anyhow::Result<Self> {
        let mut names = vec![None; map.len()];
        for (key, value) in map {
            let index: usize = key
                .parse()
                .map_err(|_| anyhow::anyhow!("id2label key {key:?} is not an index"))?;
            let slot = names
                .get_mut(index)
                .ok_or_else(|| anyhow::anyhow!("id2label index {index} leaves a gap"))?;
            let name = value
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("id2label value for {index} is not a string"))?;
            *slot = Some(name.to_string());
        }
        let names = names
            .into_iter()
            .enumerate()
            .map(|(i, n)| n.ok_or_else(|| anyhow::anyhow!("id2label missing index {i}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Category name for `index`, or [`InferenceError::UnknownLabel`].
    pub fn decode(&self, index: usize) -> Result<&str, InferenceError> {
        self.name(index).ok_or(InferenceError::UnknownLabel {
            index,
            size: self.names.len(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
