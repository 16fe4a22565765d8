use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Maximum length of a label value accepted by container orchestrators.
const MAX_VALUE_LEN: usize = 63;

/// Key–value metadata attached to submitted workloads.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Insert or overwrite a label. The value is sanitized, the key is checked.
    pub fn insert<K, V>(&mut self, key: K, val: V) -> ModelResult<&mut Self>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let key = key.into();
        if key.is_empty() {
            return Err(ModelError::InvalidLabel {
                key,
                reason: "key must not be empty",
            });
        }
        let value = Self::sanitize_value(val.as_ref());
        self.0.insert(key, value);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Make a value acceptable as a label value.
    ///
    /// Characters outside `[A-Za-z0-9._-]` become `_`, the result is cut to 63 chars
    /// and leading/trailing non-alphanumerics are stripped.
    pub fn sanitize_value(raw: &str) -> String {
        let replaced: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .take(MAX_VALUE_LEN)
            .collect();

        replaced
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_string()
    }
}
