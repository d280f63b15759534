//! Plain-text `key = value` configuration files.
//!
//! Lines are `key = value`; `#` starts a comment line; blank lines are
//! skipped. Floats always use `.` as the decimal separator, independent of
//! the process locale.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ModelError, ModelResult};

/// A parsed key/value configuration file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: String,
    entries: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Loads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ModelError::config(path.display().to_string(), format!("could not read: {e}"))
        })?;
        Self::parse(path.display().to_string(), &text)
    }

    /// Parses configuration text. `path` is used in error messages only.
    pub fn parse(path: String, text: &str) -> ModelResult<Self> {
        let mut entries = BTreeMap::new();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ModelError::config(
                    path.clone(),
                    format!("line {}: missing '='", line_number + 1),
                )
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ModelError::config(
                    path.clone(),
                    format!("line {}: empty key", line_number + 1),
                ));
            }
            entries.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self { path, entries })
    }

    /// Returns a raw string value.
    pub fn value_str(&self, key: &str) -> ModelResult<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ModelError::config(self.path.clone(), format!("missing key: {key}")))
    }

    /// Returns a string value, or the default if the key is absent.
    pub fn value_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(default)
    }

    /// Returns a parsed value.
    pub fn value<T: std::str::FromStr>(&self, key: &str) -> ModelResult<T> {
        let raw = self.value_str(key)?;
        raw.parse().map_err(|_| {
            ModelError::config(
                self.path.clone(),
                format!("invalid value for {key}: {raw}"),
            )
        })
    }

    /// Returns a parsed value, or the default if the key is absent.
    pub fn value_or<T: std::str::FromStr>(&self, key: &str, default: T) -> ModelResult<T> {
        if !self.entries.contains_key(key) {
            return Ok(default);
        }
        self.value(key)
    }

    /// Returns a boolean value written as `0` or `1`.
    pub fn value_bool(&self, key: &str) -> ModelResult<bool> {
        match self.value_str(key)? {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(ModelError::config(
                self.path.clone(),
                format!("invalid boolean for {key}: {other} (expected 0 or 1)"),
            )),
        }
    }

    /// Returns a boolean value, or the default if the key is absent.
    pub fn value_bool_or(&self, key: &str, default: bool) -> ModelResult<bool> {
        if !self.entries.contains_key(key) {
            return Ok(default);
        }
        self.value_bool(key)
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_lookup() {
        let config = ConfigFile::parse(
            "test".into(),
            "# comment\n\ncontrol_rate = 250\nglobal_tempo = 1.5\nmacro_intonation = 1\n",
        )
        .unwrap();
        assert_eq!(config.value::<u32>("control_rate").unwrap(), 250);
        assert_eq!(config.value::<f64>("global_tempo").unwrap(), 1.5);
        assert!(config.value_bool("macro_intonation").unwrap());
        assert!(!config.contains("missing"));
        assert!(config.value_str("missing").is_err());
        assert_eq!(config.value_or("missing", 7).unwrap(), 7);
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert!(ConfigFile::parse("t".into(), "no separator\n").is_err());
        assert!(ConfigFile::parse("t".into(), "= value\n").is_err());
        let config = ConfigFile::parse("t".into(), "flag = 2\n").unwrap();
        assert!(config.value_bool("flag").is_err());
    }

    #[test]
    fn test_float_parsing_uses_dot() {
        let config = ConfigFile::parse("t".into(), "x = -1.25\n").unwrap();
        assert_eq!(config.value::<f32>("x").unwrap(), -1.25);
        let bad = ConfigFile::parse("t".into(), "x = 1,25\n").unwrap();
        assert!(bad.value::<f32>("x").is_err());
    }
}
