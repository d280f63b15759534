//! The voice-pack index file.

use std::path::{Path, PathBuf};

use crate::config::ConfigFile;
use crate::error::ModelResult;

const INDEX_FILE_NAME: &str = "_index.txt";

/// The `_index.txt` file at the root of a voice pack.
///
/// Each entry maps a well-known key (`model_file`, `control_file`,
/// `intonation_rhythm_dir`, `phonetic_parser_dir`, `pho1_parser_dir`) to a
/// path relative to the pack directory.
#[derive(Debug, Clone)]
pub struct VoicePackIndex {
    dir: PathBuf,
    data: ConfigFile,
}

impl VoicePackIndex {
    /// Loads the index of the voice pack at `dir`.
    pub fn load(dir: impl AsRef<Path>) -> ModelResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let data = ConfigFile::load(dir.join(INDEX_FILE_NAME))?;
        Ok(Self { dir, data })
    }

    /// Returns the pack directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves an index entry to an absolute path.
    pub fn entry(&self, key: &str) -> ModelResult<PathBuf> {
        Ok(self.dir.join(self.data.value_str(key)?))
    }

    /// Resolves an optional index entry.
    pub fn entry_opt(&self, key: &str) -> Option<PathBuf> {
        if self.data.contains(key) {
            self.entry(key).ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("_index.txt"),
            "model_file = artic_model.xml\ncontrol_file = control.config\n",
        )
        .unwrap();
        let index = VoicePackIndex::load(dir.path()).unwrap();
        assert_eq!(
            index.entry("model_file").unwrap(),
            dir.path().join("artic_model.xml")
        );
        assert!(index.entry("missing").is_err());
        assert!(index.entry_opt("missing").is_none());
        assert!(index.entry_opt("control_file").is_some());
    }
}
