//! Durable per-file progress store.
//!
//! The store is a pretty-printed JSON document holding one record per video,
//! in first-discovered order. It is read once when a run starts and rewritten
//! in full (temp file + rename) after every file whose record changed.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Value stored in `audio_asset_path` for videos without an audio stream.
pub const NO_AUDIO: &str = "No audio";

const STORE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read progress store {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("progress store {} is malformed: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("progress store {} has version {found}, expected {expected}", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("progress store {} lists '{key}' more than once", path.display())]
    DuplicateKey { path: PathBuf, key: String },

    #[error("progress store {}: record '{key}' is invalid: {reason}", path.display())]
    Invalid {
        path: PathBuf,
        key: String,
        reason: String,
    },

    #[error("failed to encode progress store: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to write progress store {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a record stands with respect to audio extraction.
///
/// Persisted as a single string: empty while pending, the [`NO_AUDIO`]
/// sentinel, or the path of the extracted asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AudioAsset {
    #[default]
    Pending,
    Extracted(String),
    NoAudio,
}

impl From<String> for AudioAsset {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => Self::Pending,
            NO_AUDIO => Self::NoAudio,
            _ => Self::Extracted(normalize_key(&value)),
        }
    }
}

impl From<AudioAsset> for String {
    fn from(value: AudioAsset) -> Self {
        match value {
            AudioAsset::Pending => String::new(),
            AudioAsset::Extracted(path) => path,
            AudioAsset::NoAudio => NO_AUDIO.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub ordinal: u32,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingRecord {
    pub source_path: String,
    pub audio_asset_path: AudioAsset,
    pub transcript: String,
    pub candidates: Vec<Candidate>,
    pub best_candidate_ordinal: Option<u32>,
}

impl ProcessingRecord {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            ..Default::default()
        }
    }

    /// Terminal record for a video without an audio stream.
    pub fn no_audio(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            audio_asset_path: AudioAsset::NoAudio,
            ..Default::default()
        }
    }

    pub fn has_no_audio(&self) -> bool {
        self.audio_asset_path == AudioAsset::NoAudio
    }

    /// True when no further stage needs to run for `target` candidates.
    pub fn is_complete(&self, target: usize) -> bool {
        self.has_no_audio() || self.candidates.len() >= target
    }

    /// Ordinal for the next appended candidate. Never reuses a written ordinal,
    /// so it is `None` once `u32::MAX` has been handed out.
    pub fn next_ordinal(&self) -> Option<u32> {
        self.candidates
            .iter()
            .map(|c| c.ordinal)
            .max()
            .unwrap_or(0)
            .checked_add(1)
    }

    pub fn candidate_texts(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.text.clone()).collect()
    }

    pub fn best_candidate(&self) -> Option<&Candidate> {
        let best = self.best_candidate_ordinal?;
        self.candidates.iter().find(|c| c.ordinal == best)
    }

    fn validate(&self) -> Result<(), String> {
        if self.source_path.is_empty() {
            return Err("empty source_path".to_string());
        }
        if self.has_no_audio() && (!self.transcript.is_empty() || !self.candidates.is_empty()) {
            return Err("no-audio record carries a transcript or candidates".to_string());
        }
        let mut previous = 0;
        for candidate in &self.candidates {
            if candidate.ordinal <= previous {
                return Err(format!(
                    "candidate ordinal {} is not strictly increasing",
                    candidate.ordinal
                ));
            }
            previous = candidate.ordinal;
        }
        if let Some(best) = self.best_candidate_ordinal {
            if self.best_candidate().is_none() {
                return Err(format!("best_candidate_ordinal {} has no candidate", best));
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    records: &'a [ProcessingRecord],
}

#[derive(Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    records: Vec<ProcessingRecord>,
}

/// All records for one scan root, keyed by normalized source path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStore {
    records: Vec<ProcessingRecord>,
    index: HashMap<String, usize>,
}

impl ProcessingStore {
    /// Load the store at `path`, or an empty store if the file does not exist.
    ///
    /// Anything that is present but unreadable, malformed or inconsistent is
    /// an error: treating it as empty would re-run every paid stage.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: StoreFile = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if file.version != STORE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: file.version,
                expected: STORE_VERSION,
            });
        }

        let mut store = Self::default();
        for mut record in file.records {
            record.source_path = normalize_key(&record.source_path);
            record.validate().map_err(|reason| StoreError::Invalid {
                path: path.to_path_buf(),
                key: record.source_path.clone(),
                reason,
            })?;
            if store.index.contains_key(&record.source_path) {
                return Err(StoreError::DuplicateKey {
                    path: path.to_path_buf(),
                    key: record.source_path,
                });
            }
            store.push(record);
        }
        Ok(store)
    }

    /// Rewrite the whole store: write a sibling temp file, sync it, then
    /// rename it over `path` so a reader never sees a half-written store.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = self.to_json()?;
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        let mut file = std::fs::File::create(&tmp_path).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);
        std::fs::rename(&tmp_path, path).map_err(write_err)?;

        tracing::debug!("Progress store written to {}", path.display());
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        let file = StoreFileRef {
            version: STORE_VERSION,
            records: &self.records,
        };
        let mut content = serde_json::to_string_pretty(&file).map_err(StoreError::Encode)?;
        content.push('\n');
        Ok(content)
    }

    pub fn get(&self, key: &str) -> Option<&ProcessingRecord> {
        self.index
            .get(&normalize_key(key))
            .map(|&i| &self.records[i])
    }

    /// Replace the record with the same key in place, or append it.
    pub fn upsert(&mut self, mut record: ProcessingRecord) {
        record.source_path = normalize_key(&record.source_path);
        match self.index.get(&record.source_path) {
            Some(&i) => self.records[i] = record,
            None => self.push(record),
        }
    }

    pub fn records(&self) -> &[ProcessingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn push(&mut self, record: ProcessingRecord) {
        self.index
            .insert(record.source_path.clone(), self.records.len());
        self.records.push(record);
    }
}

/// Canonical slash-separated form of a relative path.
///
/// Backslashes become slashes, `.` and empty components are dropped and `..`
/// is resolved lexically, so `sub\video.mp4`, `./sub/video.mp4` and
/// `sub//x/../video.mp4` all map to `sub/video.mp4`.
pub fn normalize_key(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let rooted = unified.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Store key of `file` relative to `root`, or `None` if `file` is outside it.
pub fn key_for(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    Some(normalize_key(&relative.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn complete_record(key: &str, texts: &[&str], best: u32) -> ProcessingRecord {
        ProcessingRecord {
            source_path: key.to_string(),
            audio_asset_path: AudioAsset::Extracted(".tmp/a.wav".to_string()),
            transcript: "hello there".to_string(),
            candidates: texts
                .iter()
                .enumerate()
                .map(|(i, t)| Candidate {
                    ordinal: i as u32 + 1,
                    text: t.to_string(),
                })
                .collect(),
            best_candidate_ordinal: Some(best),
        }
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("sub/video.mp4"), "sub/video.mp4");
        assert_eq!(normalize_key("sub\\video.mp4"), "sub/video.mp4");
        assert_eq!(normalize_key("./sub//video.mp4"), "sub/video.mp4");
        assert_eq!(normalize_key("sub/extra/../video.mp4"), "sub/video.mp4");
        assert_eq!(normalize_key("sub/dir/"), "sub/dir");
        assert_eq!(normalize_key("../up.mp4"), "../up.mp4");
        assert_eq!(normalize_key(""), ".");
        assert_eq!(normalize_key("/abs/./x.mp4"), "/abs/x.mp4");
    }

    #[test]
    fn test_key_for_is_relative_to_root() {
        let root = Path::new("/videos");
        assert_eq!(
            key_for(root, Path::new("/videos/sub/a.mp4")).as_deref(),
            Some("sub/a.mp4")
        );
        assert!(key_for(root, Path::new("/elsewhere/a.mp4")).is_none());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = ProcessingStore::load(&tmp.path().join("store.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_roundtrip_preserves_order_and_escapes_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");

        let mut store = ProcessingStore::default();
        store.upsert(complete_record(
            "b.mp4",
            &["Tom & Jerry <live> \"quoted\"", "line\nbreak"],
            2,
        ));
        store.upsert(ProcessingRecord::no_audio("a.mp4"));
        store.save(&path).unwrap();

        let loaded = ProcessingStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.records()[0].source_path, "b.mp4");
        assert_eq!(loaded.records()[1].source_path, "a.mp4");
        assert_eq!(
            loaded.records()[0].candidates[0].text,
            "Tom & Jerry <live> \"quoted\""
        );
        assert!(!tmp.path().join("store.json.tmp").exists());
    }

    #[test]
    fn test_no_audio_sentinel_persisted_as_string() {
        let mut store = ProcessingStore::default();
        store.upsert(ProcessingRecord::no_audio("silent.mp4"));
        let json = store.to_json().unwrap();
        assert!(json.contains("\"audio_asset_path\": \"No audio\""));
        assert!(json.contains("\"best_candidate_ordinal\": null"));
    }

    #[test]
    fn test_load_normalizes_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"version":1,"records":[{"source_path":"sub\\video.mp4","audio_asset_path":".tmp\\v.wav","transcript":"t","candidates":[],"best_candidate_ordinal":null}]}"#,
        )
        .unwrap();

        let store = ProcessingStore::load(&path).unwrap();
        let record = store.get("sub/video.mp4").unwrap();
        assert_eq!(
            record.audio_asset_path,
            AudioAsset::Extracted(".tmp/v.wav".to_string())
        );
        assert!(store.get("sub\\video.mp4").is_some());
    }

    #[test]
    fn test_load_corrupt_store_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, "{\"version\":1,\"records\":[").unwrap();
        let err = ProcessingStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, r#"{"version":9,"records":[]}"#).unwrap();
        let err = ProcessingStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { found: 9, .. }));
    }

    #[test]
    fn test_load_rejects_duplicate_keys_after_normalization() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"version":1,"records":[{"source_path":"a/b.mp4"},{"source_path":"a\\b.mp4"}]}"#,
        )
        .unwrap();
        let err = ProcessingStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref key, .. } if key == "a/b.mp4"));
    }

    #[test]
    fn test_load_rejects_dangling_best_ordinal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let mut store = ProcessingStore::default();
        let mut record = complete_record("a.mp4", &["one"], 1);
        record.best_candidate_ordinal = Some(4);
        store.upsert(record);
        store.save(&path).unwrap();

        let err = ProcessingStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut store = ProcessingStore::default();
        store.upsert(ProcessingRecord::new("a.mp4"));
        store.upsert(ProcessingRecord::new("b.mp4"));
        store.upsert(complete_record("a.mp4", &["x"], 1));

        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].source_path, "a.mp4");
        assert_eq!(store.records()[0].candidates.len(), 1);
    }

    #[test]
    fn test_next_ordinal_continues_from_max() {
        let mut record = complete_record("a.mp4", &["x", "y"], 1);
        assert_eq!(record.next_ordinal(), Some(3));
        record.candidates.remove(0);
        assert_eq!(record.next_ordinal(), Some(3));
        assert_eq!(ProcessingRecord::new("b.mp4").next_ordinal(), Some(1));

        record.candidates[0].ordinal = u32::MAX;
        assert_eq!(record.next_ordinal(), None);
    }

    #[test]
    fn test_is_complete() {
        assert!(ProcessingRecord::no_audio("a.mp4").is_complete(10));
        let record = complete_record("b.mp4", &["x", "y"], 1);
        assert!(record.is_complete(2));
        assert!(!record.is_complete(3));
    }
}
