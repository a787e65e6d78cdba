//! Persisted per-channel banned phrases.
//!
//! The whole map lives in memory and is rewritten to a single JSON file after
//! every mutation. Channel names and phrases are stored lowercased.

use anyhow::{Context, Result, ensure};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

type Phrases = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

#[derive(Clone)]
pub struct ModerationStore {
    path: PathBuf,
    phrases: Arc<Mutex<Phrases>>,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

impl ModerationStore {
    /// Loads the store from `path`, starting empty if the file does not exist yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let phrases: Phrases = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read moderation store: {}", path.display()))?;
            let loaded: Phrases = serde_json::from_str(&raw).with_context(|| {
                format!("Failed to parse moderation store: {}", path.display())
            })?;
            // Files edited by hand may carry mixed case or duplicates.
            let mut phrases = Phrases::new();
            for (channel, list) in loaded {
                let entry: &mut Vec<String> = phrases.entry(normalize(&channel)).or_default();
                for phrase in list {
                    let phrase = normalize(&phrase);
                    if !phrase.is_empty() && !entry.contains(&phrase) {
                        entry.push(phrase);
                    }
                }
            }
            phrases
        } else {
            debug!("No moderation store at {}, starting empty", path.display());
            Phrases::new()
        };

        debug!(channels = phrases.len(), "Loaded moderation store");
        Ok(Self {
            path,
            phrases: Arc::new(Mutex::new(phrases)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn add(&self, channel: &str, phrase: &str) -> Result<AddOutcome> {
        let (channel, phrase) = (normalize(channel), normalize(phrase));
        // An empty phrase would match every message.
        ensure!(!phrase.is_empty(), "Banned phrase must not be empty");
        let mut phrases = self.phrases.lock().await;
        let entry = phrases.entry(channel.clone()).or_default();
        if entry.contains(&phrase) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        entry.push(phrase.clone());

        if let Err(e) = self.persist(&phrases) {
            // Keep memory and disk in agreement.
            if let Some(entry) = phrases.get_mut(&channel) {
                entry.retain(|p| *p != phrase);
            }
            return Err(e);
        }
        info!(%channel, %phrase, "Banned phrase added");
        Ok(AddOutcome::Added)
    }

    pub async fn remove(&self, channel: &str, phrase: &str) -> Result<RemoveOutcome> {
        let (channel, phrase) = (normalize(channel), normalize(phrase));
        let mut phrases = self.phrases.lock().await;
        let Some(entry) = phrases.get_mut(&channel) else {
            return Ok(RemoveOutcome::NotPresent);
        };
        let Some(index) = entry.iter().position(|p| *p == phrase) else {
            return Ok(RemoveOutcome::NotPresent);
        };
        entry.remove(index);

        if let Err(e) = self.persist(&phrases) {
            if let Some(entry) = phrases.get_mut(&channel) {
                entry.insert(index, phrase);
            }
            return Err(e);
        }
        info!(%channel, %phrase, "Banned phrase removed");
        Ok(RemoveOutcome::Removed)
    }

    /// Phrases for `channel` in insertion order.
    pub async fn list(&self, channel: &str) -> Vec<String> {
        self.phrases
            .lock()
            .await
            .get(&normalize(channel))
            .cloned()
            .unwrap_or_default()
    }

    /// Writes the full map to a sibling temp file and renames it into place.
    fn persist(&self, phrases: &Phrases) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(phrases).context("Failed to serialize moderation store")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write moderation store: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace moderation store: {}", self.path.display()))?;
        debug!("Persisted moderation store to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ModerationStore {
        ModerationStore::load(dir.path().join("banned_phrases.json")).unwrap()
    }

    #[tokio::test]
    async fn test_add_list_remove() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.list("general").await.is_empty());
        assert_eq!(store.add("general", "foo").await.unwrap(), AddOutcome::Added);
        assert_eq!(store.list("general").await, vec!["foo".to_string()]);

        assert_eq!(
            store.add("general", "foo").await.unwrap(),
            AddOutcome::AlreadyPresent
        );
        assert_eq!(store.list("general").await.len(), 1);

        assert_eq!(
            store.remove("general", "foo").await.unwrap(),
            RemoveOutcome::Removed
        );
        assert!(store.list("general").await.is_empty());
        assert_eq!(
            store.remove("general", "foo").await.unwrap(),
            RemoveOutcome::NotPresent
        );
        assert_eq!(
            store.remove("random", "foo").await.unwrap(),
            RemoveOutcome::NotPresent
        );
    }

    #[tokio::test]
    async fn test_blank_phrase_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let err = store.add("general", "   ").await.unwrap_err();
        assert_eq!(err.to_string(), "Banned phrase must not be empty");
        assert!(store.add("general", "").await.is_err());
        assert!(store.list("general").await.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_case_insensitive_and_ordered() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.add("General", "Moon Soon").await.unwrap();
        store.add("general", "wagmi").await.unwrap();
        assert_eq!(
            store.add("GENERAL", "moon soon").await.unwrap(),
            AddOutcome::AlreadyPresent
        );
        assert_eq!(
            store.list("general").await,
            vec!["moon soon".to_string(), "wagmi".to_string()]
        );
        assert!(store.list("other").await.is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("banned_phrases.json");
        {
            let store = ModerationStore::load(&path).unwrap();
            store.add("general", "foo").await.unwrap();
            store.add("general", "bar").await.unwrap();
            store.add("trading", "pump").await.unwrap();
            store.remove("general", "foo").await.unwrap();
        }
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = ModerationStore::load(&path).unwrap();
        assert_eq!(reloaded.list("general").await, vec!["bar".to_string()]);
        assert_eq!(reloaded.list("trading").await, vec!["pump".to_string()]);
    }

    #[tokio::test]
    async fn test_load_normalizes_hand_edited_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("banned_phrases.json");
        fs::write(&path, r#"{"General": ["Foo", "foo", "BAR"]}"#).unwrap();

        let store = ModerationStore::load(&path).unwrap();
        assert_eq!(
            store.list("general").await,
            vec!["foo".to_string(), "bar".to_string()]
        );
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("banned_phrases.json");
        fs::write(&path, "not json").unwrap();
        assert!(ModerationStore::load(&path).is_err());
    }
}
