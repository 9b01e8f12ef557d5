use crate::{anyhow, Result};
use chrono::{DateTime, Utc};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const MAX_PROFILES: usize = 20;
pub const PROFILES_PATH_ENV: &str = "LLM_HW_CALC_PROFILES";
pub const DEFAULT_PROFILES_FILE: &str = "llm_hw_calc_profiles.json";
const DEFAULT_NOTE: &str = "Saved locally";

/// Named RAM + bandwidth pair. Applying one switches bandwidth to manual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub id: String,
    pub name: String,
    #[serde(rename = "ramGiB")]
    pub ram_gib: f64,
    #[serde(rename = "bandwidthGBs")]
    pub bandwidth_gbs: f64,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl HardwareProfile {
    pub fn new(name: &str, ram_gib: f64, bandwidth_gbs: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            ram_gib,
            bandwidth_gbs,
            note: DEFAULT_NOTE.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn note(mut self, note: &str) -> Self {
        self.note = note.to_string();
        self
    }
}

/// Most-recent-first list of profiles kept in one JSON file. Every write replaces
/// the whole file, so concurrent writers race and the last one wins.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub path: PathBuf,
}

impl ProfileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path from `LLM_HW_CALC_PROFILES` (a `.env` file is honored), else the default
    /// file name in the working directory.
    pub fn from_env() -> Self {
        dotenv().ok();
        match dotenv::var(PROFILES_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::new(path.trim()),
            _ => Self::new(DEFAULT_PROFILES_FILE),
        }
    }

    /// Never fails: a missing, unreadable or malformed file reads as no profiles.
    /// Inside a valid array, entries that do not decode are dropped one by one so a
    /// single bad record never takes the others with it.
    pub fn load(&self) -> Vec<HardwareProfile> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not read profiles");
                return Vec::new();
            }
        };
        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "profiles file is not an array");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring malformed profiles file"
                );
                return Vec::new();
            }
        };
        entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                match serde_json::from_value::<HardwareProfile>(entry) {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        tracing::warn!(index, error = %e, "skipping malformed profile entry");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn write_all(&self, profiles: &[HardwareProfile]) -> Result<()> {
        let json = serde_json::to_string_pretty(profiles)?;
        std::fs::write(&self.path, json)
            .map_err(|e| anyhow!("Failed to write profiles `{}`: {e}", self.path.display()))
    }

    /// Prepends a new profile and keeps the most recent [`MAX_PROFILES`].
    pub fn save(&self, name: &str, ram_gib: f64, bandwidth_gbs: f64) -> Result<HardwareProfile> {
        let profile = HardwareProfile::new(name.trim(), ram_gib, bandwidth_gbs);
        self.insert(profile.clone())?;
        Ok(profile)
    }

    /// Like [`ProfileStore::save`] with a custom note.
    pub fn save_with_note(
        &self,
        name: &str,
        note: &str,
        ram_gib: f64,
        bandwidth_gbs: f64,
    ) -> Result<HardwareProfile> {
        let profile = HardwareProfile::new(name.trim(), ram_gib, bandwidth_gbs).note(note);
        self.insert(profile.clone())?;
        Ok(profile)
    }

    /// Every write path goes through here; a blank name is rejected before the file
    /// is touched.
    pub fn insert(&self, profile: HardwareProfile) -> Result<()> {
        if profile.name.trim().is_empty() {
            return Err(anyhow!("Profile name must not be empty"));
        }
        let mut profiles = self.load();
        profiles.insert(0, profile);
        profiles.truncate(MAX_PROFILES);
        self.write_all(&profiles)?;
        tracing::info!(count = profiles.len(), "saved hardware profile");
        Ok(())
    }

    /// Returns whether a profile with `id` existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut profiles = self.load();
        let before = profiles.len();
        profiles.retain(|profile| profile.id != id);
        if profiles.len() == before {
            return Ok(false);
        }
        self.write_all(&profiles)?;
        Ok(true)
    }

    pub fn find(&self, id: &str) -> Option<HardwareProfile> {
        self.load().into_iter().find(|profile| profile.id == id)
    }
}
