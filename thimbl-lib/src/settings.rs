use crate::error::Error;
use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client settings. Stored as `settings.json` in the profile's base
/// directory; any field that is missing takes its default.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    // Network settings
    pub finger_port: u16,
    pub timeout_secs: u64,
    pub max_response_bytes: usize,
    pub max_plan_bytes: usize,

    // Follow list policy. When false, following an address already on the
    // list renames the existing entry instead of adding another.
    pub allow_duplicate_follows: bool,

    pub daemon: DaemonSettings,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            finger_port: crate::FINGER_PORT,
            timeout_secs: 5,
            max_response_bytes: 1024 * 1024,
            max_plan_bytes: 256 * 1024,
            allow_duplicate_follows: true,
            daemon: DaemonSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the profile, falling back to defaults if there is
    /// no settings file.
    pub fn load(profile: &Profile) -> Result<Settings, Error> {
        let path = profile.settings_file();
        if !path.exists() {
            return Ok(Settings::default());
        }
        Settings::load_from(&path)
    }

    /// Load settings from an explicit file, which must exist
    pub fn load_from(path: &Path) -> Result<Settings, Error> {
        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the finger daemon
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonSettings {
    pub bind_address: String,
    pub port: u16,

    /// Directory holding each user's home directory. When unset, each
    /// account's home comes from the system user database.
    pub homes_root: Option<PathBuf>,

    /// Name of the plan file inside a home directory
    pub plan_filename: String,

    pub request_timeout_secs: u64,
}

impl Default for DaemonSettings {
    fn default() -> DaemonSettings {
        DaemonSettings {
            bind_address: "0.0.0.0".to_owned(),
            port: crate::FINGER_PORT,
            homes_root: None,
            plan_filename: crate::PLAN_FILENAME.to_owned(),
            request_timeout_secs: 10,
        }
    }
}

impl DaemonSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_take_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"timeout_secs": 2, "daemon": {"port": 7979}}"#).unwrap();
        assert_eq!(settings.timeout(), Duration::from_secs(2));
        assert_eq!(settings.finger_port, 79);
        assert!(settings.allow_duplicate_follows);
        assert_eq!(settings.daemon.port, 7979);
        assert_eq!(settings.daemon.plan_filename, ".plan");
        assert_eq!(settings.daemon.homes_root, None);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let profile = Profile::in_dir(dir.path(), dir.path().join(".plan")).unwrap();
        assert_eq!(Settings::load(&profile).unwrap(), Settings::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thingerd.json");
        std::fs::write(&path, r#"{"daemon": {"homes_root": "/srv/homes"}}"#).unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.daemon.homes_root, Some(PathBuf::from("/srv/homes")));
        assert_eq!(settings.daemon.port, 79);

        assert!(Settings::load_from(&dir.path().join("missing.json")).is_err());
    }
}
