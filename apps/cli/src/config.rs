//! Server profile storage.
//!
//! Profiles are stored as one JSON object keyed by profile name, next to
//! metadata keys starting with `_`:
//!
//! ```json
//! {
//!   "production": { "host": "maps.example.org", "username": "...", "password": "...", "port": 443 },
//!   "_selected_server": "production"
//! }
//! ```
//!
//! Default location: `~/.qcarta_uploader_config.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use qcarta_protocol::ServerProfile;
use serde_json::{Map, Value};

const CONFIG_FILE_NAME: &str = ".qcarta_uploader_config.json";
const SELECTED_KEY: &str = "_selected_server";

/// Saved server profiles and the default selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub servers: BTreeMap<String, ServerProfile>,
    pub selected: Option<String>,
}

impl Config {
    /// Loads the file at `path`; a missing file is an empty configuration.
    ///
    /// A selection naming a profile that no longer exists is dropped.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        tracing::debug!(path = %path.display(), servers = config.servers.len(), "configuration loaded");
        Ok(config)
    }

    /// Writes the configuration to `path`, readable by the owner only.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.to_json()?)?;
        std::fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    fn from_json(content: &str) -> anyhow::Result<Self> {
        let root: Map<String, Value> = serde_json::from_str(content)?;
        let mut config = Self::default();

        for (key, value) in root {
            if key == SELECTED_KEY {
                config.selected = value.as_str().map(str::to_string);
            } else if key.starts_with('_') {
                continue;
            } else {
                let profile: ServerProfile = serde_json::from_value(value)
                    .with_context(|| format!("server '{key}'"))?;
                config.servers.insert(key, profile);
            }
        }

        if let Some(name) = &config.selected
            && !config.servers.contains_key(name)
        {
            tracing::warn!(server = %name, "selected server no longer exists");
            config.selected = None;
        }
        Ok(config)
    }

    fn to_json(&self) -> anyhow::Result<Value> {
        let mut root = Map::new();
        for (name, profile) in &self.servers {
            root.insert(name.clone(), serde_json::to_value(profile)?);
        }
        root.insert(
            SELECTED_KEY.into(),
            self.selected.clone().map_or(Value::Null, Value::String),
        );
        Ok(Value::Object(root))
    }

    /// Adds a profile, or replaces `previous` with it.
    ///
    /// Renaming moves the selection along. Adding under a name that another
    /// profile already uses fails.
    pub fn upsert(
        &mut self,
        name: &str,
        profile: ServerProfile,
        previous: Option<&str>,
    ) -> anyhow::Result<()> {
        if name.is_empty() || name.starts_with('_') {
            bail!("invalid server name '{name}'");
        }
        if previous != Some(name) && self.servers.contains_key(name) {
            bail!("server '{name}' already exists");
        }

        if let Some(old) = previous
            && old != name
        {
            if self.servers.remove(old).is_none() {
                bail!("unknown server '{old}'");
            }
            if self.selected.as_deref() == Some(old) {
                self.selected = Some(name.to_string());
            }
        }

        self.servers.insert(name.to_string(), profile);
        Ok(())
    }

    /// Removes a profile. Returns `false` if it did not exist.
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.servers.remove(name).is_some();
        if removed && self.selected.as_deref() == Some(name) {
            self.selected = None;
        }
        removed
    }

    /// Makes `name` the default profile.
    pub fn select(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.servers.contains_key(name) {
            bail!("unknown server '{name}'");
        }
        self.selected = Some(name.to_string());
        Ok(())
    }

    /// Picks the profile to use: `name` if given, else the selected one,
    /// else the only one configured.
    pub fn resolve(&self, name: Option<&str>) -> anyhow::Result<(&str, &ServerProfile)> {
        let name = match name.or(self.selected.as_deref()) {
            Some(name) => name,
            None if self.servers.len() == 1 => {
                self.servers.keys().next().map(String::as_str).unwrap_or_default()
            }
            None if self.servers.is_empty() => {
                bail!("no server configured, add one with `qcarta server add`")
            }
            None => bail!("several servers configured, pick one with --server or `qcarta server use`"),
        };
        self.servers
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .with_context(|| format!("unknown server '{name}'"))
    }
}

/// Default configuration file path.
pub fn default_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(host: &str) -> ServerProfile {
        ServerProfile::new(host, "ann@example.org", "pw", 443)
    }

    #[test]
    fn missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&tmp.path().join("none.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let mut config = Config::default();
        config.upsert("prod", profile("maps.example.org"), None).unwrap();
        config.upsert("test", profile("localhost"), None).unwrap();
        config.select("prod").unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["_selected_server"], "prod");
        assert_eq!(raw["prod"]["host"], "maps.example.org");
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        Config::default().save(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn parses_plugin_format() {
        let json = r#"{
            "office": {"host": "10.0.0.5", "username": "u", "password": "p", "port": "8080"},
            "cloud": {"host": "maps.example.org", "username": "u", "password": "p"},
            "_selected_server": "gone",
            "_other": 1
        }"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers["office"].port, 8080);
        assert_eq!(config.servers["cloud"].port, 443);
        assert_eq!(config.selected, None);
    }

    #[test]
    fn null_selection() {
        let config = Config::from_json(r#"{"_selected_server": null}"#).unwrap();
        assert!(config.servers.is_empty());
        assert_eq!(config.selected, None);
    }

    #[test]
    fn rename_moves_selection() {
        let mut config = Config::default();
        config.upsert("old", profile("a"), None).unwrap();
        config.select("old").unwrap();

        config.upsert("new", profile("b"), Some("old")).unwrap();
        assert!(!config.servers.contains_key("old"));
        assert_eq!(config.servers["new"].host, "b");
        assert_eq!(config.selected.as_deref(), Some("new"));
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut config = Config::default();
        config.upsert("a", profile("a"), None).unwrap();
        config.upsert("b", profile("b"), None).unwrap();
        assert!(config.upsert("a", profile("x"), None).is_err());
        assert!(config.upsert("a", profile("x"), Some("b")).is_err());
        assert!(config.upsert("a", profile("x"), Some("a")).is_ok());
        assert_eq!(config.servers["a"].host, "x");
    }

    #[test]
    fn metadata_names_rejected() {
        let mut config = Config::default();
        assert!(config.upsert("_selected_server", profile("a"), None).is_err());
        assert!(config.upsert("", profile("a"), None).is_err());
    }

    #[test]
    fn remove_clears_selection() {
        let mut config = Config::default();
        config.upsert("a", profile("a"), None).unwrap();
        config.select("a").unwrap();
        assert!(config.remove("a"));
        assert!(!config.remove("a"));
        assert_eq!(config.selected, None);
    }

    #[test]
    fn resolve_rules() {
        let mut config = Config::default();
        assert!(config.resolve(None).is_err());

        config.upsert("a", profile("a"), None).unwrap();
        assert_eq!(config.resolve(None).unwrap().0, "a");

        config.upsert("b", profile("b"), None).unwrap();
        assert!(config.resolve(None).is_err());
        assert_eq!(config.resolve(Some("b")).unwrap().1.host, "b");

        config.select("b").unwrap();
        assert_eq!(config.resolve(None).unwrap().0, "b");
        assert!(config.resolve(Some("zzz")).is_err());
    }
}
