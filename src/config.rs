use crate::settings::{KeymapConfig, Settings};
use eyre::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::{fs, path::PathBuf};

pub const APP_NAME: &str = "biderja";

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub keymap: KeymapConfig,
    filepath: PathBuf,
}

impl Config {
    pub fn new() -> Result<Self> {
        let prefix = get_app_data_prefix()?;
        let filepath = prefix.join("configuration.json");

        if filepath.exists() {
            return Self::load_from(filepath);
        }

        // Save initial config if it doesn't exist
        let config = Self {
            settings: Settings::default(),
            keymap: KeymapConfig::default(),
            filepath,
        };
        config.save()?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn filepath(&self) -> &PathBuf {
        &self.filepath
    }

    /// Create a config with custom settings for testing
    pub fn with_settings(settings: Settings, keymap: KeymapConfig) -> Result<Self> {
        let prefix = get_app_data_prefix()?;
        let filepath = prefix.join("test_configuration.json");

        Ok(Self {
            settings,
            keymap,
            filepath,
        })
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<()> {
        let config_json = serde_json::json!({
            "Setting": self.settings,
            "Keymap": self.keymap,
        });

        let config_str = serde_json::to_string_pretty(&config_json)?;

        if let Some(parent) = self.filepath.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.filepath, config_str)?;
        Ok(())
    }

    /// Load configuration from a custom path. Unreadable JSON falls back to
    /// defaults; user values only replace defaults of the same JSON type.
    pub fn load_from(filepath: PathBuf) -> Result<Self> {
        let mut settings = Settings::default();
        let mut keymap = KeymapConfig::default();

        if filepath.exists() {
            let config_str = fs::read_to_string(&filepath)?;
            match serde_json::from_str::<Value>(&config_str) {
                Ok(user_config) => {
                    if let Some(user_settings) =
                        user_config.get("Setting").and_then(Value::as_object)
                    {
                        settings = overlay(&settings, user_settings)?;
                    }
                    if let Some(user_keymap) =
                        user_config.get("Keymap").and_then(Value::as_object)
                    {
                        keymap = overlay(&keymap, user_keymap)?;
                    }
                }
                Err(err) => {
                    log::warn!("ignoring unreadable config {}: {err}", filepath.display());
                }
            }
        }

        Ok(Self {
            settings,
            keymap,
            filepath,
        })
    }
}

fn same_json_type(default: &Value, user: &Value) -> bool {
    match (default, user) {
        (Value::Number(d), Value::Number(u)) => {
            d.is_f64() || (d.is_u64() == u.is_u64() && !u.is_f64())
        }
        (Value::String(_), Value::String(_)) => true,
        (Value::Bool(_), Value::Bool(_)) => true,
        (Value::Array(_), Value::Array(_)) => true,
        (Value::Object(_), Value::Object(_)) => true,
        (Value::Null, _) => true,
        _ => false,
    }
}

/// Apply `user` over the serialized form of `defaults`, key by key.
fn overlay<T>(defaults: &T, user: &Map<String, Value>) -> Result<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let Value::Object(mut merged) = serde_json::to_value(defaults)? else {
        return Ok(defaults.clone());
    };

    for (key, value) in user {
        let Some(default) = merged.get(key) else {
            log::debug!("unknown config key {key}");
            continue;
        };
        if !same_json_type(default, value) {
            log::warn!("config key {key} has the wrong type, keeping default");
            continue;
        }
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value.clone());
        // Reject values that have the right JSON type but no meaning, such as
        // an unknown reading direction.
        if serde_json::from_value::<T>(Value::Object(candidate)).is_ok() {
            merged.insert(key.clone(), value.clone());
        } else {
            log::warn!("config key {key} has an invalid value, keeping default");
        }
    }

    Ok(serde_json::from_value(Value::Object(merged))?)
}

pub fn get_app_data_prefix() -> Result<PathBuf> {
    if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
        let path = PathBuf::from(config_home).join(APP_NAME);
        return Ok(path);
    } else if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home.clone()).join(".config").join(APP_NAME);
        if path.exists() {
            return Ok(path);
        } else {
            return Ok(PathBuf::from(home).join(format!(".{APP_NAME}")));
        }
    } else if let Some(user_profile) = std::env::var_os("USERPROFILE") {
        return Ok(PathBuf::from(user_profile).join(format!(".{APP_NAME}")));
    }

    Err(eyre::eyre!(
        "Could not determine application data directory"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::Language;
    use crate::models::ReadingDirection;
    use std::env;
    use std::sync::{Mutex, OnceLock};
    use tempfile::tempdir;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_test_environment(dir: &tempfile::TempDir) {
        unsafe {
            env::set_var("XDG_CONFIG_HOME", dir.path());
            env::remove_var("HOME");
            env::remove_var("USERPROFILE");
        }
    }

    fn restore_test_environment(
        original_home: Option<std::ffi::OsString>,
        original_xdg_config_home: Option<std::ffi::OsString>,
        original_userprofile: Option<std::ffi::OsString>,
    ) {
        unsafe {
            if let Some(home) = original_home {
                env::set_var("HOME", home);
            } else {
                env::remove_var("HOME");
            }
            if let Some(xdg) = original_xdg_config_home {
                env::set_var("XDG_CONFIG_HOME", xdg);
            } else {
                env::remove_var("XDG_CONFIG_HOME");
            }
            if let Some(profile) = original_userprofile {
                env::set_var("USERPROFILE", profile);
            } else {
                env::remove_var("USERPROFILE");
            }
        }
    }

    #[test]
    fn test_config_new_no_existing_file() -> Result<()> {
        let _env_lock = lock_env();
        let original_home = env::var_os("HOME");
        let original_xdg_config_home = env::var_os("XDG_CONFIG_HOME");
        let original_userprofile = env::var_os("USERPROFILE");

        let dir = tempdir()?;
        set_test_environment(&dir);

        let config = Config::new()?;
        let expected_filepath = dir.path().join("biderja").join("configuration.json");

        assert_eq!(config.filepath, expected_filepath);
        assert!(expected_filepath.exists());

        let config_str = fs::read_to_string(&expected_filepath)?;
        let json_value: Value = serde_json::from_str(&config_str)?;

        let loaded_settings: Settings = serde_json::from_value(json_value["Setting"].clone())?;
        assert_eq!(loaded_settings, Settings::default());

        let loaded_keymap: KeymapConfig = serde_json::from_value(json_value["Keymap"].clone())?;
        assert_eq!(loaded_keymap, KeymapConfig::default());

        restore_test_environment(original_home, original_xdg_config_home, original_userprofile);
        Ok(())
    }

    #[test]
    fn test_config_new_with_existing_file() -> Result<()> {
        let _env_lock = lock_env();
        let original_home = env::var_os("HOME");
        let original_xdg_config_home = env::var_os("XDG_CONFIG_HOME");
        let original_userprofile = env::var_os("USERPROFILE");

        let dir = tempdir()?;
        set_test_environment(&dir);

        let config_path = dir.path().join("biderja").join("configuration.json");
        fs::create_dir_all(config_path.parent().unwrap())?;

        let config_json = serde_json::json!({
            "Setting": {
                "mouse_support": true,
                "reading_direction": "ltr",
                "api_base_url": "http://127.0.0.1:9000/api"
            },
            "Keymap": {
                "quit": "Q",
                "help": "H"
            }
        });
        fs::write(&config_path, serde_json::to_string(&config_json)?)?;

        let config = Config::new()?;
        assert!(config.settings.mouse_support);
        assert_eq!(config.settings.reading_direction, ReadingDirection::Ltr);
        assert_eq!(config.settings.api_base_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.keymap.quit, "Q");
        assert_eq!(config.keymap.help, "H");
        assert_eq!(config.keymap.next_page, "l");

        restore_test_environment(original_home, original_xdg_config_home, original_userprofile);
        Ok(())
    }

    #[test]
    fn test_get_app_data_prefix() {
        let _env_lock = lock_env();
        let original_home = env::var_os("HOME");
        let original_xdg_config_home = env::var_os("XDG_CONFIG_HOME");
        let original_userprofile = env::var_os("USERPROFILE");

        unsafe {
            let xdg_dir = tempdir().unwrap();
            env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
            env::remove_var("HOME");
            env::remove_var("USERPROFILE");
            assert_eq!(get_app_data_prefix().unwrap(), xdg_dir.path().join("biderja"));

            let home_dir = tempdir().unwrap();
            let config_dir = home_dir.path().join(".config").join("biderja");
            fs::create_dir_all(&config_dir).unwrap();
            env::set_var("HOME", home_dir.path());
            env::remove_var("XDG_CONFIG_HOME");
            assert_eq!(get_app_data_prefix().unwrap(), config_dir);

            let bare_home = tempdir().unwrap();
            env::set_var("HOME", bare_home.path());
            assert_eq!(get_app_data_prefix().unwrap(), bare_home.path().join(".biderja"));

            let profile_dir = tempdir().unwrap();
            env::set_var("USERPROFILE", profile_dir.path());
            env::remove_var("HOME");
            assert_eq!(
                get_app_data_prefix().unwrap(),
                profile_dir.path().join(".biderja")
            );

            env::remove_var("USERPROFILE");
            assert!(get_app_data_prefix().is_err());
        }

        restore_test_environment(original_home, original_xdg_config_home, original_userprofile);
    }

    #[test]
    fn test_config_save_and_load() -> Result<()> {
        let _env_lock = lock_env();
        let original_home = env::var_os("HOME");
        let original_xdg_config_home = env::var_os("XDG_CONFIG_HOME");
        let original_userprofile = env::var_os("USERPROFILE");

        let dir = tempdir()?;
        set_test_environment(&dir);

        let mut settings = Settings::default();
        settings.language = Language::En;
        settings.cache_ttl_secs = 42;
        let mut keymap = KeymapConfig::default();
        keymap.library = "r".to_string();

        let config = Config::with_settings(settings, keymap)?;
        config.save()?;
        assert!(config.filepath().exists());

        let loaded = Config::load_from(config.filepath().clone())?;
        assert_eq!(loaded.settings.language, Language::En);
        assert_eq!(loaded.settings.cache_ttl_secs, 42);
        assert_eq!(loaded.keymap.library, "r");

        restore_test_environment(original_home, original_xdg_config_home, original_userprofile);
        Ok(())
    }

    #[test]
    fn test_config_invalid_json_falls_back_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config_path = dir.path().join("invalid_config.json");
        fs::write(&config_path, "{ invalid json }")?;

        let config = Config::load_from(config_path)?;
        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.keymap, KeymapConfig::default());

        let empty_path = dir.path().join("empty.json");
        fs::write(&empty_path, "")?;
        let config = Config::load_from(empty_path)?;
        assert_eq!(config.settings, Settings::default());
        Ok(())
    }

    #[test]
    fn test_config_wrong_types_keep_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config_path = dir.path().join("typed.json");
        let config_json = serde_json::json!({
            "Setting": {
                "mouse_support": "yes",
                "cache_ttl_secs": -5,
                "request_timeout_secs": 30,
                "reading_direction": "ttb",
                "language": "en",
                "not_a_setting": 1
            },
            "Keymap": {
                "quit": 7,
                "help": "H"
            }
        });
        fs::write(&config_path, serde_json::to_string(&config_json)?)?;

        let config = Config::load_from(config_path)?;
        let defaults = Settings::default();
        assert_eq!(config.settings.mouse_support, defaults.mouse_support);
        assert_eq!(config.settings.cache_ttl_secs, defaults.cache_ttl_secs);
        assert_eq!(config.settings.request_timeout_secs, 30);
        assert_eq!(config.settings.reading_direction, ReadingDirection::Rtl);
        assert_eq!(config.settings.language, Language::En);
        assert_eq!(config.keymap.quit, "q");
        assert_eq!(config.keymap.help, "H");
        Ok(())
    }

    #[test]
    fn test_config_section_only_files() -> Result<()> {
        let dir = tempdir()?;
        let settings_only = dir.path().join("settings_only.json");
        fs::write(
            &settings_only,
            serde_json::to_string(&serde_json::json!({
                "Setting": { "show_progress_indicator": false }
            }))?,
        )?;
        let config = Config::load_from(settings_only)?;
        assert!(!config.settings.show_progress_indicator);
        assert_eq!(config.keymap, KeymapConfig::default());

        let keymap_only = dir.path().join("keymap_only.json");
        fs::write(
            &keymap_only,
            serde_json::to_string(&serde_json::json!({
                "Keymap": { "quit": "Q" }
            }))?,
        )?;
        let config = Config::load_from(keymap_only)?;
        assert_eq!(config.keymap.quit, "Q");
        assert_eq!(config.settings, Settings::default());
        Ok(())
    }
}
