use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use relay_core::readiness::RetryPolicy;

use crate::protocol::{ContainerStyle, EditorOptions, LoaderConfig};

/// Adapter settings, read from `~/.config/relay/settings.json`.
///
/// `#[serde(default)]` fills in any field missing from the file, so partial
/// settings files are valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    // ── Timing ───────────────────────────────────────────────────────────
    pub debounce_ms: u64,
    pub mount_poll_interval_ms: u64,
    pub mount_max_attempts: u32,

    // ── Library ──────────────────────────────────────────────────────────
    pub library_base_url: String,

    // ── Layout ───────────────────────────────────────────────────────────
    pub min_height_px: u32,
    pub font_size: u32,
    pub minimap_enabled: bool,
    pub automatic_layout: bool,
    pub scroll_beyond_last_line: bool,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        AdapterSettings {
            debounce_ms: 300,
            mount_poll_interval_ms: 100,
            mount_max_attempts: 50,

            library_base_url: String::from("rwt-resources/monaco"),

            min_height_px: 100,
            font_size: 14,
            minimap_enabled: true,
            automatic_layout: true,
            scroll_beyond_last_line: false,
        }
    }
}

impl AdapterSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn mount_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.mount_poll_interval_ms),
            self.mount_max_attempts,
        )
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            base_url: self.library_base_url.clone(),
        }
    }

    pub fn container_style(&self) -> ContainerStyle {
        ContainerStyle::fill_parent(self.min_height_px)
    }

    /// Creation-time layout options; `read_only` is filled in per adapter.
    pub fn layout_options(&self) -> EditorOptions {
        EditorOptions {
            read_only: None,
            automatic_layout: Some(self.automatic_layout),
            scroll_beyond_last_line: Some(self.scroll_beyond_last_line),
            minimap_enabled: Some(self.minimap_enabled),
            font_size: Some(self.font_size),
        }
    }
}

pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("relay").join("settings.json"))
}

/// Load settings from the default location, falling back to defaults when the
/// file is missing or unreadable.
pub fn load() -> AdapterSettings {
    let Some(path) = settings_path() else {
        return AdapterSettings::default();
    };
    if !path.is_file() {
        return AdapterSettings::default();
    }
    match load_from(&path) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("{}; using default settings", e);
            AdapterSettings::default()
        }
    }
}

pub fn load_from(path: &Path) -> Result<AdapterSettings, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read settings {:?}: {}", path, e))?;
    serde_json::from_str(&contents).map_err(|e| format!("Failed to parse settings {:?}: {}", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_widget_timings() {
        let settings = AdapterSettings::default();
        assert_eq!(settings.debounce(), Duration::from_millis(300));
        assert_eq!(
            settings.mount_policy(),
            RetryPolicy::new(Duration::from_millis(100), 50)
        );
        assert_eq!(settings.loader_config().vs_path(), "rwt-resources/monaco/vs");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "debounce_ms": 50, "font_size": 12 }"#).unwrap();

        let settings = load_from(&path).unwrap();
        assert_eq!(settings.debounce_ms, 50);
        assert_eq!(settings.font_size, 12);
        assert_eq!(settings.mount_max_attempts, 50);
        assert!(settings.minimap_enabled);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse settings"), "{}", err);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.starts_with("Failed to read settings"), "{}", err);
    }

    #[test]
    fn layout_options_leave_read_only_unset() {
        let options = AdapterSettings::default().layout_options();
        assert_eq!(options.read_only, None);
        assert_eq!(options.font_size, Some(14));
        assert_eq!(options.scroll_beyond_last_line, Some(false));
    }
}
