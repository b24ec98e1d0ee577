//! Settings file handling

use shared::settings::AppSettings;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub fn config_path() -> Option<PathBuf> {
    if let Some(proj) = directories::ProjectDirs::from("com.local", "TutorBot", "TutorBot") {
        let p = proj.config_dir().join("settings.json");
        let _ = fs::create_dir_all(proj.config_dir());
        Some(p)
    } else {
        None
    }
}

/// Load settings, falling back to defaults. The flag is true on a fresh install.
pub fn load_settings_or_default() -> (AppSettings, bool) {
    match config_path() {
        Some(path) => load_settings_from(&path),
        None => (AppSettings::default(), true),
    }
}

pub fn load_settings_from(path: &Path) -> (AppSettings, bool) {
    if path.exists() {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<AppSettings>(&bytes) {
                Ok(settings) => return (settings, false),
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable settings"),
            },
            Err(e) => warn!(path = %path.display(), error = %e, "Could not read settings"),
        }
        return (AppSettings::default(), false);
    }
    (AppSettings::default(), true)
}

pub fn save_settings(settings: &AppSettings) {
    if let Some(path) = config_path() {
        save_settings_to(&path, settings);
    }
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) {
    match serde_json::to_vec_pretty(settings) {
        Ok(bytes) => match fs::write(path, bytes) {
            Ok(()) => info!(path = %path.display(), "Saved settings"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not write settings"),
        },
        Err(e) => warn!(error = %e, "Could not encode settings"),
    }
}
