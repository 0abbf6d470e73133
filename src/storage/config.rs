use std::path::Path;

use crate::core::error::UpdateError;
use crate::models::settings::UpdaterSettings;

/// Reads settings from a JSON file, falling back to defaults when the file
/// is missing or malformed. Settings are never required for the updater to
/// operate.
pub fn load_settings(path: &Path) -> UpdaterSettings {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return UpdaterSettings::default(),
    };
    match serde_json::from_str(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("ignoring malformed settings at {}: {}", path.display(), e);
            UpdaterSettings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &UpdaterSettings) -> Result<(), UpdateError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load_settings(Path::new("/nonexistent/updater.json"));
        assert_eq!(settings.schema_version, 1);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("updater.json");

        let mut settings = UpdaterSettings::default();
        settings.download.max_retries = 7;
        save_settings(&path, &settings).expect("save");

        let loaded = load_settings(&path);
        assert_eq!(loaded.download.max_retries, 7);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("updater.json");
        std::fs::write(&path, "{ not json").expect("write");

        let settings = load_settings(&path);
        assert_eq!(settings.download.max_retries, 3);
    }
}
