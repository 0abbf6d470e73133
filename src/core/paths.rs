use std::path::PathBuf;

pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TNS_UPDATER_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("touch-n-stars"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// App-private directory holding one artifact per downloaded version.
pub fn downloads_dir() -> PathBuf {
    app_data_dir().join("downloads")
}
