use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "I/O error: {e}"),
            SettingsError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        SettingsError::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Json(e)
    }
}

// ── Compiler settings ────────────────────────────────────────────

/// Options for the `dialoguec` host, read from an optional JSON file.
/// Command-line flags take precedence over every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub version: u32,
    /// Key prefix for translated strings. None = the input file stem.
    pub i18n_prefix: Option<String>,
    /// Extension used when no output path is given.
    pub output_extension: String,
    /// Whether the `<prefix>.csv` sidecar is written next to the output.
    pub emit_translations: bool,
}

const SETTINGS_VERSION: u32 = 1;
const DEFAULT_EXTENSION: &str = "dlg";

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            i18n_prefix: None,
            output_extension: DEFAULT_EXTENSION.to_string(),
            emit_translations: true,
        }
    }
}

impl CompilerSettings {
    pub fn prefix_for(&self, input: &Path) -> String {
        self.i18n_prefix.clone().unwrap_or_else(|| {
            input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    pub fn output_for(&self, input: &Path) -> PathBuf {
        input.with_extension(&self.output_extension)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SettingsError> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SettingsError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_settings(path: &Path) -> Result<CompilerSettings, SettingsError> {
    read_json(path)
}

pub fn save_settings(path: &Path, settings: &CompilerSettings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    write_json(path, settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let dir = std::env::temp_dir().join("dialoguec_test_settings");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("dialoguec.json");

        let settings = CompilerSettings {
            i18n_prefix: Some("town_".into()),
            emit_translations: false,
            ..CompilerSettings::default()
        };
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path).expect("should load");
        assert_eq!(loaded, settings);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = std::env::temp_dir().join("dialoguec_test_partial");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partial.json");
        std::fs::write(&path, r#"{ "output_extension": "bin" }"#).unwrap();

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.output_extension, "bin");
        assert!(loaded.emit_translations);
        assert_eq!(loaded.i18n_prefix, None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bad_json_is_error() {
        let dir = std::env::temp_dir().join("dialoguec_test_bad_json");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_settings(&path), Err(SettingsError::Json(_))));
        assert!(matches!(
            load_settings(&dir.join("missing.json")),
            Err(SettingsError::Io(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_prefix_and_output_defaults() {
        let settings = CompilerSettings::default();
        let input = Path::new("scripts/intro.dsl");
        assert_eq!(settings.prefix_for(input), "intro");
        assert_eq!(settings.output_for(input), PathBuf::from("scripts/intro.dlg"));

        let custom = CompilerSettings {
            i18n_prefix: Some("p".into()),
            ..CompilerSettings::default()
        };
        assert_eq!(custom.prefix_for(input), "p");
    }
}
