// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader library settings.
//!
//! Stored as RON next to the library so every artist resolves the same
//! folder, extension and skip lists.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "shader_library.ron";

/// Configuration shared by export, load and the library index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Format version
    pub version: u32,
    /// Folder holding one file per shading network
    pub library_root: PathBuf,
    /// Extension of network files, without the dot
    pub extension: String,
    /// Default materials that are never exported
    pub ignored_shaders: Vec<String>,
    /// Attributes never written back on reconstruction
    pub ignored_attributes: Vec<String>,
    /// Free-text notes attribute, reset before every reconstruction
    pub notes_attribute: String,
    /// Suffix appended to a material name to name its shading group
    pub shading_group_suffix: String,
    /// Default materials and shading groups never deleted by an unload
    pub protected_nodes: Vec<String>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            library_root: PathBuf::from("ShadersLibrary"),
            extension: "sshader".to_string(),
            ignored_shaders: vec![
                "particleCloud1".to_string(),
                "shaderGlow1".to_string(),
                "defaultColorMgtGlobals".to_string(),
                "lambert1".to_string(),
            ],
            ignored_attributes: vec!["computedFileTextureNamePattern".to_string()],
            notes_attribute: "notes".to_string(),
            shading_group_suffix: "SG".to_string(),
            protected_nodes: vec![
                "lambert1".to_string(),
                "particleCloud1".to_string(),
                "initialShadingGroup".to_string(),
                "initialParticleSE".to_string(),
            ],
        }
    }
}

impl LibrarySettings {
    /// Create default settings for a library folder
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
            ..Default::default()
        }
    }

    /// Get the settings file path inside a directory
    pub fn settings_file_path(dir: &Path) -> PathBuf {
        dir.join(SETTINGS_FILE_NAME)
    }

    /// Whether a material is excluded from export
    pub fn is_ignored_shader(&self, name: &str) -> bool {
        self.ignored_shaders.iter().any(|s| s == name)
    }

    /// Whether an attribute is excluded from reconstruction
    pub fn is_ignored_attribute(&self, name: &str) -> bool {
        self.ignored_attributes.iter().any(|a| a == name)
    }

    /// Whether a node must survive an unload
    pub fn is_protected(&self, name: &str) -> bool {
        self.protected_nodes.iter().any(|n| n == name)
    }

    /// Shading group name for a material
    pub fn shading_group_name(&self, material: &str) -> String {
        format!("{material}{}", self.shading_group_suffix)
    }

    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = ron::from_str(&contents)?;
        if settings.version > SETTINGS_FORMAT_VERSION {
            tracing::warn!(
                "Settings {:?} use format version {}, newer than supported {}",
                path,
                settings.version,
                SETTINGS_FORMAT_VERSION
            );
        }
        Ok(settings)
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let ron_str = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, ron_str).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Error loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Filesystem failure
    #[error("IO error on {path:?}: {source}")]
    Io {
        /// Settings file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Invalid RON
    #[error("Invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization failure
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = LibrarySettings::default();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert_eq!(settings.extension, "sshader");
        assert!(settings.is_ignored_shader("lambert1"));
        assert!(settings.is_ignored_attribute("computedFileTextureNamePattern"));
        assert_eq!(settings.shading_group_name("Rock01"), "Rock01SG");
        assert!(settings.is_protected("initialShadingGroup"));
        assert!(!settings.is_protected("Rock01"));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = LibrarySettings::settings_file_path(dir.path());

        let mut settings = LibrarySettings::new(dir.path().join("shaders"));
        settings.extension = "json".to_string();
        settings.save(&path).unwrap();

        let loaded = LibrarySettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: LibrarySettings = ron::from_str("(extension: \"shd\")").unwrap();
        assert_eq!(settings.extension, "shd");
        assert_eq!(settings.notes_attribute, "notes");
    }
}
