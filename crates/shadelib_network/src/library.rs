// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader library index.
//!
//! The library is a folder holding one network file per material, named
//! after the material: `<library_root>/<name>.<extension>`. The index loads
//! shaders by name at most once per session and exports scene materials back
//! into the folder.

use crate::host::{HostError, SceneGraph};
use crate::network::{NetworkError, ShadingNetwork, Thumbnail};
use crate::reconstruct::Reconstructor;
use crate::report::{Issue, Report};
use crate::settings::{LibrarySettings, SettingsError};
use crate::snapshot::capture;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One network file in the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderLibraryEntry {
    /// Shader name (the root node's name)
    pub name: String,
    /// Network file
    pub file_path: PathBuf,
}

/// Load progress of one shader name during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Never requested
    #[default]
    Unloaded,
    /// Being read and rebuilt
    Loading,
    /// Rebuilt into the scene by this library
    Loaded,
    /// A node of that name already existed
    Skipped,
    /// No file for that name
    NotFound,
    /// The file could not be read
    Failed,
}

/// Result of a by-name load request
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<H> {
    /// The network was rebuilt; logical name to live node
    Loaded(IndexMap<String, H>),
    /// Nothing to do, the shader is already in the scene
    Skipped,
    /// The library has no file for that name
    NotFound,
}

/// Result of exporting one material
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Network file written
    Written {
        /// Material name
        name: String,
        /// File written
        path: PathBuf,
    },
    /// Material is on the ignore list
    Ignored {
        /// Material name
        name: String,
    },
    /// Export failed; details are in the report
    Failed {
        /// Material name
        name: String,
    },
}

/// Index over a shader library folder
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    settings: LibrarySettings,
    reconstructor: Reconstructor,
    states: HashMap<String, LoadState>,
}

impl ShaderLibrary {
    /// Create a library index from settings
    pub fn new(settings: LibrarySettings) -> Self {
        let reconstructor = Reconstructor::new(&settings);
        Self {
            settings,
            reconstructor,
            states: HashMap::new(),
        }
    }

    /// Create a library index from a RON settings file
    pub fn open(settings_path: &Path) -> Result<Self, SettingsError> {
        let settings = LibrarySettings::load(settings_path)?;
        tracing::info!("Opened shader library at {:?}", settings.library_root);
        Ok(Self::new(settings))
    }

    /// Library settings
    pub fn settings(&self) -> &LibrarySettings {
        &self.settings
    }

    /// Library folder
    pub fn root(&self) -> &Path {
        &self.settings.library_root
    }

    /// Network file for a shader name
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.settings
            .library_root
            .join(format!("{name}.{}", self.settings.extension))
    }

    /// Load state of a shader name in this session
    pub fn state(&self, name: &str) -> LoadState {
        self.states.get(name).copied().unwrap_or_default()
    }

    /// Forget every load state, starting a new session
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Forget the load state of one name
    ///
    /// Used after its nodes were removed from the scene, so the next request
    /// loads it again.
    pub fn forget(&mut self, name: &str) {
        self.states.remove(name);
    }

    /// All network files in the library folder, sorted by name
    pub fn entries(&self) -> Result<Vec<ShaderLibraryEntry>, NetworkError> {
        let root = self.root();
        let io_error = |source| NetworkError::Io {
            path: root.to_path_buf(),
            source,
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(root).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if !path.is_file() {
                continue;
            }
            let matches_extension = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == self.settings.extension);
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if matches_extension {
                entries.push(ShaderLibraryEntry {
                    name: name.to_string(),
                    file_path: path.clone(),
                });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Read the network stored for a shader name
    pub fn read(&self, name: &str) -> Result<ShadingNetwork, NetworkError> {
        ShadingNetwork::read(&self.path_for(name))
    }

    /// Rebuild a shader by name unless the scene already has it
    ///
    /// A name already loaded or skipped in this session is skipped again
    /// without touching the scene. A missing file is not an error.
    pub fn load_if_absent<S>(
        &mut self,
        name: &str,
        scene: &mut S,
        report: &mut Report,
    ) -> Result<LoadOutcome<S::Handle>, NetworkError>
    where
        S: SceneGraph + ?Sized,
    {
        if matches!(self.state(name), LoadState::Loaded | LoadState::Skipped) {
            tracing::debug!("Shader {} already handled this session", name);
            return Ok(LoadOutcome::Skipped);
        }

        if scene.node_exists(name) {
            tracing::warn!("Shader {} already exists! Shader skipped!", name);
            self.states.insert(name.to_string(), LoadState::Skipped);
            return Ok(LoadOutcome::Skipped);
        }

        let path = self.path_for(name);
        if !path.is_file() {
            tracing::warn!("Shader file {:?} does not exist! Shader skipped!", path);
            self.states.insert(name.to_string(), LoadState::NotFound);
            return Ok(LoadOutcome::NotFound);
        }

        self.states.insert(name.to_string(), LoadState::Loading);
        tracing::debug!("Loading shader {} from {:?}", name, path);
        let result = ShadingNetwork::read(&path)
            .and_then(|network| self.reconstructor.reconstruct(&network, scene, None, report));

        match result {
            Ok(nodes) => {
                self.states.insert(name.to_string(), LoadState::Loaded);
                Ok(LoadOutcome::Loaded(nodes))
            }
            Err(e) => {
                tracing::error!("Error while loading shader {}: {}", name, e);
                self.states.insert(name.to_string(), LoadState::Failed);
                Err(e)
            }
        }
    }

    /// Re-apply a stored network onto a material already in the scene
    ///
    /// Everything upstream of `existing` is replaced by the stored network.
    pub fn reapply<S>(
        &mut self,
        name: &str,
        scene: &mut S,
        existing: S::Handle,
        report: &mut Report,
    ) -> Result<IndexMap<String, S::Handle>, NetworkError>
    where
        S: SceneGraph + ?Sized,
    {
        let network = self.read(name)?;
        let nodes = self
            .reconstructor
            .reconstruct(&network, scene, Some(existing), report)?;
        self.states.insert(name.to_string(), LoadState::Loaded);
        Ok(nodes)
    }

    /// Capture one material and write it into the library
    pub fn export_one<S>(
        &self,
        scene: &S,
        name: &str,
        thumbnail: Option<&Thumbnail>,
        report: &mut Report,
    ) -> Result<PathBuf, NetworkError>
    where
        S: SceneGraph + ?Sized,
    {
        let root = scene
            .find_node(name)
            .ok_or_else(|| HostError::NodeNotFound(name.to_string()))?;
        let mut network = capture(scene, &root, None, report)?;
        if let Some(thumbnail) = thumbnail {
            network.set_thumbnail(thumbnail.clone());
        }

        std::fs::create_dir_all(self.root()).map_err(|source| NetworkError::Io {
            path: self.root().to_path_buf(),
            source,
        })?;
        let path = self.path_for(name);
        network.write(&path)?;
        tracing::info!("Generated shader {} in {:?}", name, path);
        Ok(path)
    }

    /// Export several materials, continuing past failures
    pub fn export<S, I>(
        &self,
        scene: &S,
        names: I,
        thumbnail: Option<&Thumbnail>,
        report: &mut Report,
    ) -> Vec<ExportOutcome>
    where
        S: SceneGraph + ?Sized,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| {
                let name = name.as_ref().to_string();
                if self.settings.is_ignored_shader(&name) {
                    tracing::debug!("Shader {} is ignored", name);
                    return ExportOutcome::Ignored { name };
                }
                match self.export_one(scene, &name, thumbnail, report) {
                    Ok(path) => ExportOutcome::Written { name, path },
                    Err(e) => {
                        report.record(Issue::ExportFailure {
                            shader: name.clone(),
                            reason: e.to_string(),
                        });
                        ExportOutcome::Failed { name }
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryScene;
    use crate::value::AttributeValue;

    fn library_in(dir: &Path) -> ShaderLibrary {
        ShaderLibrary::new(LibrarySettings::new(dir.join("ShadersLibrary")))
    }

    fn authored_scene() -> MemoryScene {
        let mut scene = MemoryScene::with_standard_types();
        let rock = scene.add_node("lambert", "Rock01").unwrap();
        let tex = scene.add_node("file", "rockDiffuse").unwrap();
        scene.connect(&tex, "outColor", &rock, "color").unwrap();
        scene
            .set_attr(&tex, "fileTextureName", &AttributeValue::Text("rock.tx".into()))
            .unwrap();
        scene.add_node("blinn", "Moss").unwrap();
        scene.add_node("lambert", "lambert1").unwrap();
        scene
    }

    #[test]
    fn test_export_then_load_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library_in(dir.path());
        let mut report = Report::new();

        let path = library
            .export_one(&authored_scene(), "Rock01", None, &mut report)
            .unwrap();
        assert_eq!(path, library.path_for("Rock01"));

        let mut target = MemoryScene::with_standard_types();
        let first = library.load_if_absent("Rock01", &mut target, &mut report).unwrap();
        let LoadOutcome::Loaded(nodes) = first else {
            panic!("expected Loaded, got {first:?}");
        };
        assert!(nodes.contains_key("rockDiffuse"));
        assert_eq!(library.state("Rock01"), LoadState::Loaded);

        let created = target.created_count();
        let second = library.load_if_absent("Rock01", &mut target, &mut report).unwrap();
        assert_eq!(second, LoadOutcome::Skipped);
        assert_eq!(target.created_count(), created);
    }

    #[test]
    fn test_existing_node_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library_in(dir.path());
        let mut report = Report::new();
        library
            .export_one(&authored_scene(), "Rock01", None, &mut report)
            .unwrap();

        let mut target = MemoryScene::with_standard_types();
        target.add_node("blinn", "Rock01").unwrap();
        let created = target.created_count();

        let outcome = library.load_if_absent("Rock01", &mut target, &mut report).unwrap();
        assert_eq!(outcome, LoadOutcome::Skipped);
        assert_eq!(target.created_count(), created);
        assert_eq!(library.state("Rock01"), LoadState::Skipped);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library_in(dir.path());
        let mut target = MemoryScene::with_standard_types();

        let outcome = library
            .load_if_absent("Ghost", &mut target, &mut Report::new())
            .unwrap();
        assert_eq!(outcome, LoadOutcome::NotFound);
        assert_eq!(library.state("Ghost"), LoadState::NotFound);
        assert_eq!(target.created_count(), 0);
    }

    #[test]
    fn test_malformed_file_fails_only_that_shader() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library_in(dir.path());
        std::fs::create_dir_all(library.root()).unwrap();
        std::fs::write(library.path_for("Broken"), r#"{"nodes": {"Broken": {"object_type": "lambert"}}}"#).unwrap();

        let mut target = MemoryScene::with_standard_types();
        let result = library.load_if_absent("Broken", &mut target, &mut Report::new());
        assert!(matches!(result, Err(NetworkError::MalformedGraph { .. })));
        assert_eq!(library.state("Broken"), LoadState::Failed);
        assert_eq!(target.created_count(), 0);
    }

    #[test]
    fn test_batch_export_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_in(dir.path());
        let mut report = Report::new();
        let thumbnail = Thumbnail::from_bytes(b"png");

        let outcomes = library.export(
            &authored_scene(),
            ["Rock01", "Missing", "lambert1", "Moss"],
            Some(&thumbnail),
            &mut report,
        );

        assert!(matches!(&outcomes[0], ExportOutcome::Written { name, .. } if name == "Rock01"));
        assert_eq!(outcomes[1], ExportOutcome::Failed { name: "Missing".to_string() });
        assert_eq!(outcomes[2], ExportOutcome::Ignored { name: "lambert1".to_string() });
        assert!(matches!(&outcomes[3], ExportOutcome::Written { name, .. } if name == "Moss"));
        assert!(report
            .issues()
            .iter()
            .any(|i| matches!(i, Issue::ExportFailure { shader, .. } if shader == "Missing")));

        let names: Vec<_> = library.entries().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Moss".to_string(), "Rock01".to_string()]);

        let stored = library.read("Rock01").unwrap();
        assert_eq!(stored.thumbnail(), Some(&thumbnail));
    }

    #[test]
    fn test_entries_ignore_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_in(dir.path());
        std::fs::create_dir_all(library.root()).unwrap();
        std::fs::write(library.root().join("notes.txt"), "x").unwrap();
        std::fs::write(library.path_for("Bark"), "{}").unwrap();

        let entries = library.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Bark");
    }

    #[test]
    fn test_missing_library_folder_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let library = library_in(dir.path());
        assert!(matches!(library.entries(), Err(NetworkError::Io { .. })));
    }

    #[test]
    fn test_reapply_refreshes_bound_material() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library_in(dir.path());
        let mut report = Report::new();
        library
            .export_one(&authored_scene(), "Rock01", None, &mut report)
            .unwrap();

        let mut target = MemoryScene::with_standard_types();
        let bound = target.add_node("lambert", "Rock01").unwrap();
        let stale = target.add_node("checker", "stale").unwrap();
        target.connect(&stale, "outColor", &bound, "color").unwrap();

        let nodes = library.reapply("Rock01", &mut target, bound, &mut report).unwrap();
        assert_eq!(nodes["Rock01"], bound);
        assert!(!target.node_exists("stale"));
        assert!(target.node_exists("rockDiffuse"));
        assert_eq!(library.state("Rock01"), LoadState::Loaded);
    }
}
