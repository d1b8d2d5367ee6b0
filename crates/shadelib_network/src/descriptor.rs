// SPDX-License-Identifier: MIT OR Apache-2.0
//! Asset shading descriptors.
//!
//! A descriptor records which shading group (and which materials feeding it)
//! each geometry shape of an asset was bound to:
//!
//! ```json
//! { "<meshGroup>": { "<shape>": { "<shadingGroup>": ["<material>", ...] } } }
//! ```
//!
//! Applying a descriptor loads the missing materials from the library and
//! binds every shape back to its group. Unloading undoes both.

use crate::host::SceneGraph;
use crate::library::{LoadOutcome, ShaderLibrary};
use crate::report::{Issue, Report};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Shading group name to the materials feeding it
pub type GroupMaterials = BTreeMap<String, Vec<String>>;

/// Shape name to its shading groups
pub type ShapeGroups = BTreeMap<String, GroupMaterials>;

/// Shading assignment of every shape of an asset, by mesh group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShadingDescriptor {
    mesh_groups: BTreeMap<String, ShapeGroups>,
}

/// A shape bound to a shading group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Geometry shape
    pub shape: String,
    /// Shading group it was bound to
    pub shading_group: String,
}

impl ShadingDescriptor {
    /// Create an empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the materials of a shape's shading group
    pub fn insert(
        &mut self,
        mesh_group: impl Into<String>,
        shape: impl Into<String>,
        shading_group: impl Into<String>,
        materials: Vec<String>,
    ) {
        self.mesh_groups
            .entry(mesh_group.into())
            .or_default()
            .entry(shape.into())
            .or_default()
            .insert(shading_group.into(), materials);
    }

    /// Mesh groups and their shapes
    pub fn mesh_groups(&self) -> &BTreeMap<String, ShapeGroups> {
        &self.mesh_groups
    }

    /// Whether no shape is described
    pub fn is_empty(&self) -> bool {
        self.mesh_groups.values().all(|shapes| shapes.is_empty())
    }

    /// Every (shape, shading group, materials) entry
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &str, &[String])> {
        self.mesh_groups.values().flat_map(|shapes| {
            shapes.iter().flat_map(|(shape, groups)| {
                groups
                    .iter()
                    .map(move |(group, materials)| (shape.as_str(), group.as_str(), materials.as_slice()))
            })
        })
    }

    /// All materials, each listed once in first-seen order
    pub fn materials(&self) -> Vec<&str> {
        let mut seen = IndexSet::new();
        for (_, _, materials) in self.assignments() {
            seen.extend(materials.iter().map(String::as_str));
        }
        seen.into_iter().collect()
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String, DescriptorError> {
        serde_json::to_string_pretty(self).map_err(|e| DescriptorError::MalformedDescriptor(e.to_string()))
    }

    /// Parse from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, DescriptorError> {
        serde_json::from_str(text).map_err(|e| DescriptorError::MalformedDescriptor(e.to_string()))
    }

    /// Read a descriptor file
    pub fn read(path: &Path) -> Result<Self, DescriptorError> {
        let text = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Write a descriptor file
    pub fn write(&self, path: &Path) -> Result<(), DescriptorError> {
        let mut text = self.to_json_string()?;
        text.push('\n');
        std::fs::write(path, text).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// What [`apply_descriptor_with`] does to the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Load missing materials from the library
    pub load: bool,
    /// Bind shapes to their shading groups
    pub bind: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            load: true,
            bind: true,
        }
    }
}

/// Load the materials a descriptor needs and bind its shapes
///
/// Same as [`apply_descriptor_with`] with both loading and binding enabled.
pub fn apply_descriptor<S>(
    library: &mut ShaderLibrary,
    scene: &mut S,
    descriptor: &ShadingDescriptor,
    report: &mut Report,
) -> Vec<Binding>
where
    S: SceneGraph + ?Sized,
{
    apply_descriptor_with(library, scene, descriptor, ApplyOptions::default(), report)
}

/// Load the materials a descriptor needs and bind its shapes
///
/// Materials of shading groups missing from the scene are loaded from the
/// library, each at most once per call. A shape whose recorded group still
/// does not exist afterwards is bound to the default group of one of its
/// materials. Failures are recorded and the batch goes on. With binding
/// disabled the resolved bindings are returned but the scene is not touched.
pub fn apply_descriptor_with<S>(
    library: &mut ShaderLibrary,
    scene: &mut S,
    descriptor: &ShadingDescriptor,
    options: ApplyOptions,
    report: &mut Report,
) -> Vec<Binding>
where
    S: SceneGraph + ?Sized,
{
    let mut requested = HashSet::new();
    let mut bindings = Vec::new();

    for (shape, group, materials) in descriptor.assignments() {
        if options.load && !scene.node_exists(group) {
            for material in materials {
                if requested.insert(material.clone()) {
                    load_material(library, scene, material, report);
                }
            }
        }

        let target = if scene.node_exists(group) {
            Some(group.to_string())
        } else {
            materials
                .iter()
                .map(|m| library.settings().shading_group_name(m))
                .find(|g| scene.node_exists(g))
        };

        let Some(target) = target else {
            report.record(Issue::BindFailure {
                shape: shape.to_string(),
                shading_group: group.to_string(),
                reason: "shading group not found".to_string(),
            });
            continue;
        };

        if options.bind {
            if let Err(e) = scene.assign_shading_group(shape, &target) {
                report.record(Issue::BindFailure {
                    shape: shape.to_string(),
                    shading_group: target,
                    reason: e.to_string(),
                });
                continue;
            }
            tracing::debug!("Bound {} to {}", shape, target);
        }
        bindings.push(Binding {
            shape: shape.to_string(),
            shading_group: target,
        });
    }

    tracing::info!("Resolved {} shape bindings", bindings.len());
    bindings
}

/// Remove the materials and shading groups a descriptor names
///
/// Every shape bound to one of the shading groups goes back to the host's
/// default group, then the materials and the groups are deleted. Protected
/// defaults from the library settings are kept. Deleted materials can be
/// loaded again. Returns the names of the deleted nodes.
pub fn unload_descriptor<S>(
    library: &mut ShaderLibrary,
    scene: &mut S,
    descriptor: &ShadingDescriptor,
    report: &mut Report,
) -> Vec<String>
where
    S: SceneGraph + ?Sized,
{
    let mut deleted = Vec::new();

    for (_, group, materials) in descriptor.assignments() {
        if !scene.node_exists(group) {
            continue;
        }

        match scene.shading_group_members(group) {
            Ok(members) => {
                for shape in members {
                    if let Err(source) = scene.reset_shading_group(&shape) {
                        report.record(Issue::UnloadFailure { node: shape, source });
                    }
                }
            }
            Err(source) => report.record(Issue::UnloadFailure {
                node: group.to_string(),
                source,
            }),
        }

        for name in materials.iter().map(String::as_str).chain([group]) {
            if library.settings().is_protected(name) {
                continue;
            }
            let Some(node) = scene.find_node(name) else {
                continue;
            };
            match scene.delete_node(&node) {
                Ok(()) => {
                    library.forget(name);
                    deleted.push(name.to_string());
                }
                Err(source) => report.record(Issue::UnloadFailure {
                    node: name.to_string(),
                    source,
                }),
            }
        }
    }

    tracing::info!("Unloaded {} nodes", deleted.len());
    deleted
}

fn load_material<S>(library: &mut ShaderLibrary, scene: &mut S, material: &str, report: &mut Report)
where
    S: SceneGraph + ?Sized,
{
    let reason = match library.load_if_absent(material, scene, report) {
        Ok(LoadOutcome::Loaded(_)) | Ok(LoadOutcome::Skipped) => return,
        Ok(LoadOutcome::NotFound) => format!("no file {:?}", library.path_for(material)),
        Err(e) => e.to_string(),
    };
    report.record(Issue::LoadFailure {
        shader: material.to_string(),
        reason,
    });
}

/// Error reading or writing a descriptor
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Filesystem failure
    #[error("IO error on {path:?}: {source}")]
    Io {
        /// Descriptor file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Text is not a valid descriptor
    #[error("Malformed shading descriptor: {0}")]
    MalformedDescriptor(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::LoadState;
    use crate::memory::MemoryScene;
    use crate::settings::LibrarySettings;

    fn rock_descriptor() -> ShadingDescriptor {
        let mut descriptor = ShadingDescriptor::new();
        descriptor.insert("rock_GRP", "rockShape", "Rock01SG", vec!["Rock01".to_string()]);
        descriptor.insert("rock_GRP", "pebbleShape", "Rock01SG", vec!["Rock01".to_string()]);
        descriptor.insert(
            "moss_GRP",
            "mossShape",
            "MossSG",
            vec!["Moss".to_string(), "Rock01".to_string()],
        );
        descriptor
    }

    fn stocked_library(dir: &Path) -> ShaderLibrary {
        let library = ShaderLibrary::new(LibrarySettings::new(dir.join("lib")));
        let mut source = MemoryScene::with_standard_types();
        source.add_node("lambert", "Rock01").unwrap();
        source.add_node("blinn", "Moss").unwrap();
        let outcomes = library.export(&source, ["Rock01", "Moss"], None, &mut Report::new());
        assert_eq!(outcomes.len(), 2);
        library
    }

    #[test]
    fn test_parse_nested_json() {
        let descriptor = ShadingDescriptor::from_json_str(
            r#"{"body_GRP": {"bodyShape": {"skinSG": ["skin", "sss"]}}}"#,
        )
        .unwrap();
        let entries: Vec<_> = descriptor.assignments().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "bodyShape");
        assert_eq!(entries[0].1, "skinSG");
        assert_eq!(entries[0].2, ["skin".to_string(), "sss".to_string()]);
    }

    #[test]
    fn test_malformed_json() {
        let result = ShadingDescriptor::from_json_str(r#"{"body_GRP": ["oops"]}"#);
        assert!(matches!(result, Err(DescriptorError::MalformedDescriptor(_))));
    }

    #[test]
    fn test_materials_deduplicated() {
        let descriptor = rock_descriptor();
        // BTreeMap order: moss_GRP before rock_GRP
        assert_eq!(descriptor.materials(), vec!["Moss", "Rock01"]);
    }

    #[test]
    fn test_write_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rock.json");
        let descriptor = rock_descriptor();
        descriptor.write(&path).unwrap();
        assert_eq!(ShadingDescriptor::read(&path).unwrap(), descriptor);
    }

    #[test]
    fn test_apply_loads_and_binds() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = stocked_library(dir.path());
        let mut scene = MemoryScene::with_standard_types();
        let mut report = Report::new();

        let bindings = apply_descriptor(&mut library, &mut scene, &rock_descriptor(), &mut report);

        assert_eq!(bindings.len(), 3);
        assert!(report.is_empty(), "{:?}", report.issues());
        assert_eq!(scene.shading_group_of("rockShape"), Some("Rock01SG"));
        assert_eq!(scene.shading_group_of("pebbleShape"), Some("Rock01SG"));
        assert_eq!(scene.shading_group_of("mossShape"), Some("MossSG"));
        // Rock01 was rebuilt once even though three groups reference it
        assert_eq!(scene.node_count(), 4);
    }

    #[test]
    fn test_apply_falls_back_to_material_group() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = stocked_library(dir.path());
        let mut scene = MemoryScene::with_standard_types();
        let mut descriptor = ShadingDescriptor::new();
        descriptor.insert("g", "rockShape", "oldRockSG", vec!["Rock01".to_string()]);

        let bindings = apply_descriptor(&mut library, &mut scene, &descriptor, &mut Report::new());
        assert_eq!(
            bindings,
            vec![Binding {
                shape: "rockShape".to_string(),
                shading_group: "Rock01SG".to_string(),
            }]
        );
    }

    #[test]
    fn test_load_without_binding() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = stocked_library(dir.path());
        let mut scene = MemoryScene::with_standard_types();
        let options = ApplyOptions {
            load: true,
            bind: false,
        };

        let bindings = apply_descriptor_with(&mut library, &mut scene, &rock_descriptor(), options, &mut Report::new());
        assert_eq!(bindings.len(), 3);
        assert!(scene.node_exists("Rock01"));
        assert_eq!(scene.shading_group_of("rockShape"), None);
    }

    #[test]
    fn test_bind_without_loading() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = stocked_library(dir.path());
        let mut scene = MemoryScene::with_standard_types();
        scene.create_shading_group("MossSG").unwrap();
        let options = ApplyOptions {
            load: false,
            bind: true,
        };
        let mut report = Report::new();

        let bindings = apply_descriptor_with(&mut library, &mut scene, &rock_descriptor(), options, &mut report);
        assert_eq!(
            bindings,
            vec![Binding {
                shape: "mossShape".to_string(),
                shading_group: "MossSG".to_string(),
            }]
        );
        assert!(!scene.node_exists("Rock01"));
        assert_eq!(report.warnings().count(), 2);
    }

    #[test]
    fn test_unload_releases_shapes_and_deletes_materials() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = stocked_library(dir.path());
        let mut scene = MemoryScene::with_standard_types();
        let descriptor = rock_descriptor();
        apply_descriptor(&mut library, &mut scene, &descriptor, &mut Report::new());
        assert_eq!(library.state("Rock01"), LoadState::Loaded);

        let mut report = Report::new();
        let deleted = unload_descriptor(&mut library, &mut scene, &descriptor, &mut report);

        assert!(report.is_empty(), "{:?}", report.issues());
        assert_eq!(deleted.len(), 4);
        assert_eq!(scene.node_count(), 0);
        assert_eq!(scene.shading_group_of("rockShape"), None);
        assert_eq!(scene.shading_group_of("mossShape"), None);

        // The materials can be loaded again
        assert_eq!(library.state("Rock01"), LoadState::Unloaded);
        apply_descriptor(&mut library, &mut scene, &descriptor, &mut Report::new());
        assert_eq!(scene.shading_group_of("rockShape"), Some("Rock01SG"));
    }

    #[test]
    fn test_unload_keeps_default_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = stocked_library(dir.path());
        let mut scene = MemoryScene::with_standard_types();
        scene.add_node("lambert", "lambert1").unwrap();
        scene.create_shading_group("initialShadingGroup").unwrap();
        scene.assign_shading_group("floorShape", "initialShadingGroup").unwrap();
        let mut descriptor = ShadingDescriptor::new();
        descriptor.insert("g", "floorShape", "initialShadingGroup", vec!["lambert1".to_string()]);

        let deleted = unload_descriptor(&mut library, &mut scene, &descriptor, &mut Report::new());
        assert!(deleted.is_empty());
        assert!(scene.node_exists("lambert1"));
        assert!(scene.node_exists("initialShadingGroup"));
        assert_eq!(scene.shading_group_of("floorShape"), None);
    }

    #[test]
    fn test_apply_records_missing_material() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = stocked_library(dir.path());
        let mut scene = MemoryScene::with_standard_types();
        let mut descriptor = ShadingDescriptor::new();
        descriptor.insert("g", "ghostShape", "ghostSG", vec!["Ghost".to_string()]);
        descriptor.insert("g", "rockShape", "Rock01SG", vec!["Rock01".to_string()]);
        let mut report = Report::new();

        let bindings = apply_descriptor(&mut library, &mut scene, &descriptor, &mut report);

        assert_eq!(bindings.len(), 1);
        assert!(report
            .issues()
            .iter()
            .any(|i| matches!(i, Issue::LoadFailure { shader, .. } if shader == "Ghost")));
        assert!(report
            .issues()
            .iter()
            .any(|i| matches!(i, Issue::BindFailure { shape, .. } if shape == "ghostShape")));
    }
}
