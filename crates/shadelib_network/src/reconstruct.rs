// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rebuilding captured networks in a scene.
//!
//! Reconstruction runs three full passes over the network:
//! 1. create every node (or reuse the existing root),
//! 2. restore every connection,
//! 3. apply literal values not driven by a connection,
//!
//! then gives freshly created nodes their canonical names without ever
//! renaming over an unrelated node.

use crate::host::{HostError, SceneGraph};
use crate::network::{NetworkError, ShadingNetwork};
use crate::node::{NodeKind, ShaderNodeRecord};
use crate::report::{Issue, Report};
use crate::settings::LibrarySettings;
use crate::value::AttributeValue;
use crate::walker::walk;
use indexmap::IndexMap;

/// Object type whose output feeds a shading group's displacement slot
const DISPLACEMENT_SHADER: &str = "displacementShader";

/// Replays [`ShadingNetwork`]s into a scene
#[derive(Debug, Clone)]
pub struct Reconstructor {
    ignored_attributes: Vec<String>,
    notes_attribute: String,
    shading_group_suffix: String,
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new(&LibrarySettings::default())
    }
}

impl Reconstructor {
    /// Create a reconstructor configured from library settings
    pub fn new(settings: &LibrarySettings) -> Self {
        Self {
            ignored_attributes: settings.ignored_attributes.clone(),
            notes_attribute: settings.notes_attribute.clone(),
            shading_group_suffix: settings.shading_group_suffix.clone(),
        }
    }

    /// Rebuild a network, returning logical name to live node
    ///
    /// With `existing_root`, the network's root record is applied onto that
    /// node instead of creating a new one, and everything currently upstream
    /// of it is deleted first. Per-node and per-attribute failures are
    /// recorded in `report` and skipped.
    pub fn reconstruct<S>(
        &self,
        network: &ShadingNetwork,
        scene: &mut S,
        existing_root: Option<S::Handle>,
        report: &mut Report,
    ) -> Result<IndexMap<String, S::Handle>, NetworkError>
    where
        S: SceneGraph + ?Sized,
    {
        let mut nodes = IndexMap::new();

        if let Some(existing) = existing_root {
            let Some(root) = network.root() else {
                return Err(NetworkError::MalformedGraph {
                    context: "reconstruct".to_string(),
                    reason: "re-applying onto an existing node requires a root record".to_string(),
                });
            };
            self.clear_upstream(scene, &existing)?;
            nodes.insert(root.to_string(), existing);
        }
        let reused = nodes.len();

        self.create_phase(network, scene, &mut nodes, report);
        self.connect_phase(network, scene, &nodes, report);
        self.attribute_phase(network, scene, &nodes, report);

        for (name, node) in nodes.iter().skip(reused) {
            self.assign_name(scene, name, node, report);
        }

        tracing::info!(
            "Reconstructed shading network {:?}: {} nodes",
            network.root(),
            nodes.len()
        );
        Ok(nodes)
    }

    /// Delete every node feeding an existing root
    fn clear_upstream<S>(&self, scene: &mut S, root: &S::Handle) -> Result<(), HostError>
    where
        S: SceneGraph + ?Sized,
    {
        let upstream = walk(&*scene, root)?;
        for node in upstream.iter().skip(1) {
            tracing::debug!("Deleting superseded node {:?}", node);
            scene.delete_node(node)?;
        }
        Ok(())
    }

    fn create_phase<S>(
        &self,
        network: &ShadingNetwork,
        scene: &mut S,
        nodes: &mut IndexMap<String, S::Handle>,
        report: &mut Report,
    ) where
        S: SceneGraph + ?Sized,
    {
        for record in network.records() {
            if nodes.contains_key(&record.name) {
                continue;
            }
            match scene.create_node(&record.object_type, record.node_kind, &record.name) {
                Ok(node) => {
                    if record.node_kind == NodeKind::Shader {
                        self.create_shading_group(scene, record, &node, report);
                    }
                    nodes.insert(record.name.clone(), node);
                }
                Err(source) => report.record(Issue::NodeCreateFailure {
                    node: record.name.clone(),
                    object_type: record.object_type.clone(),
                    source,
                }),
            }
        }
    }

    /// Give a freshly created material its own shading group
    fn create_shading_group<S>(
        &self,
        scene: &mut S,
        record: &ShaderNodeRecord,
        material: &S::Handle,
        report: &mut Report,
    ) where
        S: SceneGraph + ?Sized,
    {
        let group_name = format!("{}{}", record.name, self.shading_group_suffix);
        let (output, slot) = if record.object_type == DISPLACEMENT_SHADER {
            ("displacement", "displacementShader")
        } else {
            ("outColor", "surfaceShader")
        };

        let result = match scene.create_shading_group(&group_name) {
            Ok(group) => scene.connect(material, output, &group, slot),
            Err(e) => Err(e),
        };
        if let Err(source) = result {
            report.record(Issue::ConnectFailure {
                node: group_name,
                attribute: slot.to_string(),
                source_node: record.name.clone(),
                source_attribute: output.to_string(),
                source,
            });
        }
    }

    fn connect_phase<S>(
        &self,
        network: &ShadingNetwork,
        scene: &mut S,
        nodes: &IndexMap<String, S::Handle>,
        report: &mut Report,
    ) where
        S: SceneGraph + ?Sized,
    {
        for record in network.records() {
            let Some(target) = nodes.get(&record.name) else {
                continue;
            };
            for (attribute, connection) in &record.connections {
                let Some(upstream) = nodes.get(&connection.source_node) else {
                    report.record(Issue::DanglingConnection {
                        node: record.name.clone(),
                        attribute: attribute.clone(),
                        source_node: connection.source_node.clone(),
                        source_attribute: connection.source_attribute.clone(),
                    });
                    continue;
                };
                if let Err(source) = scene.connect(upstream, &connection.source_attribute, target, attribute) {
                    report.record(Issue::ConnectFailure {
                        node: record.name.clone(),
                        attribute: attribute.clone(),
                        source_node: connection.source_node.clone(),
                        source_attribute: connection.source_attribute.clone(),
                        source,
                    });
                }
            }
        }
    }

    fn attribute_phase<S>(
        &self,
        network: &ShadingNetwork,
        scene: &mut S,
        nodes: &IndexMap<String, S::Handle>,
        report: &mut Report,
    ) where
        S: SceneGraph + ?Sized,
    {
        for record in network.records() {
            let Some(node) = nodes.get(&record.name) else {
                continue;
            };

            self.reset_notes(scene, record, node, report);

            for (attribute, value) in record.literal_attributes() {
                if self.ignored_attributes.contains(attribute) {
                    continue;
                }
                if let Err(source) = scene.set_attr(node, attribute, value) {
                    report.record(Issue::AttributeApplyFailure {
                        node: record.name.clone(),
                        attribute: attribute.clone(),
                        source,
                    });
                }
            }
        }
    }

    /// Clear the notes attribute so stale notes never survive a rebuild
    fn reset_notes<S>(
        &self,
        scene: &mut S,
        record: &ShaderNodeRecord,
        node: &S::Handle,
        report: &mut Report,
    ) where
        S: SceneGraph + ?Sized,
    {
        let notes = self.notes_attribute.as_str();
        if record.is_connected(notes) {
            return;
        }
        let carries_notes = record.attributes.contains_key(notes);
        if !carries_notes && !scene.has_attribute(node, notes) {
            return;
        }

        let result = if scene.has_attribute(node, notes) {
            Ok(())
        } else {
            scene.add_attribute(node, notes)
        };
        if let Err(source) = result.and_then(|()| scene.set_attr(node, notes, &AttributeValue::empty_text())) {
            report.record(Issue::AttributeApplyFailure {
                node: record.name.clone(),
                attribute: notes.to_string(),
                source,
            });
        }
    }

    /// Rename a created node to its logical name, or to a free variant of it
    fn assign_name<S>(&self, scene: &mut S, name: &str, node: &S::Handle, report: &mut Report)
    where
        S: SceneGraph + ?Sized,
    {
        let current = match scene.node_name(node) {
            Ok(current) => current,
            Err(source) => {
                report.record(Issue::RenameFailure {
                    node: name.to_string(),
                    target: name.to_string(),
                    source,
                });
                return;
            }
        };
        if current == name {
            return;
        }

        let target = match scene.find_node(name) {
            Some(other) if other != *node => {
                let assigned = disambiguate(&*scene, name);
                report.record(Issue::DuplicateMaterialName {
                    requested: name.to_string(),
                    assigned: assigned.clone(),
                });
                assigned
            }
            _ => name.to_string(),
        };
        if target == current {
            return;
        }

        if let Err(source) = scene.rename(node, &target) {
            report.record(Issue::RenameFailure {
                node: current,
                target,
                source,
            });
        }
    }
}

/// First of `name_`, `name_1`, `name_2`, ... not used in the scene
fn disambiguate<S>(scene: &S, name: &str) -> String
where
    S: SceneGraph + ?Sized,
{
    let first = format!("{name}_");
    if !scene.node_exists(&first) {
        return first;
    }
    (1..)
        .map(|n| format!("{name}_{n}"))
        .find(|candidate| !scene.node_exists(candidate))
        .unwrap_or(first)
}
