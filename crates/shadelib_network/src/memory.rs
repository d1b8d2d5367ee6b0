// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory scene graph.
//!
//! Implements [`SceneGraph`] without a host application so that capture and
//! reconstruction can run headless and under test. Node types must be
//! registered up front, like the host's own type registry.

use crate::connection::IncomingConnection;
use crate::host::{HostError, SceneGraph};
use crate::node::NodeKind;
use crate::value::AttributeValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node in a [`MemoryScene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one attribute slot
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    /// Readable and writable literal
    Value(AttributeValue),
    /// Enumerable but not evaluable (message attributes and the like)
    Unreadable,
    /// Computed output, connectable but not enumerated
    Output,
}

/// Attribute layout of a registered node type
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    /// Type name passed to `create_node`
    pub object_type: String,
    /// Kind reported by introspection
    pub kind: NodeKind,
    slots: Vec<(String, Slot)>,
}

impl NodeTemplate {
    /// Create a template with no attributes
    pub fn new(object_type: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            object_type: object_type.into(),
            kind,
            slots: Vec::new(),
        }
    }

    /// Add a literal input with its default value
    pub fn input(mut self, name: impl Into<String>, default: impl Into<AttributeValue>) -> Self {
        self.slots.push((name.into(), Slot::Value(default.into())));
        self
    }

    /// Add an enumerable attribute that cannot be read
    pub fn unreadable(mut self, name: impl Into<String>) -> Self {
        self.slots.push((name.into(), Slot::Unreadable));
        self
    }

    /// Add a computed output
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.slots.push((name.into(), Slot::Output));
        self
    }
}

#[derive(Debug, Clone)]
struct MemoryNode {
    name: String,
    object_type: String,
    kind: NodeKind,
    slots: IndexMap<String, Slot>,
}

#[derive(Debug, Clone, PartialEq)]
struct MemoryConnection {
    from_node: NodeId,
    from_attr: String,
    to_node: NodeId,
    to_attr: String,
}

/// A scene graph held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    templates: IndexMap<String, NodeTemplate>,
    nodes: IndexMap<NodeId, MemoryNode>,
    connections: Vec<MemoryConnection>,
    assignments: IndexMap<String, String>,
    created: usize,
    writes: Vec<(NodeId, String)>,
}

impl MemoryScene {
    /// Create an empty scene with no registered types
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty scene with the common shading node types registered
    pub fn with_standard_types() -> Self {
        let mut scene = Self::new();
        for template in standard_templates() {
            scene.register(template);
        }
        scene
    }

    /// Register a node type
    pub fn register(&mut self, template: NodeTemplate) {
        self.templates.insert(template.object_type.clone(), template);
    }

    /// Create a node of a registered type with its registered kind
    pub fn add_node(&mut self, object_type: &str, name: &str) -> Result<NodeId, HostError> {
        let kind = self
            .templates
            .get(object_type)
            .map(|t| t.kind)
            .ok_or_else(|| HostError::UnknownType(object_type.to_string()))?;
        self.create_node(object_type, kind, name)
    }

    /// Mark an existing attribute as not evaluable
    pub fn make_unreadable(&mut self, node: NodeId, attribute: &str) -> Result<(), HostError> {
        let node = self.node_mut(&node)?;
        let name = node.name.clone();
        let slot = node
            .slots
            .get_mut(attribute)
            .ok_or_else(|| HostError::AttributeNotFound {
                node: name,
                attribute: attribute.to_string(),
            })?;
        *slot = Slot::Unreadable;
        Ok(())
    }

    /// Number of nodes in the scene
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of `create_node`/`create_shading_group` calls so far
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Every successful `set_attr` call, in order
    pub fn attribute_writes(&self) -> &[(NodeId, String)] {
        &self.writes
    }

    /// Number of connections in the scene
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Shading group a shape was assigned to
    pub fn shading_group_of(&self, shape: &str) -> Option<&str> {
        self.assignments.get(shape).map(String::as_str)
    }

    fn node(&self, id: &NodeId) -> Result<&MemoryNode, HostError> {
        self.nodes
            .get(id)
            .ok_or_else(|| HostError::NodeNotFound(format!("{:?}", id.0)))
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| HostError::NodeNotFound(format!("{:?}", id.0)))
    }

    fn unique_name(&self, hint: &str) -> String {
        if !self.node_exists(hint) {
            return hint.to_string();
        }
        (1..)
            .map(|n| format!("{hint}{n}"))
            .find(|candidate| !self.node_exists(candidate))
            .unwrap_or_else(|| hint.to_string())
    }

    fn instantiate(&mut self, object_type: &str, kind: NodeKind, name: &str) -> Result<NodeId, HostError> {
        let template = self
            .templates
            .get(object_type)
            .ok_or_else(|| HostError::UnknownType(object_type.to_string()))?;
        let slots = template.slots.iter().cloned().collect();

        let id = NodeId::new();
        let name = self.unique_name(name);
        self.nodes.insert(
            id,
            MemoryNode {
                name,
                object_type: object_type.to_string(),
                kind,
                slots,
            },
        );
        self.created += 1;
        Ok(id)
    }
}

impl SceneGraph for MemoryScene {
    type Handle = NodeId;

    fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| *id)
    }

    fn node_name(&self, node: &NodeId) -> Result<String, HostError> {
        Ok(self.node(node)?.name.clone())
    }

    fn object_type(&self, node: &NodeId) -> Result<String, HostError> {
        Ok(self.node(node)?.object_type.clone())
    }

    fn node_kind(&self, node: &NodeId) -> Result<NodeKind, HostError> {
        Ok(self.node(node)?.kind)
    }

    fn create_node(&mut self, object_type: &str, kind: NodeKind, name: &str) -> Result<NodeId, HostError> {
        self.instantiate(object_type, kind, name)
    }

    fn create_shading_group(&mut self, name: &str) -> Result<NodeId, HostError> {
        self.instantiate(SHADING_ENGINE, NodeKind::Utility, name)
    }

    fn delete_node(&mut self, node: &NodeId) -> Result<(), HostError> {
        let id = *node;
        let name = self.node(&id)?.name.clone();
        // Remove connections and memberships involving this node
        self.connections.retain(|c| c.from_node != id && c.to_node != id);
        self.assignments.retain(|_, group| *group != name);
        self.nodes.shift_remove(&id);
        Ok(())
    }

    fn rename(&mut self, node: &NodeId, new_name: &str) -> Result<String, HostError> {
        if self.node(node)?.name == new_name {
            return Ok(new_name.to_string());
        }
        let name = self.unique_name(new_name);
        self.node_mut(node)?.name = name.clone();
        Ok(name)
    }

    fn list_attributes(&self, node: &NodeId) -> Result<Vec<String>, HostError> {
        Ok(self
            .node(node)?
            .slots
            .iter()
            .filter(|(_, slot)| **slot != Slot::Output)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn has_attribute(&self, node: &NodeId, attribute: &str) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|n| n.slots.contains_key(attribute))
    }

    fn add_attribute(&mut self, node: &NodeId, attribute: &str) -> Result<(), HostError> {
        self.node_mut(node)?
            .slots
            .entry(attribute.to_string())
            .or_insert_with(|| Slot::Value(AttributeValue::empty_text()));
        Ok(())
    }

    fn get_attr(&self, node: &NodeId, attribute: &str) -> Result<AttributeValue, HostError> {
        let node = self.node(node)?;
        match node.slots.get(attribute) {
            Some(Slot::Value(value)) => Ok(value.clone()),
            Some(Slot::Unreadable | Slot::Output) => Err(HostError::UnsupportedValue {
                node: node.name.clone(),
                attribute: attribute.to_string(),
                reason: "attribute is not evaluable".to_string(),
            }),
            None => Err(HostError::AttributeNotFound {
                node: node.name.clone(),
                attribute: attribute.to_string(),
            }),
        }
    }

    fn set_attr(&mut self, node: &NodeId, attribute: &str, value: &AttributeValue) -> Result<(), HostError> {
        let id = *node;
        let node = self.node_mut(&id)?;
        let name = node.name.clone();
        match node.slots.get_mut(attribute) {
            Some(Slot::Value(current)) if current.same_type(value) => {
                *current = value.clone();
            }
            Some(Slot::Value(current)) => {
                return Err(HostError::UnsupportedValue {
                    node: name,
                    attribute: attribute.to_string(),
                    reason: format!("expected {}, got {}", current.type_name(), value.type_name()),
                });
            }
            Some(Slot::Unreadable | Slot::Output) => {
                return Err(HostError::UnsupportedValue {
                    node: name,
                    attribute: attribute.to_string(),
                    reason: "attribute is not writable".to_string(),
                });
            }
            None => {
                return Err(HostError::AttributeNotFound {
                    node: name,
                    attribute: attribute.to_string(),
                });
            }
        }
        self.writes.push((id, attribute.to_string()));
        Ok(())
    }

    fn connect(
        &mut self,
        source: &NodeId,
        source_attribute: &str,
        destination: &NodeId,
        destination_attribute: &str,
    ) -> Result<(), HostError> {
        let source_node = self.node(source)?;
        if !source_node.slots.contains_key(source_attribute) {
            return Err(HostError::AttributeNotFound {
                node: source_node.name.clone(),
                attribute: source_attribute.to_string(),
            });
        }
        let target_node = self.node(destination)?;
        match target_node.slots.get(destination_attribute) {
            Some(Slot::Output) => {
                return Err(HostError::Refused(format!(
                    "{}.{destination_attribute} is an output",
                    target_node.name
                )));
            }
            None => {
                return Err(HostError::AttributeNotFound {
                    node: target_node.name.clone(),
                    attribute: destination_attribute.to_string(),
                });
            }
            Some(_) => {}
        }

        // An input has at most one driver
        self.connections
            .retain(|c| !(c.to_node == *destination && c.to_attr == destination_attribute));
        self.connections.push(MemoryConnection {
            from_node: *source,
            from_attr: source_attribute.to_string(),
            to_node: *destination,
            to_attr: destination_attribute.to_string(),
        });
        Ok(())
    }

    fn list_incoming_connections(&self, node: &NodeId) -> Result<Vec<IncomingConnection<NodeId>>, HostError> {
        self.node(node)?;
        Ok(self
            .connections
            .iter()
            .filter(|c| c.to_node == *node)
            .map(|c| IncomingConnection::new(c.from_node, c.from_attr.clone(), c.to_attr.clone()))
            .collect())
    }

    fn assign_shading_group(&mut self, shape: &str, shading_group: &str) -> Result<(), HostError> {
        let is_group = self
            .find_node(shading_group)
            .and_then(|id| self.nodes.get(&id))
            .is_some_and(|n| n.object_type == SHADING_ENGINE);
        if !is_group {
            return Err(HostError::NodeNotFound(shading_group.to_string()));
        }
        self.assignments.insert(shape.to_string(), shading_group.to_string());
        Ok(())
    }

    fn shading_group_members(&self, shading_group: &str) -> Result<Vec<String>, HostError> {
        if !self.node_exists(shading_group) {
            return Err(HostError::NodeNotFound(shading_group.to_string()));
        }
        Ok(self
            .assignments
            .iter()
            .filter(|(_, group)| *group == shading_group)
            .map(|(shape, _)| shape.clone())
            .collect())
    }

    fn reset_shading_group(&mut self, shape: &str) -> Result<(), HostError> {
        // Unassigned shapes render with the default group
        self.assignments.shift_remove(shape);
        Ok(())
    }
}

const SHADING_ENGINE: &str = "shadingEngine";

fn standard_templates() -> Vec<NodeTemplate> {
    vec![
        NodeTemplate::new("lambert", NodeKind::Shader)
            .input("color", [0.5, 0.5, 0.5])
            .input("diffuse", 0.8)
            .input("transparency", [0.0, 0.0, 0.0])
            .input("normalCamera", [1.0, 1.0, 1.0])
            .unreadable("message")
            .output("outColor"),
        NodeTemplate::new("blinn", NodeKind::Shader)
            .input("color", [0.5, 0.5, 0.5])
            .input("diffuse", 0.8)
            .input("eccentricity", 0.3)
            .input("specularColor", [0.5, 0.5, 0.5])
            .input("normalCamera", [1.0, 1.0, 1.0])
            .unreadable("message")
            .output("outColor"),
        NodeTemplate::new("displacementShader", NodeKind::Shader)
            .input("scale", 1.0)
            .input("vectorDisplacement", [0.0, 0.0, 0.0])
            .output("displacement"),
        NodeTemplate::new("file", NodeKind::Texture)
            .input("fileTextureName", "")
            .input("computedFileTextureNamePattern", "")
            .input("colorGain", [1.0, 1.0, 1.0])
            .input("alphaGain", 1.0)
            .input("uvCoord", [0.0, 0.0])
            .output("outColor")
            .output("outAlpha"),
        NodeTemplate::new("checker", NodeKind::Texture)
            .input("color1", [1.0, 1.0, 1.0])
            .input("color2", [0.0, 0.0, 0.0])
            .input("uvCoord", [0.0, 0.0])
            .output("outColor")
            .output("outAlpha"),
        NodeTemplate::new("place2dTexture", NodeKind::Utility)
            .input("repeatUV", [1.0, 1.0])
            .input("rotateFrame", 0.0)
            .output("outUV"),
        NodeTemplate::new("bump2d", NodeKind::Utility)
            .input("bumpValue", 0.0)
            .input("bumpDepth", 1.0)
            .output("outNormal"),
        NodeTemplate::new(SHADING_ENGINE, NodeKind::Utility)
            .unreadable("surfaceShader")
            .unreadable("displacementShader")
            .unreadable("volumeShader"),
    ]
}
