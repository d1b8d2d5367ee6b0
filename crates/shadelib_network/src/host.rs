// SPDX-License-Identifier: MIT OR Apache-2.0
//! Seam to the host application's scene graph.

use crate::connection::IncomingConnection;
use crate::node::NodeKind;
use crate::value::AttributeValue;
use std::fmt::Debug;
use std::hash::Hash;

/// Scene-graph operations the embedding application must provide
///
/// All calls happen on the host's main thread; implementations are not
/// required to be thread-safe.
pub trait SceneGraph {
    /// Opaque node handle
    type Handle: Clone + Eq + Hash + Debug;

    /// Look up a node by exact name
    fn find_node(&self, name: &str) -> Option<Self::Handle>;

    /// Check whether a node of that exact name exists
    fn node_exists(&self, name: &str) -> bool {
        self.find_node(name).is_some()
    }

    /// Current name of a node
    fn node_name(&self, node: &Self::Handle) -> Result<String, HostError>;

    /// Concrete type of a node
    fn object_type(&self, node: &Self::Handle) -> Result<String, HostError>;

    /// Creation kind of a node
    fn node_kind(&self, node: &Self::Handle) -> Result<NodeKind, HostError>;

    /// Create a node, using `name` as a hint
    ///
    /// The host may pick a different name when the hint is taken.
    fn create_node(
        &mut self,
        object_type: &str,
        kind: NodeKind,
        name: &str,
    ) -> Result<Self::Handle, HostError>;

    /// Create an empty renderable shading group
    fn create_shading_group(&mut self, name: &str) -> Result<Self::Handle, HostError>;

    /// Delete a node and every connection touching it
    fn delete_node(&mut self, node: &Self::Handle) -> Result<(), HostError>;

    /// Rename a node, returning the name actually given
    fn rename(&mut self, node: &Self::Handle, new_name: &str) -> Result<String, HostError>;

    /// Attributes that can be enumerated on a node
    fn list_attributes(&self, node: &Self::Handle) -> Result<Vec<String>, HostError>;

    /// Check whether a node has an attribute
    fn has_attribute(&self, node: &Self::Handle, attribute: &str) -> bool;

    /// Add a dynamic string attribute
    fn add_attribute(&mut self, node: &Self::Handle, attribute: &str) -> Result<(), HostError>;

    /// Read a literal attribute value
    fn get_attr(&self, node: &Self::Handle, attribute: &str) -> Result<AttributeValue, HostError>;

    /// Write a literal attribute value
    fn set_attr(
        &mut self,
        node: &Self::Handle,
        attribute: &str,
        value: &AttributeValue,
    ) -> Result<(), HostError>;

    /// Connect `source.source_attribute` to `destination.destination_attribute`
    ///
    /// Replaces any connection already driving the destination.
    fn connect(
        &mut self,
        source: &Self::Handle,
        source_attribute: &str,
        destination: &Self::Handle,
        destination_attribute: &str,
    ) -> Result<(), HostError>;

    /// Connections driving attributes of a node
    fn list_incoming_connections(
        &self,
        node: &Self::Handle,
    ) -> Result<Vec<IncomingConnection<Self::Handle>>, HostError>;

    /// Make a shape a member of a shading group
    fn assign_shading_group(&mut self, shape: &str, shading_group: &str) -> Result<(), HostError>;

    /// Shapes currently members of a shading group
    fn shading_group_members(&self, shading_group: &str) -> Result<Vec<String>, HostError>;

    /// Send a shape back to the host's default shading group
    fn reset_shading_group(&mut self, shape: &str) -> Result<(), HostError>;
}

/// Error reported by the host scene graph
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    /// Node does not exist
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Attribute does not exist on the node
    #[error("Attribute not found: {node}.{attribute}")]
    AttributeNotFound {
        /// Node name
        node: String,
        /// Attribute name
        attribute: String,
    },

    /// Attribute exists but its value cannot be read or written
    #[error("Unsupported value for {node}.{attribute}: {reason}")]
    UnsupportedValue {
        /// Node name
        node: String,
        /// Attribute name
        attribute: String,
        /// What the host rejected
        reason: String,
    },

    /// Unknown node type
    #[error("Unknown node type: {0}")]
    UnknownType(String),

    /// Any other refusal
    #[error("{0}")]
    Refused(String),
}
