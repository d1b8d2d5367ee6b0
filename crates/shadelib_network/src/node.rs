// SPDX-License-Identifier: MIT OR Apache-2.0
//! Captured shading node records.

use crate::connection::ConnectionRef;
use crate::network::Thumbnail;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How a node must be created on reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Surface/volume/displacement material
    Shader,
    /// Math and routing nodes (place2dTexture, bump2d, ...)
    Utility,
    /// Texture generators and file textures
    Texture,
}

impl NodeKind {
    /// Name used in the file format
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shader => "Shader",
            Self::Utility => "Utility",
            Self::Texture => "Texture",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = UnknownNodeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The older exporter wrote the host's creation flags verbatim
        match s {
            "Shader" | "asShader" => Ok(Self::Shader),
            "Utility" | "asUtility" => Ok(Self::Utility),
            "Texture" | "asTexture" => Ok(Self::Texture),
            _ => Err(UnknownNodeKind(s.to_string())),
        }
    }
}

/// Error for an unrecognised node kind string
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown node kind '{0}'")]
pub struct UnknownNodeKind(pub String);

/// One captured node of a shading network
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderNodeRecord {
    /// Logical name, unique within the owning network
    pub name: String,
    /// Creation kind
    pub node_kind: NodeKind,
    /// Concrete host type (lambert, file, place2dTexture, ...)
    pub object_type: String,
    /// Literal attribute values
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Connection-driven attributes
    pub connections: BTreeMap<String, ConnectionRef>,
    /// Preview image, set through [`ShadingNetwork::set_thumbnail`] on the root record
    ///
    /// [`ShadingNetwork::set_thumbnail`]: crate::network::ShadingNetwork::set_thumbnail
    pub(crate) thumbnail: Option<Thumbnail>,
}

impl ShaderNodeRecord {
    /// Create a new record with no attributes
    pub fn new(name: impl Into<String>, node_kind: NodeKind, object_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_kind,
            object_type: object_type.into(),
            attributes: BTreeMap::new(),
            connections: BTreeMap::new(),
            thumbnail: None,
        }
    }

    /// Preview image carried by this record
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    /// Builder form of [`Self::insert_attribute`]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert_attribute(name, value);
        self
    }

    /// Builder form of [`Self::insert_connection`]
    pub fn with_connection(mut self, name: impl Into<String>, connection: ConnectionRef) -> Self {
        self.insert_connection(name, connection);
        self
    }

    /// Store a literal value
    ///
    /// Ignored when the attribute is already connection-driven.
    pub fn insert_attribute(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        let name = name.into();
        if !self.connections.contains_key(&name) {
            self.attributes.insert(name, value.into());
        }
    }

    /// Store a connection, dropping any literal of the same name
    pub fn insert_connection(&mut self, name: impl Into<String>, connection: ConnectionRef) {
        let name = name.into();
        self.attributes.remove(&name);
        self.connections.insert(name, connection);
    }

    /// Check whether an attribute is driven by a connection
    pub fn is_connected(&self, attribute: &str) -> bool {
        self.connections.contains_key(attribute)
    }

    /// Literal values not shadowed by a connection
    pub fn literal_attributes(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes
            .iter()
            .filter(move |(name, _)| !self.connections.contains_key(*name))
    }

    /// Names of the nodes this record reads from
    pub fn upstream_nodes(&self) -> impl Iterator<Item = &str> {
        self.connections.values().map(|c| c.source_node.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Shader".parse::<NodeKind>().unwrap(), NodeKind::Shader);
        assert_eq!("asTexture".parse::<NodeKind>().unwrap(), NodeKind::Texture);
        assert!("Light".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_attribute_lives_in_one_map() {
        let mut record = ShaderNodeRecord::new("M", NodeKind::Shader, "lambert")
            .with_attribute("color", [1.0, 0.0, 0.0]);
        record.insert_connection("color", ConnectionRef::new("Tex", "outColor"));

        assert!(record.is_connected("color"));
        assert!(!record.attributes.contains_key("color"));

        // A literal never shadows an existing connection
        record.insert_attribute("color", [0.0, 1.0, 0.0]);
        assert!(!record.attributes.contains_key("color"));
        assert_eq!(record.literal_attributes().count(), 0);
    }
}
