// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shading network model and its JSON file format.
//!
//! A file holds one network in a reserved envelope:
//!
//! ```json
//! {
//!   "root": "M",
//!   "nodes": {
//!     "M": {
//!       "node_kind": "Shader",
//!       "object_type": "lambert",
//!       "attr": { "diffuse": 0.8 },
//!       "connection": { "color": "Tex.outColor" }
//!     }
//!   },
//!   "thumbnail": "iVBORw0KGgo..."
//! }
//! ```
//!
//! Metadata never shares the node namespace, so a node may be called
//! `icon` or `thumbnail` without colliding with the preview image.

use crate::connection::ConnectionRef;
use crate::host::HostError;
use crate::node::{NodeKind, ShaderNodeRecord};
use crate::value::AttributeValue;
use base64::Engine as _;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The captured upstream closure of one root node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadingNetwork {
    /// Logical name of the root record
    root: Option<String>,
    /// Records keyed by logical name
    nodes: IndexMap<String, ShaderNodeRecord>,
}

impl ShadingNetwork {
    /// Create a new empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing any record of the same name
    pub fn insert(&mut self, record: ShaderNodeRecord) -> Option<ShaderNodeRecord> {
        self.nodes.insert(record.name.clone(), record)
    }

    /// Builder form of [`Self::insert`]
    pub fn with_record(mut self, record: ShaderNodeRecord) -> Self {
        self.insert(record);
        self
    }

    /// Get a record by name
    pub fn get(&self, name: &str) -> Option<&ShaderNodeRecord> {
        self.nodes.get(name)
    }

    /// Get a mutable record by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ShaderNodeRecord> {
        self.nodes.get_mut(name)
    }

    /// Check whether a record exists
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// All records
    pub fn records(&self) -> impl Iterator<Item = &ShaderNodeRecord> {
        self.nodes.values()
    }

    /// All record names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the network has no records
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Logical name of the root record
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Designate the root record
    pub fn set_root(&mut self, name: impl Into<String>) {
        self.root = Some(name.into());
    }

    /// Builder form of [`Self::set_root`]
    pub fn with_root(mut self, name: impl Into<String>) -> Self {
        self.set_root(name);
        self
    }

    /// The root record, if designated and present
    pub fn root_record(&self) -> Option<&ShaderNodeRecord> {
        self.root.as_deref().and_then(|r| self.nodes.get(r))
    }

    fn root_record_mut(&mut self) -> Option<&mut ShaderNodeRecord> {
        let root = self.root.as_deref()?;
        self.nodes.get_mut(root)
    }

    /// Preview image carried by the root record
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.root_record().and_then(|r| r.thumbnail.as_ref())
    }

    /// Attach a preview image to the root record
    ///
    /// Returns false when the network has no root to carry it.
    pub fn set_thumbnail(&mut self, thumbnail: Thumbnail) -> bool {
        match self.root_record_mut() {
            Some(record) => {
                record.thumbnail = Some(thumbnail);
                true
            }
            None => false,
        }
    }

    /// Connections whose source node is not part of this network
    ///
    /// Returns `(destination node, destination attribute, reference)`.
    pub fn dangling_connections(&self) -> Vec<(&str, &str, &ConnectionRef)> {
        self.nodes
            .values()
            .flat_map(|record| {
                record
                    .connections
                    .iter()
                    .map(move |(attr, c)| (record.name.as_str(), attr.as_str(), c))
            })
            .filter(|(_, _, c)| !self.nodes.contains_key(&c.source_node))
            .collect()
    }

    /// Whether every connection source is a record of this network
    pub fn is_closed(&self) -> bool {
        self.dangling_connections().is_empty()
    }

    /// Serialize to pretty JSON with sorted keys
    ///
    /// The `root` field is always written, as `null` for a network without
    /// one, so reading the file back never falls back to the file name.
    pub fn to_json_string(&self) -> Result<String, NetworkError> {
        let mut nodes = BTreeMap::new();
        for record in self.nodes.values() {
            let non_finite = record.attributes.iter().find(|(_, v)| !v.is_finite());
            if let Some((attribute, value)) = non_finite {
                return Err(NetworkError::NonFiniteValue {
                    node: record.name.clone(),
                    attribute: attribute.clone(),
                    value: value.to_string(),
                });
            }
            if record.thumbnail.is_some() && self.root() != Some(record.name.as_str()) {
                return Err(NetworkError::MalformedGraph {
                    context: "<write>".to_string(),
                    reason: format!(
                        "thumbnail on '{}', which is not the root record",
                        record.name
                    ),
                });
            }

            let wire = WireRecord {
                node_kind: Some(record.node_kind.as_str().to_string()),
                object_type: Some(record.object_type.clone()),
                attr: record.attributes.clone(),
                connection: record
                    .connections
                    .iter()
                    .map(|(attr, c)| (attr.clone(), c.to_string()))
                    .collect(),
            };
            nodes.insert(record.name.clone(), wire);
        }

        let wire = WireNetwork {
            root: Some(self.root.clone()),
            nodes: Some(nodes),
            thumbnail: self.thumbnail().map(|t| t.as_base64().to_string()),
        };
        Ok(serde_json::to_string_pretty(&wire)?)
    }

    /// Parse a network from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, NetworkError> {
        Self::parse(text, "<string>", None)
    }

    /// Write the network to a file, replacing any previous export
    pub fn write(&self, path: &Path) -> Result<(), NetworkError> {
        let mut json = self.to_json_string()?;
        json.push('\n');
        tracing::debug!("Writing shading network {:?} to {:?}", self.root, path);
        std::fs::write(path, json).map_err(|source| NetworkError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a network from a file
    ///
    /// When the envelope names no root, the file stem is used if it is a
    /// record of the network.
    pub fn read(path: &Path) -> Result<Self, NetworkError> {
        let text = std::fs::read_to_string(path).map_err(|source| NetworkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stem = path.file_stem().and_then(|s| s.to_str());
        Self::parse(&text, &path.display().to_string(), stem)
    }

    fn parse(text: &str, context: &str, fallback_root: Option<&str>) -> Result<Self, NetworkError> {
        let malformed = |reason: String| NetworkError::MalformedGraph {
            context: context.to_string(),
            reason,
        };

        let wire: WireNetwork = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
        let Some(wire_nodes) = wire.nodes else {
            return Err(malformed("missing 'nodes' field".to_string()));
        };

        let mut network = ShadingNetwork::new();
        for (name, wire_record) in wire_nodes {
            let Some(kind) = wire_record.node_kind else {
                return Err(malformed(format!("node '{name}' has no node_kind")));
            };
            let node_kind = kind
                .parse::<NodeKind>()
                .map_err(|e| malformed(format!("node '{name}': {e}")))?;
            let Some(object_type) = wire_record.object_type else {
                return Err(malformed(format!("node '{name}' has no object_type")));
            };

            let mut record = ShaderNodeRecord::new(name.clone(), node_kind, object_type);
            record.attributes = wire_record.attr;
            for (attr, text) in wire_record.connection {
                let connection: ConnectionRef = text
                    .parse()
                    .map_err(|e| malformed(format!("node '{name}' attribute '{attr}': {e}")))?;
                record.insert_connection(attr, connection);
            }
            network.insert(record);
        }

        match wire.root {
            Some(Some(root)) if !network.contains(&root) => {
                return Err(malformed(format!("root '{root}' is not a node of the network")));
            }
            Some(Some(root)) => network.set_root(root),
            // Written as null: the network has no root
            Some(None) => {}
            None => {
                if let Some(stem) = fallback_root.filter(|s| network.contains(s)) {
                    network.set_root(stem);
                }
            }
        }

        if let Some(encoded) = wire.thumbnail {
            let thumbnail = Thumbnail::from_base64(encoded);
            thumbnail
                .decode()
                .map_err(|e| malformed(format!("thumbnail is not valid base64: {e}")))?;
            if !network.set_thumbnail(thumbnail) {
                return Err(malformed("thumbnail present but no root node".to_string()));
            }
        }

        Ok(network)
    }
}

/// Base64-encoded preview image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail(String);

impl Thumbnail {
    /// Encode raw image bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    /// Wrap already-encoded text
    pub fn from_base64(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Read and encode an image file
    pub fn from_file(path: &Path) -> Result<Self, NetworkError> {
        let bytes = std::fs::read(path).map_err(|source| NetworkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_bytes(&bytes))
    }

    /// The encoded text
    pub fn as_base64(&self) -> &str {
        &self.0
    }

    /// Decode back to raw image bytes
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.0)
    }
}

#[derive(Serialize, Deserialize)]
struct WireNetwork {
    /// Outer `None` when the field is absent, inner `None` when it is null
    #[serde(default, deserialize_with = "present_field", skip_serializing_if = "Option::is_none")]
    root: Option<Option<String>>,
    #[serde(default)]
    nodes: Option<BTreeMap<String, WireRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumbnail: Option<String>,
}

fn present_field<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Serialize, Deserialize)]
struct WireRecord {
    #[serde(default)]
    node_kind: Option<String>,
    #[serde(default)]
    object_type: Option<String>,
    #[serde(default)]
    attr: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    connection: BTreeMap<String, String>,
}

/// Error reading, writing or rebuilding a network
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Filesystem failure
    #[error("IO error on {path:?}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file does not describe a valid network
    #[error("Malformed graph in {context}: {reason}")]
    MalformedGraph {
        /// File path or other origin
        context: String,
        /// What was wrong
        reason: String,
    },

    /// A literal has no JSON representation
    #[error("Attribute {node}.{attribute} holds non-finite value {value}")]
    NonFiniteValue {
        /// Record name
        node: String,
        /// Attribute name
        attribute: String,
        /// Offending value
        value: String,
    },

    /// Serialization failure
    #[error("Failed to serialize network: {0}")]
    Json(#[from] serde_json::Error),

    /// The host refused an operation the rebuild cannot continue without
    #[error("Host error: {0}")]
    Host(#[from] HostError),
}
