// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for captured networks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream end of a captured connection, stored on the destination record
///
/// Serialized as the single string `"<sourceNode>.<sourceAttr>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConnectionRef {
    /// Logical name of the source node inside the same network
    pub source_node: String,
    /// Attribute on the source node
    pub source_attribute: String,
}

impl ConnectionRef {
    /// Create a new connection reference
    pub fn new(source_node: impl Into<String>, source_attribute: impl Into<String>) -> Self {
        Self {
            source_node: source_node.into(),
            source_attribute: source_attribute.into(),
        }
    }
}

impl fmt::Display for ConnectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source_node, self.source_attribute)
    }
}

impl FromStr for ConnectionRef {
    type Err = ConnectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Node names never contain a dot, attribute paths may
        match s.split_once('.') {
            Some((node, attr)) if !node.is_empty() && !attr.is_empty() => {
                Ok(Self::new(node, attr))
            }
            _ => Err(ConnectionParseError(s.to_string())),
        }
    }
}

impl From<ConnectionRef> for String {
    fn from(connection: ConnectionRef) -> Self {
        connection.to_string()
    }
}

impl TryFrom<String> for ConnectionRef {
    type Error = ConnectionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Error when a connection string is not `node.attribute`
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid connection '{0}', expected '<node>.<attribute>'")]
pub struct ConnectionParseError(pub String);

/// A live incoming connection reported by the host scene graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingConnection<H> {
    /// Node driving the connection
    pub source: H,
    /// Attribute on the source node
    pub source_attribute: String,
    /// Attribute on the queried node
    pub destination_attribute: String,
}

impl<H> IncomingConnection<H> {
    /// Create a new incoming connection
    pub fn new(
        source: H,
        source_attribute: impl Into<String>,
        destination_attribute: impl Into<String>,
    ) -> Self {
        Self {
            source,
            source_attribute: source_attribute.into(),
            destination_attribute: destination_attribute.into(),
        }
    }
}
