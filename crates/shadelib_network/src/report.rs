// SPDX-License-Identifier: MIT OR Apache-2.0
//! Non-fatal issues collected while capturing, loading and exporting.
//!
//! Per-node and per-attribute failures never stop a batch. They are logged
//! through `tracing` and kept in a [`Report`] so callers can audit what was
//! dropped.

use crate::host::HostError;

/// A recovered failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Issue {
    /// Attribute value could not be read during capture; it was dropped
    #[error("Attribute {node}.{attribute} skipped: {source}")]
    UnreadableAttribute {
        /// Node name
        node: String,
        /// Attribute name
        attribute: String,
        /// Host error
        source: HostError,
    },

    /// Connection source is not part of the network; the connection was skipped
    #[error("Connection {source_node}.{source_attribute} -> {node}.{attribute} skipped: source node missing")]
    DanglingConnection {
        /// Destination node
        node: String,
        /// Destination attribute
        attribute: String,
        /// Missing source node
        source_node: String,
        /// Source attribute
        source_attribute: String,
    },

    /// The host refused a connection between two existing nodes
    #[error("Connection {source_node}.{source_attribute} -> {node}.{attribute} failed: {source}")]
    ConnectFailure {
        /// Destination node
        node: String,
        /// Destination attribute
        attribute: String,
        /// Source node
        source_node: String,
        /// Source attribute
        source_attribute: String,
        /// Host error
        source: HostError,
    },

    /// A literal value could not be applied; the attribute was skipped
    #[error("setAttr {node}.{attribute} skipped: {source}")]
    AttributeApplyFailure {
        /// Node name
        node: String,
        /// Attribute name
        attribute: String,
        /// Host error
        source: HostError,
    },

    /// The canonical name was taken; the new node got another name
    #[error("Node name {requested} already exists, new node named {assigned}")]
    DuplicateMaterialName {
        /// Canonical name
        requested: String,
        /// Name given instead
        assigned: String,
    },

    /// A node of the network could not be created
    #[error("Could not create {object_type} node {node}: {source}")]
    NodeCreateFailure {
        /// Logical node name
        node: String,
        /// Requested type
        object_type: String,
        /// Host error
        source: HostError,
    },

    /// A node could not be given its final name
    #[error("Impossible to rename {node} to {target}: {source}")]
    RenameFailure {
        /// Current node name
        node: String,
        /// Requested name
        target: String,
        /// Host error
        source: HostError,
    },

    /// One shader of a batch export failed
    #[error("Export of shader {shader} failed: {reason}")]
    ExportFailure {
        /// Root node name
        shader: String,
        /// Error message
        reason: String,
    },

    /// A shape or node could not be released while unloading
    #[error("Impossible to unload {node}: {source}")]
    UnloadFailure {
        /// Shape or node name
        node: String,
        /// Host error
        source: HostError,
    },

    /// One shader of a batch load failed or was missing
    #[error("Load of shader {shader} failed: {reason}")]
    LoadFailure {
        /// Shader name
        shader: String,
        /// Error message
        reason: String,
    },

    /// A shape could not be bound to its shading group
    #[error("Impossible to set shading group {shading_group} to {shape}: {reason}")]
    BindFailure {
        /// Shape name
        shape: String,
        /// Shading group name
        shading_group: String,
        /// Error message
        reason: String,
    },
}

impl Issue {
    /// Whether the issue is expected noise rather than a warning
    ///
    /// Unreadable attributes are diagnostic or computed values that are not
    /// needed for reconstruction.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::UnreadableAttribute { .. })
    }
}

/// Collects issues raised during one or more operations
#[derive(Debug, Clone, Default)]
pub struct Report {
    issues: Vec<Issue>,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and keep an issue
    pub fn record(&mut self, issue: Issue) {
        if issue.is_benign() {
            tracing::debug!("{issue}");
        } else {
            tracing::warn!("{issue}");
        }
        self.issues.push(issue);
    }

    /// All recorded issues
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Issues logged as warnings
    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| !i.is_benign())
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Number of recorded issues
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Take the recorded issues, leaving the report empty
    pub fn drain(&mut self) -> Vec<Issue> {
        std::mem::take(&mut self.issues)
    }
}
