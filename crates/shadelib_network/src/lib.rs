// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shading-network capture and reconstruction for the shader library.
//!
//! This crate turns a live shading network inside a host scene graph into a
//! portable JSON file and back:
//! - Upstream graph walking from a root material
//! - Attribute snapshots (literal values and incoming connections)
//! - A typed network model with a reserved-envelope file format
//! - Three-phase reconstruction with collision-safe renaming
//! - A shader library index with idempotent loading
//!
//! ## Architecture
//!
//! The host application is reached only through the [`SceneGraph`] trait.
//! [`MemoryScene`] implements it in memory for tests and headless tooling.
//! Every operation that can lose data records an [`Issue`] in a [`Report`]
//! instead of failing the whole batch.

pub mod value;
pub mod connection;
pub mod node;
pub mod network;
pub mod host;
pub mod memory;
pub mod report;
pub mod settings;
pub mod walker;
pub mod snapshot;
pub mod reconstruct;
pub mod library;
pub mod descriptor;

pub use value::AttributeValue;
pub use connection::{ConnectionRef, IncomingConnection};
pub use node::{NodeKind, ShaderNodeRecord};
pub use network::{NetworkError, ShadingNetwork, Thumbnail};
pub use host::{HostError, SceneGraph};
pub use memory::{MemoryScene, NodeId, NodeTemplate};
pub use report::{Issue, Report};
pub use settings::{LibrarySettings, SettingsError};
pub use walker::walk;
pub use snapshot::{capture, snapshot};
pub use reconstruct::Reconstructor;
pub use library::{ExportOutcome, LoadOutcome, LoadState, ShaderLibrary, ShaderLibraryEntry};
pub use descriptor::{apply_descriptor, unload_descriptor, ApplyOptions, Binding, DescriptorError, ShadingDescriptor};
