// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capture of live shading nodes into records.

use crate::connection::ConnectionRef;
use crate::host::{HostError, SceneGraph};
use crate::network::ShadingNetwork;
use crate::node::ShaderNodeRecord;
use crate::report::{Issue, Report};
use crate::walker::walk;
use std::collections::HashSet;

/// Logical name of a node captured under a prefix
fn logical_name(name: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => format!("{name}_{prefix}"),
        None => name.to_string(),
    }
}

/// Capture one node
///
/// Connected attributes become [`ConnectionRef`]s and every other enumerable
/// attribute is read as a literal. Attributes the host cannot evaluate are
/// recorded as [`Issue::UnreadableAttribute`] and left out, as are infinite
/// and NaN values, which the file format cannot hold. The optional
/// prefix is appended to this node's name and to every source name, so the
/// same physical subgraph can be captured several times.
pub fn snapshot<S>(
    scene: &S,
    node: &S::Handle,
    name_prefix: Option<&str>,
    report: &mut Report,
) -> Result<ShaderNodeRecord, HostError>
where
    S: SceneGraph + ?Sized,
{
    let node_name = scene.node_name(node)?;
    let mut record = ShaderNodeRecord::new(
        logical_name(&node_name, name_prefix),
        scene.node_kind(node)?,
        scene.object_type(node)?,
    );

    let mut connected = HashSet::new();
    for incoming in scene.list_incoming_connections(node)? {
        let source_name = scene.node_name(&incoming.source)?;
        let connection = ConnectionRef::new(
            logical_name(&source_name, name_prefix),
            incoming.source_attribute,
        );
        connected.insert(incoming.destination_attribute.clone());
        record.insert_connection(incoming.destination_attribute, connection);
    }

    for attribute in scene.list_attributes(node)? {
        if connected.contains(&attribute) {
            continue;
        }
        let value = scene.get_attr(node, &attribute).and_then(|value| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(HostError::UnsupportedValue {
                    node: node_name.clone(),
                    attribute: attribute.clone(),
                    reason: format!("value {value} is not finite"),
                })
            }
        });
        match value {
            Ok(value) => record.insert_attribute(attribute, value),
            Err(source) => report.record(Issue::UnreadableAttribute {
                node: node_name.clone(),
                attribute,
                source,
            }),
        }
    }

    Ok(record)
}

/// Capture the full upstream network of a root node
///
/// The returned network is closed: every connection source is one of its
/// records, because the walk only stops at nodes with no incoming
/// connections.
pub fn capture<S>(
    scene: &S,
    root: &S::Handle,
    name_prefix: Option<&str>,
    report: &mut Report,
) -> Result<ShadingNetwork, HostError>
where
    S: SceneGraph + ?Sized,
{
    let mut network = ShadingNetwork::new();
    for (index, node) in walk(scene, root)?.iter().enumerate() {
        let record = snapshot(scene, node, name_prefix, report)?;
        if index == 0 {
            network.set_root(record.name.clone());
        }
        network.insert(record);
    }

    tracing::debug!(
        "Captured shading network {:?} with {} nodes",
        network.root(),
        network.len()
    );
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryScene, NodeId};
    use crate::node::NodeKind;
    use crate::value::AttributeValue;

    fn textured_scene() -> (MemoryScene, NodeId) {
        let mut scene = MemoryScene::with_standard_types();
        let m = scene.add_node("lambert", "Rock01").unwrap();
        let tex = scene.add_node("file", "rockDiffuse").unwrap();
        let place = scene.add_node("place2dTexture", "rockPlace").unwrap();
        scene.connect(&tex, "outColor", &m, "color").unwrap();
        scene.connect(&place, "outUV", &tex, "uvCoord").unwrap();
        scene
            .set_attr(&tex, "fileTextureName", &"sourceimages/rock.tx".into())
            .unwrap();
        (scene, m)
    }

    #[test]
    fn test_snapshot_splits_literals_and_connections() {
        let (scene, m) = textured_scene();
        let mut report = Report::new();
        let record = snapshot(&scene, &m, None, &mut report).unwrap();

        assert_eq!(record.name, "Rock01");
        assert_eq!(record.node_kind, NodeKind::Shader);
        assert_eq!(record.object_type, "lambert");
        assert_eq!(record.connections["color"], ConnectionRef::new("rockDiffuse", "outColor"));
        assert!(!record.attributes.contains_key("color"));
        assert_eq!(record.attributes["diffuse"], AttributeValue::Scalar(0.8));

        // The message attribute cannot be evaluated and is dropped
        assert!(!record.attributes.contains_key("message"));
        assert!(matches!(
            report.issues(),
            [Issue::UnreadableAttribute { attribute, .. }] if attribute == "message"
        ));
    }

    #[test]
    fn test_snapshot_with_prefix() {
        let (scene, m) = textured_scene();
        let mut report = Report::new();
        let record = snapshot(&scene, &m, Some("inst2"), &mut report).unwrap();

        assert_eq!(record.name, "Rock01_inst2");
        assert_eq!(record.connections["color"].source_node, "rockDiffuse_inst2");
    }

    #[test]
    fn test_capture_is_closed() {
        let (scene, m) = textured_scene();
        let mut report = Report::new();
        let network = capture(&scene, &m, None, &mut report).unwrap();

        assert_eq!(network.len(), 3);
        assert_eq!(network.root(), Some("Rock01"));
        assert!(network.is_closed());
        assert_eq!(
            network.get("rockDiffuse").unwrap().attributes["fileTextureName"],
            AttributeValue::Text("sourceimages/rock.tx".to_string())
        );

        let prefixed = capture(&scene, &m, Some("b"), &mut report).unwrap();
        assert!(prefixed.is_closed());
        assert_eq!(prefixed.root(), Some("Rock01_b"));
    }

    #[test]
    fn test_non_finite_value_is_dropped() {
        let (mut scene, m) = textured_scene();
        scene.set_attr(&m, "diffuse", &AttributeValue::Scalar(f64::INFINITY)).unwrap();
        let mut report = Report::new();

        let network = capture(&scene, &m, None, &mut report).unwrap();
        assert!(!network.get("Rock01").unwrap().attributes.contains_key("diffuse"));
        assert!(report
            .issues()
            .iter()
            .any(|i| matches!(i, Issue::UnreadableAttribute { attribute, .. } if attribute == "diffuse")));

        // The rest of the shader still exports
        let loaded = ShadingNetwork::from_json_str(&network.to_json_string().unwrap()).unwrap();
        assert_eq!(loaded, network);
    }

    #[test]
    fn test_snapshot_is_read_only() {
        let (scene, m) = textured_scene();
        let writes_before = scene.attribute_writes().len();
        let created_before = scene.created_count();
        let mut report = Report::new();
        capture(&scene, &m, None, &mut report).unwrap();
        assert_eq!(scene.attribute_writes().len(), writes_before);
        assert_eq!(scene.created_count(), created_before);
    }
}
