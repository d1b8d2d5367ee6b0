// SPDX-License-Identifier: MIT OR Apache-2.0
//! Upstream traversal of shading networks.

use crate::host::{HostError, SceneGraph};
use indexmap::IndexSet;

/// Collect a node and everything upstream of it
///
/// Follows incoming connections only. Each node is visited once even when it
/// is reachable along several paths or sits on a cycle. The result starts
/// with `root` and keeps depth-first visit order.
pub fn walk<S>(scene: &S, root: &S::Handle) -> Result<IndexSet<S::Handle>, HostError>
where
    S: SceneGraph + ?Sized,
{
    let mut visited = IndexSet::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.clone()) {
            continue;
        }

        let incoming = scene.list_incoming_connections(&node)?;
        // Reversed so the first connection is explored first
        for connection in incoming.into_iter().rev() {
            if !visited.contains(&connection.source) {
                stack.push(connection.source);
            }
        }
    }

    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryScene;

    #[test]
    fn test_diamond_visits_each_node_once() {
        // A feeds B and C, B and C both feed D
        let mut scene = MemoryScene::with_standard_types();
        let a = scene.add_node("place2dTexture", "A").unwrap();
        let b = scene.add_node("checker", "B").unwrap();
        let c = scene.add_node("file", "C").unwrap();
        let d = scene.add_node("lambert", "D").unwrap();
        scene.connect(&a, "outUV", &b, "uvCoord").unwrap();
        scene.connect(&a, "outUV", &c, "uvCoord").unwrap();
        scene.connect(&b, "outColor", &d, "color").unwrap();
        scene.connect(&c, "outColor", &d, "transparency").unwrap();

        let visited = walk(&scene, &d).unwrap();
        assert_eq!(visited.len(), 4);
        assert_eq!(visited.first(), Some(&d));
        for node in [a, b, c, d] {
            assert!(visited.contains(&node));
        }
    }

    #[test]
    fn test_cycle_terminates() {
        let mut scene = MemoryScene::with_standard_types();
        let m = scene.add_node("lambert", "M").unwrap();
        let b = scene.add_node("bump2d", "bump").unwrap();
        let t = scene.add_node("checker", "tex").unwrap();
        scene.connect(&b, "outNormal", &m, "normalCamera").unwrap();
        scene.connect(&t, "outAlpha", &b, "bumpValue").unwrap();
        scene.connect(&m, "outColor", &t, "color1").unwrap();

        let visited = walk(&scene, &m).unwrap();
        assert_eq!(visited.len(), 3);
    }

    #[test]
    fn test_downstream_nodes_ignored() {
        let mut scene = MemoryScene::with_standard_types();
        let m = scene.add_node("lambert", "M").unwrap();
        let sg = scene.create_shading_group("MSG").unwrap();
        scene.connect(&m, "outColor", &sg, "surfaceShader").unwrap();

        let visited = walk(&scene, &m).unwrap();
        assert_eq!(visited.len(), 1);
        assert!(!visited.contains(&sg));
    }

    #[test]
    fn test_missing_root_is_error() {
        let mut scene = MemoryScene::with_standard_types();
        let m = scene.add_node("lambert", "M").unwrap();
        scene.delete_node(&m).unwrap();
        assert!(walk(&scene, &m).is_err());
    }
}
