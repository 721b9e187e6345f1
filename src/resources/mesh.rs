//! Mesh loading from OBJ and glTF files.
//!
//! Geometry is taken as authored. OBJ files carry no hierarchy, so every vertex
//! hangs off a single root node. glTF node trees are flattened depth-first;
//! skinned primitives keep their joints and weights, every other primitive is
//! attached rigidly to the node that owns it.

use std::{
    collections::HashMap,
    io::{BufReader, Cursor},
};

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    data_structures::mesh::{Mesh, ModelVertex, Node, compute_tangents},
    error::RenderError,
    resources::{extension, load_binary, load_string},
};

/// Load a mesh, choosing the parser from the file extension.
pub async fn load_mesh(device: &wgpu::Device, file_name: &str) -> anyhow::Result<Mesh> {
    match extension(file_name).as_deref() {
        Some("obj") => load_obj(device, file_name).await,
        Some("gltf" | "glb") => load_gltf(device, file_name).await,
        _ => Err(RenderError::UnsupportedMeshFormat(file_name.to_string()).into()),
    }
}

pub async fn load_obj(device: &wgpu::Device, file_name: &str) -> anyhow::Result<Mesh> {
    let obj_text = load_string(file_name).await?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));
    let (models, _) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        // Materials come from the scene, not the file.
        |_| async move { Ok((Vec::new(), Default::default())) },
    )
    .await
    .map_err(|e| RenderError::MeshLoad {
        name: file_name.to_string(),
        reason: e.to_string(),
    })?;

    let (vertices, indices) = obj_geometry(&models);
    Ok(Mesh::new(device, file_name, &vertices, &indices, Vec::new())?)
}

/// Merge every object of an OBJ file into one vertex and index list.
pub(crate) fn obj_geometry(models: &[tobj::Model]) -> (Vec<ModelVertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for m in models {
        let base = vertices.len() as u32;
        let mesh = &m.mesh;
        vertices.extend((0..mesh.positions.len() / 3).map(|i| {
            ModelVertex::rigid(
                [
                    mesh.positions[i * 3],
                    mesh.positions[i * 3 + 1],
                    mesh.positions[i * 3 + 2],
                ],
                [
                    mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                    1.0 - mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                ],
                [
                    mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                    mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                    mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                ],
                0,
            )
        }));
        indices.extend(mesh.indices.iter().map(|i| i + base));
    }
    compute_tangents(&mut vertices, &indices);
    (vertices, indices)
}

/// Flatten the default scene's node tree depth-first.
///
/// Returns the nodes and a map from glTF node index to position in that list.
/// A scene with several roots gets a synthetic root above them.
pub(crate) fn flatten_nodes(document: &gltf::Document) -> (Vec<Node>, HashMap<usize, usize>) {
    fn visit(node: gltf::Node, parent: Option<usize>, nodes: &mut Vec<Node>, map: &mut HashMap<usize, usize>) {
        let index = nodes.len();
        map.insert(node.index(), index);
        nodes.push(Node {
            name: node.name().unwrap_or("node").to_string(),
            parent,
            default_transform: Matrix4::from(node.transform().matrix()),
            inverse_bind: Matrix4::identity(),
        });
        for child in node.children() {
            visit(child, Some(index), nodes, map);
        }
    }

    let mut nodes = Vec::new();
    let mut map = HashMap::new();
    let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        return (nodes, map);
    };
    let roots: Vec<_> = scene.nodes().collect();
    let parent = if roots.len() == 1 {
        None
    } else {
        nodes.push(Node::root(scene.name().unwrap_or("scene")));
        Some(0)
    };
    for root in roots {
        visit(root, parent, &mut nodes, &mut map);
    }
    (nodes, map)
}

pub async fn load_gltf(device: &wgpu::Device, file_name: &str) -> anyhow::Result<Mesh> {
    let data = load_binary(file_name).await?;
    let gltf = gltf::Gltf::from_slice(&data).map_err(|e| RenderError::MeshLoad {
        name: file_name.to_string(),
        reason: e.to_string(),
    })?;

    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf.blob.as_deref().ok_or_else(|| RenderError::MeshLoad {
                    name: file_name.to_string(),
                    reason: "binary chunk missing".to_string(),
                })?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => buffer_data.push(load_binary(uri).await?),
        }
    }

    let (mut nodes, node_map) = flatten_nodes(&gltf.document);
    let (vertices, indices) = gltf_geometry(file_name, &gltf.document, &buffer_data, &mut nodes, &node_map)?;
    Ok(Mesh::new(device, file_name, &vertices, &indices, nodes)?)
}

fn gltf_geometry(
    file_name: &str,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    nodes: &mut [Node],
    node_map: &HashMap<usize, usize>,
) -> Result<(Vec<ModelVertex>, Vec<u32>), RenderError> {
    let node_slot = |index: usize| -> Result<u8, RenderError> {
        node_map
            .get(&index)
            .and_then(|&i| u8::try_from(i).ok())
            .ok_or_else(|| RenderError::MeshLoad {
                name: file_name.to_string(),
                reason: format!("node {index} is not part of the scene"),
            })
    };

    for skin in document.skins() {
        let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let inverse_binds: Vec<[[f32; 4]; 4]> = reader
            .read_inverse_bind_matrices()
            .map(|iter| iter.collect())
            .unwrap_or_default();
        for (joint, node) in skin.joints().enumerate() {
            if let (Some(&slot), Some(matrix)) = (node_map.get(&node.index()), inverse_binds.get(joint)) {
                nodes[slot].inverse_bind = Matrix4::from(*matrix);
            }
        }
    }

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for node in document.nodes() {
        let Some(mesh) = node.mesh() else {
            continue;
        };
        let owner = node_slot(node.index())?;
        let joint_slots = node
            .skin()
            .map(|skin| skin.joints().map(|joint| node_slot(joint.index())).collect::<Result<Vec<_>, _>>())
            .transpose()?;

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("`{file_name}`: skipping a {:?} primitive", primitive.mode());
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let Some(positions) = reader.read_positions() else {
                log::warn!("`{file_name}`: skipping a primitive without positions");
                continue;
            };
            let base = vertices.len();
            vertices.extend(positions.map(|p| ModelVertex::rigid(p, [0.0; 2], [0.0; 3], owner)));
            let added = &mut vertices[base..];

            if let Some(normals) = reader.read_normals() {
                for (v, n) in added.iter_mut().zip(normals) {
                    v.normal = n;
                }
            }
            if let Some(uvs) = reader.read_tex_coords(0) {
                for (v, uv) in added.iter_mut().zip(uvs.into_f32()) {
                    v.tex_coords = uv;
                }
            }
            if let (Some(slots), Some(joints), Some(weights)) =
                (&joint_slots, reader.read_joints(0), reader.read_weights(0))
            {
                for (v, (joint, weight)) in added.iter_mut().zip(joints.into_u16().zip(weights.into_f32())) {
                    for i in 0..4 {
                        v.bones[i] = slots.get(joint[i] as usize).copied().unwrap_or(owner);
                        v.weights[i] = weight[i];
                    }
                }
            }

            let base = base as u32;
            match reader.read_indices() {
                Some(read) => indices.extend(read.into_u32().map(|i| i + base)),
                None => indices.extend(base..vertices.len() as u32),
            }
        }
    }
    compute_tangents(&mut vertices, &indices);
    Ok((vertices, indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obj_objects_are_merged_with_offset_indices() {
        let obj = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
f 1/1 2/2 3/3
o second
v 0 0 1
v 1 0 1
v 0 1 1
f 4 5 6
";
        let (models, _) = tobj::load_obj_buf(
            &mut BufReader::new(Cursor::new(obj)),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Ok((Vec::new(), Default::default())),
        )
        .unwrap();
        let (vertices, indices) = obj_geometry(&models);
        assert_eq!(vertices.len(), 6);
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        // v is flipped so textures are not upside down
        assert_eq!(vertices[2].tex_coords, [0.0, 0.0]);
        assert_eq!(vertices[0].tex_coords, [0.0, 1.0]);
        assert!(vertices.iter().all(|v| v.bones[0] == 0 && v.weights[0] == 1.0));
    }

    #[test]
    fn gltf_nodes_flatten_depth_first() {
        let json = br#"{
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [ { "nodes": [0] } ],
            "nodes": [
                { "name": "root", "children": [1, 2] },
                { "name": "arm", "translation": [0.0, 1.0, 0.0] },
                { "name": "leg", "children": [3] },
                { "name": "foot" }
            ]
        }"#;
        let gltf = gltf::Gltf::from_slice(json).unwrap();
        let (nodes, map) = flatten_nodes(&gltf.document);
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["root", "arm", "leg", "foot"]);
        assert_eq!(nodes[3].parent, Some(2));
        assert_eq!(nodes[1].default_transform.w.y, 1.0);
        assert_eq!(map[&3], 3);
    }

    #[test]
    fn several_scene_roots_get_a_common_parent() {
        let json = br#"{
            "asset": { "version": "2.0" },
            "scenes": [ { "name": "pair", "nodes": [0, 1] } ],
            "nodes": [ { "name": "a" }, { "name": "b" } ]
        }"#;
        let gltf = gltf::Gltf::from_slice(json).unwrap();
        let (nodes, map) = flatten_nodes(&gltf.document);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].name, "pair");
        assert_eq!(nodes[1].parent, Some(0));
        assert_eq!(nodes[2].parent, Some(0));
        assert_eq!(map[&1], 2);
    }
}
