//! Immutable GPU geometry with a node hierarchy.
//!
//! A [`Mesh`] owns the vertex and index buffers and the list of nodes
//! (bones) its vertices are attached to. Meshes are shared between models
//! through `Arc<Mesh>`; everything that changes per instance lives in
//! [`Model`](super::model::Model).

use std::sync::Arc;

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector2, Vector3};
use wgpu::util::DeviceExt;

use crate::{error::RenderError, uniforms::MAX_BONES};

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Vertex layout shared by every scene shader.
///
/// Rigid geometry names the single node it hangs off in `bones[0]` with a
/// weight of 1; skinned geometry blends up to four nodes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bones: [u8; 4],
    pub weights: [f32; 4],
}

impl ModelVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2,
        2 => Float32x3,
        3 => Float32x3,
        4 => Uint8x4,
        5 => Float32x4,
    ];

    /// A vertex rigidly attached to `node`.
    pub fn rigid(position: [f32; 3], tex_coords: [f32; 2], normal: [f32; 3], node: u8) -> Self {
        Self {
            position,
            tex_coords,
            normal,
            tangent: [0.0; 3],
            bones: [node, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// One entry of the node hierarchy, stored depth-first so parents precede children.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub parent: Option<usize>,
    /// Transform relative to the parent in the mesh's rest pose.
    pub default_transform: Matrix4<f32>,
    /// Maps mesh space into this node's space. Identity for rigid nodes.
    pub inverse_bind: Matrix4<f32>,
}

impl Node {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            default_transform: Matrix4::identity(),
            inverse_bind: Matrix4::identity(),
        }
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    /// Shared with every [`Model`](super::model::Model) built from this mesh.
    pub nodes: Arc<[Node]>,
    /// Bounding sphere radius around the mesh origin.
    pub radius: f32,
}

impl Mesh {
    /// Upload geometry after checking the node hierarchy and vertex attachments.
    ///
    /// An empty node list gets a single root node.
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        vertices: &[ModelVertex],
        indices: &[u32],
        mut nodes: Vec<Node>,
    ) -> Result<Self, RenderError> {
        if nodes.is_empty() {
            nodes.push(Node::root(name));
        }
        validate(name, vertices, indices, &nodes)?;
        if vertices.is_empty() {
            log::warn!("mesh `{name}` has no vertices");
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let radius = vertices
            .iter()
            .map(|v| Vector3::from(v.position).magnitude())
            .fold(0.0, f32::max);

        log::debug!(
            "mesh `{name}`: {} vertices, {} indices, {} nodes",
            vertices.len(),
            indices.len(),
            nodes.len()
        );
        Ok(Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: indices.len() as u32,
            nodes: Arc::from(nodes),
            radius,
        })
    }

    /// An axis aligned cube centred on the origin, with tangents.
    pub fn cube(device: &wgpu::Device, size: f32) -> Result<Self, RenderError> {
        let (vertices, indices) = cube_geometry(size);
        Self::new(device, "cube", &vertices, &indices, Vec::new())
    }

    /// A square in the XZ plane facing up, centred on the origin.
    pub fn plane(device: &wgpu::Device, size: f32) -> Result<Self, RenderError> {
        let (vertices, indices) = plane_geometry(size);
        Self::new(device, "plane", &vertices, &indices, Vec::new())
    }

    /// A UV sphere centred on the origin.
    pub fn sphere(device: &wgpu::Device, radius: f32, segments: u32) -> Result<Self, RenderError> {
        let (vertices, indices) = sphere_geometry(radius, segments);
        Self::new(device, "sphere", &vertices, &indices, Vec::new())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

pub(crate) fn validate(
    name: &str,
    vertices: &[ModelVertex],
    indices: &[u32],
    nodes: &[Node],
) -> Result<(), RenderError> {
    if nodes.len() > MAX_BONES {
        return Err(RenderError::TooManyBones {
            name: name.to_string(),
            max: MAX_BONES,
            got: nodes.len(),
        });
    }
    for (index, node) in nodes.iter().enumerate() {
        match node.parent {
            None if index != 0 => {
                return Err(RenderError::MeshLoad {
                    name: name.to_string(),
                    reason: format!("node {index} has no parent but is not the root"),
                });
            }
            Some(parent) if parent >= index => {
                return Err(RenderError::MeshLoad {
                    name: name.to_string(),
                    reason: format!("node {index} is stored before its parent {parent}"),
                });
            }
            _ => {}
        }
    }
    if indices.len() % 3 != 0 {
        return Err(RenderError::MeshLoad {
            name: name.to_string(),
            reason: format!("{} indices do not form whole triangles", indices.len()),
        });
    }
    if let Some(index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        return Err(RenderError::MeshLoad {
            name: name.to_string(),
            reason: format!("index {index} is out of range for {} vertices", vertices.len()),
        });
    }
    let weighted_bone_out_of_range = vertices.iter().any(|v| {
        v.bones
            .iter()
            .zip(v.weights)
            .any(|(&bone, weight)| weight > 0.0 && bone as usize >= nodes.len())
    });
    if weighted_bone_out_of_range {
        return Err(RenderError::MeshLoad {
            name: name.to_string(),
            reason: "a vertex references a node that does not exist".to_string(),
        });
    }
    Ok(())
}

/// Fill in per-vertex tangents from triangle positions and texture coordinates.
///
/// Tangents of shared vertices are averaged and normalised. Triangles with
/// degenerate texture coordinates contribute nothing.
pub fn compute_tangents(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut accumulated = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];

    for c in indices.chunks_exact(3) {
        let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
        let pos0: Vector3<f32> = vertices[i0].position.into();
        let pos1: Vector3<f32> = vertices[i1].position.into();
        let pos2: Vector3<f32> = vertices[i2].position.into();

        let uv0: Vector2<f32> = vertices[i0].tex_coords.into();
        let uv1: Vector2<f32> = vertices[i1].tex_coords.into();
        let uv2: Vector2<f32> = vertices[i2].tex_coords.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        // Solve
        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        // for T.
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) / det;
        for i in [i0, i1, i2] {
            accumulated[i] += tangent;
        }
    }

    for (vertex, tangent) in vertices.iter_mut().zip(accumulated) {
        if tangent.magnitude2() > 0.0 {
            vertex.tangent = tangent.normalize().into();
        }
    }
}

pub(crate) fn cube_geometry(size: f32) -> (Vec<ModelVertex>, Vec<u32>) {
    let h = size * 0.5;
    // (normal, u axis, v axis) per face; v runs down the texture.
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
        ([0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let n = Vector3::from(normal);
        let u = Vector3::from(u);
        let v = Vector3::from(v);
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = (n + u * su + v * sv) * h;
            let mut vertex = ModelVertex::rigid(
                position.into(),
                [(su + 1.0) * 0.5, (sv + 1.0) * 0.5],
                normal,
                0,
            );
            vertex.tangent = u.into();
            vertices.push(vertex);
        }
        // Clockwise seen from outside, the front face in a left-handed world.
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

pub(crate) fn plane_geometry(size: f32) -> (Vec<ModelVertex>, Vec<u32>) {
    let h = size * 0.5;
    let corners = [(-h, h, 0.0, 0.0), (h, h, 1.0, 0.0), (h, -h, 1.0, 1.0), (-h, -h, 0.0, 1.0)];
    let vertices = corners
        .iter()
        .map(|&(x, z, u, v)| {
            let mut vertex = ModelVertex::rigid([x, 0.0, z], [u, v], [0.0, 1.0, 0.0], 0);
            vertex.tangent = [1.0, 0.0, 0.0];
            vertex
        })
        .collect();
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

/// `segments` slices around Y and half as many stacks from pole to pole.
pub(crate) fn sphere_geometry(radius: f32, segments: u32) -> (Vec<ModelVertex>, Vec<u32>) {
    let slices = segments.max(3);
    let stacks = (slices / 2).max(2);
    let mut vertices = Vec::with_capacity(((slices + 1) * (stacks + 1)) as usize);
    for i in 0..=stacks {
        let phi = std::f32::consts::PI * i as f32 / stacks as f32;
        for j in 0..=slices {
            let theta = std::f32::consts::TAU * j as f32 / slices as f32;
            let normal = [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()];
            let mut vertex = ModelVertex::rigid(
                [normal[0] * radius, normal[1] * radius, normal[2] * radius],
                [j as f32 / slices as f32, i as f32 / stacks as f32],
                normal,
                0,
            );
            vertex.tangent = [-theta.sin(), 0.0, theta.cos()];
            vertices.push(vertex);
        }
    }

    let ring = slices + 1;
    let mut indices = Vec::with_capacity((slices * stacks * 6) as usize);
    for i in 0..stacks {
        for j in 0..slices {
            let a = i * ring + j;
            let b = a + 1;
            let c = a + ring;
            let d = c + 1;
            // Triangles touching a pole collapse to a line; leave them out.
            if i != 0 {
                indices.extend_from_slice(&[a, b, c]);
            }
            if i != stacks - 1 {
                indices.extend_from_slice(&[b, d, c]);
            }
        }
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    fn node(parent: Option<usize>) -> Node {
        Node {
            parent,
            ..Node::root("n")
        }
    }

    #[test]
    fn vertex_stride_matches_attributes() {
        assert_eq!(std::mem::size_of::<ModelVertex>(), 64);
        let layout = ModelVertex::desc();
        assert_eq!(layout.attributes.len(), 6);
        assert_eq!(layout.attributes[4].offset, 44);
        assert_eq!(layout.attributes[5].offset, 48);
    }

    #[test]
    fn cube_winding_is_clockwise_from_outside() {
        let (vertices, indices) = cube_geometry(2.0);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        for tri in indices.chunks_exact(3) {
            let a = Vector3::from(vertices[tri[0] as usize].position);
            let b = Vector3::from(vertices[tri[1] as usize].position);
            let c = Vector3::from(vertices[tri[2] as usize].position);
            let normal = Vector3::from(vertices[tri[0] as usize].normal);
            // In a left-handed system a clockwise triangle has (b-a)x(c-a) along its outward normal.
            assert!((b - a).cross(c - a).dot(normal) > 0.0);
        }
    }

    #[test]
    fn sphere_faces_outwards() {
        let (vertices, indices) = sphere_geometry(3.0, 16);
        assert_eq!(indices.len() % 3, 0);
        for v in &vertices {
            assert!((Vector3::from(v.position).magnitude() - 3.0).abs() < 1e-4);
        }
        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vector3::from(vertices[i as usize].position));
            let centre = (a + b + c) / 3.0;
            assert!((b - a).cross(c - a).dot(centre) > 0.0);
        }
    }

    #[test]
    fn tangents_follow_u_direction() {
        let (mut vertices, indices) = plane_geometry(4.0);
        for v in vertices.iter_mut() {
            v.tangent = [0.0; 3];
        }
        compute_tangents(&mut vertices, &indices);
        for v in &vertices {
            assert!((v.tangent[0] - 1.0).abs() < 1e-5, "{:?}", v.tangent);
        }
    }

    #[test]
    fn hierarchy_must_be_depth_first() {
        let (vertices, indices) = plane_geometry(1.0);
        assert!(validate("ok", &vertices, &indices, &[node(None), node(Some(0)), node(Some(1))]).is_ok());
        assert!(matches!(
            validate("bad", &vertices, &indices, &[node(None), node(Some(2)), node(Some(0))]),
            Err(RenderError::MeshLoad { .. })
        ));
    }

    #[test]
    fn too_many_nodes_is_an_error() {
        let mut nodes = vec![node(None)];
        nodes.extend((1..=MAX_BONES).map(|i| node(Some(i - 1))));
        assert!(matches!(
            validate("big", &[], &[], &nodes),
            Err(RenderError::TooManyBones { got, .. }) if got == MAX_BONES + 1
        ));
    }

    #[test]
    fn vertex_bones_must_exist() {
        let (mut vertices, indices) = plane_geometry(1.0);
        vertices[0].bones[0] = 3;
        assert!(validate("orphan", &vertices, &indices, &[node(None)]).is_err());
    }
}
