//! A drawable: shared geometry, its own pose, a material and GPU constants.

use std::sync::Arc;

use cgmath::{Matrix4, Vector3};

use crate::{
    data_structures::{
        mesh::Mesh,
        model::Model,
        texture::{DefaultTextures, TextureSet},
    },
    material::Material,
    pipelines::{
        Layouts, PipelineCache,
        shader::ShaderLibrary,
        state::{SamplerType, Samplers},
    },
    uniforms::PerModelConstants,
};

/// Per-model constants for `model` tinted with `colour`.
///
/// The world matrix is the root node's; bones are world × inverse bind for
/// every node, truncated to [`MAX_BONES`](crate::uniforms::MAX_BONES).
pub fn model_constants(model: &Model, colour: Vector3<f32>) -> PerModelConstants {
    let mut constants = PerModelConstants {
        world: model.world_matrix(0).into(),
        colour: colour.into(),
        ..Default::default()
    };
    let mut count = 0;
    for (slot, bone) in constants.bones.iter_mut().zip(model.bone_matrices()) {
        *slot = bone.into();
        count += 1;
    }
    constants.bone_count = count as u32;
    constants
}

#[derive(Debug)]
pub struct SceneModel {
    name: String,
    mesh: Arc<Mesh>,
    model: Model,
    material: Material,
    textures: Arc<TextureSet>,
    colour: Vector3<f32>,
    outline: bool,
    casts_shadows: bool,
    buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    /// `None` until prepared, and again whenever textures or sampler change.
    material_bind_group: Option<wgpu::BindGroup>,
}

impl SceneModel {
    pub fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        name: impl Into<String>,
        mesh: Arc<Mesh>,
        textures: Arc<TextureSet>,
        material: Material,
    ) -> Self {
        let name = name.into();
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{name} model constants")),
            size: size_of::<PerModelConstants>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let model_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{name} model bind group")),
            layout: &layouts.model,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self {
            model: Model::for_mesh(&mesh),
            name,
            mesh,
            material,
            textures,
            colour: Vector3::new(1.0, 1.0, 1.0),
            outline: false,
            casts_shadows: true,
            buffer,
            model_bind_group,
            material_bind_group: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Shaders and fixed-function state can change freely; the pipeline for the
    /// new combination is built on the next prepare.
    pub fn set_material(&mut self, material: Material) {
        if material.sampler != self.material.sampler {
            self.material_bind_group = None;
        }
        self.material = material;
    }

    pub fn textures(&self) -> &TextureSet {
        &self.textures
    }

    pub fn set_textures(&mut self, textures: Arc<TextureSet>) {
        self.textures = textures;
        self.material_bind_group = None;
    }

    pub fn set_sampler(&mut self, sampler: SamplerType) {
        let material = self.material.with_sampler(sampler);
        self.set_material(material);
    }

    pub fn colour(&self) -> Vector3<f32> {
        self.colour
    }

    pub fn set_colour(&mut self, colour: Vector3<f32>) {
        self.colour = colour;
    }

    pub fn has_outline(&self) -> bool {
        self.outline
    }

    pub fn set_outline(&mut self, outline: bool) {
        self.outline = outline;
    }

    pub fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    pub fn set_casts_shadows(&mut self, casts_shadows: bool) {
        self.casts_shadows = casts_shadows;
    }

    pub fn position(&self) -> Vector3<f32> {
        self.model.position(0)
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.model.set_position(position, 0);
    }

    pub fn set_rotation(&mut self, rotation: Vector3<f32>) {
        self.model.set_rotation(rotation, 0);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.model.set_uniform_scale(scale);
    }

    /// Root position as of the last constant upload.
    pub fn world_position(&self) -> Vector3<f32> {
        self.model.world_matrix(0).w.truncate()
    }

    pub fn world_matrix(&self) -> Matrix4<f32> {
        self.model.world_matrix(0)
    }

    /// Build the pipelines this model draws with and, if needed, its material
    /// bind group.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        layouts: &Layouts,
        samplers: &Samplers,
        defaults: &DefaultTextures,
        cache: &mut PipelineCache,
        shaders: &ShaderLibrary,
    ) {
        cache.prepare(device, shaders, self.material.pipeline_key());
        if self.outline {
            cache.prepare(device, shaders, Material::outline().pipeline_key());
        }
        if self.material_bind_group.is_none() {
            self.material_bind_group = Some(self.textures.bind_group(
                device,
                &layouts.material,
                samplers.get(self.material.sampler),
                defaults,
            ));
        }
    }

    /// Recompute the node hierarchy and upload this model's constants.
    pub fn write_constants(&mut self, queue: &wgpu::Queue) {
        self.model.calculate_world_matrices();
        let constants = model_constants(&self.model, self.colour);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[constants]));
    }

    pub(crate) fn model_bind_group(&self) -> &wgpu::BindGroup {
        &self.model_bind_group
    }

    pub(crate) fn material_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.material_bind_group.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data_structures::mesh::Node, uniforms::MAX_BONES};
    use cgmath::{Matrix4, SquareMatrix};

    #[test]
    fn constants_carry_root_world_and_colour() {
        let mut model = Model::single("box");
        model.set_position(Vector3::new(1.0, 2.0, 3.0), 0);
        model.calculate_world_matrices();
        let constants = model_constants(&model, Vector3::new(0.5, 0.25, 1.0));
        assert_eq!(constants.world[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(constants.colour, [0.5, 0.25, 1.0]);
        assert_eq!(constants.bone_count, 1);
        assert_eq!(constants.bones[0], constants.world);
    }

    #[test]
    fn bones_apply_inverse_bind() {
        let child = Node {
            parent: Some(0),
            default_transform: Matrix4::from_translation(Vector3::new(0.0, 4.0, 0.0)),
            inverse_bind: Matrix4::from_translation(Vector3::new(0.0, -4.0, 0.0)),
            ..Node::root("child")
        };
        let model = Model::new(std::sync::Arc::from(vec![Node::root("root"), child]));
        let constants = model_constants(&model, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(constants.bone_count, 2);
        let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
        assert_eq!(constants.bones[1], identity);
    }

    #[test]
    fn bone_count_is_capped() {
        let nodes: Vec<Node> = (0..MAX_BONES + 6)
            .map(|i| Node {
                parent: if i == 0 { None } else { Some(0) },
                ..Node::root(format!("n{i}"))
            })
            .collect();
        let model = Model::new(std::sync::Arc::from(nodes));
        let constants = model_constants(&model, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(constants.bone_count as usize, MAX_BONES);
    }
}
