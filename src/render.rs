//! Draw ordering and the draw calls shared by every pass.
//!
//! The main camera pass draws in a fixed order: outline silhouettes first, then
//! opaque models, then blended models from the farthest to the nearest, and
//! finally the light models. [`draw_order`] computes that order from plain data
//! so it can be checked without a GPU; [`DrawModel`] issues the calls.

use cgmath::{InnerSpace, Vector3};

use crate::{data_structures::mesh::Mesh, scene_model::SceneModel};

/// What [`draw_order`] needs to know about one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub index: usize,
    pub blended: bool,
    pub outline: bool,
    pub position: Vector3<f32>,
}

impl DrawItem {
    pub fn of(index: usize, model: &SceneModel) -> Self {
        Self {
            index,
            blended: model.material().is_blended(),
            outline: model.has_outline(),
            position: model.world_position(),
        }
    }
}

/// Indices into the scene's model list, grouped by batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawOrder {
    pub outlines: Vec<usize>,
    pub opaque: Vec<usize>,
    /// Farthest from the camera first.
    pub blended: Vec<usize>,
}

pub fn draw_order(items: impl IntoIterator<Item = DrawItem>, camera: Vector3<f32>) -> DrawOrder {
    let mut order = DrawOrder::default();
    let mut blended = Vec::new();
    for item in items {
        if item.outline {
            order.outlines.push(item.index);
        }
        if item.blended {
            blended.push((item.index, (item.position - camera).magnitude2()));
        } else {
            order.opaque.push(item.index);
        }
    }
    blended.sort_by(|a, b| b.1.total_cmp(&a.1));
    order.blended = blended.into_iter().map(|(index, _)| index).collect();
    order
}

pub trait DrawModel {
    /// Bind the mesh buffers and draw all of its indices once.
    fn draw_mesh(&mut self, mesh: &Mesh);

    /// Draw with whatever pipeline and material are bound, using the model's
    /// own constants in group 1.
    fn draw_scene_model(&mut self, model: &SceneModel);

    /// Bind the model's material textures to group 2, then draw it.
    fn draw_material_model(&mut self, model: &SceneModel);
}

impl DrawModel for wgpu::RenderPass<'_> {
    fn draw_mesh(&mut self, mesh: &Mesh) {
        if mesh.num_elements == 0 {
            return;
        }
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.num_elements, 0, 0..1);
    }

    fn draw_scene_model(&mut self, model: &SceneModel) {
        self.set_bind_group(1, model.model_bind_group(), &[]);
        self.draw_mesh(model.mesh());
    }

    fn draw_material_model(&mut self, model: &SceneModel) {
        let Some(material) = model.material_bind_group() else {
            log::warn!("`{}` was drawn before its material was prepared", model.name());
            return;
        };
        self.set_bind_group(2, material, &[]);
        self.draw_scene_model(model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, blended: bool, z: f32) -> DrawItem {
        DrawItem {
            index,
            blended,
            outline: false,
            position: Vector3::new(0.0, 0.0, z),
        }
    }

    #[test]
    fn opaque_keeps_insertion_order() {
        let order = draw_order(
            [item(0, false, 50.0), item(1, false, 5.0), item(2, false, 20.0)],
            Vector3::new(0.0, 0.0, 0.0),
        );
        assert_eq!(order.opaque, vec![0, 1, 2]);
        assert!(order.blended.is_empty());
    }

    #[test]
    fn blended_sorted_back_to_front() {
        let order = draw_order(
            [
                item(0, true, 10.0),
                item(1, false, 0.0),
                item(2, true, 30.0),
                item(3, true, 20.0),
            ],
            Vector3::new(0.0, 0.0, 0.0),
        );
        assert_eq!(order.opaque, vec![1]);
        assert_eq!(order.blended, vec![2, 3, 0]);
    }

    #[test]
    fn sorting_follows_the_camera() {
        let order = draw_order([item(0, true, 10.0), item(1, true, 30.0)], Vector3::new(0.0, 0.0, 40.0));
        assert_eq!(order.blended, vec![0, 1]);
    }

    #[test]
    fn outlined_models_are_also_drawn_normally() {
        let outlined = DrawItem {
            outline: true,
            ..item(4, false, 0.0)
        };
        let order = draw_order([outlined], Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(order.outlines, vec![4]);
        assert_eq!(order.opaque, vec![4]);
    }
}
