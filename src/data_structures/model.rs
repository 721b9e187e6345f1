//! Per-instance transforms over a shared [`Mesh`].
//!
//! A [`Model`] keeps one local matrix per mesh node. World matrices are
//! derived by walking the depth-first node list, and bone matrices
//! (world × inverse bind) are what the vertex shaders consume.

use std::sync::Arc;

use cgmath::{InnerSpace, Matrix3, Matrix4, Rad, SquareMatrix, Vector3, Vector4};
use winit::keyboard::KeyCode;

use crate::{
    data_structures::mesh::{Mesh, Node},
    input::Keyboard,
    math,
};

/// Key bindings for [`Model::control`]. Unbound directions are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoseControls {
    pub turn_up: Option<KeyCode>,
    pub turn_down: Option<KeyCode>,
    pub turn_left: Option<KeyCode>,
    pub turn_right: Option<KeyCode>,
    pub turn_cw: Option<KeyCode>,
    pub turn_ccw: Option<KeyCode>,
    pub move_forward: Option<KeyCode>,
    pub move_backward: Option<KeyCode>,
}

#[derive(Debug, Clone)]
pub struct Model {
    nodes: Arc<[Node]>,
    local: Vec<Matrix4<f32>>,
    world: Vec<Matrix4<f32>>,
}

impl Model {
    /// A model over a node hierarchy, starting in the hierarchy's rest pose.
    pub fn new(nodes: Arc<[Node]>) -> Self {
        let local: Vec<_> = nodes.iter().map(|n| n.default_transform).collect();
        let mut model = Self {
            world: vec![Matrix4::identity(); local.len()],
            local,
            nodes,
        };
        model.calculate_world_matrices();
        model
    }

    pub fn for_mesh(mesh: &Mesh) -> Self {
        Self::new(mesh.nodes.clone())
    }

    /// A single-node model, for things that only need one transform.
    pub fn single(name: &str) -> Self {
        Self::new(Arc::from(vec![Node::root(name)]))
    }

    pub fn node_count(&self) -> usize {
        self.local.len()
    }

    fn node_index(&self, node: usize) -> Option<usize> {
        if node < self.local.len() {
            Some(node)
        } else {
            log::warn!("node {node} does not exist, the model has {} nodes", self.local.len());
            None
        }
    }

    pub fn position(&self, node: usize) -> Vector3<f32> {
        self.local
            .get(node)
            .map_or(Vector3::new(0.0, 0.0, 0.0), |m| m.w.truncate())
    }

    /// Euler angles (radians) of a node relative to its parent.
    pub fn rotation(&self, node: usize) -> Vector3<f32> {
        self.local
            .get(node)
            .map_or(Vector3::new(0.0, 0.0, 0.0), |m| math::decompose(m).1)
    }

    pub fn scale(&self, node: usize) -> Vector3<f32> {
        self.local
            .get(node)
            .map_or(Vector3::new(1.0, 1.0, 1.0), math::axis_lengths)
    }

    pub fn set_position(&mut self, position: Vector3<f32>, node: usize) {
        if let Some(i) = self.node_index(node) {
            self.local[i].w = position.extend(1.0);
        }
    }

    /// Replace the rotation of a node, keeping its position and scale.
    pub fn set_rotation(&mut self, rotation: Vector3<f32>, node: usize) {
        if let Some(i) = self.node_index(node) {
            let position = self.local[i].w.truncate();
            let scale = math::axis_lengths(&self.local[i]);
            self.local[i] = math::compose(position, rotation, scale);
        }
    }

    /// Replace the scale of a node, keeping its position and rotation.
    ///
    /// An axis already scaled to zero has lost its direction, so it restarts
    /// along the matching unrotated axis.
    pub fn set_scale(&mut self, scale: Vector3<f32>, node: usize) {
        if let Some(i) = self.node_index(node) {
            let current = math::axis_lengths(&self.local[i]);
            let m = &mut self.local[i];
            let rescale = |axis: Vector4<f32>, unit: Vector4<f32>, from: f32, to: f32| {
                if from > f32::EPSILON { axis * (to / from) } else { unit * to }
            };
            m.x = rescale(m.x, Vector4::unit_x(), current.x, scale.x);
            m.y = rescale(m.y, Vector4::unit_y(), current.y, scale.y);
            m.z = rescale(m.z, Vector4::unit_z(), current.z, scale.z);
        }
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.set_scale(Vector3::new(scale, scale, scale), 0);
    }

    /// Turn a node about its local axes (and move the root along its Z axis)
    /// while the bound keys are held.
    pub fn control(
        &mut self,
        node: usize,
        dt: f32,
        keyboard: &Keyboard,
        controls: &PoseControls,
        rotation_speed: f32,
        movement_speed: f32,
    ) {
        let Some(i) = self.node_index(node) else {
            return;
        };
        let step = rotation_speed * dt;
        let mut turn = |held: bool, rotation: Matrix3<f32>| {
            if held {
                self.local[i] = self.local[i] * Matrix4::from(rotation);
            }
        };
        turn(keyboard.held_opt(controls.turn_down), Matrix3::from_angle_x(Rad(step)));
        turn(keyboard.held_opt(controls.turn_up), Matrix3::from_angle_x(Rad(-step)));
        turn(keyboard.held_opt(controls.turn_right), Matrix3::from_angle_y(Rad(step)));
        turn(keyboard.held_opt(controls.turn_left), Matrix3::from_angle_y(Rad(-step)));
        turn(keyboard.held_opt(controls.turn_cw), Matrix3::from_angle_z(Rad(step)));
        turn(keyboard.held_opt(controls.turn_ccw), Matrix3::from_angle_z(Rad(-step)));

        let forward = self.local[i].z.truncate();
        let forward = if forward.magnitude2() > 0.0 {
            forward.normalize()
        } else {
            forward
        };
        let distance = movement_speed * dt;
        if keyboard.held_opt(controls.move_forward) {
            self.local[i].w += (forward * distance).extend(0.0);
        }
        if keyboard.held_opt(controls.move_backward) {
            self.local[i].w -= (forward * distance).extend(0.0);
        }
    }

    pub fn local_matrix(&self, node: usize) -> Matrix4<f32> {
        self.local.get(node).copied().unwrap_or_else(Matrix4::identity)
    }

    pub fn set_local_matrix(&mut self, matrix: Matrix4<f32>, node: usize) {
        if let Some(i) = self.node_index(node) {
            self.local[i] = matrix;
        }
    }

    /// Recompute every node's world matrix. Parents are stored before their
    /// children, so a single forward pass suffices.
    pub fn calculate_world_matrices(&mut self) {
        for i in 0..self.local.len() {
            self.world[i] = match self.nodes[i].parent {
                Some(parent) => self.world[parent] * self.local[i],
                None => self.local[i],
            };
        }
    }

    /// World matrix of a node as of the last [`calculate_world_matrices`](Self::calculate_world_matrices).
    pub fn world_matrix(&self, node: usize) -> Matrix4<f32> {
        self.world.get(node).copied().unwrap_or_else(Matrix4::identity)
    }

    pub fn bone_matrices(&self) -> impl Iterator<Item = Matrix4<f32>> + '_ {
        self.world
            .iter()
            .zip(self.nodes.iter())
            .map(|(world, node)| *world * node.inverse_bind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Matrix4, Vector3};

    fn chain() -> Model {
        let child = Node {
            parent: Some(0),
            default_transform: Matrix4::from_translation(Vector3::new(0.0, 2.0, 0.0)),
            ..Node::root("arm")
        };
        let grandchild = Node {
            parent: Some(1),
            default_transform: Matrix4::from_translation(Vector3::new(0.0, 0.0, 3.0)),
            inverse_bind: Matrix4::from_translation(Vector3::new(0.0, -2.0, -3.0)),
            ..Node::root("hand")
        };
        Model::new(Arc::from(vec![Node::root("body"), child, grandchild]))
    }

    fn assert_vec(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < 1e-4, "{a:?} != {b:?}");
    }

    #[test]
    fn children_inherit_parent_transform() {
        let mut model = chain();
        model.set_position(Vector3::new(10.0, 0.0, 0.0), 0);
        model.calculate_world_matrices();
        assert_vec(model.world_matrix(2).w.truncate(), Vector3::new(10.0, 2.0, 3.0));

        model.set_rotation(Vector3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0), 0);
        model.calculate_world_matrices();
        // Rotating the root a quarter turn about Y swings +Z onto +X.
        assert_vec(model.world_matrix(2).w.truncate(), Vector3::new(13.0, 2.0, 0.0));
    }

    #[test]
    fn bone_matrix_is_identity_in_rest_pose() {
        let model = chain();
        let bones: Vec<_> = model.bone_matrices().collect();
        assert_eq!(bones.len(), 3);
        assert_vec(bones[2].w.truncate(), Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn rotation_keeps_scale_and_position() {
        let mut model = Model::single("crate");
        model.set_position(Vector3::new(45.0, 0.0, 45.0), 0);
        model.set_uniform_scale(6.0);
        model.set_rotation(Vector3::new(0.0, -0.87, 0.0), 0);
        assert_vec(model.scale(0), Vector3::new(6.0, 6.0, 6.0));
        assert_vec(model.position(0), Vector3::new(45.0, 0.0, 45.0));
        assert!((model.rotation(0).y + 0.87).abs() < 1e-4);
    }

    #[test]
    fn control_turns_only_while_held() {
        let controls = PoseControls {
            turn_cw: Some(KeyCode::KeyI),
            move_forward: Some(KeyCode::KeyW),
            ..Default::default()
        };
        let mut keyboard = Keyboard::new();
        let mut model = Model::single("head");

        model.control(0, 0.5, &keyboard, &controls, 2.0, 10.0);
        assert_vec(model.rotation(0), Vector3::new(0.0, 0.0, 0.0));

        keyboard.press(KeyCode::KeyI);
        model.control(0, 0.5, &keyboard, &controls, 2.0, 10.0);
        assert!((model.rotation(0).z - 1.0).abs() < 1e-4);

        keyboard.press(KeyCode::KeyW);
        keyboard.release(KeyCode::KeyI);
        model.control(0, 0.5, &keyboard, &controls, 2.0, 10.0);
        assert_vec(model.position(0), Vector3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn zero_scale_can_be_undone() {
        let mut model = Model::single("flare");
        model.set_position(Vector3::new(3.0, 4.0, 5.0), 0);
        model.set_uniform_scale(0.0);
        assert_vec(model.scale(0), Vector3::new(0.0, 0.0, 0.0));
        model.set_uniform_scale(2.5);
        assert_vec(model.scale(0), Vector3::new(2.5, 2.5, 2.5));
        assert_vec(model.position(0), Vector3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn out_of_range_node_is_ignored() {
        let mut model = Model::single("solo");
        model.set_position(Vector3::new(1.0, 2.0, 3.0), 5);
        assert_vec(model.position(0), Vector3::new(0.0, 0.0, 0.0));
    }
}
