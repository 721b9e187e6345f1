//! Host-side mirrors of the WGSL uniform blocks.
//!
//! Every struct here is `#[repr(C)]` and laid out to match the WGSL struct of
//! the same name byte for byte, including the explicit padding WGSL's 16 byte
//! alignment rules require. The layout tests at the bottom pin the offsets.

use cgmath::{Matrix4, SquareMatrix};

/// Most lights the per-frame block can describe.
pub const MAX_LIGHTS: usize = 8;
/// Most nodes (bones) a single model can upload.
pub const MAX_BONES: usize = 64;

/// Marks a light without a shadow map layer.
pub const NO_SHADOW: i32 = -1;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightConstants {
    pub position: [f32; 3],
    pub kind: u32,
    pub colour: [f32; 3],
    pub cos_half_angle: f32,
    pub facing: [f32; 3],
    /// Layer of the shadow map array, or [`NO_SHADOW`].
    pub shadow_layer: i32,
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl Default for LightConstants {
    fn default() -> Self {
        let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
        Self {
            position: [0.0; 3],
            kind: 0,
            colour: [0.0; 3],
            cos_half_angle: 0.0,
            facing: [0.0, 0.0, 1.0],
            shadow_layer: NO_SHADOW,
            view: identity,
            projection: identity,
        }
    }
}

/// Uploaded once per frame and shared by every pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PerFrameConstants {
    pub camera: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],

    pub lights: [LightConstants; MAX_LIGHTS],

    pub ambient_colour: [f32; 3],
    pub specular_power: f32,

    pub camera_position: [f32; 3],
    pub frame_time: f32,

    pub outline_colour: [f32; 3],
    pub outline_thickness: f32,

    pub viewport_size: [f32; 2],
    pub wiggle: f32,
    pub parallax_depth: f32,

    pub light_count: u32,
    pub elapsed_time: f32,
    pub _padding: [f32; 2],
}

impl Default for PerFrameConstants {
    fn default() -> Self {
        let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
        Self {
            camera: identity,
            view: identity,
            projection: identity,
            view_projection: identity,
            lights: [LightConstants::default(); MAX_LIGHTS],
            ambient_colour: [0.0; 3],
            specular_power: 1.0,
            camera_position: [0.0; 3],
            frame_time: 0.0,
            outline_colour: [0.0; 3],
            outline_thickness: 0.0,
            viewport_size: [1.0, 1.0],
            wiggle: 0.0,
            parallax_depth: 0.0,
            light_count: 0,
            elapsed_time: 0.0,
            _padding: [0.0; 2],
        }
    }
}

/// Written once per drawn model.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PerModelConstants {
    pub world: [[f32; 4]; 4],
    pub colour: [f32; 3],
    pub bone_count: u32,
    pub bones: [[[f32; 4]; 4]; MAX_BONES],
}

impl Default for PerModelConstants {
    fn default() -> Self {
        let mut constants: Self = bytemuck::Zeroable::zeroed();
        constants.world = Matrix4::<f32>::identity().into();
        constants.colour = [1.0; 3];
        constants
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostProcessingConstants {
    pub tint_colour: [f32; 3],
    pub elapsed_time: f32,

    pub noise_scale: [f32; 2],
    pub noise_offset: [f32; 2],

    pub burn_height: f32,
    pub distort_level: f32,
    pub spiral_level: f32,
    pub _padding: f32,
}

/// Selects which light the depth pass renders from. Bound with a dynamic offset.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowPassConstants {
    pub light_index: u32,
    pub _padding: [u32; 3],
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use super::*;

    #[test]
    fn light_block_layout() {
        assert_eq!(size_of::<LightConstants>(), 176);
        assert_eq!(offset_of!(LightConstants, colour), 16);
        assert_eq!(offset_of!(LightConstants, facing), 32);
        assert_eq!(offset_of!(LightConstants, shadow_layer), 44);
        assert_eq!(offset_of!(LightConstants, view), 48);
        assert_eq!(offset_of!(LightConstants, projection), 112);
    }

    #[test]
    fn frame_block_layout() {
        assert_eq!(offset_of!(PerFrameConstants, lights), 256);
        assert_eq!(offset_of!(PerFrameConstants, ambient_colour), 256 + 176 * MAX_LIGHTS);
        assert_eq!(offset_of!(PerFrameConstants, camera_position), 1680);
        assert_eq!(offset_of!(PerFrameConstants, outline_colour), 1696);
        assert_eq!(offset_of!(PerFrameConstants, viewport_size), 1712);
        assert_eq!(offset_of!(PerFrameConstants, light_count), 1728);
        assert_eq!(size_of::<PerFrameConstants>(), 1744);
        assert_eq!(size_of::<PerFrameConstants>() % 16, 0);
    }

    #[test]
    fn model_block_layout() {
        assert_eq!(offset_of!(PerModelConstants, colour), 64);
        assert_eq!(offset_of!(PerModelConstants, bone_count), 76);
        assert_eq!(offset_of!(PerModelConstants, bones), 80);
        assert_eq!(size_of::<PerModelConstants>(), 80 + 64 * MAX_BONES);
    }

    #[test]
    fn post_block_layout() {
        assert_eq!(offset_of!(PostProcessingConstants, noise_scale), 16);
        assert_eq!(offset_of!(PostProcessingConstants, burn_height), 32);
        assert_eq!(size_of::<PostProcessingConstants>(), 48);
        assert_eq!(size_of::<ShadowPassConstants>(), 16);
    }

    #[test]
    fn defaults_are_neutral() {
        let model = PerModelConstants::default();
        assert_eq!(model.world[3][3], 1.0);
        assert_eq!(model.bone_count, 0);
        let frame = PerFrameConstants::default();
        assert!(frame.lights.iter().all(|l| l.shadow_layer == NO_SHADOW));
    }
}
