//! Scene-wide render settings.
//!
//! [`RenderSettings`] gathers every constant the renderer needs at setup and
//! per frame. The defaults reproduce the reference scene; adjust them through the
//! `with_*` builders before building a [`Scene`](crate::scene::Scene) or at
//! runtime through [`Scene::settings_mut`](crate::scene::Scene::settings_mut).

use cgmath::Vector3;

use crate::pipelines::post::PostProcess;

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    /// Width and height of every shadow map layer in texels.
    pub shadow_map_size: u32,
    pub ambient_colour: Vector3<f32>,
    pub specular_power: f32,
    pub background_colour: wgpu::Color,
    /// Present with vsync. Toggled with `P` by the default flow.
    pub lock_fps: bool,
    /// Radians per second the wiggle phase advances.
    pub wiggle_speed: f32,
    pub parallax_depth: f32,
    pub outline_colour: Vector3<f32>,
    pub outline_thickness: f32,
    pub light_orbit_radius: f32,
    pub light_orbit_speed: f32,
    pub camera_rotation_speed: f32,
    pub camera_movement_speed: f32,
    pub post_process: Option<PostProcess>,
    pub tint_colour: Vector3<f32>,
    /// Seed for the light colour-cycle and post-process noise. `None` seeds from the clock.
    pub random_seed: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: 2048,
            ambient_colour: Vector3::new(0.2, 0.2, 0.3),
            specular_power: 256.0,
            background_colour: wgpu::Color {
                r: 0.2,
                g: 0.2,
                b: 0.3,
                a: 1.0,
            },
            lock_fps: true,
            wiggle_speed: 6.0,
            parallax_depth: 0.08,
            outline_colour: Vector3::new(0.0, 0.0, 0.0),
            outline_thickness: 0.015,
            light_orbit_radius: 20.0,
            light_orbit_speed: 0.7,
            camera_rotation_speed: 2.0,
            camera_movement_speed: 50.0,
            post_process: None,
            tint_colour: Vector3::new(1.0, 0.6, 0.6),
            random_seed: None,
        }
    }
}

impl RenderSettings {
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size.max(1);
        self
    }

    pub fn with_ambient_colour(mut self, colour: Vector3<f32>) -> Self {
        self.ambient_colour = colour;
        self
    }

    pub fn with_specular_power(mut self, power: f32) -> Self {
        self.specular_power = power;
        self
    }

    pub fn with_background_colour(mut self, colour: wgpu::Color) -> Self {
        self.background_colour = colour;
        self
    }

    pub fn with_lock_fps(mut self, lock_fps: bool) -> Self {
        self.lock_fps = lock_fps;
        self
    }

    pub fn with_post_process(mut self, effect: Option<PostProcess>) -> Self {
        self.post_process = effect;
        self
    }

    pub fn with_outline(mut self, colour: Vector3<f32>, thickness: f32) -> Self {
        self.outline_colour = colour;
        self.outline_thickness = thickness;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub(crate) fn seed(&self) -> u64 {
        self.random_seed.unwrap_or_else(|| {
            instant::SystemTime::now()
                .duration_since(instant::SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_scene() {
        let settings = RenderSettings::default();
        assert_eq!(settings.shadow_map_size, 2048);
        assert_eq!(settings.specular_power, 256.0);
        assert!(settings.lock_fps);
        assert_eq!(settings.post_process, None);
    }

    #[test]
    fn shadow_map_size_is_never_zero() {
        let settings = RenderSettings::default().with_shadow_map_size(0);
        assert_eq!(settings.shadow_map_size, 1);
    }

    #[test]
    fn explicit_seed_wins() {
        let settings = RenderSettings::default().with_random_seed(7);
        assert_eq!(settings.seed(), 7);
    }
}
