//! Scene lights and their per-frame effects.
//!
//! A [`Light`] is a pose plus colour, strength and a spotlight cone. Its pose
//! doubles as a camera: the inverse is the view used when rendering its
//! shadow map, and the cone angle gives the field of view. The light model
//! drawn at the light is the pose scaled by `strength^0.7`; that scale never
//! reaches the shadow camera.

use cgmath::{Deg, Matrix3, Matrix4, Rad, SquareMatrix, Vector3};
use rand::{RngExt, rngs::StdRng};

use crate::{
    data_structures::model::Model,
    math,
    pipelines::state::tagged_enum,
    uniforms::{LightConstants, NO_SHADOW},
};

const LIGHT_NEAR: f32 = 1.0;
const LIGHT_FAR: f32 = 1000.0;
/// Height above the target an orbiting light circles at.
const ORBIT_HEIGHT: f32 = 10.0;
const PULSE_MAX: f32 = 30.0;
const PULSE_SPEED: f32 = 15.0;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightKind {
    #[default]
    Point = 0,
    /// Lights a cone around its Z axis and casts shadows.
    Spot = 1,
    /// Infinitely far away; the position is the direction towards the light.
    Directional = 2,
}
tagged_enum!(LightKind, "light", { Point = 0, Spot = 1, Directional = 2 });

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightEffect {
    #[default]
    None = 0,
    Orbit = 1,
    Pulsate = 2,
    ColourCycle = 3,
}
tagged_enum!(LightEffect, "light effect", { None = 0, Orbit = 1, Pulsate = 2, ColourCycle = 3 });

#[derive(Debug, Clone)]
pub struct Light {
    model: Model,
    position: Vector3<f32>,
    /// Columns are the light's X, Y and Z (facing) axes.
    orientation: Matrix3<f32>,
    colour: Vector3<f32>,
    strength: f32,
    cone_angle: Deg<f32>,
    kind: LightKind,
    effect: LightEffect,
    casts_shadows: bool,
    orbit_angle: f32,
    orbiting: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self::new()
    }
}

impl Light {
    pub fn new() -> Self {
        let mut light = Self {
            model: Model::single("light"),
            position: Vector3::new(0.0, 0.0, 0.0),
            orientation: Matrix3::identity(),
            colour: Vector3::new(0.8, 0.8, 1.0),
            strength: 0.0,
            cone_angle: Deg(90.0),
            kind: LightKind::Point,
            effect: LightEffect::None,
            casts_shadows: false,
            orbit_angle: 0.0,
            orbiting: true,
        };
        light.set_position(Vector3::new(0.0, 10.0, 0.0));
        light.set_strength(40.0);
        light
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.sync_model();
    }

    /// Rebuild the light model from the pose and the current strength.
    fn sync_model(&mut self) {
        let scale = Matrix4::from_scale(self.strength.max(0.0).powf(0.7));
        self.model.set_local_matrix(self.pose() * scale, 0);
        self.model.calculate_world_matrices();
    }

    pub fn colour(&self) -> Vector3<f32> {
        self.colour
    }

    pub fn set_colour(&mut self, colour: Vector3<f32>) {
        self.colour = colour;
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Also resizes the light model, which grows as `strength^0.7`. A
    /// strength of zero or less hides the model until the strength is raised.
    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength;
        self.sync_model();
    }

    /// Colour times strength, as the shaders see it.
    pub fn effective_colour(&self) -> Vector3<f32> {
        self.colour * self.strength
    }

    pub fn cone_angle(&self) -> Deg<f32> {
        self.cone_angle
    }

    pub fn set_cone_angle(&mut self, angle: impl Into<Deg<f32>>) {
        self.cone_angle = angle.into();
    }

    pub fn cos_half_angle(&self) -> f32 {
        (Rad::from(self.cone_angle).0 * 0.5).cos()
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    /// Spotlights cast shadows unless told otherwise with
    /// [`set_casts_shadows`](Self::set_casts_shadows). Switching to or from
    /// [`LightKind::Spot`] resets shadow casting to that default; any other
    /// change keeps it.
    pub fn set_kind(&mut self, kind: LightKind) {
        if kind != self.kind && (kind == LightKind::Spot || self.kind == LightKind::Spot) {
            self.casts_shadows = kind == LightKind::Spot;
        }
        self.kind = kind;
    }

    pub fn effect(&self) -> LightEffect {
        self.effect
    }

    pub fn set_effect(&mut self, effect: LightEffect) {
        self.effect = effect;
    }

    pub fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    pub fn set_casts_shadows(&mut self, casts_shadows: bool) {
        self.casts_shadows = casts_shadows;
    }

    pub fn is_orbiting(&self) -> bool {
        self.orbiting
    }

    /// Pause or resume an orbiting light. The angle is kept while paused.
    pub fn toggle_orbit(&mut self) {
        self.orbiting = !self.orbiting;
    }

    /// Turn the light's Z axis towards `target`. A target at the light's own
    /// position keeps the current facing.
    pub fn face_target(&mut self, target: Vector3<f32>) {
        if let Some(rotation) = math::look_rotation(self.position, target) {
            self.orientation = rotation;
            self.sync_model();
        }
    }

    /// Rotation and translation of the light, without the model's scale.
    pub fn pose(&self) -> Matrix4<f32> {
        let mut pose = Matrix4::from(self.orientation);
        pose.w = self.position.extend(1.0);
        pose
    }

    /// Unit Z axis of the light's pose.
    pub fn facing(&self) -> Vector3<f32> {
        self.orientation.z
    }

    pub fn view(&self) -> Matrix4<f32> {
        math::inverse_affine(&self.pose())
    }

    pub fn projection(&self) -> Matrix4<f32> {
        math::perspective_lh(self.cone_angle.into(), 1.0, LIGHT_NEAR, LIGHT_FAR)
    }

    /// Advance the light's effect by `dt` seconds.
    ///
    /// Orbiting lights circle `target` at `radius` and face it.
    pub fn tick(&mut self, dt: f32, target: Vector3<f32>, rng: &mut StdRng, radius: f32, speed: f32) {
        match self.effect {
            LightEffect::None => {}
            LightEffect::Orbit => {
                let offset = Vector3::new(
                    self.orbit_angle.cos() * radius,
                    ORBIT_HEIGHT,
                    self.orbit_angle.sin() * radius,
                );
                self.set_position(target + offset);
                self.face_target(target);
                if self.orbiting {
                    self.orbit_angle -= speed * dt;
                }
            }
            LightEffect::Pulsate => {
                if (0.0..=PULSE_MAX).contains(&self.strength) {
                    self.strength -= PULSE_SPEED * dt;
                } else {
                    self.strength = PULSE_MAX;
                }
            }
            LightEffect::ColourCycle => {
                for channel in [2, 1, 0] {
                    let value = &mut self.colour[channel];
                    if (0.0..=1.0).contains(value) {
                        *value += rng.random_range(0.0..1.0f32) * dt;
                    } else {
                        *value = 0.0;
                    }
                }
            }
        }
    }

    /// Shader view of this light. `shadow_layer` is its layer in the shadow
    /// map array, if it has one.
    pub fn constants(&self, shadow_layer: Option<usize>) -> LightConstants {
        LightConstants {
            position: self.position().into(),
            kind: self.kind as u32,
            colour: self.effective_colour().into(),
            cos_half_angle: self.cos_half_angle(),
            facing: self.facing().into(),
            shadow_layer: shadow_layer.map_or(NO_SHADOW, |layer| layer as i32),
            view: self.view().into(),
            projection: self.projection().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use cgmath::{InnerSpace, Vector4};
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn defaults() {
        let light = Light::new();
        assert_eq!(light.colour(), Vector3::new(0.8, 0.8, 1.0));
        assert_eq!(light.strength(), 40.0);
        assert_eq!(light.position(), Vector3::new(0.0, 10.0, 0.0));
        assert_eq!(light.cone_angle(), Deg(90.0));
        assert_eq!(light.kind(), LightKind::Point);
        assert_eq!(light.effect(), LightEffect::None);
        assert!(!light.casts_shadows());
        assert_eq!(light.effective_colour(), Vector3::new(32.0, 32.0, 40.0));
        let scale = light.model().scale(0).x;
        assert!((scale - 40f32.powf(0.7)).abs() < 1e-3);
    }

    #[test]
    fn tags_convert() {
        assert_eq!(LightKind::try_from(2).unwrap(), LightKind::Directional);
        assert_eq!(LightEffect::try_from(3).unwrap(), LightEffect::ColourCycle);
        assert!(matches!(
            LightEffect::try_from(4),
            Err(RenderError::InvalidTag { kind: "light effect", tag: 4 })
        ));
    }

    #[test]
    fn spotlights_cast_shadows() {
        let mut light = Light::new();
        light.set_kind(LightKind::Spot);
        assert!(light.casts_shadows());
        light.set_kind(LightKind::Directional);
        assert!(!light.casts_shadows());
    }

    #[test]
    fn shadow_choice_survives_unrelated_kind_changes() {
        let mut light = Light::new();
        light.set_kind(LightKind::Spot);
        light.set_casts_shadows(false);
        light.set_kind(LightKind::Spot);
        assert!(!light.casts_shadows());

        light.set_kind(LightKind::Point);
        light.set_casts_shadows(true);
        light.set_kind(LightKind::Directional);
        assert!(light.casts_shadows());
    }

    #[test]
    fn strength_recovers_from_zero() {
        let mut light = Light::new();
        light.set_position(Vector3::new(30.0, 10.0, 0.0));
        light.face_target(Vector3::new(45.0, 16.0, 45.0));
        let facing = light.facing();

        light.set_strength(0.0);
        assert_eq!(light.model().scale(0), Vector3::new(0.0, 0.0, 0.0));
        light.set_strength(-5.0);
        light.set_strength(40.0);

        let scale = light.model().scale(0);
        let expected = 40f32.powf(0.7);
        for axis in [scale.x, scale.y, scale.z] {
            assert!((axis - expected).abs() < 1e-3, "{axis} != {expected}");
        }
        assert_eq!(light.facing(), facing);
        assert_eq!(light.model().position(0), light.position());

        let origin = light.view() * light.position().extend(1.0);
        assert!(origin.truncate().magnitude() < 1e-4);
    }

    #[test]
    fn shadow_camera_ignores_strength() {
        let mut light = Light::new();
        light.set_position(Vector3::new(0.0, 0.0, -10.0));
        light.face_target(Vector3::new(0.0, 0.0, 0.0));
        let dim = light.view();
        light.set_strength(400.0);
        assert_eq!(light.view(), dim);
        // world distance is view depth
        let target = light.view() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((target.z - 10.0).abs() < 1e-4);
    }

    #[test]
    fn cos_half_angle_of_cone() {
        let mut light = Light::new();
        assert!((light.cos_half_angle() - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        light.set_cone_angle(Deg(120.0));
        assert!((light.cos_half_angle() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn view_undoes_world() {
        let mut light = Light::new();
        light.set_position(Vector3::new(30.0, 10.0, 0.0));
        light.face_target(Vector3::new(45.0, 16.0, 45.0));
        let product = light.view() * light.pose();
        let identity = Matrix4::<f32>::identity();
        for c in 0..4 {
            for r in 0..4 {
                assert!((product[c][r] - identity[c][r]).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn target_in_front_projects_inside_the_cone() {
        let mut light = Light::new();
        let target = Vector3::new(0.0, 0.0, 50.0);
        light.face_target(target);
        let clip = light.projection() * light.view() * Vector4::new(target.x, target.y, target.z, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn orbit_circles_and_pauses() {
        let mut light = Light::new();
        light.set_effect(LightEffect::Orbit);
        let target = Vector3::new(45.0, 16.0, 45.0);
        light.tick(0.5, target, &mut rng(), 20.0, 0.7);
        assert_eq!(light.position(), target + Vector3::new(20.0, 10.0, 0.0));
        assert!((light.facing() - (target - light.position()).normalize()).magnitude() < 1e-4);

        light.tick(0.5, target, &mut rng(), 20.0, 0.7);
        let angle = -0.35f32;
        let expected = target + Vector3::new(angle.cos() * 20.0, 10.0, angle.sin() * 20.0);
        assert!((light.position() - expected).magnitude() < 1e-4);

        light.toggle_orbit();
        let before = light.position();
        light.tick(0.5, target, &mut rng(), 20.0, 0.7);
        light.tick(0.5, target, &mut rng(), 20.0, 0.7);
        assert!((light.position() - before).magnitude() > 0.0);
        let paused = light.position();
        light.tick(0.5, target, &mut rng(), 20.0, 0.7);
        assert_eq!(light.position(), paused);
    }

    #[test]
    fn pulsate_fades_then_resets() {
        let mut light = Light::new();
        light.set_effect(LightEffect::Pulsate);
        light.tick(0.1, Vector3::new(0.0, 0.0, 0.0), &mut rng(), 20.0, 0.7);
        assert_eq!(light.strength(), 30.0);
        light.tick(1.0, Vector3::new(0.0, 0.0, 0.0), &mut rng(), 20.0, 0.7);
        assert_eq!(light.strength(), 15.0);
        light.tick(1.0, Vector3::new(0.0, 0.0, 0.0), &mut rng(), 20.0, 0.7);
        assert_eq!(light.strength(), 0.0);
        light.tick(1.0, Vector3::new(0.0, 0.0, 0.0), &mut rng(), 20.0, 0.7);
        assert_eq!(light.strength(), -15.0);
        light.tick(1.0, Vector3::new(0.0, 0.0, 0.0), &mut rng(), 20.0, 0.7);
        assert_eq!(light.strength(), 30.0);
    }

    #[test]
    fn colour_cycle_grows_channels_and_wraps() {
        let mut light = Light::new();
        light.set_effect(LightEffect::ColourCycle);
        light.set_colour(Vector3::new(0.2, 0.5, 8.0));
        let mut rng = rng();
        light.tick(0.5, Vector3::new(0.0, 0.0, 0.0), &mut rng, 20.0, 0.7);
        let colour = light.colour();
        assert_eq!(colour.z, 0.0);
        assert!(colour.x >= 0.2 && colour.x < 0.7);
        assert!(colour.y >= 0.5 && colour.y < 1.0);
    }

    #[test]
    fn colour_cycle_is_reproducible_with_a_seed() {
        let mut a = Light::new();
        let mut b = Light::new();
        a.set_effect(LightEffect::ColourCycle);
        b.set_effect(LightEffect::ColourCycle);
        let (mut ra, mut rb) = (rng(), rng());
        for _ in 0..10 {
            a.tick(0.1, Vector3::new(0.0, 0.0, 0.0), &mut ra, 20.0, 0.7);
            b.tick(0.1, Vector3::new(0.0, 0.0, 0.0), &mut rb, 20.0, 0.7);
        }
        assert_eq!(a.colour(), b.colour());
    }

    #[test]
    fn constants_mark_shadow_layer() {
        let mut light = Light::new();
        light.set_kind(LightKind::Spot);
        let constants = light.constants(Some(2));
        assert_eq!(constants.shadow_layer, 2);
        assert_eq!(constants.kind, 1);
        assert_eq!(constants.colour, [32.0, 32.0, 40.0]);
        assert_eq!(Light::new().constants(None).shadow_layer, NO_SHADOW);
    }
}
