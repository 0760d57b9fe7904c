use glam::Vec3;

use crate::scene::{Light, Material, Scene};

/// Strength of the specular highlight (Phong specular colour `#111111`).
pub const SPECULAR_STRENGTH: f32 = 17.0 / 255.0;

/// Lighting of a scene reduced to one ambient term and one directional light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightRig {
    pub ambient: Vec3,
    /// Unit vector pointing from the surface towards the light.
    pub direction: Vec3,
    pub directional: Vec3,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            ambient: Vec3::ZERO,
            direction: Vec3::Z,
            directional: Vec3::ZERO,
        }
    }
}

impl LightRig {
    /// Sums every ambient light; the first directional light wins.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut rig = Self::default();
        let mut has_directional = false;
        for light in &scene.lights {
            match *light {
                Light::Ambient { color, intensity } => rig.ambient += color * intensity,
                Light::Directional {
                    color,
                    intensity,
                    position,
                } if !has_directional => {
                    rig.direction = position.try_normalize().unwrap_or(Vec3::Z);
                    rig.directional = color * intensity;
                    has_directional = true;
                }
                Light::Directional { .. } => {}
            }
        }
        rig
    }

    /// Phong colour of a surface point with unit `normal`, seen along the
    /// unit vector `to_eye`.
    pub fn shade(&self, material: &Material, normal: Vec3, to_eye: Vec3) -> Vec3 {
        let diffuse = normal.dot(self.direction).max(0.0);
        let specular = if diffuse > 0.0 {
            let reflected = 2.0 * normal.dot(self.direction) * normal - self.direction;
            reflected.dot(to_eye).max(0.0).powf(material.shininess.max(1.0))
        } else {
            0.0
        };
        let lit = material.color * (self.ambient + self.directional * diffuse)
            + self.directional * specular * SPECULAR_STRENGTH;
        lit.clamp(Vec3::ZERO, Vec3::ONE)
    }
}
