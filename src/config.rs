//! Fixed demo configuration.
//!
//! The defaults describe the demo scene; everything the shaders depend on
//! is sized by [`MAX_LIGHTS`] and [`MAX_SAMPLE_POINTS`], which are also
//! substituted into the WGSL sources.

use glam::{IVec2, Vec3};
use thiserror::Error;

use crate::sampler::DEFAULT_UP_SWAP_THRESHOLD;
use crate::shading::Light;

pub const WINDOW_WIDTH: u32 = 364;
pub const WINDOW_HEIGHT: u32 = 364;
pub const GBUFFER_WIDTH: u32 = 364;
pub const GBUFFER_HEIGHT: u32 = 364;

pub const MAX_LIGHTS: usize = 4;
pub const MAX_SAMPLE_POINTS: usize = 16;

pub const MAX_AMBIENT: f32 = 0.13;
pub const INSTANCE_COUNT: u32 = 32;
pub const BOX_EXTENT: f32 = 2.5;

pub const LIGHT_ORBIT_RADIUS: f32 = 2.0;
pub const ANGLE_STEP: f32 = 0.1;

/// Texel offsets tested in symmetric pairs by the occlusion estimate.
pub const REFERENCE_SAMPLE_KERNEL: [IVec2; 8] = [
    IVec2::new(3, 3),
    IVec2::new(1, 1),
    IVec2::new(0, 3),
    IVec2::new(0, 1),
    IVec2::new(3, 0),
    IVec2::new(1, 0),
    IVec2::new(3, -3),
    IVec2::new(1, -1),
];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("light count {0} is outside 1..={max}", max = MAX_LIGHTS)]
    LightCount(usize),
    #[error("sample kernel size {0} is outside 1..={max}", max = MAX_SAMPLE_POINTS)]
    KernelSize(usize),
    #[error("clip planes must satisfy 0 < near < far (near={near}, far={far})")]
    ClipPlanes { near: f32, far: f32 },
    #[error("{target} resolution must be non-zero, got {width}x{height}")]
    Resolution {
        target: &'static str,
        width: u32,
        height: u32,
    },
    #[error("instance count must be at least 1")]
    NoInstances,
    #[error("ambient cap must be non-negative, got {0}")]
    NegativeAmbient(f32),
}

/// Fixed camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.5),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Horizontal circle followed by light 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightOrbit {
    pub radius: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub window_size: (u32, u32),
    pub gbuffer_size: (u32, u32),
    pub camera: CameraConfig,
    pub instance_count: u32,
    pub box_extent: Vec3,
    pub sample_kernel: Vec<IVec2>,
    pub max_ambient: f32,
    pub lights: Vec<Light>,
    pub light_orbit: LightOrbit,
    /// Degrees added to the animation angle every frame.
    pub angle_step: f32,
    /// Populate the G-buffer once and reuse it for every later frame.
    pub static_geometry: bool,
    pub ssao_enabled: bool,
    pub direct_lighting_enabled: bool,
    pub up_swap_threshold: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            window_size: (WINDOW_WIDTH, WINDOW_HEIGHT),
            gbuffer_size: (GBUFFER_WIDTH, GBUFFER_HEIGHT),
            camera: CameraConfig::default(),
            instance_count: INSTANCE_COUNT,
            box_extent: Vec3::splat(BOX_EXTENT),
            sample_kernel: REFERENCE_SAMPLE_KERNEL.to_vec(),
            max_ambient: MAX_AMBIENT,
            lights: vec![Light::new(Vec3::new(0.0, 0.0, 1.0), Vec3::ONE, 3.5)],
            light_orbit: LightOrbit {
                radius: LIGHT_ORBIT_RADIUS,
                height: 0.0,
            },
            angle_step: ANGLE_STEP,
            static_geometry: true,
            ssao_enabled: true,
            direct_lighting_enabled: true,
            up_swap_threshold: DEFAULT_UP_SWAP_THRESHOLD,
        }
    }
}

impl DemoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lights.is_empty() || self.lights.len() > MAX_LIGHTS {
            return Err(ConfigError::LightCount(self.lights.len()));
        }
        if self.sample_kernel.is_empty() || self.sample_kernel.len() > MAX_SAMPLE_POINTS {
            return Err(ConfigError::KernelSize(self.sample_kernel.len()));
        }
        let CameraConfig { near, far, .. } = self.camera;
        if !(near > 0.0 && near < far) {
            return Err(ConfigError::ClipPlanes { near, far });
        }
        let targets = [("window", self.window_size), ("G-buffer", self.gbuffer_size)];
        for (target, (width, height)) in targets {
            if width == 0 || height == 0 {
                return Err(ConfigError::Resolution {
                    target,
                    width,
                    height,
                });
            }
        }
        if self.instance_count == 0 {
            return Err(ConfigError::NoInstances);
        }
        if self.max_ambient < 0.0 {
            return Err(ConfigError::NegativeAmbient(self.max_ambient));
        }
        Ok(())
    }

    pub fn aspect(&self) -> f32 {
        self.window_size.0 as f32 / self.window_size.1 as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_configuration_is_valid() {
        let config = DemoConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.sample_kernel.len(), 8);
        assert_eq!(config.lights.len(), 1);
        assert_eq!(config.aspect(), 1.0);
    }

    #[test]
    fn rejects_too_many_lights() {
        let light = Light::new(Vec3::ZERO, Vec3::ONE, 1.0);
        let config = DemoConfig {
            lights: vec![light; MAX_LIGHTS + 1],
            ..DemoConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::LightCount(MAX_LIGHTS + 1)));
    }

    #[test]
    fn rejects_empty_kernel_and_bad_planes() {
        let config = DemoConfig {
            sample_kernel: Vec::new(),
            ..DemoConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::KernelSize(0)));

        let mut config = DemoConfig::default();
        config.camera.near = 10.0;
        config.camera.far = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::ClipPlanes { .. })));
    }

    #[test]
    fn rejects_zero_sized_targets() {
        let config = DemoConfig {
            gbuffer_size: (0, 364),
            ..DemoConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "G-buffer resolution must be non-zero, got 0x364");
    }
}
