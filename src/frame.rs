//! Per-frame state and the order in which the two passes run.

use glam::Vec3;
use log::debug;

use crate::config::DemoConfig;
use crate::shading::Light;

/// What the current frame has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePlan {
    pub run_geometry: bool,
}

/// Mutable render state owned by the frame driver.
#[derive(Debug, Clone)]
pub struct FrameState {
    angle: f32,
    geometry_ready: bool,
    frame_index: u64,
    lights: Vec<Light>,
}

impl FrameState {
    pub fn new(lights: Vec<Light>) -> Self {
        Self {
            angle: 0.0,
            geometry_ready: false,
            frame_index: 0,
            lights,
        }
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Animation angle in whole degrees, wrapped to `0..360`.
    pub fn angle_degrees(&self) -> f32 {
        (self.angle as i64 % 360) as f32
    }

    pub fn geometry_ready(&self) -> bool {
        self.geometry_ready
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn mark_geometry_ready(&mut self) {
        self.geometry_ready = true;
    }

    /// Steps the light animation and decides whether the G-buffer needs
    /// repopulating this frame.
    pub fn advance(&mut self, config: &DemoConfig) -> FramePlan {
        self.angle += config.angle_step;
        self.frame_index += 1;

        let radians = self.angle_degrees().to_radians();
        let orbit = config.light_orbit;
        if let Some(light) = self.lights.first_mut() {
            light.position = Vec3::new(
                orbit.radius * radians.cos(),
                orbit.height,
                orbit.radius * radians.sin(),
            );
        }

        FramePlan {
            run_geometry: !self.geometry_ready || !config.static_geometry,
        }
    }
}

/// The rendering surface the frame driver talks to.
pub trait FramePasses {
    type Error;

    fn geometry_pass(&mut self, state: &FrameState) -> Result<(), Self::Error>;
    fn resolve_pass(&mut self, state: &FrameState) -> Result<(), Self::Error>;
    fn present(&mut self) -> Result<(), Self::Error>;
}

/// Runs one frame: geometry when planned, then resolve, then presentation.
pub fn drive_frame<P: FramePasses>(
    state: &mut FrameState,
    config: &DemoConfig,
    passes: &mut P,
) -> Result<FramePlan, P::Error> {
    let plan = state.advance(config);
    debug!(
        "frame {} angle={} geometry={}",
        state.frame_index(),
        state.angle_degrees(),
        plan.run_geometry
    );
    if plan.run_geometry {
        passes.geometry_pass(state)?;
        state.mark_geometry_ready();
    }
    passes.resolve_pass(state)?;
    passes.present()?;
    Ok(plan)
}
