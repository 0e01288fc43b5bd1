//! Host-side reference of the resolve shader.
//!
//! The functions here mirror the WGSL in `render::shared` term for term so
//! the lighting and occlusion math can be exercised without a GPU, and
//! [`CpuGBuffer`] replays a whole resolve pass over an in-memory G-buffer.

use glam::{IVec2, Vec3, Vec4};

/// Alpha written into the position target wherever geometry was rasterized.
pub const PRESENCE: f32 = 1.0;

/// A point light. Only `position` changes after start-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3,
    /// RGB intensity.
    pub power: Vec3,
    /// Distance beyond which the inverse-square falloff kicks in.
    pub falloff_distance: f32,
}

impl Light {
    pub fn new(position: Vec3, power: Vec3, falloff_distance: f32) -> Self {
        Self {
            position,
            power,
            falloff_distance,
        }
    }
}

/// Inputs shared by every pixel of a resolve pass.
#[derive(Debug, Clone, Copy)]
pub struct ResolveParams<'a> {
    pub camera_position: Vec3,
    pub sample_kernel: &'a [IVec2],
    pub max_ambient: f32,
    pub lights: &'a [Light],
    pub ssao_enabled: bool,
    pub direct_lighting_enabled: bool,
}

/// Ambient factor from symmetric neighbour pairs.
///
/// A kernel entry counts as occluded when the pixel lies farther from the
/// camera than both of its neighbours. The result is in `[0, max_ambient]`.
pub fn ambient_occlusion(
    camera_position: Vec3,
    position: Vec3,
    neighbour_pairs: impl IntoIterator<Item = (Vec3, Vec3)>,
    max_ambient: f32,
) -> f32 {
    let base_distance = position.distance(camera_position);
    let mut total = 0u32;
    let mut occluded = 0u32;
    for (forward, backward) in neighbour_pairs {
        total += 1;
        if base_distance > forward.distance(camera_position)
            && base_distance > backward.distance(camera_position)
        {
            occluded += 1;
        }
    }
    if total == 0 {
        return max_ambient;
    }
    (total - occluded) as f32 / total as f32 * max_ambient
}

pub fn diffuse_term(light_direction: Vec3, normal: Vec3) -> f32 {
    light_direction.dot(normal).clamp(0.0, 1.0)
}

pub fn falloff_term(distance: f32, falloff_distance: f32) -> f32 {
    1.0 / (distance / falloff_distance).max(1.0).powi(2)
}

/// Diffuse contribution of one light at a surface point.
pub fn direct_light(light: &Light, position: Vec3, normal: Vec3, albedo: Vec3) -> Vec3 {
    let to_light = light.position - position;
    let direction = to_light.normalize();
    let diffuse = diffuse_term(direction, normal);
    let falloff = falloff_term(to_light.length(), light.falloff_distance);
    albedo * light.power * (diffuse * falloff)
}

/// One texel of each G-buffer target.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GBufferTexel {
    /// World position; `w` is the presence sentinel.
    pub position: Vec4,
    pub normal: Vec3,
    pub albedo: Vec3,
}

impl GBufferTexel {
    pub fn surface(position: Vec3, normal: Vec3, albedo: Vec3) -> Self {
        Self {
            position: position.extend(PRESENCE),
            normal,
            albedo,
        }
    }

    pub fn is_background(&self) -> bool {
        self.position.w <= 0.0
    }
}

/// In-memory G-buffer, cleared to the "no geometry" sentinel.
#[derive(Debug, Clone)]
pub struct CpuGBuffer {
    width: u32,
    height: u32,
    texels: Vec<GBufferTexel>,
}

impl CpuGBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            texels: vec![GBufferTexel::default(); width as usize * height as usize],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set(&mut self, x: u32, y: u32, texel: GBufferTexel) {
        let index = self.index(x, y);
        self.texels[index] = texel;
    }

    /// Texel lookup clamped to the image edge; `None` for an empty buffer.
    pub fn texel(&self, coord: IVec2) -> Option<&GBufferTexel> {
        if self.texels.is_empty() {
            return None;
        }
        let max = IVec2::new(
            i32::try_from(self.width - 1).unwrap_or(i32::MAX),
            i32::try_from(self.height - 1).unwrap_or(i32::MAX),
        );
        let coord = coord.clamp(IVec2::ZERO, max);
        self.texels.get(self.index(coord.x as u32, coord.y as u32))
    }

    fn texel_position(&self, coord: IVec2) -> Vec3 {
        self.texel(coord)
            .map_or(Vec3::ZERO, |texel| texel.position.truncate())
    }

    /// Shades one pixel; `None` means the pixel is discarded.
    pub fn shade(&self, coord: IVec2, params: &ResolveParams<'_>) -> Option<Vec4> {
        let texel = self.texel(coord)?;
        if texel.is_background() {
            return None;
        }
        let position = texel.position.truncate();
        let normal = texel.normal.normalize();
        let albedo = texel.albedo;

        let ambient = if params.ssao_enabled {
            let pairs = params.sample_kernel.iter().map(|offset| {
                (
                    self.texel_position(coord + *offset),
                    self.texel_position(coord - *offset),
                )
            });
            ambient_occlusion(params.camera_position, position, pairs, params.max_ambient)
        } else {
            params.max_ambient
        };

        let mut color = albedo * ambient;
        if params.direct_lighting_enabled {
            for light in params.lights {
                color += direct_light(light, position, normal, albedo);
            }
        }
        Some(color.extend(1.0))
    }

    /// Runs the resolve over every pixel on top of a cleared frame.
    pub fn resolve(&self, params: &ResolveParams<'_>, clear_color: Vec4) -> Vec<Vec4> {
        let mut frame = vec![clear_color; self.texels.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let coord = IVec2::new(x as i32, y as i32);
                if let Some(color) = self.shade(coord, params) {
                    frame[self.index(x, y)] = color;
                }
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REFERENCE_SAMPLE_KERNEL;

    const MAX_AMBIENT: f32 = 0.13;
    const CAMERA: Vec3 = Vec3::new(0.0, 0.0, 5.5);

    fn params<'a>(lights: &'a [Light]) -> ResolveParams<'a> {
        ResolveParams {
            camera_position: CAMERA,
            sample_kernel: &REFERENCE_SAMPLE_KERNEL,
            max_ambient: MAX_AMBIENT,
            lights,
            ssao_enabled: true,
            direct_lighting_enabled: true,
        }
    }

    #[test]
    fn unit_distance_light_contributes_albedo() {
        let light = Light::new(Vec3::new(0.0, 0.0, 1.0), Vec3::ONE, 3.5);
        let to_light = light.position - Vec3::ZERO;
        assert_eq!(diffuse_term(to_light.normalize(), Vec3::Z), 1.0);
        assert_eq!(falloff_term(to_light.length(), 3.5), 1.0);

        let albedo = Vec3::new(0.8, 0.4, 0.2);
        assert_eq!(direct_light(&light, Vec3::ZERO, Vec3::Z, albedo), albedo);
    }

    #[test]
    fn falloff_is_inverse_square_past_the_falloff_distance() {
        assert_eq!(falloff_term(7.0, 3.5), 0.25);
        assert_eq!(falloff_term(1.0, 3.5), 1.0);
    }

    #[test]
    fn back_facing_light_contributes_nothing() {
        let light = Light::new(Vec3::new(0.0, 0.0, -2.0), Vec3::ONE, 3.5);
        let contribution = direct_light(&light, Vec3::ZERO, Vec3::Z, Vec3::ONE);
        assert_eq!(contribution, Vec3::ZERO);
    }

    #[test]
    fn ambient_factor_is_capped_when_nothing_occludes() {
        let position = Vec3::new(0.0, 0.0, 2.0);
        let pairs = (0..8).map(|_| (Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0)));
        assert_eq!(ambient_occlusion(CAMERA, position, pairs, MAX_AMBIENT), MAX_AMBIENT);
    }

    #[test]
    fn ambient_factor_drops_to_zero_in_a_crevice() {
        let position = Vec3::ZERO;
        let pairs = (0..8).map(|_| (Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 2.0)));
        assert_eq!(ambient_occlusion(CAMERA, position, pairs, MAX_AMBIENT), 0.0);
    }

    #[test]
    fn one_sided_occluder_does_not_count() {
        let position = Vec3::ZERO;
        let pairs = [(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0))];
        assert_eq!(ambient_occlusion(CAMERA, position, pairs, MAX_AMBIENT), MAX_AMBIENT);
    }

    #[test]
    fn ambient_factor_stays_in_bounds() {
        let mut buffer = CpuGBuffer::new(16, 16);
        for y in 0..16u32 {
            for x in 0..16u32 {
                let z = ((x * 7 + y * 13) % 5) as f32 - 2.0;
                buffer.set(x, y, GBufferTexel::surface(Vec3::new(0.0, 0.0, z), Vec3::Z, Vec3::ONE));
            }
        }
        let no_lights = params(&[]);
        for y in 0..16 {
            for x in 0..16 {
                let color = buffer.shade(IVec2::new(x, y), &no_lights).unwrap();
                assert!(color.x >= 0.0 && color.x <= MAX_AMBIENT);
                assert_eq!(color.w, 1.0);
            }
        }
    }

    #[test]
    fn disabled_ssao_uses_full_ambient() {
        let mut buffer = CpuGBuffer::new(8, 8);
        buffer.set(4, 4, GBufferTexel::surface(Vec3::ZERO, Vec3::Z, Vec3::ONE));
        let mut p = params(&[]);
        p.ssao_enabled = false;
        let color = buffer.shade(IVec2::new(4, 4), &p).unwrap();
        assert_eq!(color, Vec4::new(MAX_AMBIENT, MAX_AMBIENT, MAX_AMBIENT, 1.0));
    }

    #[test]
    fn lookups_clamp_to_the_edge() {
        let mut buffer = CpuGBuffer::new(4, 4);
        let corner = GBufferTexel::surface(Vec3::ONE, Vec3::Z, Vec3::ONE);
        buffer.set(0, 0, corner);
        assert_eq!(buffer.texel(IVec2::new(-3, -3)), Some(&corner));
        assert!(buffer.texel(IVec2::new(10, 10)).unwrap().is_background());
    }

    #[test]
    fn empty_buffer_resolves_to_an_empty_frame() {
        for (width, height) in [(0, 4), (4, 0), (0, 0)] {
            let buffer = CpuGBuffer::new(width, height);
            assert_eq!(buffer.texel(IVec2::new(0, 0)), None);
            assert_eq!(buffer.shade(IVec2::new(0, 0), &params(&[])), None);
            assert!(buffer.resolve(&params(&[]), Vec4::ONE).is_empty());
        }
    }
}
