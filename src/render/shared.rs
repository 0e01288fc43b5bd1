//! WGSL sources for both passes.
//!
//! Array sizes and the presence sentinel are written as `{{NAME}}`
//! placeholders and filled from the host constants, so the shaders and the
//! uniform structs in Rust can never disagree.

use crate::config::{MAX_LIGHTS, MAX_SAMPLE_POINTS};
use crate::shading::PRESENCE;

const GEOMETRY_TEMPLATE: &str = r#"
const PRESENCE: f32 = {{PRESENCE}};

struct InstanceTransforms {
    model_view_projection: mat4x4<f32>,
    model: mat4x4<f32>,
    normal: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> instance: InstanceTransforms;

@group(1) @binding(0)
var albedo_texture: texture_2d<f32>;
@group(1) @binding(1)
var albedo_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct GBufferOutput {
    @location(0) position: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) albedo: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = instance.model_view_projection * vec4<f32>(input.position, 1.0);
    out.world_position = (instance.model * vec4<f32>(input.position, 1.0)).xyz;
    out.world_normal = (instance.normal * vec4<f32>(input.normal, 0.0)).xyz;
    out.uv = input.uv;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> GBufferOutput {
    var out: GBufferOutput;
    out.position = vec4<f32>(input.world_position, PRESENCE);
    out.normal = vec4<f32>(normalize(input.world_normal), 0.0);
    out.albedo = textureSample(albedo_texture, albedo_sampler, input.uv);
    return out;
}
"#;

const RESOLVE_TEMPLATE: &str = r#"
const MAX_SAMPLE_POINTS: u32 = {{MAX_SAMPLE_POINTS}}u;
const MAX_LIGHTS: u32 = {{MAX_LIGHTS}}u;

struct Light {
    position: vec4<f32>,
    // rgb = power, a = falloff distance
    power: vec4<f32>,
}

struct ResolveParams {
    // xyz = camera position, w = ambient cap
    camera: vec4<f32>,
    // xy = output size, zw = G-buffer size
    sizes: vec4<f32>,
    // x = kernel length, y = light count, z = ssao enabled, w = direct lighting enabled
    counts: vec4<u32>,
    kernel: array<vec4<i32>, MAX_SAMPLE_POINTS>,
    lights: array<Light, MAX_LIGHTS>,
}

@group(0) @binding(0)
var position_texture: texture_2d<f32>;
@group(0) @binding(1)
var normal_texture: texture_2d<f32>;
@group(0) @binding(2)
var albedo_texture: texture_2d<f32>;

@group(1) @binding(0)
var<uniform> params: ResolveParams;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    // One triangle covering the whole viewport.
    let x = f32((index << 1u) & 2u);
    let y = f32(index & 2u);
    return vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
}

fn clamp_texel(texel: vec2<i32>) -> vec2<i32> {
    let size = vec2<i32>(textureDimensions(position_texture));
    return clamp(texel, vec2<i32>(0, 0), size - vec2<i32>(1, 1));
}

fn load_position(texel: vec2<i32>) -> vec4<f32> {
    return textureLoad(position_texture, clamp_texel(texel), 0);
}

fn ambient_occlusion(texel: vec2<i32>, position: vec3<f32>) -> f32 {
    let max_ambient = params.camera.w;
    if (params.counts.z == 0u) {
        return max_ambient;
    }
    let camera = params.camera.xyz;
    let base_distance = length(position - camera);
    let count = min(params.counts.x, MAX_SAMPLE_POINTS);
    var open = count;
    for (var i = 0u; i < count; i++) {
        let offset = params.kernel[i].xy;
        let forward = load_position(texel + offset).xyz;
        let backward = load_position(texel - offset).xyz;
        if (base_distance > length(forward - camera) && base_distance > length(backward - camera)) {
            open -= 1u;
        }
    }
    return f32(open) / f32(count) * max_ambient;
}

@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let uv = frag_coord.xy / params.sizes.xy;
    let texel = clamp_texel(vec2<i32>(uv * params.sizes.zw));

    let stored = load_position(texel);
    if (stored.w <= 0.0) {
        discard;
    }
    let position = stored.xyz;
    let normal = normalize(textureLoad(normal_texture, texel, 0).xyz);
    let albedo = textureLoad(albedo_texture, texel, 0).rgb;

    var color = albedo * ambient_occlusion(texel, position);
    if (params.counts.w != 0u) {
        let light_count = min(params.counts.y, MAX_LIGHTS);
        for (var i = 0u; i < light_count; i++) {
            let light = params.lights[i];
            let to_light = light.position.xyz - position;
            let direction = normalize(to_light);
            let diffuse = clamp(dot(direction, normal), 0.0, 1.0);
            let falloff = 1.0 / pow(max(1.0, length(to_light) / light.power.w), 2.0);
            color += albedo * light.power.rgb * (diffuse * falloff);
        }
    }
    return vec4<f32>(color, 1.0);
}
"#;

fn expand(template: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |source, (name, value)| {
            source.replace(&format!("{{{{{name}}}}}"), value)
        })
}

/// Vertex/fragment source of the G-buffer pass.
pub fn geometry_shader_source() -> String {
    expand(GEOMETRY_TEMPLATE, &[("PRESENCE", format!("{PRESENCE:?}"))])
}

/// Vertex/fragment source of the full-screen resolve pass.
pub fn resolve_shader_source() -> String {
    expand(
        RESOLVE_TEMPLATE,
        &[
            ("MAX_SAMPLE_POINTS", MAX_SAMPLE_POINTS.to_string()),
            ("MAX_LIGHTS", MAX_LIGHTS.to_string()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_filled() {
        for source in [geometry_shader_source(), resolve_shader_source()] {
            assert!(!source.contains("{{"), "unresolved placeholder in:\n{source}");
        }
    }

    #[test]
    fn host_constants_reach_the_shaders() {
        assert!(geometry_shader_source().contains("const PRESENCE: f32 = 1.0;"));
        let resolve = resolve_shader_source();
        assert!(resolve.contains(&format!("const MAX_LIGHTS: u32 = {MAX_LIGHTS}u;")));
        assert!(resolve.contains(&format!(
            "const MAX_SAMPLE_POINTS: u32 = {MAX_SAMPLE_POINTS}u;"
        )));
    }
}
