use glam::Vec3;

use crate::config::DemoConfig;
use crate::math::look_at;
use crate::sampler::RotationSampler;

fn fmt_vec3(v: Vec3) -> String {
    format!("({:.2}, {:.2}, {:.2})", v.x, v.y, v.z)
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// Forward axis of every box the geometry pass draws on its first run.
pub fn instance_directions(config: &DemoConfig) -> Vec<Vec3> {
    RotationSampler::with_up_swap_threshold(config.up_swap_threshold)
        .take(config.instance_count as usize)
        .map(|rotation| rotation.row(2).truncate())
        .collect()
}

/// Viewing direction, read back from the rotation-only camera matrix whose
/// third row is the negated forward axis.
pub fn camera_forward(config: &DemoConfig) -> Vec3 {
    let camera = config.camera;
    -look_at(camera.eye, camera.target, camera.up)
        .normal
        .row(2)
        .truncate()
}

/// Human-readable description of the configuration, one entry per line.
pub fn summary_lines(config: &DemoConfig) -> Vec<String> {
    let camera = config.camera;
    let mut lines = vec![
        "SSAO demo configuration".to_string(),
        format!(
            " window {}x{}, G-buffer {}x{}",
            config.window_size.0, config.window_size.1, config.gbuffer_size.0, config.gbuffer_size.1
        ),
        format!(
            " camera eye={} target={} fov={:.1}",
            fmt_vec3(camera.eye),
            fmt_vec3(camera.target),
            camera.fov_y_degrees
        ),
        format!(
            " camera forward={}",
            fmt_vec3(camera_forward(config))
        ),
        format!(
            " ssao={} direct-light={} geometry={}",
            on_off(config.ssao_enabled),
            on_off(config.direct_lighting_enabled),
            if config.static_geometry { "static" } else { "dynamic" }
        ),
        format!(
            " kernel: {} offsets, ambient cap {:.2}",
            config.sample_kernel.len(),
            config.max_ambient
        ),
    ];
    for (index, light) in config.lights.iter().enumerate() {
        lines.push(format!(
            " light {index} pos={} power={} falloff={:.2}",
            fmt_vec3(light.position),
            fmt_vec3(light.power),
            light.falloff_distance
        ));
    }

    let directions = instance_directions(config);
    lines.push(format!("Instance orientations ({}):", directions.len()));
    for (index, direction) in directions.into_iter().enumerate() {
        lines.push(format!(" - {index} forward={}", fmt_vec3(direction)));
    }
    lines
}

pub fn print_summary(config: &DemoConfig) {
    for line in summary_lines(config) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_lights_and_instances() {
        let config = DemoConfig::default();
        let lines = summary_lines(&config);
        assert_eq!(lines[0], "SSAO demo configuration");
        assert!(lines.contains(&" window 364x364, G-buffer 364x364".to_string()));
        let light = " light 0 pos=(0.00, 0.00, 1.00) power=(1.00, 1.00, 1.00) falloff=3.50";
        assert!(lines.iter().any(|line| line == light));
        assert!(lines.contains(&"Instance orientations (32):".to_string()));
        assert_eq!(lines.iter().filter(|line| line.starts_with(" - ")).count(), 32);
    }

    #[test]
    fn camera_looks_down_negative_z() {
        let forward = camera_forward(&DemoConfig::default());
        assert!((forward - Vec3::NEG_Z).length() < 1e-6);
        let lines = summary_lines(&DemoConfig::default());
        assert!(lines.iter().any(|line| line == " camera forward=(0.00, 0.00, -1.00)"));
    }

    #[test]
    fn first_instance_points_along_plus_y() {
        // halton(_, 0) == 0 puts the first direction at theta = 0.
        let directions = instance_directions(&DemoConfig::default());
        assert!((directions[0] - Vec3::Y).length() < 1e-6);
        for direction in &directions {
            assert!((direction.length() - 1.0).abs() < 1e-5);
        }
    }
}
