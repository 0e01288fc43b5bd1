//! Column-major 4x4 matrix kernel and camera construction.
//!
//! Matrices are stored as 16 floats in column-major order and composed in the
//! row-vector convention: `multiply(a, b)` yields the transform that applies
//! `a` first and `b` second. In column-vector notation that product is
//! `b * a`, which is what the shaders see once the columns are uploaded.

use glam::{Vec3, Vec4};

/// A 4x4 transform stored as 16 column-major floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4 {
    m: [f32; 16],
}

impl Matrix4 {
    pub const IDENTITY: Self = Self::from_cols_array([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub const fn from_cols_array(m: [f32; 16]) -> Self {
        Self { m }
    }

    /// Builds a rotation whose rows are the three given basis vectors.
    pub fn from_basis_rows(x: Vec3, y: Vec3, z: Vec3) -> Self {
        Self::from_cols_array([
            x.x, y.x, z.x, 0.0, //
            x.y, y.y, z.y, 0.0, //
            x.z, y.z, z.z, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    pub fn from_translation(offset: Vec3) -> Self {
        let mut m = Self::IDENTITY.m;
        m[12] = offset.x;
        m[13] = offset.y;
        m[14] = offset.z;
        Self { m }
    }

    pub fn to_cols_array(&self) -> [f32; 16] {
        self.m
    }

    /// Columns as nested arrays, the layout WGSL expects for `mat4x4<f32>`.
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        [
            [self.m[0], self.m[1], self.m[2], self.m[3]],
            [self.m[4], self.m[5], self.m[6], self.m[7]],
            [self.m[8], self.m[9], self.m[10], self.m[11]],
            [self.m[12], self.m[13], self.m[14], self.m[15]],
        ]
    }

    pub fn column(&self, index: usize) -> Vec4 {
        let base = index * 4;
        Vec4::new(
            self.m[base],
            self.m[base + 1],
            self.m[base + 2],
            self.m[base + 3],
        )
    }

    pub fn row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.m[index],
            self.m[index + 4],
            self.m[index + 8],
            self.m[index + 12],
        )
    }

    /// Transforms a homogeneous point, returning clip-style coordinates.
    pub fn transform(&self, point: Vec4) -> Vec4 {
        self.column(0) * point.x
            + self.column(1) * point.y
            + self.column(2) * point.z
            + self.column(3) * point.w
    }

    pub fn transform_point(&self, point: Vec3) -> Vec4 {
        self.transform(point.extend(1.0))
    }

    /// Drops the translation, keeping the upper 3x3 block.
    pub fn without_translation(&self) -> Self {
        let mut m = self.m;
        m[12] = 0.0;
        m[13] = 0.0;
        m[14] = 0.0;
        Self { m }
    }
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Remaps OpenGL clip depth `[-w, w]` to the `[0, w]` range wgpu rasterizes.
pub const DEPTH_ZERO_TO_ONE: Matrix4 = Matrix4::from_cols_array([
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.5, 0.0, //
    0.0, 0.0, 0.5, 1.0,
]);

/// Composes two transforms so that `a` is applied before `b`.
pub fn multiply(a: &Matrix4, b: &Matrix4) -> Matrix4 {
    let mut out = [0.0f32; 16];
    for (i, value) in out.iter_mut().enumerate() {
        let a_base = (i / 4) * 4;
        let b_base = i % 4;
        *value = (0..4).map(|j| a.m[a_base + j] * b.m[b_base + j * 4]).sum();
    }
    Matrix4::from_cols_array(out)
}

/// Right-handed perspective projection using the OpenGL depth convention.
///
/// Callers guarantee `0 < near < far`; [`crate::DemoConfig::validate`] checks
/// this for the configured camera.
pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Matrix4 {
    let f = 1.0 / (fov_y_degrees.to_radians() * 0.5).tan();
    let range_reciprocal = 1.0 / (near - far);

    let mut m = [0.0f32; 16];
    m[0] = f / aspect;
    m[5] = f;
    m[10] = (far + near) * range_reciprocal;
    m[11] = -1.0;
    m[14] = 2.0 * far * near * range_reciprocal;
    Matrix4::from_cols_array(m)
}

/// View transforms for a fixed camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    /// World to view space.
    pub view: Matrix4,
    /// Rotation-only part of `view`, safe for transforming normals.
    pub normal: Matrix4,
}

/// Builds the view matrix for a camera at `eye` looking at `target`.
///
/// `up` must not be parallel to the viewing direction; no substitute axis is
/// chosen here.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> CameraMatrices {
    let forward = (target - eye).normalize();
    let side = forward.cross(up);
    debug_assert!(
        side.length_squared() > f32::EPSILON,
        "look_at: up vector is parallel to the view direction"
    );
    let side = side.normalize();
    let true_up = side.cross(forward);

    let rotation = Matrix4::from_basis_rows(side, true_up, -forward);
    let translation = Matrix4::from_translation(-eye);

    CameraMatrices {
        view: multiply(&translation, &rotation),
        normal: rotation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    const EPS: f32 = 1e-5;

    fn sample_matrix() -> Matrix4 {
        Matrix4::from_cols_array([
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0,
            16.0,
        ])
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-4, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn identity_is_neutral_on_both_sides() {
        let m = sample_matrix();
        assert_eq!(multiply(&m, &Matrix4::IDENTITY), m);
        assert_eq!(multiply(&Matrix4::IDENTITY, &m), m);
    }

    #[test]
    fn multiply_applies_left_operand_first() {
        let translate = Matrix4::from_translation(Vec3::X);
        let scale = Matrix4::from_cols_array([
            2.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ]);
        let moved_then_scaled = multiply(&translate, &scale).transform_point(Vec3::ZERO);
        assert!((moved_then_scaled.truncate() - Vec3::new(2.0, 0.0, 0.0)).length() < EPS);

        let scaled_then_moved = multiply(&scale, &translate).transform_point(Vec3::ZERO);
        assert!((scaled_then_moved.truncate() - Vec3::new(1.0, 0.0, 0.0)).length() < EPS);
    }

    #[test]
    fn multiply_matches_column_vector_product() {
        let a = sample_matrix();
        let b = perspective(45.0, 1.5, 0.5, 20.0);
        let expected = Mat4::from_cols_array(&b.to_cols_array())
            * Mat4::from_cols_array(&a.to_cols_array());
        assert_close(&multiply(&a, &b).to_cols_array(), &expected.to_cols_array());
    }

    #[test]
    fn perspective_maps_near_and_far_planes() {
        let proj = perspective(60.0, 1.0, 0.1, 100.0);

        let near = proj.transform_point(Vec3::new(0.0, 0.0, -0.1));
        assert!((near.z / near.w + 1.0).abs() < 1e-4);

        let far = proj.transform_point(Vec3::new(0.0, 0.0, -100.0));
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn perspective_matches_glam_gl_projection() {
        let proj = perspective(60.0, 1.0, 0.1, 100.0);
        let expected = Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 100.0);
        assert_close(&proj.to_cols_array(), &expected.to_cols_array());
    }

    #[test]
    fn depth_correction_maps_to_unit_range() {
        let proj = multiply(&perspective(60.0, 1.0, 0.1, 100.0), &DEPTH_ZERO_TO_ONE);
        let near = proj.transform_point(Vec3::new(0.0, 0.0, -0.1));
        let far = proj.transform_point(Vec3::new(0.0, 0.0, -100.0));
        assert!((near.z / near.w).abs() < 1e-4);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn look_at_matches_glam() {
        let eye = Vec3::new(1.0, 2.0, 5.5);
        let target = Vec3::new(0.0, 0.5, 0.0);
        let camera = look_at(eye, target, Vec3::Y);
        let expected = Mat4::look_at_rh(eye, target, Vec3::Y);
        assert_close(&camera.view.to_cols_array(), &expected.to_cols_array());
    }

    #[test]
    fn look_at_moves_eye_to_origin_and_target_down_negative_z() {
        let eye = Vec3::new(0.0, 0.0, 5.5);
        let camera = look_at(eye, Vec3::ZERO, Vec3::Y);
        let at_eye = camera.view.transform_point(eye);
        assert!(at_eye.truncate().length() < EPS);
        let at_target = camera.view.transform_point(Vec3::ZERO);
        assert!((at_target.truncate() - Vec3::new(0.0, 0.0, -5.5)).length() < EPS);
    }

    #[test]
    fn normal_matrix_has_no_translation() {
        let camera = look_at(Vec3::new(3.0, 1.0, 4.0), Vec3::ZERO, Vec3::Y);
        assert_eq!(camera.normal.column(3), Vec4::W);
        assert_eq!(camera.normal, camera.view.without_translation());
    }
}
