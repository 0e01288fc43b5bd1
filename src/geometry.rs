use bytemuck::{Pod, Zeroable};

/// Interleaved vertex layout consumed by the geometry pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Procedural box with one flat normal per face.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoxMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u16>,
}

impl BoxMesh {
    /// Interleaves the attribute streams for upload into a vertex buffer.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((&position, &normal), &uv)| Vertex {
                position,
                normal,
                uv,
            })
            .collect()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

const FACE_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];

/// Builds a box centered on the origin.
///
/// Every face owns four vertices so edges never share normals; faces come in
/// the order front, back, left, right, top, bottom.
pub fn box_mesh(width: f32, height: f32, depth: f32) -> BoxMesh {
    let (x, y, z) = (width / 2.0, height / 2.0, depth / 2.0);

    // Corners listed top-left, top-right, bottom-left, bottom-right as seen
    // from outside the face.
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[x, y, z], [-x, y, z], [x, -y, z], [-x, -y, z]]),
        ([0.0, 0.0, -1.0], [[-x, y, -z], [x, y, -z], [-x, -y, -z], [x, -y, -z]]),
        ([-1.0, 0.0, 0.0], [[-x, y, z], [-x, y, -z], [-x, -y, z], [-x, -y, -z]]),
        ([1.0, 0.0, 0.0], [[x, y, -z], [x, y, z], [x, -y, -z], [x, -y, z]]),
        ([0.0, 1.0, 0.0], [[x, y, -z], [-x, y, -z], [x, y, z], [-x, y, z]]),
        ([0.0, -1.0, 0.0], [[-x, -y, -z], [x, -y, -z], [-x, -y, z], [x, -y, z]]),
    ];

    let mut mesh = BoxMesh {
        positions: Vec::with_capacity(24),
        normals: Vec::with_capacity(24),
        uvs: Vec::with_capacity(24),
        indices: Vec::with_capacity(36),
    };
    for (face, (normal, corners)) in faces.iter().enumerate() {
        let base = (face * 4) as u16;
        mesh.positions.extend_from_slice(corners);
        mesh.normals.extend(std::iter::repeat(*normal).take(4));
        mesh.uvs.extend_from_slice(&FACE_UVS);
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }
    mesh
}
