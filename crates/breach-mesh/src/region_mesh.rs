//! Region mesh buffers produced by the mesher.
//!
//! Attributes live in separate arrays so they can be uploaded as individual
//! vertex streams. Positions are region-local: a block at local `(x, y, z)`
//! occupies the unit cube from `(x, y, z)` to `(x + 1, y + 1, z + 1)`.

use crate::face_direction::FaceDirection;

/// Vertices emitted per face.
pub const VERTICES_PER_FACE: usize = 4;
/// Triangle indices emitted per face.
pub const INDICES_PER_FACE: usize = 6;

/// Per-face surface attributes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceStyle {
    /// Atlas tile rectangle `[u_min, v_min, u_max, v_max]`.
    pub uv_rect: [f32; 4],
    /// Vertex color.
    pub color: [f32; 4],
    /// `(metallic, smoothness)`.
    pub uv2: [f32; 2],
}

/// Surface geometry of one region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionMesh {
    /// Vertex positions, region-local.
    pub positions: Vec<[f32; 3]>,
    /// Atlas texture coordinates.
    pub uvs: Vec<[f32; 2]>,
    /// Secondary channel carrying `(metallic, smoothness)`.
    pub uv2: Vec<[f32; 2]>,
    /// Vertex colors.
    pub colors: Vec<[f32; 4]>,
    /// Triangle list, three indices per triangle.
    pub triangles: Vec<u32>,
}

impl RegionMesh {
    /// Creates an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties every buffer while keeping allocations.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.uvs.clear();
        self.uv2.clear();
        self.colors.clear();
        self.triangles.clear();
    }

    /// Number of emitted faces (quads).
    pub fn face_count(&self) -> usize {
        self.triangles.len() / INDICES_PER_FACE
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if the mesh has no geometry.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Appends one unit quad on face `dir` of the block whose minimum corner
    /// is `origin`. Four fresh vertices are pushed; nothing is shared.
    pub fn push_face(&mut self, dir: FaceDirection, origin: [f32; 3], style: &FaceStyle) {
        let base = self.positions.len() as u32;
        let [u0, v0, u1, v1] = style.uv_rect;
        let uvs = [[u0, v0], [u0, v1], [u1, v1], [u1, v0]];

        for (corner, uv) in dir.corners().into_iter().zip(uvs) {
            self.positions.push([
                origin[0] + corner[0],
                origin[1] + corner[1],
                origin[2] + corner[2],
            ]);
            self.uvs.push(uv);
            self.uv2.push(style.uv2);
            self.colors.push(style.color);
        }

        self.triangles
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Position stream as raw bytes.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// UV stream as raw bytes.
    pub fn uv_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uvs)
    }

    /// Secondary UV stream as raw bytes.
    pub fn uv2_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uv2)
    }

    /// Color stream as raw bytes.
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    /// Index buffer as raw bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.triangles)
    }
}
