//! Math type re-exports and RIB-specific math utilities.
//!
//! This module re-exports types from `glam` and provides the conversions
//! used when matrices and point arrays cross into RIB calls.

// Re-export glam types
pub use glam::{
    // Single precision vectors
    Vec2, Vec3, Vec4,
    // Double precision vectors
    DVec2, DVec3, DVec4,
    // Matrices
    Mat4, DMat4,
    // Quaternions
    Quat, DQuat,
};

/// Tolerance used when comparing extracted geometry across motion samples.
pub const EPSILON: f32 = 1e-4;

/// A RIB matrix: 16 floats, translation in elements 12..15.
pub type RtMatrix = [f32; 16];

/// Approximate float equality with [`EPSILON`].
#[inline]
pub fn equiv(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// Element-wise [`equiv`] over two slices of equal length.
pub fn equiv_slice(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equiv(*x, *y))
}

/// Convert a transform to RIB layout.
///
/// glam stores columns contiguously with the translation in the last column,
/// which is exactly the row-vector layout RenderMan expects.
#[inline]
pub fn rib_matrix(m: &DMat4) -> RtMatrix {
    m.as_mat4().to_cols_array()
}

/// Inverse of [`rib_matrix`].
#[inline]
pub fn matrix_from_rib(m: &RtMatrix) -> DMat4 {
    Mat4::from_cols_array(m).as_dmat4()
}

/// Scale of `(1, 1, -1)` applied to light matrices: RenderMan lights look
/// down +Z while the host's look down -Z.
#[inline]
pub fn flip_z(m: &DMat4) -> DMat4 {
    *m * DMat4::from_scale(DVec3::new(1.0, 1.0, -1.0))
}

/// Flatten points into a float payload.
#[inline]
pub fn flatten_vec3(points: &[Vec3]) -> &[f32] {
    bytemuck::cast_slice(points)
}

/// Flatten homogeneous points into a float payload.
#[inline]
pub fn flatten_vec4(points: &[Vec4]) -> &[f32] {
    bytemuck::cast_slice(points)
}

/// Build a transform from translate / rotate (degrees, XYZ order) / scale.
pub fn compose_trs(translate: DVec3, rotate_deg: DVec3, scale: DVec3) -> DMat4 {
    let r = DQuat::from_euler(
        glam::EulerRot::XYZ,
        rotate_deg.x.to_radians(),
        rotate_deg.y.to_radians(),
        rotate_deg.z.to_radians(),
    );
    DMat4::from_scale_rotation_translation(scale, r, translate)
}
