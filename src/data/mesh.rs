//! Polygon mesh extractor.

use super::{extra_params, param_equiv, BuildContext, ExtraTarget, ExtractOptions};
use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::ri::Ri;
use crate::scene::{Mesh, UvSet};
use crate::util::{flatten_vec3, Result};

/// Face topology in renderer winding order.
///
/// The host winds faces the other way round, so vertices are reversed
/// within each face; `fv_order[i]` is the host face-vertex index written
/// at output position `i`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshTopology {
    pub nverts: Vec<i32>,
    pub verts: Vec<i32>,
    pub fv_order: Vec<usize>,
}

impl MeshTopology {
    /// Reverse each face of `mesh`. `None` when the topology is inconsistent.
    pub fn build(mesh: &Mesh) -> Option<Self> {
        let total: i64 = mesh.face_counts.iter().map(|&c| c as i64).sum();
        if mesh.face_counts.iter().any(|&c| c < 1) || total != mesh.face_vertices.len() as i64 {
            return None;
        }
        let npoints = mesh.points.len() as i32;
        if mesh.face_vertices.iter().any(|&v| v < 0 || v >= npoints) {
            return None;
        }

        let mut verts = Vec::with_capacity(mesh.face_vertices.len());
        let mut fv_order = Vec::with_capacity(mesh.face_vertices.len());
        let mut start = 0usize;
        for &count in &mesh.face_counts {
            let count = count as usize;
            for k in (start..start + count).rev() {
                verts.push(mesh.face_vertices[k]);
                fv_order.push(k);
            }
            start += count;
        }
        Some(Self {
            nverts: mesh.face_counts.clone(),
            verts,
            fv_order,
        })
    }

    /// Number of face-vertices.
    pub fn face_vertex_count(&self) -> usize {
        self.verts.len()
    }
}

fn usable_set(set: &UvSet, nfv: usize) -> bool {
    if set.u.len() == nfv && set.v.len() == nfv {
        return true;
    }
    tracing::warn!(set = %set.name, expected = nfv, u = set.u.len(), v = set.v.len(), "UV set size mismatch, skipped");
    false
}

/// `float[2]` face parameter holding `(u, 1 - v)` in output order.
fn st_param(name: &str, set: &UvSet, topo: &MeshTopology, detail: DetailType) -> TypedParameter {
    let mut p = TypedParameter::new(name, ParameterType::Float, topo.face_vertex_count(), 2).with_detail(detail);
    for (i, &k) in topo.fv_order.iter().enumerate() {
        p.set_float_sub(i, 0, set.u[k]);
        p.set_float_sub(i, 1, 1.0 - set.v[k]);
    }
    p
}

fn scalar_param(name: &str, topo: &MeshTopology, detail: DetailType, value: impl Fn(usize) -> f32) -> TypedParameter {
    let mut p = TypedParameter::new(name, ParameterType::Float, topo.face_vertex_count(), 0).with_detail(detail);
    for (i, &k) in topo.fv_order.iter().enumerate() {
        p.set_float(i, value(k));
    }
    p
}

/// UV parameters of `mesh`, current set first.
///
/// `detail` is facevarying for meshes; subdivision surfaces may ask for
/// facevertex.
pub fn uv_params(mesh: &Mesh, topo: &MeshTopology, detail: DetailType, options: &ExtractOptions) -> Vec<TypedParameter> {
    let nfv = topo.face_vertex_count();
    let sets: Vec<&UvSet> = mesh.ordered_uv_sets().into_iter().filter(|s| usable_set(s, nfv)).collect();
    let Some(current) = sets.first() else {
        return Vec::new();
    };
    let mut out = Vec::new();

    if options.rms_arrays {
        out.push(TypedParameter::string("currentUVSet", current.name.clone()));
        out.push(scalar_param("s", topo, detail, |k| current.u[k]));
        out.push(scalar_param("t", topo, detail, |k| 1.0 - current.v[k]));
        if sets.len() > 1 {
            let extra = &sets[1..];
            let mut names = TypedParameter::new("extraUVSets", ParameterType::String, extra.len(), 0)
                .with_detail(DetailType::Constant);
            let mut u = TypedParameter::new("u_uvSet", ParameterType::Float, nfv, extra.len()).with_detail(detail);
            let mut v = TypedParameter::new("v_uvSet", ParameterType::Float, nfv, extra.len()).with_detail(detail);
            for (j, set) in extra.iter().enumerate() {
                names.set_string(j, set.name.clone());
                for (i, &k) in topo.fv_order.iter().enumerate() {
                    u.set_float_sub(i, j, set.u[k]);
                    v.set_float_sub(i, j, 1.0 - set.v[k]);
                }
            }
            out.extend([names, u, v]);
        }
        return out;
    }

    out.push(st_param("st", current, topo, detail));
    for set in &sets[1..] {
        out.push(st_param(&set.name, set, topo, detail));
    }
    if options.output_mesh_uvs {
        out.push(scalar_param("u", topo, detail, |k| current.u[k]));
        out.push(scalar_param("v", topo, detail, |k| current.v[k]));
    }
    out
}

/// Vertex-detail `P`.
pub fn point_param(points: &[crate::util::Vec3]) -> TypedParameter {
    let mut p = TypedParameter::array("P", ParameterType::Point, DetailType::Vertex, points.len());
    p.set_floats(flatten_vec3(points));
    p
}

/// Polygon mesh written as `PointsGeneralPolygons`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub nverts: Vec<i32>,
    pub verts: Vec<i32>,
    pub params: Vec<TypedParameter>,
}

impl MeshData {
    pub fn build(mesh: &Mesh, ctx: &BuildContext<'_>) -> Self {
        if mesh.points.is_empty() {
            tracing::info!(object = ctx.path, "mesh has no vertices, nothing to write");
            return Self::default();
        }
        let Some(topo) = MeshTopology::build(mesh) else {
            tracing::warn!(object = ctx.path, "mesh topology is inconsistent, skipped");
            return Self::default();
        };

        let mut params = vec![point_param(&mesh.points)];
        if let Some(n) = normal_param(mesh, &topo) {
            params.push(n);
        }
        params.extend(uv_params(mesh, &topo, DetailType::FaceVarying, ctx.options));
        params.extend(extra_params(
            &ctx.attributes.rman,
            ExtraTarget {
                face_vertices: Some(topo.face_vertex_count()),
                ..Default::default()
            },
        ));

        Self {
            nverts: topo.nverts,
            verts: topo.verts,
            params,
        }
    }

    pub fn is_writable(&self) -> bool {
        !self.nverts.is_empty()
    }

    pub fn compare(&self, other: &Self) -> bool {
        self.nverts == other.nverts
            && self.verts == other.verts
            && param_equiv(&self.params, &other.params, "P")
            && param_equiv(&self.params, &other.params, "N")
    }

    pub fn write(&self, ri: &mut dyn Ri) -> Result<()> {
        let nloops = vec![1; self.nverts.len()];
        ri.points_general_polygons(&nloops, &self.nverts, &self.verts, &self.params)
    }
}

/// `N`: vertex detail with one normal per point, facevarying with one per
/// face-vertex.
fn normal_param(mesh: &Mesh, topo: &MeshTopology) -> Option<TypedParameter> {
    let normals = &mesh.normals;
    if normals.is_empty() {
        return None;
    }
    if normals.len() == mesh.points.len() {
        let mut p = TypedParameter::array("N", ParameterType::Normal, DetailType::Vertex, normals.len());
        p.set_floats(flatten_vec3(normals));
        return Some(p);
    }
    if normals.len() == topo.face_vertex_count() {
        let mut p = TypedParameter::array("N", ParameterType::Normal, DetailType::FaceVarying, normals.len());
        for (i, &k) in topo.fv_order.iter().enumerate() {
            let n = normals[k];
            p.set_float3(i, n.x, n.y, n.z);
        }
        return Some(p);
    }
    tracing::warn!(count = normals.len(), "normal count matches neither points nor face-vertices");
    None
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::RibData;
    use super::*;
    use crate::scene::Shape;
    use crate::util::Vec3;

    fn cube_face() -> Mesh {
        Mesh {
            points: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            face_counts: vec![4],
            face_vertices: vec![0, 1, 2, 3],
            uv_sets: vec![
                UvSet {
                    name: "map1".into(),
                    u: vec![0.0, 1.0, 1.0, 0.0],
                    v: vec![0.0, 0.0, 1.0, 1.0],
                },
                UvSet {
                    name: "extra".into(),
                    u: vec![0.5; 4],
                    v: vec![0.25; 4],
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_reversed_winding() {
        let mut m = cube_face();
        m.face_counts = vec![3, 3];
        m.face_vertices = vec![0, 1, 2, 0, 2, 3];
        let topo = MeshTopology::build(&m).unwrap();
        assert_eq!(topo.verts, [2, 1, 0, 3, 2, 0]);
        assert_eq!(topo.fv_order, [2, 1, 0, 5, 4, 3]);
    }

    #[test]
    fn test_inconsistent_topology() {
        let mut m = cube_face();
        m.face_vertices.push(1);
        assert!(MeshTopology::build(&m).is_none());
        let mut m = cube_face();
        m.face_vertices[0] = 9;
        assert!(MeshTopology::build(&m).is_none());
    }

    #[test]
    fn test_st_follows_reversed_order() {
        let fx = Fixture::default();
        let data = MeshData::build(&cube_face(), &fx.ctx());
        let st = super::super::find_param(&data.params, "st").unwrap();
        assert_eq!(st.detailed_name(), "facevarying float[2] st");
        // host face-vertex 3 first: u=0, v=1 -> t=0
        assert_eq!(&st.float_data()[..4], &[0.0, 0.0, 1.0, 0.0]);
        let extra = super::super::find_param(&data.params, "extra").unwrap();
        assert_eq!(&extra.float_data()[..2], &[0.5, 0.75]);
    }

    #[test]
    fn test_rms_arrays() {
        let mut fx = Fixture::default();
        fx.options.rms_arrays = true;
        let data = MeshData::build(&cube_face(), &fx.ctx());
        let names: Vec<_> = data.params.iter().map(|p| p.detailed_name()).collect();
        assert_eq!(
            names,
            [
                "P",
                "constant string currentUVSet",
                "facevarying float s",
                "facevarying float t",
                "constant string[1] extraUVSets",
                "facevarying float[1] u_uvSet",
                "facevarying float[1] v_uvSet",
            ]
        );
    }

    #[test]
    fn test_normals_detail() {
        let fx = Fixture::default();
        let mut m = cube_face();
        m.normals = vec![Vec3::Z; 4];
        let data = MeshData::build(&m, &fx.ctx());
        assert_eq!(super::super::find_param(&data.params, "N").unwrap().detail(), DetailType::Vertex);

        m.face_counts = vec![3, 3];
        m.face_vertices = vec![0, 1, 2, 0, 2, 3];
        m.uv_sets.clear();
        m.normals = vec![Vec3::Z; 6];
        let data = MeshData::build(&m, &fx.ctx());
        assert_eq!(super::super::find_param(&data.params, "N").unwrap().detail(), DetailType::FaceVarying);
    }

    #[test]
    fn test_degenerate_mesh_not_writable() {
        let fx = Fixture::default();
        let data = RibData::build(&Shape::Mesh(Mesh::default()), &fx.ctx()).unwrap().unwrap();
        assert!(!data.is_writable());
    }

    #[test]
    fn test_compare_detects_deformation() {
        let fx = Fixture::default();
        let a = MeshData::build(&cube_face(), &fx.ctx());
        let mut moved = cube_face();
        moved.points[2].z = 0.5;
        let b = MeshData::build(&moved, &fx.ctx());
        let mut tiny = cube_face();
        tiny.points[2].z = 1e-6;
        let c = MeshData::build(&tiny, &fx.ctx());
        assert!(a.compare(&a));
        assert!(!a.compare(&b));
        assert!(a.compare(&c));
    }

    #[test]
    fn test_write_polygons() {
        let fx = Fixture::default();
        let mut m = cube_face();
        m.uv_sets.clear();
        let text = rib(&RibData::Mesh(MeshData::build(&m, &fx.ctx())));
        assert_eq!(
            text,
            "PointsGeneralPolygons [1] [4] [3 2 1 0] \"P\" [0 0 0 1 0 0 1 1 0 0 1 0]\n"
        );
    }
}
