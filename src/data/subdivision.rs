//! Subdivision surface extractors.
//!
//! Polygon meshes flagged for subdivision take their topology and UVs from
//! the mesh; creases, corners, holes and stitches become tags packed into the
//! flat `SubdivisionMesh` arrays. Hierarchical meshes add a string count per
//! tag. Host-native surfaces are written from their base level.

use super::{extra_params, param_equiv, point_param, uv_params, BuildContext, ExtraTarget, MeshTopology};
use crate::param::{DetailType, TypedParameter};
use crate::ri::Ri;
use crate::scene::{Mesh, SubdivScheme, SubdivSurface};
use crate::util::Result;

/// Sharpness written for host-native creases.
pub const HARD_CREASE: f32 = 7.0;

/// Tag list in the layout `SubdivisionMesh` expects.
///
/// `nargs` holds two counts per tag (integer args, float args), three for
/// hierarchical meshes (plus string args); the argument arrays are consumed
/// in tag order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubdivTags {
    pub tags: Vec<String>,
    pub nargs: Vec<i32>,
    pub intargs: Vec<i32>,
    pub floatargs: Vec<f32>,
    pub stringargs: Vec<String>,
    pub hierarchical: bool,
}

impl SubdivTags {
    /// Empty list with string counts.
    pub fn hierarchical() -> Self {
        Self {
            hierarchical: true,
            ..Default::default()
        }
    }

    fn push(&mut self, tag: &str, ints: &[i32], floats: &[f32]) {
        self.push_with_strings(tag, ints, floats, &[]);
    }

    fn push_with_strings(&mut self, tag: &str, ints: &[i32], floats: &[f32], strings: &[&str]) {
        self.tags.push(tag.to_string());
        self.nargs.push(ints.len() as i32);
        self.nargs.push(floats.len() as i32);
        self.intargs.extend_from_slice(ints);
        self.floatargs.extend_from_slice(floats);
        if self.hierarchical {
            self.nargs.push(strings.len() as i32);
            self.stringargs.extend(strings.iter().map(|s| s.to_string()));
        }
    }

    /// Counts per tag in `nargs`.
    pub fn stride(&self) -> usize {
        if self.hierarchical {
            3
        } else {
            2
        }
    }

    /// Sharp edge between two vertices.
    pub fn add_crease(&mut self, v0: i32, v1: i32, sharpness: f32) {
        self.push("crease", &[v0, v1], &[sharpness]);
    }

    /// Sharp vertex.
    pub fn add_corner(&mut self, vertex: i32, sharpness: f32) {
        self.push("corner", &[vertex], &[sharpness]);
    }

    /// Face left out of the limit surface.
    pub fn add_hole(&mut self, face: i32) {
        self.push("hole", &[face], &[]);
    }

    /// Vertices shared with other surfaces carrying the same `id`.
    pub fn add_stitch(&mut self, id: i32, vertices: &[i32]) {
        let mut ints = Vec::with_capacity(vertices.len() + 1);
        ints.push(id);
        ints.extend_from_slice(vertices);
        self.push("stitch", &ints, &[]);
    }

    pub fn add_interpolate_boundary(&mut self, mode: i32) {
        self.push("interpolateboundary", &[mode], &[]);
    }

    pub fn add_facevarying_interpolate_boundary(&mut self, mode: i32) {
        self.push("facevaryinginterpolateboundary", &[mode], &[]);
    }

    pub fn add_facevarying_propagate_corners(&mut self, on: bool) {
        self.push("facevaryingpropagatecorners", &[on as i32], &[]);
    }

    /// Crease subdivision rule. Dropped on plain meshes, which take no
    /// string arguments.
    pub fn add_crease_method(&mut self, method: &str) {
        if !self.hierarchical {
            tracing::debug!(method, "crease method needs a hierarchical mesh, dropped");
            return;
        }
        self.push_with_strings("creasemethod", &[], &[], &[method]);
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Subdivision mesh written as `SubdivisionMesh`, or
/// `HierarchicalSubdivisionMesh` when its tags are hierarchical.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubdivData {
    pub scheme: &'static str,
    pub nverts: Vec<i32>,
    pub verts: Vec<i32>,
    pub tags: SubdivTags,
    pub params: Vec<TypedParameter>,
}

fn uv_detail(uv_interpolation: i32) -> DetailType {
    if uv_interpolation == 2 {
        DetailType::FaceVertex
    } else {
        DetailType::FaceVarying
    }
}

/// Topology of `mesh`, `None` (logged) when there is nothing to write.
fn topology(mesh: &Mesh, ctx: &BuildContext<'_>) -> Option<MeshTopology> {
    if mesh.points.is_empty() {
        tracing::info!(object = ctx.path, "subdivision mesh has no vertices, nothing to write");
        return None;
    }
    let topo = MeshTopology::build(mesh);
    if topo.is_none() {
        tracing::warn!(object = ctx.path, "subdivision topology is inconsistent, skipped");
    }
    topo
}

fn surface_params(mesh: &Mesh, topo: &MeshTopology, uv_interpolation: i32, ctx: &BuildContext<'_>) -> Vec<TypedParameter> {
    let mut params = vec![point_param(&mesh.points)];
    params.extend(uv_params(mesh, topo, uv_detail(uv_interpolation), ctx.options));
    params.extend(extra_params(
        &ctx.attributes.rman,
        ExtraTarget {
            face_vertices: Some(topo.face_vertex_count()),
            ..Default::default()
        },
    ));
    params
}

impl SubdivData {
    /// Polygon mesh rendered as a subdivision surface.
    pub fn build(mesh: &Mesh, ctx: &BuildContext<'_>) -> Self {
        let sub = &ctx.attributes.subdivision;
        let Some(topo) = topology(mesh, ctx) else {
            return Self::default();
        };
        let params = surface_params(mesh, &topo, sub.uv_interpolation, ctx);

        let mut tags = if sub.hierarchical {
            SubdivTags::hierarchical()
        } else {
            SubdivTags::default()
        };
        if !sub.crease_method.is_empty() {
            tags.add_crease_method(&sub.crease_method);
        }
        if ctx.options.host_poly_creases {
            for c in &mesh.edge_creases {
                tags.add_crease(c.edge[0], c.edge[1], c.sharpness);
            }
            for c in &mesh.vertex_creases {
                tags.add_corner(c.vertex, c.sharpness);
            }
        } else {
            for c in &sub.creases {
                tags.add_crease(c.edge[0], c.edge[1], c.sharpness);
            }
            for c in &sub.corners {
                tags.add_corner(c.vertex, c.sharpness);
            }
        }
        for &face in &sub.holes {
            tags.add_hole(face);
        }
        for s in &sub.stitches {
            tags.add_stitch(s.id, &s.vertices);
        }
        if sub.interpolate_boundary != 0 {
            tags.add_interpolate_boundary(sub.interpolate_boundary);
        }
        if sub.uv_interpolation == 0 {
            tags.add_facevarying_interpolate_boundary(0);
        }
        if sub.hierarchical && sub.propagate_corners {
            tags.add_facevarying_propagate_corners(true);
        }

        Self {
            scheme: sub.scheme.name(),
            nverts: topo.nverts,
            verts: topo.verts,
            tags,
            params,
        }
    }

    /// Host-native subdivision surface, always Catmull-Clark.
    pub fn from_surface(surface: &SubdivSurface, ctx: &BuildContext<'_>) -> Self {
        let mesh = surface.base_mesh();
        let Some(topo) = topology(&mesh, ctx) else {
            return Self::default();
        };
        let params = surface_params(&mesh, &topo, surface.uv_interpolation, ctx);

        let npoints = surface.points.len() as i32;
        let in_range = |v: i32| (0..npoints).contains(&v);
        let mut tags = SubdivTags::default();
        for &[a, b] in &surface.creased_edges {
            if in_range(a) && in_range(b) {
                tags.add_crease(a, b, HARD_CREASE);
            } else {
                tracing::warn!(object = ctx.path, a, b, "crease edge outside the base level, dropped");
            }
        }
        for &v in &surface.creased_vertices {
            if in_range(v) {
                tags.add_corner(v, HARD_CREASE);
            } else {
                tracing::warn!(object = ctx.path, vertex = v, "crease vertex outside the base level, dropped");
            }
        }
        if surface.interpolate_boundary != 0 {
            tags.add_interpolate_boundary(surface.interpolate_boundary);
        }
        if surface.uv_interpolation == 0 {
            tags.add_facevarying_interpolate_boundary(0);
        }

        Self {
            scheme: SubdivScheme::CatmullClark.name(),
            nverts: topo.nverts,
            verts: topo.verts,
            tags,
            params,
        }
    }

    pub fn is_writable(&self) -> bool {
        !self.nverts.is_empty()
    }

    pub fn compare(&self, other: &Self) -> bool {
        self.nverts == other.nverts && self.verts == other.verts && param_equiv(&self.params, &other.params, "P")
    }

    pub fn write(&self, ri: &mut dyn Ri) -> Result<()> {
        let t = &self.tags;
        if t.hierarchical {
            return ri.hierarchical_subdivision_mesh(
                self.scheme,
                &self.nverts,
                &self.verts,
                &t.tags,
                &t.nargs,
                &t.intargs,
                &t.floatargs,
                &t.stringargs,
                &self.params,
            );
        }
        ri.subdivision_mesh(
            self.scheme,
            &self.nverts,
            &self.verts,
            &t.tags,
            &t.nargs,
            &t.intargs,
            &t.floatargs,
            &self.params,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::RibData;
    use super::*;
    use crate::scene::{EdgeCrease, Stitch, UvSet, VertexCrease};
    use crate::util::Vec3;

    fn grid() -> Mesh {
        Mesh {
            points: (0..9).map(|i| Vec3::new((i % 3) as f32, (i / 3) as f32, 0.0)).collect(),
            face_counts: vec![4; 4],
            face_vertices: vec![0, 1, 4, 3, 1, 2, 5, 4, 3, 4, 7, 6, 4, 5, 8, 7],
            edge_creases: vec![EdgeCrease { edge: [1, 4], sharpness: 2.0 }],
            ..Default::default()
        }
    }

    fn aligned(t: &SubdivTags) -> bool {
        let stride = t.stride();
        let ints: i32 = t.nargs.iter().step_by(stride).sum();
        let floats: i32 = t.nargs.iter().skip(1).step_by(stride).sum();
        let strings: i32 = if t.hierarchical {
            t.nargs.iter().skip(2).step_by(stride).sum()
        } else {
            0
        };
        t.nargs.len() == stride * t.tags.len()
            && ints as usize == t.intargs.len()
            && floats as usize == t.floatargs.len()
            && strings as usize == t.stringargs.len()
    }

    #[test]
    fn test_tag_alignment() {
        let mut t = SubdivTags::default();
        t.add_crease(3, 7, 5.0);
        t.add_corner(2, 1.0);
        t.add_hole(0);
        t.add_stitch(9, &[1, 2, 3]);
        t.add_interpolate_boundary(1);
        t.add_facevarying_interpolate_boundary(0);
        assert!(aligned(&t));
        assert_eq!(t.nargs, [2, 1, 1, 1, 1, 0, 4, 0, 1, 0, 1, 0]);
        assert_eq!(t.intargs, [3, 7, 2, 0, 9, 1, 2, 3, 1, 0]);
        assert_eq!(t.floatargs, [5.0, 1.0]);
    }

    #[test]
    fn test_user_crease_set() {
        let mut fx = Fixture::default();
        fx.attributes.subdivision.enabled = true;
        fx.attributes.subdivision.creases = vec![EdgeCrease { edge: [3, 7], sharpness: 5.0 }];
        let data = SubdivData::build(&grid(), &fx.ctx());
        assert_eq!(data.tags.tags, ["crease", "interpolateboundary"]);
        assert_eq!(&data.tags.nargs[..2], &[2, 1]);
        assert_eq!(&data.tags.intargs[..2], &[3, 7]);
        assert_eq!(data.tags.floatargs, [5.0]);
        assert!(aligned(&data.tags));
    }

    #[test]
    fn test_host_creases_replace_sets() {
        let mut fx = Fixture::default();
        fx.options.host_poly_creases = true;
        fx.attributes.subdivision.creases = vec![EdgeCrease { edge: [3, 7], sharpness: 5.0 }];
        fx.attributes.subdivision.corners = vec![VertexCrease { vertex: 0, sharpness: 1.0 }];
        fx.attributes.subdivision.holes = vec![2];
        fx.attributes.subdivision.stitches = vec![Stitch { id: 4, vertices: vec![0, 1] }];
        fx.attributes.subdivision.interpolate_boundary = 0;
        fx.attributes.subdivision.uv_interpolation = 0;
        let data = SubdivData::build(&grid(), &fx.ctx());
        assert_eq!(data.tags.tags, ["crease", "hole", "stitch", "facevaryinginterpolateboundary"]);
        assert_eq!(data.tags.intargs, [1, 4, 2, 4, 0, 1, 0]);
        assert!(aligned(&data.tags));
    }

    #[test]
    fn test_write_scheme_and_no_normals() {
        let mut fx = Fixture::default();
        fx.attributes.subdivision.scheme = SubdivScheme::Loop;
        fx.attributes.subdivision.interpolate_boundary = 0;
        let mut m = grid();
        m.normals = vec![Vec3::Z; 9];
        let data = SubdivData::build(&m, &fx.ctx());
        assert!(data.params.iter().all(|p| p.name() != "N"));
        let text = rib(&RibData::Subdivision(data));
        assert!(text.starts_with("SubdivisionMesh \"loop\" [4 4 4 4] [3 4 1 0 "));
        assert!(!text.contains("interpolateboundary"));
    }

    #[test]
    fn test_hierarchical_tag_alignment() {
        let mut t = SubdivTags::hierarchical();
        t.add_crease_method("chaikin");
        t.add_crease(3, 7, 5.0);
        t.add_hole(1);
        t.add_facevarying_propagate_corners(true);
        assert!(aligned(&t));
        assert_eq!(t.nargs, [0, 0, 1, 2, 1, 0, 1, 0, 0, 1, 0, 0]);
        assert_eq!(t.intargs, [3, 7, 1, 1]);
        assert_eq!(t.stringargs, ["chaikin"]);

        let mut plain = SubdivTags::default();
        plain.add_crease_method("chaikin");
        assert!(plain.is_empty());
    }

    #[test]
    fn test_hierarchical_mesh() {
        let mut fx = Fixture::default();
        let sub = &mut fx.attributes.subdivision;
        sub.enabled = true;
        sub.hierarchical = true;
        sub.crease_method = "chaikin".into();
        sub.propagate_corners = true;
        sub.creases = vec![EdgeCrease { edge: [3, 7], sharpness: 5.0 }];
        let data = SubdivData::build(&grid(), &fx.ctx());
        assert_eq!(
            data.tags.tags,
            ["creasemethod", "crease", "interpolateboundary", "facevaryingpropagatecorners"]
        );
        assert!(aligned(&data.tags));
        let text = rib(&RibData::Subdivision(data));
        assert!(text.starts_with("HierarchicalSubdivisionMesh \"catmull-clark\" [4 4 4 4] "));
        assert!(text.contains("[0 0 1 2 1 0 1 0 0 1 0 0] [3 7 1 1] [5] [\"chaikin\"]"));
    }

    fn native() -> SubdivSurface {
        let g = grid();
        SubdivSurface {
            points: g.points,
            face_counts: g.face_counts,
            face_vertices: g.face_vertices,
            uv: UvSet {
                name: "map1".into(),
                u: vec![0.0; 16],
                v: vec![0.0; 16],
            },
            creased_edges: vec![[1, 4], [4, 99]],
            creased_vertices: vec![8],
            ..Default::default()
        }
    }

    #[test]
    fn test_native_surface() {
        let fx = Fixture::default();
        let data = SubdivData::from_surface(&native(), &fx.ctx());
        assert!(data.is_writable());
        assert_eq!(data.scheme, "catmull-clark");
        assert_eq!(
            data.tags.tags,
            ["crease", "corner", "interpolateboundary", "facevaryinginterpolateboundary"]
        );
        assert_eq!(data.tags.intargs, [1, 4, 8, 2, 0]);
        assert_eq!(data.tags.floatargs, [HARD_CREASE, HARD_CREASE]);
        assert!(aligned(&data.tags));
        assert!(data.params.iter().any(|p| p.name() == "s" || p.name() == "st"));

        let text = rib(&RibData::SubdivSurface(data));
        assert!(text.starts_with("SubdivisionMesh \"catmull-clark\" [4 4 4 4] "));
        assert!(text.contains("[\"crease\" \"corner\" \"interpolateboundary\" \"facevaryinginterpolateboundary\"] [2 1 1 1 1 0 1 0] [1 4 8 2 0] [7 7]"));
    }

    #[test]
    fn test_native_surface_degenerate() {
        let fx = Fixture::default();
        assert!(!SubdivData::from_surface(&SubdivSurface::default(), &fx.ctx()).is_writable());
        let mut s = native();
        s.face_vertices.pop();
        assert!(!SubdivData::from_surface(&s, &fx.ctx()).is_writable());
    }
}
