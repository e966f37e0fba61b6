//! Extractors: renderer-ready data for one scene shape.
//!
//! Each scene shape is converted once into topology arrays plus a list of
//! [`TypedParameter`]s. The result is a [`RibData`], a closed enum over the
//! concrete extractors:
//! - [`MeshData`] / [`SubdivData`] - polygons, subdivided meshes and native
//!   subdivision surfaces
//! - [`SurfaceData`] - trimmed NURBS patches
//! - [`NuCurveData`] / [`CurveGroupData`] - NURBS curves as cubic B-splines
//! - [`PfxData`] / [`PfxToonData`] / [`PfxHairData`] - paint effects output
//! - [`ParticleData`] - points, streaks and spheres
//! - [`LightData`] - light sources
//! - [`LocatorData`], [`SphereData`], [`CustomData`], [`RibGenData`] - helpers
//!
//! Every extractor answers `compare()` for animation detection: two samples
//! of different [`ObjectType`] are always different.

mod curves;
mod custom;
mod light;
mod locator;
mod mesh;
mod nucurve;
mod params;
mod particles;
mod pfx;
mod pfx_hair;
mod pfx_toon;
mod ribgen;
mod sphere;
mod subdivision;
mod surface;

pub use curves::*;
pub use custom::*;
pub use light::*;
pub use locator::*;
pub use mesh::*;
pub use nucurve::*;
pub use params::*;
pub use particles::*;
pub use pfx::*;
pub use pfx_hair::*;
pub use pfx_toon::*;
pub use ribgen::*;
pub use sphere::*;
pub use subdivision::*;
pub use surface::*;

use crate::param::TypedParameter;
use crate::ri::{LightHandle, Ri};
use crate::scene::{NodeAttributes, Shape};
use crate::shader::ShaderQuery;
use crate::util::{equiv_slice, DMat4, ExpandContext, Result, RtMatrix};
use ribgen_api::RenderPass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Object types
// ============================================================================

/// Discriminant of an extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Mesh,
    /// Polygon mesh rendered as a subdivision surface.
    Subdivision,
    /// Host-native subdivision surface.
    SubdivSurface,
    NurbsSurface,
    NurbsCurve,
    /// All curves of a curve group in one primitive.
    Curves,
    PfxTube,
    PfxLeaf,
    PfxPetal,
    PfxToon,
    PfxHair,
    Particles,
    Light,
    Locator,
    CoordSys,
    ClipPlane,
    ImplicitSphere,
    RibGen,
    Custom,
}

impl ObjectType {
    /// Short name used in comments and log messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::Subdivision => "subdivision",
            Self::SubdivSurface => "subdivSurface",
            Self::NurbsSurface => "nurbsSurface",
            Self::NurbsCurve => "nurbsCurve",
            Self::Curves => "curves",
            Self::PfxTube => "pfxTube",
            Self::PfxLeaf => "pfxLeaf",
            Self::PfxPetal => "pfxPetal",
            Self::PfxToon => "pfxToon",
            Self::PfxHair => "pfxHair",
            Self::Particles => "particles",
            Self::Light => "light",
            Self::Locator => "locator",
            Self::CoordSys => "coordSys",
            Self::ClipPlane => "clipPlane",
            Self::ImplicitSphere => "implicitSphere",
            Self::RibGen => "ribGen",
            Self::Custom => "custom",
        }
    }

    /// Cubic curves written with the B-spline basis.
    pub fn is_bspline_curves(self) -> bool {
        matches!(
            self,
            Self::NurbsCurve | Self::Curves | Self::PfxTube | Self::PfxLeaf | Self::PfxPetal | Self::PfxHair
        )
    }

    /// Written in the light block rather than the object block.
    pub fn is_light(self) -> bool {
        self == Self::Light
    }

    /// Written in the coordinate system block.
    pub fn is_coordinate_system(self) -> bool {
        matches!(self, Self::CoordSys | Self::ClipPlane)
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Build and write contexts
// ============================================================================

/// Extraction switches taken from the render globals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Also write mesh UVs as facevarying `u` / `v`.
    pub output_mesh_uvs: bool,
    /// Write UV sets as named arrays (`s`, `t`, `u_uvSet`, ...).
    pub rms_arrays: bool,
    /// Transpose NURBS parameterisation.
    pub swap_uv: bool,
    /// Map NURBS knot ranges to `[0, 1]`.
    pub normalize_nurbs_uv: bool,
    /// Take subdivision creases from the mesh instead of user sets.
    pub host_poly_creases: bool,
    /// Write curve groups as one `Curves` primitive.
    pub render_all_curves: bool,
    pub do_shadows: bool,
    /// Keep every light's host scale instead of flipping Z.
    pub use_light_scale: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            output_mesh_uvs: false,
            rms_arrays: false,
            swap_uv: false,
            normalize_nurbs_uv: true,
            host_poly_creases: false,
            render_all_curves: false,
            do_shadows: true,
            use_light_scale: false,
        }
    }
}

/// Global inputs of [`shadow_name`] that do not depend on the light.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShadowNaming {
    /// Directory prefix, already made relative if needed.
    pub dir: String,
    pub scene_name: String,
    /// Leave the scene name out of shadow map names.
    pub shape_only: bool,
    /// Zero-pad frame numbers to this width (0 disables).
    pub padding: usize,
    pub extension: String,
}

/// Everything an extractor needs while reading one shape.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub options: &'a ExtractOptions,
    pub naming: &'a ShadowNaming,
    pub frame: i64,
    /// Short node name.
    pub name: &'a str,
    /// Full DAG path.
    pub path: &'a str,
    /// World matrix of the node.
    pub world: DMat4,
    pub attributes: &'a NodeAttributes,
    pub shaders: &'a BTreeMap<String, ShaderQuery>,
    pub expand: &'a ExpandContext,
}

/// Per-write state handed to extractors.
#[derive(Clone, Copy)]
pub struct WriteContext<'a> {
    pub frame: i64,
    pub pass: RenderPass,
    pub sample_times: &'a [f32],
    pub camera_matrix: RtMatrix,
    pub shutter_angle: f32,
    pub transformation_blur: bool,
    pub deformation_blur: bool,
    pub compress: bool,
    pub object_name: &'a str,
    pub loader: &'a dyn RibGenLoader,
}

impl WriteContext<'_> {
    /// True when rendering depth maps.
    pub fn is_shadow_pass(&self) -> bool {
        self.pass == RenderPass::Shadow
    }
}

// ============================================================================
// RibData
// ============================================================================

/// One extracted shape.
#[derive(Clone, Debug, PartialEq)]
pub enum RibData {
    Mesh(MeshData),
    Subdivision(SubdivData),
    SubdivSurface(SubdivData),
    Surface(SurfaceData),
    NuCurve(NuCurveData),
    Curves(CurveGroupData),
    Pfx(PfxData),
    PfxToon(PfxToonData),
    PfxHair(PfxHairData),
    Particles(ParticleData),
    Light(LightData),
    Locator(LocatorData),
    Sphere(SphereData),
    RibGen(RibGenData),
    Custom(CustomData),
}

impl RibData {
    /// Extract `shape`.
    ///
    /// Returns `Ok(None)` for shapes without a primitive of their own
    /// (cameras, curve group markers, instance references). Degenerate
    /// geometry still yields data; check [`RibData::is_writable`].
    pub fn build(shape: &Shape, ctx: &BuildContext<'_>) -> Result<Option<Self>> {
        let attrs = ctx.attributes;
        let data = match shape {
            Shape::Mesh(m) if attrs.subdivision.enabled => Self::Subdivision(SubdivData::build(m, ctx)),
            Shape::Mesh(m) => Self::Mesh(MeshData::build(m, ctx)),
            Shape::SubdivSurface(s) => Self::SubdivSurface(SubdivData::from_surface(s, ctx)),
            Shape::NurbsSurface(s) => Self::Surface(SurfaceData::build(s, ctx)),
            Shape::NurbsCurve(c) => Self::NuCurve(NuCurveData::build(c, ctx)),
            Shape::PaintEffects(p) => Self::Pfx(PfxData::build(p, ctx)),
            Shape::PfxToon(t) => Self::PfxToon(PfxToonData::build(t, ctx)),
            Shape::PfxHair(h) => Self::PfxHair(PfxHairData::build(h, ctx)),
            Shape::Particles(p) => Self::Particles(ParticleData::build(p, ctx)),
            Shape::Light(l) => Self::Light(LightData::build(l, ctx)?),
            Shape::Locator => Self::Locator(LocatorData::new(ObjectType::Locator, ctx.name)),
            Shape::CoordSys => Self::Locator(LocatorData::new(ObjectType::CoordSys, ctx.name)),
            Shape::ClipPlane => Self::Locator(LocatorData::new(ObjectType::ClipPlane, ctx.name)),
            Shape::ImplicitSphere(s) => Self::Sphere(SphereData::new(s.radius)),
            Shape::RibGen(g) => Self::RibGen(RibGenData::build(g, ctx)),
            Shape::Custom(c) => Self::Custom(CustomData::new(&c.rib)),
            Shape::CurveGroup(_) | Shape::Camera(_) | Shape::Instance { .. } => return Ok(None),
        };
        Ok(Some(data))
    }

    /// Discriminant.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Mesh(_) => ObjectType::Mesh,
            Self::Subdivision(_) => ObjectType::Subdivision,
            Self::SubdivSurface(_) => ObjectType::SubdivSurface,
            Self::Surface(_) => ObjectType::NurbsSurface,
            Self::NuCurve(_) => ObjectType::NurbsCurve,
            Self::Curves(_) => ObjectType::Curves,
            Self::Pfx(p) => p.object_type(),
            Self::PfxToon(_) => ObjectType::PfxToon,
            Self::PfxHair(_) => ObjectType::PfxHair,
            Self::Particles(_) => ObjectType::Particles,
            Self::Light(_) => ObjectType::Light,
            Self::Locator(l) => l.object_type(),
            Self::Sphere(_) => ObjectType::ImplicitSphere,
            Self::RibGen(_) => ObjectType::RibGen,
            Self::Custom(_) => ObjectType::Custom,
        }
    }

    /// False for degenerate input that must be skipped.
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Mesh(d) => d.is_writable(),
            Self::Subdivision(d) | Self::SubdivSurface(d) => d.is_writable(),
            Self::Surface(d) => d.is_writable(),
            Self::NuCurve(d) => d.is_writable(),
            Self::Curves(d) => d.is_writable(),
            Self::Pfx(d) => d.is_writable(),
            Self::Particles(d) => d.is_writable(),
            Self::RibGen(d) => d.is_writable(),
            _ => true,
        }
    }

    /// Structural equality used for animation detection.
    ///
    /// Reflexive; always false across object types.
    pub fn compare(&self, other: &RibData) -> bool {
        if self.object_type() != other.object_type() {
            return false;
        }
        match (self, other) {
            (Self::Mesh(a), Self::Mesh(b)) => a.compare(b),
            (Self::Subdivision(a), Self::Subdivision(b)) => a.compare(b),
            (Self::SubdivSurface(a), Self::SubdivSurface(b)) => a.compare(b),
            (Self::Surface(a), Self::Surface(b)) => a.compare(b),
            (Self::NuCurve(a), Self::NuCurve(b)) => a.compare(b),
            (Self::Curves(a), Self::Curves(b)) => a.compare(b),
            (Self::Pfx(a), Self::Pfx(b)) => a.compare(b),
            (Self::PfxToon(_), Self::PfxToon(_)) => true,
            (Self::PfxHair(a), Self::PfxHair(b)) => a.compare(b),
            (Self::Particles(a), Self::Particles(b)) => a.compare(b),
            (Self::Light(_), Self::Light(_)) => true,
            (Self::Locator(_), Self::Locator(_)) => true,
            (Self::Sphere(a), Self::Sphere(b)) => a.compare(b),
            (Self::RibGen(a), Self::RibGen(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => a == b,
            _ => false,
        }
    }

    /// Number of separate RI statements this primitive needs.
    pub fn granularity(&self) -> usize {
        match self {
            Self::Surface(d) => d.granularity(),
            Self::Particles(d) => d.granularity(),
            Self::Pfx(d) => d.granularity(),
            _ => 1,
        }
    }

    /// True when grain `grain` may go inside a motion block.
    pub fn is_next_grain_animated(&self, grain: usize) -> bool {
        match self {
            Self::Surface(d) => d.is_grain_animated(grain),
            Self::Particles(d) => d.is_grain_animated(grain),
            _ => true,
        }
    }

    /// Write grain `grain`. Returns true while grains remain after it.
    pub fn write_next_grain(&self, ri: &mut dyn Ri, ctx: &WriteContext<'_>, grain: usize) -> Result<bool> {
        match self {
            Self::Surface(d) => d.write_grain(ri, grain)?,
            Self::Particles(d) => d.write_grain(ri, grain)?,
            _ => {
                self.write(ri, ctx)?;
            }
        }
        Ok(grain + 1 < self.granularity())
    }

    /// Write the whole primitive. Lights return their handle.
    pub fn write(&self, ri: &mut dyn Ri, ctx: &WriteContext<'_>) -> Result<Option<LightHandle>> {
        match self {
            Self::Mesh(d) => d.write(ri)?,
            Self::Subdivision(d) | Self::SubdivSurface(d) => d.write(ri)?,
            Self::Surface(d) => {
                for grain in 0..d.granularity() {
                    d.write_grain(ri, grain)?;
                }
            }
            Self::NuCurve(d) => d.write(ri)?,
            Self::Curves(d) => d.write(ri)?,
            Self::Pfx(d) => d.write(ri)?,
            Self::PfxToon(d) => d.write(ri)?,
            Self::PfxHair(d) => d.write(ri)?,
            Self::Particles(d) => {
                for grain in 0..d.granularity() {
                    d.write_grain(ri, grain)?;
                }
            }
            Self::Light(d) => return d.write(ri, ctx),
            Self::Locator(d) => d.write(ri)?,
            Self::Sphere(d) => d.write(ri)?,
            Self::RibGen(d) => d.write(ri, ctx)?,
            Self::Custom(d) => d.write(ri)?,
        }
        Ok(None)
    }

    /// Light payload, if this is a light.
    pub fn as_light(&self) -> Option<&LightData> {
        match self {
            Self::Light(l) => Some(l),
            _ => None,
        }
    }
}

// ============================================================================
// Helpers shared by extractors
// ============================================================================

/// True when both lists hold a parameter `name` with near-equal payloads,
/// or neither holds it.
pub(crate) fn param_equiv(a: &[TypedParameter], b: &[TypedParameter], name: &str) -> bool {
    let pa = a.iter().find(|p| p.name() == name);
    let pb = b.iter().find(|p| p.name() == name);
    match (pa, pb) {
        (Some(x), Some(y)) => equiv_slice(x.float_data(), y.float_data()),
        (None, None) => true,
        _ => false,
    }
}

/// Parameter named `name`.
pub fn find_param<'a>(params: &'a [TypedParameter], name: &str) -> Option<&'a TypedParameter> {
    params.iter().find(|p| p.name() == name)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::scene::{ImplicitSphere, Mesh};
    use crate::util::Vec3;

    fn quad() -> Mesh {
        Mesh {
            points: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            face_counts: vec![4],
            face_vertices: vec![0, 1, 2, 3],
            ..Default::default()
        }
    }

    #[test]
    fn test_compare_reflexive_and_typed() {
        let fx = Fixture::default();
        let mesh = RibData::build(&Shape::Mesh(quad()), &fx.ctx()).unwrap().unwrap();
        let sphere = RibData::build(&Shape::ImplicitSphere(ImplicitSphere::default()), &fx.ctx())
            .unwrap()
            .unwrap();
        assert!(mesh.compare(&mesh));
        assert!(sphere.compare(&sphere));
        assert!(!mesh.compare(&sphere));
        assert!(!sphere.compare(&mesh));
    }

    #[test]
    fn test_subdivision_selected_by_attribute() {
        let mut fx = Fixture::default();
        fx.attributes.subdivision.enabled = true;
        let data = RibData::build(&Shape::Mesh(quad()), &fx.ctx()).unwrap().unwrap();
        assert_eq!(data.object_type(), ObjectType::Subdivision);

        let q = quad();
        let native = Shape::SubdivSurface(crate::scene::SubdivSurface {
            points: q.points,
            face_counts: q.face_counts,
            face_vertices: q.face_vertices,
            ..Default::default()
        });
        let surface = RibData::build(&native, &fx.ctx()).unwrap().unwrap();
        assert_eq!(surface.object_type(), ObjectType::SubdivSurface);
        assert!(surface.is_writable());
        assert!(surface.compare(&surface));
        assert!(!surface.compare(&data));
    }

    #[test]
    fn test_cameras_have_no_data() {
        let fx = Fixture::default();
        let cam = Shape::Camera(Default::default());
        assert!(RibData::build(&cam, &fx.ctx()).unwrap().is_none());
    }

    #[test]
    fn test_object_type_flags() {
        assert!(ObjectType::PfxHair.is_bspline_curves());
        assert!(!ObjectType::PfxToon.is_bspline_curves());
        assert!(ObjectType::ClipPlane.is_coordinate_system());
        assert_eq!(ObjectType::NurbsSurface.to_string(), "nurbsSurface");
    }
}
