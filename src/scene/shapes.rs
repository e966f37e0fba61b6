//! Shape payloads carried by scene nodes.
//!
//! Every shape is a plain serde struct with defaults for every field, so a
//! scene file only lists what differs from the host's defaults.

use crate::util::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Geometry, light or helper attached to a scene node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Mesh(Mesh),
    /// Host-native subdivision surface.
    SubdivSurface(SubdivSurface),
    NurbsSurface(NurbsSurface),
    NurbsCurve(NurbsCurve),
    /// NURBS curves below this node are written as one primitive.
    CurveGroup(CurveGroup),
    PaintEffects(PaintEffects),
    PfxToon(PfxToon),
    PfxHair(PfxHair),
    Particles(Particles),
    Light(LightShape),
    Locator,
    CoordSys,
    ClipPlane,
    ImplicitSphere(ImplicitSphere),
    RibGen(RibGenShape),
    Custom(CustomShape),
    Camera(CameraShape),
    /// Shares the shape of the node at `of` (host instancing).
    Instance { of: String },
}

impl Shape {
    /// Short type name used in log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mesh(_) => "mesh",
            Self::SubdivSurface(_) => "subdiv",
            Self::NurbsSurface(_) => "nurbsSurface",
            Self::NurbsCurve(_) => "nurbsCurve",
            Self::CurveGroup(_) => "curveGroup",
            Self::PaintEffects(_) => "pfxGeometry",
            Self::PfxToon(_) => "pfxToon",
            Self::PfxHair(_) => "pfxHair",
            Self::Particles(_) => "particle",
            Self::Light(_) => "light",
            Self::Locator => "locator",
            Self::CoordSys => "coordSys",
            Self::ClipPlane => "clipPlane",
            Self::ImplicitSphere(_) => "implicitSphere",
            Self::RibGen(_) => "ribGen",
            Self::Custom(_) => "custom",
            Self::Camera(_) => "camera",
            Self::Instance { .. } => "instance",
        }
    }
}

// ============================================================================
// Polygons
// ============================================================================

/// One UV set: per face-vertex coordinates in host face-vertex order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UvSet {
    pub name: String,
    pub u: Vec<f32>,
    pub v: Vec<f32>,
}

/// Sharpness on the edge between two vertices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeCrease {
    pub edge: [i32; 2],
    pub sharpness: f32,
}

/// Sharpness on one vertex.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexCrease {
    pub vertex: i32,
    pub sharpness: f32,
}

/// Polygon mesh in host conventions (counter-clockwise faces, `v` up).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mesh {
    pub points: Vec<Vec3>,
    pub face_counts: Vec<i32>,
    pub face_vertices: Vec<i32>,
    /// One per point, or one per face-vertex.
    pub normals: Vec<Vec3>,
    pub uv_sets: Vec<UvSet>,
    /// Name of the set written as `st`; the first set when empty.
    pub current_uv_set: String,
    /// Host crease data, used when `host_poly_creases` is on.
    pub edge_creases: Vec<EdgeCrease>,
    pub vertex_creases: Vec<VertexCrease>,
}

impl Mesh {
    /// Number of face-vertices.
    pub fn face_vertex_count(&self) -> usize {
        self.face_vertices.len()
    }

    /// Current UV set followed by the others.
    pub fn ordered_uv_sets(&self) -> Vec<&UvSet> {
        let current = if self.current_uv_set.is_empty() {
            0
        } else {
            self.uv_sets
                .iter()
                .position(|s| s.name == self.current_uv_set)
                .unwrap_or(0)
        };
        let mut sets = Vec::with_capacity(self.uv_sets.len());
        if let Some(s) = self.uv_sets.get(current) {
            sets.push(s);
        }
        sets.extend(self.uv_sets.iter().enumerate().filter(|(i, _)| *i != current).map(|(_, s)| s));
        sets
    }
}

/// Host-native subdivision surface, given by its base level.
///
/// Host creases are all-or-nothing; creased edges and vertices are written
/// fully sharp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubdivSurface {
    pub points: Vec<Vec3>,
    pub face_counts: Vec<i32>,
    pub face_vertices: Vec<i32>,
    /// Per face-vertex coordinates; no `st` when empty.
    pub uv: UvSet,
    /// Creased edges as vertex pairs.
    pub creased_edges: Vec<[i32; 2]>,
    pub creased_vertices: Vec<i32>,
    /// Written as `interpolateboundary` unless 0.
    pub interpolate_boundary: i32,
    /// 0 true facevarying (adds `facevaryinginterpolateboundary 0`), 1 facevarying, 2 face-vertex.
    pub uv_interpolation: i32,
}

impl Default for SubdivSurface {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            face_counts: Vec::new(),
            face_vertices: Vec::new(),
            uv: UvSet::default(),
            creased_edges: Vec::new(),
            creased_vertices: Vec::new(),
            interpolate_boundary: 2,
            uv_interpolation: 0,
        }
    }
}

impl SubdivSurface {
    /// Base level as a polygon mesh.
    pub fn base_mesh(&self) -> Mesh {
        Mesh {
            points: self.points.clone(),
            face_counts: self.face_counts.clone(),
            face_vertices: self.face_vertices.clone(),
            uv_sets: if self.uv.u.is_empty() { Vec::new() } else { vec![self.uv.clone()] },
            ..Default::default()
        }
    }
}

// ============================================================================
// NURBS
// ============================================================================

/// One 2D trim curve in the surface's parameter space.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimCurve {
    pub degree: u32,
    /// Homogeneous `(u, v, w)` control points.
    pub cvs: Vec<Vec3>,
    /// Host knot vector (`cvs + degree - 1` values).
    pub knots: Vec<f32>,
}

/// Closed loop of trim curves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimLoop {
    pub curves: Vec<TrimCurve>,
}

/// NURBS surface with host knot conventions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NurbsSurface {
    pub degree_u: u32,
    pub degree_v: u32,
    pub cvs_u: u32,
    pub cvs_v: u32,
    /// `cvs_u + degree_u - 1` values.
    pub knots_u: Vec<f32>,
    pub knots_v: Vec<f32>,
    /// Homogeneous CVs, index `u * cvs_v + v`.
    pub cvs: Vec<Vec4>,
    pub trims: Vec<TrimLoop>,
}

impl Default for NurbsSurface {
    fn default() -> Self {
        Self {
            degree_u: 3,
            degree_v: 3,
            cvs_u: 0,
            cvs_v: 0,
            knots_u: Vec::new(),
            knots_v: Vec::new(),
            cvs: Vec::new(),
            trims: Vec::new(),
        }
    }
}

/// NURBS curve rendered as a cubic B-spline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NurbsCurve {
    pub degree: u32,
    pub cvs: Vec<Vec3>,
    pub knots: Vec<f32>,
    pub base_width: f32,
    pub tip_width: f32,
}

impl Default for NurbsCurve {
    fn default() -> Self {
        Self {
            degree: 3,
            cvs: Vec::new(),
            knots: Vec::new(),
            base_width: 0.1,
            tip_width: 0.1,
        }
    }
}

/// Group of NURBS curves rendered together, with shared widths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveGroup {
    pub base_width: f32,
    pub tip_width: f32,
}

impl Default for CurveGroup {
    fn default() -> Self {
        Self {
            base_width: 0.1,
            tip_width: 0.1,
        }
    }
}

// ============================================================================
// Paint effects
// ============================================================================

/// Paint effects element kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PfxKind {
    #[default]
    Tube,
    Leaf,
    Petal,
}

/// One render line of a paint effects stroke.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PfxLine {
    pub points: Vec<Vec3>,
    pub twist: Vec<Vec3>,
    pub width: Vec<f32>,
    pub flatness: Vec<f32>,
    pub color: Vec<Vec3>,
    pub incandescence: Vec<Vec3>,
    pub transparency: Vec<Vec3>,
}

/// Paint effects geometry (one extractor per element kind).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintEffects {
    pub kind: PfxKind,
    pub lines: Vec<PfxLine>,
    pub camera_facing: bool,
    pub uniform_width: bool,
    /// Adds a uniform random `curveID` per curve.
    pub curve_id: bool,
}

/// One toon outline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToonLine {
    pub points: Vec<Vec3>,
    pub width: Vec<f32>,
    pub color: Vec<Vec3>,
    pub transparency: Vec<Vec3>,
}

/// Toon line set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PfxToon {
    pub lines: Vec<ToonLine>,
}

/// One hair curve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HairCurve {
    pub points: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub width: Vec<f32>,
    pub color: Vec<Vec3>,
    pub transparency: Vec<Vec3>,
}

/// Shading values of the hair system, fed to the default hair surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HairShading {
    pub translucence: f32,
    pub specular_color: [f32; 3],
    pub specular_power: f32,
}

/// Hair system output curves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PfxHair {
    pub curves: Vec<HairCurve>,
    pub shading: HairShading,
}

// ============================================================================
// Particles
// ============================================================================

/// Particle render type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleRenderType {
    #[default]
    Points,
    MultiPoint,
    Streak,
    MultiStreak,
    Spheres,
}

/// Particle system snapshot. Per-particle arrays are empty when absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Particles {
    pub render_type: ParticleRenderType,
    pub positions: Vec<Vec3>,
    pub ids: Vec<i32>,
    pub radius: f32,
    pub radius_pp: Vec<f32>,
    pub color: Vec<Vec3>,
    pub opacity: Vec<f32>,
    pub velocity: Vec<Vec3>,
    pub multi_count: u32,
    pub multi_radius: f32,
    pub tail_size: f32,
    pub tail_fade: f32,
    pub fps: f32,
    /// Driven by an instancer: deformation blur is forced off.
    pub instanced: bool,
}

impl Default for Particles {
    fn default() -> Self {
        Self {
            render_type: ParticleRenderType::Points,
            positions: Vec::new(),
            ids: Vec::new(),
            radius: 0.5,
            radius_pp: Vec::new(),
            color: Vec::new(),
            opacity: Vec::new(),
            velocity: Vec::new(),
            multi_count: 10,
            multi_radius: 0.3,
            tail_size: 1.0,
            tail_fade: 1.0,
            fps: 24.0,
            instanced: false,
        }
    }
}

// ============================================================================
// Lights
// ============================================================================

/// Light classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Ambient,
    Distant,
    #[default]
    Point,
    Spot,
    Area,
    /// Driven by a user light shader.
    Rman,
}

/// Shadow settings of a light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    pub depth_map: bool,
    pub ray_traced: bool,
    pub deep: bool,
    /// Overrides the generated shadow map name.
    pub user_shadow_name: String,
    /// 0 uses the render globals default.
    pub resolution: u32,
    pub filter_size: f32,
    pub bias: f32,
    pub radius: f32,
    pub samples: i32,
    pub blur: f32,
    /// Recompute the map every frame; otherwise only at `render_at_frame`.
    pub every_frame: bool,
    pub render_at_frame: i64,
    /// Restrict the shadow pass to the members of this set.
    pub geometry_set: String,
    pub shadow_color: [f32; 3],
    /// Clipping planes of the shadow camera.
    pub near_clip: f32,
    pub far_clip: f32,
    /// Width covered by a distant light's orthographic map.
    pub width_focus: f32,
    /// Deep shadow pixel samples (0 uses the render globals).
    pub pixel_samples: u32,
    pub shading_rate_factor: f32,
    /// Deep shadow volume interpretation: continuous rather than discrete.
    pub continuous_volume: bool,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            depth_map: false,
            ray_traced: false,
            deep: false,
            user_shadow_name: String::new(),
            resolution: 0,
            filter_size: 1.0,
            bias: 0.0,
            radius: 0.0,
            samples: 16,
            blur: 0.0,
            every_frame: true,
            render_at_frame: 0,
            geometry_set: String::new(),
            shadow_color: [0.0; 3],
            near_clip: 0.001,
            far_clip: 250000.0,
            width_focus: 100.0,
            pixel_samples: 0,
            shading_rate_factor: 1.0,
            continuous_volume: false,
        }
    }
}

/// One decay region boundary pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayRegion {
    pub start: f32,
    pub end: f32,
}

/// Light parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightShape {
    pub kind: LightKind,
    pub intensity: f32,
    pub color: [f32; 3],
    pub emit_diffuse: bool,
    pub emit_specular: bool,
    /// 0 none, 1 linear, 2 quadratic, 3 cubic.
    pub decay: i32,
    /// Full cone angle in degrees.
    pub cone_angle: f32,
    /// Degrees.
    pub penumbra: f32,
    pub dropoff: f32,
    pub barn_doors: bool,
    pub left_barn_door: f32,
    pub right_barn_door: f32,
    pub top_barn_door: f32,
    pub bottom_barn_door: f32,
    pub decay_regions: bool,
    pub regions: [DecayRegion; 3],
    pub region_intensities: [f32; 3],
    pub shadows: ShadowSettings,
    pub category: String,
    pub light_id: i32,
    pub both_sides: bool,
    /// Area light hit mode: 0 default, 1 primitive, 2 shader.
    pub hit_mode: i32,
    pub light_samples: i32,
    pub light_map: String,
    pub light_map_saturation: f32,
    /// Keep the host's light scale instead of flipping Z.
    pub use_light_scale: bool,
    pub exclude_from_rib: bool,
    /// Lights on unless an object lists this light in its links.
    pub illuminates_by_default: bool,
    /// Shader name for [`LightKind::Rman`].
    pub shader: Option<String>,
}

impl Default for LightShape {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            intensity: 1.0,
            color: [1.0; 3],
            emit_diffuse: true,
            emit_specular: true,
            decay: 0,
            cone_angle: 40.0,
            penumbra: 0.0,
            dropoff: 0.0,
            barn_doors: false,
            left_barn_door: 20.0,
            right_barn_door: 20.0,
            top_barn_door: 20.0,
            bottom_barn_door: 20.0,
            decay_regions: false,
            regions: [
                DecayRegion { start: 1.0, end: 2.0 },
                DecayRegion { start: 3.0, end: 6.0 },
                DecayRegion { start: 8.0, end: 10.0 },
            ],
            region_intensities: [1.0; 3],
            shadows: ShadowSettings::default(),
            category: String::new(),
            light_id: 0,
            both_sides: false,
            hit_mode: 1,
            light_samples: 16,
            light_map: String::new(),
            light_map_saturation: 1.0,
            use_light_scale: false,
            exclude_from_rib: false,
            illuminates_by_default: true,
            shader: None,
        }
    }
}

impl LightShape {
    /// True when this light needs a depth-map render pass.
    pub fn casts_depth_map(&self) -> bool {
        self.shadows.depth_map && !matches!(self.kind, LightKind::Ambient | LightKind::Area)
    }
}

// ============================================================================
// Helpers and cameras
// ============================================================================

/// Implicit sphere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImplicitSphere {
    pub radius: f32,
}

impl Default for ImplicitSphere {
    fn default() -> Self {
        Self { radius: 1.0 }
    }
}

/// Procedural geometry module.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RibGenShape {
    /// Module path, token-expanded before loading.
    pub path: String,
}

/// Node that supplies its own RIB.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomShape {
    pub rib: String,
}

/// Camera parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraShape {
    /// Horizontal field of view in degrees.
    pub fov: f32,
    pub orthographic: bool,
    pub ortho_width: f32,
    pub near: f32,
    pub far: f32,
    pub fstop: f32,
    pub focal_length: f32,
    pub focus_distance: f32,
    /// Horizontal and vertical film offset in screen units.
    pub film_offset: [f32; 2],
    /// Degrees.
    pub shutter_angle: f32,
    pub dof: bool,
    /// Stereo rig: paths of the left and right cameras.
    pub stereo: Option<[String; 2]>,
}

impl Default for CameraShape {
    fn default() -> Self {
        Self {
            fov: 54.43,
            orthographic: false,
            ortho_width: 30.0,
            near: 0.001,
            far: 250000.0,
            fstop: 5.6,
            focal_length: 35.0,
            focus_distance: 5.0,
            film_offset: [0.0; 2],
            shutter_angle: 144.0,
            dof: false,
            stereo: None,
        }
    }
}
