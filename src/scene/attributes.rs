//! Render attributes attached to scene nodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Loosely typed attribute or shader parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Float(f32),
    Floats(Vec<f32>),
    String(String),
    Strings(Vec<String>),
}

impl Value {
    /// Float payload, empty for strings.
    pub fn as_floats(&self) -> &[f32] {
        match self {
            Self::Float(v) => std::slice::from_ref(v),
            Self::Floats(v) => v,
            _ => &[],
        }
    }

    /// String payload, empty for floats.
    pub fn as_strings(&self) -> &[String] {
        match self {
            Self::String(v) => std::slice::from_ref(v),
            Self::Strings(v) => v,
            _ => &[],
        }
    }

    /// Number of scalar entries.
    pub fn len(&self) -> usize {
        match self {
            Self::Float(_) | Self::String(_) => 1,
            Self::Floats(v) => v.len(),
            Self::Strings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Subdivision scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubdivScheme {
    #[default]
    CatmullClark,
    Loop,
    Bilinear,
}

impl SubdivScheme {
    /// RIB scheme name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CatmullClark => "catmull-clark",
            Self::Loop => "loop",
            Self::Bilinear => "bilinear",
        }
    }
}

/// Vertices stitched together across separate subdivision surfaces.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stitch {
    pub id: i32,
    pub vertices: Vec<i32>,
}

/// Subdivision surface rendering of a polygon mesh.
///
/// Crease, corner, hole and stitch lists are the user-defined membership sets;
/// host crease data lives on the mesh itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubdivAttributes {
    pub enabled: bool,
    /// Written as `HierarchicalSubdivisionMesh`, which also takes string tags.
    pub hierarchical: bool,
    pub scheme: SubdivScheme,
    /// `creasemethod` tag (`normal` or `chaikin`); hierarchical meshes only.
    pub crease_method: String,
    /// `facevaryingpropagatecorners` tag; hierarchical meshes only.
    pub propagate_corners: bool,
    /// 0 off, otherwise written as `interpolateboundary`.
    pub interpolate_boundary: i32,
    /// 0 none (adds `facevaryinginterpolateboundary 0`), 1 sharp, 2 face-vertex.
    pub uv_interpolation: i32,
    pub creases: Vec<super::EdgeCrease>,
    pub corners: Vec<super::VertexCrease>,
    /// Face indices.
    pub holes: Vec<i32>,
    pub stitches: Vec<Stitch>,
}

impl Default for SubdivAttributes {
    fn default() -> Self {
        Self {
            enabled: false,
            hierarchical: false,
            scheme: SubdivScheme::CatmullClark,
            crease_method: String::new(),
            propagate_corners: false,
            interpolate_boundary: 1,
            uv_interpolation: 1,
            creases: Vec::new(),
            corners: Vec::new(),
            holes: Vec::new(),
            stitches: Vec::new(),
        }
    }
}

/// Ray tracing attributes; written only when they differ from the renderer defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceAttributes {
    pub sample_motion: bool,
    pub displacements: bool,
    pub bias: f32,
    pub max_diffuse_depth: i32,
    pub max_specular_depth: i32,
    pub visible_diffuse: bool,
    pub visible_specular: bool,
    pub visible_transmission: bool,
}

impl Default for TraceAttributes {
    fn default() -> Self {
        Self {
            sample_motion: false,
            displacements: false,
            bias: 0.01,
            max_diffuse_depth: 1,
            max_specular_depth: 2,
            visible_diffuse: false,
            visible_specular: false,
            visible_transmission: false,
        }
    }
}

/// Shader bound to a node, with per-node overrides of its defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderAssignment {
    /// Key into the scene's shader library.
    pub name: String,
    pub overrides: BTreeMap<String, Value>,
}

/// Surface, displacement and volume shaders of a node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderSlots {
    pub surface: Option<ShaderAssignment>,
    pub displacement: Option<ShaderAssignment>,
    pub volume: Option<ShaderAssignment>,
    /// Verbatim RIB used in place of a surface shader.
    pub rib_box: Option<String>,
}

/// Per-node render attributes.
///
/// `Option` fields inherit from the nearest ancestor that sets them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAttributes {
    pub primary_visibility: bool,
    pub casts_shadows: bool,
    pub receive_shadows: bool,
    pub double_sided: bool,
    pub reverse_orientation: bool,
    pub matte: bool,
    /// Skip this node entirely.
    pub ignore: bool,
    /// Write the node's attributes and transform but not its geometry.
    pub ignore_shapes: bool,
    pub transformation_blur: Option<bool>,
    pub deformation_blur: Option<bool>,
    pub motion_factor: Option<f32>,
    /// Sets this node belongs to (shadow geometry sets).
    pub sets: Vec<String>,
    /// Render layers; empty means every layer.
    pub layers: Vec<String>,
    pub subdivision: SubdivAttributes,
    /// Lights toggled away from their default illumination for this node.
    pub light_links: Vec<String>,
    pub grouping: String,
    pub shading_rate: Option<f32>,
    pub color: Option<[f32; 3]>,
    pub opacity: Option<[f32; 3]>,
    pub trace: TraceAttributes,
    pub shaders: ShaderSlots,
    /// Comment RIB box.
    pub rib_box: String,
    pub read_archive: String,
    /// Extra primitive variables, keyed `rmanF<name>`, `rmanP<name>`, ...
    pub rman: BTreeMap<String, Value>,
}

impl Default for NodeAttributes {
    fn default() -> Self {
        Self {
            primary_visibility: true,
            casts_shadows: true,
            receive_shadows: true,
            double_sided: true,
            reverse_orientation: false,
            matte: false,
            ignore: false,
            ignore_shapes: false,
            transformation_blur: None,
            deformation_blur: None,
            motion_factor: None,
            sets: Vec::new(),
            layers: Vec::new(),
            subdivision: SubdivAttributes::default(),
            light_links: Vec::new(),
            grouping: String::new(),
            shading_rate: None,
            color: None,
            opacity: None,
            trace: TraceAttributes::default(),
            shaders: ShaderSlots::default(),
            rib_box: String::new(),
            read_archive: String::new(),
            rman: BTreeMap::new(),
        }
    }
}

impl NodeAttributes {
    /// True if the node is a member of `set`.
    pub fn in_set(&self, set: &str) -> bool {
        self.sets.iter().any(|s| s == set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_untagged() {
        let v: Value = serde_json::from_str("0.5").unwrap();
        assert_eq!(v.as_floats(), &[0.5]);
        let v: Value = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(v.len(), 3);
        let v: Value = serde_json::from_str("\"tex.tx\"").unwrap();
        assert_eq!(v.as_strings(), &["tex.tx".to_string()]);
        assert!(v.as_floats().is_empty());
    }

    #[test]
    fn test_attribute_defaults() {
        let a: NodeAttributes = serde_json::from_str(r#"{"matte": true}"#).unwrap();
        assert!(a.matte && a.double_sided && a.primary_visibility);
        assert_eq!(a.transformation_blur, None);
        assert_eq!(a.subdivision.scheme.name(), "catmull-clark");
        assert_eq!(a.trace.bias, 0.01);
    }
}
