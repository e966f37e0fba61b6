//! Scene snapshots: the DAG the translator walks.
//!
//! The host application is replaced by a serde-loadable tree:
//! - [`Scene`] - root nodes, render camera and shader library
//! - [`SceneNode`] - name, local transform, flags, attributes, optional shape
//! - [`Shape`] - geometry, light, camera and helper payloads
//! - [`SceneSource`] - evaluates a snapshot at any sample time
//!
//! Paths use the host's `|parent|child` form.

mod attributes;
mod shapes;
mod source;

pub use attributes::*;
pub use shapes::*;
pub use source::*;

use crate::shader::ShaderQuery;
use crate::util::{compose_trs, DMat4, DVec3, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Local transform of a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transform {
    /// Full matrix, 16 values in column order.
    Matrix(DMat4),
    /// Translate, rotate (degrees, XYZ) and scale.
    Trs {
        #[serde(default)]
        translate: DVec3,
        #[serde(default)]
        rotate: DVec3,
        #[serde(default = "unit_scale")]
        scale: DVec3,
    },
}

fn unit_scale() -> DVec3 {
    DVec3::ONE
}

impl Default for Transform {
    fn default() -> Self {
        Self::Matrix(DMat4::IDENTITY)
    }
}

impl Transform {
    /// Local matrix.
    pub fn matrix(&self) -> DMat4 {
        match self {
            Self::Matrix(m) => *m,
            Self::Trs { translate, rotate, scale } => compose_trs(*translate, *rotate, *scale),
        }
    }
}

/// One DAG node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub templated: bool,
    pub attributes: NodeAttributes,
    pub shape: Option<Shape>,
    pub children: Vec<SceneNode>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Transform::default(),
            visible: true,
            templated: false,
            attributes: NodeAttributes::default(),
            shape: None,
            children: Vec::new(),
        }
    }
}

impl SceneNode {
    /// Node with a name and a shape.
    pub fn with_shape(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape: Some(shape),
            ..Default::default()
        }
    }

    /// Builder: set the local transform.
    pub fn transformed(mut self, m: DMat4) -> Self {
        self.transform = Transform::Matrix(m);
        self
    }

    /// Builder: append a child.
    pub fn child(mut self, node: SceneNode) -> Self {
        self.children.push(node);
        self
    }
}

/// Complete scene snapshot at one time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    /// Scene name used in file names; derived from the file when empty.
    pub name: String,
    pub nodes: Vec<SceneNode>,
    /// Path of the render camera.
    pub camera: String,
    /// Shader introspection results by shader name.
    pub shaders: BTreeMap<String, ShaderQuery>,
}

/// A node visited during a depth-first walk, with inherited state resolved.
#[derive(Clone, Debug)]
pub struct DagEntry<'a> {
    pub node: &'a SceneNode,
    pub path: String,
    /// Number of nodes in the path (1 for roots).
    pub depth: usize,
    pub world: DMat4,
    /// Nearest ancestor that is a curve group, for curves written with it.
    pub group: Option<String>,
    pub inherited: Inherited,
}

/// State resolved along a path from the root.
#[derive(Clone, Debug, PartialEq)]
pub struct Inherited {
    /// Every ancestor visible.
    pub visible: bool,
    /// Any ancestor templated.
    pub templated: bool,
    pub transformation_blur: Option<bool>,
    pub deformation_blur: Option<bool>,
    pub motion_factor: Option<f32>,
    /// Layer filters met along the path.
    pub layers: Vec<Vec<String>>,
}

impl Default for Inherited {
    fn default() -> Self {
        Self {
            visible: true,
            templated: false,
            transformation_blur: None,
            deformation_blur: None,
            motion_factor: None,
            layers: Vec::new(),
        }
    }
}

impl Inherited {
    fn descend(&self, node: &SceneNode) -> Self {
        let a = &node.attributes;
        let mut layers = self.layers.clone();
        if !a.layers.is_empty() {
            layers.push(a.layers.clone());
        }
        Self {
            visible: self.visible && node.visible,
            templated: self.templated || node.templated,
            transformation_blur: a.transformation_blur.or(self.transformation_blur),
            deformation_blur: a.deformation_blur.or(self.deformation_blur),
            motion_factor: a.motion_factor.or(self.motion_factor),
            layers,
        }
    }

    /// True if every layer filter on the path admits `layer`.
    pub fn in_layer(&self, layer: &str) -> bool {
        layer.is_empty() || self.layers.iter().all(|l| l.iter().any(|n| n == layer))
    }
}

impl Scene {
    /// Load a scene from JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let mut scene: Scene = serde_json::from_str(&text)?;
        if scene.name.is_empty() {
            scene.name = crate::util::scene_name_from_path(Some(path));
        }
        Ok(scene)
    }

    /// Depth-first walk in document order, parents before children.
    pub fn walk(&self) -> Vec<DagEntry<'_>> {
        let mut out = Vec::new();
        for node in &self.nodes {
            walk_node(node, "", 1, DMat4::IDENTITY, None, &Inherited::default(), &mut out);
        }
        out
    }

    /// Node at `path`.
    pub fn find(&self, path: &str) -> Option<&SceneNode> {
        let mut level = &self.nodes;
        let mut found = None;
        for part in path.split('|').filter(|p| !p.is_empty()) {
            let node = level.iter().find(|n| n.name == part)?;
            level = &node.children;
            found = Some(node);
        }
        found
    }

    /// Mutable node at `path`.
    pub fn find_mut(&mut self, path: &str) -> Option<&mut SceneNode> {
        let mut parts = path.split('|').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut node = self.nodes.iter_mut().find(|n| n.name == first)?;
        for part in parts {
            node = node.children.iter_mut().find(|n| n.name == part)?;
        }
        Some(node)
    }

    /// World matrix of the node at `path`.
    pub fn world_matrix(&self, path: &str) -> Result<DMat4> {
        let mut level = &self.nodes;
        let mut world = DMat4::IDENTITY;
        let mut any = false;
        for part in path.split('|').filter(|p| !p.is_empty()) {
            let node = level
                .iter()
                .find(|n| n.name == part)
                .ok_or_else(|| Error::NodeNotFound(path.to_string()))?;
            world *= node.transform.matrix();
            level = &node.children;
            any = true;
        }
        if !any {
            return Err(Error::NodeNotFound(path.to_string()));
        }
        Ok(world)
    }

    /// Camera shape at `path`.
    pub fn camera_shape(&self, path: &str) -> Result<&CameraShape> {
        match self.find(path).and_then(|n| n.shape.as_ref()) {
            Some(Shape::Camera(c)) => Ok(c),
            _ => Err(Error::NodeNotFound(format!("camera {path}"))),
        }
    }
}

fn walk_node<'a>(
    node: &'a SceneNode,
    parent_path: &str,
    depth: usize,
    parent_world: DMat4,
    group: Option<String>,
    parent: &Inherited,
    out: &mut Vec<DagEntry<'a>>,
) {
    let path = format!("{parent_path}|{}", node.name);
    let world = parent_world * node.transform.matrix();
    let inherited = parent.descend(node);
    let child_group = if matches!(node.shape, Some(Shape::CurveGroup(_))) {
        Some(path.clone())
    } else {
        group.clone()
    };
    out.push(DagEntry {
        node,
        path: path.clone(),
        depth,
        world,
        group,
        inherited: inherited.clone(),
    });
    for child in &node.children {
        walk_node(child, &path, depth + 1, world, child_group.clone(), &inherited, out);
    }
}

/// Parent path of `path` (`""` for roots).
pub fn parent_path(path: &str) -> &str {
    match path.rfind('|') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// Last component of `path`.
pub fn short_name(path: &str) -> &str {
    path.rsplit('|').next().unwrap_or(path)
}
