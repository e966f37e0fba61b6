//! Scene node wrappers.
//!
//! - [`RibNode`] - everything the writer needs about one DAG path: flags,
//!   motion settings, attributes and one [`RibObj`] per motion sample
//! - [`RibObj`] - extracted data and world matrices at one sample
//! - [`RibNodeTable`] - nodes by path, filled sample by sample
//!
//! Flags are resolved from the node and its ancestors once, when the first
//! sample is recorded.

mod obj;
mod table;

pub use obj::*;
pub use table::*;

use crate::data::ObjectType;
use crate::scene::{DagEntry, NodeAttributes, Shape};
use crate::util::{Error, Result};

/// Result of comparing the samples of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AnimType {
    /// Identical across every sample: written once.
    #[default]
    Const,
    /// Differs between samples: written in a motion block.
    Animated,
}

impl AnimType {
    pub fn is_animated(self) -> bool {
        self == Self::Animated
    }
}

/// Visibility flags of a node, resolved through its ancestors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeFlags {
    /// Hidden, or outside the active render layer.
    pub invisible: bool,
    /// Skipped entirely.
    pub ignore: bool,
    /// Left out of shadow passes.
    pub ignore_shadow: bool,
    /// Attributes and transform are written but not the geometry.
    pub ignore_shapes: bool,
    pub receive_shadow: bool,
    pub templated: bool,
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self {
            invisible: false,
            ignore: false,
            ignore_shadow: false,
            ignore_shapes: false,
            receive_shadow: true,
            templated: false,
        }
    }
}

/// Per-node motion blur switches. Both default to on; the render globals
/// decide whether blur happens at all.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionSettings {
    pub transformation_blur: bool,
    pub deformation_blur: bool,
    /// Scales the shutter interval of this node.
    pub factor: f32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            transformation_blur: true,
            deformation_blur: true,
            factor: 1.0,
        }
    }
}

/// One DAG path with its samples.
#[derive(Clone, Debug)]
pub struct RibNode {
    /// Short name.
    pub name: String,
    /// Full `|a|b` path.
    pub path: String,
    pub object_type: ObjectType,
    pub flags: NodeFlags,
    pub motion: MotionSettings,
    /// Comma separated grouping membership.
    pub grouping: String,
    pub attributes: NodeAttributes,
    /// Lights toggled against their default for this node.
    pub light_links: Vec<String>,
    /// Curve group the node belongs to.
    pub group: Option<String>,
    /// Path of the node whose data this one shares.
    pub instance_of: Option<String>,
    /// Depth in the DAG, 1 for roots.
    pub depth: usize,
    objects: Vec<RibObj>,
}

impl RibNode {
    /// Wrap `entry`, whose first sample extracted to `object_type`.
    ///
    /// `layer` is the active render layer (empty for all).
    pub fn new(entry: &DagEntry<'_>, object_type: ObjectType, layer: &str) -> Self {
        let node = entry.node;
        let attrs = &node.attributes;
        let inh = &entry.inherited;

        let flags = NodeFlags {
            invisible: !inh.visible || !inh.in_layer(layer),
            ignore: attrs.ignore,
            ignore_shadow: !attrs.casts_shadows,
            ignore_shapes: attrs.ignore_shapes,
            receive_shadow: attrs.receive_shadows,
            templated: inh.templated,
        };

        let instanced_particles = matches!(&node.shape, Some(Shape::Particles(p)) if p.instanced);
        let motion = MotionSettings {
            transformation_blur: inh.transformation_blur.unwrap_or(true),
            deformation_blur: inh.deformation_blur.unwrap_or(true) && !instanced_particles,
            factor: inh.motion_factor.unwrap_or(1.0),
        };

        let instance_of = match &node.shape {
            Some(Shape::Instance { of }) => Some(of.clone()),
            _ => None,
        };

        Self {
            name: node.name.clone(),
            path: entry.path.clone(),
            object_type,
            flags,
            motion,
            grouping: attrs.grouping.clone(),
            attributes: attrs.clone(),
            light_links: attrs.light_links.clone(),
            group: entry.group.clone(),
            instance_of,
            depth: entry.depth,
            objects: Vec::new(),
        }
    }

    /// Record the next sample. Samples must arrive in ascending order
    /// without gaps.
    pub fn add_sample(&mut self, sample: usize, obj: RibObj) -> Result<()> {
        if sample != self.objects.len() {
            return Err(Error::invalid(format!(
                "{}: sample {sample} recorded after {}",
                self.path,
                self.objects.len()
            )));
        }
        if let Some(t) = obj.object_type() {
            if t != self.object_type {
                tracing::debug!(path = %self.path, from = %self.object_type, to = %t, "object type changed between samples");
            }
        }
        self.objects.push(obj);
        Ok(())
    }

    /// Sample `sample`.
    pub fn object(&self, sample: usize) -> Option<&RibObj> {
        self.objects.get(sample)
    }

    pub fn object_mut(&mut self, sample: usize) -> Option<&mut RibObj> {
        self.objects.get_mut(sample)
    }

    pub fn objects(&self) -> &[RibObj] {
        &self.objects
    }

    pub fn sample_count(&self) -> usize {
        self.objects.len()
    }

    /// Animated when any sample's matrix differs from the first.
    pub fn matrix_animation(&self) -> AnimType {
        let Some((first, rest)) = self.objects.split_first() else {
            return AnimType::Const;
        };
        if rest.iter().all(|o| first.compare_matrix(o)) {
            AnimType::Const
        } else {
            AnimType::Animated
        }
    }

    /// Animated when any sample's body differs from the first.
    pub fn body_animation(&self) -> AnimType {
        let Some((first, rest)) = self.objects.split_first() else {
            return AnimType::Const;
        };
        if rest.iter().all(|o| first.compare_body(o)) {
            AnimType::Const
        } else {
            AnimType::Animated
        }
    }

    /// Matrix motion block needed, with `enabled` the global switch. Any
    /// blurred node with several samples gets one, moving or not, so that
    /// camera motion reaches static objects.
    pub fn transform_motion(&self, enabled: bool) -> bool {
        enabled && self.motion.transformation_blur && self.objects.len() > 1
    }

    /// Deformation motion block needed, with `enabled` the global switch.
    /// Ribgen output is never sampled.
    pub fn deformation_motion(&self, enabled: bool) -> bool {
        enabled
            && self.motion.deformation_blur
            && self.object_type != ObjectType::RibGen
            && self.objects.len() > 1
            && self.body_animation().is_animated()
    }

    /// Written in beauty passes.
    pub fn is_renderable(&self) -> bool {
        !self.flags.invisible && !self.flags.ignore && !self.flags.templated
    }

    /// Written in the shadow pass restricted to `set` (empty for all).
    pub fn is_shadow_caster(&self, set: &str) -> bool {
        !self.flags.invisible
            && !self.flags.ignore
            && !self.flags.templated
            && !self.flags.ignore_shadow
            && (set.is_empty() || self.attributes.in_set(set))
    }

    /// Release every sample.
    pub fn release(&mut self) {
        for o in &mut self.objects {
            while !o.unref() {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RibData, SphereData};
    use crate::scene::{ImplicitSphere, Particles, Scene, SceneNode};
    use crate::util::{DMat4, DVec3};

    fn entry_scene(shape: Shape) -> Scene {
        let mut parent = SceneNode {
            name: "grp".into(),
            ..Default::default()
        };
        parent.attributes.deformation_blur = Some(false);
        parent.attributes.motion_factor = Some(2.0);
        Scene {
            nodes: vec![parent.child(SceneNode::with_shape("obj", shape))],
            ..Default::default()
        }
    }

    fn sphere(r: f32, x: f64) -> RibObj {
        RibObj::new(
            Some(RibData::Sphere(SphereData::new(r))),
            DMat4::from_translation(DVec3::new(x, 0.0, 0.0)),
        )
    }

    #[test]
    fn test_inherited_motion_settings() {
        let scene = entry_scene(Shape::ImplicitSphere(ImplicitSphere::default()));
        let entries = scene.walk();
        let node = RibNode::new(&entries[1], ObjectType::ImplicitSphere, "");
        assert!(node.motion.transformation_blur);
        assert!(!node.motion.deformation_blur);
        assert_eq!(node.motion.factor, 2.0);
        assert_eq!(node.name, "obj");
        assert_eq!(node.path, "|grp|obj");
    }

    #[test]
    fn test_instanced_particles_drop_deformation_blur() {
        let scene = Scene {
            nodes: vec![SceneNode::with_shape(
                "p",
                Shape::Particles(Particles {
                    instanced: true,
                    ..Default::default()
                }),
            )],
            ..Default::default()
        };
        let node = RibNode::new(&scene.walk()[0], ObjectType::Particles, "");
        assert!(!node.motion.deformation_blur);
        assert!(node.motion.transformation_blur);
    }

    #[test]
    fn test_flags() {
        let mut scene = entry_scene(Shape::ImplicitSphere(ImplicitSphere::default()));
        scene.nodes[0].visible = false;
        scene.nodes[0].children[0].attributes.casts_shadows = false;
        scene.nodes[0].children[0].attributes.layers = vec!["fg".into()];
        let entries = scene.walk();
        let node = RibNode::new(&entries[1], ObjectType::ImplicitSphere, "fg");
        assert!(node.flags.invisible);
        assert!(node.flags.ignore_shadow);
        assert!(!node.is_renderable());
        assert!(!node.is_shadow_caster(""));

        scene.nodes[0].visible = true;
        let entries = scene.walk();
        assert!(!RibNode::new(&entries[1], ObjectType::ImplicitSphere, "fg").flags.invisible);
        assert!(RibNode::new(&entries[1], ObjectType::ImplicitSphere, "bg").flags.invisible);
    }

    #[test]
    fn test_samples_in_order() {
        let scene = entry_scene(Shape::ImplicitSphere(ImplicitSphere::default()));
        let entries = scene.walk();
        let mut node = RibNode::new(&entries[1], ObjectType::ImplicitSphere, "");
        assert!(node.add_sample(1, sphere(1.0, 0.0)).is_err());
        node.add_sample(0, sphere(1.0, 0.0)).unwrap();
        node.add_sample(1, sphere(1.0, 1.0)).unwrap();
        assert_eq!(node.sample_count(), 2);
        assert_eq!(node.matrix_animation(), AnimType::Animated);
        assert_eq!(node.body_animation(), AnimType::Const);
        assert!(node.transform_motion(true));
        assert!(!node.transform_motion(false));
        assert!(!node.deformation_motion(true));

        node.motion.transformation_blur = false;
        assert!(!node.transform_motion(true));
    }

    #[test]
    fn test_single_sample_is_const() {
        let scene = entry_scene(Shape::ImplicitSphere(ImplicitSphere::default()));
        let entries = scene.walk();
        let mut node = RibNode::new(&entries[1], ObjectType::ImplicitSphere, "");
        assert_eq!(node.matrix_animation(), AnimType::Const);
        node.add_sample(0, sphere(1.0, 0.0)).unwrap();
        assert_eq!(node.matrix_animation(), AnimType::Const);
        assert!(!node.transform_motion(true));
        assert!(!node.deformation_motion(true));
        assert_eq!(node.body_animation(), AnimType::Const);
        node.release();
        assert!(node.object(0).unwrap().data().is_none());
    }
}
