//! Node table: every extracted DAG path of one frame, sample by sample.

use super::{AnimType, RibNode, RibObj};
use crate::data::{ObjectType, RibData};
use crate::scene::DagEntry;
use crate::util::{Error, Result};
use std::collections::HashMap;

/// Nodes keyed by DAG path, in the order they were first recorded.
#[derive(Debug, Default)]
pub struct RibNodeTable {
    nodes: Vec<RibNode>,
    index: HashMap<String, usize>,
    /// Instance path -> path of the node it shares data with.
    aliases: HashMap<String, String>,
    layer: String,
}

impl RibNodeTable {
    /// Empty table for render layer `layer` (empty for all layers).
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            ..Default::default()
        }
    }

    /// Record the extraction of `entry` at `sample`.
    ///
    /// Nodes are created by sample 0; a path first seen at a later sample has
    /// nothing to blur against and is ignored.
    pub fn insert(&mut self, entry: &DagEntry<'_>, sample: usize, data: RibData) -> Result<()> {
        let obj = RibObj::new(Some(data), entry.world);
        match self.index.get(&entry.path) {
            Some(&i) => self.nodes[i].add_sample(sample, obj),
            None if sample == 0 => {
                let object_type = obj.object_type().unwrap_or(ObjectType::Locator);
                let mut node = RibNode::new(entry, object_type, &self.layer);
                node.add_sample(0, obj)?;
                self.push(node);
                Ok(())
            }
            None => {
                tracing::debug!(path = %entry.path, sample, "node appeared after the first sample");
                Ok(())
            }
        }
    }

    /// Record `entry` as an instance of the node at `of`, sharing its data at
    /// `sample`.
    pub fn insert_instance(&mut self, entry: &DagEntry<'_>, of: &str, sample: usize) -> Result<()> {
        let target = self.resolve(of).to_string();
        let &src = self
            .index
            .get(&target)
            .ok_or_else(|| Error::NodeNotFound(format!("{of} (instanced by {})", entry.path)))?;
        let obj = match self.nodes[src].object_mut(sample) {
            Some(original) => {
                original.add_ref();
                original.instance(entry.world)
            }
            None => return Ok(()),
        };
        let object_type = self.nodes[src].object_type;

        match self.index.get(&entry.path) {
            Some(&i) => self.nodes[i].add_sample(sample, obj),
            None if sample == 0 => {
                let mut node = RibNode::new(entry, object_type, &self.layer);
                node.instance_of = Some(target.clone());
                node.add_sample(0, obj)?;
                self.push(node);
                self.aliases.insert(entry.path.clone(), target);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn push(&mut self, node: RibNode) {
        self.index.insert(node.path.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Path whose data `path` uses: the instanced node for instances,
    /// `path` itself otherwise.
    pub fn resolve<'a>(&'a self, path: &'a str) -> &'a str {
        self.aliases.get(path).map(String::as_str).unwrap_or(path)
    }

    pub fn get(&self, path: &str) -> Option<&RibNode> {
        self.index.get(path).map(|&i| &self.nodes[i])
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut RibNode> {
        self.index.get(path).map(|&i| &mut self.nodes[i])
    }

    fn node(&self, path: &str) -> Result<&RibNode> {
        self.get(path).ok_or_else(|| Error::NodeNotFound(path.to_string()))
    }

    /// Whether the world matrix of `path` changes across samples.
    pub fn matrix_animation(&self, path: &str) -> Result<AnimType> {
        Ok(self.node(path)?.matrix_animation())
    }

    /// Whether the body of `path` changes across samples.
    pub fn body_animation(&self, path: &str) -> Result<AnimType> {
        Ok(self.node(path)?.body_animation())
    }

    /// Nodes in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &RibNode> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RibNode> {
        self.nodes.iter_mut()
    }

    pub fn lights(&self) -> impl Iterator<Item = &RibNode> {
        self.nodes.iter().filter(|n| n.object_type.is_light())
    }

    pub fn coordinate_systems(&self) -> impl Iterator<Item = &RibNode> {
        self.nodes.iter().filter(|n| n.object_type.is_coordinate_system())
    }

    /// Everything written in the object block.
    pub fn objects(&self) -> impl Iterator<Item = &RibNode> {
        self.nodes
            .iter()
            .filter(|n| !n.object_type.is_light() && !n.object_type.is_coordinate_system())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        for node in &mut self.nodes {
            node.release();
        }
        self.nodes.clear();
        self.index.clear();
        self.aliases.clear();
    }
}
