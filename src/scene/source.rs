//! Time-varying scene evaluation.

use super::{Scene, Shape, Transform};
use crate::util::{DVec3, Error, Result, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supplies scene snapshots at arbitrary times (in frames).
///
/// Implementations must be callable from several threads when frames are
/// generated in parallel.
pub trait SceneSource: Sync {
    /// Snapshot at `time`.
    fn evaluate(&self, time: f32) -> Result<Scene>;
}

/// A plain scene never changes.
impl SceneSource for Scene {
    fn evaluate(&self, _time: f32) -> Result<Scene> {
        Ok(self.clone())
    }
}

/// One key of an animation channel. Absent components keep the base value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Key {
    pub time: f32,
    pub translate: Option<DVec3>,
    pub rotate: Option<DVec3>,
    pub scale: Option<DVec3>,
    /// Replacement point array (mesh points, curve CVs, particle positions).
    pub points: Option<Vec<Vec3>>,
}

/// Keys applied to the node at `path`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub path: String,
    pub keys: Vec<Key>,
}

/// Base scene plus keyed channels, linearly interpolated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatedScene {
    #[serde(flatten)]
    pub base: Scene,
    pub channels: Vec<Channel>,
}

impl AnimatedScene {
    pub fn new(base: Scene) -> Self {
        Self { base, channels: Vec::new() }
    }

    /// Builder: add a channel.
    pub fn with_channel(mut self, path: impl Into<String>, keys: Vec<Key>) -> Self {
        self.channels.push(Channel { path: path.into(), keys });
        self
    }

    /// Load a scene file that may carry a `channels` list.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let mut anim: AnimatedScene = serde_json::from_str(&text)?;
        if anim.base.name.is_empty() {
            anim.base.name = crate::util::scene_name_from_path(Some(path));
        }
        Ok(anim)
    }
}

impl SceneSource for AnimatedScene {
    fn evaluate(&self, time: f32) -> Result<Scene> {
        let mut scene = self.base.clone();
        for channel in &self.channels {
            if channel.keys.is_empty() {
                continue;
            }
            let node = scene
                .find_mut(&channel.path)
                .ok_or_else(|| Error::NodeNotFound(channel.path.clone()))?;
            apply_keys(node, &channel.keys, time);
        }
        Ok(scene)
    }
}

/// Bracketing indices and blend weight for `time` over sorted key times.
fn bracket(times: &[f32], time: f32) -> (usize, usize, f32) {
    let last = times.len() - 1;
    if time <= times[0] {
        return (0, 0, 0.0);
    }
    if time >= times[last] {
        return (last, last, 0.0);
    }
    let hi = times.iter().position(|t| *t > time).unwrap_or(last);
    let lo = hi - 1;
    let span = times[hi] - times[lo];
    let t = if span > 0.0 { (time - times[lo]) / span } else { 0.0 };
    (lo, hi, t)
}

fn lerp_component(keys: &[Key], time: f32, get: impl Fn(&Key) -> Option<DVec3>) -> Option<DVec3> {
    let values: Vec<(f32, DVec3)> = keys.iter().filter_map(|k| get(k).map(|v| (k.time, v))).collect();
    if values.is_empty() {
        return None;
    }
    let times: Vec<f32> = values.iter().map(|(t, _)| *t).collect();
    let (lo, hi, t) = bracket(&times, time);
    Some(values[lo].1.lerp(values[hi].1, t as f64))
}

fn lerp_points(keys: &[Key], time: f32) -> Option<Vec<Vec3>> {
    let values: Vec<(f32, &Vec<Vec3>)> = keys
        .iter()
        .filter_map(|k| k.points.as_ref().map(|p| (k.time, p)))
        .collect();
    if values.is_empty() {
        return None;
    }
    let times: Vec<f32> = values.iter().map(|(t, _)| *t).collect();
    let (lo, hi, t) = bracket(&times, time);
    let (a, b) = (values[lo].1, values[hi].1);
    if a.len() != b.len() {
        // Topology changes between keys: hold the lower key.
        return Some(a.clone());
    }
    Some(a.iter().zip(b).map(|(p, q)| p.lerp(*q, t)).collect())
}

fn apply_keys(node: &mut super::SceneNode, keys: &[Key], time: f32) {
    let translate = lerp_component(keys, time, |k| k.translate);
    let rotate = lerp_component(keys, time, |k| k.rotate);
    let scale = lerp_component(keys, time, |k| k.scale);

    if translate.is_some() || rotate.is_some() || scale.is_some() {
        let (bt, br, bs) = match &node.transform {
            Transform::Trs { translate, rotate, scale } => (*translate, *rotate, *scale),
            Transform::Matrix(m) => {
                let (s, r, t) = m.to_scale_rotation_translation();
                let (x, y, z) = r.to_euler(glam::EulerRot::XYZ);
                (t, DVec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees()), s)
            }
        };
        node.transform = Transform::Trs {
            translate: translate.unwrap_or(bt),
            rotate: rotate.unwrap_or(br),
            scale: scale.unwrap_or(bs),
        };
    }

    if let Some(points) = lerp_points(keys, time) {
        match &mut node.shape {
            Some(Shape::Mesh(m)) => m.points = points,
            Some(Shape::SubdivSurface(m)) => m.points = points,
            Some(Shape::NurbsCurve(c)) => c.cvs = points,
            Some(Shape::Particles(p)) => p.positions = points,
            _ => tracing::debug!(node = %node.name, "point keys on a shape without points"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Mesh, SceneNode};

    fn key_t(time: f32, x: f64) -> Key {
        Key {
            time,
            translate: Some(DVec3::new(x, 0.0, 0.0)),
            ..Default::default()
        }
    }

    fn anim() -> AnimatedScene {
        let base = Scene {
            nodes: vec![SceneNode::with_shape("cube", Shape::Mesh(Mesh::default()))],
            ..Default::default()
        };
        AnimatedScene::new(base).with_channel("|cube", vec![key_t(1.0, 0.0), key_t(3.0, 4.0)])
    }

    #[test]
    fn test_translate_interpolation() {
        let a = anim();
        let at = |t: f32| a.evaluate(t).unwrap().world_matrix("|cube").unwrap().w_axis.x;
        assert_eq!(at(0.0), 0.0);
        assert_eq!(at(2.0), 2.0);
        assert_eq!(at(2.5), 3.0);
        assert_eq!(at(10.0), 4.0);
    }

    #[test]
    fn test_point_keys() {
        let mut a = anim();
        a.channels.push(Channel {
            path: "|cube".into(),
            keys: vec![
                Key { time: 0.0, points: Some(vec![Vec3::ZERO]), ..Default::default() },
                Key { time: 2.0, points: Some(vec![Vec3::new(0.0, 2.0, 0.0)]), ..Default::default() },
            ],
        });
        let s = a.evaluate(1.0).unwrap();
        let Some(Shape::Mesh(m)) = &s.find("|cube").unwrap().shape else { panic!() };
        assert_eq!(m.points, vec![Vec3::new(0.0, 1.0, 0.0)]);
    }

    #[test]
    fn test_missing_channel_target() {
        let a = AnimatedScene::default().with_channel("|ghost", vec![key_t(0.0, 1.0)]);
        assert!(matches!(a.evaluate(0.0), Err(Error::NodeNotFound(_))));
    }

    #[test]
    fn test_static_scene_source() {
        let s = anim().base;
        assert_eq!(s.evaluate(5.0).unwrap(), s);
    }
}
