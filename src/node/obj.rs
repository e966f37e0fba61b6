//! One motion sample of a scene node.

use crate::data::{ObjectType, RibData};
use crate::util::DMat4;
use std::sync::Arc;

/// Extracted shape and world matrix of a node at one sample time.
///
/// The extracted data is shared: instances of a node and unchanged samples
/// hold the same [`Arc`] instead of extracting again. Each instance is its
/// own node with its own world matrix.
#[derive(Clone, Debug)]
pub struct RibObj {
    data: Option<Arc<RibData>>,
    world: DMat4,
    ref_count: usize,
}

impl RibObj {
    /// New sample with one reference.
    pub fn new(data: Option<RibData>, world: DMat4) -> Self {
        Self {
            data: data.map(Arc::new),
            world,
            ref_count: 1,
        }
    }

    /// Sample sharing this one's extracted data, placed at `world`.
    pub fn instance(&self, world: DMat4) -> Self {
        Self {
            data: self.data.clone(),
            world,
            ref_count: 1,
        }
    }

    pub fn data(&self) -> Option<&RibData> {
        self.data.as_deref()
    }

    /// True when both samples hold the very same extraction.
    pub fn shares_data(&self, other: &RibObj) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn object_type(&self) -> Option<ObjectType> {
        self.data.as_ref().map(|d| d.object_type())
    }

    pub fn matrix(&self) -> DMat4 {
        self.world
    }

    /// True iff the world matrices are bit-identical.
    pub fn compare_matrix(&self, other: &RibObj) -> bool {
        let a = self.world.to_cols_array();
        let b = other.world.to_cols_array();
        a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits())
    }

    /// True when the bodies are the same. A missing body on either side has
    /// nothing to animate.
    pub fn compare_body(&self, other: &RibObj) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a.compare(b),
            _ => true,
        }
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    pub fn add_ref(&mut self) {
        self.ref_count += 1;
    }

    /// Drop one reference. Returns true once nothing references the sample;
    /// its data may then be released.
    pub fn unref(&mut self) -> bool {
        self.ref_count = self.ref_count.saturating_sub(1);
        if self.ref_count == 0 {
            self.data = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SphereData;
    use crate::util::DVec3;

    fn sphere(r: f32) -> Option<RibData> {
        Some(RibData::Sphere(SphereData::new(r)))
    }

    #[test]
    fn test_compare_matrix_bitwise() {
        let a = RibObj::new(None, DMat4::IDENTITY);
        let b = RibObj::new(None, DMat4::IDENTITY);
        let c = RibObj::new(None, DMat4::from_translation(DVec3::new(1e-12, 0.0, 0.0)));
        assert!(a.compare_matrix(&b));
        assert!(!a.compare_matrix(&c));
    }

    #[test]
    fn test_compare_body() {
        let a = RibObj::new(sphere(1.0), DMat4::IDENTITY);
        let b = RibObj::new(sphere(2.0), DMat4::IDENTITY);
        let empty = RibObj::new(None, DMat4::IDENTITY);
        assert!(a.compare_body(&a));
        assert!(!a.compare_body(&b));
        assert!(a.compare_body(&empty));
        assert!(empty.compare_body(&b));
    }

    #[test]
    fn test_instances_share_data() {
        let a = RibObj::new(sphere(1.0), DMat4::IDENTITY);
        let i = a.instance(DMat4::from_translation(DVec3::X));
        assert!(a.shares_data(&i));
        assert!(a.compare_body(&i));
        assert!(!a.compare_matrix(&i));
    }

    #[test]
    fn test_ref_counting() {
        let mut a = RibObj::new(sphere(1.0), DMat4::IDENTITY);
        a.add_ref();
        assert_eq!(a.ref_count(), 2);
        assert!(!a.unref());
        assert!(a.data().is_some());
        assert!(a.unref());
        assert!(a.data().is_none());
    }
}
