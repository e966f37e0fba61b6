//! Implicit sphere.

use crate::ri::Ri;
use crate::util::{equiv, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SphereData {
    pub radius: f32,
}

impl SphereData {
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }

    pub fn compare(&self, other: &Self) -> bool {
        equiv(self.radius, other.radius)
    }

    /// Full sphere: `Sphere r -r r 360`.
    pub fn write(&self, ri: &mut dyn Ri) -> Result<()> {
        ri.sphere(self.radius, -self.radius, self.radius, 360.0, &[])
    }
}
