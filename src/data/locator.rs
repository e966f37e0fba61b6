//! Locators, coordinate systems and clipping planes.

use super::ObjectType;
use crate::ri::Ri;
use crate::util::Result;

/// Helper node with no geometry of its own.
#[derive(Clone, Debug, PartialEq)]
pub struct LocatorData {
    kind: ObjectType,
    name: String,
}

impl LocatorData {
    /// `kind` is one of [`ObjectType::Locator`], [`ObjectType::CoordSys`]
    /// or [`ObjectType::ClipPlane`].
    pub fn new(kind: ObjectType, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write(&self, ri: &mut dyn Ri) -> Result<()> {
        match self.kind {
            ObjectType::CoordSys => ri.coordinate_system(&self.name),
            // the plane through the origin facing -Z in object space
            ObjectType::ClipPlane => ri.verbatim("ClippingPlane 0 0 -1 0 0 0"),
            _ => ri.translate(0.0, 0.0, 0.0),
        }
    }
}
