//! User supplied RIB written in place of geometry.

use crate::ri::Ri;
use crate::util::Result;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomData {
    pub rib: String,
}

impl CustomData {
    pub fn new(rib: &str) -> Self {
        Self { rib: rib.to_string() }
    }

    pub fn write(&self, ri: &mut dyn Ri) -> Result<()> {
        ri.verbatim(&self.rib)
    }
}
