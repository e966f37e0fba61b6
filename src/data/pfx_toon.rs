//! Toon outline extractor: linear curves with per-vertex color.

use super::{extra_params, point_param, BuildContext, ExtraTarget};
use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::ri::Ri;
use crate::scene::PfxToon;
use crate::util::{Result, Vec3};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PfxToonData {
    pub nverts: Vec<i32>,
    pub params: Vec<TypedParameter>,
}

impl PfxToonData {
    pub fn build(toon: &PfxToon, ctx: &BuildContext<'_>) -> Self {
        let mut nverts = Vec::with_capacity(toon.lines.len());
        let mut points = Vec::new();
        let mut width = Vec::new();
        let mut color = Vec::new();
        let mut opacity = Vec::new();
        for line in toon.lines.iter().filter(|l| !l.points.is_empty()) {
            nverts.push(line.points.len() as i32);
            points.extend_from_slice(&line.points);
            for i in 0..line.points.len() {
                width.push(line.width.get(i).copied().unwrap_or(0.0));
                color.extend(line.color.get(i).copied().unwrap_or(Vec3::ONE).to_array());
                let t = line.transparency.get(i).copied().unwrap_or(Vec3::ZERO);
                opacity.extend((Vec3::ONE - t).to_array());
            }
        }
        if nverts.is_empty() {
            tracing::debug!(object = ctx.path, "toon outline has no lines");
            return Self::default();
        }

        let mut params = vec![
            point_param(&points),
            TypedParameter::floats("width", ParameterType::Float, DetailType::Varying, &width),
            TypedParameter::floats("pfxToon_vtxColor", ParameterType::Color, DetailType::Vertex, &color),
            TypedParameter::floats("pfxToon_vtxOpacity", ParameterType::Color, DetailType::Vertex, &opacity),
        ];
        params.extend(extra_params(&ctx.attributes.rman, ExtraTarget::default()));
        Self { nverts, params }
    }

    /// An outline without lines still needs a statement inside its
    /// attribute block, so it writes `Identity`.
    pub fn write(&self, ri: &mut dyn Ri) -> Result<()> {
        if self.nverts.is_empty() {
            return ri.identity();
        }
        ri.curves("linear", &self.nverts, "nonperiodic", &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{find_param, RibData};
    use super::*;
    use crate::scene::ToonLine;

    #[test]
    fn test_linear_outline() {
        let fx = Fixture::default();
        let toon = PfxToon {
            lines: vec![ToonLine {
                points: vec![Vec3::ZERO, Vec3::X],
                width: vec![0.1, 0.2],
                color: vec![Vec3::X, Vec3::Y],
                transparency: vec![Vec3::splat(0.5), Vec3::ZERO],
            }],
        };
        let d = PfxToonData::build(&toon, &fx.ctx());
        assert_eq!(d.nverts, [2]);
        let o = find_param(&d.params, "pfxToon_vtxOpacity").unwrap();
        assert_eq!(o.detailed_name(), "vertex color pfxToon_vtxOpacity");
        assert_eq!(o.float_data(), &[0.5, 0.5, 0.5, 1.0, 1.0, 1.0]);
        let text = rib(&RibData::PfxToon(d));
        assert!(text.starts_with("Curves \"linear\" [2] \"nonperiodic\""));
    }

    #[test]
    fn test_empty_writes_identity() {
        let fx = Fixture::default();
        let d = PfxToonData::build(&PfxToon::default(), &fx.ctx());
        assert_eq!(rib(&RibData::PfxToon(d)), "Identity\n");
    }
}
