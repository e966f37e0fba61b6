//! Hair extractor: cubic curves with duplicated end points.
//!
//! `P`, `Cs` and `Os` carry one extra value at each end; `N` and `width`
//! are varying and keep the host count.

use super::{extra_params, param_equiv, point_param, BuildContext, ExtraTarget};
use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::ri::Ri;
use crate::scene::{HairShading, PfxHair};
use crate::util::{Result, Vec3};

fn with_ends<T: Copy>(values: &[T]) -> impl Iterator<Item = T> + '_ {
    let first = values.first().copied();
    let last = values.last().copied();
    first.into_iter().chain(values.iter().copied()).chain(last)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PfxHairData {
    pub nverts: Vec<i32>,
    pub params: Vec<TypedParameter>,
    pub shading: HairShading,
}

impl PfxHairData {
    pub fn build(hair: &PfxHair, ctx: &BuildContext<'_>) -> Self {
        let curves: Vec<_> = hair.curves.iter().filter(|c| !c.points.is_empty()).collect();
        if curves.is_empty() {
            tracing::debug!(object = ctx.path, "hair system has no curves");
            return Self {
                shading: hair.shading,
                ..Default::default()
            };
        }
        let has_normals = curves.iter().all(|c| c.normals.len() == c.points.len());

        let mut nverts = Vec::with_capacity(curves.len());
        let mut points = Vec::new();
        let mut normals = Vec::new();
        let mut width = Vec::new();
        let mut color = Vec::new();
        let mut opacity = Vec::new();
        for c in &curves {
            let n = c.points.len();
            nverts.push(n as i32 + 2);
            points.extend(with_ends(&c.points));
            if has_normals {
                normals.extend(c.normals.iter().flat_map(|v| v.to_array()));
            }
            width.extend((0..n).map(|i| c.width.get(i).copied().unwrap_or(0.01)));
            let cs: Vec<Vec3> = (0..n).map(|i| c.color.get(i).copied().unwrap_or(Vec3::ONE)).collect();
            let os: Vec<Vec3> = (0..n)
                .map(|i| Vec3::ONE - c.transparency.get(i).copied().unwrap_or(Vec3::ZERO))
                .collect();
            color.extend(with_ends(&cs).flat_map(|v| v.to_array()));
            opacity.extend(with_ends(&os).flat_map(|v| v.to_array()));
        }

        let mut params = vec![point_param(&points)];
        if has_normals {
            params.push(TypedParameter::floats("N", ParameterType::Normal, DetailType::Varying, &normals));
        }
        params.push(TypedParameter::floats("width", ParameterType::Float, DetailType::Varying, &width));
        params.push(TypedParameter::floats("Cs", ParameterType::Color, DetailType::Vertex, &color));
        params.push(TypedParameter::floats("Os", ParameterType::Color, DetailType::Vertex, &opacity));
        params.extend(extra_params(
            &ctx.attributes.rman,
            ExtraTarget {
                varying_width: true,
                ..Default::default()
            },
        ));
        Self {
            nverts,
            params,
            shading: hair.shading,
        }
    }

    /// Same curve count and points.
    pub fn compare(&self, other: &Self) -> bool {
        self.nverts.len() == other.nverts.len() && param_equiv(&self.params, &other.params, "P")
    }

    pub fn write(&self, ri: &mut dyn Ri) -> Result<()> {
        if self.nverts.is_empty() {
            return ri.identity();
        }
        ri.curves("cubic", &self.nverts, "nonperiodic", &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{find_param, RibData};
    use super::*;
    use crate::scene::HairCurve;

    fn strand(x: f32) -> HairCurve {
        HairCurve {
            points: vec![Vec3::new(x, 0.0, 0.0), Vec3::new(x, 1.0, 0.0), Vec3::new(x, 2.0, 0.0)],
            width: vec![0.1, 0.05, 0.01],
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicated_ends() {
        let fx = Fixture::default();
        let hair = PfxHair {
            curves: vec![strand(0.0), strand(1.0)],
            ..Default::default()
        };
        let d = PfxHairData::build(&hair, &fx.ctx());
        assert_eq!(d.nverts, [5, 5]);
        let p = find_param(&d.params, "P").unwrap().float_data();
        assert_eq!(p.len(), 30);
        assert_eq!(&p[..6], &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(find_param(&d.params, "width").unwrap().float_data().len(), 6);
        assert_eq!(find_param(&d.params, "Cs").unwrap().float_data().len(), 30);
        assert!(find_param(&d.params, "N").is_none());
    }

    #[test]
    fn test_compare_counts_curves() {
        let fx = Fixture::default();
        let one = PfxHairData::build(
            &PfxHair {
                curves: vec![strand(0.0)],
                ..Default::default()
            },
            &fx.ctx(),
        );
        let two = PfxHairData::build(
            &PfxHair {
                curves: vec![strand(0.0), strand(1.0)],
                ..Default::default()
            },
            &fx.ctx(),
        );
        assert!(one.compare(&one));
        assert!(!one.compare(&two));
    }

    #[test]
    fn test_empty_writes_identity() {
        let fx = Fixture::default();
        let d = PfxHairData::build(&PfxHair::default(), &fx.ctx());
        assert_eq!(rib(&RibData::PfxHair(d)), "Identity\n");
    }
}
