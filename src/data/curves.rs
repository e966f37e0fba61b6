//! Curve group extractor: every curve below a group node in one `Curves`.

use super::{clamp_end_points, extra_params, param_equiv, point_param, taper_widths, BuildContext, ExtraTarget};
use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::ri::Ri;
use crate::scene::{CurveGroup, NurbsCurve};
use crate::util::{equiv, DMat4, Result, Vec3};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurveGroupData {
    pub nverts: Vec<i32>,
    pub params: Vec<TypedParameter>,
}

impl CurveGroupData {
    /// Build from member curves paired with their matrix relative to the
    /// group node. Curves without CVs are left out.
    pub fn build(curves: &[(DMat4, &NurbsCurve)], group: &CurveGroup, ctx: &BuildContext<'_>) -> Self {
        let mut nverts = Vec::with_capacity(curves.len());
        let mut points: Vec<Vec3> = Vec::new();
        let mut widths = Vec::new();
        for (m, curve) in curves {
            if curve.cvs.is_empty() {
                continue;
            }
            let local: Vec<Vec3> = curve
                .cvs
                .iter()
                .map(|p| m.transform_point3(p.as_dvec3()).as_vec3())
                .collect();
            let clamped = clamp_end_points(&local);
            widths.extend(taper_widths(clamped.len(), group.base_width, group.tip_width));
            nverts.push(clamped.len() as i32);
            points.extend(clamped);
        }
        if nverts.is_empty() {
            tracing::info!(object = ctx.path, "curve group has no curves, nothing to write");
            return Self::default();
        }

        let mut params = vec![point_param(&points)];
        if equiv(group.base_width, group.tip_width) {
            params.push(TypedParameter::floats(
                "constantwidth",
                ParameterType::Float,
                DetailType::Constant,
                &[group.base_width],
            ));
        } else {
            params.push(TypedParameter::floats("width", ParameterType::Float, DetailType::Varying, &widths));
        }
        params.extend(extra_params(
            &ctx.attributes.rman,
            ExtraTarget {
                varying_width: true,
                ..Default::default()
            },
        ));
        Self { nverts, params }
    }

    pub fn is_writable(&self) -> bool {
        !self.nverts.is_empty()
    }

    pub fn compare(&self, other: &Self) -> bool {
        self.nverts.first() == other.nverts.first() && param_equiv(&self.params, &other.params, "P")
    }

    pub fn write(&self, ri: &mut dyn Ri) -> Result<()> {
        ri.curves("cubic", &self.nverts, "nonperiodic", &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{find_param, RibData};
    use super::*;
    use crate::util::DVec3;

    fn line(n: usize) -> NurbsCurve {
        NurbsCurve {
            cvs: (0..n).map(|i| Vec3::new(0.0, i as f32, 0.0)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_group_concatenates() {
        let fx = Fixture::default();
        let (a, b, empty) = (line(3), line(5), line(0));
        let shift = DMat4::from_translation(DVec3::new(2.0, 0.0, 0.0));
        let members = [(DMat4::IDENTITY, &a), (shift, &b), (DMat4::IDENTITY, &empty)];
        let d = CurveGroupData::build(&members, &CurveGroup::default(), &fx.ctx());
        assert_eq!(d.nverts, [7, 9]);
        let p = find_param(&d.params, "P").unwrap().float_data();
        assert_eq!(p.len(), 16 * 3);
        // first vertex of the second curve moved by the relative matrix
        assert_eq!(&p[21..24], &[2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_group_widths_per_curve() {
        let fx = Fixture::default();
        let (a, b) = (line(4), line(4));
        let group = CurveGroup {
            base_width: 0.2,
            tip_width: 0.0,
        };
        let members = [(DMat4::IDENTITY, &a), (DMat4::IDENTITY, &b)];
        let d = CurveGroupData::build(&members, &group, &fx.ctx());
        assert_eq!(find_param(&d.params, "width").unwrap().float_data().len(), 12);
        let text = rib(&RibData::Curves(d));
        assert!(text.starts_with("Curves \"cubic\" [8 8] \"nonperiodic\""));
    }

    #[test]
    fn test_compare_first_count_and_points() {
        let fx = Fixture::default();
        let (a, b) = (line(3), line(4));
        let da = CurveGroupData::build(&[(DMat4::IDENTITY, &a)], &CurveGroup::default(), &fx.ctx());
        let db = CurveGroupData::build(&[(DMat4::IDENTITY, &b)], &CurveGroup::default(), &fx.ctx());
        assert!(da.compare(&da));
        assert!(!da.compare(&db));
        assert!(!CurveGroupData::build(&[], &CurveGroup::default(), &fx.ctx()).is_writable());
    }
}
