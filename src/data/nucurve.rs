//! NURBS curve extractor.
//!
//! Curves are written as cubic B-splines. The end CVs are repeated so the
//! B-spline passes through them, and the width tapers linearly from base to
//! tip across the varying values.

use super::{extra_params, param_equiv, point_param, BuildContext, ExtraTarget};
use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::ri::Ri;
use crate::scene::NurbsCurve;
use crate::util::{equiv, Result, Vec3};

/// CVs with the first and last repeated twice more.
pub fn clamp_end_points(cvs: &[Vec3]) -> Vec<Vec3> {
    let (Some(&first), Some(&last)) = (cvs.first(), cvs.last()) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(cvs.len() + 4);
    out.extend([first, first]);
    out.extend_from_slice(cvs);
    out.extend([last, last]);
    out
}

/// Varying widths for a curve of `nverts` clamped vertices.
///
/// Two base values, a linear ramp, then two tip values.
pub fn taper_widths(nverts: usize, base: f32, tip: f32) -> Vec<f32> {
    let n = nverts.saturating_sub(2);
    let span = nverts.saturating_sub(5).max(1) as f32;
    (0..n)
        .map(|i| {
            if i + 2 >= n {
                tip
            } else if i < 2 {
                base
            } else {
                base + (tip - base) * (i - 1) as f32 / span
            }
        })
        .collect()
}

/// Single NURBS curve written as `Curves "cubic"`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NuCurveData {
    pub nverts: Vec<i32>,
    pub params: Vec<TypedParameter>,
}

impl NuCurveData {
    pub fn build(curve: &NurbsCurve, ctx: &BuildContext<'_>) -> Self {
        if curve.cvs.is_empty() {
            tracing::info!(object = ctx.path, "curve has no CVs, nothing to write");
            return Self::default();
        }
        let points = clamp_end_points(&curve.cvs);
        let nverts = points.len();

        let mut params = vec![point_param(&points)];
        if equiv(curve.base_width, curve.tip_width) {
            params.push(TypedParameter::floats(
                "constantwidth",
                ParameterType::Float,
                DetailType::Constant,
                &[curve.base_width],
            ));
        } else {
            let widths = taper_widths(nverts, curve.base_width, curve.tip_width);
            params.push(TypedParameter::floats("width", ParameterType::Float, DetailType::Varying, &widths));
        }
        params.extend(extra_params(
            &ctx.attributes.rman,
            ExtraTarget {
                varying_width: true,
                ..Default::default()
            },
        ));

        Self {
            nverts: vec![nverts as i32],
            params,
        }
    }

    pub fn is_writable(&self) -> bool {
        !self.nverts.is_empty()
    }

    pub fn compare(&self, other: &Self) -> bool {
        self.nverts == other.nverts && param_equiv(&self.params, &other.params, "P")
    }

    pub fn write(&self, ri: &mut dyn Ri) -> Result<()> {
        ri.curves("cubic", &self.nverts, "nonperiodic", &self.params)
    }
}
