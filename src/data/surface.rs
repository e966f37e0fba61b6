//! NURBS surface extractor.
//!
//! Host knot vectors carry `cvs + degree - 1` values; the renderer wants
//! `cvs + degree + 1`, obtained by repeating the first and last knot. The
//! `v` direction is reversed to match the host's texture space unless the
//! parameterisation is swapped. Trim curves are flattened into the parallel
//! arrays of `TrimCurve`.

use super::{extra_params, BuildContext, ExtraTarget};
use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::ri::Ri;
use crate::scene::{NurbsSurface, TrimCurve};
use crate::util::{equiv_slice, Result};

/// Knot vector with its first and last value repeated once more.
pub fn double_end_knots(knots: &[f32]) -> Vec<f32> {
    let (Some(&first), Some(&last)) = (knots.first(), knots.last()) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(knots.len() + 2);
    out.push(first);
    out.extend_from_slice(knots);
    out.push(last);
    out
}

/// Parameter range of a host knot vector of the given degree.
pub fn knot_range(knots: &[f32], degree: u32) -> (f32, f32) {
    let d = degree as usize;
    if knots.is_empty() {
        return (0.0, 1.0);
    }
    let lo = knots[d.saturating_sub(1).min(knots.len() - 1)];
    let hi = knots[knots.len().saturating_sub(d).min(knots.len() - 1)];
    (lo, hi)
}

fn normalize(knots: &mut [f32], min: f32, max: f32) {
    let span = max - min;
    if span.abs() <= f32::EPSILON {
        return;
    }
    for k in knots {
        *k = (*k - min) / span;
    }
}

/// Flattened trim loops.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrimData {
    pub ncurves: Vec<i32>,
    pub order: Vec<i32>,
    pub knot: Vec<f32>,
    pub min: Vec<f32>,
    pub max: Vec<f32>,
    pub n: Vec<i32>,
    pub u: Vec<f32>,
    pub v: Vec<f32>,
    pub w: Vec<f32>,
}

impl TrimData {
    pub fn is_empty(&self) -> bool {
        self.ncurves.is_empty()
    }
}

/// Maps host trim coordinates into the written parameter space.
struct TrimSpace {
    swap: bool,
    u_min: f32,
    u_scale: f32,
    v_min: f32,
    v_max: f32,
    v_scale: f32,
    normalized: bool,
}

impl TrimSpace {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        if self.swap {
            // u and v exchange roles, no reversal
            if !self.normalized {
                return (y, x);
            }
            return ((y - self.u_min) * self.u_scale, (x - self.v_min) * self.v_scale);
        }
        if self.normalized {
            ((x - self.u_min) * self.u_scale, (self.v_max - y) * self.v_scale)
        } else {
            (x, self.v_max - y + self.v_min)
        }
    }
}

fn push_trim_curve(out: &mut TrimData, curve: &TrimCurve, space: &TrimSpace) {
    out.order.push(curve.degree as i32 + 1);
    out.knot.extend(double_end_knots(&curve.knots));
    let (lo, hi) = knot_range(&curve.knots, curve.degree);
    out.min.push(lo);
    out.max.push(hi);
    out.n.push(curve.cvs.len() as i32);
    for cv in &curve.cvs {
        let (u, v) = space.map(cv.x, cv.y);
        out.u.push(u);
        out.v.push(v);
        out.w.push(cv.z);
    }
}

/// NURBS patch written as `NuPatch`, preceded by `TrimCurve` when trimmed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceData {
    pub nu: i32,
    pub nv: i32,
    pub uorder: i32,
    pub vorder: i32,
    pub uknot: Vec<f32>,
    pub vknot: Vec<f32>,
    pub umin: f32,
    pub umax: f32,
    pub vmin: f32,
    pub vmax: f32,
    pub trims: TrimData,
    pub params: Vec<TypedParameter>,
}

impl SurfaceData {
    pub fn build(surface: &NurbsSurface, ctx: &BuildContext<'_>) -> Self {
        let (cu, cv) = (surface.cvs_u as usize, surface.cvs_v as usize);
        let expected_u = cu + surface.degree_u as usize - 1;
        let expected_v = cv + surface.degree_v as usize - 1;
        if cu == 0
            || cv == 0
            || surface.cvs.len() != cu * cv
            || surface.knots_u.len() != expected_u
            || surface.knots_v.len() != expected_v
        {
            tracing::warn!(object = ctx.path, "NURBS surface has inconsistent CV or knot counts, skipped");
            return Self::default();
        }

        let swap = ctx.options.swap_uv;
        let normalized = ctx.options.normalize_nurbs_uv;
        let (raw_umin, raw_umax) = knot_range(&surface.knots_u, surface.degree_u);
        let (raw_vmin, raw_vmax) = knot_range(&surface.knots_v, surface.degree_v);

        let mut data = Self::default();
        if swap {
            data.nu = cv as i32;
            data.nv = cu as i32;
            data.uorder = surface.degree_v as i32 + 1;
            data.vorder = surface.degree_u as i32 + 1;
            data.uknot = surface.knots_v.clone();
            data.vknot = surface.knots_u.clone();
            (data.umin, data.umax) = (raw_vmin, raw_vmax);
            (data.vmin, data.vmax) = (raw_umin, raw_umax);
        } else {
            data.nu = cu as i32;
            data.nv = cv as i32;
            data.uorder = surface.degree_u as i32 + 1;
            data.vorder = surface.degree_v as i32 + 1;
            data.uknot = surface.knots_u.clone();
            data.vknot = surface
                .knots_v
                .iter()
                .rev()
                .map(|k| raw_vmax - k + raw_vmin)
                .collect();
            (data.umin, data.umax) = (raw_umin, raw_umax);
            (data.vmin, data.vmax) = (raw_vmin, raw_vmax);
        }

        let space = TrimSpace {
            swap,
            u_min: data.umin,
            u_scale: if normalized { scale(data.umin, data.umax) } else { 1.0 },
            v_min: data.vmin,
            v_max: data.vmax,
            v_scale: if normalized { scale(data.vmin, data.vmax) } else { 1.0 },
            normalized,
        };

        if normalized {
            normalize(&mut data.uknot, data.umin, data.umax);
            normalize(&mut data.vknot, data.vmin, data.vmax);
            (data.umin, data.umax, data.vmin, data.vmax) = (0.0, 1.0, 0.0, 1.0);
        }
        data.uknot = double_end_knots(&data.uknot);
        data.vknot = double_end_knots(&data.vknot);

        let mut pw = TypedParameter::array("Pw", ParameterType::HPoint, DetailType::Vertex, cu * cv);
        for u in 0..cu {
            for v in 0..cv {
                let p = surface.cvs[u * cv + v];
                let index = if swap { u * cv + v } else { (cv - 1 - v) * cu + u };
                pw.set_float4(index, p.x * p.w, p.y * p.w, p.z * p.w, p.w);
            }
        }
        data.params.push(pw);
        data.params.extend(extra_params(
            &ctx.attributes.rman,
            ExtraTarget {
                hpoints: true,
                ..Default::default()
            },
        ));

        for l in &surface.trims {
            data.trims.ncurves.push(l.curves.len() as i32);
            for c in &l.curves {
                push_trim_curve(&mut data.trims, c, &space);
            }
        }
        data
    }

    pub fn is_writable(&self) -> bool {
        self.nu > 0 && self.nv > 0
    }

    /// 2 with trims (TrimCurve, then NuPatch), 1 without.
    pub fn granularity(&self) -> usize {
        if self.trims.is_empty() {
            1
        } else {
            2
        }
    }

    /// Trim curves cannot be motion blurred.
    pub fn is_grain_animated(&self, grain: usize) -> bool {
        self.trims.is_empty() || grain > 0
    }

    pub fn compare(&self, other: &Self) -> bool {
        let pw = |d: &Self| d.params.first().map(|p| p.float_data().to_vec()).unwrap_or_default();
        self.nu == other.nu
            && self.nv == other.nv
            && self.uorder == other.uorder
            && self.vorder == other.vorder
            && equiv_slice(
                &[self.umin, self.umax, self.vmin, self.vmax],
                &[other.umin, other.umax, other.vmin, other.vmax],
            )
            && equiv_slice(&self.uknot, &other.uknot)
            && equiv_slice(&self.vknot, &other.vknot)
            && equiv_slice(&pw(self), &pw(other))
    }

    pub fn write_grain(&self, ri: &mut dyn Ri, grain: usize) -> Result<()> {
        if grain == 0 && !self.trims.is_empty() {
            let t = &self.trims;
            return ri.trim_curve(&t.ncurves, &t.order, &t.knot, &t.min, &t.max, &t.n, &t.u, &t.v, &t.w);
        }
        ri.nu_patch(
            self.nu,
            self.uorder,
            &self.uknot,
            self.umin,
            self.umax,
            self.nv,
            self.vorder,
            &self.vknot,
            self.vmin,
            self.vmax,
            &self.params,
        )
    }
}

fn scale(min: f32, max: f32) -> f32 {
    let span = max - min;
    if span.abs() <= f32::EPSILON {
        1.0
    } else {
        1.0 / span
    }
}
