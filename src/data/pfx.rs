//! Paint effects extractor: tubes, leaves and petals as cubic curves.
//!
//! Each line gets a phantom vertex before its first and after its last
//! point so the B-spline reaches both ends. Widths are scaled to 3/4 of the
//! host value to match the host's own render. Shading variables (`Cs`,
//! `Os`, flatness, incandescence) are only written for objects without a
//! surface shader, where the default paint effects shader reads them.

use super::{extra_params, param_equiv, point_param, BuildContext, ExtraTarget, ObjectType};
use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::ri::Ri;
use crate::scene::{PaintEffects, PfxKind, PfxLine};
use crate::util::{Result, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

const WIDTH_SCALE: f32 = 0.75;

fn at<T: Copy>(values: &[T], i: usize, default: T) -> T {
    values.get(i).copied().unwrap_or(default)
}

/// Line points with leaf ends pulled outwards and phantom end vertices.
fn line_points(line: &PfxLine, leaf: bool) -> Vec<Vec3> {
    let mut pts = line.points.clone();
    let n = pts.len();
    if leaf {
        let first_dir = (pts[1] - pts[0]).normalize_or_zero();
        let last_dir = (pts[n - 1] - pts[n - 2]).normalize_or_zero();
        pts[0] -= first_dir * at(&line.width, 0, 0.0);
        pts[n - 1] += last_dir * at(&line.width, n - 1, 0.0);
    }
    let head = pts[0] - (pts[1] - pts[0]);
    let tail = pts[n - 1] + (pts[n - 1] - pts[n - 2]);
    let mut out = Vec::with_capacity(n + 2);
    out.push(head);
    out.extend(pts);
    out.push(tail);
    out
}

/// Paint effects brush strokes written as `Curves "cubic"`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PfxData {
    pub kind: PfxKind,
    pub nverts: Vec<i32>,
    pub params: Vec<TypedParameter>,
}

impl PfxData {
    pub fn build(pfx: &PaintEffects, ctx: &BuildContext<'_>) -> Self {
        let lines: Vec<&PfxLine> = pfx.lines.iter().filter(|l| l.points.len() >= 2).collect();
        let mut data = Self {
            kind: pfx.kind,
            ..Default::default()
        };
        if lines.is_empty() {
            tracing::info!(object = ctx.path, kind = ?pfx.kind, "paint effects output has no lines");
            return data;
        }

        let leaf = pfx.kind == PfxKind::Leaf;
        let mut points = Vec::new();
        let mut twist = Vec::new();
        let mut width = Vec::new();
        let mut color = Vec::new();
        let mut opacity = Vec::new();
        let mut flatness = Vec::new();
        let mut incandescence = Vec::new();
        for line in &lines {
            let pts = line_points(line, leaf);
            data.nverts.push(pts.len() as i32);
            points.extend(pts);
            if pfx.uniform_width {
                width.push(at(&line.width, 0, 0.0) * WIDTH_SCALE);
            }
            for i in 0..line.points.len() {
                let t = at(&line.twist, i, Vec3::ZERO);
                let c = at(&line.color, i, Vec3::ONE);
                let o = Vec3::ONE - at(&line.transparency, i, Vec3::ZERO);
                let inc = at(&line.incandescence, i, Vec3::ZERO);
                twist.extend(t.to_array());
                color.extend(c.to_array());
                opacity.extend(o.to_array());
                incandescence.extend(inc.to_array());
                flatness.push(at(&line.flatness, i, 0.0));
                if !pfx.uniform_width {
                    width.push(at(&line.width, i, 0.0) * WIDTH_SCALE);
                }
            }
        }

        let params = &mut data.params;
        params.push(point_param(&points));
        if !pfx.camera_facing {
            params.push(TypedParameter::floats("N", ParameterType::Normal, DetailType::Varying, &twist));
        }
        if pfx.curve_id {
            let mut rng = StdRng::seed_from_u64(1);
            let ids: Vec<f32> = lines.iter().map(|_| rng.gen::<f32>()).collect();
            params.push(TypedParameter::floats("curveID", ParameterType::Float, DetailType::Uniform, &ids));
        }
        let width_detail = if pfx.uniform_width {
            DetailType::Uniform
        } else {
            DetailType::Varying
        };
        params.push(TypedParameter::floats("width", ParameterType::Float, width_detail, &width));
        if ctx.attributes.shaders.surface.is_none() {
            params.push(TypedParameter::floats("Cs", ParameterType::Color, DetailType::Varying, &color));
            params.push(TypedParameter::floats("Os", ParameterType::Color, DetailType::Varying, &opacity));
            params.push(TypedParameter::floats(
                "pfxflatness",
                ParameterType::Float,
                DetailType::Varying,
                &flatness,
            ));
            params.push(TypedParameter::floats(
                "pfxincandescence",
                ParameterType::Color,
                DetailType::Varying,
                &incandescence,
            ));
        }
        params.push(TypedParameter::floats(
            "pfxelement",
            ParameterType::Float,
            DetailType::Constant,
            &[pfx.kind as i32 as f32],
        ));
        params.extend(extra_params(
            &ctx.attributes.rman,
            ExtraTarget {
                varying_width: true,
                ..Default::default()
            },
        ));
        data
    }

    pub fn object_type(&self) -> ObjectType {
        match self.kind {
            PfxKind::Tube => ObjectType::PfxTube,
            PfxKind::Leaf => ObjectType::PfxLeaf,
            PfxKind::Petal => ObjectType::PfxPetal,
        }
    }

    pub fn is_writable(&self) -> bool {
        !self.nverts.is_empty()
    }

    pub fn granularity(&self) -> usize {
        usize::from(self.is_writable())
    }

    pub fn compare(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.nverts.len() == other.nverts.len()
            && self.nverts.first() == other.nverts.first()
            && param_equiv(&self.params, &other.params, "P")
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
    use crate::scene::ShaderAssignment;

    fn stroke(kind: PfxKind) -> PaintEffects {
        PaintEffects {
            kind,
            lines: vec![
                PfxLine {
                    points: vec![Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0)],
                    width: vec![0.4, 0.4, 0.4],
                    transparency: vec![Vec3::splat(0.25); 3],
                    ..Default::default()
                },
                PfxLine {
                    points: vec![Vec3::ZERO],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_phantom_ends() {
        let fx = Fixture::default();
        let d = PfxData::build(&stroke(PfxKind::Tube), &fx.ctx());
        assert_eq!(d.nverts, [5]);
        let p = find_param(&d.params, "P").unwrap().float_data();
        assert_eq!(&p[..3], &[-1.0, 0.0, 0.0]);
        assert_eq!(&p[12..], &[3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_leaf_ends_extended() {
        let fx = Fixture::default();
        let d = PfxData::build(&stroke(PfxKind::Leaf), &fx.ctx());
        let p = find_param(&d.params, "P").unwrap().float_data();
        assert!((p[3] + 0.4).abs() < 1e-6);
        assert!((p[9] - 2.4).abs() < 1e-6);
        assert_eq!(d.object_type(), ObjectType::PfxLeaf);
    }

    #[test]
    fn test_shading_variables() {
        let mut fx = Fixture::default();
        let d = PfxData::build(&stroke(PfxKind::Tube), &fx.ctx());
        let os = find_param(&d.params, "Os").unwrap();
        assert_eq!(os.detail(), DetailType::Varying);
        assert_eq!(&os.float_data()[..3], &[0.75, 0.75, 0.75]);
        let w = find_param(&d.params, "width").unwrap();
        assert!((w.float_data()[0] - 0.3).abs() < 1e-6);
        assert_eq!(find_param(&d.params, "pfxelement").unwrap().float_data(), &[0.0]);

        fx.attributes.shaders.surface = Some(ShaderAssignment {
            name: "plastic".into(),
            ..Default::default()
        });
        let d = PfxData::build(&stroke(PfxKind::Petal), &fx.ctx());
        assert!(find_param(&d.params, "Cs").is_none());
        assert!(find_param(&d.params, "pfxincandescence").is_none());
        assert_eq!(find_param(&d.params, "pfxelement").unwrap().float_data(), &[2.0]);
    }

    #[test]
    fn test_uniform_width_camera_facing_and_ids() {
        let fx = Fixture::default();
        let mut s = stroke(PfxKind::Tube);
        s.uniform_width = true;
        s.camera_facing = true;
        s.curve_id = true;
        let d = PfxData::build(&s, &fx.ctx());
        assert!(find_param(&d.params, "N").is_none());
        let w = find_param(&d.params, "width").unwrap();
        assert_eq!(w.detail(), DetailType::Uniform);
        assert_eq!(w.float_data().len(), 1);
        let ids = find_param(&d.params, "curveID").unwrap();
        assert_eq!(ids.detail(), DetailType::Uniform);
        // seeded, so repeatable
        let again = PfxData::build(&s, &fx.ctx());
        assert_eq!(find_param(&again.params, "curveID"), Some(ids));
    }

    #[test]
    fn test_empty_and_compare() {
        let fx = Fixture::default();
        let empty = PfxData::build(&PaintEffects::default(), &fx.ctx());
        assert_eq!(empty.granularity(), 0);
        assert!(!empty.is_writable());

        let a = PfxData::build(&stroke(PfxKind::Tube), &fx.ctx());
        let b = PfxData::build(&stroke(PfxKind::Leaf), &fx.ctx());
        assert!(a.compare(&a));
        assert!(!a.compare(&b));
        assert!(rib(&RibData::Pfx(a)).starts_with("Curves \"cubic\" [5] \"nonperiodic\""));
    }
}
