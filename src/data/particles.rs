//! Particle extractor.
//!
//! Render types:
//! - points and multi-points: one `Points` primitive
//! - streaks and multi-streaks: two-vertex linear `Curves` trailing along
//!   the velocity
//! - spheres: one `Sphere` per particle, each in its own attribute block
//!
//! Multi types scatter `multi_count` copies around each particle. The
//! scatter is seeded by particle id so it is stable across frames.

use super::{point_param, BuildContext};
use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::ri::Ri;
use crate::scene::{ParticleRenderType, Particles};
use crate::util::{Result, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Offsets for the copies of one particle.
fn scatter(id: i32, count: u32, radius: f32) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(id as u64);
    (0..count)
        .map(|_| {
            let dir = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            )
            .normalize_or_zero();
            dir * (rng.gen::<f32>() * radius * 0.5)
        })
        .collect()
}

/// One sphere particle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SphereGrain {
    pub center: Vec3,
    pub radius: f32,
    pub color: [f32; 3],
    pub opacity: [f32; 3],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleData {
    pub render_type: ParticleRenderType,
    /// Source particle count.
    pub count: usize,
    /// Vertex counts of streaks.
    pub nverts: Vec<i32>,
    pub params: Vec<TypedParameter>,
    pub spheres: Vec<SphereGrain>,
}

impl ParticleData {
    pub fn build(p: &Particles, ctx: &BuildContext<'_>) -> Self {
        let count = p.positions.len();
        let mut data = Self {
            render_type: p.render_type,
            count,
            ..Default::default()
        };
        if count == 0 {
            tracing::debug!(object = ctx.path, "particle system is empty");
            return data;
        }

        let id = |i: usize| p.ids.get(i).copied().unwrap_or(i as i32);
        let radius = |i: usize| p.radius_pp.get(i).copied().unwrap_or(p.radius);
        let color = |i: usize| p.color.get(i).copied().unwrap_or(Vec3::ONE).to_array();
        let opacity = |i: usize| p.opacity.get(i).copied().unwrap_or(1.0);
        let per_particle = |len: usize| len == count;

        match p.render_type {
            ParticleRenderType::Spheres => {
                data.spheres = (0..count)
                    .map(|i| SphereGrain {
                        center: p.positions[i],
                        radius: radius(i),
                        color: color(i),
                        opacity: [opacity(i); 3],
                    })
                    .collect();
            }
            ParticleRenderType::Points | ParticleRenderType::MultiPoint => {
                let copies = if p.render_type == ParticleRenderType::MultiPoint {
                    p.multi_count.max(1)
                } else {
                    1
                };
                // source index of every written point
                let mut source = Vec::with_capacity(count * copies as usize);
                let mut points = Vec::with_capacity(count * copies as usize);
                for (i, &pos) in p.positions.iter().enumerate() {
                    if copies == 1 {
                        source.push(i);
                        points.push(pos);
                        continue;
                    }
                    for offset in scatter(id(i), copies, p.multi_radius) {
                        source.push(i);
                        points.push(pos + offset);
                    }
                }
                let params = &mut data.params;
                params.push(point_param(&points));
                if per_particle(p.radius_pp.len()) {
                    let w: Vec<f32> = source.iter().map(|&i| 2.0 * radius(i)).collect();
                    params.push(TypedParameter::floats("width", ParameterType::Float, DetailType::Vertex, &w));
                } else {
                    params.push(TypedParameter::floats(
                        "constantwidth",
                        ParameterType::Float,
                        DetailType::Constant,
                        &[2.0 * p.radius],
                    ));
                }
                if per_particle(p.color.len()) {
                    let c: Vec<f32> = source.iter().flat_map(|&i| color(i)).collect();
                    params.push(TypedParameter::floats("Cs", ParameterType::Color, DetailType::Vertex, &c));
                }
                if per_particle(p.opacity.len()) {
                    let o: Vec<f32> = source.iter().flat_map(|&i| [opacity(i); 3]).collect();
                    params.push(TypedParameter::floats("Os", ParameterType::Color, DetailType::Vertex, &o));
                }
                if per_particle(p.ids.len()) {
                    let ids: Vec<f32> = source.iter().map(|&i| id(i) as f32).collect();
                    params.push(TypedParameter::floats("id", ParameterType::Float, DetailType::Vertex, &ids));
                }
                if per_particle(p.velocity.len()) {
                    let v: Vec<f32> = source.iter().flat_map(|&i| p.velocity[i].to_array()).collect();
                    params.push(TypedParameter::floats("velocity", ParameterType::Vector, DetailType::Vertex, &v));
                }
            }
            ParticleRenderType::Streak | ParticleRenderType::MultiStreak => {
                let copies = if p.render_type == ParticleRenderType::MultiStreak {
                    p.multi_count.max(1)
                } else {
                    1
                };
                let fps = if p.fps > 0.0 { p.fps } else { 24.0 };
                let mut source = Vec::new();
                let mut points = Vec::new();
                for (i, &pos) in p.positions.iter().enumerate() {
                    let offsets = if copies == 1 {
                        vec![Vec3::ZERO]
                    } else {
                        scatter(id(i), copies, p.multi_radius)
                    };
                    let trail = p.velocity.get(i).copied().unwrap_or(Vec3::ZERO) * p.tail_size / fps;
                    for offset in offsets {
                        let head = pos + offset;
                        source.push(i);
                        points.push(head - trail);
                        points.push(head);
                    }
                }
                data.nverts = vec![2; source.len()];
                let params = &mut data.params;
                params.push(point_param(&points));
                if per_particle(p.radius_pp.len()) {
                    let w: Vec<f32> = source.iter().flat_map(|&i| [2.0 * radius(i); 2]).collect();
                    params.push(TypedParameter::floats("width", ParameterType::Float, DetailType::Vertex, &w));
                } else {
                    params.push(TypedParameter::floats(
                        "constantwidth",
                        ParameterType::Float,
                        DetailType::Constant,
                        &[2.0 * p.radius],
                    ));
                }
                if per_particle(p.color.len()) {
                    let c: Vec<f32> = source.iter().flat_map(|&i| [color(i), color(i)]).flatten().collect();
                    params.push(TypedParameter::floats("Cs", ParameterType::Color, DetailType::Vertex, &c));
                }
                let o: Vec<f32> = source
                    .iter()
                    .flat_map(|&i| {
                        let head = opacity(i);
                        [[head * p.tail_fade; 3], [head; 3]]
                    })
                    .flatten()
                    .collect();
                params.push(TypedParameter::floats("Os", ParameterType::Color, DetailType::Vertex, &o));
                if per_particle(p.ids.len()) {
                    let ids: Vec<f32> = source.iter().map(|&i| id(i) as f32).collect();
                    params.push(TypedParameter::floats("id", ParameterType::Float, DetailType::Uniform, &ids));
                }
            }
        }
        data
    }

    pub fn is_writable(&self) -> bool {
        self.count > 0
    }

    /// One grain per sphere, one for everything else.
    pub fn granularity(&self) -> usize {
        if self.render_type == ParticleRenderType::Spheres {
            self.spheres.len()
        } else {
            usize::from(self.count > 0)
        }
    }

    /// Sphere grains are written outside motion blocks.
    pub fn is_grain_animated(&self, _grain: usize) -> bool {
        self.render_type != ParticleRenderType::Spheres
    }

    pub fn compare(&self, other: &Self) -> bool {
        self.render_type == other.render_type && self.count == other.count
    }

    pub fn write_grain(&self, ri: &mut dyn Ri, grain: usize) -> Result<()> {
        match self.render_type {
            ParticleRenderType::Spheres => {
                let Some(s) = self.spheres.get(grain) else {
                    return Ok(());
                };
                ri.attribute_begin()?;
                ri.color(s.color)?;
                ri.opacity(s.opacity)?;
                ri.translate(s.center.x, s.center.y, s.center.z)?;
                ri.sphere(s.radius, -s.radius, s.radius, 360.0, &[])?;
                ri.attribute_end()
            }
            ParticleRenderType::Points | ParticleRenderType::MultiPoint => {
                let n = self.params.first().map_or(0, |p| p.float_data().len() / 3);
                ri.points(n, &self.params)
            }
            ParticleRenderType::Streak | ParticleRenderType::MultiStreak => {
                ri.curves("linear", &self.nverts, "nonperiodic", &self.params)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{find_param, RibData};
    use super::*;

    fn cloud(render_type: ParticleRenderType) -> Particles {
        Particles {
            render_type,
            positions: vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)],
            ids: vec![7, 8],
            velocity: vec![Vec3::new(24.0, 0.0, 0.0); 2],
            opacity: vec![0.5, 1.0],
            ..Default::default()
        }
    }

    #[test]
    fn test_points() {
        let fx = Fixture::default();
        let d = ParticleData::build(&cloud(ParticleRenderType::Points), &fx.ctx());
        assert_eq!(d.granularity(), 1);
        let w = find_param(&d.params, "constantwidth").unwrap();
        assert_eq!(w.float_data(), &[1.0]);
        let os = find_param(&d.params, "Os").unwrap();
        assert_eq!(&os.float_data()[..3], &[0.5, 0.5, 0.5]);
        assert_eq!(find_param(&d.params, "id").unwrap().float_data(), &[7.0, 8.0]);
        assert!(rib(&RibData::Particles(d)).starts_with("Points \"P\" [0 0 0 1 0 0]"));
    }

    #[test]
    fn test_multi_point_is_stable() {
        let fx = Fixture::default();
        let mut c = cloud(ParticleRenderType::MultiPoint);
        c.multi_count = 4;
        let a = ParticleData::build(&c, &fx.ctx());
        let b = ParticleData::build(&c, &fx.ctx());
        assert_eq!(a, b);
        let p = find_param(&a.params, "P").unwrap().float_data();
        assert_eq!(p.len(), 8 * 3);
        for chunk in p[..12].chunks(3) {
            let off = Vec3::from_slice(chunk);
            assert!(off.length() <= c.multi_radius * 0.5 + 1e-5);
        }
        assert_eq!(find_param(&a.params, "id").unwrap().float_data()[3], 7.0);
    }

    #[test]
    fn test_streak_tail() {
        let fx = Fixture::default();
        let mut c = cloud(ParticleRenderType::Streak);
        c.tail_fade = 0.5;
        let d = ParticleData::build(&c, &fx.ctx());
        assert_eq!(d.nverts, [2, 2]);
        let p = find_param(&d.params, "P").unwrap().float_data();
        // one frame of travel behind the head
        assert_eq!(&p[..6], &[-1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let os = find_param(&d.params, "Os").unwrap().float_data();
        assert_eq!(&os[..6], &[0.25, 0.25, 0.25, 0.5, 0.5, 0.5]);
        let text = rib(&RibData::Particles(d));
        assert!(text.starts_with("Curves \"linear\" [2 2] \"nonperiodic\""));
    }

    #[test]
    fn test_sphere_grains() {
        let fx = Fixture::default();
        let d = ParticleData::build(&cloud(ParticleRenderType::Spheres), &fx.ctx());
        assert_eq!(d.granularity(), 2);
        assert!(!d.is_grain_animated(0));
        let text = rib(&RibData::Particles(d));
        assert_eq!(text.matches("AttributeBegin").count(), 2);
        assert!(text.contains("Translate 1 0 0"));
        assert!(text.contains("Sphere 0.5 -0.5 0.5 360"));
    }

    #[test]
    fn test_compare_counts() {
        let fx = Fixture::default();
        let a = ParticleData::build(&cloud(ParticleRenderType::Points), &fx.ctx());
        let mut c = cloud(ParticleRenderType::Points);
        c.positions.push(Vec3::ONE);
        let b = ParticleData::build(&c, &fx.ctx());
        assert!(a.compare(&a));
        assert!(!a.compare(&b));
        assert!(!ParticleData::build(&Particles::default(), &fx.ctx()).is_writable());
    }
}
