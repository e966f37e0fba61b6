//! Light extractor.
//!
//! Host lights map onto a fixed set of light shaders:
//!
//! | Kind    | Shader          |
//! |---------|-----------------|
//! | ambient | `ambientlight`  |
//! | distant | `liquiddistant` |
//! | point   | `liquidpoint`   |
//! | spot    | `liquidspot`    |
//! | area    | `liquidarea`    |
//! | rman    | user shader     |
//!
//! In shadow passes a shadow casting light is replaced by
//! `liquidshadowpasslight` so shaders can look up the map being rendered.

use super::{BuildContext, ShadowNaming, WriteContext};
use crate::param::TypedParameter;
use crate::ri::{LightHandle, Ri};
use crate::scene::{LightKind, LightShape, ShadowSettings};
use crate::shader::{ShaderInfo, ShaderInstance};
use crate::util::{flip_z, pad_frame, rib_matrix, sanitize_node_name, Result, RtMatrix};
use std::collections::BTreeMap;

/// Shader used for every shadow casting light in a shadow pass.
pub const SHADOW_PASS_LIGHT: &str = "liquidshadowpasslight";

/// Shadow name written for ray traced shadows.
pub const RAYTRACE: &str = "raytrace";

/// Cube face of a point light shadow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    Px,
    Nx,
    Py,
    Ny,
    Pz,
    Nz,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [Self::Px, Self::Nx, Self::Py, Self::Ny, Self::Pz, Self::Nz];

    /// Suffix appended to the map name, e.g. `_PX`.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Px => "_PX",
            Self::Nx => "_NX",
            Self::Py => "_PY",
            Self::Ny => "_NY",
            Self::Pz => "_PZ",
            Self::Nz => "_NZ",
        }
    }

    /// Lower case axis name used in shader parameters, e.g. `px`.
    pub fn axis(self) -> &'static str {
        match self {
            Self::Px => "px",
            Self::Nx => "nx",
            Self::Py => "py",
            Self::Ny => "ny",
            Self::Pz => "pz",
            Self::Nz => "nz",
        }
    }

    /// Rotation (degrees, axis) of the shadow camera looking down this face.
    /// The camera transform flips Z after it.
    pub fn rotation(self) -> (f32, [f32; 3]) {
        match self {
            Self::Px => (-90.0, [0.0, 1.0, 0.0]),
            Self::Nx => (90.0, [0.0, 1.0, 0.0]),
            Self::Py => (90.0, [1.0, 0.0, 0.0]),
            Self::Ny => (-90.0, [1.0, 0.0, 0.0]),
            Self::Pz => (180.0, [0.0, 1.0, 0.0]),
            Self::Nz => (0.0, [0.0, 1.0, 0.0]),
        }
    }
}

/// Shadow map file name of `light`.
///
/// `<dir>[<scene>_]<light>_<SHD|DSH>[_<face>].[<set>.]<frame>.<ext>`, or the
/// user supplied name when there is one.
pub fn shadow_name(
    light: &str,
    shadows: &ShadowSettings,
    naming: &ShadowNaming,
    frame: i64,
    face: Option<CubeFace>,
) -> String {
    if !shadows.user_shadow_name.is_empty() {
        return shadows.user_shadow_name.clone();
    }
    let mut name = naming.dir.clone();
    if !naming.shape_only {
        name.push_str(&naming.scene_name);
        name.push('_');
    }
    name.push_str(&sanitize_node_name(light));
    name.push_str(if shadows.deep { "_DSH" } else { "_SHD" });
    if let Some(face) = face {
        name.push_str(face.suffix());
    }
    name.push('.');
    if !shadows.geometry_set.is_empty() {
        name.push_str(&shadows.geometry_set);
        name.push('.');
    }
    let frame = if shadows.every_frame {
        frame
    } else {
        shadows.render_at_frame
    };
    name.push_str(&pad_frame(frame, naming.padding));
    name.push('.');
    name.push_str(&naming.extension);
    name
}

/// Builder for the positional light parameter lists.
#[derive(Default)]
struct Params(Vec<TypedParameter>);

impl Params {
    fn float(&mut self, name: &str, v: f32) -> &mut Self {
        self.0.push(TypedParameter::float(name, v));
        self
    }

    fn color(&mut self, name: &str, rgb: [f32; 3]) -> &mut Self {
        self.0.push(TypedParameter::color(name, rgb));
        self
    }

    fn string(&mut self, name: &str, s: &str) -> &mut Self {
        self.0.push(TypedParameter::text(name, s));
        self
    }

    fn flag(&mut self, name: &str, on: bool) -> &mut Self {
        self.float(name, if on { 1.0 } else { 0.0 })
    }
}

/// Light source ready to write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightData {
    pub kind: LightKind,
    /// Short node name.
    pub name: String,
    pub matrix: RtMatrix,
    pub exclude_from_rib: bool,
    pub illuminates_by_default: bool,
    /// Shader written in beauty passes.
    pub shader: String,
    pub params: Vec<TypedParameter>,
    /// Shadow map name(s); cube lights carry six.
    pub shadow_names: Vec<String>,
    /// Parameters of the shadow pass light, present when the light casts
    /// shadows and shadows are enabled.
    pub shadow_pass: Option<Vec<TypedParameter>>,
}

impl LightData {
    pub fn build(light: &LightShape, ctx: &BuildContext<'_>) -> Result<Self> {
        let world = if light.use_light_scale || ctx.options.use_light_scale {
            ctx.world
        } else {
            flip_z(&ctx.world)
        };
        let s = &light.shadows;
        let uses_shadow = s.depth_map || s.ray_traced;

        let shadow_names: Vec<String> = if !uses_shadow {
            Vec::new()
        } else if s.ray_traced {
            vec![RAYTRACE.to_string()]
        } else if light.kind == LightKind::Point {
            CubeFace::ALL
                .iter()
                .map(|&f| shadow_name(ctx.name, s, ctx.naming, ctx.frame, Some(f)))
                .collect()
        } else {
            vec![shadow_name(ctx.name, s, ctx.naming, ctx.frame, None)]
        };
        let primary = shadow_names.first().cloned().unwrap_or_default();

        let shadow_pass = (uses_shadow && ctx.options.do_shadows).then(|| {
            let mut p = Params::default();
            p.string("shadowname", &primary);
            p.0
        });

        let (shader, params) = match light.kind {
            LightKind::Rman => rman_params(light, ctx.shaders)?,
            kind => (builtin_shader(kind).to_string(), builtin_params(light, ctx.name, &shadow_names)),
        };

        Ok(Self {
            kind: light.kind,
            name: ctx.name.to_string(),
            matrix: rib_matrix(&world),
            exclude_from_rib: light.exclude_from_rib,
            illuminates_by_default: light.illuminates_by_default,
            shader,
            params,
            shadow_names,
            shadow_pass,
        })
    }

    /// Name of the light's coordinate system (area lights).
    pub fn coordsys_name(&self) -> String {
        format!("{}CoordSys", self.name)
    }

    /// Write the transform and the light. Returns the handle of the light
    /// written, or `None` when a shadow pass skips it.
    pub fn write(&self, ri: &mut dyn Ri, ctx: &WriteContext<'_>) -> Result<Option<LightHandle>> {
        if !self.exclude_from_rib {
            ri.concat_transform(&self.matrix)?;
        }
        if ctx.is_shadow_pass() {
            return match &self.shadow_pass {
                Some(params) => ri.light_source(SHADOW_PASS_LIGHT, params).map(Some),
                None => Ok(None),
            };
        }
        if self.kind == LightKind::Area {
            ri.coordinate_system(&self.coordsys_name())?;
        }
        ri.light_source(&self.shader, &self.params).map(Some)
    }
}

fn builtin_shader(kind: LightKind) -> &'static str {
    match kind {
        LightKind::Ambient => "ambientlight",
        LightKind::Distant => "liquiddistant",
        LightKind::Point => "liquidpoint",
        LightKind::Spot => "liquidspot",
        LightKind::Area => "liquidarea",
        LightKind::Rman => "",
    }
}

fn builtin_params(l: &LightShape, name: &str, shadow_names: &[String]) -> Vec<TypedParameter> {
    let s = &l.shadows;
    let has_shadow = !shadow_names.is_empty();
    let shadow_name = shadow_names.first().map(String::as_str).unwrap_or("");
    let filter_size = if s.ray_traced { s.radius } else { s.filter_size };
    let mut p = Params::default();

    let tail = |p: &mut Params| {
        p.flag("__nondiffuse", !l.emit_diffuse)
            .flag("__nonspecular", !l.emit_specular)
            .string("__category", &l.category)
            .float("lightID", l.light_id as f32);
    };

    match l.kind {
        LightKind::Ambient => {
            p.float("intensity", l.intensity).color("lightcolor", l.color);
        }
        LightKind::Distant => {
            p.float("intensity", l.intensity).color("lightcolor", l.color);
            if has_shadow {
                p.string("shadowname", shadow_name)
                    .float("shadowfiltersize", filter_size)
                    .float("shadowbias", s.bias)
                    .float("shadowsamples", s.samples as f32)
                    .float("shadowblur", s.blur)
                    .color("shadowcolor", s.shadow_color);
            } else {
                p.color("shadowcolor", s.shadow_color);
            }
            tail(&mut p);
        }
        LightKind::Point => {
            p.float("intensity", l.intensity).color("lightcolor", l.color);
            if has_shadow {
                p.float("decay", l.decay as f32);
                for (i, face) in CubeFace::ALL.iter().enumerate() {
                    let n = if s.ray_traced {
                        // a single name covers every direction
                        if i == 0 { RAYTRACE } else { "" }
                    } else {
                        shadow_names.get(i).map(String::as_str).unwrap_or("")
                    };
                    p.string(&format!("shadowname{}", face.axis()), n);
                }
                p.float("shadowfiltersize", filter_size)
                    .float("shadowbias", s.bias)
                    .float("shadowsamples", s.samples as f32)
                    .float("shadowblur", s.blur)
                    .color("shadowcolor", s.shadow_color);
            } else {
                p.color("shadowcolor", s.shadow_color).float("decay", l.decay as f32);
            }
            tail(&mut p);
        }
        LightKind::Spot => {
            p.float("intensity", l.intensity).color("lightcolor", l.color);
            if !has_shadow {
                p.color("shadowcolor", s.shadow_color);
            }
            p.float("coneangle", (l.cone_angle * 0.5).to_radians())
                .float("penumbraangle", l.penumbra.to_radians())
                .float("dropoff", l.dropoff)
                .float("decay", l.decay as f32)
                .flag("barndoors", l.barn_doors)
                .float("leftbarndoor", l.left_barn_door)
                .float("rightbarndoor", l.right_barn_door)
                .float("topbarndoor", l.top_barn_door)
                .float("bottombarndoor", l.bottom_barn_door)
                .flag("decayRegions", l.decay_regions);
            for (i, r) in l.regions.iter().enumerate() {
                p.float(&format!("startDistance{}", i + 1), r.start);
            }
            for (i, r) in l.regions.iter().enumerate() {
                p.float(&format!("endDistance{}", i + 1), r.end);
            }
            for (i, v) in l.region_intensities.iter().enumerate() {
                p.float(&format!("startDistanceIntensity{}", i + 1), *v);
            }
            for (i, v) in l.region_intensities.iter().enumerate() {
                p.float(&format!("endDistanceIntensity{}", i + 1), *v);
            }
            p.string("shadowname", shadow_name);
            if has_shadow {
                p.float("shadowfiltersize", filter_size)
                    .float("shadowbias", s.bias)
                    .float("shadowsamples", s.samples as f32)
                    .float("shadowblur", s.blur)
                    .color("shadowcolor", s.shadow_color);
            } else {
                p.float("shadowbias", s.bias).float("shadowsamples", s.samples as f32);
            }
            tail(&mut p);
        }
        LightKind::Area => {
            let hit_mode = match l.hit_mode {
                1 => "primitive",
                2 => "shader",
                _ => "default",
            };
            p.float("intensity", l.intensity)
                .color("lightcolor", l.color)
                .float("decay", l.decay as f32)
                .string("coordsys", &format!("{name}CoordSys"))
                .float("lightsamples", l.light_samples as f32)
                .flag("doublesided", l.both_sides)
                .string("shadowname", shadow_name)
                .color("shadowcolor", s.shadow_color)
                .string("lightmap", &l.light_map)
                .float("lightmapsaturation", l.light_map_saturation)
                .float("lightID", l.light_id as f32)
                .string("hitmode", hit_mode)
                .string("__category", &l.category);
        }
        LightKind::Rman => {}
    }
    p.0
}

fn rman_params(
    light: &LightShape,
    shaders: &BTreeMap<String, crate::shader::ShaderQuery>,
) -> Result<(String, Vec<TypedParameter>)> {
    let Some(name) = light.shader.as_deref().filter(|s| !s.is_empty()) else {
        tracing::warn!("rman light without a shader, writing ambientlight");
        return Ok(("ambientlight".into(), Vec::new()));
    };
    let Some(query) = shaders.get(name) else {
        tracing::warn!(shader = name, "light shader not in the shader library, writing without parameters");
        return Ok((name.to_string(), Vec::new()));
    };
    let info = ShaderInfo::from_query(query)?;
    let overrides = BTreeMap::new();
    let built = ShaderInstance::new(&info, &overrides).parameters();
    Ok((info.name, built.params))
}

#[cfg(test)]
mod tests {
    use super::super::find_param;
    use super::super::testing::*;
    use super::*;
    use crate::param::{DetailType, ParameterType};
    use crate::ri::RibWriter;
    use crate::shader::{ShaderKind, ShaderQuery};
    use crate::scene::Value;
    use ribgen_api::RenderPass;

    fn naming() -> ShadowNaming {
        ShadowNaming {
            dir: "shadows/".into(),
            scene_name: "shot".into(),
            padding: 4,
            extension: "tex".into(),
            ..Default::default()
        }
    }

    fn write(data: &LightData, pass: RenderPass) -> (String, Option<LightHandle>) {
        let loader = super::super::GeneratorRegistry::default();
        let mut ctx = write_ctx(&loader);
        ctx.pass = pass;
        let mut w = RibWriter::new(Vec::new());
        let handle = data.write(&mut w, &ctx).unwrap();
        (String::from_utf8(w.into_inner().unwrap()).unwrap(), handle)
    }

    #[test]
    fn test_shadow_name_layout() {
        let s = ShadowSettings::default();
        assert_eq!(shadow_name("key", &s, &naming(), 12, None), "shadows/shot_key_SHD.0012.tex");
        assert_eq!(
            shadow_name("key", &s, &naming(), 12, Some(CubeFace::Px)),
            shadow_name("key", &s, &naming(), 12, Some(CubeFace::Px))
        );

        let s = ShadowSettings {
            deep: true,
            geometry_set: "hero".into(),
            every_frame: false,
            render_at_frame: 3,
            ..Default::default()
        };
        let mut n = naming();
        n.shape_only = true;
        assert_eq!(
            shadow_name("grp|key", &s, &n, 12, Some(CubeFace::Nz)),
            "shadows/grp_key_DSH_NZ.hero.0003.tex"
        );

        let s = ShadowSettings {
            user_shadow_name: "mine.tex".into(),
            ..Default::default()
        };
        assert_eq!(shadow_name("key", &s, &naming(), 1, None), "mine.tex");
    }

    #[test]
    fn test_ambient() {
        let fx = Fixture::default();
        let l = LightShape {
            kind: LightKind::Ambient,
            intensity: 0.5,
            ..Default::default()
        };
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        let (text, handle) = write(&d, RenderPass::Final);
        assert_eq!(handle, Some(1));
        assert!(text.contains("LightSource \"ambientlight\" 1 \"float intensity\" [0.5] \"color lightcolor\" [1 1 1]\n"));
    }

    #[test]
    fn test_spot_parameter_order() {
        let fx = Fixture::default();
        let l = LightShape {
            kind: LightKind::Spot,
            cone_angle: 90.0,
            ..Default::default()
        };
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        let names: Vec<_> = d.params.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(&names[..3], &["intensity", "lightcolor", "shadowcolor"]);
        assert_eq!(names.last().map(String::as_str), Some("lightID"));
        assert_eq!(names.len(), 32);
        let cone = find_param(&d.params, "coneangle").unwrap().float_data()[0];
        assert!((cone - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn test_point_cube_shadows() {
        let fx = Fixture::default();
        let mut l = LightShape::default();
        l.shadows.depth_map = true;
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        assert_eq!(d.shadow_names.len(), 6);
        assert_eq!(d.shadow_names[1], "shot_obj_SHD_NX.1.tex");
        let px = find_param(&d.params, "shadownamepx").unwrap();
        assert_eq!(px.string_data()[0], "shot_obj_SHD_PX.1.tex");

        l.shadows.ray_traced = true;
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        assert_eq!(d.shadow_names, ["raytrace"]);
        assert_eq!(find_param(&d.params, "shadownamepx").unwrap().string_data()[0], "raytrace");
    }

    #[test]
    fn test_shadow_pass_light() {
        let fx = Fixture::default();
        let mut l = LightShape {
            kind: LightKind::Distant,
            ..Default::default()
        };
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        let (text, handle) = write(&d, RenderPass::Shadow);
        assert_eq!(handle, None);
        assert!(!text.contains("LightSource"));

        l.shadows.depth_map = true;
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        let (text, handle) = write(&d, RenderPass::Shadow);
        assert!(handle.is_some());
        assert!(text.contains("LightSource \"liquidshadowpasslight\" 1 \"string shadowname\" [\"shot_obj_SHD.1.tex\"]"));
    }

    #[test]
    fn test_transform_flip_and_exclusion() {
        let fx = Fixture::default();
        let mut l = LightShape::default();
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        assert_eq!(d.matrix[10], -1.0);
        assert!(write(&d, RenderPass::Final).0.starts_with("ConcatTransform"));

        l.use_light_scale = true;
        l.exclude_from_rib = true;
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        assert_eq!(d.matrix[10], 1.0);
        assert!(write(&d, RenderPass::Final).0.starts_with("LightSource"));
    }

    #[test]
    fn test_area_light() {
        let fx = Fixture::default();
        let l = LightShape {
            kind: LightKind::Area,
            hit_mode: 2,
            ..Default::default()
        };
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        assert_eq!(find_param(&d.params, "coordsys").unwrap().string_data()[0], "objCoordSys");
        assert_eq!(find_param(&d.params, "hitmode").unwrap().string_data()[0], "shader");
        let (text, _) = write(&d, RenderPass::Final);
        assert!(text.contains("CoordinateSystem \"objCoordSys\"\n"));
    }

    #[test]
    fn test_rman_light_from_library() {
        let mut fx = Fixture::default();
        fx.shaders.insert(
            "mylight".into(),
            ShaderQuery {
                name: "mylight".into(),
                kind: ShaderKind::Light,
                names: vec!["intensity".into()],
                types: vec![ParameterType::Float],
                details: vec![DetailType::Uniform],
                array_sizes: vec![0],
                defaults: vec![Value::Float(2.0)],
                outputs: vec![false],
                accepts: vec![String::new()],
                output_in_shadow: false,
            },
        );
        let l = LightShape {
            kind: LightKind::Rman,
            shader: Some("mylight".into()),
            ..Default::default()
        };
        let d = LightData::build(&l, &fx.ctx()).unwrap();
        assert_eq!(d.shader, "mylight");
        assert_eq!(d.params.len(), 1);

        fx.shaders.get_mut("mylight").unwrap().outputs.clear();
        assert!(LightData::build(&l, &fx.ctx()).is_err());
    }
}
