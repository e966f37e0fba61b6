//! Render jobs: one RIB file each.
//!
//! Every frame renders its depth map shadows first, then the beauty pass.
//! A light casting depth map shadows gets one job, six for point lights
//! (one per cube face).

use super::context::RenderContext;
use crate::data::{shadow_name, CubeFace, ShadowNaming};
use crate::scene::{CameraShape, LightKind, LightShape, Scene, Shape};
use crate::util::{pad_frame, relative_path, sanitize_node_name, DMat4, DQuat, DVec3, Error, ExpandContext, Result};
use ribgen_api::RenderPass;
use std::path::PathBuf;

/// Viewing parameters of a shadow camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowView {
    /// Horizontal field of view in degrees.
    pub fov: f32,
    pub orthographic: bool,
    pub ortho_width: f32,
    pub near: f32,
    pub far: f32,
}

impl ShadowView {
    fn of(light: &LightShape, face: Option<CubeFace>) -> Self {
        let s = &light.shadows;
        let fov = match (light.kind, face) {
            (_, Some(_)) => 90.0,
            (LightKind::Spot, None) if light.penumbra > 0.0 => light.cone_angle + light.penumbra * 2.0,
            (LightKind::Spot, None) => light.cone_angle,
            _ => 95.0,
        };
        let orthographic = light.kind == LightKind::Distant;
        Self {
            fov,
            orthographic,
            ortho_width: if orthographic { s.width_focus } else { 0.0 },
            near: s.near_clip,
            far: s.far_clip,
        }
    }
}

/// Depth map settings of a shadow job.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowJob {
    /// Path of the light.
    pub light: String,
    pub face: Option<CubeFace>,
    pub deep: bool,
    /// Only members of this set cast shadows (empty for all).
    pub geometry_set: String,
    pub pixel_samples: u32,
    pub shading_rate: f32,
    pub continuous_volume: bool,
    pub view: ShadowView,
}

/// One RIB file to write.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderJob {
    pub pass: RenderPass,
    /// Light or camera short name.
    pub name: String,
    /// Frame of the sequence this job belongs to.
    pub frame: i64,
    /// Frame the scene is evaluated at.
    pub render_frame: i64,
    /// Render camera path (the beauty camera, also for shadow jobs).
    pub camera: String,
    /// Image or shadow map written by the renderer.
    pub image_name: String,
    pub rib_file: PathBuf,
    pub width: u32,
    pub height: u32,
    pub aspect: f32,
    /// Display driver of the first display.
    pub format: String,
    pub image_mode: String,
    pub shadow: Option<ShadowJob>,
}

impl RenderJob {
    pub fn is_shadow(&self) -> bool {
        self.shadow.is_some()
    }

    pub fn is_deep_shadow(&self) -> bool {
        self.shadow.as_ref().is_some_and(|s| s.deep)
    }

    /// World to camera matrix of this job in `scene`.
    ///
    /// Shadow cameras sit on their light, Z flipped, rotated onto the cube
    /// face for point lights.
    pub fn camera_matrix(&self, scene: &Scene) -> Result<DMat4> {
        let flip = DMat4::from_scale(DVec3::new(1.0, 1.0, -1.0));
        let world = match &self.shadow {
            None => scene.world_matrix(&self.camera)? * flip,
            Some(s) => {
                let world = scene.world_matrix(&s.light)?;
                let (_, rotation, translation) = world.to_scale_rotation_translation();
                let rotation = match s.face {
                    Some(face) => {
                        let (deg, axis) = face.rotation();
                        let axis = DVec3::new(axis[0] as f64, axis[1] as f64, axis[2] as f64);
                        DQuat::from_axis_angle(axis, (deg as f64).to_radians())
                    }
                    None => rotation,
                };
                DMat4::from_rotation_translation(rotation, translation) * flip
            }
        };
        Ok(world.inverse())
    }
}

/// Display driver extension.
pub fn image_extension(format: &str) -> &'static str {
    match format {
        "openexr" | "exr" => "exr",
        "jpeg" | "jpg" => "jpg",
        "targa" | "tga" => "tga",
        "sgif" | "sgi" => "sgi",
        _ => "tif",
    }
}

/// Render camera path from the globals or the scene.
pub fn render_camera(ctx: &RenderContext, scene: &Scene) -> Result<String> {
    let camera = if ctx.camera.is_empty() { &scene.camera } else { &ctx.camera };
    if camera.is_empty() {
        return Err(Error::InvalidConfig("no render camera".into()));
    }
    scene.camera_shape(camera)?;
    Ok(camera.clone())
}

/// Naming inputs shared by the jobs of one run.
#[derive(Clone, Debug)]
pub struct Naming<'a> {
    pub ctx: &'a RenderContext,
    pub scene: &'a str,
    pub expand: &'a ExpandContext,
}

impl Naming<'_> {
    fn dir(&self, dir: &str) -> String {
        let mut d = self.ctx.project_path(dir);
        if !d.is_empty() && !d.ends_with('/') {
            d.push('/');
        }
        d
    }

    fn pad(&self, frame: i64) -> String {
        pad_frame(frame, self.ctx.output.padding)
    }

    /// Shadow map naming for the extractors.
    pub fn shadow_naming(&self) -> ShadowNaming {
        let o = &self.ctx.output;
        let tex = self.dir(&o.texture_dir);
        ShadowNaming {
            dir: relative_path(o.relative_paths, &tex, &self.dir(&o.project_dir)),
            scene_name: self.scene.to_string(),
            shape_only: self.ctx.shadows.shape_only,
            padding: o.padding,
            extension: self.ctx.shadows.extension.clone(),
        }
    }

    /// Beauty image for display `aov` (empty for the primary image).
    pub fn image_name(&self, camera: &str, aov: &str, frame: i64) -> String {
        let o = &self.ctx.output;
        let ext = image_extension(self.ctx.image.displays.first().map(|d| d.ty.as_str()).unwrap_or(""));
        let mut name = self.dir(&o.picture_dir);
        if !o.image_name.is_empty() {
            let expanded = self.expand.at_frame(frame).expand(&o.image_name);
            if aov.is_empty() {
                name.push_str(&expanded);
            } else {
                name.push_str(&insert_before_extension(&expanded, aov));
            }
            return name;
        }
        name.push_str(self.scene);
        if o.camera_in_names {
            name.push('.');
            name.push_str(&sanitize_node_name(crate::scene::short_name(camera)));
        }
        if !aov.is_empty() {
            name.push('.');
            name.push_str(aov);
        }
        name.push('.');
        name.push_str(&self.pad(frame));
        name.push('.');
        name.push_str(ext);
        name
    }

    fn rib_extension(&self) -> &'static str {
        if self.ctx.output.compress {
            "rib.gz"
        } else {
            "rib"
        }
    }

    /// Beauty RIB file.
    pub fn beauty_rib(&self, camera: &str, frame: i64) -> PathBuf {
        let o = &self.ctx.output;
        let mut name = self.dir(&o.rib_dir);
        if !o.rib_name.is_empty() {
            name.push_str(&self.expand.at_frame(frame).expand(&o.rib_name));
            return PathBuf::from(name);
        }
        name.push_str(self.scene);
        if o.camera_in_names {
            name.push('_');
            name.push_str(&sanitize_node_name(crate::scene::short_name(camera)));
        }
        name.push('.');
        name.push_str(&self.pad(frame));
        name.push('.');
        name.push_str(self.rib_extension());
        PathBuf::from(name)
    }

    /// Shadow RIB file: `[scene_]light_<SHD|DSH>[_face][.set].frame.rib`.
    pub fn shadow_rib(&self, light: &str, shadow: &ShadowJob, frame: i64) -> PathBuf {
        let mut name = self.dir(&self.ctx.output.rib_dir);
        if !self.ctx.shadows.shape_only {
            name.push_str(self.scene);
            name.push('_');
        }
        name.push_str(&sanitize_node_name(light));
        name.push_str(if shadow.deep { "_DSH" } else { "_SHD" });
        if let Some(face) = shadow.face {
            name.push_str(face.suffix());
        }
        if !shadow.geometry_set.is_empty() {
            name.push('.');
            name.push_str(&shadow.geometry_set);
        }
        name.push('.');
        name.push_str(&self.pad(frame));
        name.push('.');
        name.push_str(self.rib_extension());
        PathBuf::from(name)
    }
}

fn insert_before_extension(name: &str, aov: &str) -> String {
    match name.rfind('.') {
        Some(i) if i > 0 => format!("{}.{aov}{}", &name[..i], &name[i..]),
        _ => format!("{name}.{aov}"),
    }
}

/// Jobs of `frame`: shadows sorted by render frame, then the beauty pass.
///
/// `first_frame` is the first frame of the sequence: shadows rendered once
/// are generated there or at their own frame.
pub fn build_jobs(ctx: &RenderContext, scene: &Scene, naming: &Naming<'_>, frame: i64, first_frame: i64) -> Result<Vec<RenderJob>> {
    let camera = render_camera(ctx, scene)?;
    let mut jobs = Vec::new();

    if ctx.shadows.enabled {
        for entry in scene.walk() {
            let Some(Shape::Light(light)) = &entry.node.shape else {
                continue;
            };
            if !light.casts_depth_map() || !entry.inherited.visible {
                continue;
            }
            let s = &light.shadows;
            let render_frame = if s.every_frame { frame } else { s.render_at_frame };
            if !s.every_frame && frame != first_frame && render_frame != frame {
                continue;
            }
            let faces: &[Option<CubeFace>] = if light.kind == LightKind::Point {
                &[
                    Some(CubeFace::Px),
                    Some(CubeFace::Nx),
                    Some(CubeFace::Py),
                    Some(CubeFace::Ny),
                    Some(CubeFace::Pz),
                    Some(CubeFace::Nz),
                ]
            } else {
                &[None]
            };
            let resolution = if s.resolution > 0 { s.resolution } else { ctx.shadows.resolution };
            let shadow_naming = naming.shadow_naming();
            for &face in faces {
                let shadow = ShadowJob {
                    light: entry.path.clone(),
                    face,
                    deep: s.deep,
                    geometry_set: s.geometry_set.clone(),
                    pixel_samples: if s.deep && s.pixel_samples > 0 {
                        s.pixel_samples
                    } else {
                        ctx.shadows.pixel_samples
                    },
                    shading_rate: ctx.shadows.shading_rate * s.shading_rate_factor,
                    continuous_volume: s.continuous_volume,
                    view: ShadowView::of(light, face),
                };
                jobs.push(RenderJob {
                    pass: RenderPass::Shadow,
                    name: entry.node.name.clone(),
                    frame,
                    render_frame,
                    camera: camera.clone(),
                    image_name: shadow_name(&entry.node.name, s, &shadow_naming, frame, face),
                    rib_file: naming.shadow_rib(&entry.node.name, &shadow, render_frame),
                    width: resolution,
                    height: resolution,
                    aspect: 1.0,
                    format: if s.deep { "deepshad" } else { "shadow" }.into(),
                    image_mode: if s.deep { "deepopacity" } else { "z" }.into(),
                    shadow: Some(shadow),
                });
            }
        }
        jobs.sort_by_key(|j| j.render_frame);
    }

    let image = &ctx.image;
    let display = image.displays.first();
    jobs.push(RenderJob {
        pass: RenderPass::Final,
        name: crate::scene::short_name(&camera).to_string(),
        frame,
        render_frame: frame,
        image_name: naming.image_name(&camera, "", frame),
        rib_file: naming.beauty_rib(&camera, frame),
        camera,
        width: image.width,
        height: image.height,
        aspect: image.pixel_aspect,
        format: display.map(|d| d.ty.clone()).unwrap_or_else(|| "framebuffer".into()),
        image_mode: display.map(|d| d.mode.clone()).unwrap_or_else(|| "rgba".into()),
        shadow: None,
    });
    Ok(jobs)
}

/// Camera shape of a beauty job.
pub fn job_camera<'a>(job: &RenderJob, scene: &'a Scene) -> Result<&'a CameraShape> {
    scene.camera_shape(&job.camera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneNode, ShadowSettings};

    fn scene(kind: LightKind, deep: bool) -> Scene {
        let light = LightShape {
            kind,
            shadows: ShadowSettings {
                depth_map: true,
                deep,
                ..Default::default()
            },
            ..Default::default()
        };
        Scene {
            name: "shot".into(),
            camera: "|cam".into(),
            nodes: vec![
                SceneNode::with_shape("cam", Shape::Camera(CameraShape::default()))
                    .transformed(DMat4::from_translation(DVec3::new(0.0, 0.0, 10.0))),
                SceneNode::with_shape("key", Shape::Light(light))
                    .transformed(DMat4::from_translation(DVec3::new(1.0, 2.0, 3.0))),
            ],
            ..Default::default()
        }
    }

    fn jobs(scene: &Scene, ctx: &RenderContext, frame: i64) -> Vec<RenderJob> {
        let expand = ctx.expand_context(&scene.name, frame);
        let naming = Naming {
            ctx,
            scene: &scene.name,
            expand: &expand,
        };
        build_jobs(ctx, scene, &naming, frame, 1).unwrap()
    }

    #[test]
    fn test_spot_shadow_then_beauty() {
        let ctx = RenderContext::default();
        let jobs = jobs(&scene(LightKind::Spot, false), &ctx, 3);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].pass, RenderPass::Shadow);
        assert_eq!(jobs[0].rib_file, PathBuf::from("rib/shot_key_SHD.0003.rib"));
        assert_eq!(jobs[0].image_name, "rmantex/shot_key_SHD.0003.tex");
        assert_eq!(jobs[0].width, 512);
        assert_eq!(jobs[0].image_mode, "z");
        assert_eq!(jobs[1].pass, RenderPass::Final);
        assert_eq!(jobs[1].rib_file, PathBuf::from("rib/shot.0003.rib"));
        assert_eq!(jobs[1].image_name, "rmanpix/shot.0003.tif");
        assert_eq!(jobs[1].camera, "|cam");
    }

    #[test]
    fn test_point_light_six_faces() {
        let ctx = RenderContext::default();
        let jobs = jobs(&scene(LightKind::Point, true), &ctx, 1);
        assert_eq!(jobs.len(), 7);
        assert!(jobs[..6].iter().all(|j| j.is_deep_shadow() && j.format == "deepshad"));
        assert_eq!(jobs[0].rib_file, PathBuf::from("rib/shot_key_DSH_PX.0001.rib"));
        assert_eq!(jobs[5].image_name, "rmantex/shot_key_DSH_NZ.0001.tex");
        assert_eq!(jobs[0].shadow.as_ref().unwrap().view.fov, 90.0);
    }

    #[test]
    fn test_shadows_disabled() {
        let mut ctx = RenderContext::default();
        ctx.shadows.enabled = false;
        assert_eq!(jobs(&scene(LightKind::Spot, false), &ctx, 1).len(), 1);
    }

    #[test]
    fn test_single_frame_shadow() {
        let mut s = scene(LightKind::Spot, false);
        if let Some(Shape::Light(l)) = &mut s.nodes[1].shape {
            l.shadows.every_frame = false;
            l.shadows.render_at_frame = 5;
        }
        let ctx = RenderContext::default();
        let first = jobs(&s, &ctx, 1);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].render_frame, 5);
        assert_eq!(jobs(&s, &ctx, 2).len(), 1);
        assert_eq!(jobs(&s, &ctx, 5).len(), 2);
    }

    #[test]
    fn test_names_with_camera_and_patterns() {
        let mut ctx = RenderContext::default();
        ctx.output.camera_in_names = true;
        ctx.output.compress = true;
        ctx.output.project_dir = "/proj/".into();
        let jobs = jobs(&scene(LightKind::Ambient, false), &ctx, 12);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].rib_file, PathBuf::from("/proj/rib/shot_cam.0012.rib.gz"));
        assert_eq!(jobs[0].image_name, "/proj/rmanpix/shot.cam.0012.tif");

        ctx.output.image_name = "$SCN_beauty.#.exr".into();
        let s = scene(LightKind::Ambient, false);
        let expand = ctx.expand_context("shot", 12);
        let naming = Naming {
            ctx: &ctx,
            scene: "shot",
            expand: &expand,
        };
        assert_eq!(naming.image_name("|cam", "", 12), "/proj/rmanpix/shot_beauty.0012.exr");
        assert_eq!(naming.image_name("|cam", "spec", 12), "/proj/rmanpix/shot_beauty.0012.spec.exr");
        assert!(render_camera(&ctx, &s).is_ok());
    }

    #[test]
    fn test_missing_camera() {
        let mut s = scene(LightKind::Spot, false);
        s.camera.clear();
        assert!(matches!(render_camera(&RenderContext::default(), &s), Err(Error::InvalidConfig(_))));
        s.camera = "|key".into();
        assert!(render_camera(&RenderContext::default(), &s).is_err());
    }

    #[test]
    fn test_camera_matrices() {
        let ctx = RenderContext::default();
        let s = scene(LightKind::Point, false);
        let jobs = jobs(&s, &ctx, 1);
        // beauty camera at z=10 looking down -Z: the origin lands at +10 in front
        let m = jobs[6].camera_matrix(&s).unwrap();
        let p = m.transform_point3(DVec3::ZERO);
        assert!((p - DVec3::new(0.0, 0.0, 10.0)).length() < 1e-9);
        // +X face: a point along +X from the light is in front of the camera
        let m = jobs[0].camera_matrix(&s).unwrap();
        let p = m.transform_point3(DVec3::new(3.0, 2.0, 3.0));
        assert!((p - DVec3::new(0.0, 0.0, 2.0)).length() < 1e-9, "{p:?}");
    }
}
