//! RIB output of one render job.
//!
//! A [`JobWriter`] walks the blocks of a RIB file in order: prologue, frame
//! prologue (display and camera), world prologue, lights, coordinate systems,
//! objects, then closes the world and frame blocks. The file only becomes
//! visible once every block was written (see [`write_job`]).

use super::cancel::CancelToken;
use super::context::RenderContext;
use super::job::{job_camera, Naming, RenderJob, ShadowJob};
use super::sample::{write_shutter, SampleTimes};
use super::scan::FrameScene;
use crate::data::{ObjectType, RibData, RibGenLoader, WriteContext};
use crate::node::RibNode;
use crate::param::TypedParameter;
use crate::ri::{LightHandle, Ri, RibFile};
use crate::scene::{short_name, CameraShape, Scene, ShaderAssignment, TraceAttributes};
use crate::shader::{ShaderInfo, ShaderInstance};
use crate::util::{rib_matrix, DMat4, DVec3, Result, RtMatrix};
use std::collections::HashMap;
use std::path::PathBuf;

/// Shutter as a fraction of a frame: the globals' angle, else the camera's.
pub fn shutter_fraction(ctx: &RenderContext, camera: &CameraShape) -> f32 {
    ctx.motion.shutter_angle.unwrap_or(camera.shutter_angle) / 360.0
}

/// World to camera matrix of the camera at `path`, Z flipped.
fn view_matrix(scene: &Scene, path: &str) -> Result<DMat4> {
    let flip = DMat4::from_scale(DVec3::new(1.0, 1.0, -1.0));
    Ok((scene.world_matrix(path)? * flip).inverse())
}

/// `(2^bits - 1)` for quantize calls.
fn quantize_one(bits: u32) -> i32 {
    ((1u64 << bits.min(31)) - 1) as i32
}

/// `Option "searchpath" "dirmap"` value from `{{from to zone}} ...` text.
fn dirmap_option(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text
        .split(|c: char| c == '{' || c == '}' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    let maps: Vec<String> = tokens
        .chunks_exact(3)
        .map(|m| format!("[\"{}\" \"{}\" \"{}\"]", m[2], m[0], m[1]))
        .collect();
    (!maps.is_empty()).then(|| maps.join(" "))
}

/// Non-default ray tracing attributes.
fn write_trace_attributes(ri: &mut dyn Ri, trace: &TraceAttributes) -> Result<()> {
    let defaults = TraceAttributes::default();
    let mut params = Vec::new();
    if trace.sample_motion {
        params.push(TypedParameter::int("samplemotion", 1));
    }
    if trace.displacements {
        params.push(TypedParameter::int("displacements", 1));
    }
    if trace.bias != defaults.bias {
        params.push(TypedParameter::float("bias", trace.bias));
    }
    if trace.max_diffuse_depth != defaults.max_diffuse_depth {
        params.push(TypedParameter::int("maxdiffusedepth", trace.max_diffuse_depth));
    }
    if trace.max_specular_depth != defaults.max_specular_depth {
        params.push(TypedParameter::int("maxspeculardepth", trace.max_specular_depth));
    }
    if params.is_empty() {
        return Ok(());
    }
    ri.attribute("trace", &params)
}

fn identifier(ri: &mut dyn Ri, name: &str) -> Result<()> {
    ri.attribute("identifier", &[TypedParameter::text("name", name)])
}

/// Ancestor paths of `path`, root first: `|a|b|c` gives `|a`, `|a|b`.
fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('|')
        .filter(|(i, _)| *i > 0)
        .map(|(i, _)| &path[..i])
        .collect()
}

/// Inputs shared by every job of a run.
#[derive(Clone, Copy)]
pub struct WriteInputs<'a> {
    pub ctx: &'a RenderContext,
    pub naming: &'a Naming<'a>,
    pub loader: &'a dyn RibGenLoader,
    pub cancel: &'a CancelToken,
}

/// Writes one [`RenderJob`] from a scanned frame.
pub struct JobWriter<'a> {
    ctx: &'a RenderContext,
    naming: &'a Naming<'a>,
    loader: &'a dyn RibGenLoader,
    cancel: &'a CancelToken,
    job: &'a RenderJob,
    frame: &'a FrameScene,
    times: &'a SampleTimes,
    shutter: f32,
    camera_matrix: RtMatrix,
    /// Light handle and whether it is on by default, by path and short name.
    lights: HashMap<String, (LightHandle, bool)>,
}

impl<'a> JobWriter<'a> {
    pub fn new(inputs: WriteInputs<'a>, job: &'a RenderJob, frame: &'a FrameScene, times: &'a SampleTimes) -> Result<Self> {
        let scene = frame.scene()?;
        let camera = job_camera(job, scene)?;
        Ok(Self {
            ctx: inputs.ctx,
            naming: inputs.naming,
            loader: inputs.loader,
            cancel: inputs.cancel,
            job,
            frame,
            times,
            shutter: shutter_fraction(inputs.ctx, camera),
            camera_matrix: rib_matrix(&job.camera_matrix(scene)?),
            lights: HashMap::new(),
        })
    }

    /// Write the whole job to `ri`.
    pub fn write(&mut self, ri: &mut dyn Ri) -> Result<()> {
        let job = self.job;
        let _span = tracing::info_span!("job", pass = ?job.pass, name = %job.name, frame = job.render_frame).entered();
        self.cancel.check()?;
        self.prologue(ri)?;
        self.frame_prologue(ri)?;
        self.world_prologue(ri)?;
        self.light_block(ri)?;
        self.coordsys_block(ri)?;
        self.object_block(ri)?;
        ri.world_end()?;
        ri.frame_end()
    }

    fn is_motion_pass(&self) -> bool {
        !self.job.is_shadow() || self.job.is_deep_shadow()
    }

    fn write_context<'b>(&'b self, node: &'b RibNode) -> WriteContext<'b> {
        let m = &self.ctx.motion;
        WriteContext {
            frame: self.job.render_frame,
            pass: self.job.pass,
            sample_times: self.times.motion_times(m.relative),
            camera_matrix: self.camera_matrix,
            shutter_angle: self.shutter,
            transformation_blur: m.transformation_blur,
            deformation_blur: m.deformation_blur,
            compress: self.ctx.output.compress,
            object_name: &node.name,
            loader: self.loader,
        }
    }

    // ========================================================================
    // Prologue
    // ========================================================================

    fn prologue(&self, ri: &mut dyn Ri) -> Result<()> {
        let ctx = self.ctx;
        let job = self.job;
        let r = &ctx.render;
        let pass = match &job.shadow {
            Some(s) if s.deep => "deepshadow",
            Some(_) => "shadow",
            None => "beauty",
        };

        ri.comment(&format!(
            "Generated by liquid-rib v{} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("LIQUID_BUILD_DATE"),
            env!("LIQUID_BUILD_TIME")
        ))?;
        ri.comment(&format!("Scene : {}", self.naming.scene))?;
        ri.comment(&format!("Frame : {}", job.render_frame))?;
        ri.comment(&format!("Pass : {pass} {}", job.name))?;

        if r.statistics > 0 {
            ri.option("statistics", &[TypedParameter::int("endofframe", r.statistics)])?;
        }
        ri.option(
            "limits",
            &[
                TypedParameter::ints("bucketsize", &r.bucket_size),
                TypedParameter::int("gridsize", r.grid_size),
            ],
        )?;
        if r.texture_memory > 0 {
            ri.option("limits", &[TypedParameter::int("texturememory", r.texture_memory)])?;
        }
        ri.option(
            "limits",
            &[
                TypedParameter::color("othreshold", r.othreshold),
                TypedParameter::color("zthreshold", r.zthreshold),
            ],
        )?;

        if let Some(dirmap) = dirmap_option(&ctx.job.dirmaps) {
            ri.option("searchpath", &[TypedParameter::text("dirmap", dirmap)])?;
        }
        let search: Vec<TypedParameter> = [
            ("shader", &r.shader_path),
            ("texture", &r.texture_path),
            ("archive", &r.archive_path),
            ("procedural", &r.procedural_path),
        ]
        .into_iter()
        .filter(|(_, path)| !path.is_empty())
        .map(|(name, path)| TypedParameter::text(name, path.as_str()))
        .collect();
        if !search.is_empty() {
            ri.option("searchpath", &search)?;
        }

        match &job.shadow {
            Some(s) => {
                let ps = s.pixel_samples as f32;
                ri.pixel_samples(ps, ps)?;
                ri.shading_rate(s.shading_rate)?;
                ri.pixel_filter("box", 1.0, 1.0)?;
            }
            None => {
                let img = &ctx.image;
                ri.hider(&r.hider, &[])?;
                let ps = img.pixel_samples as f32;
                ri.pixel_samples(ps, ps)?;
                ri.shading_rate(img.shading_rate)?;
                ri.pixel_filter(&img.filter, img.filter_width[0], img.filter_width[1])?;
            }
        }
        ri.option("user", &[TypedParameter::text("pass", pass)])?;

        let t = &r.trace;
        if t.enabled {
            ri.comment("Ray Tracing : ON")?;
            ri.option(
                "trace",
                &[
                    TypedParameter::int("maxdepth", t.max_depth),
                    TypedParameter::float("specularthreshold", t.specular_threshold),
                    TypedParameter::int("continuationbydefault", t.continuation_by_default as i32),
                ],
            )?;
            ri.option("limits", &[TypedParameter::int("geocachememory", t.cache_memory)])?;
        } else {
            ri.comment("Ray Tracing : OFF")?;
            ri.option("trace", &[TypedParameter::int("maxdepth", 0)])?;
        }

        if !r.pre_frame_rib.is_empty() {
            ri.comment("Additional RIB:")?;
            ri.verbatim(&r.pre_frame_rib)?;
        }
        if ctx.does_motion() && ctx.motion.motion_factor > 0.0 {
            ri.geometric_approximation("motionfactor", ctx.motion.motion_factor)?;
        }
        Ok(())
    }

    // ========================================================================
    // Frame prologue
    // ========================================================================

    fn frame_prologue(&self, ri: &mut dyn Ri) -> Result<()> {
        let ctx = self.ctx;
        let job = self.job;
        ri.frame_begin(job.render_frame)?;
        ri.format(job.width, job.height, job.aspect)?;
        match &job.shadow {
            Some(s) => self.shadow_view(ri, s)?,
            None => self.beauty_view(ri)?,
        }
        let m = &ctx.motion;
        write_shutter(ri, job.render_frame, self.shutter, m.shutter, m.any(), m.relative)?;
        if !job.is_shadow() && !ctx.render.pre_frame_block_rib.is_empty() {
            ri.verbatim(&ctx.render.pre_frame_block_rib)?;
        }
        Ok(())
    }

    fn shadow_view(&self, ri: &mut dyn Ri, s: &ShadowJob) -> Result<()> {
        let job = self.job;
        if !s.deep || s.pixel_samples == 1 {
            ri.hider("hidden", &[TypedParameter::ints("jitter", &[0])])?;
        }
        if s.deep {
            ri.display("null", "null", "z", &[])?;
            let volume = if s.continuous_volume { "continuous" } else { "discrete" };
            ri.display(
                &format!("+{}", job.image_name),
                &job.format,
                &job.image_mode,
                &[TypedParameter::text("volumeinterpretation", volume)],
            )?;
        } else {
            ri.display(&job.image_name, &job.format, &job.image_mode, &[])?;
        }

        let v = &s.view;
        if v.orthographic {
            ri.projection("orthographic", &[])?;
            let half = v.ortho_width * 0.5;
            ri.screen_window(-half, half, -half, half)?;
        } else {
            ri.projection("perspective", &[TypedParameter::float("fov", v.fov)])?;
            ri.screen_window(-1.0, 1.0, -1.0, 1.0)?;
        }
        ri.clipping(v.near, v.far)?;
        self.camera_transform(ri)
    }

    fn beauty_view(&self, ri: &mut dyn Ri) -> Result<()> {
        let img = &self.ctx.image;
        let job = self.job;

        ri.shading_interpolation("smooth")?;
        if img.bits > 0 {
            let one = quantize_one(img.bits);
            ri.quantize("rgba", one, 0, one, img.dither)?;
        } else {
            ri.quantize("rgba", 0, 0, 0, 0.0)?;
        }
        if img.gain != 1.0 || img.gamma != 1.0 {
            ri.exposure(img.gain, img.gamma)?;
        }
        if img.is_cropped() {
            let [x0, x1, y0, y1] = img.crop;
            ri.crop_window(x0, x1, y0, y1)?;
        }

        if !img.channels.is_empty() {
            ri.comment("Display Channels:")?;
            for c in &img.channels {
                let mut params = Vec::new();
                if let Some(bits) = c.bits {
                    let one = quantize_one(bits);
                    params.push(TypedParameter::ints("quantize", &[0, one, 0, one]));
                }
                if let Some(dither) = c.dither {
                    params.push(TypedParameter::float("dither", dither));
                }
                if let Some(filter) = &c.filter {
                    params.push(TypedParameter::text("filter", filter.as_str()));
                }
                if let Some(width) = c.filter_width {
                    params.push(TypedParameter::float_array("filterwidth", &width));
                }
                ri.display_channel(&c.declaration(), &params)?;
            }
        }

        ri.comment("Display Drivers:")?;
        for (i, d) in img.displays.iter().enumerate() {
            if i == 0 {
                ri.display(&job.image_name, &d.ty, &d.mode, &[])?;
                continue;
            }
            let aov = if d.name.is_empty() { &d.mode } else { &d.name };
            let name = format!("+{}", self.naming.image_name(&job.camera, aov, job.frame));
            let mut params = Vec::new();
            if d.bits > 0 {
                let one = quantize_one(d.bits) as f32;
                params.push(TypedParameter::float_array("quantize", &[0.0, one, 0.0, one]));
                params.push(TypedParameter::float("dither", d.dither));
            }
            ri.display(&name, &d.ty, &d.mode, &params)?;
        }

        let scene = self.frame.scene()?;
        let cam = job_camera(job, scene)?;
        self.projection(ri, cam)?;

        if let Some([left, right]) = &cam.stereo {
            ri.transform_begin()?;
            ri.transform(&rib_matrix(&view_matrix(scene, right)?))?;
            ri.camera("right", &[])?;
            ri.transform_end()?;
            ri.transform(&rib_matrix(&view_matrix(scene, left)?))?;
            return ri.camera("left", &[]);
        }
        self.camera_transform(ri)
    }

    /// Projection, screen window, clipping and depth of field of `cam`.
    fn projection(&self, ri: &mut dyn Ri, cam: &CameraShape) -> Result<()> {
        let job = self.job;
        let ratio = job.width as f32 * job.aspect / job.height as f32;
        let [ox, oy] = cam.film_offset;

        if cam.orthographic {
            ri.projection("orthographic", &[])?;
            let half = cam.ortho_width * 0.5;
            ri.screen_window(-half + ox, half + ox, -half / ratio + oy, half / ratio + oy)?;
        } else {
            // RenderMan's fov spans the smaller image dimension
            let fov = if ratio >= 1.0 {
                2.0 * ((cam.fov.to_radians() * 0.5).tan() / ratio).atan().to_degrees()
            } else {
                cam.fov
            };
            ri.projection("perspective", &[TypedParameter::float("fov", fov)])?;
            let (x, y) = if ratio >= 1.0 { (ratio, 1.0) } else { (1.0, 1.0 / ratio) };
            ri.screen_window(-x + ox, x + ox, -y + oy, y + oy)?;
        }
        ri.clipping(cam.near, cam.far)?;
        if cam.dof {
            ri.depth_of_field(cam.fstop, cam.focal_length, cam.focus_distance)?;
        }
        Ok(())
    }

    fn camera_transform(&self, ri: &mut dyn Ri) -> Result<()> {
        let m = &self.ctx.motion;
        let blur = m.camera_blur && self.times.len() > 1 && self.frame.scenes.len() == self.times.len() && self.is_motion_pass();
        if !blur {
            return ri.transform(&self.camera_matrix);
        }
        ri.motion_begin(self.times.motion_times(m.relative))?;
        for scene in &self.frame.scenes {
            ri.transform(&rib_matrix(&self.job.camera_matrix(scene)?))?;
        }
        ri.motion_end()
    }

    // ========================================================================
    // World prologue
    // ========================================================================

    fn world_prologue(&self, ri: &mut dyn Ri) -> Result<()> {
        let r = &self.ctx.render;
        if !r.pre_world_rib.is_empty() {
            ri.verbatim(&r.pre_world_rib)?;
        }

        // clip planes live in camera space, before the world block
        let planes = self
            .frame
            .table
            .coordinate_systems()
            .filter(|n| n.object_type == ObjectType::ClipPlane && n.is_renderable());
        for node in planes {
            let Some(obj) = node.object(0) else {
                continue;
            };
            let Some(data) = obj.data() else {
                continue;
            };
            ri.transform_begin()?;
            if self.ctx.output.comments {
                ri.comment(&format!("Clipping plane: {}", node.name))?;
            }
            ri.concat_transform(&rib_matrix(&obj.matrix()))?;
            data.write(ri, &self.write_context(node))?;
            ri.transform_end()?;
        }

        ri.world_begin()?;
        if r.trace.enabled && !self.job.is_shadow() {
            ri.attribute(
                "visibility",
                &[
                    TypedParameter::int("diffuse", 1),
                    TypedParameter::int("specular", 1),
                    TypedParameter::int("transmission", 1),
                ],
            )?;
        }
        if !r.post_world_rib.is_empty() {
            ri.verbatim(&r.post_world_rib)?;
        }

        ri.transform_begin()?;
        ri.coordinate_system("worldspace")?;
        ri.transform_end()?;
        ri.transform_begin()?;
        ri.rotate(-90.0, 1.0, 0.0, 0.0)?;
        ri.coordinate_system("_environment")?;
        ri.transform_end()?;
        ri.reverse_orientation()
    }

    // ========================================================================
    // Lights and coordinate systems
    // ========================================================================

    fn light_block(&mut self, ri: &mut dyn Ri) -> Result<()> {
        let job = self.job;
        if job.is_shadow() && !(job.is_deep_shadow() && self.ctx.shadows.lights_in_deep_shadows) {
            return Ok(());
        }
        let by_default = self.ctx.light_linking.illuminate_by_default;
        let frame = self.frame;

        for node in frame.table.lights() {
            self.cancel.check()?;
            if !node.is_renderable() {
                continue;
            }
            let Some(light) = node.object(0).and_then(|o| o.data()).and_then(RibData::as_light) else {
                continue;
            };
            ri.attribute_begin()?;
            identifier(ri, &node.name)?;
            write_trace_attributes(ri, &node.attributes.trace)?;
            let handle = light.write(ri, &self.write_context(node))?;
            ri.attribute_end()?;

            if let Some(handle) = handle {
                let on = by_default && light.illuminates_by_default;
                ri.illuminate(handle, on)?;
                self.lights.insert(node.path.clone(), (handle, on));
                self.lights.insert(node.name.clone(), (handle, on));
            }
        }
        Ok(())
    }

    fn coordsys_block(&self, ri: &mut dyn Ri) -> Result<()> {
        let systems = self
            .frame
            .table
            .coordinate_systems()
            .filter(|n| n.object_type == ObjectType::CoordSys && n.is_renderable());
        for node in systems {
            self.cancel.check()?;
            let Some(obj) = node.object(0) else {
                continue;
            };
            let Some(data) = obj.data() else {
                continue;
            };
            if self.ctx.output.comments {
                ri.comment(&format!("Name: {}", node.name))?;
            }
            ri.attribute_begin()?;
            identifier(ri, &node.name)?;
            self.place(ri, &rib_matrix(&obj.matrix()))?;
            data.write(ri, &self.write_context(node))?;
            ri.attribute_end()?;
        }
        Ok(())
    }

    // ========================================================================
    // Objects
    // ========================================================================

    fn is_written(&self, node: &RibNode) -> bool {
        match &self.job.shadow {
            None => node.is_renderable(),
            Some(s) => node.is_shadow_caster(&s.geometry_set),
        }
    }

    fn object_block(&self, ri: &mut dyn Ri) -> Result<()> {
        let mut open: Vec<String> = Vec::new();
        for node in self.frame.table.objects() {
            self.cancel.check()?;
            if !self.is_written(node) {
                continue;
            }
            let Some(data) = node.object(0).and_then(|o| o.data()) else {
                continue;
            };
            if self.ctx.output.full_hierarchy {
                enter_hierarchy(ri, &mut open, &node.path)?;
            }
            self.write_object(ri, node, data)?;
        }
        for _ in open.drain(..) {
            ri.attribute_end()?;
        }
        Ok(())
    }

    fn write_object(&self, ri: &mut dyn Ri, node: &RibNode, data: &RibData) -> Result<()> {
        let ctx = self.ctx;
        let job = self.job;
        let attrs = &node.attributes;
        let shadow = job.is_shadow();

        if ctx.output.comments {
            ri.comment(&format!("Name: {}", node.path))?;
        }
        ri.attribute_begin()?;
        identifier(ri, &node.name)?;
        if !node.grouping.is_empty() {
            ri.attribute("grouping", &[TypedParameter::text("membership", node.grouping.as_str())])?;
        }
        if attrs.matte {
            ri.matte(true)?;
        }
        if !attrs.double_sided {
            ri.sides(1)?;
        }
        if attrs.reverse_orientation {
            ri.reverse_orientation()?;
        }

        let lights_written = !shadow || (job.is_deep_shadow() && ctx.shadows.lights_in_deep_shadows);
        if ctx.light_linking.enabled && lights_written {
            for link in &node.light_links {
                match self.lights.get(link) {
                    Some(&(handle, on)) => ri.illuminate(handle, !on)?,
                    None => tracing::debug!(object = %node.path, light = %link, "linked light not in this job"),
                }
            }
        }

        self.write_transform(ri, node)?;
        if !shadow {
            self.write_shading(ri, node)?;
        }
        self.write_shaders(ri, node, data)?;

        if !attrs.rib_box.is_empty() {
            ri.comment("RIB Box:")?;
            ri.verbatim(&attrs.rib_box)?;
        }
        if !attrs.read_archive.is_empty() {
            let expand = self.naming.expand.at_frame(job.frame).with_object(&node.name, &node.path);
            ri.read_archive(&expand.expand(&attrs.read_archive))?;
        }
        ri.attribute("user", &[TypedParameter::int("receivesShadows", node.flags.receive_shadow as i32)])?;

        if !node.flags.ignore_shapes {
            if node.object_type.is_bspline_curves() {
                ri.basis("b-spline", 1, "b-spline", 1)?;
            }
            self.write_geometry(ri, node, data)?;
        }
        ri.attribute_end()
    }

    /// `Transform`, or `ConcatTransform` when writing relative transforms.
    fn place(&self, ri: &mut dyn Ri, m: &RtMatrix) -> Result<()> {
        if self.ctx.output.relative_transforms {
            ri.concat_transform(m)
        } else {
            ri.transform(m)
        }
    }

    fn write_transform(&self, ri: &mut dyn Ri, node: &RibNode) -> Result<()> {
        let m = &self.ctx.motion;
        let enabled = m.transformation_blur && node.sample_count() == self.times.len() && self.is_motion_pass();
        if !node.transform_motion(enabled) {
            let world = node.object(0).map(|o| o.matrix()).unwrap_or(DMat4::IDENTITY);
            return self.place(ri, &rib_matrix(&world));
        }
        ri.motion_begin(self.times.motion_times(m.relative))?;
        for obj in node.objects() {
            self.place(ri, &rib_matrix(&obj.matrix()))?;
        }
        ri.motion_end()
    }

    fn write_shading(&self, ri: &mut dyn Ri, node: &RibNode) -> Result<()> {
        let attrs = &node.attributes;
        if let Some(rate) = attrs.shading_rate {
            ri.shading_rate(rate)?;
        }
        write_trace_attributes(ri, &attrs.trace)?;
        if !attrs.primary_visibility {
            ri.attribute("visibility", &[TypedParameter::int("camera", 0)])?;
        }
        if self.ctx.render.trace.enabled {
            let t = &attrs.trace;
            ri.attribute(
                "visibility",
                &[
                    TypedParameter::int("diffuse", t.visible_diffuse as i32),
                    TypedParameter::int("specular", t.visible_specular as i32),
                    TypedParameter::int("transmission", t.visible_transmission as i32),
                ],
            )?;
        }
        if node.motion.factor != 1.0 {
            ri.geometric_approximation("motionfactor", node.motion.factor)?;
        }
        Ok(())
    }

    /// Validated shader of an assignment; `None` when the library lacks it.
    fn shader_info(&self, node: &RibNode, assignment: &ShaderAssignment) -> Result<Option<ShaderInfo>> {
        let scene = self.frame.scene()?;
        match scene.shaders.get(&assignment.name) {
            Some(query) => ShaderInfo::from_query(query).map(Some),
            None => {
                tracing::warn!(object = %node.path, shader = %assignment.name, "shader not found");
                Ok(None)
            }
        }
    }

    fn write_shaders(&self, ri: &mut dyn Ri, node: &RibNode, data: &RibData) -> Result<()> {
        let attrs = &node.attributes;
        let slots = &attrs.shaders;
        let shadow = self.job.is_shadow();

        if !shadow {
            if let Some(volume) = &slots.volume {
                if let Some(info) = self.shader_info(node, volume)? {
                    ShaderInstance::new(&info, &volume.overrides).write(ri)?;
                }
            }
            if let Some(rib) = &slots.rib_box {
                ri.verbatim(rib)?;
            } else {
                let surface = match &slots.surface {
                    Some(a) => self.shader_info(node, a)?.map(|info| (info, a)),
                    None => None,
                };
                match surface {
                    Some((info, a)) => {
                        ShaderInstance::new(&info, &a.overrides).write(ri)?;
                    }
                    None => self.default_surface(ri, node, data)?,
                }
            }
        } else {
            let surface = match &slots.surface {
                Some(a) => self.shader_info(node, a)?.map(|info| (info, a)),
                None => None,
            };
            match surface {
                Some((info, a)) if info.output_in_shadow => {
                    ShaderInstance::new(&info, &a.overrides).write(ri)?;
                }
                _ if self.job.is_deep_shadow() => {
                    // deep maps keep the primitive's color and opacity
                    if let Some(c) = attrs.color {
                        ri.color(c)?;
                    }
                    if let Some(o) = attrs.opacity {
                        ri.opacity(o)?;
                    }
                }
                _ => ri.surface("null", &[])?,
            }
        }

        if let Some(a) = &slots.displacement {
            if let Some(info) = self.shader_info(node, a)? {
                if !shadow || info.output_in_shadow {
                    ShaderInstance::new(&info, &a.overrides).write(ri)?;
                }
            }
        }
        Ok(())
    }

    /// Surface of objects without a shader assignment.
    fn default_surface(&self, ri: &mut dyn Ri, node: &RibNode, data: &RibData) -> Result<()> {
        let attrs = &node.attributes;
        if let Some(c) = attrs.color {
            ri.color(c)?;
        }
        if let Some(o) = attrs.opacity {
            ri.opacity(o)?;
        }
        match data {
            RibData::PfxHair(h) => ri.surface(
                "liquidpfxhair",
                &[
                    TypedParameter::float("specularpower", h.shading.specular_power),
                    TypedParameter::float("translucence", h.shading.translucence),
                    TypedParameter::color("specularcolor", h.shading.specular_color),
                ],
            ),
            RibData::PfxToon(_) => ri.surface("liquidpfxtoon", &[]),
            RibData::Pfx(_) => ri.surface("liquidpfx", &[]),
            _ => ri.surface("plastic", &[]),
        }
    }

    /// Primitive, in a motion block per grain when the body is animated.
    fn write_geometry(&self, ri: &mut dyn Ri, node: &RibNode, data: &RibData) -> Result<()> {
        let wctx = self.write_context(node);
        let m = &self.ctx.motion;
        let enabled = m.deformation_blur && node.sample_count() == self.times.len() && self.is_motion_pass();
        if !node.deformation_motion(enabled) {
            data.write(ri, &wctx)?;
            return Ok(());
        }

        let samples: Vec<&RibData> = node.objects().iter().filter_map(|o| o.data()).collect();
        if samples.len() != node.sample_count() {
            data.write(ri, &wctx)?;
            return Ok(());
        }
        let mut grain = 0;
        loop {
            let more = if data.is_next_grain_animated(grain) {
                ri.motion_begin(self.times.motion_times(m.relative))?;
                let mut more = false;
                for sample in &samples {
                    more = sample.write_next_grain(ri, &wctx, grain)?;
                }
                ri.motion_end()?;
                more
            } else {
                data.write_next_grain(ri, &wctx, grain)?
            };
            if !more {
                return Ok(());
            }
            grain += 1;
        }
    }
}

/// Close the attribute blocks of ancestors `path` does not share with the
/// previous object, then open its own.
fn enter_hierarchy(ri: &mut dyn Ri, open: &mut Vec<String>, path: &str) -> Result<()> {
    let ancestors = ancestors(path);
    let keep = open
        .iter()
        .zip(&ancestors)
        .take_while(|(a, b)| a.as_str() == **b)
        .count();
    while open.len() > keep {
        open.pop();
        ri.attribute_end()?;
    }
    for a in &ancestors[keep..] {
        ri.attribute_begin()?;
        identifier(ri, short_name(a))?;
        open.push(a.to_string());
    }
    Ok(())
}

/// Write `job` to its RIB file and commit it.
pub fn write_job(inputs: WriteInputs<'_>, job: &RenderJob, frame: &FrameScene, times: &SampleTimes) -> Result<PathBuf> {
    let mut writer = JobWriter::new(inputs, job, frame, times)?;
    let mut file = RibFile::create(&job.rib_file, inputs.ctx.output.compress)?;
    writer.write(&mut *file)?;
    let path = file.finish()?;
    tracing::info!(rib = %path.display(), "RIB written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GeneratorRegistry;
    use crate::ri::RibWriter;
    use crate::scene::{CameraShape, LightKind, LightShape, Mesh, SceneNode, ShadowSettings, Shape};
    use crate::translator::job::build_jobs;
    use crate::translator::scan::{scan, ScanInputs};
    use crate::util::Vec3;

    fn cube() -> Mesh {
        Mesh {
            points: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            face_counts: vec![4],
            face_vertices: vec![0, 1, 2, 3],
            ..Default::default()
        }
    }

    fn scene(shadows: bool) -> Scene {
        let light = LightShape {
            kind: LightKind::Spot,
            shadows: ShadowSettings {
                depth_map: shadows,
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
                SceneNode::with_shape("key", Shape::Light(light)),
                SceneNode::with_shape("box", Shape::Mesh(cube())),
            ],
            ..Default::default()
        }
    }

    /// Every job of frame 1 rendered to text.
    fn render(scene: &Scene, ctx: &RenderContext) -> Vec<String> {
        let expand = ctx.expand_context(&scene.name, 1);
        let naming = Naming {
            ctx,
            scene: &scene.name,
            expand: &expand,
        };
        let shadow_naming = naming.shadow_naming();
        let cancel = CancelToken::new();
        let loader = GeneratorRegistry::default();
        let cam = scene.camera_shape(&scene.camera).unwrap();
        let times = SampleTimes::compute(
            1,
            ctx.motion.samples,
            shutter_fraction(ctx, cam),
            ctx.motion.blur_time,
            ctx.motion.shutter,
            ctx.does_motion(),
        );
        let frame = scan(
            scene,
            &times,
            1,
            &ScanInputs {
                ctx,
                naming: &shadow_naming,
                expand: &expand,
                cancel: &cancel,
            },
        )
        .unwrap();
        let inputs = WriteInputs {
            ctx,
            naming: &naming,
            loader: &loader,
            cancel: &cancel,
        };
        build_jobs(ctx, scene, &naming, 1, 1)
            .unwrap()
            .iter()
            .map(|job| {
                let mut w = RibWriter::new(Vec::new());
                JobWriter::new(inputs, job, &frame, &times).unwrap().write(&mut w).unwrap();
                String::from_utf8(w.into_inner().unwrap()).unwrap()
            })
            .collect()
    }

    fn count(rib: &str, keyword: &str) -> usize {
        rib.lines().filter(|l| l.trim_start().starts_with(keyword)).count()
    }

    #[test]
    fn test_static_beauty() {
        let ribs = render(&scene(false), &RenderContext::default());
        assert_eq!(ribs.len(), 1);
        let rib = &ribs[0];
        assert_eq!(count(rib, "WorldBegin"), 1);
        assert_eq!(count(rib, "WorldEnd"), 1);
        assert_eq!(count(rib, "LightSource \"liquidspot\" 1"), 1);
        assert_eq!(count(rib, "Illuminate 1 1"), 1);
        assert_eq!(count(rib, "PointsGeneralPolygons"), 1);
        assert_eq!(count(rib, "MotionBegin"), 0);
        assert!(rib.contains("Format 640 480 1"));
        assert!(rib.contains("Display \"rmanpix/shot.0001.tif\" \"framebuffer\" \"rgba\""));
        assert!(rib.contains("Surface \"plastic\""));
        assert!(rib.contains("# Name: |box"));
        assert!(rib.contains("Option \"user\" \"string pass\" [\"beauty\"]"));
        assert!(rib.starts_with("# Generated by liquid-rib"));
    }

    #[test]
    fn test_transform_motion() {
        let mut ctx = RenderContext::default();
        ctx.motion.transformation_blur = true;
        let ribs = render(&scene(false), &ctx);
        let rib = &ribs[0];
        // 144 degree camera shutter: 0.4 of a frame
        assert_eq!(count(rib, "MotionBegin [1 1.4]"), 1);
        assert_eq!(count(rib, "PointsGeneralPolygons"), 1);
        let lines: Vec<&str> = rib.lines().map(str::trim_start).collect();
        let begin = lines.iter().position(|l| l.starts_with("MotionBegin")).unwrap();
        assert!(lines[begin + 1].starts_with("Transform"));
        assert!(lines[begin + 2].starts_with("Transform"));
        assert_eq!(lines[begin + 3], "MotionEnd");
        assert!(rib.contains("Shutter 1 1.4"));
    }

    #[test]
    fn test_relative_transforms() {
        let mut ctx = RenderContext::default();
        ctx.output.relative_transforms = true;
        let rib = &render(&scene(false), &ctx)[0];
        let lines: Vec<&str> = rib.lines().map(str::trim_start).collect();
        let geometry = lines.iter().position(|l| l.starts_with("PointsGeneralPolygons")).unwrap();
        assert!(lines[..geometry].iter().rev().any(|l| l.starts_with("ConcatTransform [")));
        let placed = lines[..geometry].iter().rposition(|l| l.starts_with("AttributeBegin")).unwrap();
        assert!(!lines[placed..geometry].iter().any(|l| l.starts_with("Transform [")));

        ctx.motion.transformation_blur = true;
        let rib = &render(&scene(false), &ctx)[0];
        let lines: Vec<&str> = rib.lines().map(str::trim_start).collect();
        let begin = lines.iter().position(|l| l.starts_with("MotionBegin")).unwrap();
        assert!(lines[begin + 1].starts_with("ConcatTransform ["));
        assert!(lines[begin + 2].starts_with("ConcatTransform ["));
        assert_eq!(lines[begin + 3], "MotionEnd");
    }

    #[test]
    fn test_shadow_pass() {
        let ribs = render(&scene(true), &RenderContext::default());
        assert_eq!(ribs.len(), 2);
        let shadow = &ribs[0];
        assert!(shadow.contains("Display \"rmantex/shot_key_SHD.0001.tex\" \"shadow\" \"z\""));
        assert!(shadow.contains("Surface \"null\""));
        assert!(shadow.contains("Projection \"perspective\""));
        assert!(shadow.contains("PixelFilter \"box\" 1 1"));
        assert_eq!(count(shadow, "LightSource"), 0);
        assert_eq!(count(shadow, "PointsGeneralPolygons"), 1);
        assert!(ribs[1].contains("\"string shadowname\" [\"rmantex/shot_key_SHD.0001.tex\"]"));
    }

    #[test]
    fn test_hidden_object_skipped() {
        let mut s = scene(false);
        s.nodes[2].visible = false;
        let ribs = render(&s, &RenderContext::default());
        assert_eq!(count(&ribs[0], "PointsGeneralPolygons"), 0);
    }

    #[test]
    fn test_full_hierarchy_blocks() {
        let mut s = scene(false);
        let group = SceneNode {
            name: "grp".into(),
            ..Default::default()
        }
        .child(SceneNode::with_shape("a", Shape::Mesh(cube())))
        .child(SceneNode::with_shape("b", Shape::Mesh(cube())));
        s.nodes.push(group);
        let mut ctx = RenderContext::default();
        ctx.output.full_hierarchy = true;
        let rib = &render(&s, &ctx)[0];
        assert_eq!(count(rib, "Attribute \"identifier\" \"string name\" [\"grp\"]"), 1);
        assert_eq!(count(rib, "AttributeBegin"), count(rib, "AttributeEnd"));
    }

    #[test]
    fn test_light_linking_toggles() {
        let mut s = scene(false);
        s.nodes[2].attributes.light_links = vec!["key".into()];
        let mut ctx = RenderContext::default();
        ctx.light_linking.enabled = true;
        let rib = &render(&s, &ctx)[0];
        assert_eq!(count(rib, "Illuminate 1 1"), 1);
        assert_eq!(count(rib, "Illuminate 1 0"), 1);
    }

    #[test]
    fn test_helpers() {
        assert_eq!(ancestors("|a|b|c"), vec!["|a", "|a|b"]);
        assert!(ancestors("|a").is_empty());
        assert_eq!(quantize_one(8), 255);
        assert_eq!(
            dirmap_option("{{/mnt/a /net/a UNC}} {{/x /y NFS}}").as_deref(),
            Some("[\"UNC\" \"/mnt/a\" \"/net/a\"] [\"NFS\" \"/x\" \"/y\"]")
        );
        assert_eq!(dirmap_option(""), None);
    }
}
