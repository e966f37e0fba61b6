//! ASCII RIB encoder.

use super::{fmt_float, fmt_float_array, fmt_int_array, fmt_params, fmt_string, fmt_string_array};
use super::{ArchiveKind, LightHandle, Ri};
use crate::param::TypedParameter;
use crate::util::{Result, RtMatrix};
use std::io::Write;

/// Writes RI calls as ASCII RIB, one statement per line, indented by block depth.
pub struct RibWriter<W: Write> {
    out: W,
    depth: usize,
    next_light: LightHandle,
    line: String,
}

impl<W: Write> RibWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            depth: 0,
            next_light: 1,
            line: String::with_capacity(256),
        }
    }

    /// Current block nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn start(&mut self, keyword: &str) {
        self.line.clear();
        for _ in 0..self.depth {
            self.line.push_str("  ");
        }
        self.line.push_str(keyword);
    }

    fn sp(&mut self) -> &mut String {
        self.line.push(' ');
        &mut self.line
    }

    fn float(&mut self, v: f32) {
        self.line.push(' ');
        fmt_float(&mut self.line, v);
    }

    fn string(&mut self, s: &str) {
        self.line.push(' ');
        fmt_string(&mut self.line, s);
    }

    fn params(&mut self, params: &[TypedParameter]) {
        fmt_params(&mut self.line, params);
    }

    fn emit(&mut self) -> Result<()> {
        self.line.push('\n');
        self.out.write_all(self.line.as_bytes())?;
        Ok(())
    }

    fn simple(&mut self, keyword: &str) -> Result<()> {
        self.start(keyword);
        self.emit()
    }

    fn open(&mut self, keyword: &str) -> Result<()> {
        self.simple(keyword)?;
        self.depth += 1;
        Ok(())
    }

    fn close(&mut self, keyword: &str) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.simple(keyword)
    }

    fn named(&mut self, keyword: &str, name: &str, params: &[TypedParameter]) -> Result<()> {
        self.start(keyword);
        self.string(name);
        self.params(params);
        self.emit()
    }

    fn floats(&mut self, keyword: &str, values: &[f32]) -> Result<()> {
        self.start(keyword);
        for v in values {
            self.float(*v);
        }
        self.emit()
    }

    fn light(&mut self, keyword: &str, name: &str, params: &[TypedParameter]) -> Result<LightHandle> {
        let handle = self.next_light;
        self.next_light += 1;
        self.start(keyword);
        self.string(name);
        use std::fmt::Write as _;
        let _ = write!(self.sp(), "{handle}");
        self.params(params);
        self.emit()?;
        Ok(handle)
    }
}

impl<W: Write> Ri for RibWriter<W> {
    fn frame_begin(&mut self, frame: i64) -> Result<()> {
        self.start("FrameBegin");
        self.sp().push_str(&frame.to_string());
        self.emit()?;
        self.depth += 1;
        Ok(())
    }

    fn frame_end(&mut self) -> Result<()> {
        self.close("FrameEnd")
    }

    fn world_begin(&mut self) -> Result<()> {
        self.open("WorldBegin")
    }

    fn world_end(&mut self) -> Result<()> {
        self.close("WorldEnd")
    }

    fn attribute_begin(&mut self) -> Result<()> {
        self.open("AttributeBegin")
    }

    fn attribute_end(&mut self) -> Result<()> {
        self.close("AttributeEnd")
    }

    fn transform_begin(&mut self) -> Result<()> {
        self.open("TransformBegin")
    }

    fn transform_end(&mut self) -> Result<()> {
        self.close("TransformEnd")
    }

    fn motion_begin(&mut self, times: &[f32]) -> Result<()> {
        self.start("MotionBegin");
        self.line.push(' ');
        fmt_float_array(&mut self.line, times);
        self.emit()?;
        self.depth += 1;
        Ok(())
    }

    fn motion_end(&mut self) -> Result<()> {
        self.close("MotionEnd")
    }

    fn option(&mut self, name: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("Option", name, params)
    }

    fn attribute(&mut self, name: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("Attribute", name, params)
    }

    fn declare(&mut self, name: &str, declaration: &str) -> Result<()> {
        self.start("Declare");
        self.string(name);
        self.string(declaration);
        self.emit()
    }

    fn transform(&mut self, m: &RtMatrix) -> Result<()> {
        self.start("Transform ");
        fmt_float_array(&mut self.line, m);
        self.emit()
    }

    fn concat_transform(&mut self, m: &RtMatrix) -> Result<()> {
        self.start("ConcatTransform ");
        fmt_float_array(&mut self.line, m);
        self.emit()
    }

    fn identity(&mut self) -> Result<()> {
        self.simple("Identity")
    }

    fn translate(&mut self, x: f32, y: f32, z: f32) -> Result<()> {
        self.floats("Translate", &[x, y, z])
    }

    fn rotate(&mut self, angle: f32, x: f32, y: f32, z: f32) -> Result<()> {
        self.floats("Rotate", &[angle, x, y, z])
    }

    fn scale(&mut self, x: f32, y: f32, z: f32) -> Result<()> {
        self.floats("Scale", &[x, y, z])
    }

    fn format(&mut self, width: u32, height: u32, aspect: f32) -> Result<()> {
        self.start("Format");
        use std::fmt::Write as _;
        let _ = write!(self.sp(), "{width} {height}");
        self.float(aspect);
        self.emit()
    }

    fn projection(&mut self, name: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("Projection", name, params)
    }

    fn screen_window(&mut self, left: f32, right: f32, bottom: f32, top: f32) -> Result<()> {
        self.floats("ScreenWindow", &[left, right, bottom, top])
    }

    fn crop_window(&mut self, xmin: f32, xmax: f32, ymin: f32, ymax: f32) -> Result<()> {
        self.floats("CropWindow", &[xmin, xmax, ymin, ymax])
    }

    fn clipping(&mut self, near: f32, far: f32) -> Result<()> {
        self.floats("Clipping", &[near, far])
    }

    fn depth_of_field(&mut self, fstop: f32, focal_length: f32, focal_distance: f32) -> Result<()> {
        self.floats("DepthOfField", &[fstop, focal_length, focal_distance])
    }

    fn shutter(&mut self, open: f32, close: f32) -> Result<()> {
        self.floats("Shutter", &[open, close])
    }

    fn camera(&mut self, name: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("Camera", name, params)
    }

    fn display(&mut self, name: &str, ty: &str, mode: &str, params: &[TypedParameter]) -> Result<()> {
        self.start("Display");
        self.string(name);
        self.string(ty);
        self.string(mode);
        self.params(params);
        self.emit()
    }

    fn display_channel(&mut self, declaration: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("DisplayChannel", declaration, params)
    }

    fn hider(&mut self, name: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("Hider", name, params)
    }

    fn quantize(&mut self, ty: &str, one: i32, min: i32, max: i32, dither: f32) -> Result<()> {
        self.start("Quantize");
        self.string(ty);
        use std::fmt::Write as _;
        let _ = write!(self.sp(), "{one} {min} {max}");
        self.float(dither);
        self.emit()
    }

    fn exposure(&mut self, gain: f32, gamma: f32) -> Result<()> {
        self.floats("Exposure", &[gain, gamma])
    }

    fn shading_interpolation(&mut self, ty: &str) -> Result<()> {
        self.start("ShadingInterpolation");
        self.string(ty);
        self.emit()
    }

    fn pixel_samples(&mut self, x: f32, y: f32) -> Result<()> {
        self.floats("PixelSamples", &[x, y])
    }

    fn pixel_filter(&mut self, name: &str, xwidth: f32, ywidth: f32) -> Result<()> {
        self.start("PixelFilter");
        self.string(name);
        self.float(xwidth);
        self.float(ywidth);
        self.emit()
    }

    fn shading_rate(&mut self, rate: f32) -> Result<()> {
        self.floats("ShadingRate", &[rate])
    }

    fn surface(&mut self, name: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("Surface", name, params)
    }

    fn displacement(&mut self, name: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("Displacement", name, params)
    }

    fn atmosphere(&mut self, name: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("Atmosphere", name, params)
    }

    fn light_source(&mut self, name: &str, params: &[TypedParameter]) -> Result<LightHandle> {
        self.light("LightSource", name, params)
    }

    fn area_light_source(&mut self, name: &str, params: &[TypedParameter]) -> Result<LightHandle> {
        self.light("AreaLightSource", name, params)
    }

    fn illuminate(&mut self, light: LightHandle, on: bool) -> Result<()> {
        self.start("Illuminate");
        use std::fmt::Write as _;
        let _ = write!(self.sp(), "{light} {}", on as i32);
        self.emit()
    }

    fn color(&mut self, rgb: [f32; 3]) -> Result<()> {
        self.start("Color ");
        fmt_float_array(&mut self.line, &rgb);
        self.emit()
    }

    fn opacity(&mut self, rgb: [f32; 3]) -> Result<()> {
        self.start("Opacity ");
        fmt_float_array(&mut self.line, &rgb);
        self.emit()
    }

    fn matte(&mut self, on: bool) -> Result<()> {
        self.start("Matte");
        self.sp().push(if on { '1' } else { '0' });
        self.emit()
    }

    fn sides(&mut self, sides: i32) -> Result<()> {
        self.start("Sides");
        self.sp().push_str(&sides.to_string());
        self.emit()
    }

    fn reverse_orientation(&mut self) -> Result<()> {
        self.simple("ReverseOrientation")
    }

    fn coordinate_system(&mut self, name: &str) -> Result<()> {
        self.start("CoordinateSystem");
        self.string(name);
        self.emit()
    }

    fn geometric_approximation(&mut self, ty: &str, value: f32) -> Result<()> {
        self.start("GeometricApproximation");
        self.string(ty);
        self.float(value);
        self.emit()
    }

    fn basis(&mut self, u: &str, ustep: i32, v: &str, vstep: i32) -> Result<()> {
        self.start("Basis");
        self.string(u);
        self.sp().push_str(&ustep.to_string());
        self.string(v);
        self.sp().push_str(&vstep.to_string());
        self.emit()
    }

    fn points_general_polygons(
        &mut self,
        nloops: &[i32],
        nverts: &[i32],
        verts: &[i32],
        params: &[TypedParameter],
    ) -> Result<()> {
        self.start("PointsGeneralPolygons ");
        fmt_int_array(&mut self.line, nloops);
        self.line.push(' ');
        fmt_int_array(&mut self.line, nverts);
        self.line.push(' ');
        fmt_int_array(&mut self.line, verts);
        self.params(params);
        self.emit()
    }

    fn subdivision_mesh(
        &mut self,
        scheme: &str,
        nverts: &[i32],
        verts: &[i32],
        tags: &[String],
        nargs: &[i32],
        intargs: &[i32],
        floatargs: &[f32],
        params: &[TypedParameter],
    ) -> Result<()> {
        self.start("SubdivisionMesh");
        self.string(scheme);
        self.line.push(' ');
        fmt_int_array(&mut self.line, nverts);
        self.line.push(' ');
        fmt_int_array(&mut self.line, verts);
        if !tags.is_empty() {
            self.line.push(' ');
            fmt_string_array(&mut self.line, tags);
            self.line.push(' ');
            fmt_int_array(&mut self.line, nargs);
            self.line.push(' ');
            fmt_int_array(&mut self.line, intargs);
            self.line.push(' ');
            fmt_float_array(&mut self.line, floatargs);
        }
        self.params(params);
        self.emit()
    }

    fn hierarchical_subdivision_mesh(
        &mut self,
        scheme: &str,
        nverts: &[i32],
        verts: &[i32],
        tags: &[String],
        nargs: &[i32],
        intargs: &[i32],
        floatargs: &[f32],
        stringargs: &[String],
        params: &[TypedParameter],
    ) -> Result<()> {
        self.start("HierarchicalSubdivisionMesh");
        self.string(scheme);
        self.line.push(' ');
        fmt_int_array(&mut self.line, nverts);
        self.line.push(' ');
        fmt_int_array(&mut self.line, verts);
        self.line.push(' ');
        fmt_string_array(&mut self.line, tags);
        self.line.push(' ');
        fmt_int_array(&mut self.line, nargs);
        self.line.push(' ');
        fmt_int_array(&mut self.line, intargs);
        self.line.push(' ');
        fmt_float_array(&mut self.line, floatargs);
        self.line.push(' ');
        fmt_string_array(&mut self.line, stringargs);
        self.params(params);
        self.emit()
    }

    fn nu_patch(
        &mut self,
        nu: i32,
        uorder: i32,
        uknot: &[f32],
        umin: f32,
        umax: f32,
        nv: i32,
        vorder: i32,
        vknot: &[f32],
        vmin: f32,
        vmax: f32,
        params: &[TypedParameter],
    ) -> Result<()> {
        use std::fmt::Write as _;
        self.start("NuPatch");
        let _ = write!(self.sp(), "{nu} {uorder} ");
        fmt_float_array(&mut self.line, uknot);
        self.float(umin);
        self.float(umax);
        let _ = write!(self.sp(), "{nv} {vorder} ");
        fmt_float_array(&mut self.line, vknot);
        self.float(vmin);
        self.float(vmax);
        self.params(params);
        self.emit()
    }

    fn trim_curve(
        &mut self,
        ncurves: &[i32],
        order: &[i32],
        knot: &[f32],
        min: &[f32],
        max: &[f32],
        n: &[i32],
        u: &[f32],
        v: &[f32],
        w: &[f32],
    ) -> Result<()> {
        self.start("TrimCurve ");
        fmt_int_array(&mut self.line, ncurves);
        self.line.push(' ');
        fmt_int_array(&mut self.line, order);
        for f in [knot, min, max] {
            self.line.push(' ');
            fmt_float_array(&mut self.line, f);
        }
        self.line.push(' ');
        fmt_int_array(&mut self.line, n);
        for f in [u, v, w] {
            self.line.push(' ');
            fmt_float_array(&mut self.line, f);
        }
        self.emit()
    }

    fn curves(&mut self, ty: &str, nverts: &[i32], wrap: &str, params: &[TypedParameter]) -> Result<()> {
        self.start("Curves");
        self.string(ty);
        self.line.push(' ');
        fmt_int_array(&mut self.line, nverts);
        self.string(wrap);
        self.params(params);
        self.emit()
    }

    fn points(&mut self, _npoints: usize, params: &[TypedParameter]) -> Result<()> {
        self.start("Points");
        self.params(params);
        self.emit()
    }

    fn sphere(&mut self, radius: f32, zmin: f32, zmax: f32, theta: f32, params: &[TypedParameter]) -> Result<()> {
        self.start("Sphere");
        for v in [radius, zmin, zmax, theta] {
            self.float(v);
        }
        self.params(params);
        self.emit()
    }

    fn patch(&mut self, ty: &str, params: &[TypedParameter]) -> Result<()> {
        self.named("Patch", ty, params)
    }

    fn archive_record(&mut self, kind: ArchiveKind, text: &str) -> Result<()> {
        match kind {
            ArchiveKind::Comment => {
                self.start("#");
                if !text.is_empty() {
                    self.line.push(' ');
                    self.line.push_str(text);
                }
                self.emit()
            }
            ArchiveKind::Verbatim => {
                self.out.write_all(text.as_bytes())?;
                if !text.ends_with('\n') {
                    self.out.write_all(b"\n")?;
                }
                Ok(())
            }
        }
    }

    fn read_archive(&mut self, path: &str) -> Result<()> {
        self.start("ReadArchive");
        self.string(path);
        self.emit()
    }
}
