//! RenderMan Interface sink.
//!
//! - [`Ri`] - the typed calls the translator emits
//! - [`RibWriter`] - ASCII RIB encoder over any `Write`
//! - [`RibFile`] - file output with optional gzip and a single commit point

mod file;
mod format;
mod writer;

pub use file::*;
pub use format::*;
pub use writer::*;

use crate::param::TypedParameter;
use crate::util::{Result, RtMatrix};

/// Renderer handle of an emitted light source.
pub type LightHandle = u32;

/// Kind of archive record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `# text`
    Comment,
    /// Text copied to the stream unchanged.
    Verbatim,
}

/// Typed RenderMan Interface calls.
///
/// Parameter lists are slices of [`TypedParameter`]; each is written with its
/// inline declaration so no global `Declare` state is needed.
#[allow(clippy::too_many_arguments)]
pub trait Ri {
    // === Structure ===
    fn frame_begin(&mut self, frame: i64) -> Result<()>;
    fn frame_end(&mut self) -> Result<()>;
    fn world_begin(&mut self) -> Result<()>;
    fn world_end(&mut self) -> Result<()>;
    fn attribute_begin(&mut self) -> Result<()>;
    fn attribute_end(&mut self) -> Result<()>;
    fn transform_begin(&mut self) -> Result<()>;
    fn transform_end(&mut self) -> Result<()>;
    fn motion_begin(&mut self, times: &[f32]) -> Result<()>;
    fn motion_end(&mut self) -> Result<()>;

    // === Options and attributes ===
    fn option(&mut self, name: &str, params: &[TypedParameter]) -> Result<()>;
    fn attribute(&mut self, name: &str, params: &[TypedParameter]) -> Result<()>;
    fn declare(&mut self, name: &str, declaration: &str) -> Result<()>;

    // === Transforms ===
    fn transform(&mut self, m: &RtMatrix) -> Result<()>;
    fn concat_transform(&mut self, m: &RtMatrix) -> Result<()>;
    fn identity(&mut self) -> Result<()>;
    fn translate(&mut self, x: f32, y: f32, z: f32) -> Result<()>;
    fn rotate(&mut self, angle: f32, x: f32, y: f32, z: f32) -> Result<()>;
    fn scale(&mut self, x: f32, y: f32, z: f32) -> Result<()>;

    // === Camera ===
    fn format(&mut self, width: u32, height: u32, aspect: f32) -> Result<()>;
    fn projection(&mut self, name: &str, params: &[TypedParameter]) -> Result<()>;
    fn screen_window(&mut self, left: f32, right: f32, bottom: f32, top: f32) -> Result<()>;
    fn crop_window(&mut self, xmin: f32, xmax: f32, ymin: f32, ymax: f32) -> Result<()>;
    fn clipping(&mut self, near: f32, far: f32) -> Result<()>;
    fn depth_of_field(&mut self, fstop: f32, focal_length: f32, focal_distance: f32) -> Result<()>;
    fn shutter(&mut self, open: f32, close: f32) -> Result<()>;
    fn camera(&mut self, name: &str, params: &[TypedParameter]) -> Result<()>;

    // === Imaging ===
    fn display(&mut self, name: &str, ty: &str, mode: &str, params: &[TypedParameter]) -> Result<()>;
    fn display_channel(&mut self, declaration: &str, params: &[TypedParameter]) -> Result<()>;
    fn hider(&mut self, name: &str, params: &[TypedParameter]) -> Result<()>;
    fn quantize(&mut self, ty: &str, one: i32, min: i32, max: i32, dither: f32) -> Result<()>;
    fn exposure(&mut self, gain: f32, gamma: f32) -> Result<()>;
    fn shading_interpolation(&mut self, ty: &str) -> Result<()>;
    fn pixel_samples(&mut self, x: f32, y: f32) -> Result<()>;
    fn pixel_filter(&mut self, name: &str, xwidth: f32, ywidth: f32) -> Result<()>;
    fn shading_rate(&mut self, rate: f32) -> Result<()>;

    // === Shading ===
    fn surface(&mut self, name: &str, params: &[TypedParameter]) -> Result<()>;
    fn displacement(&mut self, name: &str, params: &[TypedParameter]) -> Result<()>;
    fn atmosphere(&mut self, name: &str, params: &[TypedParameter]) -> Result<()>;
    fn light_source(&mut self, name: &str, params: &[TypedParameter]) -> Result<LightHandle>;
    fn area_light_source(&mut self, name: &str, params: &[TypedParameter]) -> Result<LightHandle>;
    fn illuminate(&mut self, light: LightHandle, on: bool) -> Result<()>;
    fn color(&mut self, rgb: [f32; 3]) -> Result<()>;
    fn opacity(&mut self, rgb: [f32; 3]) -> Result<()>;
    fn matte(&mut self, on: bool) -> Result<()>;
    fn sides(&mut self, sides: i32) -> Result<()>;
    fn reverse_orientation(&mut self) -> Result<()>;
    fn coordinate_system(&mut self, name: &str) -> Result<()>;
    fn geometric_approximation(&mut self, ty: &str, value: f32) -> Result<()>;
    fn basis(&mut self, u: &str, ustep: i32, v: &str, vstep: i32) -> Result<()>;

    // === Geometry ===
    fn points_general_polygons(
        &mut self,
        nloops: &[i32],
        nverts: &[i32],
        verts: &[i32],
        params: &[TypedParameter],
    ) -> Result<()>;
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
    ) -> Result<()>;
    /// As [`Ri::subdivision_mesh`], with three counts per tag in `nargs`
    /// (integer, float, string).
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
    ) -> Result<()>;
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
    ) -> Result<()>;
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
    ) -> Result<()>;
    fn curves(&mut self, ty: &str, nverts: &[i32], wrap: &str, params: &[TypedParameter]) -> Result<()>;
    fn points(&mut self, npoints: usize, params: &[TypedParameter]) -> Result<()>;
    fn sphere(&mut self, radius: f32, zmin: f32, zmax: f32, theta: f32, params: &[TypedParameter]) -> Result<()>;
    fn patch(&mut self, ty: &str, params: &[TypedParameter]) -> Result<()>;

    // === Archives ===
    fn archive_record(&mut self, kind: ArchiveKind, text: &str) -> Result<()>;
    fn read_archive(&mut self, path: &str) -> Result<()>;

    /// Shorthand for a comment record.
    fn comment(&mut self, text: &str) -> Result<()> {
        self.archive_record(ArchiveKind::Comment, text)
    }

    /// Shorthand for verbatim RIB.
    fn verbatim(&mut self, text: &str) -> Result<()> {
        self.archive_record(ArchiveKind::Verbatim, text)
    }
}
