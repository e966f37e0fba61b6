//! Render globals.
//!
//! [`RenderContext`] holds every setting of a translation run. It is loaded
//! from JSON; missing fields keep their defaults, so a globals file only
//! lists what it changes.

use super::frames::parse_frame_sequence;
use super::sample::ShutterConfig;
use crate::data::ExtractOptions;
use crate::util::{Error, ExpandContext, Result};
use ribgen_api::MAX_MOTION_SAMPLES;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Frames to translate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameSpec {
    /// Sequence text such as `1-10@2,20`.
    Text(String),
    List(Vec<i64>),
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self::Text("1".into())
    }
}

impl FrameSpec {
    /// Expanded frame list.
    pub fn frames(&self) -> Result<Vec<i64>> {
        match self {
            Self::Text(text) => parse_frame_sequence(text),
            Self::List(list) if list.is_empty() => Err(Error::InvalidFrameSequence("empty frame list".into())),
            Self::List(list) => {
                let mut out = Vec::with_capacity(list.len());
                for &f in list {
                    if !out.contains(&f) {
                        out.push(f);
                    }
                }
                Ok(out)
            }
        }
    }
}

/// Motion blur settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionOptions {
    /// Samples per blurred frame, 1 to 16.
    pub samples: usize,
    /// Shutter angle in degrees; the camera's when unset.
    pub shutter_angle: Option<f32>,
    /// Scales the shutter interval.
    pub blur_time: f32,
    pub shutter: ShutterConfig,
    pub transformation_blur: bool,
    pub deformation_blur: bool,
    pub camera_blur: bool,
    /// Motion blocks use offsets from the shutter opening.
    pub relative: bool,
    /// `GeometricApproximation "motionfactor"` (0 disables).
    pub motion_factor: f32,
}

impl Default for MotionOptions {
    fn default() -> Self {
        Self {
            samples: 2,
            shutter_angle: None,
            blur_time: 1.0,
            shutter: ShutterConfig::OpenOnFrame,
            transformation_blur: false,
            deformation_blur: false,
            camera_blur: false,
            relative: false,
            motion_factor: 0.0,
        }
    }
}

impl MotionOptions {
    /// Any kind of blur requested.
    pub fn any(&self) -> bool {
        self.transformation_blur || self.deformation_blur || self.camera_blur
    }
}

/// Output locations and file naming.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    pub project_dir: String,
    pub rib_dir: String,
    pub texture_dir: String,
    pub picture_dir: String,
    pub tmp_dir: String,
    /// Beauty RIB name pattern (tokens expanded); scene based when empty.
    pub rib_name: String,
    /// Image name pattern (tokens expanded); scene based when empty.
    pub image_name: String,
    /// Frame number padding.
    pub padding: usize,
    /// Gzip RIB files.
    pub compress: bool,
    /// Write `#` comments naming each object.
    pub comments: bool,
    /// Nest attribute blocks along the DAG instead of one block per object.
    pub full_hierarchy: bool,
    /// Add the camera name to beauty RIB and image names.
    pub camera_in_names: bool,
    /// Coordinate systems use `ConcatTransform`.
    pub relative_transforms: bool,
    /// Paths written relative to the project directory.
    pub relative_paths: bool,
    pub shot: String,
    pub version: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            project_dir: String::new(),
            rib_dir: "rib/".into(),
            texture_dir: "rmantex/".into(),
            picture_dir: "rmanpix/".into(),
            tmp_dir: "rmantmp/".into(),
            rib_name: String::new(),
            image_name: String::new(),
            padding: 4,
            compress: false,
            comments: true,
            full_hierarchy: false,
            camera_in_names: false,
            relative_transforms: false,
            relative_paths: true,
            shot: String::new(),
            version: String::new(),
        }
    }
}

/// One display driver. The first display writes the image; the others
/// write `+` prefixed secondary outputs named after `name`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Output variable name for secondary displays.
    pub name: String,
    /// Driver, e.g. `framebuffer`, `tiff`, `openexr`.
    #[serde(rename = "type")]
    pub ty: String,
    /// Channels, e.g. `rgba` or a display channel name.
    pub mode: String,
    /// Quantize bits (0 keeps the renderer default).
    pub bits: u32,
    pub dither: f32,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            ty: "framebuffer".into(),
            mode: "rgba".into(),
            bits: 0,
            dither: 0.0,
        }
    }
}

/// One `DisplayChannel` declaration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelOptions {
    pub name: String,
    /// Type such as `color`, `float`, `point`.
    #[serde(rename = "type")]
    pub ty: String,
    pub array_size: usize,
    /// Quantize to this many bits.
    pub bits: Option<u32>,
    pub dither: Option<f32>,
    pub filter: Option<String>,
    pub filter_width: Option<[f32; 2]>,
}

impl ChannelOptions {
    /// Declaration text, e.g. `color[2] diffuse`.
    pub fn declaration(&self) -> String {
        let ty = if self.ty.is_empty() { "color" } else { &self.ty };
        if self.array_size > 0 {
            format!("{ty}[{}] {}", self.array_size, self.name)
        } else {
            format!("{ty} {}", self.name)
        }
    }
}

/// Image settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    pub pixel_aspect: f32,
    /// xmin, xmax, ymin, ymax.
    pub crop: [f32; 4],
    pub pixel_samples: u32,
    pub shading_rate: f32,
    pub filter: String,
    pub filter_width: [f32; 2],
    /// Color quantization bits (0 for float output).
    pub bits: u32,
    pub dither: f32,
    pub gain: f32,
    pub gamma: f32,
    pub displays: Vec<DisplayOptions>,
    pub channels: Vec<ChannelOptions>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            pixel_aspect: 1.0,
            crop: [0.0, 1.0, 0.0, 1.0],
            pixel_samples: 3,
            shading_rate: 1.0,
            filter: "gaussian".into(),
            filter_width: [2.0, 2.0],
            bits: 8,
            dither: 0.5,
            gain: 1.0,
            gamma: 1.0,
            displays: vec![DisplayOptions::default()],
            channels: Vec::new(),
        }
    }
}

impl ImageOptions {
    /// Crop window differs from the full frame.
    pub fn is_cropped(&self) -> bool {
        self.crop != [0.0, 1.0, 0.0, 1.0]
    }
}

/// Ray tracing options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    pub enabled: bool,
    pub max_depth: i32,
    pub specular_threshold: f32,
    pub continuation_by_default: bool,
    pub cache_memory: i32,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            max_depth: 2,
            specular_threshold: 10.0,
            continuation_by_default: true,
            cache_memory: 30720,
        }
    }
}

/// Renderer options written in the RIB prologue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// `Option "statistics" "endofframe"` level (0 disables).
    pub statistics: i32,
    pub bucket_size: [i32; 2],
    pub grid_size: i32,
    /// Kilobytes (0 keeps the renderer default).
    pub texture_memory: i32,
    pub othreshold: [f32; 3],
    pub zthreshold: [f32; 3],
    pub shader_path: String,
    pub texture_path: String,
    pub archive_path: String,
    pub procedural_path: String,
    pub trace: TraceOptions,
    /// Hider of beauty passes.
    pub hider: String,
    /// Verbatim RIB before the first frame.
    pub pre_frame_rib: String,
    /// Verbatim RIB before `WorldBegin`.
    pub pre_world_rib: String,
    /// Verbatim RIB after `WorldBegin`.
    pub post_world_rib: String,
    /// Verbatim RIB at the start of the frame block.
    pub pre_frame_block_rib: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            statistics: 0,
            bucket_size: [16, 16],
            grid_size: 256,
            texture_memory: 0,
            othreshold: [0.996; 3],
            zthreshold: [0.996; 3],
            shader_path: "&:@:.:~:rmanshader".into(),
            texture_path: "&:@:.:~:rmantex".into(),
            archive_path: "&:@:.:~:rib".into(),
            procedural_path: "&:@:.:~".into(),
            trace: TraceOptions::default(),
            hider: "hidden".into(),
            pre_frame_rib: String::new(),
            pre_world_rib: String::new(),
            post_world_rib: String::new(),
            pre_frame_block_rib: String::new(),
        }
    }
}

/// Depth map shadow settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowOptions {
    pub enabled: bool,
    /// Map resolution of lights that do not set their own.
    pub resolution: u32,
    pub extension: String,
    /// Leave the scene name out of map names.
    pub shape_only: bool,
    pub pixel_samples: u32,
    pub shading_rate: f32,
    /// Write lights in deep shadow passes.
    pub lights_in_deep_shadows: bool,
}

impl Default for ShadowOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: 512,
            extension: "tex".into(),
            shape_only: false,
            pixel_samples: 1,
            shading_rate: 1.0,
            lights_in_deep_shadows: false,
        }
    }
}

/// Light linking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightLinkOptions {
    pub enabled: bool,
    /// Lights are switched on after their declaration.
    pub illuminate_by_default: bool,
}

impl Default for LightLinkOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            illuminate_by_default: true,
        }
    }
}

/// Farm job settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Script title; the scene name when empty.
    pub title: String,
    /// Render on a farm with server bounds below.
    pub net_render: bool,
    pub min_servers: u32,
    pub max_servers: u32,
    /// Directory mappings as `{{from to zone}} ...` triples.
    pub dirmaps: String,
    pub pre_job_command: String,
    pub post_job_command: String,
    pub pre_frame_command: String,
    pub post_frame_command: String,
    /// Renderer executable.
    pub render_command: String,
    /// Extra renderer arguments.
    pub render_args: String,
    pub alfred_tags: String,
    pub alfred_services: String,
    pub alfred_expand: bool,
    /// Commands run on remote servers.
    pub remote: bool,
    /// Remove RIB files after rendering.
    pub clean_rib: bool,
    /// Remove the script after the job.
    pub clean_script: bool,
    /// Launch the renderer on the script once written.
    pub launch: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            net_render: false,
            min_servers: 1,
            max_servers: 1,
            dirmaps: String::new(),
            pre_job_command: String::new(),
            post_job_command: String::new(),
            pre_frame_command: String::new(),
            post_frame_command: String::new(),
            render_command: "render".into(),
            render_args: String::new(),
            alfred_tags: String::new(),
            alfred_services: String::new(),
            alfred_expand: false,
            remote: true,
            clean_rib: false,
            clean_script: false,
            launch: false,
        }
    }
}

/// Render script format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptFormat {
    #[default]
    Alfred,
    Xml,
    /// RIB files only.
    None,
}

impl ScriptFormat {
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Alfred => Some("alf"),
            Self::Xml => Some("xml"),
            Self::None => None,
        }
    }
}

/// Every setting of a translation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderContext {
    pub frames: FrameSpec,
    /// Render camera path; the scene's camera when empty.
    pub camera: String,
    /// Render layer (empty for all nodes).
    pub layer: String,
    pub motion: MotionOptions,
    pub output: OutputOptions,
    pub image: ImageOptions,
    pub render: RenderOptions,
    pub shadows: ShadowOptions,
    pub light_linking: LightLinkOptions,
    pub extract: ExtractOptions,
    pub job: JobOptions,
    pub script_format: ScriptFormat,
    /// Generate frames on the rayon thread pool.
    pub parallel_frames: bool,
}

impl RenderContext {
    /// Load globals from JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let ctx: Self = serde_json::from_str(&text)?;
        ctx.validate()?;
        Ok(ctx)
    }

    /// Reject settings no run can use.
    pub fn validate(&self) -> Result<()> {
        let m = &self.motion;
        if m.samples == 0 || m.samples > MAX_MOTION_SAMPLES {
            return Err(Error::InvalidConfig(format!(
                "motion samples must be within 1..={MAX_MOTION_SAMPLES}, got {}",
                m.samples
            )));
        }
        if self.image.width == 0 || self.image.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "image size {}x{}",
                self.image.width, self.image.height
            )));
        }
        if self.image.displays.is_empty() {
            return Err(Error::InvalidConfig("no display".into()));
        }
        self.frames.frames().map(|_| ())
    }

    /// Motion blocks for transforms or geometry are possible.
    pub fn does_motion(&self) -> bool {
        self.motion.samples > 1 && (self.motion.transformation_blur || self.motion.deformation_blur)
    }

    /// `dir` joined under the project directory unless already absolute.
    pub fn project_path(&self, dir: &str) -> String {
        let is_full = dir.starts_with('/') || dir.chars().nth(1) == Some(':');
        if is_full || self.output.project_dir.is_empty() {
            dir.to_string()
        } else {
            let mut p = self.output.project_dir.clone();
            if !p.ends_with('/') {
                p.push('/');
            }
            p.push_str(dir);
            p
        }
    }

    /// Token values for `scene` at `frame`.
    pub fn expand_context(&self, scene: &str, frame: i64) -> ExpandContext {
        let o = &self.output;
        ExpandContext {
            frame,
            scene_name: scene.to_string(),
            image_name: String::new(),
            project_dir: o.project_dir.clone(),
            rib_dir: o.rib_dir.clone(),
            texture_dir: o.texture_dir.clone(),
            object_name: String::new(),
            object_path: String::new(),
            shot: o.shot.clone(),
            version: o.version.clone(),
            layer: self.layer.clone(),
            texture_ext: self.shadows.extension.clone(),
        }
    }
}
