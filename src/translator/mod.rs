//! Scene to RIB translation.
//!
//! A [`Translator`] runs over the frames of a [`RenderContext`]. For every
//! frame it builds the render jobs (shadow passes then the beauty pass),
//! scans the scene at the motion sample times of each job's frame and
//! writes one RIB file per job. A render script for the farm is written
//! last.
//!
//! ```ignore
//! let ctx = RenderContext::load("globals.json")?;
//! let scene = Scene::load("shot.json")?;
//! let report = Translator::new(&ctx, &GeneratorRegistry::default()).run(&scene)?;
//! println!("{} RIB files", report.rib_files.len());
//! ```

mod blocks;
mod cancel;
mod context;
mod frames;
mod job;
mod report;
mod sample;
mod scan;
mod submit;

pub use blocks::*;
pub use cancel::*;
pub use context::*;
pub use frames::*;
pub use job::*;
pub use report::*;
pub use sample::*;
pub use scan::*;
pub use submit::*;

use crate::data::RibGenLoader;
use crate::scene::SceneSource;
use crate::util::{Error, Result};
use rayon::prelude::*;

/// Drives a translation run.
pub struct Translator<'a> {
    ctx: &'a RenderContext,
    loader: &'a dyn RibGenLoader,
    cancel: CancelToken,
    scene_name: Option<String>,
}

/// What one frame produced.
struct FrameOutput {
    report: RenderReport,
    jobs: FrameJobs,
}

impl<'a> Translator<'a> {
    pub fn new(ctx: &'a RenderContext, loader: &'a dyn RibGenLoader) -> Self {
        Self {
            ctx,
            loader,
            cancel: CancelToken::new(),
            scene_name: None,
        }
    }

    /// Builder: poll `cancel` instead of a private token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Builder: scene name used in file names, overriding the scene's own.
    pub fn with_scene_name(mut self, name: impl Into<String>) -> Self {
        self.scene_name = Some(name.into());
        self
    }

    /// Token a caller can use to stop the run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Translate every frame of the context.
    ///
    /// Cancellation is not an error: the report lists the frames completed
    /// before it and has `cancelled` set. Other failures abort the run.
    pub fn run(&self, source: &dyn SceneSource) -> Result<RenderReport> {
        let ctx = self.ctx;
        ctx.validate()?;
        let frames = ctx.frames.frames()?;
        let first_frame = frames.first().copied().unwrap_or(1);
        let scene_name = match &self.scene_name {
            Some(name) => name.clone(),
            None => {
                let scene = source.evaluate(first_frame as f32)?;
                if scene.name.is_empty() {
                    "untitled".to_string()
                } else {
                    scene.name
                }
            }
        };
        tracing::info!(scene = %scene_name, frames = frames.len(), parallel = ctx.parallel_frames, "translation started");

        let outputs: Vec<Result<FrameOutput>> = if ctx.parallel_frames {
            frames
                .par_iter()
                .map(|&frame| self.frame(source, &scene_name, frame, first_frame))
                .collect()
        } else {
            let mut outputs = Vec::with_capacity(frames.len());
            for &frame in &frames {
                let out = self.frame(source, &scene_name, frame, first_frame);
                let stop = matches!(out, Err(Error::Cancelled));
                outputs.push(out);
                if stop {
                    break;
                }
            }
            outputs
        };

        let mut report = RenderReport::default();
        let mut done = Vec::with_capacity(outputs.len());
        for out in outputs {
            match out {
                Ok(out) => {
                    report.merge(out.report);
                    done.push(out.jobs);
                }
                Err(Error::Cancelled) => report.cancelled = true,
                Err(e) => return Err(e),
            }
        }

        if report.cancelled {
            tracing::warn!(frames_done = report.frames_done.len(), "translation cancelled");
            return Ok(report);
        }
        report.script = write_script(ctx, &scene_name, &done)?;
        tracing::info!(
            ribs = report.rib_files.len(),
            skipped = report.skipped.len(),
            "translation finished"
        );
        Ok(report)
    }

    /// Jobs of one frame, each written to its RIB file.
    fn frame(&self, source: &dyn SceneSource, scene_name: &str, frame: i64, first_frame: i64) -> Result<FrameOutput> {
        let ctx = self.ctx;
        let _span = tracing::info_span!("frame", frame).entered();
        self.cancel.check()?;

        let scene = source.evaluate(frame as f32)?;
        let expand = ctx.expand_context(scene_name, frame);
        let naming = Naming {
            ctx,
            scene: scene_name,
            expand: &expand,
        };
        let shadow_naming = naming.shadow_naming();
        let jobs = build_jobs(ctx, &scene, &naming, frame, first_frame)?;
        let inputs = WriteInputs {
            ctx,
            naming: &naming,
            loader: self.loader,
            cancel: &self.cancel,
        };

        let mut report = RenderReport::default();
        let mut render_frames: Vec<i64> = Vec::new();
        for job in &jobs {
            if !render_frames.contains(&job.render_frame) {
                render_frames.push(job.render_frame);
            }
        }

        for render_frame in render_frames {
            let camera = scene.camera_shape(&jobs[0].camera)?;
            let times = SampleTimes::compute(
                render_frame,
                ctx.motion.samples,
                shutter_fraction(ctx, camera),
                ctx.motion.blur_time,
                ctx.motion.shutter,
                ctx.does_motion(),
            );
            let frame_expand = expand.at_frame(render_frame);
            let scanned = scan(
                source,
                &times,
                render_frame,
                &ScanInputs {
                    ctx,
                    naming: &shadow_naming,
                    expand: &frame_expand,
                    cancel: &self.cancel,
                },
            )?;
            for job in jobs.iter().filter(|j| j.render_frame == render_frame) {
                self.cancel.check()?;
                report.rib_files.push(write_job(inputs, job, &scanned, &times)?);
            }
            report.skipped.extend(scanned.skipped);
        }

        report.frames_done.push(frame);
        tracing::info!(jobs = jobs.len(), "frame done");
        Ok(FrameOutput {
            report,
            jobs: FrameJobs { frame, jobs },
        })
    }
}
