//! Scene scan: extract every shape of one frame at each motion sample.

use super::cancel::CancelToken;
use super::context::RenderContext;
use super::report::SkippedObject;
use super::sample::SampleTimes;
use crate::data::{BuildContext, CurveGroupData, ExtractOptions, RibData, ShadowNaming};
use crate::node::RibNodeTable;
use crate::scene::{DagEntry, NurbsCurve, Scene, SceneSource, Shape};
use crate::util::{DMat4, Error, ExpandContext, Result};

/// Extracted scene of one render frame.
#[derive(Debug)]
pub struct FrameScene {
    /// Scene snapshot per sample, first sample first.
    pub scenes: Vec<Scene>,
    pub table: RibNodeTable,
    pub skipped: Vec<SkippedObject>,
}

impl FrameScene {
    /// Snapshot of the first sample.
    pub fn scene(&self) -> Result<&Scene> {
        self.scenes
            .first()
            .ok_or_else(|| Error::invalid("frame scanned without samples"))
    }
}

/// Naming and cancellation shared by the scans of one frame.
#[derive(Clone, Copy)]
pub struct ScanInputs<'a> {
    pub ctx: &'a RenderContext,
    pub naming: &'a ShadowNaming,
    pub expand: &'a ExpandContext,
    pub cancel: &'a CancelToken,
}

/// Evaluate `source` at every sample time of `render_frame` and extract its
/// shapes into one node table.
///
/// Degenerate shapes and failed extractions are skipped and reported;
/// shader table mismatches and cancellation abort the scan.
pub fn scan(source: &dyn SceneSource, times: &SampleTimes, render_frame: i64, inputs: &ScanInputs<'_>) -> Result<FrameScene> {
    let _span = tracing::debug_span!("scan", frame = render_frame, samples = times.len()).entered();
    let ctx = inputs.ctx;
    let mut options = ctx.extract.clone();
    options.do_shadows = ctx.shadows.enabled;

    let mut out = FrameScene {
        scenes: Vec::with_capacity(times.len()),
        table: RibNodeTable::new(ctx.layer.clone()),
        skipped: Vec::new(),
    };

    for (sample, &time) in times.times.iter().enumerate() {
        inputs.cancel.check()?;
        let scene = source.evaluate(time)?;
        scan_sample(&scene, sample, render_frame, &options, inputs, &mut out.table, &mut out.skipped)?;
        out.scenes.push(scene);
    }
    tracing::debug!(frame = render_frame, nodes = out.table.len(), "scene scanned");
    Ok(out)
}

fn scan_sample(
    scene: &Scene,
    sample: usize,
    frame: i64,
    options: &ExtractOptions,
    inputs: &ScanInputs<'_>,
    table: &mut RibNodeTable,
    skipped: &mut Vec<SkippedObject>,
) -> Result<()> {
    let entries = scene.walk();
    let mut instances = Vec::new();

    for entry in &entries {
        inputs.cancel.check()?;
        let Some(shape) = &entry.node.shape else {
            continue;
        };
        let data = match shape {
            Shape::Camera(_) => continue,
            Shape::Instance { of } => {
                instances.push((entry, of));
                continue;
            }
            Shape::NurbsCurve(_) if options.render_all_curves && entry.group.is_some() => continue,
            Shape::CurveGroup(group) if options.render_all_curves => {
                let inverse = entry.world.inverse();
                let members: Vec<(DMat4, &NurbsCurve)> = entries
                    .iter()
                    .filter(|e| e.group.as_deref() == Some(entry.path.as_str()))
                    .filter_map(|e| match &e.node.shape {
                        Some(Shape::NurbsCurve(c)) => Some((inverse * e.world, c)),
                        _ => None,
                    })
                    .collect();
                let expand = inputs.expand.with_object(&entry.node.name, &entry.path);
                let bctx = build_context(entry, scene, options, inputs, &expand, frame);
                Ok(Some(RibData::Curves(CurveGroupData::build(&members, group, &bctx))))
            }
            _ => {
                let expand = inputs.expand.with_object(&entry.node.name, &entry.path);
                let bctx = build_context(entry, scene, options, inputs, &expand, frame);
                RibData::build(shape, &bctx)
            }
        };

        match data {
            Ok(None) => {}
            Ok(Some(data)) if sample == 0 && !data.is_writable() => {
                tracing::info!(object = %entry.path, kind = shape.kind(), "nothing to write");
                skipped.push(skip(frame, entry, "degenerate geometry"));
            }
            Ok(Some(data)) => table.insert(entry, sample, data)?,
            Err(e @ Error::ShaderInfoMismatch { .. }) => return Err(e),
            Err(e) if sample == 0 => {
                tracing::warn!(object = %entry.path, error = %e, "extraction failed, object skipped");
                skipped.push(skip(frame, entry, &e.to_string()));
            }
            Err(e) => {
                tracing::warn!(object = %entry.path, sample, error = %e, "extraction failed, reusing previous sample");
                reuse_previous(table, entry, sample)?;
            }
        }
    }

    for (entry, of) in instances {
        if let Err(e) = table.insert_instance(entry, of, sample) {
            if sample == 0 {
                tracing::warn!(object = %entry.path, error = %e, "instance skipped");
                skipped.push(skip(frame, entry, &e.to_string()));
            }
        }
    }
    Ok(())
}

fn build_context<'a>(
    entry: &'a DagEntry<'_>,
    scene: &'a Scene,
    options: &'a ExtractOptions,
    inputs: &'a ScanInputs<'_>,
    expand: &'a ExpandContext,
    frame: i64,
) -> BuildContext<'a> {
    BuildContext {
        options,
        naming: inputs.naming,
        frame,
        name: &entry.node.name,
        path: &entry.path,
        world: entry.world,
        attributes: &entry.node.attributes,
        shaders: &scene.shaders,
        expand,
    }
}

fn reuse_previous(table: &mut RibNodeTable, entry: &DagEntry<'_>, sample: usize) -> Result<()> {
    let Some(node) = table.get_mut(&entry.path) else {
        return Ok(());
    };
    let Some(previous) = sample.checked_sub(1).and_then(|s| node.object(s)) else {
        return Ok(());
    };
    let obj = previous.instance(entry.world);
    node.add_sample(sample, obj)
}

fn skip(frame: i64, entry: &DagEntry<'_>, reason: &str) -> SkippedObject {
    SkippedObject {
        frame,
        path: entry.path.clone(),
        reason: reason.to_string(),
    }
}
