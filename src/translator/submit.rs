//! Render script assembly from the jobs of a run.

use super::context::{RenderContext, ScriptFormat};
use super::job::RenderJob;
use crate::script::{Cmd, Job, RenderScript, PRE_JOB_TITLE};
use crate::util::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Jobs written for one frame.
#[derive(Clone, Debug)]
pub struct FrameJobs {
    pub frame: i64,
    pub jobs: Vec<RenderJob>,
}

fn command(ctx: &RenderContext, text: impl Into<String>) -> Cmd {
    let j = &ctx.job;
    Cmd::new(text, j.remote)
        .with_tags(j.alfred_tags.clone())
        .with_services(j.alfred_services.clone())
        .with_expand(j.alfred_expand)
}

/// Renderer invocation for `rib`.
pub fn render_command(ctx: &RenderContext, rib: &Path) -> String {
    let j = &ctx.job;
    let mut cmd = j.render_command.clone();
    if !j.render_args.is_empty() {
        cmd.push(' ');
        cmd.push_str(&j.render_args);
    }
    cmd.push(' ');
    cmd.push_str(&rib.display().to_string());
    cmd
}

fn rib_job(ctx: &RenderContext, title: String, rib: &Path) -> Job {
    let mut job = Job::new(title).with_command(command(ctx, render_command(ctx, rib)));
    if ctx.job.clean_rib {
        job.cleanup.push(Cmd::new(format!("rm {}", rib.display()), ctx.job.remote));
    }
    job
}

/// Build the render script of a run.
///
/// Every frame becomes one top-level job rendering the beauty RIB, with one
/// subtask per shadow RIB. A shadow map shared by several frames is
/// rendered once, by the first frame listing it.
pub fn build_script(ctx: &RenderContext, scene: &str, frames: &[FrameJobs]) -> Result<RenderScript> {
    let j = &ctx.job;
    let title = if j.title.is_empty() { scene } else { &j.title };
    let mut script = RenderScript::new(title);
    script.dirmaps = j.dirmaps.clone();
    if j.net_render {
        script.min_servers = j.min_servers;
        script.max_servers = j.max_servers.max(j.min_servers);
    }

    let mut shadow_ribs: HashSet<&Path> = HashSet::new();
    for frame in frames {
        let Some(beauty) = frame.jobs.iter().find(|job| !job.is_shadow()) else {
            continue;
        };
        let mut job = Job::new(format!("Frame {}", frame.frame));
        if !j.pre_frame_command.is_empty() {
            job.commands.push(command(ctx, j.pre_frame_command.clone()));
        }
        job.commands.push(command(ctx, render_command(ctx, &beauty.rib_file)));
        if !j.post_frame_command.is_empty() {
            job.commands.push(command(ctx, j.post_frame_command.clone()));
        }
        if j.clean_rib {
            job.cleanup
                .push(Cmd::new(format!("rm {}", beauty.rib_file.display()), j.remote));
        }
        job.chaser = format!("sho \"{}\"", beauty.image_name);
        let id = script.add_job(job, 0)?;

        for shadow in frame.jobs.iter().filter(|job| job.is_shadow()) {
            if !shadow_ribs.insert(&shadow.rib_file) {
                continue;
            }
            let title = format!("{} {}", shadow.name, shadow.image_name);
            script.add_job(rib_job(ctx, title, &shadow.rib_file), id)?;
        }
    }

    if !j.pre_job_command.is_empty() {
        let pre = Job::new(PRE_JOB_TITLE).with_command(command(ctx, j.pre_job_command.clone()));
        script.add_leaf_dependency(&pre);
    }
    if !j.post_job_command.is_empty() {
        script.cleanup.push(command(ctx, j.post_job_command.clone()));
    }
    Ok(script)
}

/// Where the script of `scene` is written, `None` when scripts are off.
pub fn script_path(ctx: &RenderContext, scene: &str) -> Option<PathBuf> {
    let ext = ctx.script_format.extension()?;
    let mut dir = ctx.project_path(&ctx.output.tmp_dir);
    if !dir.is_empty() && !dir.ends_with('/') {
        dir.push('/');
    }
    Some(PathBuf::from(format!("{dir}{scene}.{ext}")))
}

/// Build and write the render script; returns its path.
pub fn write_script(ctx: &RenderContext, scene: &str, frames: &[FrameJobs]) -> Result<Option<PathBuf>> {
    let Some(path) = script_path(ctx, scene) else {
        return Ok(None);
    };
    let mut script = build_script(ctx, scene, frames)?;
    if ctx.job.clean_script {
        script
            .cleanup
            .push(Cmd::new(format!("rm {}", path.display()), false));
    }
    match ctx.script_format {
        ScriptFormat::Xml => script.write_xml(&path)?,
        _ => script.write_alf(&path)?,
    }
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::job::{ShadowJob, ShadowView};
    use ribgen_api::RenderPass;

    fn job(pass: RenderPass, name: &str, rib: &str, image: &str) -> RenderJob {
        RenderJob {
            pass,
            name: name.into(),
            frame: 1,
            render_frame: 1,
            camera: "|cam".into(),
            image_name: image.into(),
            rib_file: rib.into(),
            width: 640,
            height: 480,
            aspect: 1.0,
            format: "tiff".into(),
            image_mode: "rgba".into(),
            shadow: None,
        }
    }

    fn shadow(rib: &str) -> RenderJob {
        let mut j = job(RenderPass::Shadow, "key", rib, "rmantex/key.tex");
        j.shadow = Some(ShadowJob {
            light: "|key".into(),
            face: None,
            deep: false,
            geometry_set: String::new(),
            pixel_samples: 1,
            shading_rate: 1.0,
            continuous_volume: false,
            view: ShadowView {
                fov: 40.0,
                orthographic: false,
                ortho_width: 0.0,
                near: 0.1,
                far: 100.0,
            },
        });
        j
    }

    fn frames() -> Vec<FrameJobs> {
        (1..=2)
            .map(|f| FrameJobs {
                frame: f,
                jobs: vec![
                    shadow("rib/key_SHD.rib"),
                    job(RenderPass::Final, "cam", &format!("rib/shot.000{f}.rib"), &format!("rmanpix/shot.000{f}.tif")),
                ],
            })
            .collect()
    }

    #[test]
    fn test_frame_jobs() {
        let mut ctx = RenderContext::default();
        ctx.job.render_args = "-progress".into();
        ctx.job.clean_rib = true;
        let script = build_script(&ctx, "shot", &frames()).unwrap();
        assert_eq!(script.title, "shot");
        let jobs = script.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].title, "Frame 1");
        assert_eq!(jobs[0].commands[0].command, "render -progress rib/shot.0001.rib");
        assert_eq!(jobs[0].cleanup[0].command, "rm rib/shot.0001.rib");
        assert_eq!(jobs[0].chaser, "sho \"rmanpix/shot.0001.tif\"");
        // the shared shadow map renders with the first frame only
        assert_eq!(jobs[0].children.len(), 1);
        assert_eq!(jobs[0].children[0].commands[0].command, "render -progress rib/key_SHD.rib");
        assert!(jobs[1].children.is_empty());
    }

    #[test]
    fn test_pre_and_post_job() {
        let mut ctx = RenderContext::default();
        ctx.job.pre_job_command = "mkdir -p rmanpix".into();
        ctx.job.post_job_command = "notify done".into();
        ctx.job.title = "nightly".into();
        let script = build_script(&ctx, "shot", &frames()).unwrap();
        assert_eq!(script.title, "nightly");
        let leaf = &script.jobs()[0].children[0].children[0];
        assert_eq!(leaf.title, PRE_JOB_TITLE);
        assert_eq!(script.jobs()[1].children[0].title, PRE_JOB_TITLE);
        assert_eq!(script.cleanup[0].command, "notify done");
    }

    #[test]
    fn test_write_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = RenderContext::default();
        ctx.output.project_dir = dir.path().display().to_string();
        let path = write_script(&ctx, "shot", &frames()).unwrap().unwrap();
        assert!(path.ends_with("rmantmp/shot.alf"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Task -title {Frame 2}"));

        ctx.script_format = ScriptFormat::None;
        assert!(write_script(&ctx, "shot", &frames()).unwrap().is_none());
    }
}
