//! Farm render scripts.
//!
//! A [`RenderScript`] is a forest of [`Job`]s. Jobs get sequential ids from
//! 1 as they are added; an id can be used as the parent of later jobs. The
//! tree serializes to Alfred job text or to XML.
//!
//! ```ignore
//! let mut script = RenderScript::new("shot");
//! let main = script.add_job(Job::new("main"), 0)?;
//! script.add_job(Job::new("shadow"), main)?;
//! script.add_leaf_dependency(&Job::new("finalize"));
//! script.write_alf("shot.alf")?;
//! ```

mod format;
mod job;

pub use format::*;
pub use job::*;

use crate::util::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Title of the job that runs before every other job. Leaf dependencies are
/// never added below it.
pub const PRE_JOB_TITLE: &str = "liquid pre-job";

/// Job tree plus the script-level settings.
#[derive(Clone, Debug)]
pub struct RenderScript {
    pub title: String,
    pub min_servers: u32,
    pub max_servers: u32,
    /// Alfred `-dirmaps` text.
    pub dirmaps: String,
    /// Commands run once the whole script finished.
    pub cleanup: Vec<Cmd>,
    jobs: Vec<Job>,
    /// Id -> index path from the top level.
    paths: HashMap<u32, Vec<usize>>,
    next_id: u32,
}

impl Default for RenderScript {
    fn default() -> Self {
        Self {
            title: "Liquid Job".into(),
            min_servers: 1,
            max_servers: 1,
            dirmaps: String::new(),
            cleanup: Vec::new(),
            jobs: Vec::new(),
            paths: HashMap::new(),
            next_id: 1,
        }
    }
}

impl RenderScript {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Add `job` at the top level (`parent == 0`) or under job `parent`.
    ///
    /// Returns the new job's id. An unknown parent is an error and leaves
    /// the script unchanged.
    pub fn add_job(&mut self, job: Job, parent: u32) -> Result<u32> {
        let path = if parent == 0 {
            self.jobs.push(job);
            vec![self.jobs.len() - 1]
        } else {
            let mut path = self.paths.get(&parent).cloned().ok_or(Error::UnknownParentJob(parent))?;
            let parent_job = self.job_at_mut(&path).ok_or(Error::UnknownParentJob(parent))?;
            parent_job.children.push(job);
            path.push(parent_job.children.len() - 1);
            path
        };
        let id = self.next_id;
        self.next_id += 1;
        self.paths.insert(id, path);
        Ok(id)
    }

    fn job_at_mut(&mut self, path: &[usize]) -> Option<&mut Job> {
        let (first, rest) = path.split_first()?;
        let mut job = self.jobs.get_mut(*first)?;
        for &i in rest {
            job = job.children.get_mut(i)?;
        }
        Some(job)
    }

    /// Job with id `id`.
    pub fn job(&self, id: u32) -> Option<&Job> {
        let path = self.paths.get(&id)?;
        let (first, rest) = path.split_first()?;
        let mut job = self.jobs.get(*first)?;
        for &i in rest {
            job = job.children.get(i)?;
        }
        Some(job)
    }

    /// Top-level jobs in insertion order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Append `job` under every leaf of every top-level job except instances
    /// and the pre-job.
    pub fn add_leaf_dependency(&mut self, job: &Job) {
        for top in self.jobs.iter_mut() {
            if !top.is_instance && top.title != PRE_JOB_TITLE {
                top.add_leaf_dependency(job);
            }
        }
    }

    /// Drop every job and reset ids.
    pub fn clear(&mut self) {
        self.jobs.clear();
        self.paths.clear();
        self.cleanup.clear();
        self.next_id = 1;
    }

    /// Write Alfred text to `path`.
    pub fn write_alf(&self, path: impl AsRef<Path>) -> Result<()> {
        write_text(path.as_ref(), &self.to_alf())
    }

    /// Write XML to `path`.
    pub fn write_xml(&self, path: impl AsRef<Path>) -> Result<()> {
        write_text(path.as_ref(), &self.to_xml())
    }
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::output(path, e))?;
    }
    std::fs::write(path, text).map_err(|e| Error::output(path, e))?;
    tracing::info!(script = %path.display(), "render script written");
    Ok(())
}
