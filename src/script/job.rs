//! Commands and jobs of a render script.

use serde::{Deserialize, Serialize};

/// One command line of a job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cmd {
    pub command: String,
    /// Run on a farm server rather than the submitting host.
    pub remote: bool,
    /// Let Alfred expand the command's output into new tasks.
    pub alfred_expand: bool,
    pub alfred_tags: String,
    pub alfred_services: String,
}

impl Default for Cmd {
    fn default() -> Self {
        Self {
            command: String::new(),
            remote: true,
            alfred_expand: false,
            alfred_tags: String::new(),
            alfred_services: String::new(),
        }
    }
}

impl Cmd {
    pub fn new(command: impl Into<String>, remote: bool) -> Self {
        Self {
            command: command.into(),
            remote,
            ..Default::default()
        }
    }

    /// Builder: Alfred tags.
    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.alfred_tags = tags.into();
        self
    }

    /// Builder: Alfred services.
    pub fn with_services(mut self, services: impl Into<String>) -> Self {
        self.alfred_services = services.into();
        self
    }

    /// Builder: Alfred expand flag.
    pub fn with_expand(mut self, expand: bool) -> Self {
        self.alfred_expand = expand;
        self
    }
}

/// A task with its commands, cleanup, chaser and dependent subtasks.
///
/// Children run before their parent. An instance job only references the
/// task titled `title` elsewhere in the tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub title: String,
    pub commands: Vec<Cmd>,
    pub cleanup: Vec<Cmd>,
    /// Command run on demand, e.g. to display the finished image.
    pub chaser: String,
    pub children: Vec<Job>,
    pub is_instance: bool,
}

impl Job {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Reference to the task titled `title`.
    pub fn instance(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            is_instance: true,
            ..Default::default()
        }
    }

    /// Builder: append a command.
    pub fn with_command(mut self, cmd: Cmd) -> Self {
        self.commands.push(cmd);
        self
    }

    /// Append `job` under every leaf of this tree. Instance children do not
    /// count as children.
    pub fn add_leaf_dependency(&mut self, job: &Job) {
        let mut has_children = false;
        for child in self.children.iter_mut().filter(|c| !c.is_instance) {
            has_children = true;
            child.add_leaf_dependency(job);
        }
        if !has_children {
            self.children.push(job.clone());
        }
    }

    /// Number of jobs in this tree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Job::count).sum::<usize>()
    }
}
