//! Renderer launcher.
//!
//! Runs the renderer on a finished RIB file (or render script) in a
//! background thread. Translation does not wait for it; callers poll
//! [`RenderLauncher::status`] or block in [`RenderLauncher::wait`].

use crate::translator::RenderContext;
use parking_lot::Mutex;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// State of a launched renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchStatus {
    Running,
    /// Exited; `None` when killed by a signal.
    Finished(Option<i32>),
    /// Could not be started.
    Failed(String),
}

impl LaunchStatus {
    pub fn is_done(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn success(&self) -> bool {
        matches!(self, Self::Finished(Some(0)))
    }
}

/// Handle to a renderer process running in a worker thread.
pub struct RenderLauncher {
    program: String,
    status: Arc<Mutex<LaunchStatus>>,
    handle: Option<JoinHandle<()>>,
}

impl RenderLauncher {
    /// Start `program` with `args` in a worker thread.
    pub fn spawn(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let status = Arc::new(Mutex::new(LaunchStatus::Running));

        let shared = Arc::clone(&status);
        let name = program.clone();
        let handle = thread::spawn(move || {
            let result = Command::new(&name).args(&args).status();
            let next = match result {
                Ok(exit) => {
                    tracing::info!(program = %name, code = ?exit.code(), "renderer finished");
                    LaunchStatus::Finished(exit.code())
                }
                Err(e) => {
                    tracing::error!(program = %name, error = %e, "renderer failed to start");
                    LaunchStatus::Failed(e.to_string())
                }
            };
            *shared.lock() = next;
        });

        Self {
            program,
            status,
            handle: Some(handle),
        }
    }

    /// Render `file` with the renderer command and arguments of `ctx`.
    pub fn render(ctx: &RenderContext, file: &Path) -> Self {
        let mut words = ctx.job.render_command.split_whitespace();
        let program = words.next().unwrap_or("render").to_string();
        let mut args: Vec<String> = words.map(str::to_string).collect();
        args.extend(ctx.job.render_args.split_whitespace().map(str::to_string));
        args.push(file.display().to_string());
        tracing::info!(program = %program, file = %file.display(), "launching renderer");
        Self::spawn(program, args)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Current state, without blocking.
    pub fn status(&self) -> LaunchStatus {
        self.status.lock().clone()
    }

    /// Block until the renderer exits.
    pub fn wait(&mut self) -> LaunchStatus {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                let mut status = self.status.lock();
                if !status.is_done() {
                    *status = LaunchStatus::Failed("launcher thread panicked".into());
                }
            }
        }
        self.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_exit_codes() {
        let mut ok = RenderLauncher::spawn("true", Vec::new());
        assert!(ok.wait().success());
        let mut fail = RenderLauncher::spawn("false", Vec::new());
        assert_eq!(fail.wait(), LaunchStatus::Finished(Some(1)));
        assert!(fail.status().is_done());
    }

    #[test]
    fn test_missing_program() {
        let mut l = RenderLauncher::spawn("liquid-no-such-renderer", Vec::new());
        assert!(matches!(l.wait(), LaunchStatus::Failed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_render_uses_context_command() {
        let mut ctx = RenderContext::default();
        ctx.job.render_command = "test -e".into();
        let dir = tempfile::tempdir().unwrap();
        let rib = dir.path().join("shot.0001.rib");
        std::fs::write(&rib, "WorldBegin\nWorldEnd\n").unwrap();
        let mut l = RenderLauncher::render(&ctx, &rib);
        assert_eq!(l.program(), "test");
        assert!(l.wait().success());
    }
}
