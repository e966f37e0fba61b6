//! Outcome of a translation run.

use std::path::PathBuf;

/// An object left out of a RIB file.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedObject {
    pub frame: i64,
    pub path: String,
    pub reason: String,
}

/// What a run produced.
///
/// A cancelled run still reports the files of every frame it completed;
/// those files are valid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderReport {
    /// Committed RIB files, shadow passes before the beauty pass of each frame.
    pub rib_files: Vec<PathBuf>,
    /// Frames whose every job was written.
    pub frames_done: Vec<i64>,
    pub skipped: Vec<SkippedObject>,
    /// Render script, when one was written.
    pub script: Option<PathBuf>,
    pub cancelled: bool,
}

impl RenderReport {
    /// Fold the report of one frame into this one.
    pub fn merge(&mut self, other: RenderReport) {
        self.rib_files.extend(other.rib_files);
        self.frames_done.extend(other.frames_done);
        self.skipped.extend(other.skipped);
        self.cancelled |= other.cancelled;
        if other.script.is_some() {
            self.script = other.script;
        }
    }

    /// True when nothing was cancelled and every frame completed.
    pub fn is_complete(&self, frames: usize) -> bool {
        !self.cancelled && self.frames_done.len() == frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let mut a = RenderReport {
            rib_files: vec!["a.rib".into()],
            frames_done: vec![1],
            ..Default::default()
        };
        a.merge(RenderReport {
            rib_files: vec!["b.rib".into()],
            skipped: vec![SkippedObject {
                frame: 2,
                path: "|x".into(),
                reason: "empty".into(),
            }],
            cancelled: true,
            ..Default::default()
        });
        assert_eq!(a.rib_files.len(), 2);
        assert_eq!(a.skipped.len(), 1);
        assert!(a.cancelled);
        assert!(!a.is_complete(1));
    }
}
