//! # Liquid RIB
//!
//! Translates a DCC scene graph into RenderMan Interface Bytestream (RIB)
//! files and farm render scripts.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math helpers, token substitution
//! - [`param`] - Typed shading parameters (token/value pairs of RI calls)
//! - [`ri`] - RI call sink and the ASCII RIB writer
//! - [`scene`] - Scene snapshot model and animated scene sources
//! - [`shader`] - Shader introspection data and shader instances
//! - [`data`] - Extractors turning scene shapes into RIB-ready data
//! - [`node`] - Per-object sample sets and animation detection
//! - [`translator`] - Render globals, jobs and the RIB block writer
//! - [`script`] - Alfred / XML render scripts
//! - [`launch`] - Background renderer launcher
//!
//! ## Example
//!
//! ```ignore
//! use liquid_rib::prelude::*;
//!
//! let ctx = RenderContext::load("globals.json")?;
//! let scene = Scene::load("shot.json")?;
//! let loader = GeneratorRegistry::default();
//! let report = Translator::new(&ctx, &loader).run(&scene)?;
//! for rib in &report.rib_files {
//!     println!("{}", rib.display());
//! }
//! ```

pub mod util;
pub mod param;
pub mod ri;
pub mod scene;
pub mod shader;
pub mod data;
pub mod node;
pub mod translator;
pub mod script;
pub mod launch;

// Re-export commonly used types
pub use util::{Error, Result, Severity};
pub use translator::{RenderContext, RenderReport, Translator};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result, Severity};
    pub use crate::param::TypedParameter;
    pub use crate::ri::{Ri, RibFile, RibWriter};
    pub use crate::scene::{AnimatedScene, Scene, SceneNode, SceneSource, Shape};
    pub use crate::data::{DylibLoader, GeneratorRegistry, RibData, RibGenLoader};
    pub use crate::translator::{CancelToken, FrameSpec, RenderContext, RenderReport, ScriptFormat, Translator};
    pub use crate::script::{Cmd, Job, RenderScript};
    pub use crate::launch::{LaunchStatus, RenderLauncher};
}
