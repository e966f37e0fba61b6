//! RIB generators: plugins that emit RIB for an object at write time.
//!
//! A generator is found by path. [`GeneratorRegistry`] first looks for an
//! in-process generator registered under that name, then falls back to
//! loading a shared library exporting `RIBGenCreate` / `RIBGenDestroy`.
//! Text the generator emits through its write callback is collected and
//! written verbatim.

use super::{BuildContext, WriteContext};
use crate::ri::Ri;
use crate::util::{Error, Result};
use parking_lot::Mutex;
use ribgen_api::{CreateFn, DestroyFn, RibGenStatus, Severity, CREATE_SYMBOL, DESTROY_SYMBOL, MAX_MOTION_SAMPLES};
use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::{c_char, c_void};
use std::sync::Arc;

/// Source of generated RIB.
pub trait RibGenLoader: Sync {
    /// Run the generator at `path` for `object` and return what it emitted.
    fn generate(&self, path: &str, object: &str, ctx: &WriteContext<'_>) -> Result<String>;
}

unsafe extern "C" fn append_text(host: *mut c_void, text: *const c_char, len: usize) {
    if host.is_null() || text.is_null() {
        return;
    }
    // SAFETY: `host` is the `String` owned by `invoke` for this call.
    let out = unsafe { &mut *(host as *mut String) };
    let bytes = unsafe { std::slice::from_raw_parts(text as *const u8, len) };
    out.push_str(&String::from_utf8_lossy(bytes));
}

unsafe extern "C" fn report_text(_host: *mut c_void, severity: Severity, text: *const c_char, len: usize) {
    if text.is_null() {
        return;
    }
    // SAFETY: the generator passes a valid buffer of `len` bytes.
    let bytes = unsafe { std::slice::from_raw_parts(text as *const u8, len) };
    let message = String::from_utf8_lossy(bytes);
    match severity {
        Severity::Info => tracing::info!(target: "ribgen", "{message}"),
        Severity::Warning => tracing::warn!(target: "ribgen", "{message}"),
        Severity::Error | Severity::Severe => tracing::error!(target: "ribgen", "{message}"),
    }
}

fn ribgen_error(path: &str, object: &str, message: impl Into<String>) -> Error {
    Error::RibGen {
        path: path.to_string(),
        object: object.to_string(),
        message: message.into(),
    }
}

/// Create a generator, run it once and destroy it.
fn invoke(create: CreateFn, destroy: DestroyFn, path: &str, object: &str, ctx: &WriteContext<'_>) -> Result<String> {
    let name = CString::new(object).map_err(|e| ribgen_error(path, object, e.to_string()))?;
    let mut out = String::new();

    let mut sample_times = [0.0f32; MAX_MOTION_SAMPLES];
    let n = ctx.sample_times.len().min(MAX_MOTION_SAMPLES);
    sample_times[..n].copy_from_slice(&ctx.sample_times[..n]);

    let status = RibGenStatus {
        frame: ctx.frame,
        render_pass: ctx.pass,
        trans_blur: ctx.transformation_blur,
        def_blur: ctx.deformation_blur,
        compressed: ctx.compress,
        binary: false,
        object_name: name.as_ptr(),
        camera_matrix: ctx.camera_matrix,
        shutter_angle: ctx.shutter_angle,
        sample_times,
        motion_samples: n as i32,
        host: &mut out as *mut String as *mut c_void,
        write: Some(append_text),
        report: Some(report_text),
    };

    // SAFETY: create/destroy come from the same generator; the status and
    // everything it points to outlive the call.
    let rc = unsafe {
        let generator = create();
        if generator.is_null() {
            return Err(ribgen_error(path, object, "RIBGenCreate returned null"));
        }
        let rc = ((*generator).gen_rib)(generator, &status);
        destroy(generator);
        rc
    };
    if rc != 0 {
        return Err(ribgen_error(path, object, format!("generator returned {rc}")));
    }
    Ok(out)
}

/// Loads generators from shared libraries, keeping each library open.
#[derive(Default)]
pub struct DylibLoader {
    libraries: Mutex<HashMap<String, Arc<libloading::Library>>>,
}

impl DylibLoader {
    fn library(&self, path: &str, object: &str) -> Result<Arc<libloading::Library>> {
        let mut libs = self.libraries.lock();
        if let Some(lib) = libs.get(path) {
            return Ok(lib.clone());
        }
        // SAFETY: loading runs the library's initialisers; generators are
        // trusted plugins named in the scene.
        let lib = unsafe { libloading::Library::new(path) }
            .map_err(|e| ribgen_error(path, object, format!("cannot load library: {e}")))?;
        let lib = Arc::new(lib);
        libs.insert(path.to_string(), lib.clone());
        Ok(lib)
    }
}

impl RibGenLoader for DylibLoader {
    fn generate(&self, path: &str, object: &str, ctx: &WriteContext<'_>) -> Result<String> {
        let lib = self.library(path, object)?;
        // SAFETY: symbol types are fixed by the plugin ABI.
        let (create, destroy) = unsafe {
            let create = *lib
                .get::<CreateFn>(CREATE_SYMBOL)
                .map_err(|e| ribgen_error(path, object, format!("missing RIBGenCreate: {e}")))?;
            let destroy = *lib
                .get::<DestroyFn>(DESTROY_SYMBOL)
                .map_err(|e| ribgen_error(path, object, format!("missing RIBGenDestroy: {e}")))?;
            (create, destroy)
        };
        invoke(create, destroy, path, object, ctx)
    }
}

/// In-process generators by name, with shared libraries as fallback.
#[derive(Default)]
pub struct GeneratorRegistry {
    builtin: HashMap<String, (CreateFn, DestroyFn)>,
    dylibs: DylibLoader,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generator, typically
    /// `create_boxed::<T>` / `destroy_boxed::<T>` for a [`ribgen_api::GenRib`] type.
    pub fn register(&mut self, name: impl Into<String>, create: CreateFn, destroy: DestroyFn) {
        self.builtin.insert(name.into(), (create, destroy));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.builtin.contains_key(name)
    }
}

impl RibGenLoader for GeneratorRegistry {
    fn generate(&self, path: &str, object: &str, ctx: &WriteContext<'_>) -> Result<String> {
        match self.builtin.get(path) {
            Some(&(create, destroy)) => invoke(create, destroy, path, object, ctx),
            None => self.dylibs.generate(path, object, ctx),
        }
    }
}

/// Object whose geometry comes from a RIB generator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RibGenData {
    /// Generator path after variable expansion.
    pub path: String,
    pub object: String,
}

impl RibGenData {
    pub fn build(shape: &crate::scene::RibGenShape, ctx: &BuildContext<'_>) -> Self {
        let path = ctx.expand.with_object(ctx.name, ctx.path).expand(&shape.path);
        Self {
            path,
            object: ctx.name.to_string(),
        }
    }

    pub fn is_writable(&self) -> bool {
        !self.path.is_empty()
    }

    /// Run the generator. A failing generator is logged and skipped so the
    /// rest of the frame still renders.
    pub fn write(&self, ri: &mut dyn Ri, ctx: &WriteContext<'_>) -> Result<()> {
        match ctx.loader.generate(&self.path, &self.object, ctx) {
            Ok(text) if text.is_empty() => Ok(()),
            Ok(text) => ri.verbatim(&text),
            Err(e) => {
                tracing::error!(path = %self.path, error = %e, "RIB generator failed, skipped");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::RibData;
    use super::*;
    use crate::ri::RibWriter;
    use crate::scene::RibGenShape;
    use ribgen_api::{create_boxed, destroy_boxed, GenRib};

    #[derive(Default)]
    struct Grass;

    impl GenRib for Grass {
        fn gen_rib(&mut self, status: &RibGenStatus) -> i32 {
            status.emit(&format!("# {} at {}\n", status.object_name(), status.frame));
            status.emit("Sphere 1 -1 1 360\n");
            0
        }
    }

    #[derive(Default)]
    struct Broken;

    impl GenRib for Broken {
        fn gen_rib(&mut self, _status: &RibGenStatus) -> i32 {
            3
        }
    }

    fn registry() -> GeneratorRegistry {
        let mut r = GeneratorRegistry::new();
        r.register("grass", create_boxed::<Grass>, destroy_boxed::<Grass>);
        r.register("broken", create_boxed::<Broken>, destroy_boxed::<Broken>);
        r
    }

    fn write(data: &RibGenData, loader: &GeneratorRegistry) -> String {
        let mut w = RibWriter::new(Vec::new());
        RibData::RibGen(data.clone()).write(&mut w, &write_ctx(loader)).unwrap();
        String::from_utf8(w.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_registered_generator_output() {
        let fx = Fixture::default();
        let data = RibGenData::build(&RibGenShape { path: "grass".into() }, &fx.ctx());
        assert!(data.is_writable());
        assert_eq!(write(&data, &registry()), "# obj at 1\nSphere 1 -1 1 360\n");
    }

    #[test]
    fn test_failures_are_skipped() {
        let fx = Fixture::default();
        let reg = registry();
        let broken = RibGenData::build(&RibGenShape { path: "broken".into() }, &fx.ctx());
        assert_eq!(write(&broken, &reg), "");

        let missing = RibGenData::build(&RibGenShape { path: "/no/such/gen.so".into() }, &fx.ctx());
        assert_eq!(write(&missing, &reg), "");
        let err = reg
            .generate(&missing.path, "obj", &write_ctx(&reg))
            .unwrap_err();
        assert!(matches!(err, Error::RibGen { .. }));
    }

    #[test]
    fn test_compare_by_path() {
        let fx = Fixture::default();
        let a = RibData::RibGen(RibGenData::build(&RibGenShape { path: "grass".into() }, &fx.ctx()));
        let b = RibData::RibGen(RibGenData::build(&RibGenShape { path: "moss".into() }, &fx.ctx()));
        assert!(a.compare(&a));
        assert!(!a.compare(&b));
        assert!(rib(&RibData::RibGen(RibGenData::default())).is_empty());
    }
}
