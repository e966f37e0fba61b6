//! RIB generator plugin ABI.
//!
//! A RIB generator ("ribgen") is a shared library that procedurally emits RIB
//! for one scene object at render time. The translator loads it by path,
//! resolves two C entry points and drives it once per write:
//!
//! - [`CREATE_SYMBOL`] (`RIBGenCreate`) returns a new [`RibGenerator`]
//! - [`DESTROY_SYMBOL`] (`RIBGenDestroy`) releases it
//!
//! The generator object starts with a function pointer table so the host can
//! call [`RibGenerator::gen_rib`] without knowing the concrete type. Plugin
//! authors implement [`GenRib`] and use [`export_ribgen!`] to emit both symbols.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};

/// Name of the constructor symbol, NUL terminated for symbol lookup.
pub const CREATE_SYMBOL: &[u8] = b"RIBGenCreate\0";

/// Name of the destructor symbol, NUL terminated for symbol lookup.
pub const DESTROY_SYMBOL: &[u8] = b"RIBGenDestroy\0";

/// Maximum number of motion samples the host will pass.
pub const MAX_MOTION_SAMPLES: usize = 16;

/// Render pass the generator is invoked for.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderPass {
    #[default]
    Final = 0,
    Shadow = 1,
    Reflection = 2,
    Environment = 3,
    TraverseOnly = 4,
    Depth = 5,
    Reference = 6,
}

/// Severity used by [`RibGenStatus::report`].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info = 0,
    Warning = 1,
    Error = 2,
    Severe = 3,
}

/// Host callback that appends RIB text to the current output stream.
pub type WriteFn = unsafe extern "C" fn(ctx: *mut c_void, text: *const c_char, len: usize);

/// Host callback that reports a message from the generator.
pub type ReportFn =
    unsafe extern "C" fn(ctx: *mut c_void, severity: Severity, text: *const c_char, len: usize);

/// Plain data handed to a generator for one invocation.
///
/// All pointers are owned by the host and only valid for the duration of
/// the `gen_rib` call.
#[repr(C)]
pub struct RibGenStatus {
    pub frame: i64,
    pub render_pass: RenderPass,
    pub trans_blur: bool,
    pub def_blur: bool,
    pub compressed: bool,
    pub binary: bool,
    /// NUL terminated object name.
    pub object_name: *const c_char,
    /// Camera matrix, 16 floats in RIB order.
    pub camera_matrix: [f32; 16],
    pub shutter_angle: f32,
    pub sample_times: [f32; MAX_MOTION_SAMPLES],
    pub motion_samples: c_int,
    /// Opaque host context passed back to `write` and `report`.
    pub host: *mut c_void,
    pub write: Option<WriteFn>,
    pub report: Option<ReportFn>,
}

impl RibGenStatus {
    /// Object name as UTF-8 (lossy), empty when unset.
    pub fn object_name(&self) -> String {
        if self.object_name.is_null() {
            return String::new();
        }
        // SAFETY: the host guarantees a valid NUL terminated string for the call.
        unsafe { CStr::from_ptr(self.object_name) }
            .to_string_lossy()
            .into_owned()
    }

    /// Active motion sample times.
    pub fn sample_times(&self) -> &[f32] {
        let n = (self.motion_samples.max(0) as usize).min(MAX_MOTION_SAMPLES);
        &self.sample_times[..n]
    }

    /// Append RIB text to the host stream.
    pub fn emit(&self, rib: &str) {
        if let Some(write) = self.write {
            // SAFETY: `host` and `write` come from the same host invocation.
            unsafe { write(self.host, rib.as_ptr() as *const c_char, rib.len()) }
        }
    }

    /// Send a message to the host log.
    pub fn report(&self, severity: Severity, message: &str) {
        if let Some(report) = self.report {
            // SAFETY: see `emit`.
            unsafe { report(self.host, severity, message.as_ptr() as *const c_char, message.len()) }
        }
    }
}

/// Header shared by every generator object.
#[repr(C)]
pub struct RibGenerator {
    pub gen_rib: unsafe extern "C" fn(this: *mut RibGenerator, status: *const RibGenStatus) -> c_int,
}

/// Signature of `RIBGenCreate`.
pub type CreateFn = unsafe extern "C" fn() -> *mut RibGenerator;

/// Signature of `RIBGenDestroy`.
pub type DestroyFn = unsafe extern "C" fn(generator: *mut RibGenerator);

/// Rust side of a generator.
pub trait GenRib {
    /// Emit RIB through `status.emit`. Returns 0 on success.
    fn gen_rib(&mut self, status: &RibGenStatus) -> i32;
}

/// Generator object layout used by [`create_boxed`]: header first, then state.
#[repr(C)]
pub struct BoxedGenerator<T> {
    header: RibGenerator,
    inner: T,
}

unsafe extern "C" fn gen_rib_boxed<T: GenRib>(
    this: *mut RibGenerator,
    status: *const RibGenStatus,
) -> c_int {
    if this.is_null() || status.is_null() {
        return -1;
    }
    // SAFETY: `this` was produced by `create_boxed::<T>`, whose header is the
    // first field of a `repr(C)` `BoxedGenerator<T>`.
    let boxed = unsafe { &mut *(this as *mut BoxedGenerator<T>) };
    let status = unsafe { &*status };
    boxed.inner.gen_rib(status)
}

/// Allocate a `T` generator behind the C header.
///
/// # Safety
/// The returned pointer must be released with [`destroy_boxed::<T>`].
pub unsafe extern "C" fn create_boxed<T: GenRib + Default>() -> *mut RibGenerator {
    let boxed = Box::new(BoxedGenerator {
        header: RibGenerator { gen_rib: gen_rib_boxed::<T> },
        inner: T::default(),
    });
    Box::into_raw(boxed) as *mut RibGenerator
}

/// Release a generator created by [`create_boxed::<T>`].
///
/// # Safety
/// `generator` must come from `create_boxed::<T>` with the same `T`.
pub unsafe extern "C" fn destroy_boxed<T: GenRib + Default>(generator: *mut RibGenerator) {
    if !generator.is_null() {
        drop(unsafe { Box::from_raw(generator as *mut BoxedGenerator<T>) });
    }
}

/// Export `RIBGenCreate` / `RIBGenDestroy` for a [`GenRib`] type.
///
/// ```ignore
/// #[derive(Default)]
/// struct Grass;
/// impl ribgen_api::GenRib for Grass {
///     fn gen_rib(&mut self, status: &ribgen_api::RibGenStatus) -> i32 {
///         status.emit("Sphere 1 -1 1 360\n");
///         0
///     }
/// }
/// ribgen_api::export_ribgen!(Grass);
/// ```
#[macro_export]
macro_rules! export_ribgen {
    ($ty:ty) => {
        #[no_mangle]
        pub unsafe extern "C" fn RIBGenCreate() -> *mut $crate::RibGenerator {
            unsafe { $crate::create_boxed::<$ty>() }
        }

        #[no_mangle]
        pub unsafe extern "C" fn RIBGenDestroy(generator: *mut $crate::RibGenerator) {
            unsafe { $crate::destroy_boxed::<$ty>(generator) }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        calls: i32,
    }

    impl GenRib for Counter {
        fn gen_rib(&mut self, status: &RibGenStatus) -> i32 {
            self.calls += 1;
            status.emit("Sphere 1 -1 1 360\n");
            self.calls
        }
    }

    unsafe extern "C" fn collect(ctx: *mut c_void, text: *const c_char, len: usize) {
        let out = unsafe { &mut *(ctx as *mut String) };
        let bytes = unsafe { std::slice::from_raw_parts(text as *const u8, len) };
        out.push_str(&String::from_utf8_lossy(bytes));
    }

    fn status(out: &mut String) -> RibGenStatus {
        RibGenStatus {
            frame: 12,
            render_pass: RenderPass::Final,
            trans_blur: false,
            def_blur: false,
            compressed: false,
            binary: false,
            object_name: std::ptr::null(),
            camera_matrix: [0.0; 16],
            shutter_angle: 0.5,
            sample_times: [0.0; MAX_MOTION_SAMPLES],
            motion_samples: 1,
            host: out as *mut String as *mut c_void,
            write: Some(collect),
            report: None,
        }
    }

    #[test]
    fn test_boxed_generator_roundtrip() {
        let mut out = String::new();
        let st = status(&mut out);
        unsafe {
            let g = create_boxed::<Counter>();
            assert_eq!(((*g).gen_rib)(g, &st), 1);
            assert_eq!(((*g).gen_rib)(g, &st), 2);
            destroy_boxed::<Counter>(g);
        }
        assert_eq!(out, "Sphere 1 -1 1 360\nSphere 1 -1 1 360\n");
    }

    #[test]
    fn test_sample_times_clamped() {
        let mut out = String::new();
        let mut st = status(&mut out);
        st.motion_samples = 40;
        assert_eq!(st.sample_times().len(), MAX_MOTION_SAMPLES);
        st.motion_samples = -3;
        assert!(st.sample_times().is_empty());
        assert_eq!(st.object_name(), "");
    }
}
