//! Typed parameter storage.
//!
//! A [`TypedParameter`] owns one named, typed, detail-qualified payload and
//! renders itself as a RIB declaration plus a borrowed value for one RI call.
//!
//! Storage layout: `element_size(type) * max(array_size, 1) * max(u_array_size, 1)`
//! floats, or `max(array_size, 1)` strings for string-valued types.

use super::{DetailType, ParameterType};
use crate::util::{Error, Result};
use std::fmt;

/// Borrowed payload of a parameter, valid for the duration of one call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue<'a> {
    Floats(&'a [f32]),
    Strings(&'a [String]),
}

impl ParamValue<'_> {
    /// Number of scalar values (floats or strings).
    pub fn len(&self) -> usize {
        match self {
            Self::Floats(v) => v.len(),
            Self::Strings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One named parameter passed to a primitive or shader call.
///
/// `Clone` is a deep copy: each clone owns its payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypedParameter {
    name: String,
    ty: ParameterType,
    detail: DetailType,
    array_size: usize,
    u_array_size: usize,
    floats: Vec<f32>,
    strings: Vec<String>,
}

impl TypedParameter {
    /// Create a parameter, see [`TypedParameter::set`].
    pub fn new(name: impl Into<String>, ty: ParameterType, array_size: usize, u_array_size: usize) -> Self {
        let mut p = Self::default();
        p.set(name, ty, array_size, u_array_size);
        p
    }

    /// Scalar parameter with a detail class.
    pub fn scalar(name: impl Into<String>, ty: ParameterType, detail: DetailType) -> Self {
        Self::new(name, ty, 0, 0).with_detail(detail)
    }

    /// Array parameter with a detail class.
    pub fn array(name: impl Into<String>, ty: ParameterType, detail: DetailType, len: usize) -> Self {
        Self::new(name, ty, len, 0).with_detail(detail)
    }

    /// Constant float parameter holding `values`.
    pub fn floats(name: impl Into<String>, ty: ParameterType, detail: DetailType, values: &[f32]) -> Self {
        let n = ty.element_size().max(1);
        let count = values.len() / n;
        let mut p = Self::new(name, ty, if count > 1 { count } else { 0 }, 0).with_detail(detail);
        p.set_floats(values);
        p
    }

    /// Constant single string parameter.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut p = Self::scalar(name, ParameterType::String, DetailType::Constant);
        p.set_string(0, value);
        p
    }

    /// Single float without a detail prefix (options, attributes, shader arguments).
    pub fn float(name: impl Into<String>, v: f32) -> Self {
        Self::floats(name, ParameterType::Float, DetailType::Undefined, &[v])
    }

    /// Fixed-size float array without a detail prefix: `float[N] name`.
    pub fn float_array(name: impl Into<String>, values: &[f32]) -> Self {
        let mut p = Self::new(name, ParameterType::Float, 0, values.len());
        p.set_floats(values);
        p
    }

    /// Single integer.
    pub fn int(name: impl Into<String>, v: i32) -> Self {
        Self::floats(name, ParameterType::Int, DetailType::Undefined, &[v as f32])
    }

    /// Fixed-size integer array: `int[N] name`.
    pub fn ints(name: impl Into<String>, values: &[i32]) -> Self {
        let mut p = Self::new(name, ParameterType::Int, 0, if values.len() > 1 { values.len() } else { 0 });
        for (i, v) in values.iter().enumerate() {
            p.set_float(i, *v as f32);
        }
        p
    }

    /// Single color without a detail prefix.
    pub fn color(name: impl Into<String>, rgb: [f32; 3]) -> Self {
        Self::floats(name, ParameterType::Color, DetailType::Undefined, &rgb)
    }

    /// Single point without a detail prefix.
    pub fn point(name: impl Into<String>, p: [f32; 3]) -> Self {
        Self::floats(name, ParameterType::Point, DetailType::Undefined, &p)
    }

    /// Single string without a detail prefix.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut p = Self::new(name, ParameterType::String, 0, 0);
        p.set_string(0, value);
        p
    }

    /// (Re)initialise name, type and storage.
    ///
    /// `array_size == 0` makes a scalar; `u_array_size > 0` makes each element
    /// a fixed-size sub-array (`float[2] st`). Strings ignore `u_array_size`.
    pub fn set(&mut self, name: impl Into<String>, ty: ParameterType, array_size: usize, u_array_size: usize) {
        self.name = name.into();
        self.ty = ty;
        self.array_size = array_size;
        self.floats.clear();
        self.strings.clear();
        if ty.is_string() {
            self.u_array_size = 0;
            self.strings.resize(array_size.max(1), String::new());
        } else {
            self.u_array_size = u_array_size;
            self.floats.resize(self.float_len_for(array_size), 0.0);
        }
    }

    fn float_len_for(&self, array_size: usize) -> usize {
        self.ty.element_size() * array_size.max(1) * self.u_array_size.max(1)
    }

    /// Set the detail class.
    pub fn set_detail(&mut self, detail: DetailType) {
        self.detail = detail;
    }

    /// Builder form of [`TypedParameter::set_detail`].
    pub fn with_detail(mut self, detail: DetailType) -> Self {
        self.detail = detail;
        self
    }

    /// Grow to `size` elements, keeping what was written.
    ///
    /// The float buffer never shrinks; string storage follows `size`.
    pub fn reserve(&mut self, size: usize) -> usize {
        if self.ty.is_string() {
            self.strings.resize(size.max(1), String::new());
        } else {
            let needed = self.float_len_for(size);
            if needed > self.floats.len() {
                self.floats.resize(needed, 0.0);
            }
        }
        self.array_size = size;
        self.array_size
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.ty
    }

    pub fn detail(&self) -> DetailType {
        self.detail
    }

    /// Number of elements (0 for a scalar).
    pub fn array_size(&self) -> usize {
        self.array_size
    }

    /// Sub-array length per element (0 when not a u-array).
    pub fn u_array_size(&self) -> usize {
        self.u_array_size
    }

    pub fn is_array(&self) -> bool {
        self.array_size != 0
    }

    pub fn is_u_array(&self) -> bool {
        self.u_array_size != 0
    }

    /// Floats per element, u-array included.
    pub fn stride(&self) -> usize {
        self.ty.element_size() * self.u_array_size.max(1)
    }

    /// Float payload (empty for strings).
    pub fn float_data(&self) -> &[f32] {
        &self.floats[..self.float_len_for(self.array_size).min(self.floats.len())]
    }

    /// String payload (empty for numeric types).
    pub fn string_data(&self) -> &[String] {
        &self.strings
    }

    /// True when this is a plain (non face-varying) `st` parameter.
    pub fn is_basic_st(&self) -> bool {
        self.name == "st" && !self.detail.is_face()
    }

    // ========================================================================
    // Setters
    // ========================================================================

    /// Write one float at flat index `i`.
    #[inline]
    pub fn set_float(&mut self, i: usize, v: f32) {
        self.floats[i] = v;
    }

    /// Write one float of element `i`'s sub-array.
    #[inline]
    pub fn set_float_sub(&mut self, i: usize, sub: usize, v: f32) {
        let idx = i * self.u_array_size.max(1) + sub;
        self.floats[idx] = v;
    }

    /// Write a 3-float element.
    #[inline]
    pub fn set_float3(&mut self, i: usize, x: f32, y: f32, z: f32) {
        let o = self.ty.element_size() * i;
        self.floats[o..o + 3].copy_from_slice(&[x, y, z]);
    }

    /// Write a 4-float element.
    #[inline]
    pub fn set_float4(&mut self, i: usize, x: f32, y: f32, z: f32, w: f32) {
        let o = self.ty.element_size() * i;
        self.floats[o..o + 4].copy_from_slice(&[x, y, z, w]);
    }

    /// Write a matrix element.
    pub fn set_matrix(&mut self, i: usize, m: &[f32; 16]) {
        let o = self.ty.element_size() * i;
        self.floats[o..o + 16].copy_from_slice(m);
    }

    /// Copy `values` into the start of the payload.
    pub fn set_floats(&mut self, values: &[f32]) {
        self.floats[..values.len()].copy_from_slice(values);
    }

    /// Write string element `i`.
    pub fn set_string(&mut self, i: usize, s: impl Into<String>) {
        self.strings[i] = s.into();
    }

    // ========================================================================
    // Wire form
    // ========================================================================

    /// Declaration text without the name, e.g. `facevarying float[2]`.
    pub fn declare(&self) -> String {
        let mut out = String::new();
        if self.detail != DetailType::Undefined {
            out.push_str(self.detail.name());
            out.push(' ');
        }
        out.push_str(self.ty.name());
        let bracket = if self.ty.is_string() {
            self.array_size
        } else {
            self.u_array_size
        };
        if bracket != 0 {
            out.push_str(&format!("[{bracket}]"));
        }
        out
    }

    /// Full inline declaration `declare name`. `P` is left bare since every
    /// renderer predeclares it and some reject a redeclaration on curves.
    pub fn detailed_name(&self) -> String {
        if self.name == "P" {
            return self.name.clone();
        }
        format!("{} {}", self.declare(), self.name)
    }

    /// Payload for one RI call.
    pub fn value(&self) -> ParamValue<'_> {
        if self.ty.is_string() {
            ParamValue::Strings(&self.strings)
        } else {
            ParamValue::Floats(self.float_data())
        }
    }

    /// Payload of element `i` only (whole payload for scalars).
    pub fn ith_value(&self, i: usize) -> ParamValue<'_> {
        if self.ty.is_string() {
            ParamValue::Strings(std::slice::from_ref(&self.strings[i]))
        } else if self.is_array() {
            let s = self.stride();
            ParamValue::Floats(&self.floats[s * i..s * (i + 1)])
        } else {
            ParamValue::Floats(self.float_data())
        }
    }
}

impl fmt::Display for TypedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detailed_name())
    }
}

/// Parsed inline declaration `[detail ]type[N] name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub detail: DetailType,
    pub ty: ParameterType,
    /// Bracketed count, 0 when absent.
    pub count: usize,
    pub name: String,
}

impl Declaration {
    /// Parse a declaration. The name is optional so the output of
    /// [`TypedParameter::declare`] parses as well.
    pub fn parse(text: &str) -> Result<Self> {
        let bad = || Error::InvalidParameter(format!("bad declaration '{text}'"));
        let mut words = text.split_whitespace();
        let mut word = words.next().ok_or_else(bad)?;
        let detail = match DetailType::parse(word) {
            Some(d) => {
                word = words.next().ok_or_else(bad)?;
                d
            }
            None => DetailType::Undefined,
        };
        let (type_name, count) = match word.find('[') {
            Some(open) => {
                let close = word.rfind(']').filter(|c| *c > open).ok_or_else(bad)?;
                let n = word[open + 1..close].parse::<usize>().map_err(|_| bad())?;
                (&word[..open], n)
            }
            None => (word, 0),
        };
        let ty = ParameterType::parse(type_name).ok_or_else(bad)?;
        let name = words.next().unwrap_or_default().to_string();
        if words.next().is_some() {
            return Err(bad());
        }
        Ok(Self { detail, ty, count, name })
    }
}
