//! Shader binding.
//!
//! Shader introspection is an external collaborator: its answer arrives as a
//! [`ShaderQuery`] (parallel arrays, one entry per parameter) which is
//! validated into a [`ShaderInfo`]. A [`ShaderInstance`] combines the info
//! with a node's overrides and builds the parameter list for one RI call.

use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::ri::{LightHandle, Ri};
use crate::scene::Value;
use crate::util::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter pulled out of the list and written as `ShadingRate`.
pub const SHADING_RATE_PARAM: &str = "liquidShadingRate";

/// Shader class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderKind {
    #[default]
    Surface,
    Displacement,
    Volume,
    Light,
}

impl ShaderKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Surface => "surface",
            Self::Displacement => "displacement",
            Self::Volume => "volume",
            Self::Light => "light",
        }
    }
}

/// Raw introspection answer, one entry per parameter in each array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderQuery {
    /// Compiled shader name as passed to the renderer.
    pub name: String,
    pub kind: ShaderKind,
    pub names: Vec<String>,
    pub types: Vec<ParameterType>,
    pub details: Vec<DetailType>,
    pub array_sizes: Vec<usize>,
    pub defaults: Vec<Value>,
    pub outputs: Vec<bool>,
    /// Connection filter; non-empty on string parameters marks a shader handle.
    pub accepts: Vec<String>,
    /// Also written in shadow passes.
    pub output_in_shadow: bool,
}

/// One validated shader parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderParam {
    pub name: String,
    pub ty: ParameterType,
    pub detail: DetailType,
    pub array_size: usize,
    pub default: Value,
    pub output: bool,
    pub accept: String,
}

/// Validated shader description.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderInfo {
    pub name: String,
    pub kind: ShaderKind,
    pub params: Vec<ShaderParam>,
    pub output_in_shadow: bool,
}

impl ShaderInfo {
    /// Validate `query`. Any array whose length differs from the parameter
    /// count is unrecoverable for this shader.
    pub fn from_query(query: &ShaderQuery) -> Result<Self> {
        let expected = query.names.len();
        let check = |field: &'static str, actual: usize| -> Result<()> {
            if actual != expected {
                return Err(Error::ShaderInfoMismatch {
                    shader: query.name.clone(),
                    field,
                    expected,
                    actual,
                });
            }
            Ok(())
        };
        check("types", query.types.len())?;
        check("details", query.details.len())?;
        check("array_sizes", query.array_sizes.len())?;
        check("defaults", query.defaults.len())?;
        check("outputs", query.outputs.len())?;
        check("accepts", query.accepts.len())?;

        let params = (0..expected)
            .map(|i| ShaderParam {
                name: query.names[i].clone(),
                ty: query.types[i],
                detail: query.details[i],
                array_size: query.array_sizes[i],
                default: query.defaults[i].clone(),
                output: query.outputs[i],
                accept: query.accepts[i].clone(),
            })
            .collect();

        Ok(Self {
            name: query.name.clone(),
            kind: query.kind,
            params,
            output_in_shadow: query.output_in_shadow,
        })
    }
}

/// Shader bound to one node.
#[derive(Clone, Debug)]
pub struct ShaderInstance<'a> {
    pub info: &'a ShaderInfo,
    pub overrides: &'a BTreeMap<String, Value>,
}

/// Parameter list plus the shading rate carried by the shader, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderParameters {
    pub params: Vec<TypedParameter>,
    pub shading_rate: Option<f32>,
}

impl<'a> ShaderInstance<'a> {
    pub fn new(info: &'a ShaderInfo, overrides: &'a BTreeMap<String, Value>) -> Self {
        Self { info, overrides }
    }

    /// Build the typed parameter list.
    ///
    /// Output parameters are skipped; string parameters with an accept
    /// filter are written as shader handles.
    pub fn parameters(&self) -> ShaderParameters {
        let mut out = ShaderParameters::default();
        for p in &self.info.params {
            if p.output {
                continue;
            }
            let value = self.overrides.get(&p.name).unwrap_or(&p.default);
            if p.name == SHADING_RATE_PARAM {
                out.shading_rate = value.as_floats().first().copied();
                continue;
            }
            out.params.push(build_param(&self.info.name, p, value));
        }
        out
    }

    /// Emit the shader call matching its kind.
    ///
    /// Light shaders return the new light handle.
    pub fn write(&self, ri: &mut dyn Ri) -> Result<Option<LightHandle>> {
        let built = self.parameters();
        if let Some(rate) = built.shading_rate {
            ri.shading_rate(rate)?;
        }
        let name = self.info.name.as_str();
        match self.info.kind {
            ShaderKind::Surface => ri.surface(name, &built.params)?,
            ShaderKind::Displacement => ri.displacement(name, &built.params)?,
            ShaderKind::Volume => ri.atmosphere(name, &built.params)?,
            ShaderKind::Light => return ri.light_source(name, &built.params).map(Some),
        }
        Ok(None)
    }
}

fn build_param(shader: &str, p: &ShaderParam, value: &Value) -> TypedParameter {
    let ty = if p.ty == ParameterType::String && !p.accept.is_empty() {
        ParameterType::Shader
    } else {
        p.ty
    };

    if ty.is_string() {
        let values = value.as_strings();
        let count = if p.array_size > 0 { p.array_size } else { 1 };
        let mut param = TypedParameter::new(&p.name, ty, p.array_size, 0).with_detail(p.detail);
        for i in 0..count {
            param.set_string(i, values.get(i).cloned().unwrap_or_default());
        }
        return param;
    }

    // Shader arrays are fixed-size sub-arrays of one element: `float[4] name`.
    let mut param = TypedParameter::new(&p.name, ty, 0, p.array_size).with_detail(p.detail);
    let wanted = param.float_data().len();
    let values = value.as_floats();
    if values.len() != wanted {
        tracing::warn!(
            shader,
            parameter = %p.name,
            expected = wanted,
            actual = values.len(),
            "shader parameter value has the wrong size"
        );
    }
    let n = values.len().min(wanted);
    param.set_floats(&values[..n]);
    param
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ri::RibWriter;

    fn query() -> ShaderQuery {
        ShaderQuery {
            name: "plastic".into(),
            kind: ShaderKind::Surface,
            names: vec!["Kd".into(), "texname".into(), "weights".into(), "out".into(), SHADING_RATE_PARAM.into()],
            types: vec![
                ParameterType::Float,
                ParameterType::String,
                ParameterType::Float,
                ParameterType::Color,
                ParameterType::Float,
            ],
            details: vec![DetailType::Uniform; 5],
            array_sizes: vec![0, 0, 2, 0, 0],
            defaults: vec![
                Value::Float(0.5),
                Value::String(String::new()),
                Value::Floats(vec![1.0, 2.0]),
                Value::Floats(vec![0.0; 3]),
                Value::Float(2.0),
            ],
            outputs: vec![false, false, false, true, false],
            accepts: vec![String::new(); 5],
            output_in_shadow: false,
        }
    }

    #[test]
    fn test_mismatch_is_reported() {
        let mut q = query();
        q.details.pop();
        let err = ShaderInfo::from_query(&q).unwrap_err();
        match err {
            Error::ShaderInfoMismatch { field, expected, actual, .. } => {
                assert_eq!((field, expected, actual), ("details", 5, 4));
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_parameters_with_overrides() {
        let info = ShaderInfo::from_query(&query()).unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert("Kd".to_string(), Value::Float(0.8));
        let built = ShaderInstance::new(&info, &overrides).parameters();
        assert_eq!(built.shading_rate, Some(2.0));
        let names: Vec<_> = built.params.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["Kd", "texname", "weights"]);
        assert_eq!(built.params[0].float_data(), &[0.8]);
        assert_eq!(built.params[2].detailed_name(), "uniform float[2] weights");
        assert_eq!(built.params[2].float_data(), &[1.0, 2.0]);
    }

    #[test]
    fn test_shader_handle_parameter() {
        let mut q = query();
        q.accepts[1] = "liquidShader".into();
        let info = ShaderInfo::from_query(&q).unwrap();
        let overrides = BTreeMap::new();
        let built = ShaderInstance::new(&info, &overrides).parameters();
        assert_eq!(built.params[1].parameter_type(), ParameterType::Shader);
    }

    #[test]
    fn test_write_surface() {
        let info = ShaderInfo::from_query(&query()).unwrap();
        let overrides = BTreeMap::new();
        let mut ri = RibWriter::new(Vec::new());
        let handle = ShaderInstance::new(&info, &overrides).write(&mut ri).unwrap();
        assert_eq!(handle, None);
        let text = String::from_utf8(ri.into_inner().unwrap()).unwrap();
        assert!(text.starts_with("ShadingRate 2\n"));
        assert!(text.contains("Surface \"plastic\" \"uniform float Kd\" [0.5]"));
    }
}
