//! Parameter element types and detail (interpolation) classes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a primitive or shader parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    #[default]
    Float,
    Point,
    Vector,
    Normal,
    Color,
    String,
    HPoint,
    Matrix,
    Shader,
    /// Integer option or attribute value, stored as floats.
    Int,
}

impl ParameterType {
    /// Number of floats per element. Strings and shader handles are stored
    /// separately and report 0.
    #[inline]
    pub const fn element_size(self) -> usize {
        match self {
            Self::Float | Self::Int => 1,
            Self::Point | Self::Vector | Self::Normal | Self::Color => 3,
            Self::HPoint => 4,
            Self::Matrix => 16,
            Self::String | Self::Shader => 0,
        }
    }

    /// True when values are stored as strings.
    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String | Self::Shader)
    }

    /// RIB spelling of the type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Point => "point",
            Self::Vector => "vector",
            Self::Normal => "normal",
            Self::Color => "color",
            Self::String => "string",
            Self::HPoint => "hpoint",
            Self::Matrix => "matrix",
            Self::Shader => "shader",
            Self::Int => "int",
        }
    }

    /// Parse a RIB type name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "float" => Some(Self::Float),
            "point" => Some(Self::Point),
            "vector" => Some(Self::Vector),
            "normal" => Some(Self::Normal),
            "color" => Some(Self::Color),
            "string" => Some(Self::String),
            "hpoint" => Some(Self::HPoint),
            "matrix" => Some(Self::Matrix),
            "shader" => Some(Self::Shader),
            "int" => Some(Self::Int),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Interpolation class of a parameter across a primitive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailType {
    /// No detail prefix: the renderer default applies.
    #[default]
    Undefined,
    Uniform,
    Varying,
    Vertex,
    Constant,
    FaceVarying,
    FaceVertex,
}

impl DetailType {
    /// RIB spelling, empty for [`DetailType::Undefined`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "",
            Self::Uniform => "uniform",
            Self::Varying => "varying",
            Self::Vertex => "vertex",
            Self::Constant => "constant",
            Self::FaceVarying => "facevarying",
            Self::FaceVertex => "facevertex",
        }
    }

    /// Parse a RIB detail keyword.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uniform" => Some(Self::Uniform),
            "varying" => Some(Self::Varying),
            "vertex" => Some(Self::Vertex),
            "constant" => Some(Self::Constant),
            "facevarying" => Some(Self::FaceVarying),
            "facevertex" => Some(Self::FaceVertex),
            _ => None,
        }
    }

    /// True for the per-face-corner classes.
    #[inline]
    pub const fn is_face(self) -> bool {
        matches!(self, Self::FaceVarying | Self::FaceVertex)
    }
}

impl fmt::Display for DetailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_sizes() {
        assert_eq!(ParameterType::Float.element_size(), 1);
        assert_eq!(ParameterType::Color.element_size(), 3);
        assert_eq!(ParameterType::HPoint.element_size(), 4);
        assert_eq!(ParameterType::Matrix.element_size(), 16);
        assert_eq!(ParameterType::String.element_size(), 0);
        assert!(ParameterType::Shader.is_string());
    }

    #[test]
    fn test_names_parse_back() {
        for t in [
            ParameterType::Float,
            ParameterType::Point,
            ParameterType::Vector,
            ParameterType::Normal,
            ParameterType::Color,
            ParameterType::String,
            ParameterType::HPoint,
            ParameterType::Matrix,
            ParameterType::Shader,
            ParameterType::Int,
        ] {
            assert_eq!(ParameterType::parse(t.name()), Some(t));
        }
        assert_eq!(DetailType::parse("facevarying"), Some(DetailType::FaceVarying));
        assert_eq!(DetailType::parse(""), None);
        assert_eq!(DetailType::Undefined.name(), "");
    }
}
