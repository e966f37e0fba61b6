//! User primitive variables from `rman*` attributes.
//!
//! Attribute keys carry a five character prefix selecting the type:
//! `rmanF` float, `rmanP` point, `rmanV` vector, `rmanN` normal, `rmanC`
//! color, `rmanS` string. The rest of the key is the parameter name.

use crate::param::{DetailType, ParameterType, TypedParameter};
use crate::scene::Value;
use std::collections::BTreeMap;

/// How extra parameters map onto the primitive they are attached to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtraTarget {
    /// Face-vertex count for meshes and subdivision surfaces.
    pub face_vertices: Option<usize>,
    /// A `width` array is varying (cubic curves).
    pub varying_width: bool,
    /// `rmanP` values are homogeneous (NURBS).
    pub hpoints: bool,
}

fn prefix_type(prefix: &str, target: &ExtraTarget) -> Option<ParameterType> {
    Some(match prefix {
        "rmanF" => ParameterType::Float,
        "rmanP" if target.hpoints => ParameterType::HPoint,
        "rmanP" => ParameterType::Point,
        "rmanV" => ParameterType::Vector,
        "rmanN" => ParameterType::Normal,
        "rmanC" => ParameterType::Color,
        "rmanS" => ParameterType::String,
        _ => return None,
    })
}

/// Build the extra parameters found in `rman`.
///
/// Single values are constant; arrays are vertex, or facevarying when their
/// element count equals the face-vertex count. Values whose length is not a
/// multiple of the element size are skipped with a warning.
pub fn extra_params(rman: &BTreeMap<String, Value>, target: ExtraTarget) -> Vec<TypedParameter> {
    let mut out = Vec::new();
    for (key, value) in rman {
        let Some(prefix) = key.get(..5) else { continue };
        let name = &key[5..];
        if name.is_empty() {
            continue;
        }
        let Some(ty) = prefix_type(prefix, &target) else {
            continue;
        };

        if ty.is_string() {
            let values = value.as_strings();
            if values.is_empty() {
                tracing::warn!(attribute = %key, "string attribute without string values");
                continue;
            }
            let len = if values.len() > 1 { values.len() } else { 0 };
            let mut p = TypedParameter::new(name, ty, len, 0).with_detail(DetailType::Constant);
            for (i, s) in values.iter().enumerate() {
                p.set_string(i, s.clone());
            }
            out.push(p);
            continue;
        }

        let values = value.as_floats();
        let n = ty.element_size();
        if values.is_empty() || values.len() % n != 0 {
            tracing::warn!(attribute = %key, len = values.len(), "attribute size does not match its type");
            continue;
        }
        let count = values.len() / n;
        let detail = if count == 1 {
            DetailType::Constant
        } else if target.face_vertices == Some(count) {
            DetailType::FaceVarying
        } else if name == "width" && target.varying_width {
            DetailType::Varying
        } else {
            DetailType::Vertex
        };
        let mut p = TypedParameter::new(name, ty, if count > 1 { count } else { 0 }, 0).with_detail(detail);
        p.set_floats(values);
        out.push(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rman(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_detail_rules() {
        let attrs = rman(&[
            ("rmanFrough", Value::Float(0.2)),
            ("rmanFweight", Value::Floats(vec![1.0, 2.0, 3.0, 4.0])),
            ("rmanCtint", Value::Floats(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0])),
            ("rmanSmap", Value::String("a.tx".into())),
        ]);
        let ps = extra_params(&attrs, ExtraTarget { face_vertices: Some(4), ..Default::default() });
        let decl: Vec<_> = ps.iter().map(|p| p.detailed_name()).collect();
        assert_eq!(
            decl,
            [
                "vertex color tint",
                "constant float rough",
                "facevarying float weight",
                "constant string map",
            ]
        );
    }

    #[test]
    fn test_nurbs_points_and_curve_width() {
        let attrs = rman(&[
            ("rmanPrest", Value::Floats(vec![0.0; 8])),
            ("rmanFwidth", Value::Floats(vec![0.1, 0.2, 0.3])),
        ]);
        let target = ExtraTarget { hpoints: true, varying_width: true, ..Default::default() };
        let ps = extra_params(&attrs, target);
        assert_eq!(ps[0].detailed_name(), "varying float width");
        assert_eq!(ps[1].detailed_name(), "vertex hpoint rest");
    }

    #[test]
    fn test_bad_sizes_are_skipped() {
        let attrs = rman(&[
            ("rmanCbad", Value::Floats(vec![1.0, 2.0])),
            ("rmanX", Value::Float(1.0)),
            ("rmanF", Value::Float(1.0)),
            ("other", Value::Float(1.0)),
        ]);
        assert!(extra_params(&attrs, ExtraTarget::default()).is_empty());
    }
}
