//! ASCII RIB value formatting.

use crate::param::{ParamValue, TypedParameter};
use std::fmt::Write;

/// Format a float in its shortest round-trip form, `0` for negative zero.
/// RIB has no spelling for NaN or infinity: NaN becomes `0` and infinities
/// clamp to the largest finite value.
pub fn fmt_float(out: &mut String, v: f32) {
    let v = if v.is_finite() {
        v
    } else {
        let clamped = if v.is_nan() { 0.0 } else { v.clamp(f32::MIN, f32::MAX) };
        tracing::warn!(value = %v, written = clamped, "non-finite float clamped");
        clamped
    };
    if v == 0.0 {
        out.push('0');
    } else {
        let _ = write!(out, "{v}");
    }
}

/// Quote and escape a string.
pub fn fmt_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// `[a b c]` for floats.
pub fn fmt_float_array(out: &mut String, values: &[f32]) {
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        fmt_float(out, *v);
    }
    out.push(']');
}

/// `[a b c]` for integers.
pub fn fmt_int_array(out: &mut String, values: &[i32]) {
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{v}");
    }
    out.push(']');
}

/// `["a" "b"]`
pub fn fmt_string_array<S: AsRef<str>>(out: &mut String, values: &[S]) {
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        fmt_string(out, v.as_ref());
    }
    out.push(']');
}

/// Append ` "decl name" [values]` for each parameter.
pub fn fmt_params(out: &mut String, params: &[TypedParameter]) {
    for p in params {
        out.push(' ');
        fmt_string(out, &p.detailed_name());
        out.push(' ');
        match p.value() {
            ParamValue::Floats(v) => fmt_float_array(out, v),
            ParamValue::Strings(v) => fmt_string_array(out, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{DetailType, ParameterType};

    #[test]
    fn test_numbers() {
        let mut s = String::new();
        fmt_float_array(&mut s, &[1.0, -0.0, 0.5, -2.25]);
        assert_eq!(s, "[1 0 0.5 -2.25]");
        s.clear();
        fmt_int_array(&mut s, &[3, -1]);
        assert_eq!(s, "[3 -1]");
    }

    #[test]
    fn test_non_finite_clamped() {
        let mut s = String::new();
        fmt_float_array(&mut s, &[f32::NAN, f32::INFINITY, f32::NEG_INFINITY]);
        assert_eq!(s, format!("[0 {} {}]", f32::MAX, f32::MIN));
        assert!(!s.contains("NaN"));
        assert!(!s.contains("inf"));
    }

    #[test]
    fn test_strings_escaped() {
        let mut s = String::new();
        fmt_string(&mut s, r#"a "b" \c"#);
        assert_eq!(s, r#""a \"b\" \\c""#);
    }

    #[test]
    fn test_param_list() {
        let mut s = String::new();
        let mut st = TypedParameter::new("st", ParameterType::Float, 1, 2);
        st.set_detail(DetailType::FaceVarying);
        st.set_floats(&[0.25, 1.0]);
        fmt_params(&mut s, &[st, TypedParameter::string("name", "x")]);
        assert_eq!(s, r#" "facevarying float[2] st" [0.25 1] "constant string name" ["x"]"#);
    }
}
