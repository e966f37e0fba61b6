//! Token substitution for user-supplied path and command strings.
//!
//! Strings coming from render globals or node attributes may contain tokens
//! resolved against the current frame and project layout:
//!
//! | token | value |
//! |-------|-------|
//! | `$F`, `@` | frame number |
//! | `#`, `##`, ... | zero-padded frame (a single `#` pads to 4, at most 20) |
//! | `$SCN` | scene name |
//! | `$IMG` | primary display image name |
//! | `$PDIR`, `$PROJDIR` | project directory |
//! | `$RDIR`, `$RIBDIR` | RIB directory |
//! | `$TDIR`, `$TEXDIR` | texture directory |
//! | `$OBJ`, `$OBJPATH` | current object short name / full path |
//! | `$SHOT`, `$VER` | shot name / version |
//! | `$LYR`, `$LAYER` | render layer |
//! | `$TEX` | texture file extension |
//! | `%NAME%` | environment variable |
//! | `` `cmd` `` | output of a host command, see [`CommandEvaluator`] |
//!
//! A backslash escapes `$`, `@`, `#`, `%` and the backtick.

use std::path::Path;

/// Evaluates backtick-quoted commands embedded in strings.
pub trait CommandEvaluator {
    /// Return the textual result of `command`, or `None` if it failed.
    fn evaluate(&self, command: &str) -> Option<String>;
}

/// Evaluator that never resolves anything: the command text is kept verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCommands;

impl CommandEvaluator for NoCommands {
    fn evaluate(&self, _command: &str) -> Option<String> {
        None
    }
}

/// Values substituted for tokens.
#[derive(Clone, Debug, Default)]
pub struct ExpandContext {
    pub frame: i64,
    pub scene_name: String,
    pub image_name: String,
    pub project_dir: String,
    pub rib_dir: String,
    pub texture_dir: String,
    pub object_name: String,
    pub object_path: String,
    pub shot: String,
    pub version: String,
    pub layer: String,
    pub texture_ext: String,
}

impl ExpandContext {
    /// Copy of this context for another object.
    pub fn with_object(&self, name: &str, path: &str) -> Self {
        Self {
            object_name: name.to_string(),
            object_path: path.to_string(),
            ..self.clone()
        }
    }

    /// Copy of this context at another frame.
    pub fn at_frame(&self, frame: i64) -> Self {
        Self { frame, ..self.clone() }
    }

    /// Expand tokens without a command evaluator.
    pub fn expand(&self, input: &str) -> String {
        parse_string(input, self, false, &NoCommands)
    }
}

// Longest names first where one is a prefix of another.
const TOKENS: &[&str] = &[
    "OBJPATH", "PROJDIR", "TEXDIR", "RIBDIR", "LAYER", "SHOT", "PDIR", "RDIR", "TDIR", "SCN",
    "IMG", "OBJ", "VER", "LYR", "TEX", "F",
];

fn token_value<'a>(token: &str, ctx: &'a ExpandContext) -> std::borrow::Cow<'a, str> {
    use std::borrow::Cow;
    match token {
        "F" => Cow::Owned(ctx.frame.to_string()),
        "SCN" => Cow::Borrowed(&ctx.scene_name),
        "IMG" => Cow::Borrowed(&ctx.image_name),
        "PDIR" | "PROJDIR" => Cow::Borrowed(&ctx.project_dir),
        "RDIR" | "RIBDIR" => Cow::Borrowed(&ctx.rib_dir),
        "TDIR" | "TEXDIR" => Cow::Borrowed(&ctx.texture_dir),
        "OBJ" => Cow::Borrowed(&ctx.object_name),
        "OBJPATH" => Cow::Borrowed(&ctx.object_path),
        "SHOT" => Cow::Borrowed(&ctx.shot),
        "VER" => Cow::Borrowed(&ctx.version),
        "LYR" | "LAYER" => Cow::Borrowed(&ctx.layer),
        "TEX" => Cow::Borrowed(&ctx.texture_ext),
        _ => Cow::Borrowed(""),
    }
}

/// Expand all tokens in `input`.
///
/// Leading and trailing whitespace is trimmed and raw newlines / tabs become
/// spaces. With `escaped` set, the two-character sequences `\n` and `\t` are
/// turned into real newlines and tabs.
pub fn parse_string(
    input: &str,
    ctx: &ExpandContext,
    escaped: bool,
    commands: &dyn CommandEvaluator,
) -> String {
    let chars: Vec<char> = input.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            '\n' | '\t' => out.push(' '),
            '\\' => match next {
                Some(e @ ('$' | '@' | '#' | '%' | '`')) => {
                    out.push(e);
                    i += 1;
                }
                Some('n') if escaped => {
                    out.push('\n');
                    i += 1;
                }
                Some('t') if escaped => {
                    out.push('\t');
                    i += 1;
                }
                _ => out.push('\\'),
            },
            '$' => {
                let rest: String = chars[i + 1..].iter().collect();
                match TOKENS.iter().find(|t| rest.starts_with(**t)) {
                    Some(token) => {
                        out.push_str(&token_value(token, ctx));
                        i += token.len();
                    }
                    None => out.push('$'),
                }
            }
            '@' => out.push_str(&ctx.frame.to_string()),
            '#' => {
                let mut width = 0;
                while chars.get(i + width) == Some(&'#') {
                    width += 1;
                }
                i += width - 1;
                let width = if width == 1 { 4 } else { width.min(20) };
                out.push_str(&pad_frame(ctx.frame, width));
            }
            '%' => {
                let close = chars[i + 1..].iter().position(|c| *c == '%');
                match close {
                    Some(len) => {
                        let name: String = chars[i + 1..i + 1 + len].iter().collect();
                        if let Ok(value) = std::env::var(&name) {
                            out.push_str(&value);
                        }
                        i += len + 1;
                    }
                    None => out.push('%'),
                }
            }
            '`' => {
                let close = chars[i + 1..].iter().position(|c| *c == '`');
                match close {
                    Some(len) => {
                        let command: String = chars[i + 1..i + 1 + len].iter().collect();
                        match commands.evaluate(&command) {
                            Some(result) => out.push_str(&result),
                            None => {
                                tracing::warn!(command = %command, "unresolved embedded command");
                                out.push('`');
                                out.push_str(&command);
                                out.push('`');
                            }
                        }
                        i += len + 1;
                    }
                    None => out.push('`'),
                }
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Zero-pad `frame` to `width` digits (sign excluded).
pub fn pad_frame(frame: i64, width: usize) -> String {
    if frame < 0 {
        format!("-{:0width$}", -frame, width = width)
    } else {
        format!("{:0width$}", frame, width = width)
    }
}

/// Replace DAG separators so a node path can be used as an identifier or file name.
pub fn sanitize_node_name(name: &str) -> String {
    name.replace(['|', ':'], "_")
}

/// Use forward slashes throughout.
pub fn sanitize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Make `name` relative to `dir` (when `relative`) or absolute under it.
pub fn relative_path(relative: bool, name: &str, dir: &str) -> String {
    let is_full = name.starts_with('/') || name.chars().nth(1) == Some(':');
    if relative {
        if is_full && !dir.is_empty() {
            if let Some(stripped) = name.strip_prefix(dir) {
                return stripped.to_string();
            }
        }
        name.to_string()
    } else if is_full {
        name.to_string()
    } else {
        format!("{dir}{name}")
    }
}

/// Scene name derived from the scene file: base name without extension.
pub fn scene_name_from_path(path: Option<&Path>) -> String {
    path.and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "untitled".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExpandContext {
        ExpandContext {
            frame: 7,
            scene_name: "shot01".into(),
            project_dir: "/proj/".into(),
            rib_dir: "rib/".into(),
            texture_dir: "tex/".into(),
            object_name: "pCube1".into(),
            object_path: "|group1|pCube1".into(),
            texture_ext: "tex".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_frame_tokens() {
        let c = ctx();
        assert_eq!(c.expand("$SCN.$F.rib"), "shot01.7.rib");
        assert_eq!(c.expand("img.#.tif"), "img.0007.tif");
        assert_eq!(c.expand("img.##.tif"), "img.07.tif");
        assert_eq!(c.expand("img.@.tif"), "img.7.tif");
    }

    #[test]
    fn test_prefix_tokens() {
        let c = ctx();
        assert_eq!(c.expand("$OBJPATH"), "|group1|pCube1");
        assert_eq!(c.expand("$OBJ_x"), "pCube1_x");
        assert_eq!(c.expand("$TEXDIR$OBJ.$TEX"), "tex/pCube1.tex");
        assert_eq!(c.expand("$PROJDIR$RIBDIR"), "/proj/rib/");
        assert_eq!(c.expand("$NOPE"), "$NOPE");
    }

    #[test]
    fn test_escapes() {
        let c = ctx();
        assert_eq!(c.expand(r"cost\$F"), "cost$F");
        assert_eq!(c.expand(r"a\#b\@"), "a#b@");
        let s = parse_string(r"a\nb", &c, true, &NoCommands);
        assert_eq!(s, "a\nb");
        assert_eq!(c.expand("  x\ty  "), "x y");
    }

    #[test]
    fn test_env_and_commands() {
        struct Echo;
        impl CommandEvaluator for Echo {
            fn evaluate(&self, command: &str) -> Option<String> {
                Some(command.to_uppercase())
            }
        }
        std::env::set_var("LIQUID_EXPAND_TEST", "value");
        let c = ctx();
        assert_eq!(c.expand("%LIQUID_EXPAND_TEST%/x"), "value/x");
        assert_eq!(parse_string("a`b`c", &c, false, &Echo), "aBc");
        assert_eq!(c.expand("a`b`c"), "a`b`c");
    }

    #[test]
    fn test_padding_cap_and_negative() {
        let c = ctx().at_frame(-3);
        assert_eq!(c.expand("####"), "-0003");
        let c = ctx();
        assert_eq!(c.expand(&"#".repeat(25)).len(), 20);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(sanitize_node_name("|a|b:c"), "_a_b_c");
        assert_eq!(sanitize_path(r"c:\tmp\x"), "c:/tmp/x");
        assert_eq!(relative_path(true, "/proj/rib/a.rib", "/proj/"), "rib/a.rib");
        assert_eq!(relative_path(false, "rib/a.rib", "/proj/"), "/proj/rib/a.rib");
        assert_eq!(scene_name_from_path(Some(Path::new("/x/shot.json"))), "shot");
        assert_eq!(scene_name_from_path(None), "untitled");
    }
}
