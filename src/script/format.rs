//! Alfred and XML serialization.
//!
//! Both formats visit every job exactly once, children before the next
//! sibling, indented two spaces per nesting level.

use super::{Cmd, Job, RenderScript};
use std::fmt::Write as _;

/// Escape text placed inside Alfred `{...}` quoting.
pub fn escape_alf(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '{' | '}' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape XML text and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

// ============================================================================
// Alfred
// ============================================================================

impl Cmd {
    /// `RemoteCmd {...}` or `Cmd {...}` with the Alfred options.
    pub fn to_alf(&self) -> String {
        let mut s = String::new();
        s.push_str(if self.remote { "RemoteCmd" } else { "Cmd" });
        let _ = write!(s, " {{{}}}", escape_alf(&self.command));
        if self.alfred_expand {
            s.push_str(" -expand 1");
        }
        if !self.alfred_services.is_empty() {
            let _ = write!(s, " -service {{{}}}", escape_alf(&self.alfred_services));
        }
        if !self.alfred_tags.is_empty() {
            let _ = write!(s, " -tags {{{}}}", escape_alf(&self.alfred_tags));
        }
        s
    }

    pub fn to_xml(&self) -> String {
        let mut s = format!("<command remote=\"{}\"", self.remote as i32);
        if !self.alfred_services.is_empty() {
            let _ = write!(s, " alfredservices=\"{}\"", escape_xml(&self.alfred_services));
        }
        if !self.alfred_tags.is_empty() {
            let _ = write!(s, " alfredtags=\"{}\"", escape_xml(&self.alfred_tags));
        }
        let _ = write!(s, ">{}</command>", escape_xml(&self.command));
        s
    }
}

impl Job {
    /// Alfred `Task` (or `Instance`) at nesting `level`.
    pub fn to_alf(&self, level: usize) -> String {
        let pad = indent(level);
        let title = escape_alf(&self.title);
        if self.is_instance {
            return format!("{pad}Instance {{{title}}}");
        }
        let mut s = format!("{pad}Task -title {{{title}}}");
        if !self.children.is_empty() {
            s.push_str(" -subtasks {\n");
            for child in &self.children {
                s.push_str(&child.to_alf(level + 1));
                s.push('\n');
            }
            let _ = write!(s, "{pad}}}");
        }
        for (keyword, cmds) in [("-cmds", &self.commands), ("-cleanup", &self.cleanup)] {
            if cmds.is_empty() {
                continue;
            }
            let _ = writeln!(s, " {keyword} {{");
            for cmd in cmds {
                let _ = writeln!(s, "{pad}  {}", cmd.to_alf());
            }
            let _ = write!(s, "{pad}}}");
        }
        if !self.chaser.is_empty() {
            let _ = write!(s, " -chaser {{\n{pad}  {}\n{pad}}}", escape_alf(&self.chaser));
        }
        s
    }

    /// XML `<task>` (or `<instance>`) at nesting `level`, newline terminated.
    pub fn to_xml(&self, level: usize) -> String {
        let pad = indent(level);
        let title = escape_xml(&self.title);
        if self.is_instance {
            return format!("{pad}<instance>{title}</instance>\n");
        }
        let mut s = String::new();
        let _ = writeln!(s, "{pad}<task>");
        let _ = writeln!(s, "{pad}<title>{title}</title>");
        if !self.children.is_empty() {
            let _ = writeln!(s, "{pad}<subtasks>");
            for child in &self.children {
                s.push_str(&child.to_xml(level + 1));
            }
            let _ = writeln!(s, "{pad}</subtasks>");
        }
        for (tag, cmds) in [("commands", &self.commands), ("cleanup", &self.cleanup)] {
            if cmds.is_empty() {
                continue;
            }
            let _ = writeln!(s, "{pad}<{tag}>");
            for cmd in cmds {
                let _ = writeln!(s, "{pad}  {}", cmd.to_xml());
            }
            let _ = writeln!(s, "{pad}</{tag}>");
        }
        if !self.chaser.is_empty() {
            let _ = writeln!(s, "{pad}<chaser>{}</chaser>", escape_xml(&self.chaser));
        }
        let _ = writeln!(s, "{pad}</task>");
        s
    }
}

impl RenderScript {
    /// Alfred job text.
    pub fn to_alf(&self) -> String {
        let mut s = String::from("##AlfredToDo 3.0\n");
        let _ = write!(s, "Job -title {{{}(liquid job)}}", escape_alf(&self.title));
        let _ = write!(
            s,
            " -comment {{#Created By liquid-rib {} ({})}}",
            env!("CARGO_PKG_VERSION"),
            env!("LIQUID_BUILD_DATE")
        );
        if !self.dirmaps.is_empty() {
            let _ = write!(s, " -dirmaps {{{}}}", self.dirmaps);
        }
        let _ = write!(s, " -atleast {} -atmost {}", self.min_servers, self.max_servers);

        let jobs = self.jobs();
        if !jobs.is_empty() {
            s.push_str(" -subtasks {");
            for job in jobs {
                s.push('\n');
                s.push_str(&job.to_alf(1));
            }
            s.push_str("\n}");
        }
        if !self.cleanup.is_empty() {
            s.push_str(" -cleanup {\n");
            for cmd in &self.cleanup {
                let _ = writeln!(s, "  {}", cmd.to_alf());
            }
            s.push('}');
        }
        s.push('\n');
        s
    }

    /// XML render script.
    pub fn to_xml(&self) -> String {
        let mut s = String::from("<?xml version=\"1.0\"?>\n<renderscript>\n");
        let _ = writeln!(s, "  <title>{}</title>", escape_xml(&self.title));
        let _ = writeln!(s, "  <minservers>{}</minservers>", self.min_servers);
        let _ = writeln!(s, "  <maxservers>{}</maxservers>", self.max_servers);
        if !self.dirmaps.is_empty() {
            let _ = writeln!(s, "  <dirmaps>{}</dirmaps>", escape_xml(&self.dirmaps));
        }
        let jobs = self.jobs();
        if !jobs.is_empty() {
            s.push_str("  <subtasks>\n");
            for job in jobs {
                s.push_str(&job.to_xml(1));
            }
            s.push_str("  </subtasks>\n");
        }
        if !self.cleanup.is_empty() {
            s.push_str("  <cleanup>\n");
            for cmd in &self.cleanup {
                let _ = writeln!(s, "    {}", cmd.to_xml());
            }
            s.push_str("  </cleanup>\n");
        }
        s.push_str("</renderscript>\n");
        s
    }
}
