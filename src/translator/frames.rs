//! Frame sequence text.
//!
//! Comma separated items, each a single frame or a range:
//!
//! ```text
//! 1,5,10-20,30-40@5,100-90x2
//! ```
//!
//! A range `start-end` steps by one; `@step` or `xstep` sets the step. The
//! sign of the step is ignored: ranges count up or down from `start` towards
//! `end`, and `end` is always included even when the step overshoots it.

use crate::util::{Error, Result};

/// Expand `text` into frame numbers in order of appearance, without
/// duplicates.
pub fn parse_frame_sequence(text: &str) -> Result<Vec<i64>> {
    let mut frames = Vec::new();
    let mut any = false;
    for item in text.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        any = true;
        for f in parse_item(item).ok_or_else(|| bad(text, item))? {
            if !frames.contains(&f) {
                frames.push(f);
            }
        }
    }
    if !any {
        return Err(Error::InvalidFrameSequence(format!("'{text}' names no frames")));
    }
    Ok(frames)
}

fn bad(text: &str, item: &str) -> Error {
    Error::InvalidFrameSequence(format!("'{item}' in '{text}'"))
}

fn parse_item(item: &str) -> Option<Vec<i64>> {
    let (range, step) = match item.find(['@', 'x']) {
        Some(i) => (&item[..i], Some(item[i + 1..].trim().parse::<i64>().ok()?)),
        None => (item, None),
    };
    let Some((start, end)) = split_range(range) else {
        // a step without a range is meaningless
        return match step {
            Some(_) => None,
            None => Some(vec![range.trim().parse().ok()?]),
        };
    };
    let start: i64 = start.trim().parse().ok()?;
    let end: i64 = end.trim().parse().ok()?;
    let step = step.unwrap_or(1).abs();
    if step == 0 {
        return None;
    }
    Some(expand_range(start, end, step))
}

/// Split `a-b` at the dash between the numbers; leading minus signs belong
/// to the numbers.
fn split_range(range: &str) -> Option<(&str, &str)> {
    let range = range.trim();
    let body = range.strip_prefix('-').unwrap_or(range);
    let offset = range.len() - body.len();
    let dash = body.find('-')?;
    Some((&range[..offset + dash], &range[offset + dash + 1..]))
}

fn expand_range(start: i64, end: i64, step: i64) -> Vec<i64> {
    let mut out = Vec::new();
    let mut f = start;
    if start <= end {
        while f <= end {
            out.push(f);
            f += step;
        }
    } else {
        while f >= end {
            out.push(f);
            f -= step;
        }
    }
    if out.last() != Some(&end) {
        out.push(end);
    }
    out
}
