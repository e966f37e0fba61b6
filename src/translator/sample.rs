//! Motion sample times and the matching shutter.

use crate::param::TypedParameter;
use crate::ri::Ri;
use crate::util::Result;
use ribgen_api::MAX_MOTION_SAMPLES;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Where the shutter interval sits relative to the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShutterConfig {
    /// Opens on the frame.
    #[default]
    OpenOnFrame,
    /// Centered on the frame.
    CenterOnFrame,
    /// Centered halfway to the next frame.
    CenterBetweenFrames,
    /// Closes on the next frame.
    CloseOnNextFrame,
}

impl ShutterConfig {
    /// Start of an interval of length `len` relative to the frame.
    fn open_offset(self, len: f32) -> f32 {
        match self {
            Self::OpenOnFrame => 0.0,
            Self::CenterOnFrame => -len * 0.5,
            Self::CenterBetweenFrames => 0.5 * (1.0 - len),
            Self::CloseOnNextFrame => 1.0 - len,
        }
    }
}

/// Sample times of one frame.
///
/// `times` are absolute (in frames), `offsets` are relative to the first
/// sample and used when motion is written relative to the shutter offset.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleTimes {
    pub times: SmallVec<[f32; MAX_MOTION_SAMPLES]>,
    pub offsets: SmallVec<[f32; MAX_MOTION_SAMPLES]>,
}

impl SampleTimes {
    /// A single sample at `frame`.
    pub fn still(frame: i64) -> Self {
        Self {
            times: smallvec::smallvec![frame as f32],
            offsets: smallvec::smallvec![0.0],
        }
    }

    /// `samples` times spread over `shutter * blur_time` frames, placed by
    /// `config`. One sample, or `motion` off, gives a still.
    pub fn compute(frame: i64, samples: usize, shutter: f32, blur_time: f32, config: ShutterConfig, motion: bool) -> Self {
        let samples = samples.min(MAX_MOTION_SAMPLES);
        if !motion || samples < 2 {
            return Self::still(frame);
        }
        let len = shutter * blur_time;
        let inc = len / (samples - 1) as f32;
        let open = frame as f32 + config.open_offset(len);
        Self {
            times: (0..samples).map(|i| open + i as f32 * inc).collect(),
            offsets: (0..samples).map(|i| i as f32 * inc).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Times for a motion block: offsets when motion is relative.
    pub fn motion_times(&self, relative: bool) -> &[f32] {
        if relative {
            &self.offsets
        } else {
            &self.times
        }
    }
}

/// Write `Shutter` for `frame` with a shutter fraction of `shutter`, plus
/// `Option "shutter" "offset"` when motion is relative.
///
/// Without any blur the shutter is closed on the frame.
pub fn write_shutter(ri: &mut dyn Ri, frame: i64, shutter: f32, config: ShutterConfig, blur: bool, relative: bool) -> Result<()> {
    let base = frame as f32;
    let (open, close) = if blur {
        let open = config.open_offset(shutter);
        match config {
            ShutterConfig::CloseOnNextFrame => (open, 1.0),
            _ => (open, open + shutter),
        }
    } else {
        (0.0, 0.0)
    };
    if relative {
        ri.shutter(open, close)?;
        ri.option("shutter", &[TypedParameter::float("offset", base + open)])
    } else {
        ri.shutter(base + open, base + close)
    }
}
