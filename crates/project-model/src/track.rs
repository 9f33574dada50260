//! Audio and video source tracks.
//!
//! A track places a time range of one source file onto the output
//! timeline. Tracks only carry what the project file declares; anything
//! learned by opening the source lives in the composition layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// How much of an audio source to place.
///
/// Project files encode [`AudioDuration::Full`] as the sentinel `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub enum AudioDuration {
    /// The full intrinsic range of the source, known once it is opened.
    Full,
    /// The first `n` seconds of the source.
    Seconds(f64),
}

impl AudioDuration {
    /// Sentinel value used by project files for [`AudioDuration::Full`].
    pub const FULL_SENTINEL: f64 = -1.0;
}

impl From<f64> for AudioDuration {
    fn from(value: f64) -> Self {
        if value == Self::FULL_SENTINEL {
            Self::Full
        } else {
            Self::Seconds(value)
        }
    }
}

impl From<AudioDuration> for f64 {
    fn from(value: AudioDuration) -> Self {
        match value {
            AudioDuration::Full => AudioDuration::FULL_SENTINEL,
            AudioDuration::Seconds(secs) => secs,
        }
    }
}

/// An audio source placed on the output timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    /// Source audio file.
    #[serde(rename = "audioURL")]
    pub audio_url: PathBuf,

    /// Placement on the output timeline (seconds).
    pub start_time: f64,

    /// Amount of source audio to place.
    pub duration: AudioDuration,
}

/// A video source placed on the output timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTrack {
    /// Source video file.
    #[serde(rename = "videoURL")]
    pub video_url: PathBuf,

    /// Placement on the output timeline (seconds).
    pub start_time: f64,

    /// Visible length on the output timeline (seconds).
    pub duration: f64,

    /// Where in the source clip playback begins (seconds).
    pub playback_offset: f64,

    /// Destination rectangle on the canvas.
    pub frame: Rect,
}

impl AudioTrack {
    pub(crate) fn validate(&self, index: usize) -> Result<(), String> {
        if !(self.start_time >= 0.0) {
            return Err(format!(
                "audioTracks[{index}].startTime must be >= 0 (got {})",
                self.start_time
            ));
        }
        if let AudioDuration::Seconds(secs) = self.duration {
            if !(secs > 0.0) || !secs.is_finite() {
                return Err(format!(
                    "audioTracks[{index}].duration must be > 0 or -1 (got {secs})"
                ));
            }
        }
        Ok(())
    }
}

impl VideoTrack {
    /// Exclusive end of the track on the output timeline.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub(crate) fn validate(&self, index: usize) -> Result<(), String> {
        if !(self.start_time >= 0.0) {
            return Err(format!(
                "videoTracks[{index}].startTime must be >= 0 (got {})",
                self.start_time
            ));
        }
        if !(self.duration > 0.0) || !self.duration.is_finite() {
            return Err(format!(
                "videoTracks[{index}].duration must be > 0 (got {})",
                self.duration
            ));
        }
        if !(self.playback_offset >= 0.0) {
            return Err(format!(
                "videoTracks[{index}].playbackOffset must be >= 0 (got {})",
                self.playback_offset
            ));
        }
        Ok(())
    }
}
