//! Video composition instructions.
//!
//! A [`VideoComposition`] is the complete, renderer-independent description
//! of the output picture: canvas size, frame clock, one instruction per
//! resolved video track and the overlay tree above them.

use serde::Serialize;

use quickedit_common::clock::{FrameClock, TimeRange};
use quickedit_project_model::geometry::Size;
use quickedit_project_model::project::Project;

use crate::overlay::OverlayTree;
use crate::timeline::{ChannelId, ComposedTimeline};
use crate::transform::{fit_transform, AffineTransform};

/// Shows one video channel, transformed, during a time range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInstruction {
    pub time_range: TimeRange,
    pub channel: ChannelId,
    pub transform: AffineTransform,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoComposition {
    pub render_size: Size,
    pub clock: FrameClock,
    /// In video track declaration order.
    pub instructions: Vec<VideoInstruction>,
    pub overlays: OverlayTree,
    /// Project duration, used when the timeline has no channels.
    declared_duration: f64,
}

impl VideoComposition {
    /// The instruction visible at `t`.
    ///
    /// Overlapping tracks occlude: the last declared instruction covering
    /// `t` wins.
    pub fn instruction_at(&self, t: f64) -> Option<&VideoInstruction> {
        self.instructions
            .iter()
            .rev()
            .find(|instruction| instruction.time_range.contains(t))
    }

    /// Output length for `timeline`.
    pub fn duration(&self, timeline: &ComposedTimeline) -> f64 {
        if timeline.is_empty() {
            self.declared_duration
        } else {
            timeline.duration()
        }
    }

    pub fn frame_count(&self, timeline: &ComposedTimeline) -> u64 {
        self.clock.frame_count(self.duration(timeline))
    }
}

/// Assemble the composition from a composed timeline and overlay tree.
pub fn build_video_composition(
    project: &Project,
    timeline: &ComposedTimeline,
    overlays: OverlayTree,
) -> VideoComposition {
    let instructions = timeline
        .video_tracks()
        .iter()
        .map(|resolved| VideoInstruction {
            time_range: resolved.output_range(),
            channel: resolved.channel(),
            transform: fit_transform(resolved.natural_size(), resolved.frame()),
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        instructions = instructions.len(),
        overlays = overlays.len(),
        width = project.size().width,
        height = project.size().height,
        "Video composition built"
    );

    VideoComposition {
        render_size: project.size(),
        clock: FrameClock::default(),
        instructions,
        overlays,
        declared_duration: project.duration(),
    }
}
