//! Frame compositor: samples the composition frame by frame.
//!
//! Each frame resolves to the visible video instruction (if any) and the
//! overlay render ops painted above it. The CLI plan output summarizes the
//! samples; backends use [`find_gaps`], which works on instruction ranges
//! and never touches individual frames.

use serde::Serialize;

use quickedit_common::clock::TimeRange;
use quickedit_composition_core::instructions::VideoComposition;
use quickedit_composition_core::overlay::RenderOp;
use quickedit_composition_core::timeline::ChannelId;
use quickedit_composition_core::transform::AffineTransform;

/// A single frame's composition instructions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameComposition {
    /// Frame number.
    pub frame_index: u64,

    /// Time in seconds.
    pub time_secs: f64,

    /// Video shown under the overlays; `None` leaves the black canvas.
    pub video: Option<ActiveVideo>,

    /// Visible overlays, bottom first.
    pub overlays: Vec<RenderOp>,
}

/// The video channel visible in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActiveVideo {
    pub channel: ChannelId,
    pub transform: AffineTransform,
}

/// Aggregate facts about a sampled composition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompositionSummary {
    pub total_frames: u64,
    /// Frames with no video instruction.
    pub gap_frames: u64,
    /// Time of the first gap frame.
    pub first_gap_secs: Option<f64>,
    /// Most overlays visible in any single frame.
    pub max_visible_overlays: usize,
}

impl CompositionSummary {
    pub fn has_gaps(&self) -> bool {
        self.gap_frames > 0
    }
}

/// Compose each frame in `[0, duration_secs)`, lazily.
pub fn compute_compositions(
    composition: &VideoComposition,
    duration_secs: f64,
) -> impl Iterator<Item = FrameComposition> + '_ {
    let clock = composition.clock;
    (0..clock.frame_count(duration_secs)).map(move |frame| {
        let time_secs = clock.time_of(frame);

        let video = composition
            .instruction_at(time_secs)
            .map(|instruction| ActiveVideo {
                channel: instruction.channel,
                transform: instruction.transform,
            });

        let overlays = composition
            .overlays
            .render_at(time_secs)
            .into_iter()
            .filter(RenderOp::is_visible)
            .collect();

        FrameComposition {
            frame_index: frame,
            time_secs,
            video,
            overlays,
        }
    })
}

/// Summarize sampled frames.
pub fn summarize(frames: impl IntoIterator<Item = FrameComposition>) -> CompositionSummary {
    let mut summary = CompositionSummary::default();

    for frame in frames {
        summary.total_frames += 1;
        if frame.video.is_none() {
            summary.gap_frames += 1;
            summary.first_gap_secs.get_or_insert(frame.time_secs);
        }
        summary.max_visible_overlays = summary.max_visible_overlays.max(frame.overlays.len());
    }

    summary
}

/// Stretches of output time with no video instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapReport {
    /// Uncovered spans of `[0, duration)`, in time order.
    pub gaps: Vec<TimeRange>,
    /// Frames whose presentation time falls in a gap.
    pub gap_frames: u64,
    /// Time of the first gap frame.
    pub first_gap_secs: Option<f64>,
}

impl GapReport {
    pub fn has_gaps(&self) -> bool {
        self.gap_frames > 0
    }
}

/// Find the spans of `[0, duration_secs)` left to the black canvas.
///
/// Agrees frame for frame with [`compute_compositions`] but costs one pass
/// over the instructions.
pub fn find_gaps(composition: &VideoComposition, duration_secs: f64) -> GapReport {
    let clock = composition.clock;
    let mut covered: Vec<TimeRange> = composition
        .instructions
        .iter()
        .map(|instruction| instruction.time_range)
        .filter(|range| range.duration > 0.0)
        .collect();
    covered.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut gaps = Vec::new();
    let mut cursor = 0.0f64;
    for range in covered {
        if cursor >= duration_secs {
            break;
        }
        let gap_end = range.start.min(duration_secs);
        if gap_end > cursor {
            gaps.push(TimeRange::new(cursor, gap_end - cursor));
        }
        cursor = cursor.max(range.end());
    }
    if cursor < duration_secs {
        gaps.push(TimeRange::new(cursor, duration_secs - cursor));
    }

    let mut report = GapReport::default();
    for gap in &gaps {
        // frame_count(t) is also the first frame presented at or after t.
        let first = clock.frame_count(gap.start);
        let frames = clock.frame_count(gap.end()).saturating_sub(first);
        if frames > 0 {
            report.gap_frames += frames;
            report.first_gap_secs.get_or_insert(clock.time_of(first));
        }
    }
    report.gaps = gaps;
    report
}
