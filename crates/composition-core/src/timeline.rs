//! Timeline composer: places every track's source range on the output timeline.
//!
//! Each audio and video track becomes one independent [`Channel`]. Channels
//! never merge, and tracks are never shifted or trimmed beyond what the
//! project declares.
//!
//! # Source failures
//!
//! A track whose source cannot be opened, or that has no stream of the
//! expected kind, is skipped. The skip is reported as a [`TrackDiagnostic`]
//! next to the timeline so callers can decide whether to escalate.
//!
//! # Concurrency
//!
//! Opening a source is a blocking header read. [`compose_timeline`] runs one
//! probe per track on tokio's blocking pool and joins them all, in
//! declaration order, before assembling the timeline. Each resolved track
//! is written by exactly one task.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use quickedit_common::clock::TimeRange;
use quickedit_project_model::geometry::{Rect, Size};
use quickedit_project_model::project::Project;
use quickedit_project_model::track::{AudioDuration, AudioTrack, VideoTrack};

/// Identifier of one channel in a composed timeline.
pub type ChannelId = u32;

/// The media kind carried by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Mapping of an output time range onto a source time range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelSegment {
    /// Where the media plays on the output timeline.
    pub output: TimeRange,
    /// Which part of the source file plays there.
    pub source: TimeRange,
}

/// One track's dedicated lane in the composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    pub id: ChannelId,
    pub kind: MediaKind,
    pub source_path: PathBuf,
    pub segment: ChannelSegment,
}

/// What opening a video source reveals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSourceInfo {
    /// Intrinsic pixel dimensions of the first video stream.
    pub natural_size: Size,
}

/// What opening an audio source reveals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSourceInfo {
    /// Full extractable range of the first audio stream.
    pub time_range: TimeRange,
}

/// Errors raised while opening a source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("cannot open {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("{path} contains no {kind} stream")]
    MissingStream { path: PathBuf, kind: MediaKind },

    #[error("probe task failed: {message}")]
    TaskFailed { message: String },
}

/// Opens sources and reads their headers.
pub trait MediaProbe: Send + Sync {
    fn probe_video(&self, path: &Path) -> Result<VideoSourceInfo, ProbeError>;

    fn probe_audio(&self, path: &Path) -> Result<AudioSourceInfo, ProbeError>;

    /// Whether the probe can run at all. An unavailable probe fails the
    /// whole export instead of skipping every track.
    fn is_available(&self) -> bool {
        true
    }

    /// Probe name for diagnostics.
    fn name(&self) -> &str {
        "media probe"
    }
}

/// A video track whose source has been opened.
///
/// Only the composer creates these, so a natural size can never be read
/// before the source was probed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVideoTrack {
    track: VideoTrack,
    natural_size: Size,
    channel: ChannelId,
    index: usize,
}

impl ResolvedVideoTrack {
    pub fn track(&self) -> &VideoTrack {
        &self.track
    }

    pub fn natural_size(&self) -> Size {
        self.natural_size
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Position of the track in the project's `videoTracks`.
    pub fn declaration_index(&self) -> usize {
        self.index
    }

    pub fn frame(&self) -> &Rect {
        &self.track.frame
    }

    /// Output placement `[startTime, startTime + duration)`.
    pub fn output_range(&self) -> TimeRange {
        TimeRange::new(self.track.start_time, self.track.duration)
    }
}

/// A track skipped because its source was unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDiagnostic {
    pub kind: MediaKind,
    /// Position of the track within its own collection.
    pub index: usize,
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for TrackDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} track {} skipped ({}): {}",
            self.kind,
            self.index,
            self.path.display(),
            self.reason
        )
    }
}

/// The flat multi-channel timeline handed to the renderer.
#[derive(Debug, Clone, Default)]
pub struct ComposedTimeline {
    channels: Vec<Channel>,
    video_tracks: Vec<ResolvedVideoTrack>,
    diagnostics: Vec<TrackDiagnostic>,
}

impl ComposedTimeline {
    /// All channels: audio first, then video, each in declaration order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn audio_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.kind == MediaKind::Audio)
    }

    pub fn video_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.kind == MediaKind::Video)
    }

    /// Successfully opened video tracks, in declaration order.
    pub fn video_tracks(&self) -> &[ResolvedVideoTrack] {
        &self.video_tracks
    }

    /// Tracks that were skipped.
    pub fn diagnostics(&self) -> &[TrackDiagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Latest output end over all channels; zero when empty.
    pub fn duration(&self) -> f64 {
        self.channels
            .iter()
            .map(|c| c.segment.output.end())
            .fold(0.0, f64::max)
    }
}

/// Output and source ranges for a video track.
pub fn video_channel_segment(track: &VideoTrack) -> ChannelSegment {
    ChannelSegment {
        output: TimeRange::new(track.start_time, track.duration),
        source: TimeRange::new(track.playback_offset, track.duration),
    }
}

/// Output and source ranges for an audio track.
///
/// A full-length track extracts the source's own range; `startTime` only
/// decides where it lands.
pub fn audio_channel_segment(track: &AudioTrack, info: &AudioSourceInfo) -> ChannelSegment {
    let source = match track.duration {
        AudioDuration::Full => info.time_range,
        AudioDuration::Seconds(secs) => TimeRange::new(0.0, secs),
    };
    ChannelSegment {
        output: source.placed_at(track.start_time),
        source,
    }
}

/// Build the timeline from already-probed sources.
///
/// `audio` and `video` hold one probe result per track, in declaration order.
pub fn assemble_timeline(
    project: &Project,
    audio: Vec<Result<AudioSourceInfo, ProbeError>>,
    video: Vec<Result<VideoSourceInfo, ProbeError>>,
) -> ComposedTimeline {
    let mut timeline = ComposedTimeline::default();
    let mut next_id: ChannelId = 0;

    for (index, (track, probed)) in project.audio_tracks().iter().zip(audio).enumerate() {
        match probed {
            Ok(info) => {
                timeline.channels.push(Channel {
                    id: next_id,
                    kind: MediaKind::Audio,
                    source_path: track.audio_url.clone(),
                    segment: audio_channel_segment(track, &info),
                });
                next_id += 1;
            }
            Err(err) => timeline.skip(MediaKind::Audio, index, &track.audio_url, err),
        }
    }

    for (index, (track, probed)) in project.video_tracks().iter().zip(video).enumerate() {
        match probed {
            Ok(info) => {
                timeline.channels.push(Channel {
                    id: next_id,
                    kind: MediaKind::Video,
                    source_path: track.video_url.clone(),
                    segment: video_channel_segment(track),
                });
                timeline.video_tracks.push(ResolvedVideoTrack {
                    track: track.clone(),
                    natural_size: info.natural_size,
                    channel: next_id,
                    index,
                });
                next_id += 1;
            }
            Err(err) => timeline.skip(MediaKind::Video, index, &track.video_url, err),
        }
    }

    timeline
}

impl ComposedTimeline {
    fn skip(&mut self, kind: MediaKind, index: usize, path: &Path, err: ProbeError) {
        tracing::warn!(
            kind = %kind,
            index,
            path = %path.display(),
            error = %err,
            "Skipping track with unusable source"
        );
        self.diagnostics.push(TrackDiagnostic {
            kind,
            index,
            path: path.to_path_buf(),
            reason: err.to_string(),
        });
    }
}

/// Open every source concurrently and compose the timeline.
pub async fn compose_timeline(project: &Project, probe: Arc<dyn MediaProbe>) -> ComposedTimeline {
    let audio_handles: Vec<_> = project
        .audio_tracks()
        .iter()
        .map(|track| {
            let probe = Arc::clone(&probe);
            let path = track.audio_url.clone();
            tokio::task::spawn_blocking(move || probe.probe_audio(&path))
        })
        .collect();

    let video_handles: Vec<_> = project
        .video_tracks()
        .iter()
        .map(|track| {
            let probe = Arc::clone(&probe);
            let path = track.video_url.clone();
            tokio::task::spawn_blocking(move || probe.probe_video(&path))
        })
        .collect();

    let mut audio = Vec::with_capacity(audio_handles.len());
    for handle in audio_handles {
        audio.push(flatten_join(handle.await));
    }
    let mut video = Vec::with_capacity(video_handles.len());
    for handle in video_handles {
        video.push(flatten_join(handle.await));
    }

    let timeline = assemble_timeline(project, audio, video);
    tracing::debug!(
        channels = timeline.channels().len(),
        skipped = timeline.diagnostics().len(),
        duration_secs = timeline.duration(),
        "Timeline composed"
    );
    timeline
}

fn flatten_join<T>(
    joined: Result<Result<T, ProbeError>, tokio::task::JoinError>,
) -> Result<T, ProbeError> {
    joined.unwrap_or_else(|e| {
        Err(ProbeError::TaskFailed {
            message: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Probe backed by a fixed table; unknown paths are unreadable.
    struct TableProbe {
        videos: HashMap<PathBuf, Size>,
        audios: HashMap<PathBuf, f64>,
    }

    impl MediaProbe for TableProbe {
        fn probe_video(&self, path: &Path) -> Result<VideoSourceInfo, ProbeError> {
            if self.audios.contains_key(path) {
                return Err(ProbeError::MissingStream {
                    path: path.to_path_buf(),
                    kind: MediaKind::Video,
                });
            }
            self.videos
                .get(path)
                .map(|&natural_size| VideoSourceInfo { natural_size })
                .ok_or_else(|| ProbeError::Unreadable {
                    path: path.to_path_buf(),
                    message: "no such file".into(),
                })
        }

        fn probe_audio(&self, path: &Path) -> Result<AudioSourceInfo, ProbeError> {
            self.audios
                .get(path)
                .map(|&secs| AudioSourceInfo {
                    time_range: TimeRange::new(0.0, secs),
                })
                .ok_or_else(|| ProbeError::MissingStream {
                    path: path.to_path_buf(),
                    kind: MediaKind::Audio,
                })
        }
    }

    fn probe() -> Arc<dyn MediaProbe> {
        Arc::new(TableProbe {
            videos: HashMap::from([
                (PathBuf::from("a.mov"), Size::new(1920.0, 1080.0)),
                (PathBuf::from("b.mov"), Size::new(1080.0, 1920.0)),
            ]),
            audios: HashMap::from([(PathBuf::from("music.m4a"), 42.5)]),
        })
    }

    fn project(json_tracks: &str) -> Project {
        Project::from_json_str(&format!(
            r#"{{
                {json_tracks},
                "textLayers": [], "imageLayers": [],
                "size": {{"width": 1280, "height": 720}},
                "duration": 10
            }}"#
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_video_ranges_follow_declaration() {
        let project = project(
            r#""audioTracks": [],
            "videoTracks": [{
                "videoURL": "a.mov", "startTime": 2, "duration": 3,
                "playbackOffset": 1.5,
                "frame": {"x": 0, "y": 0, "width": 1280, "height": 720}
            }]"#,
        );
        let timeline = compose_timeline(&project, probe()).await;

        assert_eq!(timeline.channels().len(), 1);
        let channel = &timeline.channels()[0];
        assert_eq!(channel.kind, MediaKind::Video);
        assert_eq!(channel.segment.output, TimeRange::new(2.0, 3.0));
        assert_eq!(channel.segment.source, TimeRange::new(1.5, 3.0));

        let resolved = &timeline.video_tracks()[0];
        assert_eq!(resolved.natural_size(), Size::new(1920.0, 1080.0));
        assert_eq!(resolved.channel(), channel.id);
        assert_eq!(timeline.duration(), 5.0);
    }

    #[tokio::test]
    async fn test_full_audio_uses_intrinsic_range_regardless_of_start() {
        let project = project(
            r#""audioTracks": [
                {"audioURL": "music.m4a", "startTime": 0, "duration": -1},
                {"audioURL": "music.m4a", "startTime": 7, "duration": -1},
                {"audioURL": "music.m4a", "startTime": 1, "duration": 4}
            ],
            "videoTracks": []"#,
        );
        let timeline = compose_timeline(&project, probe()).await;
        let audio: Vec<_> = timeline.audio_channels().collect();

        assert_eq!(audio[0].segment.source, TimeRange::new(0.0, 42.5));
        assert_eq!(audio[1].segment.source, TimeRange::new(0.0, 42.5));
        assert_eq!(audio[1].segment.output, TimeRange::new(7.0, 42.5));
        assert_eq!(audio[2].segment.source, TimeRange::new(0.0, 4.0));
        assert_eq!(audio[2].segment.output, TimeRange::new(1.0, 4.0));
        assert_eq!(timeline.duration(), 49.5);
    }

    #[tokio::test]
    async fn test_unusable_sources_are_skipped_and_reported() {
        let project = project(
            r#""audioTracks": [{"audioURL": "a.mov", "startTime": 0, "duration": 2}],
            "videoTracks": [
                {"videoURL": "missing.mov", "startTime": 0, "duration": 1, "playbackOffset": 0,
                 "frame": {"x": 0, "y": 0, "width": 10, "height": 10}},
                {"videoURL": "music.m4a", "startTime": 0, "duration": 1, "playbackOffset": 0,
                 "frame": {"x": 0, "y": 0, "width": 10, "height": 10}},
                {"videoURL": "b.mov", "startTime": 0, "duration": 1, "playbackOffset": 0,
                 "frame": {"x": 0, "y": 0, "width": 10, "height": 10}}
            ]"#,
        );
        let timeline = compose_timeline(&project, probe()).await;

        assert_eq!(timeline.channels().len(), 1);
        assert_eq!(timeline.video_tracks()[0].declaration_index(), 2);
        assert_eq!(timeline.video_tracks()[0].channel(), 0);

        let diagnostics = timeline.diagnostics();
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[0].kind, MediaKind::Audio);
        assert!(diagnostics[0].reason.contains("no audio stream"));
        assert_eq!(diagnostics[1].index, 0);
        assert!(diagnostics[1].reason.contains("no such file"));
        assert!(diagnostics[2].reason.contains("no video stream"));
        assert!(diagnostics[2].to_string().starts_with("video track 1 skipped"));
    }

    #[test]
    fn test_channel_ids_are_audio_then_video() {
        let project = project(
            r#""audioTracks": [{"audioURL": "music.m4a", "startTime": 0, "duration": 2}],
            "videoTracks": [{"videoURL": "a.mov", "startTime": 0, "duration": 1,
                "playbackOffset": 0, "frame": {"x": 0, "y": 0, "width": 10, "height": 10}}]"#,
        );
        let timeline = assemble_timeline(
            &project,
            vec![Ok(AudioSourceInfo {
                time_range: TimeRange::new(0.0, 2.0),
            })],
            vec![Ok(VideoSourceInfo {
                natural_size: Size::new(10.0, 10.0),
            })],
        );
        let ids: Vec<_> = timeline.channels().iter().map(|c| (c.id, c.kind)).collect();
        assert_eq!(ids, vec![(0, MediaKind::Audio), (1, MediaKind::Video)]);
        assert_eq!(timeline.channel(1).map(|c| c.kind), Some(MediaKind::Video));
        assert!(timeline.channel(2).is_none());
    }

    #[test]
    fn test_empty_timeline_has_zero_duration() {
        let timeline = ComposedTimeline::default();
        assert!(timeline.is_empty());
        assert_eq!(timeline.duration(), 0.0);
    }
}
