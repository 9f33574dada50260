//! Source probing through `ffprobe`.

use std::path::{Path, PathBuf};
use std::process::Command;

use quickedit_common::clock::TimeRange;
use quickedit_common::config::EncoderConfig;
use quickedit_composition_core::timeline::{
    AudioSourceInfo, MediaKind, MediaProbe, ProbeError, VideoSourceInfo,
};
use quickedit_project_model::geometry::Size;

use crate::ffmpeg::command_exists;

/// Reads stream headers with the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
}

impl FfprobeProbe {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffprobe_path: config.ffprobe_path.clone(),
        }
    }

    /// Run ffprobe on the first stream of `kind`, returning the non-empty
    /// csv lines. Stream entries come before any `format=` entries.
    fn probe_entries(
        &self,
        path: &Path,
        kind: MediaKind,
        entries: &str,
    ) -> Result<Vec<String>, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::Unreadable {
                path: path.to_path_buf(),
                message: "file does not exist".into(),
            });
        }

        let selector = match kind {
            MediaKind::Audio => "a:0",
            MediaKind::Video => "v:0",
        };
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-select_streams",
                selector,
                "-show_entries",
                entries,
                "-of",
                "csv=p=0:s=x",
            ])
            .arg(path)
            .output()
            .map_err(|e| ProbeError::Unreadable {
                path: path.to_path_buf(),
                message: format!("failed to run {}: {e}", self.ffprobe_path.display()),
            })?;

        if !output.status.success() {
            return Err(ProbeError::Unreadable {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe_video(&self, path: &Path) -> Result<VideoSourceInfo, ProbeError> {
        let lines = self.probe_entries(path, MediaKind::Video, "stream=width,height")?;
        let line = lines.first().ok_or_else(|| ProbeError::MissingStream {
            path: path.to_path_buf(),
            kind: MediaKind::Video,
        })?;
        let (width, height) = parse_dimensions(line).ok_or_else(|| ProbeError::Unreadable {
            path: path.to_path_buf(),
            message: format!("unexpected ffprobe dimensions '{line}'"),
        })?;
        tracing::debug!(path = %path.display(), width, height, "Probed video source");
        Ok(VideoSourceInfo {
            natural_size: Size::new(width as f64, height as f64),
        })
    }

    fn probe_audio(&self, path: &Path) -> Result<AudioSourceInfo, ProbeError> {
        let lines = self.probe_entries(
            path,
            MediaKind::Audio,
            "stream=start_time,duration:format=duration",
        )?;
        // The format line is printed even when the file has no audio stream.
        let stream = lines
            .iter()
            .find(|line| line.contains('x'))
            .ok_or_else(|| ProbeError::MissingStream {
                path: path.to_path_buf(),
                kind: MediaKind::Audio,
            })?;
        let container_duration = lines.iter().find(|line| !line.contains('x'));
        let time_range = parse_time_range(stream, container_duration.map(String::as_str))
            .ok_or_else(|| ProbeError::Unreadable {
                path: path.to_path_buf(),
                message: format!("unexpected ffprobe timing '{stream}'"),
            })?;
        tracing::debug!(
            path = %path.display(),
            start = time_range.start,
            duration = time_range.duration,
            "Probed audio source"
        );
        Ok(AudioSourceInfo { time_range })
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffprobe_path)
    }

    fn name(&self) -> &str {
        "ffprobe"
    }
}

/// Parse `WIDTHxHEIGHT`; zero dimensions are rejected.
fn parse_dimensions(line: &str) -> Option<(u32, u32)> {
    let (w, h) = line.split_once('x')?;
    let width = w.trim().parse::<u32>().ok()?;
    let height = h.trim().parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

/// Parse `STARTxDURATION`. An unknown start (`N/A`) counts as zero; an
/// unknown stream duration falls back to the container duration, as
/// Matroska and Ogg audio streams carry none of their own.
fn parse_time_range(stream: &str, container_duration: Option<&str>) -> Option<TimeRange> {
    let positive = |raw: &str| raw.trim().parse::<f64>().ok().filter(|d| *d > 0.0);

    let (start, duration) = stream.split_once('x')?;
    let start = start.trim().parse::<f64>().unwrap_or(0.0);
    let duration = positive(duration).or_else(|| container_duration.and_then(positive))?;
    Some(TimeRange::new(start.max(0.0), duration))
}
