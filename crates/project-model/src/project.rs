//! The project root aggregate.
//!
//! A project is the immutable description of one render: its tracks,
//! overlay layers, canvas size and declared duration. Parsing validates
//! every model invariant so later stages never see malformed input.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::geometry::Size;
use crate::layer::{ImageLayerFile, Layer, LayerContent, TextLayerFile};
use crate::track::{AudioTrack, VideoTrack};

/// Top-level project file as written on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub audio_tracks: Vec<AudioTrack>,
    pub video_tracks: Vec<VideoTrack>,
    pub text_layers: Vec<TextLayerFile>,
    pub image_layers: Vec<ImageLayerFile>,
    pub size: Size,
    pub duration: f64,
}

/// A validated, read-only project.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ProjectFile")]
pub struct Project {
    audio_tracks: Vec<AudioTrack>,
    video_tracks: Vec<VideoTrack>,
    layers: Vec<Layer>,
    size: Size,
    duration: f64,
}

/// What a referenced file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRole {
    Audio,
    Video,
    Image,
}

/// A file referenced by the project.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef<'a> {
    pub role: SourceRole,
    /// Index within its own collection (audio tracks, video tracks, layers).
    pub index: usize,
    pub path: &'a Path,
}

impl TryFrom<ProjectFile> for Project {
    type Error = ProjectError;

    fn try_from(file: ProjectFile) -> Result<Self, Self::Error> {
        let layers = file
            .text_layers
            .into_iter()
            .map(Layer::from)
            .chain(file.image_layers.into_iter().map(Layer::from))
            .collect();
        Project::from_parts(
            file.audio_tracks,
            file.video_tracks,
            layers,
            file.size,
            file.duration,
        )
    }
}

impl Project {
    /// Assemble and validate a project.
    ///
    /// `layers` is taken in declaration order; that order breaks paint-order ties.
    pub fn from_parts(
        audio_tracks: Vec<AudioTrack>,
        video_tracks: Vec<VideoTrack>,
        layers: Vec<Layer>,
        size: Size,
        duration: f64,
    ) -> Result<Self, ProjectError> {
        let project = Self {
            audio_tracks,
            video_tracks,
            layers,
            size,
            duration,
        };
        project.validate()?;
        Ok(project)
    }

    /// Parse a project from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ProjectError> {
        serde_json::from_str(json).map_err(|e| ProjectError::ParseError {
            path: PathBuf::from("<inline>"),
            source: e,
        })
    }

    /// Load a project file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ProjectError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ProjectError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn audio_tracks(&self) -> &[AudioTrack] {
        &self.audio_tracks
    }

    pub fn video_tracks(&self) -> &[VideoTrack] {
        &self.video_tracks
    }

    /// Overlay layers in declaration order (text layers, then image layers).
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Output canvas size.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Declared total duration (seconds).
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Every file the project references, in declaration order per role.
    pub fn source_references(&self) -> Vec<SourceRef<'_>> {
        let audio = self
            .audio_tracks
            .iter()
            .enumerate()
            .map(|(index, t)| SourceRef {
                role: SourceRole::Audio,
                index,
                path: t.audio_url.as_path(),
            });
        let video = self
            .video_tracks
            .iter()
            .enumerate()
            .map(|(index, t)| SourceRef {
                role: SourceRole::Video,
                index,
                path: t.video_url.as_path(),
            });
        let images = self
            .layers
            .iter()
            .enumerate()
            .filter_map(|(index, layer)| match &layer.content {
                LayerContent::Image(image) => Some(SourceRef {
                    role: SourceRole::Image,
                    index,
                    path: image.image_url.as_path(),
                }),
                LayerContent::Text(_) => None,
            });
        audio.chain(video).chain(images).collect()
    }

    /// Report referenced files that do not exist, resolved against `base_dir`.
    pub fn missing_sources(&self, base_dir: impl AsRef<Path>) -> Vec<String> {
        let base_dir = base_dir.as_ref();
        self.source_references()
            .into_iter()
            .filter(|source| !base_dir.join(source.path).exists())
            .map(|source| {
                let label = match source.role {
                    SourceRole::Audio => "Audio track",
                    SourceRole::Video => "Video track",
                    SourceRole::Image => "Image layer",
                };
                format!(
                    "{label} {} source missing: {}",
                    source.index,
                    source.path.display()
                )
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ProjectError> {
        let invalid = |message: String| ProjectError::ValidationError { message };

        if !self.size.is_positive() {
            return Err(invalid(format!(
                "size must be positive (got {}x{})",
                self.size.width, self.size.height
            )));
        }
        if !(self.duration >= 0.0) {
            return Err(invalid(format!(
                "duration must be >= 0 (got {})",
                self.duration
            )));
        }
        for (index, track) in self.audio_tracks.iter().enumerate() {
            track.validate(index).map_err(invalid)?;
        }
        for (index, track) in self.video_tracks.iter().enumerate() {
            track.validate(index).map_err(invalid)?;
        }
        for (index, layer) in self.layers.iter().enumerate() {
            layer.validate(index).map_err(invalid)?;
        }
        Ok(())
    }
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}
