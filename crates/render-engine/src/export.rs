//! Export jobs and the export driver.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use quickedit_common::error::{QuickEditError, QuickEditResult};
use quickedit_composition_core::instructions::{build_video_composition, VideoComposition};
use quickedit_composition_core::overlay::{ImageCatalog, OverlayTree};
use quickedit_composition_core::timeline::{
    compose_timeline, ComposedTimeline, MediaProbe, TrackDiagnostic,
};
use quickedit_project_model::project::Project;

/// An export job ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Project JSON file.
    pub project_path: PathBuf,

    /// Output file path.
    pub output_path: PathBuf,

    /// Delete an existing output file before encoding.
    pub overwrite: bool,

    /// Fail when any track had to be skipped.
    pub strict: bool,
}

/// Container and codecs of the output file. Fixed for every export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum OutputFormat {
    /// MP4 with H.264 video and AAC audio.
    #[default]
    Mp4H264Aac,
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Composing,
    Encoding,
    Finalizing,
    Complete,
}

/// Everything an encoder needs for one output file.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub timeline: &'a ComposedTimeline,
    pub composition: &'a VideoComposition,
    pub output_path: &'a Path,
    pub format: OutputFormat,
    pub duration_secs: f64,
    pub total_frames: u64,
}

/// Trait for encode backends.
pub trait EncodeBackend: Send {
    /// Encode the composition into `request.output_path`.
    ///
    /// Reports progress through `progress`, ending with
    /// [`ExportStage::Complete`] on success.
    fn encode(
        &mut self,
        request: &EncodeRequest<'_>,
        progress: Option<ProgressCallback>,
    ) -> QuickEditResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// A composed project, ready to encode.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub project: Project,
    pub timeline: ComposedTimeline,
    pub composition: VideoComposition,
}

impl ExportPlan {
    pub fn duration_secs(&self) -> f64 {
        self.composition.duration(&self.timeline)
    }

    pub fn total_frames(&self) -> u64 {
        self.composition.frame_count(&self.timeline)
    }

    pub fn diagnostics(&self) -> &[TrackDiagnostic] {
        self.timeline.diagnostics()
    }
}

/// Outcome of a finished export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub output_path: PathBuf,
    pub backend: String,
    pub format: OutputFormat,
    pub duration_secs: f64,
    pub total_frames: u64,
    pub audio_channels: usize,
    pub video_channels: usize,
    pub overlays: usize,
    pub diagnostics: Vec<TrackDiagnostic>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Load the project and build its timeline, overlays and instructions.
///
/// With `job.strict`, any skipped track fails the plan. A probe that cannot
/// run at all fails it regardless.
pub async fn plan_export(
    job: &ExportJob,
    probe: Arc<dyn MediaProbe>,
    catalog: &dyn ImageCatalog,
) -> QuickEditResult<ExportPlan> {
    if !job.project_path.is_file() {
        return Err(QuickEditError::FileNotFound {
            path: job.project_path.clone(),
        });
    }
    let project =
        Project::load(&job.project_path).map_err(|e| QuickEditError::project(e.to_string()))?;
    tracing::info!(
        project = %job.project_path.display(),
        audio_tracks = project.audio_tracks().len(),
        video_tracks = project.video_tracks().len(),
        layers = project.layers().len(),
        "Project loaded"
    );

    let has_tracks = !project.audio_tracks().is_empty() || !project.video_tracks().is_empty();
    if has_tracks && !probe.is_available() {
        return Err(QuickEditError::unsupported(format!(
            "Media probe '{}' is not available",
            probe.name()
        )));
    }

    let timeline = compose_timeline(&project, probe).await;
    if job.strict {
        if let Some(first) = timeline.diagnostics().first() {
            return Err(QuickEditError::source_unavailable(
                first.path.clone(),
                format!(
                    "{} track(s) skipped in strict mode; first: {first}",
                    timeline.diagnostics().len()
                ),
            ));
        }
    }

    let overlays = OverlayTree::build(&project, catalog)?;
    let composition = build_video_composition(&project, &timeline, overlays);

    Ok(ExportPlan {
        project,
        timeline,
        composition,
    })
}

/// Export the project to a video file.
///
/// This is the main entry point for rendering.
pub async fn export_project(
    job: ExportJob,
    probe: Arc<dyn MediaProbe>,
    catalog: &dyn ImageCatalog,
    backend: &mut dyn EncodeBackend,
    progress: Option<ProgressCallback>,
) -> QuickEditResult<ExportReport> {
    let started_at = Utc::now();
    tracing::info!(
        project = %job.project_path.display(),
        output = %job.output_path.display(),
        overwrite = job.overwrite,
        strict = job.strict,
        "Starting export"
    );

    if let Some(cb) = &progress {
        cb(ExportProgress {
            progress: 0.0,
            frames_rendered: 0,
            total_frames: 0,
            eta_secs: 0.0,
            stage: ExportStage::Preparing,
        });
    }

    let plan = plan_export(&job, probe, catalog).await?;
    let duration_secs = plan.duration_secs();
    let total_frames = plan.total_frames();

    if let Some(cb) = &progress {
        cb(ExportProgress {
            progress: 0.0,
            frames_rendered: 0,
            total_frames,
            eta_secs: 0.0,
            stage: ExportStage::Composing,
        });
    }

    if !backend.is_available() {
        return Err(QuickEditError::unsupported(format!(
            "Encode backend '{}' is not available",
            backend.name()
        )));
    }

    prepare_output(&job)?;

    let request = EncodeRequest {
        timeline: &plan.timeline,
        composition: &plan.composition,
        output_path: &job.output_path,
        format: OutputFormat::Mp4H264Aac,
        duration_secs,
        total_frames,
    };

    tracing::info!(
        backend = backend.name(),
        duration_secs,
        total_frames,
        "Encoding"
    );
    backend.encode(&request, progress)?;

    let report = ExportReport {
        output_path: job.output_path.clone(),
        backend: backend.name().to_string(),
        format: request.format,
        duration_secs,
        total_frames,
        audio_channels: plan.timeline.audio_channels().count(),
        video_channels: plan.timeline.video_channels().count(),
        overlays: plan.composition.overlays.len(),
        diagnostics: plan.diagnostics().to_vec(),
        started_at,
        finished_at: Utc::now(),
    };

    tracing::info!(
        output = %report.output_path.display(),
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        skipped_tracks = report.diagnostics.len(),
        "Export finished"
    );
    Ok(report)
}

/// Apply the overwrite policy.
///
/// Without `overwrite` an existing file is left alone; the backend refuses
/// to replace it.
fn prepare_output(job: &ExportJob) -> QuickEditResult<()> {
    if job.overwrite && job.output_path.exists() {
        std::fs::remove_file(&job.output_path).map_err(|source| {
            QuickEditError::OutputConflict {
                path: job.output_path.clone(),
                source,
            }
        })?;
        tracing::info!(path = %job.output_path.display(), "Removed existing output");
    }
    Ok(())
}
