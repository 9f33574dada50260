//! Pre-flight check of a project's referenced files.

use std::path::Path;

use quickedit_common::config::AppConfig;
use quickedit_composition_core::timeline::MediaProbe;
use quickedit_project_model::project::Project;
use quickedit_render_engine::export::EncodeBackend;
use quickedit_render_engine::{FfmpegBackend, FfprobeProbe};

pub fn run(project_file: &Path, config: &AppConfig) -> anyhow::Result<()> {
    println!("QuickEdit Project Check");
    println!("{}", "=".repeat(50));

    let project = Project::load(project_file)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    println!(
        "[OK] Project: {} ({} audio, {} video, {} layers)",
        project_file.display(),
        project.audio_tracks().len(),
        project.video_tracks().len(),
        project.layers().len()
    );

    if FfmpegBackend::new(&config.encoder).is_available() {
        println!("[OK] ffmpeg: {}", config.encoder.ffmpeg_path.display());
    } else {
        println!(
            "[WARN] ffmpeg not found: {}",
            config.encoder.ffmpeg_path.display()
        );
    }

    if FfprobeProbe::new(&config.encoder).is_available() {
        println!("[OK] ffprobe: {}", config.encoder.ffprobe_path.display());
    } else {
        println!(
            "[WARN] ffprobe not found: {}",
            config.encoder.ffprobe_path.display()
        );
    }

    let missing = project.missing_sources(std::env::current_dir()?);
    if missing.is_empty() {
        println!("[OK] All {} sources present", project.source_references().len());
        return Ok(());
    }

    for message in &missing {
        println!("[MISSING] {message}");
    }
    anyhow::bail!("{} referenced file(s) missing", missing.len())
}
