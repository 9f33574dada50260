//! Render a project to MP4.

use std::io::Write;
use std::sync::Arc;

use quickedit_common::config::AppConfig;
use quickedit_render_engine::export::{export_project, ExportJob, ExportProgress};
use quickedit_render_engine::{DecodedImageCatalog, FfmpegBackend, FfprobeProbe};

pub async fn run(job: ExportJob, config: &AppConfig) -> anyhow::Result<()> {
    println!("Rendering project: {}", job.project_path.display());
    println!("  Output: {}", job.output_path.display());

    let probe = Arc::new(FfprobeProbe::new(&config.encoder));
    let mut backend = FfmpegBackend::new(&config.encoder);

    let progress_cb: Box<dyn Fn(ExportProgress) + Send> = Box::new(|p| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        );
        std::io::stdout().flush().ok();
    });

    let report = export_project(
        job,
        probe,
        &DecodedImageCatalog,
        &mut backend,
        Some(progress_cb),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Export failed: {e}"))?;

    println!("\nExport complete: {}", report.output_path.display());
    println!(
        "  {:.2}s, {} frames, {} audio / {} video channels, {} overlays",
        report.duration_secs,
        report.total_frames,
        report.audio_channels,
        report.video_channels,
        report.overlays
    );
    for diagnostic in &report.diagnostics {
        println!("  [SKIPPED] {diagnostic}");
    }
    Ok(())
}
