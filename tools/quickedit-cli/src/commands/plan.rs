//! Dry run: compose the project and print what would be encoded.

use std::sync::Arc;

use quickedit_common::config::AppConfig;
use quickedit_composition_core::overlay::OverlayContent;
use quickedit_render_engine::compositor::{compute_compositions, summarize};
use quickedit_render_engine::export::{plan_export, EncodeRequest, ExportJob, OutputFormat};
use quickedit_render_engine::{DecodedImageCatalog, FfmpegBackend, FfprobeProbe};

pub async fn run(job: ExportJob, config: &AppConfig) -> anyhow::Result<()> {
    let probe = Arc::new(FfprobeProbe::new(&config.encoder));
    let plan = plan_export(&job, probe, &DecodedImageCatalog)
        .await
        .map_err(|e| anyhow::anyhow!("Planning failed: {e}"))?;

    let composition = &plan.composition;
    let duration_secs = plan.duration_secs();
    let total_frames = plan.total_frames();

    println!("Render plan for {}", job.project_path.display());
    println!(
        "  Canvas: {}x{} @ {} fps",
        composition.render_size.width,
        composition.render_size.height,
        composition.clock.fps()
    );
    println!("  Duration: {duration_secs:.3}s ({total_frames} frames)");

    println!("  Channels:");
    for channel in plan.timeline.channels() {
        println!(
            "    #{} {} {} source [{:.3}, {:.3}) -> output [{:.3}, {:.3})",
            channel.id,
            channel.kind,
            channel.source_path.display(),
            channel.segment.source.start,
            channel.segment.source.end(),
            channel.segment.output.start,
            channel.segment.output.end()
        );
    }

    println!("  Video instructions:");
    for instruction in &composition.instructions {
        let t = &instruction.transform;
        println!(
            "    channel #{} [{:.3}, {:.3}) scale {:.4} translate ({:.1}, {:.1})",
            instruction.channel,
            instruction.time_range.start,
            instruction.time_range.end(),
            t.a,
            t.tx,
            t.ty
        );
    }

    println!("  Overlays (bottom first):");
    for node in composition.overlays.nodes() {
        let label = match &node.content {
            OverlayContent::Text { text, .. } => format!("text {text:?}"),
            OverlayContent::Image { path, .. } => format!("image {}", path.display()),
        };
        println!(
            "    z={} {label} keyframes {:?}",
            node.z_index,
            node.opacity.keyframes()
        );
    }

    let summary = summarize(compute_compositions(composition, duration_secs));
    if let Some(first_gap) = summary.first_gap_secs {
        println!(
            "  Gaps: {} frame(s) without video, first at {first_gap:.3}s",
            summary.gap_frames
        );
    }
    println!(
        "  Most overlays in one frame: {}",
        summary.max_visible_overlays
    );
    for diagnostic in plan.diagnostics() {
        println!("  [SKIPPED] {diagnostic}");
    }

    let request = EncodeRequest {
        timeline: &plan.timeline,
        composition,
        output_path: &job.output_path,
        format: OutputFormat::Mp4H264Aac,
        duration_secs,
        total_frames,
    };
    let args = FfmpegBackend::new(&config.encoder).build_args(&request)?;
    println!("  ffmpeg command:");
    println!("{}", serde_json::to_string_pretty(&args)?);

    Ok(())
}
