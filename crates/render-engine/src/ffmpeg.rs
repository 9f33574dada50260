//! FFmpeg encode backend.
//!
//! The whole composition is expressed as one `-filter_complex` graph:
//!
//! ```text
//! color (black canvas) ──┐
//! video inputs ──────────┼── setpts/scale/overlay per instruction
//!                        ├── drawtext per text layer
//! image inputs ──────────┼── geq alpha + overlay per image layer
//!                        ▼
//!                     [vout]
//! audio inputs ── adelay ── amix ── [aout]
//! ```
//!
//! ffmpeg always runs with `-n`, so an existing output file is never
//! replaced here.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use quickedit_common::clock::TimeRange;
use quickedit_common::config::EncoderConfig;
use quickedit_common::error::{QuickEditError, QuickEditResult};
use quickedit_composition_core::instructions::VideoInstruction;
use quickedit_composition_core::opacity::OpacityCurve;
use quickedit_composition_core::overlay::{OverlayContent, OverlayNode};
use quickedit_project_model::color::Rgba;
use quickedit_project_model::geometry::Rect;

use crate::compositor::find_gaps;
use crate::export::{
    EncodeBackend, EncodeRequest, ExportProgress, ExportStage, OutputFormat, ProgressCallback,
};

const AUDIO_BITRATE: &str = "256k";
const VIDEO_CRF: &str = "18";

/// Encodes through an `ffmpeg` child process.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_path: PathBuf,
    font_file: Option<PathBuf>,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new(&EncoderConfig::default())
    }
}

impl FfmpegBackend {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            font_file: config.font_file.clone(),
        }
    }

    /// Full ffmpeg argument list for `request`.
    pub fn build_args(&self, request: &EncodeRequest<'_>) -> QuickEditResult<Vec<String>> {
        let composition = request.composition;
        let (width, height) = composition.render_size.to_pixels();
        let fps = composition.clock.fps();
        let duration = format!("{:.6}", request.duration_secs);

        let mut args: Vec<String> = [
            "-n",
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostats",
            "-progress",
            "pipe:1",
            "-f",
            "lavfi",
            "-i",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push(format!(
            "color=c=black:s={width}x{height}:r={fps}:d={duration}"
        ));

        let mut next_input = 1usize;
        let mut chains: Vec<String> = Vec::new();
        let mut current = "0:v".to_string();

        let windows = exclusive_windows(&composition.instructions);
        for (k, (instruction, visible)) in composition
            .instructions
            .iter()
            .zip(&windows)
            .enumerate()
        {
            if visible.is_empty() {
                tracing::debug!(instruction = k, "Video instruction fully occluded");
                continue;
            }
            let channel = request.timeline.channel(instruction.channel).ok_or_else(|| {
                QuickEditError::backend(format!(
                    "video instruction {k} refers to unknown channel {}",
                    instruction.channel
                ))
            })?;

            let input = next_input;
            next_input += 1;
            push_trimmed_input(&mut args, &channel.source_path, &channel.segment.source);

            let t = &instruction.transform;
            chains.push(format!(
                "[{input}:v]setpts=PTS-STARTPTS+{start:.6}/TB,scale=w='iw*{sx:.6}':h='ih*{sy:.6}',format=rgba[v{k}]",
                start = instruction.time_range.start,
                sx = t.a,
                sy = t.d,
            ));
            chains.push(format!(
                "[{current}][v{k}]overlay=x={tx:.6}:y={ty:.6}:eof_action=pass:enable='{enable}'[sv{k}]",
                tx = t.tx,
                ty = t.ty,
                enable = enable_expr(visible),
            ));
            current = format!("sv{k}");
        }

        for (k, node) in composition.overlays.nodes().iter().enumerate() {
            match &node.content {
                OverlayContent::Text {
                    text,
                    color,
                    font_size,
                } => {
                    chains.push(format!(
                        "[{current}]{drawtext}[so{k}]",
                        drawtext = drawtext_filter(
                            text,
                            *color,
                            *font_size,
                            &node.frame,
                            &node.opacity,
                            self.font_file.as_deref()
                        ),
                    ));
                }
                OverlayContent::Image {
                    path,
                    corner_radius,
                    ..
                } => {
                    let input = next_input;
                    next_input += 1;
                    args.extend([
                        "-loop".to_string(),
                        "1".to_string(),
                        "-framerate".to_string(),
                        fps.to_string(),
                        "-t".to_string(),
                        duration.clone(),
                        "-i".to_string(),
                        path.display().to_string(),
                    ]);
                    chains.push(image_chain(input, k, node, *corner_radius));
                    chains.push(format!(
                        "[{current}][img{k}]overlay=x={x:.3}:y={y:.3}:eof_action=pass[so{k}]",
                        x = node.frame.x,
                        y = node.frame.y,
                    ));
                }
            }
            current = format!("so{k}");
        }
        chains.push(format!("[{current}]format=yuv420p[vout]"));

        let audio: Vec<_> = request.timeline.audio_channels().collect();
        for (k, channel) in audio.iter().enumerate() {
            let input = next_input;
            next_input += 1;
            push_trimmed_input(&mut args, &channel.source_path, &channel.segment.source);
            let delay_ms = (channel.segment.output.start * 1000.0).round().max(0.0) as u64;
            chains.push(format!("[{input}:a]adelay=delays={delay_ms}:all=1[a{k}]"));
        }
        if audio.len() == 1 {
            chains.push("[a0]anull[aout]".to_string());
        } else if audio.len() > 1 {
            let labels: String = (0..audio.len()).map(|k| format!("[a{k}]")).collect();
            chains.push(format!(
                "{labels}amix=inputs={n}:normalize=0:duration=longest[aout]",
                n = audio.len()
            ));
        }

        args.push("-filter_complex".to_string());
        args.push(chains.join(";"));
        args.push("-map".to_string());
        args.push("[vout]".to_string());
        if !audio.is_empty() {
            args.push("-map".to_string());
            args.push("[aout]".to_string());
        }
        args.push("-r".to_string());
        args.push(fps.to_string());
        args.push("-t".to_string());
        args.push(duration);
        args.append(&mut codec_args_for_format(request.format));
        args.push(request.output_path.display().to_string());

        Ok(args)
    }

    fn run_ffmpeg(
        &self,
        args: &[String],
        request: &EncodeRequest<'_>,
        progress: Option<&ProgressCallback>,
    ) -> QuickEditResult<()> {
        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| QuickEditError::backend(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(
            pid = child.id(),
            args_len = args.len(),
            total_frames = request.total_frames,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| QuickEditError::backend("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| QuickEditError::backend("Failed to capture ffmpeg stderr"))?;

        // Drain stderr on its own thread so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut state = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = std::time::Instant::now();
        loop {
            line.clear();
            let bytes = reader.read_line(&mut line).map_err(|e| {
                QuickEditError::backend(format!("Failed reading ffmpeg progress: {e}"))
            })?;
            if bytes == 0 {
                break;
            }

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key != "progress" {
                continue;
            }

            if state.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = state.out_time_secs;
                last_progress_wall = std::time::Instant::now();
            }
            if let Some(cb) = progress {
                cb(state.report(
                    request.total_frames,
                    request.duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    out_time_secs = state.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = std::time::Instant::now();
            }
        }

        let status = child
            .wait()
            .map_err(|e| QuickEditError::backend(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(QuickEditError::backend(format!(
                "ffmpeg exited with {status}: {}",
                stderr_output.trim()
            )));
        }

        if let Some(cb) = progress {
            cb(ExportProgress {
                progress: 1.0,
                frames_rendered: request.total_frames,
                total_frames: request.total_frames,
                eta_secs: 0.0,
                stage: ExportStage::Complete,
            });
        }

        Ok(())
    }
}

impl EncodeBackend for FfmpegBackend {
    fn encode(
        &mut self,
        request: &EncodeRequest<'_>,
        progress: Option<ProgressCallback>,
    ) -> QuickEditResult<()> {
        let started = std::time::Instant::now();

        let gaps = find_gaps(request.composition, request.duration_secs);
        if gaps.has_gaps() {
            tracing::warn!(
                gap_frames = gaps.gap_frames,
                spans = gaps.gaps.len(),
                first_gap_secs = ?gaps.first_gap_secs,
                "Frames without video show the black canvas"
            );
        }

        let args = self.build_args(request)?;

        if let Some(cb) = &progress {
            cb(ExportProgress {
                progress: 0.0,
                frames_rendered: 0,
                total_frames: request.total_frames,
                eta_secs: 0.0,
                stage: ExportStage::Encoding,
            });
        }

        let existed_before = request.output_path.exists();
        if let Err(err) = self.run_ffmpeg(&args, request, progress.as_ref()) {
            if !existed_before && request.output_path.exists() {
                if let Err(remove_err) = std::fs::remove_file(request.output_path) {
                    tracing::warn!(
                        path = %request.output_path.display(),
                        error = %remove_err,
                        "Failed to remove partial output"
                    );
                }
            }
            return Err(err);
        }

        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            "ffmpeg encode finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg_path)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn push_trimmed_input(args: &mut Vec<String>, path: &Path, source: &TimeRange) {
    args.extend([
        "-ss".to_string(),
        format!("{:.6}", source.start),
        "-t".to_string(),
        format!("{:.6}", source.duration),
        "-i".to_string(),
        path.display().to_string(),
    ]);
}

/// Ranges during which each instruction is the visible one.
///
/// A later instruction hides every earlier one wherever they overlap.
fn exclusive_windows(instructions: &[VideoInstruction]) -> Vec<Vec<TimeRange>> {
    instructions
        .iter()
        .enumerate()
        .map(|(k, instruction)| {
            let mut pieces = vec![instruction.time_range];
            for later in &instructions[k + 1..] {
                pieces = pieces
                    .into_iter()
                    .flat_map(|piece| subtract(piece, &later.time_range))
                    .collect();
            }
            pieces
        })
        .collect()
}

fn subtract(piece: TimeRange, cut: &TimeRange) -> Vec<TimeRange> {
    if !piece.overlaps(cut) {
        return vec![piece];
    }
    let mut rest = Vec::with_capacity(2);
    if cut.start > piece.start {
        rest.push(TimeRange::new(piece.start, cut.start - piece.start));
    }
    if cut.end() < piece.end() {
        rest.push(TimeRange::new(cut.end(), piece.end() - cut.end()));
    }
    rest
}

fn enable_expr(windows: &[TimeRange]) -> String {
    windows
        .iter()
        .map(|w| format!("gte(t,{:.6})*lt(t,{:.6})", w.start, w.end()))
        .collect::<Vec<_>>()
        .join("+")
}

/// Piecewise-linear ffmpeg expression over `var` for an opacity curve.
fn build_piecewise_expr(curve: &OpacityCurve, var: &str) -> String {
    // (time, value approaching from the left, value from the right)
    let mut stops: Vec<(f64, f64, f64)> = Vec::new();
    for (t, v) in curve.keyframes() {
        match stops.last_mut() {
            Some(last) if last.0 == t => last.2 = v,
            _ => stops.push((t, v, v)),
        }
    }

    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return format!("{:.6}", curve.initial),
    };

    let mut expr = format!("{:.6}", last.2);
    for pair in stops.windows(2).rev() {
        let (t0, _, v0) = pair[0];
        let (t1, v1, _) = pair[1];
        expr = format!(
            "if(lt({var},{t1:.6}),{v0:.6}+({delta:.6})*({var}-{t0:.6})/{dur:.6},{expr})",
            delta = v1 - v0,
            dur = t1 - t0,
        );
    }
    format!(
        "if(lt({var},{t:.6}),{v:.6},{expr})",
        t = first.0,
        v = first.1
    )
}

fn drawtext_filter(
    text: &str,
    color: Rgba,
    font_size: f64,
    frame: &Rect,
    opacity: &OpacityCurve,
    font_file: Option<&Path>,
) -> String {
    let [r, g, b, a] = color.to_rgba8();
    let mut filter = format!(
        "drawtext=expansion=none:text={text}:fontsize={font_size:.3}:fontcolor=0x{r:02X}{g:02X}{b:02X}@{alpha:.4}:x='{x:.3}+({w:.3}-text_w)/2':y={y:.3}:alpha='{expr}'",
        text = escape_text(text),
        alpha = a as f64 / 255.0,
        x = frame.x,
        w = frame.width,
        y = frame.y,
        expr = build_piecewise_expr(opacity, "t"),
    );
    if let Some(font) = font_file {
        filter.push_str(&format!(
            ":fontfile={}",
            escape_text(&font.display().to_string())
        ));
    }
    filter
}

fn image_chain(input: usize, k: usize, node: &OverlayNode, corner_radius: f64) -> String {
    let (w, h) = node.frame.size().to_pixels();
    format!(
        "[{input}:v]scale={w}:{h},format=rgba,geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='alpha(X,Y)*({opacity})*({mask})'[img{k}]",
        opacity = build_piecewise_expr(&node.opacity, "T"),
        mask = corner_mask_expr(corner_radius, w, h),
    )
}

/// geq expression that is 1 inside a rounded rectangle of `W`x`H`, else 0.
fn corner_mask_expr(radius: f64, width: u32, height: u32) -> String {
    let r = radius.min(width.min(height) as f64 / 2.0);
    if r <= 0.0 {
        return "1".to_string();
    }
    format!(
        "lte(hypot(max(max({r:.3}-X-0.5,X+0.5-W+{r:.3}),0),max(max({r:.3}-Y-0.5,Y+0.5-H+{r:.3}),0)),{r:.3})"
    )
}

/// Escape an unquoted filter option value inside a filter graph.
///
/// The option parser and the graph parser each strip one escaping level.
fn escape_text(value: &str) -> String {
    let escape = |input: &str, special: &[char]| {
        let mut out = String::with_capacity(input.len());
        for ch in input.chars() {
            if special.contains(&ch) {
                out.push('\\');
            }
            out.push(ch);
        }
        out
    };
    let option_level = escape(value, &['\\', '\'', ':']);
    escape(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

fn codec_args_for_format(format: OutputFormat) -> Vec<String> {
    match format {
        OutputFormat::Mp4H264Aac => vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "slow".to_string(),
            "-crf".to_string(),
            VIDEO_CRF.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
        ],
    }
}

/// Whether `binary` is an existing file path or resolves on `PATH`.
pub(crate) fn command_exists(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {} >/dev/null 2>&1", binary.display()))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn report(
        &self,
        total_frames: u64,
        expected_duration_secs: f64,
        elapsed_secs: f64,
    ) -> ExportProgress {
        let progress = if expected_duration_secs <= 0.0 {
            0.0
        } else {
            (self.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
        };

        let frames_rendered = (progress * total_frames as f64).round() as u64;
        let eta_secs = if progress > 0.0 {
            (elapsed_secs / progress) - elapsed_secs
        } else {
            0.0
        }
        .max(0.0);

        ExportProgress {
            progress: if self.complete { 1.0 } else { progress },
            frames_rendered,
            total_frames,
            eta_secs,
            stage: if self.complete {
                ExportStage::Finalizing
            } else {
                ExportStage::Encoding
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickedit_composition_core::instructions::{build_video_composition, VideoComposition};
    use quickedit_composition_core::overlay::{ImageCatalog, ImageInfo, OverlayTree};
    use quickedit_composition_core::timeline::{
        assemble_timeline, AudioSourceInfo, ComposedTimeline, VideoSourceInfo,
    };
    use quickedit_composition_core::transform::AffineTransform;
    use quickedit_project_model::geometry::Size;
    use quickedit_project_model::layer::LayerBase;
    use quickedit_project_model::project::Project;

    struct SquareImages;

    impl ImageCatalog for SquareImages {
        fn image_info(&self, _path: &Path) -> Result<ImageInfo, String> {
            Ok(ImageInfo {
                width: 100,
                height: 100,
            })
        }
    }

    fn fixture() -> (ComposedTimeline, VideoComposition) {
        let project = Project::from_json_str(
            r##"{
                "audioTracks": [
                    {"audioURL": "music.m4a", "startTime": 0, "duration": -1},
                    {"audioURL": "voice.m4a", "startTime": 1.5, "duration": 2}
                ],
                "videoTracks": [
                    {"videoURL": "intro.mov", "startTime": 0, "duration": 5, "playbackOffset": 2,
                     "frame": {"x": 0, "y": 0, "width": 1280, "height": 720}}
                ],
                "textLayers": [
                    {"startTime": 1, "duration": 2, "fadeInDuration": 0.5, "fadeOutDuration": 0.5,
                     "frame": {"x": 0, "y": 600, "width": 1280, "height": 80},
                     "zIndex": 1, "text": "It's 5:00", "textColor": "#FFFFFF80", "fontSize": 48}
                ],
                "imageLayers": [
                    {"startTime": 0, "duration": 5, "fadeInDuration": 0, "fadeOutDuration": 0,
                     "frame": {"x": 20, "y": 20, "width": 120, "height": 120},
                     "zIndex": 2, "imageURL": "logo.png", "cornerRadius": 16}
                ],
                "size": {"width": 1280, "height": 720},
                "duration": 5
            }"##,
        )
        .unwrap();
        let timeline = assemble_timeline(
            &project,
            vec![
                Ok(AudioSourceInfo {
                    time_range: TimeRange::new(0.0, 30.0),
                }),
                Ok(AudioSourceInfo {
                    time_range: TimeRange::new(0.0, 10.0),
                }),
            ],
            vec![Ok(VideoSourceInfo {
                natural_size: Size::new(1920.0, 1080.0),
            })],
        );
        let overlays = OverlayTree::build(&project, &SquareImages).unwrap();
        let composition = build_video_composition(&project, &timeline, overlays);
        (timeline, composition)
    }

    fn request<'a>(
        timeline: &'a ComposedTimeline,
        composition: &'a VideoComposition,
    ) -> EncodeRequest<'a> {
        let duration_secs = composition.duration(timeline);
        EncodeRequest {
            timeline,
            composition,
            output_path: Path::new("/tmp/out.mp4"),
            format: OutputFormat::Mp4H264Aac,
            duration_secs,
            total_frames: composition.clock.frame_count(duration_secs),
        }
    }

    fn filter_graph(args: &[String]) -> &str {
        let idx = args.iter().position(|a| a == "-filter_complex").unwrap();
        &args[idx + 1]
    }

    #[test]
    fn test_args_never_overwrite_and_end_with_output() {
        let (timeline, composition) = fixture();
        let args = FfmpegBackend::default()
            .build_args(&request(&timeline, &composition))
            .unwrap();

        assert_eq!(args[0], "-n");
        assert!(!args.iter().any(|a| a == "-y"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
        assert!(args.windows(2).any(|w| w[0] == "-c:a" && w[1] == "aac"));
        assert!(args.windows(2).any(|w| w[0] == "-r" && w[1] == "30"));
    }

    #[test]
    fn test_inputs_follow_source_ranges() {
        let (timeline, composition) = fixture();
        let args = FfmpegBackend::default()
            .build_args(&request(&timeline, &composition))
            .unwrap();

        // Full-length audio covers 30s from t=0, so the output runs 30s.
        assert!(args.iter().any(|a| a == "color=c=black:s=1280x720:r=30:d=30.000000"));

        let video = args.iter().position(|a| a == "intro.mov").unwrap();
        assert_eq!(&args[video - 5..video], ["-ss", "2.000000", "-t", "5.000000", "-i"]);

        let voice = args.iter().position(|a| a == "voice.m4a").unwrap();
        assert_eq!(&args[voice - 5..voice], ["-ss", "0.000000", "-t", "2.000000", "-i"]);
    }

    #[test]
    fn test_graph_layers_video_then_overlays() {
        let (timeline, composition) = fixture();
        let args = FfmpegBackend::default()
            .build_args(&request(&timeline, &composition))
            .unwrap();
        let graph = filter_graph(&args);

        let video = graph.find("[sv0]").unwrap();
        let text = graph.find("drawtext").unwrap();
        let image = graph.find("[img1]").unwrap();
        assert!(video < text && text < image);
        assert!(graph.contains("scale=w='iw*0.666667':h='ih*0.666667'"));
        assert!(graph.contains("enable='gte(t,0.000000)*lt(t,5.000000)'"));
        assert!(graph.contains("fontcolor=0xFFFFFF@0.5020"));
        assert!(graph.contains("adelay=delays=1500:all=1"));
        assert!(graph.contains("amix=inputs=2:normalize=0:duration=longest[aout]"));
        assert!(graph.ends_with("[vout];[3:a]adelay=delays=0:all=1[a0];[4:a]adelay=delays=1500:all=1[a1];[a0][a1]amix=inputs=2:normalize=0:duration=longest[aout]"));
    }

    #[test]
    fn test_later_instruction_occludes_earlier() {
        let instruction = |start: f64, duration: f64| VideoInstruction {
            time_range: TimeRange::new(start, duration),
            channel: 0,
            transform: AffineTransform::IDENTITY,
        };
        let windows = exclusive_windows(&[
            instruction(0.0, 10.0),
            instruction(2.0, 3.0),
            instruction(8.0, 4.0),
        ]);
        assert_eq!(
            windows[0],
            vec![TimeRange::new(0.0, 2.0), TimeRange::new(5.0, 3.0)]
        );
        assert_eq!(windows[1], vec![TimeRange::new(2.0, 3.0)]);
        assert_eq!(windows[2], vec![TimeRange::new(8.0, 4.0)]);

        let hidden = exclusive_windows(&[instruction(1.0, 1.0), instruction(0.0, 5.0)]);
        assert!(hidden[0].is_empty());
    }

    #[test]
    fn test_piecewise_expr_tracks_fades() {
        let base = LayerBase {
            start_time: 1.0,
            duration: 2.0,
            fade_in_duration: 0.5,
            fade_out_duration: 0.5,
            frame: Rect::new(0.0, 0.0, 10.0, 10.0),
            z_index: 0,
        };
        let expr = build_piecewise_expr(&OpacityCurve::for_layer(&base), "t");
        assert!(expr.starts_with("if(lt(t,1.000000),0.000000,"));
        assert!(expr.contains("if(lt(t,1.500000),0.000000+(1.000000)*(t-1.000000)/0.500000"));
        assert!(expr.contains("if(lt(t,3.500000),1.000000+(-1.000000)*(t-3.000000)/0.500000"));
        assert!(expr.ends_with(",0.000000))))"));
    }

    #[test]
    fn test_piecewise_expr_for_constant_curve() {
        assert_eq!(build_piecewise_expr(&OpacityCurve::constant(1.0), "T"), "1.000000");
    }

    #[test]
    fn test_escape_text_covers_both_levels() {
        assert_eq!(escape_text("plain"), "plain");
        assert_eq!(escape_text("5:00"), "5\\\\:00");
        assert_eq!(escape_text("a,b"), "a\\,b");
        assert_eq!(escape_text("it's"), "it\\\\\\'s");
    }

    #[test]
    fn test_corner_mask() {
        assert_eq!(corner_mask_expr(0.0, 100, 100), "1");
        // Radius is clamped to half the shorter side.
        assert!(corner_mask_expr(500.0, 100, 40).contains(",20.000)"));
    }

    #[test]
    fn test_progress_report() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "2500000");
        let report = state.report(300, 10.0, 5.0);
        assert_eq!(report.progress, 0.25);
        assert_eq!(report.frames_rendered, 75);
        assert_eq!(report.eta_secs, 15.0);
        assert_eq!(report.stage, ExportStage::Encoding);

        state.update("progress", "end");
        let report = state.report(300, 10.0, 5.0);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.stage, ExportStage::Finalizing);
    }

    /// A stand-in ffmpeg running `body` as a shell script; `$last` is the
    /// output path.
    #[cfg(unix)]
    fn scripted_backend(dir: &Path, body: &str) -> FfmpegBackend {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\nfor last; do :; done\n{body}")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        FfmpegBackend::new(&EncoderConfig {
            ffmpeg_path: script,
            ..EncoderConfig::default()
        })
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_encode_removes_partial_output() {
        let dir = std::env::temp_dir().join("quickedit_ffmpeg_partial");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let output = dir.join("out.mp4");
        let mut backend = scripted_backend(
            &dir,
            "printf partial > \"$last\"\necho 'Conversion failed!' >&2\nexit 1\n",
        );
        assert!(backend.is_available());

        let (timeline, composition) = fixture();
        let mut req = request(&timeline, &composition);
        req.output_path = output.as_path();
        let err = backend.encode(&req, None).unwrap_err();

        assert!(matches!(err, QuickEditError::Backend { .. }));
        assert!(err.to_string().contains("Conversion failed!"));
        assert!(!output.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_encode_keeps_preexisting_output() {
        let dir = std::env::temp_dir().join("quickedit_ffmpeg_preexisting");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let output = dir.join("out.mp4");
        std::fs::write(&output, b"old").unwrap();
        let mut backend = scripted_backend(
            &dir,
            "echo \"File '$last' already exists. Exiting.\" >&2\nexit 1\n",
        );

        let (timeline, composition) = fixture();
        let mut req = request(&timeline, &composition);
        req.output_path = output.as_path();
        let err = backend.encode(&req, None).unwrap_err();

        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read(&output).unwrap(), b"old");

        std::fs::remove_dir_all(&dir).ok();
    }
}
