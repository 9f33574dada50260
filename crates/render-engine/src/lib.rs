//! QuickEdit Render Engine
//!
//! Offline export pipeline that turns a project file into one MP4.
//!
//! # Pipeline Architecture
//!
//! ```text
//! project.json ── load ── compose timeline (ffprobe per track)
//!                               │
//!                               ├── overlay tree (decode images)
//!                               │
//!                               ├── video instructions
//!                               ▼
//!                       ffmpeg filter graph
//!                               │
//!                               ▼
//!                     Encode (H.264 + AAC)
//!                               │
//!                               ▼
//!                          output.mp4
//! ```

pub mod assets;
pub mod compositor;
pub mod export;
pub mod ffmpeg;
pub mod probe;

pub use assets::DecodedImageCatalog;
pub use export::*;
pub use ffmpeg::FfmpegBackend;
pub use probe::FfprobeProbe;
