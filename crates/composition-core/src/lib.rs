//! QuickEdit Composition Core
//!
//! Turns a parsed project into everything a renderer needs:
//! - **Timeline:** One channel per audio/video track, mapping output time
//!   ranges onto source time ranges
//! - **Transform:** Scale-by-height, center-by-width placement of video
//! - **Opacity:** Fade-in/fade-out curves for overlay layers
//! - **Overlay:** The z-ordered overlay tree and its per-time render ops
//! - **Instructions:** The time-ranged video instructions plus overlays
//!
//! Apart from probing sources in [`timeline`], this crate is pure
//! computation. All inputs are data; all outputs are data.

pub mod instructions;
pub mod opacity;
pub mod overlay;
pub mod timeline;
pub mod transform;

pub use instructions::{build_video_composition, VideoComposition, VideoInstruction};
pub use opacity::OpacityCurve;
pub use overlay::{render, ImageCatalog, ImageInfo, OverlayContent, OverlayNode, OverlayTree, RenderOp};
pub use timeline::{
    compose_timeline, AudioSourceInfo, Channel, ChannelId, ComposedTimeline, MediaKind, MediaProbe,
    ProbeError, ResolvedVideoTrack, TrackDiagnostic, VideoSourceInfo,
};
pub use transform::{fit_transform, AffineTransform};
