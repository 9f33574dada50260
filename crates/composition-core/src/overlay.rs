//! The overlay tree painted above all video.
//!
//! Every text and image layer becomes one [`OverlayNode`]. Nodes are kept
//! sorted by `zIndex` ascending; equal indices keep declaration order, so
//! text layers paint below image layers of the same index.

use std::path::{Path, PathBuf};

use serde::Serialize;

use quickedit_common::error::{QuickEditError, QuickEditResult};
use quickedit_project_model::color::Rgba;
use quickedit_project_model::geometry::Rect;
use quickedit_project_model::layer::{Layer, LayerContent};
use quickedit_project_model::project::Project;

use crate::opacity::OpacityCurve;
use crate::transform::AffineTransform;

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// Decodes overlay images ahead of rendering.
pub trait ImageCatalog: Send + Sync {
    /// Decode `path`, returning its dimensions or a reason it is unusable.
    fn image_info(&self, path: &Path) -> Result<ImageInfo, String>;
}

/// Paintable payload of an overlay node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayContent {
    Text {
        text: String,
        color: Rgba,
        font_size: f64,
    },
    Image {
        path: PathBuf,
        corner_radius: f64,
        pixel_size: ImageInfo,
    },
}

/// One layer in the overlay tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayNode {
    /// Position in the project's layer list (text layers first).
    pub declaration_index: usize,
    pub z_index: i32,
    pub frame: Rect,
    pub transform: AffineTransform,
    pub opacity: OpacityCurve,
    pub content: OverlayContent,
}

/// What to paint for one node at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderOp {
    Text {
        frame: Rect,
        opacity: f64,
        text: String,
        color: Rgba,
        font_size: f64,
    },
    Image {
        frame: Rect,
        opacity: f64,
        path: PathBuf,
        corner_radius: f64,
    },
}

impl RenderOp {
    pub fn opacity(&self) -> f64 {
        match self {
            RenderOp::Text { opacity, .. } | RenderOp::Image { opacity, .. } => *opacity,
        }
    }

    pub fn frame(&self) -> &Rect {
        match self {
            RenderOp::Text { frame, .. } | RenderOp::Image { frame, .. } => frame,
        }
    }

    /// Fully transparent ops contribute nothing to the frame.
    pub fn is_visible(&self) -> bool {
        self.opacity() > 0.0
    }
}

/// Paint instruction for `node` at output time `t`.
pub fn render(node: &OverlayNode, t: f64) -> RenderOp {
    let opacity = node.opacity.value_at(t);
    match &node.content {
        OverlayContent::Text {
            text,
            color,
            font_size,
        } => RenderOp::Text {
            frame: node.frame,
            opacity,
            text: text.clone(),
            color: *color,
            font_size: *font_size,
        },
        OverlayContent::Image {
            path,
            corner_radius,
            ..
        } => RenderOp::Image {
            frame: node.frame,
            opacity,
            path: path.clone(),
            corner_radius: *corner_radius,
        },
    }
}

/// Overlay nodes in paint order (bottom first).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayTree {
    nodes: Vec<OverlayNode>,
}

impl OverlayTree {
    /// Build the tree for every layer of `project`.
    ///
    /// Fails on the first layer that cannot be rendered.
    pub fn build(project: &Project, catalog: &dyn ImageCatalog) -> QuickEditResult<Self> {
        let mut nodes = project
            .layers()
            .iter()
            .enumerate()
            .map(|(index, layer)| build_node(index, layer, catalog))
            .collect::<QuickEditResult<Vec<_>>>()?;

        // Vec::sort_by_key is stable: equal z-indices keep declaration order.
        nodes.sort_by_key(|node| node.z_index);

        tracing::debug!(layers = nodes.len(), "Overlay tree built");
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[OverlayNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render ops for every node at `t`, bottom first.
    pub fn render_at(&self, t: f64) -> Vec<RenderOp> {
        self.nodes.iter().map(|node| render(node, t)).collect()
    }
}

fn build_node(
    index: usize,
    layer: &Layer,
    catalog: &dyn ImageCatalog,
) -> QuickEditResult<OverlayNode> {
    let content = match &layer.content {
        LayerContent::Text(text) => {
            if !(text.font_size > 0.0) {
                return Err(QuickEditError::layer_render(format!(
                    "text layer {index}: font size must be positive (got {})",
                    text.font_size
                )));
            }
            if text.color.is_transparent() {
                tracing::warn!(layer = index, text = %text.text, "Text color is fully transparent");
            }
            OverlayContent::Text {
                text: text.text.clone(),
                color: text.color,
                font_size: text.font_size,
            }
        }
        LayerContent::Image(image) => {
            let pixel_size = catalog.image_info(&image.image_url).map_err(|reason| {
                QuickEditError::layer_render(format!(
                    "image layer {index} ({}): {reason}",
                    image.image_url.display()
                ))
            })?;
            OverlayContent::Image {
                path: image.image_url.clone(),
                corner_radius: image.corner_radius,
                pixel_size,
            }
        }
    };

    if layer.base.fades_overlap() {
        tracing::warn!(
            layer = index,
            fade_in = layer.base.fade_in_duration,
            duration = layer.base.duration,
            "Fade-out starts before the fade-in completes"
        );
    }

    Ok(OverlayNode {
        declaration_index: index,
        z_index: layer.base.z_index,
        frame: layer.base.frame,
        transform: AffineTransform::IDENTITY,
        opacity: OpacityCurve::for_layer(&layer.base),
        content,
    })
}
