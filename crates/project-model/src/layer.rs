//! Overlay layers: text and images painted above the video.
//!
//! A [`Layer`] carries the fields shared by every overlay once, in
//! [`LayerBase`], plus a kind-specific [`LayerContent`]. Project files keep
//! text and image layers in separate arrays with flat fields; the
//! `*LayerFile` types mirror that shape and convert into [`Layer`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::geometry::Rect;

/// Timing, placement and paint order shared by all overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerBase {
    /// When the layer appears (seconds).
    pub start_time: f64,

    /// Visibility window length (seconds).
    pub duration: f64,

    /// Opacity ramp-in length (seconds, may be 0).
    pub fade_in_duration: f64,

    /// Opacity ramp-out length after the window ends (seconds, may be 0).
    pub fade_out_duration: f64,

    /// Render rectangle on the canvas.
    pub frame: Rect,

    /// Paint order; higher paints on top.
    pub z_index: i32,
}

impl LayerBase {
    /// End of the visibility window: `start_time + duration`.
    pub fn layer_end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Whether the fade-in is still running when the fade-out starts at
    /// [`layer_end_time`](Self::layer_end_time).
    pub fn fades_overlap(&self) -> bool {
        self.fade_in_duration > self.duration
    }
}

/// Styled text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    /// Fill color; invalid hex in the project file yields [`Rgba::CLEAR`].
    pub color: Rgba,
    pub font_size: f64,
}

/// Image file content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub image_url: PathBuf,
    /// Radius used to round the rendered rectangle's corners.
    pub corner_radius: f64,
}

/// Kind-specific overlay payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerContent {
    Text(TextContent),
    Image(ImageContent),
}

/// A single overlay layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub base: LayerBase,
    pub content: LayerContent,
}

/// Flat `textLayers[]` entry as written in project files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayerFile {
    #[serde(flatten)]
    pub base: LayerBase,
    pub text: String,
    pub text_color: String,
    pub font_size: f64,
}

/// Flat `imageLayers[]` entry as written in project files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLayerFile {
    #[serde(flatten)]
    pub base: LayerBase,
    #[serde(rename = "imageURL")]
    pub image_url: PathBuf,
    pub corner_radius: f64,
}

impl From<TextLayerFile> for Layer {
    fn from(file: TextLayerFile) -> Self {
        Layer {
            base: file.base,
            content: LayerContent::Text(TextContent {
                text: file.text,
                color: Rgba::from_hex_or_clear(&file.text_color),
                font_size: file.font_size,
            }),
        }
    }
}

impl From<ImageLayerFile> for Layer {
    fn from(file: ImageLayerFile) -> Self {
        Layer {
            base: file.base,
            content: LayerContent::Image(ImageContent {
                image_url: file.image_url,
                corner_radius: file.corner_radius,
            }),
        }
    }
}

impl Layer {
    pub fn text(base: LayerBase, content: TextContent) -> Self {
        Self {
            base,
            content: LayerContent::Text(content),
        }
    }

    pub fn image(base: LayerBase, content: ImageContent) -> Self {
        Self {
            base,
            content: LayerContent::Image(content),
        }
    }

    pub fn layer_end_time(&self) -> f64 {
        self.base.layer_end_time()
    }

    /// Short label for diagnostics ("text" or "image").
    pub fn kind_name(&self) -> &'static str {
        match self.content {
            LayerContent::Text(_) => "text",
            LayerContent::Image(_) => "image",
        }
    }

    pub(crate) fn validate(&self, index: usize) -> Result<(), String> {
        let base = &self.base;
        let label = format!("layers[{index}] ({})", self.kind_name());
        if !(base.start_time >= 0.0) {
            return Err(format!("{label}: startTime must be >= 0"));
        }
        if !(base.duration > 0.0) || !base.duration.is_finite() {
            return Err(format!(
                "{label}: duration must be > 0 (got {})",
                base.duration
            ));
        }
        if !(base.fade_in_duration >= 0.0) || !(base.fade_out_duration >= 0.0) {
            return Err(format!("{label}: fade durations must be >= 0"));
        }
        match &self.content {
            LayerContent::Text(text) if !(text.font_size > 0.0) => Err(format!(
                "{label}: fontSize must be > 0 (got {})",
                text.font_size
            )),
            LayerContent::Image(image) if !(image.corner_radius >= 0.0) => Err(format!(
                "{label}: cornerRadius must be >= 0 (got {})",
                image.corner_radius
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base(start: f64, duration: f64) -> LayerBase {
        LayerBase {
            start_time: start,
            duration,
            fade_in_duration: 0.0,
            fade_out_duration: 0.0,
            frame: Rect::new(0.0, 0.0, 100.0, 40.0),
            z_index: 0,
        }
    }

    #[test]
    fn test_text_layer_file_flattens_base() {
        let file: TextLayerFile = serde_json::from_str(
            r##"{
                "startTime": 1, "duration": 2,
                "fadeInDuration": 0.5, "fadeOutDuration": 0.5,
                "frame": {"x": 0, "y": 600, "width": 1280, "height": 80},
                "zIndex": 1,
                "text": "Hi", "textColor": "#FFFFFF", "fontSize": 48
            }"##,
        )
        .unwrap();
        let layer = Layer::from(file);
        assert_eq!(layer.base.z_index, 1);
        assert_eq!(layer.layer_end_time(), 3.0);
        match layer.content {
            LayerContent::Text(text) => {
                assert_eq!(text.text, "Hi");
                assert_eq!(text.color, Rgba::WHITE);
                assert_eq!(text.font_size, 48.0);
            }
            LayerContent::Image(_) => panic!("expected text content"),
        }
    }

    #[test]
    fn test_invalid_text_color_is_clear_not_an_error() {
        let file: TextLayerFile = serde_json::from_str(
            r#"{
                "startTime": 0, "duration": 1,
                "fadeInDuration": 0, "fadeOutDuration": 0,
                "frame": {"x": 0, "y": 0, "width": 10, "height": 10},
                "zIndex": 0,
                "text": "x", "textColor": "not-a-color", "fontSize": 12
            }"#,
        )
        .unwrap();
        let layer = Layer::from(file);
        assert!(layer.validate(0).is_ok());
        assert!(matches!(
            layer.content,
            LayerContent::Text(TextContent { color, .. }) if color == Rgba::CLEAR
        ));
    }

    #[test]
    fn test_image_layer_file_reads_url_and_radius() {
        let file: ImageLayerFile = serde_json::from_str(
            r#"{
                "startTime": 0, "duration": 3,
                "fadeInDuration": 0, "fadeOutDuration": 1,
                "frame": {"x": 20, "y": 20, "width": 200, "height": 200},
                "zIndex": 5,
                "imageURL": "logo.png", "cornerRadius": 12
            }"#,
        )
        .unwrap();
        let layer = Layer::from(file);
        assert_eq!(layer.kind_name(), "image");
        assert!(matches!(
            &layer.content,
            LayerContent::Image(img) if img.corner_radius == 12.0
                && img.image_url == PathBuf::from("logo.png")
        ));
    }

    #[test]
    fn test_validation_rejects_bad_payloads() {
        let text = Layer::text(
            base(0.0, 1.0),
            TextContent {
                text: "a".into(),
                color: Rgba::WHITE,
                font_size: 0.0,
            },
        );
        assert!(text.validate(0).unwrap_err().contains("fontSize"));

        let image = Layer::image(
            base(0.0, 1.0),
            ImageContent {
                image_url: "a.png".into(),
                corner_radius: -1.0,
            },
        );
        assert!(image.validate(2).unwrap_err().contains("layers[2]"));

        let empty = Layer::image(
            base(0.0, 0.0),
            ImageContent {
                image_url: "a.png".into(),
                corner_radius: 0.0,
            },
        );
        assert!(empty.validate(0).unwrap_err().contains("duration"));
    }

    #[test]
    fn test_fades_overlap_detection() {
        let mut b = base(0.0, 1.0);
        b.fade_in_duration = 0.6;
        b.fade_out_duration = 0.5;
        assert!(!b.fades_overlap());
        b.fade_in_duration = 1.5;
        assert!(b.fades_overlap());
    }

    proptest! {
        #[test]
        fn layer_end_time_is_start_plus_duration(
            start in 0.0f64..10_000.0,
            duration in 0.001f64..10_000.0,
        ) {
            let b = base(start, duration);
            prop_assert_eq!(b.layer_end_time(), start + duration);
        }
    }
}
