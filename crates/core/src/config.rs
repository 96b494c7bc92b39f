//! Editor configuration.
//!
//! Passed explicitly to [`crate::DocumentEditor`]; the core never reads
//! configuration from the environment.

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};
use crate::model::{Color, TextMetrics};

/// What ingestion does when a single page fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFailurePolicy {
    /// Fail the whole load on the first page error.
    #[default]
    Abort,
    /// Drop the page's words, substitute a blank raster and record a warning.
    Skip,
}

/// Defaults applied when a creation tool instantiates an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementDefaults {
    pub text_width: f32,
    pub text_height: f32,
    pub text_content: String,
    pub text_font_size: f32,
    pub text_color: Color,
    pub shape_width: f32,
    pub shape_height: f32,
    pub shape_fill: Color,
    pub shape_stroke: Color,
    pub shape_stroke_width: f32,
    pub highlight_width: f32,
    pub highlight_height: f32,
    pub highlight_color: Color,
    pub highlight_opacity: f32,
    pub image_width: f32,
    pub image_height: f32,
    pub code_size: f32,
}

impl Default for ElementDefaults {
    fn default() -> Self {
        Self {
            text_width: 150.0,
            text_height: 30.0,
            text_content: "New text".to_string(),
            text_font_size: 16.0,
            text_color: Color::BLACK,
            shape_width: 100.0,
            shape_height: 100.0,
            shape_fill: Color::BLUE,
            shape_stroke: Color::BLACK,
            shape_stroke_width: 1.0,
            highlight_width: 150.0,
            highlight_height: 24.0,
            highlight_color: Color::YELLOW,
            highlight_opacity: 0.35,
            image_width: 150.0,
            image_height: 150.0,
            code_size: 120.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Lower zoom bound used by the viewport clamp
    pub min_zoom: f32,

    /// Upper zoom bound used by the viewport clamp
    pub max_zoom: f32,

    /// Average glyph advance as a fraction of the font size
    pub glyph_width_ratio: f32,

    /// Line advance as a fraction of the font size
    pub line_height_ratio: f32,

    /// Extra points painted around each word mask
    pub mask_padding: f32,

    pub mask_color: Color,

    /// Slack in points around hit targets
    pub hit_tolerance: f32,

    /// Background raster pixels per document point
    pub raster_scale: f32,

    pub page_failure_policy: PageFailurePolicy,

    pub export_text_color: Color,

    /// Standard font used for all exported text
    pub export_font: String,

    /// Fill used to cover replaced words on export
    pub cover_color: Color,

    /// Maximum undo entries kept; `None` for unbounded
    pub history_limit: Option<usize>,

    pub element_defaults: ElementDefaults,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.3,
            max_zoom: 3.0,
            glyph_width_ratio: 0.6,
            line_height_ratio: 1.2,
            mask_padding: 1.0,
            mask_color: Color::WHITE,
            hit_tolerance: 2.0,
            raster_scale: 1.0,
            page_failure_policy: PageFailurePolicy::Abort,
            export_text_color: Color::BLACK,
            export_font: "Helvetica".to_string(),
            cover_color: Color::WHITE,
            history_limit: Some(200),
            element_defaults: ElementDefaults::default(),
        }
    }
}

impl EditorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EditorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_zoom_bounds(mut self, min_zoom: f32, max_zoom: f32) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_text_metrics(mut self, glyph_width_ratio: f32, line_height_ratio: f32) -> Self {
        self.glyph_width_ratio = glyph_width_ratio;
        self.line_height_ratio = line_height_ratio;
        self
    }

    pub fn with_mask_padding(mut self, padding: f32) -> Self {
        self.mask_padding = padding;
        self
    }

    pub fn with_hit_tolerance(mut self, tolerance: f32) -> Self {
        self.hit_tolerance = tolerance;
        self
    }

    pub fn with_raster_scale(mut self, scale: f32) -> Self {
        self.raster_scale = scale;
        self
    }

    pub fn with_page_failure_policy(mut self, policy: PageFailurePolicy) -> Self {
        self.page_failure_policy = policy;
        self
    }

    pub fn with_export_font(mut self, font: impl Into<String>) -> Self {
        self.export_font = font.into();
        self
    }

    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn text_metrics(&self) -> TextMetrics {
        TextMetrics {
            glyph_width_ratio: self.glyph_width_ratio,
            line_height_ratio: self.line_height_ratio,
        }
    }

    /// Reject values that would make the editor misbehave.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("min_zoom", self.min_zoom),
            ("max_zoom", self.max_zoom),
            ("glyph_width_ratio", self.glyph_width_ratio),
            ("line_height_ratio", self.line_height_ratio),
            ("raster_scale", self.raster_scale),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EditorError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.min_zoom > self.max_zoom {
            return Err(EditorError::Config(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.mask_padding < 0.0 || self.hit_tolerance < 0.0 {
            return Err(EditorError::Config("padding and tolerance must not be negative".into()));
        }
        if self.export_font.trim().is_empty() {
            return Err(EditorError::Config("export_font must not be empty".into()));
        }
        if self.history_limit == Some(0) {
            return Err(EditorError::Config("history_limit must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EditorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_zoom, 0.3);
        assert_eq!(config.max_zoom, 3.0);
        assert_eq!(config.page_failure_policy, PageFailurePolicy::Abort);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EditorConfig::from_json_str(
            r#"{"mask_padding": 2.5, "page_failure_policy": "skip",
                "element_defaults": {"text_content": "Type here"}}"#,
        )
        .unwrap();
        assert_eq!(config.mask_padding, 2.5);
        assert_eq!(config.page_failure_policy, PageFailurePolicy::Skip);
        assert_eq!(config.element_defaults.text_content, "Type here");
        assert_eq!(config.element_defaults.text_font_size, 16.0);
        assert_eq!(config.export_font, "Helvetica");
    }

    #[test]
    fn inverted_zoom_bounds_are_rejected() {
        let err = EditorConfig::new().with_zoom_bounds(2.0, 1.0).validate().unwrap_err();
        assert!(matches!(err, EditorError::Config(_)));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = EditorConfig::from_json_str("{ not json").unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Config);
    }
}
