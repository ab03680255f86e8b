//! Character formatting records.

use core::hash::{Hash, Hasher};
use std::sync::Arc;

/// Default font size in layout units.
pub const DEFAULT_FONT_SIZE: f32 = 16.0;
/// Default font family.
pub const DEFAULT_FONT_FAMILY: &str = "sans-serif";
/// Default text color.
pub const DEFAULT_TEXT_COLOR: &str = "#000000";

const MIN_FONT_SIZE: f32 = 1.0;
const MAX_FONT_SIZE: f32 = 1024.0;

/// Formatting applied to a run of characters.
///
/// Styles compare and hash structurally, so two independently built styles
/// with the same fields are interchangeable.
#[derive(Clone, Debug)]
pub struct Style {
    /// Text color in any host-understood notation (`"#ff0000"`, `"red"`).
    pub color: Arc<str>,
    /// Font size in layout units.
    pub font_size: f32,
    /// Numeric weight (400 regular, 700 bold).
    pub font_weight: u16,
    /// Font family name.
    pub font_family: Arc<str>,
    /// Italic flag.
    pub italic: bool,
    /// Underline flag.
    pub underline: bool,
    /// Set on the style carried by stored `\n` characters.
    pub line_break: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: Arc::from(DEFAULT_TEXT_COLOR),
            font_size: DEFAULT_FONT_SIZE,
            font_weight: 400,
            font_family: Arc::from(DEFAULT_FONT_FAMILY),
            italic: false,
            underline: false,
            line_break: false,
        }
    }
}

impl PartialEq for Style {
    fn eq(&self, other: &Self) -> bool {
        self.font_size.to_bits() == other.font_size.to_bits()
            && self.font_weight == other.font_weight
            && self.italic == other.italic
            && self.underline == other.underline
            && self.line_break == other.line_break
            && self.color == other.color
            && self.font_family == other.font_family
    }
}

impl Eq for Style {}

impl Hash for Style {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.color.hash(state);
        self.font_size.to_bits().hash(state);
        self.font_weight.hash(state);
        self.font_family.hash(state);
        self.italic.hash(state);
        self.underline.hash(state);
        self.line_break.hash(state);
    }
}

impl Style {
    /// Replace the font size, sanitising non-finite or non-positive input.
    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = sanitize_font_size(size);
        self
    }

    /// Replace the color.
    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Arc::from(color);
        self
    }

    /// Replace the weight.
    pub fn with_weight(mut self, weight: u16) -> Self {
        self.font_weight = weight;
        self
    }

    /// Replace the family.
    pub fn with_family(mut self, family: &str) -> Self {
        self.font_family = Arc::from(family);
        self
    }

    /// Copy of this style with `patch` applied on top.
    pub fn patched(&self, patch: &StylePatch) -> Self {
        let mut out = self.clone();
        if let Some(color) = &patch.color {
            out.color = color.clone();
        }
        if let Some(size) = patch.font_size {
            out.font_size = sanitize_font_size(size);
        }
        if let Some(weight) = patch.font_weight {
            out.font_weight = weight;
        }
        if let Some(family) = &patch.font_family {
            out.font_family = family.clone();
        }
        if let Some(italic) = patch.italic {
            out.italic = italic;
        }
        if let Some(underline) = patch.underline {
            out.underline = underline;
        }
        out
    }

    /// Copy of this style marked as a line-break carrier.
    pub fn as_line_break(&self) -> Self {
        let mut out = self.clone();
        out.line_break = true;
        out
    }

    /// Copy of this style without the line-break flag.
    pub fn without_line_break(&self) -> Self {
        let mut out = self.clone();
        out.line_break = false;
        out
    }

    /// Copy of this style with the font size multiplied by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        self.clone().with_font_size(self.font_size * factor)
    }

    /// Whether the weight counts as bold.
    pub fn is_bold(&self) -> bool {
        self.font_weight >= 700
    }
}

fn sanitize_font_size(size: f32) -> f32 {
    if size.is_finite() && size > 0.0 {
        size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
    } else {
        DEFAULT_FONT_SIZE
    }
}

/// Partial style used by restyle operations; `None` fields are left as-is.
///
/// The line-break flag is structural and cannot be patched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StylePatch {
    /// New color.
    pub color: Option<Arc<str>>,
    /// New font size.
    pub font_size: Option<f32>,
    /// New weight.
    pub font_weight: Option<u16>,
    /// New family.
    pub font_family: Option<Arc<str>>,
    /// New italic flag.
    pub italic: Option<bool>,
    /// New underline flag.
    pub underline: Option<bool>,
}

impl StylePatch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the color.
    pub fn color(mut self, color: &str) -> Self {
        self.color = Some(Arc::from(color));
        self
    }

    /// Set the font size.
    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Set the weight.
    pub fn font_weight(mut self, weight: u16) -> Self {
        self.font_weight = Some(weight);
        self
    }

    /// Shorthand for weight 700.
    pub fn bold(self) -> Self {
        self.font_weight(700)
    }

    /// Set the family.
    pub fn font_family(mut self, family: &str) -> Self {
        self.font_family = Some(Arc::from(family));
        self
    }

    /// Set the italic flag.
    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = Some(italic);
        self
    }

    /// Set the underline flag.
    pub fn underline(mut self, underline: bool) -> Self {
        self.underline = Some(underline);
        self
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.font_size.is_none()
            && self.font_weight.is_none()
            && self.font_family.is_none()
            && self.italic.is_none()
            && self.underline.is_none()
    }

    /// Whether applying the patch can change glyph metrics.
    pub fn affects_metrics(&self) -> bool {
        self.font_size.is_some()
            || self.font_weight.is_some()
            || self.font_family.is_some()
            || self.italic.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(style: &Style) -> u64 {
        let mut hasher = DefaultHasher::new();
        style.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn structurally_equal_styles_are_interchangeable() {
        let a = Style::default().with_color("red");
        let b = Style::default().with_color(&String::from("red"));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, Style::default());
    }

    #[test]
    fn patch_overrides_only_present_fields() {
        let base = Style::default().with_weight(700);
        let patched = base.patched(&StylePatch::new().color("red").italic(true));
        assert_eq!(&*patched.color, "red");
        assert!(patched.italic);
        assert!(patched.is_bold());
        assert_eq!(patched.font_size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn patch_keeps_line_break_flag() {
        let newline = Style::default().as_line_break();
        let patched = newline.patched(&StylePatch::new().font_size(30.0));
        assert!(patched.line_break);
        assert_eq!(patched.font_size, 30.0);
    }

    #[test]
    fn invalid_font_sizes_fall_back() {
        assert_eq!(Style::default().with_font_size(f32::NAN).font_size, DEFAULT_FONT_SIZE);
        assert_eq!(Style::default().with_font_size(-3.0).font_size, DEFAULT_FONT_SIZE);
        assert_eq!(Style::default().with_font_size(5_000.0).font_size, MAX_FONT_SIZE);
    }

    #[test]
    fn metrics_relevance_of_patches() {
        assert!(!StylePatch::new().color("red").underline(true).affects_metrics());
        assert!(StylePatch::new().bold().affects_metrics());
        assert!(StylePatch::new().is_empty());
    }
}
