//! Positioned glyph records produced by layout.

use pageflow::Style;

/// Default bullet glyph drawn for `"- "` list markers.
pub const DEFAULT_BULLET: char = '\u{2022}';

/// Display transform applied to a stored character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GlyphRole {
    /// Ordinary text.
    #[default]
    Text,
    /// Stored `\n`; zero width and never painted.
    LineBreak,
    /// The `-` of a `"- "` list marker, painted as the bullet glyph.
    ListBullet,
    /// A marker character that takes no space and is never painted.
    HiddenMarker,
    /// Text on a `"# "` heading line.
    Heading,
}

impl GlyphRole {
    /// Whether the host should skip painting this item.
    pub fn is_hidden(self) -> bool {
        matches!(self, Self::LineBreak | Self::HiddenMarker)
    }
}

/// Fixed page box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// Page box of `width` by `height`. Non-finite or non-positive sides
    /// become 1.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: sanitize_side(width),
            height: sanitize_side(height),
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::new(400.0, 300.0)
    }
}

fn sanitize_side(value: f32) -> f32 {
    if value.is_finite() && value >= 1.0 {
        value
    } else {
        1.0
    }
}

/// One laid-out stored character.
///
/// A page yields exactly one item per stored character, so an item's index
/// in the page layout equals the character's page-local index.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderItem {
    /// Character as stored.
    pub real_char: char,
    /// Character to paint.
    pub display_char: char,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub cap_height: f32,
    /// Style the glyph was measured with.
    pub style: Style,
    /// 1-based page the glyph belongs to.
    pub page_number: usize,
    /// Last item on its visual line.
    pub is_last_of_line: bool,
    pub role: GlyphRole,
}

impl RenderItem {
    /// Whether the host should skip painting this item.
    pub fn is_hidden(&self) -> bool {
        self.role.is_hidden()
    }

    /// Bottom edge used for page fitting.
    pub fn bottom(&self) -> f32 {
        self.y + self.cap_height
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Layout knobs shared by every page of a document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Extra advance after every visible glyph.
    pub letter_spacing: f32,
    /// Glyph painted for a `"- "` marker.
    pub bullet_char: char,
    /// X position of the bullet glyph.
    pub bullet_indent: f32,
    /// X position where list item text starts, and where wrapped list lines
    /// continue.
    pub list_text_indent: f32,
    /// Font-size multiplier for `"# "` heading lines.
    pub heading_scale: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            letter_spacing: 0.0,
            bullet_char: DEFAULT_BULLET,
            bullet_indent: 8.0,
            list_text_indent: 24.0,
            heading_scale: 1.5,
        }
    }
}
