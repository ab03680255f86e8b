//! Serializable render records and the document snapshot envelope.

use core::fmt;
use std::sync::Arc;

use pageflow::Style;
use serde::{Deserialize, Serialize};

use crate::render_ir::{GlyphRole, RenderItem};

/// Bump when the record layout changes.
pub const SNAPSHOT_SCHEMA_VERSION: u8 = 1;

/// Snapshot encode/decode failure.
#[derive(Debug)]
pub enum SnapshotError {
    Json(serde_json::Error),
    Binary(postcard::Error),
    UnsupportedVersion { found: u8, expected: u8 },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "snapshot json error: {}", err),
            Self::Binary(err) => write!(f, "snapshot binary error: {}", err),
            Self::UnsupportedVersion { found, expected } => write!(
                f,
                "unsupported snapshot version {} (expected {})",
                found, expected
            ),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<serde_json::Error> for SnapshotError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<postcard::Error> for SnapshotError {
    fn from(value: postcard::Error) -> Self {
        Self::Binary(value)
    }
}

/// Serialized style.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedStyle {
    pub color: String,
    pub font_size: f32,
    pub font_weight: u16,
    pub font_family: String,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub line_break: bool,
}

impl From<&Style> for PersistedStyle {
    fn from(style: &Style) -> Self {
        Self {
            color: style.color.to_string(),
            font_size: style.font_size,
            font_weight: style.font_weight,
            font_family: style.font_family.to_string(),
            italic: style.italic,
            underline: style.underline,
            line_break: style.line_break,
        }
    }
}

impl From<&PersistedStyle> for Style {
    fn from(value: &PersistedStyle) -> Self {
        Style {
            color: Arc::from(value.color.as_str()),
            font_weight: value.font_weight,
            font_family: Arc::from(value.font_family.as_str()),
            italic: value.italic,
            underline: value.underline,
            line_break: value.line_break,
            ..Style::default()
        }
        .with_font_size(value.font_size)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistedGlyphRole {
    Text,
    LineBreak,
    ListBullet,
    HiddenMarker,
    Heading,
}

impl From<GlyphRole> for PersistedGlyphRole {
    fn from(value: GlyphRole) -> Self {
        match value {
            GlyphRole::Text => Self::Text,
            GlyphRole::LineBreak => Self::LineBreak,
            GlyphRole::ListBullet => Self::ListBullet,
            GlyphRole::HiddenMarker => Self::HiddenMarker,
            GlyphRole::Heading => Self::Heading,
        }
    }
}

impl From<PersistedGlyphRole> for GlyphRole {
    fn from(value: PersistedGlyphRole) -> Self {
        match value {
            PersistedGlyphRole::Text => Self::Text,
            PersistedGlyphRole::LineBreak => Self::LineBreak,
            PersistedGlyphRole::ListBullet => Self::ListBullet,
            PersistedGlyphRole::HiddenMarker => Self::HiddenMarker,
            PersistedGlyphRole::Heading => Self::Heading,
        }
    }
}

/// One exported render item.
///
/// `style` is the style the glyph was laid out with. `source_style` is only
/// set when the stored formatting differs (heading lines are scaled at
/// layout time).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderItemRecord {
    pub real_char: char,
    pub display_char: char,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub cap_height: f32,
    pub style: PersistedStyle,
    #[serde(default)]
    pub source_style: Option<PersistedStyle>,
    pub page_number: usize,
    pub is_last_of_line: bool,
    pub role: PersistedGlyphRole,
}

impl RenderItemRecord {
    /// Record for `item`, whose stored formatting is `source`.
    pub fn from_item(item: &RenderItem, source: &Style) -> Self {
        Self {
            real_char: item.real_char,
            display_char: item.display_char,
            x: item.x,
            y: item.y,
            width: item.width,
            height: item.height,
            cap_height: item.cap_height,
            style: PersistedStyle::from(&item.style),
            source_style: (*source != item.style).then(|| PersistedStyle::from(source)),
            page_number: item.page_number,
            is_last_of_line: item.is_last_of_line,
            role: item.role.into(),
        }
    }

    /// Formatting to store for this character.
    pub fn source_style(&self) -> Style {
        Style::from(self.source_style.as_ref().unwrap_or(&self.style))
    }

    /// Rebuild the render item.
    pub fn to_item(&self) -> RenderItem {
        RenderItem {
            real_char: self.real_char,
            display_char: self.display_char,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            cap_height: self.cap_height,
            style: Style::from(&self.style),
            page_number: self.page_number,
            is_last_of_line: self.is_last_of_line,
            role: self.role.into(),
        }
    }
}

/// Versioned envelope around a document's render records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub version: u8,
    pub page_width: f32,
    pub page_height: f32,
    pub records: Vec<RenderItemRecord>,
}

impl DocumentSnapshot {
    pub fn new(page_width: f32, page_height: f32, records: Vec<RenderItemRecord>) -> Self {
        Self {
            version: SNAPSHOT_SCHEMA_VERSION,
            page_width,
            page_height,
            records,
        }
    }

    /// Reject snapshots written by another schema version.
    pub fn check_version(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    /// Stored text reassembled from the records.
    pub fn text(&self) -> String {
        self.records.iter().map(|record| record.real_char).collect()
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(input)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    pub fn to_postcard(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_postcard(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = postcard::from_bytes(bytes)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }
}
