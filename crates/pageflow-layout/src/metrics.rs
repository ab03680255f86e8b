//! Glyph measurement and the per-document metrics cache.

use core::fmt;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use pageflow::Style;

/// Default cache capacity in entries.
pub const DEFAULT_METRICS_CACHE_CAPACITY: usize = 10_000;

/// Measured box for one glyph in one style.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphMetrics {
    /// Horizontal advance.
    pub width: f32,
    /// Line box height.
    pub height: f32,
    /// Height the glyph occupies for line and page fitting.
    pub cap_height: f32,
}

impl GlyphMetrics {
    /// Box substituted when a provider cannot measure a glyph.
    pub const FALLBACK: GlyphMetrics = GlyphMetrics {
        width: 8.0,
        height: 16.0,
        cap_height: 16.0,
    };

    /// Zero-width box with the given vertical extent.
    pub fn zero_width(height: f32, cap_height: f32) -> Self {
        Self {
            width: 0.0,
            height,
            cap_height,
        }
    }

    /// Whether every field is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.width, self.height, self.cap_height]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Default for GlyphMetrics {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Provider failure. The cache masks these with the fallback box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeasureError {
    /// The font has no glyph for this character.
    MissingGlyph(char),
    /// The font could not be read.
    MalformedFont(String),
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingGlyph(ch) => write!(f, "no glyph for {:?}", ch),
            Self::MalformedFont(reason) => write!(f, "malformed font: {}", reason),
        }
    }
}

impl std::error::Error for MeasureError {}

/// Glyph measurement hook installed by the host.
pub trait MetricsProvider: Send + Sync {
    /// Measure `ch` rendered in `style`.
    fn measure(&self, ch: char, style: &Style) -> Result<GlyphMetrics, MeasureError>;
}

/// Font-free provider using per-class em widths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeuristicMetrics;

impl MetricsProvider for HeuristicMetrics {
    fn measure(&self, ch: char, style: &Style) -> Result<GlyphMetrics, MeasureError> {
        if ch.is_control() && ch != '\n' && ch != '\t' {
            return Err(MeasureError::MissingGlyph(ch));
        }
        let size = style.font_size;
        let family = style.font_family.to_ascii_lowercase();
        let em = if family.contains("mono") || family.contains("fixed") {
            if ch == ' ' {
                0.52
            } else {
                0.58
            }
        } else {
            proportional_glyph_em_width(ch)
        };
        let mut scale = 1.0f32;
        if style.is_bold() {
            scale += 0.03;
        }
        if style.italic {
            scale += 0.01;
        }
        let width = if ch == '\n' { 0.0 } else { em * size * scale };
        Ok(GlyphMetrics {
            width,
            height: size * 1.25,
            cap_height: size,
        })
    }
}

fn proportional_glyph_em_width(ch: char) -> f32 {
    match ch {
        ' ' | '\u{00A0}' => 0.32,
        '\t' => 1.28,
        'i' | 'l' | 'I' | '|' | '!' => 0.24,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 0.23,
        '-' | '\u{2010}' | '\u{2013}' | '\u{2014}' => 0.34,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.30,
        'f' | 't' | 'j' | 'r' => 0.34,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' | '#' => 0.74,
        '\u{2022}' => 0.45,
        c if c.is_ascii_digit() => 0.52,
        c if c.is_ascii_uppercase() => 0.64,
        c if c.is_ascii_lowercase() => 0.52,
        c if c.is_whitespace() => 0.32,
        c if c.is_ascii_punctuation() => 0.42,
        _ => 0.56,
    }
}

/// Provider returning the same box for every glyph.
///
/// Handy for hosts rendering a monospaced grid and for deterministic tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedMetrics(pub GlyphMetrics);

impl MetricsProvider for FixedMetrics {
    fn measure(&self, _ch: char, _style: &Style) -> Result<GlyphMetrics, MeasureError> {
        Ok(self.0)
    }
}

/// Cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fallbacks: u64,
    pub evictions: u64,
}

/// Bounded memo of `(char, Style) -> GlyphMetrics`.
///
/// Eviction drops the oldest insertion. Owned by one document.
#[derive(Clone)]
pub struct MetricsCache {
    provider: Arc<dyn MetricsProvider>,
    entries: HashMap<(char, Style), GlyphMetrics>,
    order: VecDeque<(char, Style)>,
    capacity: usize,
    fallback: GlyphMetrics,
    stats: MetricsCacheStats,
}

impl fmt::Debug for MetricsCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("fallback", &self.fallback)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl MetricsCache {
    /// Cache in front of `provider`. Capacity 0 is treated as 1.
    pub fn new(provider: Arc<dyn MetricsProvider>, capacity: usize) -> Self {
        Self {
            provider,
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            fallback: GlyphMetrics::FALLBACK,
            stats: MetricsCacheStats::default(),
        }
    }

    /// Replace the fallback box. Invalid boxes are ignored.
    pub fn with_fallback(mut self, fallback: GlyphMetrics) -> Self {
        if fallback.is_valid() {
            self.fallback = fallback;
        }
        self
    }

    /// Metrics for `ch` in `style`, measuring on a miss.
    pub fn metrics_for(&mut self, ch: char, style: &Style) -> GlyphMetrics {
        let key = (ch, style.clone());
        if let Some(metrics) = self.entries.get(&key) {
            self.stats.hits += 1;
            return *metrics;
        }
        self.stats.misses += 1;
        let metrics = match self.provider.measure(ch, style) {
            Ok(metrics) if metrics.is_valid() => metrics,
            Ok(metrics) => {
                log::debug!(
                    "invalid metrics {:?} for {:?}; using fallback",
                    metrics,
                    ch
                );
                self.stats.fallbacks += 1;
                self.fallback
            }
            Err(err) => {
                log::debug!("measure failed for {:?}: {}; using fallback", ch, err);
                self.stats.fallbacks += 1;
                self.fallback
            }
        };
        self.store(key, metrics);
        metrics
    }

    fn store(&mut self, key: (char, Style), metrics: GlyphMetrics) {
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                self.stats.evictions += 1;
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, metrics);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fallback box in use.
    pub fn fallback(&self) -> GlyphMetrics {
        self.fallback
    }

    /// Counters since the cache was created.
    pub fn stats(&self) -> MetricsCacheStats {
        self.stats
    }
}
