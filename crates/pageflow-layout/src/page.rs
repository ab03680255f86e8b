//! One fixed-size page: its text, its formatting and its cached layout.

use core::ops::Range;

use pageflow::{ContentStore, CoverageError, Style, StyleIndex, StylePatch};

use crate::metrics::MetricsCache;
use crate::render_ir::{GlyphRole, PageSize, RenderItem};
use crate::render_layout::{LayoutCache, LayoutEngine, LineLead, PageFrame};

/// A page of the document.
#[derive(Clone, Debug)]
pub struct Page {
    number: usize,
    size: PageSize,
    content: ContentStore,
    styles: StyleIndex,
    layout: LayoutCache,
    lead: LineLead,
}

impl Page {
    /// Empty page. Page numbers are 1-based; 0 is treated as 1.
    pub fn new(number: usize, size: PageSize) -> Self {
        Self {
            number: number.max(1),
            size,
            content: ContentStore::new(),
            styles: StyleIndex::new(),
            layout: LayoutCache::default(),
            lead: LineLead::LINE_START,
        }
    }

    /// Page assembled from stored parts and a layout computed with `lead`.
    pub(crate) fn from_parts(
        frame: PageFrame,
        content: ContentStore,
        styles: StyleIndex,
        layout: LayoutCache,
    ) -> Self {
        Self {
            number: frame.number.max(1),
            size: frame.size,
            content,
            styles,
            layout,
            lead: frame.lead,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn size(&self) -> PageSize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn styles(&self) -> &StyleIndex {
        &self.styles
    }

    /// Cached layout; empty or stale unless [`Page::has_clean_layout`].
    pub fn layout(&self) -> &[RenderItem] {
        self.layout.items()
    }

    /// Line state the first character continues from.
    pub fn lead(&self) -> LineLead {
        self.lead
    }

    /// Line state the next page continues from.
    pub fn trailing_lead(&self) -> LineLead {
        self.lead.after(&self.content)
    }

    /// Replace the entry line state; a change drops the cached layout.
    ///
    /// Returns whether the lead changed.
    pub(crate) fn set_lead(&mut self, lead: LineLead) -> bool {
        if self.lead == lead {
            return false;
        }
        self.lead = lead;
        self.layout.invalidate();
        true
    }

    pub fn has_clean_layout(&self) -> bool {
        self.layout.is_clean()
    }

    pub fn text(&self) -> String {
        self.content.to_string()
    }

    pub fn check_coverage(&self) -> Result<(), CoverageError> {
        self.styles.check_coverage(self.content.len())
    }

    /// Insert `text` with `style` at page-local `at` (clamped).
    ///
    /// Returns the number of characters inserted.
    pub fn insert_run(&mut self, at: usize, text: &str, style: &Style) -> usize {
        let count = text.chars().count();
        if count == 0 {
            return 0;
        }
        let at = self.content.insert(at, text);
        self.styles.shift_for_insert(at, count);
        self.styles.insert(at..at + count, style.clone());
        self.layout.mark_edit(at, 0, count);
        count
    }

    /// Delete page-local `[start, end)` (clamped); returns what was removed.
    pub fn delete(&mut self, start: usize, end: usize) -> Range<usize> {
        let removed = self.content.delete(start, end);
        if removed.is_empty() {
            return removed;
        }
        self.styles.shift_for_delete(removed.start, removed.end);
        self.layout.mark_edit(removed.start, removed.len(), 0);
        removed
    }

    /// Patch formatting over page-local `[start, end)` (clamped).
    pub fn alter_formatting(&mut self, start: usize, end: usize, patch: &StylePatch, base: &Style) {
        let len = self.content.len();
        let (start, end) = (start.min(len), end.min(len));
        if start >= end {
            return;
        }
        self.styles.alter_formatting(start, end, patch, base);
        self.layout.mark_edit(start, end - start, end - start);
    }

    /// Detach `[at, len)` with its formatting.
    pub(crate) fn split_off(&mut self, at: usize) -> (ContentStore, StyleIndex) {
        let at = at.min(self.content.len());
        let moved = self.content.len() - at;
        let whole_layout = self.layout.is_clean() && self.layout.items().len() == self.content.len();
        // Markers decide their role by looking at the next character.
        let prefix_stable = at == 0
            || self
                .layout
                .items()
                .get(at - 1)
                .is_some_and(|item| !matches!(item.role, GlyphRole::ListBullet | GlyphRole::HiddenMarker));
        let content = self.content.split_off(at);
        let styles = self.styles.split_off(at);
        if whole_layout && prefix_stable {
            self.layout.truncate(at);
        } else {
            self.layout.mark_edit(at, moved, 0);
        }
        (content, styles)
    }

    /// Length of the first line, `\n` included, or `max` if that is shorter.
    pub(crate) fn leading_line_len(&self, max: usize) -> usize {
        self.content
            .chars()
            .take(max)
            .position(|ch| ch == '\n')
            .map_or(max.min(self.content.len()), |newline| newline + 1)
    }

    /// Detach the first `count` characters (clamped) with their formatting.
    pub(crate) fn take_front(&mut self, count: usize) -> (ContentStore, StyleIndex) {
        let count = count.min(self.content.len());
        let rest = self.content.split_off(count);
        let content = core::mem::replace(&mut self.content, rest);
        let rest_styles = self.styles.split_off(count);
        let styles = core::mem::replace(&mut self.styles, rest_styles);
        self.layout.mark_edit(0, count, 0);
        (content, styles)
    }

    /// Put `content` and its formatting in front of this page's text.
    pub(crate) fn prepend(&mut self, mut content: ContentStore, styles: StyleIndex) {
        let count = content.len();
        if count == 0 {
            return;
        }
        content.append(core::mem::take(&mut self.content));
        self.content = content;
        self.styles.prepend(styles, count);
        self.layout.mark_edit(0, 0, count);
    }

    /// Put `content` and its formatting after this page's text.
    pub(crate) fn append(&mut self, content: ContentStore, styles: StyleIndex) {
        let count = content.len();
        if count == 0 {
            return;
        }
        let offset = self.content.len();
        self.content.append(content);
        self.styles.append(styles, offset);
        self.layout.mark_edit(offset, 0, count);
    }

    /// Bring the cached layout up to date; returns how many items were reused.
    pub fn ensure_layout(&mut self, engine: &LayoutEngine, metrics: &mut MetricsCache) -> usize {
        if self.layout.is_clean() {
            return 0;
        }
        let len = self.content.len();
        let runs = self.styles.runs(0..len);
        let dirty = self.layout.dirty_span();
        let frame = PageFrame::new(self.size, self.number).with_lead(self.lead);
        let (items, reused) = match dirty {
            Some(span) if !self.layout.items().is_empty() => {
                let outcome = engine.compute_layout_incremental(
                    &self.content,
                    &runs,
                    frame,
                    metrics,
                    self.layout.items(),
                    span,
                );
                (outcome.items, outcome.reused)
            }
            _ => (engine.compute_layout(&self.content, &runs, frame, metrics), 0),
        };
        self.layout.store(items);
        reused
    }

    /// Drop the cached layout.
    pub fn invalidate_layout(&mut self) {
        self.layout.invalidate();
    }

    /// Index of the first laid-out item that belongs to a later page.
    pub fn overflow_cut(&self) -> Option<usize> {
        self.layout
            .items()
            .iter()
            .position(|item| item.page_number > self.number)
    }

    /// Renumber the page, re-tagging cached items.
    pub(crate) fn set_number(&mut self, number: usize) {
        let number = number.max(1);
        self.layout.retag(self.number, number);
        self.number = number;
    }
}
