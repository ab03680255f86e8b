//! Document façade: the page list, the edit and query API, and rendering.

use core::fmt;
use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pageflow::{
    ContentStore, CoverageError, GlobalIndex, GlobalIndexNoBreaks, Style, StyleIndex, StylePatch,
};

use crate::metrics::{
    GlyphMetrics, HeuristicMetrics, MetricsCache, MetricsCacheStats, MetricsProvider,
    DEFAULT_METRICS_CACHE_CAPACITY,
};
use crate::page::Page;
use crate::paginator::{PageDiagnostic, Paginator, RebalanceReport, RebalanceSpan};
use crate::persist::{DocumentSnapshot, RenderItemRecord, SnapshotError};
use crate::render_ir::{LayoutConfig, PageSize, RenderItem};
use crate::render_layout::{LayoutCache, LayoutEngine, LineLead, PageFrame};
use crate::schedule::RebalanceScheduler;

/// Document-wide settings.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentConfig {
    /// Box every page is laid out into.
    pub page: PageSize,
    pub layout: LayoutConfig,
    /// Style used to fill formatting gaps.
    pub default_style: Style,
    /// Metrics cache entries. Values of 0 are treated as 1.
    pub metrics_cache_capacity: usize,
    /// Box used when the provider cannot measure a glyph.
    pub fallback_metrics: GlyphMetrics,
    /// `None` rebalances inside every edit; `Some(delay)` coalesces bursts.
    pub rebalance_debounce: Option<Duration>,
}

impl DocumentConfig {
    /// Defaults for a page of `width` by `height`.
    pub fn for_page(width: f32, height: f32) -> Self {
        Self {
            page: PageSize::new(width, height),
            ..Self::default()
        }
    }

    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.rebalance_debounce = Some(delay);
        self
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            page: PageSize::default(),
            layout: LayoutConfig::default(),
            default_style: Style::default(),
            metrics_cache_capacity: DEFAULT_METRICS_CACHE_CAPACITY,
            fallback_metrics: GlyphMetrics::FALLBACK,
            rebalance_debounce: None,
        }
    }
}

/// Notifications delivered to the event sink.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutEvent {
    /// Pagination settled; hosts repaint from here.
    Rebalanced {
        first_page: usize,
        page_count: usize,
        elapsed_us: u64,
    },
    /// An edit's rebalance was queued behind the debounce delay.
    RebalanceDeferred,
    /// A queued rebalance was replaced by a newer one.
    RebalanceSuperseded,
    LayoutReused {
        page_number: usize,
        reused_items: usize,
    },
    PageOverflow(PageDiagnostic),
}

type EventCallback = Arc<Mutex<Box<dyn FnMut(LayoutEvent) + Send + 'static>>>;
type EventSink = Option<EventCallback>;

/// Maximal piece of text sharing one style. `style` is `None` over
/// characters no formatting covers.
#[derive(Clone, Debug, PartialEq)]
pub struct FormattedRun {
    pub text: String,
    pub style: Option<Style>,
}

/// Multi-page styled text with incremental layout.
pub struct Document {
    cfg: DocumentConfig,
    pages: Vec<Page>,
    metrics: MetricsCache,
    paginator: Paginator,
    scheduler: Option<RebalanceScheduler>,
    event_sink: EventSink,
    diagnostics: Vec<PageDiagnostic>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("cfg", &self.cfg)
            .field("pages", &self.pages.len())
            .field("metrics", &self.metrics)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DocumentConfig::default())
    }
}

impl Document {
    /// Empty document measuring glyphs with [`HeuristicMetrics`].
    pub fn new(cfg: DocumentConfig) -> Self {
        Self::with_metrics_provider(cfg, Arc::new(HeuristicMetrics))
    }

    /// Empty document measuring glyphs with `provider`.
    pub fn with_metrics_provider(cfg: DocumentConfig, provider: Arc<dyn MetricsProvider>) -> Self {
        let metrics = MetricsCache::new(provider, cfg.metrics_cache_capacity)
            .with_fallback(cfg.fallback_metrics);
        Self {
            pages: vec![Page::new(1, cfg.page)],
            paginator: Paginator::new(LayoutEngine::new(cfg.layout), cfg.page),
            scheduler: cfg.rebalance_debounce.map(RebalanceScheduler::new),
            metrics,
            cfg,
            event_sink: None,
            diagnostics: Vec::new(),
        }
    }

    /// Restore a document from a snapshot.
    pub fn from_snapshot(
        cfg: DocumentConfig,
        snapshot: &DocumentSnapshot,
    ) -> Result<Self, SnapshotError> {
        let mut doc = Self::new(cfg);
        doc.restore_snapshot(snapshot)?;
        Ok(doc)
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.cfg
    }

    /// Register or replace the event sink.
    pub fn set_event_sink<F>(&mut self, sink: F)
    where
        F: FnMut(LayoutEvent) + Send + 'static,
    {
        self.event_sink = Some(Arc::new(Mutex::new(Box::new(sink))));
    }

    fn emit(&self, event: LayoutEvent) {
        let Some(sink) = &self.event_sink else {
            return;
        };
        if let Ok(mut sink) = sink.lock() {
            sink(event);
        }
    }

    // ---- edits -------------------------------------------------------------

    /// Insert `text` at `at` (clamped) with `style`.
    ///
    /// Line endings are normalised to `\n`; stored line breaks carry `style`
    /// flagged as a line break. The whole text goes into the page owning
    /// `at` and pagination moves any overflow afterwards. Returns the index
    /// just past the inserted text.
    pub fn insert(&mut self, at: GlobalIndex, text: &str, style: &Style) -> GlobalIndex {
        let at = at.clamp_to(self.len());
        let text = normalize_line_breaks(text);
        if text.is_empty() {
            return at;
        }
        let (page_idx, local) = self.locate(at.get());
        let Some(page) = self.pages.get_mut(page_idx) else {
            return at;
        };
        let body_style = style.without_line_break();
        let break_style = style.as_line_break();
        let mut cursor = local;
        for piece in text.split_inclusive('\n') {
            match piece.strip_suffix('\n') {
                Some(body) => {
                    cursor += page.insert_run(cursor, body, &body_style);
                    cursor += page.insert_run(cursor, "\n", &break_style);
                }
                None => cursor += page.insert_run(cursor, piece, &body_style),
            }
        }
        self.request_rebalance(RebalanceSpan::grow(page_idx));
        GlobalIndex(at.get() + (cursor - local))
    }

    /// [`Document::insert`] addressed without counting line breaks.
    pub fn insert_no_breaks(
        &mut self,
        at: GlobalIndexNoBreaks,
        text: &str,
        style: &Style,
    ) -> GlobalIndex {
        let at = self.to_global(at);
        self.insert(at, text, style)
    }

    /// Delete `[start, end)` (clamped), across as many pages as it spans.
    ///
    /// Returns the number of characters removed.
    pub fn delete(&mut self, start: GlobalIndex, end: GlobalIndex) -> usize {
        let targets = self.intersecting(start.get(), end.get());
        let mut removed = 0usize;
        for &(idx, local_start, local_end) in targets.iter().rev() {
            if let Some(page) = self.pages.get_mut(idx) {
                removed += page.delete(local_start, local_end).len();
            }
        }
        if let (Some(first), Some(last)) = (targets.first(), targets.last()) {
            self.request_rebalance(RebalanceSpan::shrink(first.0, last.0));
        }
        removed
    }

    /// [`Document::delete`] addressed without counting line breaks.
    pub fn delete_no_breaks(&mut self, start: GlobalIndexNoBreaks, end: GlobalIndexNoBreaks) -> usize {
        let (start, end) = (self.to_global(start), self.to_global(end));
        self.delete(start, end)
    }

    /// Patch formatting over `[start, end)` (clamped).
    ///
    /// Afterwards the range is fully covered by formatting; gaps take the
    /// document default style with `patch` applied.
    pub fn alter_formatting(&mut self, start: GlobalIndex, end: GlobalIndex, patch: &StylePatch) {
        if patch.is_empty() {
            return;
        }
        let targets = self.intersecting(start.get(), end.get());
        for &(idx, local_start, local_end) in &targets {
            if let Some(page) = self.pages.get_mut(idx) {
                page.alter_formatting(local_start, local_end, patch, &self.cfg.default_style);
            }
        }
        if let (Some(first), Some(last)) = (targets.first(), targets.last()) {
            self.request_rebalance(RebalanceSpan::shrink(first.0, last.0));
        }
    }

    // ---- queries -----------------------------------------------------------

    /// Stored characters, line breaks included.
    pub fn len(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Page::is_empty)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn get_char_at(&self, index: GlobalIndex) -> Option<char> {
        let mut acc = 0usize;
        for page in &self.pages {
            let len = page.len();
            if index.get() < acc + len {
                return page.content().char_at(index.get() - acc);
            }
            acc += len;
        }
        None
    }

    /// Whole text.
    pub fn get_text(&self) -> String {
        let mut out = String::with_capacity(self.len());
        for page in &self.pages {
            for chunk in page.content().chunks() {
                out.push_str(chunk);
            }
        }
        out
    }

    /// Text of `[start, end)` (clamped).
    pub fn text_between(&self, start: GlobalIndex, end: GlobalIndex) -> String {
        let mut out = String::new();
        for (idx, local_start, local_end) in self.intersecting(start.get(), end.get()) {
            if let Some(page) = self.pages.get(idx) {
                out.push_str(&page.content().substring(local_start, local_end));
            }
        }
        out
    }

    /// Stored line breaks within `[start, end)` (clamped).
    pub fn get_newlines_between(&self, start: GlobalIndex, end: GlobalIndex) -> usize {
        self.intersecting(start.get(), end.get())
            .into_iter()
            .filter_map(|(idx, local_start, local_end)| {
                self.pages
                    .get(idx)
                    .map(|page| page.content().newlines_in(local_start, local_end))
            })
            .sum()
    }

    /// Styled runs over `[start, end)` (clamped), merged across pages.
    ///
    /// Line breaks report the style of their line.
    pub fn get_formatted_text(&self, start: GlobalIndex, end: GlobalIndex) -> Vec<FormattedRun> {
        let mut runs: Vec<FormattedRun> = Vec::new();
        for (idx, local_start, local_end) in self.intersecting(start.get(), end.get()) {
            let Some(page) = self.pages.get(idx) else {
                continue;
            };
            let content = page.content();
            let mut cursor = local_start;
            for interval in page.styles().runs(local_start..local_end) {
                if interval.range.start > cursor {
                    push_run(&mut runs, content.substring(cursor, interval.range.start), None);
                }
                push_run(
                    &mut runs,
                    content.substring(interval.range.start, interval.range.end),
                    Some(interval.style.without_line_break()),
                );
                cursor = interval.range.end;
            }
            if cursor < local_end {
                push_run(&mut runs, content.substring(cursor, local_end), None);
            }
        }
        runs
    }

    /// Convert an index that skips line breaks into one that counts them.
    ///
    /// Lands before any line breaks at that position.
    pub fn to_global(&self, index: GlobalIndexNoBreaks) -> GlobalIndex {
        let mut remaining = index.get();
        let mut acc = 0usize;
        for page in &self.pages {
            let visible = page.len() - page.content().newlines();
            if remaining <= visible {
                let mut seen = 0usize;
                for (offset, ch) in page.content().chars().enumerate() {
                    if seen == remaining {
                        return GlobalIndex(acc + offset);
                    }
                    if ch != '\n' {
                        seen += 1;
                    }
                }
                return GlobalIndex(acc + page.len());
            }
            remaining -= visible;
            acc += page.len();
        }
        GlobalIndex(acc)
    }

    /// Convert an index that counts line breaks into one that skips them.
    pub fn to_no_breaks(&self, index: GlobalIndex) -> GlobalIndexNoBreaks {
        let index = index.clamp_to(self.len());
        let breaks = self.get_newlines_between(GlobalIndex(0), index);
        GlobalIndexNoBreaks(index.get() - breaks)
    }

    /// Verify every page's formatting covers its text exactly.
    pub fn check_coverage(&self) -> Result<(), CoverageError> {
        for page in &self.pages {
            page.check_coverage()?;
        }
        Ok(())
    }

    /// Overflow diagnostics from the most recent rebalance.
    pub fn diagnostics(&self) -> &[PageDiagnostic] {
        &self.diagnostics
    }

    pub fn metrics_stats(&self) -> MetricsCacheStats {
        self.metrics.stats()
    }

    pub fn is_rebalance_pending(&self) -> bool {
        self.scheduler.is_some_and(|s| s.is_pending())
    }

    // ---- layout ------------------------------------------------------------

    /// Render items for `[start, end)` (clamped), one per character.
    ///
    /// Only pages intersecting the range are laid out. Pending rebalancing
    /// runs first.
    pub fn render(&mut self, start: GlobalIndex, end: GlobalIndex) -> Vec<RenderItem> {
        self.flush();
        let targets = self.intersecting(start.get(), end.get());
        let mut items = Vec::new();
        let mut reuse_events = Vec::new();
        for (idx, local_start, local_end) in targets {
            let Some(page) = self.pages.get_mut(idx) else {
                continue;
            };
            let reused = page.ensure_layout(self.paginator.engine(), &mut self.metrics);
            if reused > 0 {
                reuse_events.push(LayoutEvent::LayoutReused {
                    page_number: page.number(),
                    reused_items: reused,
                });
            }
            if let Some(slice) = page.layout().get(local_start..local_end) {
                items.extend(slice.iter().cloned());
            }
        }
        for event in reuse_events {
            self.emit(event);
        }
        items
    }

    /// Render items for the whole document.
    pub fn render_all(&mut self) -> Vec<RenderItem> {
        let end = GlobalIndex(self.len());
        self.render(GlobalIndex(0), end)
    }

    /// Run a deferred rebalance whose deadline has passed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let span = self.scheduler.as_mut().and_then(|s| s.take_due(now));
        match span {
            Some(span) => {
                self.run_rebalance(span);
                true
            }
            None => false,
        }
    }

    /// Run any deferred rebalance now.
    pub fn flush(&mut self) -> bool {
        let span = self.scheduler.as_mut().and_then(RebalanceScheduler::take);
        match span {
            Some(span) => {
                self.run_rebalance(span);
                true
            }
            None => false,
        }
    }

    fn request_rebalance(&mut self, span: RebalanceSpan) {
        let Some(scheduler) = self.scheduler.as_mut() else {
            self.run_rebalance(span);
            return;
        };
        let superseded = scheduler.schedule(Instant::now(), span);
        if superseded {
            self.emit(LayoutEvent::RebalanceSuperseded);
        }
        self.emit(LayoutEvent::RebalanceDeferred);
    }

    fn run_rebalance(&mut self, span: RebalanceSpan) {
        let started = Instant::now();
        let report = self
            .paginator
            .rebalance(&mut self.pages, &mut self.metrics, span);
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        debug_assert!(
            self.check_coverage().is_ok(),
            "formatting coverage broken after rebalance"
        );
        self.absorb_report(report, span.first + 1, elapsed_us);
    }

    fn absorb_report(&mut self, report: RebalanceReport, first_page: usize, elapsed_us: u64) {
        for (page_number, reused_items) in &report.reused {
            self.emit(LayoutEvent::LayoutReused {
                page_number: *page_number,
                reused_items: *reused_items,
            });
        }
        for diagnostic in &report.diagnostics {
            self.emit(LayoutEvent::PageOverflow(diagnostic.clone()));
        }
        self.diagnostics = report.diagnostics;
        self.emit(LayoutEvent::Rebalanced {
            first_page,
            page_count: self.pages.len(),
            elapsed_us,
        });
    }

    // ---- serialization -----------------------------------------------------

    /// Every render item with the formatting needed to rebuild the document.
    pub fn export_render_items(&mut self) -> Vec<RenderItemRecord> {
        self.flush();
        let mut records = Vec::with_capacity(self.len());
        for idx in 0..self.pages.len() {
            let Some(page) = self.pages.get_mut(idx) else {
                continue;
            };
            page.ensure_layout(self.paginator.engine(), &mut self.metrics);
            let page = &*page;
            for (offset, item) in page.layout().iter().enumerate() {
                let source = page
                    .styles()
                    .style_at(offset)
                    .unwrap_or(&self.cfg.default_style);
                records.push(RenderItemRecord::from_item(item, source));
            }
        }
        records
    }

    /// Rebuild from exported records.
    ///
    /// An empty document takes the records as-is: pages, formatting and
    /// cached layouts are rebuilt without a layout pass. Otherwise the text
    /// is appended through ordinary inserts. Returns the characters added.
    pub fn insert_from_render_items(&mut self, records: &[RenderItemRecord]) -> usize {
        if records.is_empty() {
            return 0;
        }
        self.flush();
        if !self.is_empty() {
            return self.insert_records_as_text(records);
        }

        let started = Instant::now();
        let mut pages = Vec::new();
        let mut group_start = 0usize;
        for end in 1..=records.len() {
            let closes_group = records
                .get(end)
                .is_none_or(|next| next.page_number != records[group_start].page_number);
            if closes_group {
                let lead = pages
                    .last()
                    .map_or(LineLead::LINE_START, Page::trailing_lead);
                let frame = PageFrame::new(self.cfg.page, pages.len() + 1).with_lead(lead);
                pages.push(self.page_from_records(frame, &records[group_start..end]));
                group_start = end;
            }
        }
        self.pages = pages;
        self.diagnostics.clear();
        debug_assert!(
            self.check_coverage().is_ok(),
            "imported formatting does not cover imported text"
        );
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        log::debug!(
            "imported {} records into {} pages",
            records.len(),
            self.pages.len()
        );
        self.emit(LayoutEvent::Rebalanced {
            first_page: 1,
            page_count: self.pages.len(),
            elapsed_us,
        });
        records.len()
    }

    fn page_from_records(&self, frame: PageFrame, group: &[RenderItemRecord]) -> Page {
        let text: String = group.iter().map(|record| record.real_char).collect();
        let content = ContentStore::from_text(&text);
        let mut styles = StyleIndex::new();
        let mut run: Option<(usize, Style)> = None;
        for (offset, record) in group.iter().enumerate() {
            let style = record.source_style();
            match run.take() {
                Some((start, current)) if current == style => run = Some((start, current)),
                Some((start, current)) => {
                    styles.insert(start..offset, current);
                    run = Some((offset, style));
                }
                None => run = Some((offset, style)),
            }
        }
        if let Some((start, current)) = run {
            styles.insert(start..group.len(), current);
        }
        let items = group
            .iter()
            .map(|record| {
                let mut item = record.to_item();
                item.page_number = frame.number;
                item
            })
            .collect();
        Page::from_parts(frame, content, styles, LayoutCache::clean(items))
    }

    fn insert_records_as_text(&mut self, records: &[RenderItemRecord]) -> usize {
        let mut added = 0usize;
        let mut text = String::new();
        let mut current: Option<Style> = None;
        for record in records {
            let style = record.source_style().without_line_break();
            if current.as_ref().is_some_and(|c| *c != style) {
                if let Some(run_style) = current.take() {
                    added += self.append_text(&text, &run_style);
                    text.clear();
                }
            }
            current = Some(style);
            text.push(record.real_char);
        }
        if let Some(run_style) = current {
            added += self.append_text(&text, &run_style);
        }
        added
    }

    fn append_text(&mut self, text: &str, style: &Style) -> usize {
        let at = GlobalIndex(self.len());
        self.insert(at, text, style).get() - at.get()
    }

    /// Snapshot of the current document.
    pub fn to_snapshot(&mut self) -> DocumentSnapshot {
        let records = self.export_render_items();
        DocumentSnapshot::new(self.cfg.page.width, self.cfg.page.height, records)
    }

    /// Load `snapshot` into this document.
    ///
    /// A snapshot taken at another page size is re-laid out and paginated
    /// instead of trusted. Returns the characters added.
    pub fn restore_snapshot(&mut self, snapshot: &DocumentSnapshot) -> Result<usize, SnapshotError> {
        snapshot.check_version()?;
        let same_size = snapshot.page_width == self.cfg.page.width
            && snapshot.page_height == self.cfg.page.height;
        let added = if same_size {
            self.insert_from_render_items(&snapshot.records)
        } else {
            log::debug!(
                "snapshot page {}x{} differs from {}x{}; re-paginating",
                snapshot.page_width,
                snapshot.page_height,
                self.cfg.page.width,
                self.cfg.page.height
            );
            self.insert_records_as_text(&snapshot.records)
        };
        self.flush();
        Ok(added)
    }

    // ---- helpers -----------------------------------------------------------

    /// Page owning `index` and the page-local offset. A boundary index
    /// belongs to the earlier page.
    fn locate(&self, index: usize) -> (usize, usize) {
        let mut acc = 0usize;
        for (idx, page) in self.pages.iter().enumerate() {
            let len = page.len();
            if index <= acc + len {
                return (idx, index - acc);
            }
            acc += len;
        }
        let last = self.pages.len().saturating_sub(1);
        (last, self.pages.get(last).map_or(0, Page::len))
    }

    /// `(page index, local start, local end)` for every non-empty page
    /// intersecting `[start, end)`.
    fn intersecting(&self, start: usize, end: usize) -> Vec<(usize, usize, usize)> {
        let mut out = Vec::new();
        if start >= end {
            return out;
        }
        let mut acc = 0usize;
        for (idx, page) in self.pages.iter().enumerate() {
            let (page_start, page_end) = (acc, acc + page.len());
            acc = page_end;
            if page_end <= start || page_start == page_end {
                continue;
            }
            if page_start >= end {
                break;
            }
            out.push((
                idx,
                start.max(page_start) - page_start,
                end.min(page_end) - page_start,
            ));
        }
        out
    }
}

fn normalize_line_breaks(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

fn push_run(runs: &mut Vec<FormattedRun>, text: String, style: Option<Style>) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = runs.last_mut() {
        if last.style == style {
            last.text.push_str(&text);
            return;
        }
    }
    runs.push(FormattedRun { text, style });
}
