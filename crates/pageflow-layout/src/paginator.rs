//! Moves text between neighbouring pages until every page fits its box.

use crate::metrics::MetricsCache;
use crate::page::Page;
use crate::render_ir::PageSize;
use crate::render_layout::{LayoutEngine, LineLead};

/// Most characters pulled from the next page in one step.
const PULL_CHUNK: usize = 256;

/// Kind of edit that made a rebalance necessary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RebalanceMode {
    /// Text was inserted after the first character of `first`; the pass
    /// starts at `first`.
    Grow,
    /// Text was removed or restyled; the previous page may now take more, so
    /// the pass starts one page earlier.
    Shrink,
}

/// Pages touched by an edit, as 0-based page indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RebalanceSpan {
    pub first: usize,
    pub last: usize,
    pub mode: RebalanceMode,
}

impl RebalanceSpan {
    /// Span for an insertion into one page.
    pub fn grow(page: usize) -> Self {
        Self {
            first: page,
            last: page,
            mode: RebalanceMode::Grow,
        }
    }

    /// Span for a delete or restyle over `first..=last`.
    pub fn shrink(first: usize, last: usize) -> Self {
        Self {
            first: first.min(last),
            last: first.max(last),
            mode: RebalanceMode::Shrink,
        }
    }

    /// Smallest span covering both. `Shrink` wins over `Grow`.
    pub fn merge(self, other: Self) -> Self {
        let mode = if self.mode == RebalanceMode::Shrink || other.mode == RebalanceMode::Shrink {
            RebalanceMode::Shrink
        } else {
            RebalanceMode::Grow
        };
        Self {
            first: self.first.min(other.first),
            last: self.last.max(other.last),
            mode,
        }
    }
}

/// Layout problem that rebalancing cannot fix.
#[derive(Clone, Debug, PartialEq)]
pub enum PageDiagnostic {
    /// Content wider or taller than the page, typically one oversized glyph.
    Overflow {
        page_number: usize,
        content_width: f32,
        content_height: f32,
    },
}

/// What one rebalance pass did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RebalanceReport {
    pub pages_laid_out: usize,
    pub chars_moved_forward: usize,
    pub chars_moved_back: usize,
    pub pages_created: usize,
    pub pages_removed: usize,
    /// `(page_number, items)` for every page whose layout reused cached items.
    pub reused: Vec<(usize, usize)>,
    pub diagnostics: Vec<PageDiagnostic>,
}

/// Keeps a page list balanced against one page size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paginator {
    engine: LayoutEngine,
    size: PageSize,
}

impl Paginator {
    pub fn new(engine: LayoutEngine, size: PageSize) -> Self {
        Self { engine, size }
    }

    pub fn engine(&self) -> &LayoutEngine {
        &self.engine
    }

    pub fn page_size(&self) -> PageSize {
        self.size
    }

    /// Restore the pagination invariants after an edit within `span`.
    ///
    /// Overflow moves forward page by page. A visited page with room pulls
    /// the next page's text a line at a time until it overflows, then pushes
    /// back what no longer fits, so text flows back into freed space. Each
    /// visited page's entry line state is refreshed from its predecessor.
    /// The cascade stops once the span has been covered and a page leaves
    /// its successor's text and line state unchanged. Empty pages are
    /// dropped (one page always remains) and pages are renumbered.
    pub fn rebalance(
        &self,
        pages: &mut Vec<Page>,
        metrics: &mut MetricsCache,
        span: RebalanceSpan,
    ) -> RebalanceReport {
        let mut report = RebalanceReport::default();
        if pages.is_empty() {
            pages.push(Page::new(1, self.size));
            report.pages_created += 1;
        }
        let mut last = span.last.min(pages.len() - 1);
        let start = match span.mode {
            RebalanceMode::Grow => span.first,
            RebalanceMode::Shrink => span.first.saturating_sub(1),
        }
        .min(pages.len() - 1);

        let mut i = start;
        while i < pages.len() {
            let lead = match i.checked_sub(1) {
                Some(prev) => pages[prev].trailing_lead(),
                None => LineLead::LINE_START,
            };
            if pages[i].set_lead(lead) {
                log::trace!("page {} now starts with {:?}", i + 1, lead);
            }

            let mut pulled = 0usize;
            let mut pushed = 0usize;
            loop {
                if !pages[i].has_clean_layout() {
                    let reused = pages[i].ensure_layout(&self.engine, metrics);
                    report.pages_laid_out += 1;
                    if reused > 0 {
                        report.reused.push((pages[i].number(), reused));
                    }
                }

                if let Some(cut) = pages[i].overflow_cut() {
                    let (content, styles) = pages[i].split_off(cut);
                    pushed = content.len();
                    if i + 1 == pages.len() {
                        pages.push(Page::new(i + 2, self.size));
                        report.pages_created += 1;
                    }
                    pages[i + 1].prepend(content, styles);
                    log::trace!(
                        "moved {} chars from page {} to page {}",
                        pushed,
                        i + 1,
                        i + 2
                    );
                    break;
                }

                // Room left; pull while later pages hold text.
                while pages.get(i + 1).is_some_and(Page::is_empty) {
                    pages.remove(i + 1);
                    report.pages_removed += 1;
                    if i < last {
                        last -= 1;
                    }
                }
                let Some(next) = pages.get_mut(i + 1) else {
                    break;
                };
                let count = next.leading_line_len(PULL_CHUNK);
                let (content, styles) = next.take_front(count);
                pulled += content.len();
                pages[i].append(content, styles);
            }

            report.chars_moved_back += pulled.saturating_sub(pushed);
            report.chars_moved_forward += pushed.saturating_sub(pulled);

            let successor_changed = pushed != pulled
                || pages
                    .get(i + 1)
                    .is_some_and(|next| next.lead() != pages[i].trailing_lead());
            if !successor_changed && i >= last {
                break;
            }
            i += 1;
        }
        let visited_last = i.min(pages.len() - 1);

        let before = pages.len();
        pages.retain(|page| !page.is_empty());
        if pages.is_empty() {
            pages.push(Page::new(1, self.size));
        }
        report.pages_removed += before.saturating_sub(pages.len());
        for (idx, page) in pages.iter_mut().enumerate() {
            page.set_number(idx + 1);
        }

        let end = visited_last.min(pages.len() - 1);
        for page in pages.iter().take(end + 1).skip(start.min(end)) {
            if let Some(diagnostic) = self.check_fit(page) {
                log::warn!("page overflow: {:?}", diagnostic);
                report.diagnostics.push(diagnostic);
            }
        }

        log::debug!(
            "rebalance from page {}: laid out {}, forward {}, back {}, +{} -{} pages",
            start + 1,
            report.pages_laid_out,
            report.chars_moved_forward,
            report.chars_moved_back,
            report.pages_created,
            report.pages_removed
        );
        report
    }

    fn check_fit(&self, page: &Page) -> Option<PageDiagnostic> {
        if !page.has_clean_layout() {
            return None;
        }
        let mut content_width = 0.0f32;
        let mut content_height = 0.0f32;
        for item in page.layout() {
            content_width = content_width.max(item.right());
            content_height = content_height.max(item.bottom());
        }
        if content_width > self.size.width || content_height > self.size.height {
            Some(PageDiagnostic::Overflow {
                page_number: page.number(),
                content_width,
                content_height,
            })
        } else {
            None
        }
    }
}
