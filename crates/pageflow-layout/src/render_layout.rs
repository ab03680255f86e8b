//! Per-page glyph layout and the layout cache that lets edits reuse it.

use pageflow::{ContentStore, Style, StyledInterval};

use crate::metrics::MetricsCache;
use crate::render_ir::{GlyphRole, LayoutConfig, PageSize, RenderItem};

/// Edited region of a page since its layout was cached.
///
/// `[start, new_end)` in the current content replaced
/// `[start, new_end - delta)` of the content the cached layout was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtySpan {
    pub start: usize,
    pub new_end: usize,
    pub delta: isize,
}

impl DirtySpan {
    /// Span for replacing `removed` characters at `at` with `inserted` ones.
    pub fn for_edit(at: usize, removed: usize, inserted: usize) -> Self {
        Self {
            start: at,
            new_end: at + inserted,
            delta: signed_delta(inserted, removed),
        }
    }

    /// Fold a later edit, expressed in current coordinates, into this span.
    pub fn merge(self, at: usize, removed: usize, inserted: usize) -> Self {
        let edit_delta = signed_delta(inserted, removed);
        let end = at + removed;
        let new_end = self.new_end.max(end).saturating_add_signed(edit_delta);
        Self {
            start: self.start.min(at),
            new_end: new_end.max(at + inserted),
            delta: self.delta + edit_delta,
        }
    }
}

fn signed_delta(inserted: usize, removed: usize) -> isize {
    if inserted >= removed {
        isize::try_from(inserted - removed).unwrap_or(isize::MAX)
    } else {
        -isize::try_from(removed - inserted).unwrap_or(isize::MAX)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CacheState {
    Clean,
    Dirty(DirtySpan),
    Invalid,
}

/// Last layout of a page plus what changed since.
#[derive(Clone, Debug)]
pub struct LayoutCache {
    items: Vec<RenderItem>,
    state: CacheState,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            state: CacheState::Invalid,
        }
    }
}

impl LayoutCache {
    /// Cache holding `items` as an up-to-date layout.
    pub fn clean(items: Vec<RenderItem>) -> Self {
        Self {
            items,
            state: CacheState::Clean,
        }
    }

    /// Whether the cached items match the current content.
    pub fn is_clean(&self) -> bool {
        self.state == CacheState::Clean
    }

    /// Cached items. Only meaningful while clean.
    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    /// Pending edit span, if the cache is dirty but reusable.
    pub fn dirty_span(&self) -> Option<DirtySpan> {
        match self.state {
            CacheState::Dirty(span) => Some(span),
            _ => None,
        }
    }

    /// Record that `removed` characters at `at` became `inserted` ones.
    pub fn mark_edit(&mut self, at: usize, removed: usize, inserted: usize) {
        if removed == 0 && inserted == 0 {
            return;
        }
        self.state = match self.state {
            CacheState::Clean => CacheState::Dirty(DirtySpan::for_edit(at, removed, inserted)),
            CacheState::Dirty(span) => CacheState::Dirty(span.merge(at, removed, inserted)),
            CacheState::Invalid => CacheState::Invalid,
        };
    }

    /// Forget the cached layout entirely.
    pub fn invalidate(&mut self) {
        self.items.clear();
        self.state = CacheState::Invalid;
    }

    /// Keep only the first `len` items of a clean layout.
    ///
    /// A prefix lays out exactly as before, except that its final item now
    /// ends a line.
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
        if let Some(last) = self.items.last_mut() {
            last.is_last_of_line = true;
        }
    }

    /// Replace the cache with a fresh layout.
    pub fn store(&mut self, items: Vec<RenderItem>) {
        self.items = items;
        self.state = CacheState::Clean;
    }

    /// Re-tag cached items after the page moved from `old` to `new`.
    ///
    /// Tags past `old` (overflow) move by the same offset.
    pub fn retag(&mut self, old: usize, new: usize) {
        if old == new {
            return;
        }
        for item in &mut self.items {
            item.page_number = (item.page_number + new).saturating_sub(old).max(1);
        }
    }
}

/// Result of one layout pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutOutcome {
    pub items: Vec<RenderItem>,
    /// Items spliced from the previous layout instead of recomputed.
    pub reused: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
enum LineKind {
    #[default]
    Plain,
    List,
    Heading,
}

impl LineKind {
    /// Kind of a line whose first two characters are `first` and `next`.
    fn classify(first: Option<char>, next: Option<char>) -> Self {
        match (first, next) {
            (Some('-'), Some(' ')) => Self::List,
            (Some('#'), Some(' ')) => Self::Heading,
            _ => Self::Plain,
        }
    }
}

/// Characters of a `"- "` or `"# "` marker.
const MARKER_LEN: usize = 2;

/// Line state a page's first character continues from.
///
/// A paragraph flowing over a page boundary keeps its list indent or
/// heading scale on the next page, and markers are only recognised where a
/// line really starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LineLead {
    kind: LineKind,
    /// Characters of the line on earlier pages, capped once roles stop
    /// depending on the count.
    carried: usize,
}

impl LineLead {
    /// Document start, or a page whose predecessor ends with `\n`.
    pub const LINE_START: Self = Self {
        kind: LineKind::Plain,
        carried: 0,
    };

    fn new(kind: LineKind, carried: usize) -> Self {
        let cap = match kind {
            LineKind::Plain => 1,
            LineKind::List | LineKind::Heading => MARKER_LEN,
        };
        Self {
            kind,
            carried: carried.min(cap),
        }
    }

    pub fn is_line_start(self) -> bool {
        self.carried == 0
    }

    /// Lead of the page after one that starts with `self` and holds
    /// `content`.
    pub fn after(self, content: &ContentStore) -> Self {
        let len = content.len();
        let line_start = match content.last_newline() {
            Some(newline) => newline + 1,
            None if self.is_line_start() => 0,
            None => return Self::new(self.kind, self.carried + len),
        };
        if line_start == len {
            return Self::LINE_START;
        }
        let kind = LineKind::classify(content.char_at(line_start), content.char_at(line_start + 1));
        Self::new(kind, len - line_start)
    }
}

/// Box, number and entry line state of the page being laid out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageFrame {
    pub size: PageSize,
    pub number: usize,
    pub lead: LineLead,
}

impl PageFrame {
    /// Frame for a page that starts a fresh line.
    pub fn new(size: PageSize, number: usize) -> Self {
        Self {
            size,
            number,
            lead: LineLead::LINE_START,
        }
    }

    pub fn with_lead(mut self, lead: LineLead) -> Self {
        self.lead = lead;
        self
    }
}

#[derive(Clone, Debug)]
struct Cursor {
    x: f32,
    y: f32,
    line_height: f32,
    logical_page: usize,
    on_page: usize,
    line_has_glyph: bool,
    line_indent: f32,
    line_start: usize,
    /// Characters of the current line before `line_start`.
    carried: usize,
    line: LineKind,
}

impl Cursor {
    fn at_page_start(frame: PageFrame, cfg: &LayoutConfig) -> Self {
        let lead = frame.lead;
        let indent = if lead.kind == LineKind::List && lead.carried >= MARKER_LEN {
            cfg.list_text_indent
        } else {
            0.0
        };
        Self {
            x: indent,
            y: 0.0,
            line_height: 0.0,
            logical_page: frame.number,
            on_page: 0,
            line_has_glyph: false,
            line_indent: indent,
            line_start: 0,
            carried: lead.carried,
            line: lead.kind,
        }
    }
}

struct StyleCursor<'a> {
    runs: &'a [StyledInterval],
    idx: usize,
    fallback: Style,
    gap_reported: bool,
}

impl<'a> StyleCursor<'a> {
    fn new(runs: &'a [StyledInterval]) -> Self {
        Self {
            runs,
            idx: 0,
            fallback: Style::default(),
            gap_reported: false,
        }
    }

    fn style_at(&mut self, index: usize) -> Style {
        while self.idx < self.runs.len() && self.runs[self.idx].range.end <= index {
            self.idx += 1;
        }
        match self.runs.get(self.idx) {
            Some(run) if run.range.start <= index => run.style.clone(),
            _ => {
                if !self.gap_reported {
                    log::error!("no formatting covers index {}; using default style", index);
                    self.gap_reported = true;
                }
                self.fallback.clone()
            }
        }
    }
}

/// Positions every character of a page.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutEngine {
    cfg: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(cfg: LayoutConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.cfg
    }

    /// Full layout of `content` styled by `runs` into `frame`.
    ///
    /// Items that do not fit carry a page tag above `frame.number`.
    pub fn compute_layout(
        &self,
        content: &ContentStore,
        runs: &[StyledInterval],
        frame: PageFrame,
        metrics: &mut MetricsCache,
    ) -> Vec<RenderItem> {
        self.scan(content, runs, frame, metrics, None).items
    }

    /// Layout reusing `previous` outside the dirty span: rows before the
    /// edit are copied, and the tail is spliced back once the line state
    /// lines up. Otherwise identical to a full layout.
    pub fn compute_layout_incremental(
        &self,
        content: &ContentStore,
        runs: &[StyledInterval],
        frame: PageFrame,
        metrics: &mut MetricsCache,
        previous: &[RenderItem],
        dirty: DirtySpan,
    ) -> LayoutOutcome {
        self.scan(content, runs, frame, metrics, Some((previous, dirty)))
    }

    fn scan(
        &self,
        content: &ContentStore,
        runs: &[StyledInterval],
        frame: PageFrame,
        metrics: &mut MetricsCache,
        reuse: Option<(&[RenderItem], DirtySpan)>,
    ) -> LayoutOutcome {
        let chars: Vec<char> = content.chars().collect();
        let mut styles = StyleCursor::new(runs);
        let mut items: Vec<RenderItem> = Vec::with_capacity(chars.len());
        let mut reused = 0usize;
        let mut cur = Cursor::at_page_start(frame, &self.cfg);
        let mut first = 0usize;

        if let Some((previous, dirty)) = reuse {
            if let Some((row, resumed)) = resume_point(previous, dirty, &chars) {
                items.extend_from_slice(&previous[..row]);
                reused = row;
                first = row;
                cur = resumed;
            }
        }

        for (i, &ch) in chars.iter().enumerate().skip(first) {
            let line_start = if i == 0 {
                frame.lead.is_line_start()
            } else {
                chars[i - 1] == '\n'
            };
            if line_start {
                if let Some((previous, dirty)) = reuse {
                    if let Some(j) = splice_point(previous, dirty, i, &chars, &cur) {
                        reused += previous.len() - j;
                        log::trace!(
                            "page {}: reusing {} cached items from index {}",
                            frame.number,
                            previous.len() - j,
                            i
                        );
                        items.extend(previous[j..].iter().cloned());
                        break;
                    }
                }
                cur.line_start = i;
                cur.carried = 0;
                cur.line = LineKind::classify(Some(ch), chars.get(i + 1).copied());
            }

            let source = styles.style_at(i);
            let item = self.place(ch, i, source, &mut cur, frame.size, metrics, &mut items);
            items.push(item);
        }

        if let Some(last) = items.last_mut() {
            last.is_last_of_line = true;
        }
        LayoutOutcome { items, reused }
    }

    #[allow(clippy::too_many_arguments)]
    fn place(
        &self,
        ch: char,
        index: usize,
        source: Style,
        cur: &mut Cursor,
        size: PageSize,
        metrics: &mut MetricsCache,
        items: &mut [RenderItem],
    ) -> RenderItem {
        let offset = index - cur.line_start + cur.carried;
        let role = if ch == '\n' {
            GlyphRole::LineBreak
        } else {
            match (cur.line, offset) {
                (LineKind::List, 0) => GlyphRole::ListBullet,
                (LineKind::List, 1) | (LineKind::Heading, 0) | (LineKind::Heading, 1) => {
                    GlyphRole::HiddenMarker
                }
                (LineKind::Heading, _) => GlyphRole::Heading,
                _ => GlyphRole::Text,
            }
        };

        let (display_char, style, m) = match role {
            GlyphRole::LineBreak => {
                let m = metrics.metrics_for(' ', &source.without_line_break());
                (ch, source, m)
            }
            GlyphRole::ListBullet => {
                let m = metrics.metrics_for(self.cfg.bullet_char, &source);
                (self.cfg.bullet_char, source, m)
            }
            GlyphRole::Heading => {
                let scaled = source.scaled(self.cfg.heading_scale);
                let m = metrics.metrics_for(ch, &scaled);
                (ch, scaled, m)
            }
            GlyphRole::HiddenMarker | GlyphRole::Text => {
                let m = metrics.metrics_for(ch, &source);
                (ch, source, m)
            }
        };
        let width = if role.is_hidden() { 0.0 } else { m.width };

        if role == GlyphRole::ListBullet {
            cur.x = cur.x.max(self.cfg.bullet_indent);
        }
        if width > 0.0 && cur.line_has_glyph && cur.x + width > size.width {
            if let Some(prev) = items.last_mut() {
                prev.is_last_of_line = true;
            }
            cur.x = cur.line_indent;
            cur.y += cur.line_height;
            cur.line_height = 0.0;
            cur.line_has_glyph = false;
        }
        if cur.y + m.cap_height > size.height && cur.on_page > 0 {
            cur.logical_page += 1;
            cur.y = 0.0;
            cur.on_page = 0;
        }

        cur.line_height = cur.line_height.max(m.cap_height);
        let mut item = RenderItem {
            real_char: ch,
            display_char,
            x: cur.x,
            y: cur.y,
            width,
            height: m.height,
            cap_height: m.cap_height,
            style,
            page_number: cur.logical_page,
            is_last_of_line: false,
            role,
        };
        cur.on_page += 1;

        match role {
            GlyphRole::LineBreak => {
                item.is_last_of_line = true;
                cur.x = 0.0;
                cur.y += cur.line_height;
                cur.line_height = 0.0;
                cur.line_has_glyph = false;
                cur.line_indent = 0.0;
                cur.line = LineKind::Plain;
            }
            GlyphRole::HiddenMarker => {
                cur.line_has_glyph = true;
                if cur.line == LineKind::List {
                    cur.x = cur.x.max(self.cfg.list_text_indent);
                    cur.line_indent = self.cfg.list_text_indent;
                }
            }
            _ => {
                cur.line_has_glyph = true;
                cur.x += width + self.cfg.letter_spacing;
            }
        }
        item
    }
}

/// Latest visual row starting at or before the edit, with the cursor state
/// a full scan would have on entering it.
///
/// A row after `\n` may start exactly at the edit. A wrapped row must start
/// before it, since the wrap was decided by the row's first glyph.
fn resume_point(
    previous: &[RenderItem],
    dirty: DirtySpan,
    chars: &[char],
) -> Option<(usize, Cursor)> {
    let limit = dirty.start.min(previous.len()).min(chars.len());
    let row = (1..=limit).rev().find(|&w| {
        let before = &previous[w - 1];
        if before.real_char == '\n' {
            chars[w - 1] == '\n'
        } else {
            before.is_last_of_line && w < limit
        }
    })?;

    let before = &previous[row - 1];
    let row_begin = previous[..row - 1]
        .iter()
        .rposition(|item| item.is_last_of_line)
        .map_or(0, |k| k + 1);
    let line_height = previous[row_begin..row]
        .iter()
        .map(|item| item.cap_height)
        .fold(0.0f32, f32::max);

    let mut cur = Cursor {
        x: 0.0,
        y: before.y + line_height,
        line_height: 0.0,
        logical_page: before.page_number,
        on_page: 1,
        line_has_glyph: false,
        line_indent: 0.0,
        line_start: row,
        carried: 0,
        line: LineKind::Plain,
    };
    if before.real_char != '\n' {
        // Wrapped rows open at the line's indent; markers are behind us.
        let first = &previous[row];
        cur.x = first.x;
        cur.line_indent = first.x;
        cur.carried = MARKER_LEN;
        cur.line = if first.role == GlyphRole::Heading {
            LineKind::Heading
        } else if first.x > 0.0 {
            LineKind::List
        } else {
            LineKind::Plain
        };
    }
    Some((row, cur))
}

/// Index into `previous` where the rest of the layout can be spliced, if the
/// line starting at `i` provably lays out the same as before.
fn splice_point(
    previous: &[RenderItem],
    dirty: DirtySpan,
    i: usize,
    chars: &[char],
    cur: &Cursor,
) -> Option<usize> {
    if i == 0 || i < dirty.new_end {
        return None;
    }
    let j = usize::try_from(isize::try_from(i).ok()?.checked_sub(dirty.delta)?).ok()?;
    if j == 0 || j >= previous.len() || previous.len() - j != chars.len() - i {
        return None;
    }
    let (before, at) = (&previous[j - 1], &previous[j]);
    let lines_up = before.real_char == '\n'
        && at.real_char == chars[i]
        && at.y == cur.y
        && at.x == 0.0
        && at.page_number == cur.logical_page
        && before.page_number == cur.logical_page;
    lines_up.then_some(j)
}
