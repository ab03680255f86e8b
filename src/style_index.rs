//! Interval map from page-local character ranges to styles.
//!
//! Intervals are half-open and never overlap. Between restyles a page's
//! intervals cover `[0, len)` exactly; [`StyleIndex::check_coverage`] verifies
//! that. Adjacent intervals with equal styles are merged whenever an edit
//! makes them touch.

use core::fmt;
use core::ops::Range;
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::style::{Style, StylePatch};

/// One stored interval and its style.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyledInterval {
    /// Half-open page-local range.
    pub range: Range<usize>,
    /// Style applied to every character in `range`.
    pub style: Style,
}

/// Search result buffer; most queries touch a handful of intervals.
pub type IntervalHits = SmallVec<[StyledInterval; 4]>;

/// Coverage invariant breach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoverageError {
    /// `range` is covered by no interval.
    Gap { range: Range<usize> },
    /// Two intervals both cover `at`.
    Overlap { at: usize },
    /// An interval extends past the end of the content.
    PastEnd { high: usize, len: usize },
}

impl fmt::Display for CoverageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gap { range } => {
                write!(f, "formatting gap at {}..{}", range.start, range.end)
            }
            Self::Overlap { at } => write!(f, "overlapping formatting at {}", at),
            Self::PastEnd { high, len } => write!(
                f,
                "formatting interval ends at {} past content length {}",
                high, len
            ),
        }
    }
}

impl std::error::Error for CoverageError {}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    high: usize,
    style: Style,
}

/// Interval-indexed style map for one page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleIndex {
    map: BTreeMap<usize, Entry>,
}

impl StyleIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index covering `[0, len)` with a single style.
    pub fn uniform(len: usize, style: Style) -> Self {
        let mut index = Self::new();
        index.insert(0..len, style);
        index
    }

    /// Number of stored intervals.
    pub fn interval_count(&self) -> usize {
        self.map.len()
    }

    /// Whether no interval is stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate all intervals in order.
    pub fn iter(&self) -> impl Iterator<Item = StyledInterval> + '_ {
        self.map.iter().map(|(low, entry)| StyledInterval {
            range: *low..entry.high,
            style: entry.style.clone(),
        })
    }

    /// Paint `range` with `style`, clipping whatever it overlaps.
    pub fn insert(&mut self, range: Range<usize>, style: Style) {
        if range.start >= range.end {
            return;
        }
        self.remove(range.clone());
        self.map.insert(
            range.start,
            Entry {
                high: range.end,
                style,
            },
        );
        self.coalesce(range.start, range.end);
    }

    /// Clip `range` out of the index. May leave a gap.
    pub fn remove(&mut self, range: Range<usize>) {
        let Range { start, end } = range;
        if start >= end {
            return;
        }
        for hit in self.search(start..end) {
            self.map.remove(&hit.range.start);
            if hit.range.start < start {
                self.map.insert(
                    hit.range.start,
                    Entry {
                        high: start,
                        style: hit.style.clone(),
                    },
                );
            }
            if hit.range.end > end {
                self.map.insert(
                    end,
                    Entry {
                        high: hit.range.end,
                        style: hit.style,
                    },
                );
            }
        }
    }

    /// Every stored interval overlapping `range`, unclipped, in order.
    pub fn search(&self, range: Range<usize>) -> IntervalHits {
        let mut hits = IntervalHits::new();
        if range.start >= range.end {
            return hits;
        }
        if let Some((low, entry)) = self.map.range(..range.start).next_back() {
            if entry.high > range.start {
                hits.push(StyledInterval {
                    range: *low..entry.high,
                    style: entry.style.clone(),
                });
            }
        }
        for (low, entry) in self.map.range(range.start..range.end) {
            hits.push(StyledInterval {
                range: *low..entry.high,
                style: entry.style.clone(),
            });
        }
        hits
    }

    /// Intervals overlapping `range`, clipped to it.
    pub fn runs(&self, range: Range<usize>) -> Vec<StyledInterval> {
        self.search(range.clone())
            .into_iter()
            .map(|hit| StyledInterval {
                range: hit.range.start.max(range.start)..hit.range.end.min(range.end),
                style: hit.style,
            })
            .collect()
    }

    /// Style covering `index`, if any.
    pub fn style_at(&self, index: usize) -> Option<&Style> {
        self.map
            .range(..=index)
            .next_back()
            .filter(|(_, entry)| entry.high > index)
            .map(|(_, entry)| &entry.style)
    }

    /// Shift intervals for an edit at `index`.
    ///
    /// A positive `delta` is an insertion of `delta` characters at `index`; a
    /// negative one deletes `[index, index + |delta|)`.
    pub fn shift_after(&mut self, index: usize, delta: isize) {
        if delta > 0 {
            self.shift_for_insert(index, delta.unsigned_abs());
        } else if delta < 0 {
            let len = delta.unsigned_abs();
            self.shift_for_delete(index, index.saturating_add(len));
        }
    }

    /// Open a `len`-character hole at `at`.
    ///
    /// Intervals starting at or after `at` are translated; an interval
    /// straddling `at` is stretched over the hole; intervals ending at or
    /// before `at` are untouched, which leaves the hole unformatted when `at`
    /// sits on a boundary.
    pub fn shift_for_insert(&mut self, at: usize, len: usize) {
        if len == 0 {
            return;
        }
        let tail = self.map.split_off(&at);
        if let Some((_, entry)) = self.map.range_mut(..at).next_back() {
            if entry.high > at {
                entry.high += len;
            }
        }
        for (low, entry) in tail {
            self.map.insert(
                low + len,
                Entry {
                    high: entry.high + len,
                    style: entry.style,
                },
            );
        }
    }

    /// Collapse `[start, end)` out of the index.
    ///
    /// Intervals after the range move left, straddling ones are clipped and
    /// intervals swallowed whole disappear.
    pub fn shift_for_delete(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let len = end - start;
        let map_pos = |pos: usize| {
            if pos <= start {
                pos
            } else if pos >= end {
                pos - len
            } else {
                start
            }
        };
        let tail = self.map.split_off(&start);
        if let Some((_, entry)) = self.map.range_mut(..start).next_back() {
            entry.high = map_pos(entry.high);
        }
        for (low, entry) in tail {
            let (new_low, new_high) = (map_pos(low), map_pos(entry.high));
            if new_low < new_high {
                self.map.insert(
                    new_low,
                    Entry {
                        high: new_high,
                        style: entry.style,
                    },
                );
            }
        }
        self.coalesce(start, start);
    }

    /// Patch every style inside `[start, end)`.
    ///
    /// Boundary intervals are split so only the range changes; any gap is
    /// filled with `base` patched the same way. Afterwards `[start, end)` is
    /// covered by contiguous, non-overlapping intervals.
    pub fn alter_formatting(&mut self, start: usize, end: usize, patch: &StylePatch, base: &Style) {
        if start >= end {
            return;
        }
        self.split_at(start);
        self.split_at(end);

        let keys: Vec<usize> = self.map.range(start..end).map(|(low, _)| *low).collect();
        let mut gaps: SmallVec<[Range<usize>; 2]> = SmallVec::new();
        let mut cursor = start;
        for key in keys {
            if key > cursor {
                gaps.push(cursor..key);
            }
            if let Some(entry) = self.map.get_mut(&key) {
                entry.style = entry.style.patched(patch);
                cursor = entry.high;
            }
        }
        if cursor < end {
            gaps.push(cursor..end);
        }
        if !gaps.is_empty() {
            let gap_style = base.patched(patch);
            for gap in gaps {
                self.map.insert(
                    gap.start,
                    Entry {
                        high: gap.end,
                        style: gap_style.clone(),
                    },
                );
            }
        }
        self.coalesce(start, end);
        debug_assert!(
            self.covers(start, end),
            "alter_formatting left {}..{} partially unformatted",
            start,
            end
        );
    }

    /// Verify that intervals cover `[0, len)` exactly once.
    pub fn check_coverage(&self, len: usize) -> Result<(), CoverageError> {
        let mut cursor = 0usize;
        for (low, entry) in &self.map {
            if *low < cursor {
                return Err(CoverageError::Overlap { at: *low });
            }
            if *low > cursor {
                return Err(CoverageError::Gap {
                    range: cursor..*low,
                });
            }
            if entry.high > len {
                return Err(CoverageError::PastEnd {
                    high: entry.high,
                    len,
                });
            }
            cursor = entry.high;
        }
        if cursor < len {
            return Err(CoverageError::Gap { range: cursor..len });
        }
        Ok(())
    }

    /// Split at `at`, keeping `[0, at)` and returning the rest rebased to 0.
    pub fn split_off(&mut self, at: usize) -> StyleIndex {
        self.split_at(at);
        let tail = self.map.split_off(&at);
        StyleIndex {
            map: tail
                .into_iter()
                .map(|(low, entry)| {
                    (
                        low - at,
                        Entry {
                            high: entry.high - at,
                            style: entry.style,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Append `other`, rebased to start at `offset` (normally the current
    /// content length).
    pub fn append(&mut self, other: StyleIndex, offset: usize) {
        for (low, entry) in other.map {
            self.map.insert(
                low + offset,
                Entry {
                    high: entry.high + offset,
                    style: entry.style,
                },
            );
        }
        self.coalesce(offset, offset);
    }

    /// Prepend `other`, which covers `other_len` characters.
    pub fn prepend(&mut self, other: StyleIndex, other_len: usize) {
        self.shift_for_insert(0, other_len);
        for (low, entry) in other.map {
            self.map.insert(low, entry);
        }
        self.coalesce(other_len, other_len);
    }

    fn covers(&self, start: usize, end: usize) -> bool {
        let mut cursor = start;
        for hit in self.search(start..end) {
            if hit.range.start > cursor {
                return false;
            }
            cursor = cursor.max(hit.range.end);
        }
        cursor >= end
    }

    /// Split the interval straddling `at` into `[low, at)` and `[at, high)`.
    fn split_at(&mut self, at: usize) {
        let Some((_, entry)) = self.map.range_mut(..at).next_back() else {
            return;
        };
        if entry.high <= at {
            return;
        }
        let right = Entry {
            high: entry.high,
            style: entry.style.clone(),
        };
        entry.high = at;
        self.map.insert(at, right);
    }

    /// Merge equal-style neighbours among intervals touching `[start, end]`.
    fn coalesce(&mut self, start: usize, end: usize) {
        let from = self
            .map
            .range(..start)
            .next_back()
            .map(|(low, _)| *low)
            .unwrap_or(start);
        let keys: SmallVec<[usize; 8]> = self
            .map
            .range(from..=end)
            .map(|(low, _)| *low)
            .collect();
        let mut keys = keys.into_iter();
        let Some(mut current) = keys.next() else {
            return;
        };
        for key in keys {
            let mergeable = match (self.map.get(&current), self.map.get(&key)) {
                (Some(left), Some(right)) => left.high == key && left.style == right.style,
                _ => false,
            };
            if !mergeable {
                current = key;
                continue;
            }
            if let Some(right) = self.map.remove(&key) {
                if let Some(left) = self.map.get_mut(&current) {
                    left.high = right.high;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> Style {
        Style::default().with_color("red")
    }

    fn ranges(index: &StyleIndex) -> Vec<Range<usize>> {
        index.iter().map(|hit| hit.range).collect()
    }

    #[test]
    fn alter_formatting_splits_uniform_range_into_three() {
        let base = Style::default();
        let mut index = StyleIndex::uniform(10, base.clone());
        index.alter_formatting(2, 5, &StylePatch::new().color("red"), &base);

        let hits = index.search(0..10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].range, 0..2);
        assert_eq!(hits[0].style, base);
        assert_eq!(hits[1].range, 2..5);
        assert_eq!(&*hits[1].style.color, "red");
        assert_eq!(hits[2].range, 5..10);
        assert_eq!(hits[2].style, base);
        assert!(index.check_coverage(10).is_ok());
    }

    #[test]
    fn alter_formatting_fills_gaps_with_patched_base() {
        let base = Style::default();
        let mut index = StyleIndex::new();
        index.insert(0..3, red());
        index.insert(6..8, red());
        index.alter_formatting(0, 10, &StylePatch::new().italic(true), &base);

        assert!(index.check_coverage(10).is_ok());
        let hits = index.search(0..10);
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().all(|hit| hit.style.italic));
        assert_eq!(hits[1].range, 3..6);
        assert_eq!(hits[1].style, base.patched(&StylePatch::new().italic(true)));
    }

    #[test]
    fn repeated_patches_coalesce_back() {
        let base = Style::default();
        let mut index = StyleIndex::uniform(10, base.clone());
        index.alter_formatting(2, 5, &StylePatch::new().color("red"), &base);
        index.alter_formatting(0, 10, &StylePatch::new().color("red"), &base);
        assert_eq!(ranges(&index), vec![0..10]);
    }

    #[test]
    fn insert_shift_handles_after_straddling_and_before() {
        let mut index = StyleIndex::new();
        index.insert(0..4, Style::default());
        index.insert(4..8, red());
        index.insert(8..12, Style::default().with_weight(700));

        index.shift_for_insert(6, 3);
        assert_eq!(ranges(&index), vec![0..4, 4..11, 11..15]);

        // Boundary insert leaves an unformatted hole for the caller to paint.
        index.shift_for_insert(4, 2);
        assert_eq!(ranges(&index), vec![0..4, 6..13, 13..17]);
        assert!(matches!(
            index.check_coverage(17),
            Err(CoverageError::Gap { range }) if range == (4..6)
        ));
    }

    #[test]
    fn delete_shift_clips_and_coalesces() {
        let mut index = StyleIndex::new();
        index.insert(0..4, Style::default());
        index.insert(4..6, red());
        index.insert(6..10, Style::default());

        index.shift_for_delete(3, 7);
        assert_eq!(ranges(&index), vec![0..6]);
        assert!(index.check_coverage(6).is_ok());
    }

    #[test]
    fn shift_after_dispatches_on_sign() {
        let mut index = StyleIndex::uniform(10, Style::default());
        index.shift_after(5, 4);
        assert_eq!(ranges(&index), vec![0..14]);
        index.shift_after(2, -6);
        assert_eq!(ranges(&index), vec![0..8]);
        index.shift_after(0, 0);
        assert_eq!(ranges(&index), vec![0..8]);
    }

    #[test]
    fn remove_clips_and_restyle_fills_the_hole() {
        let mut index = StyleIndex::uniform(10, Style::default());
        index.remove(3..6);
        assert_eq!(ranges(&index), vec![0..3, 6..10]);
        index.alter_formatting(0, 10, &StylePatch::new(), &red());
        assert_eq!(ranges(&index), vec![0..3, 3..6, 6..10]);
        assert_eq!(index.style_at(4), Some(&red()));
    }

    #[test]
    fn split_off_and_prepend_move_formatting_between_pages() {
        let mut first = StyleIndex::new();
        first.insert(0..5, Style::default());
        first.insert(5..9, red());
        let tail = first.split_off(7);
        assert_eq!(ranges(&first), vec![0..5, 5..7]);
        assert_eq!(ranges(&tail), vec![0..2]);

        let mut second = StyleIndex::uniform(4, red());
        second.prepend(tail, 2);
        assert_eq!(ranges(&second), vec![0..6]);
        assert!(second.check_coverage(6).is_ok());

        let mut merged = first.clone();
        merged.append(second, 7);
        assert_eq!(ranges(&merged), vec![0..5, 5..13]);
    }

    #[test]
    fn runs_are_clipped_to_query() {
        let mut index = StyleIndex::new();
        index.insert(0..5, Style::default());
        index.insert(5..10, red());
        let runs = index.runs(3..7);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].range, 3..5);
        assert_eq!(runs[1].range, 5..7);
    }

    #[test]
    fn coverage_reports_overrun() {
        let index = StyleIndex::uniform(5, Style::default());
        assert_eq!(
            index.check_coverage(4),
            Err(CoverageError::PastEnd { high: 5, len: 4 })
        );
    }
}
