//! Per-page character store on top of [`ropey::Rope`].
//!
//! Every index is a character index. Out-of-range indices are clamped rather
//! than rejected: inserting past the end appends, and delete ranges are
//! trimmed to the stored text. Only `\n` counts as a line break.

use core::fmt;
use core::ops::Range;

use ropey::Rope;

/// Mutable, randomly indexable character sequence.
#[derive(Clone, Debug, Default)]
pub struct ContentStore {
    rope: Rope,
}

impl ContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    /// Build a store from `text` in one pass.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Number of characters.
    pub fn len(&self) -> usize {
        self.rope.len_chars()
    }

    /// Whether the store holds no characters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `\n` characters.
    pub fn newlines(&self) -> usize {
        self.rope.len_lines() - 1
    }

    /// Index of the last `\n`, if any.
    pub fn last_newline(&self) -> Option<usize> {
        let lines = self.rope.len_lines();
        (lines > 1).then(|| self.rope.line_to_char(lines - 1) - 1)
    }

    /// Insert `text` at `index`, clamped to `[0, len]`.
    ///
    /// Returns the index the text actually landed at.
    pub fn insert(&mut self, index: usize, text: &str) -> usize {
        let index = index.min(self.len());
        if !text.is_empty() {
            self.rope.insert(index, text);
        }
        index
    }

    /// Delete `[start, end)` after clamping both bounds to `[0, len]`.
    ///
    /// Returns the clamped range that was removed; empty or reversed ranges
    /// remove nothing.
    pub fn delete(&mut self, start: usize, end: usize) -> Range<usize> {
        let Some(range) = clamp_range(start, end, self.len()) else {
            let at = start.min(self.len());
            return at..at;
        };
        self.rope.remove(range.clone());
        range
    }

    /// Copy out `[start, end)` after clamping.
    pub fn substring(&self, start: usize, end: usize) -> String {
        match clamp_range(start, end, self.len()) {
            Some(range) => self.rope.slice(range).to_string(),
            None => String::new(),
        }
    }

    /// Character at `index`, if in bounds.
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.rope.get_char(index)
    }

    /// Count `\n` characters within `[start, end)` after clamping.
    pub fn newlines_in(&self, start: usize, end: usize) -> usize {
        match clamp_range(start, end, self.len()) {
            Some(range) => self.rope.char_to_line(range.end) - self.rope.char_to_line(range.start),
            None => 0,
        }
    }

    /// Split the store at `at` (clamped), keeping `[0, at)` and returning
    /// `[at, len)`.
    pub fn split_off(&mut self, at: usize) -> ContentStore {
        let at = at.min(self.len());
        Self {
            rope: self.rope.split_off(at),
        }
    }

    /// Append another store's characters.
    pub fn append(&mut self, other: ContentStore) {
        if !other.is_empty() {
            self.rope.append(other.rope);
        }
    }

    /// Iterate stored text chunks in order.
    pub fn chunks(&self) -> impl Iterator<Item = &str> + '_ {
        self.rope.chunks()
    }

    /// Iterate characters in order.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.rope.chars()
    }
}

impl fmt::Display for ContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.rope, f)
    }
}

impl From<&str> for ContentStore {
    fn from(value: &str) -> Self {
        Self::from_text(value)
    }
}

fn clamp_range(start: usize, end: usize, len: usize) -> Option<Range<usize>> {
    let start = start.min(len);
    let end = end.min(len);
    (start < end).then_some(start..end)
}
