//! Document-level character index flavours.
//!
//! Two conventions exist for addressing characters across a whole document:
//! one that counts stored line breaks and one that does not. They are kept as
//! separate types so call sites cannot mix them up.

use core::fmt;

/// Document-wide character index that counts stored `\n` characters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalIndex(pub usize);

/// Document-wide character index that skips stored `\n` characters.
///
/// Callers that reason about visible character positions (caret placement,
/// selection by glyph count) use this flavour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalIndexNoBreaks(pub usize);

impl GlobalIndex {
    /// Raw index value.
    pub fn get(self) -> usize {
        self.0
    }

    /// Clamp into `[0, len]`.
    pub fn clamp_to(self, len: usize) -> Self {
        Self(self.0.min(len))
    }
}

impl GlobalIndexNoBreaks {
    /// Raw index value.
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for GlobalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GlobalIndexNoBreaks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
