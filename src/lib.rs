//! Editable styled text storage for `pageflow`.
//!
//! This crate holds the page-local text model: a rope for characters,
//! an interval map for formatting, and the index newtypes shared with the
//! layout crate.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod content;
pub mod index;
pub mod style;
pub mod style_index;

pub use content::ContentStore;
pub use index::{GlobalIndex, GlobalIndexNoBreaks};
pub use style::{Style, StylePatch, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_TEXT_COLOR};
pub use style_index::{CoverageError, StyleIndex, StyledInterval};
