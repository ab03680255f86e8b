//! Glyph layout, pagination, and the document façade for `pageflow`.

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

mod document;
mod metrics;
mod page;
mod paginator;
mod persist;
mod render_ir;
mod render_layout;
mod schedule;

pub use document::{Document, DocumentConfig, FormattedRun, LayoutEvent};
pub use metrics::{
    FixedMetrics, GlyphMetrics, HeuristicMetrics, MeasureError, MetricsCache, MetricsCacheStats,
    MetricsProvider, DEFAULT_METRICS_CACHE_CAPACITY,
};
pub use page::Page;
pub use pageflow::{
    ContentStore, CoverageError, GlobalIndex, GlobalIndexNoBreaks, Style, StyleIndex, StylePatch,
    StyledInterval,
};
pub use paginator::{PageDiagnostic, Paginator, RebalanceMode, RebalanceReport, RebalanceSpan};
pub use persist::{
    DocumentSnapshot, PersistedGlyphRole, PersistedStyle, RenderItemRecord, SnapshotError,
    SNAPSHOT_SCHEMA_VERSION,
};
pub use render_ir::{GlyphRole, LayoutConfig, PageSize, RenderItem, DEFAULT_BULLET};
pub use render_layout::{
    DirtySpan, LayoutCache, LayoutEngine, LayoutOutcome, LineLead, PageFrame,
};
pub use schedule::RebalanceScheduler;
