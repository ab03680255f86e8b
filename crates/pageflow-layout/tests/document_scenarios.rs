use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pageflow_layout::{
    Document, DocumentConfig, DocumentSnapshot, FixedMetrics, GlobalIndex, GlyphMetrics,
    GlyphRole, LayoutEvent, MeasureError, MetricsProvider, Style, StylePatch,
};

/// Width half the font size, height and cap height equal to it.
struct ScaledMetrics;

impl MetricsProvider for ScaledMetrics {
    fn measure(&self, ch: char, style: &Style) -> Result<GlyphMetrics, MeasureError> {
        let width = if ch == '\n' { 0.0 } else { style.font_size / 2.0 };
        Ok(GlyphMetrics {
            width,
            height: style.font_size,
            cap_height: style.font_size,
        })
    }
}

fn fixed_doc() -> Document {
    Document::with_metrics_provider(
        DocumentConfig::for_page(400.0, 300.0),
        Arc::new(FixedMetrics(GlyphMetrics::FALLBACK)),
    )
}

fn scaled_doc() -> Document {
    Document::with_metrics_provider(
        DocumentConfig::for_page(400.0, 300.0),
        Arc::new(ScaledMetrics),
    )
}

fn page_lens(doc: &Document) -> Vec<usize> {
    doc.pages().iter().map(|page| page.len()).collect()
}

fn prose(chars: usize) -> String {
    "lorem ipsum dolor sit amet consectetur "
        .chars()
        .cycle()
        .take(chars)
        .collect()
}

fn assert_items_fit(doc: &mut Document) {
    let width = doc.config().page.width;
    let height = doc.config().page.height;
    let items = doc.render_all();
    assert_eq!(items.len(), doc.len());
    for (idx, item) in items.iter().enumerate() {
        assert!(item.right() <= width, "item {} right {} > {}", idx, item.right(), width);
        assert!(item.bottom() <= height, "item {} bottom {} > {}", idx, item.bottom(), height);
    }
}

fn record_events(doc: &mut Document) -> Arc<Mutex<Vec<LayoutEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    doc.set_event_sink(move |event| {
        if let Ok(mut events) = sink.lock() {
            events.push(event);
        }
    });
    events
}

#[test]
fn hello_world_is_two_lines_on_one_page() {
    let mut doc = fixed_doc();
    doc.insert(GlobalIndex(0), "Hello\nWorld", &Style::default());
    assert_eq!(doc.get_text(), "Hello\nWorld");
    assert_eq!(doc.page_count(), 1);

    let items = doc.render_all();
    assert_eq!(items.len(), 11);
    assert_eq!(items[5].role, GlyphRole::LineBreak);
    assert!(items[5].is_last_of_line);
    assert!(!items[4].is_last_of_line);
    assert_eq!(items[0].y, 0.0);
    assert_eq!(items[6].y, 16.0);
    assert_eq!(items[6].x, 0.0);
    assert!(items[10].is_last_of_line);
}

#[test]
fn long_run_paginates_and_reconstructs() {
    let mut doc = fixed_doc();
    let text = prose(10_000);
    doc.insert(GlobalIndex(0), &text, &Style::default());

    assert_eq!(doc.page_count(), 12);
    assert!(doc.pages().iter().all(|page| !page.is_empty()));
    assert_eq!(page_lens(&doc)[0], 900);
    assert_eq!(doc.get_text(), text);
    assert!(doc.check_coverage().is_ok());
    assert!(doc.diagnostics().is_empty());
    for (idx, page) in doc.pages().iter().enumerate() {
        assert_eq!(page.number(), idx + 1);
    }
    assert_items_fit(&mut doc);
}

#[test]
fn list_markers_render_as_bullets_but_text_is_literal() {
    let mut doc = fixed_doc();
    doc.insert(GlobalIndex(0), "- item one\n- item two", &Style::default());
    assert_eq!(doc.get_text(), "- item one\n- item two");

    let items = doc.render_all();
    for start in [0usize, 11] {
        assert_eq!(items[start].real_char, '-');
        assert_eq!(items[start].display_char, '\u{2022}');
        assert_eq!(items[start].role, GlyphRole::ListBullet);
        assert_eq!(items[start + 1].real_char, ' ');
        assert!(items[start + 1].is_hidden());
    }
    assert_eq!(items[2].x, 24.0);
}

#[test]
fn restyle_splits_uniform_formatting_into_three() {
    let mut doc = fixed_doc();
    doc.insert(GlobalIndex(0), "abcdefghij", &Style::default());
    doc.alter_formatting(GlobalIndex(2), GlobalIndex(5), &StylePatch::new().color("red"));

    let hits = doc.pages()[0].styles().search(0..10);
    let ranges: Vec<_> = hits.iter().map(|hit| hit.range.clone()).collect();
    assert_eq!(ranges, vec![0..2, 2..5, 5..10]);
    assert_eq!(hits[0].style, Style::default());
    assert_eq!(&*hits[1].style.color, "red");
    assert_eq!(hits[2].style, Style::default());
}

#[test]
fn delete_spanning_four_pages_compacts_the_rest() {
    let mut doc = fixed_doc();
    let text = prose(10_000);
    doc.insert(GlobalIndex(0), &text, &Style::default());

    let removed = doc.delete(GlobalIndex(500), GlobalIndex(3_500));
    assert_eq!(removed, 3_000);

    let mut expected: String = text.chars().take(500).collect();
    expected.extend(text.chars().skip(3_500));
    assert_eq!(doc.get_text(), expected);
    assert_eq!(page_lens(&doc), vec![900, 900, 900, 900, 900, 900, 900, 700]);
    assert!(doc.check_coverage().is_ok());
    assert_items_fit(&mut doc);
}

#[test]
fn delete_everything_leaves_one_empty_page() {
    let mut doc = fixed_doc();
    doc.insert(GlobalIndex(0), &prose(3_000), &Style::default());
    doc.delete(GlobalIndex(0), GlobalIndex(10_000));
    assert!(doc.is_empty());
    assert_eq!(doc.page_count(), 1);
    assert_eq!(doc.pages()[0].number(), 1);
}

#[test]
fn growing_and_shrinking_font_moves_text_between_pages() {
    let mut doc = scaled_doc();
    let text = prose(1_800);
    doc.insert(GlobalIndex(0), &text, &Style::default());
    assert_eq!(page_lens(&doc), vec![900, 900]);

    let end = GlobalIndex(doc.len());
    doc.alter_formatting(GlobalIndex(0), end, &StylePatch::new().font_size(32.0));
    // 25 glyphs by 9 lines per page.
    assert_eq!(page_lens(&doc)[0], 225);
    assert_eq!(doc.page_count(), 8);
    assert_eq!(doc.get_text(), text);
    assert_items_fit(&mut doc);

    doc.alter_formatting(GlobalIndex(0), end, &StylePatch::new().font_size(16.0));
    assert_eq!(page_lens(&doc), vec![900, 900]);
    assert!(doc.check_coverage().is_ok());
}

#[test]
fn inserting_at_a_page_boundary_pushes_forward() {
    let mut doc = fixed_doc();
    doc.insert(GlobalIndex(0), &"a".repeat(1_800), &Style::default());
    doc.insert(GlobalIndex(900), "bbb", &Style::default());
    assert_eq!(page_lens(&doc), vec![900, 900, 3]);
    assert_eq!(doc.get_char_at(GlobalIndex(900)), Some('b'));
    assert_eq!(doc.text_between(GlobalIndex(899), GlobalIndex(904)), "abbba");
}

#[test]
fn debounced_edits_supersede_and_apply_once() {
    let cfg = DocumentConfig::for_page(400.0, 300.0).with_debounce(Duration::from_secs(30));
    let mut doc = Document::with_metrics_provider(cfg, Arc::new(FixedMetrics(GlyphMetrics::FALLBACK)));
    let events = record_events(&mut doc);

    doc.insert(GlobalIndex(0), &"a".repeat(1_000), &Style::default());
    doc.insert(GlobalIndex(0), &"b".repeat(1_000), &Style::default());
    assert!(doc.is_rebalance_pending());
    assert_eq!(doc.page_count(), 1);
    assert_eq!(doc.len(), 2_000);
    assert!(!doc.tick(Instant::now()));

    assert!(doc.tick(Instant::now() + Duration::from_secs(60)));
    assert!(!doc.is_rebalance_pending());
    assert_eq!(page_lens(&doc), vec![900, 900, 200]);

    let events = events.lock().map(|e| e.clone()).unwrap_or_default();
    let deferred = events
        .iter()
        .filter(|e| matches!(e, LayoutEvent::RebalanceDeferred))
        .count();
    let superseded = events
        .iter()
        .filter(|e| matches!(e, LayoutEvent::RebalanceSuperseded))
        .count();
    let rebalanced = events
        .iter()
        .filter(|e| matches!(e, LayoutEvent::Rebalanced { .. }))
        .count();
    assert_eq!((deferred, superseded, rebalanced), (2, 1, 1));
}

#[test]
fn render_flushes_pending_rebalance() {
    let cfg = DocumentConfig::for_page(400.0, 300.0).with_debounce(Duration::from_secs(30));
    let mut doc = Document::with_metrics_provider(cfg, Arc::new(FixedMetrics(GlyphMetrics::FALLBACK)));
    doc.insert(GlobalIndex(0), &"a".repeat(1_000), &Style::default());

    let items = doc.render(GlobalIndex(890), GlobalIndex(910));
    assert_eq!(items.len(), 20);
    assert_eq!(items[9].page_number, 1);
    assert_eq!(items[10].page_number, 2);
    assert_eq!(items[10].y, 0.0);
    assert!(!doc.flush());
}

#[test]
fn typing_reports_layout_reuse() {
    let mut doc = fixed_doc();
    let text: String = (0..12).map(|n| format!("line {n}\n")).collect();
    doc.insert(GlobalIndex(0), &text, &Style::default());
    doc.render_all();
    let events = record_events(&mut doc);

    doc.insert(GlobalIndex(2), "x", &Style::default());
    let events = events.lock().map(|e| e.clone()).unwrap_or_default();
    assert!(events
        .iter()
        .any(|e| matches!(e, LayoutEvent::LayoutReused { page_number: 1, reused_items } if *reused_items > 0)));
}

#[test]
fn keystroke_on_first_page_measures_far_less_than_a_page() {
    let mut doc = fixed_doc();
    let text = format!("{}\n", "b".repeat(30)).repeat(90);
    doc.insert(GlobalIndex(0), &text, &Style::default());
    assert_eq!(doc.page_count(), 5);
    let first_page = doc.pages()[0].len();
    assert_eq!(first_page, 558);
    doc.render_all();

    let before = doc.metrics_stats();
    doc.insert(GlobalIndex(2), "x", &Style::default());
    doc.render_all();
    let after = doc.metrics_stats();

    let lookups = (after.hits + after.misses) - (before.hits + before.misses);
    assert!(lookups < first_page as u64, "{lookups} lookups for one keystroke");
    assert_eq!(page_lens(&doc)[0], 559);
    assert_eq!(doc.page_count(), 5);
}

#[test]
fn snapshot_round_trips_through_json_and_postcard() {
    let mut doc = fixed_doc();
    doc.insert(GlobalIndex(0), "# Title\n- one\n- two\n", &Style::default());
    doc.insert(GlobalIndex(doc.len()), &prose(2_000), &Style::default());
    doc.alter_formatting(GlobalIndex(10), GlobalIndex(40), &StylePatch::new().bold().italic(true));
    let original_items = doc.render_all();
    let original_runs = doc.get_formatted_text(GlobalIndex(0), GlobalIndex(doc.len()));

    let snapshot = doc.to_snapshot();
    let json = snapshot.to_json().unwrap();
    let bytes = snapshot.to_postcard().unwrap();
    for decoded in [
        DocumentSnapshot::from_json(&json).unwrap(),
        DocumentSnapshot::from_postcard(&bytes).unwrap(),
    ] {
        let mut restored = Document::with_metrics_provider(
            DocumentConfig::for_page(400.0, 300.0),
            Arc::new(FixedMetrics(GlyphMetrics::FALLBACK)),
        );
        restored.restore_snapshot(&decoded).unwrap();
        assert_eq!(restored.get_text(), doc.get_text());
        assert_eq!(page_lens(&restored), page_lens(&doc));
        assert!(restored.pages().iter().all(|page| page.has_clean_layout()));
        assert_eq!(
            restored.get_formatted_text(GlobalIndex(0), GlobalIndex(restored.len())),
            original_runs
        );
        assert_eq!(restored.render_all(), original_items);
        assert!(restored.check_coverage().is_ok());
    }
}

#[test]
fn snapshot_from_another_page_size_is_repaginated() {
    let mut doc = fixed_doc();
    doc.insert(GlobalIndex(0), &prose(1_800), &Style::default());
    let snapshot = doc.to_snapshot();

    let restored = Document::from_snapshot(DocumentConfig::for_page(200.0, 300.0), &snapshot);
    let mut restored = restored.unwrap();
    assert_eq!(restored.get_text(), doc.get_text());
    assert_eq!(restored.pages()[0].len(), 450);
    assert_items_fit(&mut restored);
}

#[test]
fn importing_into_a_non_empty_document_appends() {
    let mut source = fixed_doc();
    source.insert(GlobalIndex(0), "tail", &Style::default().with_weight(700));
    let records = source.export_render_items();

    let mut doc = fixed_doc();
    doc.insert(GlobalIndex(0), "head ", &Style::default());
    assert_eq!(doc.insert_from_render_items(&records), 4);
    assert_eq!(doc.get_text(), "head tail");
    let runs = doc.get_formatted_text(GlobalIndex(0), GlobalIndex(9));
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1].text, "tail");
}
