use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use pageflow_layout::{
    Document, DocumentConfig, DocumentSnapshot, FixedMetrics, GlobalIndex, GlyphMetrics, Style,
    StylePatch,
};

const PAGE_WIDTH: f32 = 400.0;
const PAGE_HEIGHT: f32 = 300.0;

const SIZES: &[(&str, usize)] = &[("10k", 10_000), ("50k", 50_000), ("200k", 200_000)];

#[derive(Clone, Debug)]
struct CaseResult {
    fixture: String,
    case: String,
    iterations: usize,
    min_ns: u128,
    median_ns: u128,
    mean_ns: u128,
    max_ns: u128,
}

fn percentile_u128(sorted: &[u128], percentile: f64) -> u128 {
    let idx = ((sorted.len().saturating_sub(1) as f64) * percentile).round() as usize;
    sorted[idx]
}

fn sample_text(chars: usize) -> String {
    const PARAGRAPH: &str = "# Chapter heading\n\
        The quick brown fox jumps over the lazy dog while the page keeps flowing.\n\
        - first bullet with a little text\n\
        - second bullet that is long enough to wrap onto a hanging continuation line\n\n";
    PARAGRAPH.chars().cycle().take(chars).collect()
}

fn fixed_document() -> Document {
    Document::with_metrics_provider(
        DocumentConfig::for_page(PAGE_WIDTH, PAGE_HEIGHT),
        Arc::new(FixedMetrics(GlyphMetrics::FALLBACK)),
    )
}

fn loaded_document(text: &str) -> Document {
    let mut doc = fixed_document();
    doc.insert(GlobalIndex(0), text, &Style::default());
    doc
}

fn run_case<F>(
    fixture: &str,
    case: &str,
    warmup_iters: usize,
    measure_iters: usize,
    mut op: F,
) -> CaseResult
where
    F: FnMut() -> usize,
{
    for _ in 0..warmup_iters {
        black_box(op());
    }

    let mut samples = Vec::with_capacity(measure_iters);
    for _ in 0..measure_iters {
        let start = Instant::now();
        black_box(op());
        samples.push(start.elapsed().as_nanos());
    }
    samples.sort_unstable();
    let sum: u128 = samples.iter().copied().sum();

    CaseResult {
        fixture: fixture.to_string(),
        case: case.to_string(),
        iterations: measure_iters,
        min_ns: samples[0],
        median_ns: percentile_u128(&samples, 0.5),
        mean_ns: sum / samples.len() as u128,
        max_ns: samples[samples.len() - 1],
    }
}

fn main() {
    let quick = std::env::args().any(|arg| arg == "--quick");
    let warmup_iters = if quick { 1 } else { 2 };
    let measure_iters = if quick { 3 } else { 10 };

    println!("# pageflow pagination benchmark");
    println!(
        "# mode={} warmup_iters={} measure_iters={}",
        if quick { "quick" } else { "full" },
        warmup_iters,
        measure_iters
    );
    println!("fixture,case,iterations,min_ns,median_ns,mean_ns,max_ns");

    let mut results = Vec::new();
    for (fixture, chars) in SIZES {
        let text = sample_text(*chars);

        results.push(run_case(fixture, "paginate", warmup_iters, measure_iters, || {
            loaded_document(&text).page_count()
        }));

        let mut typing = loaded_document(&text);
        let mut typed = 0usize;
        results.push(run_case(fixture, "type_at_start", warmup_iters, measure_iters, || {
            typed += 1;
            typing.insert(GlobalIndex(typed), "x", &Style::default());
            typing.render(GlobalIndex(0), GlobalIndex(64)).len()
        }));

        results.push(run_case(
            fixture,
            "delete_across_pages",
            warmup_iters,
            measure_iters,
            || {
                let mut doc = loaded_document(&text);
                doc.delete(GlobalIndex(500), GlobalIndex(3_500));
                doc.page_count()
            },
        ));

        results.push(run_case(fixture, "restyle_all", warmup_iters, measure_iters, || {
            let mut doc = loaded_document(&text);
            let end = GlobalIndex(doc.len());
            doc.alter_formatting(GlobalIndex(0), end, &StylePatch::new().font_size(20.0));
            doc.page_count()
        }));

        let mut source = loaded_document(&text);
        let snapshot = source.to_snapshot();
        let json = snapshot
            .to_json()
            .unwrap_or_else(|e| panic!("encode failed: {}", e));
        let bytes = snapshot
            .to_postcard()
            .unwrap_or_else(|e| panic!("encode failed: {}", e));

        results.push(run_case(fixture, "restore_json", warmup_iters, measure_iters, || {
            let snapshot =
                DocumentSnapshot::from_json(&json).unwrap_or_else(|e| panic!("decode failed: {}", e));
            let doc = Document::from_snapshot(DocumentConfig::for_page(PAGE_WIDTH, PAGE_HEIGHT), &snapshot)
                .unwrap_or_else(|e| panic!("restore failed: {}", e));
            doc.page_count()
        }));

        results.push(run_case(
            fixture,
            "restore_postcard",
            warmup_iters,
            measure_iters,
            || {
                let snapshot = DocumentSnapshot::from_postcard(&bytes)
                    .unwrap_or_else(|e| panic!("decode failed: {}", e));
                let doc = Document::from_snapshot(
                    DocumentConfig::for_page(PAGE_WIDTH, PAGE_HEIGHT),
                    &snapshot,
                )
                .unwrap_or_else(|e| panic!("restore failed: {}", e));
                doc.page_count()
            },
        ));
    }

    for result in &results {
        println!(
            "{},{},{},{},{},{},{}",
            result.fixture,
            result.case,
            result.iterations,
            result.min_ns,
            result.median_ns,
            result.mean_ns,
            result.max_ns
        );
    }
}
