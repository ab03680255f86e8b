use std::env;
use std::process::ExitCode;

use pageflow_layout::{Document, DocumentConfig, GlobalIndex, Style};

#[derive(Clone, Debug)]
struct Args {
    input: String,
    width: f32,
    height: f32,
    json: bool,
    snapshot_out: Option<String>,
    postcard: bool,
}

fn main() -> ExitCode {
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("{}", help_text());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let cfg = parse_args(args)?;
    let text = std::fs::read_to_string(&cfg.input)
        .map_err(|e| format!("unable to read '{}': {}", cfg.input, e))?;

    let mut doc = Document::new(DocumentConfig::for_page(cfg.width, cfg.height));
    doc.insert(GlobalIndex(0), &text, &Style::default());

    if cfg.json || cfg.snapshot_out.is_some() {
        let snapshot = doc.to_snapshot();
        if cfg.json {
            println!("{}", snapshot.to_json_pretty().map_err(|e| e.to_string())?);
        }
        if let Some(path) = &cfg.snapshot_out {
            let bytes = if cfg.postcard {
                snapshot.to_postcard().map_err(|e| e.to_string())?
            } else {
                snapshot.to_json().map_err(|e| e.to_string())?.into_bytes()
            };
            std::fs::write(path, &bytes).map_err(|e| e.to_string())?;
            eprintln!(
                "wrote {} record(s) to {} ({} bytes)",
                snapshot.records.len(),
                path,
                bytes.len()
            );
        }
        return Ok(());
    }

    doc.render_all();
    println!("page\tchars\tlines\tfirst_line");
    for page in doc.pages() {
        let lines = page
            .layout()
            .iter()
            .filter(|item| item.is_last_of_line)
            .count();
        let first_line: String = page
            .content()
            .chars()
            .take_while(|ch| *ch != '\n')
            .take(40)
            .collect();
        println!(
            "{}\t{}\t{}\t{}",
            page.number(),
            page.len(),
            lines,
            first_line
        );
    }
    for diagnostic in doc.diagnostics() {
        eprintln!("warning: {:?}", diagnostic);
    }
    let stats = doc.metrics_stats();
    println!(
        "{} page(s), {} chars, metrics cache hits={} misses={} fallbacks={}",
        doc.page_count(),
        doc.len(),
        stats.hits,
        stats.misses,
        stats.fallbacks
    );
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        return Err("help requested".to_string());
    }
    let input = args
        .get(1)
        .filter(|v| !v.starts_with("--"))
        .cloned()
        .ok_or_else(|| "missing input file".to_string())?;

    let mut cfg = Args {
        input,
        width: 400.0,
        height: 300.0,
        json: false,
        snapshot_out: None,
        postcard: false,
    };

    let mut i = 2usize;
    while i < args.len() {
        match args[i].as_str() {
            "--width" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--width requires a value".to_string())?;
                cfg.width = v
                    .parse::<f32>()
                    .map_err(|_| format!("invalid --width value '{}'", v))?;
                i += 2;
            }
            "--height" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--height requires a value".to_string())?;
                cfg.height = v
                    .parse::<f32>()
                    .map_err(|_| format!("invalid --height value '{}'", v))?;
                i += 2;
            }
            "--json" => {
                cfg.json = true;
                i += 1;
            }
            "--snapshot" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--snapshot requires a value".to_string())?;
                cfg.snapshot_out = Some(v.clone());
                i += 2;
            }
            "--postcard" => {
                cfg.postcard = true;
                i += 1;
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }

    if cfg.postcard && cfg.snapshot_out.is_none() {
        return Err("--postcard requires --snapshot".to_string());
    }
    Ok(cfg)
}

fn help_text() -> &'static str {
    "usage: pageflow-dump <text-file> [--width PX] [--height PX] [--json] [--snapshot OUT [--postcard]]"
}
