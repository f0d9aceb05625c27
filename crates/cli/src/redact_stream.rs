//! redact-stream - apply rectangle redactions to a standalone content-stream
//! file.
//!
//! Takes one or more raw (already decompressed) PDF content-stream files and
//! a JSON rectangle list, and writes back the redacted bytes. Font metrics
//! and cross-references to other PDF objects are out of scope for a
//! standalone file, so this binary supplies minimal stand-in `ObjectStore`
//! and `FontResolver` implementations; a real embedding application (a PDF
//! editor, a document pipeline) would back these with its own object model.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use memmap2::Mmap;
use rayon::prelude::*;
use redact_core::{
    FontId, FontResolver, GlyphPosition, ObjectStore, PageContent, RedactionOptions,
    RedactionPolicy, RedactionReport, RedactionRectangle, XObjectData, redact_page,
};
use serde::Deserialize;

/// Redact rectangular regions out of a PDF content stream.
#[derive(Parser, Debug)]
#[command(name = "redact-stream")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// One or more content-stream files to redact
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON file holding the list of redaction rectangles to apply
    #[arg(short = 'r', long = "rectangles")]
    rectangles: PathBuf,

    /// JSON file holding a `RedactionOptions` override (policy, fallback
    /// font, recursion limit); defaults are used for anything absent
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Redact glyph by glyph instead of dropping whole text operations
    #[arg(long = "glyph-level", action = clap::ArgAction::SetTrue)]
    glyph_level: bool,

    /// Directory to write redacted output into; defaults to alongside the
    /// input with a `.redacted` suffix inserted before the extension
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Assumed glyph advance width (1/1000 em) for the stand-in font
    /// resolver, since this binary has no font program to measure against
    #[arg(long = "assumed-advance", default_value = "500.0")]
    assumed_advance: f64,

    /// Use debug logging level
    #[arg(short = 'd', long, action = clap::ArgAction::SetTrue)]
    debug: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RectangleFile {
    rectangles: Vec<RedactionRectangle>,
}

/// A `FontResolver` that knows nothing about the page's actual fonts. Good
/// enough to exercise the pipeline end to end; a real caller backs this with
/// whatever font stack already resolved the page's text for display.
struct StandaloneFontResolver {
    assumed_advance: f64,
}

impl FontResolver for StandaloneFontResolver {
    fn extract_letters(&self, _page_number: u32) -> Vec<GlyphPosition> {
        Vec::new()
    }

    fn unicode_for(&self, _font_id: &FontId, codepoint: u32) -> Option<String> {
        char::from_u32(codepoint).map(String::from)
    }

    fn is_cid_font(&self, _font_id: &FontId) -> bool {
        false
    }

    fn advance_width(&self, _font_id: &FontId, _font_size: f64, _codepoint: u32) -> f64 {
        self.assumed_advance
    }
}

/// An `ObjectStore` over a single standalone content-stream file, with no
/// Form/Image XObject resolution: a bare file has no `/Resources` dictionary
/// to resolve names against. `resolve_xobject` always answers `None`, which
/// the orchestrator treats as "leave the `Do` untouched".
struct FileObjectStore {
    bytes: Vec<u8>,
    committed_main: Option<Vec<u8>>,
    committed_forms: HashMap<String, Vec<u8>>,
}

impl FileObjectStore {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            committed_main: None,
            committed_forms: HashMap::new(),
        }
    }
}

impl ObjectStore for FileObjectStore {
    fn get_page_content(&self, _page_number: u32) -> redact_core::Result<PageContent> {
        Ok(PageContent {
            bytes: self.bytes.clone(),
            resources: Vec::new(),
            page_rotation: 0,
            media_box: (0.0, 0.0, 612.0, 792.0),
        })
    }

    fn resolve_xobject(
        &self,
        _resources: &[u8],
        _name: &str,
    ) -> redact_core::Result<Option<XObjectData>> {
        Ok(None)
    }

    fn commit_page(
        &mut self,
        _page_number: u32,
        new_main_bytes: Vec<u8>,
        new_form_bytes: HashMap<String, Vec<u8>>,
    ) -> redact_core::Result<()> {
        self.committed_main = Some(new_main_bytes);
        self.committed_forms = new_form_bytes;
        Ok(())
    }
}

fn load_rectangles(path: &Path) -> Result<Vec<RedactionRectangle>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading rectangle file {}", path.display()))?;
    let parsed: RectangleFile = serde_json::from_str(&content)
        .with_context(|| format!("parsing rectangle file {}", path.display()))?;
    Ok(parsed.rectangles)
}

fn load_options(args: &Args) -> Result<RedactionOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => RedactionOptions::default(),
    };
    if args.glyph_level {
        options.policy = RedactionPolicy::GlyphLevel;
    }
    Ok(options)
}

fn output_path_for(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = output_dir {
        return dir.join(input.file_name().unwrap_or_default());
    }
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let suffixed = match input.extension() {
        Some(ext) => format!("{stem}.redacted.{}", ext.to_string_lossy()),
        None => format!("{stem}.redacted"),
    };
    input.with_file_name(suffixed)
}

fn process_file(
    path: &Path,
    rectangles: &[RedactionRectangle],
    options: &RedactionOptions,
    resolver: &StandaloneFontResolver,
    output_dir: Option<&Path>,
) -> Result<RedactionReport> {
    let span = tracing::info_span!("redact_file", path = %path.display());
    let _enter = span.enter();

    // Content-stream files can run large for scanned-page-heavy PDFs; mmap
    // avoids copying the whole buffer before the tokenizer ever touches it,
    // matching how the wider PDF toolchain this binary's conventions come
    // from reads input files.
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("mmapping {}", path.display()))?;
    let mut store = FileObjectStore::new(mmap.to_vec());

    let report = redact_page(&mut store, resolver, 1, rectangles, options, &|| false)
        .with_context(|| format!("redacting {}", path.display()))?;

    let out_path = output_path_for(path, output_dir);
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }
    let main_bytes = store.committed_main.unwrap_or_default();
    fs::write(&out_path, &main_bytes)
        .with_context(|| format!("writing {}", out_path.display()))?;

    for (name, bytes) in &store.committed_forms {
        let form_path = out_path.with_file_name(format!(
            "{}.{name}.form",
            out_path.file_stem().unwrap_or_default().to_string_lossy()
        ));
        fs::write(&form_path, bytes)
            .with_context(|| format!("writing {}", form_path.display()))?;
    }

    tracing::info!(
        redacted = report.redacted_items.len(),
        forms_modified = report.forms_modified,
        "wrote {}",
        out_path.display()
    );

    Ok(report)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_target(false)
        .init();

    let rectangles = load_rectangles(&args.rectangles)?;
    let options = load_options(&args)?;
    let resolver = StandaloneFontResolver {
        assumed_advance: args.assumed_advance,
    };
    let output_dir = args.output_dir.as_deref();

    let reports: Vec<Result<RedactionReport>> = args
        .files
        .par_iter()
        .map(|path| process_file(path, &rectangles, &options, &resolver, output_dir))
        .collect();

    let mut failed = false;
    for (path, result) in args.files.iter().zip(reports) {
        match result {
            Ok(report) => {
                println!(
                    "{}: {} item(s) redacted, {} form(s) rewritten",
                    path.display(),
                    report.redacted_items.len(),
                    report.forms_modified
                );
            }
            Err(err) => {
                eprintln!("{}: {err:#}", path.display());
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}
