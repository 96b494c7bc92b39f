use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docoverlay_core::{
    DocumentEditor, EditorConfig, Element, ImageContent, ImageSource, Point, Rect, ShapeContent,
    ShapeKind, Word, WordId, WordPatch,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "docoverlay-cli")]
#[command(about = "Inspect and edit PDF text and overlays")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Editor configuration as JSON; missing fields take their defaults.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the editable words of one page, or of every page.
    Words {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Print the draw list for a page.
    Compose {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,
    },
    /// Run an edit script against a document and write the result.
    Apply {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: usize,
    word_count: usize,
    first_page_size_pt: Option<PageSizeOutput>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ApplyOutput {
    output: String,
    applied: usize,
    skipped: usize,
    edited_word_count: usize,
    added_element_count: usize,
}

/// One step of an `apply` script.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ScriptOp {
    EditText {
        word: String,
        text: String,
    },
    MoveWord {
        word: String,
        x: f32,
        y: f32,
    },
    DeleteWord {
        word: String,
    },
    AddText {
        page: u32,
        x: f32,
        y: f32,
        text: String,
        font_size: Option<f32>,
    },
    AddShape {
        page: u32,
        kind: ShapeKind,
        x: f32,
        y: f32,
        width: Option<f32>,
        height: Option<f32>,
    },
    AddImage {
        page: u32,
        path: PathBuf,
        x: f32,
        y: f32,
        width: Option<f32>,
        height: Option<f32>,
    },
    Undo,
    Redo,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Info { file } => run_info(&file, config),
        Commands::Words { file, page } => run_words(&file, page, config),
        Commands::Compose { file, page, zoom } => run_compose(&file, page, zoom, config),
        Commands::Apply { file, script, output } => {
            run_apply(&file, &script, output.as_deref(), config)
        }
        Commands::Version => Ok(()),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    EditorConfig::from_json_str(&json)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn open(file: &Path, config: EditorConfig) -> Result<DocumentEditor> {
    ensure_pdf_exists(file)?;
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let mut editor = DocumentEditor::with_placeholder(config)?;
    editor.load(bytes)?;
    let summary = editor.wait_for_load().context("failed to open PDF")?;
    log::debug!(
        "loaded {} ({} pages, {} words)",
        file.display(),
        summary.page_count,
        summary.word_count
    );
    Ok(editor)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn run_info(file: &Path, config: EditorConfig) -> Result<()> {
    let editor = open(file, config)?;
    let session = editor.session();

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: session.page_count(),
        word_count: session.original_word_count(),
        first_page_size_pt: session
            .pages()
            .first()
            .map(|page| PageSizeOutput { width: page.width, height: page.height }),
        warnings: editor
            .warnings()
            .iter()
            .map(|w| format!("page {}: {}", w.page_number, w.message))
            .collect(),
    };

    print_json(&payload)
}

fn run_words(file: &Path, page: Option<u32>, config: EditorConfig) -> Result<()> {
    let editor = open(file, config)?;
    let session = editor.session();

    let pages: Vec<u32> = match page {
        Some(page) => {
            ensure_page(page, session.page_count())?;
            vec![page]
        }
        None => session.pages().iter().map(|p| p.page_number).collect(),
    };
    let words: Vec<Word> =
        pages.into_iter().flat_map(|page| session.get_render_words(page)).collect();

    print_json(&words)
}

fn run_compose(file: &Path, page: u32, zoom: f32, config: EditorConfig) -> Result<()> {
    let mut editor = open(file, config)?;
    ensure_page(page, editor.session().page_count())?;

    let (controller, session) = editor.parts_mut();
    controller.viewport_mut().set_zoom(zoom);
    session.set_current_page(page);

    print_json(&editor.compose())
}

fn run_apply(
    file: &Path,
    script: &Path,
    output: Option<&Path>,
    config: EditorConfig,
) -> Result<()> {
    let text = fs::read_to_string(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;
    let ops: Vec<ScriptOp> = serde_json::from_str(&text)
        .with_context(|| format!("invalid script {}", script.display()))?;
    let base = script.parent().unwrap_or_else(|| Path::new("."));

    let mut editor = open(file, config)?;
    let mut applied = 0;
    for (index, op) in ops.iter().enumerate() {
        if apply_op(&mut editor, op, base)? {
            applied += 1;
        } else {
            log::warn!("script step {} had no effect: {op:?}", index + 1);
        }
    }

    editor.export()?;
    let exported = editor.wait_for_export().context("failed to export PDF")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_edited_output(file));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, &exported.bytes)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    print_json(&ApplyOutput {
        output: output.display().to_string(),
        applied,
        skipped: ops.len() - applied,
        edited_word_count: exported.manifest.edited_word_count,
        added_element_count: exported.manifest.added_element_count,
    })
}

/// Returns whether the step changed the session.
fn apply_op(editor: &mut DocumentEditor, op: &ScriptOp, base: &Path) -> Result<bool> {
    let defaults = editor.config().element_defaults.clone();
    let session = editor.session_mut();

    let changed = match op {
        ScriptOp::EditText { word, text } => {
            session.update_word(&WordId::from(word.as_str()), WordPatch::text(text.clone()))
        }
        ScriptOp::MoveWord { word, x, y } => session
            .update_word(&WordId::from(word.as_str()), WordPatch::position(Point::new(*x, *y))),
        ScriptOp::DeleteWord { word } => session.delete_word(&WordId::from(word.as_str())),
        ScriptOp::AddText { page, x, y, text, font_size } => session
            .add_word(
                *page,
                text,
                Point::new(*x, *y),
                font_size.unwrap_or(defaults.text_font_size),
                defaults.text_color,
            )
            .is_some(),
        ScriptOp::AddShape { page, kind, x, y, width, height } => {
            let (content, size) = if *kind == ShapeKind::Highlight {
                let content = ShapeContent {
                    kind: *kind,
                    fill: Some(defaults.highlight_color),
                    stroke: None,
                    stroke_width: 0.0,
                };
                (content, (defaults.highlight_width, defaults.highlight_height))
            } else {
                let content = ShapeContent {
                    kind: *kind,
                    fill: Some(defaults.shape_fill),
                    stroke: Some(defaults.shape_stroke),
                    stroke_width: defaults.shape_stroke_width,
                };
                (content, (defaults.shape_width, defaults.shape_height))
            };
            let bounds =
                Rect::new(*x, *y, width.unwrap_or(size.0), height.unwrap_or(size.1));
            session.add_element(Element::shape(*page, bounds, content)).is_some()
        }
        ScriptOp::AddImage { page, path, x, y, width, height } => {
            let path = if path.is_absolute() { path.clone() } else { base.join(path) };
            let data = fs::read(&path)
                .with_context(|| format!("failed to read image {}", path.display()))?;
            let bounds = Rect::new(
                *x,
                *y,
                width.unwrap_or(defaults.image_width),
                height.unwrap_or(defaults.image_height),
            );
            let content =
                ImageContent { source: ImageSource::bytes(data), opacity: 1.0, code_payload: None };
            session.add_element(Element::image(*page, bounds, content)).is_some()
        }
        ScriptOp::Undo => session.undo(),
        ScriptOp::Redo => session.redo(),
    };
    Ok(changed)
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn ensure_page(page: u32, page_count: usize) -> Result<()> {
    if page == 0 || page as usize > page_count {
        anyhow::bail!("--page must be between 1 and {page_count}");
    }
    Ok(())
}

fn default_edited_output(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");

    file.with_file_name(format!("{stem}-edited.pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_ops_parse_from_tagged_json() {
        let ops: Vec<ScriptOp> = serde_json::from_str(
            r#"[
                {"op": "edit_text", "word": "p1-w0", "text": "Howdy"},
                {"op": "add_shape", "page": 1, "kind": "star", "x": 10, "y": 20},
                {"op": "undo"}
            ]"#,
        )
        .unwrap();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[1], ScriptOp::AddShape { kind: ShapeKind::Star, width: None, .. }));
        assert!(matches!(ops[2], ScriptOp::Undo));
    }

    #[test]
    fn default_output_sits_next_to_input() {
        let out = default_edited_output(Path::new("/tmp/in/report.pdf"));
        assert_eq!(out, PathBuf::from("/tmp/in/report-edited.pdf"));
    }

    #[test]
    fn page_bounds_are_one_based() {
        assert!(ensure_page(0, 2).is_err());
        assert!(ensure_page(1, 2).is_ok());
        assert!(ensure_page(3, 2).is_err());
    }
}
