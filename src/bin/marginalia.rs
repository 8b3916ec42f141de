//! Marginalia CLI: annotate chapters kept as markdown files.
//!
//! Usage:
//!   marginalia [--db path] [--config path] [-v] <command>
//!   marginalia render --work 123 --chapter 456 chapter.md
//!   marginalia annotate --work 123 --chapter 456 chapter.md --start 2 --end 3 --marker ❤

use clap::{Parser, Subcommand};
use marginalia::annotation::{Annotation, MarkerPalette};
use marginalia::render::OverlayKind;
use marginalia::{
    legacy, AnnotationStore, ChapterInfo, ChapterPage, Config, Controller, HostPage, NoteId,
    NotesSummary, OpenStore, PaletteStore, SelectionRange, SqliteStore, WorkInfo,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "marginalia", version, about = "Paragraph-anchored notes on chaptered fiction")]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored annotations
    List {
        /// Only annotations of this work
        #[arg(long)]
        work: Option<String>,
        /// Only annotations of this chapter (requires --work)
        #[arg(long, requires = "work")]
        chapter: Option<String>,
    },
    /// Show every note grouped by work and chapter
    Summary,
    /// Draw a chapter with its annotations
    Render {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Annotate a span of paragraphs
    Annotate {
        #[command(flatten)]
        page: PageArgs,
        /// First paragraph index
        #[arg(long)]
        start: usize,
        /// Last paragraph index
        #[arg(long)]
        end: usize,
        /// Marker glyph
        #[arg(long)]
        marker: String,
        /// Note text
        #[arg(long)]
        note: Option<String>,
    },
    /// Change the note text or marker of an annotation
    Edit {
        note_id: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        marker: Option<String>,
    },
    /// Delete an annotation
    Delete { note_id: String },
    /// Manage the marker palette
    Palette {
        #[command(subcommand)]
        action: PaletteAction,
    },
    /// Import an annotation file (old work-keyed blob or an export)
    Import {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Print every annotation as JSON
    Export,
}

#[derive(clap::Args)]
struct PageArgs {
    /// Work id
    #[arg(long)]
    work: String,
    /// Chapter id
    #[arg(long)]
    chapter: String,
    /// Chapter display name
    #[arg(long)]
    chapter_name: Option<String>,
    /// Markdown file holding the chapter text
    #[arg(required = true)]
    file: PathBuf,
}

#[derive(Subcommand)]
enum PaletteAction {
    /// Show the palette
    List,
    /// Append a marker
    Add { marker: String },
    /// Remove a marker
    Remove { marker: String },
}

fn open_store(config: &Config, db: Option<PathBuf>) -> Result<SqliteStore, String> {
    let db_path = db.unwrap_or_else(|| config.database_path());
    let store = SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(store.with_legacy_marker(config.legacy_marker.clone()))
}

fn load_page(args: &PageArgs) -> Result<ChapterPage, String> {
    let markdown = read_file(&args.file)?;
    let name = args
        .chapter_name
        .clone()
        .unwrap_or_else(|| format!("Chapter {}", args.chapter));
    Ok(ChapterPage::from_markdown(
        WorkInfo::new(args.work.clone()),
        ChapterInfo::new(args.chapter.clone(), name),
        &markdown,
    ))
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {}", path.display(), e))
}

fn print_records(records: &[Annotation]) {
    println!("{:<36}  {:<10}  {:<10}  {:<9}  {:<4}  TEXT", "ID", "WORK", "CHAPTER", "PARAS", "MARK");
    println!("{}", "-".repeat(96));
    for r in records {
        let paras = match r.anchor {
            Some(a) => format!("{}-{}", a.start(), a.end()),
            None => "-".to_string(),
        };
        println!(
            "{:<36}  {:<10}  {:<10}  {:<9}  {:<4}  {}",
            r.note_id,
            r.work_id,
            r.chapter_id,
            paras,
            r.marker,
            r.text.chars().take(40).collect::<String>()
        );
    }
}

async fn cmd_list(store: &SqliteStore, work: Option<&str>, chapter: Option<&str>) -> i32 {
    let result = match (work, chapter) {
        (Some(w), Some(c)) => store.query_by_chapter(w, c).await,
        (Some(w), None) => store.query_by_work(w).await,
        _ => store.query_all().await,
    };
    match result {
        Ok(records) if records.is_empty() => {
            println!("No annotations.");
            0
        }
        Ok(mut records) => {
            records.sort_by(|a, b| a.time.cmp(&b.time));
            print_records(&records);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_summary(store: &SqliteStore) -> i32 {
    match store.query_all().await {
        Ok(records) => {
            print!("{}", NotesSummary::build(records));
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn print_page(controller: &Controller<ChapterPage, SqliteStore>) {
    let tree = controller.host().tree();
    let surface = controller.surface();
    for (index, key) in controller.paragraphs().iter() {
        let bar = if surface.is_highlighted(index) { "▌" } else { " " };
        println!("{} [{:>3}] {}", bar, index, tree.text_content(key));
        for marker in surface.markers_at(index) {
            if let OverlayKind::MarkerGlyph { glyph, .. } = &marker.kind {
                match surface.visible_note_text(&marker.note_id) {
                    Some(note) => println!("        {} {}", glyph, note),
                    None => println!("        {}", glyph),
                }
            }
        }
    }
    let skipped = &controller.last_report().skipped;
    if !skipped.is_empty() {
        eprintln!("{} annotation(s) do not fit this chapter and were not drawn", skipped.len());
    }
}

async fn cmd_render(store: Arc<SqliteStore>, config: &Config, page: &PageArgs) -> i32 {
    let host = match load_page(page) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let controller = Controller::load(host, store, config.controller_settings()).await;
    print_page(&controller);
    0
}

async fn cmd_annotate(
    store: Arc<SqliteStore>,
    config: &Config,
    page: &PageArgs,
    (start, end): (usize, usize),
    marker: &str,
    note: Option<&str>,
) -> i32 {
    let host = match load_page(page) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let mut controller = Controller::load(host, store, config.controller_settings()).await;
    let range = SelectionRange::over_paragraphs(controller.host().tree(), controller.paragraphs(), start, end);
    if range.is_none() {
        eprintln!(
            "Error: paragraphs {}..={} are not in this chapter ({} paragraphs)",
            start,
            end,
            controller.paragraphs().len()
        );
        return 1;
    }
    if let Err(e) = controller.on_selection_change(range.as_ref()) {
        eprintln!("Error: {}", e);
        return 1;
    }
    let note_id = match controller.choose_marker(marker).await {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Some(text) = note {
        controller.begin_edit(&note_id);
        controller.set_draft(&note_id, text);
        if let Err(e) = controller.commit_edit(&note_id).await {
            eprintln!("Error: annotation {} created but its note was not saved: {}", note_id, e);
            return 1;
        }
    }
    println!("Created annotation {}", note_id);
    0
}

async fn cmd_edit(store: &SqliteStore, note_id: &str, note: Option<&str>, marker: Option<&str>) -> i32 {
    let id = NoteId::from(note_id);
    let mut record = match store.get(&id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            eprintln!("Error: annotation '{}' not found", note_id);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Some(note) = note {
        record.note = note.trim().to_string();
    }
    if let Some(marker) = marker.map(str::trim).filter(|m| !m.is_empty()) {
        record.marker = marker.to_string();
    }
    match store.update(&record).await {
        Ok(()) => {
            println!("Updated annotation {}", note_id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_delete(store: &SqliteStore, note_id: &str) -> i32 {
    let id = NoteId::from(note_id);
    match store.get(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            eprintln!("Error: annotation '{}' not found", note_id);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    }
    match store.delete(&id).await {
        Ok(()) => {
            println!("Deleted annotation {}", note_id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn print_palette(palette: &MarkerPalette) {
    println!("{}", palette.markers().join(" "));
}

async fn cmd_palette(store: &SqliteStore, config: &Config, action: &PaletteAction) -> i32 {
    let seed = config.seed_palette();
    let result = match action {
        PaletteAction::List => store.load_palette().await.map(|p| p.unwrap_or(seed)),
        PaletteAction::Add { marker } => store.add_marker(marker, &seed).await,
        PaletteAction::Remove { marker } => store.remove_marker(marker, &seed).await,
    };
    match result {
        Ok(palette) => {
            print_palette(&palette);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_import(store: &SqliteStore, config: &Config, file: &Path) -> i32 {
    let json = match read_file(file) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match legacy::import(store, &json, &config.legacy_marker).await {
        Ok(report) => {
            println!("Imported {} annotation(s), skipped {}", report.imported, report.skipped);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_export(store: &SqliteStore) -> i32 {
    let records = match store.query_all().await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match legacy::export_json(&records) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn run(cli: Cli, config: Config) -> i32 {
    let store = match open_store(&config, cli.db) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match &cli.command {
        Commands::List { work, chapter } => cmd_list(&store, work.as_deref(), chapter.as_deref()).await,
        Commands::Summary => cmd_summary(&store).await,
        Commands::Render { page } => cmd_render(store, &config, page).await,
        Commands::Annotate {
            page,
            start,
            end,
            marker,
            note,
        } => cmd_annotate(store, &config, page, (*start, *end), marker, note.as_deref()).await,
        Commands::Edit { note_id, note, marker } => {
            cmd_edit(&store, note_id, note.as_deref(), marker.as_deref()).await
        }
        Commands::Delete { note_id } => cmd_delete(&store, note_id).await,
        Commands::Palette { action } => cmd_palette(&store, &config, action).await,
        Commands::Import { file } => cmd_import(&store, &config, file).await,
        Commands::Export => cmd_export(&store).await,
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    let code = rt.block_on(run(cli, config));
    std::process::exit(code);
}
