//! Boxlabel: the data core of a bounding-box/polygon image annotation
//! editor.
//!
//! Boxlabel keeps the annotation model for a loaded image folder (shape
//! records with categories, tags, and arbitrarily nested parts), mirrors
//! the displayed image as a hierarchical category/instance tree, and
//! reads/writes annotations in Pascal VOC XML, YOLO text, and a JSON
//! interchange schema.
//!
//! # Modules
//!
//! - [`model`]: the annotation store, categories, shapes, geometry
//! - [`tree`]: the per-image hierarchical view index
//! - [`session`]: editor state binding model and tree transactionally
//! - [`io`]: folder loading, format codecs, batch import/export
//! - [`error`]: error types for boxlabel operations

pub mod error;
pub mod io;
pub mod model;
pub mod session;
pub mod tree;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

pub use error::BoxlabelError;

use io::{BatchOptions, IoResult};
use model::AnnotationStore;

/// The boxlabel CLI application.
#[derive(Parser)]
#[command(name = "boxlabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert annotations for an image folder between formats.
    Convert(ConvertArgs),
    /// Import annotations and print per-category shape counts.
    Inspect(InspectArgs),
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Folder containing the annotated images.
    #[arg(long)]
    images: PathBuf,

    /// Input format ('pvoc', 'yolo', or 'json').
    #[arg(long)]
    from: String,

    /// Annotation source: a folder for pvoc/yolo, a file for json.
    input: PathBuf,

    /// Output format ('pvoc', 'yolo', or 'json').
    #[arg(long)]
    to: String,

    /// Destination: a folder for pvoc/yolo, a file for json.
    output: PathBuf,
}

/// Arguments for the inspect subcommand.
#[derive(clap::Args)]
struct InspectArgs {
    /// Folder containing the annotated images.
    #[arg(long)]
    images: PathBuf,

    /// Input format ('pvoc', 'yolo', or 'json').
    #[arg(long, default_value = "json")]
    format: String,

    /// Annotation source: a folder for pvoc/yolo, a file for json.
    input: PathBuf,
}

/// Run the boxlabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), BoxlabelError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        None => {
            println!("boxlabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Annotation model and format codecs for image labeling.");
            println!();
            println!("Run 'boxlabel --help' for usage information.");
            Ok(())
        }
    }
}

fn run_convert(args: ConvertArgs) -> Result<(), BoxlabelError> {
    let mut store = load_store(&args.images)?;

    let imported = import_annotations(&mut store, &args.from, &args.input)?;
    print!("{imported}");

    let exported = export_annotations(&store, &args.to, &args.output)?;
    print!("{exported}");
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<(), BoxlabelError> {
    let mut store = load_store(&args.images)?;

    let imported = import_annotations(&mut store, &args.format, &args.input)?;
    print!("{imported}");

    let mut counts: Vec<(&String, &usize)> = store.category_shape_counts().iter().collect();
    counts.sort();
    for (name, count) in counts {
        println!("{name}: {count}");
    }
    Ok(())
}

fn load_store(images: &Path) -> Result<AnnotationStore, BoxlabelError> {
    let mut store = AnnotationStore::new();
    store.set_image_folder(io::folder::load_image_folder(images)?);
    Ok(store)
}

fn import_annotations(
    store: &mut AnnotationStore,
    format: &str,
    input: &Path,
) -> Result<IoResult, BoxlabelError> {
    let options = BatchOptions::default();
    match format {
        "pvoc" | "voc" => io::pvoc::load_pvoc(store, input, &options),
        "yolo" => io::yolo::load_yolo(store, input, &options),
        "json" => io::json::load_json(store, input, &options),
        other => Err(BoxlabelError::UnsupportedFormat(format!(
            "'{}' (supported: pvoc, yolo, json)",
            other
        ))),
    }
}

fn export_annotations(
    store: &AnnotationStore,
    format: &str,
    output: &Path,
) -> Result<IoResult, BoxlabelError> {
    let options = BatchOptions::default();
    match format {
        "pvoc" | "voc" => io::pvoc::save_pvoc(store, output, &options),
        "yolo" => io::yolo::save_yolo(store, output, &options),
        "json" => io::json::save_json(store, output, &options),
        other => Err(BoxlabelError::UnsupportedFormat(format!(
            "'{}' (supported: pvoc, yolo, json)",
            other
        ))),
    }
}
