//! YOLO plain-text codec.
//!
//! A save produces one `object.data` side-car listing category names
//! (sorted, only categories with assigned shapes) and one
//! `<imageBaseName>.txt` per annotated image. Label lines are
//! `<categoryIndex> <cx> <cy> <w> <h>` in 6-decimal relative
//! center-format coordinates. The format only expresses top-level boxes:
//! polygons, tags, and nested parts are dropped by design.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use rayon::prelude::*;

use crate::error::BoxlabelError;
use crate::model::{
    AnnotationStore, ImageRecord, ImportedAnnotations, ImportedImage, Normalized, RectXYXY,
    ShapeData, ShapeGeometry,
};

use super::{
    fmt_fixed, BatchOptions, CategoryPool, ErrorInfoEntry, IoResult, OperationType,
    ProgressCounter,
};

const OBJECT_DATA_FILE_NAME: &str = "object.data";
const LABEL_EXTENSION: &str = "txt";
const COORDINATE_PRECISION: usize = 6;

/// Saves annotations in YOLO layout into `folder`.
pub fn save_yolo(
    store: &AnnotationStore,
    folder: &Path,
    options: &BatchOptions<'_>,
) -> Result<IoResult, BoxlabelError> {
    let started = Instant::now();
    fs::create_dir_all(folder).map_err(BoxlabelError::Io)?;

    // Only categories with at least one assigned shape are listed; the
    // line index into this sorted list is the wire category id.
    let mut categories: Vec<String> = store
        .category_shape_counts()
        .iter()
        .filter(|(_, &count)| count > 0)
        .map(|(name, _)| name.clone())
        .collect();
    categories.sort();

    let mut errors = Vec::new();
    if let Err(error) = fs::write(folder.join(OBJECT_DATA_FILE_NAME), categories.join("\n")) {
        errors.push(ErrorInfoEntry::new(OBJECT_DATA_FILE_NAME, error.to_string()));
    }

    let annotated: Vec<&ImageRecord> = store
        .images()
        .iter()
        .filter(|record| record.has_annotations())
        .collect();
    let shared_errors = Mutex::new(errors);
    let progress = ProgressCounter::new(annotated.len(), options);

    let written: usize = annotated
        .par_iter()
        .map(|record| {
            if options.aborted() {
                return 0;
            }
            let outcome = fs::write(
                folder.join(label_file_name(&record.meta.file_name)),
                render_label_file(record, &categories),
            );
            progress.tick();
            match outcome {
                Ok(()) => 1,
                Err(error) => {
                    shared_errors
                        .lock()
                        .expect("error list lock")
                        .push(ErrorInfoEntry::new(
                            record.meta.file_name.clone(),
                            error.to_string(),
                        ));
                    0
                }
            }
        })
        .sum();

    let errors = shared_errors.into_inner().expect("error list lock");
    tracing::info!(written, failed = errors.len(), "YOLO save finished");
    Ok(IoResult::new(
        OperationType::AnnotationSaving,
        written,
        started.elapsed(),
        errors,
    ))
}

/// Imports YOLO label files from `folder`.
///
/// Requires an `object.data` class map (hard precondition). Label files
/// are matched to loaded images by base name; each line parses
/// independently and failures are collected per line.
pub fn load_yolo(
    store: &mut AnnotationStore,
    folder: &Path,
    options: &BatchOptions<'_>,
) -> Result<IoResult, BoxlabelError> {
    let started = Instant::now();

    let class_map_path = folder.join(OBJECT_DATA_FILE_NAME);
    if !class_map_path.is_file() {
        return Err(BoxlabelError::MissingClassMap {
            path: class_map_path,
        });
    }
    let categories: Vec<String> = fs::read_to_string(&class_map_path)
        .map_err(BoxlabelError::Io)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    let label_files = collect_label_files(folder)?;
    let image_by_stem: HashMap<String, String> = store
        .images()
        .iter()
        .map(|record| {
            (
                base_name(&record.meta.file_name).to_string(),
                record.meta.file_name.clone(),
            )
        })
        .collect();

    let pool = CategoryPool::seeded(store.categories());
    let errors = Mutex::new(Vec::new());
    let progress = ProgressCounter::new(label_files.len(), options);

    let imported: Vec<ImportedImage> = label_files
        .par_iter()
        .filter_map(|file| {
            if options.aborted() {
                return None;
            }
            let outcome = parse_label_file(file, &categories, &image_by_stem, &pool, &errors);
            progress.tick();
            outcome
        })
        .collect();

    let parsed_count = imported.len();
    let (merged_categories, tallies) = pool.into_parts();
    tracing::debug!(?tallies, "per-category shape tallies after parse");

    let mut errors = errors.into_inner().expect("error list lock");
    let merge_errors = store.merge_import(ImportedAnnotations {
        categories: merged_categories,
        images: imported,
    });
    let success_count = parsed_count - merge_errors.len();
    errors.extend(merge_errors);

    tracing::info!(
        files = label_files.len(),
        imported = success_count,
        failed = errors.len(),
        "YOLO import finished"
    );
    Ok(IoResult::new(
        OperationType::AnnotationImport,
        success_count,
        started.elapsed(),
        errors,
    ))
}

fn label_file_name(image_file_name: &str) -> String {
    format!("{}.{}", base_name(image_file_name), LABEL_EXTENSION)
}

/// Everything before the last '.', or the whole name when there is none.
fn base_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(position) => &file_name[..position],
        None => file_name,
    }
}

fn render_label_file(record: &ImageRecord, categories: &[String]) -> String {
    let mut lines = Vec::new();
    for shape in &record.shapes {
        // Only top-level boxes are representable; polygons are silently
        // skipped.
        if let ShapeGeometry::Box(rect) = &shape.geometry {
            let Some(index) = categories.iter().position(|name| name == &shape.category) else {
                continue;
            };
            lines.push(format_label_line(index, rect));
        }
    }
    lines.join("\n")
}

fn format_label_line(category_index: usize, rect: &RectXYXY<Normalized>) -> String {
    let (cx, cy, w, h) = rect.to_cxcywh();
    format!(
        "{} {} {} {} {}",
        category_index,
        fmt_fixed(cx, COORDINATE_PRECISION),
        fmt_fixed(cy, COORDINATE_PRECISION),
        fmt_fixed(w, COORDINATE_PRECISION),
        fmt_fixed(h, COORDINATE_PRECISION)
    )
}

fn collect_label_files(dir: &Path) -> Result<Vec<PathBuf>, BoxlabelError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(BoxlabelError::Io)? {
        let entry = entry.map_err(BoxlabelError::Io)?;
        let path = entry.path();
        let is_label = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(LABEL_EXTENSION))
            .unwrap_or(false);
        if path.is_file() && is_label {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|path| file_label(path));
    Ok(files)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn parse_label_file(
    path: &Path,
    categories: &[String],
    image_by_stem: &HashMap<String, String>,
    pool: &CategoryPool,
    errors: &Mutex<Vec<ErrorInfoEntry>>,
) -> Option<ImportedImage> {
    let label = file_label(path);
    let stem = base_name(&label);

    let Some(image_file_name) = image_by_stem.get(stem) else {
        errors.lock().expect("error list lock").push(ErrorInfoEntry::new(
            label.clone(),
            "The label file does not match any of the currently loaded images.",
        ));
        return None;
    };

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            errors
                .lock()
                .expect("error list lock")
                .push(ErrorInfoEntry::new(label.clone(), error.to_string()));
            return None;
        }
    };

    let mut shapes = Vec::new();
    for (line_index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_label_line(line, categories) {
            Ok(shape) => {
                pool.intern(&shape.category, None);
                pool.record_shape(&shape.category);
                shapes.push(shape);
            }
            Err(message) => errors.lock().expect("error list lock").push(ErrorInfoEntry::new(
                label.clone(),
                format!("line {}: {}", line_index + 1, message),
            )),
        }
    }

    if shapes.is_empty() {
        return None;
    }
    Some(ImportedImage {
        file_name: image_file_name.clone(),
        shapes,
    })
}

fn parse_label_line(line: &str, categories: &[String]) -> Result<ShapeData, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    }

    let class_index: usize = fields[0]
        .parse()
        .map_err(|_| format!("invalid category index '{}'", fields[0]))?;
    let category = categories.get(class_index).ok_or_else(|| {
        format!(
            "category index {} is out of range for a class map with {} entries",
            class_index,
            categories.len()
        )
    })?;

    let mut values = [0.0f64; 4];
    for (slot, raw) in values.iter_mut().zip(&fields[1..]) {
        *slot = raw
            .parse()
            .map_err(|_| format!("invalid coordinate value '{raw}'"))?;
    }

    let rect: RectXYXY<Normalized> = RectXYXY::from_cxcywh(values[0], values[1], values[2], values[3]);
    // Reconstructing corners from center format accumulates float error;
    // values a few ulps past the border are slop, not bad data.
    const BOUNDS_SLACK: f64 = 1e-9;
    let within = |value: f64| (-BOUNDS_SLACK..=1.0 + BOUNDS_SLACK).contains(&value);
    if !(within(rect.min_x()) && within(rect.min_y()) && within(rect.max_x()) && within(rect.max_y()))
    {
        return Err("coordinate value(s) outside the [0, 1] range".to_string());
    }
    let rect = RectXYXY::from_xyxy(
        rect.min_x().clamp(0.0, 1.0),
        rect.min_y().clamp(0.0, 1.0),
        rect.max_x().clamp(0.0, 1.0),
        rect.max_y().clamp(0.0, 1.0),
    );
    Ok(ShapeData::new_box(category.clone(), rect))
}
