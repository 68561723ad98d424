//! Pascal VOC XML codec.
//!
//! One XML file per annotated image. Coordinates on the wire are absolute
//! pixels (2-decimal fixed point); the model's relative coordinates are
//! converted through the image's metadata. The PVOC fixed fields
//! (`pose`, `truncated`, `occluded`, `difficult`, `actions`) map to and
//! from generic string tags, so the rest of the system never needs to
//! know about them.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use rayon::prelude::*;
use roxmltree::Node;

use crate::error::BoxlabelError;
use crate::model::{
    AnnotationStore, Coord, ImageMetaData, ImageRecord, ImportedAnnotations, ImportedImage,
    Normalized, RectXYXY, ShapeData, ShapeGeometry,
};

use super::{
    fmt_fixed, BatchOptions, CategoryPool, ErrorInfoEntry, IoResult, OperationType,
    ProgressCounter,
};

const XML_EXTENSION: &str = "xml";
const ANNOTATION_FILE_SUFFIX: &str = "_A";
const MISSING_ELEMENT_PREFIX: &str = "Missing element: ";
const COORDINATE_PRECISION: usize = 2;

/// Imports every `.xml` annotation file found directly under `path`.
///
/// Files are parsed in parallel and merged into the store as one
/// sequential commit. Per-file and per-object problems are collected,
/// never fatal; the result reports how many image annotations were
/// applied.
pub fn load_pvoc(
    store: &mut AnnotationStore,
    path: &Path,
    options: &BatchOptions<'_>,
) -> Result<IoResult, BoxlabelError> {
    let started = Instant::now();
    let files = collect_annotation_files(path)?;

    let known_images: HashSet<String> = store
        .images()
        .iter()
        .map(|record| record.meta.file_name.clone())
        .collect();
    let pool = CategoryPool::seeded(store.categories());
    let errors = Mutex::new(Vec::new());
    let progress = ProgressCounter::new(files.len(), options);

    let imported: Vec<ImportedImage> = files
        .par_iter()
        .filter_map(|file| {
            if options.aborted() {
                return None;
            }
            let outcome = parse_annotation_file(file, &known_images, &pool, &errors);
            progress.tick();
            match outcome {
                Ok(imported) => imported,
                Err(message) => {
                    errors
                        .lock()
                        .expect("error list lock")
                        .push(ErrorInfoEntry::new(file_label(file), message));
                    None
                }
            }
        })
        .collect();

    let parsed_count = imported.len();
    let (categories, tallies) = pool.into_parts();
    tracing::debug!(?tallies, "per-category shape tallies after parse");

    let mut errors = errors.into_inner().expect("error list lock");
    let merge_errors = store.merge_import(ImportedAnnotations {
        categories,
        images: imported,
    });
    let success_count = parsed_count - merge_errors.len();
    errors.extend(merge_errors);

    tracing::info!(
        files = files.len(),
        imported = success_count,
        failed = errors.len(),
        "Pascal VOC import finished"
    );
    Ok(IoResult::new(
        OperationType::AnnotationImport,
        success_count,
        started.elapsed(),
        errors,
    ))
}

/// Saves one `<name>_A.xml` file per annotated image into `folder`.
pub fn save_pvoc(
    store: &AnnotationStore,
    folder: &Path,
    options: &BatchOptions<'_>,
) -> Result<IoResult, BoxlabelError> {
    let started = Instant::now();
    fs::create_dir_all(folder).map_err(BoxlabelError::Io)?;

    let annotated: Vec<&ImageRecord> = store
        .images()
        .iter()
        .filter(|record| record.has_annotations())
        .collect();
    let errors = Mutex::new(Vec::new());
    let progress = ProgressCounter::new(annotated.len(), options);

    let written: usize = annotated
        .par_iter()
        .map(|record| {
            if options.aborted() {
                return 0;
            }
            let outcome = fs::write(
                folder.join(annotation_file_name(&record.meta.file_name)),
                render_annotation_xml(record),
            );
            progress.tick();
            match outcome {
                Ok(()) => 1,
                Err(error) => {
                    errors
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

    let errors = errors.into_inner().expect("error list lock");
    tracing::info!(written, failed = errors.len(), "Pascal VOC save finished");
    Ok(IoResult::new(
        OperationType::AnnotationSaving,
        written,
        started.elapsed(),
        errors,
    ))
}

/// `image.name.jpg` saves as `image_name_jpg_A.xml`.
fn annotation_file_name(image_file_name: &str) -> String {
    format!(
        "{}{}.{}",
        image_file_name.replace('.', "_"),
        ANNOTATION_FILE_SUFFIX,
        XML_EXTENSION
    )
}

fn collect_annotation_files(dir: &Path) -> Result<Vec<PathBuf>, BoxlabelError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(BoxlabelError::Io)? {
        let entry = entry.map_err(BoxlabelError::Io)?;
        let path = entry.path();
        let is_xml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(XML_EXTENSION))
            .unwrap_or(false);
        if path.is_file() && is_xml {
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

// ---- reading ----

fn parse_annotation_file(
    path: &Path,
    known_images: &HashSet<String>,
    pool: &CategoryPool,
    errors: &Mutex<Vec<ErrorInfoEntry>>,
) -> Result<Option<ImportedImage>, String> {
    let xml = fs::read_to_string(path).map_err(|error| error.to_string())?;
    let document = roxmltree::Document::parse(&xml).map_err(|error| error.to_string())?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(format!("{MISSING_ELEMENT_PREFIX}annotation"));
    }

    // Top-level fields are required; their absence rejects the whole file.
    required_child_text(annotation, "folder")?;
    let file_name = required_child_text(annotation, "filename")?;
    let size = child_element(annotation, "size")
        .ok_or_else(|| format!("{MISSING_ELEMENT_PREFIX}size"))?;
    let width = parse_required_f64(size, "width")?;
    let height = parse_required_f64(size, "height")?;
    parse_required_u32(size, "depth")?;

    if !known_images.contains(&file_name) {
        return Err("The image file does not belong to the currently loaded images.".to_string());
    }

    let mut shapes = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        match parse_object(object, width, height, &file_label(path), pool, errors) {
            Ok(shape) => shapes.push(shape),
            Err(message) => errors
                .lock()
                .expect("error list lock")
                .push(ErrorInfoEntry::new(file_label(path), message)),
        }
    }

    // A file with zero valid objects yields no annotation; not an error.
    if shapes.is_empty() {
        return Ok(None);
    }
    Ok(Some(ImportedImage { file_name, shapes }))
}

fn parse_object(
    element: Node<'_, '_>,
    image_width: f64,
    image_height: f64,
    file_name: &str,
    pool: &CategoryPool,
    errors: &Mutex<Vec<ErrorInfoEntry>>,
) -> Result<ShapeData, String> {
    // Everything except parts parses first; a failed object never parses
    // its parts.
    let category = required_child_text(element, "name")?;
    if category.trim().is_empty() {
        return Err("Blank object name".to_string());
    }

    let geometry = parse_geometry(element, image_width, image_height)?;
    let mut shape = ShapeData {
        category: category.clone(),
        geometry,
        tags: parse_tags(element)?,
        parts: Vec::new(),
    };

    pool.intern(&category, None);
    pool.record_shape(&category);

    for part in element
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "part")
    {
        match parse_object(part, image_width, image_height, file_name, pool, errors) {
            Ok(parsed) => shape.parts.push(parsed),
            Err(message) => errors
                .lock()
                .expect("error list lock")
                .push(ErrorInfoEntry::new(file_name.to_string(), message)),
        }
    }
    Ok(shape)
}

fn parse_geometry(
    element: Node<'_, '_>,
    image_width: f64,
    image_height: f64,
) -> Result<ShapeGeometry, String> {
    if let Some(bndbox) = child_element(element, "bndbox") {
        let min_x = parse_required_f64(bndbox, "xmin")?;
        let max_x = parse_required_f64(bndbox, "xmax")?;
        let min_y = parse_required_f64(bndbox, "ymin")?;
        let max_y = parse_required_f64(bndbox, "ymax")?;

        let rect = RectXYXY::from_xyxy(min_x, min_y, max_x, max_y)
            .to_normalized(image_width, image_height);
        if !rect.is_valid_relative() {
            return Err("Invalid coordinate value(s) in bndbox".to_string());
        }
        return Ok(ShapeGeometry::Box(rect));
    }

    if let Some(polygon) = child_element(element, "polygon") {
        let mut values = Vec::new();
        for child in polygon.children().filter(Node::is_element) {
            let tag = child.tag_name().name();
            if tag != "x" && tag != "y" {
                continue; // Unknown tags are ignored.
            }
            let raw = child.text().map(str::trim).unwrap_or_default();
            let value: f64 = raw
                .parse()
                .map_err(|_| format!("Invalid <{tag}> value '{raw}' in polygon"))?;
            values.push(value);
        }

        if values.is_empty() || values.len() % 2 != 0 {
            return Err("Invalid number of coordinates in polygon".to_string());
        }

        let points: Vec<Coord<Normalized>> = values
            .chunks_exact(2)
            .map(|pair| Coord::new(pair[0] / image_width, pair[1] / image_height))
            .collect();
        if !points.iter().all(Coord::is_valid_relative) {
            return Err("Invalid coordinate value(s) in polygon".to_string());
        }
        return Ok(ShapeGeometry::Polygon(points));
    }

    Err(format!("{MISSING_ELEMENT_PREFIX}bndbox"))
}

/// Reconstructs generic tags from the PVOC fixed fields. A value of 0,
/// an absent element, or a pose of "unspecified" adds nothing.
fn parse_tags(element: Node<'_, '_>) -> Result<std::collections::BTreeSet<String>, String> {
    let mut tags = std::collections::BTreeSet::new();

    if let Some(pose) = optional_child_text(element, "pose") {
        if !pose.eq_ignore_ascii_case("unspecified") {
            tags.insert(format!("pose: {}", pose.to_lowercase()));
        }
    }

    for flag in ["truncated", "occluded", "difficult"] {
        if let Some(raw) = optional_child_text(element, flag) {
            let value: i64 = raw
                .parse()
                .map_err(|_| format!("Invalid <{flag}> value '{raw}'"))?;
            if value == 1 {
                tags.insert(flag.to_string());
            }
        }
    }

    if let Some(actions) = child_element(element, "actions") {
        for action in actions.children().filter(Node::is_element) {
            let name = action.tag_name().name();
            let raw = action.text().map(str::trim).unwrap_or_default();
            let value: i64 = raw
                .parse()
                .map_err(|_| format!("Invalid <{name}> value '{raw}' in actions"))?;
            if value == 1 {
                tags.insert(format!("action: {name}"));
            }
        }
    }
    Ok(tags)
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn required_child_text(node: Node<'_, '_>, tag: &str) -> Result<String, String> {
    optional_child_text(node, tag).ok_or_else(|| format!("{MISSING_ELEMENT_PREFIX}{tag}"))
}

fn parse_required_f64(node: Node<'_, '_>, tag: &str) -> Result<f64, String> {
    let raw = required_child_text(node, tag)?;
    raw.parse()
        .map_err(|_| format!("Invalid <{tag}> value '{raw}'"))
}

fn parse_required_u32(node: Node<'_, '_>, tag: &str) -> Result<u32, String> {
    let raw = required_child_text(node, tag)?;
    raw.parse()
        .map_err(|_| format!("Invalid <{tag}> value '{raw}'"))
}

// ---- writing ----

fn render_annotation_xml(record: &ImageRecord) -> String {
    let meta = &record.meta;
    let mut xml = String::new();

    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    writeln!(xml, "<annotation>").expect("write to string");
    writeln!(xml, "  <folder>{}</folder>", xml_escape(&meta.folder_name)).expect("write to string");
    writeln!(
        xml,
        "  <filename>{}</filename>",
        xml_escape(&meta.file_name)
    )
    .expect("write to string");
    writeln!(xml, "  <size>").expect("write to string");
    writeln!(xml, "    <width>{}</width>", meta.width).expect("write to string");
    writeln!(xml, "    <height>{}</height>", meta.height).expect("write to string");
    writeln!(xml, "    <depth>{}</depth>", meta.depth).expect("write to string");
    writeln!(xml, "  </size>").expect("write to string");

    for shape in &record.shapes {
        write_shape_element(&mut xml, "object", shape, meta, 1);
    }

    writeln!(xml, "</annotation>").expect("write to string");
    xml
}

fn write_shape_element(
    xml: &mut String,
    element_name: &str,
    shape: &ShapeData,
    meta: &ImageMetaData,
    depth: usize,
) {
    let pad = "  ".repeat(depth);
    let inner = "  ".repeat(depth + 1);

    writeln!(xml, "{pad}<{element_name}>").expect("write to string");
    writeln!(xml, "{inner}<name>{}</name>", xml_escape(&shape.category)).expect("write to string");

    // Extract the PVOC fixed fields back out of the generic tags.
    let mut difficult = 0;
    let mut occluded = 0;
    let mut truncated = 0;
    let mut pose = "Unspecified".to_string();
    let mut actions = Vec::new();
    for tag in &shape.tags {
        let lower = tag.to_lowercase();
        if let Some(rest) = lower.strip_prefix("pose:") {
            pose = capitalize(rest.trim_start());
        } else if let Some(rest) = lower.strip_prefix("action:") {
            actions.push(rest.trim_start().to_string());
        } else if lower == "difficult" {
            difficult = 1;
        } else if lower == "occluded" {
            occluded = 1;
        } else if lower == "truncated" {
            truncated = 1;
        }
    }

    writeln!(xml, "{inner}<difficult>{difficult}</difficult>").expect("write to string");
    writeln!(xml, "{inner}<occluded>{occluded}</occluded>").expect("write to string");
    writeln!(xml, "{inner}<pose>{}</pose>", xml_escape(&pose)).expect("write to string");
    writeln!(xml, "{inner}<truncated>{truncated}</truncated>").expect("write to string");

    if !actions.is_empty() {
        writeln!(xml, "{inner}<actions>").expect("write to string");
        for action in &actions {
            writeln!(
                xml,
                "{inner}  <{0}>1</{0}>",
                xml_escape(action)
            )
            .expect("write to string");
        }
        writeln!(xml, "{inner}</actions>").expect("write to string");
    }

    let width = f64::from(meta.width);
    let height = f64::from(meta.height);
    match &shape.geometry {
        ShapeGeometry::Box(rect) => {
            let absolute = rect.to_pixel(width, height);
            writeln!(xml, "{inner}<bndbox>").expect("write to string");
            writeln!(
                xml,
                "{inner}  <xmin>{}</xmin>",
                fmt_fixed(absolute.min_x(), COORDINATE_PRECISION)
            )
            .expect("write to string");
            writeln!(
                xml,
                "{inner}  <xmax>{}</xmax>",
                fmt_fixed(absolute.max_x(), COORDINATE_PRECISION)
            )
            .expect("write to string");
            writeln!(
                xml,
                "{inner}  <ymin>{}</ymin>",
                fmt_fixed(absolute.min_y(), COORDINATE_PRECISION)
            )
            .expect("write to string");
            writeln!(
                xml,
                "{inner}  <ymax>{}</ymax>",
                fmt_fixed(absolute.max_y(), COORDINATE_PRECISION)
            )
            .expect("write to string");
            writeln!(xml, "{inner}</bndbox>").expect("write to string");
        }
        ShapeGeometry::Polygon(points) => {
            writeln!(xml, "{inner}<polygon>").expect("write to string");
            for point in points {
                let absolute = point.to_pixel(width, height);
                writeln!(
                    xml,
                    "{inner}  <x>{}</x>",
                    fmt_fixed(absolute.x, COORDINATE_PRECISION)
                )
                .expect("write to string");
                writeln!(
                    xml,
                    "{inner}  <y>{}</y>",
                    fmt_fixed(absolute.y, COORDINATE_PRECISION)
                )
                .expect("write to string");
            }
            writeln!(xml, "{inner}</polygon>").expect("write to string");
        }
    }

    for part in &shape.parts {
        write_shape_element(xml, "part", part, meta, depth + 1);
    }
    writeln!(xml, "{pad}</{element_name}>").expect("write to string");
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
