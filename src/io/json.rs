//! JSON codec for the editor's interchange schema.
//!
//! A single file holds the whole batch: a top-level array of
//! `{image, objects}` entries, objects carrying `category`, `bndbox` or
//! `polygon` (relative coordinates), `tags`, and recursive `parts`.
//!
//! Saving goes through plain serde structs. Loading walks
//! `serde_json::Value` field by field so every object and entry can fail
//! independently: one malformed coordinate skips one object, not the
//! batch. Only an unparsable document is a hard error.

use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::error::BoxlabelError;
use crate::model::{
    is_valid_relative, AnnotationStore, Coord, ImageMetaData, ImportedAnnotations, ImportedImage,
    Normalized, RectXYXY, RgbaColor, ShapeData, ShapeGeometry,
};

use super::{BatchOptions, CategoryPool, ErrorInfoEntry, IoResult, OperationType};

// ---- writing ----

#[derive(Serialize)]
struct JsonAnnotation<'a> {
    image: &'a ImageMetaData,
    objects: Vec<JsonShape<'a>>,
}

#[derive(Serialize)]
struct JsonCategory<'a> {
    name: &'a str,
    color: String,
}

#[derive(Serialize)]
struct JsonShape<'a> {
    category: JsonCategory<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bndbox: Option<&'a RectXYXY<Normalized>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    polygon: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    tags: &'a BTreeSet<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parts: Vec<JsonShape<'a>>,
}

fn to_json_shape<'a>(shape: &'a ShapeData, store: &AnnotationStore) -> JsonShape<'a> {
    let color = store
        .category(&shape.category)
        .map(|category| category.color)
        .unwrap_or_else(RgbaColor::random)
        .to_web();

    let (bndbox, polygon) = match &shape.geometry {
        ShapeGeometry::Box(rect) => (Some(rect), None),
        ShapeGeometry::Polygon(points) => (
            None,
            Some(points.iter().flat_map(|point| [point.x, point.y]).collect()),
        ),
    };

    JsonShape {
        category: JsonCategory {
            name: &shape.category,
            color,
        },
        bndbox,
        polygon,
        tags: &shape.tags,
        parts: shape
            .parts
            .iter()
            .map(|part| to_json_shape(part, store))
            .collect(),
    }
}

/// Saves the whole store as one JSON file at `path`.
pub fn save_json(
    store: &AnnotationStore,
    path: &Path,
    options: &BatchOptions<'_>,
) -> Result<IoResult, BoxlabelError> {
    let started = Instant::now();

    let annotated: Vec<JsonAnnotation<'_>> = store
        .images()
        .iter()
        .filter(|record| record.has_annotations())
        .map(|record| JsonAnnotation {
            image: &record.meta,
            objects: record
                .shapes
                .iter()
                .map(|shape| to_json_shape(shape, store))
                .collect(),
        })
        .collect();
    let entry_count = annotated.len();

    let file = File::create(path).map_err(BoxlabelError::Io)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &annotated).map_err(|source| {
        BoxlabelError::JsonWrite {
            path: path.to_path_buf(),
            source,
        }
    })?;
    options.report(1, 1);

    tracing::info!(entries = entry_count, "JSON save finished");
    Ok(IoResult::new(
        OperationType::AnnotationSaving,
        entry_count,
        started.elapsed(),
        Vec::new(),
    ))
}

// ---- reading ----

/// Imports annotations from the JSON file at `path`.
///
/// The progress callback fires after each top-level entry. Per-object
/// and per-entry problems are collected; only a syntactically invalid
/// document fails the operation.
pub fn load_json(
    store: &mut AnnotationStore,
    path: &Path,
    options: &BatchOptions<'_>,
) -> Result<IoResult, BoxlabelError> {
    let started = Instant::now();
    let annotation_file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    let file = File::open(path).map_err(BoxlabelError::Io)?;
    let root: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| BoxlabelError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;
    let entries: Vec<Value> =
        serde_json::from_value(root).map_err(|source| BoxlabelError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;

    let known_images: HashSet<String> = store
        .images()
        .iter()
        .map(|record| record.meta.file_name.clone())
        .collect();
    let pool = CategoryPool::seeded(store.categories());

    let mut errors = Vec::new();
    let mut imported = Vec::new();
    let total = entries.len();
    for (index, entry) in entries.into_iter().enumerate() {
        if options.aborted() {
            break;
        }
        if let Some(image) = parse_entry(
            &entry,
            &known_images,
            &pool,
            &annotation_file_name,
            &mut errors,
        ) {
            imported.push(image);
        }
        options.report(index + 1, total);
    }

    let parsed_count = imported.len();
    let (categories, tallies) = pool.into_parts();
    tracing::debug!(?tallies, "per-category shape tallies after parse");

    let merge_errors = store.merge_import(ImportedAnnotations {
        categories,
        images: imported,
    });
    let success_count = parsed_count - merge_errors.len();
    errors.extend(merge_errors);

    tracing::info!(
        entries = total,
        imported = success_count,
        failed = errors.len(),
        "JSON import finished"
    );
    Ok(IoResult::new(
        OperationType::AnnotationImport,
        success_count,
        started.elapsed(),
        errors,
    ))
}

fn parse_entry(
    entry: &Value,
    known_images: &HashSet<String>,
    pool: &CategoryPool,
    annotation_file_name: &str,
    errors: &mut Vec<ErrorInfoEntry>,
) -> Option<ImportedImage> {
    let mut record_error = |message: String| {
        errors.push(ErrorInfoEntry::new(annotation_file_name, message));
    };

    let Some(image) = entry.get("image") else {
        record_error("Missing image element.".to_string());
        return None;
    };
    let Some(file_name) = image.get("fileName").and_then(Value::as_str) else {
        record_error("Missing image fileName element.".to_string());
        return None;
    };
    if !known_images.contains(file_name) {
        record_error(format!(
            "Image {file_name} does not belong to the currently loaded image files."
        ));
        return None;
    }

    let Some(objects) = entry.get("objects").and_then(Value::as_array) else {
        record_error(format!(
            "Missing objects element in annotation for image {file_name}."
        ));
        return None;
    };

    let mut shapes = Vec::new();
    for object in objects {
        if let Some(shape) = parse_shape(object, file_name, pool, annotation_file_name, errors) {
            shapes.push(shape);
        }
    }

    // An entry whose objects all failed (or that had none) contributes no
    // annotation.
    if shapes.is_empty() {
        return None;
    }
    Some(ImportedImage {
        file_name: file_name.to_string(),
        shapes,
    })
}

fn parse_shape(
    object: &Value,
    image_file_name: &str,
    pool: &CategoryPool,
    annotation_file_name: &str,
    errors: &mut Vec<ErrorInfoEntry>,
) -> Option<ShapeData> {
    let element_name = if object.get("bndbox").is_some() {
        "bndbox"
    } else {
        "polygon"
    };
    let mut record_error = |message: String| {
        errors.push(ErrorInfoEntry::new(annotation_file_name, message));
    };

    let Some(category_value) = object.get("category") else {
        record_error(format!(
            "Missing category element in {element_name} element in annotation for image {image_file_name}."
        ));
        return None;
    };
    let Some(category_name) = category_value.get("name").and_then(Value::as_str) else {
        record_error(format!(
            "Missing category name element in annotation for image {image_file_name}."
        ));
        return None;
    };

    let color = match category_value.get("color") {
        None => None,
        Some(value) => match value.as_str().and_then(RgbaColor::parse_web) {
            Some(color) => Some(color),
            None => {
                record_error(format!(
                    "Invalid color element in annotation for image {image_file_name}."
                ));
                return None;
            }
        },
    };

    let geometry = match parse_shape_geometry(object, image_file_name) {
        Ok(geometry) => geometry,
        Err(message) => {
            record_error(message);
            return None;
        }
    };

    let tags = match parse_shape_tags(object, element_name, image_file_name) {
        Ok(tags) => tags,
        Err(message) => {
            record_error(message);
            return None;
        }
    };

    let parts_values = match object.get("parts") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values.clone(),
        Some(_) => {
            record_error(format!(
                "Invalid parts value(s) in {element_name} element in annotation for image {image_file_name}."
            ));
            return None;
        }
    };

    let mut parts = Vec::new();
    for part in parts_values.iter().filter(|value| !value.is_null()) {
        if let Some(parsed) = parse_shape(part, image_file_name, pool, annotation_file_name, errors)
        {
            parts.push(parsed);
        }
    }

    pool.intern(category_name, color);
    pool.record_shape(category_name);

    Some(ShapeData {
        category: category_name.to_string(),
        geometry,
        tags,
        parts,
    })
}

fn parse_shape_geometry(object: &Value, image_file_name: &str) -> Result<ShapeGeometry, String> {
    if let Some(bndbox) = object.get("bndbox") {
        let mut corner = |name: &str| -> Result<f64, String> {
            let Some(field) = bndbox.get(name) else {
                return Err(format!(
                    "Missing {name} element in bndbox element in annotation for image {image_file_name}."
                ));
            };
            let value = field.as_f64().ok_or_else(|| {
                format!(
                    "Invalid coordinate value for {name} element in bndbox element in annotation for image {image_file_name}."
                )
            })?;
            if !is_valid_relative(value) {
                return Err(format!(
                    "Invalid coordinate value for {name} element in bndbox element in annotation for image {image_file_name}."
                ));
            }
            Ok(value)
        };

        let min_x = corner("minX")?;
        let min_y = corner("minY")?;
        let max_x = corner("maxX")?;
        let max_y = corner("maxY")?;
        return Ok(ShapeGeometry::Box(RectXYXY::from_xyxy(
            min_x, min_y, max_x, max_y,
        )));
    }

    if let Some(polygon) = object.get("polygon") {
        let Some(values) = polygon.as_array() else {
            return Err(format!(
                "Invalid coordinate value(s) in polygon element in annotation for image {image_file_name}."
            ));
        };
        let mut coordinates = Vec::with_capacity(values.len());
        for value in values {
            let number = value.as_f64().ok_or_else(|| {
                format!(
                    "Invalid coordinate value(s) in polygon element in annotation for image {image_file_name}."
                )
            })?;
            coordinates.push(number);
        }
        if coordinates.is_empty() || coordinates.len() % 2 != 0 {
            return Err(format!(
                "Invalid number of coordinates in polygon element in annotation for image {image_file_name}."
            ));
        }
        if !coordinates.iter().all(|&value| is_valid_relative(value)) {
            return Err(format!(
                "Invalid coordinate value(s) in polygon element in annotation for image {image_file_name}."
            ));
        }
        let points: Vec<Coord<Normalized>> = coordinates
            .chunks_exact(2)
            .map(|pair| Coord::new(pair[0], pair[1]))
            .collect();
        return Ok(ShapeGeometry::Polygon(points));
    }

    Err(format!(
        "Missing bndbox or polygon element in annotation for image {image_file_name}."
    ))
}

fn parse_shape_tags(
    object: &Value,
    element_name: &str,
    image_file_name: &str,
) -> Result<BTreeSet<String>, String> {
    match object.get("tags") {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::Array(values)) => {
            let mut tags = BTreeSet::new();
            for value in values {
                match value {
                    Value::Null => {}
                    Value::String(tag) => {
                        if !tag.trim().is_empty() {
                            tags.insert(tag.clone());
                        }
                    }
                    _ => {
                        return Err(format!(
                            "Invalid tags value(s) in {element_name} element in annotation for image {image_file_name}."
                        ));
                    }
                }
            }
            Ok(tags)
        }
        Some(_) => Err(format!(
            "Invalid tags value(s) in {element_name} element in annotation for image {image_file_name}."
        )),
    }
}
