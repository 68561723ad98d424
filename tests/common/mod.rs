#![allow(dead_code)]

use std::fs;
use std::path::Path;

use boxlabel::model::{
    AnnotationStore, Coord, ImageMetaData, Normalized, RectXYXY, ShapeData,
};

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// A store pre-loaded with the given image metadata (no files on disk).
pub fn store_with_images(names: &[(&str, u32, u32)]) -> AnnotationStore {
    let mut store = AnnotationStore::new();
    store.set_image_folder(
        names
            .iter()
            .map(|&(name, width, height)| ImageMetaData::new(name, "images", width, height, 3))
            .collect(),
    );
    store
}

pub fn sample_box(category: &str, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> ShapeData {
    ShapeData::new_box(category, RectXYXY::from_xyxy(min_x, min_y, max_x, max_y))
}

pub fn sample_polygon(category: &str, coordinates: &[f64]) -> ShapeData {
    let points: Vec<Coord<Normalized>> = coordinates
        .chunks_exact(2)
        .map(|pair| Coord::new(pair[0], pair[1]))
        .collect();
    ShapeData::new_polygon(category, points)
}

pub fn assert_rect_close(left: &RectXYXY<Normalized>, right: &RectXYXY<Normalized>, eps: f64) {
    assert!(
        (left.min_x() - right.min_x()).abs() <= eps
            && (left.min_y() - right.min_y()).abs() <= eps
            && (left.max_x() - right.max_x()).abs() <= eps
            && (left.max_y() - right.max_y()).abs() <= eps,
        "rectangles differ by more than {eps}: {left:?} vs {right:?}"
    );
}
