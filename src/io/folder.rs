//! Image folder loading.
//!
//! A folder load is a non-recursive (depth 1) scan for recognized image
//! files. The dimension triple per file comes from probing the image
//! header; no pixel data is decoded.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::BoxlabelError;
use crate::model::ImageMetaData;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Default channel depth recorded when the header probe cannot tell.
const DEFAULT_DEPTH: u32 = 3;

/// Scans `path` for image files and returns one metadata record per
/// image, in stable (sorted) enumeration order.
///
/// Fails with [`BoxlabelError::NoValidImages`] when the scan finds
/// nothing usable; no partial state is produced.
pub fn load_image_folder(path: &Path) -> Result<Vec<ImageMetaData>, BoxlabelError> {
    let folder_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut image_files = Vec::new();
    for entry in fs::read_dir(path).map_err(BoxlabelError::Io)? {
        let entry = entry.map_err(BoxlabelError::Io)?;
        let entry_path = entry.path();
        if entry_path.is_file() && has_image_extension(&entry_path) {
            image_files.push(entry_path);
        }
    }
    image_files.sort_by_cached_key(|file| {
        file.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    warn_about_nested_images(path);

    let mut images = Vec::with_capacity(image_files.len());
    for file in image_files {
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        match imagesize::size(&file) {
            Ok(size) => images.push(ImageMetaData::new(
                file_name,
                folder_name.clone(),
                size.width as u32,
                size.height as u32,
                DEFAULT_DEPTH,
            )),
            Err(error) => {
                tracing::warn!(file = %file.display(), %error, "skipping unreadable image");
            }
        }
    }

    if images.is_empty() {
        return Err(BoxlabelError::NoValidImages {
            path: path.to_path_buf(),
        });
    }
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// The scan is depth-1 only; images in subdirectories are ignored, which
/// is worth a warning because it is a common surprise.
fn warn_about_nested_images(dir: &Path) {
    let nested = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && has_image_extension(entry.path()))
        .count();

    if nested > 0 {
        tracing::warn!(
            count = nested,
            dir = %dir.display(),
            "image folder scan is flat (non-recursive); nested image file(s) were skipped"
        );
    }
}
